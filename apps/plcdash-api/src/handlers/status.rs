//! WebSocket 状态推送 handler
//!
//! - GET /ws/status - 升级为 WebSocket，推送 PLC 状态帧
//!
//! 连接建立后先收到一批当前已知 PLC 的状态快照帧，之后是实时
//! 迁移帧。消费过慢挤满服务端缓冲时连接被直接断开，客户端
//! 重连即重新拿到全量快照。

use crate::AppState;
use api_contract::WsMessage;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use tracing::debug;

/// 状态订阅端点
pub async fn ws_status(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| stream_status(state, socket))
}

async fn stream_status(state: AppState, mut socket: WebSocket) {
    let Ok(mut events) = state.hub.subscribe().await else {
        let _ = socket.close().await;
        return;
    };
    loop {
        tokio::select! {
            event = events.recv() => {
                // None 意味着订阅被广播端断开（溢出）或广播任务退出
                let Some(event) = event else { break };
                let frame = WsMessage::from_event(&event);
                let Ok(text) = serde_json::to_string(&frame) else { continue };
                if socket.send(Message::Text(text)).await.is_err() {
                    debug!("ws client went away");
                    break;
                }
            }
            incoming = socket.recv() => {
                // 客户端帧只关心关闭；其余一律忽略
                match incoming {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    let _ = socket.close().await;
}
