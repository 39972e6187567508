//! # 状态广播
//!
//! 单任务持有全部 PLC 的健康状态机，消费调度器的健康信号流，
//! 在状态迁移时回写注册表派生字段并向订阅者扇出事件。
//!
//! 状态机（按 PLC 独立）：
//!
//! ```text
//! Unknown ──首次成功──▶ Online ◀──恢复成功── Offline / Error
//!                        │ 连续失败达到阈值
//!                        ▼
//!        Offline（读超时） / Error（断连）        删除 ──▶ Removed
//! ```
//!
//! 所有迁移都经过这一个任务，单个 PLC 的事件因此严格有序；
//! 跨 PLC 顺序不作保证。订阅者是有界通道，投递为至少一次，
//! 消费过慢挤满缓冲即被断开，慢订阅者从不拖住其余订阅者。

use domain::{HealthSignal, PlcStatus, ReadOutcome, StatusEvent, now_epoch_ms};
use plcdash_registry::{Registry, RegistryError};
use plcdash_telemetry::{record_status_transition, record_subscriber_overflow};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 广播侧错误（仅订阅接口向调用方暴露）。
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("status broadcaster is not running")]
    Closed,
}

/// 广播参数。
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// 连续失败多少次判离线/故障。
    pub failure_threshold: u32,
    /// 每个订阅者的通道容量，挤满即断开。
    pub subscriber_buffer: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            subscriber_buffer: 64,
        }
    }
}

enum HubCommand {
    Subscribe {
        reply: oneshot::Sender<mpsc::Receiver<StatusEvent>>,
    },
}

/// 订阅入口（可自由克隆，命令转发给广播任务）。
#[derive(Clone)]
pub struct StatusHub {
    commands: mpsc::Sender<HubCommand>,
}

impl StatusHub {
    /// 订阅状态事件流。
    ///
    /// 返回的接收端先收到一批当前已知 PLC 的状态快照帧，
    /// 之后是实时迁移事件。
    pub async fn subscribe(&self) -> Result<mpsc::Receiver<StatusEvent>, BroadcastError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(HubCommand::Subscribe { reply })
            .await
            .map_err(|_| BroadcastError::Closed)?;
        rx.await.map_err(|_| BroadcastError::Closed)
    }
}

/// 状态广播任务入口。
pub struct StatusBroadcaster;

impl StatusBroadcaster {
    /// 启动广播任务。启动时必须能取到首个注册表快照。
    pub fn spawn(
        registry: Arc<Registry>,
        health_rx: mpsc::Receiver<HealthSignal>,
        config: BroadcastConfig,
    ) -> Result<(StatusHub, JoinHandle<()>), RegistryError> {
        // 先订阅代次再取快照，两步之间的配置变更会触发一次对账
        let generation_rx = registry.subscribe_generation();
        let snapshot = registry.snapshot()?;
        let now = now_epoch_ms();
        let mut states: HashMap<i64, PlcHealth> = HashMap::new();
        for plc in snapshot.plcs.values() {
            states.insert(
                plc.plc_id,
                PlcHealth::new(plc.status, plc.active, plc.last_update_ms.unwrap_or(now)),
            );
        }
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let handle = tokio::spawn(run_broadcaster(
            registry,
            health_rx,
            commands_rx,
            generation_rx,
            config,
            states,
        ));
        Ok((
            StatusHub {
                commands: commands_tx,
            },
            handle,
        ))
    }
}

struct PlcHealth {
    status: PlcStatus,
    active: bool,
    consecutive_failures: u32,
    /// 最近一次状态迁移的时间戳，订阅回放帧沿用它。
    last_change_ms: i64,
}

impl PlcHealth {
    fn new(status: PlcStatus, active: bool, last_change_ms: i64) -> Self {
        Self {
            status,
            active,
            consecutive_failures: 0,
            last_change_ms,
        }
    }
}

async fn run_broadcaster(
    registry: Arc<Registry>,
    mut health_rx: mpsc::Receiver<HealthSignal>,
    mut commands_rx: mpsc::Receiver<HubCommand>,
    mut generation_rx: watch::Receiver<u64>,
    config: BroadcastConfig,
    mut states: HashMap<i64, PlcHealth>,
) {
    let mut subscribers: Vec<mpsc::Sender<StatusEvent>> = Vec::new();

    loop {
        tokio::select! {
            signal = health_rx.recv() => {
                let Some(signal) = signal else {
                    info!("health channel closed; status broadcaster stopping");
                    break;
                };
                handle_signal(&registry, &config, &mut states, &mut subscribers, signal);
            }
            command = commands_rx.recv() => {
                let Some(command) = command else { break };
                match command {
                    HubCommand::Subscribe { reply } => {
                        let rx = add_subscriber(&config, &states, &mut subscribers);
                        let _ = reply.send(rx);
                    }
                }
            }
            changed = generation_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                reconcile(&registry, &mut states, &mut subscribers);
            }
        }
    }
}

fn handle_signal(
    registry: &Registry,
    config: &BroadcastConfig,
    states: &mut HashMap<i64, PlcHealth>,
    subscribers: &mut Vec<mpsc::Sender<StatusEvent>>,
    signal: HealthSignal,
) {
    // 已删除或停用 PLC 的迟到信号直接忽略
    let Some(state) = states.get_mut(&signal.plc_id) else {
        return;
    };
    if !state.active {
        return;
    }
    let next = match signal.outcome {
        ReadOutcome::Ok => {
            state.consecutive_failures = 0;
            (state.status != PlcStatus::Online).then_some(PlcStatus::Online)
        }
        outcome => {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
            if state.consecutive_failures < config.failure_threshold {
                None
            } else {
                let candidate = match outcome {
                    ReadOutcome::ConnectionLost => PlcStatus::Error,
                    _ => PlcStatus::Offline,
                };
                (state.status != candidate).then_some(candidate)
            }
        }
    };
    if let Some(next) = next {
        transition(registry, states, subscribers, signal.plc_id, next, signal.ts_ms);
    }
}

/// 执行一次状态迁移：更新内部状态、回写注册表派生字段、扇出事件。
fn transition(
    registry: &Registry,
    states: &mut HashMap<i64, PlcHealth>,
    subscribers: &mut Vec<mpsc::Sender<StatusEvent>>,
    plc_id: i64,
    next: PlcStatus,
    ts_ms: i64,
) {
    if let Some(state) = states.get_mut(&plc_id) {
        debug!(plc_id, from = state.status.as_str(), to = next.as_str(), "plc status transition");
        state.status = next;
        state.last_change_ms = ts_ms;
    }
    if next != PlcStatus::Removed {
        if let Err(err) = registry.update_plc_status(plc_id, next, ts_ms) {
            warn!(plc_id, error = %err, "status write-back failed");
        }
    }
    record_status_transition();
    fan_out(
        subscribers,
        StatusEvent {
            plc_id,
            status: next,
            ts_ms,
        },
    );
}

/// 配置代次变化后的对账：删除的 PLC 发 Removed，停用的转 Offline。
fn reconcile(
    registry: &Arc<Registry>,
    states: &mut HashMap<i64, PlcHealth>,
    subscribers: &mut Vec<mpsc::Sender<StatusEvent>>,
) {
    let snapshot = match registry.snapshot() {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(error = %err, "snapshot refresh failed; keeping current status view");
            return;
        }
    };
    let now = now_epoch_ms();

    let removed: Vec<i64> = states
        .keys()
        .filter(|plc_id| !snapshot.plcs.contains_key(plc_id))
        .copied()
        .collect();
    for plc_id in removed {
        transition(registry, states, subscribers, plc_id, PlcStatus::Removed, now);
        states.remove(&plc_id);
    }

    let mut deactivated: Vec<i64> = Vec::new();
    for plc in snapshot.plcs.values() {
        match states.get_mut(&plc.plc_id) {
            Some(state) => {
                state.active = plc.active;
                if !plc.active && state.status != PlcStatus::Offline {
                    state.consecutive_failures = 0;
                    deactivated.push(plc.plc_id);
                }
            }
            None => {
                states.insert(
                    plc.plc_id,
                    PlcHealth::new(plc.status, plc.active, plc.last_update_ms.unwrap_or(now)),
                );
            }
        }
    }
    for plc_id in deactivated {
        transition(registry, states, subscribers, plc_id, PlcStatus::Offline, now);
    }
}

fn add_subscriber(
    config: &BroadcastConfig,
    states: &HashMap<i64, PlcHealth>,
    subscribers: &mut Vec<mpsc::Sender<StatusEvent>>,
) -> mpsc::Receiver<StatusEvent> {
    let (tx, rx) = mpsc::channel(config.subscriber_buffer.max(1));
    // 回放当前全量状态，稳定序便于客户端对账；
    // 时间戳取各 PLC 实际迁移时刻而非回放时刻
    let mut plc_ids: Vec<i64> = states.keys().copied().collect();
    plc_ids.sort_unstable();
    for plc_id in plc_ids {
        let state = &states[&plc_id];
        if tx
            .try_send(StatusEvent {
                plc_id,
                status: state.status,
                ts_ms: state.last_change_ms,
            })
            .is_err()
        {
            break;
        }
    }
    subscribers.push(tx);
    rx
}

fn fan_out(subscribers: &mut Vec<mpsc::Sender<StatusEvent>>, event: StatusEvent) {
    subscribers.retain(|tx| match tx.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            record_subscriber_overflow();
            warn!(plc_id = event.plc_id, "subscriber overflow; disconnecting");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    });
}
