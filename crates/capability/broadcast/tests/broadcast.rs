//! 状态广播任务的集成测试。

use domain::{HealthSignal, PlcStatus, ReadOutcome, now_epoch_ms};
use plcdash_broadcast::{BroadcastConfig, StatusBroadcaster, StatusHub};
use plcdash_registry::{NewPlc, PlcUpdate, Registry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn seed_plc(registry: &Registry, name: &str) -> i64 {
    registry
        .create_plc(NewPlc {
            name: name.to_string(),
            ip_address: "10.0.0.7".to_string(),
            rack: 0,
            slot: 1,
            active: true,
        })
        .expect("plc")
        .plc_id
}

fn signal(plc_id: i64, outcome: ReadOutcome) -> HealthSignal {
    signal_at(plc_id, outcome, now_epoch_ms())
}

fn signal_at(plc_id: i64, outcome: ReadOutcome, ts_ms: i64) -> HealthSignal {
    HealthSignal {
        plc_id,
        ts_ms,
        outcome,
    }
}

async fn next_status(
    rx: &mut mpsc::Receiver<domain::StatusEvent>,
) -> domain::StatusEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event within deadline")
        .expect("stream open")
}

async fn start(
    registry: &Arc<Registry>,
    threshold: u32,
) -> (StatusHub, mpsc::Sender<HealthSignal>) {
    let (health_tx, health_rx) = mpsc::channel(64);
    let (hub, _handle) = StatusBroadcaster::spawn(
        Arc::clone(registry),
        health_rx,
        BroadcastConfig {
            failure_threshold: threshold,
            subscriber_buffer: 64,
        },
    )
    .expect("broadcaster");
    (hub, health_tx)
}

#[tokio::test]
async fn threshold_crossing_and_recovery_are_ordered() {
    let registry = Arc::new(Registry::new());
    let plc_id = seed_plc(&registry, "line-1");
    let (hub, health_tx) = start(&registry, 3).await;
    let mut rx = hub.subscribe().await.expect("subscribe");

    // 回放帧：唯一已知 PLC，初始 Unknown
    let replay = next_status(&mut rx).await;
    assert_eq!(replay.plc_id, plc_id);
    assert_eq!(replay.status, PlcStatus::Unknown);

    health_tx.send(signal(plc_id, ReadOutcome::Ok)).await.unwrap();
    assert_eq!(next_status(&mut rx).await.status, PlcStatus::Online);

    // 阈值为 3：前两次超时不迁移，第三次转 Offline
    for _ in 0..3 {
        health_tx.send(signal(plc_id, ReadOutcome::Timeout)).await.unwrap();
    }
    assert_eq!(next_status(&mut rx).await.status, PlcStatus::Offline);

    // 单次成功即恢复
    health_tx.send(signal(plc_id, ReadOutcome::Ok)).await.unwrap();
    assert_eq!(next_status(&mut rx).await.status, PlcStatus::Online);

    // 派生字段已回写注册表
    let plc = registry.find_plc(plc_id).unwrap();
    assert_eq!(plc.status, PlcStatus::Online);
    assert!(plc.last_update_ms.is_some());
}

#[tokio::test]
async fn connection_loss_maps_to_error_state() {
    let registry = Arc::new(Registry::new());
    let plc_id = seed_plc(&registry, "line-1");
    let (hub, health_tx) = start(&registry, 2).await;
    let mut rx = hub.subscribe().await.expect("subscribe");
    let _replay = next_status(&mut rx).await;

    for _ in 0..2 {
        health_tx
            .send(signal(plc_id, ReadOutcome::ConnectionLost))
            .await
            .unwrap();
    }
    assert_eq!(next_status(&mut rx).await.status, PlcStatus::Error);
    assert_eq!(registry.find_plc(plc_id).unwrap().status, PlcStatus::Error);
}

#[tokio::test]
async fn late_subscriber_gets_current_state_replay() {
    let registry = Arc::new(Registry::new());
    let plc_a = seed_plc(&registry, "line-a");
    let plc_b = seed_plc(&registry, "line-b");
    let (hub, health_tx) = start(&registry, 1).await;

    let mut early = hub.subscribe().await.expect("subscribe");
    // 消耗两帧回放
    let _ = next_status(&mut early).await;
    let _ = next_status(&mut early).await;

    health_tx
        .send(signal_at(plc_a, ReadOutcome::Ok, 1_111))
        .await
        .unwrap();
    health_tx
        .send(signal_at(plc_b, ReadOutcome::Timeout, 2_222))
        .await
        .unwrap();
    assert_eq!(next_status(&mut early).await.status, PlcStatus::Online);
    assert_eq!(next_status(&mut early).await.status, PlcStatus::Offline);

    // 迟到订阅者：回放帧按 plc_id 升序给出当前状态，
    // 时间戳是各 PLC 实际迁移时刻而非订阅时刻
    let mut late = hub.subscribe().await.expect("subscribe");
    let first = next_status(&mut late).await;
    let second = next_status(&mut late).await;
    assert_eq!((first.plc_id, first.status), (plc_a, PlcStatus::Online));
    assert_eq!(first.ts_ms, 1_111);
    assert_eq!((second.plc_id, second.status), (plc_b, PlcStatus::Offline));
    assert_eq!(second.ts_ms, 2_222);
}

#[tokio::test]
async fn plc_created_after_startup_enters_replay() {
    let registry = Arc::new(Registry::new());
    let (hub, _health_tx) = start(&registry, 1).await;
    // 广播任务启动后才建的 PLC：代次通知驱动对账，随后出现在回放里
    let plc_id = seed_plc(&registry, "line-late");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let mut rx = hub.subscribe().await.expect("subscribe");
        match timeout(Duration::from_millis(100), rx.recv()).await {
            Ok(Some(frame)) => {
                assert_eq!(frame.plc_id, plc_id);
                assert_eq!(frame.status, PlcStatus::Unknown);
                break;
            }
            _ => assert!(
                tokio::time::Instant::now() < deadline,
                "new plc never appeared in replay"
            ),
        }
    }
}

#[tokio::test]
async fn deactivation_and_deletion_are_announced() {
    let registry = Arc::new(Registry::new());
    let plc_id = seed_plc(&registry, "line-1");
    let (hub, health_tx) = start(&registry, 1).await;
    let mut rx = hub.subscribe().await.expect("subscribe");
    let _replay = next_status(&mut rx).await;

    health_tx.send(signal(plc_id, ReadOutcome::Ok)).await.unwrap();
    assert_eq!(next_status(&mut rx).await.status, PlcStatus::Online);

    registry
        .update_plc(
            plc_id,
            PlcUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(next_status(&mut rx).await.status, PlcStatus::Offline);
    assert_eq!(registry.find_plc(plc_id).unwrap().status, PlcStatus::Offline);

    // 停用后迟到的健康信号不再驱动迁移
    health_tx.send(signal(plc_id, ReadOutcome::Ok)).await.unwrap();

    registry.delete_plc(plc_id, true).unwrap();
    assert_eq!(next_status(&mut rx).await.status, PlcStatus::Removed);
}

#[tokio::test]
async fn slow_subscriber_is_disconnected_not_blocking() {
    let registry = Arc::new(Registry::new());
    let plc_id = seed_plc(&registry, "line-1");
    let (health_tx, health_rx) = mpsc::channel(64);
    let (hub, _handle) = StatusBroadcaster::spawn(
        Arc::clone(&registry),
        health_rx,
        BroadcastConfig {
            failure_threshold: 1,
            subscriber_buffer: 1,
        },
    )
    .expect("broadcaster");

    // 不消费回放帧：缓冲（容量 1）被占满，第一条实时事件挤爆订阅者
    let mut slow_rx = hub.subscribe().await.expect("subscribe");
    health_tx.send(signal(plc_id, ReadOutcome::Ok)).await.unwrap();
    health_tx.send(signal(plc_id, ReadOutcome::Timeout)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // 被断开的订阅者只剩缓冲里那一帧，随后流结束
    let first = timeout(Duration::from_secs(2), slow_rx.recv())
        .await
        .expect("buffered frame")
        .expect("frame present");
    assert_eq!(first.status, PlcStatus::Unknown);
    let end = timeout(Duration::from_secs(2), slow_rx.recv())
        .await
        .expect("stream closes");
    assert!(end.is_none(), "overflowed subscriber is dropped");

    // 新订阅者不受影响，照常拿到回放帧
    let mut fresh_rx = hub.subscribe().await.expect("subscribe");
    let frame = next_status(&mut fresh_rx).await;
    assert_eq!(frame.plc_id, plc_id);
}
