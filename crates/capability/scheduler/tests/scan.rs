//! 扫描调度集成测试（脚本化驱动，真实短间隔运行）。

use async_trait::async_trait;
use domain::{DataType, TagValueData};
use plcdash_registry::{NewPlc, NewTag, Registry, TagUpdate};
use plcdash_scheduler::{PlcReader, ReadError, ScanScheduler, SchedulerConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// 按标签名回放预置读数序列，读完后重复最后一个值。
struct ScriptedReader {
    script: Vec<i64>,
    cursor: AtomicUsize,
}

impl ScriptedReader {
    fn new(script: Vec<i64>) -> Self {
        Self {
            script,
            cursor: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PlcReader for ScriptedReader {
    async fn read_tag(
        &self,
        _plc: &plcdash_registry::PlcRecord,
        _tag: &plcdash_registry::TagRecord,
    ) -> Result<TagValueData, ReadError> {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        let value = self.script[idx.min(self.script.len() - 1)];
        Ok(TagValueData::I64(value))
    }

    async fn write_tag(
        &self,
        _plc: &plcdash_registry::PlcRecord,
        _tag: &plcdash_registry::TagRecord,
        _value: TagValueData,
    ) -> Result<(), ReadError> {
        Ok(())
    }
}

/// 每个标签独立计数的读取器：名为 "stuck" 的标签永远挂起，
/// 其余标签返回递增整数。
struct PartiallyStuckReader {
    counter: AtomicUsize,
}

#[async_trait]
impl PlcReader for PartiallyStuckReader {
    async fn read_tag(
        &self,
        _plc: &plcdash_registry::PlcRecord,
        tag: &plcdash_registry::TagRecord,
    ) -> Result<TagValueData, ReadError> {
        if tag.name == "stuck" {
            std::future::pending::<()>().await;
            unreachable!()
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) as i64;
        Ok(TagValueData::I64(n))
    }

    async fn write_tag(
        &self,
        _plc: &plcdash_registry::PlcRecord,
        _tag: &plcdash_registry::TagRecord,
        _value: TagValueData,
    ) -> Result<(), ReadError> {
        Ok(())
    }
}

fn seed_plc_and_tag(registry: &Registry, monitor_changes: bool) -> (i64, i64) {
    let plc = registry
        .create_plc(NewPlc {
            name: "line-1".into(),
            ip_address: "10.0.0.10".into(),
            rack: 0,
            slot: 1,
            active: true,
        })
        .unwrap();
    let tag = registry
        .create_tag(NewTag {
            plc_id: plc.plc_id,
            name: "motor_speed".into(),
            db_number: 10,
            byte_offset: 0,
            data_type: DataType::Int,
            can_write: false,
            scan_rate_ms: 20,
            monitor_changes,
            active: true,
        })
        .unwrap();
    (plc.plc_id, tag.tag_id)
}

#[tokio::test]
async fn repeated_values_are_suppressed_when_monitoring_changes() {
    let registry = Arc::new(Registry::new());
    let (plc_id, tag_id) = seed_plc_and_tag(&registry, true);

    let (values_tx, mut values_rx) = mpsc::channel(64);
    let (health_tx, mut health_rx) = mpsc::channel(64);
    let handle = ScanScheduler::spawn(
        Arc::clone(&registry),
        Arc::new(ScriptedReader::new(vec![5, 5, 7, 7, 7])),
        values_tx,
        health_tx,
        SchedulerConfig {
            read_timeout_ms: 500,
        },
    )
    .unwrap();

    let first = timeout(Duration::from_secs(2), values_rx.recv())
        .await
        .expect("first value within deadline")
        .expect("channel open");
    assert_eq!(first.plc_id, plc_id);
    assert_eq!(first.tag_id, tag_id);
    assert_eq!(first.value, TagValueData::I64(5));

    // 第二个读数仍是 5，被抑制；下一个事件必须直接是 7
    let second = timeout(Duration::from_secs(2), values_rx.recv())
        .await
        .expect("second value within deadline")
        .expect("channel open");
    assert_eq!(second.value, TagValueData::I64(7));

    // 每次采样无论是否发值都要有健康信号
    let signal = timeout(Duration::from_secs(2), health_rx.recv())
        .await
        .expect("health signal within deadline")
        .expect("channel open");
    assert_eq!(signal.plc_id, plc_id);

    handle.abort();
}

#[tokio::test]
async fn without_monitoring_every_sample_is_emitted() {
    let registry = Arc::new(Registry::new());
    seed_plc_and_tag(&registry, false);

    let (values_tx, mut values_rx) = mpsc::channel(64);
    let (health_tx, _health_rx) = mpsc::channel(64);
    let handle = ScanScheduler::spawn(
        Arc::clone(&registry),
        Arc::new(ScriptedReader::new(vec![5, 5])),
        values_tx,
        health_tx,
        SchedulerConfig {
            read_timeout_ms: 500,
        },
    )
    .unwrap();

    for _ in 0..3 {
        let event = timeout(Duration::from_secs(2), values_rx.recv())
            .await
            .expect("value within deadline")
            .expect("channel open");
        assert_eq!(event.value, TagValueData::I64(5));
    }

    handle.abort();
}

#[tokio::test]
async fn stalled_tag_does_not_block_sibling() {
    let registry = Arc::new(Registry::new());
    let plc = registry
        .create_plc(NewPlc {
            name: "line-2".into(),
            ip_address: "10.0.0.11".into(),
            rack: 0,
            slot: 1,
            active: true,
        })
        .unwrap();
    for name in ["stuck", "healthy"] {
        registry
            .create_tag(NewTag {
                plc_id: plc.plc_id,
                name: name.into(),
                db_number: 10,
                byte_offset: 0,
                data_type: DataType::Int,
                can_write: false,
                scan_rate_ms: 20,
                monitor_changes: false,
                active: true,
            })
            .unwrap();
    }

    let (values_tx, mut values_rx) = mpsc::channel(64);
    let (health_tx, _health_rx) = mpsc::channel(256);
    let handle = ScanScheduler::spawn(
        Arc::clone(&registry),
        Arc::new(PartiallyStuckReader {
            counter: AtomicUsize::new(0),
        }),
        values_tx,
        health_tx,
        SchedulerConfig {
            // 故意大于测试时长，卡死读数一直在途
            read_timeout_ms: 60_000,
        },
    )
    .unwrap();

    // healthy 标签必须照常按节拍发值
    for _ in 0..3 {
        timeout(Duration::from_secs(2), values_rx.recv())
            .await
            .expect("healthy tag keeps emitting")
            .expect("channel open");
    }

    handle.abort();
}

#[tokio::test]
async fn deactivated_tag_stops_emitting() {
    let registry = Arc::new(Registry::new());
    let (_plc_id, tag_id) = seed_plc_and_tag(&registry, false);

    let (values_tx, mut values_rx) = mpsc::channel(64);
    let (health_tx, _health_rx) = mpsc::channel(256);
    let handle = ScanScheduler::spawn(
        Arc::clone(&registry),
        Arc::new(ScriptedReader::new(vec![1])),
        values_tx,
        health_tx,
        SchedulerConfig {
            read_timeout_ms: 500,
        },
    )
    .unwrap();

    timeout(Duration::from_secs(2), values_rx.recv())
        .await
        .expect("scanning started")
        .expect("channel open");

    registry
        .update_tag(
            tag_id,
            TagUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();

    // 留一个协调窗口，然后清空在途事件
    tokio::time::sleep(Duration::from_millis(200)).await;
    while values_rx.try_recv().is_ok() {}

    // 停用生效后不应再有新事件
    let after = timeout(Duration::from_millis(300), values_rx.recv()).await;
    assert!(after.is_err(), "no events after deactivation");

    handle.abort();
}
