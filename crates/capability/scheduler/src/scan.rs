//! 调度主循环。
//!
//! 对账模型：订阅注册表代次，每次配置变化取新快照，与在跑的
//! worker 集合比对 —— 配置未变的 PLC 原地继续（在途调度不受
//! 编辑影响），变化或停用的 PLC 先协作式停机再按新配置重建。
//! 停机通过 watch 通道通知，最迟一个扫描间隔内生效。

use crate::reader::PlcReader;
use domain::{HealthSignal, PlcStatus, ReadOutcome, TagValue, now_epoch_ms};
use plcdash_registry::{PlcRecord, Registry, RegistryError, RegistrySnapshot, TagRecord};
use plcdash_telemetry::{
    record_scan, record_scan_failure, record_value_dropped, record_value_emitted,
    record_value_suppressed,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, info, warn};

/// 调度参数。
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// 单次标签读取的操作超时（毫秒）。
    pub read_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 2_000,
        }
    }
}

/// 扫描调度器入口。
pub struct ScanScheduler;

impl ScanScheduler {
    /// 启动调度主循环。
    ///
    /// 启动时必须能取到首个注册表快照，取不到即返回错误（唯一的
    /// 致命类条件）；此后的快照失败只告警并沿用旧 worker 集合。
    pub fn spawn(
        registry: Arc<Registry>,
        reader: Arc<dyn PlcReader>,
        values_tx: mpsc::Sender<TagValue>,
        health_tx: mpsc::Sender<HealthSignal>,
        config: SchedulerConfig,
    ) -> Result<JoinHandle<()>, RegistryError> {
        let generation_rx = registry.subscribe_generation();
        let snapshot = registry.snapshot()?;
        Ok(tokio::spawn(run_scheduler(
            registry,
            reader,
            values_tx,
            health_tx,
            config,
            snapshot,
            generation_rx,
        )))
    }
}

async fn run_scheduler(
    registry: Arc<Registry>,
    reader: Arc<dyn PlcReader>,
    values_tx: mpsc::Sender<TagValue>,
    health_tx: mpsc::Sender<HealthSignal>,
    config: SchedulerConfig,
    initial: Arc<RegistrySnapshot>,
    mut generation_rx: watch::Receiver<u64>,
) {
    let mut workers: HashMap<i64, PlcWorker> = HashMap::new();
    reconcile(
        &mut workers,
        &initial,
        &reader,
        &values_tx,
        &health_tx,
        &config,
    );

    loop {
        if generation_rx.changed().await.is_err() {
            break;
        }
        match registry.snapshot() {
            Ok(snapshot) => {
                debug!(generation = snapshot.generation, "scheduler refreshing workers");
                reconcile(
                    &mut workers,
                    &snapshot,
                    &reader,
                    &values_tx,
                    &health_tx,
                    &config,
                );
            }
            Err(err) => warn!(error = %err, "snapshot refresh failed; keeping current workers"),
        }
    }

    for (_, worker) in workers.drain() {
        worker.stop();
    }
}

/// 使 worker 集合与快照中的活跃 PLC 一致。
fn reconcile(
    workers: &mut HashMap<i64, PlcWorker>,
    snapshot: &RegistrySnapshot,
    reader: &Arc<dyn PlcReader>,
    values_tx: &mpsc::Sender<TagValue>,
    health_tx: &mpsc::Sender<HealthSignal>,
    config: &SchedulerConfig,
) {
    let mut desired: HashMap<i64, (PlcRecord, Vec<TagRecord>)> = HashMap::new();
    for plc in snapshot.active_plcs() {
        let tags: Vec<TagRecord> = snapshot
            .active_tags_of(plc.plc_id)
            .into_iter()
            .cloned()
            .collect();
        desired.insert(plc.plc_id, (normalized(plc), tags));
    }

    // 停掉消失、停用或配置已变的 worker
    let stale: Vec<i64> = workers
        .iter()
        .filter(|(plc_id, worker)| {
            desired
                .get(plc_id)
                .map(|(plc, tags)| plc != &worker.plc || tags != &worker.tags)
                .unwrap_or(true)
        })
        .map(|(plc_id, _)| *plc_id)
        .collect();
    for plc_id in stale {
        if let Some(worker) = workers.remove(&plc_id) {
            info!(plc_id, "stopping plc worker");
            worker.stop();
        }
    }

    // 为新出现或刚重建的 PLC 启动 worker
    for (plc_id, (plc, tags)) in desired {
        if !workers.contains_key(&plc_id) {
            info!(plc_id, tag_count = tags.len(), "starting plc worker");
            workers.insert(
                plc_id,
                PlcWorker::spawn(
                    plc,
                    tags,
                    Arc::clone(reader),
                    values_tx.clone(),
                    health_tx.clone(),
                    config.read_timeout_ms,
                ),
            );
        }
    }
}

/// 去掉派生字段后的 PLC 配置视图（status 变化不触发 worker 重建）。
fn normalized(plc: &PlcRecord) -> PlcRecord {
    let mut plc = plc.clone();
    plc.status = PlcStatus::Unknown;
    plc.last_update_ms = None;
    plc
}

/// 一个活跃 PLC 的逻辑 worker：每个活跃标签一个子任务，
/// 共享一个停机 watch 通道。
struct PlcWorker {
    plc: PlcRecord,
    tags: Vec<TagRecord>,
    shutdown_tx: watch::Sender<bool>,
}

impl PlcWorker {
    fn spawn(
        plc: PlcRecord,
        tags: Vec<TagRecord>,
        reader: Arc<dyn PlcReader>,
        values_tx: mpsc::Sender<TagValue>,
        health_tx: mpsc::Sender<HealthSignal>,
        read_timeout_ms: u64,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        for tag in &tags {
            tokio::spawn(run_tag_loop(
                plc.clone(),
                tag.clone(),
                Arc::clone(&reader),
                values_tx.clone(),
                health_tx.clone(),
                read_timeout_ms,
                shutdown_tx.subscribe(),
            ));
        }
        Self {
            plc,
            tags,
            shutdown_tx,
        }
    }

    fn stop(self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// 单个标签的周期读取环。
///
/// interval 锚定启动时刻并按墙钟校正；卡顿后跳过错过的节拍
/// 而不是突发补读。每次读取都上报健康信号；值事件只在采样
/// 成功且（monitor_changes 时）值有变化时发出。
async fn run_tag_loop(
    plc: PlcRecord,
    tag: TagRecord,
    reader: Arc<dyn PlcReader>,
    values_tx: mpsc::Sender<TagValue>,
    health_tx: mpsc::Sender<HealthSignal>,
    read_timeout_ms: u64,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_millis(tag.scan_rate_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let read_timeout = Duration::from_millis(read_timeout_ms);
    let mut last_emitted = None;

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                record_scan();
                let outcome = match timeout(read_timeout, reader.read_tag(&plc, &tag)).await {
                    Ok(Ok(value)) => {
                        let unchanged = tag.monitor_changes
                            && last_emitted
                                .as_ref()
                                .is_some_and(|prev: &domain::TagValueData| prev.same_value(&value));
                        if unchanged {
                            record_value_suppressed();
                        } else {
                            last_emitted = Some(value.clone());
                            record_value_emitted();
                            let event = TagValue {
                                plc_id: plc.plc_id,
                                tag_id: tag.tag_id,
                                ts_ms: now_epoch_ms(),
                                value,
                            };
                            // 持久化相对读取节拍尽力而为：通道满即丢弃计损，
                            // 存储侧的卡顿不得反压扫描
                            match values_tx.try_send(event) {
                                Ok(()) => {}
                                Err(TrySendError::Full(_)) => {
                                    record_value_dropped();
                                    warn!(
                                        plc_id = plc.plc_id,
                                        tag_id = tag.tag_id,
                                        "value channel full; dropping sample"
                                    );
                                }
                                Err(TrySendError::Closed(_)) => break,
                            }
                        }
                        ReadOutcome::Ok
                    }
                    Ok(Err(err)) => {
                        record_scan_failure();
                        debug!(plc_id = plc.plc_id, tag_id = tag.tag_id, error = %err, "tag read failed");
                        err.outcome()
                    }
                    Err(_) => {
                        record_scan_failure();
                        debug!(plc_id = plc.plc_id, tag_id = tag.tag_id, "tag read timed out");
                        ReadOutcome::Timeout
                    }
                };
                let signal = HealthSignal {
                    plc_id: plc.plc_id,
                    ts_ms: now_epoch_ms(),
                    outcome,
                };
                if health_tx.send(signal).await.is_err() {
                    break;
                }
            }
        }
    }
}
