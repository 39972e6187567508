//! 路由任务与保留清理。
//!
//! 路由任务独占值通道的消费端，逐事件查当前路由表并分发到
//! 存储目标。存储故障做有界退避重试，耗尽后丢弃该事件并计数，
//! 从不中断任务本身。保留清理是独立的周期任务，按当前路由表
//! 的保留规则对时序表做惰性淘汰。

use crate::store::{PermanentCell, PermanentStore, SeriesSample, TimeseriesStore};
use domain::{StorageType, TagValue, now_epoch_ms};
use plcdash_resolver::SharedRouting;
use plcdash_telemetry::{
    record_rows_evicted, record_write_loss, record_write_retry, record_write_success,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, info, warn};

const MS_PER_DAY: i64 = 86_400_000;

/// 路由任务参数。
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// 单次写入的最大尝试次数（含首次）。
    pub write_max_retries: u32,
    /// 重试退避基准（毫秒），按次数指数放大。
    pub write_backoff_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            write_max_retries: 3,
            write_backoff_ms: 50,
        }
    }
}

/// 存储路由任务入口。
pub struct StorageRouter;

impl StorageRouter {
    /// 启动路由任务，独占 `values_rx`，通道关闭即退出。
    pub fn spawn(
        routing: SharedRouting,
        permanent: Arc<dyn PermanentStore>,
        timeseries: Arc<dyn TimeseriesStore>,
        mut values_rx: mpsc::Receiver<TagValue>,
        config: RouterConfig,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = values_rx.recv().await {
                dispatch(&routing, &permanent, &timeseries, &config, event).await;
            }
            info!("value channel closed; storage router stopping");
        })
    }
}

async fn dispatch(
    routing: &SharedRouting,
    permanent: &Arc<dyn PermanentStore>,
    timeseries: &Arc<dyn TimeseriesStore>,
    config: &RouterConfig,
    event: TagValue,
) {
    let table = routing.current();
    let Some(targets) = table.routes_for(event.tag_id) else {
        // 未映射的标签正常产生事件，静默丢弃
        debug!(tag_id = event.tag_id, "no routes for tag; dropping value");
        return;
    };
    for target in targets {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match target.storage_type {
                StorageType::Permanent => {
                    permanent
                        .upsert(
                            target.table_id,
                            event.tag_id,
                            PermanentCell {
                                column_id: target.column_id,
                                ts_ms: event.ts_ms,
                                value: event.value.clone(),
                            },
                        )
                        .await
                }
                StorageType::Timeseries => {
                    timeseries
                        .append(
                            target.table_id,
                            SeriesSample {
                                column_id: target.column_id,
                                tag_id: event.tag_id,
                                ts_ms: event.ts_ms,
                                value: event.value.clone(),
                            },
                        )
                        .await
                }
            };
            match result {
                Ok(()) => {
                    record_write_success();
                    break;
                }
                Err(err) if attempt < config.write_max_retries => {
                    record_write_retry();
                    // 指数上限 2^10，避免超大重试配置移位越界
                    let backoff = config
                        .write_backoff_ms
                        .saturating_mul(1u64 << (attempt - 1).min(10));
                    warn!(
                        tag_id = event.tag_id,
                        table_id = target.table_id,
                        attempt,
                        backoff_ms = backoff,
                        error = %err,
                        "store write failed; retrying"
                    );
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(err) => {
                    record_write_loss();
                    warn!(
                        tag_id = event.tag_id,
                        table_id = target.table_id,
                        attempts = attempt,
                        error = %err,
                        "store write failed; dropping value"
                    );
                    break;
                }
            }
        }
    }
}

/// 启动保留清理任务：按当前路由表的保留规则周期性淘汰过期采样点。
pub fn spawn_retention_sweep(
    routing: SharedRouting,
    timeseries: Arc<dyn TimeseriesStore>,
    sweep_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // 首个 tick 立即到期，先跳过再进入周期节拍
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let table = routing.current();
            for rule in table.retention_rules() {
                let cutoff = now_epoch_ms() - i64::from(rule.retention_days) * MS_PER_DAY;
                match timeseries.evict_older_than(rule.table_id, cutoff).await {
                    Ok(0) => {}
                    Ok(evicted) => {
                        record_rows_evicted(evicted);
                        info!(table_id = rule.table_id, evicted, "retention sweep evicted rows");
                    }
                    Err(err) => {
                        warn!(table_id = rule.table_id, error = %err, "retention sweep failed")
                    }
                }
            }
        }
    })
}
