//! # 存储路由
//!
//! 消费调度器的值事件流，按路由表分发到存储目标：
//!
//! - `error`：存储层错误类型
//! - `store`：存储接口抽象（永久快照表 / 时序表）与样本结构
//! - `in_memory`：内存存储实现（测试与单机部署）
//! - `router`：路由任务（分发、重试、丢弃计数）与保留清理任务
//!
//! 路由查找走 `SharedRouting` 的当前表，无路由的事件静默丢弃。
//! 写入失败做有界指数退避重试，重试耗尽后丢弃事件并计数，
//! 存储故障从不反压到调度器之外。

pub mod error;
pub mod in_memory;
pub mod router;
pub mod store;

pub use error::StoreError;
pub use in_memory::{InMemoryPermanentStore, InMemoryTimeseriesStore};
pub use router::{RouterConfig, StorageRouter, spawn_retention_sweep};
pub use store::{PermanentCell, PermanentRow, PermanentStore, SeriesSample, TimeseriesStore};
