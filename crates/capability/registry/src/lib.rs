//! # 标签注册表
//!
//! 配置实体（PLC、标签、目标表、列、映射）的唯一事实来源：
//!
//! - `models`：实体记录与更新结构（Record/Update 拆分）
//! - `error`：注册表错误类型（NotFound / Conflict / TypeMismatch / WriteCollision）
//! - `registry`：单一 `Registry`，所有实体表共用一把锁，跨实体不变量原子校验
//! - `snapshot`：一致性时点快照，供映射编译与扫描调度消费
//!
//! ## 所有权约定
//!
//! 静态配置字段只随 CRUD 变更；`status`/`last_update` 是派生字段，
//! 唯一的写入口是 `Registry::update_plc_status`，由状态广播器调用。
//! 调度器与存储路由只持有快照中的只读副本，配置编辑不影响在途调度，
//! 直到下一次快照刷新（generation watch 通道通知）。

pub mod error;
pub mod models;
pub mod registry;
pub mod snapshot;

pub use error::RegistryError;
pub use models::{
    ColumnRecord, ColumnUpdate, NewColumn, NewPlc, NewTag, NewTagMapping, NewTable, PlcRecord,
    PlcUpdate, TableRecord, TableUpdate, TagMappingRecord, TagRecord, TagUpdate,
};
pub use registry::Registry;
pub use snapshot::RegistrySnapshot;
