//! # 扫描调度器
//!
//! 每个活跃 PLC 一个逻辑 worker，worker 内部每个活跃标签一个
//! 独立的周期读取子任务：
//!
//! - `reader`：外部 PLC 读写能力抽象（`PlcReader`，协议驱动不在本仓库内）
//! - `scan`：调度主循环（快照对账、worker 生命周期、标签读取环）
//!
//! 隔离要求：单个标签的慢读/卡死被单次读取超时界定，
//! 不会拖延同一 PLC 或其他 PLC 上其余标签的节拍。

pub mod reader;
pub mod scan;

pub use reader::{NoopReader, PlcReader, ReadError};
pub use scan::{ScanScheduler, SchedulerConfig};
