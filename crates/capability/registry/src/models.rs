//! 数据模型
//!
//! 定义注册表管理的实体记录与更新结构：
//! - PLC：PlcRecord, NewPlc, PlcUpdate（含派生 status/last_update 字段）
//! - 标签：TagRecord, NewTag, TagUpdate（寻址、scan_rate、monitor_changes）
//! - 目标表：TableRecord, NewTable, TableUpdate（permanent / timeseries）
//! - 列：ColumnRecord, NewColumn, ColumnUpdate（可选绑定标签、时间轴标记）
//! - 映射：TagMappingRecord, NewTagMapping（反规范化，含 storage_type）

use domain::{DataType, PlcStatus, StorageType};

/// PLC 记录。
///
/// `status` 与 `last_update_ms` 是派生字段，只由
/// `Registry::update_plc_status` 写入，配置编辑不得触碰。
#[derive(Debug, Clone, PartialEq)]
pub struct PlcRecord {
    pub plc_id: i64,
    pub name: String,
    pub ip_address: String,
    pub rack: u16,
    pub slot: u16,
    pub active: bool,
    pub status: PlcStatus,
    pub last_update_ms: Option<i64>,
}

/// PLC 创建输入。
#[derive(Debug, Clone)]
pub struct NewPlc {
    pub name: String,
    pub ip_address: String,
    pub rack: u16,
    pub slot: u16,
    pub active: bool,
}

/// PLC 更新输入（仅静态配置字段）。
#[derive(Debug, Clone, Default)]
pub struct PlcUpdate {
    pub name: Option<String>,
    pub ip_address: Option<String>,
    pub rack: Option<u16>,
    pub slot: Option<u16>,
    pub active: Option<bool>,
}

/// 标签记录。
#[derive(Debug, Clone, PartialEq)]
pub struct TagRecord {
    pub tag_id: i64,
    pub plc_id: i64,
    pub name: String,
    pub db_number: u32,
    pub byte_offset: u32,
    pub data_type: DataType,
    pub can_write: bool,
    pub scan_rate_ms: u64,
    pub monitor_changes: bool,
    pub active: bool,
}

/// 标签创建输入。
#[derive(Debug, Clone)]
pub struct NewTag {
    pub plc_id: i64,
    pub name: String,
    pub db_number: u32,
    pub byte_offset: u32,
    pub data_type: DataType,
    pub can_write: bool,
    pub scan_rate_ms: u64,
    pub monitor_changes: bool,
    pub active: bool,
}

/// 标签更新输入。
#[derive(Debug, Clone, Default)]
pub struct TagUpdate {
    pub name: Option<String>,
    pub db_number: Option<u32>,
    pub byte_offset: Option<u32>,
    pub data_type: Option<DataType>,
    pub can_write: Option<bool>,
    pub scan_rate_ms: Option<u64>,
    pub monitor_changes: Option<bool>,
    pub active: Option<bool>,
}

/// 目标表记录。
///
/// `retention_days` 仅对 timeseries 有意义且必须为正；permanent 必须为空。
#[derive(Debug, Clone, PartialEq)]
pub struct TableRecord {
    pub table_id: i64,
    pub name: String,
    pub storage_type: StorageType,
    pub retention_days: Option<u32>,
}

/// 目标表创建输入。
#[derive(Debug, Clone)]
pub struct NewTable {
    pub name: String,
    pub storage_type: StorageType,
    pub retention_days: Option<u32>,
}

/// 目标表更新输入（storage_type 创建后不可变）。
#[derive(Debug, Clone, Default)]
pub struct TableUpdate {
    pub name: Option<String>,
    pub retention_days: Option<u32>,
}

/// 列记录。
///
/// `tag_id`/`plc_id` 是可选的标签绑定（plc_id 由标签派生）；
/// `is_timestamp` 每表至多一列，timeseries 表必须恰好一列。
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRecord {
    pub column_id: i64,
    pub table_id: i64,
    pub name: String,
    pub data_type: DataType,
    pub tag_id: Option<i64>,
    pub plc_id: Option<i64>,
    pub is_timestamp: bool,
}

/// 列创建输入。
#[derive(Debug, Clone)]
pub struct NewColumn {
    pub table_id: i64,
    pub name: String,
    pub data_type: DataType,
    pub tag_id: Option<i64>,
    pub is_timestamp: bool,
}

/// 列更新输入。
#[derive(Debug, Clone, Default)]
pub struct ColumnUpdate {
    pub name: Option<String>,
    pub data_type: Option<DataType>,
    pub tag_id: Option<Option<i64>>,
    pub is_timestamp: Option<bool>,
}

/// 映射记录（反规范化：携带 plc_id 与 storage_type，路由时免于再联结）。
#[derive(Debug, Clone, PartialEq)]
pub struct TagMappingRecord {
    pub mapping_id: i64,
    pub tag_id: i64,
    pub plc_id: i64,
    pub table_id: i64,
    pub column_id: i64,
    pub storage_type: StorageType,
}

/// 映射创建输入（plc_id 与 storage_type 由注册表从引用实体派生）。
#[derive(Debug, Clone)]
pub struct NewTagMapping {
    pub tag_id: i64,
    pub table_id: i64,
    pub column_id: i64,
}
