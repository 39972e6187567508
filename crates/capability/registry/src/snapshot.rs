//! 一致性时点快照。
//!
//! `Registry::snapshot` 的输出：所有实体表在同一把锁下克隆，
//! 供映射编译与扫描调度以只读方式消费。字段公开以便测试直接构造。

use crate::models::{ColumnRecord, PlcRecord, TableRecord, TagMappingRecord, TagRecord};
use std::collections::HashMap;

/// 注册表的不可变时点视图。
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub generation: u64,
    pub plcs: HashMap<i64, PlcRecord>,
    pub tags: HashMap<i64, TagRecord>,
    pub tables: HashMap<i64, TableRecord>,
    pub columns: HashMap<i64, ColumnRecord>,
    pub mappings: HashMap<i64, TagMappingRecord>,
}

impl RegistrySnapshot {
    /// 活跃 PLC 列表（按 id 排序，调度器按此建 worker）。
    pub fn active_plcs(&self) -> Vec<&PlcRecord> {
        let mut plcs: Vec<&PlcRecord> = self.plcs.values().filter(|plc| plc.active).collect();
        plcs.sort_by_key(|plc| plc.plc_id);
        plcs
    }

    /// 指定 PLC 的活跃标签（按 id 排序）。
    pub fn active_tags_of(&self, plc_id: i64) -> Vec<&TagRecord> {
        let mut tags: Vec<&TagRecord> = self
            .tags
            .values()
            .filter(|tag| tag.plc_id == plc_id && tag.active)
            .collect();
        tags.sort_by_key(|tag| tag.tag_id);
        tags
    }

    /// 指定表的全部列（按 id 排序）。
    pub fn columns_of_table(&self, table_id: i64) -> Vec<&ColumnRecord> {
        let mut columns: Vec<&ColumnRecord> = self
            .columns
            .values()
            .filter(|column| column.table_id == table_id)
            .collect();
        columns.sort_by_key(|column| column.column_id);
        columns
    }

    /// 指定表的时间轴列（is_timestamp 的唯一性由注册表保证）。
    pub fn timestamp_column_of(&self, table_id: i64) -> Option<&ColumnRecord> {
        self.columns
            .values()
            .find(|column| column.table_id == table_id && column.is_timestamp)
    }
}
