//! 注册表实现。
//!
//! 所有实体表放在同一个 `RwLock<Inner>` 下，跨实体不变量
//! （外键存在性、写目标唯一、时间轴列唯一、级联删除）在一次
//! 写锁内校验并提交。每次成功变更递增配置代次并通过 watch
//! 通道通知下游刷新快照。

use crate::error::RegistryError;
use crate::models::{
    ColumnRecord, ColumnUpdate, NewColumn, NewPlc, NewTag, NewTagMapping, NewTable, PlcRecord,
    PlcUpdate, TableRecord, TableUpdate, TagMappingRecord, TagRecord, TagUpdate,
};
use crate::snapshot::RegistrySnapshot;
use domain::{PlcStatus, StorageType};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

struct Inner {
    next_id: i64,
    generation: u64,
    plcs: HashMap<i64, PlcRecord>,
    tags: HashMap<i64, TagRecord>,
    tables: HashMap<i64, TableRecord>,
    columns: HashMap<i64, ColumnRecord>,
    mappings: HashMap<i64, TagMappingRecord>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// 配置实体的唯一事实来源。
pub struct Registry {
    inner: RwLock<Inner>,
    generation_tx: watch::Sender<u64>,
}

impl Registry {
    pub fn new() -> Self {
        let (generation_tx, _) = watch::channel(0);
        Self {
            inner: RwLock::new(Inner {
                next_id: 1,
                generation: 0,
                plcs: HashMap::new(),
                tags: HashMap::new(),
                tables: HashMap::new(),
                columns: HashMap::new(),
                mappings: HashMap::new(),
            }),
            generation_tx,
        }
    }

    /// 订阅配置代次变化（快照刷新信号）。
    pub fn subscribe_generation(&self) -> watch::Receiver<u64> {
        self.generation_tx.subscribe()
    }

    /// 一致性时点快照。启动时首个快照失败是唯一致命错误。
    pub fn snapshot(&self) -> Result<Arc<RegistrySnapshot>, RegistryError> {
        let inner = self.read_inner()?;
        Ok(Arc::new(RegistrySnapshot {
            generation: inner.generation,
            plcs: inner.plcs.clone(),
            tags: inner.tags.clone(),
            tables: inner.tables.clone(),
            columns: inner.columns.clone(),
            mappings: inner.mappings.clone(),
        }))
    }

    // ---- PLC ----

    pub fn create_plc(&self, new: NewPlc) -> Result<PlcRecord, RegistryError> {
        if new.name.trim().is_empty() {
            return Err(RegistryError::invalid("plc name required"));
        }
        if new.ip_address.trim().is_empty() {
            return Err(RegistryError::invalid("plc ip_address required"));
        }
        let mut inner = self.write_inner()?;
        let record = PlcRecord {
            plc_id: inner.next_id(),
            name: new.name,
            ip_address: new.ip_address,
            rack: new.rack,
            slot: new.slot,
            active: new.active,
            status: PlcStatus::Unknown,
            last_update_ms: None,
        };
        inner.plcs.insert(record.plc_id, record.clone());
        self.commit(inner);
        Ok(record)
    }

    pub fn list_plcs(&self) -> Result<Vec<PlcRecord>, RegistryError> {
        let inner = self.read_inner()?;
        let mut plcs: Vec<PlcRecord> = inner.plcs.values().cloned().collect();
        plcs.sort_by_key(|plc| plc.plc_id);
        Ok(plcs)
    }

    pub fn find_plc(&self, plc_id: i64) -> Result<PlcRecord, RegistryError> {
        let inner = self.read_inner()?;
        inner
            .plcs
            .get(&plc_id)
            .cloned()
            .ok_or(RegistryError::not_found("plc", plc_id))
    }

    pub fn update_plc(&self, plc_id: i64, update: PlcUpdate) -> Result<PlcRecord, RegistryError> {
        let mut inner = self.write_inner()?;
        let mut next = inner
            .plcs
            .get(&plc_id)
            .cloned()
            .ok_or(RegistryError::not_found("plc", plc_id))?;
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(RegistryError::invalid("plc name required"));
            }
            next.name = name;
        }
        if let Some(ip_address) = update.ip_address {
            if ip_address.trim().is_empty() {
                return Err(RegistryError::invalid("plc ip_address required"));
            }
            next.ip_address = ip_address;
        }
        if let Some(rack) = update.rack {
            next.rack = rack;
        }
        if let Some(slot) = update.slot {
            next.slot = slot;
        }
        if let Some(active) = update.active {
            next.active = active;
        }
        inner.plcs.insert(plc_id, next.clone());
        self.commit(inner);
        Ok(next)
    }

    /// 删除 PLC。存在依赖标签/映射时返回 Conflict，除非显式级联。
    pub fn delete_plc(&self, plc_id: i64, cascade: bool) -> Result<(), RegistryError> {
        let mut inner = self.write_inner()?;
        if !inner.plcs.contains_key(&plc_id) {
            return Err(RegistryError::not_found("plc", plc_id));
        }
        let tag_ids: Vec<i64> = inner
            .tags
            .values()
            .filter(|tag| tag.plc_id == plc_id)
            .map(|tag| tag.tag_id)
            .collect();
        if !tag_ids.is_empty() && !cascade {
            return Err(RegistryError::conflict(format!(
                "plc {} has {} dependent tags; delete with cascade",
                plc_id,
                tag_ids.len()
            )));
        }
        for tag_id in &tag_ids {
            remove_tag_dependents(&mut inner, *tag_id);
            inner.tags.remove(tag_id);
        }
        inner.plcs.remove(&plc_id);
        self.commit(inner);
        Ok(())
    }

    /// 派生状态的唯一写入口（由状态广播器调用）。
    ///
    /// 不递增配置代次：状态变化不触发调度与路由的快照刷新。
    pub fn update_plc_status(
        &self,
        plc_id: i64,
        status: PlcStatus,
        ts_ms: i64,
    ) -> Result<(), RegistryError> {
        let mut inner = self.write_inner()?;
        let plc = inner
            .plcs
            .get_mut(&plc_id)
            .ok_or(RegistryError::not_found("plc", plc_id))?;
        plc.status = status;
        plc.last_update_ms = Some(ts_ms);
        Ok(())
    }

    // ---- 标签 ----

    pub fn create_tag(&self, new: NewTag) -> Result<TagRecord, RegistryError> {
        if new.name.trim().is_empty() {
            return Err(RegistryError::invalid("tag name required"));
        }
        if new.active && new.scan_rate_ms == 0 {
            return Err(RegistryError::invalid(
                "scan_rate_ms must be > 0 for an active tag",
            ));
        }
        let mut inner = self.write_inner()?;
        if !inner.plcs.contains_key(&new.plc_id) {
            return Err(RegistryError::not_found("plc", new.plc_id));
        }
        let record = TagRecord {
            tag_id: inner.next_id(),
            plc_id: new.plc_id,
            name: new.name,
            db_number: new.db_number,
            byte_offset: new.byte_offset,
            data_type: new.data_type,
            can_write: new.can_write,
            scan_rate_ms: new.scan_rate_ms,
            monitor_changes: new.monitor_changes,
            active: new.active,
        };
        inner.tags.insert(record.tag_id, record.clone());
        self.commit(inner);
        Ok(record)
    }

    pub fn list_tags(&self, plc_id: i64) -> Result<Vec<TagRecord>, RegistryError> {
        let inner = self.read_inner()?;
        if !inner.plcs.contains_key(&plc_id) {
            return Err(RegistryError::not_found("plc", plc_id));
        }
        let mut tags: Vec<TagRecord> = inner
            .tags
            .values()
            .filter(|tag| tag.plc_id == plc_id)
            .cloned()
            .collect();
        tags.sort_by_key(|tag| tag.tag_id);
        Ok(tags)
    }

    pub fn find_tag(&self, tag_id: i64) -> Result<TagRecord, RegistryError> {
        let inner = self.read_inner()?;
        inner
            .tags
            .get(&tag_id)
            .cloned()
            .ok_or(RegistryError::not_found("tag", tag_id))
    }

    pub fn update_tag(&self, tag_id: i64, update: TagUpdate) -> Result<TagRecord, RegistryError> {
        let mut inner = self.write_inner()?;
        let current = inner
            .tags
            .get(&tag_id)
            .cloned()
            .ok_or(RegistryError::not_found("tag", tag_id))?;

        let mut next = current.clone();
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(RegistryError::invalid("tag name required"));
            }
            next.name = name;
        }
        if let Some(db_number) = update.db_number {
            next.db_number = db_number;
        }
        if let Some(byte_offset) = update.byte_offset {
            next.byte_offset = byte_offset;
        }
        if let Some(data_type) = update.data_type {
            next.data_type = data_type;
        }
        if let Some(can_write) = update.can_write {
            next.can_write = can_write;
        }
        if let Some(scan_rate_ms) = update.scan_rate_ms {
            next.scan_rate_ms = scan_rate_ms;
        }
        if let Some(monitor_changes) = update.monitor_changes {
            next.monitor_changes = monitor_changes;
        }
        if let Some(active) = update.active {
            next.active = active;
        }
        if next.active && next.scan_rate_ms == 0 {
            return Err(RegistryError::invalid(
                "scan_rate_ms must be > 0 for an active tag",
            ));
        }
        if next.data_type != current.data_type {
            ensure_tag_type_change(&inner, &next)?;
        }
        inner.tags.insert(tag_id, next.clone());
        self.commit(inner);
        Ok(next)
    }

    pub fn delete_tag(&self, tag_id: i64, cascade: bool) -> Result<(), RegistryError> {
        let mut inner = self.write_inner()?;
        if !inner.tags.contains_key(&tag_id) {
            return Err(RegistryError::not_found("tag", tag_id));
        }
        let mapping_count = inner
            .mappings
            .values()
            .filter(|mapping| mapping.tag_id == tag_id)
            .count();
        if mapping_count > 0 && !cascade {
            return Err(RegistryError::conflict(format!(
                "tag {} has {} dependent mappings; delete with cascade",
                tag_id, mapping_count
            )));
        }
        remove_tag_dependents(&mut inner, tag_id);
        inner.tags.remove(&tag_id);
        self.commit(inner);
        Ok(())
    }

    // ---- 目标表 ----

    pub fn create_table(&self, new: NewTable) -> Result<TableRecord, RegistryError> {
        if new.name.trim().is_empty() {
            return Err(RegistryError::invalid("table name required"));
        }
        ensure_retention(new.storage_type, new.retention_days)?;
        let mut inner = self.write_inner()?;
        let record = TableRecord {
            table_id: inner.next_id(),
            name: new.name,
            storage_type: new.storage_type,
            retention_days: new.retention_days,
        };
        inner.tables.insert(record.table_id, record.clone());
        self.commit(inner);
        Ok(record)
    }

    pub fn list_tables(&self) -> Result<Vec<TableRecord>, RegistryError> {
        let inner = self.read_inner()?;
        let mut tables: Vec<TableRecord> = inner.tables.values().cloned().collect();
        tables.sort_by_key(|table| table.table_id);
        Ok(tables)
    }

    pub fn find_table(&self, table_id: i64) -> Result<TableRecord, RegistryError> {
        let inner = self.read_inner()?;
        inner
            .tables
            .get(&table_id)
            .cloned()
            .ok_or(RegistryError::not_found("table", table_id))
    }

    pub fn update_table(
        &self,
        table_id: i64,
        update: TableUpdate,
    ) -> Result<TableRecord, RegistryError> {
        let mut inner = self.write_inner()?;
        let table = inner
            .tables
            .get(&table_id)
            .cloned()
            .ok_or(RegistryError::not_found("table", table_id))?;
        let mut next = table;
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(RegistryError::invalid("table name required"));
            }
            next.name = name;
        }
        if update.retention_days.is_some() {
            next.retention_days = update.retention_days;
        }
        ensure_retention(next.storage_type, next.retention_days)?;
        inner.tables.insert(table_id, next.clone());
        self.commit(inner);
        Ok(next)
    }

    pub fn delete_table(&self, table_id: i64, cascade: bool) -> Result<(), RegistryError> {
        let mut inner = self.write_inner()?;
        if !inner.tables.contains_key(&table_id) {
            return Err(RegistryError::not_found("table", table_id));
        }
        let column_count = inner
            .columns
            .values()
            .filter(|column| column.table_id == table_id)
            .count();
        if column_count > 0 && !cascade {
            return Err(RegistryError::conflict(format!(
                "table {} has {} dependent columns; delete with cascade",
                table_id, column_count
            )));
        }
        inner
            .mappings
            .retain(|_, mapping| mapping.table_id != table_id);
        inner.columns.retain(|_, column| column.table_id != table_id);
        inner.tables.remove(&table_id);
        self.commit(inner);
        Ok(())
    }

    // ---- 列 ----

    pub fn create_column(&self, new: NewColumn) -> Result<ColumnRecord, RegistryError> {
        if new.name.trim().is_empty() {
            return Err(RegistryError::invalid("column name required"));
        }
        let mut inner = self.write_inner()?;
        if !inner.tables.contains_key(&new.table_id) {
            return Err(RegistryError::not_found("table", new.table_id));
        }
        let plc_id = match new.tag_id {
            Some(tag_id) => {
                let tag = inner
                    .tags
                    .get(&tag_id)
                    .ok_or(RegistryError::not_found("tag", tag_id))?;
                if !tag.data_type.compatible_with(new.data_type) {
                    return Err(RegistryError::TypeMismatch {
                        tag_id,
                        tag_type: tag.data_type,
                        column_id: 0,
                        column_type: new.data_type,
                    });
                }
                Some(tag.plc_id)
            }
            None => None,
        };
        if new.is_timestamp {
            if let Some(existing) = inner
                .columns
                .values()
                .find(|column| column.table_id == new.table_id && column.is_timestamp)
            {
                return Err(RegistryError::conflict(format!(
                    "table {} already has timestamp column {}",
                    new.table_id, existing.column_id
                )));
            }
        }
        let record = ColumnRecord {
            column_id: inner.next_id(),
            table_id: new.table_id,
            name: new.name,
            data_type: new.data_type,
            tag_id: new.tag_id,
            plc_id,
            is_timestamp: new.is_timestamp,
        };
        inner.columns.insert(record.column_id, record.clone());
        self.commit(inner);
        Ok(record)
    }

    pub fn list_columns(&self, table_id: i64) -> Result<Vec<ColumnRecord>, RegistryError> {
        let inner = self.read_inner()?;
        if !inner.tables.contains_key(&table_id) {
            return Err(RegistryError::not_found("table", table_id));
        }
        let mut columns: Vec<ColumnRecord> = inner
            .columns
            .values()
            .filter(|column| column.table_id == table_id)
            .cloned()
            .collect();
        columns.sort_by_key(|column| column.column_id);
        Ok(columns)
    }

    pub fn find_column(&self, column_id: i64) -> Result<ColumnRecord, RegistryError> {
        let inner = self.read_inner()?;
        inner
            .columns
            .get(&column_id)
            .cloned()
            .ok_or(RegistryError::not_found("column", column_id))
    }

    pub fn update_column(
        &self,
        column_id: i64,
        update: ColumnUpdate,
    ) -> Result<ColumnRecord, RegistryError> {
        let mut inner = self.write_inner()?;
        let current = inner
            .columns
            .get(&column_id)
            .cloned()
            .ok_or(RegistryError::not_found("column", column_id))?;
        let mut next = current.clone();
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(RegistryError::invalid("column name required"));
            }
            next.name = name;
        }
        if let Some(data_type) = update.data_type {
            next.data_type = data_type;
        }
        if let Some(tag_id) = update.tag_id {
            next.tag_id = tag_id;
        }
        if let Some(is_timestamp) = update.is_timestamp {
            next.is_timestamp = is_timestamp;
        }
        next.plc_id = match next.tag_id {
            Some(tag_id) => {
                let tag = inner
                    .tags
                    .get(&tag_id)
                    .ok_or(RegistryError::not_found("tag", tag_id))?;
                if !tag.data_type.compatible_with(next.data_type) {
                    return Err(RegistryError::TypeMismatch {
                        tag_id,
                        tag_type: tag.data_type,
                        column_id,
                        column_type: next.data_type,
                    });
                }
                Some(tag.plc_id)
            }
            None => None,
        };
        if next.is_timestamp && !current.is_timestamp {
            if let Some(existing) = inner.columns.values().find(|column| {
                column.table_id == next.table_id
                    && column.is_timestamp
                    && column.column_id != column_id
            }) {
                return Err(RegistryError::conflict(format!(
                    "table {} already has timestamp column {}",
                    next.table_id, existing.column_id
                )));
            }
        }
        // 已被映射写入的列不允许改成与映射标签不兼容的类型
        if let Some(mapping) = inner
            .mappings
            .values()
            .find(|mapping| mapping.column_id == column_id)
        {
            if let Some(tag) = inner.tags.get(&mapping.tag_id) {
                if !tag.data_type.compatible_with(next.data_type) {
                    return Err(RegistryError::TypeMismatch {
                        tag_id: tag.tag_id,
                        tag_type: tag.data_type,
                        column_id,
                        column_type: next.data_type,
                    });
                }
            }
        }
        inner.columns.insert(column_id, next.clone());
        self.commit(inner);
        Ok(next)
    }

    pub fn delete_column(&self, column_id: i64) -> Result<(), RegistryError> {
        let mut inner = self.write_inner()?;
        if !inner.columns.contains_key(&column_id) {
            return Err(RegistryError::not_found("column", column_id));
        }
        if inner
            .mappings
            .values()
            .any(|mapping| mapping.column_id == column_id)
        {
            return Err(RegistryError::conflict(format!(
                "column {} is the target of a mapping",
                column_id
            )));
        }
        inner.columns.remove(&column_id);
        self.commit(inner);
        Ok(())
    }

    // ---- 映射 ----

    pub fn create_mapping(&self, new: NewTagMapping) -> Result<TagMappingRecord, RegistryError> {
        let mut inner = self.write_inner()?;
        let tag = inner
            .tags
            .get(&new.tag_id)
            .cloned()
            .ok_or(RegistryError::not_found("tag", new.tag_id))?;
        let table = inner
            .tables
            .get(&new.table_id)
            .cloned()
            .ok_or(RegistryError::not_found("table", new.table_id))?;
        let column = inner
            .columns
            .get(&new.column_id)
            .cloned()
            .ok_or(RegistryError::not_found("column", new.column_id))?;
        if column.table_id != new.table_id {
            return Err(RegistryError::invalid(format!(
                "column {} does not belong to table {}",
                new.column_id, new.table_id
            )));
        }
        if column.is_timestamp {
            return Err(RegistryError::invalid(format!(
                "column {} is the timestamp axis and cannot be a mapping target",
                new.column_id
            )));
        }
        if !tag.data_type.compatible_with(column.data_type) {
            return Err(RegistryError::TypeMismatch {
                tag_id: tag.tag_id,
                tag_type: tag.data_type,
                column_id: column.column_id,
                column_type: column.data_type,
            });
        }
        // 唯一性：同一 (tag, table) 至多一条映射
        if inner
            .mappings
            .values()
            .any(|mapping| mapping.tag_id == new.tag_id && mapping.table_id == new.table_id)
        {
            return Err(RegistryError::conflict(format!(
                "mapping already exists for tag {} and table {}",
                new.tag_id, new.table_id
            )));
        }
        // 写碰撞：每个目标列至多接收一个标签的写入
        if let Some(existing) = inner
            .mappings
            .values()
            .find(|mapping| mapping.column_id == new.column_id)
        {
            return Err(RegistryError::WriteCollision {
                column_id: new.column_id,
                mapping_id: existing.mapping_id,
            });
        }
        let record = TagMappingRecord {
            mapping_id: inner.next_id(),
            tag_id: tag.tag_id,
            plc_id: tag.plc_id,
            table_id: table.table_id,
            column_id: column.column_id,
            storage_type: table.storage_type,
        };
        inner.mappings.insert(record.mapping_id, record.clone());
        self.commit(inner);
        Ok(record)
    }

    pub fn list_mappings(&self) -> Result<Vec<TagMappingRecord>, RegistryError> {
        let inner = self.read_inner()?;
        let mut mappings: Vec<TagMappingRecord> = inner.mappings.values().cloned().collect();
        mappings.sort_by_key(|mapping| mapping.mapping_id);
        Ok(mappings)
    }

    pub fn find_mapping(&self, mapping_id: i64) -> Result<TagMappingRecord, RegistryError> {
        let inner = self.read_inner()?;
        inner
            .mappings
            .get(&mapping_id)
            .cloned()
            .ok_or(RegistryError::not_found("mapping", mapping_id))
    }

    pub fn delete_mapping(&self, mapping_id: i64) -> Result<(), RegistryError> {
        let mut inner = self.write_inner()?;
        if inner.mappings.remove(&mapping_id).is_none() {
            return Err(RegistryError::not_found("mapping", mapping_id));
        }
        self.commit(inner);
        Ok(())
    }

    // ---- 内部 ----

    fn read_inner(&self) -> Result<RwLockReadGuard<'_, Inner>, RegistryError> {
        self.inner
            .read()
            .map_err(|_| RegistryError::Internal("lock poisoned".to_string()))
    }

    fn write_inner(&self) -> Result<RwLockWriteGuard<'_, Inner>, RegistryError> {
        self.inner
            .write()
            .map_err(|_| RegistryError::Internal("lock poisoned".to_string()))
    }

    /// 提交一次配置变更：递增代次并通知下游。
    fn commit(&self, mut inner: RwLockWriteGuard<'_, Inner>) {
        inner.generation += 1;
        let generation = inner.generation;
        drop(inner);
        let _ = self.generation_tx.send_replace(generation);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// 标签改类型时，已绑定/已映射的列必须仍然兼容。
fn ensure_tag_type_change(inner: &Inner, tag: &TagRecord) -> Result<(), RegistryError> {
    for column in inner.columns.values() {
        if column.tag_id == Some(tag.tag_id) && !tag.data_type.compatible_with(column.data_type) {
            return Err(RegistryError::TypeMismatch {
                tag_id: tag.tag_id,
                tag_type: tag.data_type,
                column_id: column.column_id,
                column_type: column.data_type,
            });
        }
    }
    for mapping in inner.mappings.values() {
        if mapping.tag_id != tag.tag_id {
            continue;
        }
        if let Some(column) = inner.columns.get(&mapping.column_id) {
            if !tag.data_type.compatible_with(column.data_type) {
                return Err(RegistryError::TypeMismatch {
                    tag_id: tag.tag_id,
                    tag_type: tag.data_type,
                    column_id: column.column_id,
                    column_type: column.data_type,
                });
            }
        }
    }
    Ok(())
}

/// retention_days 当且仅当 timeseries 时存在且为正。
fn ensure_retention(
    storage_type: StorageType,
    retention_days: Option<u32>,
) -> Result<(), RegistryError> {
    match (storage_type, retention_days) {
        (StorageType::Timeseries, Some(days)) if days > 0 => Ok(()),
        (StorageType::Timeseries, _) => Err(RegistryError::invalid(
            "timeseries table requires positive retention_days",
        )),
        (StorageType::Permanent, None) => Ok(()),
        (StorageType::Permanent, Some(_)) => Err(RegistryError::invalid(
            "permanent table must not carry retention_days",
        )),
    }
}

/// 移除标签的下游引用：映射删除，列绑定清空。
fn remove_tag_dependents(inner: &mut Inner, tag_id: i64) {
    inner.mappings.retain(|_, mapping| mapping.tag_id != tag_id);
    for column in inner.columns.values_mut() {
        if column.tag_id == Some(tag_id) {
            column.tag_id = None;
            column.plc_id = None;
        }
    }
}
