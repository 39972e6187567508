//! 内存存储实现
//!
//! 使用 `RwLock` 提供线程安全的内存存储，用于测试和单机部署。

use crate::error::StoreError;
use crate::store::{PermanentCell, PermanentRow, PermanentStore, SeriesSample, TimeseriesStore};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// 永久快照表内存存储。
///
/// 外层按表分桶，内层 `(tag_id, column_id)` 定位单元格；
/// BTreeMap 保证回读时行序与单元格序稳定。
pub struct InMemoryPermanentStore {
    tables: RwLock<HashMap<i64, BTreeMap<(i64, i64), PermanentCell>>>,
}

impl InMemoryPermanentStore {
    /// 创建新的永久表存储
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPermanentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PermanentStore for InMemoryPermanentStore {
    async fn upsert(
        &self,
        table_id: i64,
        tag_id: i64,
        cell: PermanentCell,
    ) -> Result<(), StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::new("lock failed"))?;
        tables
            .entry(table_id)
            .or_default()
            .insert((tag_id, cell.column_id), cell);
        Ok(())
    }

    async fn read_rows(&self, table_id: i64) -> Result<Vec<PermanentRow>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::new("lock failed"))?;
        let Some(cells) = tables.get(&table_id) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<PermanentRow> = Vec::new();
        for ((tag_id, _), cell) in cells {
            match rows.last_mut() {
                Some(row) if row.tag_id == *tag_id => row.cells.push(cell.clone()),
                _ => rows.push(PermanentRow {
                    tag_id: *tag_id,
                    cells: vec![cell.clone()],
                }),
            }
        }
        Ok(rows)
    }
}

/// 时序表内存存储。
pub struct InMemoryTimeseriesStore {
    tables: RwLock<HashMap<i64, Vec<SeriesSample>>>,
}

impl InMemoryTimeseriesStore {
    /// 创建新的时序表存储
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// 获取某表当前累计的采样点数量（用于测试）
    pub fn len(&self, table_id: i64) -> usize {
        self.tables
            .read()
            .ok()
            .and_then(|t| t.get(&table_id).map(|s| s.len()))
            .unwrap_or(0)
    }
}

impl Default for InMemoryTimeseriesStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TimeseriesStore for InMemoryTimeseriesStore {
    async fn append(&self, table_id: i64, sample: SeriesSample) -> Result<(), StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::new("lock failed"))?;
        tables.entry(table_id).or_default().push(sample);
        Ok(())
    }

    async fn evict_older_than(&self, table_id: i64, cutoff_ms: i64) -> Result<u64, StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::new("lock failed"))?;
        let Some(samples) = tables.get_mut(&table_id) else {
            return Ok(0);
        };
        let before = samples.len();
        samples.retain(|s| s.ts_ms >= cutoff_ms);
        Ok((before - samples.len()) as u64)
    }

    async fn query_range(
        &self,
        table_id: i64,
        tag_id: i64,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<Vec<SeriesSample>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::new("lock failed"))?;
        let mut result: Vec<SeriesSample> = tables
            .get(&table_id)
            .map(|samples| {
                samples
                    .iter()
                    .filter(|s| s.tag_id == tag_id && s.ts_ms >= from_ms && s.ts_ms <= to_ms)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        result.sort_by_key(|s| s.ts_ms);
        Ok(result)
    }
}
