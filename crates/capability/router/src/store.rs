//! 存储接口抽象。
//!
//! 两类目标表各一个异步 Trait：永久快照表按标签身份就地覆盖，
//! 时序表只追加并支持按时间淘汰。后端实现对路由任务不透明。

use crate::error::StoreError;
use async_trait::async_trait;
use domain::TagValueData;

/// 永久表一个单元格（某标签在某列的最新值）。
#[derive(Debug, Clone, PartialEq)]
pub struct PermanentCell {
    pub column_id: i64,
    pub ts_ms: i64,
    pub value: TagValueData,
}

/// 永久表一行：每个标签身份恰好一行。
#[derive(Debug, Clone)]
pub struct PermanentRow {
    pub tag_id: i64,
    pub cells: Vec<PermanentCell>,
}

/// 时序表一个采样点。
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSample {
    pub column_id: i64,
    pub tag_id: i64,
    pub ts_ms: i64,
    pub value: TagValueData,
}

/// 永久快照表存储。
#[async_trait]
pub trait PermanentStore: Send + Sync {
    /// 就地覆盖某标签在某列的值（幂等，不产生新行）。
    async fn upsert(
        &self,
        table_id: i64,
        tag_id: i64,
        cell: PermanentCell,
    ) -> Result<(), StoreError>;

    /// 回读整表当前行（行序按 tag_id 升序）。
    async fn read_rows(&self, table_id: i64) -> Result<Vec<PermanentRow>, StoreError>;
}

/// 时序表存储。
#[async_trait]
pub trait TimeseriesStore: Send + Sync {
    /// 追加一个采样点。
    async fn append(&self, table_id: i64, sample: SeriesSample) -> Result<(), StoreError>;

    /// 淘汰早于 cutoff 的采样点，返回删除条数。
    async fn evict_older_than(&self, table_id: i64, cutoff_ms: i64) -> Result<u64, StoreError>;

    /// 按标签回读时间范围内的采样点（闭区间，按 ts 升序）。
    async fn query_range(
        &self,
        table_id: i64,
        tag_id: i64,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<Vec<SeriesSample>, StoreError>;
}
