//! 映射编译器：把 TagMapping 行编译成可执行路由表。
//!
//! 校验全部发生在编译期（快照变化时整体重跑），热路径上
//! 路由查询是纯只读哈希查找。编译是原子的：要么整张新表
//! 替换旧表，要么保留旧表继续生效（陈旧但有效优于损坏）。

use domain::StorageType;
use plcdash_registry::RegistrySnapshot;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::warn;

/// 映射编译错误。编译失败只上报，不影响运行中的旧路由表。
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("mapping {mapping_id}: tag {tag_id} type incompatible with column {column_id}")]
    TypeMismatch {
        mapping_id: i64,
        tag_id: i64,
        column_id: i64,
    },
    #[error("column {column_id} targeted by mappings {first_mapping} and {second_mapping}")]
    WriteCollision {
        column_id: i64,
        first_mapping: i64,
        second_mapping: i64,
    },
    #[error("timeseries table {table_id} has no timestamp column")]
    MissingTimestampColumn { table_id: i64 },
    #[error("timeseries table {table_id} has invalid retention_days")]
    InvalidRetention { table_id: i64 },
    #[error("mapping {mapping_id} references missing {kind} {id}")]
    DanglingReference {
        mapping_id: i64,
        kind: &'static str,
        id: i64,
    },
}

/// 一条路由目标：值要落进哪张表的哪一列。
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTarget {
    pub table_id: i64,
    pub column_id: i64,
    pub storage_type: StorageType,
    pub retention_days: Option<u32>,
    /// timeseries 目标的时间轴列（永久表为 None）。
    pub timestamp_column_id: Option<i64>,
}

/// 时序表的保留期规则（清扫任务消费）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionRule {
    pub table_id: i64,
    pub retention_days: u32,
}

/// 编译产物：不可变路由表。
#[derive(Debug, Default)]
pub struct RoutingTable {
    pub generation: u64,
    routes: HashMap<i64, Vec<RouteTarget>>,
    retention: Vec<RetentionRule>,
}

impl RoutingTable {
    /// 标签的路由目标。无路由的标签返回 None（值被读取后丢弃，非错误）。
    pub fn routes_for(&self, tag_id: i64) -> Option<&[RouteTarget]> {
        self.routes.get(&tag_id).map(|targets| targets.as_slice())
    }

    pub fn retention_rules(&self) -> &[RetentionRule] {
        &self.retention
    }

    pub fn route_count(&self) -> usize {
        self.routes.values().map(|targets| targets.len()).sum()
    }
}

/// 从注册表快照编译路由表。
pub fn compile(snapshot: &RegistrySnapshot) -> Result<RoutingTable, CompileError> {
    let mut routes: HashMap<i64, Vec<RouteTarget>> = HashMap::new();
    let mut column_owner: HashMap<i64, i64> = HashMap::new();
    let mut retention: HashMap<i64, u32> = HashMap::new();

    let mut mappings: Vec<_> = snapshot.mappings.values().collect();
    mappings.sort_by_key(|mapping| mapping.mapping_id);

    for mapping in mappings {
        let tag = snapshot.tags.get(&mapping.tag_id).ok_or(
            CompileError::DanglingReference {
                mapping_id: mapping.mapping_id,
                kind: "tag",
                id: mapping.tag_id,
            },
        )?;
        let table = snapshot.tables.get(&mapping.table_id).ok_or(
            CompileError::DanglingReference {
                mapping_id: mapping.mapping_id,
                kind: "table",
                id: mapping.table_id,
            },
        )?;
        let column = snapshot.columns.get(&mapping.column_id).ok_or(
            CompileError::DanglingReference {
                mapping_id: mapping.mapping_id,
                kind: "column",
                id: mapping.column_id,
            },
        )?;

        if !tag.data_type.compatible_with(column.data_type) {
            return Err(CompileError::TypeMismatch {
                mapping_id: mapping.mapping_id,
                tag_id: tag.tag_id,
                column_id: column.column_id,
            });
        }
        if let Some(first) = column_owner.insert(column.column_id, mapping.mapping_id) {
            return Err(CompileError::WriteCollision {
                column_id: column.column_id,
                first_mapping: first,
                second_mapping: mapping.mapping_id,
            });
        }

        let timestamp_column_id = match table.storage_type {
            StorageType::Timeseries => {
                let days = match table.retention_days {
                    Some(days) if days > 0 => days,
                    _ => {
                        return Err(CompileError::InvalidRetention {
                            table_id: table.table_id,
                        });
                    }
                };
                retention.insert(table.table_id, days);
                let ts_column = snapshot.timestamp_column_of(table.table_id).ok_or(
                    CompileError::MissingTimestampColumn {
                        table_id: table.table_id,
                    },
                )?;
                Some(ts_column.column_id)
            }
            StorageType::Permanent => None,
        };

        routes.entry(tag.tag_id).or_default().push(RouteTarget {
            table_id: table.table_id,
            column_id: column.column_id,
            storage_type: table.storage_type,
            retention_days: table.retention_days,
            timestamp_column_id,
        });
    }

    let mut retention: Vec<RetentionRule> = retention
        .into_iter()
        .map(|(table_id, retention_days)| RetentionRule {
            table_id,
            retention_days,
        })
        .collect();
    retention.sort_by_key(|rule| rule.table_id);

    Ok(RoutingTable {
        generation: snapshot.generation,
        routes,
        retention,
    })
}

/// 当前生效路由表的共享句柄（写时复制，读取方永远看到完整的表）。
#[derive(Clone)]
pub struct SharedRouting {
    current: Arc<RwLock<Arc<RoutingTable>>>,
}

impl SharedRouting {
    pub fn new(table: RoutingTable) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    /// 当前路由表（廉价的 Arc 克隆）。
    pub fn current(&self) -> Arc<RoutingTable> {
        self.current
            .read()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_default()
    }

    /// 原子替换为新表。
    pub fn install(&self, table: RoutingTable) {
        if let Ok(mut guard) = self.current.write() {
            *guard = Arc::new(table);
        }
    }

    /// 用新快照重编译；失败时保留旧表并告警。
    pub fn recompile_from(&self, snapshot: &RegistrySnapshot) -> Result<(), CompileError> {
        match compile(snapshot) {
            Ok(table) => {
                self.install(table);
                Ok(())
            }
            Err(err) => {
                warn!(generation = snapshot.generation, error = %err, "routing compile failed; previous table stays in effect");
                Err(err)
            }
        }
    }
}
