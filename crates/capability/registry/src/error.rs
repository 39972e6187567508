//! 注册表错误类型
//!
//! 配置类错误同步返回给 CRUD 调用方，从不导致服务崩溃：
//! - NotFound：引用了不存在的实体（悬空外键）
//! - Conflict：唯一性不变量被破坏（重复映射、重复时间轴列、带依赖删除）
//! - TypeMismatch：标签与列的数据类型不兼容
//! - WriteCollision：两个映射写同一目标列
//! - Invalid：字段级校验失败（scan_rate、retention_days 等）

use domain::DataType;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("tag {tag_id} type {tag_type} incompatible with column {column_id} type {column_type}")]
    TypeMismatch {
        tag_id: i64,
        tag_type: DataType,
        column_id: i64,
        column_type: DataType,
    },
    #[error("column {column_id} already written by mapping {mapping_id}")]
    WriteCollision { column_id: i64, mapping_id: i64 },
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RegistryError {
    pub fn not_found(kind: &'static str, id: i64) -> Self {
        RegistryError::NotFound { kind, id }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        RegistryError::Conflict(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        RegistryError::Invalid(message.into())
    }
}
