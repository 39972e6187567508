//! PLC 读写能力抽象。
//!
//! 物理协议驱动是外部协作者，这里只定义"读一个标签 / 写一个标签"
//! 的不透明接口。写入仅在 `Tag.can_write` 且由用户操作触发时调用，
//! 调度器本身从不写。

use async_trait::async_trait;
use domain::{ReadOutcome, TagValueData};
use plcdash_registry::{PlcRecord, TagRecord};

/// PLC I/O 错误（可恢复，驱动状态迁移，不会致命）。
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("read timed out")]
    Timeout,
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl ReadError {
    /// 归并为健康信号分类。
    pub fn outcome(&self) -> ReadOutcome {
        match self {
            ReadError::Timeout => ReadOutcome::Timeout,
            ReadError::ConnectionLost(_) | ReadError::Unsupported(_) => ReadOutcome::ConnectionLost,
        }
    }
}

/// 外部 PLC 读写能力。
#[async_trait]
pub trait PlcReader: Send + Sync {
    /// 读取一个标签的当前值。
    async fn read_tag(&self, plc: &PlcRecord, tag: &TagRecord)
    -> Result<TagValueData, ReadError>;

    /// 写入一个标签（仅 can_write 标签，由用户操作转发）。
    async fn write_tag(
        &self,
        plc: &PlcRecord,
        tag: &TagRecord,
        value: TagValueData,
    ) -> Result<(), ReadError>;
}

/// 空驱动（未接入协议驱动时的占位，所有操作报断连）。
#[derive(Debug, Default)]
pub struct NoopReader;

#[async_trait]
impl PlcReader for NoopReader {
    async fn read_tag(
        &self,
        _plc: &PlcRecord,
        _tag: &TagRecord,
    ) -> Result<TagValueData, ReadError> {
        Err(ReadError::ConnectionLost("no driver attached".to_string()))
    }

    async fn write_tag(
        &self,
        _plc: &PlcRecord,
        _tag: &TagRecord,
        _value: TagValueData,
    ) -> Result<(), ReadError> {
        Err(ReadError::ConnectionLost("no driver attached".to_string()))
    }
}
