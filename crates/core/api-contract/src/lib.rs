//! 稳定的 DTO 与 API 响应契约。
//!
//! 前端只依赖本 crate 定义的 JSON 形状：
//! - 统一响应封装：ApiResponse / ApiError
//! - 配置实体 DTO：PlcDto、TagDto、TableDto、ColumnDto、TagMappingDto
//! - 数据回读 DTO：PermanentRowDto、SeriesPointDto
//! - 状态推送帧：WsMessage（per-PLC 有序）

use chrono::{DateTime, Utc};
use domain::{PlcStatus, StatusEvent};
use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 将内部 epoch 毫秒时间戳格式化为 RFC 3339 字符串。
pub fn format_ts_ms(ts_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts_ms)
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH)
        .to_rfc3339()
}

/// PLC 创建请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlcRequest {
    pub name: String,
    pub ip_address: String,
    pub rack: u16,
    pub slot: u16,
    pub active: Option<bool>,
}

/// PLC 更新请求体（仅静态配置字段，派生状态不可写）。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlcRequest {
    pub name: Option<String>,
    pub ip_address: Option<String>,
    pub rack: Option<u16>,
    pub slot: Option<u16>,
    pub active: Option<bool>,
}

/// PLC 返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlcDto {
    pub id: i64,
    pub name: String,
    pub ip_address: String,
    pub rack: u16,
    pub slot: u16,
    pub active: bool,
    pub status: String,
    pub last_update: Option<String>,
}

/// 标签创建请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTagRequest {
    pub name: String,
    pub db_number: u32,
    pub byte_offset: u32,
    pub data_type: String,
    pub can_write: Option<bool>,
    pub scan_rate_ms: u64,
    pub monitor_changes: Option<bool>,
    pub active: Option<bool>,
}

/// 标签更新请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTagRequest {
    pub name: Option<String>,
    pub db_number: Option<u32>,
    pub byte_offset: Option<u32>,
    pub data_type: Option<String>,
    pub can_write: Option<bool>,
    pub scan_rate_ms: Option<u64>,
    pub monitor_changes: Option<bool>,
    pub active: Option<bool>,
}

/// 标签返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDto {
    pub id: i64,
    pub plc_id: i64,
    pub name: String,
    pub db_number: u32,
    pub byte_offset: u32,
    pub data_type: String,
    pub can_write: bool,
    pub scan_rate_ms: u64,
    pub monitor_changes: bool,
    pub active: bool,
}

/// 目标表创建请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableRequest {
    pub name: String,
    pub storage_type: String,
    pub retention_days: Option<u32>,
}

/// 目标表更新请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTableRequest {
    pub name: Option<String>,
    pub retention_days: Option<u32>,
}

/// 目标表返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDto {
    pub id: i64,
    pub name: String,
    pub storage_type: String,
    pub retention_days: Option<u32>,
}

/// 列创建请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateColumnRequest {
    pub name: String,
    pub data_type: String,
    pub tag_id: Option<i64>,
    pub is_timestamp: Option<bool>,
}

/// 列更新请求体。
///
/// `tag_id` 三态：字段缺省保持不变，显式 `null` 解除绑定，
/// 给出数值即重绑定。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateColumnRequest {
    pub name: Option<String>,
    pub data_type: Option<String>,
    #[serde(default, deserialize_with = "nullable_field")]
    pub tag_id: Option<Option<i64>>,
    pub is_timestamp: Option<bool>,
}

/// 区分「字段缺省」与「显式 null」：出现即包一层 Some。
fn nullable_field<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

/// 列返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDto {
    pub id: i64,
    pub table_id: i64,
    pub name: String,
    pub data_type: String,
    pub tag_id: Option<i64>,
    pub plc_id: Option<i64>,
    pub is_timestamp: bool,
}

/// 映射创建请求体（plc_id 与 storage_type 由服务端派生）。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTagMappingRequest {
    pub tag_id: i64,
    pub table_id: i64,
    pub column_id: i64,
}

/// 映射返回结构（Tag × PLC × Table × Column 的反规范化读视图）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagMappingDto {
    pub id: i64,
    pub tag_id: i64,
    pub tag_name: String,
    pub plc_id: i64,
    pub plc_name: String,
    pub table_id: i64,
    pub table_name: String,
    pub column_id: i64,
    pub column_name: String,
    pub storage_type: String,
}

/// 永久表单元格（回读用）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermanentCellDto {
    pub column_id: i64,
    pub ts_ms: i64,
    pub value: String,
}

/// 永久表一行（每个标签身份一行）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermanentRowDto {
    pub tag_id: i64,
    pub cells: Vec<PermanentCellDto>,
}

/// 时序表一个采样点（回读用）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPointDto {
    pub column_id: i64,
    pub ts_ms: i64,
    pub value: String,
}

/// 时序范围查询参数。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesQuery {
    pub tag_id: i64,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

/// 手动写标签请求体（仅 can_write 标签，由用户操作触发）。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteTagRequest {
    pub value: serde_json::Value,
}

/// 指标快照返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub scans_total: u64,
    pub scan_failures: u64,
    pub values_emitted: u64,
    pub values_suppressed: u64,
    pub values_dropped: u64,
    pub write_success: u64,
    pub write_retries: u64,
    pub write_losses: u64,
    pub rows_evicted: u64,
    pub status_transitions: u64,
    pub subscriber_overflows: u64,
}

/// 状态推送帧：PLC 状态迁移的线缆形态。
///
/// 同一 plc_id 的帧保持迁移发生次序；跨 PLC 不做承诺。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsMessage {
    pub plc_id: i64,
    pub status: String,
    pub last_update: String,
}

impl WsMessage {
    /// 从内部状态事件构造线缆帧。
    pub fn from_event(event: &StatusEvent) -> Self {
        Self {
            plc_id: event.plc_id,
            status: event.status.as_str().to_string(),
            last_update: format_ts_ms(event.ts_ms),
        }
    }
}

/// PLC 当前状态返回结构（轮询端点用，与 WsMessage 同形）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlcStatusDto {
    pub plc_id: i64,
    pub status: String,
    pub last_update: Option<String>,
}

impl PlcStatusDto {
    pub fn new(plc_id: i64, status: PlcStatus, last_update_ms: Option<i64>) -> Self {
        Self {
            plc_id,
            status: status.as_str().to_string(),
            last_update: last_update_ms.map(format_ts_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{PlcStatus, StatusEvent};

    #[test]
    fn ws_message_serializes_camel_case() {
        let event = StatusEvent {
            plc_id: 7,
            status: PlcStatus::Online,
            ts_ms: 0,
        };
        let json = serde_json::to_value(WsMessage::from_event(&event)).expect("serialize");
        assert_eq!(json["plcId"], 7);
        assert_eq!(json["status"], "online");
        assert_eq!(json["lastUpdate"], "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn column_update_tag_id_distinguishes_null_from_absent() {
        let absent: UpdateColumnRequest = serde_json::from_str(r#"{}"#).expect("deserialize");
        assert_eq!(absent.tag_id, None);

        let unbind: UpdateColumnRequest =
            serde_json::from_str(r#"{"tagId":null}"#).expect("deserialize");
        assert_eq!(unbind.tag_id, Some(None));

        let rebind: UpdateColumnRequest =
            serde_json::from_str(r#"{"tagId":42}"#).expect("deserialize");
        assert_eq!(rebind.tag_id, Some(Some(42)));
    }

    #[test]
    fn api_response_error_shape() {
        let response = ApiResponse::<()>::error("RESOURCE.NOT_FOUND", "not found");
        let json = serde_json::to_value(response).expect("serialize");
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "RESOURCE.NOT_FOUND");
    }
}
