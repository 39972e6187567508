//! HTTP 响应辅助函数和 DTO 转换
//!
//! 提供统一的错误响应构造函数和 DTO 转换函数：
//! - 错误映射：registry_error（注册表错误 → HTTP 状态码 + 错误码）
//! - 存储错误：store_error（一律 500）
//! - DTO 转换：plc_to_dto, tag_to_dto, table_to_dto, column_to_dto, mapping_to_dto
//!
//! 状态码约定：
//! - NotFound → 404，Conflict / WriteCollision → 409
//! - Invalid / TypeMismatch → 400，Internal → 500

use api_contract::{
    ApiResponse, ColumnDto, PlcDto, TableDto, TagDto, TagMappingDto, format_ts_ms,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use plcdash_registry::{
    ColumnRecord, PlcRecord, Registry, RegistryError, TableRecord, TagMappingRecord, TagRecord,
};
use plcdash_router::StoreError;

/// 注册表错误响应
pub fn registry_error(err: RegistryError) -> Response {
    let (status, code) = match &err {
        RegistryError::NotFound { .. } => (StatusCode::NOT_FOUND, "RESOURCE.NOT_FOUND"),
        RegistryError::Conflict(_) => (StatusCode::CONFLICT, "CONFIG.CONFLICT"),
        RegistryError::WriteCollision { .. } => (StatusCode::CONFLICT, "CONFIG.WRITE_COLLISION"),
        RegistryError::TypeMismatch { .. } => (StatusCode::BAD_REQUEST, "CONFIG.TYPE_MISMATCH"),
        RegistryError::Invalid(_) => (StatusCode::BAD_REQUEST, "INVALID.REQUEST"),
        RegistryError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL.ERROR"),
    };
    (
        status,
        Json(ApiResponse::<()>::error(code, err.to_string())),
    )
        .into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("INVALID.REQUEST", message.into())),
    )
        .into_response()
}

/// 资源未找到错误响应
pub fn not_found_error() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error("RESOURCE.NOT_FOUND", "not found")),
    )
        .into_response()
}

/// 存储错误响应
pub fn store_error(err: StoreError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error("INTERNAL.ERROR", err.to_string())),
    )
        .into_response()
}

pub fn plc_to_dto(record: PlcRecord) -> PlcDto {
    PlcDto {
        id: record.plc_id,
        name: record.name,
        ip_address: record.ip_address,
        rack: record.rack,
        slot: record.slot,
        active: record.active,
        status: record.status.as_str().to_string(),
        last_update: record.last_update_ms.map(format_ts_ms),
    }
}

pub fn tag_to_dto(record: TagRecord) -> TagDto {
    TagDto {
        id: record.tag_id,
        plc_id: record.plc_id,
        name: record.name,
        db_number: record.db_number,
        byte_offset: record.byte_offset,
        data_type: record.data_type.as_str().to_string(),
        can_write: record.can_write,
        scan_rate_ms: record.scan_rate_ms,
        monitor_changes: record.monitor_changes,
        active: record.active,
    }
}

pub fn table_to_dto(record: TableRecord) -> TableDto {
    TableDto {
        id: record.table_id,
        name: record.name,
        storage_type: record.storage_type.as_str().to_string(),
        retention_days: record.retention_days,
    }
}

pub fn column_to_dto(record: ColumnRecord) -> ColumnDto {
    ColumnDto {
        id: record.column_id,
        table_id: record.table_id,
        name: record.name,
        data_type: record.data_type.as_str().to_string(),
        tag_id: record.tag_id,
        plc_id: record.plc_id,
        is_timestamp: record.is_timestamp,
    }
}

/// 映射读视图：补齐四方名称（Tag × PLC × Table × Column）
pub fn mapping_to_dto(
    registry: &Registry,
    record: TagMappingRecord,
) -> Result<TagMappingDto, RegistryError> {
    let tag = registry.find_tag(record.tag_id)?;
    let plc = registry.find_plc(record.plc_id)?;
    let table = registry.find_table(record.table_id)?;
    let column = registry.find_column(record.column_id)?;
    Ok(TagMappingDto {
        id: record.mapping_id,
        tag_id: record.tag_id,
        tag_name: tag.name,
        plc_id: record.plc_id,
        plc_name: plc.name,
        table_id: record.table_id,
        table_name: table.name,
        column_id: record.column_id,
        column_name: column.name,
        storage_type: record.storage_type.as_str().to_string(),
    })
}
