//! 目标表与列 CRUD handlers
//!
//! 提供目标表及其列的增删改查接口：
//! - GET/POST /tables - 列出/创建目标表
//! - GET/PUT/DELETE /tables/{id} - 表详情/更新/删除（storage_type 不可变）
//! - GET/POST /tables/{id}/columns - 列出/创建列
//! - GET/PUT/DELETE /tables/{id}/columns/{cid} - 列详情/更新/删除

use crate::AppState;
use crate::handlers::plcs::CascadeQuery;
use crate::utils::response::{
    bad_request_error, column_to_dto, not_found_error, registry_error, table_to_dto,
};
use api_contract::{
    ApiResponse, ColumnDto, CreateColumnRequest, CreateTableRequest, TableDto, UpdateColumnRequest,
    UpdateTableRequest,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{DataType, StorageType};
use plcdash_registry::{ColumnUpdate, NewColumn, NewTable, TableUpdate};

#[derive(serde::Deserialize)]
pub struct TablePath {
    table_id: i64,
}

#[derive(serde::Deserialize)]
pub struct ColumnPath {
    table_id: i64,
    column_id: i64,
}

/// 列出目标表
pub async fn list_tables(State(state): State<AppState>) -> Response {
    match state.registry.list_tables() {
        Ok(items) => {
            let data: Vec<TableDto> = items.into_iter().map(table_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => registry_error(err),
    }
}

/// 创建目标表
pub async fn create_table(
    State(state): State<AppState>,
    Json(req): Json<CreateTableRequest>,
) -> Response {
    let Some(storage_type) = StorageType::parse(&req.storage_type) else {
        return bad_request_error(format!("unknown storage type: {}", req.storage_type));
    };
    let new = NewTable {
        name: req.name,
        storage_type,
        retention_days: req.retention_days,
    };
    match state.registry.create_table(new) {
        Ok(record) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(table_to_dto(record))),
        )
            .into_response(),
        Err(err) => registry_error(err),
    }
}

/// 获取表详情
pub async fn get_table(State(state): State<AppState>, Path(path): Path<TablePath>) -> Response {
    match state.registry.find_table(path.table_id) {
        Ok(record) => (
            StatusCode::OK,
            Json(ApiResponse::success(table_to_dto(record))),
        )
            .into_response(),
        Err(err) => registry_error(err),
    }
}

/// 更新表（storage_type 创建后不可变，请求体中不接受）
pub async fn update_table(
    State(state): State<AppState>,
    Path(path): Path<TablePath>,
    Json(req): Json<UpdateTableRequest>,
) -> Response {
    let update = TableUpdate {
        name: req.name,
        retention_days: req.retention_days,
    };
    match state.registry.update_table(path.table_id, update) {
        Ok(record) => (
            StatusCode::OK,
            Json(ApiResponse::success(table_to_dto(record))),
        )
            .into_response(),
        Err(err) => registry_error(err),
    }
}

/// 删除表；仍有列或映射时必须带 ?cascade=true
pub async fn delete_table(
    State(state): State<AppState>,
    Path(path): Path<TablePath>,
    Query(query): Query<CascadeQuery>,
) -> Response {
    match state.registry.delete_table(path.table_id, query.cascade) {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::success(()))).into_response(),
        Err(err) => registry_error(err),
    }
}

/// 列出列
pub async fn list_columns(State(state): State<AppState>, Path(path): Path<TablePath>) -> Response {
    match state.registry.list_columns(path.table_id) {
        Ok(items) => {
            let data: Vec<ColumnDto> = items.into_iter().map(column_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => registry_error(err),
    }
}

/// 创建列
pub async fn create_column(
    State(state): State<AppState>,
    Path(path): Path<TablePath>,
    Json(req): Json<CreateColumnRequest>,
) -> Response {
    let Some(data_type) = DataType::parse(&req.data_type) else {
        return bad_request_error(format!("unknown data type: {}", req.data_type));
    };
    let new = NewColumn {
        table_id: path.table_id,
        name: req.name,
        data_type,
        tag_id: req.tag_id,
        is_timestamp: req.is_timestamp.unwrap_or(false),
    };
    match state.registry.create_column(new) {
        Ok(record) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(column_to_dto(record))),
        )
            .into_response(),
        Err(err) => registry_error(err),
    }
}

/// 获取列详情
pub async fn get_column(State(state): State<AppState>, Path(path): Path<ColumnPath>) -> Response {
    match state.registry.find_column(path.column_id) {
        Ok(record) if record.table_id == path.table_id => (
            StatusCode::OK,
            Json(ApiResponse::success(column_to_dto(record))),
        )
            .into_response(),
        Ok(_) => not_found_error(),
        Err(err) => registry_error(err),
    }
}

/// 更新列（tag_id 传值即重绑定，显式 null 解绑，缺省保持不变）
pub async fn update_column(
    State(state): State<AppState>,
    Path(path): Path<ColumnPath>,
    Json(req): Json<UpdateColumnRequest>,
) -> Response {
    let data_type = match req.data_type {
        Some(raw) => match DataType::parse(&raw) {
            Some(parsed) => Some(parsed),
            None => return bad_request_error(format!("unknown data type: {raw}")),
        },
        None => None,
    };
    match state.registry.find_column(path.column_id) {
        Ok(record) if record.table_id == path.table_id => {}
        Ok(_) => return not_found_error(),
        Err(err) => return registry_error(err),
    }
    let update = ColumnUpdate {
        name: req.name,
        data_type,
        tag_id: req.tag_id,
        is_timestamp: req.is_timestamp,
    };
    match state.registry.update_column(path.column_id, update) {
        Ok(record) => (
            StatusCode::OK,
            Json(ApiResponse::success(column_to_dto(record))),
        )
            .into_response(),
        Err(err) => registry_error(err),
    }
}

/// 删除列；被映射引用时返回冲突
pub async fn delete_column(
    State(state): State<AppState>,
    Path(path): Path<ColumnPath>,
) -> Response {
    match state.registry.find_column(path.column_id) {
        Ok(record) if record.table_id == path.table_id => {}
        Ok(_) => return not_found_error(),
        Err(err) => return registry_error(err),
    }
    match state.registry.delete_column(path.column_id) {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::success(()))).into_response(),
        Err(err) => registry_error(err),
    }
}
