//! 标签 CRUD handlers
//!
//! 提供标签资源的增删改查接口：
//! - GET /plcs/{id}/tags - 列出标签
//! - POST /plcs/{id}/tags - 创建标签（需验证 PLC 存在）
//! - GET /plcs/{id}/tags/{tid} - 获取标签详情
//! - PUT /plcs/{id}/tags/{tid} - 更新标签
//! - DELETE /plcs/{id}/tags/{tid}?cascade=true - 删除标签（有映射时必须显式级联）

use crate::AppState;
use crate::handlers::plcs::CascadeQuery;
use crate::utils::response::{bad_request_error, not_found_error, registry_error, tag_to_dto};
use api_contract::{ApiResponse, CreateTagRequest, TagDto, UpdateTagRequest};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::DataType;
use plcdash_registry::{NewTag, TagUpdate};

#[derive(serde::Deserialize)]
pub struct TagPath {
    plc_id: i64,
    tag_id: i64,
}

#[derive(serde::Deserialize)]
pub struct TagsPath {
    plc_id: i64,
}

/// 列出标签
pub async fn list_tags(State(state): State<AppState>, Path(path): Path<TagsPath>) -> Response {
    match state.registry.list_tags(path.plc_id) {
        Ok(items) => {
            let data: Vec<TagDto> = items.into_iter().map(tag_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => registry_error(err),
    }
}

/// 创建标签
pub async fn create_tag(
    State(state): State<AppState>,
    Path(path): Path<TagsPath>,
    Json(req): Json<CreateTagRequest>,
) -> Response {
    let Some(data_type) = DataType::parse(&req.data_type) else {
        return bad_request_error(format!("unknown data type: {}", req.data_type));
    };
    let new = NewTag {
        plc_id: path.plc_id,
        name: req.name,
        db_number: req.db_number,
        byte_offset: req.byte_offset,
        data_type,
        can_write: req.can_write.unwrap_or(false),
        scan_rate_ms: req.scan_rate_ms,
        monitor_changes: req.monitor_changes.unwrap_or(false),
        active: req.active.unwrap_or(true),
    };
    match state.registry.create_tag(new) {
        Ok(record) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(tag_to_dto(record))),
        )
            .into_response(),
        Err(err) => registry_error(err),
    }
}

/// 获取标签详情
pub async fn get_tag(State(state): State<AppState>, Path(path): Path<TagPath>) -> Response {
    match state.registry.find_tag(path.tag_id) {
        Ok(record) if record.plc_id == path.plc_id => (
            StatusCode::OK,
            Json(ApiResponse::success(tag_to_dto(record))),
        )
            .into_response(),
        Ok(_) => not_found_error(),
        Err(err) => registry_error(err),
    }
}

/// 更新标签
pub async fn update_tag(
    State(state): State<AppState>,
    Path(path): Path<TagPath>,
    Json(req): Json<UpdateTagRequest>,
) -> Response {
    let data_type = match req.data_type {
        Some(raw) => match DataType::parse(&raw) {
            Some(parsed) => Some(parsed),
            None => return bad_request_error(format!("unknown data type: {raw}")),
        },
        None => None,
    };
    match state.registry.find_tag(path.tag_id) {
        Ok(record) if record.plc_id == path.plc_id => {}
        Ok(_) => return not_found_error(),
        Err(err) => return registry_error(err),
    }
    let update = TagUpdate {
        name: req.name,
        db_number: req.db_number,
        byte_offset: req.byte_offset,
        data_type,
        can_write: req.can_write,
        scan_rate_ms: req.scan_rate_ms,
        monitor_changes: req.monitor_changes,
        active: req.active,
    };
    match state.registry.update_tag(path.tag_id, update) {
        Ok(record) => (
            StatusCode::OK,
            Json(ApiResponse::success(tag_to_dto(record))),
        )
            .into_response(),
        Err(err) => registry_error(err),
    }
}

/// 删除标签；仍有映射时必须带 ?cascade=true
pub async fn delete_tag(
    State(state): State<AppState>,
    Path(path): Path<TagPath>,
    Query(query): Query<CascadeQuery>,
) -> Response {
    match state.registry.find_tag(path.tag_id) {
        Ok(record) if record.plc_id == path.plc_id => {}
        Ok(_) => return not_found_error(),
        Err(err) => return registry_error(err),
    }
    match state.registry.delete_tag(path.tag_id, query.cascade) {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::success(()))).into_response(),
        Err(err) => registry_error(err),
    }
}
