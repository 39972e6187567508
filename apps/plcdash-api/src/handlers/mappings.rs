//! 映射 CRUD handlers
//!
//! 提供标签到目标列映射的管理接口：
//! - GET /mappings - 列出映射（反规范化读视图）
//! - POST /mappings - 创建映射（类型兼容、唯一性、写冲突在注册表侧校验）
//! - GET /mappings/{id} - 获取映射详情
//! - DELETE /mappings/{id} - 删除映射

use crate::AppState;
use crate::utils::response::{mapping_to_dto, registry_error};
use api_contract::{ApiResponse, CreateTagMappingRequest, TagMappingDto};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use plcdash_registry::NewTagMapping;

#[derive(serde::Deserialize)]
pub struct MappingPath {
    mapping_id: i64,
}

/// 列出映射
pub async fn list_mappings(State(state): State<AppState>) -> Response {
    let records = match state.registry.list_mappings() {
        Ok(records) => records,
        Err(err) => return registry_error(err),
    };
    let mut data: Vec<TagMappingDto> = Vec::with_capacity(records.len());
    for record in records {
        match mapping_to_dto(&state.registry, record) {
            Ok(dto) => data.push(dto),
            Err(err) => return registry_error(err),
        }
    }
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// 创建映射
pub async fn create_mapping(
    State(state): State<AppState>,
    Json(req): Json<CreateTagMappingRequest>,
) -> Response {
    let new = NewTagMapping {
        tag_id: req.tag_id,
        table_id: req.table_id,
        column_id: req.column_id,
    };
    let record = match state.registry.create_mapping(new) {
        Ok(record) => record,
        Err(err) => return registry_error(err),
    };
    match mapping_to_dto(&state.registry, record) {
        Ok(dto) => (StatusCode::CREATED, Json(ApiResponse::success(dto))).into_response(),
        Err(err) => registry_error(err),
    }
}

/// 获取映射详情
pub async fn get_mapping(State(state): State<AppState>, Path(path): Path<MappingPath>) -> Response {
    let record = match state.registry.find_mapping(path.mapping_id) {
        Ok(record) => record,
        Err(err) => return registry_error(err),
    };
    match mapping_to_dto(&state.registry, record) {
        Ok(dto) => (StatusCode::OK, Json(ApiResponse::success(dto))).into_response(),
        Err(err) => registry_error(err),
    }
}

/// 删除映射
pub async fn delete_mapping(
    State(state): State<AppState>,
    Path(path): Path<MappingPath>,
) -> Response {
    match state.registry.delete_mapping(path.mapping_id) {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::success(()))).into_response(),
        Err(err) => registry_error(err),
    }
}
