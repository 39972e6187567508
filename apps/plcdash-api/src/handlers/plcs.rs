//! PLC CRUD handlers
//!
//! 提供 PLC 资源的增删改查接口：
//! - GET /plcs - 列出 PLC
//! - POST /plcs - 创建 PLC
//! - GET /plcs/{id} - 获取 PLC 详情
//! - PUT /plcs/{id} - 更新 PLC（仅静态配置字段）
//! - DELETE /plcs/{id}?cascade=true - 删除 PLC（带依赖时必须显式级联）
//! - GET /plcs/{id}/status - 轮询当前连接状态

use crate::AppState;
use crate::utils::response::{plc_to_dto, registry_error};
use api_contract::{ApiResponse, CreatePlcRequest, PlcDto, PlcStatusDto, UpdatePlcRequest};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use plcdash_registry::{NewPlc, PlcUpdate};

#[derive(serde::Deserialize)]
pub struct PlcPath {
    plc_id: i64,
}

#[derive(serde::Deserialize)]
pub struct CascadeQuery {
    #[serde(default)]
    pub cascade: bool,
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

/// 列出 PLC
pub async fn list_plcs(State(state): State<AppState>) -> Response {
    match state.registry.list_plcs() {
        Ok(items) => {
            let data: Vec<PlcDto> = items.into_iter().map(plc_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => registry_error(err),
    }
}

/// 创建 PLC
pub async fn create_plc(
    State(state): State<AppState>,
    Json(req): Json<CreatePlcRequest>,
) -> Response {
    let new = NewPlc {
        name: req.name,
        ip_address: req.ip_address,
        rack: req.rack,
        slot: req.slot,
        active: req.active.unwrap_or(true),
    };
    match state.registry.create_plc(new) {
        Ok(record) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(plc_to_dto(record))),
        )
            .into_response(),
        Err(err) => registry_error(err),
    }
}

/// 获取 PLC 详情
pub async fn get_plc(State(state): State<AppState>, Path(path): Path<PlcPath>) -> Response {
    match state.registry.find_plc(path.plc_id) {
        Ok(record) => (
            StatusCode::OK,
            Json(ApiResponse::success(plc_to_dto(record))),
        )
            .into_response(),
        Err(err) => registry_error(err),
    }
}

/// 更新 PLC（派生状态字段不可经此修改）
pub async fn update_plc(
    State(state): State<AppState>,
    Path(path): Path<PlcPath>,
    Json(req): Json<UpdatePlcRequest>,
) -> Response {
    let update = PlcUpdate {
        name: req.name,
        ip_address: req.ip_address,
        rack: req.rack,
        slot: req.slot,
        active: req.active,
    };
    match state.registry.update_plc(path.plc_id, update) {
        Ok(record) => (
            StatusCode::OK,
            Json(ApiResponse::success(plc_to_dto(record))),
        )
            .into_response(),
        Err(err) => registry_error(err),
    }
}

/// 删除 PLC；仍有标签时必须带 ?cascade=true
pub async fn delete_plc(
    State(state): State<AppState>,
    Path(path): Path<PlcPath>,
    Query(query): Query<CascadeQuery>,
) -> Response {
    match state.registry.delete_plc(path.plc_id, query.cascade) {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::success(()))).into_response(),
        Err(err) => registry_error(err),
    }
}

/// 轮询 PLC 当前连接状态（与 WebSocket 帧同形）
pub async fn get_plc_status(State(state): State<AppState>, Path(path): Path<PlcPath>) -> Response {
    match state.registry.find_plc(path.plc_id) {
        Ok(record) => (
            StatusCode::OK,
            Json(ApiResponse::success(PlcStatusDto::new(
                record.plc_id,
                record.status,
                record.last_update_ms,
            ))),
        )
            .into_response(),
        Err(err) => registry_error(err),
    }
}
