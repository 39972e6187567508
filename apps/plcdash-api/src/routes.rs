//! 路由定义
//!
//! 集中管理所有 API 路由，将路径映射到对应的 handlers。
//! 路由包括：
//! - 健康检查：/health
//! - PLC 管理：/plcs/*（含 /plcs/{id}/status 轮询端点）
//! - 标签管理：/plcs/{id}/tags/*、手动写入 /plcs/{id}/tags/{tid}/write
//! - 目标表管理：/tables/*、列管理 /tables/{id}/columns/*
//! - 映射管理：/mappings/*
//! - 数据回读：/tables/{id}/rows、/tables/{id}/series
//! - 状态推送：/ws/status
//! - 指标快照：/metrics

use super::AppState;
use super::handlers::*;
use axum::{
    Router,
    routing::{get, post},
};

/// 创建 API 路由
///
/// 返回包含所有 API 端点的 Router，支持 / 和 /api/ 两种前缀
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/plcs", get(list_plcs).post(create_plc))
        .route(
            "/plcs/:plc_id",
            get(get_plc).put(update_plc).delete(delete_plc),
        )
        .route("/plcs/:plc_id/status", get(get_plc_status))
        .route("/plcs/:plc_id/tags", get(list_tags).post(create_tag))
        .route(
            "/plcs/:plc_id/tags/:tag_id",
            get(get_tag).put(update_tag).delete(delete_tag),
        )
        .route("/plcs/:plc_id/tags/:tag_id/write", post(write_tag))
        .route("/tables", get(list_tables).post(create_table))
        .route(
            "/tables/:table_id",
            get(get_table).put(update_table).delete(delete_table),
        )
        .route(
            "/tables/:table_id/columns",
            get(list_columns).post(create_column),
        )
        .route(
            "/tables/:table_id/columns/:column_id",
            get(get_column).put(update_column).delete(delete_column),
        )
        .route("/tables/:table_id/rows", get(read_rows))
        .route("/tables/:table_id/series", get(read_series))
        .route("/mappings", get(list_mappings).post(create_mapping))
        .route(
            "/mappings/:mapping_id",
            get(get_mapping).delete(delete_mapping),
        )
        .route("/ws/status", get(ws_status))
}
