//! 数据回读 handlers
//!
//! 面向 UI 的落库数据查询：
//! - GET /tables/{id}/rows - 永久表当前行（每个标签身份一行）
//! - GET /tables/{id}/series?tagId=&fromMs=&toMs= - 时序表范围查询

use crate::AppState;
use crate::utils::response::{bad_request_error, registry_error, store_error};
use api_contract::{ApiResponse, PermanentCellDto, PermanentRowDto, SeriesPointDto, SeriesQuery};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::StorageType;
use plcdash_router::{PermanentStore, TimeseriesStore};

#[derive(serde::Deserialize)]
pub struct DataTablePath {
    table_id: i64,
}

/// 读永久表当前行
pub async fn read_rows(State(state): State<AppState>, Path(path): Path<DataTablePath>) -> Response {
    let table = match state.registry.find_table(path.table_id) {
        Ok(table) => table,
        Err(err) => return registry_error(err),
    };
    if table.storage_type != StorageType::Permanent {
        return bad_request_error("rows endpoint only serves permanent tables");
    }
    match state.permanent.read_rows(path.table_id).await {
        Ok(rows) => {
            let data: Vec<PermanentRowDto> = rows
                .into_iter()
                .map(|row| PermanentRowDto {
                    tag_id: row.tag_id,
                    cells: row
                        .cells
                        .into_iter()
                        .map(|cell| PermanentCellDto {
                            column_id: cell.column_id,
                            ts_ms: cell.ts_ms,
                            value: cell.value.to_display_string(),
                        })
                        .collect(),
                })
                .collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => store_error(err),
    }
}

/// 读时序表范围数据
pub async fn read_series(
    State(state): State<AppState>,
    Path(path): Path<DataTablePath>,
    Query(query): Query<SeriesQuery>,
) -> Response {
    let table = match state.registry.find_table(path.table_id) {
        Ok(table) => table,
        Err(err) => return registry_error(err),
    };
    if table.storage_type != StorageType::Timeseries {
        return bad_request_error("series endpoint only serves timeseries tables");
    }
    let from_ms = query.from_ms.unwrap_or(0);
    let to_ms = query.to_ms.unwrap_or(i64::MAX);
    if from_ms > to_ms {
        return bad_request_error("fromMs must not exceed toMs");
    }
    match state
        .timeseries
        .query_range(path.table_id, query.tag_id, from_ms, to_ms)
        .await
    {
        Ok(samples) => {
            let data: Vec<SeriesPointDto> = samples
                .into_iter()
                .map(|sample| SeriesPointDto {
                    column_id: sample.column_id,
                    ts_ms: sample.ts_ms,
                    value: sample.value.to_display_string(),
                })
                .collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => store_error(err),
    }
}
