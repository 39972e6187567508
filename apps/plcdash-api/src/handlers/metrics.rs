//! Telemetry 指标快照。
//!
//! - GET /metrics

use api_contract::{ApiResponse, MetricsSnapshotDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use plcdash_telemetry::metrics;

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    (
        StatusCode::OK,
        Json(ApiResponse::success(MetricsSnapshotDto {
            scans_total: snapshot.scans_total,
            scan_failures: snapshot.scan_failures,
            values_emitted: snapshot.values_emitted,
            values_suppressed: snapshot.values_suppressed,
            values_dropped: snapshot.values_dropped,
            write_success: snapshot.write_success,
            write_retries: snapshot.write_retries,
            write_losses: snapshot.write_losses,
            rows_evicted: snapshot.rows_evicted,
            status_transitions: snapshot.status_transitions,
            subscriber_overflows: snapshot.subscriber_overflows,
        })),
    )
        .into_response()
}
