//! 手动写标签 handler
//!
//! - POST /plcs/{id}/tags/{tid}/write - 把用户操作转发给 PLC 驱动
//!
//! 只允许 can_write 标签；值按标签声明的数据类型解析，
//! 解析失败返回 400，不触达驱动。

use crate::AppState;
use crate::utils::response::{bad_request_error, not_found_error, registry_error};
use api_contract::{ApiResponse, WriteTagRequest};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{DataType, TagValueData};
use plcdash_scheduler::PlcReader;

#[derive(serde::Deserialize)]
pub struct WritePath {
    plc_id: i64,
    tag_id: i64,
}

/// 按标签数据类型解析 JSON 值。
fn parse_value(data_type: DataType, raw: &serde_json::Value) -> Option<TagValueData> {
    match data_type {
        DataType::Bool => raw.as_bool().map(TagValueData::Bool),
        DataType::Int => raw.as_i64().map(TagValueData::I64),
        DataType::Float => raw.as_f64().map(TagValueData::F64),
        DataType::String => raw.as_str().map(|s| TagValueData::String(s.to_string())),
    }
}

/// 写标签
pub async fn write_tag(
    State(state): State<AppState>,
    Path(path): Path<WritePath>,
    Json(req): Json<WriteTagRequest>,
) -> Response {
    let plc = match state.registry.find_plc(path.plc_id) {
        Ok(plc) => plc,
        Err(err) => return registry_error(err),
    };
    let tag = match state.registry.find_tag(path.tag_id) {
        Ok(tag) if tag.plc_id == path.plc_id => tag,
        Ok(_) => return not_found_error(),
        Err(err) => return registry_error(err),
    };
    if !tag.can_write {
        return bad_request_error("tag is not writable");
    }
    let Some(value) = parse_value(tag.data_type, &req.value) else {
        return bad_request_error(format!(
            "value does not match tag type {}",
            tag.data_type.as_str()
        ));
    };
    match state.reader.write_tag(&plc, &tag, value).await {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::success(()))).into_response(),
        Err(err) => (
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::<()>::error("PLC.WRITE_FAILED", err.to_string())),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_value;
    use domain::{DataType, TagValueData};

    #[test]
    fn parse_value_respects_tag_type() {
        let value = serde_json::json!(42);
        assert_eq!(
            parse_value(DataType::Int, &value),
            Some(TagValueData::I64(42))
        );
        assert_eq!(parse_value(DataType::String, &value), None);
        assert_eq!(
            parse_value(DataType::Float, &serde_json::json!(1.5)),
            Some(TagValueData::F64(1.5))
        );
        assert_eq!(parse_value(DataType::Bool, &serde_json::json!("yes")), None);
    }
}
