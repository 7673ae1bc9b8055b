pub mod generate;
pub mod keys;
pub mod schedule;
pub mod video;
pub mod youtube;


use axum::Json;
use axum::http::StatusCode;

pub(crate) type ApiResponse = (StatusCode, Json<serde_json::Value>);

pub(crate) fn ok(value: serde_json::Value) -> ApiResponse {
    (StatusCode::OK, Json(value))
}

pub(crate) fn bad_request(message: impl std::fmt::Display) -> ApiResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "success": false, "error": message.to_string() })),
    )
}

pub(crate) fn server_error(message: impl std::fmt::Display) -> ApiResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "success": false, "error": message.to_string() })),
    )
}

/// Pull a required string field out of a loosely-typed request body.
pub(crate) fn required_field<'a>(
    payload: &'a serde_json::Value,
    field: &str,
) -> Result<&'a str, ApiResponse> {
    payload
        .get(field)
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request(format!("Missing required field '{}'", field)))
}

/// Like [required_field] but tolerant of legacy spellings (callers send both
/// `file_name` and `filename` in the wild). The first name is canonical.
pub(crate) fn required_field_aliased<'a>(
    payload: &'a serde_json::Value,
    names: &[&str],
) -> Result<&'a str, ApiResponse> {
    for name in names {
        if let Some(value) = payload
            .get(name)
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
        {
            return Ok(value);
        }
    }
    Err(bad_request(format!("Missing required field '{}'", names[0])))
}
