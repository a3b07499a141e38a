use axum::{http::StatusCode, response::Json};
use serde_json::{Value, json};

/// Health check handler
/// Reports that the gateway process is up; collaborators are not probed here.
pub async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(json!({
        "status": "OK"
    })))
}
