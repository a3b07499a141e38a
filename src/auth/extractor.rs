use axum::http::HeaderMap;

pub const DEVICE_ID_HEADER: &str = "device-id";

/// Token from an `Authorization: Bearer <token>` header, if present and non-empty.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Device id from the upgrade request, empty when absent or not valid UTF-8.
pub fn device_id(headers: &HeaderMap) -> String {
    headers
        .get(DEVICE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}
