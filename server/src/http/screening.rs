use axum::{
    body::{Body, to_bytes},
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use platform_api::ApiError;
use products_crm::screening;
use tracing::warn;

pub const MAX_SCREENED_BODY: usize = 1024 * 1024;

/// Buffers the request body and rejects it when a screening rule matches.
pub async fn screen_request(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_SCREENED_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return ApiError::BadRequest("request body exceeds 1 MiB".into()).into_response();
        }
    };
    if let Some(threat) = screening::scan_body(&bytes) {
        warn!(
            target: "security",
            threat = threat.as_str(),
            method = %parts.method,
            path = %parts.uri.path(),
            "suspicious request blocked"
        );
        return ApiError::SuspiciousInput(threat.detail().into()).into_response();
    }
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
