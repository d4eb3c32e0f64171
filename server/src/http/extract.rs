//! Adapters that turn axum extractor rejections into [`ApiError`] bodies.

use axum::{
    Json,
    extract::{
        Query,
        rejection::{JsonRejection, QueryRejection},
    },
};
use platform_api::{ApiError, ApiResult, FieldError};
use uuid::Uuid;

pub fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(JsonRejection::JsonDataError(err)) => Err(ApiError::Validation(vec![
            FieldError::new("body", err.body_text()),
        ])),
        Err(err) => Err(ApiError::BadRequest(err.body_text())),
    }
}

pub fn query<T>(query: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    query
        .map(|Query(value)| value)
        .map_err(|err| ApiError::BadRequest(err.body_text()))
}

/// Ids that do not parse cannot name a record, so they read as missing.
pub fn path_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found(what))
}
