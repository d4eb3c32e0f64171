use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    routing::get,
};
use platform_api::ApiResult;
use products_crm::{
    Page,
    deals::{self, DealInput, DealListQuery, DealPatch, DealView},
};

use super::{AppState, CurrentUser, extract};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/deal", get(list).post(create))
        .route("/api/v1/deal/", get(list).post(create))
        .route("/api/v1/deal/{id}", get(fetch).put(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<DealListQuery>, QueryRejection>,
) -> ApiResult<Json<Page<DealView>>> {
    let query = extract::query(query)?;
    Ok(Json(deals::list(&state.pool, user.id, &query).await?))
}

async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<DealInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<DealView>)> {
    let input = extract::body(payload)?;
    let created = deals::create(&state.pool, user.id, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn fetch(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<DealView>> {
    let id = extract::path_id(&id, "Deal")?;
    Ok(Json(deals::get(&state.pool, user.id, id).await?))
}

async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<DealPatch>, JsonRejection>,
) -> ApiResult<Json<DealView>> {
    let id = extract::path_id(&id, "Deal")?;
    let patch = extract::body(payload)?;
    Ok(Json(deals::update(&state.pool, user.id, id, patch).await?))
}

async fn remove(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = extract::path_id(&id, "Deal")?;
    deals::delete(&state.pool, user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
