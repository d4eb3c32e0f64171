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
    ListQuery, Page,
    contacts::{self, ContactInput, ContactPatch, ContactView},
};

use super::{AppState, CurrentUser, extract};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/contact", get(list).post(create))
        .route("/api/v1/contact/", get(list).post(create))
        .route(
            "/api/v1/contact/{id}",
            get(fetch).put(update).delete(remove),
        )
}

async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Page<ContactView>>> {
    let query = extract::query(query)?;
    Ok(Json(contacts::list(&state.pool, user.id, &query).await?))
}

async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<ContactInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ContactView>)> {
    let input = extract::body(payload)?;
    let created = contacts::create(&state.pool, user.id, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn fetch(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ContactView>> {
    let id = extract::path_id(&id, "Contact")?;
    Ok(Json(contacts::get(&state.pool, user.id, id).await?))
}

async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<ContactPatch>, JsonRejection>,
) -> ApiResult<Json<ContactView>> {
    let id = extract::path_id(&id, "Contact")?;
    let patch = extract::body(payload)?;
    Ok(Json(contacts::update(&state.pool, user.id, id, patch).await?))
}

async fn remove(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = extract::path_id(&id, "Contact")?;
    contacts::delete(&state.pool, user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
