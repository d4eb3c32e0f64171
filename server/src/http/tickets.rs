use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    routing::{get, post},
};
use platform_api::ApiResult;
use products_crm::tickets::{
    self, TicketInput, TicketListQuery, TicketPage, TicketPatch, TicketView,
};

use super::{AppState, CurrentUser, extract};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/ticket", post(create))
        .route("/api/v1/ticket/", post(create))
        .route("/api/v1/ticket/user", get(list_mine))
        .route("/api/v1/ticket/all", get(list_all))
        .route(
            "/api/v1/ticket/{id}",
            get(fetch).put(update).delete(remove),
        )
        .route("/api/v1/ticket/{id}/close", post(close))
}

async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<TicketInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TicketView>)> {
    let input = extract::body(payload)?;
    let created = tickets::create(&state.pool, &user.subject(), input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_mine(
    State(state): State<AppState>,
    user: CurrentUser,
    query: Result<Query<TicketListQuery>, QueryRejection>,
) -> ApiResult<Json<TicketPage>> {
    let query = extract::query(query)?;
    Ok(Json(
        tickets::list_mine(&state.pool, &user.subject(), &query).await?,
    ))
}

async fn list_all(
    State(state): State<AppState>,
    user: CurrentUser,
    query: Result<Query<TicketListQuery>, QueryRejection>,
) -> ApiResult<Json<TicketPage>> {
    let query = extract::query(query)?;
    Ok(Json(
        tickets::list_all(&state.pool, &user.subject(), &query).await?,
    ))
}

async fn fetch(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<TicketView>> {
    let id = extract::path_id(&id, "Ticket")?;
    Ok(Json(tickets::get(&state.pool, &user.subject(), id).await?))
}

async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<TicketPatch>, JsonRejection>,
) -> ApiResult<Json<TicketView>> {
    let id = extract::path_id(&id, "Ticket")?;
    let patch = extract::body(payload)?;
    Ok(Json(
        tickets::update(&state.pool, &user.subject(), id, patch).await?,
    ))
}

async fn close(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<TicketView>> {
    let id = extract::path_id(&id, "Ticket")?;
    Ok(Json(tickets::close(&state.pool, &user.subject(), id).await?))
}

async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = extract::path_id(&id, "Ticket")?;
    tickets::delete(&state.pool, &user.subject(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
