use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use axum_extra::extract::cookie::CookieJar;
use platform_api::ApiResult;
use products_crm::accounts::{
    self, LoginInput, PasswordChange, ProfilePatch, RegisterInput, UserView,
};
use serde::Serialize;

use super::{
    AppState, extract,
    session::{self, ACCESS_COOKIE, CurrentUser, REFRESH_COOKIE},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/authentication/register", post(register))
        .route("/api/v1/authentication/login", post(login))
        .route("/api/v1/authentication/verify", post(verify))
        .route("/api/v1/authentication/refresh", post(refresh))
        .route("/api/v1/authentication/logout", post(logout))
        .route("/api/v1/user/me", get(me))
        .route("/api/v1/user/profile", put(update_profile))
        .route("/api/v1/user/password", put(change_password))
        .route("/api/v1/user/account", delete(delete_account))
}

#[derive(Serialize)]
struct Message {
    message: &'static str,
}

#[derive(Serialize)]
struct SessionUser {
    username: String,
    email: String,
}

#[derive(Serialize)]
struct VerifyResponse {
    success: bool,
    user: SessionUser,
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    let input = extract::body(payload)?;
    let user = accounts::register(&state.pool, input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginInput>, JsonRejection>,
) -> ApiResult<(CookieJar, Json<Message>)> {
    let input = extract::body(payload)?;
    let (_, tokens) = accounts::login(&state.pool, state.auth(), input).await?;
    let jar = session::with_access(jar, tokens.access_token, &state.config);
    let jar = session::with_refresh(jar, tokens.refresh_token, &state.config);
    Ok((
        jar,
        Json(Message {
            message: "Login is successful.",
        }),
    ))
}

async fn verify(State(state): State<AppState>, jar: CookieJar) -> ApiResult<Json<VerifyResponse>> {
    let user = accounts::verify_session(
        &state.pool,
        state.auth(),
        jar.get(ACCESS_COOKIE).map(|c| c.value()),
        jar.get(REFRESH_COOKIE).map(|c| c.value()),
    )
    .await?;
    Ok(Json(VerifyResponse {
        success: true,
        user: SessionUser {
            username: user.username,
            email: user.email,
        },
    }))
}

async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<Message>)> {
    let access = accounts::refresh_session(
        &state.pool,
        state.auth(),
        jar.get(REFRESH_COOKIE).map(|c| c.value()),
    )
    .await?;
    let jar = session::with_access(jar, access, &state.config);
    Ok((
        jar,
        Json(Message {
            message: "Session refreshed.",
        }),
    ))
}

async fn logout(jar: CookieJar) -> (CookieJar, Json<Message>) {
    (
        session::cleared(jar),
        Json(Message {
            message: "You are logged out.",
        }),
    )
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserView> {
    Json(user.into())
}

async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<ProfilePatch>, JsonRejection>,
) -> ApiResult<Json<UserView>> {
    let patch = extract::body(payload)?;
    let updated = accounts::update_profile(&state.pool, user.id, patch).await?;
    Ok(Json(updated))
}

async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<PasswordChange>, JsonRejection>,
) -> ApiResult<Json<Message>> {
    let input = extract::body(payload)?;
    accounts::change_password(&state.pool, user.id, input).await?;
    Ok(Json(Message {
        message: "Password updated.",
    }))
}

async fn delete_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> ApiResult<(CookieJar, StatusCode)> {
    accounts::delete_account(&state.pool, user.id).await?;
    Ok((session::cleared(jar), StatusCode::NO_CONTENT))
}
