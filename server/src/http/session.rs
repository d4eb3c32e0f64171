use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use entity::user;
use platform_api::ApiError;
use platform_authz::Subject;
use products_crm::accounts;
use time::Duration as TimeDuration;

use super::AppState;
use crate::config::AppConfig;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

fn session_cookie(
    name: &'static str,
    value: String,
    ttl_minutes: i64,
    config: &AppConfig,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(ttl_minutes))
        .build()
}

pub fn with_access(jar: CookieJar, token: String, config: &AppConfig) -> CookieJar {
    jar.add(session_cookie(
        ACCESS_COOKIE,
        token,
        config.auth.access_ttl_minutes,
        config,
    ))
}

pub fn with_refresh(jar: CookieJar, token: String, config: &AppConfig) -> CookieJar {
    jar.add(session_cookie(
        REFRESH_COOKIE,
        token,
        config.auth.refresh_ttl_minutes,
        config,
    ))
}

pub fn cleared(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build((ACCESS_COOKIE, "")).path("/"))
        .remove(Cookie::build((REFRESH_COOKIE, "")).path("/"))
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// The caller of an authenticated route, resolved from the `access_token`
/// cookie or an `Authorization: Bearer` header.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub user::Model);

impl CurrentUser {
    pub fn subject(&self) -> Subject {
        Subject {
            user_id: self.0.id,
            role: self.0.role,
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(ACCESS_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .or_else(|| bearer(&parts.headers))
            .ok_or_else(|| ApiError::Unauthorized("authentication required".into()))?;
        let user = accounts::authenticate_access(&state.pool, state.auth(), &token).await?;
        Ok(Self(user))
    }
}
