//! Harness for driving the CRM router in-process against in-memory SQLite.

use std::collections::HashMap;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use crm_server::{AppConfig, AppState, build_router};
use http_body_util::BodyExt;
use migration::{Migrator, MigratorTrait};
use platform_db::{DatabaseSettings, DbPool};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const TEST_SECRET: &str = "suite-tests-secret-suite-tests-secret";
pub const PASSWORD: &str = "secret123";

pub struct TestApp {
    pub router: Router,
    pub db: DbPool,
    pub config: AppConfig,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `name=value` pairs from every non-empty `Set-Cookie`, ready for a `Cookie` header.
    pub fn cookies(&self) -> String {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|raw| raw.split(';').next())
            .filter(|pair| pair.split_once('=').is_some_and(|(_, v)| !v.is_empty()))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn set_cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|raw| raw.starts_with(&format!("{name}=")))
            .map(str::to_string)
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_env(&[]).await
    }

    /// Extra `(key, value)` pairs override the test defaults.
    pub async fn with_env(extra: &[(&str, &str)]) -> Self {
        let mut env: HashMap<String, String> = HashMap::from([
            ("AUTH_SECRET".to_string(), TEST_SECRET.to_string()),
            ("DATABASE_URL".to_string(), "sqlite::memory:".to_string()),
        ]);
        for (key, value) in extra {
            env.insert(key.to_string(), value.to_string());
        }
        let config = AppConfig::from_lookup(|key| env.get(key).cloned()).expect("test config");
        let db = platform_db::connect(&DatabaseSettings::new(config.database.url.clone()))
            .await
            .expect("connect sqlite");
        Migrator::up(&db, None).await.expect("migrate");
        let router = build_router(AppState::new(db.clone(), config.clone()));
        Self { router, db, config }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        self.dispatch(request).await
    }

    pub async fn dispatch(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, cookie: &str) -> TestResponse {
        self.send(Method::GET, uri, None, Some(cookie)).await
    }

    pub async fn post(&self, uri: &str, body: Value, cookie: &str) -> TestResponse {
        self.send(Method::POST, uri, Some(body), Some(cookie)).await
    }

    pub async fn put(&self, uri: &str, body: Value, cookie: &str) -> TestResponse {
        self.send(Method::PUT, uri, Some(body), Some(cookie)).await
    }

    pub async fn delete(&self, uri: &str, cookie: &str) -> TestResponse {
        self.send(Method::DELETE, uri, None, Some(cookie)).await
    }

    pub async fn register(&self, username: &str) -> TestResponse {
        self.send(
            Method::POST,
            "/api/v1/authentication/register",
            Some(json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": PASSWORD,
                "confirm_password": PASSWORD,
            })),
            None,
        )
        .await
    }

    pub async fn login(&self, username: &str) -> TestResponse {
        self.send(
            Method::POST,
            "/api/v1/authentication/login",
            Some(json!({
                "email": format!("{username}@example.com"),
                "password": PASSWORD,
            })),
            None,
        )
        .await
    }

    /// Registers `username` and returns its session cookie header.
    pub async fn sign_up(&self, username: &str) -> String {
        let registered = self.register(username).await;
        assert_eq!(registered.status, StatusCode::CREATED, "{:?}", registered.body);
        let login = self.login(username).await;
        assert_eq!(login.status, StatusCode::OK, "{:?}", login.body);
        login.cookies()
    }

    pub async fn create_contact(&self, cookie: &str, first: &str, last: &str) -> Value {
        let response = self
            .post(
                "/api/v1/contact",
                json!({
                    "first_name": first,
                    "last_name": last,
                    "email": format!("{}@example.com", first.to_lowercase()),
                }),
                cookie,
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body
    }
}
