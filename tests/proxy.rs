use axum::{
    Json, Router,
    body::Body,
    extract::RawQuery,
    http::{HeaderMap, Method, Request, StatusCode, header},
    routing::{any, get},
};
use crm_server::proxy::proxy_router;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::ServiceExt;

async fn echo(
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: String,
) -> Json<Value> {
    Json(json!({
        "method": method.as_str(),
        "query": query,
        "body": body,
        "cookie": headers.get(header::COOKIE).and_then(|v| v.to_str().ok()),
    }))
}

async fn spawn_upstream() -> String {
    let router = Router::new()
        .route("/echo", any(echo))
        .route("/teapot", get(|| async { (StatusCode::IM_A_TEAPOT, "short and stout") }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn call(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn forwards_method_query_headers_and_body() {
    let upstream = spawn_upstream().await;
    let proxy = proxy_router(&format!("{upstream}/"), reqwest::Client::new());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/echo?page=2&q=ada")
        .header(header::COOKIE, "access_token=abc")
        .body(Body::from("payload"))
        .unwrap();
    let (status, bytes) = call(proxy, request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        body,
        json!({
            "method": "POST",
            "query": "page=2&q=ada",
            "body": "payload",
            "cookie": "access_token=abc",
        })
    );
}

#[tokio::test]
async fn relays_upstream_status_codes() {
    let upstream = spawn_upstream().await;
    let proxy = proxy_router(&upstream, reqwest::Client::new());
    let request = Request::builder()
        .uri("/teapot")
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = call(proxy, request).await;
    assert_eq!(status, StatusCode::IM_A_TEAPOT);
    assert_eq!(bytes, b"short and stout");
}

#[tokio::test]
async fn unsupported_methods_are_refused() {
    let upstream = spawn_upstream().await;
    let proxy = proxy_router(&upstream, reqwest::Client::new());
    let request = Request::builder()
        .method(Method::PATCH)
        .uri("/echo")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(proxy, request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn unreachable_upstream_is_a_bad_gateway() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let proxy = proxy_router(&format!("http://{addr}"), reqwest::Client::new());
    let request = Request::builder().uri("/echo").body(Body::empty()).unwrap();
    let (status, bytes) = call(proxy, request).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "BAD_GATEWAY");
}
