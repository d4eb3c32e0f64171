use axum::http::StatusCode;
use serde_json::{Value, json};
use suite_tests::TestApp;

async fn deal(app: &TestApp, cookie: &str, title: &str, status: &str, contact: &Value) -> Value {
    let response = app
        .post(
            "/api/v1/deal",
            json!({ "title": title, "status": status, "contact_id": contact["id"] }),
            cookie,
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    response.body
}

#[tokio::test]
async fn deal_crud_flow() {
    let app = TestApp::new().await;
    let cookie = app.sign_up("ada").await;
    let contact = app.create_contact(&cookie, "Alan", "Turing").await;

    let created = app
        .post(
            "/api/v1/deal/",
            json!({ "title": "Bombe", "amount": 12.34, "contact_id": contact["id"] }),
            &cookie,
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["status"], "open");
    assert_eq!(created.body["amount"], 12.34);
    let uri = format!("/api/v1/deal/{}", created.body["id"].as_str().unwrap());

    let updated = app
        .put(&uri, json!({ "status": "WON", "amount": 99.5 }), &cookie)
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["status"], "won");
    assert_eq!(updated.body["amount"], 99.5);
    assert_eq!(updated.body["title"], "Bombe");

    assert_eq!(app.get(&uri, &cookie).await.body["status"], "won");
    assert_eq!(app.delete(&uri, &cookie).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri, &cookie).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deals_need_a_contact_the_caller_owns() {
    let app = TestApp::new().await;
    let ada = app.sign_up("ada").await;
    let grace = app.sign_up("grace").await;
    let foreign = app.create_contact(&grace, "Hedy", "Lamarr").await;

    let stolen = app
        .post(
            "/api/v1/deal",
            json!({ "title": "Radio", "contact_id": foreign["id"] }),
            &ada,
        )
        .await;
    assert_eq!(stolen.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(stolen.body["fields"][0]["field"], "contact_id");

    let malformed = app
        .post(
            "/api/v1/deal",
            json!({ "title": "Radio", "contact_id": "abc" }),
            &ada,
        )
        .await;
    assert_eq!(malformed.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(malformed.body["fields"][0]["field"], "contact_id");
}

#[tokio::test]
async fn every_bad_field_is_reported_together() {
    let app = TestApp::new().await;
    let ada = app.sign_up("ada").await;
    let grace = app.sign_up("grace").await;
    let foreign = app.create_contact(&grace, "Hedy", "Lamarr").await;

    let response = app
        .post(
            "/api/v1/deal",
            json!({ "title": "", "status": "pending", "contact_id": foreign["id"] }),
            &ada,
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields: Vec<_> = response.body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["title", "status", "contact_id"]);
}

#[tokio::test]
async fn null_amount_clears_it() {
    let app = TestApp::new().await;
    let cookie = app.sign_up("ada").await;
    let contact = app.create_contact(&cookie, "Alan", "Turing").await;
    let created = app
        .post(
            "/api/v1/deal",
            json!({ "title": "Bombe", "amount": 12.34, "contact_id": contact["id"] }),
            &cookie,
        )
        .await;
    let uri = format!("/api/v1/deal/{}", created.body["id"].as_str().unwrap());

    let renamed = app.put(&uri, json!({ "title": "Bombe II" }), &cookie).await;
    assert_eq!(renamed.body["amount"], 12.34);

    let cleared = app.put(&uri, json!({ "amount": null }), &cookie).await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert!(cleared.body["amount"].is_null());
    assert_eq!(cleared.body["title"], "Bombe II");
}

#[tokio::test]
async fn invalid_status_and_amount_are_rejected() {
    let app = TestApp::new().await;
    let cookie = app.sign_up("ada").await;
    let contact = app.create_contact(&cookie, "Alan", "Turing").await;
    let response = app
        .post(
            "/api/v1/deal",
            json!({
                "title": "Bombe",
                "amount": -3.0,
                "status": "pending",
                "contact_id": contact["id"],
            }),
            &cookie,
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields: Vec<_> = response.body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["amount", "status"]);
}

#[tokio::test]
async fn listing_filters_by_status_contact_and_text() {
    let app = TestApp::new().await;
    let cookie = app.sign_up("ada").await;
    let alan = app.create_contact(&cookie, "Alan", "Turing").await;
    let grace = app.create_contact(&cookie, "Grace", "Hopper").await;
    deal(&app, &cookie, "Bombe rebuild", "open", &alan).await;
    deal(&app, &cookie, "Colossus", "won", &alan).await;
    deal(&app, &cookie, "COBOL licence", "Lost", &grace).await;

    let all = app.get("/api/v1/deal?status=all", &cookie).await;
    assert_eq!(all.body["total"], 3);

    let won = app.get("/api/v1/deal?status=Won", &cookie).await;
    assert_eq!(won.body["total"], 1);
    assert_eq!(won.body["items"][0]["title"], "Colossus");

    let for_alan = app
        .get(
            &format!("/api/v1/deal?contact_id={}", alan["id"].as_str().unwrap()),
            &cookie,
        )
        .await;
    assert_eq!(for_alan.body["total"], 2);

    let text = app.get("/api/v1/deal?q=cobol", &cookie).await;
    assert_eq!(text.body["total"], 1);
    assert_eq!(text.body["items"][0]["status"], "lost");

    let bad = app.get("/api/v1/deal?status=maybe", &cookie).await;
    assert_eq!(bad.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(bad.body["fields"][0]["field"], "status");
}

#[tokio::test]
async fn deals_are_private_to_their_owner() {
    let app = TestApp::new().await;
    let ada = app.sign_up("ada").await;
    let grace = app.sign_up("grace").await;
    let contact = app.create_contact(&ada, "Alan", "Turing").await;
    let created = deal(&app, &ada, "Bombe", "open", &contact).await;
    let uri = format!("/api/v1/deal/{}", created["id"].as_str().unwrap());

    assert_eq!(app.get(&uri, &grace).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.delete(&uri, &grace).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/api/v1/deal", &grace).await.body["total"], 0);
}
