use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use sea_orm::{ConnectOptions, Database};
use serde_json::{Value, json};
use shortlink_backend::config::AppConfig;
use shortlink_backend::infrastructure::database;
use shortlink_backend::utils::auth::create_jwt;
use shortlink_backend::{AppState, create_app};
use tower::ServiceExt;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const SECRET: &str = "test_secret_for_api_tests";

async fn setup_test_db() -> sea_orm::DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1);
    let db = Database::connect(opt).await.unwrap();
    database::run_migrations(&db).await.unwrap();
    db
}

fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: SECRET.to_string(),
        public_base_url: "https://sho.rt".to_string(),
        ..AppConfig::default()
    }
}

async fn setup_app() -> Router {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("shortlink_backend=debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();

    let db = setup_test_db().await;
    let state = AppState::new(db, test_config()).unwrap();
    create_app(state)
}

fn bearer(user: &str) -> String {
    format!(
        "Bearer {}",
        create_jwt(user, Some(format!("{}@example.com", user)), SECRET, 1).unwrap()
    )
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, bearer(user));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, json)
}

fn location(headers: &HeaderMap) -> &str {
    headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_full_link_lifecycle() {
    let app = setup_app().await;

    // 1. Create with a generated code
    let (status, _, link) = call(
        &app,
        "POST",
        "/links",
        Some("alice"),
        Some(json!({ "original_url": "https://example.com/very/long/path?q=1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", link);
    let id = link["id"].as_i64().unwrap();
    let code = link["short_code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 7);
    assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(link["short_url"], format!("https://sho.rt/{}", code));
    assert_eq!(link["created_at"], link["updated_at"]);

    // 2. Follow it
    let (status, headers, _) = call(&app, "GET", &format!("/{}", code), None, None).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&headers), "https://example.com/very/long/path?q=1");

    // 3. Listed for the owner
    let (status, _, page) = call(&app, "GET", "/links", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["short_code"], code.as_str());

    // 4. Change the target; the cached redirect must follow
    let (status, _, updated) = call(
        &app,
        "PUT",
        &format!("/links/{}", id),
        Some("alice"),
        Some(json!({ "original_url": "https://example.org/new" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", updated);
    assert_eq!(updated["short_code"], code.as_str());
    assert_eq!(updated["created_at"], link["created_at"]);

    let (_, headers, _) = call(&app, "GET", &format!("/{}", code), None, None).await;
    assert_eq!(location(&headers), "https://example.org/new");

    // 5. Rename the code
    let (status, _, renamed) = call(
        &app,
        "PUT",
        &format!("/links/{}", id),
        Some("alice"),
        Some(json!({ "short_code": "my-promo" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", renamed);
    assert_eq!(renamed["short_url"], "https://sho.rt/my-promo");

    let (status, _, _) = call(&app, "GET", &format!("/{}", code), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, headers, _) = call(&app, "GET", "/my-promo", None, None).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&headers), "https://example.org/new");

    // 6. Delete
    let (status, _, _) = call(&app, "DELETE", &format!("/links/{}", id), Some("alice"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) = call(&app, "GET", "/my-promo", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = call(&app, "GET", &format!("/links/{}", id), Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_custom_code_conflicts() {
    let app = setup_app().await;

    let body = json!({ "original_url": "https://example.com", "short_code": "promo" });
    let (status, _, _) = call(&app, "POST", "/links", Some("alice"), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, err) = call(&app, "POST", "/links", Some("alice"), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(err["error"].as_str().unwrap().contains("promo"));

    // Codes are global, not per user
    let (status, _, _) = call(&app, "POST", "/links", Some("bob"), Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Renaming onto a taken code conflicts too
    let (_, _, other) = call(
        &app,
        "POST",
        "/links",
        Some("bob"),
        Some(json!({ "original_url": "https://example.net" })),
    )
    .await;
    let (status, _, _) = call(
        &app,
        "PUT",
        &format!("/links/{}", other["id"]),
        Some("bob"),
        Some(json!({ "short_code": "promo" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_links_are_scoped_to_their_owner() {
    let app = setup_app().await;

    let (_, _, link) = call(
        &app,
        "POST",
        "/links",
        Some("alice"),
        Some(json!({ "original_url": "https://example.com/alice" })),
    )
    .await;
    let path = format!("/links/{}", link["id"]);

    let (status, _, _) = call(&app, "GET", &path, Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = call(
        &app,
        "PUT",
        &path,
        Some("bob"),
        Some(json!({ "original_url": "https://evil.example" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = call(&app, "DELETE", &path, Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, _, page) = call(&app, "GET", "/links", Some("bob"), None).await;
    assert_eq!(page["total"], 0);

    // Still intact for alice and for visitors
    let (status, _, same) = call(&app, "GET", &path, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(same["original_url"], "https://example.com/alice");
}

#[tokio::test]
async fn test_authentication_required() {
    let app = setup_app().await;

    let (status, _, _) = call(&app, "GET", "/links", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = call(
        &app,
        "POST",
        "/links",
        None,
        Some(json!({ "original_url": "https://example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/links")
                .header(header::AUTHORIZATION, "Bearer not.a.token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let foreign = create_jwt("alice", None, "some_other_secret", 1).unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", foreign))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, _, me) = call(&app, "GET", "/auth/me", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user_id"], "alice");
    assert_eq!(me["email"], "alice@example.com");
}

#[tokio::test]
async fn test_input_validation() {
    let app = setup_app().await;

    let cases = [
        json!({ "original_url": "" }),
        json!({ "original_url": "not a url" }),
        json!({ "original_url": "javascript:alert(1)" }),
        json!({ "original_url": "ftp://example.com/file" }),
        json!({ "original_url": "https://sho.rt/loop" }),
        json!({ "original_url": "https://example.com", "short_code": "ab" }),
        json!({ "original_url": "https://example.com", "short_code": "a".repeat(21) }),
        json!({ "original_url": "https://example.com", "short_code": "has space" }),
        json!({ "original_url": "https://example.com", "short_code": "health" }),
        json!({ "original_url": "https://example.com", "short_code": "Links" }),
    ];

    for body in cases {
        let (status, _, err) =
            call(&app, "POST", "/links", Some("alice"), Some(body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} -> {}", body, err);
    }

    let (_, _, link) = call(
        &app,
        "POST",
        "/links",
        Some("alice"),
        Some(json!({ "original_url": "https://example.com" })),
    )
    .await;
    let (status, _, _) = call(
        &app,
        "PUT",
        &format!("/links/{}", link["id"]),
        Some("alice"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_pagination_and_search() {
    let app = setup_app().await;

    for i in 0..5 {
        let host = if i % 2 == 0 { "example.com" } else { "example.org" };
        let (status, _, _) = call(
            &app,
            "POST",
            "/links",
            Some("alice"),
            Some(json!({ "original_url": format!("https://{}/{}", host, i) })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, _, page) = call(&app, "GET", "/links?page=1&per_page=2", Some("alice"), None).await;
    assert_eq!(page["total"], 5);
    assert_eq!(page["per_page"], 2);
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    // Newest first
    assert!(items[0]["id"].as_i64().unwrap() > items[1]["id"].as_i64().unwrap());
    assert_eq!(items[0]["original_url"], "https://example.com/4");

    let (_, _, page) = call(&app, "GET", "/links?page=3&per_page=2", Some("alice"), None).await;
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    assert_eq!(page["items"][0]["original_url"], "https://example.com/0");

    let (_, _, page) = call(&app, "GET", "/links?search=EXAMPLE.ORG", Some("alice"), None).await;
    assert_eq!(page["total"], 2);

    // Oversized pages are clamped
    let (_, _, page) = call(&app, "GET", "/links?per_page=1000", Some("alice"), None).await;
    assert_eq!(page["per_page"], 100);
}

#[tokio::test]
async fn test_search_treats_wildcards_literally() {
    let app = setup_app().await;

    for (url, code) in [
        ("https://example.com/a", "abc"),
        ("https://example.org/b", "xyz"),
        ("https://example.net/c", "my_code"),
        ("https://example.net/d", "my-code"),
    ] {
        let (status, _, _) = call(
            &app,
            "POST",
            "/links",
            Some("alice"),
            Some(json!({ "original_url": url, "short_code": code })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, _, page) = call(&app, "GET", "/links?search=_", Some("alice"), None).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["short_code"], "my_code");

    let (_, _, page) = call(&app, "GET", "/links?search=my_code", Some("alice"), None).await;
    assert_eq!(page["total"], 1);

    // "%" arrives URL-encoded
    let (_, _, page) = call(&app, "GET", "/links?search=%25", Some("alice"), None).await;
    assert_eq!(page["total"], 0);

    let (_, _, page) = call(&app, "GET", "/links?search=example_com", Some("alice"), None).await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn test_unknown_code_and_oversized_code() {
    let app = setup_app().await;

    let (status, _, err) = call(&app, "GET", "/nope123", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(err["error"].is_string());

    let (status, _, _) = call(&app, "GET", &format!("/{}", "x".repeat(40)), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_and_docs() {
    let app = setup_app().await;

    let (status, _, health) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["database"], "connected");

    let (status, _, doc) = call(&app, "GET", "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/links"].is_object());
    assert!(doc["paths"]["/links/{id}"].is_object());
    assert!(doc["components"]["securitySchemes"]["jwt"].is_object());
}

#[tokio::test]
async fn test_middleware_headers() {
    let app = setup_app().await;

    let (_, headers, _) = call(&app, "GET", "/health", None, None).await;
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers().get("x-request-id").unwrap(), "req-42");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("TRACE")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
