mod support;

use std::{fs, sync::Arc, time::Duration};

use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use fujion_server::{
    build_router, routes::PageBootstrap, Application, DynamicResource,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::Value;
use tempfile::TempDir;
use tower::util::ServiceExt;

use support::{config, web_root};

fn app() -> (TempDir, Arc<Application>, Router) {
    let root = web_root();
    let app = Arc::new(Application::new(config(&root)).expect("application"));
    let router = build_router(Arc::clone(&app));
    (root, app, router)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let (_root, _app, router) = app();
    let response = router.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["sessions"], 0);
}

#[tokio::test]
async fn page_sources_outside_the_web_root_are_refused() {
    let (_root, app, router) = app();
    let outside = tempfile::tempdir().expect("outside");
    let secret = outside.path().join("secret.fsp");
    fs::write(&secret, "<fsp><label value=\"secret\"/></fsp>").expect("write");

    let uri = format!("/page?src=file://{}", secret.display());
    let response = router.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.pages().is_empty());
}

#[tokio::test]
async fn unclaimed_pages_are_reaped_after_their_ttl() {
    let root = web_root();
    let mut config = config(&root);
    config.page_ttl = Duration::ZERO;
    let app = Arc::new(Application::new(config).expect("application"));
    let router = build_router(Arc::clone(&app));

    let response = router.oneshot(get("/page?src=home.fsp")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.pages().len(), 1);

    assert_eq!(app.reap_unclaimed_pages(), 1);
    assert!(app.pages().is_empty());
    assert_eq!(app.reap_unclaimed_pages(), 0);
}

#[tokio::test]
async fn page_requests_create_pages_for_loadable_sources() {
    let (_root, app, router) = app();

    let response = router
        .clone()
        .oneshot(get("/page?src=home.fsp"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let bootstrap: PageBootstrap = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(bootstrap.src, "home.fsp");
    assert_eq!(bootstrap.ws, "/ws");
    let page = app.pages().get(&bootstrap.pid).expect("page registered");
    assert_eq!(page.src(), "home.fsp");
    assert!(app.cache().is_cached("home.fsp"));

    let missing = router
        .clone()
        .oneshot(get("/page?src=missing.fsp"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let blank = router.oneshot(get("/page")).await.unwrap();
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.pages().len(), 1);
}

#[tokio::test]
async fn dynamic_resources_honour_etags() {
    let (_root, app, router) = app();
    let path = app.resources().register(
        Some("p1"),
        "report.csv",
        DynamicResource::new("text/csv", "a,b\n1,2\n"),
    );
    let etag = app.resources().get(&path).expect("resource").etag().to_string();

    let response = router
        .clone()
        .oneshot(get(&format!("/dynamic/{path}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    assert_eq!(response.headers()[header::ETAG], etag.as_str());
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"a,b\n1,2\n");

    let cached = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/dynamic/{path}"))
                .header(header::IF_NONE_MATCH, etag.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(cached.status(), StatusCode::NOT_MODIFIED);

    let missing = router
        .oneshot(get("/dynamic/_fujion_p2/report.csv"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_are_exposed_only_with_a_recorder() {
    let (root, app, router) = app();
    let response = router.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    drop(app);

    let handle = PrometheusBuilder::new().build_recorder().handle();
    let app = Arc::new(
        Application::new(config(&root))
            .expect("application")
            .with_metrics(handle),
    );
    let response = build_router(app).oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; version=0.0.4"
    );
}
