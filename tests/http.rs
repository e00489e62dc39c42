use std::{path::PathBuf, sync::Arc};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Method, Request, StatusCode,
        header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION},
    },
    response::Response,
};
use spindle::{
    application::pages::PageStore,
    infra::http::{HttpState, REQUEST_ID_HEADER, RenderOptions, RenderSummary, build_router},
    render::{PoolConfig, RenderMode},
};
use tower::ServiceExt;

const INDEX_HTML: &str = "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"/><title>Home</title></head><body><h1>Welcome</h1><p>Fish &amp; chips</p></body></html>";

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/pages")
}

fn router(mode: RenderMode) -> Router {
    build_router(HttpState {
        pages: Arc::new(PageStore::new(fixtures())),
        render: RenderOptions {
            mode,
            compress_html: false,
            pool: PoolConfig::default(),
        },
    })
}

async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    app.oneshot(request).await.expect("router should respond")
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should collect");
    String::from_utf8(bytes.to_vec()).expect("body should be utf-8")
}

#[tokio::test]
async fn health_returns_no_content() {
    let response = get(router(RenderMode::Buffered), "/_health").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn buffered_index_has_doctype_head_and_length() {
    let response = get(router(RenderMode::Buffered), "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
    assert_eq!(
        response.headers()[CONTENT_LENGTH],
        INDEX_HTML.len().to_string().as_str()
    );
    assert_eq!(body_text(response).await, INDEX_HTML);
}

#[tokio::test]
async fn streamed_index_matches_buffered_bytes() {
    let response = get(router(RenderMode::Streaming), "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(CONTENT_LENGTH).is_none());
    assert_eq!(body_text(response).await, INDEX_HTML);
}

#[tokio::test]
async fn nested_pages_and_partials() {
    let response = get(router(RenderMode::Streaming), "/blog/first").await;
    assert_eq!(
        body_text(response).await,
        "<!DOCTYPE html>\n<article>one two</article>"
    );

    let response = get(router(RenderMode::Buffered), "/blog/first?partial=true").await;
    assert_eq!(body_text(response).await, "<article>one two</article>");
}

#[tokio::test]
async fn bubbled_redirect_replaces_page() {
    let response = get(router(RenderMode::Streaming), "/redirect").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[LOCATION], "/");
    assert_eq!(body_text(response).await, "");
}

#[tokio::test]
async fn missing_page_is_not_found() {
    let response = get(router(RenderMode::Buffered), "/does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn render_failures_surface_before_streaming_starts() {
    let response = get(router(RenderMode::Streaming), "/broken").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = get(router(RenderMode::Buffered), "/rejected").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn page_responses_carry_request_id_and_render_summary() {
    let response = get(router(RenderMode::Buffered), "/blog/first?partial=true").await;
    assert_eq!(response.status(), StatusCode::OK);

    let request_id = response.headers()[REQUEST_ID_HEADER]
        .to_str()
        .expect("request id should be ascii");
    assert_eq!(request_id.len(), 36);

    let summary = response
        .extensions()
        .get::<RenderSummary>()
        .expect("page responses should carry a render summary");
    assert_eq!(
        summary,
        &RenderSummary {
            pathname: "/blog/first".to_string(),
            mode: RenderMode::Buffered,
            partial: true,
            queue_nodes: 5,
        }
    );
}
