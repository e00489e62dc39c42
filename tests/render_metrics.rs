use std::{collections::HashSet, path::PathBuf, sync::Arc};

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use metrics_util::debugging::DebuggingRecorder;
use spindle::{
    application::pages::PageStore,
    infra::http::{HttpState, RenderOptions, build_router},
    render::{PoolConfig, RenderMode},
};
use tower::ServiceExt;

#[tokio::test]
async fn page_renders_emit_pool_vnode_and_page_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let app = build_router(HttpState {
        pages: Arc::new(PageStore::new(
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/pages"),
        )),
        render: RenderOptions {
            mode: RenderMode::Buffered,
            compress_html: false,
            pool: PoolConfig {
                track_stats: true,
                ..PoolConfig::default()
            },
        },
    });

    let request = Request::builder()
        .method(Method::GET)
        .uri("/")
        .body(Body::empty())
        .expect("request should build");
    let response = app.oneshot(request).await.expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should collect");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for metric in [
        "spindle_pool_content_cache_hit_total",
        "spindle_pool_content_cache_miss_total",
        "spindle_pool_acquire_new_total",
        "spindle_vnode_total",
        "spindle_vnode_element_total",
        "spindle_vnode_component_total",
        "spindle_pages_rendered_total",
    ] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
