use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Response,
    routing::get,
};
use metrics::counter;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    application::error::AppError,
    render::{PageSource, Props, RenderContext, RenderMode, Slots, flatten, render_page},
};

use super::{
    HttpState,
    middleware::{RenderSummary, log_responses, set_request_context},
};

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/_health", get(health))
        .route("/", get(index))
        .route("/{*path}", get(page))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    /// Render without a doctype or head, for fragment requests.
    partial: bool,
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn index(
    State(state): State<HttpState>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    render_document(&state, "", query.partial).await
}

async fn page(
    State(state): State<HttpState>,
    Path(path): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    render_document(&state, &path, query.partial).await
}

#[instrument(skip(state), fields(mode = ?state.render.mode))]
async fn render_document(
    state: &HttpState,
    path: &str,
    partial: bool,
) -> Result<Response, AppError> {
    let root = state.pages.load(path).await?.ok_or(AppError::NotFound)?;

    let pathname = format!("/{}", path.trim_start_matches('/'));
    let cx = RenderContext::builder(pathname)
        .pool(state.render.pool)
        .compress_html(state.render.compress_html)
        .partial(partial)
        .build();

    let queue = flatten(root, &cx).await?;
    debug!(nodes = queue.len(), "page flattened");
    let summary = RenderSummary {
        pathname: cx.pathname().to_string(),
        mode: state.render.mode,
        partial,
        queue_nodes: queue.len(),
    };
    let mut response = render_page(
        PageSource::Queue(queue),
        Props::new(),
        Slots::new(),
        state.render.mode,
        &cx,
    )
    .await?;

    let mode = match state.render.mode {
        RenderMode::Buffered => "buffered",
        RenderMode::Streaming => "streaming",
    };
    counter!("spindle_pages_rendered_total", "mode" => mode).increment(1);
    response.extensions_mut().insert(summary);
    Ok(response)
}
