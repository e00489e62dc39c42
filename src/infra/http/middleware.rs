use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request, header::CONTENT_LENGTH},
    middleware::Next,
    response::Response,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{application::error::ErrorReport, render::RenderMode};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// What a page handler rendered, attached to its response for the access log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSummary {
    pub pathname: String,
    pub mode: RenderMode,
    pub partial: bool,
    pub queue_nodes: usize,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// Log every page render, and every failed request with its error chain.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();
    let summary = response.extensions().get::<RenderSummary>().cloned();

    if status.is_client_error() || status.is_server_error() {
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "spindle::http::response",
                status = status.as_u16(),
                method = %method,
                path = %path,
                elapsed_ms,
                source,
                detail = %detail,
                chain = ?messages,
                request_id,
                "page request failed",
            );
        } else {
            warn!(
                target = "spindle::http::response",
                status = status.as_u16(),
                method = %method,
                path = %path,
                elapsed_ms,
                source,
                detail = %detail,
                request_id,
                "page request rejected",
            );
        }
        return response;
    }

    if let Some(summary) = summary {
        // Streamed bodies are still being written, so they carry no length.
        let bytes = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        info!(
            target = "spindle::http::render",
            status = status.as_u16(),
            pathname = %summary.pathname,
            mode = ?summary.mode,
            partial = summary.partial,
            queue_nodes = summary.queue_nodes,
            bytes = ?bytes,
            elapsed_ms,
            request_id,
            "page rendered",
        );
    }

    response
}
