//! Per-render state shared by every node of a single page render.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use axum::http::{HeaderMap, StatusCode};

use super::{lock::mutex_lock, queue::PoolConfig, stats::RenderStats, value::ResponseSignal};

const LOCK_TARGET: &str = "spindle::render::context";

/// Head markup known before rendering starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadElements {
    pub styles: Vec<String>,
    pub links: Vec<String>,
    pub scripts: Vec<String>,
}

/// Status and headers the page response starts from.
#[derive(Debug, Clone)]
pub struct ResponseInit {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl Default for ResponseInit {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct MutableState {
    extra_head: Vec<String>,
    rendered_scripts: HashSet<String>,
    head_rendered: bool,
    bubbled: Option<ResponseSignal>,
}

#[derive(Debug)]
struct ContextInner {
    pathname: String,
    pool: PoolConfig,
    partial: bool,
    compress_html: bool,
    head: HeadElements,
    response: ResponseInit,
    stats: RenderStats,
    state: Mutex<MutableState>,
}

/// Cheaply clonable handle to the state of one render.
#[derive(Debug, Clone)]
pub struct RenderContext {
    inner: Arc<ContextInner>,
}

impl RenderContext {
    pub fn new(pathname: impl Into<String>) -> Self {
        Self::builder(pathname).build()
    }

    pub fn builder(pathname: impl Into<String>) -> RenderContextBuilder {
        RenderContextBuilder {
            pathname: pathname.into(),
            pool: PoolConfig::default(),
            partial: false,
            compress_html: false,
            head: HeadElements::default(),
            response: ResponseInit::default(),
        }
    }

    pub fn pathname(&self) -> &str {
        &self.inner.pathname
    }

    pub fn pool_config(&self) -> PoolConfig {
        self.inner.pool
    }

    pub fn is_partial(&self) -> bool {
        self.inner.partial
    }

    pub fn compress_html(&self) -> bool {
        self.inner.compress_html
    }

    pub fn response_init(&self) -> &ResponseInit {
        &self.inner.response
    }

    pub fn stats(&self) -> &RenderStats {
        &self.inner.stats
    }

    /// Append head markup contributed by a propagating component.
    pub fn push_extra_head(&self, head: String) {
        let mut state = mutex_lock(&self.inner.state, LOCK_TARGET, "push_extra_head");
        state.extra_head.push(head);
    }

    pub fn extra_head(&self) -> Vec<String> {
        mutex_lock(&self.inner.state, LOCK_TARGET, "extra_head")
            .extra_head
            .clone()
    }

    pub fn head_rendered(&self) -> bool {
        mutex_lock(&self.inner.state, LOCK_TARGET, "head_rendered").head_rendered
    }

    /// Render all head markup the first time it is requested; later calls
    /// yield `None`.
    pub fn take_head(&self) -> Option<String> {
        let mut state = mutex_lock(&self.inner.state, LOCK_TARGET, "take_head");
        if state.head_rendered {
            return None;
        }
        state.head_rendered = true;

        let head = &self.inner.head;
        let html = head
            .styles
            .iter()
            .chain(&head.links)
            .chain(&head.scripts)
            .chain(&state.extra_head)
            .map(String::as_str)
            .collect::<String>();
        Some(html)
    }

    /// Returns true the first time `key` is seen in this render.
    pub fn mark_script(&self, key: &str) -> bool {
        let mut state = mutex_lock(&self.inner.state, LOCK_TARGET, "mark_script");
        state.rendered_scripts.insert(key.to_string())
    }

    /// Record a response that should replace the page. The first one wins.
    pub fn capture_response(&self, signal: ResponseSignal) {
        let mut state = mutex_lock(&self.inner.state, LOCK_TARGET, "capture_response");
        if state.bubbled.is_none() {
            state.bubbled = Some(signal);
        }
    }

    pub fn bubbled_response(&self) -> Option<ResponseSignal> {
        mutex_lock(&self.inner.state, LOCK_TARGET, "bubbled_response")
            .bubbled
            .clone()
    }
}

pub struct RenderContextBuilder {
    pathname: String,
    pool: PoolConfig,
    partial: bool,
    compress_html: bool,
    head: HeadElements,
    response: ResponseInit,
}

impl RenderContextBuilder {
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    pub fn compress_html(mut self, compress_html: bool) -> Self {
        self.compress_html = compress_html;
        self
    }

    pub fn head(mut self, head: HeadElements) -> Self {
        self.head = head;
        self
    }

    pub fn response(mut self, response: ResponseInit) -> Self {
        self.response = response;
        self
    }

    pub fn build(self) -> RenderContext {
        RenderContext {
            inner: Arc::new(ContextInner {
                pathname: self.pathname,
                pool: self.pool,
                partial: self.partial,
                compress_html: self.compress_html,
                head: self.head,
                response: self.response,
                stats: RenderStats::default(),
                state: Mutex::new(MutableState::default()),
            }),
        }
    }
}
