mod middleware;
mod public;

use std::sync::Arc;

pub use middleware::{REQUEST_ID_HEADER, RenderSummary, RequestContext};
pub use public::build_router;

use crate::{
    application::pages::PageStore,
    config::Settings,
    render::{PoolConfig, RenderMode},
};

/// How pages are rendered for HTTP requests.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub mode: RenderMode,
    pub compress_html: bool,
    pub pool: PoolConfig,
}

#[derive(Clone)]
pub struct HttpState {
    pub pages: Arc<PageStore>,
    pub render: RenderOptions,
}

impl HttpState {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            pages: Arc::new(PageStore::new(settings.render.pages_dir.clone())),
            render: RenderOptions {
                mode: settings.render.mode,
                compress_html: settings.render.compress_html,
                pool: settings.queue,
            },
        }
    }
}
