//! Page documents stored as `<root>/<path>.json`.

use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use tracing::debug;

use crate::{infra::error::InfraError, render::Renderable};

use super::{document, error::AppError};

const INDEX_PAGE: &str = "index";
const DOCUMENT_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct PageStore {
    root: PathBuf,
}

impl PageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path onto a document file. `/` and directory-style paths
    /// resolve to their `index` document.
    pub fn resolve(&self, request_path: &str) -> Result<PathBuf, AppError> {
        let trimmed = request_path.trim_matches('/');
        let relative = if trimmed.is_empty() {
            PathBuf::from(INDEX_PAGE)
        } else {
            PathBuf::from(trimmed)
        };

        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !safe || trimmed.contains('\\') {
            return Err(AppError::validation(format!(
                "page path `{request_path}` is not allowed"
            )));
        }

        let mut file = self.root.join(relative).into_os_string();
        file.push(".");
        file.push(DOCUMENT_EXTENSION);
        Ok(PathBuf::from(file))
    }

    /// Load and parse the document for `request_path`. A missing file is
    /// `Ok(None)`.
    pub async fn load(&self, request_path: &str) -> Result<Option<Renderable>, AppError> {
        let file = self.resolve(request_path)?;
        let text = match tokio::fs::read_to_string(&file).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(file = %file.display(), "page document not found");
                return Ok(None);
            }
            Err(err) => return Err(InfraError::from(err).into()),
        };
        document::parse(&text).map(Some)
    }
}
