use thiserror::Error;

/// Errors surfaced while flattening a tree or emitting its output.
///
/// Queues are all-or-nothing: once any of these is produced the render call
/// aborts and no partial queue escapes to the caller. The type is `Clone` so a
/// failure can be shared by every consumer of a memoized slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("traversal failed: {message}")]
    Traversal { message: String },
    #[error("propagating component `{component}` failed to initialise: {message}")]
    Propagation { component: String, message: String },
    #[error("stream emission failed: {message}")]
    Stream { message: String },
    #[error("pending value rejected: {message}")]
    Rejected { message: String },
}

impl RenderError {
    pub fn traversal(message: impl Into<String>) -> Self {
        Self::Traversal {
            message: message.into(),
        }
    }

    pub fn propagation(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Propagation {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Short machine-friendly label used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::Traversal { .. } => "traversal",
            RenderError::Propagation { .. } => "propagation",
            RenderError::Stream { .. } => "stream",
            RenderError::Rejected { .. } => "rejected",
        }
    }
}
