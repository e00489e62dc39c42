//! Named children handed to a component, rendered at most once.

use std::{collections::BTreeMap, fmt};

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};

use super::{
    context::RenderContext,
    error::RenderError,
    page::render_to_string,
    value::{HtmlString, Renderable},
};

/// Slots keyed by name; children passed positionally land under `default`.
pub type Slots = BTreeMap<String, Slot>;

pub const DEFAULT_SLOT: &str = "default";

/// A lazily rendered sub-tree. Cloning shares the memoized output, so a slot
/// rendered by several consumers runs its tree exactly once.
#[derive(Clone)]
pub struct Slot {
    output: Shared<BoxFuture<'static, Result<HtmlString, RenderError>>>,
}

impl Slot {
    /// Defer rendering `node` until the slot is first awaited.
    pub fn deferred(node: Renderable, cx: &RenderContext) -> Self {
        let output = render_to_string(node, cx.clone())
            .map(|result| result.map(HtmlString::from))
            .boxed()
            .shared();
        Self { output }
    }

    pub fn from_html(html: impl Into<HtmlString>) -> Self {
        let output = futures::future::ready(Ok(html.into())).boxed().shared();
        Self { output }
    }

    pub async fn render(&self) -> Result<HtmlString, RenderError> {
        self.output.clone().await
    }

    /// Splice the slot back into a tree as safe markup.
    pub fn to_renderable(&self) -> Renderable {
        let slot = self.clone();
        Renderable::pending(async move { slot.render().await.map(Renderable::Html) })
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.output.peek() {
            Some(Ok(_)) => "rendered",
            Some(Err(_)) => "failed",
            None => "pending",
        };
        f.debug_struct("Slot").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[tokio::test]
    async fn deferred_slot_renders_once() {
        let cx = RenderContext::new("/slot");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let node = Renderable::pending(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Renderable::text("a < b"))
        });

        let slot = Slot::deferred(node, &cx);
        let copy = slot.clone();
        assert_eq!(slot.render().await.expect("first").as_str(), "a &lt; b");
        assert_eq!(copy.render().await.expect("second").as_str(), "a &lt; b");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_slot_shares_error() {
        let cx = RenderContext::new("/slot");
        let slot = Slot::deferred(Renderable::rejected(RenderError::rejected("nope")), &cx);
        let first = slot.render().await.expect_err("rejected");
        let second = slot.render().await.expect_err("rejected again");
        assert_eq!(first, second);
    }
}
