//! Per-render counters for the virtual-node path.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use tracing::debug;

/// Counts of virtual nodes seen while flattening one render.
#[derive(Debug, Default)]
pub struct RenderStats {
    vnodes: AtomicU64,
    elements: AtomicU64,
    components: AtomicU64,
}

/// Point-in-time copy of [`RenderStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VNodeStats {
    pub vnode_count: u64,
    pub element_count: u64,
    pub component_count: u64,
}

impl RenderStats {
    pub(crate) fn record_vnode(&self) {
        self.vnodes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_element(&self) {
        self.elements.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_component(&self) {
        self.components.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> VNodeStats {
        VNodeStats {
            vnode_count: self.vnodes.load(Ordering::Relaxed),
            element_count: self.elements.load(Ordering::Relaxed),
            component_count: self.components.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.vnodes.store(0, Ordering::Relaxed);
        self.elements.store(0, Ordering::Relaxed);
        self.components.store(0, Ordering::Relaxed);
    }

    /// Export the counters once a render has finished. Renders that never
    /// touched the virtual-node path report nothing.
    pub fn report(&self, pathname: &str) {
        let stats = self.snapshot();
        if stats.vnode_count == 0 {
            return;
        }
        counter!("spindle_vnode_total").increment(stats.vnode_count);
        counter!("spindle_vnode_element_total").increment(stats.element_count);
        counter!("spindle_vnode_component_total").increment(stats.component_count);
        debug!(
            target: "spindle::render::vnode",
            pathname,
            vnodes = stats.vnode_count,
            elements = stats.element_count,
            components = stats.component_count,
            "virtual node statistics"
        );
    }
}
