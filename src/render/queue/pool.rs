//! Interning of literal queue content.
//!
//! A render produces many identical literals (closing tags, separators,
//! whitespace). The pool hands out shared `Arc<str>` content for repeated
//! literals so equal nodes share one allocation. Pooling never changes the
//! rendered output.

use std::{collections::HashSet, sync::Arc};

use metrics::counter;
use tracing::debug;

use super::QueueNode;

pub const DEFAULT_POOL_SIZE: usize = 1000;

/// Literals worth seeding the content cache with before a render starts.
pub const COMMON_HTML_PATTERNS: &[(LiteralKind, &str)] = &[
    (LiteralKind::HtmlString, "<div>"),
    (LiteralKind::HtmlString, "</div>"),
    (LiteralKind::HtmlString, "<span>"),
    (LiteralKind::HtmlString, "</span>"),
    (LiteralKind::HtmlString, "<p>"),
    (LiteralKind::HtmlString, "</p>"),
    (LiteralKind::HtmlString, "<li>"),
    (LiteralKind::HtmlString, "</li>"),
    (LiteralKind::HtmlString, "<ul>"),
    (LiteralKind::HtmlString, "</ul>"),
    (LiteralKind::HtmlString, "<a>"),
    (LiteralKind::HtmlString, "</a>"),
    (LiteralKind::HtmlString, "<section>"),
    (LiteralKind::HtmlString, "</section>"),
    (LiteralKind::HtmlString, "<article>"),
    (LiteralKind::HtmlString, "</article>"),
    (LiteralKind::HtmlString, "<header>"),
    (LiteralKind::HtmlString, "</header>"),
    (LiteralKind::HtmlString, "<footer>"),
    (LiteralKind::HtmlString, "</footer>"),
    (LiteralKind::HtmlString, "<main>"),
    (LiteralKind::HtmlString, "</main>"),
    (LiteralKind::HtmlString, "<nav>"),
    (LiteralKind::HtmlString, "</nav>"),
    (LiteralKind::Text, " "),
    (LiteralKind::Text, "\n"),
    (LiteralKind::Text, ","),
    (LiteralKind::Text, "true"),
];

/// The two literal node kinds the pool interns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Text,
    HtmlString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub enabled: bool,
    /// Upper bound on cached literals across both kinds.
    pub max_size: usize,
    pub content_cache: bool,
    pub track_stats: bool,
    /// Seed the cache with [`COMMON_HTML_PATTERNS`].
    pub warm: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: DEFAULT_POOL_SIZE,
            content_cache: true,
            track_stats: false,
            warm: true,
        }
    }
}

impl PoolConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_size: 0,
            content_cache: false,
            track_stats: false,
            warm: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolStats {
    pub acquire_new: u64,
    pub content_cache_hit: u64,
    pub content_cache_miss: u64,
    pub cached_entries: usize,
    pub max_size: usize,
}

impl PoolStats {
    /// Content cache hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.content_cache_hit + self.content_cache_miss;
        if lookups == 0 {
            0.0
        } else {
            self.content_cache_hit as f64 / lookups as f64 * 100.0
        }
    }
}

/// Literal interner scoped to one render. Discarded with the render.
#[derive(Debug)]
pub struct NodePool {
    config: PoolConfig,
    text: HashSet<Arc<str>>,
    html: HashSet<Arc<str>>,
    stats: PoolStats,
}

impl Default for NodePool {
    fn default() -> Self {
        Self::new(PoolConfig::disabled())
    }
}

impl NodePool {
    pub fn new(config: PoolConfig) -> Self {
        let mut pool = Self {
            config,
            text: HashSet::new(),
            html: HashSet::new(),
            stats: PoolStats {
                max_size: config.max_size,
                ..PoolStats::default()
            },
        };
        if config.warm {
            pool.warm_cache(COMMON_HTML_PATTERNS);
        }
        pool
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    fn caching(&self) -> bool {
        self.config.enabled && self.config.content_cache && self.config.max_size > 0
    }

    /// Produce a literal node, sharing content with earlier identical
    /// literals when the content cache is on.
    pub fn acquire(&mut self, kind: LiteralKind, content: &str) -> QueueNode {
        let content = self.intern(kind, content);
        match kind {
            LiteralKind::Text => QueueNode::Text { content },
            LiteralKind::HtmlString => QueueNode::HtmlString { html: content },
        }
    }

    fn intern(&mut self, kind: LiteralKind, content: &str) -> Arc<str> {
        let track = self.config.track_stats;
        if !self.caching() {
            if track {
                self.stats.acquire_new += 1;
            }
            return Arc::from(content);
        }

        let cached = self.text.len() + self.html.len();
        let cache = match kind {
            LiteralKind::Text => &mut self.text,
            LiteralKind::HtmlString => &mut self.html,
        };
        if let Some(existing) = cache.get(content) {
            if track {
                self.stats.content_cache_hit += 1;
            }
            return Arc::clone(existing);
        }

        let shared: Arc<str> = Arc::from(content);
        if cached < self.config.max_size {
            cache.insert(Arc::clone(&shared));
        }
        if track {
            self.stats.content_cache_miss += 1;
            self.stats.acquire_new += 1;
        }
        shared
    }

    /// Seed the content cache without touching statistics.
    pub fn warm_cache(&mut self, patterns: &[(LiteralKind, &str)]) {
        if !self.caching() {
            return;
        }
        for (kind, content) in patterns {
            if self.size() >= self.config.max_size {
                break;
            }
            let cache = match kind {
                LiteralKind::Text => &mut self.text,
                LiteralKind::HtmlString => &mut self.html,
            };
            if !cache.contains(*content) {
                cache.insert(Arc::from(*content));
            }
        }
    }

    /// Number of cached literals.
    pub fn size(&self) -> usize {
        self.text.len() + self.html.len()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.html.clear();
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            cached_entries: self.size(),
            ..self.stats.clone()
        }
    }

    pub fn reset_stats(&mut self) {
        self.stats = PoolStats {
            max_size: self.config.max_size,
            ..PoolStats::default()
        };
    }

    /// Log and export the pool's counters for a finished render.
    pub fn report(&self, pathname: &str) {
        if !self.config.track_stats {
            return;
        }
        let stats = self.stats();
        counter!("spindle_pool_content_cache_hit_total").increment(stats.content_cache_hit);
        counter!("spindle_pool_content_cache_miss_total").increment(stats.content_cache_miss);
        counter!("spindle_pool_acquire_new_total").increment(stats.acquire_new);
        debug!(
            target: "spindle::render::pool",
            pathname,
            acquire_new = stats.acquire_new,
            cache_hit = stats.content_cache_hit,
            cache_miss = stats.content_cache_miss,
            cached_entries = stats.cached_entries,
            hit_rate = stats.hit_rate(),
            "node pool statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::queue::NodeKind;

    fn tracking(max_size: usize) -> NodePool {
        NodePool::new(PoolConfig {
            max_size,
            track_stats: true,
            warm: false,
            ..PoolConfig::default()
        })
    }

    fn shared(node: &QueueNode) -> &Arc<str> {
        match node {
            QueueNode::Text { content } => content,
            QueueNode::HtmlString { html } => html,
            other => panic!("not a literal: {other:?}"),
        }
    }

    #[test]
    fn repeated_literals_share_content() {
        let mut pool = tracking(10);
        let first = pool.acquire(LiteralKind::HtmlString, "</div>");
        let second = pool.acquire(LiteralKind::HtmlString, "</div>");
        assert!(Arc::ptr_eq(shared(&first), shared(&second)));

        let stats = pool.stats();
        assert_eq!(stats.content_cache_hit, 1);
        assert_eq!(stats.content_cache_miss, 1);
        assert_eq!(stats.acquire_new, 1);
        assert_eq!(stats.hit_rate(), 50.0);
    }

    #[test]
    fn kinds_are_cached_separately() {
        let mut pool = tracking(10);
        let text = pool.acquire(LiteralKind::Text, "<b>");
        let html = pool.acquire(LiteralKind::HtmlString, "<b>");
        assert_eq!(text.kind(), NodeKind::Text);
        assert_eq!(html.kind(), NodeKind::HtmlString);
        assert_eq!(pool.size(), 2);
    }

    #[test]
    fn cache_is_bounded() {
        let mut pool = tracking(2);
        for literal in ["a", "b", "c", "d"] {
            pool.acquire(LiteralKind::Text, literal);
        }
        assert_eq!(pool.size(), 2);
        let node = pool.acquire(LiteralKind::Text, "d");
        assert_eq!(node.literal(), Some("d"));
        assert_eq!(pool.stats().content_cache_hit, 0);
    }

    #[test]
    fn disabled_pool_always_allocates() {
        let mut pool = NodePool::new(PoolConfig {
            enabled: false,
            track_stats: true,
            ..PoolConfig::default()
        });
        let first = pool.acquire(LiteralKind::Text, "x");
        let second = pool.acquire(LiteralKind::Text, "x");
        assert!(!Arc::ptr_eq(shared(&first), shared(&second)));
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.stats().acquire_new, 2);
    }

    #[test]
    fn warm_cache_seeds_without_stats() {
        let mut pool = NodePool::new(PoolConfig {
            track_stats: true,
            ..PoolConfig::default()
        });
        assert_eq!(pool.size(), COMMON_HTML_PATTERNS.len());
        pool.acquire(LiteralKind::HtmlString, "<p>");
        assert_eq!(pool.stats().content_cache_hit, 1);

        pool.reset_stats();
        pool.clear();
        let expected = PoolStats {
            max_size: DEFAULT_POOL_SIZE,
            ..PoolStats::default()
        };
        assert_eq!(pool.stats(), expected);
    }
}
