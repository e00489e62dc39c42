use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "spindle_pool_content_cache_hit_total",
            Unit::Count,
            "Literal lookups served from a render's content cache."
        );
        describe_counter!(
            "spindle_pool_content_cache_miss_total",
            Unit::Count,
            "Literal lookups that missed a render's content cache."
        );
        describe_counter!(
            "spindle_pool_acquire_new_total",
            Unit::Count,
            "Literal queue nodes allocated fresh instead of shared."
        );
        describe_counter!(
            "spindle_vnode_total",
            Unit::Count,
            "Virtual nodes flattened into render queues."
        );
        describe_counter!(
            "spindle_vnode_element_total",
            Unit::Count,
            "HTML elements serialised from virtual nodes."
        );
        describe_counter!(
            "spindle_vnode_component_total",
            Unit::Count,
            "Component virtual nodes turned into instances."
        );
        describe_counter!(
            "spindle_pages_rendered_total",
            Unit::Count,
            "Pages rendered over HTTP, labelled by render mode."
        );
    });
}
