//! Component render engine: trees are flattened into queues, then queues are
//! written to strings or response bodies.

pub mod component;
pub mod context;
pub mod error;
pub mod html;
mod lock;
pub mod page;
pub mod props;
pub mod queue;
pub mod slot;
pub mod stats;
pub mod value;
pub mod vnode;

pub use component::{
    ComponentFactory, ComponentInstance, FnComponent, FunctionComponent, PageFunction, Propagation,
};
pub use context::{HeadElements, RenderContext, ResponseInit};
pub use error::RenderError;
pub use page::{PageSource, RenderDestination, RenderMode, render_page, render_to_string};
pub use props::{PropValue, Props};
pub use queue::{
    Metadata, NodePool, PoolConfig, QueueNode, RenderInstruction, RenderQueue, flatten,
    flatten_vnode,
};
pub use slot::{Slot, Slots};
pub use stats::{RenderStats, VNodeStats};
pub use value::{HtmlString, Renderable, ResponseSignal};
pub use vnode::{VNode, VNodeKind, VNodeProp, VNodeProps};
