//! Component factories and the instances the flattener resolves them into.

use std::{fmt, mem, sync::Arc};

use tracing::debug;

use super::{
    context::RenderContext,
    error::RenderError,
    props::Props,
    queue::Metadata,
    slot::Slots,
    value::Renderable,
    vnode::VNodeProps,
};

/// How a component takes part in head propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    #[default]
    None,
    /// The component contributes head content for itself only.
    SelfContained,
    /// The component collects head content from its whole subtree.
    InTree,
}

impl Propagation {
    pub fn is_propagating(self) -> bool {
        !matches!(self, Propagation::None)
    }
}

/// A compiled component: something that turns props and slots into a tree.
pub trait ComponentFactory: Send + Sync {
    fn name(&self) -> &str {
        "Anonymous"
    }

    fn propagation(&self) -> Propagation {
        Propagation::None
    }

    fn render(&self, cx: &RenderContext, props: &Props, slots: &Slots) -> Renderable;
}

/// A plain function used as a node type in a virtual-node tree.
pub trait FunctionComponent: Send + Sync {
    fn call(&self, props: VNodeProps) -> Renderable;
}

impl<F> FunctionComponent for F
where
    F: Fn(VNodeProps) -> Renderable + Send + Sync,
{
    fn call(&self, props: VNodeProps) -> Renderable {
        self(props)
    }
}

/// A page entry point that is not itself a component factory.
pub trait PageFunction: Send + Sync {
    fn name(&self) -> &str {
        "Page"
    }

    /// Whether head elements must be emitted ahead of the page body.
    fn needs_head_rendering(&self) -> bool {
        false
    }

    fn call(&self, cx: &RenderContext, props: Props) -> Renderable;
}

/// Closure-backed factory.
pub struct FnComponent<F> {
    name: String,
    propagation: Propagation,
    render: F,
}

impl<F> FnComponent<F>
where
    F: Fn(&RenderContext, &Props, &Slots) -> Renderable + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, render: F) -> Self {
        Self {
            name: name.into(),
            propagation: Propagation::None,
            render,
        }
    }

    pub fn propagating(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }

    pub fn into_factory(self) -> Arc<dyn ComponentFactory> {
        Arc::new(self)
    }
}

impl<F> ComponentFactory for FnComponent<F>
where
    F: Fn(&RenderContext, &Props, &Slots) -> Renderable + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn propagation(&self) -> Propagation {
        self.propagation
    }

    fn render(&self, cx: &RenderContext, props: &Props, slots: &Slots) -> Renderable {
        (self.render)(cx, props, slots)
    }
}

enum InstanceState {
    Fresh,
    Initialized(Renderable),
    Rendered,
}

/// A factory bound to its props and slots, ready to produce its body.
pub struct ComponentInstance {
    display_name: String,
    factory: Arc<dyn ComponentFactory>,
    props: Arc<Props>,
    slots: Arc<Slots>,
    state: InstanceState,
}

impl ComponentInstance {
    pub fn new(
        display_name: impl Into<String>,
        factory: Arc<dyn ComponentFactory>,
        props: Arc<Props>,
        slots: Arc<Slots>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            factory,
            props,
            slots,
            state: InstanceState::Fresh,
        }
    }

    /// Bind `factory` using whatever props, slots and display name the
    /// enclosing scope carries; without metadata the factory gets empty props.
    pub fn from_metadata(factory: Arc<dyn ComponentFactory>, metadata: Option<&Metadata>) -> Self {
        match metadata {
            Some(metadata) => {
                let display_name = metadata
                    .display_name
                    .clone()
                    .unwrap_or_else(|| factory.name().to_string());
                Self::new(
                    display_name,
                    factory,
                    Arc::clone(&metadata.props),
                    Arc::clone(&metadata.slots),
                )
            }
            None => {
                let display_name = factory.name().to_string();
                Self::new(display_name, factory, Arc::default(), Arc::default())
            }
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    pub fn is_propagating(&self) -> bool {
        self.factory.propagation().is_propagating()
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self.state, InstanceState::Fresh)
    }

    /// Run the factory ahead of rendering and return its head contribution.
    ///
    /// Pending bodies are awaited here. Calling `init` a second time is a
    /// no-op returning `None`.
    pub async fn init(&mut self, cx: &RenderContext) -> Result<Option<String>, RenderError> {
        if self.is_initialized() {
            return Ok(None);
        }

        let mut value = self.factory.render(cx, &self.props, &self.slots);
        loop {
            match value {
                Renderable::Pending(future) => value = future.await?,
                Renderable::HeadAndContent(parts) => {
                    let parts = *parts;
                    self.state = InstanceState::Initialized(parts.content);
                    return Ok(Some(parts.head).filter(|head| !head.is_empty()));
                }
                other => {
                    self.state = InstanceState::Initialized(other);
                    return Ok(None);
                }
            }
        }
    }

    /// Produce the component body. An initialized instance hands back the
    /// body captured by `init`; a second call yields an empty tree.
    pub fn render(&mut self, cx: &RenderContext) -> Renderable {
        match mem::replace(&mut self.state, InstanceState::Rendered) {
            InstanceState::Fresh => self.factory.render(cx, &self.props, &self.slots),
            InstanceState::Initialized(body) => body,
            InstanceState::Rendered => Renderable::Empty,
        }
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("display_name", &self.display_name)
            .field("props", &self.props)
            .field("propagating", &self.is_propagating())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Initialise a propagating instance and append its head contribution to the
/// render's extra head. Non-propagating or already initialised instances are
/// left untouched.
pub(crate) async fn propagate_head(
    instance: &mut ComponentInstance,
    cx: &RenderContext,
) -> Result<(), RenderError> {
    if !instance.is_propagating() || instance.is_initialized() {
        return Ok(());
    }

    debug!(
        component = %instance.display_name(),
        pathname = %cx.pathname(),
        "initialising propagating component"
    );
    let head = instance
        .init(cx)
        .await
        .map_err(|err| RenderError::propagation(instance.display_name(), err.to_string()))?;
    if let Some(head) = head {
        cx.push_extra_head(head);
    }
    Ok(())
}
