//! Build context handed to factories and interceptors.

use std::sync::Arc;

use crate::error::DiResult;
use crate::graph::{PluginGraph, Profile};
use crate::plugin_type::PluginType;
use crate::session::{BuildFrame, BuildPath, BuildSession};
use crate::traits::ResolverCore;
use crate::value::Value;

/// View of the build session in progress.
///
/// Resolutions made through a `BuildContext` join the current session: they
/// share its cycle detection, its `Scoped` cache and its profile.
///
/// # Examples
///
/// ```rust
/// use ferrous_graph::{Container, Instance, PluginType, Resolver};
/// use std::sync::Arc;
///
/// struct Config { name: String }
/// struct Service { config: Arc<Config>, built_for: String }
///
/// let container = Container::new();
/// container.add::<Config>(Instance::object(Config { name: "app".into() })).unwrap();
/// container.add::<Service>(Instance::factory(|ctx| {
///     Ok(Arc::new(Service {
///         config: ctx.get::<Config>()?,
///         built_for: ctx.root().map(|f| f.requested().to_string()).unwrap_or_default(),
///     }))
/// })).unwrap();
///
/// let service = container.get::<Service>().unwrap();
/// assert_eq!(service.config.name, "app");
/// assert!(service.built_for.ends_with("Service"));
/// ```
pub struct BuildContext<'a> {
    session: &'a BuildSession<'a>,
}

impl<'a> BuildContext<'a> {
    pub(crate) fn new(session: &'a BuildSession<'a>) -> Self {
        Self { session }
    }

    /// Frames from the external request down to the object being built.
    pub fn path(&self) -> BuildPath {
        self.session.path()
    }

    /// The frame of the original request.
    pub fn root(&self) -> Option<BuildFrame> {
        self.session.frame(0)
    }

    /// The frame of the object being built.
    pub fn current(&self) -> Option<BuildFrame> {
        self.session.depth().checked_sub(1).and_then(|i| self.session.frame(i))
    }

    /// The frame of the object that needs the one being built.
    pub fn parent(&self) -> Option<BuildFrame> {
        self.session.depth().checked_sub(2).and_then(|i| self.session.frame(i))
    }

    pub fn depth(&self) -> usize {
        self.session.depth()
    }

    /// Name of the active profile, if any.
    pub fn profile(&self) -> Option<&str> {
        self.session.profile().map(|p| p.name())
    }

    pub fn graph(&self) -> &PluginGraph {
        self.session.graph()
    }

    pub(crate) fn active_profile(&self) -> Option<Arc<Profile>> {
        self.session.profile().cloned()
    }
}

impl ResolverCore for BuildContext<'_> {
    fn resolve_value(&self, plugin_type: &PluginType, name: Option<&str>) -> DiResult<Value> {
        self.session.resolve(plugin_type, name)
    }

    fn frame_depth(&self) -> usize {
        self.session.depth()
    }
}
