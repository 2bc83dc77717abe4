//! Profile and explicit-argument resolution contexts.

use std::sync::Arc;

use crate::cache::SharedCache;
use crate::error::DiResult;
use crate::graph::{PluginGraph, Profile};
use crate::instance::constructed::Resolved;
use crate::instance::Instance;
use crate::plugin_type::PluginType;
use crate::session::{ExplicitArgs, Override, ResolveOptions};
use crate::traits::ResolverCore;
use crate::value::Value;

use super::NestedContainer;

/// Resolves with a profile's overrides layered over family defaults.
///
/// The profile is looked up on every resolution, so later profile
/// registrations are picked up. A profile nobody registered changes nothing.
///
/// # Examples
///
/// ```rust
/// use ferrous_graph::{Container, Instance, PluginType, Resolver};
///
/// let container = Container::new();
/// let port = PluginType::of::<u16>();
/// container.set_default(&port, Instance::object(8080u16).named("prod")).unwrap();
/// container.add_profile_instance("test", &port, Instance::object(0u16).named("ephemeral")).unwrap();
///
/// assert_eq!(*container.get::<u16>().unwrap(), 8080);
/// assert_eq!(*container.with_profile("test").get::<u16>().unwrap(), 0);
/// ```
#[derive(Clone)]
pub struct ProfileContext {
    graph: Arc<PluginGraph>,
    name: String,
}

impl ProfileContext {
    pub(crate) fn new(graph: Arc<PluginGraph>, name: String) -> Self {
        Self { graph, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A nested container that keeps honoring this profile.
    pub fn create_nested(&self) -> NestedContainer {
        NestedContainer::new(self.graph.clone(), Some(self.name.clone()))
    }

    /// Starts a one-off resolution with explicit arguments under this profile.
    pub fn explicit(&self) -> Explicit<'_> {
        Explicit::new(&self.graph, self.graph.profile(&self.name), None)
    }
}

impl ResolverCore for ProfileContext {
    fn resolve_value(&self, plugin_type: &PluginType, name: Option<&str>) -> DiResult<Value> {
        let options = ResolveOptions {
            profile: self.graph.profile(&self.name),
            ..ResolveOptions::default()
        };
        self.graph.resolve_with(plugin_type, name, options)
    }
}

/// A one-off resolution with explicit arguments.
///
/// Overrides replace whole plugin types anywhere in the graph being built;
/// slot arguments only feed the constructor of the requested object. The
/// requested object is always built fresh, and objects built under
/// explicit arguments never enter the singleton or thread caches.
///
/// # Examples
///
/// ```rust
/// use ferrous_graph::{Constructed, Container, PluginType, Resolver};
///
/// struct Endpoint { port: u16 }
///
/// let container = Container::new();
/// container.add::<Endpoint>(
///     Constructed::new(|args| Ok(Endpoint { port: args.parse("port")? })).with_raw("port", "80"),
/// ).unwrap();
///
/// assert_eq!(container.get::<Endpoint>().unwrap().port, 80);
/// assert_eq!(container.with_raw_arg("port", "8443").get::<Endpoint>().unwrap().port, 8443);
/// ```
pub struct Explicit<'c> {
    graph: &'c PluginGraph,
    profile: Option<Arc<Profile>>,
    scope: Option<&'c SharedCache>,
    args: ExplicitArgs,
}

impl<'c> Explicit<'c> {
    pub(crate) fn new(graph: &'c PluginGraph, profile: Option<Arc<Profile>>, scope: Option<&'c SharedCache>) -> Self {
        Self {
            graph,
            profile,
            scope,
            args: ExplicitArgs::default(),
        }
    }

    pub fn with_override(mut self, plugin_type: &PluginType, value: Value) -> Self {
        self.args.set_type(plugin_type.clone(), Override::Value(value));
        self
    }

    /// Builds `plugin_type` from `instance` for this resolution.
    ///
    /// The instance is not checked for castability up front; a mismatch
    /// surfaces as `CannotConstruct` when it is built.
    pub fn with_instance(mut self, plugin_type: &PluginType, instance: impl Into<Instance>) -> Self {
        self.args
            .set_type(plugin_type.clone(), Override::Instance(Arc::new(instance.into())));
        self
    }

    pub fn with_arg<T: Send + Sync + 'static>(mut self, slot: impl Into<String>, value: T) -> Self {
        self.args
            .set_slot(slot.into(), Resolved::Value(Value::from_owned(value)));
        self
    }

    pub fn with_raw_arg(mut self, slot: impl Into<String>, raw: impl Into<String>) -> Self {
        self.args.set_slot(slot.into(), Resolved::Raw(raw.into()));
        self
    }
}

impl ResolverCore for Explicit<'_> {
    fn resolve_value(&self, plugin_type: &PluginType, name: Option<&str>) -> DiResult<Value> {
        let options = ResolveOptions {
            profile: self.profile.clone(),
            scope: self.scope,
            explicit: Some(&self.args),
        };
        self.graph.resolve_with(plugin_type, name, options)
    }
}
