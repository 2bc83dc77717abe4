//! The container: registration, resolution and diagnostics surfaces.

use std::sync::Arc;

use crate::error::DiResult;
use crate::explain::FamilyReport;
use crate::graph::{FamilyPolicy, FamilyRef, PluginGraph, Profile};
use crate::instance::{Instance, OpenInstance};
use crate::interceptor::Interceptor;
use crate::lifecycle::Lifecycle;
use crate::plugin_type::{OpenType, PluginType};
use crate::session::ResolveOptions;
use crate::settings::Settings;
use crate::traits::ResolverCore;
use crate::value::Value;

mod contexts;
mod nested;

pub use contexts::{Explicit, ProfileContext};
pub use nested::NestedContainer;

/// Runtime object-graph container.
///
/// A `Container` owns one [`PluginGraph`]. Registration and resolution both
/// take `&self`, and clones share the same graph, so a container can be
/// handed to any number of threads.
///
/// # Examples
///
/// ```rust
/// use ferrous_graph::{Constructed, Container, PluginType, Resolver};
/// use std::sync::Arc;
///
/// trait Widget: Send + Sync { fn color(&self) -> &str; }
/// struct ColorWidget { color: String }
/// impl Widget for ColorWidget { fn color(&self) -> &str { &self.color } }
///
/// let container = Container::new();
/// container.register_cast::<ColorWidget, dyn Widget, _>(|w| w as Arc<dyn Widget>);
///
/// let widget = PluginType::of::<dyn Widget>();
/// for color in ["Red", "Blue"] {
///     container.add_instance(
///         &widget,
///         Constructed::new(|args| Ok(ColorWidget { color: args.parse("color")? }))
///             .with_raw("color", color)
///             .named(color),
///     ).unwrap();
/// }
/// container.set_default_name(&widget, "Red").unwrap();
///
/// assert_eq!(container.get::<dyn Widget>().unwrap().color(), "Red");
/// assert_eq!(container.get_named::<dyn Widget>("Blue").unwrap().color(), "Blue");
///
/// container.eject_all(&widget);
/// assert!(container.get::<dyn Widget>().is_err());
/// ```
#[derive(Clone)]
pub struct Container {
    graph: Arc<PluginGraph>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            graph: PluginGraph::new(settings),
        }
    }

    pub fn settings(&self) -> &Settings {
        self.graph.settings()
    }

    pub fn graph(&self) -> &Arc<PluginGraph> {
        &self.graph
    }

    pub(crate) fn default_profile(graph: &PluginGraph) -> Option<Arc<Profile>> {
        graph.settings().profile.as_deref().and_then(|name| graph.profile(name))
    }

    // ----- Registration -----

    pub fn register_family(&self, plugin_type: &PluginType) -> FamilyRef {
        self.graph.register_family(plugin_type)
    }

    /// Adds an instance to the family of `plugin_type`; returns its name.
    ///
    /// Fails with a configuration error if the instance does not build
    /// something castable to `plugin_type`.
    pub fn add_instance(&self, plugin_type: &PluginType, instance: impl Into<Instance>) -> DiResult<String> {
        self.graph
            .add_instance(plugin_type, instance.into())
            .map(|added| added.name().to_string())
    }

    /// [`add_instance`](Self::add_instance) for the plain type `T`.
    pub fn add<T: ?Sized + 'static>(&self, instance: impl Into<Instance>) -> DiResult<String> {
        self.add_instance(&PluginType::of::<T>(), instance)
    }

    /// Adds an instance and makes it the family default.
    pub fn set_default(&self, plugin_type: &PluginType, instance: impl Into<Instance>) -> DiResult<String> {
        self.graph
            .set_default(plugin_type, instance.into())
            .map(|added| added.name().to_string())
    }

    pub fn set_default_name(&self, plugin_type: &PluginType, name: &str) -> DiResult<()> {
        self.graph.set_default_name(plugin_type, name)
    }

    /// Instance used when the family has no default (it survives `eject_all`).
    pub fn set_fallback(&self, plugin_type: &PluginType, instance: impl Into<Instance>) -> DiResult<()> {
        self.graph.set_fallback(plugin_type, instance.into())
    }

    pub fn set_lifecycle(&self, plugin_type: &PluginType, lifecycle: Lifecycle) {
        self.graph.set_lifecycle(plugin_type, Some(lifecycle));
    }

    /// Removes the named instance; returns whether it existed.
    pub fn remove_instance(&self, plugin_type: &PluginType, name: &str) -> bool {
        self.graph.remove_instance(plugin_type, name).is_some()
    }

    /// Declares that a built `C` can be used where a `T` is requested.
    pub fn register_cast<C, T, F>(&self, cast: F)
    where
        C: ?Sized + Send + Sync + 'static,
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<C>) -> Arc<T> + Send + Sync + 'static,
    {
        self.graph.register_cast::<C, T, F>(cast);
    }

    /// Registers a recipe for its declared type, used only when that type is
    /// requested without any explicit registration.
    pub fn register_concrete(&self, instance: impl Into<Instance>) -> DiResult<()> {
        self.graph.register_concrete(instance.into())
    }

    pub fn register_open(&self, open: OpenType, template: OpenInstance) {
        self.graph.register_open(open, template);
    }

    pub fn set_open_default(&self, open: OpenType, name: impl Into<String>) {
        self.graph.set_open_default(open, name);
    }

    pub fn set_open_lifecycle(&self, open: OpenType, lifecycle: Lifecycle) {
        self.graph.set_open_lifecycle(open, Some(lifecycle));
    }

    /// Attaches `template` to every closing of `open` it supports.
    pub fn connect_implementations(&self, open: OpenType, template: OpenInstance) {
        self.graph.connect_implementations(open, template);
    }

    pub fn add_policy(&self, policy: impl FamilyPolicy + 'static) {
        self.graph.add_policy(Arc::new(policy));
    }

    pub fn add_global_interceptor(&self, interceptor: impl Interceptor + 'static) {
        self.graph.add_global_interceptor(Arc::new(interceptor));
    }

    pub fn add_interceptor_for(&self, plugin_type: &PluginType, interceptor: impl Interceptor + 'static) {
        self.graph.add_interceptor_for(plugin_type, Arc::new(interceptor));
    }

    /// In `profile`, selects the family instance `name` for `plugin_type`.
    pub fn set_profile_default(&self, profile: &str, plugin_type: &PluginType, name: impl Into<String>) {
        self.graph.set_profile_default(profile, plugin_type, name);
    }

    /// Registers an instance only `profile` selects; returns its name.
    pub fn add_profile_instance(
        &self,
        profile: &str,
        plugin_type: &PluginType,
        instance: impl Into<Instance>,
    ) -> DiResult<String> {
        self.graph
            .add_profile_instance(profile, plugin_type, instance.into())
            .map(|added| added.name().to_string())
    }

    // ----- Resolution contexts -----

    /// A resolution context honoring `profile`.
    pub fn with_profile(&self, profile: impl Into<String>) -> ProfileContext {
        ProfileContext::new(self.graph.clone(), profile.into())
    }

    /// A child container with its own cache for `Scoped` objects.
    pub fn create_nested(&self) -> NestedContainer {
        NestedContainer::new(self.graph.clone(), self.settings().profile.clone())
    }

    fn explicit(&self) -> Explicit<'_> {
        Explicit::new(&self.graph, Self::default_profile(&self.graph), None)
    }

    /// One-off resolution where `plugin_type` resolves to `value`.
    pub fn with_override(&self, plugin_type: &PluginType, value: Value) -> Explicit<'_> {
        self.explicit().with_override(plugin_type, value)
    }

    /// One-off resolution where `plugin_type` is built from `instance`.
    pub fn with_instance(&self, plugin_type: &PluginType, instance: impl Into<Instance>) -> Explicit<'_> {
        self.explicit().with_instance(plugin_type, instance)
    }

    /// One-off resolution supplying `slot` of the requested constructor.
    pub fn with_arg<T: Send + Sync + 'static>(&self, slot: impl Into<String>, value: T) -> Explicit<'_> {
        self.explicit().with_arg(slot, value)
    }

    pub fn with_raw_arg(&self, slot: impl Into<String>, raw: impl Into<String>) -> Explicit<'_> {
        self.explicit().with_raw_arg(slot, raw)
    }

    // ----- Ejection and diagnostics -----

    /// Removes every instance of the family (keeping its fallback) and
    /// evicts their cached objects. Returns the number removed.
    pub fn eject_all(&self, plugin_type: &PluginType) -> usize {
        self.graph.eject_all(plugin_type)
    }

    /// Evicts cached objects of the family; registrations stay.
    ///
    /// Objects held by nested containers are not reached.
    pub fn eject_cached(&self, plugin_type: &PluginType) {
        self.graph.eject_cached(plugin_type);
    }

    pub fn explain(&self, plugin_type: &PluginType) -> DiResult<FamilyReport> {
        self.graph.explain(plugin_type)
    }

    /// Every plugin type with a family, explicit or derived.
    pub fn families(&self) -> Vec<PluginType> {
        self.graph.family_types()
    }
}

impl ResolverCore for Container {
    fn resolve_value(&self, plugin_type: &PluginType, name: Option<&str>) -> DiResult<Value> {
        let options = ResolveOptions {
            profile: Self::default_profile(&self.graph),
            ..ResolveOptions::default()
        };
        self.graph.resolve_with(plugin_type, name, options)
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container").field("graph", &self.graph).finish()
    }
}
