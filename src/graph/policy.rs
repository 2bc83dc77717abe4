//! Family derivation policies.
//!
//! When a plugin type is requested that has no explicit family, the graph asks
//! its policies whether they can derive one. Exactly one policy may apply to a
//! given type; overlapping policies are a configuration error.

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::{trace, warn};

use crate::error::{DiError, DiResult};
use crate::instance::Instance;
use crate::lifecycle::Lifecycle;
use crate::plugin_type::PluginType;
use crate::session::ResolveOptions;
use crate::value::Value;

use super::family::Family;
use super::profile::Profile;
use super::PluginGraph;

/// Derives families for types nobody registered explicitly.
///
/// # Examples
///
/// ```rust
/// use ferrous_graph::{Container, Family, FamilyPolicy, Instance, PluginGraph, PluginType, Resolver};
///
/// struct Defaults;
///
/// impl FamilyPolicy for Defaults {
///     fn name(&self) -> &'static str { "defaults" }
///
///     fn applies_to(&self, plugin_type: &PluginType, _graph: &PluginGraph) -> bool {
///         *plugin_type == PluginType::of::<u64>()
///     }
///
///     fn derive(&self, plugin_type: &PluginType, _graph: &PluginGraph) -> Option<Family> {
///         let mut family = Family::new(plugin_type.clone());
///         family.add(Instance::object(42u64));
///         Some(family)
///     }
/// }
///
/// let container = Container::new();
/// container.add_policy(Defaults);
/// assert_eq!(*container.get::<u64>().unwrap(), 42);
/// ```
pub trait FamilyPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn applies_to(&self, plugin_type: &PluginType, graph: &PluginGraph) -> bool;

    /// Builds the family, or `None` to fall through to an empty family.
    fn derive(&self, plugin_type: &PluginType, graph: &PluginGraph) -> Option<Family>;
}

/// Closes open generic families over the requested type arguments.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericClosing;

impl FamilyPolicy for GenericClosing {
    fn name(&self) -> &'static str {
        "generic-closing"
    }

    fn applies_to(&self, plugin_type: &PluginType, graph: &PluginGraph) -> bool {
        plugin_type
            .open_type()
            .map_or(false, |open| graph.has_open(open))
    }

    fn derive(&self, plugin_type: &PluginType, graph: &PluginGraph) -> Option<Family> {
        let closing = plugin_type.closing()?;
        let open = closing.open();
        if closing.args().len() != open.arity() {
            warn!(
                target: "ferrous_graph",
                plugin_type = %plugin_type,
                open = %open,
                args = closing.args().len(),
                "closing has the wrong number of type arguments"
            );
            return None;
        }

        let snapshot = graph.open_snapshot(open);
        let mut family = Family::new(plugin_type.clone());
        for template in snapshot.templates.iter().chain(snapshot.connectors.iter()) {
            if family.contains(template.name()) {
                continue;
            }
            let Some(instance) = template.close(closing.args()) else {
                trace!(target: "ferrous_graph", template = template.name(), plugin_type = %plugin_type, "template does not close");
                continue;
            };
            match graph.check_castable(plugin_type, &instance) {
                Ok(()) => {
                    family.add(instance);
                }
                Err(err) => warn!(
                    target: "ferrous_graph",
                    template = template.name(),
                    plugin_type = %plugin_type,
                    error = %err,
                    "skipping closed template"
                ),
            }
        }

        let default_name = snapshot.default_name.filter(|name| family.contains(name));
        family.set_default_name(default_name);
        family.set_lifecycle(snapshot.lifecycle);
        Some(family)
    }
}

/// Derives `AllOf(T)` as the dynamic aggregate of every instance of `T`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllInstances;

impl FamilyPolicy for AllInstances {
    fn name(&self) -> &'static str {
        "all-instances"
    }

    fn applies_to(&self, plugin_type: &PluginType, _graph: &PluginGraph) -> bool {
        plugin_type.is_all_of()
    }

    fn derive(&self, plugin_type: &PluginType, _graph: &PluginGraph) -> Option<Family> {
        let element = plugin_type.element()?.clone();
        let mut family = Family::new(plugin_type.clone());
        family.add(Instance::all_of(element).named("all"));
        // Re-evaluated on every build so newly registered instances show up
        family.set_lifecycle(Some(Lifecycle::Transient));
        Some(family)
    }
}

/// Derives `Lookup(T)` as a factory of [`Lookup`] handles.
#[derive(Debug, Default, Clone, Copy)]
pub struct NameLookup;

impl FamilyPolicy for NameLookup {
    fn name(&self) -> &'static str {
        "name-lookup"
    }

    fn applies_to(&self, plugin_type: &PluginType, _graph: &PluginGraph) -> bool {
        plugin_type.is_lookup()
    }

    fn derive(&self, plugin_type: &PluginType, graph: &PluginGraph) -> Option<Family> {
        let element = plugin_type.element()?.clone();
        let handle = graph.handle();
        let mut family = Family::new(plugin_type.clone());
        family.add(
            Instance::raw_factory(plugin_type.clone(), move |ctx| {
                Ok(Value::from_owned(Lookup {
                    graph: handle.clone(),
                    element: element.clone(),
                    profile: ctx.active_profile(),
                }))
            })
            .named("lookup"),
        );
        family.set_lifecycle(Some(Lifecycle::Transient));
        Some(family)
    }
}

/// Resolves instances of one plugin type by name.
///
/// Obtained by resolving [`PluginType::lookup_of`], or through
/// [`Resolver::lookup`](crate::Resolver::lookup). Every call is a fresh,
/// independent resolution.
pub struct Lookup {
    graph: Weak<PluginGraph>,
    element: PluginType,
    profile: Option<Arc<Profile>>,
}

impl Lookup {
    pub fn element(&self) -> &PluginType {
        &self.element
    }

    pub fn resolve(&self, name: &str) -> DiResult<Value> {
        let graph = self
            .graph
            .upgrade()
            .ok_or_else(|| DiError::configuration("lookup outlived its container"))?;
        let options = ResolveOptions {
            profile: self.profile.clone(),
            ..ResolveOptions::default()
        };
        graph.resolve_with(&self.element, Some(name), options)
    }

    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> DiResult<Arc<T>> {
        self.resolve(name)?.try_downcast::<T>()
    }

    /// Names currently registered for the element type.
    pub fn names(&self) -> Vec<String> {
        let Some(graph) = self.graph.upgrade() else {
            return Vec::new();
        };
        graph
            .existing_family(&self.element)
            .map(|family| family.read().names().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lookup")
            .field("element", &self.element)
            .field("profile", &self.profile.as_ref().map(|p| p.name()))
            .finish()
    }
}
