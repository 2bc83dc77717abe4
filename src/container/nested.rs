//! Nested containers: child resolution contexts with their own `Scoped` cache.

use std::sync::Arc;

use crate::cache::{ObjectCache, SharedCache};
use crate::error::DiResult;
use crate::graph::PluginGraph;
use crate::plugin_type::PluginType;
use crate::session::ResolveOptions;
use crate::traits::ResolverCore;
use crate::value::Value;

use super::Explicit;

/// A child of a [`Container`](crate::Container).
///
/// Registrations and singletons are shared with the parent. Objects with the
/// [`Scoped`](crate::Lifecycle::Scoped) lifecycle are cached in the nested
/// container and shared by every resolution made through it; the cache is
/// dropped with the nested container.
///
/// # Examples
///
/// ```rust
/// use ferrous_graph::{Container, Instance, Lifecycle, Resolver};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// struct RequestId(u32);
///
/// let counter = Arc::new(AtomicU32::new(0));
/// let container = Container::new();
/// let next = counter.clone();
/// container.add::<RequestId>(
///     Instance::from_fn(move || RequestId(next.fetch_add(1, Ordering::SeqCst)))
///         .lifecycle(Lifecycle::Scoped),
/// ).unwrap();
///
/// let request1 = container.create_nested();
/// let request2 = container.create_nested();
///
/// let a = request1.get::<RequestId>().unwrap();
/// let b = request1.get::<RequestId>().unwrap();
/// let c = request2.get::<RequestId>().unwrap();
///
/// assert!(Arc::ptr_eq(&a, &b));
/// assert!(!Arc::ptr_eq(&a, &c));
/// ```
pub struct NestedContainer {
    graph: Arc<PluginGraph>,
    profile: Option<String>,
    scoped: SharedCache,
}

impl NestedContainer {
    pub(crate) fn new(graph: Arc<PluginGraph>, profile: Option<String>) -> Self {
        Self {
            graph,
            profile,
            scoped: SharedCache::new(),
        }
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    /// Number of `Scoped` objects cached here.
    pub fn cached_len(&self) -> usize {
        self.scoped.len()
    }

    pub fn eject_cached(&self, plugin_type: &PluginType) {
        self.scoped.eject_type(plugin_type);
    }

    pub fn clear(&self) {
        self.scoped.clear();
    }

    /// Starts a one-off resolution with explicit arguments in this container.
    pub fn explicit(&self) -> Explicit<'_> {
        let profile = self.profile.as_deref().and_then(|name| self.graph.profile(name));
        Explicit::new(&self.graph, profile, Some(&self.scoped))
    }
}

impl ResolverCore for NestedContainer {
    fn resolve_value(&self, plugin_type: &PluginType, name: Option<&str>) -> DiResult<Value> {
        let options = ResolveOptions {
            profile: self.profile.as_deref().and_then(|name| self.graph.profile(name)),
            scope: Some(&self.scoped),
            explicit: None,
        };
        self.graph.resolve_with(plugin_type, name, options)
    }
}
