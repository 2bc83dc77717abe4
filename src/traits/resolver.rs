//! Resolver traits for object-graph resolution.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::graph::Lookup;
use crate::plugin_type::PluginType;
use crate::value::{Collection, Value};

/// Object-safe core of every resolution surface.
///
/// Implemented by [`Container`](crate::Container),
/// [`NestedContainer`](crate::NestedContainer),
/// [`ProfileContext`](crate::ProfileContext), [`Explicit`](crate::Explicit)
/// and [`BuildContext`](crate::BuildContext). Most users call the generic
/// methods of [`Resolver`] instead.
pub trait ResolverCore {
    /// Resolves the default instance of `plugin_type`, or the instance
    /// called `name`.
    fn resolve_value(&self, plugin_type: &PluginType, name: Option<&str>) -> DiResult<Value>;

    /// Build frames already active when this resolver is asked for something.
    fn frame_depth(&self) -> usize {
        0
    }
}

/// Typed resolution API, available on every [`ResolverCore`].
///
/// # Examples
///
/// ```rust
/// use ferrous_graph::{Container, Instance, PluginType, Resolver};
/// use std::sync::Arc;
///
/// trait Plugin: Send + Sync { fn id(&self) -> u32; }
/// struct A; impl Plugin for A { fn id(&self) -> u32 { 1 } }
/// struct B; impl Plugin for B { fn id(&self) -> u32 { 2 } }
///
/// let container = Container::new();
/// container.add::<dyn Plugin>(Instance::literal::<dyn Plugin>(Arc::new(A)).named("a")).unwrap();
/// container.add::<dyn Plugin>(Instance::literal::<dyn Plugin>(Arc::new(B)).named("b")).unwrap();
///
/// // Two instances and no explicit default
/// assert!(container.try_get::<dyn Plugin>().unwrap().is_none());
///
/// let ids: Vec<u32> = container.get_all::<dyn Plugin>().unwrap().iter().map(|p| p.id()).collect();
/// assert_eq!(ids, vec![1, 2]);
///
/// let by_name = container.lookup::<dyn Plugin>().unwrap();
/// assert_eq!(by_name.get::<dyn Plugin>("b").unwrap().id(), 2);
/// ```
pub trait Resolver: ResolverCore {
    fn resolve(&self, plugin_type: &PluginType) -> DiResult<Value> {
        self.resolve_value(plugin_type, None)
    }

    fn resolve_named(&self, plugin_type: &PluginType, name: &str) -> DiResult<Value> {
        self.resolve_value(plugin_type, Some(name))
    }

    /// Like `resolve`, but "nothing registered" for the requested type itself
    /// is `Ok(None)`. Missing dependencies further down still fail.
    fn try_resolve(&self, plugin_type: &PluginType, name: Option<&str>) -> DiResult<Option<Value>> {
        match self.resolve_value(plugin_type, name) {
            Ok(value) => Ok(Some(value)),
            Err(err) if is_own_miss(&err, self.frame_depth()) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Every instance of `element`, in registration order.
    fn resolve_all(&self, element: &PluginType) -> DiResult<Vec<Value>> {
        let collection = self
            .resolve(&PluginType::all_of(element.clone()))?
            .try_downcast::<Collection>()?;
        Ok(collection.items().to_vec())
    }

    fn get<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.resolve(&PluginType::of::<T>())?.try_downcast::<T>()
    }

    fn get_named<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> DiResult<Arc<T>> {
        self.resolve_named(&PluginType::of::<T>(), name)?.try_downcast::<T>()
    }

    /// Resolves `plugin_type` (e.g. a closed generic) and downcasts to `T`.
    fn get_as<T: ?Sized + Send + Sync + 'static>(&self, plugin_type: &PluginType) -> DiResult<Arc<T>> {
        self.resolve(plugin_type)?.try_downcast::<T>()
    }

    /// Resolves `T`, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics with the error message (including the build path) if `T`
    /// cannot be resolved.
    fn get_required<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|err| panic!("failed to resolve {}: {}", std::any::type_name::<T>(), err))
    }

    fn try_get<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        self.try_resolve(&PluginType::of::<T>(), None)?
            .map(|value| value.try_downcast::<T>())
            .transpose()
    }

    fn get_all<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        self.resolve(&PluginType::all_of(PluginType::of::<T>()))?
            .try_downcast::<Collection>()?
            .downcast_all::<T>()
    }

    /// A by-name lookup handle for `T`.
    fn lookup<T: ?Sized + 'static>(&self) -> DiResult<Arc<Lookup>> {
        self.resolve(&PluginType::lookup_of(PluginType::of::<T>()))?
            .try_downcast::<Lookup>()
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}

// A miss raised while selecting the requested instance itself, not one of
// its dependencies: the failed request is the only frame past `depth`.
fn is_own_miss(err: &DiError, depth: usize) -> bool {
    err.is_missing() && err.path().map_or(false, |path| path.len() == depth + 1)
}
