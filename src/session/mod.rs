//! Build sessions: one per external resolution call.
//!
//! A session owns the frame stack of the resolution in progress (for cycle
//! detection and error paths), a per-session object cache for the `Scoped`
//! lifecycle, and the resolution options of the context it was started from
//! (profile, nested container cache, explicit arguments).

use std::cell::RefCell;
use std::sync::Arc;

use ahash::AHashMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::cache::{CacheKey, ObjectCache, SharedCache};
use crate::context::BuildContext;
use crate::error::{DiError, DiResult};
use crate::graph::{Family, PluginGraph, Profile, ProfileEntry};
use crate::instance::constructed::Resolved;
use crate::instance::{Aggregate, Args, Constructor, Dependency, Instance, InstanceKind};
use crate::interceptor::Interceptor;
use crate::internal::DepthGuard;
use crate::lifecycle::Lifecycle;
use crate::plugin_type::PluginType;
use crate::value::{Collection, Value};

mod frame;

pub use frame::{BuildFrame, BuildPath};

/// Explicit replacement for one plugin type.
#[derive(Clone)]
pub(crate) enum Override {
    Value(Value),
    Instance(Arc<Instance>),
}

/// One-off arguments for a single resolution.
#[derive(Clone, Default)]
pub(crate) struct ExplicitArgs {
    by_type: AHashMap<PluginType, Override>,
    by_slot: Vec<(String, Resolved)>,
}

impl ExplicitArgs {
    pub(crate) fn set_type(&mut self, plugin_type: PluginType, value: Override) {
        self.by_type.insert(plugin_type, value);
    }

    pub(crate) fn set_slot(&mut self, slot: String, value: Resolved) {
        match self.by_slot.iter_mut().find(|(name, _)| *name == slot) {
            Some(existing) => existing.1 = value,
            None => self.by_slot.push((slot, value)),
        }
    }

    fn for_type(&self, plugin_type: &PluginType) -> Option<&Override> {
        self.by_type.get(plugin_type)
    }

    fn for_slot(&self, slot: &str) -> Option<&Resolved> {
        self.by_slot.iter().find(|(name, _)| name == slot).map(|(_, v)| v)
    }
}

/// Where a session caches, which profile it honors and what it overrides.
#[derive(Default)]
pub(crate) struct ResolveOptions<'a> {
    pub(crate) profile: Option<Arc<Profile>>,
    pub(crate) scope: Option<&'a SharedCache>,
    pub(crate) explicit: Option<&'a ExplicitArgs>,
}

pub(crate) struct BuildSession<'a> {
    graph: &'a PluginGraph,
    frames: RefCell<SmallVec<[BuildFrame; 8]>>,
    session_cache: SharedCache,
    scope: Option<&'a SharedCache>,
    profile: Option<Arc<Profile>>,
    explicit: Option<&'a ExplicitArgs>,
}

/// Pops the frame and releases the depth level on drop.
struct FrameGuard<'s, 'a> {
    session: &'s BuildSession<'a>,
    _depth: DepthGuard,
}

impl Drop for FrameGuard<'_, '_> {
    fn drop(&mut self) {
        self.session.frames.borrow_mut().pop();
    }
}

impl<'a> BuildSession<'a> {
    pub(crate) fn new(graph: &'a PluginGraph, options: ResolveOptions<'a>) -> Self {
        Self {
            graph,
            frames: RefCell::new(SmallVec::new()),
            session_cache: SharedCache::new(),
            scope: options.scope,
            profile: options.profile,
            explicit: options.explicit,
        }
    }

    pub(crate) fn graph(&self) -> &'a PluginGraph {
        self.graph
    }

    pub(crate) fn profile(&self) -> Option<&Arc<Profile>> {
        self.profile.as_ref()
    }

    pub(crate) fn path(&self) -> BuildPath {
        BuildPath::from_frames(self.frames.borrow().iter().cloned())
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    pub(crate) fn frame(&self, index: usize) -> Option<BuildFrame> {
        self.frames.borrow().get(index).cloned()
    }

    /// Resolves the default (or the named) instance of `plugin_type`.
    pub(crate) fn resolve(&self, plugin_type: &PluginType, name: Option<&str>) -> DiResult<Value> {
        if name.is_none() {
            if let Some(explicit) = self.explicit.and_then(|e| e.for_type(plugin_type)) {
                trace!(target: "ferrous_graph", plugin_type = %plugin_type, "explicit override");
                return match explicit {
                    Override::Value(value) => Ok(value.clone()),
                    Override::Instance(instance) => self.build(plugin_type, instance, None),
                };
            }
        }

        let family = self
            .graph
            .family(plugin_type)
            .map_err(|e| e.with_path(|| self.path()))?;
        let (instance, lifecycle) = {
            let family = family.read();
            (self.select(&family, plugin_type, name)?, family.lifecycle())
        };
        self.build(plugin_type, &instance, lifecycle)
    }

    // Active frames plus one for the request that could not be satisfied.
    fn miss_path(&self, plugin_type: &PluginType, name: &str) -> BuildPath {
        let mut path = self.path();
        path.push(BuildFrame::new(plugin_type.clone(), None, name));
        path
    }

    fn select(&self, family: &Family, plugin_type: &PluginType, name: Option<&str>) -> DiResult<Arc<Instance>> {
        let unknown = |name: &str| DiError::UnknownInstance {
            plugin_type: plugin_type.name(),
            name: name.to_string(),
            path: self.miss_path(plugin_type, name),
        };

        if let Some(name) = name {
            return family.instance(name).cloned().ok_or_else(|| unknown(name));
        }

        if let Some(entry) = self.profile.as_ref().and_then(|p| p.entry(plugin_type)) {
            return match entry {
                ProfileEntry::Owned(instance) => Ok(instance.clone()),
                ProfileEntry::Named(name) => family.instance(name).cloned().ok_or_else(|| unknown(name)),
            };
        }

        family
            .default_instance(self.graph.settings().implicit_default)
            .or_else(|| family.fallback().cloned())
            .ok_or_else(|| DiError::NoDefaultInstance {
                plugin_type: plugin_type.name(),
                path: self.miss_path(plugin_type, ""),
            })
    }

    fn enter(&self, frame: BuildFrame) -> DiResult<FrameGuard<'_, 'a>> {
        {
            let frames = self.frames.borrow();
            if frames
                .iter()
                .any(|f| f.is_same_request(frame.requested(), frame.instance()))
            {
                let mut path = BuildPath::from_frames(frames.iter().cloned());
                path.push(frame);
                return Err(DiError::CycleDetected { path });
            }
        }

        let limit = self.graph.settings().max_depth;
        let depth = DepthGuard::enter(limit).map_err(|_| {
            let mut path = self.path();
            path.push(frame.clone());
            DiError::DepthExceeded { depth: limit, path }
        })?;

        self.frames.borrow_mut().push(frame);
        Ok(FrameGuard {
            session: self,
            _depth: depth,
        })
    }

    /// Builds `instance` for `requested`, honoring its lifecycle.
    pub(crate) fn build(
        &self,
        requested: &PluginType,
        instance: &Arc<Instance>,
        family_lifecycle: Option<Lifecycle>,
    ) -> DiResult<Value> {
        let frame = BuildFrame::new(
            requested.clone(),
            instance.declared_type().cloned(),
            instance.name(),
        );
        let _guard = self.enter(frame)?;

        let lifecycle = instance
            .lifecycle_override()
            .or(family_lifecycle)
            .unwrap_or(self.graph.settings().default_lifecycle);
        let key = CacheKey::new(requested.clone(), instance.id());

        // Explicit arguments only hold for this call: the root object is
        // built fresh, and graph-wide caches are read but never written.
        let explicit_root = self.explicit.is_some() && self.depth() == 1;
        let (cache, store) = match lifecycle {
            _ if explicit_root => (None, false),
            Lifecycle::Singleton | Lifecycle::ThreadLocal if self.explicit.is_some() => {
                (self.cache_for(lifecycle), false)
            }
            _ => (self.cache_for(lifecycle), true),
        };

        if let Some(cache) = cache {
            if let Some(hit) = cache.get(&key) {
                trace!(target: "ferrous_graph", plugin_type = %requested, instance = instance.name(), %lifecycle, "cache hit");
                return Ok(hit);
            }
        }

        trace!(target: "ferrous_graph", plugin_type = %requested, instance = instance.name(), kind = instance.kind().name(), "building");
        let value = self
            .build_fresh(requested, instance)
            .map_err(|e| e.with_path(|| self.path()))?;

        Ok(match cache {
            Some(cache) if store => cache.set(key, value),
            _ => value,
        })
    }

    fn cache_for(&self, lifecycle: Lifecycle) -> Option<&dyn ObjectCache> {
        if !lifecycle.caches() {
            return None;
        }
        match lifecycle {
            Lifecycle::Singleton => Some(self.graph.singletons()),
            Lifecycle::ThreadLocal => Some(self.graph.threads()),
            Lifecycle::Scoped => Some(self.scope.unwrap_or(&self.session_cache)),
            Lifecycle::Transient => None,
        }
    }

    fn build_fresh(&self, requested: &PluginType, instance: &Arc<Instance>) -> DiResult<Value> {
        let built = match instance.kind() {
            InstanceKind::Constructed(constructor) => self.construct(constructor)?,
            InstanceKind::Literal(value) => value.clone(),
            InstanceKind::Factory(factory) => factory.invoke(&BuildContext::new(self))?,
            InstanceKind::Prototype(prototype) => prototype.copy(),
            InstanceKind::Aggregate(aggregate) => self.aggregate(aggregate)?,
            InstanceKind::Reference(target) => {
                // The target already went through casting and the shared
                // interceptors; only the reference's own chain is left.
                let value = self.follow_reference(requested, target)?;
                return self.intercept(value, instance.interceptors());
            }
        };

        let value = self.cast(built, requested, instance)?;
        let mut chain: Vec<Arc<dyn Interceptor>> = instance.interceptors().to_vec();
        chain.extend(self.graph.interceptors_for(requested));
        self.intercept(value, &chain)
    }

    fn follow_reference(&self, requested: &PluginType, target: &str) -> DiResult<Value> {
        let family = self.graph.family(requested)?;
        let (instance, lifecycle) = {
            let family = family.read();
            let instance = family.instance(target).cloned().ok_or_else(|| DiError::UnknownInstance {
                plugin_type: requested.name(),
                name: target.to_string(),
                path: self.miss_path(requested, target),
            })?;
            (instance, family.lifecycle())
        };
        self.build(requested, &instance, lifecycle)
    }

    fn construct(&self, constructor: &Constructor) -> DiResult<Value> {
        let explicit = self.explicit.filter(|_| self.depth() == 1);
        let mut values: Vec<(String, Resolved)> = Vec::with_capacity(constructor.slots().len());

        for slot in constructor.slots() {
            if let Some(arg) = explicit.and_then(|e| e.for_slot(slot.name())) {
                values.push((slot.name().to_string(), arg.clone()));
                continue;
            }
            let resolved = match slot.dependency() {
                Dependency::Value(value) => Resolved::Value(value.clone()),
                Dependency::Raw(raw) => Resolved::Raw(raw.clone()),
                Dependency::Default(plugin_type) => Resolved::Value(self.resolve(plugin_type, None)?),
                Dependency::Named(plugin_type, name) => Resolved::Value(self.resolve(plugin_type, Some(name))?),
                Dependency::Instance(inline) => {
                    let declared = inline.declared_type().ok_or_else(|| {
                        DiError::bad_argument(
                            slot.name(),
                            "an inline reference has no family; use depends_on_named",
                        )
                    })?;
                    Resolved::Value(self.build(declared, inline, None)?)
                }
            };
            values.push((slot.name().to_string(), resolved));
        }

        // Explicit arguments for slots the table does not declare
        if let Some(explicit) = explicit {
            for (slot, arg) in &explicit.by_slot {
                if !values.iter().any(|(name, _)| name == slot) {
                    values.push((slot.clone(), arg.clone()));
                }
            }
        }

        constructor.invoke(&Args::new(constructor.concrete(), &values))
    }

    fn aggregate(&self, aggregate: &Aggregate) -> DiResult<Value> {
        let element = aggregate.element();
        let items = match aggregate {
            Aggregate::List { children, .. } => children
                .iter()
                .map(|child| self.build(element, child, None))
                .collect::<DiResult<Vec<_>>>()?,
            Aggregate::AllOf(_) => {
                let family = self.graph.family(element)?;
                let (instances, lifecycle) = {
                    let family = family.read();
                    (family.instances().cloned().collect::<Vec<_>>(), family.lifecycle())
                };
                instances
                    .iter()
                    .map(|instance| self.build(element, instance, lifecycle))
                    .collect::<DiResult<Vec<_>>>()?
            }
        };
        Ok(Value::from_owned(Collection::new(element.clone(), items)))
    }

    fn cast(&self, value: Value, requested: &PluginType, instance: &Instance) -> DiResult<Value> {
        match instance.declared_type() {
            Some(declared) if declared != requested => {
                self.graph.cast(&value, declared, requested).ok_or_else(|| {
                    DiError::cannot_construct(
                        declared.name(),
                        format!("no cast from {} to {}", declared, requested),
                    )
                })
            }
            _ => Ok(value),
        }
    }

    fn intercept(&self, mut value: Value, chain: &[Arc<dyn Interceptor>]) -> DiResult<Value> {
        for interceptor in chain {
            trace!(target: "ferrous_graph", interceptor = interceptor.name(), "intercepting");
            value = interceptor
                .intercept(value, &BuildContext::new(self))
                .map_err(|source| DiError::InterceptorFailure {
                    interceptor: interceptor.name().to_string(),
                    source: Arc::from(source),
                    path: self.path(),
                })?;
        }
        Ok(value)
    }
}
