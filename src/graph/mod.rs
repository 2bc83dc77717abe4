//! The type registry: plugin types, their families and everything needed to
//! derive families on demand.

use std::sync::{Arc, Weak};

use ahash::AHashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::cache::{CacheKey, ObjectCache, SharedCache, ThreadCache};
use crate::error::{DiError, DiResult};
use crate::explain::FamilyReport;
use crate::instance::{Aggregate, Instance, InstanceId, InstanceKind, OpenInstance};
use crate::interceptor::Interceptor;
use crate::lifecycle::Lifecycle;
use crate::plugin_type::{OpenType, PluginType};
use crate::session::{BuildSession, ResolveOptions};
use crate::settings::Settings;
use crate::value::Value;

pub mod family;
pub mod policy;
pub mod profile;

pub use family::{DefaultSource, Family};
pub use policy::{AllInstances, FamilyPolicy, GenericClosing, Lookup, NameLookup};
pub use profile::{Profile, ProfileEntry};

type Caster = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Shared handle to a family.
pub type FamilyRef = Arc<RwLock<Family>>;

#[derive(Default)]
struct OpenFamily {
    templates: IndexMap<String, Arc<OpenInstance>>,
    default_name: Option<String>,
    lifecycle: Option<Lifecycle>,
}

/// Point-in-time copy of an open family and its connectors.
pub(crate) struct OpenSnapshot {
    pub(crate) templates: Vec<Arc<OpenInstance>>,
    pub(crate) connectors: Vec<Arc<OpenInstance>>,
    pub(crate) default_name: Option<String>,
    pub(crate) lifecycle: Option<Lifecycle>,
}

enum InterceptorScope {
    Type(PluginType),
    All,
}

/// Registry of families plus the graph-wide caches.
///
/// A `PluginGraph` is always owned through an `Arc`; [`Container`](crate::Container)
/// is the usual way to hold one. Locks are never held while user code
/// (constructors, factories, interceptors, policies) runs.
pub struct PluginGraph {
    settings: Settings,
    me: Weak<PluginGraph>,
    families: RwLock<AHashMap<PluginType, FamilyRef>>,
    open: RwLock<AHashMap<OpenType, OpenFamily>>,
    connectors: RwLock<Vec<(OpenType, Arc<OpenInstance>)>>,
    concretes: RwLock<AHashMap<PluginType, Arc<Instance>>>,
    casts: RwLock<AHashMap<(PluginType, PluginType), Caster>>,
    policies: RwLock<Vec<Arc<dyn FamilyPolicy>>>,
    profiles: RwLock<AHashMap<String, Arc<Profile>>>,
    interceptors: RwLock<Vec<(InterceptorScope, Arc<dyn Interceptor>)>>,
    singletons: SharedCache,
    threads: ThreadCache,
}

impl PluginGraph {
    pub fn new(settings: Settings) -> Arc<Self> {
        let mut policies: Vec<Arc<dyn FamilyPolicy>> = Vec::new();
        if settings.derive_families {
            policies.push(Arc::new(GenericClosing));
            policies.push(Arc::new(AllInstances));
            policies.push(Arc::new(NameLookup));
        }
        Arc::new_cyclic(|me| PluginGraph {
            settings,
            me: me.clone(),
            families: RwLock::new(AHashMap::new()),
            open: RwLock::new(AHashMap::new()),
            connectors: RwLock::new(Vec::new()),
            concretes: RwLock::new(AHashMap::new()),
            casts: RwLock::new(AHashMap::new()),
            policies: RwLock::new(policies),
            profiles: RwLock::new(AHashMap::new()),
            interceptors: RwLock::new(Vec::new()),
            singletons: SharedCache::new(),
            threads: ThreadCache::new(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Weak handle to this graph, for objects that outlive a resolution.
    pub fn handle(&self) -> Weak<PluginGraph> {
        self.me.clone()
    }

    // ----- Families -----

    /// Finds or creates the family for `plugin_type`.
    ///
    /// Tries, in order: an existing family, the applicable derivation policy,
    /// a registered concrete recipe, and finally an empty family. A policy
    /// or recipe result is kept, so derivation runs at most once per type.
    /// The empty family is not kept: a type nobody registered stays
    /// unregistered until a registration, recipe or closing provides it.
    pub fn family(&self, plugin_type: &PluginType) -> DiResult<FamilyRef> {
        if let Some(family) = self.existing_family(plugin_type) {
            return Ok(family);
        }

        let derived = self.derive(plugin_type)?;
        if derived.derived_by().is_none() {
            return Ok(Arc::new(RwLock::new(derived)));
        }
        let mut families = self.families.write();
        Ok(families
            .entry(plugin_type.clone())
            .or_insert_with(|| Arc::new(RwLock::new(derived)))
            .clone())
    }

    fn derive(&self, plugin_type: &PluginType) -> DiResult<Family> {
        let policies: Vec<Arc<dyn FamilyPolicy>> = self.policies.read().clone();
        let applicable: Vec<&Arc<dyn FamilyPolicy>> = policies
            .iter()
            .filter(|policy| policy.applies_to(plugin_type, self))
            .collect();

        match applicable.as_slice() {
            [] => {}
            [policy] => {
                if let Some(mut family) = policy.derive(plugin_type, self) {
                    family.mark_derived(policy.name());
                    debug!(
                        target: "ferrous_graph",
                        plugin_type = %plugin_type,
                        policy = policy.name(),
                        instances = family.len(),
                        "family derived"
                    );
                    return Ok(family);
                }
            }
            many => {
                let names: Vec<&str> = many.iter().map(|p| p.name()).collect();
                return Err(DiError::configuration(format!(
                    "policies {} all apply to {}",
                    names.join(", "),
                    plugin_type
                )));
            }
        }

        let mut family = Family::new(plugin_type.clone());
        let recipe = self.concretes.read().get(plugin_type).cloned();
        if let Some(recipe) = recipe {
            family.insert_shared(recipe);
            family.mark_derived("concrete");
            debug!(target: "ferrous_graph", plugin_type = %plugin_type, "family synthesized from concrete recipe");
        }
        Ok(family)
    }

    pub fn existing_family(&self, plugin_type: &PluginType) -> Option<FamilyRef> {
        self.families.read().get(plugin_type).cloned()
    }

    /// Every plugin type with a family, explicit or derived.
    pub fn family_types(&self) -> Vec<PluginType> {
        self.families.read().keys().cloned().collect()
    }

    /// Finds or creates an explicit family, without running derivation.
    pub fn register_family(&self, plugin_type: &PluginType) -> FamilyRef {
        if let Some(family) = self.existing_family(plugin_type) {
            return family;
        }
        self.families
            .write()
            .entry(plugin_type.clone())
            .or_insert_with(|| Arc::new(RwLock::new(Family::new(plugin_type.clone()))))
            .clone()
    }

    pub fn add_instance(&self, plugin_type: &PluginType, instance: Instance) -> DiResult<Arc<Instance>> {
        self.check_castable(plugin_type, &instance)?;
        let family = self.register_family(plugin_type);
        let (added, replaced) = family.write().insert(instance);
        if let Some(old) = replaced {
            self.evict(plugin_type, old.id());
        }
        debug!(
            target: "ferrous_graph",
            plugin_type = %plugin_type,
            instance = added.name(),
            kind = added.kind().name(),
            "instance registered"
        );
        Ok(added)
    }

    /// Adds `instance` and makes it the family default.
    pub fn set_default(&self, plugin_type: &PluginType, instance: Instance) -> DiResult<Arc<Instance>> {
        let added = self.add_instance(plugin_type, instance)?;
        self.set_default_name(plugin_type, added.name())?;
        Ok(added)
    }

    pub fn set_default_name(&self, plugin_type: &PluginType, name: &str) -> DiResult<()> {
        let family = self.register_family(plugin_type);
        let mut family = family.write();
        if !family.contains(name) {
            return Err(DiError::configuration(format!(
                "cannot make '{}' the default of {}: no such instance",
                name, plugin_type
            )));
        }
        if let Some(chain) = family.reference_loop(name) {
            return Err(DiError::configuration(format!(
                "default '{}' of {} is a reference loop: {}",
                name,
                plugin_type,
                chain.join(" -> ")
            )));
        }
        family.set_default_name(Some(name.to_string()));
        debug!(target: "ferrous_graph", plugin_type = %plugin_type, instance = name, "default set");
        Ok(())
    }

    pub fn set_fallback(&self, plugin_type: &PluginType, instance: Instance) -> DiResult<()> {
        self.check_castable(plugin_type, &instance)?;
        let family = self.register_family(plugin_type);
        let previous = family.read().fallback().map(|f| f.id());
        family.write().set_fallback(Some(instance));
        if let Some(id) = previous {
            self.evict(plugin_type, id);
        }
        Ok(())
    }

    /// Sets the family lifecycle and drops objects cached under the old one.
    pub fn set_lifecycle(&self, plugin_type: &PluginType, lifecycle: Option<Lifecycle>) {
        self.register_family(plugin_type).write().set_lifecycle(lifecycle);
        self.eject_cached(plugin_type);
    }

    pub fn remove_instance(&self, plugin_type: &PluginType, name: &str) -> Option<Arc<Instance>> {
        let family = self.existing_family(plugin_type)?;
        let removed = family.write().remove(name)?;
        self.evict(plugin_type, removed.id());
        debug!(target: "ferrous_graph", plugin_type = %plugin_type, instance = name, "instance removed");
        Some(removed)
    }

    /// Removes every instance of the family, keeping its fallback.
    ///
    /// Returns how many instances were removed.
    pub fn eject_all(&self, plugin_type: &PluginType) -> usize {
        let Some(family) = self.existing_family(plugin_type) else {
            return 0;
        };
        let removed = family.write().clear();
        self.eject_cached(plugin_type);
        debug!(target: "ferrous_graph", plugin_type = %plugin_type, removed = removed.len(), "family ejected");
        removed.len()
    }

    /// Drops graph-wide cached objects built for `plugin_type`.
    pub fn eject_cached(&self, plugin_type: &PluginType) {
        self.singletons.eject_type(plugin_type);
        self.threads.eject_type(plugin_type);
    }

    fn evict(&self, plugin_type: &PluginType, instance: InstanceId) {
        let key = CacheKey::new(plugin_type.clone(), instance);
        self.singletons.eject(&key);
        self.threads.eject(&key);
    }

    // ----- Casts and castability -----

    /// Declares that a built `C` can serve requests for `T`.
    pub fn register_cast<C, T, F>(&self, cast: F)
    where
        C: ?Sized + Send + Sync + 'static,
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<C>) -> Arc<T> + Send + Sync + 'static,
    {
        let caster: Caster = Arc::new(move |value: &Value| value.downcast::<C>().map(|c| Value::new(cast(c))));
        self.casts
            .write()
            .insert((PluginType::of::<C>(), PluginType::of::<T>()), caster);
        debug!(
            target: "ferrous_graph",
            from = std::any::type_name::<C>(),
            to = std::any::type_name::<T>(),
            "cast registered"
        );
    }

    pub fn has_cast(&self, from: &PluginType, to: &PluginType) -> bool {
        self.casts.read().contains_key(&(from.clone(), to.clone()))
    }

    pub(crate) fn cast(&self, value: &Value, from: &PluginType, to: &PluginType) -> Option<Value> {
        let caster = self.casts.read().get(&(from.clone(), to.clone())).cloned()?;
        caster(value)
    }

    /// Checks that `instance` can join the family of `plugin_type`.
    pub fn check_castable(&self, plugin_type: &PluginType, instance: &Instance) -> DiResult<()> {
        if let InstanceKind::Aggregate(Aggregate::List { element, children }) = instance.kind() {
            for child in children {
                self.check_castable(element, child)?;
            }
        }
        match instance.declared_type() {
            None => Ok(()),
            Some(declared) if declared == plugin_type => Ok(()),
            Some(declared) if self.has_cast(declared, plugin_type) => Ok(()),
            Some(declared) => Err(DiError::configuration(format!(
                "instance '{}' builds {} which is not castable to {}",
                instance.name(),
                declared,
                plugin_type
            ))),
        }
    }

    // ----- Concrete recipes -----

    /// Records a recipe used to synthesize a family for its declared type
    /// when that type is requested without any registration.
    pub fn register_concrete(&self, instance: Instance) -> DiResult<()> {
        let declared = instance.declared_type().cloned().ok_or_else(|| {
            DiError::configuration(format!(
                "concrete recipe '{}' must declare the type it builds",
                instance.name()
            ))
        })?;
        debug!(target: "ferrous_graph", plugin_type = %declared, "concrete recipe registered");
        self.concretes.write().insert(declared.clone(), Arc::new(instance));

        // A family synthesized from the previous recipe is stale.
        let stale = {
            let mut families = self.families.write();
            let stale = families
                .get(&declared)
                .map_or(false, |family| family.read().derived_by() == Some("concrete"));
            if stale {
                families.remove(&declared);
            }
            stale
        };
        if stale {
            self.eject_cached(&declared);
        }
        Ok(())
    }

    // ----- Open generic families -----

    /// Adds a template to the open family of `open`.
    pub fn register_open(&self, open: OpenType, template: OpenInstance) {
        debug!(target: "ferrous_graph", open = %open, template = template.name(), "open template registered");
        self.open
            .write()
            .entry(open)
            .or_default()
            .templates
            .insert(template.name().to_string(), Arc::new(template));
        self.forget_closings(open);
    }

    pub fn set_open_default(&self, open: OpenType, name: impl Into<String>) {
        self.open.write().entry(open).or_default().default_name = Some(name.into());
        self.forget_closings(open);
    }

    pub fn set_open_lifecycle(&self, open: OpenType, lifecycle: Option<Lifecycle>) {
        self.open.write().entry(open).or_default().lifecycle = lifecycle;
        self.forget_closings(open);
    }

    /// Attaches `template` to every closing of `open` it can close over,
    /// unless the closed family already has an instance with that name.
    pub fn connect_implementations(&self, open: OpenType, template: OpenInstance) {
        debug!(target: "ferrous_graph", open = %open, template = template.name(), "connector registered");
        self.connectors.write().push((open, Arc::new(template)));
        self.forget_closings(open);
    }

    pub fn has_open(&self, open: OpenType) -> bool {
        self.open.read().contains_key(&open) || self.connectors.read().iter().any(|(o, _)| *o == open)
    }

    pub(crate) fn open_snapshot(&self, open: OpenType) -> OpenSnapshot {
        let connectors = self
            .connectors
            .read()
            .iter()
            .filter(|(o, _)| *o == open)
            .map(|(_, template)| template.clone())
            .collect();
        let families = self.open.read();
        match families.get(&open) {
            Some(family) => OpenSnapshot {
                templates: family.templates.values().cloned().collect(),
                connectors,
                default_name: family.default_name.clone(),
                lifecycle: family.lifecycle,
            },
            None => OpenSnapshot {
                templates: Vec::new(),
                connectors,
                default_name: None,
                lifecycle: None,
            },
        }
    }

    // Closed families derived before the open family changed are stale.
    fn forget_closings(&self, open: OpenType) {
        let mut forgotten = Vec::new();
        self.families.write().retain(|plugin_type, family| {
            let stale = plugin_type.open_type() == Some(open) && {
                let family = family.read();
                family.derived_by().is_some() || family.is_empty()
            };
            if stale {
                forgotten.push(plugin_type.clone());
            }
            !stale
        });
        for plugin_type in &forgotten {
            self.eject_cached(plugin_type);
        }
    }

    // ----- Policies -----

    pub fn add_policy(&self, policy: Arc<dyn FamilyPolicy>) {
        debug!(target: "ferrous_graph", policy = policy.name(), "policy added");
        self.policies.write().push(policy);
    }

    pub fn policy_names(&self) -> Vec<&'static str> {
        self.policies.read().iter().map(|p| p.name()).collect()
    }

    // ----- Profiles -----

    fn edit_profile(&self, profile: &str, plugin_type: PluginType, entry: profile::ProfileEntry) {
        let mut profiles = self.profiles.write();
        let shared = profiles
            .entry(profile.to_string())
            .or_insert_with(|| Arc::new(Profile::new(profile)));
        Arc::make_mut(shared).set(plugin_type, entry);
    }

    /// Makes the family's instance `name` the default for `plugin_type` in `profile`.
    pub fn set_profile_default(&self, profile: &str, plugin_type: &PluginType, name: impl Into<String>) {
        let name = name.into();
        debug!(target: "ferrous_graph", profile, plugin_type = %plugin_type, instance = %name, "profile default set");
        self.edit_profile(profile, plugin_type.clone(), ProfileEntry::Named(name));
    }

    /// Registers an instance that only `profile` selects; the family is not touched.
    pub fn add_profile_instance(
        &self,
        profile: &str,
        plugin_type: &PluginType,
        instance: Instance,
    ) -> DiResult<Arc<Instance>> {
        self.check_castable(plugin_type, &instance)?;
        let instance = Arc::new(instance);
        debug!(target: "ferrous_graph", profile, plugin_type = %plugin_type, instance = instance.name(), "profile instance registered");
        self.edit_profile(profile, plugin_type.clone(), ProfileEntry::Owned(instance.clone()));
        Ok(instance)
    }

    pub fn profile(&self, name: &str) -> Option<Arc<Profile>> {
        self.profiles.read().get(name).cloned()
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.read().keys().cloned().collect()
    }

    // ----- Interceptors -----

    /// Adds an interceptor applied to every built object.
    pub fn add_global_interceptor(&self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.write().push((InterceptorScope::All, interceptor));
    }

    /// Adds an interceptor applied to objects built for `plugin_type`.
    pub fn add_interceptor_for(&self, plugin_type: &PluginType, interceptor: Arc<dyn Interceptor>) {
        self.interceptors
            .write()
            .push((InterceptorScope::Type(plugin_type.clone()), interceptor));
    }

    /// Type-specific interceptors first, then the all-type ones.
    pub(crate) fn interceptors_for(&self, plugin_type: &PluginType) -> Vec<Arc<dyn Interceptor>> {
        let interceptors = self.interceptors.read();
        let typed = interceptors.iter().filter_map(|(scope, i)| match scope {
            InterceptorScope::Type(t) if t == plugin_type => Some(i.clone()),
            _ => None,
        });
        let global = interceptors.iter().filter_map(|(scope, i)| match scope {
            InterceptorScope::All => Some(i.clone()),
            InterceptorScope::Type(_) => None,
        });
        typed.chain(global).collect()
    }

    // ----- Caches and resolution -----

    pub(crate) fn singletons(&self) -> &SharedCache {
        &self.singletons
    }

    pub(crate) fn threads(&self) -> &ThreadCache {
        &self.threads
    }

    pub(crate) fn resolve_with(
        &self,
        plugin_type: &PluginType,
        name: Option<&str>,
        options: ResolveOptions<'_>,
    ) -> DiResult<Value> {
        BuildSession::new(self, options).resolve(plugin_type, name)
    }

    /// Describes the family of `plugin_type`, deriving it if needed.
    pub fn explain(&self, plugin_type: &PluginType) -> DiResult<FamilyReport> {
        let family = self.family(plugin_type)?;
        let profiles: Vec<Arc<Profile>> = self.profiles.read().values().cloned().collect();
        let family = family.read();
        Ok(FamilyReport::new(&family, &self.settings, &profiles))
    }
}

impl std::fmt::Debug for PluginGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginGraph")
            .field("families", &self.families.read().len())
            .field("policies", &self.policy_names())
            .field("singletons", &self.singletons.len())
            .finish()
    }
}
