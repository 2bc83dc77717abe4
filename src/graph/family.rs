//! Families: every named recipe registered for one plugin type.

use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;

use crate::instance::{Instance, InstanceKind};
use crate::lifecycle::Lifecycle;
use crate::plugin_type::PluginType;
use crate::settings::ImplicitDefault;

/// How a family's default instance is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize))]
#[cfg_attr(feature = "diagnostics", serde(rename_all = "snake_case"))]
pub enum DefaultSource {
    /// Set with `set_default` or `set_default_name`
    Explicit,
    /// Picked by the implicit default rule
    Implicit,
    /// No default; the fallback is used
    Fallback,
    None,
}

/// The registrations for one plugin type.
///
/// Instances are kept in registration order. The default instance is
/// computed lazily and memoized until the next mutation.
pub struct Family {
    plugin_type: PluginType,
    instances: IndexMap<String, Arc<Instance>>,
    default_name: Option<String>,
    fallback: Option<Arc<Instance>>,
    lifecycle: Option<Lifecycle>,
    derived_by: Option<&'static str>,
    default_cache: OnceCell<Option<Arc<Instance>>>,
}

impl Family {
    pub fn new(plugin_type: PluginType) -> Self {
        Self {
            plugin_type,
            instances: IndexMap::new(),
            default_name: None,
            fallback: None,
            lifecycle: None,
            derived_by: None,
            default_cache: OnceCell::new(),
        }
    }

    pub fn plugin_type(&self) -> &PluginType {
        &self.plugin_type
    }

    /// Adds `instance`, replacing any instance with the same name.
    ///
    /// Castability is not checked here; registrations going through the
    /// graph are checked before they reach the family.
    pub fn add(&mut self, instance: impl Into<Instance>) -> Arc<Instance> {
        self.insert(instance.into()).0
    }

    pub(crate) fn insert(&mut self, instance: Instance) -> (Arc<Instance>, Option<Arc<Instance>>) {
        let instance = Arc::new(instance);
        let replaced = self
            .instances
            .insert(instance.name().to_string(), instance.clone());
        self.invalidate();
        (instance, replaced)
    }

    pub(crate) fn insert_shared(&mut self, instance: Arc<Instance>) {
        self.instances.insert(instance.name().to_string(), instance);
        self.invalidate();
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Arc<Instance>> {
        let removed = self.instances.shift_remove(name)?;
        if self.default_name.as_deref() == Some(name) {
            self.default_name = None;
        }
        self.invalidate();
        Some(removed)
    }

    /// Drops every instance and the explicit default; keeps the fallback.
    pub(crate) fn clear(&mut self) -> Vec<Arc<Instance>> {
        self.default_name = None;
        self.invalidate();
        self.instances.drain(..).map(|(_, instance)| instance).collect()
    }

    pub fn instance(&self, name: &str) -> Option<&Arc<Instance>> {
        self.instances.get(name)
    }

    pub fn instances(&self) -> impl Iterator<Item = &Arc<Instance>> {
        self.instances.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    pub fn set_default_name(&mut self, name: Option<String>) {
        self.default_name = name;
        self.invalidate();
    }

    pub fn fallback(&self) -> Option<&Arc<Instance>> {
        self.fallback.as_ref()
    }

    pub fn set_fallback(&mut self, fallback: Option<Instance>) {
        self.fallback = fallback.map(Arc::new);
    }

    pub fn lifecycle(&self) -> Option<Lifecycle> {
        self.lifecycle
    }

    pub fn set_lifecycle(&mut self, lifecycle: Option<Lifecycle>) {
        self.lifecycle = lifecycle;
    }

    /// Name of the derivation policy that produced this family, if any.
    pub fn derived_by(&self) -> Option<&'static str> {
        self.derived_by
    }

    pub(crate) fn mark_derived(&mut self, policy: &'static str) {
        self.derived_by = Some(policy);
    }

    /// The default instance: the explicit one if set, else the implicit rule.
    ///
    /// The fallback is not part of the default.
    pub fn default_instance(&self, implicit: ImplicitDefault) -> Option<Arc<Instance>> {
        self.default_cache
            .get_or_init(|| self.compute_default(implicit))
            .clone()
    }

    fn compute_default(&self, implicit: ImplicitDefault) -> Option<Arc<Instance>> {
        if let Some(name) = &self.default_name {
            return self.instances.get(name).cloned();
        }
        match implicit {
            ImplicitDefault::SoleInstance if self.instances.len() == 1 => self.instances.values().next().cloned(),
            ImplicitDefault::SoleInstance => None,
            ImplicitDefault::FirstRegistered => self.instances.values().next().cloned(),
            ImplicitDefault::LastRegistered => self.instances.values().last().cloned(),
        }
    }

    pub fn default_source(&self, implicit: ImplicitDefault) -> DefaultSource {
        match self.default_instance(implicit) {
            Some(_) if self.default_name.is_some() => DefaultSource::Explicit,
            Some(_) => DefaultSource::Implicit,
            None if self.fallback.is_some() => DefaultSource::Fallback,
            None => DefaultSource::None,
        }
    }

    /// Follows references from `start`; returns the chain if it loops.
    pub(crate) fn reference_loop(&self, start: &str) -> Option<Vec<String>> {
        let mut chain = vec![start.to_string()];
        let mut current = self.instances.get(start)?;
        while let InstanceKind::Reference(target) = current.kind() {
            let seen = chain.iter().any(|name| name == target);
            chain.push(target.clone());
            if seen {
                return Some(chain);
            }
            current = self.instances.get(target)?;
        }
        None
    }

    fn invalidate(&mut self) {
        self.default_cache = OnceCell::new();
    }
}

impl std::fmt::Debug for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Family")
            .field("plugin_type", &self.plugin_type)
            .field("instances", &self.instances.keys().collect::<Vec<_>>())
            .field("default_name", &self.default_name)
            .field("fallback", &self.fallback.as_ref().map(|i| i.name()))
            .field("lifecycle", &self.lifecycle)
            .field("derived_by", &self.derived_by)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family() -> Family {
        Family::new(PluginType::of::<u32>())
    }

    #[test]
    fn sole_instance_is_the_implicit_default() {
        let mut f = family();
        f.add(Instance::object(1u32).named("one"));
        assert_eq!(f.default_instance(ImplicitDefault::SoleInstance).unwrap().name(), "one");
        assert_eq!(f.default_source(ImplicitDefault::SoleInstance), DefaultSource::Implicit);

        f.add(Instance::object(2u32).named("two"));
        assert!(f.default_instance(ImplicitDefault::SoleInstance).is_none());
        assert_eq!(f.default_instance(ImplicitDefault::FirstRegistered).unwrap().name(), "one");
    }

    #[test]
    fn last_registered_tracks_mutations() {
        let mut f = family();
        f.add(Instance::object(1u32).named("one"));
        assert_eq!(f.default_instance(ImplicitDefault::LastRegistered).unwrap().name(), "one");
        f.add(Instance::object(2u32).named("two"));
        assert_eq!(f.default_instance(ImplicitDefault::LastRegistered).unwrap().name(), "two");
    }

    #[test]
    fn removing_the_default_clears_it() {
        let mut f = family();
        f.add(Instance::object(1u32).named("one"));
        f.add(Instance::object(2u32).named("two"));
        f.set_default_name(Some("two".into()));
        assert_eq!(f.default_source(ImplicitDefault::SoleInstance), DefaultSource::Explicit);

        f.remove("two");
        assert!(f.default_name().is_none());
        assert_eq!(f.default_instance(ImplicitDefault::SoleInstance).unwrap().name(), "one");
    }

    #[test]
    fn clear_keeps_the_fallback() {
        let mut f = family();
        f.add(Instance::object(1u32).named("one"));
        f.set_fallback(Some(Instance::object(0u32).named("zero")));
        let removed = f.clear();
        assert_eq!(removed.len(), 1);
        assert!(f.is_empty());
        assert_eq!(f.default_source(ImplicitDefault::SoleInstance), DefaultSource::Fallback);
    }

    #[test]
    fn replacing_a_name_returns_the_old_instance() {
        let mut f = family();
        let (first, _) = f.insert(Instance::object(1u32).named("n"));
        let (_, replaced) = f.insert(Instance::object(2u32).named("n"));
        assert_eq!(replaced.unwrap().id(), first.id());
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn reference_loops_are_found() {
        let mut f = family();
        f.add(Instance::reference("b").named("a"));
        f.add(Instance::reference("a").named("b"));
        f.add(Instance::reference("real").named("c"));
        f.add(Instance::object(1u32).named("real"));

        assert_eq!(f.reference_loop("a").unwrap(), vec!["a", "b", "a"]);
        assert!(f.reference_loop("c").is_none());
    }
}
