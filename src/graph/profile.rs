//! Profiles: named override tables layered over family defaults.

use std::sync::Arc;

use ahash::AHashMap;

use crate::instance::Instance;
use crate::plugin_type::PluginType;

/// What a profile selects for one plugin type.
#[derive(Debug, Clone)]
pub enum ProfileEntry {
    /// An instance of the family, by name
    Named(String),
    /// An instance owned by the profile; the family is left untouched
    Owned(Arc<Instance>),
}

impl ProfileEntry {
    pub fn instance_name(&self) -> &str {
        match self {
            ProfileEntry::Named(name) => name,
            ProfileEntry::Owned(instance) => instance.name(),
        }
    }
}

/// A named set of per-type default overrides.
#[derive(Debug, Clone)]
pub struct Profile {
    name: String,
    entries: AHashMap<PluginType, ProfileEntry>,
}

impl Profile {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: AHashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self, plugin_type: &PluginType) -> Option<&ProfileEntry> {
        self.entries.get(plugin_type)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&PluginType, &ProfileEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn set(&mut self, plugin_type: PluginType, entry: ProfileEntry) -> Option<ProfileEntry> {
        self.entries.insert(plugin_type, entry)
    }
}
