//! Human-readable (and, with `diagnostics`, serializable) family reports.

use std::fmt;
use std::sync::Arc;

use crate::graph::{DefaultSource, Family, Profile};
use crate::lifecycle::Lifecycle;
use crate::settings::Settings;

#[cfg(feature = "diagnostics")]
use serde::Serialize;

/// What `explain` knows about one family.
///
/// # Examples
///
/// ```rust
/// use ferrous_graph::{Container, DefaultSource, Instance, PluginType};
///
/// let container = Container::new();
/// container.add::<u32>(Instance::object(1u32).named("one")).unwrap();
/// container.add::<u32>(Instance::object(2u32).named("two")).unwrap();
/// container.set_default_name(&PluginType::of::<u32>(), "two").unwrap();
///
/// let report = container.explain(&PluginType::of::<u32>()).unwrap();
/// assert_eq!(report.default.as_deref(), Some("two"));
/// assert_eq!(report.default_source, DefaultSource::Explicit);
/// assert_eq!(report.instances.len(), 2);
/// println!("{}", report);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "diagnostics", derive(Serialize))]
pub struct FamilyReport {
    pub plugin_type: String,
    /// Lifecycle set on the family itself
    pub lifecycle: Option<Lifecycle>,
    /// Lifecycle instances without an override get
    pub effective_lifecycle: Lifecycle,
    pub default: Option<String>,
    pub default_source: DefaultSource,
    pub fallback: Option<String>,
    /// Policy that derived the family, if it was not registered explicitly
    pub derived_by: Option<String>,
    pub instances: Vec<InstanceReport>,
    pub profiles: Vec<ProfileOverride>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "diagnostics", derive(Serialize))]
pub struct InstanceReport {
    pub name: String,
    pub kind: &'static str,
    pub declared_type: Option<String>,
    pub lifecycle: Option<Lifecycle>,
    pub interceptors: Vec<String>,
    pub dependencies: Vec<String>,
}

/// A profile that changes the default of the family.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "diagnostics", derive(Serialize))]
pub struct ProfileOverride {
    pub profile: String,
    pub instance: String,
    /// True when the instance belongs to the profile, not the family
    pub owned: bool,
}

impl FamilyReport {
    pub(crate) fn new(family: &Family, settings: &Settings, profiles: &[Arc<Profile>]) -> Self {
        let implicit = settings.implicit_default;
        let mut overrides: Vec<ProfileOverride> = profiles
            .iter()
            .filter_map(|profile| {
                let entry = profile.entry(family.plugin_type())?;
                Some(ProfileOverride {
                    profile: profile.name().to_string(),
                    instance: entry.instance_name().to_string(),
                    owned: matches!(entry, crate::graph::ProfileEntry::Owned(_)),
                })
            })
            .collect();
        overrides.sort_by(|a, b| a.profile.cmp(&b.profile));

        Self {
            plugin_type: family.plugin_type().to_string(),
            lifecycle: family.lifecycle(),
            effective_lifecycle: family.lifecycle().unwrap_or(settings.default_lifecycle),
            default: family
                .default_instance(implicit)
                .map(|instance| instance.name().to_string()),
            default_source: family.default_source(implicit),
            fallback: family.fallback().map(|f| f.name().to_string()),
            derived_by: family.derived_by().map(str::to_string),
            instances: family
                .instances()
                .map(|instance| InstanceReport {
                    name: instance.name().to_string(),
                    kind: instance.kind().name(),
                    declared_type: instance.declared_type().map(|t| t.to_string()),
                    lifecycle: instance.lifecycle_override(),
                    interceptors: instance
                        .interceptors()
                        .iter()
                        .map(|i| i.name().to_string())
                        .collect(),
                    dependencies: instance.dependencies(),
                })
                .collect(),
            profiles: overrides,
        }
    }

    /// Pretty-printed JSON.
    #[cfg(feature = "diagnostics")]
    pub fn to_json(&self) -> crate::DiResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::DiError::Configuration(format!("cannot serialize report: {}", e)))
    }
}

impl fmt::Display for FamilyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.plugin_type)?;
        match self.lifecycle {
            Some(lifecycle) => writeln!(f, "  lifecycle: {}", lifecycle)?,
            None => writeln!(f, "  lifecycle: {} (default)", self.effective_lifecycle)?,
        }
        if let Some(policy) = &self.derived_by {
            writeln!(f, "  derived by: {}", policy)?;
        }
        match (&self.default, self.default_source) {
            (Some(name), DefaultSource::Explicit) => writeln!(f, "  default: '{}'", name)?,
            (Some(name), _) => writeln!(f, "  default: '{}' (implicit)", name)?,
            (None, _) => writeln!(f, "  default: none")?,
        }
        if let Some(fallback) = &self.fallback {
            writeln!(f, "  fallback: '{}'", fallback)?;
        }
        if self.instances.is_empty() {
            writeln!(f, "  no instances")?;
        }
        for instance in &self.instances {
            write!(f, "  - '{}' [{}]", instance.name, instance.kind)?;
            if let Some(declared) = &instance.declared_type {
                write!(f, " builds {}", declared)?;
            }
            if let Some(lifecycle) = instance.lifecycle {
                write!(f, ", {}", lifecycle)?;
            }
            writeln!(f)?;
            for dependency in &instance.dependencies {
                writeln!(f, "      {}", dependency)?;
            }
            for interceptor in &instance.interceptors {
                writeln!(f, "      intercepted by {}", interceptor)?;
            }
        }
        for profile in &self.profiles {
            writeln!(f, "  profile '{}' -> '{}'", profile.profile, profile.instance)?;
        }
        Ok(())
    }
}
