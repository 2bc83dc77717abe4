//! Container settings.
//!
//! Settings are fixed when a [`Container`](crate::Container) is created. They
//! can be built in code, read from `FERROUS_GRAPH_*` environment variables,
//! or (with the `config` feature) deserialized from JSON.

use std::env;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "config")]
use serde::Deserialize;

use crate::error::{DiError, DiResult};
use crate::lifecycle::Lifecycle;

const ENV_PREFIX: &str = "FERROUS_GRAPH";

/// How a family picks its default when none was set explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Deserialize), serde(rename_all = "snake_case"))]
pub enum ImplicitDefault {
    /// Only a family with exactly one instance has an implicit default
    #[default]
    SoleInstance,
    /// The first instance registered
    FirstRegistered,
    /// The most recently registered instance
    LastRegistered,
}

impl fmt::Display for ImplicitDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImplicitDefault::SoleInstance => "sole_instance",
            ImplicitDefault::FirstRegistered => "first_registered",
            ImplicitDefault::LastRegistered => "last_registered",
        })
    }
}

impl FromStr for ImplicitDefault {
    type Err = DiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "sole_instance" | "sole" => Ok(ImplicitDefault::SoleInstance),
            "first_registered" | "first" => Ok(ImplicitDefault::FirstRegistered),
            "last_registered" | "last" => Ok(ImplicitDefault::LastRegistered),
            other => Err(DiError::configuration(format!("unknown implicit default '{}'", other))),
        }
    }
}

/// Container-wide settings.
///
/// # Examples
///
/// ```rust
/// use ferrous_graph::{Container, ImplicitDefault, Lifecycle, Settings};
///
/// let settings = Settings::default()
///     .with_default_lifecycle(Lifecycle::Singleton)
///     .with_implicit_default(ImplicitDefault::LastRegistered)
///     .with_max_depth(32);
///
/// let container = Container::with_settings(settings);
/// assert_eq!(container.settings().max_depth, 32);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Deserialize), serde(default))]
pub struct Settings {
    /// Lifecycle for families and instances that do not set one
    pub default_lifecycle: Lifecycle,
    /// Default selection for families without an explicit default
    pub implicit_default: ImplicitDefault,
    /// Maximum nesting of build frames on one thread before failing with
    /// `DepthExceeded`. The default fits a 2 MiB thread stack in debug
    /// builds; raise it only together with the stack size.
    pub max_depth: usize,
    /// Install the built-in family derivation policies
    pub derive_families: bool,
    /// Profile applied when a resolution does not choose one
    pub profile: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_lifecycle: Lifecycle::Transient,
            implicit_default: ImplicitDefault::SoleInstance,
            max_depth: 64,
            derive_families: true,
            profile: None,
        }
    }
}

impl Settings {
    pub fn with_default_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.default_lifecycle = lifecycle;
        self
    }

    pub fn with_implicit_default(mut self, implicit: ImplicitDefault) -> Self {
        self.implicit_default = implicit;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_derived_families(mut self, enabled: bool) -> Self {
        self.derive_families = enabled;
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Defaults overridden by `FERROUS_GRAPH_*` environment variables.
    ///
    /// Recognised variables: `FERROUS_GRAPH_DEFAULT_LIFECYCLE`,
    /// `FERROUS_GRAPH_IMPLICIT_DEFAULT`, `FERROUS_GRAPH_MAX_DEPTH`,
    /// `FERROUS_GRAPH_DERIVE_FAMILIES` and `FERROUS_GRAPH_PROFILE`.
    pub fn from_env() -> DiResult<Self> {
        let mut settings = Settings::default();
        if let Some(value) = env_var("DEFAULT_LIFECYCLE") {
            settings.default_lifecycle = value.parse()?;
        }
        if let Some(value) = env_var("IMPLICIT_DEFAULT") {
            settings.implicit_default = value.parse()?;
        }
        if let Some(value) = env_var("MAX_DEPTH") {
            settings.max_depth = value.trim().parse().map_err(|_| {
                DiError::configuration(format!("{}_MAX_DEPTH is not a number: '{}'", ENV_PREFIX, value))
            })?;
        }
        if let Some(value) = env_var("DERIVE_FAMILIES") {
            settings.derive_families = value.trim().parse().map_err(|_| {
                DiError::configuration(format!("{}_DERIVE_FAMILIES is not a bool: '{}'", ENV_PREFIX, value))
            })?;
        }
        if let Some(value) = env_var("PROFILE") {
            settings.profile = Some(value).filter(|p| !p.is_empty());
        }
        Ok(settings)
    }

    /// Parses settings from JSON; missing fields keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(|e| DiError::configuration(format!("invalid settings: {}", e)))
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(format!("{}_{}", ENV_PREFIX, name)).ok()
}
