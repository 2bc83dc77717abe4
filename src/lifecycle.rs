//! Lifecycle definitions.

use std::fmt;
use std::str::FromStr;

#[cfg(any(feature = "config", feature = "diagnostics"))]
use serde::{Deserialize, Serialize};

use crate::error::DiError;

/// Caching discipline applied to a resolved object
///
/// A lifecycle decides whether a previously built object is reused. It can be
/// set per family ([`Container::set_lifecycle`](crate::Container::set_lifecycle))
/// or per instance ([`Instance::lifecycle`](crate::Instance::lifecycle)); when
/// neither is set the container's [`Settings::default_lifecycle`](crate::Settings)
/// applies.
///
/// # Examples
///
/// ```rust
/// use ferrous_graph::{Container, Instance, Lifecycle, Resolver};
/// use std::sync::Arc;
///
/// struct Clock;
///
/// let container = Container::new();
/// container.add::<Clock>(Instance::from_fn(|| Clock).lifecycle(Lifecycle::Singleton)).unwrap();
///
/// let a = container.get_required::<Clock>();
/// let b = container.get_required::<Clock>();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(any(feature = "config", feature = "diagnostics"), derive(Serialize, Deserialize))]
#[cfg_attr(any(feature = "config", feature = "diagnostics"), serde(rename_all = "snake_case"))]
pub enum Lifecycle {
    /// New object per resolution, never cached
    #[default]
    Transient,
    /// One object per container, shared by every session, scope and thread
    Singleton,
    /// One object per calling thread
    ThreadLocal,
    /// One object per build session, or per nested container when resolving
    /// through one
    Scoped,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Transient => "transient",
            Lifecycle::Singleton => "singleton",
            Lifecycle::ThreadLocal => "thread_local",
            Lifecycle::Scoped => "scoped",
        }
    }

    /// Whether built objects are stored at all.
    pub fn caches(&self) -> bool {
        !matches!(self, Lifecycle::Transient)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lifecycle {
    type Err = DiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "transient" => Ok(Lifecycle::Transient),
            "singleton" => Ok(Lifecycle::Singleton),
            "thread_local" | "thread" => Ok(Lifecycle::ThreadLocal),
            "scoped" | "session" => Ok(Lifecycle::Scoped),
            other => Err(DiError::configuration(format!("unknown lifecycle '{}'", other))),
        }
    }
}
