//! Error types for the object-graph container.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

use crate::session::BuildPath;

/// Boxed error returned by interceptors and user code.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Registration and resolution errors.
///
/// Resolution errors carry the [`BuildPath`] that was active when they were
/// raised: the root frame is always the original request, the last frame is
/// the instance that failed.
///
/// # Examples
///
/// ```rust
/// use ferrous_graph::{Container, DiError, PluginType, Resolver};
///
/// struct Unregistered;
///
/// let container = Container::new();
/// match container.get::<Unregistered>() {
///     Err(DiError::NoDefaultInstance { plugin_type, .. }) => {
///         assert!(plugin_type.ends_with("Unregistered"));
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// Bad registration, detected eagerly where possible
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// No explicit, implicit, profile or fallback instance could be selected
    #[error("No default instance for {plugin_type}{path}")]
    NoDefaultInstance { plugin_type: String, path: BuildPath },
    /// A named instance was requested that the family does not contain
    #[error("Unknown instance '{name}' for {plugin_type}{path}")]
    UnknownInstance {
        plugin_type: String,
        name: String,
        path: BuildPath,
    },
    /// The constructor could not produce an object
    #[error("Cannot construct {concrete}: {reason}{path}")]
    CannotConstruct {
        concrete: String,
        reason: String,
        path: BuildPath,
    },
    /// A dependency slot was missing, mistyped or unconvertible
    #[error("Bad argument '{slot}': {reason}{path}")]
    BadArgument {
        slot: String,
        reason: String,
        path: BuildPath,
    },
    /// The same (type, instance) pair appeared twice on the active path
    #[error("Cycle detected{path}")]
    CycleDetected { path: BuildPath },
    /// An interceptor rejected or failed on a freshly built object
    #[error("Interceptor '{interceptor}' failed: {source}{path}")]
    InterceptorFailure {
        interceptor: String,
        #[source]
        source: Arc<dyn StdError + Send + Sync + 'static>,
        path: BuildPath,
    },
    /// Maximum build depth exceeded
    #[error("Max depth {depth} exceeded{path}")]
    DepthExceeded { depth: usize, path: BuildPath },
    /// A resolved object was not of the requested Rust type
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl DiError {
    /// Error for user constructors and factories that cannot build.
    ///
    /// The build path is filled in by the container.
    pub fn cannot_construct(concrete: impl Into<String>, reason: impl Into<String>) -> Self {
        DiError::CannotConstruct {
            concrete: concrete.into(),
            reason: reason.into(),
            path: BuildPath::default(),
        }
    }

    /// Error for user constructors that reject an argument.
    pub fn bad_argument(slot: impl Into<String>, reason: impl Into<String>) -> Self {
        DiError::BadArgument {
            slot: slot.into(),
            reason: reason.into(),
            path: BuildPath::default(),
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        DiError::Configuration(message.into())
    }

    /// The build path attached to a resolution error.
    pub fn path(&self) -> Option<&BuildPath> {
        match self {
            DiError::NoDefaultInstance { path, .. }
            | DiError::UnknownInstance { path, .. }
            | DiError::CannotConstruct { path, .. }
            | DiError::BadArgument { path, .. }
            | DiError::CycleDetected { path }
            | DiError::InterceptorFailure { path, .. }
            | DiError::DepthExceeded { path, .. } => Some(path),
            DiError::Configuration(_) | DiError::TypeMismatch { .. } => None,
        }
    }

    /// True for the two "nothing to resolve" kinds.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            DiError::NoDefaultInstance { .. } | DiError::UnknownInstance { .. }
        )
    }

    /// Attaches `at` unless a path is already present.
    pub(crate) fn with_path(mut self, at: impl FnOnce() -> BuildPath) -> Self {
        let slot = match &mut self {
            DiError::NoDefaultInstance { path, .. }
            | DiError::UnknownInstance { path, .. }
            | DiError::CannotConstruct { path, .. }
            | DiError::BadArgument { path, .. }
            | DiError::CycleDetected { path }
            | DiError::InterceptorFailure { path, .. }
            | DiError::DepthExceeded { path, .. } => path,
            DiError::Configuration(_) | DiError::TypeMismatch { .. } => return self,
        };
        if slot.is_empty() {
            *slot = at();
        }
        self
    }
}

/// Result type for container operations
pub type DiResult<T> = Result<T, DiError>;
