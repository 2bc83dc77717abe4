//! Templates for open generic families.

use std::fmt;
use std::sync::Arc;

use crate::lifecycle::Lifecycle;
use crate::plugin_type::PluginType;

use super::Instance;

type Closer = Arc<dyn Fn(&[PluginType]) -> Option<Instance> + Send + Sync>;

/// An instance template registered against an [`OpenType`](crate::OpenType).
///
/// When a closed type is first requested, each template of the open family is
/// asked to close itself over the requested type arguments. A template that
/// has no recipe for those arguments is skipped.
///
/// # Examples
///
/// ```rust
/// use ferrous_graph::{Instance, OpenInstance, PluginType};
/// use std::sync::Arc;
///
/// trait Repository<T>: Send + Sync {}
/// struct MemoryRepository;
/// impl<T> Repository<T> for MemoryRepository {}
///
/// let template = OpenInstance::by_argument("memory")
///     .when::<u32, _>(|| Instance::literal::<dyn Repository<u32>>(Arc::new(MemoryRepository)))
///     .when::<String, _>(|| Instance::literal::<dyn Repository<String>>(Arc::new(MemoryRepository)));
///
/// assert!(template.close(&[PluginType::of::<u32>()]).is_some());
/// assert!(template.close(&[PluginType::of::<bool>()]).is_none());
/// ```
#[derive(Clone)]
pub struct OpenInstance {
    name: String,
    lifecycle: Option<Lifecycle>,
    closers: Vec<Closer>,
}

impl OpenInstance {
    /// A template backed by one closing function.
    pub fn new<F>(name: impl Into<String>, close: F) -> Self
    where
        F: Fn(&[PluginType]) -> Option<Instance> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            lifecycle: None,
            closers: vec![Arc::new(close)],
        }
    }

    /// A template that matches on its type arguments, see [`when`](Self::when).
    pub fn by_argument(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lifecycle: None,
            closers: Vec::new(),
        }
    }

    /// Closes over the single type argument `A` with `make`.
    pub fn when<A, F>(self, make: F) -> Self
    where
        A: ?Sized + 'static,
        F: Fn() -> Instance + Send + Sync + 'static,
    {
        self.when_args(vec![PluginType::of::<A>()], make)
    }

    /// Closes over exactly `args` with `make`.
    pub fn when_args<F>(mut self, args: Vec<PluginType>, make: F) -> Self
    where
        F: Fn() -> Instance + Send + Sync + 'static,
    {
        self.closers.push(Arc::new(move |requested: &[PluginType]| {
            if requested == args.as_slice() {
                Some(make())
            } else {
                None
            }
        }));
        self
    }

    /// Lifecycle given to closed instances that do not set their own.
    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Closes the template over `args`.
    ///
    /// The closed instance always carries the template's name so that a
    /// default chosen on the open family carries over to every closing.
    pub fn close(&self, args: &[PluginType]) -> Option<Instance> {
        let mut instance = self.closers.iter().find_map(|close| close(args))?.named(self.name.clone());
        instance.set_lifecycle_if_unset(self.lifecycle);
        Some(instance)
    }
}

impl fmt::Debug for OpenInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenInstance")
            .field("name", &self.name)
            .field("lifecycle", &self.lifecycle)
            .field("closers", &self.closers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closing_renames_and_applies_lifecycle() {
        let template = OpenInstance::new("any", |args: &[PluginType]| {
            (args.len() == 1).then(|| Instance::object(args[0].to_string()).named("ignored"))
        })
        .lifecycle(Lifecycle::Singleton);

        let closed = template.close(&[PluginType::of::<u8>()]).unwrap();
        assert_eq!(closed.name(), "any");
        assert_eq!(closed.lifecycle_override(), Some(Lifecycle::Singleton));
        assert!(template.close(&[]).is_none());
    }

    #[test]
    fn instance_lifecycle_wins_over_template() {
        let template = OpenInstance::by_argument("t")
            .when::<u8, _>(|| Instance::object(1u8).lifecycle(Lifecycle::Transient))
            .lifecycle(Lifecycle::Singleton);
        let closed = template.close(&[PluginType::of::<u8>()]).unwrap();
        assert_eq!(closed.lifecycle_override(), Some(Lifecycle::Transient));
    }
}
