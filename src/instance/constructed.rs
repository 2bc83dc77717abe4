//! Constructed instances: a constructor plus an explicit dependency slot table.
//!
//! Rust has no runtime constructor introspection, so every dependency a
//! constructor needs is declared by slot name on a [`Constructed`] builder.
//! At build time each slot is resolved (or taken as-is) and handed to the
//! constructor through [`Args`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::interceptor::Interceptor;
use crate::lifecycle::Lifecycle;
use crate::plugin_type::PluginType;
use crate::value::{Collection, Value};

use super::{Instance, InstanceKind};

type BuildFn = Arc<dyn Fn(&Args<'_>) -> DiResult<Value> + Send + Sync>;
type CtorFn<C> = Arc<dyn Fn(&Args<'_>) -> DiResult<C> + Send + Sync>;
type SetterFn<C> = Arc<dyn Fn(&mut C, &Args<'_>) -> DiResult<()> + Send + Sync>;

/// How one slot of a constructed instance gets its value.
#[derive(Clone)]
pub enum Dependency {
    /// A fixed object
    Value(Value),
    /// A raw string converted by the constructor via [`Args::parse`]
    Raw(String),
    /// An inline instance built in place
    Instance(Arc<Instance>),
    /// The default instance of a plugin type
    Default(PluginType),
    /// A named instance of a plugin type
    Named(PluginType, String),
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Value(v) => write!(f, "value {}", v.type_name()),
            Dependency::Raw(raw) => write!(f, "raw {:?}", raw),
            Dependency::Instance(i) => write!(f, "inline '{}'", i.name()),
            Dependency::Default(t) => write!(f, "{}", t),
            Dependency::Named(t, name) => write!(f, "{} '{}'", t, name),
        }
    }
}

/// A named dependency slot.
#[derive(Clone)]
pub struct Slot {
    name: String,
    dependency: Dependency,
}

impl Slot {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.dependency)
    }
}

/// A resolved slot value.
#[derive(Clone)]
pub(crate) enum Resolved {
    Value(Value),
    Raw(String),
}

/// Type-erased constructor of a [`InstanceKind::Constructed`] recipe.
pub struct Constructor {
    concrete: PluginType,
    slots: Vec<Slot>,
    build: BuildFn,
}

impl Constructor {
    /// The concrete type the constructor produces.
    pub fn concrete(&self) -> &PluginType {
        &self.concrete
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub(crate) fn invoke(&self, args: &Args<'_>) -> DiResult<Value> {
        (self.build)(args)
    }
}

/// Resolved arguments handed to a constructor.
pub struct Args<'a> {
    concrete: &'a PluginType,
    values: &'a [(String, Resolved)],
}

impl<'a> Args<'a> {
    pub(crate) fn new(concrete: &'a PluginType, values: &'a [(String, Resolved)]) -> Self {
        Self { concrete, values }
    }

    fn find(&self, slot: &str) -> Option<&'a Resolved> {
        self.values.iter().find(|(name, _)| name == slot).map(|(_, r)| r)
    }

    /// Type the constructor is building.
    pub fn concrete(&self) -> &PluginType {
        self.concrete
    }

    pub fn contains(&self, slot: &str) -> bool {
        self.find(slot).is_some()
    }

    /// The object supplied for `slot`.
    ///
    /// A raw slot can be read as `String`; other raw conversions go through
    /// [`parse`](Self::parse).
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, slot: &str) -> DiResult<Arc<T>> {
        match self.find(slot) {
            Some(Resolved::Value(value)) => value.downcast::<T>().ok_or_else(|| {
                DiError::bad_argument(
                    slot,
                    format!(
                        "expected {}, found {}",
                        std::any::type_name::<T>(),
                        value.type_name()
                    ),
                )
            }),
            Some(Resolved::Raw(raw)) => Value::from_owned(raw.clone()).downcast::<T>().ok_or_else(|| {
                DiError::bad_argument(
                    slot,
                    format!(
                        "raw value {:?} cannot be used as {}",
                        raw,
                        std::any::type_name::<T>()
                    ),
                )
            }),
            None => Err(DiError::bad_argument(slot, "no value supplied")),
        }
    }

    /// Like [`get`](Self::get), but a slot that was never declared is `None`.
    pub fn optional<T: ?Sized + Send + Sync + 'static>(&self, slot: &str) -> DiResult<Option<Arc<T>>> {
        if self.contains(slot) {
            self.get::<T>(slot).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Converts a raw slot with `FromStr`, or clones a typed value.
    pub fn parse<T>(&self, slot: &str) -> DiResult<T>
    where
        T: FromStr + Clone + Send + Sync + 'static,
        T::Err: fmt::Display,
    {
        match self.find(slot) {
            Some(Resolved::Raw(raw)) => raw.parse::<T>().map_err(|e| {
                DiError::bad_argument(
                    slot,
                    format!(
                        "cannot convert {:?} to {}: {}",
                        raw,
                        std::any::type_name::<T>(),
                        e
                    ),
                )
            }),
            Some(Resolved::Value(_)) => self.get::<T>(slot).map(|v| (*v).clone()),
            None => Err(DiError::bad_argument(slot, "no value supplied")),
        }
    }

    /// Items of an aggregate slot, in order.
    pub fn all<T: ?Sized + Send + Sync + 'static>(&self, slot: &str) -> DiResult<Vec<Arc<T>>> {
        let collection = self.get::<Collection>(slot)?;
        collection
            .downcast_all::<T>()
            .map_err(|e| DiError::bad_argument(slot, e.to_string()))
    }
}

/// Builder for constructed instances.
///
/// # Examples
///
/// ```rust
/// use ferrous_graph::{Constructed, Container, Instance, PluginType, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct Repository { db: Arc<Database>, page_size: usize }
///
/// let container = Container::new();
/// container.add::<Database>(Instance::object(Database { url: "postgres://".into() })).unwrap();
/// container
///     .add::<Repository>(
///         Constructed::new(|args| {
///             Ok(Repository {
///                 db: args.get::<Database>("db")?,
///                 page_size: args.parse("page_size")?,
///             })
///         })
///         .depends_on("db", PluginType::of::<Database>())
///         .with_raw("page_size", "50"),
///     )
///     .unwrap();
///
/// let repo = container.get::<Repository>().unwrap();
/// assert_eq!(repo.page_size, 50);
/// assert_eq!(repo.db.url, "postgres://");
/// ```
pub struct Constructed<C> {
    ctor: CtorFn<C>,
    slots: Vec<Slot>,
    setters: Vec<SetterFn<C>>,
    name: Option<String>,
    lifecycle: Option<Lifecycle>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl<C: Send + Sync + 'static> Constructed<C> {
    pub fn new<F>(ctor: F) -> Self
    where
        F: Fn(&Args<'_>) -> DiResult<C> + Send + Sync + 'static,
    {
        Self {
            ctor: Arc::new(ctor),
            slots: Vec::new(),
            setters: Vec::new(),
            name: None,
            lifecycle: None,
            interceptors: Vec::new(),
        }
    }

    // Redeclaring a slot replaces the earlier dependency.
    fn slot(mut self, name: impl Into<String>, dependency: Dependency) -> Self {
        let name = name.into();
        match self.slots.iter_mut().find(|s| s.name == name) {
            Some(existing) => existing.dependency = dependency,
            None => self.slots.push(Slot { name, dependency }),
        }
        self
    }

    /// Fixes `slot` to an owned value.
    pub fn with_value<T: Send + Sync + 'static>(self, slot: impl Into<String>, value: T) -> Self {
        self.slot(slot, Dependency::Value(Value::from_owned(value)))
    }

    /// Fixes `slot` to a shared object.
    pub fn with_shared<T: ?Sized + Send + Sync + 'static>(self, slot: impl Into<String>, value: Arc<T>) -> Self {
        self.slot(slot, Dependency::Value(Value::new(value)))
    }

    /// Fixes `slot` to a raw string for [`Args::parse`].
    pub fn with_raw(self, slot: impl Into<String>, raw: impl Into<String>) -> Self {
        self.slot(slot, Dependency::Raw(raw.into()))
    }

    /// Builds `slot` from an inline instance that is not registered anywhere.
    pub fn with_instance(self, slot: impl Into<String>, instance: impl Into<Instance>) -> Self {
        self.slot(slot, Dependency::Instance(Arc::new(instance.into())))
    }

    /// Resolves `slot` to the default instance of `plugin_type`.
    pub fn depends_on(self, slot: impl Into<String>, plugin_type: PluginType) -> Self {
        self.slot(slot, Dependency::Default(plugin_type))
    }

    pub fn depends_on_named(
        self,
        slot: impl Into<String>,
        plugin_type: PluginType,
        name: impl Into<String>,
    ) -> Self {
        self.slot(slot, Dependency::Named(plugin_type, name.into()))
    }

    /// Resolves `slot` to every instance of `element`; read with [`Args::all`].
    pub fn depends_on_all(self, slot: impl Into<String>, element: PluginType) -> Self {
        self.slot(slot, Dependency::Default(PluginType::all_of(element)))
    }

    /// Declares a post-construction slot applied with `apply`.
    pub fn setter<F>(self, slot: impl Into<String>, dependency: Dependency, apply: F) -> Self
    where
        F: Fn(&mut C, &Args<'_>) -> DiResult<()> + Send + Sync + 'static,
    {
        let mut this = self.slot(slot, dependency);
        this.setters.push(Arc::new(apply));
        this
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn singleton(self) -> Self {
        self.lifecycle(Lifecycle::Singleton)
    }

    pub fn intercept(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }
}

impl<C: Send + Sync + 'static> From<Constructed<C>> for Instance {
    fn from(constructed: Constructed<C>) -> Self {
        let Constructed {
            ctor,
            slots,
            setters,
            name,
            lifecycle,
            interceptors,
        } = constructed;

        let build: BuildFn = Arc::new(move |args: &Args<'_>| {
            let mut object = ctor(args)?;
            for setter in &setters {
                setter(&mut object, args)?;
            }
            Ok(Value::from_owned(object))
        });
        let concrete = PluginType::of::<C>();
        let kind = InstanceKind::Constructed(Constructor {
            concrete: concrete.clone(),
            slots,
            build,
        });

        let mut instance = Instance::from_kind(Some(concrete), kind);
        if let Some(name) = name {
            instance = instance.named(name);
        }
        if let Some(lifecycle) = lifecycle {
            instance = instance.lifecycle(lifecycle);
        }
        for interceptor in interceptors {
            instance = instance.intercept_arc(interceptor);
        }
        instance
    }
}
