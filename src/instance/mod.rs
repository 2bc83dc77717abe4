//! Build recipes ("instances").
//!
//! An [`Instance`] describes how to produce one value of a plugin type. The
//! recipe itself is the closed sum type [`InstanceKind`]; the build session
//! dispatches on it with a plain `match`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::context::BuildContext;
use crate::error::DiResult;
use crate::interceptor::Interceptor;
use crate::lifecycle::Lifecycle;
use crate::plugin_type::PluginType;
use crate::value::Value;

pub mod constructed;
pub mod generic;

pub use constructed::{Args, Constructed, Constructor, Dependency, Slot};
pub use generic::OpenInstance;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an instance, used as part of object cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    fn next() -> Self {
        InstanceId(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

pub(crate) type FactoryFn = Arc<dyn Fn(&BuildContext<'_>) -> DiResult<Value> + Send + Sync>;
pub(crate) type PrototypeFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// The recipe variants.
pub enum InstanceKind {
    /// Constructor plus a dependency slot table
    Constructed(Constructor),
    /// An existing object, returned as-is on every build
    Literal(Value),
    /// A user function
    Factory(Factory),
    /// The name of another instance in the same family
    Reference(String),
    /// A template copied on every build
    Prototype(Prototype),
    /// An ordered collection of instances of one element type
    Aggregate(Aggregate),
}

impl InstanceKind {
    pub fn name(&self) -> &'static str {
        match self {
            InstanceKind::Constructed(_) => "constructed",
            InstanceKind::Literal(_) => "literal",
            InstanceKind::Factory(_) => "factory",
            InstanceKind::Reference(_) => "reference",
            InstanceKind::Prototype(_) => "prototype",
            InstanceKind::Aggregate(_) => "aggregate",
        }
    }
}

/// Opaque factory function.
pub struct Factory {
    call: FactoryFn,
}

impl Factory {
    pub(crate) fn invoke(&self, context: &BuildContext<'_>) -> DiResult<Value> {
        (self.call)(context)
    }
}

/// Opaque clonable template.
pub struct Prototype {
    copy: PrototypeFn,
}

impl Prototype {
    pub(crate) fn copy(&self) -> Value {
        (self.copy)()
    }
}

/// Children of an aggregate instance.
pub enum Aggregate {
    /// A fixed list of child instances
    List {
        element: PluginType,
        children: Vec<Arc<Instance>>,
    },
    /// Every instance registered for the element type at build time
    AllOf(PluginType),
}

impl Aggregate {
    pub fn element(&self) -> &PluginType {
        match self {
            Aggregate::List { element, .. } | Aggregate::AllOf(element) => element,
        }
    }
}

/// A named build recipe.
///
/// Instances are assembled with the constructors below, optionally refined
/// with [`named`](Self::named), [`lifecycle`](Self::lifecycle) and
/// [`intercept`](Self::intercept), and become immutable once registered.
///
/// # Examples
///
/// ```rust
/// use ferrous_graph::{Container, Instance, PluginType, Resolver};
/// use std::sync::Arc;
///
/// trait Widget: Send + Sync { fn color(&self) -> &str; }
/// struct Red;
/// impl Widget for Red { fn color(&self) -> &str { "red" } }
///
/// let container = Container::new();
/// container.add::<dyn Widget>(
///     Instance::literal::<dyn Widget>(Arc::new(Red)).named("red"),
/// ).unwrap();
///
/// let widget = container.get_named::<dyn Widget>("red").unwrap();
/// assert_eq!(widget.color(), "red");
/// ```
pub struct Instance {
    id: InstanceId,
    name: String,
    declared: Option<PluginType>,
    kind: InstanceKind,
    lifecycle: Option<Lifecycle>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Instance {
    pub(crate) fn from_kind(declared: Option<PluginType>, kind: InstanceKind) -> Self {
        let id = InstanceId::next();
        let name = match &declared {
            Some(t) => format!("{}#{}", short_name(&t.to_string()), id.0),
            None => format!("{}#{}", kind.name(), id.0),
        };
        Self {
            id,
            name,
            declared,
            kind,
            lifecycle: None,
            interceptors: Vec::new(),
        }
    }

    /// An existing shared object. Every build returns this same object.
    pub fn literal<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self::from_kind(Some(PluginType::of::<T>()), InstanceKind::Literal(Value::new(value)))
    }

    /// An owned object, wrapped once and shared from then on.
    pub fn object<T: Send + Sync + 'static>(value: T) -> Self {
        Self::literal(Arc::new(value))
    }

    /// An already type-erased object declared as `declared`.
    pub fn value(declared: PluginType, value: Value) -> Self {
        Self::from_kind(Some(declared), InstanceKind::Literal(value))
    }

    /// A context-aware factory.
    pub fn factory<T, F>(factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&BuildContext<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        let call: FactoryFn = Arc::new(move |ctx: &BuildContext<'_>| factory(ctx).map(Value::new));
        Self::from_kind(Some(PluginType::of::<T>()), InstanceKind::Factory(Factory { call }))
    }

    /// A zero-argument factory.
    pub fn from_fn<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let call: FactoryFn = Arc::new(move |_: &BuildContext<'_>| Ok(Value::from_owned(factory())));
        Self::from_kind(Some(PluginType::of::<T>()), InstanceKind::Factory(Factory { call }))
    }

    /// A factory over type-erased values, declared as `declared`.
    pub fn raw_factory<F>(declared: PluginType, factory: F) -> Self
    where
        F: Fn(&BuildContext<'_>) -> DiResult<Value> + Send + Sync + 'static,
    {
        Self::from_kind(Some(declared), InstanceKind::Factory(Factory { call: Arc::new(factory) }))
    }

    /// Points at another instance of the same family.
    pub fn reference(target: impl Into<String>) -> Self {
        Self::from_kind(None, InstanceKind::Reference(target.into()))
    }

    /// Builds an independent copy of `template` every time.
    pub fn prototype<T: Clone + Send + Sync + 'static>(template: T) -> Self {
        let copy: PrototypeFn = Arc::new(move || Value::from_owned(template.clone()));
        Self::from_kind(Some(PluginType::of::<T>()), InstanceKind::Prototype(Prototype { copy }))
    }

    /// A fixed, ordered list of child instances of `element`.
    pub fn list<I>(element: PluginType, children: impl IntoIterator<Item = I>) -> Self
    where
        I: Into<Instance>,
    {
        let children = children.into_iter().map(|c| Arc::new(c.into())).collect();
        Self::from_kind(
            Some(PluginType::all_of(element.clone())),
            InstanceKind::Aggregate(Aggregate::List { element, children }),
        )
    }

    /// Every instance registered for `element`, evaluated at build time.
    pub fn all_of(element: PluginType) -> Self {
        Self::from_kind(
            Some(PluginType::all_of(element.clone())),
            InstanceKind::Aggregate(Aggregate::AllOf(element)),
        )
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Overrides the family lifecycle for this instance.
    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn singleton(self) -> Self {
        self.lifecycle(Lifecycle::Singleton)
    }

    /// Appends an interceptor; interceptors run in the order added.
    pub fn intercept(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn intercept_arc(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type this instance declares it builds; `None` for references.
    pub fn declared_type(&self) -> Option<&PluginType> {
        self.declared.as_ref()
    }

    pub fn kind(&self) -> &InstanceKind {
        &self.kind
    }

    pub fn lifecycle_override(&self) -> Option<Lifecycle> {
        self.lifecycle
    }

    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    pub(crate) fn set_lifecycle_if_unset(&mut self, lifecycle: Option<Lifecycle>) {
        if self.lifecycle.is_none() {
            self.lifecycle = lifecycle;
        }
    }

    /// Names of the slots and children this recipe depends on.
    pub fn dependencies(&self) -> Vec<String> {
        match &self.kind {
            InstanceKind::Constructed(c) => c.slots().iter().map(|s| s.to_string()).collect(),
            InstanceKind::Reference(target) => vec![format!("-> '{}'", target)],
            InstanceKind::Aggregate(Aggregate::List { children, .. }) => {
                children.iter().map(|c| format!("'{}'", c.name())).collect()
            }
            InstanceKind::Aggregate(Aggregate::AllOf(element)) => vec![format!("all of {}", element)],
            InstanceKind::Literal(_) | InstanceKind::Factory(_) | InstanceKind::Prototype(_) => Vec::new(),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind.name())
            .field("declared", &self.declared)
            .field("lifecycle", &self.lifecycle)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

// "alloc::string::String" -> "String", keeping generic arguments intact
fn short_name(full: &str) -> &str {
    let head_end = full.find('<').unwrap_or(full.len());
    let start = full[..head_end].rfind("::").map(|i| i + 2).unwrap_or(0);
    &full[start..]
}
