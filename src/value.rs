//! Type-erased handles to built objects.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::plugin_type::PluginType;

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// A built object, as stored in caches and handed between build steps.
///
/// A `Value` wraps an `Arc<T>` for any `T: ?Sized + Send + Sync`, so trait
/// objects and concrete types are stored the same way. Cloning a `Value` is
/// cheap and keeps pointing at the same object.
///
/// # Examples
///
/// ```rust
/// use ferrous_graph::Value;
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync { fn hello(&self) -> String; }
/// struct English;
/// impl Greeter for English { fn hello(&self) -> String { "hello".into() } }
///
/// let value = Value::new::<dyn Greeter>(Arc::new(English));
/// let greeter = value.downcast::<dyn Greeter>().unwrap();
/// assert_eq!(greeter.hello(), "hello");
/// assert!(value.downcast::<English>().is_none());
/// ```
#[derive(Clone)]
pub struct Value {
    inner: AnyArc,
    type_name: &'static str,
}

impl Value {
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Wraps an owned object.
    pub fn from_owned<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new(Arc::new(value))
    }

    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.inner.downcast_ref::<Arc<T>>().cloned()
    }

    /// Like [`downcast`](Self::downcast) but reports the mismatch.
    pub fn try_downcast<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.downcast::<T>().ok_or(DiError::TypeMismatch {
            expected: std::any::type_name::<T>(),
            found: self.type_name,
        })
    }

    pub fn is<T: ?Sized + Send + Sync + 'static>(&self) -> bool {
        self.inner.is::<Arc<T>>()
    }

    /// Name of the type this value was stored as.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// True when both handles point at the same stored object.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.inner) as *const (),
            Arc::as_ptr(&other.inner) as *const (),
        )
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value").field("type", &self.type_name).finish()
    }
}

/// Ordered result of an aggregate build.
///
/// Resolving a [`PluginType::AllOf`] type (or an explicit list instance)
/// yields a `Value` holding a `Collection`.
#[derive(Clone, Debug)]
pub struct Collection {
    element: PluginType,
    items: Vec<Value>,
}

impl Collection {
    pub(crate) fn new(element: PluginType, items: Vec<Value>) -> Self {
        Self { element, items }
    }

    pub fn element(&self) -> &PluginType {
        &self.element
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Downcasts every item to `T`.
    pub fn downcast_all<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        self.items.iter().map(Value::try_downcast::<T>).collect()
    }
}
