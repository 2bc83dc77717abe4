//! Interceptors: post-build hooks that observe, wrap or replace built objects.
//!
//! Interceptors run after an instance has been built and cast to the
//! requested type, before the object is cached. They are applied in three
//! tiers (the instance's own, those registered for the requested type, those
//! registered for every type), each tier in registration order.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::BuildContext;
use crate::error::BoxError;
use crate::value::Value;

/// A post-build hook.
///
/// A failing interceptor aborts the resolution with
/// [`DiError::InterceptorFailure`](crate::DiError::InterceptorFailure),
/// carrying the build path.
///
/// # Examples
///
/// ```rust
/// use ferrous_graph::{BoxError, BuildContext, Container, Instance, Interceptor, Resolver, Value};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// struct Counting(Arc<AtomicUsize>);
///
/// impl Interceptor for Counting {
///     fn name(&self) -> &str { "counting" }
///
///     fn intercept(&self, value: Value, _ctx: &BuildContext<'_>) -> Result<Value, BoxError> {
///         self.0.fetch_add(1, Ordering::SeqCst);
///         Ok(value)
///     }
/// }
///
/// let builds = Arc::new(AtomicUsize::new(0));
/// let container = Container::new();
/// container.add::<u32>(Instance::from_fn(|| 7u32)).unwrap();
/// container.add_global_interceptor(Counting(builds.clone()));
///
/// container.get::<u32>().unwrap();
/// container.get::<u32>().unwrap();
/// assert_eq!(builds.load(Ordering::SeqCst), 2);
/// ```
pub trait Interceptor: Send + Sync {
    /// Name reported in errors and diagnostics.
    fn name(&self) -> &str;

    fn intercept(&self, value: Value, context: &BuildContext<'_>) -> Result<Value, BoxError>;
}

/// Interceptor over type-erased values.
pub struct FnInterceptor<F> {
    name: String,
    f: F,
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(Value, &BuildContext<'_>) -> Result<Value, BoxError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn intercept(&self, value: Value, context: &BuildContext<'_>) -> Result<Value, BoxError> {
        (self.f)(value, context)
    }
}

/// Runs a side effect on every built `T` and passes it through unchanged.
pub struct Observe<T: ?Sized, F> {
    name: String,
    f: F,
    _marker: PhantomData<fn(&T)>,
}

impl<T, F> Interceptor for Observe<T, F>
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(&Arc<T>) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn intercept(&self, value: Value, _context: &BuildContext<'_>) -> Result<Value, BoxError> {
        let typed = value.try_downcast::<T>()?;
        (self.f)(&typed);
        Ok(value)
    }
}

/// Replaces every built `T` with the result of `f`.
pub struct Decorate<T: ?Sized, F> {
    name: String,
    f: F,
    _marker: PhantomData<fn(&T)>,
}

impl<T, F> Interceptor for Decorate<T, F>
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(Arc<T>, &BuildContext<'_>) -> Arc<T> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn intercept(&self, value: Value, context: &BuildContext<'_>) -> Result<Value, BoxError> {
        let typed = value.try_downcast::<T>()?;
        Ok(Value::new((self.f)(typed, context)))
    }
}

/// Like [`Decorate`], but the replacement may fail.
pub struct TryDecorate<T: ?Sized, F> {
    name: String,
    f: F,
    _marker: PhantomData<fn(&T)>,
}

impl<T, F> Interceptor for TryDecorate<T, F>
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(Arc<T>, &BuildContext<'_>) -> Result<Arc<T>, BoxError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn intercept(&self, value: Value, context: &BuildContext<'_>) -> Result<Value, BoxError> {
        let typed = value.try_downcast::<T>()?;
        (self.f)(typed, context).map(Value::new)
    }
}

pub fn from_fn<F>(name: impl Into<String>, f: F) -> FnInterceptor<F>
where
    F: Fn(Value, &BuildContext<'_>) -> Result<Value, BoxError> + Send + Sync,
{
    FnInterceptor { name: name.into(), f }
}

pub fn observe<T, F>(name: impl Into<String>, f: F) -> Observe<T, F>
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(&Arc<T>) + Send + Sync,
{
    Observe {
        name: name.into(),
        f,
        _marker: PhantomData,
    }
}

/// Wraps every built `T`.
///
/// ```rust
/// use ferrous_graph::{interceptor, Container, Instance, Resolver};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
/// struct Plain;
/// impl Greeter for Plain { fn greet(&self) -> String { "hi".into() } }
/// struct Loud(Arc<dyn Greeter>);
/// impl Greeter for Loud { fn greet(&self) -> String { self.0.greet().to_uppercase() } }
///
/// let container = Container::new();
/// container.add::<dyn Greeter>(
///     Instance::literal::<dyn Greeter>(Arc::new(Plain))
///         .intercept(interceptor::decorate::<dyn Greeter, _>("loud", |inner, _ctx| {
///             Arc::new(Loud(inner)) as Arc<dyn Greeter>
///         })),
/// ).unwrap();
///
/// assert_eq!(container.get::<dyn Greeter>().unwrap().greet(), "HI");
/// ```
pub fn decorate<T, F>(name: impl Into<String>, f: F) -> Decorate<T, F>
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(Arc<T>, &BuildContext<'_>) -> Arc<T> + Send + Sync,
{
    Decorate {
        name: name.into(),
        f,
        _marker: PhantomData,
    }
}

pub fn try_decorate<T, F>(name: impl Into<String>, f: F) -> TryDecorate<T, F>
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(Arc<T>, &BuildContext<'_>) -> Result<Arc<T>, BoxError> + Send + Sync,
{
    TryDecorate {
        name: name.into(),
        f,
        _marker: PhantomData,
    }
}
