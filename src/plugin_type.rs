//! Plugin type descriptors used as registry keys.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Runtime descriptor of an abstract type requested from the container.
///
/// Families are keyed by `PluginType`. Most code obtains one with
/// [`PluginType::of`]; the other shapes exist so that the family derivation
/// policies can recognise requests they know how to satisfy:
///
/// - **Type**: a plain Rust type, sized or `dyn Trait`
/// - **Closed**: a Rust type that is the closing of an [`OpenType`] over
///   some type arguments (see [`OpenType::close`])
/// - **AllOf**: "every registered instance of T"
/// - **Lookup**: "a function from instance name to T"
///
/// # Examples
///
/// ```rust
/// use ferrous_graph::{OpenType, PluginType};
///
/// trait Repository<T>: Send + Sync {}
///
/// const REPOSITORY: OpenType = OpenType::new("Repository", 1);
///
/// let plain = PluginType::of::<String>();
/// let closed = REPOSITORY.close::<dyn Repository<i32>>([PluginType::of::<i32>()]);
///
/// // A closed type is still the same Rust type
/// assert_eq!(closed, PluginType::of::<dyn Repository<i32>>());
/// assert_eq!(closed.open_type(), Some(REPOSITORY));
/// assert_ne!(plain, PluginType::all_of(plain.clone()));
/// ```
#[derive(Clone)]
pub enum PluginType {
    /// Plain type with TypeId and name for diagnostics
    Type(TypeId, &'static str),
    /// Closing of an open generic shape
    Closed(TypeId, &'static str, Closing),
    /// Every registered instance of the element type
    AllOf(Arc<PluginType>),
    /// Name-indexed lookup of the element type
    Lookup(Arc<PluginType>),
}

/// Open shape and arguments of a [`PluginType::Closed`] type.
#[derive(Clone, Debug)]
pub struct Closing {
    open: OpenType,
    args: Arc<[PluginType]>,
}

impl Closing {
    pub fn open(&self) -> OpenType {
        self.open
    }

    pub fn args(&self) -> &[PluginType] {
        &self.args
    }
}

/// An open generic shape such as `Repository<_>`.
///
/// Rust erases generics at runtime, so open shapes are declared by name and
/// arity. Families registered against an open type are closed on demand when
/// a matching [`PluginType::Closed`] is first requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpenType {
    name: &'static str,
    arity: usize,
}

impl OpenType {
    pub const fn new(name: &'static str, arity: usize) -> Self {
        Self { name, arity }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Describes the Rust type `T` as this shape closed over `args`.
    ///
    /// Arity is not enforced here; a closing with the wrong number of
    /// arguments is simply never matched by the generic-closing policy.
    pub fn close<T: ?Sized + 'static>(
        &self,
        args: impl IntoIterator<Item = PluginType>,
    ) -> PluginType {
        PluginType::Closed(
            TypeId::of::<T>(),
            std::any::type_name::<T>(),
            Closing {
                open: *self,
                args: args.into_iter().collect(),
            },
        )
    }
}

impl fmt::Display for OpenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<", self.name)?;
        for i in 0..self.arity {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str("_")?;
        }
        f.write_str(">")
    }
}

impl PluginType {
    /// Plain plugin type for `T`.
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        PluginType::Type(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// "All registered instances of `element`".
    pub fn all_of(element: PluginType) -> Self {
        PluginType::AllOf(Arc::new(element))
    }

    /// "Resolve `element` by name".
    pub fn lookup_of(element: PluginType) -> Self {
        PluginType::Lookup(Arc::new(element))
    }

    /// Underlying Rust type id, when this describes a Rust type directly.
    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            PluginType::Type(id, _) | PluginType::Closed(id, _, _) => Some(*id),
            PluginType::AllOf(_) | PluginType::Lookup(_) => None,
        }
    }

    /// Human-readable name for diagnostics.
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// Element type of `AllOf` and `Lookup` shapes.
    pub fn element(&self) -> Option<&PluginType> {
        match self {
            PluginType::AllOf(e) | PluginType::Lookup(e) => Some(e),
            _ => None,
        }
    }

    pub fn closing(&self) -> Option<&Closing> {
        match self {
            PluginType::Closed(_, _, closing) => Some(closing),
            _ => None,
        }
    }

    pub fn open_type(&self) -> Option<OpenType> {
        self.closing().map(Closing::open)
    }

    pub fn generic_args(&self) -> &[PluginType] {
        match self {
            PluginType::Closed(_, _, closing) => closing.args(),
            _ => &[],
        }
    }

    pub fn is_all_of(&self) -> bool {
        matches!(self, PluginType::AllOf(_))
    }

    pub fn is_lookup(&self) -> bool {
        matches!(self, PluginType::Lookup(_))
    }
}

// Plain and closed descriptors of the same Rust type are the same key.
impl PartialEq for PluginType {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                PluginType::Type(a, _) | PluginType::Closed(a, _, _),
                PluginType::Type(b, _) | PluginType::Closed(b, _, _),
            ) => a == b,
            (PluginType::AllOf(a), PluginType::AllOf(b)) => a == b,
            (PluginType::Lookup(a), PluginType::Lookup(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PluginType {}

impl Hash for PluginType {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            PluginType::Type(id, _) | PluginType::Closed(id, _, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            PluginType::AllOf(e) => {
                1u8.hash(state);
                e.hash(state);
            }
            PluginType::Lookup(e) => {
                2u8.hash(state);
                e.hash(state);
            }
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginType::Type(_, name) | PluginType::Closed(_, name, _) => f.write_str(name),
            PluginType::AllOf(e) => write!(f, "[{}]", e),
            PluginType::Lookup(e) => write!(f, "fn(&str) -> {}", e),
        }
    }
}

impl fmt::Debug for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginType::Type(_, name) => write!(f, "Type({})", name),
            PluginType::Closed(_, name, closing) => {
                write!(f, "Closed({} as {}[", name, closing.open)?;
                for (i, arg) in closing.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str("])")
            }
            PluginType::AllOf(e) => write!(f, "AllOf({:?})", e),
            PluginType::Lookup(e) => write!(f, "Lookup({:?})", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    trait Repo<T>: Send + Sync {}

    #[test]
    fn closed_and_plain_share_identity() {
        let open = OpenType::new("Repo", 1);
        let closed = open.close::<dyn Repo<u8>>([PluginType::of::<u8>()]);
        let plain = PluginType::of::<dyn Repo<u8>>();

        assert_eq!(closed, plain);
        let mut set = HashSet::new();
        set.insert(closed.clone());
        assert!(set.contains(&plain));
        assert_eq!(closed.generic_args(), &[PluginType::of::<u8>()]);
        assert!(plain.generic_args().is_empty());
    }

    #[test]
    fn shapes_are_distinct() {
        let t = PluginType::of::<String>();
        assert_ne!(t, PluginType::all_of(t.clone()));
        assert_ne!(PluginType::all_of(t.clone()), PluginType::lookup_of(t.clone()));
        assert_eq!(PluginType::all_of(t.clone()), PluginType::all_of(PluginType::of::<String>()));
        assert_eq!(PluginType::all_of(t.clone()).element(), Some(&t));
    }

    #[test]
    fn display_names() {
        let t = PluginType::of::<u32>();
        assert_eq!(t.to_string(), "u32");
        assert_eq!(PluginType::all_of(t.clone()).to_string(), "[u32]");
        assert_eq!(PluginType::lookup_of(t).to_string(), "fn(&str) -> u32");
        assert_eq!(OpenType::new("Map", 2).to_string(), "Map<_,_>");
    }
}
