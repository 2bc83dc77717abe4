//! Core traits shared by every resolution surface.

mod resolver;

pub use resolver::{Resolver, ResolverCore};
