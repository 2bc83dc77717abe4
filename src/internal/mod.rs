//! Internal implementation details.

pub(crate) mod depth;

pub(crate) use depth::DepthGuard;
