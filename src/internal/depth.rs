//! Thread-wide build depth guard.
//!
//! Build sessions detect cycles on their own frame stack. This guard bounds
//! the total nesting on a thread, including sessions started from inside
//! factories, so runaway recursion fails with an error instead of a stack
//! overflow.

use std::cell::Cell;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Holds one level of build depth until dropped.
pub(crate) struct DepthGuard {
    _private: (),
}

impl DepthGuard {
    /// Enters one level, or returns the current depth if `limit` is reached.
    pub(crate) fn enter(limit: usize) -> Result<Self, usize> {
        DEPTH.with(|depth| {
            let current = depth.get();
            if current >= limit {
                return Err(current);
            }
            depth.set(current + 1);
            Ok(DepthGuard { _private: () })
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_limits_and_releases() {
        let a = DepthGuard::enter(2).unwrap();
        let b = DepthGuard::enter(2).unwrap();
        assert_eq!(DepthGuard::enter(2).err(), Some(2));
        drop(b);
        drop(a);
        assert!(DepthGuard::enter(1).is_ok());
    }
}
