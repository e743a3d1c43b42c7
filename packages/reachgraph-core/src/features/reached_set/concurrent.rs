//! Thread-safe reached set for the concurrent worker mode

use crate::features::arg::ArgReachedSet;
use crate::shared::ports::{AbstractPrecision, AbstractState};
use parking_lot::RwLock;
use std::sync::Arc;

/// ARG reached set behind a read/write lock
///
/// The owning worker takes the write lock for one algorithm step at a time,
/// so observers can read progress between steps.
#[derive(Debug)]
pub struct ConcurrentReachedSet<S: AbstractState, P> {
    inner: Arc<RwLock<ArgReachedSet<S, P>>>,
}

impl<S: AbstractState, P> Clone for ConcurrentReachedSet<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, P> ConcurrentReachedSet<S, P>
where
    S: AbstractState,
    P: AbstractPrecision,
{
    pub fn new(reached: ArgReachedSet<S, P>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(reached)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&ArgReachedSet<S, P>) -> R) -> R {
        f(&self.inner.read())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut ArgReachedSet<S, P>) -> R) -> R {
        f(&mut self.inner.write())
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn has_waiting_state(&self) -> bool {
        self.inner.read().has_waiting_state()
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> ArgReachedSet<S, P> {
        self.inner.read().clone()
    }

    /// Unwrap the set if this is the last handle
    pub fn into_inner(self) -> Result<ArgReachedSet<S, P>, Self> {
        Arc::try_unwrap(self.inner)
            .map(RwLock::into_inner)
            .map_err(|inner| Self { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PartitionStrategy, WaitlistOrder};
    use crate::features::arg::ArgEdge;
    use crate::shared::models::{EdgeId, LocationId};

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct St(u32);

    impl AbstractState for St {
        fn location(&self) -> LocationId {
            LocationId(self.0)
        }
    }

    #[test]
    fn test_observer_sees_writes() {
        let shared = ConcurrentReachedSet::new(ArgReachedSet::with_root(
            WaitlistOrder::Dfs,
            PartitionStrategy::Location,
            St(0),
            (),
        ));
        let observer = shared.clone();

        let handle = std::thread::spawn(move || {
            shared.write(|set| {
                let root = set.pop_from_waitlist().unwrap();
                set.add_successor(root, St(1), (), ArgEdge::Cfa(EdgeId(0)))
                    .unwrap();
            });
        });
        handle.join().unwrap();

        assert_eq!(observer.len(), 2);
        assert!(observer.has_waiting_state());
        let set = observer.into_inner().unwrap();
        assert_eq!(set.len(), 2);
    }
}
