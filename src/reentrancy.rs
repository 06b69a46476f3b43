//! Debug-only detection of nested calls into a map.
//!
//! Key strategies are user code and run while the map is probing. If one of
//! them calls back into the same map, that call would see the index halfway
//! through an update. Debug builds remember which operation is running and
//! panic naming both calls; release builds keep no state at all.

use core::cell::Cell;
use core::marker::PhantomData;

#[derive(Debug)]
pub(crate) struct ReentrancyCheck {
    #[cfg(debug_assertions)]
    running: Cell<Option<&'static str>>,
    // Not Sync: the marker is a plain Cell.
    _unsync: PhantomData<Cell<()>>,
}

impl ReentrancyCheck {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            running: Cell::new(None),
            _unsync: PhantomData,
        }
    }

    /// Record `op` as the running operation until the returned guard drops.
    #[inline]
    pub(crate) fn enter(&self, op: &'static str) -> Entered<'_> {
        #[cfg(debug_assertions)]
        {
            if let Some(outer) = self.running.replace(Some(op)) {
                self.running.set(Some(outer));
                panic!("`{op}` called on a map that is still inside `{outer}`");
            }
            Entered { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = op;
            Entered { _owner: PhantomData }
        }
    }

    #[cfg(all(test, debug_assertions))]
    fn running(&self) -> Option<&'static str> {
        self.running.get()
    }
}

impl Default for ReentrancyCheck {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct Entered<'a> {
    #[cfg(debug_assertions)]
    owner: &'a ReentrancyCheck,
    #[cfg(not(debug_assertions))]
    _owner: PhantomData<&'a ReentrancyCheck>,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.running.set(None);
    }
}
