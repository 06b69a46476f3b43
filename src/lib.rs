//! stable-imap: a single-owner hash map from case-insensitive string keys to
//! values, whose entry handles and cursors stay valid while the map changes.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: callers may hold a reference to an entry (a `Handle` or a
//!   `Cursor`) across further insertions, index growth, and removal of other
//!   entries, while lookups ignore ASCII case.
//! - Layers:
//!   - `KeyEquivalence`: how key bytes hash and compare. The default
//!     `AsciiCaseInsensitive` folds `A-Z`; `CaseSensitive` is the plain
//!     variant.
//!   - `EntryStore`: entries in a generational slot map, linked in insertion
//!     order. An entry's key never changes and never moves to another key.
//!   - Index: a `hashbrown::HashTable` of entry keys. Growth rebuilds only
//!     this table; entries in the store never move.
//!   - `StableHashMap<K, V, E, S>`: the public map; `StringIMap<V>` is the
//!     case-insensitive `String` instance.
//!
//! Constraints
//! - Single owner, no internal synchronization; `!Sync`.
//! - Looking up, overwriting or rejecting a key that is already present
//!   never grows the index. Only a new entry can.
//! - At most one entry per equivalent key. `insert_or_assign` overwrites the
//!   value in place, so handles to that entry observe the new value and the
//!   stored key keeps the casing of the first insertion. `try_insert` is the
//!   rejecting variant.
//! - Stale handles (entry removed, map cleared) resolve to `None`; they never
//!   alias a later entry.
//!
//! Hashing
//! - Each entry caches its hash. Rebuilding the index uses the cached
//!   values, so the key strategy runs only on lookup and insertion.
//!
//! Reentrancy
//! - The key strategy is user code that runs mid-probe. A debug-only check
//!   panics if it re-enters the same map.
//!
//! Lifetime
//! - The map owns all of its storage; dropping it releases the slot array
//!   and the entry storage in bulk.

pub mod case_fold;
pub mod cursor;
pub mod map;
#[cfg(test)]
mod map_proptest;
mod reentrancy;
#[cfg(feature = "serde")]
mod serde_impls;
mod store;

// Public surface
pub use case_fold::{AsciiCaseInsensitive, CaseSensitive, KeyEquivalence};
pub use cursor::Cursor;
pub use map::{Handle, InsertError, Iter, IterMut, StableHashMap, StringIMap, StringMap};
