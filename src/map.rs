//! StableHashMap: the public map over a `HashTable` index + `EntryStore`.
//!
//! The index holds only entry keys; each entry caches its hash, and that
//! cached hash is what the table rehashes with when it grows. Lookups hash the
//! query through the map's `KeyEquivalence`, probe the index, and compare
//! against the key stored in the entry. Every entry is reachable
//! through a `Handle` that survives index growth and the removal of other
//! entries.

use crate::case_fold::{AsciiCaseInsensitive, CaseSensitive, KeyEquivalence};
use crate::cursor::Cursor;
use crate::reentrancy::ReentrancyCheck;
use crate::store::{EntryStore, Linked, Node};
use core::fmt;
use core::hash::{BuildHasher, Hasher};
use core::ops::{Index, IndexMut};
use hashbrown::hash_map::DefaultHashBuilder;
use hashbrown::HashTable;
use slotmap::DefaultKey;

/// Stable reference to one entry of a map.
///
/// A handle stays valid until its entry is removed or the map is cleared.
/// After that it resolves to `None`; a later entry never reuses it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(DefaultKey);

impl Handle {
    pub(crate) fn new(k: DefaultKey) -> Self {
        Handle(k)
    }

    pub(crate) fn raw(&self) -> DefaultKey {
        self.0
    }

    /// The stored key, with the casing of the insertion that created it.
    pub fn key<'a, K, V, E, S>(&self, map: &'a StableHashMap<K, V, E, S>) -> Option<&'a K> {
        map.handle_node(*self).map(|n| &n.key)
    }

    pub fn value<'a, K, V, E, S>(&self, map: &'a StableHashMap<K, V, E, S>) -> Option<&'a V> {
        map.handle_node(*self).map(|n| &n.value)
    }

    pub fn value_mut<'a, K, V, E, S>(
        &self,
        map: &'a mut StableHashMap<K, V, E, S>,
    ) -> Option<&'a mut V> {
        map.handle_node_mut(*self).map(|n| &mut n.value)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InsertError {
    /// An equivalent key is already present; the map is unchanged.
    DuplicateKey { existing: Handle },
}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertError::DuplicateKey { .. } => f.write_str("an equivalent key is already present"),
        }
    }
}

impl std::error::Error for InsertError {}

/// Hash map with stable entry handles and pluggable key equivalence.
///
/// `E` decides how keys hash and compare; the default folds ASCII case.
/// `S` builds the hasher the folded bytes are fed to.
pub struct StableHashMap<K, V, E = AsciiCaseInsensitive, S = DefaultHashBuilder> {
    hasher: S,
    equivalence: E,
    index: HashTable<DefaultKey>,
    store: EntryStore<K, V>,
    reentrancy: ReentrancyCheck,
}

/// Case-insensitive `String` keys.
pub type StringIMap<V, S = DefaultHashBuilder> = StableHashMap<String, V, AsciiCaseInsensitive, S>;

/// Case-sensitive `String` keys.
pub type StringMap<V, S = DefaultHashBuilder> = StableHashMap<String, V, CaseSensitive, S>;

impl<K, V> StableHashMap<K, V> {
    pub fn new() -> Self {
        Self::with_equivalence_and_hasher(AsciiCaseInsensitive, DefaultHashBuilder::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K, V, E, S> Default for StableHashMap<K, V, E, S>
where
    E: Default,
    S: Default,
{
    fn default() -> Self {
        Self::with_equivalence_and_hasher(E::default(), S::default())
    }
}

impl<K, V, E, S> StableHashMap<K, V, E, S> {
    pub fn with_hasher(hasher: S) -> Self
    where
        E: Default,
    {
        Self::with_equivalence_and_hasher(E::default(), hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self
    where
        E: Default,
    {
        Self {
            hasher,
            equivalence: E::default(),
            index: HashTable::with_capacity(capacity),
            store: EntryStore::with_capacity(capacity),
            reentrancy: ReentrancyCheck::new(),
        }
    }

    pub fn with_equivalence_and_hasher(equivalence: E, hasher: S) -> Self {
        Self {
            hasher,
            equivalence,
            index: HashTable::new(),
            store: EntryStore::new(),
            reentrancy: ReentrancyCheck::new(),
        }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn equivalence(&self) -> &E {
        &self.equivalence
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.index.len(), self.store.len());
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    /// Entries the map holds before its index has to grow again.
    pub fn capacity(&self) -> usize {
        self.index.capacity()
    }

    pub fn contains_handle(&self, handle: Handle) -> bool {
        self.store.contains(handle.raw())
    }

    pub(crate) fn handle_node(&self, h: Handle) -> Option<&Node<K, V>> {
        self.store.get(h.raw())
    }

    pub(crate) fn handle_node_mut(&mut self, h: Handle) -> Option<&mut Node<K, V>> {
        self.store.get_mut(h.raw())
    }

    pub(crate) fn first_handle(&self) -> Option<Handle> {
        self.store.first().map(Handle::new)
    }

    pub(crate) fn next_handle(&self, h: Handle) -> Option<Handle> {
        self.store.next_of(h.raw()).map(Handle::new)
    }

    /// Remove the entry behind `handle`. `None` if it was already removed.
    pub fn remove_handle(&mut self, handle: Handle) -> Option<(K, V)> {
        let _g = self.reentrancy.enter("remove_handle");
        unlink(&mut self.index, &mut self.store, handle.raw())
    }

    /// Drop every entry. All handles and cursors obtained so far become
    /// invalid and resolve to `None`. Index capacity is kept.
    pub fn clear(&mut self) {
        let _g = self.reentrancy.enter("clear");
        self.index.clear();
        self.store.clear();
    }

    pub fn shrink_to_fit(&mut self) {
        let _g = self.reentrancy.enter("shrink_to_fit");
        let store = &self.store;
        self.index.shrink_to_fit(|&k| cached_hash(store, k));
    }

    /// Keep only the entries for which `f` returns true.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let doomed: Vec<DefaultKey> = self
            .store
            .iter_mut()
            .filter_map(|(k, n)| (!f(&n.key, &mut n.value)).then_some(k))
            .collect();
        let _g = self.reentrancy.enter("retain");
        for k in doomed {
            unlink(&mut self.index, &mut self.store, k);
        }
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.store.iter(),
        }
    }

    /// Entries with mutable values, in storage order (not insertion order).
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.store.iter_mut(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(_, k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, _, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.iter_mut().map(|(_, _, v)| v)
    }

    /// Cursor at the first entry in insertion order.
    pub fn begin(&self) -> Cursor {
        Cursor::new(self.first_handle())
    }

    /// The past-the-end cursor.
    pub fn end(&self) -> Cursor {
        Cursor::new(None)
    }

    pub fn cursor_at(&self, handle: Handle) -> Cursor {
        Cursor::new(Some(handle))
    }
}

impl<K, V, E, S> StableHashMap<K, V, E, S>
where
    K: AsRef<[u8]>,
    E: KeyEquivalence,
    S: BuildHasher,
{
    fn lookup(&self, q: &[u8]) -> Option<DefaultKey> {
        let hash = make_hash(&self.hasher, &self.equivalence, q);
        self.index
            .find(hash, |&k| key_matches(&self.store, &self.equivalence, k, q))
            .copied()
    }

    pub fn find<Q>(&self, q: &Q) -> Option<Handle>
    where
        Q: ?Sized + AsRef<[u8]>,
    {
        let _g = self.reentrancy.enter("find");
        self.lookup(q.as_ref()).map(Handle::new)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        Q: ?Sized + AsRef<[u8]>,
    {
        let _g = self.reentrancy.enter("contains_key");
        self.lookup(q.as_ref()).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        Q: ?Sized + AsRef<[u8]>,
    {
        self.get_key_value(q).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        Q: ?Sized + AsRef<[u8]>,
    {
        let _g = self.reentrancy.enter("get_key_value");
        let k = self.lookup(q.as_ref())?;
        self.store.get(k).map(|n| (&n.key, &n.value))
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        Q: ?Sized + AsRef<[u8]>,
    {
        let _g = self.reentrancy.enter("get_mut");
        let k = self.lookup(q.as_ref())?;
        self.store.get_mut(k).map(|n| &mut n.value)
    }

    /// Insert `key -> value`, or overwrite the value of the equivalent entry
    /// in place. An existing entry keeps its handle and its original key
    /// casing; the replaced value is returned.
    pub fn insert_or_assign(&mut self, key: K, value: V) -> (Handle, Option<V>) {
        let _g = self.reentrancy.enter("insert_or_assign");
        let hash = make_hash(&self.hasher, &self.equivalence, key.as_ref());
        let found = self
            .index
            .find(hash, |&k| {
                key_matches(&self.store, &self.equivalence, k, key.as_ref())
            })
            .copied();
        if let Some(k) = found {
            let node = self
                .store
                .get_mut(k)
                .expect("index refers to a released entry");
            let old = core::mem::replace(&mut node.value, value);
            return (Handle::new(k), Some(old));
        }
        let k = link(&mut self.index, &mut self.store, key, value, hash);
        (Handle::new(k), None)
    }

    /// Insert only if no equivalent key is present.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<Handle, InsertError> {
        self.insert_with(key, || value)
    }

    /// Like `try_insert`, but `default` only runs when the entry is created.
    pub fn insert_with<F>(&mut self, key: K, default: F) -> Result<Handle, InsertError>
    where
        F: FnOnce() -> V,
    {
        let _g = self.reentrancy.enter("insert_with");
        let hash = make_hash(&self.hasher, &self.equivalence, key.as_ref());
        let found = self
            .index
            .find(hash, |&k| {
                key_matches(&self.store, &self.equivalence, k, key.as_ref())
            })
            .copied();
        match found {
            Some(k) => Err(InsertError::DuplicateKey {
                existing: Handle::new(k),
            }),
            None => {
                let k = link(&mut self.index, &mut self.store, key, default(), hash);
                Ok(Handle::new(k))
            }
        }
    }

    /// Handle of the entry for `key`, creating it with `default` if absent.
    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> Handle
    where
        F: FnOnce() -> V,
    {
        match self.insert_with(key, default) {
            Ok(h) => h,
            Err(InsertError::DuplicateKey { existing }) => existing,
        }
    }

    /// Remove the entry for `q`; false if there was none.
    pub fn erase<Q>(&mut self, q: &Q) -> bool
    where
        Q: ?Sized + AsRef<[u8]>,
    {
        self.remove_entry(q).is_some()
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        Q: ?Sized + AsRef<[u8]>,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        Q: ?Sized + AsRef<[u8]>,
    {
        let _g = self.reentrancy.enter("remove_entry");
        let k = self.lookup(q.as_ref())?;
        unlink(&mut self.index, &mut self.store, k)
    }

    /// Make room for `additional` more entries without growing the index.
    pub fn reserve(&mut self, additional: usize) {
        let _g = self.reentrancy.enter("reserve");
        let store = &self.store;
        self.index.reserve(additional, |&k| cached_hash(store, k));
        self.store.reserve(additional);
    }
}

fn make_hash<E, S>(hasher: &S, equivalence: &E, key: &[u8]) -> u64
where
    E: KeyEquivalence,
    S: BuildHasher,
{
    let mut h = hasher.build_hasher();
    equivalence.hash_key(key, &mut h);
    h.finish()
}

#[inline]
fn key_matches<K, V, E>(store: &EntryStore<K, V>, equivalence: &E, k: DefaultKey, q: &[u8]) -> bool
where
    K: AsRef<[u8]>,
    E: KeyEquivalence,
{
    store
        .get(k)
        .map(|n| equivalence.keys_equal(n.key.as_ref(), q))
        .unwrap_or(false)
}

// Rehash input for the index. Only live entries are ever in the table.
#[inline]
fn cached_hash<K, V>(store: &EntryStore<K, V>, k: DefaultKey) -> u64 {
    store.get(k).map(|n| n.hash).unwrap_or(0)
}

// Callers have already probed for `key`; growth happens here and only here.
fn link<K, V>(
    index: &mut HashTable<DefaultKey>,
    store: &mut EntryStore<K, V>,
    key: K,
    value: V,
    hash: u64,
) -> DefaultKey {
    let k = store.allocate(key, value, hash);
    let store = &*store;
    index.insert_unique(hash, k, |&kk| cached_hash(store, kk));
    k
}

// Index first, so the structure is consistent again before K/V are handed out.
fn unlink<K, V>(
    index: &mut HashTable<DefaultKey>,
    store: &mut EntryStore<K, V>,
    k: DefaultKey,
) -> Option<(K, V)> {
    let hash = store.get(k)?.hash;
    let erased = index
        .find_entry(hash, |&kk| kk == k)
        .map(|slot| {
            slot.remove();
        })
        .is_ok();
    debug_assert!(erased, "live entry missing from index");
    store.release(k).map(|n| (n.key, n.value))
}

/// Iterator over entries in insertion order.
pub struct Iter<'a, K, V> {
    inner: Linked<'a, K, V>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (Handle, &'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(k, n)| (Handle::new(k), &n.key, &n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Iterator over entries with mutable values, in storage order.
pub struct IterMut<'a, K, V> {
    inner: slotmap::basic::IterMut<'a, DefaultKey, Node<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (Handle, &'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(k, n)| (Handle::new(k), &n.key, &mut n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V, E, S> IntoIterator for &'a StableHashMap<K, V, E, S> {
    type Item = (Handle, &'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, E, S> Index<Handle> for StableHashMap<K, V, E, S> {
    type Output = V;

    fn index(&self, handle: Handle) -> &V {
        match self.handle_node(handle) {
            Some(n) => &n.value,
            None => panic!("stale handle: entry was removed"),
        }
    }
}

impl<K, V, E, S> IndexMut<Handle> for StableHashMap<K, V, E, S> {
    fn index_mut(&mut self, handle: Handle) -> &mut V {
        match self.handle_node_mut(handle) {
            Some(n) => &mut n.value,
            None => panic!("stale handle: entry was removed"),
        }
    }
}

impl<K, V, E, S> fmt::Debug for StableHashMap<K, V, E, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(_, k, v)| (k, v)))
            .finish()
    }
}

impl<K, V, E, S> Extend<(K, V)> for StableHashMap<K, V, E, S>
where
    K: AsRef<[u8]>,
    E: KeyEquivalence,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for (k, v) in iter {
            self.insert_or_assign(k, v);
        }
    }
}

impl<K, V, E, S> FromIterator<(K, V)> for StableHashMap<K, V, E, S>
where
    K: AsRef<[u8]>,
    E: KeyEquivalence + Default,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}
