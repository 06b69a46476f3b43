//! Detached cursors over a map's entries in insertion order.
//!
//! A `Cursor` does not borrow the map, so the map can be modified while a
//! walk is in progress. Index growth and removal of other entries leave the
//! cursor where it was; entries inserted during the walk are appended and
//! will be reached. Removing the entry under the cursor invalidates that
//! cursor only: it then reads as the end.

use crate::map::{Handle, StableHashMap};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Cursor {
    at: Option<Handle>,
}

impl Cursor {
    pub(crate) fn new(at: Option<Handle>) -> Self {
        Cursor { at }
    }

    /// Entry under the cursor, if it still exists.
    pub fn handle<K, V, E, S>(&self, map: &StableHashMap<K, V, E, S>) -> Option<Handle> {
        self.at.filter(|&h| map.contains_handle(h))
    }

    pub fn is_end<K, V, E, S>(&self, map: &StableHashMap<K, V, E, S>) -> bool {
        self.handle(map).is_none()
    }

    pub fn get<'a, K, V, E, S>(&self, map: &'a StableHashMap<K, V, E, S>) -> Option<(&'a K, &'a V)> {
        let h = self.at?;
        map.handle_node(h).map(|n| (&n.key, &n.value))
    }

    pub fn value_mut<'a, K, V, E, S>(
        &self,
        map: &'a mut StableHashMap<K, V, E, S>,
    ) -> Option<&'a mut V> {
        let h = self.at?;
        h.value_mut(map)
    }

    /// Step to the next entry. Returns false once the cursor is at the end,
    /// including when its entry was removed underneath it.
    pub fn advance<K, V, E, S>(&mut self, map: &StableHashMap<K, V, E, S>) -> bool {
        self.at = self.at.and_then(|h| map.next_handle(h));
        self.at.is_some()
    }
}
