//! EntryStore: stable storage for map entries behind generational keys.
//!
//! Entries are addressed only by `DefaultKey`. Allocating or releasing one
//! entry never changes the key of another, and a released key never resolves
//! again even if its slot is reused. Entries are also threaded on a doubly
//! linked list in insertion order so cursors can walk them without borrowing
//! the map.

use slotmap::{DefaultKey, SlotMap};

#[derive(Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) hash: u64,
    prev: Option<DefaultKey>,
    next: Option<DefaultKey>,
}

#[derive(Debug)]
pub(crate) struct EntryStore<K, V> {
    nodes: SlotMap<DefaultKey, Node<K, V>>,
    head: Option<DefaultKey>,
    tail: Option<DefaultKey>,
}

impl<K, V> EntryStore<K, V> {
    pub(crate) fn new() -> Self {
        Self::with_capacity(0)
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: SlotMap::with_capacity_and_key(capacity),
            head: None,
            tail: None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        self.nodes.reserve(additional);
    }

    /// Store a new entry at the tail of the insertion order.
    pub(crate) fn allocate(&mut self, key: K, value: V, hash: u64) -> DefaultKey {
        let prev = self.tail;
        let k = self.nodes.insert(Node {
            key,
            value,
            hash,
            prev,
            next: None,
        });
        match prev {
            Some(p) => self.nodes[p].next = Some(k),
            None => self.head = Some(k),
        }
        self.tail = Some(k);
        k
    }

    /// Unlink and take the entry. Neighbours keep their keys.
    pub(crate) fn release(&mut self, k: DefaultKey) -> Option<Node<K, V>> {
        let node = self.nodes.remove(k)?;
        match node.prev {
            Some(p) => self.nodes[p].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(n) => self.nodes[n].prev = node.prev,
            None => self.tail = node.prev,
        }
        Some(node)
    }

    #[inline]
    pub(crate) fn get(&self, k: DefaultKey) -> Option<&Node<K, V>> {
        self.nodes.get(k)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, k: DefaultKey) -> Option<&mut Node<K, V>> {
        self.nodes.get_mut(k)
    }

    pub(crate) fn contains(&self, k: DefaultKey) -> bool {
        self.nodes.contains_key(k)
    }

    pub(crate) fn first(&self) -> Option<DefaultKey> {
        self.head
    }

    /// Successor of a live entry in insertion order; `None` at the end or
    /// when `k` no longer resolves.
    pub(crate) fn next_of(&self, k: DefaultKey) -> Option<DefaultKey> {
        self.nodes.get(k).and_then(|n| n.next)
    }

    /// Drop every entry. All previously issued keys stop resolving.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }

    pub(crate) fn iter(&self) -> Linked<'_, K, V> {
        Linked {
            nodes: &self.nodes,
            at: self.head,
            remaining: self.nodes.len(),
        }
    }

    /// Mutable walk in slot order, which is not insertion order.
    pub(crate) fn iter_mut(&mut self) -> slotmap::basic::IterMut<'_, DefaultKey, Node<K, V>> {
        self.nodes.iter_mut()
    }
}

/// Insertion-order walk over the linkage.
pub(crate) struct Linked<'a, K, V> {
    nodes: &'a SlotMap<DefaultKey, Node<K, V>>,
    at: Option<DefaultKey>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Linked<'a, K, V> {
    type Item = (DefaultKey, &'a Node<K, V>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let k = self.at?;
        let node = self.nodes.get(k)?;
        self.at = node.next;
        self.remaining -= 1;
        Some((k, node))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Linked<'_, K, V> {}

impl<K, V> Clone for Linked<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes,
            at: self.at,
            remaining: self.remaining,
        }
    }
}
