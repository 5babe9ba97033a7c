//! Access-ordered map
//!
//! A hash map whose entries also form a doubly linked list in order of last
//! access. Nodes live in a slab of slots indexed by position; the list links
//! are slot indices and vacated slots are reused through a free list.
//! Touching an entry moves it to the tail in O(1), so a scan from the head
//! visits the least recently touched entries first and can stop early.

use std::collections::HashMap;
use std::hash::Hash;

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

/// Hash map iterated in least-recently-touched-first order
#[derive(Debug)]
pub struct AccessOrderedMap<K, V> {
    index: HashMap<K, usize>,
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl<K: Copy + Eq + Hash, V> Default for AccessOrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Eq + Hash, V> AccessOrderedMap<K, V> {
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let slot = *self.index.get(key)?;
        self.node(slot).map(|n| &n.value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let slot = *self.index.get(key)?;
        self.slots[slot].as_mut().map(|n| &mut n.value)
    }

    /// Insert or replace `key` and make it the most recently touched entry.
    ///
    /// Returns the previous value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&slot) = self.index.get(&key) {
            self.move_to_tail(slot);
            let node = self.slots[slot].as_mut()?;
            return Some(std::mem::replace(&mut node.value, value));
        }

        let node = Node {
            key,
            value,
            prev: self.tail,
            next: NIL,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                slot
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.link_tail(slot);
        self.index.insert(key, slot);
        None
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.index.remove(key)?;
        self.unlink(slot);
        let node = self.slots[slot].take()?;
        self.free.push(slot);
        Some(node.value)
    }

    /// Mark `key` as the most recently touched entry. Returns false if absent.
    pub fn touch(&mut self, key: &K) -> bool {
        match self.index.get(key) {
            Some(&slot) => {
                self.move_to_tail(slot);
                true
            }
            None => false,
        }
    }

    /// Keys from least to most recently touched
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys {
            map: self,
            cursor: self.head,
        }
    }

    /// Entries from least to most recently touched
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            map: self,
            cursor: self.head,
        }
    }

    /// Remove every entry, yielding values in access order.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        let mut out = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while cursor != NIL {
            match self.slots[cursor].take() {
                Some(node) => {
                    cursor = node.next;
                    out.push((node.key, node.value));
                }
                None => break,
            }
        }
        self.index.clear();
        self.slots.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
        out
    }

    fn node(&self, slot: usize) -> Option<&Node<K, V>> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    fn move_to_tail(&mut self, slot: usize) {
        if self.tail == slot {
            return;
        }
        self.unlink(slot);
        self.link_tail(slot);
    }

    fn link_tail(&mut self, slot: usize) {
        let old_tail = self.tail;
        if let Some(node) = self.slots[slot].as_mut() {
            node.prev = old_tail;
            node.next = NIL;
        }
        match self.slots.get_mut(old_tail).and_then(Option::as_mut) {
            Some(prev) => prev.next = slot,
            None => self.head = slot,
        }
        self.tail = slot;
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = match self.node(slot) {
            Some(n) => (n.prev, n.next),
            None => return,
        };
        match self.slots.get_mut(prev).and_then(Option::as_mut) {
            Some(p) => p.next = next,
            None => self.head = next,
        }
        match self.slots.get_mut(next).and_then(Option::as_mut) {
            Some(n) => n.prev = prev,
            None => self.tail = prev,
        }
        if let Some(node) = self.slots[slot].as_mut() {
            node.prev = NIL;
            node.next = NIL;
        }
    }
}

/// Iterator over keys in access order
pub struct Keys<'a, K, V> {
    map: &'a AccessOrderedMap<K, V>,
    cursor: usize,
}

impl<'a, K: Copy + Eq + Hash, V> Iterator for Keys<'a, K, V> {
    type Item = K;

    fn next(&mut self) -> Option<K> {
        let node = self.map.node(self.cursor)?;
        self.cursor = node.next;
        Some(node.key)
    }
}

/// Iterator over entries in access order
pub struct Iter<'a, K, V> {
    map: &'a AccessOrderedMap<K, V>,
    cursor: usize,
}

impl<'a, K: Copy + Eq + Hash, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.map.node(self.cursor)?;
        self.cursor = node.next;
        Some((&node.key, &node.value))
    }
}
