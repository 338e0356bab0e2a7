//! LRU (Least Recently Used) ordering
//!
//! Uses intrusive linked list over a slab for O(1) touch and eviction.
//! Budgets are not enforced here; the owner decides when to pop.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use ahash::RandomState;

/// Node in the LRU doubly-linked list
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Recency-ordered map. Head is most recently used, tail least.
pub struct LruList<K, V> {
    map: HashMap<K, usize, RandomState>,
    nodes: Vec<Option<Node<K, V>>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
}

impl<K, V> LruList<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty list sized for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
            nodes: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            free_list: Vec::new(),
        }
    }

    /// Get a value and mark it most recently used
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.move_to_front(idx);
        self.nodes[idx].as_mut().map(|node| &mut node.value)
    }

    /// Get a value without changing its position
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    /// Check whether a key is present
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Insert at the most recently used position, returning any replaced value
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let replaced = self.remove(&key);

        let idx = self.alloc_node();
        self.nodes[idx] = Some(Node {
            key: key.clone(),
            value,
            prev: None,
            next: self.head,
        });

        if let Some(head_idx) = self.head {
            if let Some(head) = &mut self.nodes[head_idx] {
                head.prev = Some(idx);
            }
        }

        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }

        self.map.insert(key, idx);
        replaced
    }

    /// Remove a key
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.map.remove(key)?;
        self.unlink(idx);
        self.free_node(idx);
        self.nodes[idx].take().map(|node| node.value)
    }

    /// Remove and return the least recently used entry
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let tail_idx = self.tail?;
        self.unlink(tail_idx);
        self.free_node(tail_idx);

        let node = self.nodes[tail_idx].take()?;
        self.map.remove(&node.key);
        Some((node.key, node.value))
    }

    /// Iterate from most to least recently used
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Get the current number of entries
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Clear the list
    pub fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.free_list.clear();
        self.head = None;
        self.tail = None;
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return; // Already at front
        }

        self.unlink(idx);

        if let Some(node) = &mut self.nodes[idx] {
            node.prev = None;
            node.next = self.head;
        }

        if let Some(head_idx) = self.head {
            if let Some(head) = &mut self.nodes[head_idx] {
                head.prev = Some(idx);
            }
        }

        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    /// Detach a live node from its neighbours. The node must still be present.
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = if let Some(node) = &self.nodes[idx] {
            (node.prev, node.next)
        } else {
            return;
        };

        match prev {
            Some(prev_idx) => {
                if let Some(prev_node) = &mut self.nodes[prev_idx] {
                    prev_node.next = next;
                }
            }
            None => {
                self.head = next;
            }
        }

        match next {
            Some(next_idx) => {
                if let Some(next_node) = &mut self.nodes[next_idx] {
                    next_node.prev = prev;
                }
            }
            None => {
                self.tail = prev;
            }
        }
    }

    fn alloc_node(&mut self) -> usize {
        if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(None);
            idx
        }
    }

    fn free_node(&mut self, idx: usize) {
        self.free_list.push(idx);
    }
}

/// Iterator from most to least recently used
pub struct Iter<'a, K, V> {
    list: &'a LruList<K, V>,
    cursor: Option<usize>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let node = self.list.nodes[idx].as_ref()?;
        self.cursor = node.next;
        Some((&node.key, &node.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(list: &LruList<i32, &str>) -> Vec<i32> {
        list.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_lru_basic() {
        let mut list = LruList::with_capacity(2);

        list.insert(1, "a");
        list.insert(2, "b");

        assert_eq!(list.get_mut(&1).map(|v| *v), Some("a"));
        assert_eq!(list.get_mut(&2).map(|v| *v), Some("b"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_lru_pop_order() {
        let mut list = LruList::with_capacity(3);

        list.insert(1, "a");
        list.insert(2, "b");
        list.insert(3, "c");

        assert_eq!(list.pop_lru(), Some((1, "a")));
        assert_eq!(list.pop_lru(), Some((2, "b")));
        assert_eq!(keys(&list), vec![3]);
        assert_eq!(list.pop_lru(), Some((3, "c")));
        assert_eq!(list.pop_lru(), None);
        assert!(list.is_empty());
    }

    #[test]
    fn test_lru_touch() {
        let mut list = LruList::with_capacity(3);

        list.insert(1, "a");
        list.insert(2, "b");
        list.insert(3, "c");
        list.get_mut(&1); // Move 1 to front

        assert_eq!(keys(&list), vec![1, 3, 2]);
        assert_eq!(list.pop_lru(), Some((2, "b")));
    }

    #[test]
    fn test_lru_peek_keeps_order() {
        let mut list = LruList::with_capacity(2);

        list.insert(1, "a");
        list.insert(2, "b");

        assert_eq!(list.peek(&1), Some(&"a"));
        assert_eq!(keys(&list), vec![2, 1]);
    }

    #[test]
    fn test_lru_remove() {
        let mut list = LruList::with_capacity(3);

        list.insert(1, "a");
        list.insert(2, "b");
        list.insert(3, "c");

        assert_eq!(list.remove(&2), Some("b"));
        assert_eq!(list.remove(&2), None);
        assert_eq!(list.len(), 2);
        assert_eq!(keys(&list), vec![3, 1]);
    }

    #[test]
    fn test_lru_clear() {
        let mut list = LruList::with_capacity(3);

        list.insert(1, "a");
        list.insert(2, "b");
        list.clear();

        assert_eq!(list.len(), 0);
        assert!(list.is_empty());
        assert_eq!(list.pop_lru(), None);
    }

    #[test]
    fn test_lru_overwrite() {
        let mut list = LruList::with_capacity(2);

        list.insert(1, "a");
        list.insert(2, "b");
        assert_eq!(list.insert(1, "c"), Some("a")); // Overwrite moves to front

        assert_eq!(list.peek(&1), Some(&"c"));
        assert_eq!(list.len(), 2);
        assert_eq!(keys(&list), vec![1, 2]);
    }

    #[test]
    fn test_lru_slot_reuse() {
        let mut list = LruList::with_capacity(2);

        for i in 0..100 {
            list.insert(i, "x");
            if list.len() > 2 {
                list.pop_lru();
            }
        }

        assert_eq!(keys(&list), vec![99, 98]);
        assert!(list.nodes.len() <= 3);
    }
}
