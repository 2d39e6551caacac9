#![allow(dangerous_implicit_autorefs)]
//! Skip list implementation for MemTable
//!
//! A probabilistic data structure providing O(log n) insert/search operations.
//! Used by LevelDB, RocksDB, and HBase for their MemTables.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::ptr::NonNull;

/// Maximum node height
const MAX_LEVEL: usize = 16;

/// Probability of growing a node by one level
const P: f64 = 0.5;

/// Fixed seed so structures are reproducible across runs
const DEFAULT_SEED: u64 = 0x5EED;

/// A sorted map over a probabilistic skip list
pub struct SkipList<K: Ord, V> {
    head: Box<Node<K, V>>,
    level: usize,
    len: usize,
    rng: StdRng,
}

struct Node<K, V> {
    key: Option<K>,
    value: Option<V>,
    forward: Vec<Option<NonNull<Node<K, V>>>>,
}

impl<K: Ord, V> SkipList<K, V> {
    /// Create a new skip list with the default level-sampling seed
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    /// Create a new skip list whose level sampling uses the given seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            head: Box::new(Node::new_head()),
            level: 1,
            len: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Insert a key-value pair, replacing any previous value for the key
    pub fn insert(&mut self, key: K, value: V) {
        let mut update: Vec<Option<*mut Node<K, V>>> = vec![None; MAX_LEVEL];
        let mut current = self.head.as_mut() as *mut Node<K, V>;

        // Find position and collect update pointers
        for i in (0..self.level).rev() {
            unsafe {
                while let Some(next) = (*current).forward[i] {
                    if let Some(ref next_key) = (*next.as_ptr()).key {
                        if next_key < &key {
                            current = next.as_ptr();
                        } else {
                            break;
                        }
                    } else {
                        break;
                    }
                }
            }
            update[i] = Some(current);
        }

        // Check if key already exists
        unsafe {
            if let Some(next) = (*current).forward[0] {
                if (*next.as_ptr()).key.as_ref() == Some(&key) {
                    // Replace existing value; the old allocation is dropped
                    (*next.as_ptr()).value = Some(value);
                    return;
                }
            }
        }

        let level = self.random_level();

        // Increase level if needed
        if level > self.level {
            for i in self.level..level {
                update[i] = Some(self.head.as_mut() as *mut Node<K, V>);
            }
            self.level = level;
        }

        // Create new node
        let new_node = NonNull::from(Box::leak(Box::new(Node::new(key, value, level))));

        // Update forward pointers
        for i in 0..level {
            unsafe {
                if let Some(prev) = update[i] {
                    (*new_node.as_ptr()).forward[i] = (*prev).forward[i];
                    (*prev).forward[i] = Some(new_node);
                }
            }
        }

        self.len += 1;
    }

    /// Get a value by key
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut current = self.head.as_ref() as *const Node<K, V>;

        for i in (0..self.level).rev() {
            unsafe {
                while let Some(next) = (*current).forward[i] {
                    if let Some(ref next_key) = (*next.as_ptr()).key {
                        match next_key.borrow().cmp(key) {
                            Ordering::Less => current = next.as_ptr(),
                            Ordering::Equal => return (*next.as_ptr()).value.as_ref(),
                            Ordering::Greater => break,
                        }
                    } else {
                        break;
                    }
                }
            }
        }

        None
    }

    /// Iterate over all entries in ascending key order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        let mut results = Vec::with_capacity(self.len);
        let mut current = self.head.as_ref() as *const Node<K, V>;

        unsafe {
            while let Some(next) = (*current).forward[0] {
                if let (Some(ref key), Some(ref value)) =
                    (&(*next.as_ptr()).key, &(*next.as_ptr()).value)
                {
                    results.push((key, value));
                }
                current = next.as_ptr();
            }
        }

        results.into_iter()
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn random_level(&mut self) -> usize {
        let mut lvl = 1;
        while self.rng.gen::<f64>() < P && lvl < MAX_LEVEL {
            lvl += 1;
        }
        lvl
    }
}

impl<K: Ord, V> Default for SkipList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Node<K, V> {
    fn new(key: K, value: V, level: usize) -> Self {
        Self {
            key: Some(key),
            value: Some(value),
            forward: vec![None; level],
        }
    }

    fn new_head() -> Self {
        Self {
            key: None,
            value: None,
            forward: vec![None; MAX_LEVEL],
        }
    }
}

impl<K: Ord, V> Drop for SkipList<K, V> {
    fn drop(&mut self) {
        let mut current = self.head.forward[0];
        while let Some(node) = current {
            unsafe {
                let next = (*node.as_ptr()).forward[0];
                drop(Box::from_raw(node.as_ptr()));
                current = next;
            }
        }
    }
}

// The list owns all of its nodes, so sending the whole structure is safe
unsafe impl<K: Ord + Send, V: Send> Send for SkipList<K, V> {}
unsafe impl<K: Ord + Sync, V: Sync> Sync for SkipList<K, V> {}
