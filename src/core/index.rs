//! Ordered index
//!
//! A B+tree over fixed-fan-out pages. Keys are ordered by the comparator
//! in the [`IndexDef`] rather than by `Ord`, so the same key type can be
//! indexed in different ways.
//!
//! Every step that grows a page reserves its memory before any entry is
//! moved. An [`Error::OutOfMemory`] therefore leaves the index holding
//! exactly what it held before the call.

use std::cmp::Ordering;

use crate::prelude::{Error, FdResult};

/// Pages are never configured narrower than this
const MIN_BRANCHES: usize = 4;

pub type Compare<K> = fn(&K, &K) -> Ordering;

/// Describes how an index orders its keys and how wide a page may grow
pub struct IndexDef<K> {
    pub compare: Compare<K>,
    pub branches: usize,
}

impl<K> Clone for IndexDef<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for IndexDef<K> {}

/// Position to select with [`Index::seek`]
#[derive(Debug, Clone, Copy)]
pub enum Seek<'a, K> {
    /// The smallest entry
    First,
    /// The smallest entry strictly greater than the anchor
    Next(&'a K),
    /// The greatest entry less than or equal to the anchor
    LessOrEqual(&'a K),
}

enum Node<K, V> {
    Leaf(Vec<(K, V)>),
    /// `keys[i]` is the smallest key that may live in `children[i + 1]`
    Branch {
        keys: Vec<K>,
        children: Vec<Node<K, V>>,
    },
}

impl<K: Clone, V> Node<K, V> {
    fn is_full(&self, branches: usize) -> bool {
        match self {
            Node::Leaf(entries) => entries.len() >= branches,
            Node::Branch { children, .. } => children.len() >= branches,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Node::Leaf(entries) => entries.is_empty(),
            Node::Branch { children, .. } => children.is_empty(),
        }
    }

    /// Moves the upper half of this page into a new sibling.
    /// Returns the separator for the parent together with the sibling.
    fn split(&mut self) -> FdResult<(K, Self)> {
        match self {
            Node::Leaf(entries) => {
                let mid = entries.len() / 2;
                let mut right = Vec::new();
                right.try_reserve_exact(entries.len() - mid)?;
                right.extend(entries.drain(mid..));
                let separator = right[0].0.clone();
                Ok((separator, Node::Leaf(right)))
            }
            Node::Branch { keys, children } => {
                let mid = children.len() / 2;
                let mut right_keys = Vec::new();
                right_keys.try_reserve_exact(keys.len() - mid)?;
                let mut right_children = Vec::new();
                right_children.try_reserve_exact(children.len() - mid)?;

                right_keys.extend(keys.drain(mid..));
                right_children.extend(children.drain(mid..));
                // keys[mid - 1] moves up into the parent
                let separator = keys.swap_remove(mid - 1);
                Ok((
                    separator,
                    Node::Branch {
                        keys: right_keys,
                        children: right_children,
                    },
                ))
            }
        }
    }
}

/// Index of the child whose key range contains `key`
fn child_index<K>(compare: Compare<K>, keys: &[K], key: &K) -> usize {
    keys.partition_point(|separator| compare(separator, key) != Ordering::Greater)
}

fn split_child<K: Clone, V>(
    keys: &mut Vec<K>,
    children: &mut Vec<Node<K, V>>,
    index: usize,
) -> FdResult<()> {
    keys.try_reserve(1)?;
    children.try_reserve(1)?;
    let (separator, right) = children[index].split()?;
    keys.insert(index, separator);
    children.insert(index + 1, right);
    Ok(())
}

pub struct Index<K, V> {
    def: IndexDef<K>,
    root: Node<K, V>,
    len: usize,
    // makes every insert report an allocation failure
    #[cfg(test)]
    pub(crate) fail_inserts: bool,
}

impl<K: Clone, V> Index<K, V> {
    pub fn new(def: IndexDef<K>) -> Self {
        Self {
            def: IndexDef {
                branches: def.branches.max(MIN_BRANCHES),
                ..def
            },
            root: Node::Leaf(Vec::new()),
            len: 0,
            #[cfg(test)]
            fail_inserts: false,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a new entry or replace the value of an equal key
    pub fn insert(&mut self, key: K, value: V) -> FdResult<()> {
        #[cfg(test)]
        if self.fail_inserts {
            return Err(Vec::<u8>::new().try_reserve(usize::MAX).unwrap_err().into());
        }

        let compare = self.def.compare;
        let branches = self.def.branches;

        if self.root.is_full(branches) {
            self.grow()?;
        }

        // full pages are split on the way down so that a split
        // never has to travel back up
        let mut node = &mut self.root;
        loop {
            match node {
                Node::Leaf(entries) => {
                    match entries.binary_search_by(|(k, _)| compare(k, &key)) {
                        Ok(i) => entries[i].1 = value,
                        Err(i) => {
                            entries.try_reserve(1)?;
                            entries.insert(i, (key, value));
                            self.len += 1;
                        }
                    }
                    return Ok(());
                }
                Node::Branch { keys, children } => {
                    let mut i = child_index(compare, keys, &key);
                    if children[i].is_full(branches) {
                        split_child(keys, children, i)?;
                        if compare(&keys[i], &key) != Ordering::Greater {
                            i += 1;
                        }
                    }
                    node = &mut children[i];
                }
            }
        }
    }

    /// Push the root one level down. The new root has a single child
    /// which the next descent is free to split.
    fn grow(&mut self) -> FdResult<()> {
        let mut children = Vec::new();
        children.try_reserve(MIN_BRANCHES)?;
        let old = std::mem::replace(&mut self.root, Node::Leaf(Vec::new()));
        children.push(old);
        self.root = Node::Branch {
            keys: Vec::new(),
            children,
        };
        Ok(())
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let compare = self.def.compare;
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf(entries) => {
                    return entries
                        .binary_search_by(|(k, _)| compare(k, key))
                        .ok()
                        .map(|i| &entries[i].1)
                }
                Node::Branch { keys, children } => {
                    node = &children[child_index(compare, keys, key)];
                }
            }
        }
    }

    /// Remove the entry equal to `key` and hand back its value
    pub fn remove(&mut self, key: &K) -> FdResult<V> {
        let value =
            Self::remove_from(self.def.compare, &mut self.root, key).ok_or(Error::KeyNotFound)?;
        self.len -= 1;
        self.shrink();
        Ok(value)
    }

    fn remove_from(compare: Compare<K>, node: &mut Node<K, V>, key: &K) -> Option<V> {
        match node {
            Node::Leaf(entries) => {
                let i = entries.binary_search_by(|(k, _)| compare(k, key)).ok()?;
                Some(entries.remove(i).1)
            }
            Node::Branch { keys, children } => {
                let i = child_index(compare, keys, key);
                let value = Self::remove_from(compare, &mut children[i], key)?;
                if children[i].is_empty() {
                    children.remove(i);
                    if !keys.is_empty() {
                        keys.remove(i.saturating_sub(1));
                    }
                }
                Some(value)
            }
        }
    }

    /// Collapse roots that have one child or none
    fn shrink(&mut self) {
        while let Node::Branch { children, .. } = &mut self.root {
            if children.len() > 1 {
                break;
            }
            let child = children.pop().unwrap_or(Node::Leaf(Vec::new()));
            self.root = child;
        }
    }

    pub fn seek(&self, seek: Seek<'_, K>) -> Option<(&K, &V)> {
        match seek {
            Seek::First => Self::first(&self.root),
            Seek::Next(anchor) => Self::next(self.def.compare, &self.root, anchor),
            Seek::LessOrEqual(anchor) => Self::floor(self.def.compare, &self.root, anchor),
        }
    }

    fn first(node: &Node<K, V>) -> Option<(&K, &V)> {
        match node {
            Node::Leaf(entries) => entries.first().map(|(k, v)| (k, v)),
            Node::Branch { children, .. } => children.iter().find_map(Self::first),
        }
    }

    fn last(node: &Node<K, V>) -> Option<(&K, &V)> {
        match node {
            Node::Leaf(entries) => entries.last().map(|(k, v)| (k, v)),
            Node::Branch { children, .. } => children.iter().rev().find_map(Self::last),
        }
    }

    fn next<'a>(compare: Compare<K>, node: &'a Node<K, V>, anchor: &K) -> Option<(&'a K, &'a V)> {
        match node {
            Node::Leaf(entries) => {
                let i = entries.partition_point(|(k, _)| compare(k, anchor) != Ordering::Greater);
                entries.get(i).map(|(k, v)| (k, v))
            }
            Node::Branch { keys, children } => {
                let i = child_index(compare, keys, anchor);
                Self::next(compare, &children[i], anchor)
                    .or_else(|| children[i + 1..].iter().find_map(Self::first))
            }
        }
    }

    fn floor<'a>(compare: Compare<K>, node: &'a Node<K, V>, anchor: &K) -> Option<(&'a K, &'a V)> {
        match node {
            Node::Leaf(entries) => {
                let i = entries.partition_point(|(k, _)| compare(k, anchor) != Ordering::Greater);
                i.checked_sub(1).map(|i| (&entries[i].0, &entries[i].1))
            }
            Node::Branch { keys, children } => {
                let i = child_index(compare, keys, anchor);
                Self::floor(compare, &children[i], anchor)
                    .or_else(|| children[..i].iter().rev().find_map(Self::last))
            }
        }
    }

    /// Drop every entry and release all pages
    pub fn clear(&mut self) {
        self.root = Node::Leaf(Vec::new());
        self.len = 0;
    }
}
