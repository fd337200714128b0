// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::cmp::Ordering;

/// Sentinel arena index standing in for a null link.
const NIL: usize = usize::MAX;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Color {
    Red,
    Black,
}

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    color: Color,
    parent: usize,
    left: usize,
    right: usize,
}

/// Ordered map backed by a red-black tree with a configurable element cap.
///
/// Nodes live in an arena and link to each other by index, so parent links
/// need no shared ownership or raw pointers. Inserting a fresh key into a
/// full tree fails with `CapacityExceeded`; overwriting an existing key
/// allocates nothing and always succeeds.
///
/// Lookup and insert are O(log n). `remove` is not supported.
#[derive(Debug)]
pub struct RedBlackTree<K, V> {
    nodes: Vec<Node<K, V>>,
    root: usize,
    capacity: usize,
}

impl<K: Ord, V> RedBlackTree<K, V> {
    /// Creates an empty tree that can hold at most `capacity` elements.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::new(),
            root: NIL,
            capacity,
        }
    }

    /// Number of stored elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` once the element cap is reached.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// The configured element cap.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn node(&self, idx: usize) -> &Node<K, V> {
        #[allow(clippy::expect_used)]
        self.nodes.get(idx).expect("link should point into the arena")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node<K, V> {
        #[allow(clippy::expect_used)]
        self.nodes
            .get_mut(idx)
            .expect("link should point into the arena")
    }

    /// Color of a node; NIL links are black.
    fn color(&self, idx: usize) -> Color {
        if idx == NIL {
            Color::Black
        } else {
            self.node(idx).color
        }
    }

    /// Inserts or overwrites a key.
    ///
    /// # Errors
    ///
    /// Fails with `CapacityExceeded` when a fresh key does not fit anymore.
    pub fn set(&mut self, key: K, value: V) -> crate::Result<()> {
        let mut parent = NIL;
        let mut cur = self.root;
        let mut went_left = false;

        while cur != NIL {
            parent = cur;

            match key.cmp(&self.node(cur).key) {
                Ordering::Less => {
                    went_left = true;
                    cur = self.node(cur).left;
                }
                Ordering::Greater => {
                    went_left = false;
                    cur = self.node(cur).right;
                }
                Ordering::Equal => {
                    // Update in place, no new node
                    self.node_mut(cur).value = value;
                    return Ok(());
                }
            }
        }

        if self.is_full() {
            return Err(crate::Error::CapacityExceeded);
        }

        let idx = self.nodes.len();
        self.nodes.push(Node {
            key,
            value,
            color: Color::Red,
            parent,
            left: NIL,
            right: NIL,
        });

        if parent == NIL {
            self.root = idx;
        } else if went_left {
            self.node_mut(parent).left = idx;
        } else {
            self.node_mut(parent).right = idx;
        }

        self.insert_fixup(idx);

        Ok(())
    }

    /// Returns a reference to the key's value.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        let mut cur = self.root;

        while cur != NIL {
            let node = self.node(cur);

            cur = match key.cmp(&node.key) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(&node.value),
            };
        }

        None
    }

    /// Returns `true` if the key is stored.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Removal is not part of this tree.
    ///
    /// # Errors
    ///
    /// Always fails with `NotSupported`.
    pub fn remove(&mut self, _key: &K) -> crate::Result<()> {
        Err(crate::Error::NotSupported(
            "red-black tree does not support removal",
        ))
    }

    /// Drops all elements, keeping the cap.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = NIL;
    }

    /// In-order (sorted by key) iteration.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter {
            tree: self,
            stack: Vec::new(),
        };
        iter.push_left_spine(self.root);
        iter
    }

    /// Restores the red-black shape after inserting the red node `z`.
    ///
    /// Classic recolor-and-rotate walk: a red parent with a red uncle pushes
    /// the violation towards the root; a black uncle resolves it locally with
    /// at most two rotations.
    fn insert_fixup(&mut self, mut z: usize) {
        while self.color(self.node(z).parent) == Color::Red {
            let parent = self.node(z).parent;

            // A red parent is never the root, so the grandparent exists
            let grandparent = self.node(parent).parent;

            if parent == self.node(grandparent).left {
                let uncle = self.node(grandparent).right;

                if self.color(uncle) == Color::Red {
                    self.node_mut(parent).color = Color::Black;
                    self.node_mut(uncle).color = Color::Black;
                    self.node_mut(grandparent).color = Color::Red;
                    z = grandparent;
                } else {
                    if z == self.node(parent).right {
                        z = parent;
                        self.rotate_left(z);
                    }

                    let parent = self.node(z).parent;
                    let grandparent = self.node(parent).parent;
                    self.node_mut(parent).color = Color::Black;
                    self.node_mut(grandparent).color = Color::Red;
                    self.rotate_right(grandparent);
                }
            } else {
                let uncle = self.node(grandparent).left;

                if self.color(uncle) == Color::Red {
                    self.node_mut(parent).color = Color::Black;
                    self.node_mut(uncle).color = Color::Black;
                    self.node_mut(grandparent).color = Color::Red;
                    z = grandparent;
                } else {
                    if z == self.node(parent).left {
                        z = parent;
                        self.rotate_right(z);
                    }

                    let parent = self.node(z).parent;
                    let grandparent = self.node(parent).parent;
                    self.node_mut(parent).color = Color::Black;
                    self.node_mut(grandparent).color = Color::Red;
                    self.rotate_left(grandparent);
                }
            }
        }

        let root = self.root;
        self.node_mut(root).color = Color::Black;
    }

    fn rotate_left(&mut self, x: usize) {
        let y = self.node(x).right;
        debug_assert_ne!(NIL, y, "rotation pivot must exist");

        let y_left = self.node(y).left;
        self.node_mut(x).right = y_left;
        if y_left != NIL {
            self.node_mut(y_left).parent = x;
        }

        let x_parent = self.node(x).parent;
        self.node_mut(y).parent = x_parent;

        if x_parent == NIL {
            self.root = y;
        } else if self.node(x_parent).left == x {
            self.node_mut(x_parent).left = y;
        } else {
            self.node_mut(x_parent).right = y;
        }

        self.node_mut(y).left = x;
        self.node_mut(x).parent = y;
    }

    fn rotate_right(&mut self, x: usize) {
        let y = self.node(x).left;
        debug_assert_ne!(NIL, y, "rotation pivot must exist");

        let y_right = self.node(y).right;
        self.node_mut(x).left = y_right;
        if y_right != NIL {
            self.node_mut(y_right).parent = x;
        }

        let x_parent = self.node(x).parent;
        self.node_mut(y).parent = x_parent;

        if x_parent == NIL {
            self.root = y;
        } else if self.node(x_parent).right == x {
            self.node_mut(x_parent).right = y;
        } else {
            self.node_mut(x_parent).left = y;
        }

        self.node_mut(y).right = x;
        self.node_mut(x).parent = y;
    }
}

/// In-order iterator over a [`RedBlackTree`].
pub struct Iter<'a, K, V> {
    tree: &'a RedBlackTree<K, V>,
    stack: Vec<usize>,
}

impl<K: Ord, V> Iter<'_, K, V> {
    fn push_left_spine(&mut self, mut idx: usize) {
        while idx != NIL {
            self.stack.push(idx);
            idx = self.tree.node(idx).left;
        }
    }
}

impl<'a, K: Ord, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.stack.pop()?;
        let node = self.tree.node(idx);

        self.push_left_spine(node.right);

        Some((&node.key, &node.value))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use test_log::test;

    impl<K: Ord, V> RedBlackTree<K, V> {
        /// Asserts every red-black invariant plus link consistency.
        fn check_invariants(&self) {
            if self.root == NIL {
                assert!(self.is_empty());
                return;
            }

            assert_eq!(NIL, self.node(self.root).parent);
            assert_eq!(Color::Black, self.node(self.root).color);

            self.check_subtree(self.root);
        }

        /// Returns the black height of the subtree.
        fn check_subtree(&self, idx: usize) -> usize {
            if idx == NIL {
                return 1;
            }

            let node = self.node(idx);

            if node.color == Color::Red {
                assert_eq!(Color::Black, self.color(node.left), "red-red violation");
                assert_eq!(Color::Black, self.color(node.right), "red-red violation");
            }

            for child in [node.left, node.right] {
                if child != NIL {
                    assert_eq!(idx, self.node(child).parent, "broken parent link");
                }
            }

            if node.left != NIL {
                assert!(self.node(node.left).key < node.key, "BST order violation");
            }
            if node.right != NIL {
                assert!(self.node(node.right).key > node.key, "BST order violation");
            }

            let left_height = self.check_subtree(node.left);
            let right_height = self.check_subtree(node.right);
            assert_eq!(left_height, right_height, "unequal black height");

            left_height + usize::from(node.color == Color::Black)
        }
    }

    #[test]
    fn rbtree_sequential_inserts() -> crate::Result<()> {
        let mut tree = RedBlackTree::with_capacity(1_000);

        for i in 0..1_000 {
            tree.set(i, i * 2)?;
            tree.check_invariants();
        }

        assert_eq!(1_000, tree.len());
        assert_eq!(Some(&10), tree.get(&5));
        assert_eq!(None, tree.get(&1_000));

        let keys: Vec<i32> = tree.iter().map(|(k, _)| *k).collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(1_000, keys.len());

        Ok(())
    }

    #[test]
    fn rbtree_descending_and_interleaved_inserts() -> crate::Result<()> {
        let mut tree = RedBlackTree::with_capacity(512);

        for i in (0..256).rev() {
            tree.set(i, ())?;
        }
        for i in (256..512).step_by(2) {
            tree.set(i, ())?;
        }
        for i in (257..512).step_by(2) {
            tree.set(i, ())?;
        }
        tree.check_invariants();

        assert_eq!(512, tree.len());
        assert!(tree.contains(&0));
        assert!(tree.contains(&511));

        Ok(())
    }

    #[test]
    fn rbtree_random_workload() -> crate::Result<()> {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0xCA5C);
        let mut tree = RedBlackTree::with_capacity(10_000);
        let mut oracle = std::collections::BTreeMap::new();

        for _ in 0..5_000 {
            let key: u32 = rng.random_range(0..2_000);
            let value: u64 = rng.random();

            tree.set(key, value)?;
            oracle.insert(key, value);
        }

        tree.check_invariants();

        assert_eq!(oracle.len(), tree.len());

        for (key, value) in &oracle {
            assert_eq!(Some(value), tree.get(key));
        }

        let tree_items: Vec<(u32, u64)> = tree.iter().map(|(k, v)| (*k, *v)).collect();
        let oracle_items: Vec<(u32, u64)> = oracle.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(oracle_items, tree_items);

        Ok(())
    }

    #[test]
    fn rbtree_update_in_place() -> crate::Result<()> {
        let mut tree = RedBlackTree::with_capacity(2);

        tree.set("a", 1)?;
        tree.set("b", 2)?;
        assert!(tree.is_full());

        // Overwriting allocates nothing and works at cap
        tree.set("a", 10)?;
        assert_eq!(Some(&10), tree.get(&"a"));
        assert_eq!(2, tree.len());

        Ok(())
    }

    #[test]
    fn rbtree_capacity_exceeded() -> crate::Result<()> {
        let mut tree = RedBlackTree::with_capacity(3);

        tree.set(1, ())?;
        tree.set(2, ())?;
        tree.set(3, ())?;

        assert!(tree.is_full());
        assert!(matches!(
            tree.set(4, ()),
            Err(crate::Error::CapacityExceeded)
        ));
        assert!(!tree.contains(&4));

        Ok(())
    }

    #[test]
    fn rbtree_remove_unsupported() {
        let mut tree = RedBlackTree::<i32, i32>::with_capacity(8);
        assert!(matches!(
            tree.remove(&1),
            Err(crate::Error::NotSupported(_))
        ));
    }

    #[test]
    fn rbtree_clear() -> crate::Result<()> {
        let mut tree = RedBlackTree::with_capacity(100);

        for i in 0..50 {
            tree.set(i, i)?;
        }

        tree.clear();
        assert!(tree.is_empty());
        assert!(!tree.contains(&10));

        tree.set(1, 1)?;
        tree.check_invariants();
        assert_eq!(1, tree.len());

        Ok(())
    }
}
