//! Ordered multiset of keys backing one partition.
//!
//! Each distinct key is a node in an unbalanced binary search tree ordered
//! by lexicographic comparison, carrying an occurrence count instead of a
//! value payload. Nodes live in a slot vector and link to each other through
//! 4-byte refs rather than raw pointers, so structural edits never touch the
//! allocator and removal is plain slot surgery.
//!
//! The tree has two lifecycle stages that the scheduler keeps temporally
//! disjoint:
//!
//! 1. **Accumulation** (map phase): `insert` only. Counts grow, nodes are
//!    never removed or relocated, and each key's `KeyEntry` stays at a
//!    stable heap address so the owning partition may publish it for
//!    lock-free increments.
//! 2. **Drain** (reduce phase): `reset_cursor` + `pull` only, under `&mut`
//!    access. Keys are delivered in ascending order and removed once their
//!    count is exhausted.

use std::sync::atomic::{AtomicU64, Ordering};

/// 4-byte slot reference with a NULL sentinel.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(transparent)]
struct Ref(u32);

impl Ref {
    const NULL: Self = Ref(u32::MAX);

    #[inline]
    fn new(slot: usize) -> Self {
        debug_assert!(slot < u32::MAX as usize);
        Ref(slot as u32)
    }

    #[inline]
    fn is_null(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    fn slot(self) -> usize {
        self.0 as usize
    }
}

/// One distinct key with its occurrence tally.
///
/// Boxed by its node so the address stays stable while the slot vector
/// grows; the count is atomic because the partition's lock-free fast path
/// increments it without holding the tree lock.
pub(crate) struct KeyEntry {
    pub(crate) key: Box<str>,
    pub(crate) count: AtomicU64,
}

struct Node {
    entry: Box<KeyEntry>,
    parent: Ref,
    left: Ref,
    right: Ref,
}

impl Node {
    fn new(key: &str, parent: Ref) -> Self {
        Self {
            entry: Box::new(KeyEntry {
                key: key.into(),
                count: AtomicU64::new(1),
            }),
            parent,
            left: Ref::NULL,
            right: Ref::NULL,
        }
    }
}

/// Ordered multiset of keys for a single partition.
pub(crate) struct KeyTree {
    slots: Vec<Option<Node>>,
    root: Ref,
    /// Node with the highest count seen so far; a performance hint for the
    /// partition's fast path, never consulted for ordering.
    frequent: Ref,
    /// Lexicographically smallest remaining node during the drain stage.
    cursor: Ref,
    len: usize,
}

impl KeyTree {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            root: Ref::NULL,
            frequent: Ref::NULL,
            cursor: Ref::NULL,
            len: 0,
        }
    }

    /// Number of distinct keys currently held.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.root.is_null()
    }

    #[inline]
    fn node(&self, r: Ref) -> &Node {
        self.slots[r.slot()].as_ref().expect("ref to vacated slot")
    }

    #[inline]
    fn node_mut(&mut self, r: Ref) -> &mut Node {
        self.slots[r.slot()].as_mut().expect("ref to vacated slot")
    }

    fn alloc(&mut self, node: Node) -> Ref {
        let r = Ref::new(self.slots.len());
        self.slots.push(Some(node));
        self.len += 1;
        r
    }

    /// Record one occurrence of `key`, creating its node if absent.
    ///
    /// Returns the entry with the highest count after the insert, which the
    /// owning partition publishes for the lock-free fast path. Caller must
    /// hold the partition lock; counts are still bumped atomically because
    /// the fast path may race an increment onto the same entry.
    pub(crate) fn insert(&mut self, key: &str) -> *const KeyEntry {
        if self.root.is_null() {
            let r = self.alloc(Node::new(key, Ref::NULL));
            self.root = r;
            self.frequent = r;
            return &*self.node(r).entry;
        }

        let mut current = self.root;
        let parent = loop {
            let node = self.node(current);
            match key.cmp(&node.entry.key) {
                std::cmp::Ordering::Equal => {
                    let count = node.entry.count.fetch_add(1, Ordering::Relaxed) + 1;
                    if count > self.node(self.frequent).entry.count.load(Ordering::Relaxed) {
                        self.frequent = current;
                    }
                    return &*self.node(self.frequent).entry;
                }
                std::cmp::Ordering::Less => {
                    if node.left.is_null() {
                        break current;
                    }
                    current = node.left;
                }
                std::cmp::Ordering::Greater => {
                    if node.right.is_null() {
                        break current;
                    }
                    current = node.right;
                }
            }
        };

        let r = self.alloc(Node::new(key, parent));
        let parent_node = self.node_mut(parent);
        if *parent_node.entry.key > *key {
            parent_node.left = r;
        } else {
            parent_node.right = r;
        }
        &*self.node(self.frequent).entry
    }

    /// Establish the cursor at the lexicographically smallest key by
    /// descending left links from the root.
    pub(crate) fn reset_cursor(&mut self) {
        self.cursor = self.leftmost_from(self.root);
    }

    fn leftmost_from(&self, mut r: Ref) -> Ref {
        if r.is_null() {
            return Ref::NULL;
        }
        while !self.node(r).left.is_null() {
            r = self.node(r).left;
        }
        r
    }

    /// Key currently under the cursor, if any remain.
    pub(crate) fn cursor_key(&self) -> Option<&str> {
        if self.cursor.is_null() {
            None
        } else {
            Some(&self.node(self.cursor).entry.key)
        }
    }

    /// Consume one occurrence of `key` if it is the cursor key.
    ///
    /// Returns `false` without mutating anything when the cursor is absent
    /// or `key` does not match it; this is the exhaustion signal that ends a
    /// reduce callback's pull loop. When the count reaches zero the node is
    /// unlinked and the cursor advances to the next smallest key.
    pub(crate) fn pull(&mut self, key: &str) -> bool {
        if self.cursor.is_null() {
            return false;
        }
        let cur = self.cursor;
        if *self.node(cur).entry.key != *key {
            return false;
        }

        let count = self.node(cur).entry.count.load(Ordering::Relaxed) - 1;
        self.node(cur).entry.count.store(count, Ordering::Relaxed);
        if count == 0 {
            self.remove_cursor_node();
        }
        true
    }

    /// Unlink the cursor node and advance the cursor to the new smallest key.
    ///
    /// The cursor was reached by leftmost descent, so the node has no left
    /// child and removal is a single parent-to-right-child relink.
    fn remove_cursor_node(&mut self) {
        let cur = self.cursor;
        debug_assert!(
            self.node(cur).left.is_null(),
            "cursor node must have no left child"
        );
        let node = self.slots[cur.slot()].take().expect("ref to vacated slot");
        self.len -= 1;

        if !node.right.is_null() {
            self.node_mut(node.right).parent = node.parent;
        }
        if node.parent.is_null() {
            self.root = node.right;
            self.cursor = self.root;
        } else {
            self.node_mut(node.parent).left = node.right;
            self.cursor = node.parent;
        }
        self.cursor = self.leftmost_from(self.cursor);
    }

    /// Release the partition's storage after its drain completes.
    pub(crate) fn clear(&mut self) {
        self.slots = Vec::new();
        self.root = Ref::NULL;
        self.frequent = Ref::NULL;
        self.cursor = Ref::NULL;
        self.len = 0;
    }

    /// Structural check used by tests: BST order, parent back-links,
    /// positive counts, live-slot accounting, and cursor-at-leftmost.
    #[cfg(test)]
    pub(crate) fn validate(&self) {
        let mut seen = 0usize;
        let mut stack = Vec::new();
        if !self.root.is_null() {
            assert!(self.node(self.root).parent.is_null());
            stack.push(self.root);
        }
        while let Some(r) = stack.pop() {
            seen += 1;
            let node = self.node(r);
            assert!(node.entry.count.load(Ordering::Relaxed) >= 1, "dead node linked");
            if !node.left.is_null() {
                let left = self.node(node.left);
                assert!(*left.entry.key < *node.entry.key, "left child out of order");
                assert_eq!(left.parent, r, "left parent back-link broken");
                stack.push(node.left);
            }
            if !node.right.is_null() {
                let right = self.node(node.right);
                assert!(*right.entry.key > *node.entry.key, "right child out of order");
                assert_eq!(right.parent, r, "right parent back-link broken");
                stack.push(node.right);
            }
        }
        assert_eq!(seen, self.len, "reachable node count must match len");
        if !self.cursor.is_null() {
            assert_eq!(
                self.cursor,
                self.leftmost_from(self.root),
                "cursor must reference the smallest remaining key"
            );
            assert!(
                self.node(self.cursor).left.is_null(),
                "cursor node must have no left child"
            );
        }
    }
}
