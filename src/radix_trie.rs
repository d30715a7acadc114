//! Radix Trie - adaptive radix tree over 64-bit keys.
//!
//! Keys are consumed one byte at a time from the most significant end.
//! Inner nodes come in four sizes and are swapped for a larger or smaller
//! size as children are added or removed:
//!
//! | Node    | Children | Lookup                          |
//! |---------|----------|---------------------------------|
//! | Node4   | 1..=4    | sorted byte array               |
//! | Node16  | 5..=16   | sorted byte array (binary search) |
//! | Node48  | 17..=48  | 256-entry byte index into 48 slots |
//! | Node256 | 49..=256 | direct slot per byte            |
//!
//! Path compression: every inner node stores the key bits above the byte
//! it branches on, so chains of single-child nodes never exist. A node
//! left with one child is replaced by that child.
//!
//! Shrinking uses lower thresholds than growing so a node that sits at
//! a boundary does not flip between sizes on every insert/remove.

use std::cmp::Ordering;
use std::fmt;
use std::mem;
use std::ops::ControlFlow;

use arrayvec::ArrayVec;

use crate::arena::ArenaIndex;
use crate::config::BookConfig;
use crate::error::BookError;
use crate::price_index::{Direction, PriceIndex};

pub const NODE4_CAPACITY: usize = 4;
pub const NODE16_CAPACITY: usize = 16;
pub const NODE48_CAPACITY: usize = 48;
pub const NODE256_CAPACITY: usize = 256;

/// A Node16 holding this many children or fewer becomes a Node4.
pub const NODE16_SHRINK_AT: usize = 3;
/// A Node48 holding this many children or fewer becomes a Node16.
pub const NODE48_SHRINK_AT: usize = 12;
/// A Node256 holding this many children or fewer becomes a Node48.
pub const NODE256_SHRINK_AT: usize = 37;

/// Marks an unused byte in a Node48 index.
const EMPTY_SLOT: u8 = u8::MAX;

/// Shape of a trie node, for inspection and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Node4,
    Node16,
    Node48,
    Node256,
}

enum Child<V> {
    Leaf { key: u64, value: V },
    Inner(Box<Inner<V>>),
}

struct Inner<V> {
    /// Key bits above the branching byte; all lower bits are zero
    prefix: u64,
    /// Bit offset of the branching byte: 0, 8, ..., 56
    shift: u32,
    children: Children<V>,
}

enum Children<V> {
    Node4 {
        keys: ArrayVec<u8, NODE4_CAPACITY>,
        nodes: ArrayVec<Child<V>, NODE4_CAPACITY>,
    },
    Node16 {
        keys: ArrayVec<u8, NODE16_CAPACITY>,
        nodes: ArrayVec<Child<V>, NODE16_CAPACITY>,
    },
    Node48 {
        index: Box<[u8; 256]>,
        nodes: Vec<Option<Child<V>>>,
        len: usize,
    },
    Node256 {
        nodes: Vec<Option<Child<V>>>,
        len: usize,
    },
}

#[inline]
fn key_byte(key: u64, shift: u32) -> u8 {
    (key >> shift) as u8
}

/// Mask selecting the key bits above the byte at `shift`.
#[inline]
fn prefix_mask(shift: u32) -> u64 {
    if shift >= 56 {
        0
    } else {
        u64::MAX << (shift + 8)
    }
}

/// Shift of the most significant byte in which `a` and `b` differ.
#[inline]
fn split_shift(a: u64, b: u64) -> u32 {
    debug_assert_ne!(a, b);
    (63 - (a ^ b).leading_zeros()) & !7
}

fn empty_slots<V>(count: usize) -> Vec<Option<Child<V>>> {
    (0..count).map(|_| None).collect()
}

impl<V> Child<V> {
    /// A key stored somewhere below this child. Any one will do: they all
    /// share the bits above the child's branching byte.
    #[inline]
    fn any_key(&self) -> u64 {
        match self {
            Child::Leaf { key, .. } => *key,
            Child::Inner(inner) => inner.prefix,
        }
    }

    fn kind(&self) -> NodeKind {
        match self {
            Child::Leaf { .. } => NodeKind::Leaf,
            Child::Inner(inner) => inner.children.kind(),
        }
    }
}

impl<V> Inner<V> {
    fn new(key: u64, shift: u32) -> Self {
        Self {
            prefix: key & prefix_mask(shift),
            shift,
            children: Children::Node4 {
                keys: ArrayVec::new(),
                nodes: ArrayVec::new(),
            },
        }
    }

    /// Orders `key` against the keys under this node.
    ///
    /// `Equal` means `key` shares the prefix and may be stored below;
    /// `Less` means it sorts before every key here, `Greater` after.
    #[inline]
    fn compare_prefix(&self, key: u64) -> Ordering {
        (key & prefix_mask(self.shift)).cmp(&self.prefix)
    }

    fn add_child(&mut self, byte: u8, child: Child<V>) {
        if self.children.is_full() {
            let full = mem::replace(&mut self.children, Children::placeholder());
            self.children = full.grow();
        }
        self.children.insert(byte, child);
    }

    fn shrink_if_sparse(&mut self) {
        if self.children.is_sparse() {
            let sparse = mem::replace(&mut self.children, Children::placeholder());
            self.children = sparse.shrink();
        }
    }
}

impl<V> Children<V> {
    #[inline]
    fn placeholder() -> Self {
        Children::Node4 {
            keys: ArrayVec::new(),
            nodes: ArrayVec::new(),
        }
    }

    fn kind(&self) -> NodeKind {
        match self {
            Children::Node4 { .. } => NodeKind::Node4,
            Children::Node16 { .. } => NodeKind::Node16,
            Children::Node48 { .. } => NodeKind::Node48,
            Children::Node256 { .. } => NodeKind::Node256,
        }
    }

    #[inline]
    fn len(&self) -> usize {
        match self {
            Children::Node4 { keys, .. } => keys.len(),
            Children::Node16 { keys, .. } => keys.len(),
            Children::Node48 { len, .. } | Children::Node256 { len, .. } => *len,
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        match self {
            Children::Node4 { .. } => NODE4_CAPACITY,
            Children::Node16 { .. } => NODE16_CAPACITY,
            Children::Node48 { .. } => NODE48_CAPACITY,
            Children::Node256 { .. } => NODE256_CAPACITY,
        }
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    #[inline]
    fn is_sparse(&self) -> bool {
        match self {
            Children::Node4 { .. } => false,
            Children::Node16 { keys, .. } => keys.len() <= NODE16_SHRINK_AT,
            Children::Node48 { len, .. } => *len <= NODE48_SHRINK_AT,
            Children::Node256 { len, .. } => *len <= NODE256_SHRINK_AT,
        }
    }

    fn get(&self, byte: u8) -> Option<&Child<V>> {
        match self {
            Children::Node4 { keys, nodes } => keys.binary_search(&byte).ok().map(|i| &nodes[i]),
            Children::Node16 { keys, nodes } => keys.binary_search(&byte).ok().map(|i| &nodes[i]),
            Children::Node48 { index, nodes, .. } => match index[byte as usize] {
                EMPTY_SLOT => None,
                slot => nodes[slot as usize].as_ref(),
            },
            Children::Node256 { nodes, .. } => nodes[byte as usize].as_ref(),
        }
    }

    fn get_mut(&mut self, byte: u8) -> Option<&mut Child<V>> {
        match self {
            Children::Node4 { keys, nodes } => match keys.binary_search(&byte) {
                Ok(i) => Some(&mut nodes[i]),
                Err(_) => None,
            },
            Children::Node16 { keys, nodes } => match keys.binary_search(&byte) {
                Ok(i) => Some(&mut nodes[i]),
                Err(_) => None,
            },
            Children::Node48 { index, nodes, .. } => match index[byte as usize] {
                EMPTY_SLOT => None,
                slot => nodes[slot as usize].as_mut(),
            },
            Children::Node256 { nodes, .. } => nodes[byte as usize].as_mut(),
        }
    }

    /// Insert a child under a byte that is not yet used.
    ///
    /// The node must have room; callers grow it first.
    fn insert(&mut self, byte: u8, child: Child<V>) {
        debug_assert!(!self.is_full());
        debug_assert!(self.get(byte).is_none());
        match self {
            Children::Node4 { keys, nodes } => {
                let pos = keys.partition_point(|k| *k < byte);
                keys.insert(pos, byte);
                nodes.insert(pos, child);
            }
            Children::Node16 { keys, nodes } => {
                let pos = keys.partition_point(|k| *k < byte);
                keys.insert(pos, byte);
                nodes.insert(pos, child);
            }
            Children::Node48 { index, nodes, len } => {
                if let Some(slot) = nodes.iter().position(Option::is_none) {
                    nodes[slot] = Some(child);
                    index[byte as usize] = slot as u8;
                    *len += 1;
                }
            }
            Children::Node256 { nodes, len } => {
                nodes[byte as usize] = Some(child);
                *len += 1;
            }
        }
    }

    fn remove(&mut self, byte: u8) -> Option<Child<V>> {
        match self {
            Children::Node4 { keys, nodes } => {
                let pos = keys.binary_search(&byte).ok()?;
                keys.remove(pos);
                Some(nodes.remove(pos))
            }
            Children::Node16 { keys, nodes } => {
                let pos = keys.binary_search(&byte).ok()?;
                keys.remove(pos);
                Some(nodes.remove(pos))
            }
            Children::Node48 { index, nodes, len } => {
                let slot = mem::replace(&mut index[byte as usize], EMPTY_SLOT);
                if slot == EMPTY_SLOT {
                    return None;
                }
                *len -= 1;
                nodes[slot as usize].take()
            }
            Children::Node256 { nodes, len } => {
                let child = nodes[byte as usize].take()?;
                *len -= 1;
                Some(child)
            }
        }
    }

    /// Child with the smallest byte strictly above `byte`.
    fn next_after(&self, byte: u8) -> Option<&Child<V>> {
        let from = byte as usize + 1;
        match self {
            Children::Node4 { keys, nodes } => keys.iter().position(|k| *k > byte).map(|i| &nodes[i]),
            Children::Node16 { keys, nodes } => keys.iter().position(|k| *k > byte).map(|i| &nodes[i]),
            Children::Node48 { index, nodes, .. } => index
                .get(from..)?
                .iter()
                .find(|slot| **slot != EMPTY_SLOT)
                .and_then(|slot| nodes[*slot as usize].as_ref()),
            Children::Node256 { nodes, .. } => nodes.get(from..)?.iter().find_map(Option::as_ref),
        }
    }

    /// Child with the largest byte strictly below `byte`.
    fn prev_before(&self, byte: u8) -> Option<&Child<V>> {
        let to = byte as usize;
        match self {
            Children::Node4 { keys, nodes } => keys.iter().rposition(|k| *k < byte).map(|i| &nodes[i]),
            Children::Node16 { keys, nodes } => keys.iter().rposition(|k| *k < byte).map(|i| &nodes[i]),
            Children::Node48 { index, nodes, .. } => index[..to]
                .iter()
                .rev()
                .find(|slot| **slot != EMPTY_SLOT)
                .and_then(|slot| nodes[*slot as usize].as_ref()),
            Children::Node256 { nodes, .. } => nodes[..to].iter().rev().find_map(Option::as_ref),
        }
    }

    fn first(&self) -> Option<&Child<V>> {
        match self {
            Children::Node4 { nodes, .. } => nodes.first(),
            Children::Node16 { nodes, .. } => nodes.first(),
            Children::Node48 { index, nodes, .. } => index
                .iter()
                .find(|slot| **slot != EMPTY_SLOT)
                .and_then(|slot| nodes[*slot as usize].as_ref()),
            Children::Node256 { nodes, .. } => nodes.iter().find_map(Option::as_ref),
        }
    }

    fn last(&self) -> Option<&Child<V>> {
        match self {
            Children::Node4 { nodes, .. } => nodes.last(),
            Children::Node16 { nodes, .. } => nodes.last(),
            Children::Node48 { index, nodes, .. } => index
                .iter()
                .rev()
                .find(|slot| **slot != EMPTY_SLOT)
                .and_then(|slot| nodes[*slot as usize].as_ref()),
            Children::Node256 { nodes, .. } => nodes.iter().rev().find_map(Option::as_ref),
        }
    }

    /// Children paired with their byte, in ascending byte order.
    fn entries(&self) -> Vec<(u8, &Child<V>)> {
        match self {
            Children::Node4 { keys, nodes } => keys.iter().copied().zip(nodes.iter()).collect(),
            Children::Node16 { keys, nodes } => keys.iter().copied().zip(nodes.iter()).collect(),
            Children::Node48 { index, nodes, .. } => (0..=u8::MAX)
                .filter_map(|b| match index[b as usize] {
                    EMPTY_SLOT => None,
                    slot => nodes[slot as usize].as_ref().map(|c| (b, c)),
                })
                .collect(),
            Children::Node256 { nodes, .. } => (0..=u8::MAX)
                .filter_map(|b| nodes[b as usize].as_ref().map(|c| (b, c)))
                .collect(),
        }
    }

    fn for_each(
        &self,
        direction: Direction,
        f: &mut dyn FnMut(&Child<V>) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        match self {
            Children::Node4 { nodes, .. } => walk(nodes.iter(), direction, f),
            Children::Node16 { nodes, .. } => walk(nodes.iter(), direction, f),
            Children::Node48 { index, nodes, .. } => walk(
                index
                    .iter()
                    .filter(|slot| **slot != EMPTY_SLOT)
                    .filter_map(|slot| nodes[*slot as usize].as_ref()),
                direction,
                f,
            ),
            Children::Node256 { nodes, .. } => walk(nodes.iter().filter_map(Option::as_ref), direction, f),
        }
    }

    /// Move every child into the next larger node size.
    fn grow(self) -> Self {
        match self {
            Children::Node4 { keys, nodes } => Children::Node16 {
                keys: keys.into_iter().collect(),
                nodes: nodes.into_iter().collect(),
            },
            Children::Node16 { keys, nodes } => {
                let mut index = Box::new([EMPTY_SLOT; 256]);
                let mut slots = empty_slots(NODE48_CAPACITY);
                let len = keys.len();
                for (slot, (byte, child)) in keys.into_iter().zip(nodes).enumerate() {
                    index[byte as usize] = slot as u8;
                    slots[slot] = Some(child);
                }
                Children::Node48 {
                    index,
                    nodes: slots,
                    len,
                }
            }
            Children::Node48 { index, mut nodes, len } => {
                let mut slots = empty_slots(NODE256_CAPACITY);
                for (byte, slot) in index.iter().enumerate() {
                    if *slot != EMPTY_SLOT {
                        slots[byte] = nodes[*slot as usize].take();
                    }
                }
                Children::Node256 { nodes: slots, len }
            }
            full @ Children::Node256 { .. } => full,
        }
    }

    /// Move every child into the next smaller node size.
    fn shrink(self) -> Self {
        match self {
            Children::Node16 { keys, nodes } => Children::Node4 {
                keys: keys.into_iter().collect(),
                nodes: nodes.into_iter().collect(),
            },
            Children::Node48 { index, mut nodes, .. } => {
                let mut keys = ArrayVec::new();
                let mut children = ArrayVec::new();
                for (byte, slot) in index.iter().enumerate() {
                    if *slot == EMPTY_SLOT {
                        continue;
                    }
                    if let Some(child) = nodes[*slot as usize].take() {
                        keys.push(byte as u8);
                        children.push(child);
                    }
                }
                Children::Node16 {
                    keys,
                    nodes: children,
                }
            }
            Children::Node256 { nodes, len } => {
                let mut index = Box::new([EMPTY_SLOT; 256]);
                let mut slots = empty_slots(NODE48_CAPACITY);
                let mut next = 0usize;
                for (byte, child) in nodes.into_iter().enumerate() {
                    if let Some(child) = child {
                        index[byte] = next as u8;
                        slots[next] = Some(child);
                        next += 1;
                    }
                }
                debug_assert_eq!(next, len);
                Children::Node48 {
                    index,
                    nodes: slots,
                    len,
                }
            }
            small @ Children::Node4 { .. } => small,
        }
    }

    /// Take the single remaining child out of a one-child node.
    fn into_only(self) -> Option<Child<V>> {
        match self {
            Children::Node4 { nodes, .. } => nodes.into_iter().next(),
            Children::Node16 { nodes, .. } => nodes.into_iter().next(),
            Children::Node48 { nodes, .. } | Children::Node256 { nodes, .. } => nodes.into_iter().flatten().next(),
        }
    }
}

fn walk<'a, V: 'a, I>(mut iter: I, direction: Direction, f: &mut dyn FnMut(&Child<V>) -> ControlFlow<()>) -> ControlFlow<()>
where
    I: DoubleEndedIterator<Item = &'a Child<V>>,
{
    match direction {
        Direction::Ascending => iter.try_for_each(|c| f(c)),
        Direction::Descending => iter.rev().try_for_each(|c| f(c)),
    }
}

// ============================================================================
// Tree walks
// ============================================================================

fn min_leaf<V>(mut node: &Child<V>) -> Option<(u64, &V)> {
    loop {
        match node {
            Child::Leaf { key, value } => return Some((*key, value)),
            Child::Inner(inner) => node = inner.children.first()?,
        }
    }
}

fn max_leaf<V>(mut node: &Child<V>) -> Option<(u64, &V)> {
    loop {
        match node {
            Child::Leaf { key, value } => return Some((*key, value)),
            Child::Inner(inner) => node = inner.children.last()?,
        }
    }
}

fn get_mut_in<V>(node: &mut Child<V>, key: u64) -> Option<&mut V> {
    match node {
        Child::Leaf { key: k, value } => (*k == key).then_some(value),
        Child::Inner(inner) => {
            if !inner.compare_prefix(key).is_eq() {
                return None;
            }
            get_mut_in(inner.children.get_mut(key_byte(key, inner.shift))?, key)
        }
    }
}

fn ceiling_in<V>(node: &Child<V>, key: u64) -> Option<(u64, &V)> {
    match node {
        Child::Leaf { key: k, value } => (*k >= key).then_some((*k, value)),
        Child::Inner(inner) => match inner.compare_prefix(key) {
            Ordering::Less => min_leaf(node),
            Ordering::Greater => None,
            Ordering::Equal => {
                let byte = key_byte(key, inner.shift);
                inner
                    .children
                    .get(byte)
                    .and_then(|child| ceiling_in(child, key))
                    .or_else(|| inner.children.next_after(byte).and_then(min_leaf))
            }
        },
    }
}

fn floor_in<V>(node: &Child<V>, key: u64) -> Option<(u64, &V)> {
    match node {
        Child::Leaf { key: k, value } => (*k <= key).then_some((*k, value)),
        Child::Inner(inner) => match inner.compare_prefix(key) {
            Ordering::Greater => max_leaf(node),
            Ordering::Less => None,
            Ordering::Equal => {
                let byte = key_byte(key, inner.shift);
                inner
                    .children
                    .get(byte)
                    .and_then(|child| floor_in(child, key))
                    .or_else(|| inner.children.prev_before(byte).and_then(max_leaf))
            }
        },
    }
}

fn visit_child<V>(
    node: &Child<V>,
    direction: Direction,
    f: &mut dyn FnMut(u64, &V) -> ControlFlow<()>,
) -> ControlFlow<()> {
    match node {
        Child::Leaf { key, value } => f(*key, value),
        Child::Inner(inner) => inner
            .children
            .for_each(direction, &mut |child| visit_child(child, direction, f)),
    }
}

fn insert_at<V>(slot: &mut Child<V>, key: u64, value: V) -> Option<V> {
    let split = match slot {
        Child::Leaf { key: existing, value: current } => {
            if *existing == key {
                return Some(mem::replace(current, value));
            }
            split_shift(*existing, key)
        }
        Child::Inner(inner) => {
            if inner.compare_prefix(key).is_eq() {
                let byte = key_byte(key, inner.shift);
                if let Some(child) = inner.children.get_mut(byte) {
                    return insert_at(child, key, value);
                }
                inner.add_child(byte, Child::Leaf { key, value });
                return None;
            }
            split_shift(inner.prefix, key)
        }
    };

    // `key` leaves the existing subtree at byte `split`: hang both under a new Node4
    let existing = mem::replace(slot, Child::Inner(Box::new(Inner::new(key, split))));
    if let Child::Inner(branch) = slot {
        branch.children.insert(key_byte(existing.any_key(), split), existing);
        branch.children.insert(key_byte(key, split), Child::Leaf { key, value });
    }
    None
}

/// Replace a one-child inner node by its child.
fn collapse<V>(slot: &mut Child<V>) {
    if let Child::Inner(inner) = slot {
        if inner.children.len() == 1 {
            let children = mem::replace(&mut inner.children, Children::placeholder());
            if let Some(only) = children.into_only() {
                *slot = only;
            }
        }
    }
}

fn remove_from<V>(inner: &mut Inner<V>, key: u64) -> Option<V> {
    if !inner.compare_prefix(key).is_eq() {
        return None;
    }
    let byte = key_byte(key, inner.shift);
    let child = inner.children.get_mut(byte)?;

    match child {
        Child::Leaf { key: k, .. } => {
            if *k != key {
                return None;
            }
            let value = match inner.children.remove(byte) {
                Some(Child::Leaf { value, .. }) => value,
                _ => return None,
            };
            inner.shrink_if_sparse();
            Some(value)
        }
        Child::Inner(sub) => {
            let removed = remove_from(sub, key);
            if removed.is_some() {
                collapse(child);
            }
            removed
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate_inner<V>(inner: &Inner<V>, leaves: &mut usize, last_key: &mut Option<u64>) -> Result<(), BookError> {
    let fail = |reason| BookError::RadixNode {
        shift: inner.shift,
        reason,
    };
    let children = &inner.children;

    if inner.shift % 8 != 0 || inner.shift > 56 {
        return Err(fail("branching byte not byte aligned"));
    }
    if inner.prefix & !prefix_mask(inner.shift) != 0 {
        return Err(fail("prefix carries bits below the branching byte"));
    }
    if children.len() < 2 {
        return Err(fail("inner node with fewer than two children"));
    }
    if children.len() > children.capacity() {
        return Err(fail("node over capacity"));
    }
    if children.is_sparse() {
        return Err(fail("node below its shrink threshold"));
    }
    match children {
        Children::Node4 { keys, nodes } if keys.len() != nodes.len() => {
            return Err(fail("key and child counts differ"));
        }
        Children::Node16 { keys, nodes } if keys.len() != nodes.len() => {
            return Err(fail("key and child counts differ"));
        }
        Children::Node48 { index, nodes, len } => {
            let used = index.iter().filter(|slot| **slot != EMPTY_SLOT).count();
            let filled = nodes.iter().filter(|n| n.is_some()).count();
            if used != *len || filled != *len || nodes.len() != NODE48_CAPACITY {
                return Err(fail("Node48 index out of sync with its slots"));
            }
        }
        Children::Node256 { nodes, len } => {
            if nodes.iter().filter(|n| n.is_some()).count() != *len {
                return Err(fail("Node256 child count out of sync"));
            }
        }
        _ => {}
    }

    let entries = children.entries();
    if entries.len() != children.len() {
        return Err(fail("duplicate or unreachable child bytes"));
    }
    for (byte, child) in entries {
        let key = child.any_key();
        if key & prefix_mask(inner.shift) != inner.prefix || key_byte(key, inner.shift) != byte {
            return Err(fail("child does not share the node prefix"));
        }
        match child {
            Child::Leaf { key, .. } => {
                if last_key.is_some_and(|last| last >= *key) {
                    return Err(fail("leaves out of order"));
                }
                *last_key = Some(*key);
                *leaves += 1;
            }
            Child::Inner(sub) => {
                if sub.shift >= inner.shift {
                    return Err(fail("child branches above its parent"));
                }
                validate_inner(sub, leaves, last_key)?;
            }
        }
    }
    Ok(())
}

// ============================================================================
// Public API
// ============================================================================

/// Ordered map from `u64` keys to `V`.
pub struct RadixTrie<V> {
    root: Option<Child<V>>,
    len: usize,
}

/// Radix trie used as a book side.
pub type RadixIndex = RadixTrie<ArenaIndex>;

impl<V> Default for RadixTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> RadixTrie<V> {
    pub const fn new() -> Self {
        Self { root: None, len: 0 }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.root = None;
        self.len = 0;
    }

    /// Shape of the root, `None` when empty.
    pub fn root_kind(&self) -> Option<NodeKind> {
        self.root.as_ref().map(Child::kind)
    }

    pub fn get(&self, key: u64) -> Option<&V> {
        let mut node = self.root.as_ref()?;
        loop {
            match node {
                Child::Leaf { key: k, value } => return (*k == key).then_some(value),
                Child::Inner(inner) => {
                    if !inner.compare_prefix(key).is_eq() {
                        return None;
                    }
                    node = inner.children.get(key_byte(key, inner.shift))?;
                }
            }
        }
    }

    pub fn get_mut(&mut self, key: u64) -> Option<&mut V> {
        self.root.as_mut().and_then(|root| get_mut_in(root, key))
    }

    #[inline]
    pub fn contains_key(&self, key: u64) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace; returns the previous value.
    pub fn insert(&mut self, key: u64, value: V) -> Option<V> {
        let previous = match self.root.as_mut() {
            None => {
                self.root = Some(Child::Leaf { key, value });
                None
            }
            Some(root) => insert_at(root, key, value),
        };
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    pub fn remove(&mut self, key: u64) -> Option<V> {
        let removed = match self.root.as_mut()? {
            Child::Leaf { key: k, .. } => {
                if *k != key {
                    return None;
                }
                match self.root.take() {
                    Some(Child::Leaf { value, .. }) => Some(value),
                    _ => None,
                }
            }
            Child::Inner(inner) => remove_from(inner, key),
        };

        if removed.is_some() {
            self.len -= 1;
            if let Some(root) = self.root.as_mut() {
                collapse(root);
            }
        }
        removed
    }

    /// Smallest entry with key `>= key`.
    pub fn ceiling(&self, key: u64) -> Option<(u64, &V)> {
        self.root.as_ref().and_then(|root| ceiling_in(root, key))
    }

    /// Largest entry with key `<= key`.
    pub fn floor(&self, key: u64) -> Option<(u64, &V)> {
        self.root.as_ref().and_then(|root| floor_in(root, key))
    }

    /// Smallest entry with key `> key`.
    pub fn higher(&self, key: u64) -> Option<(u64, &V)> {
        key.checked_add(1).and_then(|k| self.ceiling(k))
    }

    /// Largest entry with key `< key`.
    pub fn lower(&self, key: u64) -> Option<(u64, &V)> {
        key.checked_sub(1).and_then(|k| self.floor(k))
    }

    pub fn first(&self) -> Option<(u64, &V)> {
        self.root.as_ref().and_then(min_leaf)
    }

    pub fn last(&self) -> Option<(u64, &V)> {
        self.root.as_ref().and_then(max_leaf)
    }

    /// Visit entries in key order until `f` breaks.
    pub fn for_each(&self, direction: Direction, f: &mut dyn FnMut(u64, &V) -> ControlFlow<()>) -> ControlFlow<()> {
        match &self.root {
            Some(root) => visit_child(root, direction, f),
            None => ControlFlow::Continue(()),
        }
    }

    /// All entries in ascending key order.
    pub fn entries(&self) -> Vec<(u64, V)>
    where
        V: Clone,
    {
        let mut out = Vec::with_capacity(self.len);
        let _ = self.for_each(Direction::Ascending, &mut |key, value| {
            out.push((key, value.clone()));
            ControlFlow::Continue(())
        });
        out
    }

    /// Check node sizes, prefixes, ordering and the cached length.
    pub fn validate(&self) -> Result<(), BookError> {
        let mut leaves = 0usize;
        let mut last_key = None;
        match &self.root {
            None => {}
            Some(Child::Leaf { .. }) => leaves = 1,
            Some(Child::Inner(inner)) => validate_inner(inner, &mut leaves, &mut last_key)?,
        }
        if leaves != self.len {
            return Err(BookError::RadixLength {
                counted: leaves,
                expected: self.len,
            });
        }
        Ok(())
    }
}

impl<V> fmt::Debug for RadixTrie<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RadixTrie")
            .field("len", &self.len)
            .field("root", &self.root_kind())
            .finish()
    }
}

impl PriceIndex for RadixTrie<ArenaIndex> {
    fn with_config(_config: &BookConfig) -> Self {
        Self::new()
    }

    #[inline]
    fn get(&self, price: u64) -> Option<ArenaIndex> {
        RadixTrie::get(self, price).copied()
    }

    fn put(&mut self, price: u64, bucket: ArenaIndex) -> Option<ArenaIndex> {
        if let Some(existing) = RadixTrie::get(self, price) {
            return Some(*existing);
        }
        self.insert(price, bucket);
        None
    }

    fn remove(&mut self, price: u64) -> Option<ArenaIndex> {
        RadixTrie::remove(self, price)
    }

    fn ceiling(&self, price: u64) -> Option<(u64, ArenaIndex)> {
        RadixTrie::ceiling(self, price).map(|(p, b)| (p, *b))
    }

    fn floor(&self, price: u64) -> Option<(u64, ArenaIndex)> {
        RadixTrie::floor(self, price).map(|(p, b)| (p, *b))
    }

    fn first(&self) -> Option<(u64, ArenaIndex)> {
        RadixTrie::first(self).map(|(p, b)| (p, *b))
    }

    fn last(&self) -> Option<(u64, ArenaIndex)> {
        RadixTrie::last(self).map(|(p, b)| (p, *b))
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        RadixTrie::clear(self);
    }

    fn visit(&self, direction: Direction, f: &mut dyn FnMut(u64, ArenaIndex) -> ControlFlow<()>) {
        let _ = self.for_each(direction, &mut |price, bucket| f(price, *bucket));
    }

    fn validate(&self) -> Result<(), BookError> {
        RadixTrie::validate(self)
    }
}
