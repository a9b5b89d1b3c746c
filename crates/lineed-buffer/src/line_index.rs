//! Ordered index of stored lines.
//!
//! ## Learning: A Linked List in a `Vec`
//!
//! Line numbers shift on every insertion, so the index is a circular
//! doubly-linked list: splicing is O(1) and nothing else moves. Instead of
//! heap pointers the nodes live in an arena and refer to each other by
//! [`NodeId`]. Slot 0 is the sentinel, which sits both before line 1 and
//! after the last line; an empty document is just the sentinel pointing at
//! itself.
//!
//! ## Learning: Remembering the Last Lookup
//!
//! Finding line `n` means walking the list. Editors address lines in
//! sequence or close to the previous address, so the index remembers the
//! last `(position, node)` pair and walks from whichever of the sentinel,
//! the remembered node or the tail is nearest.

use crate::scratch::LineRecord;
use crate::{BufferError, BufferResult};

/// Handle to a node in a [`LineIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// The node before line 1 and after the last line.
    pub const SENTINEL: NodeId = NodeId(0);

    #[inline]
    pub fn is_sentinel(self) -> bool {
        self == Self::SENTINEL
    }
}

#[derive(Debug, Clone)]
struct Node {
    /// `None` for the sentinel and for freed slots
    record: Option<LineRecord>,
    prev: NodeId,
    next: NodeId,
}

impl Node {
    fn unlinked() -> Self {
        Self {
            record: None,
            prev: NodeId::SENTINEL,
            next: NodeId::SENTINEL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AddressCache {
    position: usize,
    node: NodeId,
}

impl Default for AddressCache {
    fn default() -> Self {
        Self {
            position: 0,
            node: NodeId::SENTINEL,
        }
    }
}

/// The in-memory line sequence of one document.
#[derive(Debug, Clone)]
pub struct LineIndex {
    nodes: Vec<Node>,

    /// Freed slots, reused before the arena grows
    free: Vec<NodeId>,

    /// Number of lines
    last: usize,

    /// Current line, 0 when positioned on the sentinel
    current: usize,

    cache: AddressCache,
}

impl LineIndex {
    /// Creates an index holding no lines.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::unlinked()],
            free: Vec::new(),
            last: 0,
            current: 0,
            cache: AddressCache::default(),
        }
    }

    /// Drops every line, leaving only the sentinel.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.nodes[0] = Node::unlinked();
        self.free.clear();
        self.last = 0;
        self.current = 0;
        self.cache = AddressCache::default();
    }

    /// Number of the last line, which is also the line count.
    #[inline]
    pub fn last_line(&self) -> usize {
        self.last
    }

    #[inline]
    pub fn current_line(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.last == 0
    }

    /// Moves the current line to `n` (0 selects the sentinel).
    ///
    /// # Errors
    ///
    /// Returns `invalid address` if `n` is past the last line.
    pub fn set_current(&mut self, n: usize) -> BufferResult<()> {
        if n > self.last {
            return Err(BufferError::InvalidAddress);
        }
        self.current = n;
        Ok(())
    }

    /// Storage location of a live line, `None` for the sentinel or a
    /// removed node.
    pub fn record(&self, node: NodeId) -> Option<LineRecord> {
        self.nodes.get(node.0).and_then(|slot| slot.record)
    }

    #[inline]
    fn next_of(&self, node: NodeId) -> NodeId {
        self.nodes[node.0].next
    }

    #[inline]
    fn prev_of(&self, node: NodeId) -> NodeId {
        self.nodes[node.0].prev
    }

    /// Splices a new line in right after the current line and makes it
    /// current.
    ///
    /// Every line added to a document goes through here, which keeps the
    /// address cache valid: the insertion point is what the cache remembers,
    /// and the new node only ever lands behind it.
    ///
    /// # Errors
    ///
    /// Returns `out of memory` if the arena cannot grow; nothing is linked.
    pub fn insert_after_current(&mut self, record: LineRecord) -> BufferResult<NodeId> {
        let prev = self.node_at(self.current)?;
        let next = self.next_of(prev);

        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                self.nodes.try_reserve(1)?;
                self.nodes.push(Node::unlinked());
                NodeId(self.nodes.len() - 1)
            }
        };

        self.nodes[id.0] = Node {
            record: Some(record),
            prev,
            next,
        };
        self.nodes[prev.0].next = id;
        self.nodes[next.0].prev = id;

        self.last += 1;
        self.current += 1;
        Ok(id)
    }

    /// Line number of `node` by scanning from the first line.
    ///
    /// The sentinel is line 0. This is O(n) and meant for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns `invalid address` if the node is not in the index.
    pub fn position_of(&self, node: NodeId) -> BufferResult<usize> {
        let mut cursor = NodeId::SENTINEL;
        let mut n = 0;
        while cursor != node {
            cursor = self.next_of(cursor);
            if cursor.is_sentinel() {
                return Err(BufferError::InvalidAddress);
            }
            n += 1;
        }
        Ok(n)
    }

    /// Node of line `n`, walking from the nearest of the sentinel, the
    /// cached node and the last line.
    ///
    /// The walk and the cache update happen within this call with no way
    /// for other code to run in between.
    ///
    /// # Errors
    ///
    /// Returns `invalid address` if `n` is past the last line.
    pub fn node_at(&mut self, n: usize) -> BufferResult<NodeId> {
        if n > self.last {
            return Err(BufferError::InvalidAddress);
        }

        let AddressCache {
            mut position,
            mut node,
        } = self.cache;

        if n > position {
            if n <= (position + self.last) / 2 {
                while position < n {
                    node = self.next_of(node);
                    position += 1;
                }
            } else {
                node = self.prev_of(NodeId::SENTINEL);
                position = self.last;
                while position > n {
                    node = self.prev_of(node);
                    position -= 1;
                }
            }
        } else if n >= position / 2 {
            while position > n {
                node = self.prev_of(node);
                position -= 1;
            }
        } else {
            node = NodeId::SENTINEL;
            position = 0;
            while position < n {
                node = self.next_of(node);
                position += 1;
            }
        }

        self.cache = AddressCache { position, node };
        Ok(node)
    }

    /// Removes lines `first..=last` from the index and returns their records.
    ///
    /// The line before the range becomes current and is also what the
    /// address cache remembers, so no cached node can point at a freed slot.
    /// The text stays in the scratch file.
    ///
    /// # Errors
    ///
    /// Returns `invalid address` unless `1 <= first <= last <= last_line()`.
    pub fn unlink_range(&mut self, first: usize, last: usize) -> BufferResult<Vec<LineRecord>> {
        if first == 0 || first > last || last > self.last {
            return Err(BufferError::InvalidAddress);
        }

        let count = last - first + 1;
        let mut removed = Vec::new();
        removed.try_reserve(count)?;
        self.free.try_reserve(count)?;

        let before = self.node_at(first - 1)?;
        let mut cursor = self.next_of(before);
        for _ in 0..count {
            let slot = std::mem::replace(&mut self.nodes[cursor.0], Node::unlinked());
            removed.extend(slot.record);
            self.free.push(cursor);
            cursor = slot.next;
        }

        self.nodes[before.0].next = cursor;
        self.nodes[cursor.0].prev = before;

        self.last -= count;
        self.current = first - 1;
        self.cache = AddressCache {
            position: first - 1,
            node: before,
        };
        Ok(removed)
    }

    /// Nodes of lines `1..=last_line()` in order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(self.next_of(NodeId::SENTINEL)), |node| {
            Some(self.next_of(*node))
        })
        .take_while(|node| !node.is_sentinel())
    }
}

impl Default for LineIndex {
    fn default() -> Self {
        Self::new()
    }
}
