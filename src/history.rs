//! View history tracking.
//!
//! Records the sequence of work items most recently fetched from the
//! repository, deduplicated by id: re-fetching an item moves it to the tail
//! rather than adding a second entry. Backed by a doubly linked sequence whose
//! nodes live in an id-keyed map, so recording and eviction are O(1).

use std::collections::HashMap;

use crate::task::WorkItem;

struct Node {
    item: WorkItem,
    prev: Option<u64>,
    next: Option<u64>,
}

/// Recency-ordered, id-deduplicated record of viewed work items.
///
/// Unlike an LRU cache there is no size cap; entries leave only through
/// [`ViewHistory::evict`], which the repository calls on removal.
#[derive(Default)]
pub struct ViewHistory {
    nodes: HashMap<u64, Node>,
    head: Option<u64>,
    tail: Option<u64>,
}

impl ViewHistory {
    pub fn new() -> Self {
        ViewHistory::default()
    }

    /// Record a view of `item`, moving it to the tail if already present.
    /// The stored snapshot is replaced with the one passed in.
    pub fn record(&mut self, item: WorkItem) {
        let id = item.id();
        self.evict(id);

        let node = Node {
            item,
            prev: self.tail,
            next: None,
        };
        if let Some(tail_id) = self.tail {
            if let Some(tail) = self.nodes.get_mut(&tail_id) {
                tail.next = Some(id);
            }
        } else {
            self.head = Some(id);
        }
        self.tail = Some(id);
        self.nodes.insert(id, node);
    }

    /// Unlink the entry for `id`. Returns whether it was present.
    pub fn evict(&mut self, id: u64) -> bool {
        let Some(node) = self.nodes.remove(&id) else {
            return false;
        };

        match node.prev {
            Some(prev_id) => {
                if let Some(prev) = self.nodes.get_mut(&prev_id) {
                    prev.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        match node.next {
            Some(next_id) => {
                if let Some(next) = self.nodes.get_mut(&next_id) {
                    next.prev = node.prev;
                }
            }
            None => self.tail = node.prev,
        }
        true
    }

    /// Snapshot of the history, oldest view first.
    pub fn snapshot(&self) -> Vec<WorkItem> {
        let mut items = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let node = &self.nodes[&id];
            items.push(node.item.clone());
            cursor = node.next;
        }
        items
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
