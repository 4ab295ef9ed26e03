//! Slot arena holding cache entries
//!
//! Entries live in a `Vec` of slots and refer to each other through
//! [`SlotId`] handles instead of pointers. Two intrusive chains thread
//! through the same arena: the recency chain (unpinned entries, MRU at
//! the head) and the pinned chain (oldest pin at the head).

/// Stable handle to an occupied slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SlotId(usize);

impl SlotId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Which chain a node is linked into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Region {
    Recency,
    Pinned,
}

/// Entry record
#[derive(Debug, Clone)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) region: Region,
    pub(crate) prev: Option<SlotId>,
    pub(crate) next: Option<SlotId>,
}

/// Head/tail bookkeeping for one chain
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Chain {
    pub(crate) head: Option<SlotId>,
    pub(crate) tail: Option<SlotId>,
    pub(crate) len: usize,
}

/// Arena of nodes plus the two chains linked through it
#[derive(Debug, Clone)]
pub(crate) struct NodeArena<K, V> {
    slots: Vec<Option<Node<K, V>>>,
    free_list: Vec<usize>,
    recency: Chain,
    pinned: Chain,
}

impl<K, V> NodeArena<K, V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            recency: Chain::default(),
            pinned: Chain::default(),
        }
    }

    pub(crate) fn chain(&self, region: Region) -> &Chain {
        match region {
            Region::Recency => &self.recency,
            Region::Pinned => &self.pinned,
        }
    }

    fn chain_mut(&mut self, region: Region) -> &mut Chain {
        match region {
            Region::Recency => &mut self.recency,
            Region::Pinned => &mut self.pinned,
        }
    }

    /// Number of occupied slots
    pub(crate) fn len(&self) -> usize {
        self.recency.len + self.pinned.len
    }

    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn get(&self, id: SlotId) -> Option<&Node<K, V>> {
        self.slots.get(id.0).and_then(|slot| slot.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: SlotId) -> Option<&mut Node<K, V>> {
        self.slots.get_mut(id.0).and_then(|slot| slot.as_mut())
    }

    /// Allocate a node and link it at the head of `region`
    pub(crate) fn push_front(&mut self, region: Region, key: K, value: V) -> SlotId {
        let id = self.alloc(Node {
            key,
            value,
            region,
            prev: None,
            next: None,
        });
        self.link_front(region, id);
        id
    }

    /// Unlink and free a node, returning it
    pub(crate) fn remove(&mut self, id: SlotId) -> Option<Node<K, V>> {
        self.get(id)?;
        self.unlink(id);
        let node = self.slots[id.0].take()?;
        self.free_list.push(id.0);
        Some(node)
    }

    /// Move an existing node to the head of `region`
    pub(crate) fn move_to_front(&mut self, id: SlotId, region: Region) {
        match self.get(id) {
            Some(node) if node.region == region && self.chain(region).head == Some(id) => return,
            Some(_) => {}
            None => return,
        }
        self.unlink(id);
        self.link_front(region, id);
    }

    /// Move an existing node to the tail of `region`
    pub(crate) fn move_to_back(&mut self, id: SlotId, region: Region) {
        if self.get(id).is_none() {
            return;
        }
        self.unlink(id);
        self.link_back(region, id);
    }

    /// Iterate `region` from head to tail
    pub(crate) fn iter(&self, region: Region) -> ChainIter<'_, K, V> {
        let chain = self.chain(region);
        ChainIter {
            arena: self,
            front: chain.head,
            back: chain.tail,
            remaining: chain.len,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free_list.clear();
        self.recency = Chain::default();
        self.pinned = Chain::default();
    }

    fn alloc(&mut self, node: Node<K, V>) -> SlotId {
        if let Some(idx) = self.free_list.pop() {
            self.slots[idx] = Some(node);
            SlotId(idx)
        } else {
            self.slots.push(Some(node));
            SlotId(self.slots.len() - 1)
        }
    }

    fn link_front(&mut self, region: Region, id: SlotId) {
        let old_head = self.chain(region).head;

        if let Some(node) = self.get_mut(id) {
            node.region = region;
            node.prev = None;
            node.next = old_head;
        }

        match old_head {
            Some(head_id) => {
                if let Some(head) = self.get_mut(head_id) {
                    head.prev = Some(id);
                }
            }
            None => self.chain_mut(region).tail = Some(id),
        }

        let chain = self.chain_mut(region);
        chain.head = Some(id);
        chain.len += 1;
    }

    fn link_back(&mut self, region: Region, id: SlotId) {
        let old_tail = self.chain(region).tail;

        if let Some(node) = self.get_mut(id) {
            node.region = region;
            node.prev = old_tail;
            node.next = None;
        }

        match old_tail {
            Some(tail_id) => {
                if let Some(tail) = self.get_mut(tail_id) {
                    tail.next = Some(id);
                }
            }
            None => self.chain_mut(region).head = Some(id),
        }

        let chain = self.chain_mut(region);
        chain.tail = Some(id);
        chain.len += 1;
    }

    fn unlink(&mut self, id: SlotId) {
        let (region, prev, next) = match self.get(id) {
            Some(node) => (node.region, node.prev, node.next),
            None => return,
        };

        match prev {
            Some(prev_id) => {
                if let Some(prev_node) = self.get_mut(prev_id) {
                    prev_node.next = next;
                }
            }
            None => self.chain_mut(region).head = next,
        }

        match next {
            Some(next_id) => {
                if let Some(next_node) = self.get_mut(next_id) {
                    next_node.prev = prev;
                }
            }
            None => self.chain_mut(region).tail = prev,
        }

        if let Some(node) = self.get_mut(id) {
            node.prev = None;
            node.next = None;
        }
        self.chain_mut(region).len -= 1;
    }
}

/// Double-ended walk over one chain
pub(crate) struct ChainIter<'a, K, V> {
    arena: &'a NodeArena<K, V>,
    front: Option<SlotId>,
    back: Option<SlotId>,
    remaining: usize,
}

impl<'a, K, V> Iterator for ChainIter<'a, K, V> {
    type Item = (SlotId, &'a Node<K, V>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.front?;
        let node = self.arena.get(id)?;
        self.front = node.next;
        self.remaining -= 1;
        Some((id, node))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for ChainIter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.back?;
        let node = self.arena.get(id)?;
        self.back = node.prev;
        self.remaining -= 1;
        Some((id, node))
    }
}

impl<K, V> ExactSizeIterator for ChainIter<'_, K, V> {}
