//! Doubly-linked segment list backed by an arena.
//!
//! Nodes are addressed by [`SegmentId`]. An id stays valid until its node is
//! removed. Freed slots are recycled by later inserts, so an id must not be
//! kept across an operation that removes its node.

use super::segment::DataSegment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentId(u32);

#[derive(Debug, Clone)]
struct SegmentNode {
    segment: DataSegment,
    prev: Option<SegmentId>,
    next: Option<SegmentId>,
}

#[derive(Debug, Clone, Default)]
pub struct SegmentList {
    nodes: Vec<Option<SegmentNode>>,
    free: Vec<u32>,
    head: Option<SegmentId>,
    tail: Option<SegmentId>,
    len: usize,
}

impl SegmentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn first(&self) -> Option<SegmentId> {
        self.head
    }

    pub fn last(&self) -> Option<SegmentId> {
        self.tail
    }

    pub fn next(&self, id: SegmentId) -> Option<SegmentId> {
        self.node(id).next
    }

    pub fn prev(&self, id: SegmentId) -> Option<SegmentId> {
        self.node(id).prev
    }

    pub fn get(&self, id: SegmentId) -> DataSegment {
        self.node(id).segment
    }

    pub fn set(&mut self, id: SegmentId, segment: DataSegment) {
        self.node_mut(id).segment = segment;
    }

    pub fn contains(&self, id: SegmentId) -> bool {
        matches!(self.nodes.get(id.0 as usize), Some(Some(_)))
    }

    pub fn push_back(&mut self, segment: DataSegment) -> SegmentId {
        match self.tail {
            Some(tail) => self.insert_after(tail, segment),
            None => {
                let id = self.alloc(SegmentNode {
                    segment,
                    prev: None,
                    next: None,
                });
                self.head = Some(id);
                self.tail = Some(id);
                id
            }
        }
    }

    pub fn insert_after(&mut self, anchor: SegmentId, segment: DataSegment) -> SegmentId {
        let next = self.node(anchor).next;
        let id = self.alloc(SegmentNode {
            segment,
            prev: Some(anchor),
            next,
        });
        self.node_mut(anchor).next = Some(id);
        match next {
            Some(next) => self.node_mut(next).prev = Some(id),
            None => self.tail = Some(id),
        }
        id
    }

    pub fn insert_before(&mut self, anchor: SegmentId, segment: DataSegment) -> SegmentId {
        let prev = self.node(anchor).prev;
        let id = self.alloc(SegmentNode {
            segment,
            prev,
            next: Some(anchor),
        });
        self.node_mut(anchor).prev = Some(id);
        match prev {
            Some(prev) => self.node_mut(prev).next = Some(id),
            None => self.head = Some(id),
        }
        id
    }

    pub fn remove(&mut self, id: SegmentId) -> DataSegment {
        let node = match self.nodes[id.0 as usize].take() {
            Some(node) => node,
            None => panic!("segment {} was already removed", id.0),
        };
        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }
        self.free.push(id.0);
        self.len -= 1;
        node.segment
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    pub fn to_vec(&self) -> Vec<DataSegment> {
        self.iter().map(|(_, segment)| segment).collect()
    }

    fn alloc(&mut self, node: SegmentNode) -> SegmentId {
        self.len += 1;
        match self.free.pop() {
            Some(index) => {
                self.nodes[index as usize] = Some(node);
                SegmentId(index)
            }
            None => {
                self.nodes.push(Some(node));
                SegmentId((self.nodes.len() - 1) as u32)
            }
        }
    }

    fn node(&self, id: SegmentId) -> &SegmentNode {
        match self.nodes.get(id.0 as usize) {
            Some(Some(node)) => node,
            _ => panic!("stale segment id {}", id.0),
        }
    }

    fn node_mut(&mut self, id: SegmentId) -> &mut SegmentNode {
        match self.nodes.get_mut(id.0 as usize) {
            Some(Some(node)) => node,
            _ => panic!("stale segment id {}", id.0),
        }
    }
}

pub struct Iter<'a> {
    list: &'a SegmentList,
    cursor: Option<SegmentId>,
}

impl Iterator for Iter<'_> {
    type Item = (SegmentId, DataSegment);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = self.list.node(id);
        self.cursor = node.next;
        Some((id, node.segment))
    }
}
