use super::node::Node;
use crate::constants::{NEIGHBOUR_BACKOFF, NEIGHBOUR_FLOOR, NEIGHBOUR_GROWTH};

/// Bounded batch of freshly discovered nodes.
///
/// Unlike a Kademlia table this one holds no buckets and keeps nothing
/// between rounds: the crawler drains it every tick, queries each node once,
/// and starts again. Only the capacity survives, adjusted by
/// [`grow`](Self::grow) and [`back_off`](Self::back_off).
#[derive(Debug)]
pub struct RoutingTable {
    nodes: Vec<Node>,
    max_size: usize,
}

impl RoutingTable {
    pub fn new(max_size: usize) -> Self {
        Self {
            nodes: Vec::new(),
            max_size: max_size.max(1),
        }
    }

    /// Full once the table holds more than `max_size` nodes.
    pub fn is_full(&self) -> bool {
        self.nodes.len() > self.max_size
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Adds a node unless the table is full. Returns whether it was admitted.
    pub fn add(&mut self, node: Node) -> bool {
        if self.is_full() {
            return false;
        }
        self.nodes.push(node);
        true
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Takes every node out of the table, leaving it empty.
    pub fn drain(&mut self) -> Vec<Node> {
        std::mem::take(&mut self.nodes)
    }

    /// Raises the capacity by 1%, rounding down.
    pub fn grow(&mut self) {
        let (num, den) = NEIGHBOUR_GROWTH;
        self.max_size = self.max_size.saturating_mul(num) / den;
    }

    /// Shrinks the capacity by 10% after local congestion.
    ///
    /// Returns `false` without shrinking once the capacity is below the
    /// floor; the caller reports that instead.
    pub fn back_off(&mut self) -> bool {
        if self.max_size < NEIGHBOUR_FLOOR {
            return false;
        }
        let (num, den) = NEIGHBOUR_BACKOFF;
        self.max_size = (self.max_size * num / den).max(1);
        true
    }
}
