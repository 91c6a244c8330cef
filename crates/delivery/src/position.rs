//! Sibling position counting for positional predicates such as `item[2]`.
use crate::context::ExecutionContext;
use crate::error::VisitResult;
use crate::visitor::{Capabilities, VisitPhase, Visitor};
use std::collections::HashMap;
use weft_selector::CounterId;
use weft_types::{NodeId, QName};

/// Positions recorded during a run, scoped to each parent.
#[derive(Debug, Default)]
pub struct PositionTable {
    counts: HashMap<Option<NodeId>, HashMap<CounterId, usize>>,
    positions: HashMap<NodeId, Vec<(CounterId, usize)>>,
}

impl PositionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts `node` as the next sibling under `parent` and returns its
    /// 1-based position.
    pub fn next(&mut self, counter: CounterId, parent: Option<NodeId>, node: NodeId) -> usize {
        let count = self.counts.entry(parent).or_default().entry(counter).or_insert(0);
        *count += 1;
        let position = *count;
        self.positions.entry(node).or_default().push((counter, position));
        position
    }

    pub fn position(&self, counter: CounterId, node: NodeId) -> Option<usize> {
        self.positions
            .get(&node)?
            .iter()
            .find(|(c, _)| *c == counter)
            .map(|(_, p)| *p)
    }

    /// Drops the node's own positions and the sibling counts of its children.
    pub fn forget(&mut self, node: NodeId) {
        self.positions.remove(&node);
        self.counts.remove(&Some(node));
    }

    pub fn clear(&mut self) {
        self.counts.clear();
        self.positions.clear();
    }
}

/// Injected ahead of all other before-visitors for elements named by a
/// positional predicate.
#[derive(Debug)]
pub struct PositionCounter {
    counter: CounterId,
    element: QName,
}

impl PositionCounter {
    pub fn new(counter: CounterId, element: QName) -> Self {
        Self { counter, element }
    }

    pub fn counter(&self) -> CounterId {
        self.counter
    }

    pub fn element(&self) -> &QName {
        &self.element
    }
}

impl Visitor for PositionCounter {
    fn name(&self) -> &str {
        "PositionCounter"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::BEFORE
    }

    fn visit_before(&self, element: NodeId, ctx: &mut ExecutionContext) -> VisitResult {
        let parent = ctx.document().parent(element);
        ctx.positions_mut().next(self.counter, parent, element);
        Ok(())
    }

    fn phase(&self) -> VisitPhase {
        VisitPhase::Any
    }
}
