use crate::language::{
    ast::{Expr, File, NodeId, Stmt},
    visit::{walk_files, Node, Visitor},
};
use std::collections::BTreeMap;
use tracing::debug;

/// Left and right sides of every assignment, indexed both ways. With a
/// single multi-value right side, every target maps to it.
#[derive(Clone, Debug, Default)]
pub struct KvPairs {
    pub lhs_to_rhs: BTreeMap<NodeId, NodeId>,
    pub rhs_to_lhs: BTreeMap<NodeId, Vec<NodeId>>,
}

impl KvPairs {
    pub fn rhs_of(&self, lhs: NodeId) -> Option<NodeId> {
        self.lhs_to_rhs.get(&lhs).copied()
    }

    pub fn lhs_of(&self, rhs: NodeId) -> &[NodeId] {
        self.rhs_to_lhs.get(&rhs).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.lhs_to_rhs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lhs_to_rhs.is_empty()
    }

    fn pair(&mut self, lhs: &Expr, rhs: &Expr) {
        self.lhs_to_rhs.insert(lhs.id(), rhs.id());
        self.rhs_to_lhs.entry(rhs.id()).or_default().push(lhs.id());
    }
}

pub fn index_assignments(files: &[File]) -> KvPairs {
    let mut collector = Collector::default();
    walk_files(&mut collector, files);
    debug!(pairs = collector.pairs.len(), "assignments indexed");
    collector.pairs
}

#[derive(Default)]
struct Collector {
    pairs: KvPairs,
}

impl<'a> Visitor<'a> for Collector {
    fn enter(&mut self, node: Node<'a>) -> bool {
        if let Node::Stmt(Stmt::Assign(assign)) = node {
            if assign.lhs.len() == assign.rhs.len() {
                for (lhs, rhs) in assign.lhs.iter().zip(&assign.rhs) {
                    self.pairs.pair(lhs, rhs);
                }
            } else if let [rhs] = assign.rhs.as_slice() {
                for lhs in &assign.lhs {
                    self.pairs.pair(lhs, rhs);
                }
            } else {
                debug!(stmt = assign.id.0, "assignment with mismatched sides skipped");
            }
        }
        true
    }
}
