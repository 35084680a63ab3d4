//! CFG node and edge types, modeled after `ControlFlowGraph`/`BasicBlock`/
//! `Terminator`/`Edge` in the teacher's data-flow module, but shaped
//! around per-PE nodes rather than per-basic-block statement lists
//! (spec §3's CFG has one node per statement/predicate, not per block).

use crate::pe::{PeId, PeRef};
use std::collections::BTreeSet;

/// A stable index into a single method's CFG node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(pub usize);

/// The CFG node kinds named in the data model.
#[derive(Debug, Clone)]
pub enum CfgNodeKind {
    Control,
    Statement,
    Expression,
    Break,
    Continue,
    SwitchCase,
    Pseudo,
}

#[derive(Debug, Clone)]
pub struct CfgNode {
    pub index: NodeIndex,
    pub kind: CfgNodeKind,
    /// `None` only for `Pseudo` nodes.
    pub pe: Option<PeRef>,
    pub forward: BTreeSet<EdgeRef>,
    pub backward: BTreeSet<EdgeRef>,
}

impl CfgNode {
    pub fn pe_id(&self) -> Option<PeId> {
        self.pe.as_ref().map(|p| p.borrow().id)
    }
}

/// Edge label discriminant, used both for equality/ordering (invariant:
/// edges order by `(from, to, kind_tag)`) and for emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Normal,
    Control(bool),
    Jump,
}

// Manual Ord/PartialOrd below because `Control(bool)` must sort by the
// `Control` tag first and the payload second, matching the "kindTag"
// ordering rule in spec §3 rather than derived field-order semantics.
impl EdgeKind {
    fn tag(&self) -> u8 {
        match self {
            EdgeKind::Normal => 0,
            EdgeKind::Control(_) => 1,
            EdgeKind::Jump => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRef {
    pub from: NodeIndex,
    pub to: NodeIndex,
    pub kind: EdgeKind,
}

impl PartialOrd for EdgeRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.from, self.to, self.kind.tag())
            .cmp(&(other.from, other.to, other.kind.tag()))
            .then_with(|| match (self.kind, other.kind) {
                (EdgeKind::Control(a), EdgeKind::Control(b)) => a.cmp(&b),
                _ => std::cmp::Ordering::Equal,
            })
    }
}

impl EdgeKind {
    pub fn label(&self) -> &'static str {
        match self {
            EdgeKind::Normal => "",
            EdgeKind::Control(true) => "true",
            EdgeKind::Control(false) => "false",
            EdgeKind::Jump => "jump",
        }
    }
}

/// A single method's control-flow graph.
#[derive(Debug, Default)]
pub struct Cfg {
    pub nodes: Vec<CfgNode>,
    pub enter: Option<NodeIndex>,
    pub exits: BTreeSet<NodeIndex>,
}

impl Cfg {
    pub fn node(&self, idx: NodeIndex) -> &CfgNode {
        &self.nodes[idx.0]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut CfgNode {
        &mut self.nodes[idx.0]
    }

    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, kind: EdgeKind) {
        let edge = EdgeRef { from, to, kind };
        self.node_mut(from).forward.insert(edge);
        self.node_mut(to).backward.insert(edge);
    }

    pub fn forward_targets(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.node(idx).forward.iter().map(|e| e.to)
    }

    /// Reachability closure under forward edges, per C7's reachability
    /// service.
    pub fn reachable_from(&self, from: NodeIndex) -> BTreeSet<NodeIndex> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![from];
        while let Some(n) = stack.pop() {
            if seen.insert(n) {
                for t in self.forward_targets(n) {
                    if !seen.contains(&t) {
                        stack.push(t);
                    }
                }
            }
        }
        seen
    }

    pub fn all_edges(&self) -> Vec<EdgeRef> {
        let mut out: Vec<EdgeRef> = self.nodes.iter().flat_map(|n| n.forward.iter().copied()).collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_ordering_sorts_by_from_then_to_then_kind() {
        let a = EdgeRef { from: NodeIndex(0), to: NodeIndex(1), kind: EdgeKind::Control(false) };
        let b = EdgeRef { from: NodeIndex(0), to: NodeIndex(1), kind: EdgeKind::Control(true) };
        let c = EdgeRef { from: NodeIndex(0), to: NodeIndex(2), kind: EdgeKind::Normal };
        let mut v = vec![c, b, a];
        v.sort();
        assert_eq!(v, vec![a, b, c]);
    }

    #[test]
    fn reachable_from_follows_forward_edges_only() {
        let mut cfg = Cfg::default();
        for i in 0..3 {
            cfg.nodes.push(CfgNode {
                index: NodeIndex(i),
                kind: CfgNodeKind::Pseudo,
                pe: None,
                forward: BTreeSet::new(),
                backward: BTreeSet::new(),
            });
        }
        cfg.add_edge(NodeIndex(0), NodeIndex(1), EdgeKind::Normal);
        cfg.add_edge(NodeIndex(1), NodeIndex(2), EdgeKind::Normal);
        let reach = cfg.reachable_from(NodeIndex(0));
        assert_eq!(reach.len(), 3);
        assert!(cfg.reachable_from(NodeIndex(2)).len() == 1);
    }
}
