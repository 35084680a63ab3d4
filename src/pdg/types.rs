//! PDG node and edge types: an overlay of CFG nodes plus a synthetic
//! method-enter node and one parameter node per formal (spec §3).

use crate::cfg::NodeIndex as CfgNodeIndex;
use crate::pe::PeRef;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PdgNodeIndex(pub usize);

#[derive(Debug, Clone)]
pub enum PdgNodeKind {
    /// Mirrors a CFG node 1:1.
    FromCfg(CfgNodeIndex),
    MethodEnter,
    Parameter(PeRef),
}

#[derive(Debug, Clone)]
pub struct PdgNode {
    pub index: PdgNodeIndex,
    pub kind: PdgNodeKind,
    pub forward: BTreeSet<PdgEdge>,
    pub backward: BTreeSet<PdgEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependenceKind {
    Control(bool),
    /// Data edges are labeled with a variable name; since that can't live
    /// in a `Copy` enum alongside ordering, the name is stored alongside
    /// the edge in `PdgEdge` rather than in this tag.
    Data,
    Execution,
}

impl DependenceKind {
    fn tag(&self) -> u8 {
        match self {
            DependenceKind::Control(_) => 0,
            DependenceKind::Data => 1,
            DependenceKind::Execution => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdgEdge {
    pub from: PdgNodeIndex,
    pub to: PdgNodeIndex,
    pub kind: DependenceKind,
    /// Populated only for `DependenceKind::Data`.
    pub variable: Option<String>,
}

impl PdgEdge {
    pub fn label(&self) -> String {
        match self.kind {
            DependenceKind::Control(true) => "true".to_string(),
            DependenceKind::Control(false) => "false".to_string(),
            DependenceKind::Data => self.variable.clone().unwrap_or_default(),
            DependenceKind::Execution => String::new(),
        }
    }
}

impl PartialOrd for PdgEdge {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PdgEdge {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.from, self.to, self.kind.tag(), self.variable.as_deref().unwrap_or(""))
            .cmp(&(other.from, other.to, other.kind.tag(), other.variable.as_deref().unwrap_or("")))
            .then_with(|| match (self.kind, other.kind) {
                (DependenceKind::Control(a), DependenceKind::Control(b)) => a.cmp(&b),
                _ => std::cmp::Ordering::Equal,
            })
    }
}

#[derive(Debug, Default)]
pub struct Pdg {
    pub nodes: Vec<PdgNode>,
    pub enter: Option<PdgNodeIndex>,
    pub exits: BTreeSet<PdgNodeIndex>,
    pub parameters: Vec<PdgNodeIndex>,
}

impl Pdg {
    pub fn node(&self, idx: PdgNodeIndex) -> &PdgNode {
        &self.nodes[idx.0]
    }

    pub fn node_mut(&mut self, idx: PdgNodeIndex) -> &mut PdgNode {
        &mut self.nodes[idx.0]
    }

    pub fn add_edge(&mut self, from: PdgNodeIndex, to: PdgNodeIndex, kind: DependenceKind, variable: Option<String>) {
        let edge = PdgEdge { from, to, kind, variable };
        self.node_mut(from).forward.insert(edge.clone());
        self.node_mut(to).backward.insert(edge);
    }

    pub fn all_edges(&self) -> Vec<PdgEdge> {
        let mut out: Vec<PdgEdge> = self.nodes.iter().flat_map(|n| n.forward.iter().cloned()).collect();
        out.sort();
        out
    }
}
