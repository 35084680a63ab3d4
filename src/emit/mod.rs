//! Graph text emitter (part of C12): serializes a built CFG or PDG as
//! either a sorted edge list or a Graphviz `dot` graph, per spec §6's
//! node-shape/fill and edge-label rules. This is the out-of-scope
//! "graph emission" consumer the spec describes, implemented here as
//! part of the ambient CLI driver.

use crate::cfg::{Cfg, CfgNodeKind, NodeIndex as CfgNodeIndex};
use crate::pdg::{Pdg, PdgNodeIndex, PdgNodeKind};

/// Minimal view over a graph's nodes/edges that the emitter needs,
/// implemented for `Cfg` directly and for `PdgView` (a PDG paired with
/// the CFG it overlays, since `FromCfg` node labels live on the CFG
/// side) so `emit_edges`/`emit_dot` aren't duplicated per graph type.
pub trait EmittableGraph {
    fn node_count(&self) -> usize;
    fn node_label(&self, idx: usize) -> String;
    fn is_control_shaped(&self, idx: usize) -> bool;
    fn is_enter(&self, idx: usize) -> bool;
    fn is_exit(&self, idx: usize) -> bool;
    fn edges(&self) -> Vec<(usize, usize, String)>;
}

impl EmittableGraph for Cfg {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node_label(&self, idx: usize) -> String {
        match &self.node(CfgNodeIndex(idx)).pe {
            Some(pe) => pe.borrow().text.clone(),
            None => "pseudo".to_string(),
        }
    }

    fn is_control_shaped(&self, idx: usize) -> bool {
        matches!(self.node(CfgNodeIndex(idx)).kind, CfgNodeKind::Control)
    }

    fn is_enter(&self, idx: usize) -> bool {
        self.enter == Some(CfgNodeIndex(idx))
    }

    fn is_exit(&self, idx: usize) -> bool {
        self.exits.contains(&CfgNodeIndex(idx))
    }

    fn edges(&self) -> Vec<(usize, usize, String)> {
        self.all_edges()
            .into_iter()
            .map(|e| (e.from.0, e.to.0, e.kind.label().to_string()))
            .collect()
    }
}

/// A PDG together with the CFG it overlays, needed because `FromCfg`
/// node labels (and control-node shape) live on the CFG side, not in
/// the PDG overlay itself.
pub struct PdgView<'a> {
    pub pdg: &'a Pdg,
    pub cfg: &'a Cfg,
}

impl<'a> EmittableGraph for PdgView<'a> {
    fn node_count(&self) -> usize {
        self.pdg.nodes.len()
    }

    fn node_label(&self, idx: usize) -> String {
        match &self.pdg.node(PdgNodeIndex(idx)).kind {
            PdgNodeKind::MethodEnter => "Enter".to_string(),
            PdgNodeKind::Parameter(pe) => pe.borrow().text.clone(),
            PdgNodeKind::FromCfg(cfg_idx) => match &self.cfg.node(*cfg_idx).pe {
                Some(pe) => pe.borrow().text.clone(),
                None => "pseudo".to_string(),
            },
        }
    }

    fn is_control_shaped(&self, idx: usize) -> bool {
        match &self.pdg.node(PdgNodeIndex(idx)).kind {
            PdgNodeKind::FromCfg(cfg_idx) => {
                matches!(self.cfg.node(*cfg_idx).kind, CfgNodeKind::Control)
            }
            _ => false,
        }
    }

    fn is_enter(&self, idx: usize) -> bool {
        self.pdg.enter == Some(PdgNodeIndex(idx))
    }

    fn is_exit(&self, idx: usize) -> bool {
        self.pdg.exits.contains(&PdgNodeIndex(idx))
    }

    fn edges(&self) -> Vec<(usize, usize, String)> {
        self.pdg
            .all_edges()
            .into_iter()
            .map(|e| (e.from.0, e.to.0, e.label()))
            .collect()
    }
}

/// Renders a graph's edges as `from -> to [label]` lines, in the edge
/// order the graph itself already exposes (sorted by `(from, to, kind)`).
pub fn emit_edges(graph: &impl EmittableGraph) -> String {
    let mut out = String::new();
    for (from, to, label) in graph.edges() {
        if label.is_empty() {
            out.push_str(&format!("{from} -> {to}\n"));
        } else {
            out.push_str(&format!("{from} -> {to} [{label}]\n"));
        }
    }
    out
}

/// Renders a graph as a Graphviz `digraph`: diamond/ellipse shape and
/// aquamarine/deeppink/white fill per spec §6, quote-escaped labels, and
/// edge labels from the dependence-string rule.
pub fn emit_dot(graph: &impl EmittableGraph, name: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("digraph {name} {{\n"));
    for idx in 0..graph.node_count() {
        let label = escape(&graph.node_label(idx));
        let shape = if graph.is_control_shaped(idx) { "diamond" } else { "ellipse" };
        let fill = if graph.is_enter(idx) {
            "aquamarine"
        } else if graph.is_exit(idx) {
            "deeppink"
        } else {
            "white"
        };
        out.push_str(&format!(
            "  n{idx} [label=\"{label}\", shape={shape}, style=filled, fillcolor={fill}];\n"
        ));
    }
    for (from, to, label) in graph.edges() {
        if label.is_empty() {
            out.push_str(&format!("  n{from} -> n{to};\n"));
        } else {
            out.push_str(&format!("  n{from} -> n{to} [label=\"{}\"];\n", escape(&label)));
        }
    }
    out.push_str("}\n");
    out
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{CfgNode, EdgeKind};
    use std::collections::BTreeSet;

    fn two_node_cfg() -> Cfg {
        let mut cfg = Cfg::default();
        cfg.nodes.push(CfgNode {
            index: CfgNodeIndex(0),
            kind: CfgNodeKind::Pseudo,
            pe: None,
            forward: BTreeSet::new(),
            backward: BTreeSet::new(),
        });
        cfg.nodes.push(CfgNode {
            index: CfgNodeIndex(1),
            kind: CfgNodeKind::Statement,
            pe: None,
            forward: BTreeSet::new(),
            backward: BTreeSet::new(),
        });
        cfg.enter = Some(CfgNodeIndex(0));
        cfg.exits.insert(CfgNodeIndex(1));
        cfg.add_edge(CfgNodeIndex(0), CfgNodeIndex(1), EdgeKind::Normal);
        cfg
    }

    #[test]
    fn emit_edges_lists_sorted_edges() {
        let cfg = two_node_cfg();
        let rendered = emit_edges(&cfg);
        assert_eq!(rendered, "0 -> 1\n");
    }

    #[test]
    fn emit_dot_marks_enter_and_exit_fill() {
        let cfg = two_node_cfg();
        let rendered = emit_dot(&cfg, "g");
        assert!(rendered.contains("fillcolor=aquamarine"));
        assert!(rendered.contains("fillcolor=deeppink"));
        assert!(rendered.starts_with("digraph g {"));
    }

    #[test]
    fn emit_dot_escapes_embedded_quotes() {
        assert_eq!(escape("a \"b\" c"), "a \\\"b\\\" c");
    }
}
