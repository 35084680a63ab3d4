//! PDG construction (component C6): layers control, data, and execution
//! edges over an already-built CFG, per spec §4.5's exact construction
//! sequence and the `buildDataDependence` DFS-with-kill walk.

use super::types::{DependenceKind, Pdg, PdgNode, PdgNodeIndex, PdgNodeKind};
use crate::cfg::{Cfg, CfgNodeKind, NodeIndex as CfgNodeIndex};
use crate::config::PdgConfig;
use crate::defuse::{scope_for_method, DefUseAnalyzer};
use crate::pe::scope::Scope;
use crate::pe::{MethodData, PeId, PeKind, PeRef, StmtKind};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub struct PdgBuilder<'a> {
    cfg: &'a Cfg,
    config: PdgConfig,
    analyzer: &'a DefUseAnalyzer,
    control_by_pe: HashMap<PeId, CfgNodeIndex>,
    normal_by_pe: HashMap<PeId, CfgNodeIndex>,
}

impl<'a> PdgBuilder<'a> {
    pub fn new(cfg: &'a Cfg, config: PdgConfig, analyzer: &'a DefUseAnalyzer) -> Self {
        let mut control_by_pe = HashMap::new();
        let mut normal_by_pe = HashMap::new();
        for node in &cfg.nodes {
            if let Some(id) = node.pe_id() {
                match &node.kind {
                    CfgNodeKind::Control => {
                        control_by_pe.insert(id, node.index);
                    }
                    _ => {
                        normal_by_pe.insert(id, node.index);
                    }
                }
            }
        }
        Self {
            cfg,
            config,
            analyzer,
            control_by_pe,
            normal_by_pe,
        }
    }

    pub fn build(self, method: &MethodData) -> Pdg {
        let scope = scope_for_method(method);
        let mut pdg = Pdg::default();
        let cfg_to_pdg = self.seed_overlay_nodes(method, &mut pdg);

        let enter = pdg.enter.expect("seed_overlay_nodes sets enter");
        let param_indices = pdg.parameters.clone();

        if self.config.build_control_dependence {
            if self.config.build_control_dependence_from_enter_to_all_nodes {
                if let Some(cfg_enter) = self.cfg.enter {
                    for cfg_idx in self.cfg.reachable_from(cfg_enter) {
                        let image = cfg_to_pdg[cfg_idx.0];
                        pdg.add_edge(enter, image, DependenceKind::Control(true), None);
                    }
                }
            }
            if self.config.build_control_dependence_from_enter_to_parameter_nodes {
                for &p in &param_indices {
                    pdg.add_edge(enter, p, DependenceKind::Control(true), None);
                }
            }
        }

        if self.config.build_execution_dependence {
            if let Some(cfg_enter) = self.cfg.enter {
                let image = cfg_to_pdg[cfg_enter.0];
                pdg.add_edge(enter, image, DependenceKind::Execution, None);
            }
        }

        if self.config.build_data_dependence {
            for (param_pe, &param_idx) in method.params.iter().zip(param_indices.iter()) {
                let name = param_pe.borrow().text.clone();
                pdg.add_edge(enter, param_idx, DependenceKind::Data, Some(name.clone()));
                if let Some(cfg_enter) = self.cfg.enter {
                    let mut visited = HashSet::new();
                    self.walk_data_dependence(cfg_enter, param_idx, &name, &scope, &cfg_to_pdg, &mut visited, &mut pdg);
                }
            }
        }

        // Per-node edge addition; spec step 5/7: every CFG node, reachable
        // or not, gets the same treatment.
        for cfg_node in &self.cfg.nodes {
            let source_image = cfg_to_pdg[cfg_node.index.0];

            if self.config.build_execution_dependence {
                for target in self.cfg.forward_targets(cfg_node.index) {
                    let target_image = cfg_to_pdg[target.0];
                    pdg.add_edge(source_image, target_image, DependenceKind::Execution, None);
                }
            }

            if self.config.build_data_dependence {
                if let Some(pe) = &cfg_node.pe {
                    for var in self.assigned_variables(pe, &scope) {
                        for target in self.cfg.forward_targets(cfg_node.index) {
                            let mut visited = HashSet::new();
                            self.walk_data_dependence(target, source_image, &var, &scope, &cfg_to_pdg, &mut visited, &mut pdg);
                        }
                    }
                }
            }

            if self.config.build_control_dependence {
                if matches!(&cfg_node.kind, CfgNodeKind::Control) {
                    if let Some(pe) = &cfg_node.pe {
                        if let Some(owner) = upgrade_owner(pe) {
                            self.add_control_edges_for_owner(source_image, &owner, &cfg_to_pdg, &mut pdg);
                        }
                    }
                }
            }
        }

        for exit in &self.cfg.exits {
            pdg.exits.insert(cfg_to_pdg[exit.0]);
        }

        pdg
    }

    fn seed_overlay_nodes(&self, method: &MethodData, pdg: &mut Pdg) -> Vec<PdgNodeIndex> {
        let enter_idx = PdgNodeIndex(pdg.nodes.len());
        pdg.nodes.push(PdgNode {
            index: enter_idx,
            kind: PdgNodeKind::MethodEnter,
            forward: Default::default(),
            backward: Default::default(),
        });
        pdg.enter = Some(enter_idx);

        for param in &method.params {
            let idx = PdgNodeIndex(pdg.nodes.len());
            pdg.nodes.push(PdgNode {
                index: idx,
                kind: PdgNodeKind::Parameter(param.clone()),
                forward: Default::default(),
                backward: Default::default(),
            });
            pdg.parameters.push(idx);
        }

        let mut cfg_to_pdg = vec![PdgNodeIndex(0); self.cfg.nodes.len()];
        for node in &self.cfg.nodes {
            let idx = PdgNodeIndex(pdg.nodes.len());
            pdg.nodes.push(PdgNode {
                index: idx,
                kind: PdgNodeKind::FromCfg(node.index),
                forward: Default::default(),
                backward: Default::default(),
            });
            cfg_to_pdg[node.index.0] = idx;
        }
        cfg_to_pdg
    }

    fn assigned_variables(&self, pe: &PeRef, scope: &Rc<RefCell<Scope>>) -> Vec<String> {
        let sets = self.analyzer.analyze(pe, Some(scope));
        sets.defs_at_least_may_def()
            .map(|d| d.main_name.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect()
    }

    fn referenced_variables(&self, pe: &PeRef, scope: &Rc<RefCell<Scope>>) -> HashSet<String> {
        let sets = self.analyzer.analyze(pe, Some(scope));
        sets.uses_at_least_may_use().map(|u| u.main_name.clone()).collect()
    }

    /// The DFS-with-kill walk of spec §4.5: adds a data edge whenever the
    /// visited node references `var`, and stops propagating past a node
    /// that redefines it (when the config switch requests that).
    fn walk_data_dependence(
        &self,
        node: CfgNodeIndex,
        from_pdg: PdgNodeIndex,
        var: &str,
        scope: &Rc<RefCell<Scope>>,
        cfg_to_pdg: &[PdgNodeIndex],
        visited: &mut HashSet<CfgNodeIndex>,
        pdg: &mut Pdg,
    ) {
        if !visited.insert(node) {
            return;
        }
        let cfg_node = self.cfg.node(node);
        if let Some(pe) = &cfg_node.pe {
            if self.referenced_variables(pe, scope).contains(var) {
                pdg.add_edge(from_pdg, cfg_to_pdg[node.0], DependenceKind::Data, Some(var.to_string()));
            }
            if self.config.avoid_def_propagation_when_building_data_dependence
                && self.assigned_variables(pe, scope).iter().any(|d| d.as_str() == var)
            {
                return;
            }
        }
        for next in self.cfg.forward_targets(node) {
            self.walk_data_dependence(next, from_pdg, var, scope, cfg_to_pdg, visited, pdg);
        }
    }

    fn add_control_edges_for_owner(
        &self,
        source: PdgNodeIndex,
        owner: &PeRef,
        cfg_to_pdg: &[PdgNodeIndex],
        pdg: &mut Pdg,
    ) {
        let (body, else_body, updaters) = {
            let b = owner.borrow();
            match &b.kind {
                PeKind::Statement(s) => (s.body.clone(), s.else_body.clone(), s.updaters.clone()),
                _ => return,
            }
        };
        self.add_control_edges_for_block(source, true, &body, cfg_to_pdg, pdg);
        if !else_body.is_empty() {
            self.add_control_edges_for_block(source, false, &else_body, cfg_to_pdg, pdg);
        }
        if !updaters.is_empty() {
            self.add_control_edges_for_block(source, true, &updaters, cfg_to_pdg, pdg);
        }
    }

    fn add_control_edges_for_block(
        &self,
        source: PdgNodeIndex,
        label: bool,
        statements: &[PeRef],
        cfg_to_pdg: &[PdgNodeIndex],
        pdg: &mut Pdg,
    ) {
        for stmt in statements {
            let (kind, has_condition, condition_pe_id, body, else_body, updaters) = {
                let b = stmt.borrow();
                match &b.kind {
                    PeKind::Statement(s) => (
                        s.kind,
                        s.condition.is_some(),
                        s.condition.as_ref().map(|c| c.borrow().id),
                        s.body.clone(),
                        s.else_body.clone(),
                        s.updaters.clone(),
                    ),
                    _ => continue,
                }
            };

            let is_branch_like = matches!(
                kind,
                Some(StmtKind::Catch)
                    | Some(StmtKind::Do)
                    | Some(StmtKind::For)
                    | Some(StmtKind::Foreach)
                    | Some(StmtKind::If)
                    | Some(StmtKind::SimpleBlock)
                    | Some(StmtKind::Synchronized)
                    | Some(StmtKind::Switch)
                    | Some(StmtKind::Try)
                    | Some(StmtKind::While)
            );
            let is_leaf = matches!(
                kind,
                Some(StmtKind::Assert)
                    | Some(StmtKind::Break)
                    | Some(StmtKind::Case)
                    | Some(StmtKind::Continue)
                    | Some(StmtKind::Expression)
                    | Some(StmtKind::Return)
                    | Some(StmtKind::Throw)
                    | Some(StmtKind::VariableDeclaration)
            );

            if is_branch_like && has_condition {
                if let Some(cond_id) = condition_pe_id {
                    if let Some(&cfg_idx) = self.control_by_pe.get(&cond_id) {
                        pdg.add_edge(source, cfg_to_pdg[cfg_idx.0], DependenceKind::Control(label), None);
                    }
                }
            } else if is_branch_like {
                self.add_control_edges_for_block(source, label, &body, cfg_to_pdg, pdg);
                if !else_body.is_empty() {
                    self.add_control_edges_for_block(source, false, &else_body, cfg_to_pdg, pdg);
                }
                if !updaters.is_empty() {
                    self.add_control_edges_for_block(source, true, &updaters, cfg_to_pdg, pdg);
                }
            } else if is_leaf {
                let stmt_id = stmt.borrow().id;
                if let Some(&cfg_idx) = self.normal_by_pe.get(&stmt_id) {
                    pdg.add_edge(source, cfg_to_pdg[cfg_idx.0], DependenceKind::Control(label), None);
                }
            }
        }
    }
}

fn upgrade_owner(pe: &PeRef) -> Option<PeRef> {
    let b = pe.borrow();
    b.owner_conditional_block.as_ref().and_then(|w| w.upgrade())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::CfgBuilder;
    use crate::pe::{ExprData, ExprKind, PeArena, StmtData};

    fn assignment(arena: &mut PeArena, var: &str, value_name: &str) -> PeRef {
        let lhs = arena.make(PeKind::Expression(ExprData::new(ExprKind::SimpleName)), 1, 1, var);
        let op = arena.make(crate::pe::PeKind::Operator { token: "=".into() }, 1, 1, "=");
        let rhs = arena.make(PeKind::Expression(ExprData::new(ExprKind::SimpleName)), 1, 1, value_name);
        let mut assign = ExprData::new(ExprKind::Assignment);
        assign.children = vec![lhs, op, rhs];
        let expr = arena.make(PeKind::Expression(assign), 1, 1, format!("{var} = {value_name}"));
        let mut stmt = StmtData::new(StmtKind::Expression);
        stmt.children = vec![expr];
        arena.make(PeKind::Statement(stmt), 1, 1, format!("{var} = {value_name};"))
    }

    fn use_stmt(arena: &mut PeArena, var: &str) -> PeRef {
        let name = arena.make(PeKind::Expression(ExprData::new(ExprKind::SimpleName)), 1, 1, var);
        let mut call = ExprData::new(ExprKind::MethodInvocation);
        call.resolved_name = Some("use".into());
        call.children = vec![name];
        let expr = arena.make(PeKind::Expression(call), 1, 1, format!("use({var})"));
        let mut stmt = StmtData::new(StmtKind::Expression);
        stmt.children = vec![expr];
        arena.make(PeKind::Statement(stmt), 1, 1, format!("use({var});"))
    }

    #[test]
    fn simple_assignment_and_use_produces_data_edge() {
        let mut arena = PeArena::new();
        let s1 = assignment(&mut arena, "y", "x");
        let s2 = use_stmt(&mut arena, "y");
        let method = MethodData {
            body: vec![s1, s2],
            ..Default::default()
        };
        let cfg = CfgBuilder::new().build(&method);
        let analyzer = DefUseAnalyzer::new();
        let pdg = PdgBuilder::new(&cfg, PdgConfig::default(), &analyzer).build(&method);

        let edges = pdg.all_edges();
        let has_data_edge_y = edges
            .iter()
            .any(|e| matches!(e.kind, DependenceKind::Data) && e.variable.as_deref() == Some("y"));
        assert!(has_data_edge_y);
    }

    #[test]
    fn build_binds_def_use_scope_from_method_params_and_locals() {
        let mut arena = PeArena::new();
        let param = arena.make(
            crate::pe::PeKind::Variable {
                name: "x".into(),
                category: crate::pe::VarCategory::Parameter,
            },
            1,
            1,
            "int x",
        );
        let s1 = use_stmt(&mut arena, "x");
        let method = MethodData {
            params: vec![param],
            body: vec![s1],
            ..Default::default()
        };
        let cfg = CfgBuilder::new().build(&method);
        let analyzer = DefUseAnalyzer::new();
        let pdg = PdgBuilder::new(&cfg, PdgConfig::default(), &analyzer).build(&method);

        // The `x` use inside the body has a real bound scope now that the
        // PDG builder threads a method-level scope through `analyze`.
        let body_stmt_pe = method.body[0].clone();
        let sets = analyzer.analyze(&body_stmt_pe, Some(&scope_for_method(&method)));
        assert!(sets.uses.iter().any(|u| u.main_name == "x" && u.scope.is_some()));
        let _ = pdg;
    }

    #[test]
    fn def_kill_short_circuit_respects_flag() {
        let mut arena = PeArena::new();
        let s1 = assignment(&mut arena, "a", "1");
        let s2 = assignment(&mut arena, "a", "2");
        let s3 = use_stmt(&mut arena, "a");
        let method = MethodData {
            body: vec![s1.clone(), s2.clone(), s3],
            ..Default::default()
        };
        let cfg = CfgBuilder::new().build(&method);
        let analyzer = DefUseAnalyzer::new();

        let mut cfg_avoid = PdgConfig::default();
        cfg_avoid.avoid_def_propagation_when_building_data_dependence = true;
        let pdg_avoid = PdgBuilder::new(&cfg, cfg_avoid, &analyzer).build(&method);

        let mut cfg_no_avoid = PdgConfig::default();
        cfg_no_avoid.avoid_def_propagation_when_building_data_dependence = false;
        let pdg_no_avoid = PdgBuilder::new(&cfg, cfg_no_avoid, &analyzer).build(&method);

        let s1_id = s1.borrow().id;
        let data_edges_from_s1_avoid = pdg_avoid
            .all_edges()
            .iter()
            .filter(|e| matches!(e.kind, DependenceKind::Data))
            .filter(|e| {
                matches!(pdg_avoid.node(e.from).kind, PdgNodeKind::FromCfg(c) if cfg.node(c).pe_id() == Some(s1_id))
            })
            .count();
        let data_edges_from_s1_no_avoid = pdg_no_avoid
            .all_edges()
            .iter()
            .filter(|e| matches!(e.kind, DependenceKind::Data))
            .filter(|e| {
                matches!(pdg_no_avoid.node(e.from).kind, PdgNodeKind::FromCfg(c) if cfg.node(c).pe_id() == Some(s1_id))
            })
            .count();

        assert_eq!(data_edges_from_s1_avoid, 0);
        assert!(data_edges_from_s1_no_avoid > 0);
    }
}
