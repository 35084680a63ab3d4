//! Def/Use analyzer (component C4): per-PE-node memoized computation of
//! which variables each expression/statement defines and uses.

pub mod heuristics;

use crate::pe::scope::{add_variable, search_variable, Scope};
use crate::pe::{ExprKind, ExprData, MethodData, PeId, PeKind, PeRef, StmtData, StmtKind};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// The def lattice: UNKNOWN < NO_DEF < MAY_DEF < DEF < DECLARE < DECLARE_AND_DEF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DefKind {
    Unknown = 0,
    NoDef = 1,
    MayDef = 2,
    Def = 3,
    Declare = 4,
    DeclareAndDef = 5,
}

impl DefKind {
    pub fn promote(self, other: DefKind) -> DefKind {
        std::cmp::max(self, other)
    }

    pub fn is_at_least_may_def(self) -> bool {
        self >= DefKind::MayDef
    }
}

/// The use lattice: UNKNOWN < NO_USE < MAY_USE < USE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UseKind {
    Unknown = 0,
    NoUse = 1,
    MayUse = 2,
    Use = 3,
}

impl UseKind {
    pub fn promote(self, other: UseKind) -> UseKind {
        std::cmp::max(self, other)
    }

    pub fn is_at_least_may_use(self) -> bool {
        self >= UseKind::MayUse
    }
}

#[derive(Debug, Clone)]
pub struct VarDef {
    pub main_name: String,
    pub kind: DefKind,
    pub scope: Option<Weak<RefCell<Scope>>>,
}

#[derive(Debug, Clone)]
pub struct VarUse {
    pub main_name: String,
    pub kind: UseKind,
    pub scope: Option<Weak<RefCell<Scope>>>,
    pub owning_statement: Option<PeId>,
}

/// The frozen def/use sets for a single PE node.
#[derive(Debug, Clone, Default)]
pub struct DefUseSets {
    // defs/uses below
    pub defs: Vec<VarDef>,
    pub uses: Vec<VarUse>,
}

impl DefUseSets {
    fn push_def(&mut self, main_name: impl Into<String>, kind: DefKind, scope: Option<&Rc<RefCell<Scope>>>) {
        self.defs.push(VarDef {
            main_name: main_name.into(),
            kind,
            scope: scope.map(Rc::downgrade),
        });
    }

    fn push_use(&mut self, main_name: impl Into<String>, kind: UseKind, scope: Option<&Rc<RefCell<Scope>>>, owner: Option<PeId>) {
        self.uses.push(VarUse {
            main_name: main_name.into(),
            kind,
            scope: scope.map(Rc::downgrade),
            owning_statement: owner,
        });
    }

    pub fn defs_at_least_may_def(&self) -> impl Iterator<Item = &VarDef> {
        self.defs.iter().filter(|d| d.kind.is_at_least_may_def())
    }

    pub fn uses_at_least_may_use(&self) -> impl Iterator<Item = &VarUse> {
        self.uses.iter().filter(|u| u.kind.is_at_least_may_use())
    }

    fn merge(&mut self, other: DefUseSets) {
        self.defs.extend(other.defs);
        self.uses.extend(other.uses);
    }

    fn promote_defs(mut self, min: DefKind) -> Self {
        for d in &mut self.defs {
            d.kind = d.kind.promote(min);
        }
        self
    }

    fn promote_uses(mut self, min: UseKind) -> Self {
        for u in &mut self.uses {
            u.kind = u.kind.promote(min);
        }
        self
    }
}

/// Resolves a PE to a bare variable name when it is a pure variable
/// reference, per spec §4.3's `nameOf` helper. Returns `None` for
/// anything else (e.g. `foo().bar`).
pub fn name_of(pe: &PeRef) -> Option<String> {
    let b = pe.borrow();
    let PeKind::Expression(data) = &b.kind else {
        return None;
    };
    match data.kind {
        Some(ExprKind::SimpleName) => Some(b.text.clone()),
        Some(ExprKind::ArrayAccess) => {
            let base = data.children.first()?;
            name_of(base).or_else(|| {
                let bb = base.borrow();
                matches!(&bb.kind, PeKind::Expression(d) if d.kind == Some(ExprKind::SimpleName))
                    .then(|| bb.text.clone())
            })
        }
        Some(ExprKind::FieldAccess) => {
            let qualifier = data.qualifier.as_ref()?;
            let qb = qualifier.borrow();
            let is_simple = matches!(&qb.kind, PeKind::Expression(d) if matches!(d.kind, Some(ExprKind::SimpleName) | Some(ExprKind::This)));
            if is_simple {
                Some(b.text.clone())
            } else {
                None
            }
        }
        Some(ExprKind::QualifiedName) => {
            let qualifier = data.qualifier.as_ref()?;
            let qb = qualifier.borrow();
            let is_simple = matches!(&qb.kind, PeKind::Expression(d) if d.kind == Some(ExprKind::SimpleName));
            is_simple.then(|| b.text.clone())
        }
        _ => None,
    }
}

/// Builds the single flat scope (component C2) a method's body is
/// analyzed against: one root `Scope` per method, populated with every
/// parameter and every `VariableDeclaration`/`Foreach`-introduced local
/// name found anywhere in the body, before any `DefUseAnalyzer::analyze`
/// call runs against it. Matches `compute_stmt`'s flat forwarding of a
/// single `owner_scope` through every nested statement list: there is no
/// narrower granularity for it to bind against.
pub fn scope_for_method(method: &MethodData) -> Rc<RefCell<Scope>> {
    let scope = Scope::root(None);
    for param in &method.params {
        let b = param.borrow();
        if let PeKind::Variable { name, .. } = &b.kind {
            add_variable(&scope, name.clone());
        }
    }
    for stmt in &method.body {
        collect_declared_names(stmt, &scope);
    }
    scope
}

fn collect_declared_names(pe: &PeRef, scope: &Rc<RefCell<Scope>>) {
    let kind = pe.borrow().kind.clone();
    match kind {
        PeKind::Statement(data) => {
            if data.kind == Some(StmtKind::VariableDeclaration) {
                for fragment in &data.children {
                    let fb = fragment.borrow();
                    if let PeKind::Expression(fd) = &fb.kind {
                        if let Some(name_pe) = fd.children.first() {
                            add_variable(scope, name_pe.borrow().text.clone());
                        }
                    }
                }
            }
            if data.kind == Some(StmtKind::Foreach) {
                if let Some(var_pe) = data.initializers.first() {
                    let vb = var_pe.borrow();
                    if let PeKind::Variable { name, .. } = &vb.kind {
                        add_variable(scope, name.clone());
                    }
                }
            }
            for c in data
                .children
                .iter()
                .chain(&data.initializers)
                .chain(&data.updaters)
                .chain(&data.body)
                .chain(&data.else_body)
                .chain(&data.catch_clauses)
                .chain(&data.finally_body)
            {
                collect_declared_names(c, scope);
            }
        }
        PeKind::Expression(data) => {
            for c in &data.children {
                collect_declared_names(c, scope);
            }
        }
        _ => {}
    }
}

/// Memoizing analyzer over a single compilation unit's PE tree.
#[derive(Default)]
pub struct DefUseAnalyzer {
    cache: RefCell<HashMap<PeId, Rc<DefUseSets>>>,
}

impl DefUseAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes (or returns memoized) def/use sets for `pe`, binding
    /// variable scopes against `owner_scope` (the scope of the nearest
    /// enclosing block), per the spec's scope-binding-at-insertion rule.
    pub fn analyze(&self, pe: &PeRef, owner_scope: Option<&Rc<RefCell<Scope>>>) -> Rc<DefUseSets> {
        let id = pe.borrow().id;
        if let Some(cached) = self.cache.borrow().get(&id) {
            return Rc::clone(cached);
        }
        let computed = Rc::new(self.compute(pe, owner_scope));
        self.cache.borrow_mut().insert(id, Rc::clone(&computed));
        computed
    }

    fn bind_def_scope(&self, owner_scope: Option<&Rc<RefCell<Scope>>>, name: &str, kind: DefKind) -> Option<Rc<RefCell<Scope>>> {
        let owner_scope = owner_scope?;
        if kind >= DefKind::Declare {
            return Some(Rc::clone(owner_scope));
        }
        search_variable(owner_scope, name)
    }

    fn bind_use_scope(&self, owner_scope: Option<&Rc<RefCell<Scope>>>, name: &str) -> Option<Rc<RefCell<Scope>>> {
        let owner_scope = owner_scope?;
        search_variable(owner_scope, name)
    }

    fn compute(&self, pe: &PeRef, owner_scope: Option<&Rc<RefCell<Scope>>>) -> DefUseSets {
        let kind = pe.borrow().kind.clone();
        match kind {
            PeKind::Expression(data) => self.compute_expr(pe, &data, owner_scope),
            PeKind::Statement(data) => self.compute_stmt(pe, &data, owner_scope),
            _ => DefUseSets::default(),
        }
    }

    fn forward_children(&self, children: &[PeRef], owner_scope: Option<&Rc<RefCell<Scope>>>) -> DefUseSets {
        let mut out = DefUseSets::default();
        for c in children {
            out.merge((*self.analyze(c, owner_scope)).clone());
        }
        out
    }

    fn compute_expr(&self, pe: &PeRef, data: &ExprData, owner_scope: Option<&Rc<RefCell<Scope>>>) -> DefUseSets {
        let mut out = DefUseSets::default();
        match data.kind {
            Some(ExprKind::Assignment) => {
                // children: [lhs, op, rhs]
                if let (Some(lhs), Some(rhs)) = (data.children.first(), data.children.get(2)) {
                    if let Some(name) = name_of(lhs) {
                        let scope = self.bind_def_scope(owner_scope, &name, DefKind::Def);
                        out.push_def(name, DefKind::Def, scope.as_ref());
                    } else {
                        out.merge((*self.analyze(lhs, owner_scope)).clone());
                    }
                    let rhs_sets = (*self.analyze(rhs, owner_scope)).clone();
                    out.merge(rhs_sets.clone().promote_uses(UseKind::Use));
                    out.defs.extend(rhs_sets.defs);
                }
            }
            Some(ExprKind::VariableDeclarationFragment) => {
                let name_pe = data.children.first();
                let init = data.children.get(1);
                if let Some(name_pe) = name_pe {
                    let name = pe_name_text(name_pe);
                    let scope = self.bind_def_scope(owner_scope, &name, DefKind::Declare);
                    let decl_kind = if init.is_some() {
                        DefKind::DeclareAndDef
                    } else {
                        DefKind::Declare
                    };
                    out.push_def(name, decl_kind, scope.as_ref());
                }
                if let Some(init) = init {
                    let init_sets = (*self.analyze(init, owner_scope)).clone();
                    out.merge(init_sets.clone().promote_uses(UseKind::Use));
                    out.defs.extend(init_sets.defs);
                }
            }
            Some(ExprKind::Postfix) => {
                if let Some(operand) = data.children.first() {
                    if let Some(name) = name_of(operand) {
                        let scope = self.bind_def_scope(owner_scope, &name, DefKind::Def);
                        out.push_def(name, DefKind::Def, scope.as_ref());
                    }
                    let operand_sets = (*self.analyze(operand, owner_scope)).clone();
                    out.merge(operand_sets.promote_uses(UseKind::Use));
                }
            }
            Some(ExprKind::Prefix) => {
                let op_is_incdec = data
                    .children
                    .first()
                    .map(|op| op.borrow().text == "++" || op.borrow().text == "--")
                    .unwrap_or(false);
                if let Some(operand) = data.children.get(1) {
                    if op_is_incdec {
                        if let Some(name) = name_of(operand) {
                            let scope = self.bind_def_scope(owner_scope, &name, DefKind::Def);
                            out.push_def(name, DefKind::Def, scope.as_ref());
                        }
                    } else {
                        let operand_sets = (*self.analyze(operand, owner_scope)).clone();
                        out.defs.extend(operand_sets.defs);
                    }
                    let operand_sets = (*self.analyze(operand, owner_scope)).clone();
                    out.merge(operand_sets.promote_uses(UseKind::Use));
                }
            }
            Some(ExprKind::MethodInvocation) => {
                let method_name = data.resolved_name.clone().unwrap_or_default();
                let call_def_kind = heuristics::classify_call_def(&method_name);
                if let Some(qualifier) = &data.qualifier {
                    if let Some(qname) = name_of(qualifier) {
                        let scope = self.bind_def_scope(owner_scope, &qname, call_def_kind);
                        out.push_def(qname, call_def_kind, scope.as_ref());
                    } else {
                        let qsets = (*self.analyze(qualifier, owner_scope)).clone();
                        if call_def_kind.is_at_least_may_def() {
                            out.merge(qsets.promote_defs(DefKind::MayDef));
                        } else {
                            out.merge(qsets);
                        }
                    }
                    let qsets_uses = (*self.analyze(qualifier, owner_scope)).clone();
                    out.merge(qsets_uses);
                }
                // arguments: children after the method name slot
                out.merge(self.forward_children(&data.children, owner_scope));
            }
            Some(ExprKind::SimpleName) => {
                let name = pe.borrow().text.clone();
                let scope = self.bind_use_scope(owner_scope, &name);
                out.push_use(name, UseKind::MayUse, scope.as_ref(), None);
            }
            _ => {
                out.merge(self.forward_children(&data.children, owner_scope));
                if let Some(anon) = &data.anonymous_body {
                    out.merge(self.forward_anonymous_methods(anon, owner_scope));
                }
            }
        }
        out
    }

    fn forward_anonymous_methods(&self, class_pe: &PeRef, owner_scope: Option<&Rc<RefCell<Scope>>>) -> DefUseSets {
        let mut out = DefUseSets::default();
        let methods = {
            let b = class_pe.borrow();
            match &b.kind {
                PeKind::Class(c) => c.methods.clone(),
                _ => Vec::new(),
            }
        };
        for m in &methods {
            let body = {
                let mb = m.borrow();
                match &mb.kind {
                    PeKind::Method(md) => md.body.clone(),
                    _ => Vec::new(),
                }
            };
            for stmt in &body {
                out.merge((*self.analyze(stmt, owner_scope)).clone());
            }
        }
        out
    }

    fn compute_stmt(&self, _pe: &PeRef, data: &StmtData, owner_scope: Option<&Rc<RefCell<Scope>>>) -> DefUseSets {
        let mut out = DefUseSets::default();
        if let Some(cond) = &data.condition {
            out.merge((*self.analyze(cond, owner_scope)).clone());
        }
        for c in &data.children {
            out.merge((*self.analyze(c, owner_scope)).clone());
        }
        for c in &data.initializers {
            out.merge((*self.analyze(c, owner_scope)).clone());
        }
        for c in &data.updaters {
            out.merge((*self.analyze(c, owner_scope)).clone());
        }
        for c in &data.body {
            out.merge((*self.analyze(c, owner_scope)).clone());
        }
        for c in &data.else_body {
            out.merge((*self.analyze(c, owner_scope)).clone());
        }
        for c in &data.catch_clauses {
            out.merge((*self.analyze(c, owner_scope)).clone());
        }
        for c in &data.finally_body {
            out.merge((*self.analyze(c, owner_scope)).clone());
        }
        out
    }
}

fn pe_name_text(pe: &PeRef) -> String {
    name_of(pe).unwrap_or_else(|| pe.borrow().text.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pe::{PeArena, VarCategory};

    fn simple_name(arena: &mut PeArena, name: &str) -> PeRef {
        arena.make(
            PeKind::Expression(ExprData::new(ExprKind::SimpleName)),
            1,
            1,
            name,
        )
    }

    #[test]
    fn assignment_defs_lhs_and_uses_rhs() {
        let mut arena = PeArena::new();
        let lhs = simple_name(&mut arena, "x");
        let op = arena.make(PeKind::Operator { token: "=".into() }, 1, 1, "=");
        let rhs = simple_name(&mut arena, "y");
        let mut assign = ExprData::new(ExprKind::Assignment);
        assign.children = vec![lhs, op, rhs];
        let assign_pe = arena.make(PeKind::Expression(assign), 1, 1, "x = y");

        let analyzer = DefUseAnalyzer::new();
        let sets = analyzer.analyze(&assign_pe, None);
        assert!(sets.defs.iter().any(|d| d.main_name == "x" && d.kind == DefKind::Def));
        assert!(sets.uses.iter().any(|u| u.main_name == "y" && u.kind == UseKind::Use));
    }

    #[test]
    fn size_call_is_no_def_on_receiver() {
        let mut arena = PeArena::new();
        let receiver = simple_name(&mut arena, "m");
        let mut call = ExprData::new(ExprKind::MethodInvocation);
        call.qualifier = Some(receiver);
        call.resolved_name = Some("size".into());
        let call_pe = arena.make(PeKind::Expression(call), 1, 1, "m.size()");

        let analyzer = DefUseAnalyzer::new();
        let sets = analyzer.analyze(&call_pe, None);
        assert!(sets.defs.iter().any(|d| d.main_name == "m" && d.kind == DefKind::NoDef));
        assert!(!sets.defs.iter().any(|d| d.main_name == "m" && d.kind >= DefKind::MayDef));
    }

    #[test]
    fn add_call_defs_receiver() {
        let mut arena = PeArena::new();
        let receiver = simple_name(&mut arena, "m");
        let arg = simple_name(&mut arena, "x");
        let mut call = ExprData::new(ExprKind::MethodInvocation);
        call.qualifier = Some(receiver);
        call.resolved_name = Some("add".into());
        call.children = vec![arg];
        let call_pe = arena.make(PeKind::Expression(call), 1, 1, "m.add(x)");

        let analyzer = DefUseAnalyzer::new();
        let sets = analyzer.analyze(&call_pe, None);
        assert!(sets.defs.iter().any(|d| d.main_name == "m" && d.kind == DefKind::Def));
    }

    #[test]
    fn unknown_call_is_may_def() {
        let mut arena = PeArena::new();
        let receiver = simple_name(&mut arena, "m");
        let mut call = ExprData::new(ExprKind::MethodInvocation);
        call.qualifier = Some(receiver);
        call.resolved_name = Some("frobnicate".into());
        let call_pe = arena.make(PeKind::Expression(call), 1, 1, "m.frobnicate()");

        let analyzer = DefUseAnalyzer::new();
        let sets = analyzer.analyze(&call_pe, None);
        assert!(sets.defs.iter().any(|d| d.main_name == "m" && d.kind == DefKind::MayDef));
    }

    #[test]
    fn chained_mutating_call_promotes_inner_qualifier_defs() {
        let mut arena = PeArena::new();
        let a = simple_name(&mut arena, "a");
        let mut get_x = ExprData::new(ExprKind::MethodInvocation);
        get_x.qualifier = Some(a);
        get_x.resolved_name = Some("getX".into());
        let get_x_pe = arena.make(PeKind::Expression(get_x), 1, 1, "a.getX()");

        let arg = arena.make(PeKind::Expression(ExprData::new(ExprKind::Number)), 1, 1, "1");
        let mut set_call = ExprData::new(ExprKind::MethodInvocation);
        set_call.qualifier = Some(get_x_pe);
        set_call.resolved_name = Some("set".into());
        set_call.children = vec![arg];
        let set_pe = arena.make(PeKind::Expression(set_call), 1, 1, "a.getX().set(1)");

        let analyzer = DefUseAnalyzer::new();
        let sets = analyzer.analyze(&set_pe, None);
        assert!(sets.defs.iter().any(|d| d.main_name == "a" && d.kind >= DefKind::MayDef));
    }

    #[test]
    fn def_lattice_promotion_never_demotes() {
        assert_eq!(DefKind::Def.promote(DefKind::MayDef), DefKind::Def);
        assert_eq!(DefKind::MayDef.promote(DefKind::Def), DefKind::Def);
    }

    #[test]
    fn name_of_recognizes_this_field_access() {
        let mut arena = PeArena::new();
        let this_pe = arena.make(PeKind::Expression(ExprData::new(ExprKind::This)), 1, 1, "this");
        let mut fa = ExprData::new(ExprKind::FieldAccess);
        fa.qualifier = Some(this_pe);
        let fa_pe = arena.make(PeKind::Expression(fa), 1, 1, "this.source");
        assert_eq!(name_of(&fa_pe), Some("this.source".to_string()));
    }

    #[test]
    fn name_of_rejects_call_result_field_access() {
        let mut arena = PeArena::new();
        let call = arena.make(PeKind::Expression(ExprData::new(ExprKind::MethodInvocation)), 1, 1, "foo()");
        let mut fa = ExprData::new(ExprKind::FieldAccess);
        fa.qualifier = Some(call);
        let fa_pe = arena.make(PeKind::Expression(fa), 1, 1, "foo().bar");
        assert_eq!(name_of(&fa_pe), None);
    }

    #[test]
    fn memoization_returns_same_sets_on_repeat_query() {
        let mut arena = PeArena::new();
        let name = simple_name(&mut arena, "x");
        let analyzer = DefUseAnalyzer::new();
        let first = analyzer.analyze(&name, None);
        let second = analyzer.analyze(&name, None);
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn scope_for_method_collects_params_and_locals() {
        use crate::pe::scope::has_variable_directly;

        let mut arena = PeArena::new();
        let param = arena.make(
            PeKind::Variable {
                name: "x".into(),
                category: VarCategory::Parameter,
            },
            1,
            1,
            "int x",
        );

        let name_pe = simple_name(&mut arena, "y");
        let mut frag = ExprData::new(ExprKind::VariableDeclarationFragment);
        frag.children = vec![name_pe];
        let frag_pe = arena.make(PeKind::Expression(frag), 1, 1, "y");
        let decl = arena.make(
            PeKind::Statement(StmtData {
                kind: Some(StmtKind::VariableDeclaration),
                children: vec![frag_pe],
                ..Default::default()
            }),
            1,
            1,
            "int y;",
        );

        let method = MethodData {
            name: Some("m".into()),
            params: vec![param],
            body: vec![decl],
            is_lambda: false,
            expression_body: None,
        };

        let scope = scope_for_method(&method);
        assert!(has_variable_directly(&scope, "x"));
        assert!(has_variable_directly(&scope, "y"));
    }

    #[test]
    fn analyze_binds_scope_when_one_is_supplied() {
        let mut arena = PeArena::new();
        let lhs = simple_name(&mut arena, "x");
        let op = arena.make(PeKind::Operator { token: "=".into() }, 1, 1, "=");
        let rhs = simple_name(&mut arena, "y");
        let mut assign = ExprData::new(ExprKind::Assignment);
        assign.children = vec![lhs, op, rhs];
        let assign_pe = arena.make(PeKind::Expression(assign), 1, 1, "x = y");

        let scope = crate::pe::scope::Scope::root(None);
        crate::pe::scope::add_variable(&scope, "x");
        crate::pe::scope::add_variable(&scope, "y");

        let analyzer = DefUseAnalyzer::new();
        let sets = analyzer.analyze(&assign_pe, Some(&scope));
        assert!(sets.defs.iter().any(|d| d.main_name == "x" && d.scope.is_some()));
        assert!(sets.uses.iter().any(|u| u.main_name == "y" && u.scope.is_some()));
    }

    #[test]
    fn parameter_variable_kind_is_distinct() {
        let mut arena = PeArena::new();
        let p = arena.make(
            PeKind::Variable {
                name: "x".into(),
                category: VarCategory::Parameter,
            },
            1,
            1,
            "int x",
        );
        assert!(matches!(p.borrow().kind, PeKind::Variable { category: VarCategory::Parameter, .. }));
    }
}
