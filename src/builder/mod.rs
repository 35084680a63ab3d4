//! AST→PE builder (component C3): walks a tree-sitter-java tree and
//! produces the PE tree, using the "safe-stack" bounded-pop discipline
//! (spec §4.2) so an unrecognized grammar production is skipped instead
//! of corrupting the builder's working stack. Field-name lookups follow
//! the concrete tree-sitter-java usage pattern seen in the retrieval
//! pack's `java_parser.rs` reference (`name`, `modifiers`, `type`,
//! `body`, `object`, `arguments`, falling back to a child-by-kind scan
//! when a field accessor returns nothing).

use crate::pe::{
    set_statement, ClassData, ExprData, ExprKind, MethodData, PeArena, PeKind, PeRef, StmtData,
    StmtKind, VarCategory,
};
use crate::parser::SourceAst;
use std::rc::Rc;
use tree_sitter::Node;

pub struct AstToPeBuilder<'s> {
    src: &'s SourceAst,
    arena: PeArena,
    stack: Vec<PeRef>,
}

/// Result of building a compilation unit: the id arena (owns all PEs'
/// id allocation) and the top-level classes found.
pub struct BuildResult {
    pub arena: PeArena,
    pub classes: Vec<PeRef>,
}

impl<'s> AstToPeBuilder<'s> {
    pub fn new(src: &'s SourceAst) -> Self {
        Self {
            src,
            arena: PeArena::new(),
            stack: Vec::new(),
        }
    }

    pub fn build(mut self) -> BuildResult {
        let root = self.src.root();
        let mut classes = Vec::new();
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            if child.kind() == "class_declaration" {
                if let Some(class_pe) = self.visit_single(child) {
                    classes.push(class_pe);
                }
            }
        }
        BuildResult {
            arena: self.arena,
            classes,
        }
    }

    /// The bounded-pop discipline: records the stack height, visits
    /// `node`, then pops everything produced above that height. Zero or
    /// one produced element is the supported case; more than one is
    /// treated as a visitor bug and discarded, yielding `None`, so an
    /// unsupported or malformed production never corrupts the stack for
    /// the caller.
    fn visit_single(&mut self, node: Node<'s>) -> Option<PeRef> {
        let h = self.stack.len();
        self.visit_node(node);
        let mut produced: Vec<PeRef> = self.stack.split_off(h);
        if produced.len() == 1 {
            produced.pop()
        } else {
            None
        }
    }

    fn visit_many(&mut self, nodes: impl Iterator<Item = Node<'s>>) -> Vec<PeRef> {
        nodes.filter_map(|n| self.visit_single(n)).collect()
    }

    fn child_by_field_or_kind(&self, node: Node<'s>, field: &str, kinds: &[&str]) -> Option<Node<'s>> {
        if let Some(n) = node.child_by_field_name(field) {
            return Some(n);
        }
        let mut cursor = node.walk();
        let result = node.children(&mut cursor).find(|c| kinds.contains(&c.kind()));
        result
    }

    fn children_by_kind(&self, node: Node<'s>, kind: &str) -> Vec<Node<'s>> {
        let mut cursor = node.walk();
        node.children(&mut cursor).filter(|c| c.kind() == kind).collect()
    }

    fn make_expr(&mut self, node: Node, kind: ExprKind, data: ExprData) -> PeRef {
        let mut data = data;
        data.kind = Some(kind);
        self.arena.make(
            PeKind::Expression(data),
            self.src.start_line(node),
            self.src.end_line(node),
            self.src.text_of(node),
        )
    }

    fn make_stmt(&mut self, node: Node, kind: StmtKind, data: StmtData) -> PeRef {
        let mut data = data;
        data.kind = Some(kind);
        self.arena.make(
            PeKind::Statement(data),
            self.src.start_line(node),
            self.src.end_line(node),
            self.src.text_of(node),
        )
    }

    fn visit_node(&mut self, node: Node<'s>) {
        let kind = node.kind();
        let pe = match kind {
            "class_declaration" => self.visit_class(node),
            "method_declaration" | "constructor_declaration" => self.visit_method(node),
            "block" => self.visit_block(node),
            "local_variable_declaration" => self.visit_local_var_decl(node),
            "expression_statement" => self.visit_expression_statement(node),
            "if_statement" => self.visit_if(node),
            "while_statement" => self.visit_while(node),
            "do_statement" => self.visit_do(node),
            "for_statement" => self.visit_for(node),
            "enhanced_for_statement" => self.visit_foreach(node),
            "return_statement" => self.visit_return(node),
            "break_statement" => self.visit_break(node),
            "continue_statement" => self.visit_continue(node),
            "throw_statement" => self.visit_throw(node),
            "try_statement" => self.visit_try(node),
            "switch_statement" | "switch_expression" => self.visit_switch(node),
            "synchronized_statement" => self.visit_synchronized(node),
            "assert_statement" => self.visit_assert(node),
            "labeled_statement" => self.visit_labeled(node),
            "assignment_expression" => self.visit_assignment(node),
            "binary_expression" => self.visit_infix(node),
            "instanceof_expression" => self.visit_instanceof(node),
            "update_expression" => self.visit_postfix(node),
            "unary_expression" => self.visit_prefix(node),
            "parenthesized_expression" => self.visit_parenthesized(node),
            "method_invocation" => self.visit_method_invocation(node),
            "field_access" => self.visit_field_access(node),
            "array_access" => self.visit_array_access(node),
            "object_creation_expression" => self.visit_object_creation(node),
            "cast_expression" => self.visit_cast(node),
            "ternary_expression" => self.visit_ternary(node),
            "lambda_expression" => self.visit_lambda(node),
            "identifier" | "type_identifier" => Some(self.visit_simple_name(node)),
            "this" => Some(self.make_expr(node, ExprKind::This, ExprData::default())),
            "true" | "false" => Some(self.make_expr(node, ExprKind::Boolean, ExprData::default())),
            "null_literal" => Some(self.make_expr(node, ExprKind::Null, ExprData::default())),
            "decimal_integer_literal" | "decimal_floating_point_literal" | "hex_integer_literal" => {
                Some(self.make_expr(node, ExprKind::Number, ExprData::default()))
            }
            "string_literal" => Some(self.make_expr(node, ExprKind::String, ExprData::default())),
            "character_literal" => Some(self.make_expr(node, ExprKind::Character, ExprData::default())),
            _ => None,
        };
        if let Some(pe) = pe {
            self.stack.push(pe);
        }
    }

    fn visit_class(&mut self, node: Node<'s>) -> Option<PeRef> {
        let name = self
            .child_by_field_or_kind(node, "name", &["identifier"])
            .map(|n| self.src.text_of(n).to_string());
        let body = self.child_by_field_or_kind(node, "body", &["class_body"])?;
        let mut cursor = body.walk();
        let methods = self.visit_many(
            body.children(&mut cursor)
                .filter(|c| matches!(c.kind(), "method_declaration" | "constructor_declaration")),
        );
        let pe = self.arena.make(
            PeKind::Class(ClassData { name, methods }),
            self.src.start_line(node),
            self.src.end_line(node),
            self.src.text_of(node),
        );
        Some(pe)
    }

    fn visit_method(&mut self, node: Node<'s>) -> Option<PeRef> {
        let name = self
            .child_by_field_or_kind(node, "name", &["identifier"])
            .map(|n| self.src.text_of(n).to_string());

        let mut params = Vec::new();
        if let Some(param_list) = self.child_by_field_or_kind(node, "parameters", &["formal_parameters"]) {
            let mut cursor = param_list.walk();
            for p in param_list.children(&mut cursor) {
                if p.kind() == "formal_parameter" || p.kind() == "spread_parameter" {
                    if let Some(pname) = self.child_by_field_or_kind(p, "name", &["identifier"]) {
                        let text = self.src.text_of(pname).to_string();
                        let var_pe = self.arena.make(
                            PeKind::Variable {
                                name: text.clone(),
                                category: VarCategory::Parameter,
                            },
                            self.src.start_line(p),
                            self.src.end_line(p),
                            text,
                        );
                        params.push(var_pe);
                    }
                }
            }
        }

        let body_stmts = match self.child_by_field_or_kind(node, "body", &["block"]) {
            Some(body_node) => {
                let mut cursor = body_node.walk();
                self.visit_many(body_node.children(&mut cursor).filter(|c| c.kind() != "{" && c.kind() != "}"))
            }
            None => Vec::new(),
        };

        let pe = self.arena.make(
            PeKind::Method(MethodData {
                name,
                params,
                body: body_stmts,
                is_lambda: false,
                expression_body: None,
            }),
            self.src.start_line(node),
            self.src.end_line(node),
            self.src.text_of(node),
        );
        Some(pe)
    }

    fn visit_block(&mut self, node: Node<'s>) -> Option<PeRef> {
        let mut cursor = node.walk();
        let body = self.visit_many(node.children(&mut cursor).filter(|c| c.kind() != "{" && c.kind() != "}"));
        Some(self.make_stmt(node, StmtKind::SimpleBlock, StmtData {
            body,
            ..Default::default()
        }))
    }

    fn visit_local_var_decl(&mut self, node: Node<'s>) -> Option<PeRef> {
        let declarators = self.children_by_kind(node, "variable_declarator");
        let mut fragments = Vec::new();
        for d in &declarators {
            let name_node = self.child_by_field_or_kind(*d, "name", &["identifier"])?;
            let name_text = self.src.text_of(name_node).to_string();
            let init = self
                .child_by_field_or_kind(*d, "value", &[])
                .and_then(|v| self.visit_single(v));
            let name_pe = self.arena.make(
                PeKind::Expression(ExprData::new(ExprKind::SimpleName)),
                self.src.start_line(name_node),
                self.src.end_line(name_node),
                name_text.clone(),
            );
            let mut children = vec![name_pe];
            if let Some(init) = init {
                children.push(init);
            }
            let mut frag = ExprData::new(ExprKind::VariableDeclarationFragment);
            frag.children = children;
            fragments.push(self.make_expr(*d, ExprKind::VariableDeclarationFragment, frag));
        }
        Some(self.make_stmt(node, StmtKind::VariableDeclaration, StmtData {
            children: fragments,
            ..Default::default()
        }))
    }

    fn visit_expression_statement(&mut self, node: Node<'s>) -> Option<PeRef> {
        let mut cursor = node.walk();
        let inner = node.children(&mut cursor).find(|c| c.kind() != ";")?;
        let expr = self.visit_single(inner)?;
        Some(self.make_stmt(node, StmtKind::Expression, StmtData {
            children: vec![expr],
            ..Default::default()
        }))
    }

    fn visit_if(&mut self, node: Node<'s>) -> Option<PeRef> {
        let cond_paren = self.child_by_field_or_kind(node, "condition", &["parenthesized_expression"])?;
        let cond = self.unwrap_condition(cond_paren)?;
        let cons = self.child_by_field_or_kind(node, "consequence", &["block"])?;
        let mut body = Vec::new();
        if let Some(s) = self.visit_single(cons) {
            set_statement(&mut body, s);
        }
        let mut else_body = Vec::new();
        if let Some(alt) = self.child_by_field_or_kind(node, "alternative", &["else_clause"]) {
            let alt = if alt.kind() == "else_clause" {
                let mut cursor = alt.walk();
                let result = alt.children(&mut cursor).find(|c| c.kind() != "else").unwrap_or(alt);
                result
            } else {
                alt
            };
            if let Some(s) = self.visit_single(alt) {
                set_statement(&mut else_body, s);
            }
        }
        let mut data = StmtData::new(StmtKind::If);
        data.condition = Some(cond);
        data.body = body;
        data.else_body = else_body;
        Some(self.finish_conditional(node, data))
    }

    fn unwrap_condition(&mut self, node: Node<'s>) -> Option<PeRef> {
        let mut cursor = node.walk();
        let inner = node
            .children(&mut cursor)
            .find(|c| c.kind() != "(" && c.kind() != ")")?;
        self.visit_single(inner)
    }

    fn body_from(&mut self, node: Node<'s>) -> Vec<PeRef> {
        let mut out = Vec::new();
        if let Some(s) = self.visit_single(node) {
            set_statement(&mut out, s);
        }
        out
    }

    fn finish_conditional(&mut self, node: Node, data: StmtData) -> PeRef {
        let kind = data.kind.unwrap();
        let cond = data.condition.clone();
        let pe = self.make_stmt(node, kind, data);
        if let Some(cond) = cond {
            cond.borrow_mut().owner_conditional_block = Some(Rc::downgrade(&pe));
        }
        pe
    }

    fn visit_while(&mut self, node: Node<'s>) -> Option<PeRef> {
        let cond_paren = self.child_by_field_or_kind(node, "condition", &["parenthesized_expression"])?;
        let cond = self.unwrap_condition(cond_paren)?;
        let body_node = self.child_by_field_or_kind(node, "body", &["block"])?;
        let body = self.body_from(body_node);
        let mut data = StmtData::new(StmtKind::While);
        data.condition = Some(cond);
        data.body = body;
        Some(self.finish_conditional(node, data))
    }

    fn visit_do(&mut self, node: Node<'s>) -> Option<PeRef> {
        let body_node = self.child_by_field_or_kind(node, "body", &["block"])?;
        let body = self.body_from(body_node);
        let cond_paren = self.child_by_field_or_kind(node, "condition", &["parenthesized_expression"])?;
        let cond = self.unwrap_condition(cond_paren)?;
        let mut data = StmtData::new(StmtKind::Do);
        data.condition = Some(cond);
        data.body = body;
        Some(self.finish_conditional(node, data))
    }

    fn visit_for(&mut self, node: Node<'s>) -> Option<PeRef> {
        let init = self
            .child_by_field_or_kind(node, "init", &["local_variable_declaration"])
            .and_then(|n| self.visit_single(n))
            .map(|s| vec![s])
            .unwrap_or_default();
        let cond = self
            .child_by_field_or_kind(node, "condition", &[])
            .and_then(|n| self.visit_single(n));
        let body_node = self.child_by_field_or_kind(node, "body", &["block"])?;

        // A `for` header can carry more than one comma-separated updater
        // (`i++, j--`), but tree-sitter-java only exposes a single `update`
        // field, so walk the header's direct children past the second `;`
        // and stop at the body to collect all of them.
        let mut update = Vec::new();
        let mut cursor = node.walk();
        let mut semicolons_seen = 0;
        for child in node.children(&mut cursor) {
            if child.id() == body_node.id() {
                break;
            }
            match child.kind() {
                ";" => semicolons_seen += 1,
                "(" | ")" | "for" | "," => {}
                _ => {
                    if semicolons_seen >= 2 && child.is_named() {
                        if let Some(s) = self.visit_single(child) {
                            update.push(s);
                        }
                    }
                }
            }
        }

        let body = self.body_from(body_node);

        let mut data = StmtData::new(StmtKind::For);
        data.initializers = init;
        data.condition = cond.clone();
        data.updaters = update;
        data.body = body;
        let pe = self.make_stmt(node, StmtKind::For, data);
        if let Some(cond) = cond {
            cond.borrow_mut().owner_conditional_block = Some(Rc::downgrade(&pe));
        }
        Some(pe)
    }

    fn visit_foreach(&mut self, node: Node<'s>) -> Option<PeRef> {
        let name_node = self.child_by_field_or_kind(node, "name", &["identifier"])?;
        let param_pe = self.arena.make(
            PeKind::Variable {
                name: self.src.text_of(name_node).to_string(),
                category: VarCategory::Local,
            },
            self.src.start_line(name_node),
            self.src.end_line(name_node),
            self.src.text_of(name_node),
        );
        let iterable = self
            .child_by_field_or_kind(node, "value", &[])
            .and_then(|n| self.visit_single(n));
        let body_node = self.child_by_field_or_kind(node, "body", &["block"])?;
        let body = self.body_from(body_node);

        let mut data = StmtData::new(StmtKind::Foreach);
        data.initializers = vec![param_pe];
        if let Some(it) = iterable {
            data.initializers.push(it);
        }
        data.body = body;
        Some(self.make_stmt(node, StmtKind::Foreach, data))
    }

    fn visit_return(&mut self, node: Node<'s>) -> Option<PeRef> {
        let mut cursor = node.walk();
        let value = node
            .children(&mut cursor)
            .find(|c| c.kind() != "return" && c.kind() != ";")
            .and_then(|n| self.visit_single(n));
        let mut data = StmtData::new(StmtKind::Return);
        if let Some(v) = value {
            data.children = vec![v];
        }
        Some(self.make_stmt(node, StmtKind::Return, data))
    }

    fn visit_break(&mut self, node: Node<'s>) -> Option<PeRef> {
        let label = self.child_by_field_or_kind(node, "label", &["identifier"]).map(|n| self.src.text_of(n).to_string());
        let mut data = StmtData::new(StmtKind::Break);
        data.label = label;
        Some(self.make_stmt(node, StmtKind::Break, data))
    }

    fn visit_continue(&mut self, node: Node<'s>) -> Option<PeRef> {
        let label = self.child_by_field_or_kind(node, "label", &["identifier"]).map(|n| self.src.text_of(n).to_string());
        let mut data = StmtData::new(StmtKind::Continue);
        data.label = label;
        Some(self.make_stmt(node, StmtKind::Continue, data))
    }

    fn visit_throw(&mut self, node: Node<'s>) -> Option<PeRef> {
        let mut cursor = node.walk();
        let value = node
            .children(&mut cursor)
            .find(|c| c.kind() != "throw" && c.kind() != ";")
            .and_then(|n| self.visit_single(n));
        let mut data = StmtData::new(StmtKind::Throw);
        if let Some(v) = value {
            data.children = vec![v];
        }
        Some(self.make_stmt(node, StmtKind::Throw, data))
    }

    fn visit_assert(&mut self, node: Node<'s>) -> Option<PeRef> {
        let mut cursor = node.walk();
        let children = self.visit_many(
            node.children(&mut cursor)
                .filter(|c| c.kind() != "assert" && c.kind() != ";" && c.kind() != ":"),
        );
        Some(self.make_stmt(node, StmtKind::Assert, StmtData {
            children,
            ..Default::default()
        }))
    }

    fn visit_labeled(&mut self, node: Node<'s>) -> Option<PeRef> {
        let label = self.child_by_field_or_kind(node, "label", &["identifier"]).map(|n| self.src.text_of(n).to_string());
        let mut cursor = node.walk();
        let inner = node.children(&mut cursor).find(|c| c.kind() != "identifier" && c.kind() != ":")?;
        let stmt = self.visit_single(inner)?;
        if let PeKind::Statement(s) = &mut stmt.borrow_mut().kind {
            s.label = label;
        }
        Some(stmt)
    }

    fn visit_try(&mut self, node: Node<'s>) -> Option<PeRef> {
        let body_node = self.child_by_field_or_kind(node, "body", &["block"])?;
        let body = self.body_from(body_node);

        let mut catch_clauses = Vec::new();
        for catch in self.children_by_kind(node, "catch_clause") {
            let cbody = match self.child_by_field_or_kind(catch, "body", &["block"]) {
                Some(b) => self.body_from(b),
                None => Vec::new(),
            };
            let catch_pe = self.make_stmt(catch, StmtKind::Catch, StmtData {
                body: cbody,
                ..Default::default()
            });
            catch_clauses.push(catch_pe);
        }

        let finally_body = match self.children_by_kind(node, "finally_clause").into_iter().next() {
            Some(f) => match self.child_by_field_or_kind(f, "body", &["block"]) {
                Some(b) => self.body_from(b),
                None => Vec::new(),
            },
            None => Vec::new(),
        };

        Some(self.make_stmt(node, StmtKind::Try, StmtData {
            body,
            catch_clauses,
            finally_body,
            ..Default::default()
        }))
    }

    fn visit_switch(&mut self, node: Node<'s>) -> Option<PeRef> {
        let cond_paren = self.child_by_field_or_kind(node, "condition", &["parenthesized_expression"])?;
        let cond = self.unwrap_condition(cond_paren)?;
        let body_node = self.child_by_field_or_kind(node, "body", &["switch_block"])?;
        let cases = self.visit_switch_block(body_node);
        let mut data = StmtData::new(StmtKind::Switch);
        data.condition = Some(cond);
        data.body = cases;
        Some(self.finish_conditional(node, data))
    }

    fn visit_switch_block(&mut self, node: Node<'s>) -> Vec<PeRef> {
        let mut cursor = node.walk();
        let mut cases = Vec::new();
        for group in node.children(&mut cursor) {
            let case_pe = match group.kind() {
                "switch_block_statement_group" => self.visit_switch_group(group),
                "switch_rule" => self.visit_switch_rule(group),
                _ => None,
            };
            if let Some(case_pe) = case_pe {
                cases.push(case_pe);
            }
        }
        cases
    }

    /// A classic `case X: stmts...` / `default: stmts...` group: labels and
    /// fall-through statements are flat siblings under the group node.
    fn visit_switch_group(&mut self, node: Node<'s>) -> Option<PeRef> {
        let mut cursor = node.walk();
        let mut is_default = false;
        let mut case_value = None;
        let mut body = Vec::new();
        for child in node.children(&mut cursor) {
            if child.kind() == "switch_label" {
                let text = self.src.text_of(child);
                if text.trim_start().starts_with("default") {
                    is_default = true;
                } else {
                    case_value = Some(text.trim_start_matches("case").trim().to_string());
                }
            } else if let Some(s) = self.visit_single(child) {
                set_statement(&mut body, s);
            }
        }
        let mut data = StmtData::new(StmtKind::Case);
        data.label = if is_default { Some("default".to_string()) } else { case_value };
        data.body = body;
        Some(self.make_stmt(node, StmtKind::Case, data))
    }

    /// An arrow-form `case X -> stmt;` / `case X -> { block }` rule; arrow
    /// rules don't fall through, but are modeled as a `Case` the same way
    /// so downstream CFG/PDG composition doesn't need a second shape.
    fn visit_switch_rule(&mut self, node: Node<'s>) -> Option<PeRef> {
        let mut cursor = node.walk();
        let mut is_default = false;
        let mut case_value = None;
        let mut body = Vec::new();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "switch_label" => {
                    let text = self.src.text_of(child);
                    if text.trim_start().starts_with("default") {
                        is_default = true;
                    } else {
                        case_value = Some(text.trim_start_matches("case").trim().to_string());
                    }
                }
                "block" => body = self.body_from(child),
                _ if child.is_named() => {
                    if let Some(s) = self.visit_single(child) {
                        let is_stmt = matches!(s.borrow().kind, PeKind::Statement(_));
                        if is_stmt {
                            set_statement(&mut body, s);
                        } else {
                            let wrapped = self.make_stmt(child, StmtKind::Expression, StmtData {
                                children: vec![s],
                                ..Default::default()
                            });
                            body.push(wrapped);
                        }
                    }
                }
                _ => {}
            }
        }
        let mut data = StmtData::new(StmtKind::Case);
        data.label = if is_default { Some("default".to_string()) } else { case_value };
        data.body = body;
        Some(self.make_stmt(node, StmtKind::Case, data))
    }

    fn visit_synchronized(&mut self, node: Node<'s>) -> Option<PeRef> {
        let body_node = self.child_by_field_or_kind(node, "body", &["block"])?;
        let body = self.body_from(body_node);
        Some(self.make_stmt(node, StmtKind::Synchronized, StmtData {
            body,
            ..Default::default()
        }))
    }

    fn visit_assignment(&mut self, node: Node<'s>) -> Option<PeRef> {
        let lhs_node = self.child_by_field_or_kind(node, "left", &[])?;
        let op_node = self.child_by_field_or_kind(node, "operator", &[])?;
        let rhs_node = self.child_by_field_or_kind(node, "right", &[])?;
        let lhs = self.visit_single(lhs_node)?;
        let rhs = self.visit_single(rhs_node)?;
        let op = self.arena.make(
            PeKind::Operator { token: self.src.text_of(op_node).to_string() },
            self.src.start_line(op_node),
            self.src.end_line(op_node),
            self.src.text_of(op_node),
        );
        let mut data = ExprData::new(ExprKind::Assignment);
        data.children = vec![lhs, op, rhs];
        Some(self.make_expr(node, ExprKind::Assignment, data))
    }

    fn visit_infix(&mut self, node: Node<'s>) -> Option<PeRef> {
        let left = self.child_by_field_or_kind(node, "left", &[]).and_then(|n| self.visit_single(n))?;
        let right = self.child_by_field_or_kind(node, "right", &[]).and_then(|n| self.visit_single(n))?;
        let mut data = ExprData::new(ExprKind::Infix);
        data.children = vec![left, right];
        Some(self.make_expr(node, ExprKind::Infix, data))
    }

    fn visit_instanceof(&mut self, node: Node<'s>) -> Option<PeRef> {
        let left = self.child_by_field_or_kind(node, "left", &[]).and_then(|n| self.visit_single(n))?;
        let mut data = ExprData::new(ExprKind::Instanceof);
        data.children = vec![left];
        Some(self.make_expr(node, ExprKind::Instanceof, data))
    }

    fn visit_postfix(&mut self, node: Node<'s>) -> Option<PeRef> {
        let operand = self.child_by_field_or_kind(node, "operand", &[]).and_then(|n| self.visit_single(n))?;
        let mut data = ExprData::new(ExprKind::Postfix);
        data.children = vec![operand];
        Some(self.make_expr(node, ExprKind::Postfix, data))
    }

    fn visit_prefix(&mut self, node: Node<'s>) -> Option<PeRef> {
        let mut cursor = node.walk();
        let op_node = node.children(&mut cursor).find(|c| !c.is_named())?;
        let operand_node = self.child_by_field_or_kind(node, "operand", &[])?;
        let operand = self.visit_single(operand_node)?;
        let op = self.arena.make(
            PeKind::Operator { token: self.src.text_of(op_node).to_string() },
            self.src.start_line(op_node),
            self.src.end_line(op_node),
            self.src.text_of(op_node),
        );
        let mut data = ExprData::new(ExprKind::Prefix);
        data.children = vec![op, operand];
        Some(self.make_expr(node, ExprKind::Prefix, data))
    }

    fn visit_parenthesized(&mut self, node: Node<'s>) -> Option<PeRef> {
        let inner = self.unwrap_condition(node)?;
        let mut data = ExprData::new(ExprKind::Parenthesized);
        data.children = vec![inner];
        Some(self.make_expr(node, ExprKind::Parenthesized, data))
    }

    fn visit_method_invocation(&mut self, node: Node<'s>) -> Option<PeRef> {
        let name_node = self.child_by_field_or_kind(node, "name", &["identifier"])?;
        let method_name = self.src.text_of(name_node).to_string();
        let qualifier = self
            .child_by_field_or_kind(node, "object", &[])
            .and_then(|n| self.visit_single(n));
        let args = self
            .child_by_field_or_kind(node, "arguments", &["argument_list"])
            .map(|args_node| {
                let mut cursor = args_node.walk();
                self.visit_many(args_node.children(&mut cursor).filter(|c| c.is_named()))
            })
            .unwrap_or_default();

        let mut data = ExprData::new(ExprKind::MethodInvocation);
        data.qualifier = qualifier;
        data.resolved_name = Some(method_name);
        data.children = args;
        Some(self.make_expr(node, ExprKind::MethodInvocation, data))
    }

    fn visit_field_access(&mut self, node: Node<'s>) -> Option<PeRef> {
        let object = self.child_by_field_or_kind(node, "object", &[]).and_then(|n| self.visit_single(n))?;
        let mut data = ExprData::new(ExprKind::FieldAccess);
        data.qualifier = Some(object);
        Some(self.make_expr(node, ExprKind::FieldAccess, data))
    }

    fn visit_array_access(&mut self, node: Node<'s>) -> Option<PeRef> {
        let array = self.child_by_field_or_kind(node, "array", &[]).and_then(|n| self.visit_single(n))?;
        let index = self.child_by_field_or_kind(node, "index", &[]).and_then(|n| self.visit_single(n));
        let mut data = ExprData::new(ExprKind::ArrayAccess);
        data.children = vec![array];
        if let Some(index) = index {
            data.children.push(index);
        }
        Some(self.make_expr(node, ExprKind::ArrayAccess, data))
    }

    fn visit_object_creation(&mut self, node: Node<'s>) -> Option<PeRef> {
        let args = self
            .child_by_field_or_kind(node, "arguments", &["argument_list"])
            .map(|args_node| {
                let mut cursor = args_node.walk();
                self.visit_many(args_node.children(&mut cursor).filter(|c| c.is_named()))
            })
            .unwrap_or_default();
        let mut data = ExprData::new(ExprKind::ClassInstanceCreation);
        data.children = args;
        Some(self.make_expr(node, ExprKind::ClassInstanceCreation, data))
    }

    fn visit_cast(&mut self, node: Node<'s>) -> Option<PeRef> {
        let value = self.child_by_field_or_kind(node, "value", &[]).and_then(|n| self.visit_single(n))?;
        let mut data = ExprData::new(ExprKind::Cast);
        data.children = vec![value];
        Some(self.make_expr(node, ExprKind::Cast, data))
    }

    fn visit_ternary(&mut self, node: Node<'s>) -> Option<PeRef> {
        let cond = self.child_by_field_or_kind(node, "condition", &[]).and_then(|n| self.visit_single(n))?;
        let cons = self.child_by_field_or_kind(node, "consequence", &[]).and_then(|n| self.visit_single(n))?;
        let alt = self.child_by_field_or_kind(node, "alternative", &[]).and_then(|n| self.visit_single(n))?;
        let mut data = ExprData::new(ExprKind::Trinomial);
        data.children = vec![cond, cons, alt];
        Some(self.make_expr(node, ExprKind::Trinomial, data))
    }

    fn visit_lambda(&mut self, node: Node<'s>) -> Option<PeRef> {
        let body_node = self.child_by_field_or_kind(node, "body", &[])?;
        let is_block = body_node.kind() == "block";
        let (body, expr_body) = if is_block {
            (self.body_from(body_node), None)
        } else {
            (Vec::new(), self.visit_single(body_node))
        };
        let pe = self.arena.make(
            PeKind::Method(MethodData {
                name: None,
                params: Vec::new(),
                body,
                is_lambda: true,
                expression_body: expr_body,
            }),
            self.src.start_line(node),
            self.src.end_line(node),
            self.src.text_of(node),
        );
        Some(pe)
    }

    fn visit_simple_name(&mut self, node: Node<'s>) -> PeRef {
        self.make_expr(node, ExprKind::SimpleName, ExprData::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::TreeSitterAnalyzer;

    fn build(source: &str) -> BuildResult {
        let analyzer = TreeSitterAnalyzer::new().unwrap();
        let ast = analyzer.parse(source, "T.java").unwrap();
        AstToPeBuilder::new(&ast).build()
    }

    #[test]
    fn finds_one_class_with_one_method() {
        let result = build("class A { void f(int x) { return; } }");
        assert_eq!(result.classes.len(), 1);
        let class = &result.classes[0];
        match &class.borrow().kind {
            PeKind::Class(c) => assert_eq!(c.methods.len(), 1),
            _ => panic!("expected class"),
        };
    }

    #[test]
    fn method_parameters_are_captured() {
        let result = build("class A { void f(int x, int y) {} }");
        let class = &result.classes[0];
        let method = match &class.borrow().kind {
            PeKind::Class(c) => c.methods[0].clone(),
            _ => panic!(),
        };
        match &method.borrow().kind {
            PeKind::Method(m) => assert_eq!(m.params.len(), 2),
            _ => panic!("expected method"),
        };
    }

    #[test]
    fn if_statement_sets_owner_conditional_block() {
        let result = build("class A { void f(boolean c) { if (c) { } } }");
        let class = &result.classes[0];
        let method = match &class.borrow().kind {
            PeKind::Class(cd) => cd.methods[0].clone(),
            _ => panic!(),
        };
        let if_stmt = match &method.borrow().kind {
            PeKind::Method(m) => m.body[0].clone(),
            _ => panic!(),
        };
        let cond = match &if_stmt.borrow().kind {
            PeKind::Statement(s) => s.condition.clone().unwrap(),
            _ => panic!("expected if statement"),
        };
        assert!(cond.borrow().owner_conditional_block.is_some());
    }

    #[test]
    fn safe_stack_tolerates_unsupported_top_level_construct() {
        // interface_declaration is not in the supported dispatch set;
        // the class alongside it must still be found.
        let result = build("interface I {} class A { void f() {} }");
        assert_eq!(result.classes.len(), 1);
    }
}
