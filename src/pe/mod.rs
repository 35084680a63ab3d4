//! Property-Element (PE) tree: a normalized, category-tagged tree of
//! program elements with stable, monotonically assigned ids.

pub mod scope;

use std::cell::RefCell;
use std::rc::Rc;

pub type PeId = u32;
pub type PeRef = Rc<RefCell<Pe>>;

/// Variable category, distinguishing how a `Variable` PE was introduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarCategory {
    Field,
    Local,
    Parameter,
}

/// The ~30 expression categories named in the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprKind {
    ArrayAccess,
    ArrayCreation,
    ArrayInitializer,
    Assignment,
    Boolean,
    Cast,
    Character,
    ClassInstanceCreation,
    ConstructorInvocation,
    FieldAccess,
    Infix,
    Instanceof,
    MethodInvocation,
    Null,
    Number,
    Parenthesized,
    Postfix,
    Prefix,
    QualifiedName,
    SimpleName,
    String,
    SuperConstructorInvocation,
    SuperFieldAccess,
    SuperMethodInvocation,
    This,
    Trinomial,
    TypeLiteral,
    VariableDeclarationExpression,
    VariableDeclarationFragment,
    MethodEnter,
}

/// The statement categories named in the data model.
#[derive(Debug, Clone, Copy)]
pub enum StmtKind {
    Assert,
    Break,
    Case,
    Catch,
    Continue,
    Do,
    Empty,
    Expression,
    If,
    For,
    Foreach,
    Return,
    SimpleBlock,
    Synchronized,
    Switch,
    Throw,
    TypeDeclaration,
    Try,
    VariableDeclaration,
    While,
}

/// The tagged kinds a PE node may take. `Type`, `Operator`, and `Variable`
/// are terminal/near-terminal nodes; `Expression`, `Statement`, `Method`,
/// and `Class` carry the recursive structure.
#[derive(Debug, Clone)]
pub enum PeKind {
    Type { name: String },
    Operator { token: String },
    Variable { name: String, category: VarCategory },
    Expression(ExprData),
    Statement(StmtData),
    Method(MethodData),
    Class(ClassData),
}

#[derive(Debug, Clone, Default)]
pub struct ExprData {
    pub kind: Option<ExprKind>,
    pub children: Vec<PeRef>,
    pub qualifier: Option<PeRef>,
    pub anonymous_body: Option<PeRef>,
    /// Best-effort resolved API name for `MethodInvocation`, e.g. `size`.
    pub resolved_name: Option<String>,
}

impl ExprData {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StmtData {
    pub kind: Option<StmtKind>,
    pub owner_block: Option<PeRef>,
    pub condition: Option<PeRef>,
    pub children: Vec<PeRef>,
    pub initializers: Vec<PeRef>,
    pub updaters: Vec<PeRef>,
    pub body: Vec<PeRef>,
    pub else_body: Vec<PeRef>,
    pub catch_clauses: Vec<PeRef>,
    pub finally_body: Vec<PeRef>,
    pub label: Option<String>,
}

impl StmtData {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }
}

/// Collapses a `SimpleBlock` child into its statements, unless the block
/// is empty (invariant 4 of the data model). Used wherever a block-owning
/// field (`body`, `else_body`, `finally_body`) receives a new statement.
pub fn set_statement(field: &mut Vec<PeRef>, stmt: PeRef) {
    let is_empty_block = {
        let b = stmt.borrow();
        matches!(
            &b.kind,
            PeKind::Statement(s) if s.kind == Some(StmtKind::SimpleBlock) && s.body.is_empty()
        )
    };
    if is_empty_block {
        return;
    }
    let flattened = {
        let b = stmt.borrow();
        match &b.kind {
            PeKind::Statement(s) if s.kind == Some(StmtKind::SimpleBlock) => Some(s.body.clone()),
            _ => None,
        }
    };
    match flattened {
        Some(children) => field.extend(children),
        None => field.push(stmt),
    }
}

impl PartialEq for StmtKind {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}
impl Eq for StmtKind {}

#[derive(Debug, Clone, Default)]
pub struct MethodData {
    pub name: Option<String>,
    pub params: Vec<PeRef>,
    pub body: Vec<PeRef>,
    pub is_lambda: bool,
    pub expression_body: Option<PeRef>,
}

#[derive(Debug, Clone, Default)]
pub struct ClassData {
    pub name: Option<String>,
    pub methods: Vec<PeRef>,
}

/// A Property-Element node: id, kind, source span, rendered text, and
/// free-form modifiers. Equality and ordering are by id alone.
#[derive(Debug, Clone)]
pub struct Pe {
    pub id: PeId,
    pub kind: PeKind,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
    pub modifiers: Vec<String>,
    pub owner_conditional_block: Option<std::rc::Weak<RefCell<Pe>>>,
}

impl PartialEq for Pe {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Pe {}

impl PartialOrd for Pe {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Pe {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

/// Per-compilation-unit id allocator. Each parsed file owns its own
/// arena; ids are unique within the arena only (see DESIGN.md's
/// per-analysis-counter decision).
#[derive(Debug, Default)]
pub struct PeArena {
    next_id: PeId,
}

impl PeArena {
    pub fn new() -> Self {
        Self { next_id: 0 }
    }

    fn next(&mut self) -> PeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn make(&mut self, kind: PeKind, start_line: usize, end_line: usize, text: impl Into<String>) -> PeRef {
        Rc::new(RefCell::new(Pe {
            id: self.next(),
            kind,
            start_line,
            end_line,
            text: text.into(),
            modifiers: Vec::new(),
            owner_conditional_block: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_within_an_arena() {
        let mut arena = PeArena::new();
        let a = arena.make(PeKind::Type { name: "int".into() }, 1, 1, "int");
        let b = arena.make(PeKind::Type { name: "int".into() }, 2, 2, "int");
        assert!(a.borrow().id < b.borrow().id);
    }

    #[test]
    fn set_statement_flattens_nonempty_simple_block() {
        let mut arena = PeArena::new();
        let inner = arena.make(PeKind::Statement(StmtData::new(StmtKind::Expression)), 1, 1, "x;");
        let mut block_data = StmtData::new(StmtKind::SimpleBlock);
        block_data.body.push(inner.clone());
        let block = arena.make(PeKind::Statement(block_data), 1, 2, "{ x; }");

        let mut field = Vec::new();
        set_statement(&mut field, block);
        assert_eq!(field.len(), 1);
        assert_eq!(field[0].borrow().id, inner.borrow().id);
    }

    #[test]
    fn set_statement_drops_empty_simple_block() {
        let mut arena = PeArena::new();
        let block = arena.make(PeKind::Statement(StmtData::new(StmtKind::SimpleBlock)), 1, 1, "{}");
        let mut field = Vec::new();
        set_statement(&mut field, block);
        assert!(field.is_empty());
    }
}
