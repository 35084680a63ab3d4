//! Lexical scope tree and variable identities (spec §3/§4.1, component C2).

use super::PeRef;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

/// A variable identity: a main name plus an alias set (e.g. `this.source`
/// and `source` may name the same `Var`).
#[derive(Debug, Clone)]
pub struct Var {
    pub scope: Weak<RefCell<Scope>>,
    pub main_name: String,
    pub alias_set: BTreeSet<String>,
}

impl Var {
    pub fn new(scope: &Rc<RefCell<Scope>>, main_name: impl Into<String>) -> Self {
        let main_name = main_name.into();
        let mut alias_set = BTreeSet::new();
        alias_set.insert(main_name.clone());
        Self {
            scope: Rc::downgrade(scope),
            main_name,
            alias_set,
        }
    }

    pub fn add_alias(&mut self, alias: impl Into<String>) {
        self.alias_set.insert(alias.into());
    }

    pub fn has_alias(&self, name: &str) -> bool {
        self.alias_set.contains(name)
    }
}

/// A lexical scope: owns a set of `Var`s unique by main name, with a
/// parent pointer forming a tree.
#[derive(Debug)]
pub struct Scope {
    pub owner_block: Option<PeRef>,
    pub parent: Option<Rc<RefCell<Scope>>>,
    pub variables: Vec<Rc<RefCell<Var>>>,
}

impl Scope {
    pub fn root(owner_block: Option<PeRef>) -> Rc<RefCell<Scope>> {
        Rc::new(RefCell::new(Scope {
            owner_block,
            parent: None,
            variables: Vec::new(),
        }))
    }

    pub fn child(parent: &Rc<RefCell<Scope>>, owner_block: Option<PeRef>) -> Rc<RefCell<Scope>> {
        Rc::new(RefCell::new(Scope {
            owner_block,
            parent: Some(Rc::clone(parent)),
            variables: Vec::new(),
        }))
    }
}

/// Adds `main_name` to `scope` if no variable with that main name already
/// exists there. Returns `false` (no-op) on a duplicate, mirroring the
/// spec's "add is a no-op" rule.
pub fn add_variable(scope: &Rc<RefCell<Scope>>, main_name: impl Into<String>) -> bool {
    let main_name = main_name.into();
    let mut s = scope.borrow_mut();
    if s.variables
        .iter()
        .any(|v| v.borrow().main_name == main_name)
    {
        return false;
    }
    s.variables.push(Rc::new(RefCell::new(Var::new(scope, main_name))));
    true
}

/// Does `name` resolve directly within this scope (no parent walk)?
pub fn has_variable_directly(scope: &Rc<RefCell<Scope>>, name: &str) -> bool {
    scope
        .borrow()
        .variables
        .iter()
        .any(|v| v.borrow().has_alias(name))
}

/// Walks the parent chain, returning the innermost scope whose alias set
/// contains `name`, or `None`.
pub fn search_variable(
    scope: &Rc<RefCell<Scope>>,
    name: &str,
) -> Option<Rc<RefCell<Scope>>> {
    if has_variable_directly(scope, name) {
        return Some(Rc::clone(scope));
    }
    let parent = scope.borrow().parent.clone();
    match parent {
        Some(p) => search_variable(&p, name),
        None => None,
    }
}

/// Does `name` resolve anywhere in the scope chain?
pub fn has_variable(scope: &Rc<RefCell<Scope>>, name: &str) -> bool {
    search_variable(scope, name).is_some()
}
