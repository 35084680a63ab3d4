//! Graph services (component C7): identity-coalescing node factories and
//! reachability, shared by the CFG and PDG builders.

use crate::pe::PeId;
use std::collections::HashMap;

/// Coalesces PE ids into stable node indices, keeping normal-role and
/// control-role mappings distinct so a single PE can have at most one
/// node of each role (spec §4.6).
#[derive(Debug, Default)]
pub struct NodeFactory {
    normal: HashMap<PeId, usize>,
    control: HashMap<PeId, usize>,
}

impl NodeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached index for `pe_id` in the normal role, or calls
    /// `make` to create one and caches it.
    pub fn make_normal_node(&mut self, pe_id: PeId, make: impl FnOnce() -> usize) -> usize {
        if let Some(&idx) = self.normal.get(&pe_id) {
            return idx;
        }
        let idx = make();
        self.normal.insert(pe_id, idx);
        idx
    }

    /// Returns the cached index for `pe_id` in the control role, or calls
    /// `make` to create one and caches it.
    pub fn make_control_node(&mut self, pe_id: PeId, make: impl FnOnce() -> usize) -> usize {
        if let Some(&idx) = self.control.get(&pe_id) {
            return idx;
        }
        let idx = make();
        self.control.insert(pe_id, idx);
        idx
    }

    /// Looks up a cached node without creating one.
    pub fn get_normal(&self, pe_id: PeId) -> Option<usize> {
        self.normal.get(&pe_id).copied()
    }

    pub fn get_control(&self, pe_id: PeId) -> Option<usize> {
        self.control.get(&pe_id).copied()
    }

    /// Removes the mapping for `pe_id` in both roles. Does not clean up
    /// edges referencing the removed index — callers using this for the
    /// optional CFG trimming passes are responsible for edge consistency.
    pub fn remove(&mut self, pe_id: PeId) {
        self.normal.remove(&pe_id);
        self.control.remove(&pe_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_requests_for_same_pe_coalesce() {
        let mut factory = NodeFactory::new();
        let mut counter = 0usize;
        let a = factory.make_normal_node(7, || {
            counter += 1;
            counter
        });
        let b = factory.make_normal_node(7, || {
            counter += 1;
            counter
        });
        assert_eq!(a, b);
        assert_eq!(counter, 1);
    }

    #[test]
    fn normal_and_control_roles_are_independent() {
        let mut factory = NodeFactory::new();
        let normal = factory.make_normal_node(3, || 10);
        let control = factory.make_control_node(3, || 20);
        assert_ne!(normal, control);
        assert_eq!(factory.get_normal(3), Some(10));
        assert_eq!(factory.get_control(3), Some(20));
    }

    #[test]
    fn remove_clears_both_roles() {
        let mut factory = NodeFactory::new();
        factory.make_normal_node(1, || 0);
        factory.make_control_node(1, || 1);
        factory.remove(1);
        assert_eq!(factory.get_normal(1), None);
        assert_eq!(factory.get_control(1), None);
    }
}
