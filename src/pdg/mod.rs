//! PDG builder (component C6): control, data, and execution dependence
//! edges layered over a method's CFG.

pub mod builder;
pub mod types;

pub use builder::PdgBuilder;
pub use types::{DependenceKind, Pdg, PdgEdge, PdgNode, PdgNodeIndex, PdgNodeKind};
