//! CFG builder (component C5): translates a method's PE statements into
//! an explicit control-flow graph, per spec §4.4.

pub mod builder;
pub mod types;

pub use builder::CfgBuilder;
pub use types::{Cfg, CfgNode, CfgNodeKind, EdgeKind, EdgeRef, NodeIndex};
