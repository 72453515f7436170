//! Topology module - graph projection and algorithms over the access network

pub mod engine;
pub mod graph;
pub mod invariants;

pub use engine::{BlastRadius, Path, PathEngine, PathOutcome, Traversal};
pub use graph::{GraphEdge, GraphNode, TopologyGraph};
pub use invariants::{InvariantChecker, InvariantViolation, ViolationSeverity};
