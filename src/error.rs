use thiserror::Error;

use crate::graph::{NodeId, Op};

/// Errors raised while building or differentiating a graph.
///
/// Every check is eager: a failing constructor returns before any node is
/// pushed, so the graph never holds a half-built node.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradError {
  #[error("invalid operand: exponent must be a plain scalar, got node {node}")]
  InvalidOperand { node: NodeId },

  #[error("division by zero: denominator evaluated to 0.0")]
  DivisionByZero,

  /// A non-leaf node whose operands do not fit its op; only reachable through
  /// a bug in graph construction.
  #[error("internal error: node {node} ({op:?}) has no backward rule for its operands")]
  MissingBackwardRule { node: NodeId, op: Op },

  #[error("node {node} is not a leaf, its value is fixed by its operands")]
  NotALeaf { node: NodeId },

  #[error("input width mismatch: expected {expected}, got {actual}")]
  InputWidth { expected: usize, actual: usize },
}

pub type Result<T, E = GradError> = std::result::Result<T, E>;
