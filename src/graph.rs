//!
//! Arena storage for the computation graph.
//!
//! A `Graph` is a flat Wengert list: nodes are only ever appended, and every
//! operand edge points at an index that already existed when the node was
//! pushed, so the operand relation can never form a cycle...
//!

use std::cell::{Ref, RefCell};
use std::fmt;

use log::trace;
use smallvec::SmallVec;

use crate::value::Value;

/// Stable identity of a node inside its graph.
///
/// Traversal and sharing key on this, never on the node's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
  #[inline(always)]
  pub fn index(&self) -> usize {
    self.0
  }
}

impl fmt::Display for NodeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// The operation that produced a node; selects its backward rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
  Leaf,
  Add,
  Mul,
  /// Power by a constant scalar exponent
  PowScalar(f64),
  Tanh,
  Exp,
}

impl Op {
  /// Number of operands a node of this kind must carry
  #[inline]
  pub fn arity(&self) -> usize {
    match self {
      Op::Leaf => 0,
      Op::Add | Op::Mul => 2,
      Op::PowScalar(_) | Op::Tanh | Op::Exp => 1,
    }
  }
}

impl fmt::Display for Op {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Op::Leaf => Ok(()),
      Op::Add => f.write_str("+"),
      Op::Mul => f.write_str("*"),
      Op::PowScalar(k) => write!(f, "**{k}"),
      Op::Tanh => f.write_str("tanh"),
      Op::Exp => f.write_str("exp"),
    }
  }
}

pub(crate) type Operands = SmallVec<[NodeId; 2]>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Node {
  pub(crate) data: f64,
  pub(crate) grad: f64,
  pub(crate) op: Op,
  pub(crate) operands: Operands,
  pub(crate) label: Option<String>,
}

/// Owner of every node built through the arithmetic surface.
///
/// Handles (`Value`) borrow the graph, so `clear` can only run once no handle
/// is alive.
#[derive(Debug, Default)]
pub struct Graph {
  nodes: RefCell<Vec<Node>>,
}

impl Graph {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      nodes: RefCell::new(Vec::with_capacity(capacity)),
    }
  }

  /// Create an input or constant node
  #[inline]
  pub fn leaf(&self, data: f64) -> Value<'_> {
    self.push(data, Op::Leaf, Operands::new())
  }

  /// Number of nodes built so far
  pub fn len(&self) -> usize {
    self.nodes.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.borrow().is_empty()
  }

  /// Reset the gradient of every node in the graph to 0.0
  pub fn zero_grad(&self) {
    for node in self.nodes.borrow_mut().iter_mut() {
      node.grad = 0.0;
    }
  }

  /// Drop every node; needs exclusive access, so no handle can outlive this
  pub fn clear(&mut self) {
    self.nodes.get_mut().clear();
  }

  #[inline]
  pub(crate) fn push(&self, data: f64, op: Op, operands: Operands) -> Value<'_> {
    let mut nodes = self.nodes.borrow_mut();
    let id = NodeId(nodes.len());
    trace!("push {id} op={op:?} data={data} operands={operands:?}");
    nodes.push(Node {
      data,
      grad: 0.0,
      op,
      operands,
      label: None,
    });
    Value::new(id, self)
  }

  #[inline]
  pub(crate) fn nodes(&self) -> Ref<'_, Vec<Node>> {
    self.nodes.borrow()
  }

  #[inline]
  pub(crate) fn read<R>(&self, id: NodeId, f: impl FnOnce(&Node) -> R) -> R {
    f(&self.nodes.borrow()[id.0])
  }

  #[inline]
  pub(crate) fn write<R>(&self, id: NodeId, f: impl FnOnce(&mut Node) -> R) -> R {
    f(&mut self.nodes.borrow_mut()[id.0])
  }

  /// Add one pass worth of adjoints into the stored gradients
  pub(crate) fn accumulate<I>(&self, deltas: I)
  where
    I: IntoIterator<Item = (NodeId, f64)>,
  {
    let mut nodes = self.nodes.borrow_mut();
    for (id, delta) in deltas {
      nodes[id.0].grad += delta;
    }
  }
}
