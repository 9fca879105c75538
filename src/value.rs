//!
//! # value
//!
//! `Value` is a cheap, copyable handle to a node in a `Graph`. Every operation
//! computes its forward result eagerly and records an `Op` tag plus operand
//! ids; the backward rule is selected from that tag later on.
//!

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::ptr;

use smallvec::{smallvec, SmallVec};

use crate::error::{GradError, Result};
use crate::graph::{Graph, NodeId, Op};

/// Anything an operation accepts on its right-hand side: a node, or a plain
/// scalar that gets lifted into a fresh leaf.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'g> {
  Scalar(f64),
  Node(Value<'g>),
}

impl<'g> Operand<'g> {
  /// Forward value, without touching the graph
  #[inline]
  pub fn data(&self) -> f64 {
    match self {
      Operand::Scalar(x) => *x,
      Operand::Node(v) => v.data(),
    }
  }

  /// Turn this operand into a node of `graph`, pushing a leaf for scalars
  ///
  /// # Panics
  ///
  /// If the operand is a node of another graph; handles of different graphs
  /// never mix.
  #[inline]
  pub fn lift(self, graph: &'g Graph) -> Value<'g> {
    match self {
      Operand::Scalar(x) => graph.leaf(x),
      Operand::Node(v) => {
        assert!(
          ptr::eq(v.graph, graph),
          "operands belong to different graphs"
        );
        v
      }
    }
  }
}

impl From<f64> for Operand<'_> {
  #[inline(always)]
  fn from(x: f64) -> Self {
    Operand::Scalar(x)
  }
}

impl<'g> From<Value<'g>> for Operand<'g> {
  #[inline(always)]
  fn from(v: Value<'g>) -> Self {
    Operand::Node(v)
  }
}

impl<'g> From<&Value<'g>> for Operand<'g> {
  #[inline(always)]
  fn from(v: &Value<'g>) -> Self {
    Operand::Node(*v)
  }
}

/// Handle to a scalar node; copying the handle never copies the node.
#[derive(Clone, Copy)]
pub struct Value<'g> {
  id: NodeId,
  graph: &'g Graph,
}

impl<'g> Value<'g> {
  #[inline(always)]
  pub(crate) fn new(id: NodeId, graph: &'g Graph) -> Self {
    Self { id, graph }
  }

  #[inline(always)]
  pub fn id(&self) -> NodeId {
    self.id
  }

  #[inline(always)]
  pub fn graph(&self) -> &'g Graph {
    self.graph
  }

  /// Forward value
  #[inline]
  pub fn data(&self) -> f64 {
    self.graph.read(self.id, |n| n.data)
  }

  /// Accumulated derivative of the last differentiated root(s) w.r.t. this node
  #[inline]
  pub fn grad(&self) -> f64 {
    self.graph.read(self.id, |n| n.grad)
  }

  #[inline]
  pub fn op(&self) -> Op {
    self.graph.read(self.id, |n| n.op)
  }

  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.op() == Op::Leaf
  }

  pub fn operands(&self) -> SmallVec<[Value<'g>; 2]> {
    let graph = self.graph;
    graph.read(self.id, |n| {
      n.operands.iter().map(|&id| Value::new(id, graph)).collect()
    })
  }

  pub fn label(&self) -> Option<String> {
    self.graph.read(self.id, |n| n.label.clone())
  }

  pub fn set_label(&self, label: impl Into<String>) {
    let label = label.into();
    self.graph.write(self.id, |n| n.label = Some(label));
  }

  #[inline]
  pub fn with_label(self, label: impl Into<String>) -> Self {
    self.set_label(label);
    self
  }

  /// Replace the value of a leaf (parameter updates between training steps).
  ///
  /// Interior nodes are a pure function of their operands and refuse this.
  pub fn set_data(&self, data: f64) -> Result<()> {
    self.graph.write(self.id, |n| {
      if n.op != Op::Leaf {
        return Err(GradError::NotALeaf { node: self.id });
      }
      n.data = data;
      Ok(())
    })
  }

  pub fn zero_grad(&self) {
    self.graph.write(self.id, |n| n.grad = 0.0);
  }

  /// Identity comparison; `==` only compares forward values
  #[inline]
  pub fn same_node(&self, other: &Value<'_>) -> bool {
    self.id == other.id && ptr::eq(self.graph, other.graph)
  }

  #[inline]
  fn unary(self, data: f64, op: Op) -> Value<'g> {
    self.graph.push(data, op, smallvec![self.id])
  }

  #[inline]
  fn binary(self, rhs: Value<'g>, data: f64, op: Op) -> Value<'g> {
    self.graph.push(data, op, smallvec![self.id, rhs.id])
  }

  /// `self + rhs`
  ///
  /// # Panics
  ///
  /// If `rhs` is a node of another graph.
  #[inline]
  pub fn add(self, rhs: impl Into<Operand<'g>>) -> Value<'g> {
    let rhs = rhs.into().lift(self.graph);
    self.binary(rhs, self.data() + rhs.data(), Op::Add)
  }

  /// `self * rhs`
  ///
  /// # Panics
  ///
  /// If `rhs` is a node of another graph.
  #[inline]
  pub fn mul(self, rhs: impl Into<Operand<'g>>) -> Value<'g> {
    let rhs = rhs.into().lift(self.graph);
    self.binary(rhs, self.data() * rhs.data(), Op::Mul)
  }

  /// Power by a constant exponent
  #[inline]
  pub fn powf(self, k: f64) -> Value<'g> {
    self.unary(self.data().powf(k), Op::PowScalar(k))
  }

  /// Power with the exponent given as an operand; it must be a plain scalar,
  /// node valued exponents are rejected before anything is built.
  pub fn pow(self, exponent: impl Into<Operand<'g>>) -> Result<Value<'g>> {
    match exponent.into() {
      Operand::Scalar(k) => Ok(self.powf(k)),
      Operand::Node(v) => Err(GradError::InvalidOperand { node: v.id }),
    }
  }

  #[inline]
  pub fn tanh(self) -> Value<'g> {
    self.unary(self.data().tanh(), Op::Tanh)
  }

  #[inline]
  pub fn exp(self) -> Value<'g> {
    self.unary(self.data().exp(), Op::Exp)
  }

  /// `self * -1`
  #[inline]
  pub fn neg(self) -> Value<'g> {
    self.mul(-1.0)
  }

  /// `self + (-rhs)`
  ///
  /// # Panics
  ///
  /// If `rhs` is a node of another graph.
  #[inline]
  pub fn sub(self, rhs: impl Into<Operand<'g>>) -> Value<'g> {
    let rhs = rhs.into().lift(self.graph);
    self.add(rhs.neg())
  }

  /// `self * rhs**-1`, refusing an exactly zero denominator up front
  ///
  /// # Panics
  ///
  /// If `rhs` is a node of another graph.
  pub fn div(self, rhs: impl Into<Operand<'g>>) -> Result<Value<'g>> {
    let rhs = rhs.into();
    if rhs.data() == 0.0 {
      return Err(GradError::DivisionByZero);
    }
    let recip = rhs.lift(self.graph).powf(-1.0);
    Ok(self.mul(recip))
  }

  /// `numerator / self`, the division with `self` as the denominator; lets a
  /// plain scalar sit on the left, as in `x.rdiv(2.0)` for `2 / x`
  ///
  /// # Panics
  ///
  /// If `numerator` is a node of another graph.
  pub fn rdiv(self, numerator: impl Into<Operand<'g>>) -> Result<Value<'g>> {
    if self.data() == 0.0 {
      return Err(GradError::DivisionByZero);
    }
    let numerator = numerator.into().lift(self.graph);
    Ok(numerator.mul(self.powf(-1.0)))
  }
}

impl fmt::Debug for Value<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.graph.read(self.id, |n| {
      f.debug_struct("Value")
        .field("id", &self.id)
        .field("data", &n.data)
        .field("grad", &n.grad)
        .field("op", &n.op)
        .field("label", &n.label)
        .finish()
    })
  }
}

impl fmt::Display for Value<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Value(data={}, grad={})", self.data(), self.grad())
  }
}

impl PartialEq for Value<'_> {
  fn eq(&self, other: &Self) -> bool {
    self.data() == other.data()
  }
}

impl PartialEq<f64> for Value<'_> {
  fn eq(&self, other: &f64) -> bool {
    self.data() == *other
  }
}

impl PartialOrd for Value<'_> {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    self.data().partial_cmp(&other.data())
  }
}

impl PartialOrd<f64> for Value<'_> {
  fn partial_cmp(&self, other: &f64) -> Option<Ordering> {
    self.data().partial_cmp(other)
  }
}

// operator sugar over the surface above, for every owned/borrowed pairing with
// nodes and scalars; a scalar on the left is lifted first. Like the methods,
// these panic when the two sides belong to different graphs...
macro_rules! binary_op {
  ($trait:ident, $method:ident) => {
    impl<'g, R: Into<Operand<'g>>> $trait<R> for Value<'g> {
      type Output = Value<'g>;

      #[inline(always)]
      fn $method(self, rhs: R) -> Self::Output {
        Value::$method(self, rhs)
      }
    }

    impl<'g, R: Into<Operand<'g>>> $trait<R> for &Value<'g> {
      type Output = Value<'g>;

      #[inline(always)]
      fn $method(self, rhs: R) -> Self::Output {
        Value::$method(*self, rhs)
      }
    }

    impl<'g> $trait<Value<'g>> for f64 {
      type Output = Value<'g>;

      #[inline(always)]
      fn $method(self, rhs: Value<'g>) -> Self::Output {
        Value::$method(rhs.graph.leaf(self), rhs)
      }
    }

    impl<'g> $trait<&Value<'g>> for f64 {
      type Output = Value<'g>;

      #[inline(always)]
      fn $method(self, rhs: &Value<'g>) -> Self::Output {
        Value::$method(rhs.graph.leaf(self), *rhs)
      }
    }
  };
}

binary_op!(Add, add);
binary_op!(Sub, sub);
binary_op!(Mul, mul);

impl<'g> Neg for Value<'g> {
  type Output = Value<'g>;

  #[inline(always)]
  fn neg(self) -> Self::Output {
    Value::neg(self)
  }
}

impl<'g> Neg for &Value<'g> {
  type Output = Value<'g>;

  #[inline(always)]
  fn neg(self) -> Self::Output {
    Value::neg(*self)
  }
}
