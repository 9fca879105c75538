//!
//! Reverse sweep over the subgraph reachable from a root.
//!
//! A pass works on its own adjoint map (like a tape's deltas) and only adds the
//! finished adjoints into the stored gradients at the end; so repeated passes
//! stack up linearly and a failing pass leaves every gradient untouched.
//!

use std::collections::HashMap;

use log::{debug, error, trace};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{GradError, Result};
use crate::graph::{Graph, Node, NodeId, Op};
use crate::value::Value;

impl<'g> Value<'g> {
  /// Add d(self)/d(node) into the gradient of every node reachable from self.
  ///
  /// Gradients are never reset here; zero them between passes if needed.
  ///
  /// # Panics
  ///
  /// On a malformed node (see [`GradError::MissingBackwardRule`]), which the
  /// arithmetic surface never builds.
  pub fn backward(&self) {
    if let Err(err) = self.try_backward() {
      error!("backward pass from {} aborted: {err}", self.id());
      panic!("{err}");
    }
  }

  /// Same as [`Value::backward`], reporting a malformed graph as an error
  pub fn try_backward(&self) -> Result<()> {
    let graph = self.graph();
    let order = topological_order(graph, self.id());

    let deltas = {
      let nodes = graph.nodes();
      let mut deltas: FxHashMap<NodeId, f64> =
        HashMap::with_capacity_and_hasher(order.len(), Default::default());
      // seed d(root)/d(root)
      deltas.insert(self.id(), 1.0);

      for &id in order.iter().rev() {
        // read phase; every reachable node has an entry by the time it is seen
        let upstream = match deltas.get(&id) {
          Some(&g) => g,
          None => continue,
        };
        pullback(&nodes, id, upstream, &mut deltas)?;
      }
      deltas
    };

    debug!(
      "backward from {}: {} nodes reached, {} adjoints",
      self.id(),
      order.len(),
      deltas.len()
    );
    graph.accumulate(deltas);
    Ok(())
  }
}

/// Postorder of every node reachable from `root` along operand edges: each node
/// lands after all of its operands, the first operand explored before the second.
pub(crate) fn topological_order(graph: &Graph, root: NodeId) -> Vec<NodeId> {
  let nodes = graph.nodes();

  let mut stack = Vec::with_capacity(64);
  let mut order = Vec::new();
  let mut visited = FxHashSet::default();

  stack.push((root, false));

  // explicit stack so long chains cannot blow the call stack...
  while let Some((id, operands_done)) = stack.pop() {
    if operands_done {
      order.push(id);
    } else if visited.insert(id) {
      // marker to emit the node once its operands are done
      stack.push((id, true));
      for &operand in nodes[id.index()].operands.iter().rev() {
        if !visited.contains(&operand) {
          stack.push((operand, false));
        }
      }
    }
  }

  order
}

/// Apply the rule of node `id` to its adjoint `upstream`, adding the results
/// into its operands' adjoints
fn pullback(
  nodes: &[Node],
  id: NodeId,
  upstream: f64,
  deltas: &mut FxHashMap<NodeId, f64>,
) -> Result<()> {
  let node = &nodes[id.index()];
  let data = |operand: NodeId| nodes[operand.index()].data;
  let mut emit = |operand: NodeId, grad: f64| {
    *deltas.entry(operand).or_insert(0.0) += grad;
  };

  match (node.op, node.operands.as_slice()) {
    (Op::Leaf, []) => {}
    (Op::Add, &[a, b]) => {
      emit(a, upstream);
      emit(b, upstream);
    }
    (Op::Mul, &[a, b]) => {
      emit(a, data(b) * upstream);
      emit(b, data(a) * upstream);
    }
    (Op::PowScalar(k), &[a]) => emit(a, k * data(a).powf(k - 1.0) * upstream),
    (Op::Tanh, &[a]) => emit(a, (1.0 - node.data * node.data) * upstream),
    (Op::Exp, &[a]) => emit(a, node.data * upstream),
    (op, _) => return Err(GradError::MissingBackwardRule { node: id, op }),
  }

  trace!("pullback {id} op={:?} upstream={upstream}", node.op);
  Ok(())
}

#[cfg(test)]
mod tests {
  use approx::{assert_abs_diff_eq, assert_relative_eq};
  use smallvec::smallvec;

  use super::*;
  use crate::graph::Operands;

  fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
  }

  mod rules {
    use super::*;

    #[test]
    fn add() {
      init();
      let graph = Graph::new();
      let a = graph.leaf(3.0);
      let b = graph.leaf(4.0);
      let c = a + b;
      c.backward();
      // df/da = 1
      // df/db = 1
      assert_eq!(a.grad(), 1.0);
      assert_eq!(b.grad(), 1.0);
      assert_eq!(c.grad(), 1.0);
    }

    #[test]
    fn mul() {
      let graph = Graph::new();
      let a = graph.leaf(3.0);
      let b = graph.leaf(4.0);
      let c = a * b;
      c.backward();
      // df/da = b
      // df/db = a
      assert_eq!(a.grad(), 4.0);
      assert_eq!(b.grad(), 3.0);
    }

    #[test]
    fn mul_by_itself() {
      let graph = Graph::new();
      let a = graph.leaf(3.0);
      let c = a * a;
      c.backward();
      // df/da = 2a
      assert_eq!(a.grad(), 6.0);
    }

    #[test]
    fn add_to_itself() {
      let graph = Graph::new();
      let a = graph.leaf(3.0);
      let c = a + a;
      c.backward();
      assert_eq!(a.grad(), 2.0);
    }

    #[test]
    fn powf() {
      let graph = Graph::new();
      let a = graph.leaf(2.0);
      let b = a.powf(3.0);
      b.backward();
      // df/da = 3a^2
      assert_eq!(a.grad(), 12.0);
    }

    #[test]
    fn tanh() {
      let graph = Graph::new();
      let a = graph.leaf(0.8);
      let b = a.tanh();
      b.backward();
      // df/da = 1 - tanh^2(a)
      assert_relative_eq!(a.grad(), 1.0 / (0.8f64.cosh() * 0.8f64.cosh()), max_relative = 1e-12);
    }

    #[test]
    fn exp() {
      let graph = Graph::new();
      let a = graph.leaf(1.3);
      let b = a.exp();
      b.backward();
      // df/da = exp(a)
      assert_eq!(a.grad(), 1.3f64.exp());
    }

    #[test]
    fn sub() {
      let graph = Graph::new();
      let a = graph.leaf(7.0);
      let b = graph.leaf(4.0);
      let c = a - b;
      c.backward();
      assert_eq!(a.grad(), 1.0);
      assert_eq!(b.grad(), -1.0);
    }

    #[test]
    fn div() {
      let graph = Graph::new();
      let a = graph.leaf(6.0);
      let b = graph.leaf(3.0);
      let c = a.div(b).unwrap();
      c.backward();
      // df/da = 1/b
      // df/db = -a/b^2
      assert_abs_diff_eq!(a.grad(), 1.0 / 3.0, epsilon = 1e-15);
      assert_abs_diff_eq!(b.grad(), -6.0 / 9.0, epsilon = 1e-15);
    }

    #[test]
    fn lifted_scalar_gets_a_gradient_too() {
      let graph = Graph::new();
      let a = graph.leaf(3.0);
      let c = a * 5.0;
      c.backward();
      assert_eq!(a.grad(), 5.0);
      assert_eq!(c.operands()[1].grad(), 3.0);
    }
  }

  mod order {
    use super::*;

    #[test]
    fn operands_come_first() {
      let graph = Graph::new();
      let x = graph.leaf(1.0);
      let y = graph.leaf(2.0);
      let p = x * y;
      let q = p.tanh();
      let r = q + x;
      let order = topological_order(&graph, r.id());
      let pos = |v: &Value<'_>| order.iter().position(|&id| id == v.id()).unwrap();
      assert_eq!(order.len(), 5);
      assert!(pos(&x) < pos(&p));
      assert!(pos(&y) < pos(&p));
      assert!(pos(&p) < pos(&q));
      assert!(pos(&q) < pos(&r));
      assert_eq!(*order.last().unwrap(), r.id());
    }

    #[test]
    fn shared_node_appears_once() {
      let graph = Graph::new();
      let x = graph.leaf(1.0);
      let a = x.exp();
      let b = x.tanh();
      let c = a * b;
      let order = topological_order(&graph, c.id());
      assert_eq!(order.iter().filter(|&&id| id == x.id()).count(), 1);
      assert_eq!(order.len(), 4);
    }

    #[test]
    fn unreachable_nodes_are_skipped() {
      let graph = Graph::new();
      let x = graph.leaf(1.0);
      let unrelated = graph.leaf(5.0);
      let y = x.exp();
      let order = topological_order(&graph, y.id());
      assert!(!order.contains(&unrelated.id()));
      y.backward();
      assert_eq!(unrelated.grad(), 0.0);
    }

    #[test]
    fn deep_chain() {
      // deep enough to overflow a recursive walk
      let graph = Graph::with_capacity(400_001);
      let x = graph.leaf(0.5);
      let mut y = x;
      for _ in 0..200_000 {
        y = y + 0.0;
      }
      y.backward();
      assert_eq!(x.grad(), 1.0);
    }
  }

  mod accumulation {
    use super::*;

    #[test]
    fn diamond() {
      // root = x^2 * exp(x): both paths end in x
      let graph = Graph::new();
      let x = graph.leaf(0.7);
      let p1 = x.powf(2.0);
      let p2 = x.exp();
      let root = p1 * p2;
      root.backward();
      let (xv, ex) = (0.7f64, 0.7f64.exp());
      let expected = 2.0 * xv * ex + xv * xv * ex;
      assert_relative_eq!(x.grad(), expected, max_relative = 1e-12);
      // either path alone is wrong
      assert!((x.grad() - 2.0 * xv * ex).abs() > 1e-3);
      assert!((x.grad() - xv * xv * ex).abs() > 1e-3);
    }

    #[test]
    fn second_pass_doubles() {
      let graph = Graph::new();
      let a = graph.leaf(2.0);
      let b = graph.leaf(-3.0);
      let c = graph.leaf(10.0);
      let d = (a * b + c).tanh() * a;
      d.backward();
      let single = [a.grad(), b.grad(), c.grad(), d.grad()];
      d.backward();
      let double = [a.grad(), b.grad(), c.grad(), d.grad()];
      for (s, d) in single.iter().zip(double.iter()) {
        assert_eq!(*d, 2.0 * s);
      }
    }

    #[test]
    fn deterministic() {
      fn run() -> [f64; 3] {
        let graph = Graph::new();
        let a = graph.leaf(0.3);
        let b = graph.leaf(-1.7);
        let c = graph.leaf(2.2);
        let h = (a * b).tanh() + (b * c).exp() * a;
        let out = (h * h + a).powf(0.5);
        out.backward();
        [a.grad(), b.grad(), c.grad()]
      }
      let first = run();
      let second = run();
      for (x, y) in first.iter().zip(second.iter()) {
        assert_eq!(x.to_bits(), y.to_bits());
      }
    }
  }

  mod malformed {
    use super::*;

    #[test]
    fn missing_rule() {
      let graph = Graph::new();
      let a = graph.leaf(1.0);
      // an Add with a single operand cannot come from the arithmetic surface
      let bad = graph.push(1.0, Op::Add, smallvec![a.id()]);
      let root = bad.exp();
      assert_eq!(
        root.try_backward(),
        Err(GradError::MissingBackwardRule {
          node: bad.id(),
          op: Op::Add
        })
      );
      // nothing written on failure
      assert_eq!(root.grad(), 0.0);
      assert_eq!(a.grad(), 0.0);
    }

    #[test]
    fn leaf_with_operands() {
      let graph = Graph::new();
      let a = graph.leaf(1.0);
      let operands: Operands = smallvec![a.id()];
      let bad = graph.push(1.0, Op::Leaf, operands);
      assert!(matches!(
        bad.try_backward(),
        Err(GradError::MissingBackwardRule { op: Op::Leaf, .. })
      ));
    }

    #[test]
    #[should_panic(expected = "internal error")]
    fn backward_panics() {
      let graph = Graph::new();
      let bad = graph.push(1.0, Op::Mul, smallvec![]);
      bad.backward();
    }
  }
}
