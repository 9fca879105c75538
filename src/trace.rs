//!
//! Read-only snapshot of the subgraph behind a root, for inspection or for
//! feeding an external renderer. Reachability matches the backward pass.
//!

use crate::backward::topological_order;
use crate::graph::{NodeId, Op};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
  pub id: NodeId,
  pub data: f64,
  pub grad: f64,
  pub op: Op,
  pub label: Option<String>,
}

/// Nodes in topological order, plus `(operand, consumer)` edges
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
  pub nodes: Vec<NodeInfo>,
  pub edges: Vec<(NodeId, NodeId)>,
}

impl Trace {
  pub fn node(&self, id: NodeId) -> Option<&NodeInfo> {
    self.nodes.iter().find(|n| n.id == id)
  }

  pub fn leaves(&self) -> impl Iterator<Item = &NodeInfo> + '_ {
    self.nodes.iter().filter(|n| n.op == Op::Leaf)
  }
}

/// Collect every node reachable from `root`; never mutates the graph
pub fn trace(root: &Value<'_>) -> Trace {
  let graph = root.graph();
  let order = topological_order(graph, root.id());
  let nodes = graph.nodes();

  let mut trace = Trace {
    nodes: Vec::with_capacity(order.len()),
    edges: Vec::new(),
  };
  for id in order {
    let node = &nodes[id.index()];
    trace.nodes.push(NodeInfo {
      id,
      data: node.data,
      grad: node.grad,
      op: node.op,
      label: node.label.clone(),
    });
    trace
      .edges
      .extend(node.operands.iter().map(|&operand| (operand, id)));
  }
  trace
}
