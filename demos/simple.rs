use autograd::{trace, Graph};

fn main() {
  env_logger::init();

  // every operation records its operands in the graph (an arena of nodes)
  let graph = Graph::new();
  let a = graph.leaf(2.0).with_label("a");
  let b = graph.leaf(-3.0).with_label("b");
  let c = graph.leaf(10.0).with_label("c");
  let f = graph.leaf(-2.0).with_label("f");
  let e = (a * b).with_label("e");
  let d = (e + c).with_label("d");
  let loss = (d * f).with_label("L");

  loss.backward();

  for node in trace(&loss).nodes.iter().rev() {
    println!(
      "{:>2} {:<5} data={:>6} grad={:>6}",
      node.label.as_deref().unwrap_or("?"),
      node.op.to_string(),
      node.data,
      node.grad
    );
  }
}
