use autograd::nn::{sum_squared_error, MlpParams};
use autograd::Graph;

/// Small linear congruential generator, good enough for initial weights
fn lcg(mut state: u64) -> impl FnMut() -> f64 {
  move || {
    state = state
      .wrapping_mul(6364136223846793005)
      .wrapping_add(1442695040888963407);
    ((state >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
  }
}

fn main() -> autograd::Result<()> {
  env_logger::init();

  let inputs = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
  let targets = [-1.0, 1.0, 1.0, -1.0];

  // 2 inputs, 1 hidden layer of 4 tanh units, 1 linear output
  let mut params = MlpParams::new(2, &[4, 1], lcg(7));
  let mut graph = Graph::with_capacity(256);
  let learning_rate = 0.05;

  for epoch in 0..500 {
    let (loss, nodes) = {
      let net = params.bind(&graph);
      let mut predictions = Vec::with_capacity(inputs.len());
      for x in &inputs {
        predictions.push(net.forward(x)?[0]);
      }
      let loss = sum_squared_error(&graph, &predictions, &targets)?;
      loss.backward();
      params.step(&net, learning_rate)?;
      (loss.data(), graph.len())
    };
    graph.clear();

    if epoch % 50 == 0 {
      println!("epoch {epoch} | loss = {loss:.6} | nodes = {nodes}");
    }
  }

  println!("testing network predictions:");
  let net = params.bind(&graph);
  for x in &inputs {
    let out = net.forward(x)?[0];
    println!("input: ({}, {}), output: {:.6}", x[0], x[1], out.data());
  }
  Ok(())
}
