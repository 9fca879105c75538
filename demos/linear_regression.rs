use autograd::Graph;

fn main() -> autograd::Result<()> {
  env_logger::init();

  let x1_data = [1.0, 2.0, 3.0, 4.0, 5.0];
  let x2_data = [2.0, 1.0, 0.0, -1.0, 2.0];
  let mut y_data = Vec::with_capacity(x1_data.len());
  // y = 5.4*x1 - 2.3*x2 - 1.4 for each sample
  for i in 0..x1_data.len() {
    let y = 5.4 * x1_data[i] - 2.3 * x2_data[i] - 1.4;
    y_data.push(y);
  }

  let learning_rate = 0.02;
  let epochs = 20_000;

  // parameters live outside the graph; every epoch rebuilds it from scratch
  let (mut w1, mut w2, mut b) = (0.0, 0.0, 0.0);
  let mut graph = Graph::with_capacity(64);

  for epoch in 0..epochs {
    let mse = {
      let w1_var = graph.leaf(w1);
      let w2_var = graph.leaf(w2);
      let b_var = graph.leaf(b);

      let n = x1_data.len() as f64;
      let mut mse = graph.leaf(0.0);
      for i in 0..x1_data.len() {
        // y_pred = w1*x1 + w2*x2 + b
        let y_pred = w1_var * x1_data[i] + w2_var * x2_data[i] + b_var;
        let err = y_pred - y_data[i];
        mse = mse + err * err;
      }
      let mse = mse.div(n)?;
      mse.backward();

      w1 -= learning_rate * w1_var.grad();
      w2 -= learning_rate * w2_var.grad();
      b -= learning_rate * b_var.grad();
      mse.data()
    };
    graph.clear();

    if epoch % 2_000 == 0 {
      println!("epoch {epoch} | MSE = {mse:.6} | w1 = {w1:.4} | w2 = {w2:.4} | b = {b:.4}");
    }
  }

  println!("trained parameters:");
  println!("w1 = {w1:.4}");
  println!("w2 = {w2:.4}");
  println!("b  = {b:.4}");
  Ok(())
}
