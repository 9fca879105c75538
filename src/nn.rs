//!
//! # nn
//!
//! Neurons, layers and multi-layer perceptrons built purely from the public
//! arithmetic surface. Parameters are leaves of the caller's `Graph`; initial
//! values come from a caller supplied initializer.
//!

use crate::error::{GradError, Result};
use crate::graph::Graph;
use crate::value::{Operand, Value};

/// Anything that owns trainable parameters
pub trait Module<'g> {
  fn parameters(&self) -> Vec<Value<'g>>;

  fn zero_grad(&self) {
    for p in self.parameters() {
      p.zero_grad();
    }
  }
}

/// A single unit: `tanh(w . x + b)`, or linear when `nonlin` is off
#[derive(Debug, Clone)]
pub struct Neuron<'g> {
  w: Vec<Value<'g>>,
  b: Value<'g>,
  nonlin: bool,
}

impl<'g> Neuron<'g> {
  pub fn new<I>(graph: &'g Graph, nin: usize, nonlin: bool, init: &mut I) -> Self
  where
    I: FnMut() -> f64,
  {
    let w = (0..nin).map(|_| graph.leaf(init())).collect();
    let b = graph.leaf(init());
    Self { w, b, nonlin }
  }

  pub fn weights(&self) -> &[Value<'g>] {
    &self.w
  }

  pub fn bias(&self) -> Value<'g> {
    self.b
  }

  pub fn forward<X>(&self, x: &[X]) -> Result<Value<'g>>
  where
    X: Into<Operand<'g>> + Copy,
  {
    if x.len() != self.w.len() {
      return Err(GradError::InputWidth {
        expected: self.w.len(),
        actual: x.len(),
      });
    }
    let act = self
      .w
      .iter()
      .zip(x)
      .fold(self.b, |acc, (&wi, &xi)| acc + wi * xi);
    Ok(if self.nonlin { act.tanh() } else { act })
  }
}

impl<'g> Module<'g> for Neuron<'g> {
  fn parameters(&self) -> Vec<Value<'g>> {
    let mut params = self.w.clone();
    params.push(self.b);
    params
  }
}

#[derive(Debug, Clone)]
pub struct Layer<'g> {
  neurons: Vec<Neuron<'g>>,
}

impl<'g> Layer<'g> {
  pub fn new<I>(graph: &'g Graph, nin: usize, nout: usize, nonlin: bool, init: &mut I) -> Self
  where
    I: FnMut() -> f64,
  {
    let neurons = (0..nout)
      .map(|_| Neuron::new(graph, nin, nonlin, &mut *init))
      .collect();
    Self { neurons }
  }

  pub fn neurons(&self) -> &[Neuron<'g>] {
    &self.neurons
  }

  pub fn forward<X>(&self, x: &[X]) -> Result<Vec<Value<'g>>>
  where
    X: Into<Operand<'g>> + Copy,
  {
    self.neurons.iter().map(|n| n.forward(x)).collect()
  }
}

impl<'g> Module<'g> for Layer<'g> {
  fn parameters(&self) -> Vec<Value<'g>> {
    self.neurons.iter().flat_map(|n| n.parameters()).collect()
  }
}

/// Stack of layers; hidden layers use tanh, the last one is linear
#[derive(Debug, Clone)]
pub struct Mlp<'g> {
  graph: &'g Graph,
  layers: Vec<Layer<'g>>,
}

impl<'g> Mlp<'g> {
  pub fn new<I>(graph: &'g Graph, nin: usize, nouts: &[usize], mut init: I) -> Self
  where
    I: FnMut() -> f64,
  {
    let sizes: Vec<usize> = std::iter::once(nin).chain(nouts.iter().copied()).collect();
    let layers = sizes
      .windows(2)
      .enumerate()
      .map(|(i, w)| Layer::new(graph, w[0], w[1], i + 1 != nouts.len(), &mut init))
      .collect();
    Self { graph, layers }
  }

  pub fn layers(&self) -> &[Layer<'g>] {
    &self.layers
  }

  pub fn forward<X>(&self, x: &[X]) -> Result<Vec<Value<'g>>>
  where
    X: Into<Operand<'g>> + Copy,
  {
    let mut layers = self.layers.iter();
    let mut out = match layers.next() {
      Some(first) => first.forward(x)?,
      None => x
        .iter()
        .map(|&xi| Into::<Operand<'g>>::into(xi).lift(self.graph))
        .collect(),
    };
    for layer in layers {
      out = layer.forward(&out)?;
    }
    Ok(out)
  }
}

impl<'g> Module<'g> for Mlp<'g> {
  fn parameters(&self) -> Vec<Value<'g>> {
    self.layers.iter().flat_map(|l| l.parameters()).collect()
  }
}

/// Parameter values of an `Mlp`, held outside any graph.
///
/// A training step binds them into a fresh graph as leaves, runs forward and
/// backward there, writes the update back with [`MlpParams::step`] and clears
/// the graph, so the arena never grows past a single step.
#[derive(Debug, Clone, PartialEq)]
pub struct MlpParams {
  nin: usize,
  nouts: Vec<usize>,
  values: Vec<f64>,
}

impl MlpParams {
  pub fn new<I>(nin: usize, nouts: &[usize], mut init: I) -> Self
  where
    I: FnMut() -> f64,
  {
    let count = std::iter::once(nin)
      .chain(nouts.iter().copied())
      .collect::<Vec<_>>()
      .windows(2)
      .map(|w| (w[0] + 1) * w[1])
      .sum();
    Self {
      nin,
      nouts: nouts.to_vec(),
      values: (0..count).map(|_| init()).collect(),
    }
  }

  /// Values in `Module::parameters` order: layer by layer, each neuron's
  /// weights followed by its bias
  pub fn values(&self) -> &[f64] {
    &self.values
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  /// Fresh leaves in `graph` holding the current values
  pub fn bind<'g>(&self, graph: &'g Graph) -> Mlp<'g> {
    let mut values = self.values.iter().copied();
    Mlp::new(graph, self.nin, &self.nouts, || values.next().unwrap_or_default())
  }

  /// Copy the values of a bound network back, e.g. after `sgd_step` on it
  pub fn load(&mut self, mlp: &Mlp<'_>) -> Result<()> {
    let params = self.bound(mlp)?;
    for (v, p) in self.values.iter_mut().zip(&params) {
      *v = p.data();
    }
    Ok(())
  }

  /// `v -= lr * grad` using the gradients of a bound network
  pub fn step(&mut self, mlp: &Mlp<'_>, learning_rate: f64) -> Result<()> {
    let params = self.bound(mlp)?;
    for (v, p) in self.values.iter_mut().zip(&params) {
      *v -= learning_rate * p.grad();
    }
    Ok(())
  }

  fn bound<'g>(&self, mlp: &Mlp<'g>) -> Result<Vec<Value<'g>>> {
    let params = mlp.parameters();
    if params.len() != self.values.len() {
      return Err(GradError::InputWidth {
        expected: self.values.len(),
        actual: params.len(),
      });
    }
    Ok(params)
  }
}

/// Sum of squared errors, starting from a 0.0 leaf
pub fn sum_squared_error<'g>(
  graph: &'g Graph,
  predictions: &[Value<'g>],
  targets: &[f64],
) -> Result<Value<'g>> {
  if predictions.len() != targets.len() {
    return Err(GradError::InputWidth {
      expected: targets.len(),
      actual: predictions.len(),
    });
  }
  Ok(
    predictions
      .iter()
      .zip(targets)
      .fold(graph.leaf(0.0), |acc, (&p, &t)| acc + (p - t).powf(2.0)),
  )
}

/// One plain gradient descent update: `p -= lr * p.grad` for every parameter
pub fn sgd_step(params: &[Value<'_>], learning_rate: f64) -> Result<()> {
  for p in params {
    p.set_data(p.data() - learning_rate * p.grad())?;
  }
  Ok(())
}
