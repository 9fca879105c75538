//!
//! Finite difference gradient checking.
//!
//! Every evaluation builds its own `Graph`, so the checked function is free to
//! build whatever it wants from the inputs it is handed.
//!

use log::debug;
use thiserror::Error;

use crate::error::GradError;
use crate::graph::Graph;
use crate::value::Value;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradCheckError {
  #[error("gradient mismatch for input {input}: analytic {analytic} != numeric {numeric} (difference {difference})")]
  Mismatch {
    input: usize,
    analytic: f64,
    numeric: f64,
    difference: f64,
  },

  #[error("numeric gradient for input {input} is not finite: {value}")]
  NonFinite { input: usize, value: f64 },

  #[error(transparent)]
  Graph(#[from] GradError),
}

/// Central difference check of `backward` against `(f(x+e) - f(x-e)) / 2e`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradCheck {
  pub epsilon: f64,
  /// Largest accepted absolute difference
  pub tolerance: f64,
}

impl Default for GradCheck {
  fn default() -> Self {
    Self {
      epsilon: 1e-6,
      tolerance: 1e-4,
    }
  }
}

impl GradCheck {
  pub fn new(epsilon: f64, tolerance: f64) -> Self {
    Self { epsilon, tolerance }
  }

  /// Gradients of `f` at `inputs` as computed by the backward pass
  pub fn analytic<F>(inputs: &[f64], f: F) -> Result<Vec<f64>, GradError>
  where
    F: for<'g> Fn(&'g Graph, &[Value<'g>]) -> Result<Value<'g>, GradError>,
  {
    let graph = Graph::new();
    let leaves: Vec<_> = inputs.iter().map(|&x| graph.leaf(x)).collect();
    let root = f(&graph, &leaves)?;
    root.try_backward()?;
    Ok(leaves.iter().map(|v| v.grad()).collect())
  }

  /// Gradients of `f` at `inputs` by central differences
  pub fn numeric<F>(&self, inputs: &[f64], f: F) -> Result<Vec<f64>, GradError>
  where
    F: for<'g> Fn(&'g Graph, &[Value<'g>]) -> Result<Value<'g>, GradError>,
  {
    let eval = |xs: &[f64]| -> Result<f64, GradError> {
      let graph = Graph::new();
      let leaves: Vec<_> = xs.iter().map(|&x| graph.leaf(x)).collect();
      let out = f(&graph, &leaves)?;
      Ok(out.data())
    };

    let mut shifted = inputs.to_vec();
    let mut grads = Vec::with_capacity(inputs.len());
    for i in 0..inputs.len() {
      shifted[i] = inputs[i] + self.epsilon;
      let plus = eval(&shifted)?;
      shifted[i] = inputs[i] - self.epsilon;
      let minus = eval(&shifted)?;
      shifted[i] = inputs[i];
      grads.push((plus - minus) / (2.0 * self.epsilon));
    }
    Ok(grads)
  }

  /// Compare both estimates input by input
  pub fn run<F>(&self, inputs: &[f64], f: F) -> Result<(), GradCheckError>
  where
    F: for<'g> Fn(&'g Graph, &[Value<'g>]) -> Result<Value<'g>, GradError>,
  {
    let analytic = Self::analytic(inputs, &f)?;
    let numeric = self.numeric(inputs, &f)?;

    for (input, (&a, &n)) in analytic.iter().zip(numeric.iter()).enumerate() {
      if !n.is_finite() {
        return Err(GradCheckError::NonFinite { input, value: n });
      }
      let difference = (a - n).abs();
      debug!("grad check input {input}: analytic={a} numeric={n} diff={difference}");
      // also catches a NaN analytic gradient
      if !(difference <= self.tolerance) {
        return Err(GradCheckError::Mismatch {
          input,
          analytic: a,
          numeric: n,
          difference,
        });
      }
    }
    Ok(())
  }
}
