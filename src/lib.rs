//!
//! # autograd
//!
//! ## Core API
//!
//! Reverse-mode automatic differentiation over a dynamically built graph of
//! scalars. Nodes live in a [`Graph`] arena and are addressed through copyable
//! [`Value`] handles; every operation evaluates eagerly and records how its
//! result was produced, and [`Value::backward`] walks the graph in reverse
//! topological order, adding each node's derivative into its gradient.
//!
//! ```
//! use autograd::Graph;
//!
//! let graph = Graph::new();
//! let a = graph.leaf(2.0);
//! let b = graph.leaf(-3.0);
//! let c = graph.leaf(10.0);
//! let f = graph.leaf(-2.0);
//! let loss = (a * b + c) * f;
//! loss.backward();
//! assert_eq!(loss.data(), -8.0);
//! assert_eq!(a.grad(), 6.0);
//! assert_eq!(b.grad(), -4.0);
//! ```
//!
//! Gradients accumulate across passes; zero them (per value, per module or
//! for the whole graph) before the next one.
//!

mod backward;
pub mod check;
mod error;
mod graph;
pub mod nn;
pub mod trace;
mod value;

pub use check::{GradCheck, GradCheckError};
pub use error::{GradError, Result};
pub use graph::{Graph, NodeId, Op};
pub use trace::{trace, NodeInfo, Trace};
pub use value::{Operand, Value};
