//! An embeddable compiler and evaluator for arithmetic expressions over named
//! variables.
//!
//! ```
//! use varexpr::Engine;
//!
//! let mut engine = Engine::new();
//! engine.define_variable("r", 2.0).unwrap();
//! let area: f64 = engine.eval("pi() * r^2").unwrap();
//! assert!((area - 12.566370614359172).abs() < 1e-12);
//! ```
//!
//! Text is checked and compiled once into a [`Program`](compiler::Program) of
//! stack-machine instructions that refer to variables by slot, then evaluated
//! as often as needed while variable values change.

pub mod check;
pub mod compiler;
pub mod diagnostic;
pub mod engine;
pub mod env;
pub mod functions;
pub mod lexer;
pub mod model;
pub mod source;
pub mod value;
pub mod vm;

pub use engine::{Engine, Error, Result};
pub use env::Snapshot;
pub use value::{FromValue, Value, Vec3};
