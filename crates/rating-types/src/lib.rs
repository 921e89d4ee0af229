//! Rating Types
//!
//! This crate defines the `Value` type shared by the rating engine's DSL
//! parser, evaluator, and host-facing API. It exists to eliminate circular
//! dependencies between `rating-dsl` and `rating-engine`.

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::cargo)]
#![deny(missing_docs)]

mod value;
pub use value::Value;
