//! Virtual path projection.
//!
//! [`generate`] decides which paths a relation appears under; [`index`] holds
//! the resulting bindings. Both are derived state: replaying every stored
//! relation through [`generate::generate_paths`] reproduces the index.

pub mod generate;
pub mod index;

pub use generate::{ancestry_chain, dependents, generate_paths, segment};
pub use index::{normalize, PathBinding, PathIndex};
