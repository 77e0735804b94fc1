//! Operator-string algebra for many-body quantum bases.
//!
//! Operators are given as lists of operator strings with site couplings,
//! possibly time-dependent. This crate turns them into a minimal canonical
//! term list ([`algebra`]), checks the result for Hermiticity, declared
//! symmetries, and particle conservation ([`check`]), and applies single terms
//! to state vectors without ever building a matrix ([`apply`]). Everything a
//! concrete basis has to provide is described in [`hilbert`]; [`spin`] holds a
//! reference spin-1/2 implementation.

pub mod error;
pub mod scalar;
pub mod terms;
pub mod hilbert;
pub mod algebra;
pub mod check;
pub mod apply;
pub mod config;
pub mod operator;
pub mod spin;

pub use error::{ OpError, OpResult };
pub use terms::{ Bond, DynamicSpec, OpString, StaticSpec, TimeDep };
pub use hilbert::OperatorBasis;
pub use algebra::expanded_form;
pub use check::{ CheckOutcome, ConsistencyChecker };
pub use apply::{ apply_op, inplace_op, op };
pub use config::CheckConfig;
pub use operator::Operator;
