//! The `homotopy_core` crate tracks solution paths of polynomial homotopies with
//! adaptive multiple precision.
//!
//! Key components:
//! - **Numeric**: `Scalar`, shared by `Complex64` and the MPC-backed `MpComplex`.
//! - **Function tree**: shared expression DAGs with cached evaluation, symbolic
//!   differentiation, degree queries and homogenization.
//! - **System**: functions, variable groups, path variable and patch; start systems.
//! - **Tracking**: Runge-Kutta predictors, Newton corrector, AMP criteria and the
//!   stepping loop, reporting to observers.
//! - **Zero-dimensional solving**: the total-degree homotopy tracked over every start point.

pub mod amp;
pub mod error;
pub mod function_tree;
pub mod linalg;
pub mod numeric;
pub mod parser;
pub mod system;
pub mod tracking;
pub mod zero_dim;

pub use error::{Error, Result};
