//! Geometry processing algorithms.
//!
//! - **Weights**: interior angles, cotangent edge weights, mean-curvature normals
//! - **ARAP**: as-rigid-as-possible deformation under handle constraints
//! - **Picking**: ray/triangle and ray/vertex selection
//! - **Sparse**: CSR matrices and the envelope Cholesky used by the deformer

pub mod arap;
pub mod pick;
pub mod progress;
pub mod sparse;
pub mod weights;

pub use progress::Progress;
