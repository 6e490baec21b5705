//! The crate-wide error type.
//!
//! Construction errors describe the input triangle list. Everything after
//! construction reports bad vertex indices, bad parameters, or a deformation
//! that could not be solved; none of them leave the mesh half-modified.

use thiserror::Error;

/// Shorthand for results carrying a [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Everything that can go wrong while building, editing, or animating a mesh.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    // ---- construction ----
    /// No triangles were supplied.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A triangle names a vertex past the end of the position list.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// Triangle number in the input list.
        face: usize,
        /// Out-of-range corner index.
        vertex: usize,
    },

    /// A triangle repeats a corner.
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// Triangle number in the input list.
        face: usize,
    },

    /// The same directed edge is used by two faces (inconsistent winding or
    /// more than two faces on one edge).
    #[error("directed edge ({v0}, {v1}) is used by more than one face")]
    NonManifoldEdge {
        /// Tail of the directed edge.
        v0: usize,
        /// Head of the directed edge.
        v1: usize,
    },

    /// The mesh needs more elements than the index type can address.
    #[error("{count} {element} do not fit in the index type (at most {limit})")]
    IndexOverflow {
        /// Kind of element that overflowed.
        element: &'static str,
        /// Number of elements the input needs.
        count: usize,
        /// Largest element count the index type addresses.
        limit: usize,
    },

    // ---- editing ----
    /// A handle, label, or frame entry names a vertex the mesh does not have.
    #[error("vertex {vertex} is out of range (mesh has {count} vertices)")]
    InvalidVertex {
        /// The offending index.
        vertex: usize,
        /// Number of vertices in the mesh.
        count: usize,
    },

    /// An operation that needs handles (or frames) got none.
    #[error("no handle vertices selected")]
    EmptySelection,

    /// An option or argument is out of its domain, e.g. a NaN keyframe time.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Argument or option name.
        name: &'static str,
        /// Rendered value.
        value: String,
        /// Constraint the value breaks.
        reason: &'static str,
    },

    // ---- solving ----
    /// The factorization met a non-positive pivot.
    #[error("system matrix is not positive definite (pivot at row {row})")]
    NotPositiveDefinite {
        /// Row (in factorization order) where the pivot failed.
        row: usize,
    },

    /// The deformation solve could not produce positions.
    #[error("deformation solve failed: {reason}")]
    SolveFailure {
        /// Description of the failure.
        reason: String,
    },
}

impl MeshError {
    /// [`MeshError::InvalidParameter`] with the value rendered through `Display`.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        Self::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// [`MeshError::SolveFailure`] with the given reason.
    pub fn solve_failure(reason: impl Into<String>) -> Self {
        Self::SolveFailure {
            reason: reason.into(),
        }
    }

    /// Whether this error came from solving rather than from bad input.
    pub fn is_solve_error(&self) -> bool {
        matches!(self, Self::NotPositiveDefinite { .. } | Self::SolveFailure { .. })
    }
}
