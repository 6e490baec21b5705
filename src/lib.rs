//! # Ductile
//!
//! Interactive as-rigid-as-possible surface editing for triangle meshes.
//!
//! Ductile stores a mesh in a half-edge structure, lets the user pin handle
//! vertices and drag them, and deforms the rest of the surface so every
//! one-ring stays as close to a rotation of its rest shape as possible.
//! Deformed poses can be recorded on a per-vertex keyframe timeline and played
//! back, and externally generated handle motion can be baked into keyframes.
//!
//! ## Modules
//!
//! - [`mesh`]: arena half-edge mesh with `u16`/`u32`/`u64` typed indices
//! - [`algo`]: cotangent weights, the ARAP solver and its sparse Cholesky,
//!   ray picking
//! - [`constraint`]: handle vertices and their targets
//! - [`anim`]: per-vertex keyframes and baking of generated animation
//! - [`document`]: one editing session
//!
//! ## Quick Start
//!
//! ```
//! use ductile::prelude::*;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 2], [0, 2, 3]];
//! let mut mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
//!
//! // Lift one corner, hold its neighbour in place.
//! let mut handles = ConstraintSet::new();
//! handles.insert(VertexId::new(0), Point3::new(0.0, 0.0, 1.0));
//! handles.insert(VertexId::new(1), Point3::new(1.0, 0.0, 0.0));
//!
//! let mut deformer = ArapDeformer::new(&mesh, DeformOptions::default());
//! let report = deformer.deform(&mut mesh, &handles).unwrap();
//! assert!(report.iterations >= 1);
//! assert_eq!(*mesh.position(VertexId::new(0)), Point3::new(0.0, 0.0, 1.0));
//! ```
//!
//! ## Editing Sessions
//!
//! [`Document`] bundles a mesh with its handles, deformer and timeline so an
//! interactive front end only has to forward clicks, drags and playback times.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod anim;
pub mod constraint;
pub mod document;
pub mod error;
pub mod mesh;

pub use document::Document;

/// Prelude module for convenient imports.
///
/// ```
/// use ductile::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::arap::{AnchorPolicy, ArapDeformer, DeformOptions, DeformReport, InitialGuess};
    pub use crate::algo::pick::Ray;
    pub use crate::algo::Progress;
    pub use crate::anim::{AnimationFrame, Keyframes};
    pub use crate::constraint::ConstraintSet;
    pub use crate::document::Document;
    pub use crate::error::{MeshError, Result};
    pub use crate::mesh::{
        build_from_triangles, build_with_normals, to_face_vertex, EdgeId, Face, FaceId, HalfEdge,
        HalfEdgeId, HalfEdgeMesh, MeshIndex, Vertex, VertexId,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::Point3;

    /// Closed tetrahedron with outward winding.
    fn tetra() -> (Vec<Point3<f64>>, HalfEdgeMesh) {
        let corners = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];
        let mesh = build_from_triangles(&corners, &[[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]]).unwrap();
        (corners, mesh)
    }

    #[test]
    fn test_closed_tetra_topology() {
        let (_, mesh) = tetra();
        assert_eq!(
            (mesh.num_vertices(), mesh.num_edges(), mesh.num_faces(), mesh.num_halfedges()),
            (4, 6, 4, 12)
        );
        assert!(mesh.is_valid());
        assert!(mesh.vertex_ids().all(|v| mesh.valence(v) == 3 && !mesh.is_boundary_vertex(v)));
    }

    #[test]
    fn test_tetra_with_rest_handles_does_not_move() {
        let (corners, mut mesh) = tetra();
        let handles: ConstraintSet = corners[..2]
            .iter()
            .enumerate()
            .map(|(i, p)| (VertexId::new(i), *p))
            .collect();
        let mut deformer = ArapDeformer::new(&mesh, DeformOptions::default());
        let report = deformer.deform(&mut mesh, &handles).unwrap();

        assert!(report.converged);
        for (p, q) in mesh.positions().iter().zip(&corners) {
            assert!((p - q).norm() < 1e-9);
        }
    }
}
