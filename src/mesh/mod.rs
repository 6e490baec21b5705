//! Half-edge triangle meshes.
//!
//! [`HalfEdgeMesh`] keeps vertices, half-edges, edges and triangles in flat
//! arenas that point at each other through typed indices ([`VertexId`],
//! [`HalfEdgeId`], [`EdgeId`], [`FaceId`]). The index width is a type
//! parameter bounded by [`MeshIndex`]; `u32` is the default, `u16` halves the
//! memory of small meshes.
//!
//! Connectivity never changes after [`build_with_normals`] or
//! [`build_from_triangles`]. Editing only moves vertices: each one carries a
//! rest position, a current position, a free-text label and its keyframes.
//!
//! # Construction
//!
//! ```
//! use ductile::mesh::{build_with_normals, HalfEdgeMesh};
//! use nalgebra::{Point3, Vector3};
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let normals = vec![Vector3::z(); 3];
//! let faces = vec![[0, 1, 2]];
//!
//! let mesh: HalfEdgeMesh = build_with_normals(&vertices, &normals, &faces).unwrap();
//! assert!(mesh.is_valid());
//! ```

mod builder;
mod halfedge;
mod index;

pub use builder::{build_from_triangles, build_with_normals, to_face_vertex};
pub use halfedge::{Edge, Face, HalfEdge, HalfEdgeMesh, Vertex, VertexHalfEdgeIter};
pub use index::{EdgeId, FaceId, HalfEdgeId, MeshIndex, VertexId};
