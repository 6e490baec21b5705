//! Mesh construction utilities.
//!
//! Meshes are built once from a deduplicated vertex list, one normal per vertex
//! and a triangle index list with consistent winding. Input that would produce
//! invalid topology is rejected rather than repaired.

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};

use super::halfedge::{Edge, Face, HalfEdge, HalfEdgeMesh, Vertex};
use super::index::{EdgeId, FaceId, HalfEdgeId, MeshIndex, VertexId};
use crate::error::{MeshError, Result};

/// Build a half-edge mesh from vertices and triangle faces, computing
/// area-weighted vertex normals.
///
/// # Example
/// ```
/// use ductile::mesh::{build_from_triangles, HalfEdgeMesh};
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let faces = vec![[0, 1, 2]];
///
/// let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
/// assert_eq!(mesh.num_vertices(), 3);
/// assert_eq!(mesh.num_edges(), 3);
/// ```
pub fn build_from_triangles<I: MeshIndex>(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
) -> Result<HalfEdgeMesh<I>> {
    let normals = vec![Vector3::zeros(); vertices.len()];
    let mut mesh = build_with_normals(vertices, &normals, faces)?;
    for v in 0..mesh.num_vertices() {
        let vid = VertexId::new(v);
        let n = mesh.vertex_normal(vid);
        mesh.vertex_mut(vid).normal = n;
    }
    Ok(mesh)
}

/// Fail unless `count` elements can all be addressed by a valid `I`.
fn check_capacity<I: MeshIndex>(element: &'static str, count: usize) -> Result<()> {
    let limit = I::MAX.to_usize().saturating_add(1);
    if count > limit {
        return Err(MeshError::IndexOverflow { element, count, limit });
    }
    Ok(())
}

/// Build a half-edge mesh from vertices, per-vertex normals and triangle faces.
///
/// # Errors
///
/// - [`MeshError::EmptyMesh`] if `faces` is empty
/// - [`MeshError::InvalidParameter`] if `normals` and `vertices` differ in length
/// - [`MeshError::InvalidVertexIndex`] if a face index is out of range
/// - [`MeshError::IndexOverflow`] if the vertices or half-edges outnumber
///   what `I` can address
/// - [`MeshError::DegenerateFace`] if a face repeats a vertex
/// - [`MeshError::NonManifoldEdge`] if a directed edge appears in two faces
pub fn build_with_normals<I: MeshIndex>(
    vertices: &[Point3<f64>],
    normals: &[Vector3<f64>],
    faces: &[[usize; 3]],
) -> Result<HalfEdgeMesh<I>> {
    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    if normals.len() != vertices.len() {
        return Err(MeshError::invalid_param(
            "normals.len()",
            normals.len(),
            "must equal the number of vertices",
        ));
    }
    check_capacity::<I>("vertices", vertices.len())?;
    check_capacity::<I>("half-edges", faces.len().saturating_mul(3))?;

    for (fi, face) in faces.iter().enumerate() {
        for &vi in face {
            if vi >= vertices.len() {
                return Err(MeshError::InvalidVertexIndex { face: fi, vertex: vi });
            }
        }
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            return Err(MeshError::DegenerateFace { face: fi });
        }
    }

    let mut mesh = HalfEdgeMesh::with_capacity(vertices.len(), faces.len());
    mesh.vertices.extend(
        vertices
            .iter()
            .zip(normals)
            .map(|(&p, &n)| Vertex::new(p, n)),
    );

    // Directed (from, to) -> half-edge, used to pair twins.
    let mut directed: HashMap<(usize, usize), HalfEdgeId<I>> = HashMap::with_capacity(faces.len() * 3);
    // First half-edge seen for each undirected pair, in insertion order.
    let mut representatives: Vec<HalfEdgeId<I>> = Vec::with_capacity(faces.len() * 3 / 2 + 1);

    for (fi, face) in faces.iter().enumerate() {
        let base = mesh.halfedges.len();
        let face_id = FaceId::<I>::new(fi);
        mesh.faces.push(Face {
            halfedge: HalfEdgeId::new(base),
        });

        for k in 0..3 {
            let from = face[k];
            let to = face[(k + 1) % 3];
            let he_id = HalfEdgeId::<I>::new(base + k);

            mesh.halfedges.push(HalfEdge {
                vertex: VertexId::new(to),
                next: HalfEdgeId::new(base + (k + 1) % 3),
                prev: HalfEdgeId::new(base + (k + 2) % 3),
                face: face_id,
                ..HalfEdge::new()
            });

            if directed.insert((from, to), he_id).is_some() {
                return Err(MeshError::NonManifoldEdge { v0: from, v1: to });
            }

            match directed.get(&(to, from)) {
                Some(&twin) => {
                    mesh.halfedges[twin.index()].twin = he_id;
                    mesh.halfedges[he_id.index()].twin = twin;
                }
                None => representatives.push(he_id),
            }
        }
    }

    // One edge per undirected pair: the half-edge seen first represents it.
    for he_id in representatives {
        let edge_id = EdgeId::<I>::new(mesh.edges.len());
        mesh.edges.push(Edge {
            halfedge: he_id,
            weight: 0.0,
        });
        mesh.halfedges[he_id.index()].edge = edge_id;
        let twin = mesh.halfedges[he_id.index()].twin;
        if twin.is_valid() {
            mesh.halfedges[twin.index()].edge = edge_id;
        }
    }

    // Owning half-edge: the outgoing successor of the first half-edge ending at
    // the vertex.
    for i in 0..mesh.halfedges.len() {
        let he = mesh.halfedges[i];
        let v = he.vertex.index();
        if !mesh.vertices[v].halfedge.is_valid() {
            mesh.vertices[v].halfedge = he.next;
        }
    }

    log::debug!(
        "built mesh: {} vertices, {} faces, {} edges ({} boundary)",
        mesh.num_vertices(),
        mesh.num_faces(),
        mesh.num_edges(),
        mesh.edge_ids().filter(|&e| mesh.is_boundary_edge(e)).count()
    );

    Ok(mesh)
}

/// Convert a half-edge mesh back to a face-vertex representation using the
/// current positions.
///
/// Returns (vertices, faces) tuple.
pub fn to_face_vertex<I: MeshIndex>(mesh: &HalfEdgeMesh<I>) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let faces = mesh
        .face_ids()
        .map(|f| mesh.face_triangle(f).map(|v| v.index()))
        .collect();
    (mesh.positions(), faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        (vertices, vec![[0, 1, 2], [0, 2, 3]])
    }

    /// Strip of `n` triangles over two rows of points.
    fn strip(n: usize) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let vertices = (0..n + 2)
            .map(|i| Point3::new((i / 2) as f64, (i % 2) as f64, 0.0))
            .collect();
        let faces = (0..n)
            .map(|i| if i % 2 == 0 { [i, i + 1, i + 2] } else { [i + 1, i, i + 2] })
            .collect();
        (vertices, faces)
    }

    #[test]
    fn test_narrow_index_overflow_is_rejected() {
        let (vertices, faces) = strip(22_000);
        let result: Result<HalfEdgeMesh<u16>> = build_from_triangles(&vertices, &faces);
        assert_eq!(
            result.err(),
            Some(MeshError::IndexOverflow {
                element: "half-edges",
                count: 66_000,
                limit: 65_535,
            })
        );

        // The same strip fits in 32-bit indices.
        let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
        assert_eq!(mesh.num_halfedges(), 66_000);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_narrow_index_fits_at_limit() {
        // 21845 faces need exactly 65535 half-edges.
        let (vertices, faces) = strip(21_845);
        let mesh: HalfEdgeMesh<u16> = build_from_triangles(&vertices, &faces).unwrap();
        assert_eq!(mesh.num_halfedges(), 65_535);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_build_quad() {
        let (vertices, faces) = quad();
        let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();

        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_faces(), 2);
        assert_eq!(mesh.num_halfedges(), 6);
        assert_eq!(mesh.num_edges(), 5);
        assert!(mesh.is_valid());

        let interior: Vec<_> = mesh.edge_ids().filter(|&e| !mesh.is_boundary_edge(e)).collect();
        assert_eq!(interior.len(), 1);
        let (a, b) = mesh.edge_vertices(interior[0]);
        let mut ends = [a.index(), b.index()];
        ends.sort();
        assert_eq!(ends, [0, 2]);
    }

    #[test]
    fn test_owning_halfedge_is_outgoing() {
        let (vertices, faces) = quad();
        let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
        for (vid, v) in mesh.vertices() {
            assert_eq!(mesh.origin(v.halfedge()), vid);
        }
    }

    #[test]
    fn test_computed_normals() {
        let (vertices, faces) = quad();
        let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
        for (_, v) in mesh.vertices() {
            assert!((v.normal - Vector3::z()).norm() < 1e-12);
        }
    }

    #[test]
    fn test_supplied_normals_are_kept() {
        let (vertices, faces) = quad();
        let normals = vec![Vector3::x(); 4];
        let mesh: HalfEdgeMesh = build_with_normals(&vertices, &normals, &faces).unwrap();
        assert_eq!(mesh.vertex(VertexId::new(3)).normal, Vector3::x());

        let short = vec![Vector3::x(); 3];
        let result: Result<HalfEdgeMesh> = build_with_normals(&vertices, &short, &faces);
        assert!(matches!(result, Err(MeshError::InvalidParameter { .. })));
    }

    #[test]
    fn test_invalid_index() {
        let (vertices, _) = quad();
        let result: Result<HalfEdgeMesh> = build_from_triangles(&vertices, &[[0, 1, 7]]);
        assert_eq!(result.unwrap_err(), MeshError::InvalidVertexIndex { face: 0, vertex: 7 });
    }

    #[test]
    fn test_degenerate_face() {
        let (vertices, _) = quad();
        let result: Result<HalfEdgeMesh> = build_from_triangles(&vertices, &[[0, 1, 2], [3, 3, 1]]);
        assert_eq!(result.unwrap_err(), MeshError::DegenerateFace { face: 1 });
    }

    #[test]
    fn test_empty_faces() {
        let (vertices, _) = quad();
        let result: Result<HalfEdgeMesh> = build_from_triangles(&vertices, &[]);
        assert_eq!(result.unwrap_err(), MeshError::EmptyMesh);
    }

    #[test]
    fn test_inconsistent_winding_rejected() {
        let (vertices, _) = quad();
        // Both faces traverse 0 -> 2.
        let result: Result<HalfEdgeMesh> = build_from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3], [2, 0, 1]]);
        assert!(matches!(result, Err(MeshError::NonManifoldEdge { .. })));

        let result: Result<HalfEdgeMesh> = build_from_triangles(&vertices, &[[0, 1, 2], [0, 3, 2]]);
        assert_eq!(result.unwrap_err(), MeshError::NonManifoldEdge { v0: 2, v1: 0 });
    }

    #[test]
    fn test_to_face_vertex_round_trip() {
        let (vertices, faces) = quad();
        let mesh: HalfEdgeMesh<u16> = build_from_triangles(&vertices, &faces).unwrap();
        let (v, f) = to_face_vertex(&mesh);
        assert_eq!(v, vertices);
        assert_eq!(f, faces);
    }
}
