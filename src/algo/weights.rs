//! Discrete differential-geometry quantities stored on the mesh.
//!
//! - **Interior angles**: every half-edge caches the angle of its triangle at
//!   its origin vertex.
//! - **Cotangent weights**: every edge stores `½(cot α + cot β)`, where α and β
//!   are the angles opposite the edge in its one or two incident triangles.
//! - **Vertex weights**: every vertex stores the sum of its incident edge
//!   weights and the cotangent Laplacian `Σ_j w_ij (p_j − p_i)`, which is the
//!   (unnormalized) mean-curvature normal.
//!
//! All quantities are computed from the current positions. Call
//! [`compute_all`] after the geometry changes.
//!
//! # Example
//!
//! ```
//! use ductile::prelude::*;
//! use ductile::algo::weights::compute_all;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let mut mesh: HalfEdgeMesh = build_from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap();
//!
//! let stats = compute_all(&mut mesh);
//! assert_eq!(stats.num_edges, 5);
//! assert!((stats.max - 0.5).abs() < 1e-12);
//! ```

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::mesh::{EdgeId, HalfEdgeId, HalfEdgeMesh, MeshIndex};

/// Summary of the edge weights, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightStats {
    /// Number of edges.
    pub num_edges: usize,
    /// Smallest edge weight.
    pub min: f64,
    /// Largest edge weight.
    pub max: f64,
    /// Mean edge weight.
    pub mean: f64,
    /// Edges with a negative weight (both opposite angles obtuse enough).
    pub negative: usize,
}

/// Angle at vertex `a` in triangle (a, b, c).
fn triangle_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ab = (b - a).try_normalize(0.0);
    let ac = (c - a).try_normalize(0.0);
    match (ab, ac) {
        (Some(ab), Some(ac)) => ab.dot(&ac).clamp(-1.0, 1.0).acos(),
        _ => 0.0,
    }
}

/// Cotangent of the angle at vertex `a` in triangle (a, b, c).
///
/// Zero for a degenerate corner.
pub fn cotangent_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;
    let cross_norm = ab.cross(&ac).norm();
    if cross_norm <= f64::EPSILON * ab.norm() * ac.norm() {
        0.0
    } else {
        ab.dot(&ac) / cross_norm
    }
}

/// Half of the cotangent of the angle opposite `he` in its triangle.
fn half_cot_opposite<I: MeshIndex>(
    mesh: &HalfEdgeMesh<I>,
    positions: &[Point3<f64>],
    he: HalfEdgeId<I>,
) -> f64 {
    let a = mesh.origin(he).index();
    let b = mesh.dest(he).index();
    let c = mesh.dest(mesh.next(he)).index();
    0.5 * cotangent_angle(&positions[c], &positions[a], &positions[b])
}

/// Cotangent weight of one edge for the given positions.
pub fn edge_cotangent_weight<I: MeshIndex>(
    mesh: &HalfEdgeMesh<I>,
    positions: &[Point3<f64>],
    e: EdgeId<I>,
) -> f64 {
    let he = mesh.edge(e).halfedge;
    let mut w = half_cot_opposite(mesh, positions, he);
    if let Some(twin) = mesh.twin(he).valid() {
        w += half_cot_opposite(mesh, positions, twin);
    }
    w
}

/// Cotangent weights of every edge for an arbitrary set of positions.
///
/// `positions` is indexed by vertex. Used to fix the rest-pose weights of the
/// deformation system without touching the stored ones.
pub fn cotangent_weights<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, positions: &[Point3<f64>]) -> Vec<f64> {
    debug_assert_eq!(positions.len(), mesh.num_vertices());
    (0..mesh.num_edges())
        .into_par_iter()
        .map(|e| edge_cotangent_weight(mesh, positions, EdgeId::new(e)))
        .collect()
}

/// Store the interior angle at the origin of every half-edge.
pub fn compute_interior_angles<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>) {
    let angles: Vec<f64> = mesh
        .halfedge_ids()
        .map(|he| {
            let a = mesh.position(mesh.origin(he));
            let b = mesh.position(mesh.dest(he));
            let c = mesh.position(mesh.dest(mesh.next(he)));
            triangle_angle(a, b, c)
        })
        .collect();
    for (he, angle) in mesh.halfedges.iter_mut().zip(angles) {
        he.angle = angle;
    }
}

/// Store the cotangent weight of every edge, from current positions.
pub fn compute_cotangent_weights<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>) {
    let positions = mesh.positions();
    let weights = cotangent_weights(mesh, &positions);
    for (edge, w) in mesh.edges.iter_mut().zip(weights) {
        edge.weight = w;
    }
}

/// Store each vertex's weight sum and mean-curvature normal.
///
/// Reads the edge weights, so [`compute_cotangent_weights`] must run first.
pub fn compute_vertex_weights<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>) {
    let mut sums = vec![0.0; mesh.num_vertices()];
    let mut laplacian = vec![Vector3::zeros(); mesh.num_vertices()];

    for e in mesh.edge_ids() {
        let w = mesh.edge(e).weight;
        let (a, b) = mesh.edge_vertices(e);
        let d = mesh.position(b) - mesh.position(a);
        sums[a.index()] += w;
        sums[b.index()] += w;
        laplacian[a.index()] += d * w;
        laplacian[b.index()] -= d * w;
    }

    for (v, (sum, lap)) in mesh.vertices.iter_mut().zip(sums.into_iter().zip(laplacian)) {
        v.weight = sum;
        v.mean_curvature_normal = lap;
    }
}

/// Recompute angles, edge weights and vertex weights, in that order.
pub fn compute_all<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>) -> WeightStats {
    compute_interior_angles(mesh);
    compute_cotangent_weights(mesh);
    compute_vertex_weights(mesh);

    let stats = weight_stats(mesh);
    log::debug!(
        "cotangent weights over {} edges: min {:.4}, max {:.4}, mean {:.4}, {} negative",
        stats.num_edges,
        stats.min,
        stats.max,
        stats.mean,
        stats.negative
    );
    stats
}

/// Summarize the stored edge weights.
pub fn weight_stats<I: MeshIndex>(mesh: &HalfEdgeMesh<I>) -> WeightStats {
    let n = mesh.num_edges();
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut negative = 0;
    for edge in &mesh.edges {
        min = min.min(edge.weight);
        max = max.max(edge.weight);
        sum += edge.weight;
        if edge.weight < 0.0 {
            negative += 1;
        }
    }
    if n == 0 {
        min = 0.0;
        max = 0.0;
    }
    WeightStats {
        num_edges: n,
        min,
        max,
        mean: if n > 0 { sum / n as f64 } else { 0.0 },
        negative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{build_from_triangles, VertexId};
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn quad() -> HalfEdgeMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        build_from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap()
    }

    fn tetrahedron() -> HalfEdgeMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];
        let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
        build_from_triangles(&vertices, &faces).unwrap()
    }

    #[test]
    fn test_cotangent_of_known_angles() {
        let o = Point3::origin();
        let x = Point3::new(1.0, 0.0, 0.0);
        assert!(cotangent_angle(&o, &x, &Point3::new(0.0, 1.0, 0.0)).abs() < 1e-12);
        assert!((cotangent_angle(&o, &x, &Point3::new(1.0, 1.0, 0.0)) - 1.0).abs() < 1e-12);
        assert_eq!(cotangent_angle(&o, &x, &Point3::new(2.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_interior_angles_sum_to_pi() {
        let mut mesh = tetrahedron();
        compute_interior_angles(&mut mesh);
        for f in mesh.face_ids() {
            let sum: f64 = mesh.face_halfedges(f).iter().map(|&he| mesh.halfedge(he).angle).sum();
            assert!((sum - std::f64::consts::PI).abs() < 1e-12);
        }
    }

    #[test]
    fn test_quad_angles() {
        let mut mesh = quad();
        compute_interior_angles(&mut mesh);
        for he in mesh.halfedge_ids() {
            let angle = mesh.halfedge(he).angle;
            let expected = if mesh.origin(he).index() % 2 == 1 { FRAC_PI_2 } else { FRAC_PI_4 };
            assert!((angle - expected).abs() < 1e-12, "{:?}: {}", he, angle);
        }
    }

    #[test]
    fn test_quad_weights() {
        let mut mesh = quad();
        compute_all(&mut mesh);
        for e in mesh.edge_ids() {
            let w = mesh.edge(e).weight;
            if mesh.is_boundary_edge(e) {
                // Single 45° opposite angle.
                assert!((w - 0.5).abs() < 1e-12);
            } else {
                // Both opposite angles are right angles.
                assert!(w.abs() < 1e-12);
            }
        }
        for (_, v) in mesh.vertices() {
            assert!((v.weight - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_weight_is_symmetric() {
        let mut mesh = tetrahedron();
        compute_cotangent_weights(&mut mesh);
        let positions = mesh.positions();
        for e in mesh.edge_ids() {
            let he = mesh.edge(e).halfedge;
            let twin = mesh.twin(he);
            // Summing from either side gives the stored value.
            let from_twin = half_cot_opposite(&mesh, &positions, twin) + half_cot_opposite(&mesh, &positions, he);
            assert!((mesh.edge(e).weight - from_twin).abs() < 1e-14);
            assert_eq!(mesh.edge_of(he), mesh.edge_of(twin));
        }
    }

    #[test]
    fn test_laplacian_of_flat_interior_vertex_vanishes() {
        // Regular hexagon fan: the center has zero mean-curvature normal.
        let mut vertices = vec![Point3::origin()];
        for k in 0..6 {
            let a = k as f64 * std::f64::consts::PI / 3.0;
            vertices.push(Point3::new(a.cos(), a.sin(), 0.0));
        }
        let faces: Vec<[usize; 3]> = (0..6).map(|k| [0, 1 + k, 1 + (k + 1) % 6]).collect();
        let mut mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
        compute_all(&mut mesh);

        let center = mesh.vertex(VertexId::new(0));
        assert!(center.mean_curvature_normal.norm() < 1e-12);
        assert!(center.weight > 0.0);
    }

    #[test]
    fn test_stats() {
        let mut mesh = quad();
        let stats = compute_all(&mut mesh);
        assert_eq!(stats.num_edges, 5);
        assert_eq!(stats.negative, 0);
        assert!(stats.min.abs() < 1e-12);
        assert!((stats.mean - 0.4).abs() < 1e-12);
    }
}
