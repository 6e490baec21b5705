//! Ray picking of triangles and vertices.
//!
//! Rays are tested against every triangle at its current position with the
//! Möller–Trumbore algorithm; the closest hit in front of the origin wins.
//! A vertex pick chooses the corner of the winning triangle nearest to the hit
//! point.
//!
//! # Example
//!
//! ```
//! use ductile::prelude::*;
//! use ductile::algo::pick::{pick_vertex, Ray};
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
//!
//! let ray = Ray::from_points(Point3::new(0.9, 0.05, 1.0), Point3::new(0.9, 0.05, 0.5)).unwrap();
//! let hit = pick_vertex(&mesh, &ray).unwrap();
//! assert_eq!(hit.vertex, VertexId::new(1));
//! ```

use nalgebra::{Point3, Unit, Vector3};

use crate::mesh::{FaceId, HalfEdgeMesh, MeshIndex, VertexId};

/// Determinant threshold below which a ray counts as parallel to a triangle.
const PARALLEL_EPSILON: f64 = 1e-6;

/// Hits at or closer than this distance along the ray are ignored.
const MIN_DISTANCE: f64 = 1e-6;

/// A half-line with a unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Start point.
    pub origin: Point3<f64>,
    /// Unit direction.
    pub direction: Unit<Vector3<f64>>,
}

impl Ray {
    /// Ray from `origin` in `direction`. `None` for a zero or non-finite
    /// direction.
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Option<Self> {
        if !direction.iter().all(|c| c.is_finite()) {
            return None;
        }
        let direction = Unit::try_new(direction, 0.0)?;
        Some(Self { origin, direction })
    }

    /// Ray from `origin` through `through`, e.g. a camera position and a point
    /// on the near plane.
    pub fn from_points(origin: Point3<f64>, through: Point3<f64>) -> Option<Self> {
        Self::new(origin, through - origin)
    }

    /// Point at distance `t` along the ray.
    #[inline]
    pub fn at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction.as_ref() * t
    }
}

/// Closest ray/triangle intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit<I: MeshIndex = u32> {
    /// The hit triangle.
    pub face: FaceId<I>,
    /// Distance along the ray.
    pub t: f64,
    /// Barycentric weight of the second corner.
    pub u: f64,
    /// Barycentric weight of the third corner.
    pub v: f64,
    /// Intersection point.
    pub point: Point3<f64>,
}

/// Vertex chosen by a pick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexHit<I: MeshIndex = u32> {
    /// The picked vertex.
    pub vertex: VertexId<I>,
    /// The triangle the ray hit.
    pub face: FaceId<I>,
    /// Distance from the intersection point to the vertex.
    pub distance: f64,
}

/// Möller–Trumbore intersection. Returns `(t, u, v)`.
pub fn intersect_triangle(ray: &Ray, triangle: &[Point3<f64>; 3]) -> Option<(f64, f64, f64)> {
    let [v0, v1, v2] = triangle;
    let dir = ray.direction.as_ref();
    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let h = dir.cross(&e2);
    let a = e1.dot(&h);
    if a.abs() < PARALLEL_EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&e1);
    let v = f * dir.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    Some((f * e2.dot(&q), u, v))
}

/// The triangle hit first by `ray`, if any.
pub fn pick_triangle<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, ray: &Ray) -> Option<TriangleHit<I>> {
    let mut best: Option<TriangleHit<I>> = None;
    for f in mesh.face_ids() {
        let Some((t, u, v)) = intersect_triangle(ray, &mesh.face_positions(f)) else {
            continue;
        };
        if t <= MIN_DISTANCE || best.is_some_and(|b| t >= b.t) {
            continue;
        }
        best = Some(TriangleHit {
            face: f,
            t,
            u,
            v,
            point: ray.at(t),
        });
    }
    if let Some(hit) = &best {
        log::debug!("ray hit {:?} at t = {}", hit.face, hit.t);
    }
    best
}

/// The corner of the first-hit triangle nearest to the intersection point.
pub fn pick_vertex<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, ray: &Ray) -> Option<VertexHit<I>> {
    let hit = pick_triangle(mesh, ray)?;
    let mut best: Option<VertexHit<I>> = None;
    for v in mesh.face_triangle(hit.face) {
        let distance = (mesh.position(v) - hit.point).norm();
        if best.map_or(true, |b| distance < b.distance) {
            best = Some(VertexHit {
                vertex: v,
                face: hit.face,
                distance,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_from_triangles;

    /// Two parallel unit triangles at z = 0 and z = -1.
    fn stacked() -> HalfEdgeMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, -1.0),
            Point3::new(1.0, 0.0, -1.0),
            Point3::new(0.0, 1.0, -1.0),
        ];
        build_from_triangles(&vertices, &[[3, 4, 5], [0, 1, 2]]).unwrap()
    }

    fn down_from(x: f64, y: f64) -> Ray {
        Ray::new(Point3::new(x, y, 5.0), Vector3::new(0.0, 0.0, -3.0)).unwrap()
    }

    #[test]
    fn test_ray_is_normalized() {
        let ray = down_from(0.0, 0.0);
        assert!((ray.direction.norm() - 1.0).abs() < 1e-15);
        assert_eq!(ray.at(5.0), Point3::origin());
        assert!(Ray::new(Point3::origin(), Vector3::zeros()).is_none());
        assert!(Ray::from_points(Point3::origin(), Point3::origin()).is_none());
    }

    #[test]
    fn test_closest_triangle_wins() {
        let mesh = stacked();
        let hit = pick_triangle(&mesh, &down_from(0.2, 0.2)).unwrap();
        assert_eq!(hit.face, FaceId::new(1));
        assert!((hit.t - 5.0).abs() < 1e-12);
        assert!((hit.point - Point3::new(0.2, 0.2, 0.0)).norm() < 1e-12);
        assert!((hit.u - 0.2).abs() < 1e-12 && (hit.v - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_miss() {
        let mesh = stacked();
        assert!(pick_triangle(&mesh, &down_from(0.8, 0.8)).is_none());
        // Pointing away from the mesh.
        let up = Ray::new(Point3::new(0.2, 0.2, 5.0), Vector3::z()).unwrap();
        assert!(pick_triangle(&mesh, &up).is_none());
        // Grazing: parallel to the triangles.
        let side = Ray::new(Point3::new(-1.0, 0.2, 0.0), Vector3::x()).unwrap();
        assert!(pick_triangle(&mesh, &side).is_none());
    }

    #[test]
    fn test_origin_on_surface_is_ignored() {
        let mesh = stacked();
        let ray = Ray::new(Point3::new(0.2, 0.2, 0.0), -Vector3::z()).unwrap();
        let hit = pick_triangle(&mesh, &ray).unwrap();
        assert_eq!(hit.face, FaceId::new(0));
    }

    #[test]
    fn test_pick_nearest_corner() {
        let mesh = stacked();
        let hit = pick_vertex(&mesh, &down_from(0.1, 0.8)).unwrap();
        assert_eq!(hit.vertex, VertexId::new(2));
        assert_eq!(hit.face, FaceId::new(1));
        assert!((hit.distance - (0.01f64 + 0.04).sqrt()).abs() < 1e-12);
        assert!(pick_vertex(&mesh, &down_from(2.0, 2.0)).is_none());
    }

    #[test]
    fn test_pick_uses_current_positions() {
        let mut mesh = stacked();
        for idx in 0..3 {
            let v = VertexId::new(idx);
            let p = *mesh.position(v);
            mesh.set_position(v, p + Vector3::new(5.0, 0.0, 0.0));
        }
        let hit = pick_triangle(&mesh, &down_from(0.2, 0.2)).unwrap();
        assert_eq!(hit.face, FaceId::new(0));
    }
}
