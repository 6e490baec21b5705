//! Half-edge mesh data structure.
//!
//! This module provides a half-edge (doubly-connected edge list) representation
//! for triangle meshes, stored as four fixed-size arenas addressed by typed
//! indices.
//!
//! # Structure
//!
//! - Each triangle owns three **half-edges** linked by `next`/`prev` into a cycle
//! - A half-edge stores its **destination** vertex; its origin is the destination
//!   of `prev`
//! - Opposite half-edges of neighboring triangles are **twins** and share one
//!   [`Edge`] record, which carries the cotangent weight
//! - Each vertex stores one outgoing half-edge
//! - Each face stores one half-edge on its boundary
//!
//! # Boundary Handling
//!
//! There are no boundary half-edges: a half-edge on the mesh boundary simply has
//! an invalid `twin`. One-ring traversal walks `next(twin(he))` and, on meeting a
//! missing twin, continues from the start in the opposite direction
//! (`twin(prev(he))`), so boundary fans are enumerated without looping.

use nalgebra::{Point3, Vector3};

use super::index::{EdgeId, FaceId, HalfEdgeId, MeshIndex, VertexId};
use crate::anim::Keyframes;
use crate::error::{MeshError, Result};

/// A vertex in the half-edge mesh.
#[derive(Debug, Clone)]
pub struct Vertex<I: MeshIndex = u32> {
    /// Position at load time. Never changed by deformation or playback.
    pub rest_position: Point3<f64>,

    /// Current (deformed) position.
    pub position: Point3<f64>,

    /// Vertex normal as supplied at load.
    pub normal: Vector3<f64>,

    /// Sum of the cotangent weights of all incident edges.
    pub weight: f64,

    /// Cotangent Laplacian of the position, `Σ w_ij (p_j - p_i)`.
    pub mean_curvature_normal: Vector3<f64>,

    /// Short free-text description (e.g. "left hand").
    pub label: String,

    /// Time-indexed positions recorded for playback.
    pub keyframes: Keyframes,

    /// One outgoing half-edge.
    pub(crate) halfedge: HalfEdgeId<I>,
}

impl<I: MeshIndex> Vertex<I> {
    /// Create a vertex at rest at `position`.
    pub fn new(position: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self {
            rest_position: position,
            position,
            normal,
            weight: 0.0,
            mean_curvature_normal: Vector3::zeros(),
            label: String::new(),
            keyframes: Keyframes::new(),
            halfedge: HalfEdgeId::invalid(),
        }
    }

    /// The outgoing half-edge used to start one-ring traversal.
    #[inline]
    pub fn halfedge(&self) -> HalfEdgeId<I> {
        self.halfedge
    }
}

/// A half-edge in the mesh.
#[derive(Debug, Clone, Copy)]
pub struct HalfEdge<I: MeshIndex = u32> {
    /// The vertex this half-edge points to.
    pub vertex: VertexId<I>,

    /// The opposite half-edge, invalid on the boundary.
    pub twin: HalfEdgeId<I>,

    /// The next half-edge around the face.
    pub next: HalfEdgeId<I>,

    /// The previous half-edge around the face.
    pub prev: HalfEdgeId<I>,

    /// The undirected edge shared with the twin.
    pub edge: EdgeId<I>,

    /// The face this half-edge belongs to.
    pub face: FaceId<I>,

    /// Interior angle of the face at this half-edge's origin, in radians.
    pub angle: f64,
}

impl<I: MeshIndex> HalfEdge<I> {
    /// Create a new unlinked half-edge.
    pub fn new() -> Self {
        Self {
            vertex: VertexId::invalid(),
            twin: HalfEdgeId::invalid(),
            next: HalfEdgeId::invalid(),
            prev: HalfEdgeId::invalid(),
            edge: EdgeId::invalid(),
            face: FaceId::invalid(),
            angle: 0.0,
        }
    }
}

impl<I: MeshIndex> Default for HalfEdge<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// An undirected edge.
#[derive(Debug, Clone, Copy)]
pub struct Edge<I: MeshIndex = u32> {
    /// Representative half-edge; the other side is its twin.
    pub halfedge: HalfEdgeId<I>,

    /// Cotangent weight `½(cot α + cot β)`.
    pub weight: f64,
}

/// A triangle.
#[derive(Debug, Clone, Copy)]
pub struct Face<I: MeshIndex = u32> {
    /// One half-edge on the boundary of this face.
    pub halfedge: HalfEdgeId<I>,
}

/// A half-edge mesh for triangle meshes.
///
/// The arenas are sized at construction and never grow: deformation and
/// playback only move vertices.
#[derive(Debug, Clone)]
pub struct HalfEdgeMesh<I: MeshIndex = u32> {
    pub(crate) vertices: Vec<Vertex<I>>,
    pub(crate) halfedges: Vec<HalfEdge<I>>,
    pub(crate) edges: Vec<Edge<I>>,
    pub(crate) faces: Vec<Face<I>>,
}

impl<I: MeshIndex> HalfEdgeMesh<I> {
    pub(crate) fn with_capacity(num_vertices: usize, num_faces: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(num_vertices),
            halfedges: Vec::with_capacity(num_faces * 3),
            edges: Vec::with_capacity(num_faces * 3 / 2 + 1),
            faces: Vec::with_capacity(num_faces),
        }
    }

    // ==================== Accessors ====================

    /// Get the number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of half-edges.
    #[inline]
    pub fn num_halfedges(&self) -> usize {
        self.halfedges.len()
    }

    /// Get the number of undirected edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Get the number of faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Get a vertex by ID.
    #[inline]
    pub fn vertex(&self, id: VertexId<I>) -> &Vertex<I> {
        &self.vertices[id.index()]
    }

    /// Get a mutable vertex by ID.
    #[inline]
    pub fn vertex_mut(&mut self, id: VertexId<I>) -> &mut Vertex<I> {
        &mut self.vertices[id.index()]
    }

    /// Get a half-edge by ID.
    #[inline]
    pub fn halfedge(&self, id: HalfEdgeId<I>) -> &HalfEdge<I> {
        &self.halfedges[id.index()]
    }

    /// Get an edge by ID.
    #[inline]
    pub fn edge(&self, id: EdgeId<I>) -> &Edge<I> {
        &self.edges[id.index()]
    }

    /// Get a face by ID.
    #[inline]
    pub fn face(&self, id: FaceId<I>) -> &Face<I> {
        &self.faces[id.index()]
    }

    /// Get the current position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId<I>) -> &Point3<f64> {
        &self.vertex(v).position
    }

    /// Get the rest position of a vertex.
    #[inline]
    pub fn rest_position(&self, v: VertexId<I>) -> &Point3<f64> {
        &self.vertex(v).rest_position
    }

    /// Set the current position of a vertex.
    #[inline]
    pub fn set_position(&mut self, v: VertexId<I>, pos: Point3<f64>) {
        self.vertex_mut(v).position = pos;
    }

    /// Snapshot of all current positions, indexed by vertex.
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.vertices.iter().map(|v| v.position).collect()
    }

    /// Snapshot of all rest positions, indexed by vertex.
    pub fn rest_positions(&self) -> Vec<Point3<f64>> {
        self.vertices.iter().map(|v| v.rest_position).collect()
    }

    /// Overwrite all current positions.
    pub fn set_positions(&mut self, positions: &[Point3<f64>]) -> Result<()> {
        if positions.len() != self.vertices.len() {
            return Err(MeshError::invalid_param(
                "positions.len()",
                positions.len(),
                "must equal the number of vertices",
            ));
        }
        for (v, p) in self.vertices.iter_mut().zip(positions) {
            v.position = *p;
        }
        Ok(())
    }

    /// Move every vertex back to its rest position.
    pub fn reset_to_rest(&mut self) {
        for v in &mut self.vertices {
            v.position = v.rest_position;
        }
    }

    /// Attach a free-text label to a vertex.
    pub fn set_label(&mut self, v: VertexId<I>, label: impl Into<String>) -> Result<()> {
        self.check_vertex(v)?;
        self.vertex_mut(v).label = label.into();
        Ok(())
    }

    /// Return an error unless `v` addresses a vertex of this mesh.
    pub fn check_vertex(&self, v: VertexId<I>) -> Result<()> {
        if v.is_valid() && v.index() < self.vertices.len() {
            Ok(())
        } else {
            Err(MeshError::InvalidVertex {
                vertex: v.index(),
                count: self.vertices.len(),
            })
        }
    }

    // ==================== Topology Queries ====================

    /// Get the twin half-edge (invalid on the boundary).
    #[inline]
    pub fn twin(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).twin
    }

    /// Get the next half-edge around the face.
    #[inline]
    pub fn next(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).next
    }

    /// Get the previous half-edge around the face.
    #[inline]
    pub fn prev(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).prev
    }

    /// Get the destination vertex of a half-edge.
    #[inline]
    pub fn dest(&self, he: HalfEdgeId<I>) -> VertexId<I> {
        self.halfedge(he).vertex
    }

    /// Get the origin vertex of a half-edge.
    #[inline]
    pub fn origin(&self, he: HalfEdgeId<I>) -> VertexId<I> {
        self.dest(self.prev(he))
    }

    /// Get the edge a half-edge belongs to.
    #[inline]
    pub fn edge_of(&self, he: HalfEdgeId<I>) -> EdgeId<I> {
        self.halfedge(he).edge
    }

    /// Get the face of a half-edge.
    #[inline]
    pub fn face_of(&self, he: HalfEdgeId<I>) -> FaceId<I> {
        self.halfedge(he).face
    }

    /// Whether a half-edge lies on the mesh boundary (has no twin).
    #[inline]
    pub fn is_boundary_halfedge(&self, he: HalfEdgeId<I>) -> bool {
        !self.twin(he).is_valid()
    }

    /// Whether an edge lies on the mesh boundary.
    #[inline]
    pub fn is_boundary_edge(&self, e: EdgeId<I>) -> bool {
        self.is_boundary_halfedge(self.edge(e).halfedge)
    }

    /// Whether a vertex lies on the mesh boundary. Isolated vertices count as
    /// boundary.
    pub fn is_boundary_vertex(&self, v: VertexId<I>) -> bool {
        if !self.vertex(v).halfedge.is_valid() {
            return true;
        }
        self.vertex_halfedges(v).any(|he| {
            self.is_boundary_halfedge(he) || self.is_boundary_halfedge(self.prev(he))
        })
    }

    /// The two endpoints of an edge.
    pub fn edge_vertices(&self, e: EdgeId<I>) -> (VertexId<I>, VertexId<I>) {
        let he = self.edge(e).halfedge;
        (self.origin(he), self.dest(he))
    }

    // ==================== Iteration ====================

    /// Iterate over all vertex IDs.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId<I>> + '_ {
        (0..self.vertices.len()).map(VertexId::new)
    }

    /// Iterate over all vertices with their IDs.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId<I>, &Vertex<I>)> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (VertexId::new(i), v))
    }

    /// Iterate over all half-edge IDs.
    pub fn halfedge_ids(&self) -> impl Iterator<Item = HalfEdgeId<I>> + '_ {
        (0..self.halfedges.len()).map(HalfEdgeId::new)
    }

    /// Iterate over all edge IDs.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId<I>> + '_ {
        (0..self.edges.len()).map(EdgeId::new)
    }

    /// Iterate over all face IDs.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId<I>> + '_ {
        (0..self.faces.len()).map(FaceId::new)
    }

    /// Iterate over the outgoing half-edges of a vertex.
    pub fn vertex_halfedges(&self, v: VertexId<I>) -> VertexHalfEdgeIter<'_, I> {
        VertexHalfEdgeIter::new(self, v)
    }

    /// Iterate over every edge incident to a vertex, each exactly once.
    ///
    /// On a boundary fan the final incoming edge has no outgoing counterpart;
    /// it is yielded after the outgoing half-edge of the same face.
    pub fn vertex_edges(&self, v: VertexId<I>) -> impl Iterator<Item = EdgeId<I>> + '_ {
        self.vertex_halfedges(v).flat_map(move |he| {
            let p = self.prev(he);
            let dangling = if self.is_boundary_halfedge(p) {
                Some(self.edge_of(p))
            } else {
                None
            };
            std::iter::once(self.edge_of(he)).chain(dangling)
        })
    }

    /// Iterate over vertices adjacent to a vertex, each exactly once.
    pub fn vertex_neighbors(&self, v: VertexId<I>) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.vertex_halfedges(v).flat_map(move |he| {
            let p = self.prev(he);
            let dangling = if self.is_boundary_halfedge(p) {
                Some(self.origin(p))
            } else {
                None
            };
            std::iter::once(self.dest(he)).chain(dangling)
        })
    }

    /// Iterate over faces adjacent to a vertex.
    pub fn vertex_faces(&self, v: VertexId<I>) -> impl Iterator<Item = FaceId<I>> + '_ {
        self.vertex_halfedges(v).map(|he| self.face_of(he))
    }

    /// The three half-edges of a face, starting at the stored one.
    pub fn face_halfedges(&self, f: FaceId<I>) -> [HalfEdgeId<I>; 3] {
        let he0 = self.face(f).halfedge;
        let he1 = self.next(he0);
        [he0, he1, self.next(he1)]
    }

    /// Get the three vertices of a face in winding order.
    pub fn face_triangle(&self, f: FaceId<I>) -> [VertexId<I>; 3] {
        let [he0, he1, he2] = self.face_halfedges(f);
        [self.dest(he2), self.dest(he0), self.dest(he1)]
    }

    /// Get the current positions of the three vertices of a face.
    pub fn face_positions(&self, f: FaceId<I>) -> [Point3<f64>; 3] {
        let [v0, v1, v2] = self.face_triangle(f);
        [*self.position(v0), *self.position(v1), *self.position(v2)]
    }

    // ==================== Geometry ====================

    /// Compute the unit normal of a face.
    pub fn face_normal(&self, f: FaceId<I>) -> Vector3<f64> {
        let [p0, p1, p2] = self.face_positions(f);
        (p1 - p0).cross(&(p2 - p0)).normalize()
    }

    /// Compute the area of a face.
    pub fn face_area(&self, f: FaceId<I>) -> f64 {
        let [p0, p1, p2] = self.face_positions(f);
        0.5 * (p1 - p0).cross(&(p2 - p0)).norm()
    }

    /// Compute the area-weighted normal at a vertex from current positions.
    pub fn vertex_normal(&self, v: VertexId<I>) -> Vector3<f64> {
        let mut normal = Vector3::zeros();
        for f in self.vertex_faces(v) {
            let [p0, p1, p2] = self.face_positions(f);
            normal += (p1 - p0).cross(&(p2 - p0));
        }
        normal.try_normalize(1e-300).unwrap_or_else(Vector3::zeros)
    }

    /// Compute the length of an edge at current positions.
    pub fn edge_length(&self, e: EdgeId<I>) -> f64 {
        let (a, b) = self.edge_vertices(e);
        (self.position(b) - self.position(a)).norm()
    }

    /// Number of edges incident to a vertex.
    pub fn valence(&self, v: VertexId<I>) -> usize {
        self.vertex_edges(v).count()
    }

    /// Compute the axis-aligned bounding box of the current positions.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.vertices.first()?.position;
        let mut min = first;
        let mut max = first;
        for v in &self.vertices {
            for i in 0..3 {
                min[i] = min[i].min(v.position[i]);
                max[i] = max[i].max(v.position[i]);
            }
        }
        Some((min, max))
    }

    /// Length of the bounding-box diagonal (0 for an empty mesh).
    pub fn bounding_diagonal(&self) -> f64 {
        self.bounding_box()
            .map(|(min, max)| (max - min).norm())
            .unwrap_or(0.0)
    }

    // ==================== Validation ====================

    /// Check every connectivity invariant of the structure.
    pub fn is_valid(&self) -> bool {
        for (vid, v) in self.vertices() {
            if v.halfedge.is_valid() && self.origin(v.halfedge) != vid {
                return false;
            }
        }

        for heid in self.halfedge_ids() {
            let he = self.halfedge(heid);
            if self.prev(he.next) != heid || self.next(he.prev) != heid {
                return false;
            }
            if self.next(self.next(he.next)) != heid {
                return false;
            }
            if he.twin.is_valid() {
                let twin = self.halfedge(he.twin);
                if twin.twin != heid || twin.edge != he.edge {
                    return false;
                }
                if twin.vertex != self.origin(heid) {
                    return false;
                }
            }
            if !he.edge.is_valid() || !he.face.is_valid() {
                return false;
            }
        }

        for eid in self.edge_ids() {
            if self.edge_of(self.edge(eid).halfedge) != eid {
                return false;
            }
        }

        for fid in self.face_ids() {
            if self.face_of(self.face(fid).halfedge) != fid {
                return false;
            }
        }

        true
    }
}

/// Iterator over the outgoing half-edges of a vertex.
///
/// Walks `next(twin(he))` from the vertex's stored half-edge. If a twin is
/// missing the walk restarts at the stored half-edge and proceeds the other way
/// via `twin(prev(he))` until that side's boundary is reached.
pub struct VertexHalfEdgeIter<'a, I: MeshIndex = u32> {
    mesh: &'a HalfEdgeMesh<I>,
    start: HalfEdgeId<I>,
    current: HalfEdgeId<I>,
    backward: bool,
    remaining: usize,
    done: bool,
}

impl<'a, I: MeshIndex> VertexHalfEdgeIter<'a, I> {
    fn new(mesh: &'a HalfEdgeMesh<I>, v: VertexId<I>) -> Self {
        let start = mesh.vertex(v).halfedge;
        Self {
            mesh,
            start,
            current: start,
            backward: false,
            remaining: mesh.num_halfedges(),
            done: !start.is_valid(),
        }
    }

    /// Previous outgoing half-edge around the origin, if the face across
    /// exists.
    fn step_back(&self, he: HalfEdgeId<I>) -> Option<HalfEdgeId<I>> {
        self.mesh.twin(self.mesh.prev(he)).valid()
    }
}

impl<'a, I: MeshIndex> Iterator for VertexHalfEdgeIter<'a, I> {
    type Item = HalfEdgeId<I>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current;

        // Non-manifold input can form fans that never return to the start.
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.done = true;
            return Some(result);
        }

        let following = if self.backward {
            self.step_back(self.current)
        } else {
            match self.mesh.twin(self.current).valid() {
                Some(twin) => {
                    let next = self.mesh.next(twin);
                    if next == self.start {
                        None
                    } else {
                        Some(next)
                    }
                }
                None => {
                    self.backward = true;
                    self.step_back(self.start)
                }
            }
        };

        match following {
            Some(he) => self.current = he,
            None => self.done = true,
        }

        Some(result)
    }
}
