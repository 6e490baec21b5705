//! The editing context.
//!
//! A [`Document`] owns one mesh together with everything an editing session
//! accumulates on it: the handle set, the cached deformer, the last picked
//! handle and the ingested animation. Every user action is a method call on
//! it; `&mut self` serializes edits.

use nalgebra::{Point3, Vector3};

use crate::algo::arap::{ArapDeformer, DeformOptions, DeformReport};
use crate::algo::pick::{self, Ray, TriangleHit};
use crate::algo::progress::Progress;
use crate::algo::weights::{compute_all, WeightStats};
use crate::anim::{self, AnimationFrame, BakeReport, ControlPoint};
use crate::constraint::ConstraintSet;
use crate::error::{MeshError, Result};
use crate::mesh::{build_with_normals, HalfEdgeMesh, MeshIndex, VertexId};

/// One mesh under edit.
///
/// # Example
///
/// ```
/// use ductile::Document;
/// use nalgebra::{Point3, Vector3};
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(1.0, 1.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// ];
/// let normals = vec![Vector3::z(); 4];
/// let mut doc: Document = Document::load(&vertices, &normals, &[[0, 1, 2], [0, 2, 3]]).unwrap();
///
/// // Click on the corner at the origin, then drag it up.
/// let (v, is_handle) = doc
///     .pick_vertex(Point3::new(0.1, 0.1, 2.0), Point3::new(0.1, 0.1, 1.0))
///     .unwrap();
/// assert!(is_handle);
/// doc.translate_selected(&Vector3::new(0.0, 0.0, 0.5)).unwrap();
/// doc.compute().unwrap();
/// assert_eq!(doc.mesh().position(v).z, 0.5);
///
/// doc.save_pose(1.0).unwrap();
/// ```
#[derive(Debug)]
pub struct Document<I: MeshIndex = u32> {
    mesh: HalfEdgeMesh<I>,
    constraints: ConstraintSet<I>,
    deformer: ArapDeformer,
    selected: Option<VertexId<I>>,
    animation: Vec<AnimationFrame<I>>,
    weight_stats: WeightStats,
}

impl<I: MeshIndex> Document<I> {
    /// Start editing `mesh` with the given solver options.
    pub fn new(mut mesh: HalfEdgeMesh<I>, options: DeformOptions) -> Self {
        let weight_stats = compute_all(&mut mesh);
        let deformer = ArapDeformer::new(&mesh, options);
        log::info!(
            "document: {} vertices, {} faces",
            mesh.num_vertices(),
            mesh.num_faces()
        );
        Self {
            mesh,
            constraints: ConstraintSet::new(),
            deformer,
            selected: None,
            animation: Vec::new(),
            weight_stats,
        }
    }

    /// Build a mesh from positions, normals and triangles and start editing it
    /// with default options.
    pub fn load(
        vertices: &[Point3<f64>],
        normals: &[Vector3<f64>],
        faces: &[[usize; 3]],
    ) -> Result<Self> {
        let mesh = build_with_normals(vertices, normals, faces)?;
        Ok(Self::new(mesh, DeformOptions::default()))
    }

    /// Replace the mesh. Handles, selection and animation are cleared.
    pub fn replace_mesh(&mut self, mesh: HalfEdgeMesh<I>) {
        let options = self.deformer.options().clone();
        *self = Self::new(mesh, options);
    }

    // ==================== Accessors ====================

    /// The mesh.
    pub fn mesh(&self) -> &HalfEdgeMesh<I> {
        &self.mesh
    }

    /// Give up the document, keeping the mesh.
    pub fn into_mesh(self) -> HalfEdgeMesh<I> {
        self.mesh
    }

    /// Current handles.
    pub fn constraints(&self) -> &ConstraintSet<I> {
        &self.constraints
    }

    /// One flag per vertex, `true` for handles.
    pub fn handle_mask(&self) -> Vec<bool> {
        self.constraints.handle_mask(self.mesh.num_vertices())
    }

    /// The handle moved by [`translate_selected`](Self::translate_selected).
    pub fn selected(&self) -> Option<VertexId<I>> {
        self.selected
    }

    /// Solver options.
    pub fn options(&self) -> &DeformOptions {
        self.deformer.options()
    }

    /// Replace the solver options.
    pub fn set_options(&mut self, options: DeformOptions) {
        self.deformer.set_options(options);
    }

    /// Edge weight summary of the current geometry.
    pub fn weight_stats(&self) -> WeightStats {
        self.weight_stats
    }

    /// Current positions.
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.mesh.positions()
    }

    /// Area-weighted normals of the current geometry.
    pub fn normals(&self) -> Vec<Vector3<f64>> {
        self.mesh.vertex_ids().map(|v| self.mesh.vertex_normal(v)).collect()
    }

    /// Attach a free-text label to a vertex.
    pub fn set_label(&mut self, v: VertexId<I>, label: impl Into<String>) -> Result<()> {
        self.mesh.set_label(v, label)
    }

    // ==================== Selection ====================

    /// The triangle under the ray from `origin` through `through`.
    pub fn pick_triangle(&self, origin: Point3<f64>, through: Point3<f64>) -> Option<TriangleHit<I>> {
        let ray = Ray::from_points(origin, through)?;
        pick::pick_triangle(&self.mesh, &ray)
    }

    /// Toggle the vertex under the ray from `origin` through `through`.
    ///
    /// Returns the vertex and whether it is a handle afterwards; `None` if the
    /// ray misses. A new handle is pinned at its current position and becomes
    /// the selected handle.
    pub fn pick_vertex(&mut self, origin: Point3<f64>, through: Point3<f64>) -> Option<(VertexId<I>, bool)> {
        let ray = Ray::from_points(origin, through)?;
        let hit = pick::pick_vertex(&self.mesh, &ray)?;
        let v = hit.vertex;
        let is_handle = self.constraints.toggle(v, *self.mesh.position(v));
        self.selected = if is_handle { Some(v) } else { None };
        log::debug!("picked {:?} (handle: {})", v, is_handle);
        Some((v, is_handle))
    }

    /// Toggle handle membership of `v` directly.
    pub fn toggle_handle(&mut self, v: VertexId<I>) -> Result<bool> {
        self.mesh.check_vertex(v)?;
        let is_handle = self.constraints.toggle(v, *self.mesh.position(v));
        self.selected = if is_handle { Some(v) } else { None };
        Ok(is_handle)
    }

    /// Pin `v` to `target`, making it a handle if it is not one, and select it.
    pub fn set_handle_target(&mut self, v: VertexId<I>, target: Point3<f64>) -> Result<()> {
        self.mesh.check_vertex(v)?;
        self.constraints.insert(v, target);
        self.selected = Some(v);
        Ok(())
    }

    /// Move the selected handle's target by `delta`.
    pub fn translate_selected(&mut self, delta: &Vector3<f64>) -> Result<()> {
        let v = self.selected.ok_or(MeshError::EmptySelection)?;
        if self.constraints.translate(v, delta) {
            Ok(())
        } else {
            Err(MeshError::EmptySelection)
        }
    }

    /// Release every handle.
    pub fn clear_handles(&mut self) {
        self.constraints.clear();
        self.selected = None;
    }

    // ==================== Deformation ====================

    /// Deform the mesh to satisfy the handles.
    ///
    /// On error the positions are unchanged.
    pub fn compute(&mut self) -> Result<DeformReport> {
        let report = self.deformer.deform(&mut self.mesh, &self.constraints)?;
        self.weight_stats = compute_all(&mut self.mesh);
        Ok(report)
    }

    /// Move every vertex back to its rest position.
    pub fn reset_pose(&mut self) {
        self.mesh.reset_to_rest();
        self.weight_stats = compute_all(&mut self.mesh);
    }

    // ==================== Timeline ====================

    /// Record the current pose at `time`.
    pub fn save_pose(&mut self, time: f64) -> Result<()> {
        anim::save_pose(&mut self.mesh, time)
    }

    /// Interpolated pose at `time`, without touching the mesh.
    pub fn pose_at(&self, time: f64) -> Result<Vec<Point3<f64>>> {
        anim::pose_at(&self.mesh, time)
    }

    /// Move the mesh to the interpolated pose at `time`.
    pub fn play(&mut self, time: f64) -> Result<()> {
        anim::apply_pose(&mut self.mesh, time)?;
        self.weight_stats = compute_all(&mut self.mesh);
        Ok(())
    }

    /// Drop every keyframe except the base pose.
    pub fn clear_timeline(&mut self) {
        anim::clear_keyframes(&mut self.mesh);
    }

    /// Sorted keyframe times.
    pub fn keyframe_times(&self) -> Vec<f64> {
        anim::keyframe_times(&self.mesh)
    }

    /// First and last keyframe time.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        anim::time_range(&self.mesh)
    }

    // ==================== Generated animation ====================

    /// The handles described for an external pose generator.
    pub fn control_points(&self) -> Result<Vec<ControlPoint>> {
        anim::control_points(&self.mesh, &self.constraints)
    }

    /// Store externally generated frames and bake them into keyframes
    /// `0.0, 1.0, ...`.
    ///
    /// The handle set and the current pose are the same afterwards as before.
    /// The frames are kept only if baking succeeds; on error
    /// [`animation`](Self::animation) still returns the previous frames.
    pub fn ingest_animation(
        &mut self,
        frames: Vec<AnimationFrame<I>>,
        progress: &Progress,
    ) -> Result<BakeReport> {
        let report = anim::bake_animation(&mut self.mesh, &mut self.deformer, &frames, progress)?;
        self.animation = frames;
        Ok(report)
    }

    /// The most recently ingested frames.
    pub fn animation(&self) -> &[AnimationFrame<I>] {
        &self.animation
    }
}
