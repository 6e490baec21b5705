//! As-Rigid-As-Possible (ARAP) surface deformation.
//!
//! Given handle vertices pinned to target positions, ARAP finds positions for
//! the remaining vertices so that every one-ring is, as closely as possible, a
//! rotated copy of its rest shape. The algorithm alternates between:
//!
//! 1. **Local step**: fit a rotation `R_i` per vertex to the rest and current
//!    edge vectors of its one-ring.
//! 2. **Global step**: solve the cotangent Laplacian system `L p = b` with
//!    `b_i = Σ_j (w_ij / 2)(R_i + R_j)(p⁰_i − p⁰_j)` for the free vertices.
//!
//! The Laplacian uses cotangent weights of the rest pose and only depends on
//! which vertices are handles, so its Cholesky factor is computed once and
//! reused until the handle set changes.
//!
//! # Example
//!
//! ```
//! use ductile::prelude::*;
//! use ductile::algo::arap::{ArapDeformer, DeformOptions};
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
//! let mut handles = ConstraintSet::new();
//! handles.insert(VertexId::new(0), Point3::new(0.0, 0.0, 1.0));
//! handles.insert(VertexId::new(1), Point3::new(1.0, 0.0, 0.0));
//!
//! let mut deformer = ArapDeformer::new(&mesh, DeformOptions::default());
//! let report = deformer.deform(&mut mesh, &handles).unwrap();
//! assert!(report.iterations > 0);
//! assert_eq!(mesh.position(VertexId::new(0)), &Point3::new(0.0, 0.0, 1.0));
//! ```
//!
//! # References
//!
//! - Sorkine, O., & Alexa, M. (2007). "As-Rigid-As-Possible Surface
//!   Modeling." SGP 2007.

use nalgebra::{DVector, Matrix3, Point3, Vector3};
use rayon::prelude::*;

use crate::constraint::ConstraintSet;
use crate::error::{MeshError, Result};
use crate::mesh::{HalfEdgeMesh, MeshIndex, VertexId};

use super::sparse::{CsrMatrix, SkylineCholesky};
use super::weights::cotangent_weights;

/// What to do when a solve is requested with no handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorPolicy {
    /// Pin the lowest-numbered vertex that lies on an edge at its current
    /// position.
    #[default]
    FirstVertex,
    /// Fail with [`MeshError::EmptySelection`].
    Reject,
}

/// Starting positions of the free vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialGuess {
    /// The mesh's current positions.
    #[default]
    Current,
    /// The rest positions.
    Rest,
}

/// Options for ARAP deformation.
#[derive(Debug, Clone)]
pub struct DeformOptions {
    /// Maximum number of local/global iterations.
    pub max_iterations: usize,

    /// Convergence threshold on the largest per-vertex displacement between
    /// iterations, relative to the rest bounding-box diagonal.
    pub tolerance: f64,

    /// Behavior with no handles.
    pub anchor: AnchorPolicy,

    /// Starting positions.
    pub initial_guess: InitialGuess,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl Default for DeformOptions {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            tolerance: 1e-6,
            anchor: AnchorPolicy::FirstVertex,
            initial_guess: InitialGuess::Current,
            parallel: true,
        }
    }
}

impl DeformOptions {
    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the relative convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the no-handle policy.
    pub fn with_anchor(mut self, anchor: AnchorPolicy) -> Self {
        self.anchor = anchor;
        self
    }

    /// Set the starting positions.
    pub fn with_initial_guess(mut self, initial_guess: InitialGuess) -> Self {
        self.initial_guess = initial_guess;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(MeshError::invalid_param(
                "max_iterations",
                self.max_iterations,
                "must be at least 1",
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(MeshError::invalid_param(
                "tolerance",
                self.tolerance,
                "must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

/// Outcome of a solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeformReport {
    /// Local/global iterations performed.
    pub iterations: usize,
    /// Whether the displacement dropped below the tolerance.
    pub converged: bool,
    /// Largest per-vertex displacement in the last iteration.
    pub max_displacement: f64,
}

/// Solved positions together with their report.
#[derive(Debug, Clone)]
pub struct Deformation {
    /// One position per vertex; handles sit exactly on their targets.
    pub positions: Vec<Point3<f64>>,
    /// Iteration summary.
    pub report: DeformReport,
}

/// Factored free-vertex block for one handle set.
#[derive(Debug, Clone)]
struct System {
    handles: Vec<usize>,
    /// Free vertex of each matrix row.
    free: Vec<usize>,
    factor: SkylineCholesky,
}

/// ARAP deformer bound to the rest pose of one mesh.
///
/// Holds the rest positions, the rest-pose cotangent weights and the cached
/// factorization.
#[derive(Debug, Clone)]
pub struct ArapDeformer {
    options: DeformOptions,
    rest: Vec<Point3<f64>>,
    /// Neighbors of each vertex with their edge weight.
    adjacency: Vec<Vec<(usize, f64)>>,
    /// Rest bounding-box diagonal.
    scale: f64,
    system: Option<System>,
    factorizations: usize,
}

impl ArapDeformer {
    /// Prepare a deformer for `mesh`, reading its rest positions.
    pub fn new<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, options: DeformOptions) -> Self {
        let rest = mesh.rest_positions();
        let weights = cotangent_weights(mesh, &rest);

        let mut adjacency = vec![Vec::new(); mesh.num_vertices()];
        for (e, w) in mesh.edge_ids().zip(weights) {
            let (a, b) = mesh.edge_vertices(e);
            adjacency[a.index()].push((b.index(), w));
            adjacency[b.index()].push((a.index(), w));
        }

        let scale = bounding_diagonal(&rest);
        Self {
            options,
            rest,
            adjacency,
            scale,
            system: None,
            factorizations: 0,
        }
    }

    /// Current options.
    pub fn options(&self) -> &DeformOptions {
        &self.options
    }

    /// Replace the options. The factorization is kept.
    pub fn set_options(&mut self, options: DeformOptions) {
        self.options = options;
    }

    /// Drop the cached factorization.
    pub fn invalidate(&mut self) {
        self.system = None;
    }

    /// Number of factorizations performed so far.
    pub fn factorization_count(&self) -> usize {
        self.factorizations
    }

    /// Solve and write the result into the mesh's current positions.
    ///
    /// On error the mesh is left untouched.
    pub fn deform<I: MeshIndex>(
        &mut self,
        mesh: &mut HalfEdgeMesh<I>,
        constraints: &ConstraintSet<I>,
    ) -> Result<DeformReport> {
        let Deformation { positions, report } = self.solve(mesh, constraints)?;
        mesh.set_positions(&positions)?;
        Ok(report)
    }

    /// Solve for new positions without modifying the mesh.
    ///
    /// # Errors
    ///
    /// - [`MeshError::InvalidVertex`] if a handle is out of range
    /// - [`MeshError::EmptySelection`] with no handles and [`AnchorPolicy::Reject`]
    /// - [`MeshError::SolveFailure`] if the system is not positive definite,
    ///   e.g. when a connected component has no handle
    /// - [`MeshError::InvalidParameter`] for invalid options or a mesh that
    ///   does not match this deformer
    pub fn solve<I: MeshIndex>(
        &mut self,
        mesh: &HalfEdgeMesh<I>,
        constraints: &ConstraintSet<I>,
    ) -> Result<Deformation> {
        self.options.validate()?;
        if mesh.num_vertices() != self.rest.len() {
            return Err(MeshError::invalid_param(
                "mesh.num_vertices()",
                mesh.num_vertices(),
                "does not match the mesh the deformer was built for",
            ));
        }
        constraints.check(mesh)?;

        let handles = self.resolve_handles(mesh, constraints)?;
        let handle_ids: Vec<usize> = handles.iter().map(|(v, _)| *v).collect();
        self.prepare(&handle_ids)?;
        let system = self
            .system
            .as_ref()
            .ok_or_else(|| MeshError::solve_failure("system was not factored"))?;

        let mut positions = match self.options.initial_guess {
            InitialGuess::Current => mesh.positions(),
            InitialGuess::Rest => self.rest.clone(),
        };
        for &(v, target) in &handles {
            positions[v] = target;
        }

        let tolerance = if self.scale > 0.0 {
            self.options.tolerance * self.scale
        } else {
            self.options.tolerance
        };

        let mut report = DeformReport {
            iterations: 0,
            converged: false,
            max_displacement: f64::INFINITY,
        };

        while report.iterations < self.options.max_iterations {
            report.iterations += 1;

            let rotations = self.fit_rotations(&positions);
            let rhs = self.assemble_rhs(system, &rotations, &positions);
            let columns = self.solve_columns(system, &rhs);

            let mut max_displacement: f64 = 0.0;
            for (row, &v) in system.free.iter().enumerate() {
                let p = Point3::new(columns[0][row], columns[1][row], columns[2][row]);
                if !p.coords.iter().all(|c| c.is_finite()) {
                    return Err(MeshError::solve_failure(format!(
                        "non-finite position for vertex {}",
                        v
                    )));
                }
                max_displacement = max_displacement.max((p - positions[v]).norm());
                positions[v] = p;
            }

            report.max_displacement = max_displacement;
            log::debug!(
                "arap iteration {}: max displacement {:.3e}",
                report.iterations,
                max_displacement
            );

            if max_displacement < tolerance {
                report.converged = true;
                break;
            }
        }

        log::info!(
            "arap solve: {} handles, {} free vertices, {} iterations, converged: {}",
            handles.len(),
            system.free.len(),
            report.iterations,
            report.converged
        );

        Ok(Deformation { positions, report })
    }

    /// Handles as `(vertex, target)`, applying the anchor policy.
    fn resolve_handles<I: MeshIndex>(
        &self,
        mesh: &HalfEdgeMesh<I>,
        constraints: &ConstraintSet<I>,
    ) -> Result<Vec<(usize, Point3<f64>)>> {
        if !constraints.is_empty() {
            return Ok(constraints.iter().map(|(v, t)| (v.index(), *t)).collect());
        }
        match self.options.anchor {
            AnchorPolicy::Reject => Err(MeshError::EmptySelection),
            AnchorPolicy::FirstVertex => {
                // Isolated vertices are not part of the system.
                let anchor = self
                    .adjacency
                    .iter()
                    .position(|neighbors| !neighbors.is_empty())
                    .unwrap_or(0);
                log::warn!(
                    "no handles selected; anchoring vertex {} at its current position",
                    anchor
                );
                Ok(vec![(anchor, *mesh.position(VertexId::new(anchor)))])
            }
        }
    }

    /// Make sure the cached factorization matches `handles` (sorted).
    fn prepare(&mut self, handles: &[usize]) -> Result<()> {
        if let Some(system) = &self.system {
            if system.handles == handles {
                return Ok(());
            }
        }
        self.system = None;

        let n = self.rest.len();
        let mut fixed = vec![false; n];
        for &h in handles {
            fixed[h] = true;
        }

        // Vertices without edges have nothing to solve for and stay put.
        let mut row_of = vec![usize::MAX; n];
        let mut free = Vec::new();
        for v in 0..n {
            if !fixed[v] && !self.adjacency[v].is_empty() {
                row_of[v] = free.len();
                free.push(v);
            }
        }

        let mut triplets = Vec::with_capacity(free.len() * 7);
        for (row, &v) in free.iter().enumerate() {
            let mut diagonal = 0.0;
            for &(j, w) in &self.adjacency[v] {
                diagonal += w;
                if row_of[j] != usize::MAX {
                    triplets.push((row, row_of[j], -w));
                }
            }
            triplets.push((row, row, diagonal));
        }
        let matrix = CsrMatrix::from_triplets(free.len(), free.len(), triplets);

        let factor = SkylineCholesky::factor(&matrix).map_err(|e| match e {
            MeshError::NotPositiveDefinite { row } => {
                log::warn!("arap system is not positive definite at vertex {}", free[row]);
                MeshError::solve_failure(format!(
                    "system is not positive definite at vertex {} (a connected component may lack a handle)",
                    free[row]
                ))
            }
            other => other,
        })?;

        self.factorizations += 1;
        log::debug!(
            "factored arap system: {} handles, {} free vertices",
            handles.len(),
            free.len()
        );
        self.system = Some(System {
            handles: handles.to_vec(),
            free,
            factor,
        });
        Ok(())
    }

    /// Best-fit rotation of every one-ring.
    fn fit_rotations(&self, positions: &[Point3<f64>]) -> Vec<Matrix3<f64>> {
        let fit = |i: usize| {
            let mut s = Matrix3::zeros();
            for &(j, w) in &self.adjacency[i] {
                let rest_edge = self.rest[i] - self.rest[j];
                let edge = positions[i] - positions[j];
                s += w * rest_edge * edge.transpose();
            }
            closest_rotation(&s)
        };

        if self.options.parallel {
            (0..self.rest.len()).into_par_iter().map(fit).collect()
        } else {
            (0..self.rest.len()).map(fit).collect()
        }
    }

    /// Right-hand sides of the free rows, one column per axis. Handle
    /// neighbors are moved over from the left-hand side.
    fn assemble_rhs(
        &self,
        system: &System,
        rotations: &[Matrix3<f64>],
        positions: &[Point3<f64>],
    ) -> [DVector<f64>; 3] {
        let m = system.free.len();
        let mut rhs = [DVector::zeros(m), DVector::zeros(m), DVector::zeros(m)];
        let mut is_free = vec![false; self.rest.len()];
        for &v in &system.free {
            is_free[v] = true;
        }

        for (row, &i) in system.free.iter().enumerate() {
            let mut b = Vector3::zeros();
            for &(j, w) in &self.adjacency[i] {
                let rest_edge = self.rest[i] - self.rest[j];
                b += (0.5 * w) * ((rotations[i] + rotations[j]) * rest_edge);
                if !is_free[j] {
                    b += w * positions[j].coords;
                }
            }
            for axis in 0..3 {
                rhs[axis][row] = b[axis];
            }
        }
        rhs
    }

    fn solve_columns(&self, system: &System, rhs: &[DVector<f64>; 3]) -> Vec<DVector<f64>> {
        let solve = |axis: usize| system.factor.solve(&rhs[axis]);
        if self.options.parallel {
            (0..3).into_par_iter().map(solve).collect()
        } else {
            (0..3).map(solve).collect()
        }
    }
}

/// Closest proper rotation to `s` in the Frobenius sense, for the covariance
/// `s = Σ w (p⁰_i − p⁰_j)(p_i − p_j)ᵀ`.
///
/// With `s = U Σ Vᵀ` this is `V Uᵀ`; a reflection is turned into a rotation by
/// negating the column of `U` that belongs to the smallest singular value.
pub fn closest_rotation(s: &Matrix3<f64>) -> Matrix3<f64> {
    if s.iter().all(|x| *x == 0.0) {
        return Matrix3::identity();
    }
    let svd = s.svd(true, true);
    let (Some(mut u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Matrix3::identity();
    };

    let v = v_t.transpose();
    let r = v * u.transpose();
    if r.determinant() >= 0.0 {
        return r;
    }

    let sv = svd.singular_values;
    let smallest = (1..3).fold(0, |k, i| if sv[i] < sv[k] { i } else { k });
    for row in 0..3 {
        u[(row, smallest)] = -u[(row, smallest)];
    }
    v * u.transpose()
}

fn bounding_diagonal(points: &[Point3<f64>]) -> f64 {
    let Some(first) = points.first() else {
        return 0.0;
    };
    let mut min = *first;
    let mut max = *first;
    for p in points {
        for i in 0..3 {
            min[i] = min[i].min(p[i]);
            max[i] = max[i].max(p[i]);
        }
    }
    (max - min).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_from_triangles;
    use nalgebra::{Rotation3, Unit};

    fn quad() -> HalfEdgeMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        build_from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap()
    }

    /// `n` x `n` vertices on the unit-spaced grid in the xy-plane.
    fn grid(n: usize) -> HalfEdgeMesh {
        let mut vertices = Vec::new();
        for j in 0..n {
            for i in 0..n {
                vertices.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }
        let mut faces = Vec::new();
        for j in 0..n - 1 {
            for i in 0..n - 1 {
                let a = j * n + i;
                let (b, c, d) = (a + 1, a + n + 1, a + n);
                faces.push([a, b, c]);
                faces.push([a, c, d]);
            }
        }
        build_from_triangles(&vertices, &faces).unwrap()
    }

    fn edge_lengths(mesh: &HalfEdgeMesh, positions: &[Point3<f64>]) -> Vec<f64> {
        mesh.edge_ids()
            .map(|e| {
                let (a, b) = mesh.edge_vertices(e);
                (positions[b.index()] - positions[a.index()]).norm()
            })
            .collect()
    }

    #[test]
    fn test_quad_without_handles_stays_put() {
        let mut mesh = quad();
        let mut deformer = ArapDeformer::new(&mesh, DeformOptions::default());
        let report = deformer.deform(&mut mesh, &ConstraintSet::new()).unwrap();

        assert!(report.converged);
        for (v, p) in mesh.positions().iter().zip(mesh.rest_positions()) {
            assert!((v - p).norm() < 1e-6);
        }
    }

    #[test]
    fn test_reject_policy() {
        let mesh = quad();
        let options = DeformOptions::default().with_anchor(AnchorPolicy::Reject);
        let mut deformer = ArapDeformer::new(&mesh, options);
        let result = deformer.solve(&mesh, &ConstraintSet::new());
        assert!(matches!(result, Err(MeshError::EmptySelection)));
    }

    #[test]
    fn test_anchor_skips_isolated_vertices() {
        let vertices = vec![
            Point3::new(-5.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(1.5, 1.0, 0.0),
        ];
        let mut mesh: HalfEdgeMesh = build_from_triangles(&vertices, &[[1, 2, 3]]).unwrap();
        let mut deformer = ArapDeformer::new(&mesh, DeformOptions::default());
        let report = deformer.deform(&mut mesh, &ConstraintSet::new()).unwrap();

        assert!(report.converged);
        for (p, q) in mesh.positions().iter().zip(&vertices) {
            assert!((p - q).norm() < 1e-9);
        }
    }

    #[test]
    fn test_handles_are_pinned_exactly() {
        let mut mesh = grid(4);
        let mut handles = ConstraintSet::new();
        handles.insert(VertexId::new(0), Point3::new(0.0, 0.0, 0.5));
        handles.insert(VertexId::new(3), Point3::new(3.2, 0.0, 0.0));
        handles.insert(VertexId::new(15), Point3::new(3.0, 3.0, -0.4));

        let mut deformer = ArapDeformer::new(&mesh, DeformOptions::default());
        deformer.deform(&mut mesh, &handles).unwrap();
        for (v, target) in handles.iter() {
            assert_eq!(mesh.position(v), target);
        }
    }

    #[test]
    fn test_rest_handles_give_rest_pose() {
        let mut mesh = grid(4);
        let mut handles = ConstraintSet::new();
        for v in mesh.vertex_ids() {
            if mesh.is_boundary_vertex(v) {
                handles.insert(v, *mesh.rest_position(v));
            }
        }
        assert_eq!(handles.len(), 12);

        // Start the interior away from rest.
        for (k, idx) in [5, 6, 9, 10].into_iter().enumerate() {
            let v = VertexId::new(idx);
            let offset = Vector3::new(0.05, -0.02, 0.1) * (k as f64 + 1.0);
            mesh.set_position(v, mesh.rest_position(v) + offset);
        }

        let options = DeformOptions::default()
            .with_max_iterations(500)
            .with_tolerance(1e-12);
        let mut deformer = ArapDeformer::new(&mesh, options);
        deformer.deform(&mut mesh, &handles).unwrap();

        for v in mesh.vertex_ids() {
            assert!(
                (mesh.position(v) - mesh.rest_position(v)).norm() < 1e-4,
                "{:?} at {:?}",
                v,
                mesh.position(v)
            );
        }
    }

    #[test]
    fn test_quad_corner_drag() {
        let mut mesh = quad();
        let lift = Vector3::new(0.0, 0.0, 1.0);
        let mut handles = ConstraintSet::new();
        handles.insert(VertexId::new(0), mesh.rest_position(VertexId::new(0)) + lift);
        handles.insert(VertexId::new(1), *mesh.rest_position(VertexId::new(1)));

        let mut deformer = ArapDeformer::new(&mesh, DeformOptions::default());
        deformer.deform(&mut mesh, &handles).unwrap();

        let opposite = VertexId::new(2);
        let rest = *mesh.rest_position(opposite);
        let moved = *mesh.position(opposite);
        assert!((moved - rest).norm() > 1e-3);
        assert!((moved - (rest + lift)).norm() > 1e-3);
    }

    #[test]
    fn test_single_handle_moves_rigidly() {
        let mut mesh = quad();
        let mut handles = ConstraintSet::new();
        handles.insert(VertexId::new(0), Point3::new(0.0, 0.0, 1.0));

        let options = DeformOptions::default()
            .with_max_iterations(200)
            .with_tolerance(1e-10);
        let mut deformer = ArapDeformer::new(&mesh, options);
        deformer.deform(&mut mesh, &handles).unwrap();

        let rest = edge_lengths(&mesh, &mesh.rest_positions());
        let now = edge_lengths(&mesh, &mesh.positions());
        for (a, b) in rest.iter().zip(&now) {
            assert!((a - b).abs() < 1e-2, "{} vs {}", a, b);
        }
        // The opposite corner rotates along: neither at rest nor carried by
        // the same translation.
        let d = Vector3::new(0.0, 0.0, 1.0);
        let rest = *mesh.rest_position(VertexId::new(2));
        let moved = *mesh.position(VertexId::new(2));
        assert!((moved - rest).norm() > 1e-3);
        assert!((moved - (rest + d)).norm() > 1e-3);
    }

    #[test]
    fn test_initial_guess_rest() {
        let mut mesh = quad();
        mesh.set_position(VertexId::new(2), Point3::new(5.0, 5.0, 5.0));
        let mut handles = ConstraintSet::new();
        handles.insert(VertexId::new(0), Point3::origin());
        handles.insert(VertexId::new(1), Point3::new(1.0, 0.0, 0.0));

        let options = DeformOptions::default().with_initial_guess(InitialGuess::Rest);
        let mut deformer = ArapDeformer::new(&mesh, options);
        let Deformation { positions, report } = deformer.solve(&mesh, &handles).unwrap();
        assert!(report.converged);
        assert_eq!(report.iterations, 1);
        assert!((positions[2] - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-9);
        // `solve` leaves the mesh alone.
        assert_eq!(mesh.position(VertexId::new(2)), &Point3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn test_unconstrained_component_fails() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(5.0, 0.0, 0.0),
            Point3::new(6.0, 0.0, 0.0),
            Point3::new(5.0, 1.0, 0.0),
        ];
        let mut mesh: HalfEdgeMesh = build_from_triangles(&vertices, &[[0, 1, 2], [3, 4, 5]]).unwrap();
        let mut handles = ConstraintSet::new();
        handles.insert(VertexId::new(0), Point3::new(0.0, 0.0, 1.0));

        let before = mesh.positions();
        let mut deformer = ArapDeformer::new(&mesh, DeformOptions::default());
        let result = deformer.deform(&mut mesh, &handles);
        assert!(matches!(result, Err(MeshError::SolveFailure { .. })));
        assert_eq!(mesh.positions(), before);
    }

    #[test]
    fn test_out_of_range_handle() {
        let mesh = quad();
        let mut handles = ConstraintSet::new();
        handles.insert(VertexId::new(10), Point3::origin());
        let mut deformer = ArapDeformer::new(&mesh, DeformOptions::default());
        assert_eq!(
            deformer.solve(&mesh, &handles).unwrap_err(),
            MeshError::InvalidVertex { vertex: 10, count: 4 }
        );
    }

    #[test]
    fn test_invalid_options() {
        let mesh = quad();
        let mut deformer = ArapDeformer::new(&mesh, DeformOptions::default().with_max_iterations(0));
        assert!(matches!(
            deformer.solve(&mesh, &ConstraintSet::new()),
            Err(MeshError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_factorization_is_cached() {
        let mut mesh = grid(3);
        let mut deformer = ArapDeformer::new(&mesh, DeformOptions::default().sequential());
        let mut handles = ConstraintSet::new();
        handles.insert(VertexId::new(0), Point3::origin());
        handles.insert(VertexId::new(8), Point3::new(2.0, 2.0, 0.5));

        deformer.deform(&mut mesh, &handles).unwrap();
        handles.insert(VertexId::new(8), Point3::new(2.0, 2.0, 1.0));
        deformer.deform(&mut mesh, &handles).unwrap();
        assert_eq!(deformer.factorization_count(), 1);

        handles.insert(VertexId::new(2), Point3::new(2.0, 0.0, 0.0));
        deformer.deform(&mut mesh, &handles).unwrap();
        assert_eq!(deformer.factorization_count(), 2);

        deformer.invalidate();
        deformer.deform(&mut mesh, &handles).unwrap();
        assert_eq!(deformer.factorization_count(), 3);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mesh = grid(4);
        let mut handles = ConstraintSet::new();
        handles.insert(VertexId::new(0), Point3::origin());
        handles.insert(VertexId::new(15), Point3::new(3.0, 3.0, 1.5));

        let mut par = ArapDeformer::new(&mesh, DeformOptions::default());
        let mut seq = ArapDeformer::new(&mesh, DeformOptions::default().sequential());
        let a = par.solve(&mesh, &handles).unwrap();
        let b = seq.solve(&mesh, &handles).unwrap();
        for (p, q) in a.positions.iter().zip(&b.positions) {
            assert!((p - q).norm() < 1e-12);
        }
    }

    #[test]
    fn test_closest_rotation_recovers_rotation() {
        let axis = Unit::new_normalize(Vector3::new(1.0, 2.0, -0.5));
        let rotation = Rotation3::from_axis_angle(&axis, 0.7).into_inner();
        let rest_edges = [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.3),
            Vector3::new(-0.4, 0.2, 1.0),
        ];
        let mut s = Matrix3::zeros();
        for e in &rest_edges {
            s += e * (rotation * e).transpose();
        }
        assert!((closest_rotation(&s) - rotation).norm() < 1e-10);
    }

    #[test]
    fn test_closest_rotation_fixes_reflection() {
        let s = Matrix3::from_diagonal(&Vector3::new(3.0, 2.0, -1.0));
        let r = closest_rotation(&s);
        assert!((r.determinant() - 1.0).abs() < 1e-10);
        assert!((r * r.transpose() - Matrix3::identity()).norm() < 1e-10);
        assert!((r - Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, 1.0))).norm() < 1e-10);
        assert_eq!(closest_rotation(&Matrix3::zeros()), Matrix3::identity());
    }
}
