//! Baking externally generated animation into keyframes.
//!
//! An external generator receives the current handles as [`ControlPoint`]s and
//! answers with a sequence of frames, each a sparse map from vertex to
//! displacement. [`bake_animation`] turns every frame into a deformation: the
//! frame's vertices become handles displaced from the base pose, the rest of
//! the surface follows by ARAP, and the result is saved on the timeline at
//! time `k + 1`. The base pose itself lands at time `0.0`.

use std::collections::BTreeMap;

use nalgebra::{Point3, Vector3};

use crate::algo::arap::{ArapDeformer, InitialGuess};
use crate::algo::progress::Progress;
use crate::anim::timeline::save_pose;
use crate::constraint::ConstraintSet;
use crate::error::{MeshError, Result};
use crate::mesh::{HalfEdgeMesh, MeshIndex, VertexId};

/// Per-vertex displacements of one animation frame.
pub type AnimationFrame<I = u32> = BTreeMap<VertexId<I>, Vector3<f64>>;

/// A handle described for an external pose generator.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPoint {
    /// Vertex index.
    pub id: usize,
    /// Body-part role derived from the vertex label.
    pub role: String,
    /// Rest position of the vertex.
    pub position: Point3<f64>,
}

/// Summary of a bake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BakeReport {
    /// Frames saved, not counting the base pose.
    pub frames: usize,
    /// Local/global iterations over all frames.
    pub iterations: usize,
    /// Frames whose solve hit the iteration cap.
    pub unconverged: usize,
}

const ROLES: &[(&str, &[&str])] = &[
    ("head", &["head"]),
    ("neck", &["neck"]),
    ("left arm", &["left arm", "l arm"]),
    ("right arm", &["right arm", "r arm"]),
    ("left hand", &["left hand", "l hand"]),
    ("right hand", &["right hand", "r hand"]),
    ("left leg", &["left leg", "l leg"]),
    ("right leg", &["right leg", "r leg"]),
    ("left foot", &["left foot", "l foot"]),
    ("right foot", &["right foot", "r foot"]),
    ("spine", &["spine"]),
    ("chest", &["chest"]),
    ("pelvis", &["pelvis"]),
];

/// Canonical body-part role for a free-text vertex label.
///
/// Matching is case-insensitive on substrings, first match wins. An empty
/// label maps to `"unknown"`; an unrecognized one is returned unchanged.
pub fn role_from_label(label: &str) -> String {
    let lower = label.to_lowercase();
    for (role, patterns) in ROLES {
        if patterns.iter().any(|p| lower.contains(p)) {
            return (*role).to_string();
        }
    }
    if label.is_empty() {
        "unknown".to_string()
    } else {
        label.to_string()
    }
}

/// Describe every handle as a control point, in vertex order.
///
/// # Errors
///
/// [`MeshError::EmptySelection`] if there are no handles,
/// [`MeshError::InvalidVertex`] if a handle is out of range.
pub fn control_points<I: MeshIndex>(
    mesh: &HalfEdgeMesh<I>,
    constraints: &ConstraintSet<I>,
) -> Result<Vec<ControlPoint>> {
    if constraints.is_empty() {
        return Err(MeshError::EmptySelection);
    }
    constraints.check(mesh)?;
    Ok(constraints
        .vertices()
        .map(|v| {
            let vertex = mesh.vertex(v);
            ControlPoint {
                id: v.index(),
                role: role_from_label(&vertex.label),
                position: vertex.rest_position,
            }
        })
        .collect())
}

/// Solve every frame against the current pose and save the results as
/// keyframes `1.0, 2.0, ...`, with the current pose saved at `0.0`.
///
/// The mesh ends in its starting pose. A frame without displacements
/// reproduces the starting pose. Solves always start from the starting pose,
/// whatever the deformer's initial guess option says.
///
/// # Errors
///
/// - [`MeshError::EmptySelection`] if `frames` is empty
/// - [`MeshError::InvalidVertex`] or [`MeshError::InvalidParameter`] for a
///   frame entry outside the mesh or with a non-finite displacement; nothing
///   is saved
/// - [`MeshError::SolveFailure`] if a frame cannot be solved; frames before it
///   stay saved and the mesh returns to its starting pose
pub fn bake_animation<I: MeshIndex>(
    mesh: &mut HalfEdgeMesh<I>,
    deformer: &mut ArapDeformer,
    frames: &[AnimationFrame<I>],
    progress: &Progress,
) -> Result<BakeReport> {
    if frames.is_empty() {
        return Err(MeshError::EmptySelection);
    }
    for frame in frames {
        for (&v, delta) in frame {
            mesh.check_vertex(v)?;
            if !delta.iter().all(|c| c.is_finite()) {
                return Err(MeshError::invalid_param(
                    "delta",
                    format!("{:?} at vertex {}", delta, v.index()),
                    "must be finite",
                ));
            }
        }
    }

    let base = mesh.positions();
    let options = deformer.options().clone();
    deformer.set_options(options.clone().with_initial_guess(InitialGuess::Current));

    let result = bake_frames(mesh, deformer, frames, &base, progress);

    deformer.set_options(options);
    mesh.set_positions(&base)?;
    let report = result?;
    save_pose(mesh, 0.0)?;

    log::info!(
        "baked {} frames ({} iterations, {} unconverged)",
        report.frames,
        report.iterations,
        report.unconverged
    );
    Ok(report)
}

fn bake_frames<I: MeshIndex>(
    mesh: &mut HalfEdgeMesh<I>,
    deformer: &mut ArapDeformer,
    frames: &[AnimationFrame<I>],
    base: &[Point3<f64>],
    progress: &Progress,
) -> Result<BakeReport> {
    let mut report = BakeReport {
        frames: 0,
        iterations: 0,
        unconverged: 0,
    };

    for (k, frame) in frames.iter().enumerate() {
        mesh.set_positions(base)?;
        if !frame.is_empty() {
            let handles: ConstraintSet<I> = frame
                .iter()
                .map(|(&v, delta)| (v, base[v.index()] + delta))
                .collect();
            let solved = deformer.deform(mesh, &handles).map_err(|e| {
                log::warn!("frame {} failed: {}", k + 1, e);
                e
            })?;
            report.iterations += solved.iterations;
            if !solved.converged {
                report.unconverged += 1;
            }
        }

        save_pose(mesh, (k + 1) as f64)?;
        report.frames += 1;
        progress.report(k + 1, frames.len(), &format!("frame {}", k + 1));
    }
    Ok(report)
}
