//! Per-vertex keyframe timeline.
//!
//! Every vertex carries a [`Keyframes`] map from time to position. Saving a pose
//! snapshots all current positions at one time value; querying a pose samples
//! each vertex's map with clamped linear interpolation and never mutates the
//! stored keys. Time `0.0` is the base pose and survives [`clear_keyframes`].

use nalgebra::Point3;

use crate::error::{MeshError, Result};
use crate::mesh::{HalfEdgeMesh, MeshIndex};

/// Time-sorted positions of one vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keyframes {
    keys: Vec<(f64, Point3<f64>)>,
}

impl Keyframes {
    /// Create an empty map.
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Number of stored keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no key is stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate over `(time, position)` in increasing time.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &Point3<f64>)> + '_ {
        self.keys.iter().map(|(t, p)| (*t, p))
    }

    /// Stored times in increasing order.
    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.keys.iter().map(|(t, _)| *t)
    }

    /// Position stored at exactly `time`.
    pub fn get(&self, time: f64) -> Option<&Point3<f64>> {
        let idx = self.lower_bound(time);
        match self.keys.get(idx) {
            Some((t, p)) if *t == time => Some(p),
            _ => None,
        }
    }

    /// Store `position` at `time`, replacing an existing key at that time.
    pub fn insert(&mut self, time: f64, position: Point3<f64>) {
        let idx = self.lower_bound(time);
        match self.keys.get_mut(idx) {
            Some((t, p)) if *t == time => *p = position,
            _ => self.keys.insert(idx, (time, position)),
        }
    }

    /// Sample the map at `time`.
    ///
    /// Returns `None` for an empty map. Times outside the stored range clamp to
    /// the first or last key; times between two keys interpolate linearly.
    pub fn sample(&self, time: f64) -> Option<Point3<f64>> {
        let upper = self.lower_bound(time);
        if upper == self.keys.len() {
            return self.keys.last().map(|(_, p)| *p);
        }
        let (t_upper, p_upper) = self.keys[upper];
        if upper == 0 || t_upper == time {
            return Some(p_upper);
        }
        let (t_lower, p_lower) = self.keys[upper - 1];
        let alpha = (time - t_lower) / (t_upper - t_lower);
        Some(Point3::from(p_lower.coords * (1.0 - alpha) + p_upper.coords * alpha))
    }

    /// Drop every key except the base pose at time `0.0`.
    pub fn retain_base(&mut self) {
        self.keys.retain(|(t, _)| *t == 0.0);
    }

    /// Index of the first key with time `>= time`.
    fn lower_bound(&self, time: f64) -> usize {
        self.keys.partition_point(|(t, _)| *t < time)
    }
}

fn check_time(time: f64) -> Result<()> {
    if time.is_finite() {
        Ok(())
    } else {
        Err(MeshError::invalid_param("time", time, "must be finite"))
    }
}

/// Record the current position of every vertex at `time`.
///
/// An existing key at exactly `time` is overwritten.
pub fn save_pose<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>, time: f64) -> Result<()> {
    check_time(time)?;
    for v in &mut mesh.vertices {
        v.keyframes.insert(time, v.position);
    }
    log::debug!("saved pose of {} vertices at t = {}", mesh.num_vertices(), time);
    Ok(())
}

/// Interpolated pose at `time`, one position per vertex.
///
/// Vertices without keyframes report their current position. The mesh is not
/// modified; apply the result with
/// [`HalfEdgeMesh::set_positions`](crate::mesh::HalfEdgeMesh::set_positions).
///
/// # Example
///
/// ```
/// use ductile::prelude::*;
/// use ductile::anim::{pose_at, save_pose};
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// ];
/// let mut mesh: HalfEdgeMesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
/// save_pose(&mut mesh, 0.0).unwrap();
///
/// let v = VertexId::new(0);
/// mesh.set_position(v, Point3::new(2.0, 0.0, 0.0));
/// save_pose(&mut mesh, 2.0).unwrap();
///
/// let pose = pose_at(&mesh, 1.0).unwrap();
/// assert_eq!(pose[0], Point3::new(1.0, 0.0, 0.0));
/// ```
pub fn pose_at<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, time: f64) -> Result<Vec<Point3<f64>>> {
    check_time(time)?;
    Ok(mesh
        .vertices
        .iter()
        .map(|v| v.keyframes.sample(time).unwrap_or(v.position))
        .collect())
}

/// Write the interpolated pose at `time` into the current positions.
pub fn apply_pose<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>, time: f64) -> Result<()> {
    let pose = pose_at(mesh, time)?;
    mesh.set_positions(&pose)
}

/// Remove all keyframes except time `0.0` on every vertex.
pub fn clear_keyframes<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>) {
    for v in &mut mesh.vertices {
        v.keyframes.retain_base();
    }
}

/// Sorted union of the keyframe times stored on any vertex.
pub fn keyframe_times<I: MeshIndex>(mesh: &HalfEdgeMesh<I>) -> Vec<f64> {
    let mut times: Vec<f64> = mesh
        .vertices
        .iter()
        .flat_map(|v| v.keyframes.times())
        .collect();
    times.sort_by(f64::total_cmp);
    times.dedup();
    times
}

/// First and last keyframe time, if any keyframe exists.
pub fn time_range<I: MeshIndex>(mesh: &HalfEdgeMesh<I>) -> Option<(f64, f64)> {
    let times = keyframe_times(mesh);
    Some((*times.first()?, *times.last()?))
}
