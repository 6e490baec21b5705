//! Handle vertices and their target positions.
//!
//! A [`ConstraintSet`] maps each handle vertex to the position the deformation
//! must reproduce exactly. It is ordered by vertex so that solves see the
//! handles in a deterministic order.

use std::collections::BTreeMap;

use nalgebra::{Point3, Vector3};

use crate::error::Result;
use crate::mesh::{HalfEdgeMesh, MeshIndex, VertexId};

/// Ordered map from handle vertex to pinned target position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstraintSet<I: MeshIndex = u32> {
    targets: BTreeMap<VertexId<I>, Point3<f64>>,
}

impl<I: MeshIndex> ConstraintSet<I> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            targets: BTreeMap::new(),
        }
    }

    /// Number of handles.
    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether there are no handles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Whether `v` is a handle.
    #[inline]
    pub fn contains(&self, v: VertexId<I>) -> bool {
        self.targets.contains_key(&v)
    }

    /// Target of handle `v`.
    pub fn target(&self, v: VertexId<I>) -> Option<&Point3<f64>> {
        self.targets.get(&v)
    }

    /// Pin `v` to `target`, returning the previous target if `v` was a handle.
    pub fn insert(&mut self, v: VertexId<I>, target: Point3<f64>) -> Option<Point3<f64>> {
        self.targets.insert(v, target)
    }

    /// Release handle `v`.
    pub fn remove(&mut self, v: VertexId<I>) -> Option<Point3<f64>> {
        self.targets.remove(&v)
    }

    /// Flip membership of `v`. A new handle is pinned at `current`.
    ///
    /// Returns `true` if `v` is a handle afterwards.
    pub fn toggle(&mut self, v: VertexId<I>, current: Point3<f64>) -> bool {
        if self.targets.remove(&v).is_some() {
            false
        } else {
            self.targets.insert(v, current);
            true
        }
    }

    /// Shift the target of handle `v` by `delta`. Returns `false` if `v` is not
    /// a handle.
    pub fn translate(&mut self, v: VertexId<I>, delta: &Vector3<f64>) -> bool {
        match self.targets.get_mut(&v) {
            Some(t) => {
                *t += delta;
                true
            }
            None => false,
        }
    }

    /// Remove every handle.
    pub fn clear(&mut self) {
        self.targets.clear();
    }

    /// Handles and targets in increasing vertex order.
    pub fn iter(&self) -> impl Iterator<Item = (VertexId<I>, &Point3<f64>)> + '_ {
        self.targets.iter().map(|(v, p)| (*v, p))
    }

    /// Handle vertices in increasing order.
    pub fn vertices(&self) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.targets.keys().copied()
    }

    /// One flag per vertex, `true` for handles. Out-of-range handles are
    /// ignored.
    pub fn handle_mask(&self, num_vertices: usize) -> Vec<bool> {
        let mut mask = vec![false; num_vertices];
        for v in self.targets.keys() {
            if let Some(slot) = mask.get_mut(v.index()) {
                *slot = true;
            }
        }
        mask
    }

    /// Return an error if any handle lies outside `mesh`.
    pub fn check(&self, mesh: &HalfEdgeMesh<I>) -> Result<()> {
        self.targets.keys().try_for_each(|&v| mesh.check_vertex(v))
    }
}

impl<I: MeshIndex> FromIterator<(VertexId<I>, Point3<f64>)> for ConstraintSet<I> {
    fn from_iter<T: IntoIterator<Item = (VertexId<I>, Point3<f64>)>>(iter: T) -> Self {
        Self {
            targets: iter.into_iter().collect(),
        }
    }
}
