//! Procedural test meshes.

use clap::ValueEnum;
use nalgebra::{Point3, Vector3};

use ductile::mesh::{build_from_triangles, HalfEdgeMesh};
use ductile::error::Result;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Shape {
    /// Flat unit square sheet in the XY plane
    Grid,
    /// Open cylinder along Z
    Tube,
}

/// A generated mesh with the vertex rows used as handles.
pub struct Generated {
    pub mesh: HalfEdgeMesh,
    /// Held in place.
    pub bottom: Vec<usize>,
    /// Dragged.
    pub top: Vec<usize>,
}

impl Shape {
    /// Direction the top row is dragged in.
    pub fn drag_axis(self) -> Vector3<f64> {
        match self {
            Shape::Grid => Vector3::z(),
            Shape::Tube => Vector3::x(),
        }
    }

    pub fn build(self, resolution: usize) -> Result<Generated> {
        let n = resolution.max(1);
        let (vertices, columns, wrap) = match self {
            Shape::Grid => {
                let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
                for j in 0..=n {
                    for i in 0..=n {
                        vertices.push(Point3::new(i as f64 / n as f64, j as f64 / n as f64, 0.0));
                    }
                }
                (vertices, n + 1, false)
            }
            Shape::Tube => {
                let segments = (n * 2).max(3);
                let mut vertices = Vec::with_capacity(segments * (n + 1));
                for j in 0..=n {
                    for i in 0..segments {
                        let theta = std::f64::consts::TAU * i as f64 / segments as f64;
                        vertices.push(Point3::new(
                            0.5 * theta.cos(),
                            0.5 * theta.sin(),
                            2.0 * j as f64 / n as f64,
                        ));
                    }
                }
                (vertices, segments, true)
            }
        };

        let cells = if wrap { columns } else { columns - 1 };
        let mut faces = Vec::with_capacity(2 * n * cells);
        for j in 0..n {
            for i in 0..cells {
                let a = j * columns + i;
                let b = j * columns + (i + 1) % columns;
                let c = b + columns;
                let d = a + columns;
                faces.push([a, b, c]);
                faces.push([a, c, d]);
            }
        }

        let mesh = build_from_triangles(&vertices, &faces)?;
        Ok(Generated {
            mesh,
            bottom: (0..columns).collect(),
            top: (n * columns..(n + 1) * columns).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_counts() {
        let g = Shape::Grid.build(3).unwrap();
        assert_eq!(g.mesh.num_vertices(), 16);
        assert_eq!(g.mesh.num_faces(), 18);
        assert_eq!(g.bottom.len(), 4);
        assert_eq!(g.top, vec![12, 13, 14, 15]);
        assert!(g.mesh.is_valid());
    }

    #[test]
    fn test_tube_counts() {
        let g = Shape::Tube.build(2).unwrap();
        assert_eq!(g.mesh.num_vertices(), 12);
        assert_eq!(g.mesh.num_faces(), 16);
        assert!(g.mesh.is_valid());
    }
}
