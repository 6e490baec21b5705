//! Sparse symmetric matrices and a direct envelope Cholesky solver.
//!
//! The deformation system matrix is a cotangent Laplacian restricted to the
//! free vertices: sparse, symmetric, positive definite once every connected
//! component carries a handle. It is factored once and then solved against
//! many right-hand sides, so a direct factorization pays off over iterative
//! methods.
//!
//! [`CsrMatrix`] holds the assembled matrix. [`SkylineCholesky`] reorders it
//! with reverse Cuthill–McKee to shrink the profile, then stores `L` row by row
//! from each row's first nonzero column to the diagonal. Fill-in of a Cholesky
//! factor never leaves that envelope.

use std::collections::VecDeque;

use nalgebra::DVector;

use crate::error::{MeshError, Result};

/// Pivots below this fraction of the original diagonal are treated as zero.
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Compressed Sparse Row (CSR) matrix.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    /// `row_ptr[i]..row_ptr[i + 1]` indexes the entries of row `i`.
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Create a CSR matrix from `(row, col, value)` triplets.
    ///
    /// Duplicate entries at the same position are summed.
    pub fn from_triplets(rows: usize, cols: usize, mut triplets: Vec<(usize, usize, f64)>) -> Self {
        triplets.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for (row, col, val) in triplets {
            debug_assert!(row < rows && col < cols, "triplet ({}, {}) out of bounds", row, col);
            if last == Some((row, col)) {
                if let Some(v) = values.last_mut() {
                    *v += val;
                }
                continue;
            }
            col_idx.push(col);
            values.push(val);
            row_ptr[row + 1] += 1;
            last = Some((row, col));
        }

        for r in 0..rows {
            row_ptr[r + 1] += row_ptr[r];
        }

        Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Entries `(col, value)` of row `i`, in increasing column order.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        self.col_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Stored value at `(i, j)`, zero if absent.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        match self.col_idx[range.clone()].binary_search(&j) {
            Ok(k) => self.values[range.start + k],
            Err(_) => 0.0,
        }
    }

    /// Multiply matrix by vector: `y = A * x`.
    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        assert_eq!(x.len(), self.cols, "Vector dimension mismatch");
        DVector::from_iterator(
            self.rows,
            (0..self.rows).map(|i| self.row(i).map(|(j, v)| v * x[j]).sum::<f64>()),
        )
    }

    /// Half-bandwidth `max |i - j|` over stored entries.
    pub fn bandwidth(&self) -> usize {
        (0..self.rows)
            .flat_map(|i| self.row(i).map(move |(j, _)| i.abs_diff(j)))
            .max()
            .unwrap_or(0)
    }
}

/// Reverse Cuthill–McKee ordering of a structurally symmetric matrix.
///
/// Returns `perm` with `perm[new] = old`. Each connected component is started
/// from its unvisited node of least degree; neighbors are queued by increasing
/// degree.
pub fn reverse_cuthill_mckee(a: &CsrMatrix) -> Vec<usize> {
    let n = a.nrows();
    let adjacency: Vec<Vec<usize>> = (0..n)
        .map(|i| a.row(i).filter(|&(j, _)| j != i).map(|(j, _)| j).collect())
        .collect();
    let degree: Vec<usize> = adjacency.iter().map(Vec::len).collect();

    let mut by_degree: Vec<usize> = (0..n).collect();
    by_degree.sort_by_key(|&i| (degree[i], i));

    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut queue = VecDeque::new();
    let mut scratch = Vec::new();

    for &seed in &by_degree {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        queue.push_back(seed);

        while let Some(node) = queue.pop_front() {
            order.push(node);
            scratch.clear();
            scratch.extend(adjacency[node].iter().copied().filter(|&j| !visited[j]));
            scratch.sort_by_key(|&j| (degree[j], j));
            for &j in &scratch {
                visited[j] = true;
                queue.push_back(j);
            }
        }
    }

    order.reverse();
    order
}

/// Cholesky factor `P A Pᵀ = L Lᵀ` in envelope (skyline) storage.
#[derive(Debug, Clone)]
pub struct SkylineCholesky {
    /// `perm[new] = old`.
    perm: Vec<usize>,
    /// First stored column of each permuted row.
    first: Vec<usize>,
    /// Start of each row in `values`; the row ends with its diagonal.
    offsets: Vec<usize>,
    values: Vec<f64>,
}

impl SkylineCholesky {
    /// Factor a symmetric positive definite matrix.
    ///
    /// Only the lower triangle of `a` (after reordering) is read, so `a` must
    /// be symmetric.
    ///
    /// # Errors
    ///
    /// [`MeshError::NotPositiveDefinite`] if a pivot is not positive relative
    /// to its original diagonal entry; the reported row is in original
    /// numbering.
    pub fn factor(a: &CsrMatrix) -> Result<Self> {
        if a.nrows() != a.ncols() {
            return Err(MeshError::invalid_param(
                "a.ncols()",
                a.ncols(),
                "matrix must be square",
            ));
        }
        let n = a.nrows();
        let perm = reverse_cuthill_mckee(a);
        let mut inv = vec![0usize; n];
        for (new, &old) in perm.iter().enumerate() {
            inv[old] = new;
        }

        // Envelope of the lower triangle in the new ordering.
        let mut first: Vec<usize> = (0..n).collect();
        for (new_i, &old_i) in perm.iter().enumerate() {
            for (old_j, _) in a.row(old_i) {
                let new_j = inv[old_j];
                if new_j < first[new_i] {
                    first[new_i] = new_j;
                }
            }
        }

        let mut offsets = Vec::with_capacity(n + 1);
        offsets.push(0);
        for i in 0..n {
            offsets.push(offsets[i] + i - first[i] + 1);
        }

        let mut values = vec![0.0; offsets[n]];
        let mut diagonal = vec![0.0; n];
        for (new_i, &old_i) in perm.iter().enumerate() {
            for (old_j, v) in a.row(old_i) {
                let new_j = inv[old_j];
                if new_j <= new_i {
                    values[offsets[new_i] + new_j - first[new_i]] += v;
                }
                if new_j == new_i {
                    diagonal[new_i] = v;
                }
            }
        }

        let mut factor = Self {
            perm,
            first,
            offsets,
            values,
        };
        factor.decompose(&diagonal)?;

        log::debug!(
            "factored {}x{} matrix: {} nonzeros, envelope {} (bandwidth {} before reordering)",
            n,
            n,
            a.nnz(),
            factor.values.len(),
            a.bandwidth()
        );
        Ok(factor)
    }

    /// Row-by-row envelope Cholesky, in place.
    fn decompose(&mut self, diagonal: &[f64]) -> Result<()> {
        let n = self.dim();
        for i in 0..n {
            let fi = self.first[i];
            let row_i = self.offsets[i];

            for j in fi..i {
                let fj = self.first[j];
                let row_j = self.offsets[j];
                let start = fi.max(fj);
                let mut sum = self.values[row_i + j - fi];
                for k in start..j {
                    sum -= self.values[row_i + k - fi] * self.values[row_j + k - fj];
                }
                let ljj = self.values[row_j + j - fj];
                self.values[row_i + j - fi] = sum / ljj;
            }

            let mut pivot = self.values[row_i + i - fi];
            for k in fi..i {
                let l = self.values[row_i + k - fi];
                pivot -= l * l;
            }
            if !pivot.is_finite() || pivot <= PIVOT_TOLERANCE * diagonal[i].abs() {
                return Err(MeshError::NotPositiveDefinite { row: self.perm[i] });
            }
            self.values[row_i + i - fi] = pivot.sqrt();
        }
        Ok(())
    }

    /// Dimension of the factored matrix.
    #[inline]
    pub fn dim(&self) -> usize {
        self.first.len()
    }

    /// Number of stored entries of `L`.
    #[inline]
    pub fn envelope_size(&self) -> usize {
        self.values.len()
    }

    /// Solve `A x = b`.
    pub fn solve(&self, b: &DVector<f64>) -> DVector<f64> {
        let n = self.dim();
        assert_eq!(b.len(), n, "Vector dimension mismatch");

        let mut y: Vec<f64> = self.perm.iter().map(|&old| b[old]).collect();

        // L y = P b
        for i in 0..n {
            let fi = self.first[i];
            let row = &self.values[self.offsets[i]..self.offsets[i + 1]];
            let mut sum = y[i];
            for k in fi..i {
                sum -= row[k - fi] * y[k];
            }
            y[i] = sum / row[i - fi];
        }

        // Lᵀ z = y, column-oriented over the row storage.
        for i in (0..n).rev() {
            let fi = self.first[i];
            let row = &self.values[self.offsets[i]..self.offsets[i + 1]];
            y[i] /= row[i - fi];
            let zi = y[i];
            for k in fi..i {
                y[k] -= row[k - fi] * zi;
            }
        }

        let mut x = DVector::zeros(n);
        for (new, &old) in self.perm.iter().enumerate() {
            x[old] = y[new];
        }
        x
    }
}
