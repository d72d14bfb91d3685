//! Square link matrices in dense and compressed sparse row form

use crate::error::MatrixError;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::mem;

/// Row-major nonzero cell: `(row, column, value)`
pub type Cell = (usize, usize, f64);

/// Operations the rank engine needs from a square matrix.
///
/// Implementations must agree bit for bit: `mul_vec` sums each row's
/// products in increasing column order starting from `0.0`, so skipping
/// zero cells cannot change the result.
pub trait LinkMatrix: Sized + Send + Sync {
    /// Build a `dim x dim` matrix from cells. Later cells overwrite earlier
    /// ones at the same position, so repeated links are harmless.
    fn from_cells(dim: usize, cells: &[Cell]) -> Result<Self, MatrixError>;

    fn dim(&self) -> usize;

    fn get(&self, row: usize, col: usize) -> f64;

    /// Nonzero cells of row `i` as `(column, value)`, by column
    fn row(&self, i: usize) -> Vec<(usize, f64)>;

    /// Nonzero cells of column `j` as `(row, value)`, by row
    fn column(&self, j: usize) -> Vec<(usize, f64)>;

    fn transpose(&self) -> Self;

    /// Matrix-vector product, rows computed in parallel
    fn mul_vec(&self, x: &Array1<f64>) -> Array1<f64>;

    /// All nonzero cells in row-major order
    fn cells(&self) -> Vec<Cell> {
        (0..self.dim())
            .flat_map(|i| self.row(i).into_iter().map(move |(j, v)| (i, j, v)))
            .collect()
    }

    fn nnz(&self) -> usize {
        (0..self.dim()).map(|i| self.row(i).len()).sum()
    }

    /// Copy into another representation
    fn convert<M: LinkMatrix>(&self) -> Result<M, MatrixError> {
        M::from_cells(self.dim(), &self.cells())
    }
}

fn check_bounds(dim: usize, row: usize, col: usize) -> Result<(), MatrixError> {
    if row >= dim || col >= dim {
        return Err(MatrixError::OutOfBounds { row, col, dim });
    }
    Ok(())
}

/// Dense matrix backed by an ndarray
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseMatrix {
    data: Array2<f64>,
}

impl DenseMatrix {
    pub fn zeros(dim: usize) -> Self {
        Self {
            data: Array2::zeros((dim, dim)),
        }
    }

    pub fn from_array(data: Array2<f64>) -> Result<Self, MatrixError> {
        let (rows, cols) = data.dim();
        if rows != cols {
            return Err(MatrixError::NotSquare { rows, cols });
        }
        Ok(Self { data })
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<(), MatrixError> {
        check_bounds(self.dim(), row, col)?;
        self.data[[row, col]] = value;
        Ok(())
    }

    /// Reject deserialized data that is not square
    pub fn validate(&self) -> Result<(), MatrixError> {
        let (rows, cols) = self.data.dim();
        if rows != cols {
            return Err(MatrixError::NotSquare { rows, cols });
        }
        Ok(())
    }
}

impl LinkMatrix for DenseMatrix {
    fn from_cells(dim: usize, cells: &[Cell]) -> Result<Self, MatrixError> {
        let mut matrix = Self::zeros(dim);
        for &(row, col, value) in cells {
            matrix.set(row, col, value)?;
        }
        Ok(matrix)
    }

    fn dim(&self) -> usize {
        self.data.nrows()
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        self.data[[row, col]]
    }

    fn row(&self, i: usize) -> Vec<(usize, f64)> {
        self.data
            .row(i)
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0.0)
            .map(|(j, &v)| (j, v))
            .collect()
    }

    fn column(&self, j: usize) -> Vec<(usize, f64)> {
        self.data
            .column(j)
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0.0)
            .map(|(i, &v)| (i, v))
            .collect()
    }

    fn transpose(&self) -> Self {
        Self {
            data: self.data.t().to_owned(),
        }
    }

    fn mul_vec(&self, x: &Array1<f64>) -> Array1<f64> {
        debug_assert_eq!(x.len(), self.dim());

        // Sequential fold per row; ndarray's dot would reorder the sum
        let out: Vec<f64> = (0..self.dim())
            .into_par_iter()
            .map(|i| {
                self.data
                    .row(i)
                    .iter()
                    .zip(x.iter())
                    .fold(0.0, |acc, (a, b)| acc + a * b)
            })
            .collect();
        Array1::from(out)
    }
}

/// Compressed sparse row matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseMatrix {
    /// Number of rows and columns
    dim: usize,

    /// Offset array: row i's cells are at offsets[i]..offsets[i+1]
    offsets: Vec<usize>,

    /// Column of each stored cell, increasing within a row
    columns: Vec<u32>,

    /// Value of each stored cell
    values: Vec<f64>,
}

impl SparseMatrix {
    pub fn empty(dim: usize) -> Self {
        Self {
            dim,
            offsets: vec![0; dim + 1],
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    fn row_range(&self, i: usize) -> std::ops::Range<usize> {
        self.offsets[i]..self.offsets[i + 1]
    }

    /// Number of nonzero cells in row `i`
    pub fn out_degree(&self, i: usize) -> usize {
        self.offsets[i + 1] - self.offsets[i]
    }

    pub fn has_link(&self, row: usize, col: usize) -> bool {
        self.columns[self.row_range(row)]
            .binary_search(&(col as u32))
            .is_ok()
    }

    /// Estimate memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        mem::size_of::<Self>()
            + self.offsets.capacity() * mem::size_of::<usize>()
            + self.columns.capacity() * mem::size_of::<u32>()
            + self.values.capacity() * mem::size_of::<f64>()
    }

    /// Reject deserialized data whose offsets or columns are out of shape
    pub fn validate(&self) -> Result<(), MatrixError> {
        let shape_ok = self.offsets.len() == self.dim + 1
            && self.offsets.first() == Some(&0)
            && self.offsets.last() == Some(&self.columns.len())
            && self.columns.len() == self.values.len()
            && self.offsets.windows(2).all(|w| w[0] <= w[1]);
        if !shape_ok {
            return Err(MatrixError::NotSquare {
                rows: self.offsets.len().saturating_sub(1),
                cols: self.dim,
            });
        }

        for i in 0..self.dim {
            let cols = &self.columns[self.row_range(i)];
            if let Some(&col) = cols.iter().find(|&&c| c as usize >= self.dim) {
                return Err(MatrixError::OutOfBounds {
                    row: i,
                    col: col as usize,
                    dim: self.dim,
                });
            }
            // get() binary searches each row
            if !cols.windows(2).all(|w| w[0] < w[1]) {
                return Err(MatrixError::UnsortedRow { row: i });
            }
        }
        Ok(())
    }
}

impl LinkMatrix for SparseMatrix {
    fn from_cells(dim: usize, cells: &[Cell]) -> Result<Self, MatrixError> {
        for &(row, col, _) in cells {
            check_bounds(dim, row, col)?;
        }

        // Stable sort keeps insertion order among duplicates, so the last
        // write to a cell wins as it does in the dense form
        let mut sorted = cells.to_vec();
        sorted.sort_by_key(|&(row, col, _)| (row, col));

        let mut deduped: Vec<Cell> = Vec::with_capacity(sorted.len());
        for cell in sorted {
            match deduped.last_mut() {
                Some(last) if last.0 == cell.0 && last.1 == cell.1 => *last = cell,
                _ => deduped.push(cell),
            }
        }
        deduped.retain(|&(_, _, v)| v != 0.0);

        let mut offsets = Vec::with_capacity(dim + 1);
        let mut columns = Vec::with_capacity(deduped.len());
        let mut values = Vec::with_capacity(deduped.len());

        offsets.push(0);
        let mut cursor = 0;
        for row in 0..dim {
            while cursor < deduped.len() && deduped[cursor].0 == row {
                columns.push(deduped[cursor].1 as u32);
                values.push(deduped[cursor].2);
                cursor += 1;
            }
            offsets.push(columns.len());
        }

        Ok(Self {
            dim,
            offsets,
            columns,
            values,
        })
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        let range = self.row_range(row);
        match self.columns[range.clone()].binary_search(&(col as u32)) {
            Ok(pos) => self.values[range.start + pos],
            Err(_) => 0.0,
        }
    }

    fn row(&self, i: usize) -> Vec<(usize, f64)> {
        self.row_range(i)
            .map(|k| (self.columns[k] as usize, self.values[k]))
            .collect()
    }

    fn column(&self, j: usize) -> Vec<(usize, f64)> {
        (0..self.dim)
            .filter_map(|i| {
                let range = self.row_range(i);
                self.columns[range.clone()]
                    .binary_search(&(j as u32))
                    .ok()
                    .map(|pos| (i, self.values[range.start + pos]))
            })
            .collect()
    }

    fn transpose(&self) -> Self {
        // Count cells per column to get the transposed offsets
        let mut offsets = vec![0usize; self.dim + 1];
        for &col in &self.columns {
            offsets[col as usize + 1] += 1;
        }
        for i in 0..self.dim {
            offsets[i + 1] += offsets[i];
        }

        let mut next = offsets.clone();
        let mut columns = vec![0u32; self.columns.len()];
        let mut values = vec![0.0; self.values.len()];

        // Visiting rows in order keeps each transposed row sorted
        for i in 0..self.dim {
            for k in self.row_range(i) {
                let col = self.columns[k] as usize;
                let pos = next[col];
                columns[pos] = i as u32;
                values[pos] = self.values[k];
                next[col] += 1;
            }
        }

        Self {
            dim: self.dim,
            offsets,
            columns,
            values,
        }
    }

    fn mul_vec(&self, x: &Array1<f64>) -> Array1<f64> {
        debug_assert_eq!(x.len(), self.dim);

        let out: Vec<f64> = (0..self.dim)
            .into_par_iter()
            .map(|i| {
                self.row_range(i)
                    .fold(0.0, |acc, k| acc + self.values[k] * x[self.columns[k] as usize])
            })
            .collect();
        Array1::from(out)
    }

    fn cells(&self) -> Vec<Cell> {
        (0..self.dim)
            .flat_map(|i| self.row_range(i).map(move |k| (i, self.columns[k] as usize, self.values[k])))
            .collect()
    }

    fn nnz(&self) -> usize {
        self.columns.len()
    }
}
