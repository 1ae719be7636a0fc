//! Column-major dense matrices. Each column is one channel (or one
//! correlation pair) stored contiguously, so per-column transforms work on
//! plain slices.

use std::ops::Range;

use num_complex::Complex;

use crate::error::{Result, XcorrError};

#[derive(Clone, Debug, PartialEq)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> Matrix<T> {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![T::default(); rows * cols],
        }
    }

    /// Build from column vectors; all columns must share one length.
    pub fn from_columns(columns: &[Vec<T>]) -> Result<Self> {
        let rows = columns.first().map_or(0, |c| c.len());
        let mut data = Vec::with_capacity(rows * columns.len());
        for (idx, column) in columns.iter().enumerate() {
            if column.len() != rows {
                return Err(XcorrError::ShapeMismatch {
                    expected: format!("{rows} rows"),
                    actual: format!("{} rows in column {idx}", column.len()),
                });
            }
            data.extend_from_slice(column);
        }
        Ok(Self {
            rows,
            cols: columns.len(),
            data,
        })
    }

    pub fn from_col_major(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(XcorrError::ShapeMismatch {
                expected: format!("{} elements ({rows}x{cols})", rows * cols),
                actual: format!("{} elements", data.len()),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Copy with every column extended (or cut) to `rows`, new rows zero.
    pub fn resized_rows(&self, rows: usize) -> Self {
        let mut out = Self::zeros(rows, self.cols);
        let keep = rows.min(self.rows);
        for j in 0..self.cols {
            out.column_mut(j)[..keep].copy_from_slice(&self.column(j)[..keep]);
        }
        out
    }
}

impl<T> Matrix<T> {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn column(&self, j: usize) -> &[T] {
        &self.data[j * self.rows..(j + 1) * self.rows]
    }

    pub fn column_mut(&mut self, j: usize) -> &mut [T] {
        &mut self.data[j * self.rows..(j + 1) * self.rows]
    }

    /// Mutable slices for a contiguous block of columns.
    pub fn columns_mut(&mut self, range: Range<usize>) -> Vec<&mut [T]> {
        let rows = self.rows;
        if rows == 0 {
            return range.map(|_| Default::default()).collect();
        }
        self.data[range.start * rows..range.end * rows]
            .chunks_mut(rows)
            .collect()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn get(&self, row: usize, col: usize) -> &T {
        &self.data[col * self.rows + row]
    }
}

/// Complex spectrum matrix seen as interleaved `re, im` pairs.
pub(crate) fn flatten_complex(data: &[Complex<f64>]) -> Vec<f64> {
    let mut out = Vec::with_capacity(data.len() * 2);
    for z in data {
        out.push(z.re);
        out.push(z.im);
    }
    out
}

pub(crate) fn unflatten_complex(flat: &[f64], out: &mut [Complex<f64>]) {
    debug_assert_eq!(flat.len(), out.len() * 2);
    for (z, pair) in out.iter_mut().zip(flat.chunks_exact(2)) {
        *z = Complex::new(pair[0], pair[1]);
    }
}
