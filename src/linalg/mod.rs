use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sparse interaction matrix in coordinate form. Doubles as its own wire
/// representation: dimensions plus (row, col, value) triples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseMatrix {
    rows: usize,
    cols: usize,
    entries: Vec<(u32, u32, f64)>,
}

impl SparseMatrix {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            entries: Vec::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        if row >= self.rows || col >= self.cols {
            return Err(Error::OutOfRange(format!(
                "entry ({}, {}) outside {}x{} matrix",
                row, col, self.rows, self.cols
            )));
        }
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(r, c, _)| *r as usize == row && *c as usize == col)
        {
            entry.2 = value;
        } else {
            self.entries.push((row as u32, col as u32, value));
        }
        Ok(())
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.entries
            .iter()
            .find(|(r, c, _)| *r as usize == row && *c as usize == col)
            .map(|(_, _, v)| *v)
            .unwrap_or(0.0)
    }

    pub fn entries(&self) -> impl Iterator<Item = &(u32, u32, f64)> {
        self.entries.iter()
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.rows, self.cols);
        for &(r, c, v) in &self.entries {
            dense[(r as usize, c as usize)] = v;
        }
        dense
    }
}

/// Solves `a * x = b` through a QR decomposition. Returns `None` when the
/// decomposition is degenerate; callers treat that as a numerical failure
/// rather than falling back to zero-filled rows.
pub fn qr_solve(a: DMatrix<f64>, b: DVector<f64>) -> Option<DVector<f64>> {
    a.qr().solve(&b)
}

pub fn diagonal_of(v: &DVector<f64>) -> DMatrix<f64> {
    DMatrix::from_diagonal(v)
}
