//! Per-partition implicit ALS solve: each assigned row is a weighted ridge
//! regression against the fixed factor matrix.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};
use crate::linalg;
use crate::protocol::TaskPayload;

/// Solves every row of one task. The wire matrices are validated against the
/// task's assigned range and factor width before any index is touched, so a
/// payload whose counts disagree with its slices is a decode failure rather
/// than a crashed worker.
pub fn solve_task(task: TaskPayload, lambda: f64) -> Result<DMatrix<f64>> {
    let row_count = task.row_count as usize;
    let confidence = task.confidence.into_matrix()?;
    let preference = task.preference.into_matrix()?;
    let fixed = task.fixed.into_matrix()?;

    if confidence.shape() != preference.shape() {
        return Err(Error::Decode(format!(
            "confidence slice is {}x{} but preference slice is {}x{}",
            confidence.nrows(),
            confidence.ncols(),
            preference.nrows(),
            preference.ncols()
        )));
    }
    if fixed.ncols() != task.col_count as usize {
        return Err(Error::Decode(format!(
            "fixed factor width {} does not match the task width {}",
            fixed.ncols(),
            task.col_count
        )));
    }
    let (assigned, span) = if task.solving_x {
        (confidence.nrows(), confidence.ncols())
    } else {
        (confidence.ncols(), confidence.nrows())
    };
    if assigned != row_count || span != fixed.nrows() {
        return Err(Error::Decode(format!(
            "slices carry {} assigned rows of span {}, task expects {} rows against {} fixed factor rows",
            assigned,
            span,
            row_count,
            fixed.nrows()
        )));
    }

    solve_rows(&confidence, &preference, &fixed, task.solving_x, row_count, lambda)
}

/// For assigned index k with confidence vector c_k and preference vector p_k:
///
/// ```text
/// A = MᵗM + Mᵗ(Ck − I)M + λI
/// b = MᵗCk p_k
/// row_k = A⁻¹ b      (via QR, A can be ill-conditioned for sparse rows)
/// ```
///
/// `MᵗM` is computed once and shared across all rows of the task. A
/// degenerate decomposition is a fatal numerical failure, never a
/// zero-filled row.
pub fn solve_rows(
    confidence: &DMatrix<f64>,
    preference: &DMatrix<f64>,
    fixed: &DMatrix<f64>,
    solving_x: bool,
    row_count: usize,
    lambda: f64,
) -> Result<DMatrix<f64>> {
    let n = fixed.nrows();
    let k = fixed.ncols();
    let transposed = fixed.transpose();
    let gram = &transposed * fixed;

    let mut result = DMatrix::zeros(row_count, k);
    for index in 0..row_count {
        let (c_k, p_k): (DVector<f64>, DVector<f64>) = if solving_x {
            (
                confidence.row(index).transpose(),
                preference.row(index).transpose(),
            )
        } else {
            (
                confidence.column(index).into_owned(),
                preference.column(index).into_owned(),
            )
        };
        if c_k.len() != n {
            return Err(Error::Numerical(format!(
                "confidence vector of length {} does not match the {} fixed factor rows",
                c_k.len(),
                n
            )));
        }

        let ck = linalg::diagonal_of(&c_k);
        let a = &gram
            + &transposed * ((&ck - DMatrix::<f64>::identity(n, n)) * fixed)
            + DMatrix::<f64>::identity(k, k) * lambda;
        let b = &transposed * (&ck * &p_k);

        let row = linalg::qr_solve(a, b).ok_or_else(|| {
            Error::Numerical(format!("degenerate solve matrix for assigned row {}", index))
        })?;
        result.set_row(index, &row.transpose());
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DenseWire;

    #[test]
    fn unit_confidence_identity_factors_reproduce_preference() {
        // With M = I and c_k = 1 everywhere, A = I + lambda*I and b = p_k,
        // so each solved row is p_k / (1 + lambda).
        let fixed = DMatrix::<f64>::identity(2, 2);
        let confidence = DMatrix::from_element(1, 2, 1.0);
        let preference = DMatrix::from_row_slice(1, 2, &[0.3, 0.7]);

        let result = solve_rows(&confidence, &preference, &fixed, true, 1, 0.0).unwrap();
        assert!((result[(0, 0)] - 0.3).abs() < 1e-12);
        assert!((result[(0, 1)] - 0.7).abs() < 1e-12);

        let ridged = solve_rows(&confidence, &preference, &fixed, true, 1, 1.0).unwrap();
        assert!((ridged[(0, 0)] - 0.15).abs() < 1e-12);
        assert!((ridged[(0, 1)] - 0.35).abs() < 1e-12);
    }

    #[test]
    fn column_sliced_task_reads_columns() {
        // Solving Y: the slices carry all user rows and one assigned column.
        let fixed = DMatrix::<f64>::identity(2, 2);
        let confidence = DMatrix::from_column_slice(2, 1, &[1.0, 1.0]);
        let preference = DMatrix::from_column_slice(2, 1, &[0.4, 0.6]);

        let result = solve_rows(&confidence, &preference, &fixed, false, 1, 0.0).unwrap();
        assert!((result[(0, 0)] - 0.4).abs() < 1e-12);
        assert!((result[(0, 1)] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn degenerate_system_is_a_numerical_failure() {
        let fixed = DMatrix::<f64>::zeros(2, 2);
        let confidence = DMatrix::from_element(1, 2, 1.0);
        let preference = DMatrix::from_element(1, 2, 1.0);

        let result = solve_rows(&confidence, &preference, &fixed, true, 1, 0.0);
        assert!(matches!(result, Err(Error::Numerical(_))));
    }

    #[test]
    fn solve_task_validates_wire_matrices() {
        let task = TaskPayload {
            row_count: 1,
            col_count: 2,
            solving_x: true,
            confidence: DenseWire {
                rows: 1,
                cols: 2,
                values: vec![1.0], // truncated on purpose
            },
            preference: DenseWire::from_matrix(&DMatrix::zeros(1, 2)),
            fixed: DenseWire::from_matrix(&DMatrix::identity(2, 2)),
        };
        assert!(matches!(solve_task(task, 0.5), Err(Error::Decode(_))));
    }

    #[test]
    fn overstated_row_count_is_a_decode_failure() {
        // The slices carry one row but the task claims three assigned rows.
        let task = TaskPayload {
            row_count: 3,
            col_count: 2,
            solving_x: true,
            confidence: DenseWire::from_matrix(&DMatrix::from_element(1, 2, 1.0)),
            preference: DenseWire::from_matrix(&DMatrix::zeros(1, 2)),
            fixed: DenseWire::from_matrix(&DMatrix::identity(2, 2)),
        };
        assert!(matches!(solve_task(task, 0.5), Err(Error::Decode(_))));
    }

    #[test]
    fn fixed_width_must_match_task_width() {
        let task = TaskPayload {
            row_count: 1,
            col_count: 3,
            solving_x: true,
            confidence: DenseWire::from_matrix(&DMatrix::from_element(1, 2, 1.0)),
            preference: DenseWire::from_matrix(&DMatrix::zeros(1, 2)),
            fixed: DenseWire::from_matrix(&DMatrix::identity(2, 2)),
        };
        assert!(matches!(solve_task(task, 0.5), Err(Error::Decode(_))));
    }

    #[test]
    fn column_sliced_task_validates_column_count() {
        // Solving Y: the assigned count lives on the column axis of the slices.
        let task = TaskPayload {
            row_count: 2,
            col_count: 2,
            solving_x: false,
            confidence: DenseWire::from_matrix(&DMatrix::from_element(2, 1, 1.0)),
            preference: DenseWire::from_matrix(&DMatrix::zeros(2, 1)),
            fixed: DenseWire::from_matrix(&DMatrix::identity(2, 2)),
        };
        assert!(matches!(solve_task(task, 0.5), Err(Error::Decode(_))));
    }
}
