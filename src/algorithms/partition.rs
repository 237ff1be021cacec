//! Load-aware row partitioning and the matching merge step.

use nalgebra::DMatrix;

use crate::error::{Error, Result};

/// One worker's contiguous row range, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

fn round_half_up(value: f64) -> usize {
    (value + 0.5).floor() as usize
}

/// Normalizes raw capacity weights. When every worker reports zero capacity
/// the shares degenerate, so fall back to equal weighting.
pub fn effective_weights(raw: &[f64]) -> (Vec<f64>, f64) {
    let total: f64 = raw.iter().sum();
    if total > 0.0 {
        (raw.to_vec(), total)
    } else {
        (vec![1.0; raw.len()], raw.len() as f64)
    }
}

/// Splits `rows` across the workers proportionally to their weights, in
/// registration order. Ranges are contiguous, disjoint, and cover exactly
/// `[0, rows)`; the last worker absorbs all rounding error. A worker whose
/// share rounds to nothing (or that comes after the rows have run out)
/// receives an empty range.
pub fn partition_ranges(weights: &[f64], total: f64, rows: usize) -> Vec<RowRange> {
    let mut ranges = Vec::with_capacity(weights.len());
    let mut start = 0;

    for (index, weight) in weights.iter().enumerate() {
        if start >= rows {
            ranges.push(RowRange { start, end: start });
            continue;
        }
        let end = if index < weights.len() - 1 {
            (start + round_half_up(weight / total * rows as f64)).min(rows)
        } else {
            rows
        };
        ranges.push(RowRange { start, end });
        start = end;
    }

    ranges
}

/// Concatenates partial result matrices in partition order. A missing or
/// misshapen part is a hard failure for the iteration; the merged matrix is
/// never silently shrunk.
pub fn merge(parts: Vec<DMatrix<f64>>, expected_rows: usize) -> Result<DMatrix<f64>> {
    let cols = parts
        .first()
        .map(|part| part.ncols())
        .ok_or_else(|| Error::Worker("no partition results to merge".into()))?;

    let total_rows: usize = parts.iter().map(|part| part.nrows()).sum();
    if total_rows != expected_rows {
        return Err(Error::Worker(format!(
            "merged result has {} rows, expected {}",
            total_rows, expected_rows
        )));
    }

    let mut merged = DMatrix::zeros(expected_rows, cols);
    let mut row = 0;
    for part in &parts {
        if part.ncols() != cols {
            return Err(Error::Worker(format!(
                "partition result has {} columns, expected {}",
                part.ncols(),
                cols
            )));
        }
        merged.rows_mut(row, part.nrows()).copy_from(part);
        row += part.nrows();
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covering(ranges: &[RowRange], rows: usize) {
        let mut cursor = 0;
        for range in ranges {
            assert_eq!(range.start, cursor);
            assert!(range.end >= range.start);
            cursor = range.end;
        }
        assert_eq!(cursor, rows);
    }

    #[test]
    fn weighted_split_three_to_one() {
        let ranges = partition_ranges(&[3.0, 1.0], 4.0, 8);
        assert_eq!(
            ranges,
            vec![RowRange { start: 0, end: 6 }, RowRange { start: 6, end: 8 }]
        );
    }

    #[test]
    fn ranges_cover_rows_exactly() {
        for rows in [1, 5, 8, 17, 100] {
            for weights in [vec![1.0, 1.0, 1.0], vec![5.0, 1.0, 2.0, 0.1], vec![2.0]] {
                let total: f64 = weights.iter().sum();
                let ranges = partition_ranges(&weights, total, rows);
                assert_eq!(ranges.len(), weights.len());
                assert_covering(&ranges, rows);
            }
        }
    }

    #[test]
    fn more_workers_than_rows_leaves_empty_ranges() {
        let ranges = partition_ranges(&[1.0, 1.0, 1.0, 1.0], 4.0, 2);
        assert_covering(&ranges, 2);
        assert!(ranges.iter().any(|r| r.is_empty()));
        assert_eq!(ranges.last().map(|r| r.end), Some(2));
    }

    #[test]
    fn zero_total_weight_falls_back_to_equal_shares() {
        let (weights, total) = effective_weights(&[0.0, 0.0, 0.0]);
        assert_eq!(weights, vec![1.0, 1.0, 1.0]);
        assert_eq!(total, 3.0);

        let ranges = partition_ranges(&weights, total, 9);
        assert_eq!(ranges[0].len(), 3);
        assert_eq!(ranges[1].len(), 3);
        assert_eq!(ranges[2].len(), 3);
    }

    #[test]
    fn merge_preserves_row_order() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let b = DMatrix::from_row_slice(1, 2, &[5.0, 6.0]);
        let merged = merge(vec![a, b], 3).unwrap();

        assert_eq!(merged[(0, 0)], 1.0);
        assert_eq!(merged[(1, 1)], 4.0);
        assert_eq!(merged[(2, 0)], 5.0);
        assert_eq!(merged[(2, 1)], 6.0);
    }

    #[test]
    fn merge_rejects_row_shortfall() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        assert!(merge(vec![a], 3).is_err());
    }

    #[test]
    fn merge_rejects_column_mismatch() {
        let a = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        let b = DMatrix::from_row_slice(1, 3, &[1.0, 2.0, 3.0]);
        assert!(merge(vec![a, b], 2).is_err());
    }
}
