//! Loads the sparse interaction dataset from a delimited file.
//!
//! Each line is `user, item, value` with optional whitespace around fields.
//! Any parse or I/O failure is fatal at startup.

use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::linalg::SparseMatrix;

pub fn load_interactions(path: &Path, rows: usize, cols: usize) -> Result<SparseMatrix> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| Error::Dataset(format!("{}: {}", path.display(), err)))?;

    let mut matrix = SparseMatrix::new(rows, cols);
    for (line_index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split(',');
        let user = parse_index(fields.next(), line_index)?;
        let item = parse_index(fields.next(), line_index)?;
        let value = parse_value(fields.next(), line_index)?;

        matrix.set(user, item, value).map_err(|_| {
            Error::Dataset(format!(
                "line {}: entry ({}, {}) outside {}x{} matrix",
                line_index + 1,
                user,
                item,
                rows,
                cols
            ))
        })?;
    }

    info!(
        "loaded {} interactions into a {}x{} matrix from {}",
        matrix.nnz(),
        rows,
        cols,
        path.display()
    );
    Ok(matrix)
}

fn parse_index(field: Option<&str>, line_index: usize) -> Result<usize> {
    field
        .map(str::trim)
        .ok_or_else(|| Error::Dataset(format!("line {}: missing field", line_index + 1)))?
        .parse()
        .map_err(|err| Error::Dataset(format!("line {}: {}", line_index + 1, err)))
}

fn parse_value(field: Option<&str>, line_index: usize) -> Result<f64> {
    field
        .map(str::trim)
        .ok_or_else(|| Error::Dataset(format!("line {}: missing field", line_index + 1)))?
        .parse()
        .map_err(|err| Error::Dataset(format!("line {}: {}", line_index + 1, err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_dataset(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn loads_delimited_interactions() {
        let file = write_dataset("0, 1, 3.5\n2,5,1\n\n 4 , 0 , 2.0 \n");
        let matrix = load_interactions(file.path(), 6, 8).unwrap();

        assert_eq!(matrix.nnz(), 3);
        assert_eq!(matrix.get(0, 1), 3.5);
        assert_eq!(matrix.get(2, 5), 1.0);
        assert_eq!(matrix.get(4, 0), 2.0);
    }

    #[test]
    fn missing_file_is_fatal() {
        assert!(load_interactions(Path::new("does/not/exist.csv"), 2, 2).is_err());
    }

    #[test]
    fn malformed_line_is_fatal() {
        let file = write_dataset("0, not-a-number, 1\n");
        assert!(load_interactions(file.path(), 2, 2).is_err());
    }

    #[test]
    fn out_of_range_entry_is_fatal() {
        let file = write_dataset("5, 0, 1\n");
        assert!(load_interactions(file.path(), 2, 2).is_err());
    }

    #[test]
    fn missing_field_is_fatal() {
        let file = write_dataset("1, 2\n");
        assert!(load_interactions(file.path(), 4, 4).is_err());
    }
}
