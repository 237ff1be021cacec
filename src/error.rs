use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy for the cluster.
///
/// Per-request failures (a single client connection) are isolated to that
/// connection; a worker failure mid-iteration aborts the whole training run.
/// Out-of-bounds recommendation queries are not errors and never surface here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failure: {0}")]
    Connection(#[from] std::io::Error),

    #[error("decoding failure: {0}")]
    Decode(String),

    #[error("configuration failure: {0}")]
    Config(String),

    #[error("dataset failure: {0}")]
    Dataset(String),

    #[error("numerical failure: {0}")]
    Numerical(String),

    #[error("worker failure: {0}")]
    Worker(String),

    #[error("index out of range: {0}")]
    OutOfRange(String),
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Decode(err.to_string())
    }
}
