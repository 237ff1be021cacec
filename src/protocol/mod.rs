//! Wire schema and framing shared by the master, the workers and the clients.
//!
//! Every message is one frame: a little-endian u32 payload length followed by
//! the bincode-encoded payload. Matrices travel as explicit dimensions plus
//! row-major values so both ends can validate shape before touching the data.

use nalgebra::DMatrix;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket};

use crate::error::{Error, Result};
use crate::models::PoiRecord;

/// Upper bound on a single frame. A full dense factor task for the default
/// dimensions is far below this; anything larger is a decoding failure.
const MAX_FRAME: u32 = 256 * 1024 * 1024;

/// Dense matrix on the wire: dimensions plus row-major values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseWire {
    pub rows: u32,
    pub cols: u32,
    pub values: Vec<f64>,
}

impl DenseWire {
    pub fn from_matrix(m: &DMatrix<f64>) -> Self {
        let mut values = Vec::with_capacity(m.nrows() * m.ncols());
        for row in m.row_iter() {
            values.extend(row.iter().copied());
        }
        Self {
            rows: m.nrows() as u32,
            cols: m.ncols() as u32,
            values,
        }
    }

    pub fn into_matrix(self) -> Result<DMatrix<f64>> {
        let expected = self.rows as usize * self.cols as usize;
        if self.values.len() != expected {
            return Err(Error::Decode(format!(
                "matrix {}x{} carries {} values, expected {}",
                self.rows,
                self.cols,
                self.values.len(),
                expected
            )));
        }
        Ok(DMatrix::from_row_slice(
            self.rows as usize,
            self.cols as usize,
            &self.values,
        ))
    }
}

/// First message a worker sends after connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerHello {
    pub cores: i64,
    pub free_memory: i64,
}

/// One worker's share of a half-iteration: its contiguous row range of the
/// matrix being solved, expressed as the aligned confidence and preference
/// slices plus the full fixed factor matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub row_count: u32,
    pub col_count: u32,
    /// True when rows of X (users) are being solved; the confidence and
    /// preference slices then run along the row axis, otherwise the column
    /// axis.
    pub solving_x: bool,
    pub confidence: DenseWire,
    pub preference: DenseWire,
    pub fixed: DenseWire,
}

/// What the master sends a worker each round: more work, or the signal to
/// shut down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Assignment {
    Task(TaskPayload),
    Terminate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub rows: DenseWire,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendRequest {
    pub user_id: u64,
    /// Candidate the client already knows about; never recommended back.
    pub exclude: PoiRecord,
    pub count: u64,
}

/// `items: None` marks an out-of-bounds user id or count. It is distinct
/// from `Some(vec![])`, which is a legal empty result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub items: Option<Vec<u64>>,
}

pub async fn send_frame<W, T>(stream: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(msg)?;
    if payload.len() > MAX_FRAME as usize {
        return Err(Error::Decode(format!(
            "frame of {} bytes exceeds the {} byte limit",
            payload.len(),
            MAX_FRAME
        )));
    }
    stream.write_all(&(payload.len() as u32).to_le_bytes()).await?;
    stream.write_all(&payload).await?;
    stream.flush().await?;
    Ok(())
}

pub async fn read_frame<R, T>(stream: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf);
    if len > MAX_FRAME {
        return Err(Error::Decode(format!(
            "frame of {} bytes exceeds the {} byte limit",
            len, MAX_FRAME
        )));
    }
    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload).await?;
    Ok(bincode::deserialize(&payload)?)
}

/// Binds a listener with an explicit accept backlog.
pub fn listen(addr: &str, backlog: u32) -> Result<TcpListener> {
    let addr = addr
        .parse()
        .map_err(|e| Error::Config(format!("invalid listen address {}: {}", addr, e)))?;
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    Ok(socket.listen(backlog)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_wire_roundtrip_is_exact() {
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 2.5, -3.0, 0.0, 41.0, 1e-9]);
        let wire = DenseWire::from_matrix(&m);
        assert_eq!(wire.rows, 2);
        assert_eq!(wire.cols, 3);
        let back = wire.into_matrix().unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn dense_wire_rejects_dimension_mismatch() {
        let wire = DenseWire {
            rows: 2,
            cols: 2,
            values: vec![1.0; 3],
        };
        assert!(wire.into_matrix().is_err());
    }

    #[tokio::test]
    async fn frame_roundtrip_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(64 * 1024);

        let task = Assignment::Task(TaskPayload {
            row_count: 2,
            col_count: 2,
            solving_x: true,
            confidence: DenseWire::from_matrix(&DMatrix::from_element(2, 4, 1.0)),
            preference: DenseWire::from_matrix(&DMatrix::zeros(2, 4)),
            fixed: DenseWire::from_matrix(&DMatrix::identity(4, 2)),
        });
        send_frame(&mut a, &task).await.unwrap();

        let decoded: Assignment = read_frame(&mut b).await.unwrap();
        assert_eq!(decoded, task);
    }

    #[tokio::test]
    async fn terminate_roundtrip() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        send_frame(&mut a, &Assignment::Terminate).await.unwrap();
        let decoded: Assignment = read_frame(&mut b).await.unwrap();
        assert_eq!(decoded, Assignment::Terminate);
    }

    #[tokio::test]
    async fn truncated_frame_is_a_decode_failure() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        a.write_all(&100u32.to_le_bytes()).await.unwrap();
        a.write_all(&[0u8; 10]).await.unwrap();
        drop(a);

        let result: Result<Assignment> = read_frame(&mut b).await;
        assert!(result.is_err());
    }

    #[test]
    fn no_result_marker_differs_from_empty_list() {
        let none = bincode::serialize(&RecommendResponse { items: None }).unwrap();
        let empty = bincode::serialize(&RecommendResponse {
            items: Some(Vec::new()),
        })
        .unwrap();
        assert_ne!(none, empty);
    }
}
