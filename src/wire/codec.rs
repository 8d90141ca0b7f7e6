//! Newline-delimited JSON framing.
//!
//! A frame is a single JSON document followed by one `\n`. serde_json never emits raw
//! newlines inside a compact document, so the delimiter is unambiguous.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout_at};

const DELIMITER: u8 = b'\n';

#[derive(Debug, Error)]
pub enum WireError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("peer closed the connection")]
    Closed,
    #[error("exchange deadline exceeded")]
    DeadlineExceeded,
}

/// Writes `message` as one frame and flushes.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut bytes = serde_json::to_vec(message).map_err(WireError::Encode)?;
    bytes.push(DELIMITER);
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads bytes up to the next delimiter and decodes them.
pub async fn read_message<R, T>(reader: &mut R) -> Result<T, WireError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut frame = Vec::new();
    let read = reader.read_until(DELIMITER, &mut frame).await?;
    if read == 0 || frame.last() != Some(&DELIMITER) {
        return Err(WireError::Closed);
    }
    serde_json::from_slice(&frame).map_err(WireError::Decode)
}

/// A framed TCP connection whose operations share one absolute deadline until it is restarted.
pub struct JsonConnection {
    stream: BufReader<TcpStream>,
    deadline: Instant,
}

impl JsonConnection {
    /// Dials `addr`; the whole exchange, dial included, must finish within `budget`.
    pub async fn connect(addr: SocketAddr, budget: Duration) -> Result<Self, WireError> {
        let deadline = Instant::now() + budget;
        let stream = timeout_at(deadline, TcpStream::connect(addr))
            .await
            .map_err(|_| WireError::DeadlineExceeded)?
            .map_err(|source| WireError::Connect { addr, source })?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream: BufReader::new(stream),
            deadline,
        })
    }

    /// Wraps an accepted stream; the exchange must finish within `budget`.
    pub fn accepted(stream: TcpStream, budget: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            deadline: Instant::now() + budget,
        }
    }

    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<(), WireError> {
        timeout_at(self.deadline, write_message(&mut self.stream, message))
            .await
            .map_err(|_| WireError::DeadlineExceeded)?
    }

    pub async fn receive<T: DeserializeOwned>(&mut self) -> Result<T, WireError> {
        timeout_at(self.deadline, read_message(&mut self.stream))
            .await
            .map_err(|_| WireError::DeadlineExceeded)?
    }

    /// Starts a fresh deadline `budget` from now for the remaining operations.
    pub fn restart_deadline(&mut self, budget: Duration) {
        self.deadline = Instant::now() + budget;
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.get_ref().peer_addr().ok()
    }
}
