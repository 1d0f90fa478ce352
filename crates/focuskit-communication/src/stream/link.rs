//! TCP transport of the command link
//!
//! A connect attempt runs as its own task, bounded by a timeout. Once
//! established the stream is split: a reader task forwards raw bytes and a
//! writer task drains a channel of outgoing lines. Everything the owner
//! needs to know arrives as [`LinkInput`] tagged with the connection id, so
//! inputs from a connection that has since been dropped can be ignored.

use super::streamer::LineSink;
use focuskit_core::{ConnectionError, DisconnectReason};
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const READ_BUFFER_SIZE: usize = 4096;

/// Connection identifier assigned by the caller
pub type LinkId = u64;

/// Event from a connect attempt or an established link
#[derive(Debug)]
pub enum LinkInput {
    /// The connection is up
    Connected {
        id: LinkId,
        handle: LinkHandle,
    },
    /// The attempt failed or timed out
    ConnectFailed {
        id: LinkId,
        address: String,
        error: ConnectionError,
    },
    /// Bytes read from the controller
    Data { id: LinkId, bytes: Vec<u8> },
    /// The connection ended
    Closed {
        id: LinkId,
        reason: DisconnectReason,
    },
}

impl LinkInput {
    pub fn id(&self) -> LinkId {
        match self {
            LinkInput::Connected { id, .. }
            | LinkInput::ConnectFailed { id, .. }
            | LinkInput::Data { id, .. }
            | LinkInput::Closed { id, .. } => *id,
        }
    }
}

/// Write side of an established link; dropping it closes the connection
#[derive(Debug)]
pub struct LinkHandle {
    id: LinkId,
    outgoing: mpsc::UnboundedSender<String>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl LinkHandle {
    pub fn id(&self) -> LinkId {
        self.id
    }
}

impl LineSink for LinkHandle {
    fn send_line(&mut self, line: &str) -> Result<(), ConnectionError> {
        self.outgoing
            .send(format!("{}\n", line))
            .map_err(|_| ConnectionError::ConnectionLost {
                reason: "writer stopped".to_string(),
            })
    }
}

impl Drop for LinkHandle {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Start a connect attempt on the current runtime
pub fn spawn_connect(
    id: LinkId,
    address: String,
    timeout: Duration,
    inputs: mpsc::Sender<LinkInput>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let input = match connect(id, &address, timeout, inputs.clone()).await {
            Ok(handle) => LinkInput::Connected { id, handle },
            Err(error) => LinkInput::ConnectFailed { id, address, error },
        };
        let _ = inputs.send(input).await;
    })
}

/// Connect and start the reader and writer tasks
pub async fn connect(
    id: LinkId,
    address: &str,
    timeout: Duration,
    inputs: mpsc::Sender<LinkInput>,
) -> Result<LinkHandle, ConnectionError> {
    tracing::info!("Connecting to {}", address);
    let stream = dial(address, timeout, TcpStream::connect(address)).await?;
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Failed to set TCP_NODELAY: {}", e);
    }
    tracing::info!("Connected to {}", address);

    let (read_half, write_half) = stream.into_split();
    let (outgoing, rx) = mpsc::unbounded_channel();
    let reader = tokio::spawn(recv_loop(id, read_half, inputs));
    let writer = tokio::spawn(send_loop(write_half, rx));

    Ok(LinkHandle {
        id,
        outgoing,
        reader,
        writer,
    })
}

/// Bound a connect attempt by `timeout`, mapping its outcome to a
/// [`ConnectionError`]
async fn dial<T, F>(address: &str, timeout: Duration, attempt: F) -> Result<T, ConnectionError>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(ConnectionError::TcpError {
            reason: format!("{}: {}", address, e),
        }),
        Err(_) => Err(ConnectionError::ConnectionTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

async fn recv_loop(id: LinkId, mut read_half: OwnedReadHalf, inputs: mpsc::Sender<LinkInput>) {
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let reason = loop {
        match read_half.read(&mut buffer).await {
            Ok(0) => {
                tracing::info!("Controller closed the connection");
                break DisconnectReason::RemoteClosed;
            }
            Ok(n) => {
                let input = LinkInput::Data {
                    id,
                    bytes: buffer[..n].to_vec(),
                };
                if inputs.send(input).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::error!("Read from controller failed: {}", e);
                break DisconnectReason::Error(e.to_string());
            }
        }
    };
    let _ = inputs.send(LinkInput::Closed { id, reason }).await;
}

async fn send_loop(mut write_half: OwnedWriteHalf, mut outgoing: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = outgoing.recv().await {
        if let Err(e) = write_half.write_all(line.as_bytes()).await {
            tracing::error!("Write to controller failed: {}", e);
            break;
        }
    }
    let _ = write_half.shutdown().await;
}
