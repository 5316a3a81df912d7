//! Connection - Handles an individual client connection.
//!
//! Each Connection runs in its own Tokio task. The read half decodes JSON
//! lines and forwards records to the session's lane; a writer task drains
//! the session's bounded outbound queue into the socket.
//!
//! ```text
//!   socket ──FramedRead──▶ Connection ──Inbound──▶ lane
//!   socket ◀─FramedWrite── writer task ◀─mpsc──── Session::send
//! ```
//!
//! The writer ends once the lane drops the session, which happens when it
//! handles the `Closed` event posted here at end of stream.

use crate::state::{CloseReason, Hub};
use futures_util::{SinkExt, StreamExt};
use relay_proto::{Decoded, JsonLineCodec, Outbound};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, instrument, warn};

/// A client connection handler.
pub struct Connection {
    addr: SocketAddr,
    hub: Arc<Hub>,
    stream: TcpStream,
    max_line_length: usize,
}

impl Connection {
    pub fn new(stream: TcpStream, addr: SocketAddr, hub: Arc<Hub>, max_line_length: usize) -> Self {
        Self {
            addr,
            hub,
            stream,
            max_line_length,
        }
    }

    /// Run the connection until the peer goes away.
    #[instrument(skip(self), fields(addr = %self.addr), name = "connection")]
    pub async fn run(self) -> anyhow::Result<()> {
        let codec = JsonLineCodec::with_max_length(self.max_line_length);
        let (read_half, write_half) = self.stream.into_split();
        let mut reader = FramedRead::new(read_half, codec.clone());
        let mut writer = FramedWrite::new(write_half, codec);

        let (tx, mut rx) = mpsc::channel::<Outbound>(self.hub.outbound_queue());
        let key = self.hub.attach(self.addr, tx);
        let session = key.id;
        debug!(%session, lane = key.lane(), "Session attached");

        let write_task = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = writer.send(frame).await {
                    debug!(%session, error = %e, "Write failed, stopping writer");
                    return;
                }
            }
            if let Err(e) = writer.close().await {
                debug!(%session, error = %e, "Failed to close writer");
            }
        });

        let reason = loop {
            match reader.next().await {
                Some(Ok(Decoded::Record(record))) => {
                    debug!(%session, "JSON received");
                    self.hub.inbound(&key, record);
                }
                Some(Ok(Decoded::Malformed(err))) => {
                    debug!(%session, error = %err, "Malformed line dropped");
                    crate::metrics::record_handler_error("decode", "malformed");
                }
                Some(Err(e)) => {
                    warn!(%session, error = %e, "Transport error");
                    break CloseReason::Transport(e.to_string());
                }
                None => break CloseReason::Eof,
            }
        };

        self.hub.disconnect(&key, reason);
        write_task.await?;
        Ok(())
    }
}
