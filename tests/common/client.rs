//! Test relay client.
//!
//! Speaks newline-delimited JSON and offers assertions on received frames.

use serde_json::{Value, json};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

/// A test relay client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl TestClient {
    /// Connect to a test server.
    pub async fn connect(address: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(address).await?;

        let (read_half, write_half) = stream.into_split();
        let reader = BufReader::new(read_half);
        let writer = BufWriter::new(write_half);

        Ok(Self { reader, writer })
    }

    /// Send a raw line.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        if !line.ends_with('\n') {
            self.writer.write_all(b"\n").await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    /// Send a JSON value as one line.
    pub async fn send(&mut self, value: Value) -> anyhow::Result<()> {
        self.send_raw(&value.to_string()).await
    }

    /// Receive a single frame from the server.
    pub async fn recv(&mut self) -> anyhow::Result<Value> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive a frame with a timeout.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Value> {
        let mut line = String::new();
        let read = timeout(dur, self.reader.read_line(&mut line)).await??;
        if read == 0 {
            anyhow::bail!("connection closed by server");
        }
        Ok(serde_json::from_str(line.trim_end())?)
    }

    /// Receive frames until the predicate matches, returning all of them.
    #[allow(dead_code)]
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<Value>>
    where
        F: FnMut(&Value) -> bool,
    {
        let mut frames = Vec::new();
        loop {
            let frame = self.recv().await?;
            let done = predicate(&frame);
            frames.push(frame);
            if done {
                break;
            }
        }
        Ok(frames)
    }

    /// Fail if any frame arrives within `dur`.
    #[allow(dead_code)]
    pub async fn expect_silence(&mut self, dur: Duration) -> anyhow::Result<()> {
        match self.recv_timeout(dur).await {
            Ok(frame) => anyhow::bail!("unexpected frame: {frame}"),
            Err(_) => Ok(()),
        }
    }

    /// Send a login request and return the reply.
    pub async fn login(&mut self, username: &str) -> anyhow::Result<Value> {
        self.send(json!({"type": "login", "username": username})).await?;
        self.recv_until(|f| f["type"] == "login")
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("no login reply"))
    }

    /// Send a chat message.
    #[allow(dead_code)]
    pub async fn message(&mut self, destination: &str, text: &str) -> anyhow::Result<()> {
        self.send(json!({
            "type": "message",
            "text": text,
            "source": "test",
            "destination": destination
        }))
        .await
    }

    /// Close the write side so the server sees end of stream.
    #[allow(dead_code)]
    pub async fn quit(mut self) -> anyhow::Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
