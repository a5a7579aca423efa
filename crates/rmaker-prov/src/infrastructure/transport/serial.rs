//! Serial console transport: hex lines over a character device.
//!
//! Firmware in console mode reads one line of hex from its UART, treats it
//! as the request for whatever exchange is in progress, and answers with one
//! line of hex.  The endpoint name never crosses the wire; the exchange
//! order alone tells the device what the bytes mean.
//!
//! ```text
//! host ─► "0a0208011200\n"
//! host ◄─ "0a0408011000\n"
//! ```
//!
//! Blank lines and lines that are not valid hex (boot log noise, including
//! bytes that are not UTF-8) are skipped while waiting for the answer.  A
//! read that times out is retried by re-sending the request, up to the
//! configured retry count.
//!
//! Every request written is owed one hex reply.  A resend leaves the device
//! owing two; the first to arrive answers the exchange and the other is
//! dropped before the next exchange reads its own reply.  Bytes of a line
//! cut off by a timeout stay buffered and are completed by the next read.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::application::transport::{Transport, TransportError, TransportKind};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct Console {
    reader: BufReader<BoxedReader>,
    writer: BoxedWriter,
    closed: bool,
    /// Bytes of the line currently being read.
    partial: Vec<u8>,
    /// Replies the device still owes for requests already written.
    owed: usize,
    /// Owed replies that belong to earlier exchanges.
    stale: usize,
}

/// Half-duplex hex-line link to a device console.
pub struct SerialTransport {
    console: Mutex<Console>,
    read_timeout: Duration,
    retries: u32,
}

impl SerialTransport {
    /// Opens the character device at `path` for reading and writing.
    ///
    /// The port must already be configured (baud rate, raw mode), e.g. with
    /// `stty -F /dev/ttyUSB0 115200 raw`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] if the device cannot be opened.
    pub async fn open(
        path: &str,
        read_timeout: Duration,
        retries: u32,
    ) -> Result<Self, TransportError> {
        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .await
            .map_err(|e| TransportError::Connect {
                target: path.to_string(),
                reason: e.to_string(),
            })?;
        debug!("opened serial console {path}");
        Ok(Self::from_stream(file, read_timeout, retries))
    }

    /// Wraps any duplex byte stream.
    pub fn from_stream<S>(stream: S, read_timeout: Duration, retries: u32) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer): (ReadHalf<S>, WriteHalf<S>) = tokio::io::split(stream);
        Self {
            console: Mutex::new(Console {
                reader: BufReader::new(Box::new(reader)),
                writer: Box::new(writer),
                closed: false,
                partial: Vec::new(),
                owed: 0,
                stale: 0,
            }),
            read_timeout,
            retries,
        }
    }
}

impl Console {
    async fn write_request(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let mut line = hex::encode(payload);
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        self.owed += 1;
        Ok(())
    }

    /// Reads lines until one decodes as hex.
    ///
    /// Cancel-safe: an unfinished line stays in `partial`.
    async fn read_hex_line(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            let read = self
                .reader
                .read_until(b'\n', &mut self.partial)
                .await
                .map_err(|e| TransportError::Io(e.to_string()))?;
            if read == 0 && self.partial.is_empty() {
                return Err(TransportError::Closed);
            }
            let line = std::mem::take(&mut self.partial);
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            match hex::decode(text) {
                Ok(bytes) => return Ok(bytes),
                Err(_) => trace!("console: skipping non-hex line '{text}'"),
            }
        }
    }

    /// Returns the first hex reply that belongs to the current exchange.
    async fn read_response(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            let reply = self.read_hex_line().await?;
            self.owed = self.owed.saturating_sub(1);
            if self.stale == 0 {
                return Ok(reply);
            }
            self.stale -= 1;
            debug!("console: dropping late reply ({} bytes)", reply.len());
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Console
    }

    async fn send(&self, endpoint: &str, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut console = self.console.lock().await;
        if console.closed {
            return Err(TransportError::Closed);
        }

        console.stale = console.owed;
        for attempt in 0..=self.retries {
            console.write_request(payload).await?;
            match tokio::time::timeout(self.read_timeout, console.read_response()).await {
                Ok(result) => return result,
                Err(_) if attempt < self.retries => {
                    warn!(
                        "console: no answer for {endpoint} (attempt {}/{}), resending",
                        attempt + 1,
                        self.retries + 1
                    );
                }
                Err(_) => break,
            }
        }
        // Nothing answered any attempt; assume the device dropped them all.
        console.owed = 0;
        console.stale = 0;
        Err(TransportError::Timeout {
            endpoint: endpoint.to_string(),
            after: self.read_timeout,
        })
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut console = self.console.lock().await;
        console.closed = true;
        console
            .writer
            .shutdown()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn test_send_writes_hex_line_and_decodes_reply() {
        // Arrange
        let (host, device) = duplex(1024);
        let transport = SerialTransport::from_stream(host, TIMEOUT, 0);
        let (device_rx, mut device_tx) = tokio::io::split(device);
        let device_task = tokio::spawn(async move {
            let mut lines = BufReader::new(device_rx).lines();
            let request = lines.next_line().await.unwrap().unwrap();
            device_tx.write_all(b"I (312) boot: ready\n\n").await.unwrap();
            device_tx.write_all(b"cafe\n").await.unwrap();
            request
        });

        // Act
        let reply = transport.send("prov-session", &[0x0a, 0x02]).await.unwrap();

        // Assert
        assert_eq!(reply, vec![0xca, 0xfe]);
        assert_eq!(device_task.await.unwrap(), "0a02");
    }

    #[tokio::test]
    async fn test_silent_device_is_retried_then_times_out() {
        // Arrange
        let (host, device) = duplex(1024);
        let transport = SerialTransport::from_stream(host, Duration::from_millis(30), 2);

        // Act
        let result = transport.send("prov-config", b"\x01").await;

        // Assert
        assert!(matches!(result, Err(TransportError::Timeout { .. })));
        let mut received = String::new();
        let mut reader = BufReader::new(device);
        for _ in 0..3 {
            reader.read_line(&mut received).await.unwrap();
        }
        assert_eq!(received, "01\n01\n01\n");
    }

    #[tokio::test]
    async fn test_late_reply_to_resent_request_is_not_taken_by_next_exchange() {
        // Arrange: the device answers only after the resend, then answers
        // both copies of the first request before the second one
        let (host, device) = duplex(1024);
        let transport = SerialTransport::from_stream(host, Duration::from_millis(30), 1);
        let (device_rx, mut device_tx) = tokio::io::split(device);
        let device_task = tokio::spawn(async move {
            let mut lines = BufReader::new(device_rx).lines();
            assert_eq!(lines.next_line().await.unwrap().unwrap(), "01");
            assert_eq!(lines.next_line().await.unwrap().unwrap(), "01");
            device_tx.write_all(b"aa\naa\n").await.unwrap();
            assert_eq!(lines.next_line().await.unwrap().unwrap(), "02");
            device_tx.write_all(b"bb\n").await.unwrap();
        });

        // Act
        let first = transport.send("prov-scan", b"\x01").await.unwrap();
        let second = transport.send("prov-scan", b"\x02").await.unwrap();

        // Assert
        assert_eq!(first, vec![0xaa]);
        assert_eq!(second, vec![0xbb]);
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_line_cut_by_timeout_is_completed_after_resend() {
        // Arrange: half a reply arrives before the timeout, the rest after
        let (host, device) = duplex(1024);
        let transport = SerialTransport::from_stream(host, Duration::from_millis(30), 1);
        let (device_rx, mut device_tx) = tokio::io::split(device);
        tokio::spawn(async move {
            let mut lines = BufReader::new(device_rx).lines();
            lines.next_line().await.unwrap();
            device_tx.write_all(b"ca").await.unwrap();
            lines.next_line().await.unwrap();
            device_tx.write_all(b"fe\n").await.unwrap();
        });

        // Act
        let reply = transport.send("prov-session", b"\x0a").await.unwrap();

        // Assert
        assert_eq!(reply, vec![0xca, 0xfe]);
    }

    #[tokio::test]
    async fn test_non_utf8_noise_is_skipped() {
        let (host, device) = duplex(1024);
        let transport = SerialTransport::from_stream(host, TIMEOUT, 0);
        let (device_rx, mut device_tx) = tokio::io::split(device);
        tokio::spawn(async move {
            let mut lines = BufReader::new(device_rx).lines();
            lines.next_line().await.unwrap();
            device_tx.write_all(b"\xff\xfe\x80 rst:0x1\n").await.unwrap();
            device_tx.write_all(b"beef\n").await.unwrap();
        });

        let reply = transport.send("proto-ver", b"---").await.unwrap();

        assert_eq!(reply, vec![0xbe, 0xef]);
    }

    #[tokio::test]
    async fn test_device_hangup_is_closed() {
        let (host, device) = duplex(64);
        let transport = SerialTransport::from_stream(host, TIMEOUT, 0);
        drop(device);

        let result = transport.send("proto-ver", b"---").await;

        assert!(matches!(
            result,
            Err(TransportError::Closed) | Err(TransportError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnect_rejects_further_sends() {
        let (host, _device) = duplex(64);
        let transport = SerialTransport::from_stream(host, TIMEOUT, 0);

        transport.disconnect().await.unwrap();

        assert_eq!(
            transport.send("proto-ver", b"---").await,
            Err(TransportError::Closed)
        );
        assert_eq!(transport.kind(), TransportKind::Console);
    }
}
