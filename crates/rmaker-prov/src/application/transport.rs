//! The transport seam: send one payload to a named endpoint, get one back.
//!
//! Implementations live in `infrastructure::transport` (HTTP, serial
//! console, BLE and an in-memory mock device).  Use cases only ever see
//! `Arc<dyn Transport>`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Physical link a transport runs over.
///
/// Some exchanges adapt to it: a Wi-Fi scan pages 4 results at a time over
/// BLE and asks for channel grouping on the soft access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Http,
    Ble,
    Console,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Http => f.write_str("http"),
            TransportKind::Ble => f.write_str("ble"),
            TransportKind::Console => f.write_str("console"),
        }
    }
}

/// Errors raised while moving bytes to or from a device.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The device host name did not resolve; nothing was sent.
    #[error("could not resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    /// The link could not be opened.
    #[error("failed to connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    /// The HTTP server answered with something other than 200.
    #[error("Server responded with error code {0}")]
    HttpStatus(u16),

    /// The device does not expose the endpoint.
    #[error("endpoint '{0}' not found on device")]
    EndpointNotFound(String),

    /// No response arrived in time.
    #[error("no response on '{endpoint}' within {after:?}")]
    Timeout { endpoint: String, after: Duration },

    /// A response line could not be decoded.
    #[error("invalid frame from device: {0}")]
    InvalidFrame(String),

    /// Reading or writing the link failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// The transport was used after `disconnect`.
    #[error("transport is closed")]
    Closed,

    /// The binary was built without support for this link.
    #[error("{0} transport is not available in this build")]
    Unsupported(TransportKind),
}

/// Half-duplex request/response link to one device.
///
/// `send` waits for exactly one response or a timeout.  Implementations
/// serialize concurrent callers so requests never overlap on the wire.
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// `false` when the link already knows the device lacks `endpoint`.
    ///
    /// Links that cannot tell without sending (HTTP) answer `true` and
    /// report [`TransportError::EndpointNotFound`] from `send` instead.
    fn has_endpoint(&self, _endpoint: &str) -> bool {
        true
    }

    /// Sends `payload` to `endpoint` and returns the device's response.
    async fn send(&self, endpoint: &str, payload: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Releases the link.  Further `send` calls fail with
    /// [`TransportError::Closed`].
    async fn disconnect(&self) -> Result<(), TransportError>;
}
