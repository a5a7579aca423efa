//! Application layer: the provisioning and local-control use cases.
//!
//! # What lives here? (for beginners)
//!
//! Every use case talks to a device through the [`transport::Transport`]
//! trait and to the cloud through [`challenge::CloudAuthority`].  Neither
//! trait knows about sockets, HTTP clients or Bluetooth adapters; those
//! adapters live in `infrastructure` and are injected by `main.rs` (or by a
//! test).
//!
//! # Sub-modules
//!
//! - **`transport`**    – The byte-moving seam and its error type.
//! - **`session`**      – Handshake driver and the encrypted request helper
//!   every other use case goes through.
//! - **`capabilities`** – Plaintext capability probe.
//! - **`wifi`**         – Scan, set/apply credentials, status polling and
//!   the prov-ctrl reset/reprovision commands.
//! - **`user_mapping`** – Legacy `cloud_user_assoc` identity binding.
//! - **`challenge`**    – Cloud-initiated challenge, signed by the device.
//! - **`chunked`**      – Offset-based bulk read of params/config, with an
//!   optional signed-report mode.
//! - **`local_ctrl`**   – Property list/get/set and JSON parameter updates.
//! - **`orchestrator`** – The full provisioning run.

pub mod capabilities;
pub mod challenge;
pub mod chunked;
pub mod local_ctrl;
pub mod orchestrator;
pub mod session;
pub mod transport;
pub mod user_mapping;
pub mod wifi;

use rmaker_core::domain::capabilities::CapabilityError;
use rmaker_core::domain::wifi::ConnectionStatus;
use rmaker_core::protocol::codec::ProtocolError;
use rmaker_core::security::{CryptoError, HandshakeError};
use thiserror::Error;

use crate::application::challenge::CloudError;
use crate::application::transport::TransportError;

/// Every way a provisioning or local-control run can fail.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    /// Raised before any handshake bytes are sent.
    #[error("capability check failed: {0}")]
    Capability(#[from] CapabilityError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("cloud verification failed: {0}")]
    CloudVerification(#[from] CloudError),

    /// The station reached a terminal state other than connected.
    #[error("Wi-Fi provisioning failed: {0}")]
    Wifi(ConnectionStatus),

    #[error("Please claim the node before provisioning")]
    ClaimRequired,

    #[error("device does not support Wi-Fi scanning; pass an SSID")]
    ScanUnsupported,

    #[error("no Wi-Fi network selected")]
    NoNetworkSelected,

    #[error("device does not support challenge-response")]
    ChallengeResponseUnsupported,

    #[error("cloud rejected the node's challenge response")]
    IdentityRejected,

    /// Skipping Wi-Fi only makes sense when the node proves its identity.
    #[error("no_wifi provisioning needs a cloud session and a device advertising ch_resp")]
    NoWifiUnsupported,

    #[error("timed out waiting for the device to finish connecting")]
    Deadline,

    #[error("property '{0}' is read-only")]
    ReadOnlyProperty(String),

    #[error("property '{0}' not found")]
    PropertyNotFound(String),

    /// An encrypted request went out but no reply came back, so the
    /// cipher state on the two sides may differ.
    #[error("secure session unusable after failed exchange on {0}; reconnect and retry")]
    SessionDesynced(String),

    #[error("empty response from {0}")]
    EmptyResponse(&'static str),
}
