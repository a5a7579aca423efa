//! Capability probe over the plaintext version endpoint.

use rmaker_core::domain::capabilities::Capabilities;
use rmaker_core::protocol::endpoints::PROTO_VER_REQUEST;
use rmaker_core::SessionKind;
use tracing::{debug, warn};

use crate::application::transport::Transport;

/// Fetches and parses the capability document.
///
/// Returns `None` when the device cannot be probed or answers with
/// something other than JSON; scheme selection then falls back to its
/// defaults.
pub async fn probe(transport: &dyn Transport, kind: SessionKind) -> Option<Capabilities> {
    let endpoint = kind.version_endpoint();
    let raw = match transport.send(endpoint, PROTO_VER_REQUEST).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("capability probe on {endpoint} failed: {e}");
            return None;
        }
    };
    debug!("{endpoint}: {}", String::from_utf8_lossy(&raw));

    match Capabilities::parse(&raw) {
        Ok(caps) => Some(caps),
        Err(e) => {
            warn!("{e}");
            None
        }
    }
}
