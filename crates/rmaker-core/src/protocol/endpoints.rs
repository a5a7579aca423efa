//! Logical endpoint names understood by the device firmware.
//!
//! Names are transport-agnostic: HTTP posts to `/<name>`, BLE looks up a
//! characteristic whose user description equals the name, and the serial
//! console ignores it.

/// Capability probe (plaintext request, JSON response).
pub const PROTO_VER: &str = "proto-ver";
/// Handshake endpoint used while the device is in provisioning mode.
pub const PROV_SESSION: &str = "prov-session";
/// Wi-Fi scan sub-protocol.
pub const PROV_SCAN: &str = "prov-scan";
/// Wi-Fi set/apply/status.
pub const PROV_CONFIG: &str = "prov-config";
/// Wi-Fi state machine reset and re-provisioning.
pub const PROV_CTRL: &str = "prov-ctrl";
/// Legacy user-to-node identity binding.
pub const CLOUD_USER_ASSOC: &str = "cloud_user_assoc";
/// Challenge-response signing.
pub const CH_RESP: &str = "ch_resp";
/// Chunked node parameters.
pub const GET_PARAMS: &str = "get_params";
/// Chunked node configuration.
pub const GET_CONFIG: &str = "get_config";
/// JSON parameter update.
pub const SET_PARAMS: &str = "set_params";

/// Capability probe on an already-provisioned node.
pub const LOCAL_CTRL_VERSION: &str = "esp_local_ctrl/version";
/// Handshake endpoint for on-network local control.
pub const LOCAL_CTRL_SESSION: &str = "esp_local_ctrl/session";
/// Property get/set protocol.
pub const LOCAL_CTRL_CONTROL: &str = "esp_local_ctrl/control";

/// Marker payload sent to the capability probe endpoints.
pub const PROTO_VER_REQUEST: &[u8] = b"---";

/// Which family of endpoints a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Device is in provisioning mode (softAP, BLE or console).
    Provisioning,
    /// Device is already on the network and runs local control.
    LocalControl,
}

impl SessionKind {
    /// Endpoint carrying the handshake for this kind of session.
    pub fn session_endpoint(self) -> &'static str {
        match self {
            SessionKind::Provisioning => PROV_SESSION,
            SessionKind::LocalControl => LOCAL_CTRL_SESSION,
        }
    }

    /// Endpoint answering the capability probe for this kind of session.
    pub fn version_endpoint(self) -> &'static str {
        match self {
            SessionKind::Provisioning => PROTO_VER,
            SessionKind::LocalControl => LOCAL_CTRL_VERSION,
        }
    }
}
