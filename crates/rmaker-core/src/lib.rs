//! # rmaker-core
//!
//! Wire messages, security schemes and domain types shared by the
//! provisioning and local-control tooling.
//!
//! This crate performs no I/O.  It knows how to build and parse every frame
//! a device understands and how to run the client side of each handshake,
//! but moving bytes is left to the transports in `rmaker-prov`.
//!
//! # Architecture overview (for beginners)
//!
//! A device in provisioning mode (or already on the network) exposes a set
//! of named *endpoints*.  The tool sends one request to an endpoint and gets
//! exactly one response back.  Before any command, a security session is
//! negotiated on the session endpoint; afterwards every command payload is
//! encrypted with the session key.
//!
//! - **`protocol`** – The protobuf schemas for every endpoint, plus helpers
//!   to encode/decode them and the BLE UUID mapping for endpoint names.
//!
//! - **`security`** – The three handshakes (plain, X25519 + proof of
//!   possession, SRP6a) behind one [`SecurityScheme`] enum, and a
//!   device-side responder used for loopback testing.
//!
//! - **`domain`** – Typed views of what the device reports: capabilities,
//!   Wi-Fi networks and connection state, local-control properties, and the
//!   addressing record for a target device.

pub mod domain;
pub mod protocol;
pub mod security;

pub use domain::capabilities::{
    select_scheme, Capabilities, CapabilityError, SchemeSelection, SecurityCredentials,
};
pub use domain::device::{DeviceInfo, DeviceTarget};
pub use domain::property::Property;
pub use domain::wifi::{AuthMode, ConnectionStatus, FailReason, WifiAccessPoint};
pub use protocol::codec::{decode, encode, ProtocolError};
pub use protocol::endpoints::SessionKind;
pub use security::{
    CryptoError, DeviceCredentials, HandshakeError, HandshakeState, SchemeVersion, SecurityScheme,
    SessionResponder,
};
