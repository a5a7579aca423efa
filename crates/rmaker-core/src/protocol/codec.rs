//! Shared encode/decode entry points for every device message family.
//!
//! All frames are protobuf-encoded ([`crate::protocol::messages`]).  This
//! module wraps `prost` so callers see a single [`ProtocolError`] type with
//! the name of the offending message, and adds the small checks every
//! response handler needs (message discriminant, status code, payload
//! presence).

use prost::Message;
use thiserror::Error;

use crate::protocol::messages::{
    LocalCtrlMessage, RMakerChRespPayload, RMakerConfigPayload, RMakerLocalCtrlPayload,
    SessionData, WiFiConfigPayload, WiFiCtrlPayload, WiFiScanPayload,
};

/// Errors that can occur while encoding, decoding or interpreting a frame.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The frame could not be parsed as the expected protobuf message.
    #[error("malformed {message} frame: {reason}")]
    Malformed {
        message: &'static str,
        reason: String,
    },

    /// The message discriminant is not the one this exchange expects.
    #[error("unexpected {message} message type: expected {expected}, got {actual}")]
    UnexpectedMessageType {
        message: &'static str,
        expected: i32,
        actual: i32,
    },

    /// The frame decoded but the variant-specific payload is absent.
    #[error("{message} frame carries no payload")]
    MissingPayload { message: &'static str },

    /// The device answered with a non-success status code.
    #[error("device returned status {status} for {message}")]
    DeviceStatus { message: &'static str, status: i32 },

    /// The device echoed a different chunk offset than the one requested.
    #[error("offset mismatch: requested {requested}, device answered {received}")]
    OffsetMismatch { requested: u32, received: u32 },

    /// A JSON document returned by the device could not be parsed.
    #[error("invalid JSON from device: {0}")]
    InvalidJson(String),
}

/// A top-level protobuf frame that travels over one endpoint.
///
/// `NAME` appears in error messages so operators can tell which exchange
/// failed without a packet capture.
pub trait WireMessage: Message + Default {
    const NAME: &'static str;
}

macro_rules! wire_message {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(impl WireMessage for $ty {
            const NAME: &'static str = $name;
        })*
    };
}

wire_message! {
    SessionData => "session",
    WiFiScanPayload => "wifi-scan",
    WiFiConfigPayload => "wifi-config",
    WiFiCtrlPayload => "wifi-ctrl",
    RMakerConfigPayload => "user-mapping",
    RMakerChRespPayload => "challenge-response",
    RMakerLocalCtrlPayload => "get-data",
    LocalCtrlMessage => "local-ctrl",
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Serializes `msg` into its protobuf byte representation.
///
/// # Examples
///
/// ```rust
/// use rmaker_core::protocol::codec::{decode, encode};
/// use rmaker_core::protocol::messages::WiFiCtrlPayload;
///
/// let msg = WiFiCtrlPayload { msg: 1, status: 0, payload: None };
/// let bytes = encode(&msg);
/// let back: WiFiCtrlPayload = decode(&bytes).unwrap();
/// assert_eq!(back, msg);
/// ```
pub fn encode<M: WireMessage>(msg: &M) -> Vec<u8> {
    msg.encode_to_vec()
}

/// Parses `bytes` as message `M`.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] when the bytes are not a valid
/// encoding of `M`.
pub fn decode<M: WireMessage>(bytes: &[u8]) -> Result<M, ProtocolError> {
    M::decode(bytes).map_err(|e| ProtocolError::Malformed {
        message: M::NAME,
        reason: e.to_string(),
    })
}

/// Checks that a decoded discriminant equals the expected one.
///
/// # Errors
///
/// Returns [`ProtocolError::UnexpectedMessageType`] on mismatch.
pub fn expect_msg_type<M: WireMessage>(actual: i32, expected: i32) -> Result<(), ProtocolError> {
    if actual == expected {
        Ok(())
    } else {
        Err(ProtocolError::UnexpectedMessageType {
            message: M::NAME,
            expected,
            actual,
        })
    }
}

/// Checks that a device status code is `0` (success).
///
/// # Errors
///
/// Returns [`ProtocolError::DeviceStatus`] for any other value.
pub fn expect_success<M: WireMessage>(status: i32) -> Result<(), ProtocolError> {
    if status == 0 {
        Ok(())
    } else {
        Err(ProtocolError::DeviceStatus {
            message: M::NAME,
            status,
        })
    }
}

/// Returns [`ProtocolError::MissingPayload`] for a `None` oneof.
///
/// # Errors
///
/// Fails when `payload` is `None`.
pub fn require_payload<M: WireMessage, P>(payload: Option<P>) -> Result<P, ProtocolError> {
    payload.ok_or(ProtocolError::MissingPayload { message: M::NAME })
}

/// Returns an error if `bytes` is shorter than `needed`.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] when the slice is too short.
pub fn require_len(bytes: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if bytes.len() < needed {
        Err(ProtocolError::InsufficientData {
            needed,
            available: bytes.len(),
        })
    } else {
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
