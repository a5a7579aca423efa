//! Session security schemes.
//!
//! A device negotiates exactly one of three schemes per session:
//!
//! | Version | Type                     | Key agreement     | Cipher        |
//! |---------|--------------------------|-------------------|---------------|
//! | 0       | [`Plain`]                | none              | identity      |
//! | 1       | [`KeyExchangePop`]       | X25519 + PoP      | AES-256-CTR   |
//! | 2       | [`MutualAuthPassword`]   | SRP6a (3072/SHA-512) | AES-256-GCM |
//!
//! [`SecurityScheme`] wraps the three behind one enum.  The scheme is chosen
//! once when the session is created and never changes afterwards; a new
//! handshake always starts from a fresh value.
//!
//! # Handshake driving (for beginners)
//!
//! The caller repeatedly calls [`SecurityScheme::handshake_step`]:
//!
//! ```text
//! req = step(None)            -> Some(bytes)   send to the session endpoint
//! req = step(Some(response))  -> Some(bytes)   send again
//! ...
//! step(Some(response))        -> None          established
//! ```
//!
//! Any verification failure returns a [`HandshakeError`] and moves the scheme
//! to [`HandshakeState::Failed`]; after that every call fails.

pub mod password;
pub mod plain;
pub mod pop;
pub mod responder;
pub mod srp;

use thiserror::Error;

use crate::protocol::codec::ProtocolError;

pub use password::MutualAuthPassword;
pub use plain::Plain;
pub use pop::KeyExchangePop;
pub use responder::{DeviceCredentials, SessionResponder};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors raised while negotiating a session.
#[derive(Debug, Error, PartialEq)]
pub enum HandshakeError {
    /// The device answered with a different scheme than the one requested.
    #[error("incorrect security scheme: requested {requested}, device uses {device}")]
    SchemeMismatch { requested: SchemeVersion, device: i32 },

    /// The device rejected a handshake frame with a non-success status.
    #[error("device rejected handshake step {step} with status {status}")]
    Rejected { step: u8, status: i32 },

    /// The device's verification token did not decrypt to our public key.
    #[error("failed to verify device: proof of possession is likely incorrect")]
    PopMismatch,

    /// The device's SRP proof did not match the expected value.
    #[error("failed to verify device proof: username or password is likely incorrect")]
    PasswordMismatch,

    /// A frame carried the wrong message type or an impossible value.
    #[error("unexpected handshake frame at step {step}: {detail}")]
    UnexpectedFrame { step: u8, detail: String },

    /// A handshake frame could not be parsed.
    #[error("malformed handshake frame: {0}")]
    Protocol(#[from] ProtocolError),

    /// `handshake_step` was called after the handshake finished or failed.
    #[error("handshake step requested in state {0:?}")]
    InvalidState(HandshakeState),

    /// The session endpoint could not be reached mid-handshake.
    #[error("session endpoint unreachable: {0}")]
    Transport(String),
}

/// Errors raised by `encrypt`/`decrypt` on an established session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Encryption or decryption was attempted before the handshake finished.
    #[error("session is not established")]
    NotEstablished,

    /// Authenticated decryption rejected the ciphertext (tampered or reordered).
    #[error("ciphertext failed authentication")]
    AuthenticationFailed,

    /// The authenticated cipher refused to encrypt.
    #[error("encryption failed")]
    EncryptionFailed,

    /// The negotiated key or nonce has an invalid length.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(&'static str),
}

// ── Scheme versions and state ────────────────────────────────────────────────

/// Wire value of the negotiated scheme (`sec_ver`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemeVersion {
    Plain = 0,
    KeyExchangePop = 1,
    MutualAuthPassword = 2,
}

impl TryFrom<u32> for SchemeVersion {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Plain),
            1 => Ok(Self::KeyExchangePop),
            2 => Ok(Self::MutualAuthPassword),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for SchemeVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sec{}", *self as u8)
    }
}

/// Progress of a handshake.  Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Init,
    /// Waiting for the device's answer to request `step` (0-based).
    AwaitingResponse(u8),
    Established,
    Failed,
}

// ── Scheme wrapper ────────────────────────────────────────────────────────────

/// The negotiated security scheme for one session.
pub enum SecurityScheme {
    Plain(Plain),
    KeyExchangePop(KeyExchangePop),
    MutualAuthPassword(MutualAuthPassword),
}

impl SecurityScheme {
    /// Scheme 0: no encryption.
    pub fn plain() -> Self {
        Self::Plain(Plain::new())
    }

    /// Scheme 1 with the given proof of possession (may be empty when the
    /// device advertises `no_pop`).
    pub fn key_exchange_pop(pop: impl Into<String>) -> Self {
        Self::KeyExchangePop(KeyExchangePop::new(pop))
    }

    /// Scheme 2 with SRP credentials.  `sec_patch_ver` comes from the
    /// capability probe and selects the nonce policy.
    pub fn mutual_auth_password(
        username: impl Into<String>,
        password: impl Into<String>,
        sec_patch_ver: u32,
    ) -> Self {
        Self::MutualAuthPassword(MutualAuthPassword::new(username, password, sec_patch_ver))
    }

    pub fn version(&self) -> SchemeVersion {
        match self {
            Self::Plain(_) => SchemeVersion::Plain,
            Self::KeyExchangePop(_) => SchemeVersion::KeyExchangePop,
            Self::MutualAuthPassword(_) => SchemeVersion::MutualAuthPassword,
        }
    }

    pub fn state(&self) -> HandshakeState {
        match self {
            Self::Plain(s) => s.state(),
            Self::KeyExchangePop(s) => s.state(),
            Self::MutualAuthPassword(s) => s.state(),
        }
    }

    pub fn is_established(&self) -> bool {
        self.state() == HandshakeState::Established
    }

    /// Advances the handshake.
    ///
    /// Pass `None` for the first call and the device's previous response
    /// afterwards.  Returns the next request to send, or `None` once the
    /// session is established.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError`] on any verification failure or malformed
    /// device frame; the scheme is then unusable.
    pub fn handshake_step(
        &mut self,
        response: Option<&[u8]>,
    ) -> Result<Option<Vec<u8>>, HandshakeError> {
        match self {
            Self::Plain(s) => s.handshake_step(response),
            Self::KeyExchangePop(s) => s.handshake_step(response),
            Self::MutualAuthPassword(s) => s.handshake_step(response),
        }
    }

    /// Encrypts an outgoing payload.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::NotEstablished`] before the handshake completes.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self {
            Self::Plain(s) => s.encrypt(plaintext),
            Self::KeyExchangePop(s) => s.encrypt(plaintext),
            Self::MutualAuthPassword(s) => s.encrypt(plaintext),
        }
    }

    /// Decrypts an incoming payload.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError`] before the handshake completes or when an
    /// authenticated scheme rejects the ciphertext.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self {
            Self::Plain(s) => s.decrypt(ciphertext),
            Self::KeyExchangePop(s) => s.decrypt(ciphertext),
            Self::MutualAuthPassword(s) => s.decrypt(ciphertext),
        }
    }
}

impl std::fmt::Debug for SecurityScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityScheme")
            .field("version", &self.version())
            .field("state", &self.state())
            .finish()
    }
}

/// Rejects a handshake call on a finished or failed scheme.
pub(crate) fn ensure_in_progress(state: HandshakeState) -> Result<(), HandshakeError> {
    match state {
        HandshakeState::Established | HandshakeState::Failed => {
            Err(HandshakeError::InvalidState(state))
        }
        _ => Ok(()),
    }
}
