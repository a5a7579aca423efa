//! Scheme 1: X25519 key agreement bound to a proof of possession.
//!
//! # Handshake (for beginners)
//!
//! ```text
//! client                                        device
//!   SessionCmd0 { client_pubkey }        ──►
//!                                        ◄──    SessionResp0 { device_pubkey, device_random }
//!   shared = X25519(client_secret, device_pubkey) ^ SHA256(pop)
//!   cipher = AES-256-CTR(key = shared, iv = device_random)
//!   SessionCmd1 { encrypt(device_pubkey) } ──►
//!                                        ◄──    SessionResp1 { encrypt(client_pubkey) }
//! ```
//!
//! A device holding a different PoP derives a different key, so the last
//! frame does not decrypt to the client public key and the handshake fails.
//!
//! One CTR keystream serves both directions; every encrypt and decrypt
//! advances it.  Messages must therefore be processed in exactly the order
//! they were exchanged.

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::protocol::codec::{decode, encode};
use crate::protocol::messages::{
    sec1_payload, session_data, Sec1MsgType, Sec1Payload, SecSchemeVersion, SessionCmd0,
    SessionCmd1, SessionData,
};
use crate::security::{ensure_in_progress, CryptoError, HandshakeError, HandshakeState, SchemeVersion};

pub(crate) type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Length of an X25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;
/// Length of the device random used as the CTR IV.
pub const DEVICE_RANDOM_LEN: usize = 16;

/// X25519 + PoP session.
pub struct KeyExchangePop {
    pop: Zeroizing<String>,
    state: HandshakeState,
    secret: Option<StaticSecret>,
    client_pubkey: [u8; PUBLIC_KEY_LEN],
    cipher: Option<Aes256Ctr>,
}

impl KeyExchangePop {
    pub fn new(pop: impl Into<String>) -> Self {
        Self {
            pop: Zeroizing::new(pop.into()),
            state: HandshakeState::Init,
            secret: None,
            client_pubkey: [0u8; PUBLIC_KEY_LEN],
            cipher: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub(crate) fn handshake_step(
        &mut self,
        response: Option<&[u8]>,
    ) -> Result<Option<Vec<u8>>, HandshakeError> {
        ensure_in_progress(self.state)?;
        let result = match (self.state, response) {
            (HandshakeState::Init, None) => Ok(Some(self.setup0_request())),
            (HandshakeState::AwaitingResponse(0), Some(bytes)) => {
                self.setup0_response(bytes).map(Some)
            }
            (HandshakeState::AwaitingResponse(1), Some(bytes)) => {
                self.setup1_response(bytes).map(|()| None)
            }
            (_, _) => Err(HandshakeError::UnexpectedFrame {
                step: 0,
                detail: "response supplied out of order".to_string(),
            }),
        };
        if result.is_err() {
            self.state = HandshakeState::Failed;
            self.secret = None;
            self.cipher = None;
        }
        result
    }

    pub(crate) fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.apply(plaintext)
    }

    pub(crate) fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.apply(ciphertext)
    }

    fn apply(&mut self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if self.state != HandshakeState::Established {
            return Err(CryptoError::NotEstablished);
        }
        let cipher = self.cipher.as_mut().ok_or(CryptoError::NotEstablished)?;
        let mut out = data.to_vec();
        cipher.apply_keystream(&mut out);
        Ok(out)
    }

    fn setup0_request(&mut self) -> Vec<u8> {
        let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        self.client_pubkey = PublicKey::from(&secret).to_bytes();
        self.secret = Some(secret);
        self.state = HandshakeState::AwaitingResponse(0);

        sec1_frame(
            Sec1MsgType::SessionCommand0,
            sec1_payload::Payload::Sc0(SessionCmd0 {
                client_pubkey: self.client_pubkey.to_vec(),
            }),
        )
    }

    fn setup0_response(&mut self, bytes: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        let resp = match open_sec1(bytes, 0)? {
            sec1_payload::Payload::Sr0(resp) => resp,
            _ => return Err(unexpected(0, "expected SessionResp0")),
        };
        if resp.status != 0 {
            return Err(HandshakeError::Rejected {
                step: 0,
                status: resp.status,
            });
        }
        let device_pubkey: [u8; PUBLIC_KEY_LEN] = resp
            .device_pubkey
            .as_slice()
            .try_into()
            .map_err(|_| unexpected(0, "device public key must be 32 bytes"))?;
        if resp.device_random.len() != DEVICE_RANDOM_LEN {
            return Err(unexpected(0, "device random must be 16 bytes"));
        }

        let secret = self
            .secret
            .take()
            .ok_or(HandshakeError::InvalidState(self.state))?;
        let shared = secret.diffie_hellman(&PublicKey::from(device_pubkey));
        let mut cipher = derive_cipher(shared.as_bytes(), &self.pop, &resp.device_random)
            .map_err(|_| unexpected(0, "could not derive session key"))?;

        let mut verify = device_pubkey.to_vec();
        cipher.apply_keystream(&mut verify);
        self.cipher = Some(cipher);
        self.state = HandshakeState::AwaitingResponse(1);

        Ok(sec1_frame(
            Sec1MsgType::SessionCommand1,
            sec1_payload::Payload::Sc1(SessionCmd1 {
                client_verify_data: verify,
            }),
        ))
    }

    fn setup1_response(&mut self, bytes: &[u8]) -> Result<(), HandshakeError> {
        let resp = match open_sec1(bytes, 1)? {
            sec1_payload::Payload::Sr1(resp) => resp,
            _ => return Err(unexpected(1, "expected SessionResp1")),
        };
        if resp.status != 0 {
            return Err(HandshakeError::PopMismatch);
        }
        let cipher = self
            .cipher
            .as_mut()
            .ok_or(HandshakeError::InvalidState(self.state))?;
        let mut check = resp.device_verify_data;
        cipher.apply_keystream(&mut check);
        if check != self.client_pubkey {
            return Err(HandshakeError::PopMismatch);
        }
        self.state = HandshakeState::Established;
        Ok(())
    }
}

impl std::fmt::Debug for KeyExchangePop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyExchangePop")
            .field("state", &self.state)
            .field("has_pop", &!self.pop.is_empty())
            .finish()
    }
}

// ── Helpers shared with the device responder ─────────────────────────────────

/// Builds the session cipher from an X25519 shared secret.
///
/// When `pop` is non-empty the shared secret is XORed with `SHA256(pop)`.
pub(crate) fn derive_cipher(
    shared: &[u8; 32],
    pop: &str,
    iv: &[u8],
) -> Result<Aes256Ctr, CryptoError> {
    let mut key = Zeroizing::new(*shared);
    if !pop.is_empty() {
        let digest = Sha256::digest(pop.as_bytes());
        for (k, d) in key.iter_mut().zip(digest.iter()) {
            *k ^= d;
        }
    }
    Aes256Ctr::new_from_slices(key.as_slice(), iv)
        .map_err(|_| CryptoError::InvalidKeyMaterial("AES-256-CTR key or IV length"))
}

pub(crate) fn sec1_frame(msg: Sec1MsgType, payload: sec1_payload::Payload) -> Vec<u8> {
    encode(&SessionData {
        sec_ver: SecSchemeVersion::SecScheme1 as i32,
        proto: Some(session_data::Proto::Sec1(Sec1Payload {
            msg: msg as i32,
            payload: Some(payload),
        })),
    })
}

fn open_sec1(bytes: &[u8], step: u8) -> Result<sec1_payload::Payload, HandshakeError> {
    let frame: SessionData = decode(bytes)?;
    if frame.sec_ver != SecSchemeVersion::SecScheme1 as i32 {
        return Err(HandshakeError::SchemeMismatch {
            requested: SchemeVersion::KeyExchangePop,
            device: frame.sec_ver,
        });
    }
    match frame.proto {
        Some(session_data::Proto::Sec1(Sec1Payload {
            payload: Some(payload),
            ..
        })) => Ok(payload),
        _ => Err(unexpected(step, "missing sec1 payload")),
    }
}

fn unexpected(step: u8, detail: &str) -> HandshakeError {
    HandshakeError::UnexpectedFrame {
        step,
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{SessionResp0, SessionResp1};

    fn resp0(status: i32, pubkey: Vec<u8>, random: Vec<u8>) -> Vec<u8> {
        sec1_frame(
            Sec1MsgType::SessionResponse0,
            sec1_payload::Payload::Sr0(SessionResp0 {
                status,
                device_pubkey: pubkey,
                device_random: random,
            }),
        )
    }

    #[test]
    fn test_first_step_sends_client_public_key() {
        // Arrange
        let mut scheme = KeyExchangePop::new("abcd1234");

        // Act
        let request = scheme.handshake_step(None).unwrap().unwrap();

        // Assert
        let frame: SessionData = decode(&request).unwrap();
        assert_eq!(frame.sec_ver, 1);
        match frame.proto {
            Some(session_data::Proto::Sec1(Sec1Payload {
                payload: Some(sec1_payload::Payload::Sc0(cmd)),
                ..
            })) => assert_eq!(cmd.client_pubkey.len(), PUBLIC_KEY_LEN),
            other => panic!("unexpected frame {other:?}"),
        }
        assert_eq!(scheme.state(), HandshakeState::AwaitingResponse(0));
    }

    #[test]
    fn test_short_device_random_fails_handshake() {
        let mut scheme = KeyExchangePop::new("abcd1234");
        scheme.handshake_step(None).unwrap();

        let err = scheme
            .handshake_step(Some(&resp0(0, vec![9u8; 32], vec![1u8; 8])))
            .unwrap_err();

        assert!(matches!(err, HandshakeError::UnexpectedFrame { step: 0, .. }));
        assert_eq!(scheme.state(), HandshakeState::Failed);
    }

    #[test]
    fn test_device_rejection_at_step_one_is_pop_mismatch() {
        // Arrange
        let mut scheme = KeyExchangePop::new("abcd1234");
        scheme.handshake_step(None).unwrap();
        let device = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let device_pub = PublicKey::from(&device).to_bytes().to_vec();
        scheme
            .handshake_step(Some(&resp0(0, device_pub, vec![0u8; 16])))
            .unwrap();
        let rejected = sec1_frame(
            Sec1MsgType::SessionResponse1,
            sec1_payload::Payload::Sr1(SessionResp1 {
                status: 6,
                device_verify_data: vec![],
            }),
        );

        // Act
        let err = scheme.handshake_step(Some(&rejected)).unwrap_err();

        // Assert
        assert_eq!(err, HandshakeError::PopMismatch);
    }

    #[test]
    fn test_pop_changes_derived_keystream() {
        let shared = [7u8; 32];
        let iv = [0u8; 16];
        let mut with_pop = derive_cipher(&shared, "abcd1234", &iv).unwrap();
        let mut without_pop = derive_cipher(&shared, "", &iv).unwrap();

        let mut a = vec![0u8; 16];
        let mut b = vec![0u8; 16];
        with_pop.apply_keystream(&mut a);
        without_pop.apply_keystream(&mut b);

        assert_ne!(a, b);
    }
}
