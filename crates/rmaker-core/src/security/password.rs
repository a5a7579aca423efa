//! Scheme 2: SRP6a mutual authentication with an AES-256-GCM channel.
//!
//! ```text
//! client                                        device
//!   S2SessionCmd0 { username, A }        ──►
//!                                        ◄──    S2SessionResp0 { B, salt }
//!   S2SessionCmd1 { M1 }                 ──►
//!                                        ◄──    S2SessionResp1 { M2, nonce }
//! ```
//!
//! After the exchange both sides hold `K`; the first 32 bytes key AES-GCM.
//!
//! # Nonce policy
//!
//! * `sec_patch_ver == 0`: every frame uses the 12-byte device nonce as is.
//! * `sec_patch_ver >= 1`: each direction keeps a frame counter.  The nonce
//!   is the device nonce with a direction tag XORed into bytes `0..4` and the
//!   big-endian counter XORed into bytes `4..12`.  A replayed or reordered
//!   frame therefore fails authentication.  Counters only advance on success.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use zeroize::Zeroizing;

use crate::protocol::codec::{decode, encode};
use crate::protocol::messages::{
    sec2_payload, session_data, S2SessionCmd0, S2SessionCmd1, Sec2MsgType, Sec2Payload,
    SecSchemeVersion, SessionData,
};
use crate::security::srp::{SrpClient, SrpError};
use crate::security::{ensure_in_progress, CryptoError, HandshakeError, HandshakeState, SchemeVersion};

/// Length of the AES-GCM nonce supplied by the device.
pub const NONCE_LEN: usize = 12;
/// Number of session-key bytes used as the AES-256 key.
const AES_KEY_LEN: usize = 32;

/// Direction tags mixed into per-frame nonces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    ClientToDevice = 1,
    DeviceToClient = 2,
}

/// Authenticated channel shared by the client scheme and the device responder.
pub(crate) struct GcmChannel {
    cipher: Aes256Gcm,
    base_nonce: [u8; NONCE_LEN],
    counters: bool,
    sent: u64,
    received: u64,
    outgoing: Direction,
}

impl GcmChannel {
    pub(crate) fn new(
        session_key: &[u8],
        nonce: &[u8],
        sec_patch_ver: u32,
        outgoing: Direction,
    ) -> Result<Self, CryptoError> {
        if session_key.len() < AES_KEY_LEN {
            return Err(CryptoError::InvalidKeyMaterial("session key shorter than 32 bytes"));
        }
        let base_nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyMaterial("nonce must be 12 bytes"))?;
        let cipher = Aes256Gcm::new_from_slice(&session_key[..AES_KEY_LEN])
            .map_err(|_| CryptoError::InvalidKeyMaterial("AES-256-GCM key length"))?;
        Ok(Self {
            cipher,
            base_nonce,
            counters: sec_patch_ver >= 1,
            sent: 0,
            received: 0,
            outgoing,
        })
    }

    fn incoming(&self) -> Direction {
        match self.outgoing {
            Direction::ClientToDevice => Direction::DeviceToClient,
            Direction::DeviceToClient => Direction::ClientToDevice,
        }
    }

    fn nonce(&self, direction: Direction, counter: u64) -> [u8; NONCE_LEN] {
        let mut nonce = self.base_nonce;
        if self.counters {
            for (n, t) in nonce[..4].iter_mut().zip((direction as u32).to_be_bytes()) {
                *n ^= t;
            }
            for (n, c) in nonce[4..].iter_mut().zip(counter.to_be_bytes()) {
                *n ^= c;
            }
        }
        nonce
    }

    pub(crate) fn seal(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = self.nonce(self.outgoing, self.sent);
        let out = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;
        self.sent += 1;
        Ok(out)
    }

    pub(crate) fn open(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = self.nonce(self.incoming(), self.received);
        let out = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext)
            .map_err(|_| CryptoError::AuthenticationFailed)?;
        self.received += 1;
        Ok(out)
    }
}

/// SRP6a session.
pub struct MutualAuthPassword {
    username: String,
    password: Zeroizing<String>,
    sec_patch_ver: u32,
    state: HandshakeState,
    srp: Option<SrpClient>,
    expected_device_proof: Vec<u8>,
    session_key: Zeroizing<Vec<u8>>,
    channel: Option<GcmChannel>,
}

impl MutualAuthPassword {
    pub fn new(username: impl Into<String>, password: impl Into<String>, sec_patch_ver: u32) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
            sec_patch_ver,
            state: HandshakeState::Init,
            srp: None,
            expected_device_proof: Vec::new(),
            session_key: Zeroizing::new(Vec::new()),
            channel: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn sec_patch_ver(&self) -> u32 {
        self.sec_patch_ver
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
            self.fail();
        }
        result
    }

    pub(crate) fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.channel_mut()?.seal(plaintext)
    }

    pub(crate) fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let result = self.channel_mut()?.open(ciphertext);
        if result.is_err() {
            self.fail();
        }
        result
    }

    fn channel_mut(&mut self) -> Result<&mut GcmChannel, CryptoError> {
        if self.state != HandshakeState::Established {
            return Err(CryptoError::NotEstablished);
        }
        self.channel.as_mut().ok_or(CryptoError::NotEstablished)
    }

    fn fail(&mut self) {
        self.state = HandshakeState::Failed;
        self.srp = None;
        self.channel = None;
        self.session_key = Zeroizing::new(Vec::new());
    }

    fn setup0_request(&mut self) -> Vec<u8> {
        let srp = SrpClient::new(&self.username, &self.password);
        let frame = sec2_frame(
            Sec2MsgType::S2SessionCommand0,
            sec2_payload::Payload::Sc0(S2SessionCmd0 {
                client_username: self.username.as_bytes().to_vec(),
                client_pubkey: srp.public_key(),
            }),
        );
        self.srp = Some(srp);
        self.state = HandshakeState::AwaitingResponse(0);
        frame
    }

    fn setup0_response(&mut self, bytes: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        let resp = match open_sec2(bytes, 0)? {
            sec2_payload::Payload::Sr0(resp) => resp,
            _ => return Err(unexpected(0, "expected S2SessionResp0")),
        };
        if resp.status != 0 {
            return Err(HandshakeError::Rejected {
                step: 0,
                status: resp.status,
            });
        }
        let srp = self
            .srp
            .take()
            .ok_or(HandshakeError::InvalidState(self.state))?;
        let proof = srp
            .process_challenge(&resp.device_salt, &resp.device_pubkey)
            .map_err(|e| match e {
                SrpError::InvalidPublicKey => unexpected(0, "device public key is invalid"),
                SrpError::BadClientProof => HandshakeError::PasswordMismatch,
            })?;
        self.expected_device_proof = proof.expected_device_proof;
        self.session_key = proof.session_key;
        self.state = HandshakeState::AwaitingResponse(1);

        Ok(sec2_frame(
            Sec2MsgType::S2SessionCommand1,
            sec2_payload::Payload::Sc1(S2SessionCmd1 {
                client_proof: proof.proof,
            }),
        ))
    }

    fn setup1_response(&mut self, bytes: &[u8]) -> Result<(), HandshakeError> {
        let resp = match open_sec2(bytes, 1)? {
            sec2_payload::Payload::Sr1(resp) => resp,
            _ => return Err(unexpected(1, "expected S2SessionResp1")),
        };
        if resp.status != 0 || resp.device_proof != self.expected_device_proof {
            return Err(HandshakeError::PasswordMismatch);
        }
        let channel = GcmChannel::new(
            &self.session_key,
            &resp.device_nonce,
            self.sec_patch_ver,
            Direction::ClientToDevice,
        )
        .map_err(|e| unexpected(1, &e.to_string()))?;
        self.channel = Some(channel);
        self.state = HandshakeState::Established;
        Ok(())
    }
}

impl std::fmt::Debug for MutualAuthPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutualAuthPassword")
            .field("username", &self.username)
            .field("sec_patch_ver", &self.sec_patch_ver)
            .field("state", &self.state)
            .finish()
    }
}

pub(crate) fn sec2_frame(msg: Sec2MsgType, payload: sec2_payload::Payload) -> Vec<u8> {
    encode(&SessionData {
        sec_ver: SecSchemeVersion::SecScheme2 as i32,
        proto: Some(session_data::Proto::Sec2(Sec2Payload {
            msg: msg as i32,
            payload: Some(payload),
        })),
    })
}

fn open_sec2(bytes: &[u8], step: u8) -> Result<sec2_payload::Payload, HandshakeError> {
    let frame: SessionData = decode(bytes)?;
    if frame.sec_ver != SecSchemeVersion::SecScheme2 as i32 {
        return Err(HandshakeError::SchemeMismatch {
            requested: SchemeVersion::MutualAuthPassword,
            device: frame.sec_ver,
        });
    }
    match frame.proto {
        Some(session_data::Proto::Sec2(Sec2Payload {
            payload: Some(payload),
            ..
        })) => Ok(payload),
        _ => Err(unexpected(step, "missing sec2 payload")),
    }
}

fn unexpected(step: u8, detail: &str) -> HandshakeError {
    HandshakeError::UnexpectedFrame {
        step,
        detail: detail.to_string(),
    }
}
