//! Device side of the three handshakes.
//!
//! [`SessionResponder`] answers session frames the way provisioning firmware
//! does.  It backs loopback tests, the mock transport and the benchmarks; the
//! tool itself never runs it against real hardware.

use ctr::cipher::StreamCipher;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::protocol::codec::{decode, encode};
use crate::protocol::messages::{
    sec0_payload, sec1_payload, sec2_payload, session_data, S0SessionResp, S2SessionResp0,
    S2SessionResp1, Sec0MsgType, Sec0Payload, Sec1MsgType, Sec2MsgType, SecSchemeVersion,
    SessionData, SessionResp0, SessionResp1, Status,
};
use crate::security::password::{sec2_frame, Direction, GcmChannel, NONCE_LEN};
use crate::security::pop::{derive_cipher, sec1_frame, Aes256Ctr, DEVICE_RANDOM_LEN, PUBLIC_KEY_LEN};
use crate::security::srp::{compute_verifier, SrpVerifier};
use crate::security::{CryptoError, HandshakeError, HandshakeState, SchemeVersion};

/// Secrets a device is configured with.
#[derive(Clone)]
pub struct DeviceCredentials {
    pub scheme: SchemeVersion,
    pub pop: String,
    pub username: String,
    pub password: String,
    pub salt: Vec<u8>,
    pub sec_patch_ver: u32,
}

impl DeviceCredentials {
    pub fn plain() -> Self {
        Self {
            scheme: SchemeVersion::Plain,
            pop: String::new(),
            username: String::new(),
            password: String::new(),
            salt: Vec::new(),
            sec_patch_ver: 0,
        }
    }

    pub fn with_pop(pop: impl Into<String>) -> Self {
        Self {
            scheme: SchemeVersion::KeyExchangePop,
            pop: pop.into(),
            ..Self::plain()
        }
    }

    pub fn with_password(
        username: impl Into<String>,
        password: impl Into<String>,
        sec_patch_ver: u32,
    ) -> Self {
        Self {
            scheme: SchemeVersion::MutualAuthPassword,
            username: username.into(),
            password: password.into(),
            salt: rand::random::<[u8; 16]>().to_vec(),
            sec_patch_ver,
            ..Self::plain()
        }
    }
}

impl std::fmt::Debug for DeviceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCredentials")
            .field("scheme", &self.scheme)
            .field("username", &self.username)
            .field("sec_patch_ver", &self.sec_patch_ver)
            .finish_non_exhaustive()
    }
}

enum Keys {
    None,
    Pop {
        device_pubkey: [u8; PUBLIC_KEY_LEN],
        client_pubkey: [u8; PUBLIC_KEY_LEN],
        cipher: Aes256Ctr,
    },
    Srp {
        verifier: SrpVerifier,
        client_pubkey: Vec<u8>,
    },
    Gcm(GcmChannel),
}

/// Answers a client's session frames and, once established, mirrors its
/// cipher.
pub struct SessionResponder {
    credentials: DeviceCredentials,
    state: HandshakeState,
    keys: Keys,
}

impl SessionResponder {
    pub fn new(credentials: DeviceCredentials) -> Self {
        Self {
            credentials,
            state: HandshakeState::Init,
            keys: Keys::None,
        }
    }

    pub fn scheme(&self) -> SchemeVersion {
        self.credentials.scheme
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        self.state == HandshakeState::Established
    }

    /// Handles one request on the session endpoint and returns the reply.
    ///
    /// A client running another scheme gets a bare frame carrying the
    /// device's `sec_ver`.  Verification failures are reported in-band as a
    /// non-success status, the way firmware does.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError`] when the request cannot be decoded or
    /// arrives out of order.
    pub fn handle(&mut self, request: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        let frame: SessionData = decode(request)?;
        let own = self.credentials.scheme as i32;
        if frame.sec_ver != own {
            return Ok(encode(&SessionData {
                sec_ver: own,
                proto: None,
            }));
        }
        match frame.proto {
            Some(session_data::Proto::Sec0(_)) => Ok(self.handle_sec0()),
            Some(session_data::Proto::Sec1(p)) => match p.payload {
                Some(sec1_payload::Payload::Sc0(cmd)) => {
                    self.handle_sec1_cmd0(&cmd.client_pubkey)
                }
                Some(sec1_payload::Payload::Sc1(cmd)) => {
                    self.handle_sec1_cmd1(cmd.client_verify_data)
                }
                _ => Err(out_of_order()),
            },
            Some(session_data::Proto::Sec2(p)) => match p.payload {
                Some(sec2_payload::Payload::Sc0(cmd)) => {
                    self.handle_sec2_cmd0(cmd.client_username, cmd.client_pubkey)
                }
                Some(sec2_payload::Payload::Sc1(cmd)) => self.handle_sec2_cmd1(&cmd.client_proof),
                _ => Err(out_of_order()),
            },
            None => Err(out_of_order()),
        }
    }

    /// Encrypts a device-to-client payload.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::NotEstablished`] before the handshake completes.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.apply(plaintext, true)
    }

    /// Decrypts a client-to-device payload.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError`] before the handshake completes or when the
    /// authenticated cipher rejects the ciphertext.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.apply(ciphertext, false)
    }

    fn apply(&mut self, data: &[u8], outgoing: bool) -> Result<Vec<u8>, CryptoError> {
        if self.state != HandshakeState::Established {
            return Err(CryptoError::NotEstablished);
        }
        match &mut self.keys {
            Keys::None => Ok(data.to_vec()),
            Keys::Pop { cipher, .. } => {
                let mut out = data.to_vec();
                cipher.apply_keystream(&mut out);
                Ok(out)
            }
            Keys::Gcm(channel) if outgoing => channel.seal(data),
            Keys::Gcm(channel) => channel.open(data),
            Keys::Srp { .. } => Err(CryptoError::NotEstablished),
        }
    }

    // ── Scheme 0 ──────────────────────────────────────────────────────────────

    fn handle_sec0(&mut self) -> Vec<u8> {
        self.state = HandshakeState::Established;
        encode(&SessionData {
            sec_ver: SecSchemeVersion::SecScheme0 as i32,
            proto: Some(session_data::Proto::Sec0(Sec0Payload {
                msg: Sec0MsgType::S0SessionResponse as i32,
                payload: Some(sec0_payload::Payload::Sr(S0SessionResp {
                    status: Status::Success as i32,
                })),
            })),
        })
    }

    // ── Scheme 1 ──────────────────────────────────────────────────────────────

    fn handle_sec1_cmd0(&mut self, client_pubkey: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        let client_pubkey: [u8; PUBLIC_KEY_LEN] = client_pubkey
            .try_into()
            .map_err(|_| HandshakeError::UnexpectedFrame {
                step: 0,
                detail: "client public key must be 32 bytes".to_string(),
            })?;
        let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let device_pubkey = PublicKey::from(&secret).to_bytes();
        let device_random: [u8; DEVICE_RANDOM_LEN] = rand::random();
        let shared = Zeroizing::new(*secret.diffie_hellman(&PublicKey::from(client_pubkey)).as_bytes());
        let cipher = derive_cipher(&shared, &self.credentials.pop, &device_random).map_err(|e| {
            HandshakeError::UnexpectedFrame {
                step: 0,
                detail: e.to_string(),
            }
        })?;

        self.keys = Keys::Pop {
            device_pubkey,
            client_pubkey,
            cipher,
        };
        self.state = HandshakeState::AwaitingResponse(1);
        Ok(sec1_frame(
            Sec1MsgType::SessionResponse0,
            sec1_payload::Payload::Sr0(SessionResp0 {
                status: Status::Success as i32,
                device_pubkey: device_pubkey.to_vec(),
                device_random: device_random.to_vec(),
            }),
        ))
    }

    fn handle_sec1_cmd1(&mut self, mut verify: Vec<u8>) -> Result<Vec<u8>, HandshakeError> {
        let Keys::Pop {
            device_pubkey,
            client_pubkey,
            cipher,
        } = &mut self.keys
        else {
            return Err(out_of_order());
        };
        cipher.apply_keystream(&mut verify);
        if verify != device_pubkey.as_slice() {
            self.state = HandshakeState::Failed;
            return Ok(sec1_frame(
                Sec1MsgType::SessionResponse1,
                sec1_payload::Payload::Sr1(SessionResp1 {
                    status: Status::CryptoError as i32,
                    device_verify_data: Vec::new(),
                }),
            ));
        }
        let mut proof = client_pubkey.to_vec();
        cipher.apply_keystream(&mut proof);
        self.state = HandshakeState::Established;
        Ok(sec1_frame(
            Sec1MsgType::SessionResponse1,
            sec1_payload::Payload::Sr1(SessionResp1 {
                status: Status::Success as i32,
                device_verify_data: proof,
            }),
        ))
    }

    // ── Scheme 2 ──────────────────────────────────────────────────────────────

    fn handle_sec2_cmd0(
        &mut self,
        username: Vec<u8>,
        client_pubkey: Vec<u8>,
    ) -> Result<Vec<u8>, HandshakeError> {
        if username != self.credentials.username.as_bytes() {
            self.state = HandshakeState::Failed;
            return Ok(sec2_frame(
                Sec2MsgType::S2SessionResponse0,
                sec2_payload::Payload::Sr0(S2SessionResp0 {
                    status: Status::InvalidArgument as i32,
                    ..Default::default()
                }),
            ));
        }
        let creds = &self.credentials;
        let verifier_bytes = compute_verifier(&creds.salt, &creds.username, &creds.password);
        let verifier = SrpVerifier::new(&creds.username, &creds.salt, &verifier_bytes);
        let reply = sec2_frame(
            Sec2MsgType::S2SessionResponse0,
            sec2_payload::Payload::Sr0(S2SessionResp0 {
                status: Status::Success as i32,
                device_pubkey: verifier.public_key(),
                device_salt: creds.salt.clone(),
            }),
        );
        self.keys = Keys::Srp {
            verifier,
            client_pubkey,
        };
        self.state = HandshakeState::AwaitingResponse(1);
        Ok(reply)
    }

    fn handle_sec2_cmd1(&mut self, client_proof: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        let Keys::Srp {
            verifier,
            client_pubkey,
        } = &self.keys
        else {
            return Err(out_of_order());
        };
        let proof = match verifier.verify_client(client_pubkey, client_proof) {
            Ok(proof) => proof,
            Err(_) => {
                self.state = HandshakeState::Failed;
                return Ok(sec2_frame(
                    Sec2MsgType::S2SessionResponse1,
                    sec2_payload::Payload::Sr1(S2SessionResp1 {
                        status: Status::CryptoError as i32,
                        ..Default::default()
                    }),
                ));
            }
        };
        let nonce: [u8; NONCE_LEN] = rand::random();
        let channel = GcmChannel::new(
            &proof.session_key,
            &nonce,
            self.credentials.sec_patch_ver,
            Direction::DeviceToClient,
        )
        .map_err(|e| HandshakeError::UnexpectedFrame {
            step: 1,
            detail: e.to_string(),
        })?;
        self.keys = Keys::Gcm(channel);
        self.state = HandshakeState::Established;
        Ok(sec2_frame(
            Sec2MsgType::S2SessionResponse1,
            sec2_payload::Payload::Sr1(S2SessionResp1 {
                status: Status::Success as i32,
                device_proof: proof.proof,
                device_nonce: nonce.to_vec(),
            }),
        ))
    }
}

fn out_of_order() -> HandshakeError {
    HandshakeError::UnexpectedFrame {
        step: 0,
        detail: "session frame arrived out of order".to_string(),
    }
}
