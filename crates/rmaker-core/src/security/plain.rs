//! Scheme 0: one identification exchange, no encryption.

use crate::protocol::codec::{decode, encode, expect_success};
use crate::protocol::messages::{
    sec0_payload, session_data, S0SessionCmd, Sec0MsgType, Sec0Payload, SecSchemeVersion,
    SessionData,
};
use crate::security::{ensure_in_progress, CryptoError, HandshakeError, HandshakeState, SchemeVersion};

/// Plain-text session.  `encrypt` and `decrypt` return their input.
#[derive(Debug)]
pub struct Plain {
    state: HandshakeState,
}

impl Plain {
    pub fn new() -> Self {
        Self {
            state: HandshakeState::Init,
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
            (HandshakeState::Init, None) => {
                self.state = HandshakeState::AwaitingResponse(0);
                Ok(Some(setup0_request()))
            }
            (HandshakeState::AwaitingResponse(0), Some(bytes)) => {
                setup0_response(bytes).map(|()| {
                    self.state = HandshakeState::Established;
                    None
                })
            }
            (_, _) => Err(HandshakeError::UnexpectedFrame {
                step: 0,
                detail: "response supplied out of order".to_string(),
            }),
        };
        if result.is_err() {
            self.state = HandshakeState::Failed;
        }
        result
    }

    pub(crate) fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.require_established()?;
        Ok(plaintext.to_vec())
    }

    pub(crate) fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.require_established()?;
        Ok(ciphertext.to_vec())
    }

    fn require_established(&self) -> Result<(), CryptoError> {
        if self.state == HandshakeState::Established {
            Ok(())
        } else {
            Err(CryptoError::NotEstablished)
        }
    }
}

impl Default for Plain {
    fn default() -> Self {
        Self::new()
    }
}

fn setup0_request() -> Vec<u8> {
    encode(&SessionData {
        sec_ver: SecSchemeVersion::SecScheme0 as i32,
        proto: Some(session_data::Proto::Sec0(Sec0Payload {
            msg: Sec0MsgType::S0SessionCommand as i32,
            payload: Some(sec0_payload::Payload::Sc(S0SessionCmd {})),
        })),
    })
}

fn setup0_response(bytes: &[u8]) -> Result<(), HandshakeError> {
    let resp: SessionData = decode(bytes)?;
    if resp.sec_ver != SecSchemeVersion::SecScheme0 as i32 {
        return Err(HandshakeError::SchemeMismatch {
            requested: SchemeVersion::Plain,
            device: resp.sec_ver,
        });
    }
    if let Some(session_data::Proto::Sec0(Sec0Payload {
        payload: Some(sec0_payload::Payload::Sr(sr)),
        ..
    })) = resp.proto
    {
        expect_success::<SessionData>(sr.status)
            .map_err(|_| HandshakeError::Rejected { step: 0, status: sr.status })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::S0SessionResp;

    fn device_reply(sec_ver: i32, status: i32) -> Vec<u8> {
        encode(&SessionData {
            sec_ver,
            proto: Some(session_data::Proto::Sec0(Sec0Payload {
                msg: Sec0MsgType::S0SessionResponse as i32,
                payload: Some(sec0_payload::Payload::Sr(S0SessionResp { status })),
            })),
        })
    }

    #[test]
    fn test_plain_handshake_single_exchange() {
        // Arrange
        let mut plain = Plain::new();

        // Act
        let request = plain.handshake_step(None).unwrap();
        let done = plain.handshake_step(Some(&device_reply(0, 0))).unwrap();

        // Assert
        let decoded: SessionData = decode(&request.unwrap()).unwrap();
        assert_eq!(decoded.sec_ver, 0);
        assert!(done.is_none());
        assert_eq!(plain.state(), HandshakeState::Established);
    }

    #[test]
    fn test_plain_identity_cipher_after_handshake() {
        let mut plain = Plain::new();
        plain.handshake_step(None).unwrap();
        plain.handshake_step(Some(&device_reply(0, 0))).unwrap();

        assert_eq!(plain.encrypt(b"").unwrap(), b"");
        assert_eq!(plain.decrypt(b"hello").unwrap(), b"hello");
    }

    #[test]
    fn test_plain_rejects_device_running_other_scheme() {
        // Arrange
        let mut plain = Plain::new();
        plain.handshake_step(None).unwrap();

        // Act
        let err = plain.handshake_step(Some(&device_reply(1, 0))).unwrap_err();

        // Assert
        assert_eq!(
            err,
            HandshakeError::SchemeMismatch {
                requested: SchemeVersion::Plain,
                device: 1
            }
        );
        assert_eq!(plain.state(), HandshakeState::Failed);
        assert!(matches!(
            plain.handshake_step(None),
            Err(HandshakeError::InvalidState(HandshakeState::Failed))
        ));
    }
}
