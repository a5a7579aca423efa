//! Challenge-response identity proof.
//!
//! # Flow (for beginners)
//!
//! ```text
//!  tool                         cloud                        device
//!   │  initiate {"timeout":360}   │                              │
//!   │ ──────────────────────────► │                              │
//!   │ ◄── request_id, challenge ──│                              │
//!   │                             │                              │
//!   │  ch_resp {challenge}  (encrypted session)                  │
//!   │ ─────────────────────────────────────────────────────────► │
//!   │ ◄──────────────────────────────── signature, node_id ───── │
//!   │                             │                              │
//!   │  verify {request_id, node_id, challenge_response: hex}     │
//!   │ ──────────────────────────► │                              │
//!   │ ◄──────── ok / rejected ─── │                              │
//! ```
//!
//! A rejected verification is an answer, not an error: the run reports
//! `(false, None)` and the device is not contacted again.  Every attempt
//! starts from a new challenge; nothing is reused.

use std::sync::Arc;

use async_trait::async_trait;
use rmaker_core::protocol::codec::{
    expect_msg_type, expect_success, require_payload, ProtocolError,
};
use rmaker_core::protocol::endpoints::CH_RESP;
use rmaker_core::protocol::messages::{
    r_maker_ch_resp_payload, CmdCrPayload, CmdDisableChalResp, RMakerChRespMsgType,
    RMakerChRespPayload,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::application::session::SecureSession;
use crate::application::ProvisionError;

/// Errors reported by the cloud authority.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CloudError {
    /// The request never got an HTTP answer.
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The cloud answered with a failure status.
    #[error("cloud rejected {operation} (HTTP {status}): {body}")]
    Rejected {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The answer did not contain the expected fields.
    #[error("unexpected cloud response: {0}")]
    InvalidResponse(String),

    /// No id token is configured.
    #[error("not logged in: no id token configured")]
    NotLoggedIn,
}

/// A challenge issued by the cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub request_id: String,
    pub challenge: String,
}

/// The cloud side of the identity proof.
///
/// The production implementation is `infrastructure::cloud::CloudClient`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudAuthority: Send + Sync {
    /// The logged-in user, used by the legacy binding flow.
    fn user_id(&self) -> Option<String>;

    /// Asks the cloud for a new challenge.
    async fn initiate(&self) -> Result<Challenge, CloudError>;

    /// Submits the device's hex-encoded signature.
    async fn verify(
        &self,
        request_id: &str,
        node_id: &str,
        response_hex: &str,
    ) -> Result<(), CloudError>;
}

/// Where a challenge-response run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    Idle,
    ChallengeRequested,
    SentToDevice,
    Verified,
    Failed,
    /// Verified, and the device has switched the endpoint off.
    Disabled,
}

/// What one run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeExchange {
    pub request_id: String,
    pub challenge: String,
    pub signature: Vec<u8>,
    pub node_id: String,
}

/// Signature and node id returned by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedChallenge {
    pub signature: Vec<u8>,
    pub node_id: String,
}

/// Has the device sign `challenge` over `ch_resp`.
///
/// # Errors
///
/// Returns [`ProvisionError::ChallengeResponseUnsupported`] when the link
/// knows the endpoint is absent and [`ProvisionError::Protocol`] when the
/// device refuses to sign.
pub async fn sign_challenge(
    session: &mut SecureSession,
    challenge: &[u8],
) -> Result<SignedChallenge, ProvisionError> {
    if !session.transport().has_endpoint(CH_RESP) {
        return Err(ProvisionError::ChallengeResponseUnsupported);
    }
    let request = RMakerChRespPayload {
        msg: RMakerChRespMsgType::TypeCmdChallengeResponse as i32,
        status: 0,
        payload: Some(r_maker_ch_resp_payload::Payload::CmdChallengeResponse(
            CmdCrPayload {
                payload: challenge.to_vec(),
            },
        )),
    };
    let reply: RMakerChRespPayload = session.request(CH_RESP, &request).await?;
    expect_success::<RMakerChRespPayload>(reply.status)?;
    expect_msg_type::<RMakerChRespPayload>(
        reply.msg,
        RMakerChRespMsgType::TypeRespChallengeResponse as i32,
    )?;
    match require_payload::<RMakerChRespPayload, _>(reply.payload)? {
        r_maker_ch_resp_payload::Payload::RespChallengeResponse(resp) => Ok(SignedChallenge {
            signature: resp.payload,
            node_id: resp.node_id,
        }),
        _ => Err(ProtocolError::MissingPayload {
            message: "challenge-response",
        }
        .into()),
    }
}

/// Switches the device's `ch_resp` endpoint off.
///
/// # Errors
///
/// Returns [`ProvisionError::Protocol`] unless the device acknowledges.
pub async fn disable_challenge_response(
    session: &mut SecureSession,
) -> Result<(), ProvisionError> {
    let request = RMakerChRespPayload {
        msg: RMakerChRespMsgType::TypeCmdDisableChalResp as i32,
        status: 0,
        payload: Some(r_maker_ch_resp_payload::Payload::CmdDisableChalResp(
            CmdDisableChalResp {},
        )),
    };
    let reply: RMakerChRespPayload = session.request(CH_RESP, &request).await?;
    expect_success::<RMakerChRespPayload>(reply.status)?;
    expect_msg_type::<RMakerChRespPayload>(
        reply.msg,
        RMakerChRespMsgType::TypeRespDisableChalResp as i32,
    )?;
    Ok(())
}

/// Runs initiate, sign, verify and the optional disable step.
pub struct ChallengeResponseCoordinator {
    authority: Arc<dyn CloudAuthority>,
    disable_on_success: bool,
    state: ChallengeState,
    exchange: Option<ChallengeExchange>,
}

impl ChallengeResponseCoordinator {
    /// `disable_on_success` is normally `true` for on-network nodes and
    /// `false` during provisioning.
    pub fn new(authority: Arc<dyn CloudAuthority>, disable_on_success: bool) -> Self {
        Self {
            authority,
            disable_on_success,
            state: ChallengeState::Idle,
            exchange: None,
        }
    }

    pub fn state(&self) -> ChallengeState {
        self.state
    }

    /// The last completed device exchange, if any.
    pub fn exchange(&self) -> Option<&ChallengeExchange> {
        self.exchange.as_ref()
    }

    /// Returns `(true, Some(node_id))` when the cloud accepts the signature
    /// and `(false, None)` when it rejects it.
    ///
    /// # Errors
    ///
    /// Fails with [`ProvisionError::CloudVerification`] when no challenge
    /// could be obtained, and with the device error when signing fails.
    pub async fn run(
        &mut self,
        session: &mut SecureSession,
    ) -> Result<(bool, Option<String>), ProvisionError> {
        self.state = ChallengeState::ChallengeRequested;
        let challenge = match self.authority.initiate().await {
            Ok(c) => c,
            Err(e) => {
                self.state = ChallengeState::Failed;
                return Err(e.into());
            }
        };
        info!("cloud issued challenge (request id {})", challenge.request_id);

        let signed = match sign_challenge(session, challenge.challenge.as_bytes()).await {
            Ok(s) => s,
            Err(e) => {
                self.state = ChallengeState::Failed;
                return Err(e);
            }
        };
        self.state = ChallengeState::SentToDevice;
        info!("device {} signed the challenge", signed.node_id);

        let response_hex = hex::encode(&signed.signature);
        let verdict = self
            .authority
            .verify(&challenge.request_id, &signed.node_id, &response_hex)
            .await;
        self.exchange = Some(ChallengeExchange {
            request_id: challenge.request_id,
            challenge: challenge.challenge,
            signature: signed.signature,
            node_id: signed.node_id.clone(),
        });
        if let Err(e) = verdict {
            warn!("challenge verification failed: {e}");
            self.state = ChallengeState::Failed;
            return Ok((false, None));
        }
        self.state = ChallengeState::Verified;
        info!("cloud verified node {}", signed.node_id);

        if self.disable_on_success {
            match disable_challenge_response(session).await {
                Ok(()) => self.state = ChallengeState::Disabled,
                Err(e) => warn!("could not disable challenge-response on device: {e}"),
            }
        }
        Ok((true, Some(signed.node_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mockall::predicate::{always, eq};
    use rmaker_core::security::{DeviceCredentials, SecurityScheme};
    use rmaker_core::SessionKind;

    use crate::infrastructure::transport::mock::MockDevice;

    async fn session(device: &Arc<MockDevice>) -> SecureSession {
        SecureSession::establish(
            device.clone(),
            SessionKind::LocalControl,
            SecurityScheme::key_exchange_pop("abcd1234"),
        )
        .await
        .unwrap()
    }

    fn issuing(cloud: &mut MockCloudAuthority) {
        cloud.expect_initiate().times(1).returning(|| {
            Ok(Challenge {
                request_id: "req-1".into(),
                challenge: "c0ffee".into(),
            })
        });
    }

    #[tokio::test]
    async fn test_verified_challenge_returns_node_id() {
        // Arrange
        let device = Arc::new(
            MockDevice::new(DeviceCredentials::with_pop("abcd1234")).with_node_id("N1"),
        );
        let mut session = session(&device).await;
        let expected_hex = hex::encode(device.signature_for(b"c0ffee"));
        let mut cloud = MockCloudAuthority::new();
        issuing(&mut cloud);
        cloud
            .expect_verify()
            .with(eq("req-1"), eq("N1"), eq(expected_hex))
            .times(1)
            .returning(|_, _, _| Ok(()));
        let mut coordinator = ChallengeResponseCoordinator::new(Arc::new(cloud), false);

        // Act
        let outcome = coordinator.run(&mut session).await.unwrap();

        // Assert
        assert_eq!(outcome, (true, Some("N1".to_string())));
        assert_eq!(coordinator.state(), ChallengeState::Verified);
        assert_eq!(device.signed_challenges(), vec![b"c0ffee".to_vec()]);
    }

    #[tokio::test]
    async fn test_rejected_verification_contacts_device_once() {
        // Arrange
        let device = Arc::new(
            MockDevice::new(DeviceCredentials::with_pop("abcd1234")).with_node_id("N1"),
        );
        let mut session = session(&device).await;
        let mut cloud = MockCloudAuthority::new();
        issuing(&mut cloud);
        cloud
            .expect_verify()
            .with(always(), always(), always())
            .times(1)
            .returning(|_, _, _| {
                Err(CloudError::Rejected {
                    operation: "verify",
                    status: 400,
                    body: "bad signature".into(),
                })
            });
        let mut coordinator = ChallengeResponseCoordinator::new(Arc::new(cloud), true);

        // Act
        let outcome = coordinator.run(&mut session).await.unwrap();

        // Assert
        assert_eq!(outcome, (false, None));
        assert_eq!(coordinator.state(), ChallengeState::Failed);
        assert_eq!(device.calls_to("ch_resp"), 1);
    }

    #[tokio::test]
    async fn test_initiate_failure_aborts_before_device() {
        let device = Arc::new(MockDevice::new(DeviceCredentials::with_pop("abcd1234")));
        let mut session = session(&device).await;
        let mut cloud = MockCloudAuthority::new();
        cloud
            .expect_initiate()
            .returning(|| Err(CloudError::NotLoggedIn));
        cloud.expect_verify().never();
        let mut coordinator = ChallengeResponseCoordinator::new(Arc::new(cloud), false);

        let result = coordinator.run(&mut session).await;

        assert!(matches!(
            result,
            Err(ProvisionError::CloudVerification(CloudError::NotLoggedIn))
        ));
        assert_eq!(device.calls_to("ch_resp"), 0);
    }

    #[tokio::test]
    async fn test_disable_on_success_switches_endpoint_off() {
        // Arrange
        let device = Arc::new(
            MockDevice::new(DeviceCredentials::with_pop("abcd1234")).with_node_id("N1"),
        );
        let mut session = session(&device).await;
        let mut cloud = MockCloudAuthority::new();
        issuing(&mut cloud);
        cloud.expect_verify().returning(|_, _, _| Ok(()));
        let mut coordinator = ChallengeResponseCoordinator::new(Arc::new(cloud), true);

        // Act
        let outcome = coordinator.run(&mut session).await.unwrap();

        // Assert
        assert!(outcome.0);
        assert_eq!(coordinator.state(), ChallengeState::Disabled);
        assert!(device.challenge_response_disabled());
        assert_eq!(coordinator.exchange().unwrap().request_id, "req-1");
    }

    #[tokio::test]
    async fn test_sign_without_endpoint_is_unsupported() {
        let device = Arc::new(MockDevice::new(DeviceCredentials::with_pop("abcd1234")));
        device.remove_endpoint("ch_resp");
        let mut session = session(&device).await;

        let result = sign_challenge(&mut session, b"x").await;

        assert!(matches!(
            result,
            Err(ProvisionError::ChallengeResponseUnsupported)
        ));
    }
}
