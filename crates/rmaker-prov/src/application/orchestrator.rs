//! ProvisioningOrchestrator: one full provisioning run.
//!
//! # Stages
//!
//! ```text
//! probe ─► claim check ─► select scheme ─► establish ─► identity ─► Wi-Fi
//!                          (PoP check,                   (ch_resp    (scan?, set,
//!                           no device I/O)                or user     apply, poll,
//!                                                         mapping)    retry)
//! ```
//!
//! The orchestrator depends only on [`Transport`], [`CloudAuthority`] and
//! [`NetworkSelector`]; `main.rs` injects the real adapters and the tests
//! inject a `MockDevice` and a scripted cloud.

use std::sync::Arc;

use rmaker_core::domain::capabilities::{Capabilities, SecurityCredentials, CAP_WIFI_SCAN};
use rmaker_core::domain::wifi::{ConnectionStatus, WifiAccessPoint};
use rmaker_core::security::SchemeVersion;
use rmaker_core::SessionKind;
use tracing::{info, warn};

use crate::application::capabilities::probe;
use crate::application::challenge::{ChallengeResponseCoordinator, CloudAuthority};
use crate::application::session::{build_scheme, SecureSession};
use crate::application::transport::Transport;
use crate::application::user_mapping::{new_secret_key, set_user_mapping};
use crate::application::wifi::{
    apply_config, reset, scan, set_config, ScanOptions, StatusPoller, WifiCredentials,
};
use crate::application::ProvisionError;

/// Picks the network to join from a scan.
///
/// The CLI prompts on the terminal; tests return a fixed choice.
pub trait NetworkSelector: Send + Sync {
    fn select(&self, networks: &[WifiAccessPoint]) -> Option<WifiCredentials>;
}

/// Inputs of one provisioning run.
#[derive(Debug, Clone, Default)]
pub struct ProvisionRequest {
    /// Explicit scheme; `None` lets the capability probe decide.
    pub scheme: Option<SchemeVersion>,
    pub credentials: SecurityCredentials,
    /// Network to join; `None` scans and asks the [`NetworkSelector`].
    pub wifi: Option<WifiCredentials>,
    /// Bind the node's identity but leave Wi-Fi untouched.
    pub no_wifi: bool,
    /// User for the legacy binding when no cloud session is available.
    pub user_id: Option<String>,
    /// Extra set/apply attempts after a failed connection, each preceded by
    /// a prov-ctrl reset.
    pub max_retries: u32,
    pub poller: StatusPoller,
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOutcome {
    pub scheme: SchemeVersion,
    pub node_id: Option<String>,
    /// `Some(true)` when the node proved its identity via challenge-response.
    pub verified: Option<bool>,
    /// Final station state; `None` in no-Wi-Fi mode.
    pub status: Option<ConnectionStatus>,
    /// Set/apply rounds used (1 without retries).
    pub attempts: u32,
}

/// Drives the provisioning stages over one transport.
pub struct ProvisioningOrchestrator {
    transport: Arc<dyn Transport>,
    cloud: Option<Arc<dyn CloudAuthority>>,
    selector: Option<Arc<dyn NetworkSelector>>,
}

impl ProvisioningOrchestrator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            cloud: None,
            selector: None,
        }
    }

    /// Attaches a logged-in cloud session.
    pub fn with_cloud(mut self, cloud: Arc<dyn CloudAuthority>) -> Self {
        self.cloud = Some(cloud);
        self
    }

    pub fn with_selector(mut self, selector: Arc<dyn NetworkSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Runs every stage.
    ///
    /// # Errors
    ///
    /// - [`ProvisionError::ClaimRequired`] / [`ProvisionError::Capability`]
    ///   before any session traffic.
    /// - [`ProvisionError::Handshake`] when the session cannot be
    ///   established.
    /// - [`ProvisionError::Wifi`] when the device ends in a failed state
    ///   after all retries.
    pub async fn run(&self, request: ProvisionRequest) -> Result<ProvisionOutcome, ProvisionError> {
        let kind = SessionKind::Provisioning;

        // ── Pre-flight: nothing below sends session bytes ─────────────────────
        let caps = probe(self.transport.as_ref(), kind).await;
        if caps.as_ref().is_some_and(Capabilities::requires_claim) {
            return Err(ProvisionError::ClaimRequired);
        }
        let challenge_response = self.cloud.is_some()
            && caps
                .as_ref()
                .is_some_and(Capabilities::supports_challenge_response);
        if request.no_wifi && !challenge_response {
            return Err(ProvisionError::NoWifiUnsupported);
        }
        let scheme = build_scheme(request.scheme, caps.as_ref(), &request.credentials)?;

        // ── Session ───────────────────────────────────────────────────────────
        let mut session = SecureSession::establish(self.transport.clone(), kind, scheme).await?;
        let mut outcome = ProvisionOutcome {
            scheme: session.scheme_version(),
            node_id: None,
            verified: None,
            status: None,
            attempts: 0,
        };

        // ── Identity ──────────────────────────────────────────────────────────
        match &self.cloud {
            Some(cloud) if challenge_response => {
                let mut coordinator = ChallengeResponseCoordinator::new(cloud.clone(), false);
                let (verified, node_id) = coordinator.run(&mut session).await?;
                outcome.verified = Some(verified);
                if !verified {
                    return Err(ProvisionError::IdentityRejected);
                }
                outcome.node_id = node_id;
            }
            cloud => {
                let user_id = cloud
                    .as_ref()
                    .and_then(|c| c.user_id())
                    .or_else(|| request.user_id.clone());
                match user_id {
                    Some(user_id) => {
                        let node_id =
                            set_user_mapping(&mut session, &user_id, &new_secret_key()).await?;
                        outcome.node_id = Some(node_id);
                    }
                    None => info!("no user to bind; skipping identity binding"),
                }
            }
        }

        if request.no_wifi {
            info!("no_wifi mode: leaving station configuration untouched");
            return Ok(outcome);
        }

        // ── Wi-Fi ─────────────────────────────────────────────────────────────
        let credentials = match request.wifi.clone() {
            Some(c) => c,
            None => self.choose_network(&mut session, caps.as_ref()).await?,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            set_config(&mut session, &credentials).await?;
            apply_config(&mut session).await?;
            let (status, _) = request.poller.poll_until_terminal(&mut session).await?;
            outcome.attempts = attempt;

            if matches!(status, ConnectionStatus::Connected { .. }) {
                info!("provisioning complete: {status}");
                outcome.status = Some(status);
                return Ok(outcome);
            }
            if attempt > request.max_retries {
                return Err(ProvisionError::Wifi(status));
            }
            warn!("attempt {attempt} ended {status}; resetting and retrying");
            reset(&mut session).await?;
        }
    }

    async fn choose_network(
        &self,
        session: &mut SecureSession,
        caps: Option<&Capabilities>,
    ) -> Result<WifiCredentials, ProvisionError> {
        if !caps.is_some_and(|c| c.has(CAP_WIFI_SCAN)) {
            return Err(ProvisionError::ScanUnsupported);
        }
        let options = ScanOptions::for_transport(self.transport.kind());
        let networks = scan(session, options).await?;
        info!("found {} networks", networks.len());
        self.selector
            .as_ref()
            .and_then(|s| s.select(&networks))
            .ok_or(ProvisionError::NoNetworkSelected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use rmaker_core::domain::wifi::FailReason;
    use rmaker_core::security::DeviceCredentials;
    use rmaker_core::CapabilityError;

    use crate::application::challenge::{Challenge, MockCloudAuthority};
    use crate::infrastructure::transport::mock::{MockDevice, StationScript};

    struct FirstNetwork;

    impl NetworkSelector for FirstNetwork {
        fn select(&self, networks: &[WifiAccessPoint]) -> Option<WifiCredentials> {
            networks.first().map(|ap| WifiCredentials {
                ssid: ap.ssid.clone(),
                passphrase: "pw".into(),
            })
        }
    }

    fn request() -> ProvisionRequest {
        ProvisionRequest {
            credentials: SecurityCredentials {
                pop: "abcd1234".into(),
                ..Default::default()
            },
            wifi: Some(WifiCredentials {
                ssid: "home".into(),
                passphrase: "secret".into(),
            }),
            user_id: Some("user-1".into()),
            poller: StatusPoller {
                interval: Duration::from_millis(1),
                deadline: None,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_claim_capability_stops_before_session() {
        // Arrange
        let device = Arc::new(
            MockDevice::new(DeviceCredentials::with_pop("abcd1234")).with_rmaker_caps(&["claim"]),
        );

        // Act
        let result = ProvisioningOrchestrator::new(device.clone())
            .run(request())
            .await;

        // Assert
        assert!(matches!(result, Err(ProvisionError::ClaimRequired)));
        assert_eq!(
            result.unwrap_err().to_string(),
            "Please claim the node before provisioning"
        );
        assert_eq!(device.calls_to("prov-session"), 0);
    }

    #[tokio::test]
    async fn test_sec1_with_pop_binds_user_and_connects() {
        // Arrange
        let device = Arc::new(
            MockDevice::new(DeviceCredentials::with_pop("abcd1234")).with_node_id("N7"),
        );
        device.script_station(StationScript::connects_after(1));

        // Act
        let outcome = ProvisioningOrchestrator::new(device.clone())
            .run(request())
            .await
            .unwrap();

        // Assert
        assert_eq!(outcome.scheme, SchemeVersion::KeyExchangePop);
        assert_eq!(outcome.node_id.as_deref(), Some("N7"));
        assert_eq!(outcome.attempts, 1);
        assert!(matches!(outcome.status, Some(ConnectionStatus::Connected { .. })));
        assert_eq!(device.user_mapping().unwrap().0, "user-1");
    }

    #[tokio::test]
    async fn test_missing_pop_fails_before_prov_session() {
        let device = Arc::new(MockDevice::new(DeviceCredentials::with_pop("abcd1234")));
        let mut req = request();
        req.credentials.pop.clear();

        let result = ProvisioningOrchestrator::new(device.clone()).run(req).await;

        assert!(matches!(
            result,
            Err(ProvisionError::Capability(CapabilityError::PopRequired))
        ));
        assert_eq!(device.calls_to("prov-session"), 0);
    }

    #[tokio::test]
    async fn test_failed_status_retries_through_reset() {
        // Arrange: first attempt fails, second connects
        let device = Arc::new(MockDevice::new(DeviceCredentials::with_pop("abcd1234")));
        device.script_station(StationScript::fails_then_connects(FailReason::AuthError));
        let mut req = request();
        req.max_retries = 1;

        // Act
        let outcome = ProvisioningOrchestrator::new(device.clone())
            .run(req)
            .await
            .unwrap();

        // Assert
        assert_eq!(outcome.attempts, 2);
        assert_eq!(device.calls_to("prov-ctrl"), 1);
    }

    #[tokio::test]
    async fn test_failed_status_without_retries_is_wifi_error() {
        let device = Arc::new(MockDevice::new(DeviceCredentials::with_pop("abcd1234")));
        device.script_station(StationScript::fails(FailReason::NetworkNotFound));

        let result = ProvisioningOrchestrator::new(device.clone())
            .run(request())
            .await;

        assert!(matches!(
            result,
            Err(ProvisionError::Wifi(ConnectionStatus::Failed(
                FailReason::NetworkNotFound
            )))
        ));
        assert_eq!(device.calls_to("prov-ctrl"), 0);
    }

    #[tokio::test]
    async fn test_scan_requires_capability() {
        let device = Arc::new(MockDevice::new(DeviceCredentials::with_pop("abcd1234")));
        let mut req = request();
        req.wifi = None;

        let result = ProvisioningOrchestrator::new(device.clone())
            .with_selector(Arc::new(FirstNetwork))
            .run(req)
            .await;

        assert!(matches!(result, Err(ProvisionError::ScanUnsupported)));
    }

    #[tokio::test]
    async fn test_scan_and_select_when_no_ssid_given() {
        // Arrange
        let device = Arc::new(
            MockDevice::new(DeviceCredentials::with_pop("abcd1234")).with_prov_caps(&["wifi_scan"]),
        );
        device.set_networks(vec!["office".into(), "guest".into()]);
        device.script_station(StationScript::connects_after(0));
        let mut req = request();
        req.wifi = None;

        // Act
        ProvisioningOrchestrator::new(device.clone())
            .with_selector(Arc::new(FirstNetwork))
            .run(req)
            .await
            .unwrap();

        // Assert
        assert_eq!(device.wifi_credentials().unwrap().0, "office");
    }

    #[tokio::test]
    async fn test_no_wifi_without_challenge_response_is_rejected() {
        let device = Arc::new(MockDevice::new(DeviceCredentials::with_pop("abcd1234")));
        let mut req = request();
        req.no_wifi = true;

        let result = ProvisioningOrchestrator::new(device.clone()).run(req).await;

        assert!(matches!(result, Err(ProvisionError::NoWifiUnsupported)));
        assert_eq!(device.calls_to("prov-session"), 0);
    }

    #[tokio::test]
    async fn test_no_wifi_with_challenge_response_skips_wifi() {
        // Arrange
        let device = Arc::new(
            MockDevice::new(DeviceCredentials::with_pop("abcd1234"))
                .with_node_id("N1")
                .with_extra_caps(&["ch_resp"]),
        );
        let mut cloud = MockCloudAuthority::new();
        cloud.expect_initiate().returning(|| {
            Ok(Challenge {
                request_id: "r".into(),
                challenge: "c".into(),
            })
        });
        cloud.expect_verify().returning(|_, _, _| Ok(()));
        let mut req = request();
        req.no_wifi = true;

        // Act
        let outcome = ProvisioningOrchestrator::new(device.clone())
            .with_cloud(Arc::new(cloud))
            .run(req)
            .await
            .unwrap();

        // Assert
        assert_eq!(outcome.verified, Some(true));
        assert_eq!(outcome.node_id.as_deref(), Some("N1"));
        assert_eq!(outcome.status, None);
        assert_eq!(device.calls_to("prov-config"), 0);
        assert!(!device.challenge_response_disabled());
    }
}
