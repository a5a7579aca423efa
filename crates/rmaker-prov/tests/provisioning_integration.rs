//! Integration tests for the full provisioning run.
//!
//! # Purpose
//!
//! These tests drive [`ProvisioningOrchestrator`] against the in-memory
//! [`MockDevice`], which runs the real device-side handshake responder.
//! Every byte the orchestrator produces goes through the same encryption,
//! protobuf encoding and endpoint routing it would use against firmware; only
//! the radio is missing.
//!
//! What is verified here:
//!
//! - An unsecured device is provisioned end to end.
//! - A sec1 device with no `no_pop` capability fails when no PoP is given,
//!   before the handshake endpoint is ever contacted.
//! - The status poller reports how many polls a connection took.
//! - Challenge-response reports `(true, node_id)` when the cloud accepts and
//!   `(false, None)` when it rejects, with exactly one device signing call.
//! - A sec2 device is provisioned with a username and password.
//!
//! # Flow under test
//!
//! ```text
//! orchestrator                         MockDevice
//!     |-- proto-ver "---" ------------------>|   capability probe
//!     |<----------------- {"prov":{...}} ----|
//!     |-- prov-session (handshake) --------->|   1 or 2 round trips
//!     |-- cloud_user_assoc / ch_resp ------->|   identity
//!     |-- prov-config set, apply ----------->|
//!     |-- prov-config get-status (poll) ---->|   until terminal
//! ```

mod common;

use std::sync::Arc;

use rmaker_core::{
    CapabilityError, ConnectionStatus, DeviceCredentials, FailReason, SchemeVersion,
    SecurityCredentials, SessionKind,
};
use rmaker_prov::application::challenge::{ChallengeResponseCoordinator, ChallengeState};
use rmaker_prov::application::orchestrator::{ProvisionRequest, ProvisioningOrchestrator};
use rmaker_prov::application::session::open_session;
use rmaker_prov::application::wifi::{apply_config, set_config, WifiCredentials};
use rmaker_prov::application::transport::TransportError;
use rmaker_prov::application::ProvisionError;
use rmaker_prov::infrastructure::transport::mock::{MockDevice, StationScript, MOCK_STATION_IP};

use common::{fast_poller, BlindLink, ScriptedCloud};

fn home_network() -> WifiCredentials {
    WifiCredentials {
        ssid: "home".to_string(),
        passphrase: "secret-pass".to_string(),
    }
}

// ── End-to-end ────────────────────────────────────────────────────────────────

/// An unsecured device is bound to the user and joins the network.
#[tokio::test]
async fn test_no_sec_device_is_provisioned_end_to_end() {
    // Arrange: the device reports Connecting twice before it connects.
    let device = Arc::new(MockDevice::new(DeviceCredentials::plain()).with_node_id("N-plain"));
    device.script_station(StationScript::connects_after(2));
    let request = ProvisionRequest {
        wifi: Some(home_network()),
        user_id: Some("user-1".to_string()),
        poller: fast_poller(),
        ..Default::default()
    };

    // Act
    let outcome = tokio_test::assert_ok!(
        ProvisioningOrchestrator::new(device.clone())
            .run(request)
            .await
    );

    // Assert
    assert_eq!(outcome.scheme, SchemeVersion::Plain);
    assert_eq!(outcome.node_id.as_deref(), Some("N-plain"));
    assert_eq!(
        outcome.status,
        Some(ConnectionStatus::Connected {
            ip: MOCK_STATION_IP.to_string()
        })
    );
    assert_eq!(
        device.wifi_credentials(),
        Some(("home".to_string(), "secret-pass".to_string()))
    );
    assert!(device.applied());

    let (user_id, secret_key) = device.user_mapping().expect("user mapping was not sent");
    assert_eq!(user_id, "user-1");
    assert!(!secret_key.is_empty());

    // sec0 still exchanges one unencrypted session message.
    assert_eq!(device.calls_to("prov-session"), 1);
}

/// A sec2 device derives its session key from username and password.
#[tokio::test]
async fn test_sec2_device_is_provisioned_with_password() {
    // Arrange
    let device = Arc::new(MockDevice::new(DeviceCredentials::with_password(
        "wifiprov", "abcd1234", 1,
    )));
    let request = ProvisionRequest {
        credentials: SecurityCredentials {
            username: "wifiprov".to_string(),
            password: "abcd1234".to_string(),
            ..Default::default()
        },
        wifi: Some(home_network()),
        poller: fast_poller(),
        ..Default::default()
    };

    // Act
    let outcome = ProvisioningOrchestrator::new(device.clone())
        .run(request)
        .await
        .expect("sec2 provisioning should succeed");

    // Assert: SRP takes two round trips on the session endpoint.
    assert_eq!(outcome.scheme, SchemeVersion::MutualAuthPassword);
    assert_eq!(device.calls_to("prov-session"), 2);
    assert!(device.applied());
}

/// A wrong password is a handshake failure, and nothing else is sent.
#[tokio::test]
async fn test_sec2_wrong_password_is_handshake_error() {
    let device = Arc::new(MockDevice::new(DeviceCredentials::with_password(
        "wifiprov", "abcd1234", 1,
    )));
    let request = ProvisionRequest {
        credentials: SecurityCredentials {
            username: "wifiprov".to_string(),
            password: "wrong".to_string(),
            ..Default::default()
        },
        wifi: Some(home_network()),
        poller: fast_poller(),
        ..Default::default()
    };

    let result = ProvisioningOrchestrator::new(device.clone())
        .run(request)
        .await;

    assert!(matches!(result, Err(ProvisionError::Handshake(_))));
    assert_eq!(device.calls_to("prov-config"), 0);
}

// ── Capability pre-flight ─────────────────────────────────────────────────────

/// sec1 without `no_pop` needs a PoP; the check fails before any handshake
/// bytes reach the device.
#[tokio::test]
async fn test_sec1_empty_pop_fails_before_session_traffic() {
    // Arrange: the device has a PoP, so it does not advertise no_pop.
    let device = Arc::new(MockDevice::new(DeviceCredentials::with_pop("abcd1234")));
    let request = ProvisionRequest {
        wifi: Some(home_network()),
        poller: fast_poller(),
        ..Default::default()
    };

    // Act
    let result = ProvisioningOrchestrator::new(device.clone())
        .run(request)
        .await;

    // Assert
    assert!(matches!(
        result,
        Err(ProvisionError::Capability(CapabilityError::PopRequired))
    ));
    assert_eq!(device.calls_to("proto-ver"), 1);
    assert_eq!(device.calls_to("prov-session"), 0);
}

// ── Status polling ────────────────────────────────────────────────────────────

/// The poller counts every get-status call up to the first terminal state.
#[tokio::test]
async fn test_poller_counts_polls_until_terminal() {
    // Arrange
    let device = Arc::new(MockDevice::new(DeviceCredentials::with_pop("abcd1234")));
    device.script_station(StationScript::connects_after(2));
    let credentials = SecurityCredentials {
        pop: "abcd1234".to_string(),
        ..Default::default()
    };
    let (mut session, _) = open_session(
        device.clone(),
        SessionKind::Provisioning,
        None,
        &credentials,
    )
    .await
    .expect("session should open");
    set_config(&mut session, &home_network())
        .await
        .expect("set config");
    apply_config(&mut session).await.expect("apply config");

    // Act
    let (status, polls) = fast_poller()
        .poll_until_terminal(&mut session)
        .await
        .expect("poll");

    // Assert: two Connecting replies, then Connected.
    assert!(matches!(status, ConnectionStatus::Connected { .. }));
    assert_eq!(polls, 3);
}

/// A failure reported on the first poll ends polling immediately.
#[tokio::test]
async fn test_poller_stops_at_first_failure() {
    let device = Arc::new(MockDevice::new(DeviceCredentials::with_pop("abcd1234")));
    device.script_station(StationScript::fails(FailReason::AuthError));
    let credentials = SecurityCredentials {
        pop: "abcd1234".to_string(),
        ..Default::default()
    };
    let (mut session, _) = open_session(
        device.clone(),
        SessionKind::Provisioning,
        None,
        &credentials,
    )
    .await
    .expect("session should open");

    let (status, polls) = fast_poller()
        .poll_until_terminal(&mut session)
        .await
        .expect("poll");

    assert_eq!(status, ConnectionStatus::Failed(FailReason::AuthError));
    assert_eq!(polls, 1);
}

// ── Challenge-response ────────────────────────────────────────────────────────

/// Accepted: the coordinator reports the node id the device signed with and
/// forwards the device's signature to the cloud as hex.
#[tokio::test]
async fn test_challenge_response_accepted_reports_node_id() {
    // Arrange
    let device = Arc::new(
        MockDevice::new(DeviceCredentials::with_pop("abcd1234"))
            .with_node_id("N1")
            .with_extra_caps(&["ch_resp"]),
    );
    let cloud = Arc::new(ScriptedCloud::accepting("c0ffee"));
    let credentials = SecurityCredentials {
        pop: "abcd1234".to_string(),
        ..Default::default()
    };
    let (mut session, _) = open_session(
        device.clone(),
        SessionKind::Provisioning,
        None,
        &credentials,
    )
    .await
    .expect("session should open");
    let mut coordinator = ChallengeResponseCoordinator::new(cloud.clone(), false);

    // Act
    let result = coordinator.run(&mut session).await.expect("run");

    // Assert
    assert_eq!(result, (true, Some("N1".to_string())));
    assert_eq!(coordinator.state(), ChallengeState::Verified);
    assert_eq!(device.signed_challenges(), vec![b"c0ffee".to_vec()]);
    assert_eq!(cloud.initiate_calls(), 1);

    let verify = cloud.verify_calls();
    assert_eq!(verify.len(), 1);
    assert_eq!(verify[0].0, "req-1");
    assert_eq!(verify[0].1, "N1");
    assert_eq!(verify[0].2, hex::encode(device.signature_for(b"c0ffee")));
    assert!(!device.challenge_response_disabled());
}

/// Rejected: `(false, None)` after a single signing call; the device is
/// never asked to disable the endpoint.
#[tokio::test]
async fn test_challenge_response_rejected_reports_false() {
    // Arrange
    let device = Arc::new(
        MockDevice::new(DeviceCredentials::with_pop("abcd1234"))
            .with_node_id("N1")
            .with_extra_caps(&["ch_resp"]),
    );
    let cloud = Arc::new(ScriptedCloud::rejecting("c0ffee"));
    let credentials = SecurityCredentials {
        pop: "abcd1234".to_string(),
        ..Default::default()
    };
    let (mut session, _) = open_session(
        device.clone(),
        SessionKind::Provisioning,
        None,
        &credentials,
    )
    .await
    .expect("session should open");
    let mut coordinator = ChallengeResponseCoordinator::new(cloud.clone(), true);

    // Act
    let result = coordinator.run(&mut session).await.expect("run");

    // Assert
    assert_eq!(result, (false, None));
    assert_eq!(coordinator.state(), ChallengeState::Failed);
    assert_eq!(device.signed_challenges().len(), 1);
    assert_eq!(device.calls_to("ch_resp"), 1);
    assert!(!device.challenge_response_disabled());
}

/// With a cloud session and a `ch_resp` device, the orchestrator proves the
/// identity instead of sending the legacy user mapping.
#[tokio::test]
async fn test_orchestrator_prefers_challenge_response_over_user_mapping() {
    // Arrange
    let device = Arc::new(
        MockDevice::new(DeviceCredentials::with_pop("abcd1234"))
            .with_node_id("N1")
            .with_extra_caps(&["ch_resp"]),
    );
    let cloud = Arc::new(ScriptedCloud::accepting("c0ffee"));
    let request = ProvisionRequest {
        credentials: SecurityCredentials {
            pop: "abcd1234".to_string(),
            ..Default::default()
        },
        wifi: Some(home_network()),
        poller: fast_poller(),
        ..Default::default()
    };

    // Act
    let outcome = ProvisioningOrchestrator::new(device.clone())
        .with_cloud(cloud.clone())
        .run(request)
        .await
        .expect("provisioning should succeed");

    // Assert
    assert_eq!(outcome.verified, Some(true));
    assert_eq!(outcome.node_id.as_deref(), Some("N1"));
    assert_eq!(device.calls_to("cloud_user_assoc"), 0);
    assert!(device.user_mapping().is_none());
    assert!(device.applied());
}

/// A rejected identity stops the run before Wi-Fi credentials are sent.
#[tokio::test]
async fn test_orchestrator_rejected_identity_sends_no_wifi_credentials() {
    let device = Arc::new(
        MockDevice::new(DeviceCredentials::with_pop("abcd1234"))
            .with_node_id("N1")
            .with_extra_caps(&["ch_resp"]),
    );
    let request = ProvisionRequest {
        credentials: SecurityCredentials {
            pop: "abcd1234".to_string(),
            ..Default::default()
        },
        wifi: Some(home_network()),
        poller: fast_poller(),
        ..Default::default()
    };

    let result = ProvisioningOrchestrator::new(device.clone())
        .with_cloud(Arc::new(ScriptedCloud::rejecting("c0ffee")))
        .run(request)
        .await;

    assert!(matches!(result, Err(ProvisionError::IdentityRejected)));
    assert!(device.wifi_credentials().is_none());
}

/// Without `ch_resp` on the device, a cloud session falls back to the
/// legacy binding with the cloud's user id.
#[tokio::test]
async fn test_cloud_without_ch_resp_binds_cloud_user() {
    let device = Arc::new(MockDevice::new(DeviceCredentials::with_pop("abcd1234")));
    let cloud = Arc::new(ScriptedCloud::accepting("unused"));
    let request = ProvisionRequest {
        credentials: SecurityCredentials {
            pop: "abcd1234".to_string(),
            ..Default::default()
        },
        wifi: Some(home_network()),
        user_id: Some("ignored-local-user".to_string()),
        poller: fast_poller(),
        ..Default::default()
    };

    let outcome = ProvisioningOrchestrator::new(device.clone())
        .with_cloud(cloud.clone())
        .run(request)
        .await
        .expect("provisioning should succeed");

    assert_eq!(outcome.verified, None);
    assert_eq!(device.user_mapping().map(|(u, _)| u).as_deref(), Some("cloud-user"));
    assert_eq!(cloud.initiate_calls(), 0);
}

/// Over a link that cannot list endpoints, a missing `cloud_user_assoc` is
/// only discovered after an encrypted frame went out.  The run stops there
/// instead of sending Wi-Fi credentials on a session the device can no
/// longer decrypt.
#[tokio::test]
async fn test_missing_user_assoc_over_blind_link_stops_before_wifi() {
    // Arrange
    let device = Arc::new(MockDevice::new(DeviceCredentials::with_pop("abcd1234")));
    device.remove_endpoint("cloud_user_assoc");
    let request = ProvisionRequest {
        credentials: SecurityCredentials {
            pop: "abcd1234".to_string(),
            ..Default::default()
        },
        wifi: Some(home_network()),
        user_id: Some("user-1".to_string()),
        poller: fast_poller(),
        ..Default::default()
    };

    // Act
    let result = ProvisioningOrchestrator::new(Arc::new(BlindLink(device.clone())))
        .run(request)
        .await;

    // Assert
    assert!(matches!(
        result,
        Err(ProvisionError::Transport(TransportError::EndpointNotFound(_)))
    ));
    assert!(device.wifi_credentials().is_none());
    assert_eq!(device.calls_to("prov-config"), 0);
}

/// When the link does know the endpoint is missing, binding is skipped
/// without sending anything and provisioning carries on.
#[tokio::test]
async fn test_missing_user_assoc_on_known_link_is_skipped() {
    let device = Arc::new(MockDevice::new(DeviceCredentials::with_pop("abcd1234")));
    device.remove_endpoint("cloud_user_assoc");
    let request = ProvisionRequest {
        credentials: SecurityCredentials {
            pop: "abcd1234".to_string(),
            ..Default::default()
        },
        wifi: Some(home_network()),
        user_id: Some("user-1".to_string()),
        poller: fast_poller(),
        ..Default::default()
    };

    let outcome = ProvisioningOrchestrator::new(device.clone())
        .run(request)
        .await
        .expect("provisioning should succeed");

    assert_eq!(outcome.node_id.as_deref(), Some("unknown"));
    assert_eq!(device.calls_to("cloud_user_assoc"), 0);
    assert!(device.applied());
}
