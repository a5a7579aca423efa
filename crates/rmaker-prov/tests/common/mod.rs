//! Shared fixtures for the integration tests.
//!
//! `mockall`'s generated `MockCloudAuthority` only exists inside the
//! library's own unit tests, so integration tests use this scripted stand-in
//! instead.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rmaker_prov::application::challenge::{Challenge, CloudAuthority, CloudError};
use rmaker_prov::application::transport::{Transport, TransportError, TransportKind};
use rmaker_prov::application::wifi::StatusPoller;
use rmaker_prov::infrastructure::transport::mock::MockDevice;

/// Cloud that issues one fixed challenge and accepts or rejects every
/// verification.
pub struct ScriptedCloud {
    accept: bool,
    challenge: String,
    initiated: AtomicUsize,
    verified: Mutex<Vec<(String, String, String)>>,
}

impl ScriptedCloud {
    pub fn accepting(challenge: &str) -> Self {
        Self::new(true, challenge)
    }

    pub fn rejecting(challenge: &str) -> Self {
        Self::new(false, challenge)
    }

    fn new(accept: bool, challenge: &str) -> Self {
        Self {
            accept,
            challenge: challenge.to_string(),
            initiated: AtomicUsize::new(0),
            verified: Mutex::new(Vec::new()),
        }
    }

    pub fn initiate_calls(&self) -> usize {
        self.initiated.load(Ordering::SeqCst)
    }

    /// `(request_id, node_id, response_hex)` of every verify call.
    pub fn verify_calls(&self) -> Vec<(String, String, String)> {
        self.verified.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl CloudAuthority for ScriptedCloud {
    fn user_id(&self) -> Option<String> {
        Some("cloud-user".to_string())
    }

    async fn initiate(&self) -> Result<Challenge, CloudError> {
        self.initiated.fetch_add(1, Ordering::SeqCst);
        Ok(Challenge {
            request_id: "req-1".to_string(),
            challenge: self.challenge.clone(),
        })
    }

    async fn verify(
        &self,
        request_id: &str,
        node_id: &str,
        response_hex: &str,
    ) -> Result<(), CloudError> {
        self.verified.lock().expect("lock poisoned").push((
            request_id.to_string(),
            node_id.to_string(),
            response_hex.to_string(),
        ));
        if self.accept {
            Ok(())
        } else {
            Err(CloudError::Rejected {
                operation: "verify",
                status: 400,
                body: r#"{"status":"failure"}"#.to_string(),
            })
        }
    }
}

/// A poller that does not slow the tests down.
pub fn fast_poller() -> StatusPoller {
    StatusPoller {
        interval: Duration::from_millis(1),
        deadline: Some(Duration::from_secs(5)),
    }
}

/// Wraps a device behind a link that, like HTTP, cannot list endpoints and
/// only learns one is missing from the failed request.
pub struct BlindLink(pub Arc<MockDevice>);

#[async_trait]
impl Transport for BlindLink {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn send(&self, endpoint: &str, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.0.send(endpoint, payload).await
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.0.disconnect().await
    }
}
