//! REST client for the cloud side of the challenge-response flow.
//!
//! Two calls, both `POST` with a JSON body and the user's id token in the
//! `Authorization` header:
//!
//! - `<base>user/nodes/mapping/initiate`  `{"timeout":360}` returns
//!   `{"request_id", "challenge"}`
//! - `<base>user/nodes/mapping/verify`    `{"request_id", "node_id",
//!   "challenge_response"}` (lowercase hex); any 2xx means accepted

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::application::challenge::{Challenge, CloudAuthority, CloudError};

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.rainmaker.espressif.com/v1/";

/// Lifetime requested for a challenge, in seconds.
const CHALLENGE_TIMEOUT_SECS: u32 = 360;

const INITIATE_PATH: &str = "user/nodes/mapping/initiate";
const VERIFY_PATH: &str = "user/nodes/mapping/verify";

#[derive(Debug, Serialize)]
struct InitiateRequest {
    timeout: u32,
}

#[derive(Debug, Deserialize)]
struct InitiateResponse {
    request_id: Option<String>,
    challenge: Option<String>,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    request_id: &'a str,
    node_id: &'a str,
    challenge_response: &'a str,
}

/// Credentials and endpoint for one logged-in user.
#[derive(Clone, PartialEq, Eq)]
pub struct CloudSettings {
    pub base_url: String,
    pub id_token: Option<String>,
    pub user_id: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for CloudSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudSettings")
            .field("base_url", &self.base_url)
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.user_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for CloudSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            id_token: None,
            user_id: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// [`CloudAuthority`] backed by the REST API.
pub struct CloudClient {
    client: reqwest::Client,
    settings: CloudSettings,
}

impl CloudClient {
    /// # Errors
    ///
    /// Returns [`CloudError::Request`] if the HTTP client cannot be built.
    pub fn new(settings: CloudSettings) -> Result<Self, CloudError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| CloudError::Request {
                url: settings.base_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, settings })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.settings.base_url, path)
    }

    fn token(&self) -> Result<&str, CloudError> {
        self.settings
            .id_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(CloudError::NotLoggedIn)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, CloudError> {
        let url = self.url(path);
        debug!("POST {url}");
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.token()?)
            .json(body)
            .send()
            .await
            .map_err(|e| CloudError::Request {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(CloudError::Rejected {
                operation,
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Joins `base` and `path` with exactly one `/`.
fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[async_trait]
impl CloudAuthority for CloudClient {
    fn user_id(&self) -> Option<String> {
        self.settings.user_id.clone()
    }

    async fn initiate(&self) -> Result<Challenge, CloudError> {
        info!("initiating challenge-response mapping");
        let body = InitiateRequest {
            timeout: CHALLENGE_TIMEOUT_SECS,
        };
        let response = self.post("initiate", INITIATE_PATH, &body).await?;
        let parsed: InitiateResponse = response
            .json()
            .await
            .map_err(|e| CloudError::InvalidResponse(e.to_string()))?;
        parse_challenge(parsed)
    }

    async fn verify(
        &self,
        request_id: &str,
        node_id: &str,
        response_hex: &str,
    ) -> Result<(), CloudError> {
        info!("verifying challenge response for node {node_id}");
        let body = VerifyRequest {
            request_id,
            node_id,
            challenge_response: response_hex,
        };
        self.post("verify", VERIFY_PATH, &body).await?;
        Ok(())
    }
}

fn parse_challenge(response: InitiateResponse) -> Result<Challenge, CloudError> {
    match (response.request_id, response.challenge) {
        (Some(request_id), Some(challenge)) if !request_id.is_empty() && !challenge.is_empty() => {
            Ok(Challenge {
                request_id,
                challenge,
            })
        }
        _ => Err(CloudError::InvalidResponse(
            "initiate response lacks request_id or challenge".into(),
        )),
    }
}
