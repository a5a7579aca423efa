//! HTTP transport: one POST per exchange.
//!
//! Provisioning firmware runs a tiny HTTP server (on the soft access point,
//! or on the home network for local control).  Every endpoint is a path:
//! `POST http://<host>:<port>/<endpoint>` with the raw payload as the body.
//! The server tracks the session with a cookie, so the `Set-Cookie` value
//! from the handshake is echoed on every later request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::StatusCode;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::application::transport::{Transport, TransportError, TransportKind};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// POSTs payloads to `http://<authority>/<endpoint>`.
pub struct HttpTransport {
    client: reqwest::Client,
    authority: String,
    timeout: Duration,
    /// Session cookie; the lock also keeps requests from overlapping.
    cookie: Mutex<Option<String>>,
    closed: Mutex<bool>,
}

impl HttpTransport {
    /// Builds a transport for an already-resolved `authority` (`host:port`).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] when the HTTP client cannot be
    /// built (e.g. the TLS backend failed to initialise).
    pub fn new(authority: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let authority = authority.into();
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connect {
                target: authority.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            authority,
            timeout,
            cookie: Mutex::new(None),
            closed: Mutex::new(false),
        })
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    fn url(&self, endpoint: &str) -> String {
        endpoint_url(&self.authority, endpoint)
    }
}

/// `http://<authority>/<endpoint>`.
pub fn endpoint_url(authority: &str, endpoint: &str) -> String {
    format!("http://{authority}/{}", endpoint.trim_start_matches('/'))
}

#[async_trait]
impl Transport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn send(&self, endpoint: &str, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        if *self.closed.lock().await {
            return Err(TransportError::Closed);
        }
        let mut cookie = self.cookie.lock().await;

        let url = self.url(endpoint);
        trace!("POST {url} ({} bytes)", payload.len());
        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(ACCEPT, "text/plain")
            .body(payload.to_vec());
        if let Some(value) = cookie.as_deref() {
            request = request.header(COOKIE, value);
        }

        let response = request.send().await.map_err(|e| self.map_error(endpoint, e))?;
        if let Some(value) = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
        {
            debug!("session cookie updated");
            *cookie = Some(session_cookie(value).to_string());
        }

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                return Err(TransportError::EndpointNotFound(endpoint.to_string()))
            }
            other => return Err(TransportError::HttpStatus(other.as_u16())),
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_error(endpoint, e))?;
        trace!("{endpoint}: {} bytes back", body.len());
        Ok(body.to_vec())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        *self.closed.lock().await = true;
        *self.cookie.lock().await = None;
        debug!("http transport to {} closed", self.authority);
        Ok(())
    }
}

impl HttpTransport {
    fn map_error(&self, endpoint: &str, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                endpoint: endpoint.to_string(),
                after: self.timeout,
            }
        } else if error.is_connect() {
            TransportError::Connect {
                target: self.authority.clone(),
                reason: error.to_string(),
            }
        } else {
            TransportError::Io(error.to_string())
        }
    }
}

/// The `name=value` part of a `Set-Cookie` header, without attributes.
fn session_cookie(header: &str) -> &str {
    header.split(';').next().unwrap_or(header).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_joins_authority_and_path() {
        assert_eq!(
            endpoint_url("192.168.4.1:80", "prov-session"),
            "http://192.168.4.1:80/prov-session"
        );
        assert_eq!(
            endpoint_url("[fe80::1]:8080", "esp_local_ctrl/control"),
            "http://[fe80::1]:8080/esp_local_ctrl/control"
        );
    }

    #[test]
    fn test_leading_slash_is_not_doubled() {
        assert_eq!(endpoint_url("h:80", "/proto-ver"), "http://h:80/proto-ver");
    }

    #[test]
    fn test_session_cookie_strips_attributes() {
        assert_eq!(
            session_cookie("session=1a2b3c; Path=/; HttpOnly"),
            "session=1a2b3c"
        );
        assert_eq!(session_cookie("session=xyz"), "session=xyz");
    }

    #[tokio::test]
    async fn test_send_after_disconnect_is_closed() {
        // Arrange
        let transport = HttpTransport::new("127.0.0.1:9", Duration::from_millis(100)).unwrap();

        // Act
        transport.disconnect().await.unwrap();
        let result = transport.send("proto-ver", b"---").await;

        // Assert
        assert_eq!(result, Err(TransportError::Closed));
        assert_eq!(transport.kind(), TransportKind::Http);
    }
}
