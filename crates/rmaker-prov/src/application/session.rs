//! Secure session: drives the handshake, then wraps every command in the
//! negotiated cipher.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//! probe capabilities ──► select scheme ──► establish ──► request / exchange ...
//!   (plaintext)           (local rules)     (session       (encrypted)
//!                                            endpoint)
//! ```
//!
//! [`open_session`] runs the whole left half.  [`SecureSession::establish`]
//! only performs the handshake, for callers that already picked a scheme.
//! A session never outlives its transport and is never re-keyed; a new
//! handshake means a new `SecureSession`.
//!
//! sec1 and sec2 keep cipher state that advances with every frame.  Once an
//! encrypted request has been built but no reply came back, the two sides
//! may disagree on that state, so the session refuses all further traffic.

use std::sync::Arc;

use rmaker_core::domain::capabilities::{select_scheme, Capabilities, SecurityCredentials};
use rmaker_core::protocol::codec::{decode, encode, WireMessage};
use rmaker_core::security::{HandshakeError, SchemeVersion, SecurityScheme};
use rmaker_core::SessionKind;
use tracing::{debug, info, warn};

use crate::application::capabilities::probe;
use crate::application::transport::Transport;
use crate::application::ProvisionError;

/// An established, encrypted channel to one device.
pub struct SecureSession {
    transport: Arc<dyn Transport>,
    kind: SessionKind,
    scheme: SecurityScheme,
    /// Endpoint whose exchange left the cipher state unknown.
    desynced: Option<String>,
}

impl SecureSession {
    /// Runs `scheme`'s handshake over `kind`'s session endpoint.
    ///
    /// # Errors
    ///
    /// Every failure, including an unreachable endpoint, is a
    /// [`HandshakeError`].  There are no retries.
    pub async fn establish(
        transport: Arc<dyn Transport>,
        kind: SessionKind,
        mut scheme: SecurityScheme,
    ) -> Result<Self, HandshakeError> {
        let endpoint = kind.session_endpoint();
        info!("establishing {} session on {endpoint}", scheme.version());

        let mut response: Option<Vec<u8>> = None;
        while let Some(request) = scheme.handshake_step(response.as_deref())? {
            debug!("handshake -> {endpoint} ({} bytes)", request.len());
            let reply = transport
                .send(endpoint, &request)
                .await
                .map_err(|e| HandshakeError::Transport(e.to_string()))?;
            debug!("handshake <- {endpoint} ({} bytes)", reply.len());
            response = Some(reply);
        }

        info!("session established ({})", scheme.version());
        Ok(Self {
            transport,
            kind,
            scheme,
            desynced: None,
        })
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn scheme_version(&self) -> SchemeVersion {
        self.scheme.version()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Encrypts `plaintext`, sends it to `endpoint` and decrypts the reply.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Transport`] when the link fails,
    /// [`ProvisionError::Crypto`] when the reply does not decrypt and
    /// [`ProvisionError::SessionDesynced`] for any call after a failed
    /// encrypted exchange.
    pub async fn exchange(
        &mut self,
        endpoint: &str,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, ProvisionError> {
        if let Some(failed) = &self.desynced {
            return Err(ProvisionError::SessionDesynced(failed.clone()));
        }
        let request = self.scheme.encrypt(plaintext)?;
        debug!("-> {endpoint} ({} bytes)", request.len());
        let reply = match self.transport.send(endpoint, &request).await {
            Ok(reply) => reply,
            Err(e) => {
                if self.scheme.version() != SchemeVersion::Plain {
                    warn!("{endpoint} failed after encryption; session is no longer usable");
                    self.desynced = Some(endpoint.to_string());
                }
                return Err(e.into());
            }
        };
        debug!("<- {endpoint} ({} bytes)", reply.len());
        Ok(self.scheme.decrypt(&reply)?)
    }

    /// `true` once a failed exchange has left the cipher state unknown.
    pub fn is_desynced(&self) -> bool {
        self.desynced.is_some()
    }

    /// Encodes `req`, exchanges it and decodes the reply as `Resp`.
    ///
    /// # Errors
    ///
    /// As [`SecureSession::exchange`], plus [`ProvisionError::Protocol`] when
    /// the reply is not a valid `Resp`.
    pub async fn request<Req, Resp>(
        &mut self,
        endpoint: &str,
        req: &Req,
    ) -> Result<Resp, ProvisionError>
    where
        Req: WireMessage,
        Resp: WireMessage,
    {
        let reply = self.exchange(endpoint, &encode(req)).await?;
        Ok(decode(&reply)?)
    }
}

impl std::fmt::Debug for SecureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureSession")
            .field("transport", &self.transport.kind())
            .field("kind", &self.kind)
            .field("scheme", &self.scheme)
            .finish()
    }
}

/// Probes, selects a scheme and establishes a session in one call.
///
/// Returns the session together with the capability document (absent when
/// the probe failed).
///
/// # Errors
///
/// [`ProvisionError::Capability`] is raised before any session bytes are
/// sent; handshake failures surface as [`ProvisionError::Handshake`].
pub async fn open_session(
    transport: Arc<dyn Transport>,
    kind: SessionKind,
    requested: Option<SchemeVersion>,
    credentials: &SecurityCredentials,
) -> Result<(SecureSession, Option<Capabilities>), ProvisionError> {
    let caps = probe(transport.as_ref(), kind).await;
    let scheme = build_scheme(requested, caps.as_ref(), credentials)?;
    let session = SecureSession::establish(transport, kind, scheme).await?;
    Ok((session, caps))
}

/// Applies the selection rules and builds a fresh scheme value.
///
/// # Errors
///
/// Returns [`ProvisionError::Capability`] when the credentials cannot
/// satisfy the chosen scheme.
pub fn build_scheme(
    requested: Option<SchemeVersion>,
    caps: Option<&Capabilities>,
    credentials: &SecurityCredentials,
) -> Result<SecurityScheme, ProvisionError> {
    let selection = select_scheme(requested, caps, credentials)?;
    Ok(match selection.version {
        SchemeVersion::Plain => SecurityScheme::plain(),
        SchemeVersion::KeyExchangePop => SecurityScheme::key_exchange_pop(selection.pop),
        SchemeVersion::MutualAuthPassword => SecurityScheme::mutual_auth_password(
            credentials.username.clone(),
            credentials.password.clone(),
            selection.sec_patch_ver,
        ),
    })
}
