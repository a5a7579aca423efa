//! Capability probe document and security-scheme selection.
//!
//! The `proto-ver` endpoint answers with JSON shaped like
//!
//! ```json
//! {
//!   "prov":         { "ver": "v1.1", "cap": ["wifi_scan", "no_pop"], "sec_ver": 1, "sec_patch_ver": 0 },
//!   "rmaker":       { "ver": "1.0", "cap": ["claim"] },
//!   "rmaker_extra": { "cap": ["ch_resp"] }
//! }
//! ```
//!
//! Every section is optional.  [`Capabilities::has`] looks at the union of
//! `prov.cap` and `rmaker_extra.cap`; `rmaker.cap` only feeds the claim
//! check.

use std::collections::BTreeSet;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::security::SchemeVersion;

pub const CAP_NO_SEC: &str = "no_sec";
pub const CAP_NO_POP: &str = "no_pop";
pub const CAP_WIFI_SCAN: &str = "wifi_scan";
pub const CAP_CH_RESP: &str = "ch_resp";
pub const CAP_CLAIM: &str = "claim";
pub const CAP_CAMERA_CLAIM: &str = "camera_claim";

/// Errors raised before any handshake bytes are sent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapabilityError {
    /// The probe response is not the expected JSON document.
    #[error("could not parse capability response: {0}")]
    Malformed(String),

    /// Scheme 1 without `no_pop` needs a proof of possession.
    #[error("proof of possession is required for sec1: device does not advertise 'no_pop'")]
    PopRequired,

    /// Scheme 2 needs both a username and a password.
    #[error("sec2 requires a username and a password")]
    CredentialsRequired,

    /// The requested scheme number is not 0, 1 or 2.
    #[error("unknown security scheme {0}")]
    UnknownScheme(u32),
}

#[derive(Debug, Default, Deserialize)]
struct Section {
    #[serde(default)]
    ver: Option<String>,
    #[serde(default)]
    cap: Vec<String>,
    #[serde(default)]
    sec_ver: Option<u32>,
    #[serde(default)]
    sec_patch_ver: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeDocument {
    #[serde(default)]
    prov: Option<Section>,
    #[serde(default)]
    rmaker: Option<Section>,
    #[serde(default)]
    rmaker_extra: Option<Section>,
}

/// Parsed capability probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub version: Option<String>,
    pub sec_ver: Option<u32>,
    pub sec_patch_ver: u32,
    prov: BTreeSet<String>,
    rmaker: BTreeSet<String>,
    extra: BTreeSet<String>,
}

impl Capabilities {
    /// Parses the raw probe response.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::Malformed`] when the bytes are not a JSON
    /// object.
    pub fn parse(raw: &[u8]) -> Result<Self, CapabilityError> {
        let doc: ProbeDocument =
            serde_json::from_slice(raw).map_err(|e| CapabilityError::Malformed(e.to_string()))?;
        let prov = doc.prov.unwrap_or_default();
        Ok(Self {
            version: prov.ver,
            sec_ver: prov.sec_ver,
            sec_patch_ver: prov.sec_patch_ver.unwrap_or(0),
            prov: prov.cap.into_iter().collect(),
            rmaker: doc.rmaker.unwrap_or_default().cap.into_iter().collect(),
            extra: doc.rmaker_extra.unwrap_or_default().cap.into_iter().collect(),
        })
    }

    /// Builds a set from literal provisioning capabilities.
    pub fn from_caps<I, S>(caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prov: caps.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// `true` if `cap` appears in `prov.cap` or `rmaker_extra.cap`.
    pub fn has(&self, cap: &str) -> bool {
        self.prov.contains(cap) || self.extra.contains(cap)
    }

    pub fn supports_challenge_response(&self) -> bool {
        self.extra.contains(CAP_CH_RESP)
    }

    /// `true` when the node must be claimed before it can be provisioned.
    pub fn requires_claim(&self) -> bool {
        self.rmaker.contains(CAP_CLAIM) || self.rmaker.contains(CAP_CAMERA_CLAIM)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.prov.union(&self.extra).map(String::as_str)
    }
}

// ── Scheme selection ──────────────────────────────────────────────────────────

/// Credentials supplied by the caller.
#[derive(Clone, Default)]
pub struct SecurityCredentials {
    pub pop: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SecurityCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityCredentials")
            .field("has_pop", &!self.pop.is_empty())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Outcome of [`select_scheme`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeSelection {
    pub version: SchemeVersion,
    /// PoP to use; empty for `no_pop` devices.
    pub pop: String,
    /// A caller PoP was discarded because the device advertises `no_pop`.
    pub pop_dropped: bool,
    pub sec_patch_ver: u32,
}

/// Chooses the security scheme for a session.
///
/// 1. An explicit `requested` scheme wins.
/// 2. Otherwise `no_sec` selects scheme 0 and anything else scheme 1.
///    Without a capability document scheme 1 is assumed.
/// 3. Scheme 1 needs a PoP unless `no_pop` is advertised; a PoP supplied to
///    a `no_pop` device is dropped with a warning.
/// 4. Scheme 2 needs a username and password.
///
/// # Errors
///
/// Returns [`CapabilityError::PopRequired`] or
/// [`CapabilityError::CredentialsRequired`] when the caller's credentials
/// cannot satisfy the chosen scheme.
pub fn select_scheme(
    requested: Option<SchemeVersion>,
    caps: Option<&Capabilities>,
    credentials: &SecurityCredentials,
) -> Result<SchemeSelection, CapabilityError> {
    let version = match (requested, caps) {
        (Some(v), _) => v,
        (None, Some(c)) if c.has(CAP_NO_SEC) => SchemeVersion::Plain,
        (None, _) => SchemeVersion::KeyExchangePop,
    };
    let no_pop = caps.is_some_and(|c| c.has(CAP_NO_POP));
    let mut selection = SchemeSelection {
        version,
        pop: String::new(),
        pop_dropped: false,
        sec_patch_ver: caps.map_or(0, |c| c.sec_patch_ver),
    };

    match version {
        SchemeVersion::Plain => {}
        SchemeVersion::KeyExchangePop if no_pop => {
            if !credentials.pop.is_empty() {
                warn!("proof of possession ignored: device advertises 'no_pop'");
                selection.pop_dropped = true;
            }
        }
        SchemeVersion::KeyExchangePop => {
            if credentials.pop.is_empty() {
                return Err(CapabilityError::PopRequired);
            }
            selection.pop = credentials.pop.clone();
        }
        SchemeVersion::MutualAuthPassword => {
            if credentials.username.is_empty() || credentials.password.is_empty() {
                return Err(CapabilityError::CredentialsRequired);
            }
        }
    }
    Ok(selection)
}

/// Converts a numeric scheme argument.
///
/// # Errors
///
/// Returns [`CapabilityError::UnknownScheme`] for values other than 0, 1, 2.
pub fn scheme_from_number(value: u32) -> Result<SchemeVersion, CapabilityError> {
    SchemeVersion::try_from(value).map_err(CapabilityError::UnknownScheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pop(value: &str) -> SecurityCredentials {
        SecurityCredentials {
            pop: value.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_full_document() {
        // Arrange
        let raw = br#"{"prov":{"ver":"v1.1","cap":["wifi_scan","no_pop"],"sec_ver":1,"sec_patch_ver":1},
                      "rmaker":{"ver":"1.0","cap":["claim"]},
                      "rmaker_extra":{"cap":["ch_resp"]}}"#;

        // Act
        let caps = Capabilities::parse(raw).unwrap();

        // Assert
        assert_eq!(caps.version.as_deref(), Some("v1.1"));
        assert_eq!(caps.sec_ver, Some(1));
        assert_eq!(caps.sec_patch_ver, 1);
        assert!(caps.has(CAP_WIFI_SCAN));
        assert!(caps.has(CAP_CH_RESP));
        assert!(!caps.has(CAP_CLAIM));
        assert!(caps.requires_claim());
        assert!(caps.supports_challenge_response());
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(matches!(
            Capabilities::parse(b"v1.0"),
            Err(CapabilityError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_empty_object_has_no_caps() {
        let caps = Capabilities::parse(b"{}").unwrap();
        assert_eq!(caps.iter().count(), 0);
        assert_eq!(caps.sec_patch_ver, 0);
    }

    #[test]
    fn test_no_sec_selects_plain() {
        let caps = Capabilities::from_caps(["no_sec"]);
        let selection = select_scheme(None, Some(&caps), &pop("")).unwrap();
        assert_eq!(selection.version, SchemeVersion::Plain);
    }

    #[test]
    fn test_default_is_key_exchange_pop() {
        let caps = Capabilities::from_caps(["wifi_scan"]);
        let selection = select_scheme(None, Some(&caps), &pop("abcd1234")).unwrap();
        assert_eq!(selection.version, SchemeVersion::KeyExchangePop);
        assert_eq!(selection.pop, "abcd1234");
    }

    #[test]
    fn test_missing_capabilities_default_to_pop_scheme() {
        let selection = select_scheme(None, None, &pop("abcd1234")).unwrap();
        assert_eq!(selection.version, SchemeVersion::KeyExchangePop);
    }

    #[test]
    fn test_explicit_scheme_overrides_no_sec() {
        let caps = Capabilities::from_caps(["no_sec"]);
        let selection =
            select_scheme(Some(SchemeVersion::KeyExchangePop), Some(&caps), &pop("p")).unwrap();
        assert_eq!(selection.version, SchemeVersion::KeyExchangePop);
    }

    #[test]
    fn test_empty_pop_without_no_pop_is_rejected() {
        let caps = Capabilities::from_caps(["wifi_scan"]);
        assert_eq!(
            select_scheme(None, Some(&caps), &pop("")),
            Err(CapabilityError::PopRequired)
        );
    }

    #[test]
    fn test_no_pop_drops_supplied_pop() {
        // Arrange
        let caps = Capabilities::from_caps(["no_pop"]);

        // Act
        let selection = select_scheme(None, Some(&caps), &pop("abcd1234")).unwrap();

        // Assert
        assert!(selection.pop.is_empty());
        assert!(selection.pop_dropped);
    }

    #[test]
    fn test_password_scheme_needs_both_credentials() {
        let creds = SecurityCredentials {
            username: "wifiprov".into(),
            ..Default::default()
        };
        assert_eq!(
            select_scheme(Some(SchemeVersion::MutualAuthPassword), None, &creds),
            Err(CapabilityError::CredentialsRequired)
        );
    }

    #[test]
    fn test_scheme_from_number_rejects_unknown() {
        assert_eq!(scheme_from_number(3), Err(CapabilityError::UnknownScheme(3)));
    }
}
