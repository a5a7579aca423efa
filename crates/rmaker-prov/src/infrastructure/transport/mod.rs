//! Concrete [`Transport`] implementations.
//!
//! | Module   | Link                                   | Availability        |
//! |----------|----------------------------------------|---------------------|
//! | `http`   | HTTP POST per endpoint (soft AP, LAN)  | always              |
//! | `serial` | hex lines over a console UART          | always              |
//! | `ble`    | GATT write + read per endpoint         | `ble` cargo feature |
//! | `mock`   | in-memory scripted device              | always (tests)      |
//!
//! [`connect`] picks one from a [`DeviceInfo`] target.

#[cfg(feature = "ble")]
pub mod ble;
pub mod http;
pub mod mock;
pub mod serial;

use std::sync::Arc;
use std::time::Duration;

use rmaker_core::domain::device::http_authority;
use rmaker_core::{DeviceInfo, DeviceTarget, SessionKind};
use tracing::{debug, info};

use crate::application::transport::{Transport, TransportError};
#[cfg(not(feature = "ble"))]
use crate::application::transport::TransportKind;

/// Timeouts and retry limits for every link type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub http_timeout: Duration,
    pub serial_timeout: Duration,
    pub serial_retries: u32,
    pub ble_timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(5),
            serial_timeout: Duration::from_secs(3),
            serial_retries: 3,
            ble_timeout: Duration::from_secs(30),
        }
    }
}

/// Opens a link to `device`.
///
/// Network host names are resolved here, so an unknown host fails before
/// any handshake byte is sent.  `kind` selects the GATT service on BLE.
///
/// # Errors
///
/// Returns [`TransportError::Resolve`] for an unresolvable host,
/// [`TransportError::Connect`] when the link cannot be opened and
/// [`TransportError::Unsupported`] for BLE in a build without the feature.
pub async fn connect(
    device: &DeviceInfo,
    kind: SessionKind,
    settings: &TransportSettings,
) -> Result<Arc<dyn Transport>, TransportError> {
    info!("connecting to {}", device.target);
    match &device.target {
        DeviceTarget::Network { host, port } => {
            let authority = resolve(host, *port).await?;
            let transport = http::HttpTransport::new(authority, settings.http_timeout)?;
            Ok(Arc::new(transport))
        }
        DeviceTarget::Serial { path } => {
            let transport = serial::SerialTransport::open(
                path,
                settings.serial_timeout,
                settings.serial_retries,
            )
            .await?;
            Ok(Arc::new(transport))
        }
        #[cfg(feature = "ble")]
        DeviceTarget::Ble { name } => {
            let transport = ble::BleTransport::connect(name, kind, settings.ble_timeout).await?;
            Ok(Arc::new(transport))
        }
        #[cfg(not(feature = "ble"))]
        DeviceTarget::Ble { .. } => {
            let _ = kind;
            Err(TransportError::Unsupported(TransportKind::Ble))
        }
    }
}

/// Resolves `host` and returns the `host:port` authority to use.
///
/// The original host name is kept in the authority (so the `Host` header
/// matches what the user typed); resolution only proves it exists.
async fn resolve(host: &str, port: u16) -> Result<String, TransportError> {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    let mut addrs = tokio::net::lookup_host((bare, port))
        .await
        .map_err(|e| TransportError::Resolve {
            host: host.to_string(),
            reason: e.to_string(),
        })?;
    let first = addrs.next().ok_or_else(|| TransportError::Resolve {
        host: host.to_string(),
        reason: "no addresses returned".into(),
    })?;
    debug!("{host} resolved to {}", first.ip());
    Ok(http_authority(host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_ip_literal_keeps_authority() {
        assert_eq!(resolve("127.0.0.1", 80).await.unwrap(), "127.0.0.1:80");
        assert_eq!(resolve("::1", 8080).await.unwrap(), "[::1]:8080");
    }

    #[tokio::test]
    async fn test_unresolvable_host_fails_before_connecting() {
        // Arrange
        let device = DeviceInfo::network("no-such-node.invalid", 80);

        // Act
        let result = connect(
            &device,
            SessionKind::Provisioning,
            &TransportSettings::default(),
        )
        .await;

        // Assert
        assert!(matches!(result, Err(TransportError::Resolve { .. })));
    }

    #[cfg(not(feature = "ble"))]
    #[tokio::test]
    async fn test_ble_without_feature_is_unsupported() {
        let result = connect(
            &DeviceInfo::ble("PROV_d76c30"),
            SessionKind::Provisioning,
            &TransportSettings::default(),
        )
        .await;

        assert!(matches!(
            result,
            Err(TransportError::Unsupported(TransportKind::Ble))
        ));
    }

    #[tokio::test]
    async fn test_missing_serial_device_is_connect_error() {
        let result = connect(
            &DeviceInfo::serial("/nonexistent/ttyUSB9"),
            SessionKind::Provisioning,
            &TransportSettings::default(),
        )
        .await;

        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn test_default_settings() {
        let settings = TransportSettings::default();
        assert_eq!(settings.http_timeout, Duration::from_secs(5));
        assert_eq!(settings.serial_retries, 3);
        assert_eq!(settings.ble_timeout, Duration::from_secs(30));
    }
}
