//! Wi-Fi scan, credential hand-off, status polling and prov-ctrl commands.
//!
//! All frames travel encrypted over an established [`SecureSession`].
//!
//! # Scan exchange
//!
//! ```text
//! scan-start {blocking, group_channels, period_ms}   ─► prov-scan
//! scan-status                                         ─► result_count
//! scan-result {start_index, count} (repeat per page) ─► entries
//! ```

use std::time::Duration;

use rmaker_core::domain::wifi::{ConnectionStatus, WifiAccessPoint};
use rmaker_core::protocol::codec::{
    expect_msg_type, expect_success, require_payload, ProtocolError,
};
use rmaker_core::protocol::endpoints::{PROV_CONFIG, PROV_CTRL, PROV_SCAN};
use rmaker_core::protocol::messages::{
    wi_fi_config_payload, wi_fi_ctrl_payload, wi_fi_scan_payload, CmdApplyConfig, CmdCtrlReprov,
    CmdCtrlReset, CmdGetStatus, CmdScanResult, CmdScanStart, CmdScanStatus, CmdSetConfig,
    WiFiConfigMsgType, WiFiConfigPayload, WiFiCtrlMsgType, WiFiCtrlPayload, WiFiScanMsgType,
    WiFiScanPayload,
};
use tracing::{debug, info};

use crate::application::session::SecureSession;
use crate::application::transport::TransportKind;
use crate::application::ProvisionError;

/// Interval between status polls used by the provisioning flow.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

const BLE_PAGE_SIZE: u32 = 4;
const DEFAULT_PAGE_SIZE: u32 = 100;
const SOFTAP_GROUP_CHANNELS: u32 = 5;
const SCAN_PERIOD_MS: u32 = 120;

/// Network credentials handed to the device.
#[derive(Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: String,
    pub passphrase: String,
}

impl std::fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .finish_non_exhaustive()
    }
}

// ── Scan ──────────────────────────────────────────────────────────────────────

/// Parameters of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub blocking: bool,
    pub passive: bool,
    /// Channels scanned between returns to the home channel; non-zero keeps
    /// the soft access point responsive while scanning.
    pub group_channels: u32,
    pub period_ms: u32,
    /// Results requested per `scan-result` frame.
    pub page_size: u32,
}

impl ScanOptions {
    /// Defaults suited to the link in use.
    pub fn for_transport(kind: TransportKind) -> Self {
        Self {
            blocking: true,
            passive: false,
            group_channels: if kind == TransportKind::Http {
                SOFTAP_GROUP_CHANNELS
            } else {
                0
            },
            period_ms: SCAN_PERIOD_MS,
            page_size: if kind == TransportKind::Ble {
                BLE_PAGE_SIZE
            } else {
                DEFAULT_PAGE_SIZE
            },
        }
    }
}

/// Asks the device to scan and returns every network it found.
///
/// # Errors
///
/// Returns [`ProvisionError::Protocol`] when the device answers with a
/// non-success status, an unexpected frame, or a page shorter than asked
/// for.
pub async fn scan(
    session: &mut SecureSession,
    options: ScanOptions,
) -> Result<Vec<WifiAccessPoint>, ProvisionError> {
    info!("scanning for Wi-Fi networks");
    scan_exchange(
        session,
        WiFiScanMsgType::TypeCmdScanStart,
        wi_fi_scan_payload::Payload::CmdScanStart(CmdScanStart {
            blocking: options.blocking,
            passive: options.passive,
            group_channels: options.group_channels,
            period_ms: options.period_ms,
        }),
        WiFiScanMsgType::TypeRespScanStart,
    )
    .await?;

    let status = scan_exchange(
        session,
        WiFiScanMsgType::TypeCmdScanStatus,
        wi_fi_scan_payload::Payload::CmdScanStatus(CmdScanStatus {}),
        WiFiScanMsgType::TypeRespScanStatus,
    )
    .await?;
    let total = match require_payload::<WiFiScanPayload, _>(status.payload)? {
        wi_fi_scan_payload::Payload::RespScanStatus(s) => s.result_count,
        _ => return Err(unexpected_scan_payload().into()),
    };
    debug!("scan finished with {total} results");

    let page = options.page_size.max(1);
    let mut networks = Vec::new();
    let mut index = 0;
    while index < total {
        let count = page.min(total - index);
        let reply = scan_exchange(
            session,
            WiFiScanMsgType::TypeCmdScanResult,
            wi_fi_scan_payload::Payload::CmdScanResult(CmdScanResult {
                start_index: index,
                count,
            }),
            WiFiScanMsgType::TypeRespScanResult,
        )
        .await?;
        match require_payload::<WiFiScanPayload, _>(reply.payload)? {
            wi_fi_scan_payload::Payload::RespScanResult(r) => {
                if r.entries.len() < count as usize {
                    return Err(ProtocolError::Malformed {
                        message: "wifi-scan",
                        reason: format!(
                            "asked for {count} results at index {index}, got {}",
                            r.entries.len()
                        ),
                    }
                    .into());
                }
                networks.extend(r.entries.iter().take(count as usize).map(WifiAccessPoint::from));
            }
            _ => return Err(unexpected_scan_payload().into()),
        }
        index += count;
    }
    Ok(networks)
}

async fn scan_exchange(
    session: &mut SecureSession,
    msg: WiFiScanMsgType,
    payload: wi_fi_scan_payload::Payload,
    expected: WiFiScanMsgType,
) -> Result<WiFiScanPayload, ProvisionError> {
    let request = WiFiScanPayload {
        msg: msg as i32,
        status: 0,
        payload: Some(payload),
    };
    let reply: WiFiScanPayload = session.request(PROV_SCAN, &request).await?;
    expect_msg_type::<WiFiScanPayload>(reply.msg, expected as i32)?;
    expect_success::<WiFiScanPayload>(reply.status)?;
    Ok(reply)
}

fn unexpected_scan_payload() -> ProtocolError {
    ProtocolError::Malformed {
        message: "wifi-scan",
        reason: "payload does not match message type".into(),
    }
}

// ── Config ────────────────────────────────────────────────────────────────────

/// Sends the station credentials.
///
/// # Errors
///
/// Returns [`ProvisionError::Protocol`] when the device rejects them.
pub async fn set_config(
    session: &mut SecureSession,
    credentials: &WifiCredentials,
) -> Result<(), ProvisionError> {
    info!("sending Wi-Fi credentials for '{}'", credentials.ssid);
    let reply = config_exchange(
        session,
        WiFiConfigMsgType::TypeCmdSetConfig,
        wi_fi_config_payload::Payload::CmdSetConfig(CmdSetConfig {
            ssid: credentials.ssid.as_bytes().to_vec(),
            passphrase: credentials.passphrase.as_bytes().to_vec(),
            bssid: Vec::new(),
            channel: 0,
        }),
        WiFiConfigMsgType::TypeRespSetConfig,
    )
    .await?;
    match require_payload::<WiFiConfigPayload, _>(reply.payload)? {
        wi_fi_config_payload::Payload::RespSetConfig(r) => {
            Ok(expect_success::<WiFiConfigPayload>(r.status)?)
        }
        _ => Err(unexpected_config_payload().into()),
    }
}

/// Tells the device to join the network it was given.
///
/// # Errors
///
/// Returns [`ProvisionError::Protocol`] when the device refuses.
pub async fn apply_config(session: &mut SecureSession) -> Result<(), ProvisionError> {
    info!("applying Wi-Fi configuration");
    let reply = config_exchange(
        session,
        WiFiConfigMsgType::TypeCmdApplyConfig,
        wi_fi_config_payload::Payload::CmdApplyConfig(CmdApplyConfig {}),
        WiFiConfigMsgType::TypeRespApplyConfig,
    )
    .await?;
    match require_payload::<WiFiConfigPayload, _>(reply.payload)? {
        wi_fi_config_payload::Payload::RespApplyConfig(r) => {
            Ok(expect_success::<WiFiConfigPayload>(r.status)?)
        }
        _ => Err(unexpected_config_payload().into()),
    }
}

/// Reads the station state once.
///
/// # Errors
///
/// Returns [`ProvisionError::Protocol`] for a failed or malformed reply.
pub async fn get_status(session: &mut SecureSession) -> Result<ConnectionStatus, ProvisionError> {
    let reply = config_exchange(
        session,
        WiFiConfigMsgType::TypeCmdGetStatus,
        wi_fi_config_payload::Payload::CmdGetStatus(CmdGetStatus {}),
        WiFiConfigMsgType::TypeRespGetStatus,
    )
    .await?;
    match require_payload::<WiFiConfigPayload, _>(reply.payload)? {
        wi_fi_config_payload::Payload::RespGetStatus(r) => {
            expect_success::<WiFiConfigPayload>(r.status)?;
            Ok(ConnectionStatus::from_response(&r))
        }
        _ => Err(unexpected_config_payload().into()),
    }
}

async fn config_exchange(
    session: &mut SecureSession,
    msg: WiFiConfigMsgType,
    payload: wi_fi_config_payload::Payload,
    expected: WiFiConfigMsgType,
) -> Result<WiFiConfigPayload, ProvisionError> {
    let request = WiFiConfigPayload {
        msg: msg as i32,
        payload: Some(payload),
    };
    let reply: WiFiConfigPayload = session.request(PROV_CONFIG, &request).await?;
    expect_msg_type::<WiFiConfigPayload>(reply.msg, expected as i32)?;
    Ok(reply)
}

fn unexpected_config_payload() -> ProtocolError {
    ProtocolError::Malformed {
        message: "wifi-config",
        reason: "payload does not match message type".into(),
    }
}

// ── Polling ───────────────────────────────────────────────────────────────────

/// Repeats `get_status` until the station leaves `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPoller {
    pub interval: Duration,
    /// Overall limit; `None` polls for as long as the device keeps
    /// reporting `Connecting`.
    pub deadline: Option<Duration>,
}

impl Default for StatusPoller {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            deadline: None,
        }
    }
}

impl StatusPoller {
    /// Sleeps one interval before every poll and returns the first terminal
    /// status together with the number of polls it took.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Deadline`] if the deadline passes first, or
    /// whatever `get_status` fails with.
    pub async fn poll_until_terminal(
        &self,
        session: &mut SecureSession,
    ) -> Result<(ConnectionStatus, u32), ProvisionError> {
        match self.deadline {
            Some(limit) => tokio::time::timeout(limit, self.poll(session))
                .await
                .map_err(|_| ProvisionError::Deadline)?,
            None => self.poll(session).await,
        }
    }

    async fn poll(
        &self,
        session: &mut SecureSession,
    ) -> Result<(ConnectionStatus, u32), ProvisionError> {
        let mut polls = 0;
        loop {
            tokio::time::sleep(self.interval).await;
            let status = get_status(session).await?;
            polls += 1;
            match &status {
                ConnectionStatus::Connecting { attempts_remaining } => {
                    debug!("still connecting (attempts remaining: {attempts_remaining:?})");
                }
                terminal => {
                    info!("Wi-Fi status after {polls} polls: {terminal}");
                    return Ok((status, polls));
                }
            }
        }
    }
}

// ── Control ───────────────────────────────────────────────────────────────────

/// Resets the device's Wi-Fi state machine after a failed attempt.
///
/// # Errors
///
/// Returns [`ProvisionError::Protocol`] unless the device acknowledges with
/// the matching response and status 0.
pub async fn reset(session: &mut SecureSession) -> Result<(), ProvisionError> {
    info!("resetting Wi-Fi state on device");
    ctrl_exchange(
        session,
        WiFiCtrlMsgType::TypeCmdCtrlReset,
        wi_fi_ctrl_payload::Payload::CmdCtrlReset(CmdCtrlReset {}),
        WiFiCtrlMsgType::TypeRespCtrlReset,
    )
    .await
}

/// Puts an already-provisioned device back into provisioning.
///
/// # Errors
///
/// As [`reset`].
pub async fn reprovision(session: &mut SecureSession) -> Result<(), ProvisionError> {
    info!("requesting re-provisioning");
    ctrl_exchange(
        session,
        WiFiCtrlMsgType::TypeCmdCtrlReprov,
        wi_fi_ctrl_payload::Payload::CmdCtrlReprov(CmdCtrlReprov {}),
        WiFiCtrlMsgType::TypeRespCtrlReprov,
    )
    .await
}

async fn ctrl_exchange(
    session: &mut SecureSession,
    msg: WiFiCtrlMsgType,
    payload: wi_fi_ctrl_payload::Payload,
    expected: WiFiCtrlMsgType,
) -> Result<(), ProvisionError> {
    let request = WiFiCtrlPayload {
        msg: msg as i32,
        status: 0,
        payload: Some(payload),
    };
    let reply: WiFiCtrlPayload = session.request(PROV_CTRL, &request).await?;
    expect_msg_type::<WiFiCtrlPayload>(reply.msg, expected as i32)?;
    expect_success::<WiFiCtrlPayload>(reply.status)?;
    Ok(())
}
