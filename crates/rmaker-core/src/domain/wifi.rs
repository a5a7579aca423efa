//! Wi-Fi networks reported by a scan and the station connection state.

use std::fmt;

use serde::Serialize;

use crate::protocol::messages::{
    resp_get_status, RespGetStatus, WiFiScanResult, WifiAuthMode, WifiConnectFailedReason,
    WifiStationState,
};

/// Security of an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AuthMode {
    Open,
    Wep,
    WpaPsk,
    Wpa2Psk,
    WpaWpa2Psk,
    Wpa2Enterprise,
    Wpa3Psk,
    Wpa2Wpa3Psk,
    Unknown(i32),
}

impl AuthMode {
    pub fn from_wire(value: i32) -> Self {
        match WifiAuthMode::try_from(value) {
            Ok(WifiAuthMode::Open) => Self::Open,
            Ok(WifiAuthMode::Wep) => Self::Wep,
            Ok(WifiAuthMode::WpaPsk) => Self::WpaPsk,
            Ok(WifiAuthMode::Wpa2Psk) => Self::Wpa2Psk,
            Ok(WifiAuthMode::WpaWpa2Psk) => Self::WpaWpa2Psk,
            Ok(WifiAuthMode::Wpa2Enterprise) => Self::Wpa2Enterprise,
            Ok(WifiAuthMode::Wpa3Psk) => Self::Wpa3Psk,
            Ok(WifiAuthMode::Wpa2Wpa3Psk) => Self::Wpa2Wpa3Psk,
            Err(_) => Self::Unknown(value),
        }
    }

    /// `false` for open networks, which need no passphrase.
    pub fn needs_passphrase(self) -> bool {
        self != Self::Open
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("Open"),
            Self::Wep => f.write_str("WEP"),
            Self::WpaPsk => f.write_str("WPA_PSK"),
            Self::Wpa2Psk => f.write_str("WPA2_PSK"),
            Self::WpaWpa2Psk => f.write_str("WPA_WPA2_PSK"),
            Self::Wpa2Enterprise => f.write_str("WPA2_ENTERPRISE"),
            Self::Wpa3Psk => f.write_str("WPA3_PSK"),
            Self::Wpa2Wpa3Psk => f.write_str("WPA2_WPA3_PSK"),
            Self::Unknown(v) => write!(f, "UNKNOWN({v})"),
        }
    }
}

/// One network found by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WifiAccessPoint {
    pub ssid: String,
    /// Lower-case hex, no separators.
    pub bssid: String,
    pub channel: u32,
    pub rssi: i32,
    pub auth: AuthMode,
}

impl From<&WiFiScanResult> for WifiAccessPoint {
    fn from(entry: &WiFiScanResult) -> Self {
        Self {
            ssid: String::from_utf8_lossy(&entry.ssid).into_owned(),
            bssid: entry.bssid.iter().map(|b| format!("{b:02x}")).collect(),
            channel: entry.channel,
            rssi: entry.rssi,
            auth: AuthMode::from_wire(entry.auth),
        }
    }
}

/// Why the station gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    /// Wrong passphrase.
    AuthError,
    /// SSID not found.
    NetworkNotFound,
    Unknown,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthError => f.write_str("incorrect password"),
            Self::NetworkNotFound => f.write_str("incorrect SSID"),
            Self::Unknown => f.write_str("unknown reason"),
        }
    }
}

/// Station state reported by `prov-config` get-status.
///
/// `Connecting` is the only non-terminal value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting { attempts_remaining: Option<u32> },
    Connected { ip: String },
    Disconnected,
    Failed(FailReason),
    Unknown,
}

impl ConnectionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Connecting { .. })
    }

    pub fn from_response(resp: &RespGetStatus) -> Self {
        match WifiStationState::try_from(resp.sta_state) {
            Ok(WifiStationState::Connected) => Self::Connected {
                ip: match &resp.state {
                    Some(resp_get_status::State::Connected(c)) => c.ip4_addr.clone(),
                    _ => String::new(),
                },
            },
            Ok(WifiStationState::Connecting) => Self::Connecting {
                attempts_remaining: match &resp.state {
                    Some(resp_get_status::State::AttemptFailed(a)) => Some(a.attempts_remaining),
                    _ => None,
                },
            },
            Ok(WifiStationState::Disconnected) => Self::Disconnected,
            Ok(WifiStationState::ConnectionFailed) => Self::Failed(match &resp.state {
                Some(resp_get_status::State::FailReason(r)) => {
                    match WifiConnectFailedReason::try_from(*r) {
                        Ok(WifiConnectFailedReason::AuthError) => FailReason::AuthError,
                        Ok(WifiConnectFailedReason::NetworkNotFound) => FailReason::NetworkNotFound,
                        Err(_) => FailReason::Unknown,
                    }
                }
                _ => FailReason::Unknown,
            }),
            Err(_) => Self::Unknown,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting { .. } => f.write_str("connecting"),
            Self::Connected { ip } => write!(f, "connected ({ip})"),
            Self::Disconnected => f.write_str("disconnected"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{WifiAttemptFailed, WifiConnectedState};

    #[test]
    fn test_access_point_from_scan_entry() {
        let entry = WiFiScanResult {
            ssid: b"home".to_vec(),
            channel: 6,
            rssi: -40,
            bssid: vec![0xaa, 0xbb, 0xcc, 0x00, 0x11, 0x22],
            auth: WifiAuthMode::Wpa2Psk as i32,
        };

        let ap = WifiAccessPoint::from(&entry);

        assert_eq!(ap.ssid, "home");
        assert_eq!(ap.bssid, "aabbcc001122");
        assert_eq!(ap.auth, AuthMode::Wpa2Psk);
        assert!(ap.auth.needs_passphrase());
    }

    #[test]
    fn test_status_connected_carries_ip() {
        let resp = RespGetStatus {
            status: 0,
            sta_state: WifiStationState::Connected as i32,
            state: Some(resp_get_status::State::Connected(WifiConnectedState {
                ip4_addr: "192.168.1.20".into(),
                ..Default::default()
            })),
        };
        let status = ConnectionStatus::from_response(&resp);
        assert_eq!(
            status,
            ConnectionStatus::Connected {
                ip: "192.168.1.20".into()
            }
        );
        assert!(status.is_terminal());
    }

    #[test]
    fn test_status_failed_maps_reason() {
        let resp = RespGetStatus {
            status: 0,
            sta_state: WifiStationState::ConnectionFailed as i32,
            state: Some(resp_get_status::State::FailReason(
                WifiConnectFailedReason::NetworkNotFound as i32,
            )),
        };
        assert_eq!(
            ConnectionStatus::from_response(&resp),
            ConnectionStatus::Failed(FailReason::NetworkNotFound)
        );
    }

    #[test]
    fn test_status_connecting_is_not_terminal() {
        let resp = RespGetStatus {
            status: 0,
            sta_state: WifiStationState::Connecting as i32,
            state: Some(resp_get_status::State::AttemptFailed(WifiAttemptFailed {
                attempts_remaining: 3,
            })),
        };
        let status = ConnectionStatus::from_response(&resp);
        assert_eq!(
            status,
            ConnectionStatus::Connecting {
                attempts_remaining: Some(3)
            }
        );
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_unknown_station_state() {
        let resp = RespGetStatus {
            status: 0,
            sta_state: 42,
            state: None,
        };
        assert_eq!(ConnectionStatus::from_response(&resp), ConnectionStatus::Unknown);
    }
}
