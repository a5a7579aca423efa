//! Addressing information for one target device.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

/// Port used by provisioning-mode HTTP servers.
pub const DEFAULT_HTTP_PORT: u16 = 80;
/// Port used by on-network local control.
pub const DEFAULT_LOCAL_CTRL_PORT: u16 = 8080;
/// Address of a device running the provisioning soft access point.
pub const SOFTAP_HOST: &str = "192.168.4.1";

/// Scheme hint assumed when discovery does not advertise one.
const DEFAULT_SECURITY_HINT: u32 = 1;

/// How the device is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceTarget {
    /// HTTP on an IP address or host name.
    Network { host: String, port: u16 },
    /// BLE, identified by the advertised device name (e.g. `PROV_d76c30`).
    Ble { name: String },
    /// Serial console, identified by the port path.
    Serial { path: String },
}

/// Everything the engine needs to know about a device before connecting.
///
/// Built either by hand or from mDNS TXT records with
/// [`DeviceInfo::from_txt_records`].  Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub target: DeviceTarget,
    pub node_id: Option<String>,
    /// Scheme advertised by discovery; the capability probe takes precedence.
    pub security_hint: u32,
    pub pop_required: bool,
    pub properties: BTreeMap<String, String>,
}

impl DeviceInfo {
    /// A device reached over HTTP.
    pub fn network(host: impl Into<String>, port: u16) -> Self {
        Self::with_target(DeviceTarget::Network {
            host: host.into(),
            port,
        })
    }

    /// The default soft access point target (`192.168.4.1:80`).
    pub fn softap() -> Self {
        Self::network(SOFTAP_HOST, DEFAULT_HTTP_PORT)
    }

    pub fn ble(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut info = Self::with_target(DeviceTarget::Ble { name: name.clone() });
        info.name = name;
        info
    }

    pub fn serial(path: impl Into<String>) -> Self {
        Self::with_target(DeviceTarget::Serial { path: path.into() })
    }

    /// An on-network node addressed by node id or `<node>.local` name.
    ///
    /// A bare node id gets the `.local` suffix; the port defaults to 8080.
    pub fn local_node(node: &str, port: Option<u16>) -> Self {
        let host = if node.ends_with(".local") {
            node.to_string()
        } else {
            format!("{node}.local")
        };
        let mut info = Self::network(host, port.unwrap_or(DEFAULT_LOCAL_CTRL_PORT));
        info.node_id = Some(node.trim_end_matches(".local").to_string());
        info
    }

    /// Builds a device from a resolved mDNS service.
    ///
    /// Recognized TXT keys: `node_id`, `sec_version` (default 1, also when
    /// unparsable) and `pop_required` (case-insensitive `"true"`).
    pub fn from_txt_records(
        name: impl Into<String>,
        host: impl Into<String>,
        port: Option<u16>,
        properties: BTreeMap<String, String>,
    ) -> Self {
        let security_hint = properties
            .get("sec_version")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_SECURITY_HINT);
        let pop_required = properties
            .get("pop_required")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        Self {
            name: name.into(),
            target: DeviceTarget::Network {
                host: host.into(),
                port: port.unwrap_or(DEFAULT_HTTP_PORT),
            },
            node_id: properties.get("node_id").cloned(),
            security_hint,
            pop_required,
            properties,
        }
    }

    fn with_target(target: DeviceTarget) -> Self {
        Self {
            name: String::new(),
            target,
            node_id: None,
            security_hint: DEFAULT_SECURITY_HINT,
            pop_required: false,
            properties: BTreeMap::new(),
        }
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceTarget::Network { host, port } => f.write_str(&http_authority(host, *port)),
            DeviceTarget::Ble { name } => write!(f, "ble:{name}"),
            DeviceTarget::Serial { path } => write!(f, "serial:{path}"),
        }
    }
}

/// Formats `host:port`, bracketing IPv6 literals.
///
/// # Examples
///
/// ```rust
/// use rmaker_core::domain::device::http_authority;
///
/// assert_eq!(http_authority("192.168.4.1", 80), "192.168.4.1:80");
/// assert_eq!(http_authority("fe80::1", 8080), "[fe80::1]:8080");
/// ```
pub fn http_authority(host: &str, port: u16) -> String {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    match bare.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => format!("[{bare}]:{port}"),
        _ => format!("{host}:{port}"),
    }
}
