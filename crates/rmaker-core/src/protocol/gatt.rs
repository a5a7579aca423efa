//! BLE GATT layout: which characteristic carries which logical endpoint.
//!
//! The device exposes one primary service.  Each endpoint is a
//! characteristic whose *user description* descriptor (`0x2901`) holds the
//! endpoint name.  Older firmware omits the descriptors, in which case the
//! characteristic UUID is derived from the service UUID by splicing a 16-bit
//! endpoint id into bytes 2..4:
//!
//! ```text
//! service   0000ffff-0000-1000-8000-00805f9b34fb
//! id        ff51
//! result    0000ff51-0000-1000-8000-00805f9b34fb
//! ```
//!
//! Resolution is pure so it can be tested without a radio; the BLE transport
//! feeds it whatever the adapter discovered.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::protocol::endpoints;

/// Primary service advertised while in provisioning mode.
pub const PROV_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000ffff_0000_1000_8000_00805f9b34fb);

/// Primary service advertised by on-network local control over BLE.
pub const LOCAL_CTRL_SERVICE_UUID: Uuid = Uuid::from_u128(0x3d981e4a_31eb_42b4_8a68_75bd8d3bd521);

/// UUID of the characteristic user description descriptor.
pub const USER_DESCRIPTION_DESCRIPTOR: Uuid =
    Uuid::from_u128(0x00002901_0000_1000_8000_00805f9b34fb);

/// Maximum number of available characteristics listed in a resolution error.
const MAX_LISTED_CHARACTERISTICS: usize = 10;

/// Endpoint ids used when the provisioning service lacks descriptors.
pub const PROV_ENDPOINT_IDS: &[(&str, u16)] = &[
    (endpoints::PROV_SESSION, 0xff51),
    (endpoints::PROV_CONFIG, 0xff52),
    (endpoints::PROTO_VER, 0xff53),
    (endpoints::GET_PARAMS, 0xff54),
    (endpoints::SET_PARAMS, 0xff55),
    (endpoints::GET_CONFIG, 0xff56),
];

/// Endpoint ids used by the local-control service.
pub const LOCAL_CTRL_ENDPOINT_IDS: &[(&str, u16)] = &[
    (endpoints::LOCAL_CTRL_VERSION, 0x0001),
    (endpoints::LOCAL_CTRL_SESSION, 0x0002),
    (endpoints::LOCAL_CTRL_CONTROL, 0x0003),
];

/// One characteristic reported by the adapter during service discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCharacteristic {
    pub uuid: Uuid,
    /// Contents of the `0x2901` descriptor, if present and UTF-8.
    pub description: Option<String>,
}

/// Required endpoints that neither discovery method could locate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct EndpointResolutionError {
    pub missing: Vec<String>,
    pub available: Vec<String>,
}

impl fmt::Display for EndpointResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Endpoints not found: {}", self.missing.join(", "))?;
        write!(
            f,
            "\n\nAuto-discovery via user descriptors (UUID 2901) failed.\n\
             Fallback UUID calculation also failed."
        )?;
        if !self.available.is_empty() {
            write!(
                f,
                "\n\nAvailable characteristics: {}",
                self.available.join(", ")
            )?;
        }
        write!(
            f,
            "\n\nPossible causes:\n\
             1. Endpoints not registered when provisioning started\n\
             2. Endpoints registered but missing user descriptors\n\
             3. Device not in provisioning mode"
        )
    }
}

/// Derives the fallback characteristic UUID for `endpoint_id`.
///
/// # Examples
///
/// ```rust
/// use rmaker_core::protocol::gatt::{fallback_characteristic_uuid, PROV_SERVICE_UUID};
///
/// let uuid = fallback_characteristic_uuid(PROV_SERVICE_UUID, 0xff51);
/// assert_eq!(uuid.to_string(), "0000ff51-0000-1000-8000-00805f9b34fb");
/// ```
pub fn fallback_characteristic_uuid(service: Uuid, endpoint_id: u16) -> Uuid {
    let mut bytes = *service.as_bytes();
    let id = endpoint_id.to_be_bytes();
    bytes[2] = id[0];
    bytes[3] = id[1];
    Uuid::from_bytes(bytes)
}

/// Maps each required endpoint name to a characteristic UUID.
///
/// A characteristic whose user description equals the endpoint name wins;
/// otherwise the derived fallback UUID is accepted if the device exposes it.
/// Names present in descriptors but not in `required` are also returned so
/// optional endpoints (e.g. `ch_resp`) can be reached.
///
/// # Errors
///
/// Returns [`EndpointResolutionError`] listing every required endpoint that
/// could not be located, together with up to ten available characteristics.
pub fn resolve_endpoints(
    service: Uuid,
    required: &[(&str, u16)],
    discovered: &[DiscoveredCharacteristic],
) -> Result<HashMap<String, Uuid>, EndpointResolutionError> {
    let mut lookup: HashMap<String, Uuid> = discovered
        .iter()
        .filter_map(|c| {
            c.description
                .as_ref()
                .map(|d| (d.trim_end_matches('\0').to_string(), c.uuid))
        })
        .collect();

    let mut missing = Vec::new();
    for (name, id) in required {
        if lookup.contains_key(*name) {
            continue;
        }
        let candidate = fallback_characteristic_uuid(service, *id);
        if discovered.iter().any(|c| c.uuid == candidate) {
            lookup.insert((*name).to_string(), candidate);
        } else {
            missing.push((*name).to_string());
        }
    }

    if missing.is_empty() {
        Ok(lookup)
    } else {
        Err(EndpointResolutionError {
            missing,
            available: discovered
                .iter()
                .take(MAX_LISTED_CHARACTERISTICS)
                .map(|c| c.uuid.to_string())
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn described(uuid: u128, name: &str) -> DiscoveredCharacteristic {
        DiscoveredCharacteristic {
            uuid: Uuid::from_u128(uuid),
            description: Some(name.to_string()),
        }
    }

    fn bare(uuid: Uuid) -> DiscoveredCharacteristic {
        DiscoveredCharacteristic {
            uuid,
            description: None,
        }
    }

    #[test]
    fn test_fallback_uuid_for_local_ctrl_service() {
        let uuid = fallback_characteristic_uuid(LOCAL_CTRL_SERVICE_UUID, 0x0002);
        assert_eq!(uuid.to_string(), "3d980002-31eb-42b4-8a68-75bd8d3bd521");
    }

    #[test]
    fn test_descriptors_take_precedence_over_fallback() {
        // Arrange: the device uses arbitrary UUIDs but names them
        let discovered = vec![
            described(0x1111, "prov-session"),
            described(0x2222, "prov-config"),
            described(0x3333, "proto-ver"),
            described(0x4444, "ch_resp"),
        ];
        let required = &PROV_ENDPOINT_IDS[..3];

        // Act
        let map = resolve_endpoints(PROV_SERVICE_UUID, required, &discovered).unwrap();

        // Assert
        assert_eq!(map["prov-session"], Uuid::from_u128(0x1111));
        assert_eq!(map["ch_resp"], Uuid::from_u128(0x4444));
    }

    #[test]
    fn test_fallback_used_when_descriptors_absent() {
        // Arrange
        let discovered: Vec<_> = PROV_ENDPOINT_IDS[..3]
            .iter()
            .map(|(_, id)| bare(fallback_characteristic_uuid(PROV_SERVICE_UUID, *id)))
            .collect();

        // Act
        let map =
            resolve_endpoints(PROV_SERVICE_UUID, &PROV_ENDPOINT_IDS[..3], &discovered).unwrap();

        // Assert
        assert_eq!(
            map["proto-ver"].to_string(),
            "0000ff53-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_missing_endpoints_are_listed_with_available_characteristics() {
        // Arrange: only prov-session is reachable
        let discovered = vec![described(0xabcd, "prov-session")];

        // Act
        let err = resolve_endpoints(PROV_SERVICE_UUID, &PROV_ENDPOINT_IDS[..3], &discovered)
            .unwrap_err();

        // Assert
        assert_eq!(err.missing, vec!["prov-config", "proto-ver"]);
        assert_eq!(err.available.len(), 1);
        let text = err.to_string();
        assert!(text.contains("Endpoints not found: prov-config, proto-ver"));
        assert!(text.contains("Possible causes"));
    }

    #[test]
    fn test_available_list_is_capped_at_ten() {
        let discovered: Vec<_> = (0..25u128).map(|i| bare(Uuid::from_u128(i))).collect();
        let err = resolve_endpoints(PROV_SERVICE_UUID, &PROV_ENDPOINT_IDS[..1], &discovered)
            .unwrap_err();
        assert_eq!(err.available.len(), 10);
    }
}
