//! BLE transport over GATT (built with the `ble` feature).
//!
//! Each endpoint is one characteristic of the provisioning (or local-control)
//! service.  An exchange is a write-with-response followed by a read of the
//! same characteristic.  Characteristics are matched to endpoint names by
//! their `0x2901` user description; firmware without descriptors is matched
//! by the fixed per-endpoint UUIDs in [`rmaker_core::protocol::gatt`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use rmaker_core::protocol::gatt::{
    fallback_characteristic_uuid, resolve_endpoints, DiscoveredCharacteristic,
    LOCAL_CTRL_ENDPOINT_IDS, LOCAL_CTRL_SERVICE_UUID, PROV_ENDPOINT_IDS, PROV_SERVICE_UUID,
    USER_DESCRIPTION_DESCRIPTOR,
};
use rmaker_core::SessionKind;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::transport::{Transport, TransportError, TransportKind};

/// Endpoints a provisioning-mode device must expose.
const PROV_REQUIRED: usize = 3;

/// A connected BLE peripheral with its endpoint map.
pub struct BleTransport {
    peripheral: Peripheral,
    name: String,
    endpoints: HashMap<String, Characteristic>,
    timeout: Duration,
    /// Set by `disconnect`; the lock also serializes exchanges.
    closed: Mutex<bool>,
}

impl BleTransport {
    /// Scans for a peripheral advertising `name`, connects and resolves the
    /// endpoint map for `kind`'s service.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] when no adapter is present, the
    /// device is not seen within `timeout`, or required characteristics are
    /// missing.
    pub async fn connect(
        name: &str,
        kind: SessionKind,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let connect_error = |reason: String| TransportError::Connect {
            target: format!("ble:{name}"),
            reason,
        };

        let manager = Manager::new().await.map_err(|e| connect_error(e.to_string()))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| connect_error(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| connect_error("no Bluetooth adapter found".into()))?;

        info!("scanning for BLE device '{name}'");
        let peripheral = tokio::time::timeout(timeout, find_peripheral(&adapter, name))
            .await
            .map_err(|_| connect_error(format!("device not found within {timeout:?}")))?
            .map_err(|e| connect_error(e.to_string()))?;
        if let Err(e) = adapter.stop_scan().await {
            warn!("failed to stop BLE scan: {e}");
        }

        peripheral
            .connect()
            .await
            .map_err(|e| connect_error(e.to_string()))?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| connect_error(e.to_string()))?;

        let (service, ids, required) = match kind {
            SessionKind::Provisioning => (PROV_SERVICE_UUID, PROV_ENDPOINT_IDS, PROV_REQUIRED),
            SessionKind::LocalControl => (
                LOCAL_CTRL_SERVICE_UUID,
                LOCAL_CTRL_ENDPOINT_IDS,
                LOCAL_CTRL_ENDPOINT_IDS.len(),
            ),
        };
        let characteristics: Vec<Characteristic> = peripheral
            .characteristics()
            .into_iter()
            .filter(|c| c.service_uuid == service)
            .collect();
        let discovered = describe(&peripheral, &characteristics).await;

        let mut names = resolve_endpoints(service, &ids[..required], &discovered)
            .map_err(|e| connect_error(e.to_string()))?;
        for (endpoint, id) in &ids[required..] {
            let candidate = fallback_characteristic_uuid(service, *id);
            if !names.contains_key(*endpoint) && characteristics.iter().any(|c| c.uuid == candidate)
            {
                names.insert((*endpoint).to_string(), candidate);
            }
        }
        let endpoints = names
            .into_iter()
            .filter_map(|(endpoint, uuid)| {
                characteristics
                    .iter()
                    .find(|c| c.uuid == uuid)
                    .map(|c| (endpoint, c.clone()))
            })
            .collect::<HashMap<_, _>>();
        debug!(
            "resolved {} endpoints on '{name}': {:?}",
            endpoints.len(),
            endpoints.keys().collect::<Vec<_>>()
        );

        Ok(Self {
            peripheral,
            name: name.to_string(),
            endpoints,
            timeout,
            closed: Mutex::new(false),
        })
    }
}

async fn find_peripheral(adapter: &Adapter, name: &str) -> Result<Peripheral, btleplug::Error> {
    let mut events = adapter.events().await?;
    adapter.start_scan(ScanFilter::default()).await?;

    // Already-known peripherals do not raise a discovery event.
    for peripheral in adapter.peripherals().await? {
        if advertised_name(&peripheral).await.as_deref() == Some(name) {
            return Ok(peripheral);
        }
    }
    while let Some(event) = events.next().await {
        let id = match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
            _ => continue,
        };
        let peripheral = adapter.peripheral(&id).await?;
        if advertised_name(&peripheral).await.as_deref() == Some(name) {
            return Ok(peripheral);
        }
    }
    Err(btleplug::Error::DeviceNotFound)
}

async fn advertised_name(peripheral: &Peripheral) -> Option<String> {
    peripheral
        .properties()
        .await
        .ok()
        .flatten()
        .and_then(|p| p.local_name)
}

/// Reads the user description of every characteristic that has one.
async fn describe(
    peripheral: &Peripheral,
    characteristics: &[Characteristic],
) -> Vec<DiscoveredCharacteristic> {
    let mut discovered = Vec::with_capacity(characteristics.len());
    for characteristic in characteristics {
        let mut description = None;
        if let Some(descriptor) = characteristic
            .descriptors
            .iter()
            .find(|d| d.uuid == USER_DESCRIPTION_DESCRIPTOR)
        {
            match peripheral.read_descriptor(descriptor).await {
                Ok(raw) => description = String::from_utf8(raw).ok(),
                Err(e) => debug!("descriptor read failed on {}: {e}", characteristic.uuid),
            }
        }
        discovered.push(DiscoveredCharacteristic {
            uuid: characteristic.uuid,
            description,
        });
    }
    discovered
}

fn io_error(e: btleplug::Error) -> TransportError {
    TransportError::Io(e.to_string())
}

#[async_trait]
impl Transport for BleTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Ble
    }

    fn has_endpoint(&self, endpoint: &str) -> bool {
        self.endpoints.contains_key(endpoint)
    }

    async fn send(&self, endpoint: &str, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        let closed = self.closed.lock().await;
        if *closed {
            return Err(TransportError::Closed);
        }
        let characteristic = self
            .endpoints
            .get(endpoint)
            .ok_or_else(|| TransportError::EndpointNotFound(endpoint.to_string()))?;

        let exchange = async {
            self.peripheral
                .write(characteristic, payload, WriteType::WithResponse)
                .await
                .map_err(io_error)?;
            self.peripheral.read(characteristic).await.map_err(io_error)
        };
        let response = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout {
                endpoint: endpoint.to_string(),
                after: self.timeout,
            })??;
        debug!("{endpoint}: wrote {} bytes, read {}", payload.len(), response.len());
        Ok(response)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut closed = self.closed.lock().await;
        *closed = true;
        info!("disconnecting from '{}'", self.name);
        self.peripheral.disconnect().await.map_err(io_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_prov_required_endpoints_are_session_config_and_version() {
        let required: Vec<&str> = PROV_ENDPOINT_IDS[..PROV_REQUIRED]
            .iter()
            .map(|(name, _)| *name)
            .collect();
        assert_eq!(required, ["prov-session", "prov-config", "proto-ver"]);
    }

    #[test]
    fn test_optional_endpoint_fallback_uuid() {
        let uuid: Uuid = fallback_characteristic_uuid(PROV_SERVICE_UUID, 0xff54);
        assert_eq!(uuid.to_string(), "0000ff54-0000-1000-8000-00805f9b34fb");
    }
}
