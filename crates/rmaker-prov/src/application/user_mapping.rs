//! Legacy identity binding over `cloud_user_assoc`.
//!
//! The tool hands the device the user id and a random secret; the device
//! later presents both to the cloud, which binds the node to the user.  The
//! reply carries the node id.

use rmaker_core::protocol::codec::{
    expect_msg_type, expect_success, require_payload, ProtocolError,
};
use rmaker_core::protocol::endpoints::CLOUD_USER_ASSOC;
use rmaker_core::protocol::messages::{
    r_maker_config_payload, CmdSetUserMapping, RMakerConfigMsgType, RMakerConfigPayload,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::session::SecureSession;
use crate::application::ProvisionError;

/// Node id reported when the device has no `cloud_user_assoc` endpoint.
pub const UNKNOWN_NODE_ID: &str = "unknown";

/// A fresh secret key for one binding attempt.
pub fn new_secret_key() -> String {
    Uuid::new_v4().to_string()
}

/// Sends the user mapping and returns the node id.
///
/// A device without the endpoint yields [`UNKNOWN_NODE_ID`].
///
/// # Errors
///
/// Returns [`ProvisionError::Protocol`] when the device rejects the mapping.
pub async fn set_user_mapping(
    session: &mut SecureSession,
    user_id: &str,
    secret_key: &str,
) -> Result<String, ProvisionError> {
    if !session.transport().has_endpoint(CLOUD_USER_ASSOC) {
        warn!("device has no {CLOUD_USER_ASSOC} endpoint; node id unknown");
        return Ok(UNKNOWN_NODE_ID.to_string());
    }

    info!("sending user-node mapping for user {user_id}");
    let request = RMakerConfigPayload {
        msg: RMakerConfigMsgType::TypeCmdSetUserMapping as i32,
        payload: Some(r_maker_config_payload::Payload::CmdSetUserMapping(
            CmdSetUserMapping {
                user_id: user_id.to_string(),
                secret_key: secret_key.to_string(),
            },
        )),
    };

    let reply: RMakerConfigPayload = session.request(CLOUD_USER_ASSOC, &request).await?;

    expect_msg_type::<RMakerConfigPayload>(
        reply.msg,
        RMakerConfigMsgType::TypeRespSetUserMapping as i32,
    )?;
    match require_payload::<RMakerConfigPayload, _>(reply.payload)? {
        r_maker_config_payload::Payload::RespSetUserMapping(resp) => {
            expect_success::<RMakerConfigPayload>(resp.status)?;
            info!("device reports node id {}", resp.node_id);
            Ok(resp.node_id)
        }
        r_maker_config_payload::Payload::CmdSetUserMapping(_) => {
            Err(ProtocolError::MissingPayload {
                message: "user-mapping",
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rmaker_core::security::{DeviceCredentials, SecurityScheme};
    use rmaker_core::SessionKind;

    use crate::infrastructure::transport::mock::MockDevice;

    async fn session(device: &Arc<MockDevice>) -> SecureSession {
        SecureSession::establish(
            device.clone(),
            SessionKind::Provisioning,
            SecurityScheme::key_exchange_pop("abcd1234"),
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_secret_keys_are_unique() {
        assert_ne!(new_secret_key(), new_secret_key());
    }

    #[tokio::test]
    async fn test_mapping_returns_device_node_id() {
        // Arrange
        let device = Arc::new(
            MockDevice::new(DeviceCredentials::with_pop("abcd1234")).with_node_id("N1"),
        );
        let mut session = session(&device).await;

        // Act
        let node = set_user_mapping(&mut session, "user-1", "s3cret")
            .await
            .unwrap();

        // Assert
        assert_eq!(node, "N1");
        assert_eq!(
            device.user_mapping(),
            Some(("user-1".to_string(), "s3cret".to_string()))
        );
    }

    #[tokio::test]
    async fn test_missing_endpoint_yields_unknown_node() {
        let device = Arc::new(MockDevice::new(DeviceCredentials::with_pop("abcd1234")));
        device.remove_endpoint("cloud_user_assoc");
        let mut session = session(&device).await;

        let node = set_user_mapping(&mut session, "user-1", "s3cret")
            .await
            .unwrap();

        assert_eq!(node, UNKNOWN_NODE_ID);
    }
}
