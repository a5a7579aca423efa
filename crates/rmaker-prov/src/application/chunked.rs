//! Offset-based bulk reads of node params and config.
//!
//! A document larger than one frame is fetched piecewise:
//!
//! ```text
//! get-data {type, offset: 0, timestamp?}  ─►  {offset: 0,   payload[0..n),   total_len}
//! get-data {type, offset: n}              ─►  {offset: n,   payload[n..m),   total_len}
//! ...                                         until offset == total_len
//! ```
//!
//! The timestamp only rides on the first request.  A device that echoes a
//! different offset, returns a non-success status or stalls with an empty
//! chunk aborts the read.

use rmaker_core::protocol::codec::{
    expect_msg_type, expect_success, require_payload, ProtocolError,
};
use rmaker_core::protocol::endpoints::{GET_CONFIG, GET_PARAMS};
use rmaker_core::protocol::messages::{
    r_maker_local_ctrl_payload, CmdGetData, RMakerLocalCtrlDataType, RMakerLocalCtrlMsgType,
    RMakerLocalCtrlPayload,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::application::challenge::sign_challenge;
use crate::application::session::SecureSession;
use crate::application::ProvisionError;

/// Which document to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Params,
    Config,
}

impl DataKind {
    pub fn endpoint(self) -> &'static str {
        match self {
            DataKind::Params => GET_PARAMS,
            DataKind::Config => GET_CONFIG,
        }
    }

    fn wire(self) -> RMakerLocalCtrlDataType {
        match self {
            DataKind::Params => RMakerLocalCtrlDataType::Params,
            DataKind::Config => RMakerLocalCtrlDataType::Config,
        }
    }
}

/// Reads the whole document and returns its raw bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::OffsetMismatch`] (wrapped in
/// [`ProvisionError::Protocol`]) when the device answers for a different
/// offset, and [`ProtocolError::DeviceStatus`] for a non-success status.
pub async fn get_data(
    session: &mut SecureSession,
    kind: DataKind,
    timestamp: Option<u64>,
) -> Result<Vec<u8>, ProvisionError> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut total: Option<u32> = None;
    let mut offset: u32 = 0;

    loop {
        let first = offset == 0;
        let request = RMakerLocalCtrlPayload {
            msg: RMakerLocalCtrlMsgType::TypeCmdGetData as i32,
            payload: Some(r_maker_local_ctrl_payload::Payload::CmdGetData(CmdGetData {
                data_type: kind.wire() as i32,
                offset,
                timestamp: if first { timestamp.unwrap_or(0) } else { 0 },
                has_timestamp: first && timestamp.is_some(),
            })),
        };
        let reply: RMakerLocalCtrlPayload = session.request(kind.endpoint(), &request).await?;
        expect_msg_type::<RMakerLocalCtrlPayload>(
            reply.msg,
            RMakerLocalCtrlMsgType::TypeRespGetData as i32,
        )?;
        let resp = match require_payload::<RMakerLocalCtrlPayload, _>(reply.payload)? {
            r_maker_local_ctrl_payload::Payload::RespGetData(resp) => resp,
            r_maker_local_ctrl_payload::Payload::CmdGetData(_) => {
                return Err(missing_chunk().into());
            }
        };
        expect_success::<RMakerLocalCtrlPayload>(resp.status)?;
        let chunk = resp.buf.ok_or_else(missing_chunk)?;

        if chunk.offset != offset {
            return Err(ProtocolError::OffsetMismatch {
                requested: offset,
                received: chunk.offset,
            }
            .into());
        }
        let declared = *total.get_or_insert(chunk.total_len);
        let next = u32::try_from(chunk.payload.len())
            .ok()
            .and_then(|len| offset.checked_add(len))
            .filter(|&next| next <= declared)
            .ok_or_else(|| ProtocolError::Malformed {
                message: "get-data",
                reason: format!(
                    "{} byte chunk at offset {offset} overruns declared length {declared}",
                    chunk.payload.len()
                ),
            })?;

        buffer.extend_from_slice(&chunk.payload);
        offset = next;
        debug!(
            "{}: {offset}/{declared} bytes",
            kind.endpoint()
        );

        if offset >= declared {
            break;
        }
        if chunk.payload.is_empty() {
            return Err(ProtocolError::Malformed {
                message: "get-data",
                reason: format!("empty chunk at offset {offset} of {declared}"),
            }
            .into());
        }
    }
    Ok(buffer)
}

/// Parses `bytes` as JSON, surfacing anything else unchanged as a string.
pub fn to_json_or_text(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Reads the document and returns it as JSON (or text).
///
/// # Errors
///
/// As [`get_data`].
pub async fn get_json(
    session: &mut SecureSession,
    kind: DataKind,
    timestamp: Option<u64>,
) -> Result<Value, ProvisionError> {
    let raw = get_data(session, kind, timestamp).await?;
    Ok(to_json_or_text(&raw))
}

/// Reads the document without a timestamp and has the device sign it.
///
/// The signed string is the compact JSON `{"data":<doc>,"timestamp":<t>}`;
/// the result is `{"node_payload":<that string>,"signature":<hex>}`.
///
/// # Errors
///
/// As [`get_data`], plus any signing failure from the device.
pub async fn get_signed(
    session: &mut SecureSession,
    kind: DataKind,
    timestamp: u64,
) -> Result<Value, ProvisionError> {
    let data = get_json(session, kind, None).await?;
    let node_payload = signed_payload(data, timestamp);
    debug!("signing {} bytes", node_payload.len());

    let signed = sign_challenge(session, node_payload.as_bytes()).await?;
    Ok(json!({
        "node_payload": node_payload,
        "signature": hex::encode(signed.signature),
    }))
}

fn signed_payload(data: Value, timestamp: u64) -> String {
    json!({ "data": data, "timestamp": timestamp }).to_string()
}

fn missing_chunk() -> ProtocolError {
    ProtocolError::MissingPayload {
        message: "get-data",
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
            SessionKind::LocalControl,
            SecurityScheme::mutual_auth_password("wifiprov", "abcd1234", 1),
        )
        .await
        .unwrap()
    }

    fn device() -> Arc<MockDevice> {
        Arc::new(
            MockDevice::new(DeviceCredentials::with_password("wifiprov", "abcd1234", 1))
                .with_node_id("N1"),
        )
    }

    #[tokio::test]
    async fn test_reassembles_document_across_uneven_chunks() {
        // Arrange
        let doc = br#"{"Light":{"Power":true,"Brightness":42,"Name":"Desk lamp"}}"#;
        let device = device();
        device.set_document(DataKind::Params, doc.to_vec());
        device.set_chunk_sizes(&[7, 1, 20]);
        let mut session = session(&device).await;

        // Act
        let raw = get_data(&mut session, DataKind::Params, None).await.unwrap();

        // Assert
        assert_eq!(raw, doc);
        assert_eq!(device.get_data_offsets(), vec![0, 7, 8, 28, 48]);
    }

    #[tokio::test]
    async fn test_timestamp_is_sent_only_on_first_request() {
        let device = device();
        device.set_document(DataKind::Config, vec![b'x'; 250]);
        device.set_chunk_sizes(&[100]);
        let mut session = session(&device).await;

        get_data(&mut session, DataKind::Config, Some(1_700_000_000))
            .await
            .unwrap();

        assert_eq!(
            device.get_data_timestamps(),
            vec![Some(1_700_000_000), None, None]
        );
    }

    #[tokio::test]
    async fn test_offset_mismatch_aborts() {
        // Arrange
        let device = device();
        device.set_document(DataKind::Params, vec![b'a'; 64]);
        device.set_chunk_sizes(&[16]);
        device.skew_offset_after(1, 3);
        let mut session = session(&device).await;

        // Act
        let result = get_data(&mut session, DataKind::Params, None).await;

        // Assert
        assert!(matches!(
            result,
            Err(ProvisionError::Protocol(ProtocolError::OffsetMismatch {
                requested: 16,
                received: 19
            }))
        ));
    }

    #[tokio::test]
    async fn test_chunk_past_declared_length_is_rejected() {
        // Arrange: 10 bytes served against a declared length of 4
        let device = device();
        device.set_document(DataKind::Params, vec![b'a'; 10]);
        device.declare_total_len(4);
        let mut session = session(&device).await;

        // Act
        let result = get_data(&mut session, DataKind::Params, None).await;

        // Assert
        assert!(matches!(
            result,
            Err(ProvisionError::Protocol(ProtocolError::Malformed { message: "get-data", .. }))
        ));
        assert_eq!(device.get_data_offsets(), vec![0]);
    }

    #[tokio::test]
    async fn test_oversized_declared_length_fails_on_short_document() {
        let device = device();
        device.set_document(DataKind::Config, vec![b'z'; 10]);
        device.declare_total_len(u32::MAX);
        let mut session = session(&device).await;

        let result = get_data(&mut session, DataKind::Config, None).await;

        assert!(matches!(
            result,
            Err(ProvisionError::Protocol(ProtocolError::Malformed { message: "get-data", .. }))
        ));
        assert_eq!(device.get_data_offsets(), vec![0, 10]);
    }

    #[tokio::test]
    async fn test_empty_document_needs_one_round_trip() {
        let device = device();
        device.set_document(DataKind::Params, Vec::new());
        let mut session = session(&device).await;

        let raw = get_data(&mut session, DataKind::Params, None).await.unwrap();

        assert!(raw.is_empty());
        assert_eq!(device.get_data_offsets(), vec![0]);
    }

    #[tokio::test]
    async fn test_non_json_document_is_returned_as_text() {
        let device = device();
        device.set_document(DataKind::Config, b"not json".to_vec());
        let mut session = session(&device).await;

        let value = get_json(&mut session, DataKind::Config, None).await.unwrap();

        assert_eq!(value, Value::String("not json".into()));
    }

    #[tokio::test]
    async fn test_signed_mode_signs_compact_payload() {
        // Arrange
        let device = device();
        device.set_document(DataKind::Params, br#"{"Light": {"Power": true}}"#.to_vec());
        let mut session = session(&device).await;

        // Act
        let report = get_signed(&mut session, DataKind::Params, 1_700_000_000)
            .await
            .unwrap();

        // Assert
        let expected = r#"{"data":{"Light":{"Power":true}},"timestamp":1700000000}"#;
        assert_eq!(report["node_payload"], expected);
        assert_eq!(
            report["signature"],
            hex::encode(device.signature_for(expected.as_bytes()))
        );
        assert_eq!(device.get_data_timestamps(), vec![None]);
    }

    #[test]
    fn test_signed_payload_keeps_string_documents() {
        assert_eq!(
            signed_payload(Value::String("raw".into()), 5),
            r#"{"data":"raw","timestamp":5}"#
        );
    }
}
