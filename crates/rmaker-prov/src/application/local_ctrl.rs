//! Local-control properties and JSON parameter updates.
//!
//! On-network nodes expose named properties (`config`, `params`, ...) over
//! `esp_local_ctrl/control`.  A property flagged read-only is refused here,
//! before any frame is sent.  `set_params` takes a raw JSON document
//! instead and answers with JSON or a bare `OK`.

use rmaker_core::domain::property::Property;
use rmaker_core::protocol::codec::{
    expect_msg_type, expect_success, require_payload, ProtocolError,
};
use rmaker_core::protocol::endpoints::{LOCAL_CTRL_CONTROL, SET_PARAMS};
use rmaker_core::protocol::messages::{
    local_ctrl_message, CmdGetPropertyCount, CmdGetPropertyValues, CmdSetPropertyValues,
    LocalCtrlMessage, LocalCtrlMsgType, PropertyValue,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::application::session::SecureSession;
use crate::application::ProvisionError;

/// Number of properties the node exposes.
///
/// # Errors
///
/// Returns [`ProvisionError::Protocol`] for a failed or malformed reply.
pub async fn property_count(session: &mut SecureSession) -> Result<u32, ProvisionError> {
    let reply = control(
        session,
        LocalCtrlMsgType::TypeCmdGetPropertyCount,
        local_ctrl_message::Payload::CmdGetPropCount(CmdGetPropertyCount {}),
        LocalCtrlMsgType::TypeRespGetPropertyCount,
    )
    .await?;
    match reply {
        local_ctrl_message::Payload::RespGetPropCount(r) => {
            expect_success::<LocalCtrlMessage>(r.status)?;
            Ok(r.count)
        }
        _ => Err(mismatched().into()),
    }
}

/// Reads the properties at `indices`.
///
/// # Errors
///
/// Returns [`ProvisionError::Protocol`] when the reply or any single
/// property carries a non-success status, or when the reply does not hold
/// one entry per requested index.
pub async fn get_properties(
    session: &mut SecureSession,
    indices: &[u32],
) -> Result<Vec<Property>, ProvisionError> {
    let reply = control(
        session,
        LocalCtrlMsgType::TypeCmdGetPropertyValues,
        local_ctrl_message::Payload::CmdGetPropVals(CmdGetPropertyValues {
            indices: indices.to_vec(),
        }),
        LocalCtrlMsgType::TypeRespGetPropertyValues,
    )
    .await?;
    let resp = match reply {
        local_ctrl_message::Payload::RespGetPropVals(r) => r,
        _ => return Err(mismatched().into()),
    };
    expect_success::<LocalCtrlMessage>(resp.status)?;
    if resp.props.len() != indices.len() {
        return Err(ProtocolError::Malformed {
            message: "local-ctrl",
            reason: format!(
                "asked for {} properties, got {}",
                indices.len(),
                resp.props.len()
            ),
        }
        .into());
    }

    indices
        .iter()
        .zip(resp.props.iter())
        .map(|(&index, info)| -> Result<Property, ProvisionError> {
            expect_success::<LocalCtrlMessage>(info.status)?;
            Ok(Property::from_info(index, info))
        })
        .collect()
}

/// Reads every property.
///
/// # Errors
///
/// As [`property_count`] and [`get_properties`].
pub async fn list_properties(session: &mut SecureSession) -> Result<Vec<Property>, ProvisionError> {
    let count = property_count(session).await?;
    debug!("node exposes {count} properties");
    if count == 0 {
        return Ok(Vec::new());
    }
    let indices: Vec<u32> = (0..count).collect();
    get_properties(session, &indices).await
}

/// Writes `value` to `property`.
///
/// # Errors
///
/// Returns [`ProvisionError::ReadOnlyProperty`] without contacting the
/// device when the property is read-only.
pub async fn set_property(
    session: &mut SecureSession,
    property: &Property,
    value: Vec<u8>,
) -> Result<(), ProvisionError> {
    if property.is_readonly() {
        return Err(ProvisionError::ReadOnlyProperty(property.name.clone()));
    }
    info!("setting property '{}'", property.name);
    let reply = control(
        session,
        LocalCtrlMsgType::TypeCmdSetPropertyValues,
        local_ctrl_message::Payload::CmdSetPropVals(CmdSetPropertyValues {
            props: vec![PropertyValue {
                index: property.index,
                value,
            }],
        }),
        LocalCtrlMsgType::TypeRespSetPropertyValues,
    )
    .await?;
    match reply {
        local_ctrl_message::Payload::RespSetPropVals(r) => {
            Ok(expect_success::<LocalCtrlMessage>(r.status)?)
        }
        _ => Err(mismatched().into()),
    }
}

/// Looks `name` up and writes `value` to it.
///
/// # Errors
///
/// Returns [`ProvisionError::PropertyNotFound`] for an unknown name, and
/// otherwise as [`set_property`].
pub async fn set_property_by_name(
    session: &mut SecureSession,
    name: &str,
    value: Vec<u8>,
) -> Result<(), ProvisionError> {
    let properties = list_properties(session).await?;
    let property = properties
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| ProvisionError::PropertyNotFound(name.to_string()))?;
    set_property(session, property, value).await
}

/// Sends a JSON parameter update over `set_params`.
///
/// A JSON reply is returned as is; a bare `OK` becomes
/// `{"status":"success"}` and other text is returned as a string.
///
/// # Errors
///
/// Returns [`ProvisionError::EmptyResponse`] when the device answers with
/// nothing.
pub async fn set_params(
    session: &mut SecureSession,
    params: &Value,
) -> Result<Value, ProvisionError> {
    info!("updating node params");
    let reply = session
        .exchange(SET_PARAMS, params.to_string().as_bytes())
        .await?;
    interpret_set_params_reply(&reply)
}

fn interpret_set_params_reply(reply: &[u8]) -> Result<Value, ProvisionError> {
    if let Ok(value) = serde_json::from_slice::<Value>(reply) {
        return Ok(value);
    }
    let text = String::from_utf8_lossy(reply);
    let text = text.trim();
    if text.is_empty() {
        Err(ProvisionError::EmptyResponse(SET_PARAMS))
    } else if text.eq_ignore_ascii_case("ok") {
        Ok(json!({ "status": "success" }))
    } else {
        Ok(Value::String(text.to_string()))
    }
}

async fn control(
    session: &mut SecureSession,
    msg: LocalCtrlMsgType,
    payload: local_ctrl_message::Payload,
    expected: LocalCtrlMsgType,
) -> Result<local_ctrl_message::Payload, ProvisionError> {
    let request = LocalCtrlMessage {
        msg: msg as i32,
        payload: Some(payload),
    };
    let reply: LocalCtrlMessage = session.request(LOCAL_CTRL_CONTROL, &request).await?;
    expect_msg_type::<LocalCtrlMessage>(reply.msg, expected as i32)?;
    Ok(require_payload::<LocalCtrlMessage, _>(reply.payload)?)
}

fn mismatched() -> ProtocolError {
    ProtocolError::Malformed {
        message: "local-ctrl",
        reason: "payload does not match message type".into(),
    }
}
