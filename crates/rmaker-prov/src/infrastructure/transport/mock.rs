//! In-memory device for tests.
//!
//! [`MockDevice`] implements [`Transport`] by answering every endpoint the
//! way provisioning firmware does: the capability probe, all three
//! handshakes (through [`SessionResponder`]), Wi-Fi scan/config/ctrl, user
//! mapping, challenge-response, chunked get-data, `set_params` and the
//! local-control property protocol.  It records what it was sent so tests
//! can assert on traffic, and it can be told to fail or hide endpoints.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use rmaker_core::domain::property::PROP_FLAG_READONLY;
use rmaker_core::domain::wifi::FailReason;
use rmaker_core::protocol::codec::{decode, encode, ProtocolError};
use rmaker_core::protocol::endpoints;
use rmaker_core::protocol::messages::{
    local_ctrl_message, r_maker_ch_resp_payload, r_maker_config_payload,
    r_maker_local_ctrl_payload, resp_get_status, wi_fi_config_payload, wi_fi_ctrl_payload,
    wi_fi_scan_payload, LocalCtrlMessage, LocalCtrlMsgType, PayloadBuf, PropertyInfo,
    RMakerChRespMsgType, RMakerChRespPayload, RMakerChRespStatus, RMakerConfigMsgType,
    RMakerConfigPayload, RMakerLocalCtrlMsgType, RMakerLocalCtrlPayload, RMakerLocalCtrlStatus,
    RespApplyConfig, RespCrPayload, RespCtrlReprov, RespCtrlReset, RespDisableChalResp,
    RespGetData, RespGetPropertyCount, RespGetPropertyValues, RespGetStatus, RespScanResult,
    RespScanStart, RespScanStatus, RespSetConfig, RespSetPropertyValues, RespSetUserMapping,
    Status, WiFiConfigMsgType, WiFiConfigPayload, WiFiCtrlMsgType, WiFiCtrlPayload,
    WiFiScanMsgType, WiFiScanPayload, WiFiScanResult, WifiAuthMode, WifiConnectFailedReason,
    WifiConnectedState, WifiStationState,
};
use rmaker_core::security::{DeviceCredentials, HandshakeState, SchemeVersion, SessionResponder};
use serde_json::json;

use crate::application::chunked::DataKind;
use crate::application::transport::{Transport, TransportError, TransportKind};

/// Address reported once the scripted station connects.
pub const MOCK_STATION_IP: &str = "192.168.1.42";

const DEFAULT_CHUNK: usize = 200;

/// Endpoints the mock answers.
const KNOWN_ENDPOINTS: &[&str] = &[
    endpoints::PROTO_VER,
    endpoints::PROV_SESSION,
    endpoints::PROV_SCAN,
    endpoints::PROV_CONFIG,
    endpoints::PROV_CTRL,
    endpoints::CLOUD_USER_ASSOC,
    endpoints::CH_RESP,
    endpoints::GET_PARAMS,
    endpoints::GET_CONFIG,
    endpoints::SET_PARAMS,
    endpoints::LOCAL_CTRL_VERSION,
    endpoints::LOCAL_CTRL_SESSION,
    endpoints::LOCAL_CTRL_CONTROL,
];

// ── Station script ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum StationStep {
    Connecting { polls: u32 },
    Connected,
    Failed(FailReason),
}

/// Sequence of station states returned by successive status reads.
///
/// The final state repeats once reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationScript {
    steps: VecDeque<StationStep>,
}

impl StationScript {
    /// `Connecting` for `polls` reads, then `Connected`.
    pub fn connects_after(polls: u32) -> Self {
        let mut steps = VecDeque::new();
        if polls > 0 {
            steps.push_back(StationStep::Connecting { polls });
        }
        steps.push_back(StationStep::Connected);
        Self { steps }
    }

    /// `Failed(reason)` on the first read.
    pub fn fails(reason: FailReason) -> Self {
        Self {
            steps: VecDeque::from([StationStep::Failed(reason)]),
        }
    }

    /// `Failed(reason)` once, then `Connected`.
    pub fn fails_then_connects(reason: FailReason) -> Self {
        Self {
            steps: VecDeque::from([StationStep::Failed(reason), StationStep::Connected]),
        }
    }

    fn next(&mut self) -> StationStep {
        let step = match self.steps.front_mut() {
            Some(StationStep::Connecting { polls }) => {
                *polls = polls.saturating_sub(1);
                let exhausted = *polls == 0;
                if exhausted && self.steps.len() > 1 {
                    self.steps.pop_front();
                }
                return StationStep::Connecting { polls: 1 };
            }
            Some(step) => step.clone(),
            None => StationStep::Connected,
        };
        if self.steps.len() > 1 {
            self.steps.pop_front();
        }
        step
    }
}

// ── Device state ──────────────────────────────────────────────────────────────

struct MockProperty {
    name: String,
    flags: u32,
    value: Vec<u8>,
}

struct DeviceState {
    responder: SessionResponder,
    closed: bool,
    calls: Vec<(String, Vec<u8>)>,
    failures: HashMap<String, TransportError>,
    removed: BTreeSet<String>,
    networks: Vec<String>,
    wifi: Option<(String, String)>,
    applied: bool,
    station: StationScript,
    user_mapping: Option<(String, String)>,
    challenges: Vec<Vec<u8>>,
    ch_resp_disabled: bool,
    documents: HashMap<&'static str, Vec<u8>>,
    chunk_sizes: Vec<usize>,
    get_data_offsets: Vec<u32>,
    get_data_timestamps: Vec<Option<u64>>,
    offset_skew: Option<(usize, u32)>,
    declared_len: Option<u32>,
    scan_count: Option<u32>,
    prop_reply_limit: Option<usize>,
    properties: Vec<MockProperty>,
    last_params: Option<Vec<u8>>,
}

/// A scripted device reachable through the [`Transport`] trait.
pub struct MockDevice {
    credentials: DeviceCredentials,
    kind: TransportKind,
    node_id: String,
    prov_caps: Vec<String>,
    extra_caps: Vec<String>,
    rmaker_caps: Vec<String>,
    state: Mutex<DeviceState>,
}

impl MockDevice {
    /// A device configured with `credentials`, reached over HTTP.
    pub fn new(credentials: DeviceCredentials) -> Self {
        let mut prov_caps = Vec::new();
        match credentials.scheme {
            SchemeVersion::Plain => prov_caps.push("no_sec".to_string()),
            SchemeVersion::KeyExchangePop if credentials.pop.is_empty() => {
                prov_caps.push("no_pop".to_string())
            }
            _ => {}
        }
        let documents = HashMap::from([
            (endpoints::GET_PARAMS, b"{}".to_vec()),
            (endpoints::GET_CONFIG, b"{}".to_vec()),
        ]);
        Self {
            kind: TransportKind::Http,
            node_id: "mock-node".to_string(),
            prov_caps,
            extra_caps: Vec::new(),
            rmaker_caps: Vec::new(),
            state: Mutex::new(DeviceState {
                responder: SessionResponder::new(credentials.clone()),
                closed: false,
                calls: Vec::new(),
                failures: HashMap::new(),
                removed: BTreeSet::new(),
                networks: Vec::new(),
                wifi: None,
                applied: false,
                station: StationScript::connects_after(0),
                user_mapping: None,
                challenges: Vec::new(),
                ch_resp_disabled: false,
                documents,
                chunk_sizes: Vec::new(),
                get_data_offsets: Vec::new(),
                get_data_timestamps: Vec::new(),
                offset_skew: None,
                declared_len: None,
                scan_count: None,
                prop_reply_limit: None,
                properties: Vec::new(),
                last_params: None,
            }),
            credentials,
        }
    }

    // ── Builders ──────────────────────────────────────────────────────────────

    pub fn with_kind(mut self, kind: TransportKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_node_id(mut self, node_id: &str) -> Self {
        self.node_id = node_id.to_string();
        self
    }

    /// Adds entries to `prov.cap`.
    pub fn with_prov_caps(mut self, caps: &[&str]) -> Self {
        self.prov_caps.extend(caps.iter().map(|c| c.to_string()));
        self
    }

    /// Adds entries to `rmaker_extra.cap`.
    pub fn with_extra_caps(mut self, caps: &[&str]) -> Self {
        self.extra_caps.extend(caps.iter().map(|c| c.to_string()));
        self
    }

    /// Adds entries to `rmaker.cap`.
    pub fn with_rmaker_caps(mut self, caps: &[&str]) -> Self {
        self.rmaker_caps.extend(caps.iter().map(|c| c.to_string()));
        self
    }

    // ── Scripting ─────────────────────────────────────────────────────────────

    /// Makes every call to `endpoint` fail with `error`.
    pub fn fail_endpoint(&self, endpoint: &str, error: TransportError) {
        self.lock().failures.insert(endpoint.to_string(), error);
    }

    /// Hides `endpoint`, as firmware built without it would.
    pub fn remove_endpoint(&self, endpoint: &str) {
        self.lock().removed.insert(endpoint.to_string());
    }

    /// SSIDs returned by the next scan.
    pub fn set_networks(&self, ssids: Vec<String>) {
        self.lock().networks = ssids;
    }

    pub fn script_station(&self, script: StationScript) {
        self.lock().station = script;
    }

    pub fn set_document(&self, kind: DataKind, bytes: Vec<u8>) {
        self.lock().documents.insert(kind.endpoint(), bytes);
    }

    /// Chunk sizes for successive get-data replies; the last one repeats.
    pub fn set_chunk_sizes(&self, sizes: &[usize]) {
        self.lock().chunk_sizes = sizes.to_vec();
    }

    /// After `responses` correct replies, report offsets shifted by `delta`.
    pub fn skew_offset_after(&self, responses: usize, delta: u32) {
        self.lock().offset_skew = Some((responses, delta));
    }

    /// Reports `len` as the document length instead of the real one.
    pub fn declare_total_len(&self, len: u32) {
        self.lock().declared_len = Some(len);
    }

    /// Reports `count` scan results regardless of how many networks exist.
    pub fn report_scan_count(&self, count: u32) {
        self.lock().scan_count = Some(count);
    }

    /// Answers property-value reads with at most `limit` entries.
    pub fn limit_property_replies(&self, limit: usize) {
        self.lock().prop_reply_limit = Some(limit);
    }

    pub fn add_property(&self, name: &str, flags: u32, value: &[u8]) {
        self.lock().properties.push(MockProperty {
            name: name.to_string(),
            flags,
            value: value.to_vec(),
        });
    }

    // ── Inspection ────────────────────────────────────────────────────────────

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(name, _)| name == endpoint)
            .count()
    }

    /// Raw (encrypted) payloads sent to `endpoint`, in order.
    pub fn payloads_to(&self, endpoint: &str) -> Vec<Vec<u8>> {
        self.lock()
            .calls
            .iter()
            .filter(|(name, _)| name == endpoint)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn wifi_credentials(&self) -> Option<(String, String)> {
        self.lock().wifi.clone()
    }

    pub fn applied(&self) -> bool {
        self.lock().applied
    }

    pub fn user_mapping(&self) -> Option<(String, String)> {
        self.lock().user_mapping.clone()
    }

    pub fn signed_challenges(&self) -> Vec<Vec<u8>> {
        self.lock().challenges.clone()
    }

    pub fn challenge_response_disabled(&self) -> bool {
        self.lock().ch_resp_disabled
    }

    pub fn get_data_offsets(&self) -> Vec<u32> {
        self.lock().get_data_offsets.clone()
    }

    pub fn get_data_timestamps(&self) -> Vec<Option<u64>> {
        self.lock().get_data_timestamps.clone()
    }

    pub fn last_params(&self) -> Option<Vec<u8>> {
        self.lock().last_params.clone()
    }

    pub fn property_value(&self, name: &str) -> Option<Vec<u8>> {
        self.lock()
            .properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.clone())
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// The signature this device produces for `challenge`.
    ///
    /// Deterministic so tests can predict it; not a real signature.
    pub fn signature_for(&self, challenge: &[u8]) -> Vec<u8> {
        let mut sig = format!("sig:{}:", self.node_id).into_bytes();
        sig.extend(challenge.iter().rev());
        sig
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state.lock().expect("lock poisoned")
    }

    // ── Endpoint handlers ─────────────────────────────────────────────────────

    fn capabilities(&self) -> Vec<u8> {
        json!({
            "prov": {
                "ver": "v1.1",
                "sec_ver": self.credentials.scheme as u32,
                "sec_patch_ver": self.credentials.sec_patch_ver,
                "cap": self.prov_caps,
            },
            "rmaker": { "ver": "1.0", "cap": self.rmaker_caps },
            "rmaker_extra": { "cap": self.extra_caps },
        })
        .to_string()
        .into_bytes()
    }

    fn handle_session(
        &self,
        state: &mut DeviceState,
        payload: &[u8],
    ) -> Result<Vec<u8>, TransportError> {
        if matches!(
            state.responder.state(),
            HandshakeState::Established | HandshakeState::Failed
        ) {
            state.responder = SessionResponder::new(self.credentials.clone());
        }
        state
            .responder
            .handle(payload)
            .map_err(|e| TransportError::InvalidFrame(e.to_string()))
    }

    fn handle_command(
        &self,
        state: &mut DeviceState,
        endpoint: &str,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        match endpoint {
            endpoints::PROV_SCAN => Ok(encode(&scan_reply(state, decode(plaintext)?))),
            endpoints::PROV_CONFIG => Ok(encode(&config_reply(state, decode(plaintext)?))),
            endpoints::PROV_CTRL => Ok(encode(&ctrl_reply(state, decode(plaintext)?))),
            endpoints::CLOUD_USER_ASSOC => {
                Ok(encode(&self.user_mapping_reply(state, decode(plaintext)?)))
            }
            endpoints::CH_RESP => Ok(encode(&self.ch_resp_reply(state, decode(plaintext)?))),
            endpoints::GET_PARAMS | endpoints::GET_CONFIG => Ok(encode(&get_data_reply(
                state,
                endpoint,
                decode(plaintext)?,
            ))),
            endpoints::SET_PARAMS => {
                state.last_params = Some(plaintext.to_vec());
                Ok(b"OK".to_vec())
            }
            _ => Ok(encode(&control_reply(state, decode(plaintext)?))),
        }
    }

    fn user_mapping_reply(
        &self,
        state: &mut DeviceState,
        request: RMakerConfigPayload,
    ) -> RMakerConfigPayload {
        let status = match request.payload {
            Some(r_maker_config_payload::Payload::CmdSetUserMapping(cmd)) => {
                state.user_mapping = Some((cmd.user_id, cmd.secret_key));
                0
            }
            _ => 1,
        };
        RMakerConfigPayload {
            msg: RMakerConfigMsgType::TypeRespSetUserMapping as i32,
            payload: Some(r_maker_config_payload::Payload::RespSetUserMapping(
                RespSetUserMapping {
                    status,
                    node_id: self.node_id.clone(),
                },
            )),
        }
    }

    fn ch_resp_reply(
        &self,
        state: &mut DeviceState,
        request: RMakerChRespPayload,
    ) -> RMakerChRespPayload {
        match request.payload {
            Some(r_maker_ch_resp_payload::Payload::CmdChallengeResponse(cmd)) => {
                if state.ch_resp_disabled {
                    return RMakerChRespPayload {
                        msg: RMakerChRespMsgType::TypeRespChallengeResponse as i32,
                        status: RMakerChRespStatus::Disabled as i32,
                        payload: None,
                    };
                }
                let signature = self.signature_for(&cmd.payload);
                state.challenges.push(cmd.payload);
                RMakerChRespPayload {
                    msg: RMakerChRespMsgType::TypeRespChallengeResponse as i32,
                    status: RMakerChRespStatus::Success as i32,
                    payload: Some(r_maker_ch_resp_payload::Payload::RespChallengeResponse(
                        RespCrPayload {
                            payload: signature,
                            node_id: self.node_id.clone(),
                        },
                    )),
                }
            }
            Some(r_maker_ch_resp_payload::Payload::CmdDisableChalResp(_)) => {
                state.ch_resp_disabled = true;
                RMakerChRespPayload {
                    msg: RMakerChRespMsgType::TypeRespDisableChalResp as i32,
                    status: RMakerChRespStatus::Success as i32,
                    payload: Some(r_maker_ch_resp_payload::Payload::RespDisableChalResp(
                        RespDisableChalResp {},
                    )),
                }
            }
            _ => RMakerChRespPayload {
                msg: request.msg + 1,
                status: RMakerChRespStatus::InvalidParam as i32,
                payload: None,
            },
        }
    }
}

fn scan_reply(state: &mut DeviceState, request: WiFiScanPayload) -> WiFiScanPayload {
    let (msg, payload) = match request.payload {
        Some(wi_fi_scan_payload::Payload::CmdScanStart(_)) => (
            WiFiScanMsgType::TypeRespScanStart,
            wi_fi_scan_payload::Payload::RespScanStart(RespScanStart {}),
        ),
        Some(wi_fi_scan_payload::Payload::CmdScanStatus(_)) => (
            WiFiScanMsgType::TypeRespScanStatus,
            wi_fi_scan_payload::Payload::RespScanStatus(RespScanStatus {
                scan_finished: true,
                result_count: state.scan_count.unwrap_or(state.networks.len() as u32),
            }),
        ),
        Some(wi_fi_scan_payload::Payload::CmdScanResult(cmd)) => {
            let entries = state
                .networks
                .iter()
                .enumerate()
                .skip(cmd.start_index as usize)
                .take(cmd.count as usize)
                .map(|(i, ssid)| WiFiScanResult {
                    ssid: ssid.as_bytes().to_vec(),
                    channel: 1 + (i as u32 % 11),
                    rssi: -40 - i as i32,
                    bssid: vec![0x24, 0x0a, 0xc4, 0x00, 0x00, i as u8],
                    auth: WifiAuthMode::Wpa2Psk as i32,
                })
                .collect();
            (
                WiFiScanMsgType::TypeRespScanResult,
                wi_fi_scan_payload::Payload::RespScanResult(RespScanResult { entries }),
            )
        }
        _ => {
            return WiFiScanPayload {
                msg: request.msg + 1,
                status: Status::InvalidArgument as i32,
                payload: None,
            }
        }
    };
    WiFiScanPayload {
        msg: msg as i32,
        status: Status::Success as i32,
        payload: Some(payload),
    }
}

fn config_reply(state: &mut DeviceState, request: WiFiConfigPayload) -> WiFiConfigPayload {
    let (msg, payload) = match request.payload {
        Some(wi_fi_config_payload::Payload::CmdSetConfig(cmd)) => {
            state.wifi = Some((
                String::from_utf8_lossy(&cmd.ssid).into_owned(),
                String::from_utf8_lossy(&cmd.passphrase).into_owned(),
            ));
            (
                WiFiConfigMsgType::TypeRespSetConfig,
                wi_fi_config_payload::Payload::RespSetConfig(RespSetConfig { status: 0 }),
            )
        }
        Some(wi_fi_config_payload::Payload::CmdApplyConfig(_)) => {
            state.applied = true;
            (
                WiFiConfigMsgType::TypeRespApplyConfig,
                wi_fi_config_payload::Payload::RespApplyConfig(RespApplyConfig { status: 0 }),
            )
        }
        _ => (
            WiFiConfigMsgType::TypeRespGetStatus,
            wi_fi_config_payload::Payload::RespGetStatus(station_status(state)),
        ),
    };
    WiFiConfigPayload {
        msg: msg as i32,
        payload: Some(payload),
    }
}

fn station_status(state: &mut DeviceState) -> RespGetStatus {
    let (sta_state, detail) = match state.station.next() {
        StationStep::Connecting { .. } => (WifiStationState::Connecting, None),
        StationStep::Connected => (
            WifiStationState::Connected,
            Some(resp_get_status::State::Connected(WifiConnectedState {
                ip4_addr: MOCK_STATION_IP.to_string(),
                auth_mode: WifiAuthMode::Wpa2Psk as i32,
                ssid: state
                    .wifi
                    .as_ref()
                    .map(|(ssid, _)| ssid.as_bytes().to_vec())
                    .unwrap_or_default(),
                bssid: vec![0x24, 0x0a, 0xc4, 0x00, 0x00, 0x00],
                channel: 6,
            })),
        ),
        StationStep::Failed(reason) => (
            WifiStationState::ConnectionFailed,
            Some(resp_get_status::State::FailReason(match reason {
                FailReason::AuthError => WifiConnectFailedReason::AuthError as i32,
                FailReason::NetworkNotFound => WifiConnectFailedReason::NetworkNotFound as i32,
                FailReason::Unknown => -1,
            })),
        ),
    };
    RespGetStatus {
        status: 0,
        sta_state: sta_state as i32,
        state: detail,
    }
}

fn ctrl_reply(state: &mut DeviceState, request: WiFiCtrlPayload) -> WiFiCtrlPayload {
    let (msg, payload) = match request.payload {
        Some(wi_fi_ctrl_payload::Payload::CmdCtrlReset(_)) => {
            state.applied = false;
            (
                WiFiCtrlMsgType::TypeRespCtrlReset,
                wi_fi_ctrl_payload::Payload::RespCtrlReset(RespCtrlReset {}),
            )
        }
        Some(wi_fi_ctrl_payload::Payload::CmdCtrlReprov(_)) => {
            state.wifi = None;
            state.applied = false;
            (
                WiFiCtrlMsgType::TypeRespCtrlReprov,
                wi_fi_ctrl_payload::Payload::RespCtrlReprov(RespCtrlReprov {}),
            )
        }
        _ => {
            return WiFiCtrlPayload {
                msg: request.msg + 1,
                status: Status::InvalidArgument as i32,
                payload: None,
            }
        }
    };
    WiFiCtrlPayload {
        msg: msg as i32,
        status: Status::Success as i32,
        payload: Some(payload),
    }
}

fn get_data_reply(
    state: &mut DeviceState,
    endpoint: &str,
    request: RMakerLocalCtrlPayload,
) -> RMakerLocalCtrlPayload {
    let cmd = match request.payload {
        Some(r_maker_local_ctrl_payload::Payload::CmdGetData(cmd)) => cmd,
        _ => return get_data_failure(),
    };
    let served = state.get_data_offsets.len();
    state.get_data_offsets.push(cmd.offset);
    state
        .get_data_timestamps
        .push(cmd.has_timestamp.then_some(cmd.timestamp));

    let document = state.documents.get(endpoint).cloned().unwrap_or_default();
    let start = cmd.offset as usize;
    if start > document.len() {
        return get_data_failure();
    }
    let size = state
        .chunk_sizes
        .get(served)
        .or(state.chunk_sizes.last())
        .copied()
        .unwrap_or(DEFAULT_CHUNK);
    let end = (start + size).min(document.len());
    let reported = match state.offset_skew {
        Some((after, delta)) if served >= after => cmd.offset + delta,
        _ => cmd.offset,
    };

    RMakerLocalCtrlPayload {
        msg: RMakerLocalCtrlMsgType::TypeRespGetData as i32,
        payload: Some(r_maker_local_ctrl_payload::Payload::RespGetData(
            RespGetData {
                status: RMakerLocalCtrlStatus::Success as i32,
                buf: Some(PayloadBuf {
                    offset: reported,
                    payload: document[start..end].to_vec(),
                    total_len: state.declared_len.unwrap_or(document.len() as u32),
                }),
            },
        )),
    }
}

fn get_data_failure() -> RMakerLocalCtrlPayload {
    RMakerLocalCtrlPayload {
        msg: RMakerLocalCtrlMsgType::TypeRespGetData as i32,
        payload: Some(r_maker_local_ctrl_payload::Payload::RespGetData(
            RespGetData {
                status: RMakerLocalCtrlStatus::InvalidParam as i32,
                buf: None,
            },
        )),
    }
}

fn control_reply(state: &mut DeviceState, request: LocalCtrlMessage) -> LocalCtrlMessage {
    let (msg, payload) = match request.payload {
        Some(local_ctrl_message::Payload::CmdGetPropCount(_)) => (
            LocalCtrlMsgType::TypeRespGetPropertyCount,
            local_ctrl_message::Payload::RespGetPropCount(RespGetPropertyCount {
                status: Status::Success as i32,
                count: state.properties.len() as u32,
            }),
        ),
        Some(local_ctrl_message::Payload::CmdGetPropVals(cmd)) => {
            let props = cmd
                .indices
                .iter()
                .take(state.prop_reply_limit.unwrap_or(usize::MAX))
                .map(|&i| match state.properties.get(i as usize) {
                    Some(p) => PropertyInfo {
                        status: Status::Success as i32,
                        name: p.name.clone(),
                        r#type: 2,
                        flags: p.flags,
                        value: p.value.clone(),
                    },
                    None => PropertyInfo {
                        status: Status::InvalidArgument as i32,
                        ..Default::default()
                    },
                })
                .collect();
            (
                LocalCtrlMsgType::TypeRespGetPropertyValues,
                local_ctrl_message::Payload::RespGetPropVals(RespGetPropertyValues {
                    status: Status::Success as i32,
                    props,
                }),
            )
        }
        Some(local_ctrl_message::Payload::CmdSetPropVals(cmd)) => {
            let mut status = Status::Success;
            for update in cmd.props {
                match state.properties.get_mut(update.index as usize) {
                    Some(p) if p.flags & PROP_FLAG_READONLY == 0 => p.value = update.value,
                    _ => status = Status::InvalidArgument,
                }
            }
            (
                LocalCtrlMsgType::TypeRespSetPropertyValues,
                local_ctrl_message::Payload::RespSetPropVals(RespSetPropertyValues {
                    status: status as i32,
                }),
            )
        }
        _ => (
            LocalCtrlMsgType::TypeRespGetPropertyCount,
            local_ctrl_message::Payload::RespGetPropCount(RespGetPropertyCount {
                status: Status::InvalidArgument as i32,
                count: 0,
            }),
        ),
    };
    LocalCtrlMessage {
        msg: msg as i32,
        payload: Some(payload),
    }
}

// ── Transport ─────────────────────────────────────────────────────────────────

#[async_trait]
impl Transport for MockDevice {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn has_endpoint(&self, endpoint: &str) -> bool {
        KNOWN_ENDPOINTS.contains(&endpoint) && !self.lock().removed.contains(endpoint)
    }

    async fn send(&self, endpoint: &str, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.calls.push((endpoint.to_string(), payload.to_vec()));
        if let Some(error) = state.failures.get(endpoint) {
            return Err(error.clone());
        }
        if !KNOWN_ENDPOINTS.contains(&endpoint) || state.removed.contains(endpoint) {
            return Err(TransportError::EndpointNotFound(endpoint.to_string()));
        }

        match endpoint {
            endpoints::PROTO_VER | endpoints::LOCAL_CTRL_VERSION => Ok(self.capabilities()),
            endpoints::PROV_SESSION | endpoints::LOCAL_CTRL_SESSION => {
                self.handle_session(state, payload)
            }
            _ => {
                let plaintext = state
                    .responder
                    .decrypt(payload)
                    .map_err(|e| TransportError::InvalidFrame(e.to_string()))?;
                let reply = self
                    .handle_command(state, endpoint, &plaintext)
                    .map_err(|e| TransportError::InvalidFrame(e.to_string()))?;
                state
                    .responder
                    .encrypt(&reply)
                    .map_err(|e| TransportError::InvalidFrame(e.to_string()))
            }
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.lock().closed = true;
        Ok(())
    }
}
