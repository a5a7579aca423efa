//! Protobuf message schemas exchanged with the device.
//!
//! Every struct here is a hand-declared `prost` message whose field tags
//! match the device firmware's `.proto` definitions, so no build script or
//! `protoc` is needed.  Frames are grouped by the endpoint that carries them:
//!
//! | Endpoint                  | Top-level message       |
//! |---------------------------|-------------------------|
//! | `prov-session`            | [`SessionData`]         |
//! | `prov-scan`               | [`WiFiScanPayload`]     |
//! | `prov-config`             | [`WiFiConfigPayload`]   |
//! | `prov-ctrl`               | [`WiFiCtrlPayload`]     |
//! | `cloud_user_assoc`        | [`RMakerConfigPayload`] |
//! | `ch_resp`                 | [`RMakerChRespPayload`] |
//! | `get_params`/`get_config` | [`RMakerLocalCtrlPayload`] |
//! | `esp_local_ctrl/control`  | [`LocalCtrlMessage`]    |
//!
//! # How prost derive works (for beginners)
//!
//! `#[derive(prost::Message)]` generates `encode`/`decode` implementations
//! from the `#[prost(...)]` attributes.  Each attribute names the protobuf
//! wire type (`bytes`, `uint32`, `message`, `enumeration`, ...) and the field
//! tag.  `oneof` groups become a Rust enum wrapped in `Option`.  Enumerations
//! are stored as raw `i32` so unknown values from newer firmware still decode.

// ── Shared status ─────────────────────────────────────────────────────────────

/// Generic status code returned by session and Wi-Fi frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Status {
    Success = 0,
    InvalidSecScheme = 1,
    InvalidProto = 2,
    TooManySessions = 3,
    InvalidArgument = 4,
    InternalError = 5,
    CryptoError = 6,
    InvalidSession = 7,
}

// ── Session envelope ──────────────────────────────────────────────────────────

/// Security scheme discriminant carried by [`SessionData`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SecSchemeVersion {
    SecScheme0 = 0,
    SecScheme1 = 1,
    SecScheme2 = 2,
}

/// Envelope for every handshake frame sent to `prov-session`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SessionData {
    #[prost(enumeration = "SecSchemeVersion", tag = "2")]
    pub sec_ver: i32,
    #[prost(oneof = "session_data::Proto", tags = "10, 11, 12")]
    pub proto: ::core::option::Option<session_data::Proto>,
}

pub mod session_data {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Proto {
        #[prost(message, tag = "10")]
        Sec0(super::Sec0Payload),
        #[prost(message, tag = "11")]
        Sec1(super::Sec1Payload),
        #[prost(message, tag = "12")]
        Sec2(super::Sec2Payload),
    }
}

// ── Scheme 0 (plain) ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Sec0MsgType {
    S0SessionCommand = 0,
    S0SessionResponse = 1,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct S0SessionCmd {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct S0SessionResp {
    #[prost(enumeration = "Status", tag = "1")]
    pub status: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Sec0Payload {
    #[prost(enumeration = "Sec0MsgType", tag = "1")]
    pub msg: i32,
    #[prost(oneof = "sec0_payload::Payload", tags = "20, 21")]
    pub payload: ::core::option::Option<sec0_payload::Payload>,
}

pub mod sec0_payload {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "20")]
        Sc(super::S0SessionCmd),
        #[prost(message, tag = "21")]
        Sr(super::S0SessionResp),
    }
}

// ── Scheme 1 (X25519 + PoP) ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Sec1MsgType {
    SessionCommand0 = 0,
    SessionResponse0 = 1,
    SessionCommand1 = 2,
    SessionResponse1 = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SessionCmd0 {
    #[prost(bytes = "vec", tag = "1")]
    pub client_pubkey: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SessionResp0 {
    #[prost(enumeration = "Status", tag = "1")]
    pub status: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub device_pubkey: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub device_random: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SessionCmd1 {
    #[prost(bytes = "vec", tag = "2")]
    pub client_verify_data: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SessionResp1 {
    #[prost(enumeration = "Status", tag = "1")]
    pub status: i32,
    #[prost(bytes = "vec", tag = "3")]
    pub device_verify_data: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Sec1Payload {
    #[prost(enumeration = "Sec1MsgType", tag = "1")]
    pub msg: i32,
    #[prost(oneof = "sec1_payload::Payload", tags = "20, 21, 22, 23")]
    pub payload: ::core::option::Option<sec1_payload::Payload>,
}

pub mod sec1_payload {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "20")]
        Sc0(super::SessionCmd0),
        #[prost(message, tag = "21")]
        Sr0(super::SessionResp0),
        #[prost(message, tag = "22")]
        Sc1(super::SessionCmd1),
        #[prost(message, tag = "23")]
        Sr1(super::SessionResp1),
    }
}

// ── Scheme 2 (SRP6a) ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Sec2MsgType {
    S2SessionCommand0 = 0,
    S2SessionResponse0 = 1,
    S2SessionCommand1 = 2,
    S2SessionResponse1 = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct S2SessionCmd0 {
    #[prost(bytes = "vec", tag = "1")]
    pub client_username: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub client_pubkey: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct S2SessionResp0 {
    #[prost(enumeration = "Status", tag = "1")]
    pub status: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub device_pubkey: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub device_salt: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct S2SessionCmd1 {
    #[prost(bytes = "vec", tag = "1")]
    pub client_proof: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct S2SessionResp1 {
    #[prost(enumeration = "Status", tag = "1")]
    pub status: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub device_proof: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub device_nonce: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Sec2Payload {
    #[prost(enumeration = "Sec2MsgType", tag = "1")]
    pub msg: i32,
    #[prost(oneof = "sec2_payload::Payload", tags = "20, 21, 22, 23")]
    pub payload: ::core::option::Option<sec2_payload::Payload>,
}

pub mod sec2_payload {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "20")]
        Sc0(super::S2SessionCmd0),
        #[prost(message, tag = "21")]
        Sr0(super::S2SessionResp0),
        #[prost(message, tag = "22")]
        Sc1(super::S2SessionCmd1),
        #[prost(message, tag = "23")]
        Sr1(super::S2SessionResp1),
    }
}

// ── Wi-Fi constants ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum WifiStationState {
    Connected = 0,
    Connecting = 1,
    Disconnected = 2,
    ConnectionFailed = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum WifiConnectFailedReason {
    AuthError = 0,
    NetworkNotFound = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum WifiAuthMode {
    Open = 0,
    Wep = 1,
    WpaPsk = 2,
    Wpa2Psk = 3,
    WpaWpa2Psk = 4,
    Wpa2Enterprise = 5,
    Wpa3Psk = 6,
    Wpa2Wpa3Psk = 7,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WifiConnectedState {
    #[prost(string, tag = "1")]
    pub ip4_addr: ::prost::alloc::string::String,
    #[prost(enumeration = "WifiAuthMode", tag = "2")]
    pub auth_mode: i32,
    #[prost(bytes = "vec", tag = "3")]
    pub ssid: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub bssid: ::prost::alloc::vec::Vec<u8>,
    #[prost(int32, tag = "5")]
    pub channel: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WifiAttemptFailed {
    #[prost(uint32, tag = "1")]
    pub attempts_remaining: u32,
}

// ── Wi-Fi config (prov-config) ────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum WiFiConfigMsgType {
    TypeCmdGetStatus = 0,
    TypeRespGetStatus = 1,
    TypeCmdSetConfig = 2,
    TypeRespSetConfig = 3,
    TypeCmdApplyConfig = 4,
    TypeRespApplyConfig = 5,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CmdGetStatus {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RespGetStatus {
    #[prost(enumeration = "Status", tag = "1")]
    pub status: i32,
    #[prost(enumeration = "WifiStationState", tag = "2")]
    pub sta_state: i32,
    #[prost(oneof = "resp_get_status::State", tags = "10, 11, 12")]
    pub state: ::core::option::Option<resp_get_status::State>,
}

pub mod resp_get_status {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum State {
        #[prost(enumeration = "super::WifiConnectFailedReason", tag = "10")]
        FailReason(i32),
        #[prost(message, tag = "11")]
        Connected(super::WifiConnectedState),
        #[prost(message, tag = "12")]
        AttemptFailed(super::WifiAttemptFailed),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CmdSetConfig {
    #[prost(bytes = "vec", tag = "1")]
    pub ssid: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub passphrase: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub bssid: ::prost::alloc::vec::Vec<u8>,
    #[prost(int32, tag = "4")]
    pub channel: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RespSetConfig {
    #[prost(enumeration = "Status", tag = "1")]
    pub status: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CmdApplyConfig {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RespApplyConfig {
    #[prost(enumeration = "Status", tag = "1")]
    pub status: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WiFiConfigPayload {
    #[prost(enumeration = "WiFiConfigMsgType", tag = "1")]
    pub msg: i32,
    #[prost(oneof = "wi_fi_config_payload::Payload", tags = "10, 11, 12, 13, 14, 15")]
    pub payload: ::core::option::Option<wi_fi_config_payload::Payload>,
}

pub mod wi_fi_config_payload {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "10")]
        CmdGetStatus(super::CmdGetStatus),
        #[prost(message, tag = "11")]
        RespGetStatus(super::RespGetStatus),
        #[prost(message, tag = "12")]
        CmdSetConfig(super::CmdSetConfig),
        #[prost(message, tag = "13")]
        RespSetConfig(super::RespSetConfig),
        #[prost(message, tag = "14")]
        CmdApplyConfig(super::CmdApplyConfig),
        #[prost(message, tag = "15")]
        RespApplyConfig(super::RespApplyConfig),
    }
}

// ── Wi-Fi scan (prov-scan) ────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum WiFiScanMsgType {
    TypeCmdScanStart = 0,
    TypeRespScanStart = 1,
    TypeCmdScanStatus = 2,
    TypeRespScanStatus = 3,
    TypeCmdScanResult = 4,
    TypeRespScanResult = 5,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CmdScanStart {
    #[prost(bool, tag = "1")]
    pub blocking: bool,
    #[prost(bool, tag = "2")]
    pub passive: bool,
    #[prost(uint32, tag = "3")]
    pub group_channels: u32,
    #[prost(uint32, tag = "4")]
    pub period_ms: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RespScanStart {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CmdScanStatus {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RespScanStatus {
    #[prost(bool, tag = "1")]
    pub scan_finished: bool,
    #[prost(uint32, tag = "2")]
    pub result_count: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CmdScanResult {
    #[prost(uint32, tag = "1")]
    pub start_index: u32,
    #[prost(uint32, tag = "2")]
    pub count: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WiFiScanResult {
    #[prost(bytes = "vec", tag = "1")]
    pub ssid: ::prost::alloc::vec::Vec<u8>,
    #[prost(uint32, tag = "2")]
    pub channel: u32,
    #[prost(int32, tag = "3")]
    pub rssi: i32,
    #[prost(bytes = "vec", tag = "4")]
    pub bssid: ::prost::alloc::vec::Vec<u8>,
    #[prost(enumeration = "WifiAuthMode", tag = "5")]
    pub auth: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RespScanResult {
    #[prost(message, repeated, tag = "1")]
    pub entries: ::prost::alloc::vec::Vec<WiFiScanResult>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WiFiScanPayload {
    #[prost(enumeration = "WiFiScanMsgType", tag = "1")]
    pub msg: i32,
    #[prost(enumeration = "Status", tag = "2")]
    pub status: i32,
    #[prost(oneof = "wi_fi_scan_payload::Payload", tags = "10, 11, 12, 13, 14, 15")]
    pub payload: ::core::option::Option<wi_fi_scan_payload::Payload>,
}

pub mod wi_fi_scan_payload {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "10")]
        CmdScanStart(super::CmdScanStart),
        #[prost(message, tag = "11")]
        RespScanStart(super::RespScanStart),
        #[prost(message, tag = "12")]
        CmdScanStatus(super::CmdScanStatus),
        #[prost(message, tag = "13")]
        RespScanStatus(super::RespScanStatus),
        #[prost(message, tag = "14")]
        CmdScanResult(super::CmdScanResult),
        #[prost(message, tag = "15")]
        RespScanResult(super::RespScanResult),
    }
}

// ── Wi-Fi control (prov-ctrl) ─────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum WiFiCtrlMsgType {
    TypeCtrlReserved = 0,
    TypeCmdCtrlReset = 1,
    TypeRespCtrlReset = 2,
    TypeCmdCtrlReprov = 3,
    TypeRespCtrlReprov = 4,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CmdCtrlReset {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RespCtrlReset {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CmdCtrlReprov {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RespCtrlReprov {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WiFiCtrlPayload {
    #[prost(enumeration = "WiFiCtrlMsgType", tag = "1")]
    pub msg: i32,
    #[prost(enumeration = "Status", tag = "2")]
    pub status: i32,
    #[prost(oneof = "wi_fi_ctrl_payload::Payload", tags = "11, 12, 13, 14")]
    pub payload: ::core::option::Option<wi_fi_ctrl_payload::Payload>,
}

pub mod wi_fi_ctrl_payload {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "11")]
        CmdCtrlReset(super::CmdCtrlReset),
        #[prost(message, tag = "12")]
        RespCtrlReset(super::RespCtrlReset),
        #[prost(message, tag = "13")]
        CmdCtrlReprov(super::CmdCtrlReprov),
        #[prost(message, tag = "14")]
        RespCtrlReprov(super::RespCtrlReprov),
    }
}

// ── User-node mapping (cloud_user_assoc) ──────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RMakerConfigStatus {
    Success = 0,
    InvalidParam = 1,
    InvalidState = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RMakerConfigMsgType {
    TypeCmdSetUserMapping = 0,
    TypeRespSetUserMapping = 1,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CmdSetUserMapping {
    #[prost(string, tag = "1")]
    pub user_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub secret_key: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RespSetUserMapping {
    #[prost(enumeration = "RMakerConfigStatus", tag = "1")]
    pub status: i32,
    #[prost(string, tag = "2")]
    pub node_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RMakerConfigPayload {
    #[prost(enumeration = "RMakerConfigMsgType", tag = "1")]
    pub msg: i32,
    #[prost(oneof = "r_maker_config_payload::Payload", tags = "10, 11")]
    pub payload: ::core::option::Option<r_maker_config_payload::Payload>,
}

pub mod r_maker_config_payload {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "10")]
        CmdSetUserMapping(super::CmdSetUserMapping),
        #[prost(message, tag = "11")]
        RespSetUserMapping(super::RespSetUserMapping),
    }
}

// ── Challenge response (ch_resp) ──────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RMakerChRespStatus {
    Success = 0,
    Fail = 1,
    InvalidParam = 2,
    Disabled = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RMakerChRespMsgType {
    TypeCmdChallengeResponse = 0,
    TypeRespChallengeResponse = 1,
    TypeCmdDisableChalResp = 2,
    TypeRespDisableChalResp = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CmdCrPayload {
    #[prost(bytes = "vec", tag = "1")]
    pub payload: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RespCrPayload {
    #[prost(bytes = "vec", tag = "1")]
    pub payload: ::prost::alloc::vec::Vec<u8>,
    #[prost(string, tag = "2")]
    pub node_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CmdDisableChalResp {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RespDisableChalResp {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RMakerChRespPayload {
    #[prost(enumeration = "RMakerChRespMsgType", tag = "1")]
    pub msg: i32,
    #[prost(enumeration = "RMakerChRespStatus", tag = "2")]
    pub status: i32,
    #[prost(oneof = "r_maker_ch_resp_payload::Payload", tags = "10, 11, 12, 13")]
    pub payload: ::core::option::Option<r_maker_ch_resp_payload::Payload>,
}

pub mod r_maker_ch_resp_payload {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "10")]
        CmdChallengeResponse(super::CmdCrPayload),
        #[prost(message, tag = "11")]
        RespChallengeResponse(super::RespCrPayload),
        #[prost(message, tag = "12")]
        CmdDisableChalResp(super::CmdDisableChalResp),
        #[prost(message, tag = "13")]
        RespDisableChalResp(super::RespDisableChalResp),
    }
}

// ── Chunked get-data (get_params / get_config) ────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RMakerLocalCtrlMsgType {
    TypeCmdGetData = 0,
    TypeRespGetData = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RMakerLocalCtrlDataType {
    Params = 0,
    Config = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RMakerLocalCtrlStatus {
    Success = 0,
    Fail = 1,
    InvalidParam = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CmdGetData {
    #[prost(enumeration = "RMakerLocalCtrlDataType", tag = "1")]
    pub data_type: i32,
    #[prost(uint32, tag = "2")]
    pub offset: u32,
    #[prost(uint64, tag = "3")]
    pub timestamp: u64,
    #[prost(bool, tag = "4")]
    pub has_timestamp: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PayloadBuf {
    #[prost(uint32, tag = "1")]
    pub offset: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub payload: ::prost::alloc::vec::Vec<u8>,
    #[prost(uint32, tag = "3")]
    pub total_len: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RespGetData {
    #[prost(enumeration = "RMakerLocalCtrlStatus", tag = "1")]
    pub status: i32,
    #[prost(message, optional, tag = "2")]
    pub buf: ::core::option::Option<PayloadBuf>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RMakerLocalCtrlPayload {
    #[prost(enumeration = "RMakerLocalCtrlMsgType", tag = "1")]
    pub msg: i32,
    #[prost(oneof = "r_maker_local_ctrl_payload::Payload", tags = "10, 11")]
    pub payload: ::core::option::Option<r_maker_local_ctrl_payload::Payload>,
}

pub mod r_maker_local_ctrl_payload {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "10")]
        CmdGetData(super::CmdGetData),
        #[prost(message, tag = "11")]
        RespGetData(super::RespGetData),
    }
}

// ── Local-control properties (esp_local_ctrl/control) ─────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum LocalCtrlMsgType {
    TypeCmdGetPropertyCount = 0,
    TypeRespGetPropertyCount = 1,
    TypeCmdGetPropertyValues = 4,
    TypeRespGetPropertyValues = 5,
    TypeCmdSetPropertyValues = 6,
    TypeRespSetPropertyValues = 7,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CmdGetPropertyCount {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RespGetPropertyCount {
    #[prost(enumeration = "Status", tag = "1")]
    pub status: i32,
    #[prost(uint32, tag = "2")]
    pub count: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PropertyInfo {
    #[prost(enumeration = "Status", tag = "1")]
    pub status: i32,
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
    #[prost(uint32, tag = "3")]
    pub r#type: u32,
    #[prost(uint32, tag = "4")]
    pub flags: u32,
    #[prost(bytes = "vec", tag = "5")]
    pub value: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CmdGetPropertyValues {
    #[prost(uint32, repeated, tag = "1")]
    pub indices: ::prost::alloc::vec::Vec<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RespGetPropertyValues {
    #[prost(enumeration = "Status", tag = "1")]
    pub status: i32,
    #[prost(message, repeated, tag = "2")]
    pub props: ::prost::alloc::vec::Vec<PropertyInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PropertyValue {
    #[prost(uint32, tag = "1")]
    pub index: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub value: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CmdSetPropertyValues {
    #[prost(message, repeated, tag = "1")]
    pub props: ::prost::alloc::vec::Vec<PropertyValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RespSetPropertyValues {
    #[prost(enumeration = "Status", tag = "1")]
    pub status: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LocalCtrlMessage {
    #[prost(enumeration = "LocalCtrlMsgType", tag = "1")]
    pub msg: i32,
    #[prost(oneof = "local_ctrl_message::Payload", tags = "10, 11, 12, 13, 14, 15")]
    pub payload: ::core::option::Option<local_ctrl_message::Payload>,
}

pub mod local_ctrl_message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "10")]
        CmdGetPropCount(super::CmdGetPropertyCount),
        #[prost(message, tag = "11")]
        RespGetPropCount(super::RespGetPropertyCount),
        #[prost(message, tag = "12")]
        CmdGetPropVals(super::CmdGetPropertyValues),
        #[prost(message, tag = "13")]
        RespGetPropVals(super::RespGetPropertyValues),
        #[prost(message, tag = "14")]
        CmdSetPropVals(super::CmdSetPropertyValues),
        #[prost(message, tag = "15")]
        RespSetPropVals(super::RespSetPropertyValues),
    }
}
