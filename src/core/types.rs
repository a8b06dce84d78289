use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `result` value of a successful response envelope.
pub const RESULT_OK: i64 = 0;

/// Header carrying the extended origin of hybrid applications.
pub const HEADER_EXTENDED_ORIGIN: &str = "X-GotAPI-Origin";
/// Size of the nonce attached to authenticated requests.
pub const NONCE_BYTES: usize = 16;
/// Size of the key handed to the manager for response HMACs.
pub const HMAC_KEY_BYTES: usize = 16;
/// Access token used when the gateway has authorization disabled.
pub const SENTINEL_ACCESS_TOKEN: &str = "dummy";

/// How an inbound event path is compared with registered keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventMatching {
    /// Key path equals the event path
    #[default]
    Exact,
    /// Key path contains the event path
    Containment,
}

/// Protocol error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    AccessFailed = -1,
    InvalidServer = -2,
    Unknown = 1,
    NotSupportedProfile = 2,
    NotSupportedAction = 3,
    NotSupportedAttribute = 4,
    EmptyServiceId = 5,
    NotFoundService = 6,
    Timeout = 7,
    UnknownAttribute = 8,
    LowBattery = 9,
    InvalidRequestParameter = 10,
    Authorization = 11,
    ExpiredAccessToken = 12,
    EmptyAccessToken = 13,
    Scope = 14,
    NotFoundClientId = 15,
    IllegalDeviceState = 16,
    IllegalServerState = 17,
    InvalidOrigin = 18,
    InvalidUrl = 19,
    InvalidProfile = 20,
}

impl ErrorCode {
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        let kind = match code {
            -1 => Self::AccessFailed,
            -2 => Self::InvalidServer,
            1 => Self::Unknown,
            2 => Self::NotSupportedProfile,
            3 => Self::NotSupportedAction,
            4 => Self::NotSupportedAttribute,
            5 => Self::EmptyServiceId,
            6 => Self::NotFoundService,
            7 => Self::Timeout,
            8 => Self::UnknownAttribute,
            9 => Self::LowBattery,
            10 => Self::InvalidRequestParameter,
            11 => Self::Authorization,
            12 => Self::ExpiredAccessToken,
            13 => Self::EmptyAccessToken,
            14 => Self::Scope,
            15 => Self::NotFoundClientId,
            16 => Self::IllegalDeviceState,
            17 => Self::IllegalServerState,
            18 => Self::InvalidOrigin,
            19 => Self::InvalidUrl,
            20 => Self::InvalidProfile,
            _ => return None,
        };
        Some(kind)
    }

    /// Codes in `[Authorization, NotFoundClientId]`.
    pub fn is_authorization_class(self) -> bool {
        (Self::Authorization.code()..=Self::NotFoundClientId.code()).contains(&self.code())
    }
}

/// Persisted per-application credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// Lifecycle of the shared event socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsState {
    Closed,
    Opening,
    OpenedUnestablished,
    Established,
}

impl WsState {
    /// Whether a physical socket is currently open.
    pub fn is_open(self) -> bool {
        matches!(self, Self::OpenedUnestablished | Self::Established)
    }
}

/// Notifications delivered to the status listener passed to `connect_websocket`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsStatus {
    /// Socket connected and handshake frame sent.
    Open,
    /// Gateway acknowledged the handshake; events will now be dispatched.
    Established,
    Closed,
    Error(String),
    /// Gateway refused the handshake.
    Rejected { code: i32, message: String },
}

impl WsStatus {
    /// Legacy numeric status code (`0` open, `-1` established, `1` closed, `2` error).
    pub fn code(&self) -> i32 {
        match self {
            Self::Open => 0,
            Self::Established => -1,
            Self::Closed => 1,
            Self::Error(_) => WS_STATUS_ERROR,
            Self::Rejected { code, .. } => *code,
        }
    }
}

pub const WS_STATUS_ERROR: i32 = 2;

/// A service entry returned by service discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub network_type: Option<String>,
    #[serde(default)]
    pub online: Option<bool>,
    #[serde(default)]
    pub config: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDiscoveryResponse {
    pub result: i64,
    #[serde(default)]
    pub services: Vec<ServiceDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInformation {
    pub result: i64,
    #[serde(default)]
    pub supports: Vec<String>,
    #[serde(default)]
    pub connect: Option<Value>,
}

impl ServiceInformation {
    pub fn supports_profile(&self, profile: &str) -> bool {
        self.supports.iter().any(|p| p == profile)
    }
}
