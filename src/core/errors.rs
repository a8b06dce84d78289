use crate::core::types::{ErrorCode, WS_STATUS_ERROR};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DConnectError {
    /// The gateway answered with `result != 0`.
    #[error("API error: {code} - {message}")]
    Api {
        code: i32,
        message: String,
        body: Value,
    },

    #[error("HTTP status {status}")]
    HttpStatus { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid server: {0}")]
    InvalidServer(String),

    #[error("Access failed: {message}")]
    AccessFailed {
        message: String,
        #[source]
        source: Option<Box<DConnectError>>,
    },

    #[error("WebSocket already open")]
    AlreadyOpen,

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),
}

impl DConnectError {
    pub(crate) fn access_failed(source: Self) -> Self {
        Self::AccessFailed {
            message: "Failed to access to the server.".to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Build an [`DConnectError::Api`] from a gateway error envelope.
    pub fn from_envelope(body: Value) -> Self {
        let code = body
            .get("errorCode")
            .and_then(Value::as_i64)
            .map_or(ErrorCode::Unknown.code(), |c| {
                i32::try_from(c).unwrap_or(ErrorCode::Unknown.code())
            });
        let message = body
            .get("errorMessage")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self::Api {
            code,
            message,
            body,
        }
    }

    /// Numeric error code as reported to UI layers.
    pub fn error_code(&self) -> i32 {
        match self {
            Self::Api { code, .. } => *code,
            Self::HttpStatus { status, .. } => i32::from(*status),
            Self::InvalidServer(_) => ErrorCode::InvalidServer.code(),
            Self::AlreadyOpen | Self::WebSocket(_) => WS_STATUS_ERROR,
            Self::InvalidParameters(_) => ErrorCode::InvalidRequestParameter.code(),
            Self::NetworkError(_)
            | Self::AccessFailed { .. }
            | Self::Storage(_)
            | Self::JsonError(_)
            | Self::ConfigError(_) => ErrorCode::AccessFailed.code(),
        }
    }

    pub fn error_message(&self) -> String {
        match self {
            Self::Api { message, .. } | Self::AccessFailed { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn kind(&self) -> Option<ErrorCode> {
        match self {
            Self::Api { code, .. } => ErrorCode::from_code(*code),
            Self::InvalidServer(_) => Some(ErrorCode::InvalidServer),
            Self::AccessFailed { .. } => Some(ErrorCode::AccessFailed),
            _ => None,
        }
    }

    /// Errors the dispatcher recovers from by re-authorizing.
    pub fn is_authorization_class(&self) -> bool {
        self.kind().is_some_and(ErrorCode::is_authorization_class)
    }

    pub fn is_not_supported_profile(&self) -> bool {
        self.kind() == Some(ErrorCode::NotSupportedProfile)
    }
}
