use crate::core::errors::DConnectError;
use crate::core::profiles::common;
use crate::core::types::RESULT_OK;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

/// Codec trait for the event socket
///
/// Converts between raw WebSocket messages and typed gateway frames.
/// Control messages (ping, pong, close) never reach the codec.
pub trait WsCodec: Send + Sync + 'static {
    /// The type representing parsed frames
    type Message: Send + Sync;

    /// Encode the first frame announcing the access token bound to this socket
    fn encode_handshake(&self, access_token: &str) -> Result<Message, DConnectError>;

    /// Decode a raw WebSocket message
    ///
    /// # Returns
    /// - `Ok(Some(message))` - Successfully decoded message
    /// - `Ok(None)` - Message was ignored
    /// - `Err(error)` - Failed to decode message
    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, DConnectError>;
}

/// A JSON frame received from the gateway
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayFrame {
    pub raw: String,
    pub body: Value,
}

impl GatewayFrame {
    /// Interpret the frame as the handshake acknowledgement.
    pub fn handshake_result(&self) -> Result<(), DConnectError> {
        if self.body.get(common::PARAM_RESULT).and_then(Value::as_i64) == Some(RESULT_OK) {
            Ok(())
        } else {
            Err(DConnectError::from_envelope(self.body.clone()))
        }
    }

    /// Interpret the frame as an event notification.
    pub fn into_event(self) -> EventFrame {
        let field = |name: &str| {
            self.body
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        EventFrame {
            profile: field(common::PARAM_PROFILE),
            interface: field(common::PARAM_INTERFACE),
            attribute: field(common::PARAM_ATTRIBUTE),
            service_id: field(common::PARAM_SERVICE_ID),
            raw: self.raw,
            body: self.body,
        }
    }
}

/// Event notification pushed over the socket
#[derive(Debug, Clone, PartialEq)]
pub struct EventFrame {
    pub profile: Option<String>,
    pub interface: Option<String>,
    pub attribute: Option<String>,
    pub service_id: Option<String>,
    pub body: Value,
    /// Frame text exactly as received
    pub raw: String,
}

impl EventFrame {
    /// Lower-cased `/<api>/<profile>[/<interface>][/<attribute>]` of the event.
    pub fn path(&self, api: &str) -> String {
        let mut path = format!("/{}/", api);
        if let Some(profile) = &self.profile {
            path.push_str(profile);
        }
        for segment in [&self.interface, &self.attribute].into_iter().flatten() {
            path.push('/');
            path.push_str(segment);
        }
        path.to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GatewayCodec;

impl WsCodec for GatewayCodec {
    type Message = GatewayFrame;

    fn encode_handshake(&self, access_token: &str) -> Result<Message, DConnectError> {
        let frame = json!({ "accessToken": access_token });
        Ok(Message::Text(frame.to_string()))
    }

    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, DConnectError> {
        let raw = match message {
            Message::Text(text) => text,
            Message::Binary(data) => String::from_utf8(data).map_err(|e| {
                DConnectError::WebSocket(format!("Binary frame is not UTF-8: {}", e))
            })?,
            _ => return Ok(None),
        };
        let body = serde_json::from_str(&raw)?;
        Ok(Some(GatewayFrame { raw, body }))
    }
}
