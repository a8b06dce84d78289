/// Transport layer shared by every SDK operation
///
/// The kernel knows how to move bytes to and from a Device Connect gateway and
/// nothing about profiles, scopes, or listeners.
///
/// ## Transport
/// - `HttpTransport`: pluggable HTTP backend (`ReqwestTransport` by default)
/// - `RestExecutor`: one request, gateway `result` contract, response HMAC check
/// - `WsSession`: WebSocket connection management (`TungsteniteWs`)
///
/// ## Message Handling
/// - `WsCodec`: handshake encoding and frame decoding (`GatewayCodec`)
///
/// ## Response Authentication
/// - `ResponseVerifier`: HMAC-SHA256 over the request nonce
///
/// # Example
/// ```rust,no_run
/// use dconnect::core::kernel::*;
/// use reqwest::Method;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = Arc::new(ReqwestTransport::new(&TransportConfig::default())?);
/// let executor = RestExecutor::new(transport, None);
/// let json = executor
///     .execute(Method::GET, "http://localhost:4035/gotapi/availability", &[], None, None)
///     .await?;
/// println!("{}", json["version"]);
/// # Ok(())
/// # }
/// ```
pub mod codec;
pub mod rest;
pub mod verifier;
pub mod ws;

// Re-export key types for convenience
pub use codec::{EventFrame, GatewayCodec, GatewayFrame, WsCodec};
pub use rest::{
    HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, RequestBody, RestExecutor,
    TransportConfig,
};
pub use verifier::{generate_random, ResponseVerifier};
pub use ws::{TungsteniteWs, WsConfig, WsSession};
