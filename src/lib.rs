pub mod core;
pub mod sdk;

pub use core::{
    config::SdkConfig,
    errors::DConnectError,
    types::*,
    uri::{add_request_parameter, UriBuilder},
};
pub use sdk::{
    auth::{combine_scope, ScopeSet},
    dispatcher::{DispatchSnapshot, RequestTarget},
    events::{EventKey, EventMatching},
    launch::{LaunchContext, Platform},
    DConnectSdk, DConnectSdkBuilder,
};
