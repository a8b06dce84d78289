//! Launch URLs for the Device Connect Manager application.
//!
//! Nothing here touches the OS; the caller opens the returned URL.

use crate::core::kernel::generate_random;
use crate::core::types::HMAC_KEY_BYTES;
use crate::core::uri::{encode_component, AndroidIntentBuilder};
use crate::sdk::DConnectSdk;
use tracing::debug;

pub const MANAGER_PACKAGE: &str = "org.deviceconnect.android.manager";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android { firefox: bool },
    Ios,
    Other,
}

impl Platform {
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_lowercase();
        if ua.contains("android") {
            Self::Android {
                firefox: ua.contains("firefox"),
            }
        } else if ["iphone", "ipad", "ipod"].iter().any(|d| ua.contains(d)) {
            Self::Ios
        } else {
            Self::Other
        }
    }
}

/// Page the launch request originates from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchContext {
    pub platform: Platform,
    /// Origin the manager should accept requests from
    pub origin: String,
    /// Page iOS returns to once the manager is up
    pub return_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Stop,
}

impl Command {
    fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl DConnectSdk {
    /// URL that starts the manager, or `None` on platforms without one.
    ///
    /// On Android a new response HMAC key is issued and passed to the manager.
    pub fn start_manager_url(
        &self,
        context: &LaunchContext,
        state: Option<&str>,
    ) -> Option<String> {
        self.manager_url(Command::Start, context, state)
    }

    /// URL that stops the manager, or `None` on platforms without one.
    pub fn stop_manager_url(&self, context: &LaunchContext, state: Option<&str>) -> Option<String> {
        self.manager_url(Command::Stop, context, state)
    }

    /// Whether the stored HMAC key accepts `hmac` as the signature of `nonce`.
    ///
    /// Always true while no key has been issued.
    pub fn check_hmac(&self, nonce: &str, hmac: Option<&str>) -> bool {
        self.inner
            .hmac_key
            .read()
            .as_ref()
            .map_or(true, |verifier| verifier.check(nonce, hmac))
    }

    fn rotate_hmac_key(&self) -> String {
        let key = if self.inner.config.anti_spoofing {
            generate_random(HMAC_KEY_BYTES)
        } else {
            String::new()
        };
        self.set_hmac_key(Some(key.clone()));
        key
    }

    fn manager_url(
        &self,
        command: Command,
        context: &LaunchContext,
        state: Option<&str>,
    ) -> Option<String> {
        let scheme = &self.inner.config.uri_scheme_name;
        let url = match context.platform {
            Platform::Android { firefox } => {
                let key = self.rotate_hmac_key();
                let path = format!("{}/{}", command.as_str(), state.unwrap_or_default());
                let origin = encode_component(&context.origin);
                if firefox {
                    format!("{}://{}?origin={}&key={}", scheme, path, origin, key)
                } else {
                    AndroidIntentBuilder::new(scheme.as_str())
                        .with_path(path)
                        .add_parameter("package", MANAGER_PACKAGE)
                        .add_parameter("S.origin", origin)
                        .add_parameter("S.key", key)
                        .build()
                }
            }
            Platform::Ios => match command {
                Command::Start => format!(
                    "{}://start?url={}",
                    scheme,
                    encode_component(&context.return_url)
                ),
                Command::Stop => format!("{}://stop", scheme),
            },
            Platform::Other => return None,
        };
        debug!(command = command.as_str(), url = %url, "manager launch url");
        Some(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SdkConfig;

    fn context(platform: Platform) -> LaunchContext {
        LaunchContext {
            platform,
            origin: "http://localhost:8080".to_string(),
            return_url: "http://localhost:8080/index.html?a=1".to_string(),
        }
    }

    #[test]
    fn test_platform_detection() {
        assert_eq!(
            Platform::from_user_agent("Mozilla/5.0 (Linux; Android 12) Chrome/120"),
            Platform::Android { firefox: false }
        );
        assert_eq!(
            Platform::from_user_agent("Mozilla/5.0 (Android 12; Mobile) Gecko Firefox/120.0"),
            Platform::Android { firefox: true }
        );
        assert_eq!(
            Platform::from_user_agent("Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)"),
            Platform::Ios
        );
        assert_eq!(Platform::from_user_agent("Mozilla/5.0 (X11; Linux)"), Platform::Other);
    }

    #[tokio::test]
    async fn test_android_intent_without_anti_spoofing() {
        let sdk = DConnectSdk::new(SdkConfig::default()).await.unwrap();
        let url = sdk
            .start_manager_url(&context(Platform::Android { firefox: false }), Some("activity"))
            .unwrap();
        assert_eq!(
            url,
            "intent://start/activity#Intent;scheme=gotapi;\
             package=org.deviceconnect.android.manager;\
             S.origin=http%3A%2F%2Flocalhost%3A8080;S.key=;end"
        );
        assert!(!sdk.is_response_authentication_active());
    }

    #[tokio::test]
    async fn test_android_firefox_issues_key() {
        let sdk = DConnectSdk::new(SdkConfig::default().anti_spoofing(true))
            .await
            .unwrap();
        let url = sdk
            .stop_manager_url(&context(Platform::Android { firefox: true }), None)
            .unwrap();
        let (prefix, key) = url.split_once("&key=").unwrap();
        assert_eq!(prefix, "gotapi://stop/?origin=http%3A%2F%2Flocalhost%3A8080");
        assert_eq!(key.len(), HMAC_KEY_BYTES * 2);
        assert!(sdk.is_response_authentication_active());
    }

    #[tokio::test]
    async fn test_ios_and_other() {
        let sdk = DConnectSdk::new(SdkConfig::default()).await.unwrap();
        assert_eq!(
            sdk.start_manager_url(&context(Platform::Ios), None).as_deref(),
            Some("gotapi://start?url=http%3A%2F%2Flocalhost%3A8080%2Findex.html%3Fa%3D1")
        );
        assert_eq!(
            sdk.stop_manager_url(&context(Platform::Ios), None).as_deref(),
            Some("gotapi://stop")
        );
        assert_eq!(sdk.start_manager_url(&context(Platform::Other), None), None);
    }

    #[tokio::test]
    async fn test_check_hmac_uses_issued_key() {
        let sdk = DConnectSdk::new(SdkConfig::default()).await.unwrap();
        assert!(sdk.check_hmac("00", None));

        sdk.set_hmac_key(Some("0102".to_string()));
        assert!(!sdk.check_hmac("00", None));
    }
}
