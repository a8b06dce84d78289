use crate::core::config::DEFAULT_APP_NAME;
use crate::core::errors::DConnectError;
use crate::core::profiles::{authorization, INIT_SCOPES};
use crate::core::types::{ErrorCode, SENTINEL_ACCESS_TOKEN};
use crate::core::uri::UriBuilder;
use crate::sdk::DConnectSdk;
use reqwest::{Method, Url};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Ordered, duplicate-free list of profiles the application asks access to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSet {
    scopes: Vec<String>,
}

impl ScopeSet {
    pub fn new(scopes: impl IntoIterator<Item = String>) -> Self {
        let mut set = Self::default();
        for scope in scopes {
            set.push(scope);
        }
        set
    }

    /// The built-in catalogue of every known profile
    pub fn defaults() -> Self {
        Self::new(INIT_SCOPES.iter().map(|s| (*s).to_string()))
    }

    pub fn contains(&self, profile: &str) -> bool {
        self.scopes.iter().any(|s| s == profile)
    }

    /// Returns `false` if the profile was already present.
    pub fn push(&mut self, profile: impl Into<String>) -> bool {
        let profile = profile.into();
        if self.contains(&profile) {
            return false;
        }
        self.scopes.push(profile);
        true
    }

    /// Add the profile addressed by `uri`, i.e. the second path segment.
    pub fn append_from_uri(&mut self, uri: &str) -> bool {
        match profile_of(uri) {
            Some(profile) => self.push(profile),
            None => false,
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.scopes
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

fn profile_of(uri: &str) -> Option<String> {
    let url = Url::parse(uri).ok()?;
    let mut segments = url.path_segments()?;
    segments.next()?;
    segments
        .next()
        .filter(|s| !s.is_empty())
        .map(crate::core::uri::decode_component)
}

/// Comma-joined scope parameter
pub fn combine_scope<S: AsRef<str>>(scopes: &[S]) -> String {
    scopes
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",")
}

fn step_failure(source: &DConnectError, message: &str) -> DConnectError {
    DConnectError::Api {
        code: source.error_code(),
        message: message.to_string(),
        body: Value::Null,
    }
}

impl DConnectSdk {
    pub fn scopes(&self) -> Vec<String> {
        self.inner.scopes.read().as_slice().to_vec()
    }

    pub fn contains_scope(&self, profile: &str) -> bool {
        self.inner.scopes.read().contains(profile)
    }

    /// Add the profile addressed by `uri` to the scope set.
    pub fn append_scope(&self, uri: &str) {
        if self.inner.scopes.write().append_from_uri(uri) {
            debug!(uri = %uri, "scope added from request");
        }
    }

    fn authorization_target(&self, attribute: &str) -> UriBuilder {
        UriBuilder::new(&self.inner.config, None)
            .with_profile(authorization::PROFILE_NAME)
            .with_attribute(attribute)
    }

    /// Ask the gateway for a new client id and remember it.
    #[instrument(skip(self))]
    pub async fn create_client(&self) -> Result<String, DConnectError> {
        const FAILURE: &str = "Failed to create client.";
        let uri = self.authorization_target(authorization::ATTR_GRANT).build();
        let verifier = self.verifier();
        let json = self
            .inner
            .executor
            .execute(Method::GET, &uri, &[], None, verifier.as_deref())
            .await
            .map_err(|e| step_failure(&e, FAILURE))?;

        let client_id = json
            .get(authorization::PARAM_CLIENT_ID)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DConnectError::Api {
                code: ErrorCode::Unknown.code(),
                message: FAILURE.to_string(),
                body: json.clone(),
            })?;
        self.inner.tokens.set_client_id(Some(client_id.clone())).await?;
        Ok(client_id)
    }

    /// Exchange a client id for an access token covering `scopes`.
    #[instrument(skip(self, scopes), fields(scope_count = scopes.len()))]
    pub async fn request_access_token(
        &self,
        client_id: &str,
        scopes: &[String],
        application_name: &str,
    ) -> Result<String, DConnectError> {
        const FAILURE: &str = "Failed to get access token.";
        let uri = self
            .authorization_target(authorization::ATTR_ACCESS_TOKEN)
            .add_parameter(authorization::PARAM_CLIENT_ID, client_id)
            .add_parameter(authorization::PARAM_SCOPE, combine_scope(scopes))
            .add_parameter(authorization::PARAM_APPLICATION_NAME, application_name)
            .build();
        let verifier = self.verifier();
        let json = self
            .inner
            .executor
            .execute(Method::GET, &uri, &[], None, verifier.as_deref())
            .await
            .map_err(|e| step_failure(&e, FAILURE))?;

        json.get(authorization::PARAM_ACCESS_TOKEN)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DConnectError::Api {
                code: ErrorCode::Unknown.code(),
                message: FAILURE.to_string(),
                body: json.clone(),
            })
    }

    /// Register a client and obtain a fresh access token
    ///
    /// An empty `scopes` requests the full default catalogue. When the gateway
    /// has authorization disabled the sentinel token is stored and returned.
    /// A connected event socket is reconnected so it announces the new token.
    pub async fn authorize(
        &self,
        scopes: &[String],
        application_name: &str,
    ) -> Result<String, DConnectError> {
        let _gate = self.inner.auth_gate.lock().await;
        self.run_authorization(scopes, application_name).await
    }

    /// Authorization on behalf of a request that failed while the store was at
    /// `observed_generation`; joins a run that already replaced that token.
    pub(crate) async fn reauthorize(
        &self,
        observed_generation: u64,
    ) -> Result<String, DConnectError> {
        let _gate = self.inner.auth_gate.lock().await;
        if self.inner.tokens.generation() != observed_generation {
            if let Some(token) = self.inner.tokens.access_token() {
                debug!("token already refreshed by a concurrent request");
                return Ok(token);
            }
        }
        let scopes = self.scopes();
        let app_name = self.inner.config.app_name.clone();
        self.run_authorization(&scopes, &app_name).await
    }

    #[instrument(skip(self, scopes), fields(app = %application_name))]
    async fn run_authorization(
        &self,
        scopes: &[String],
        application_name: &str,
    ) -> Result<String, DConnectError> {
        let defaults;
        let scopes = if scopes.is_empty() {
            defaults = ScopeSet::defaults();
            defaults.as_slice()
        } else {
            scopes
        };
        let application_name = if application_name.is_empty() {
            DEFAULT_APP_NAME
        } else {
            application_name
        };

        let token = match self.create_client().await {
            Ok(client_id) => {
                match self
                    .request_access_token(&client_id, scopes, application_name)
                    .await
                {
                    Ok(token) => token,
                    Err(e) if e.is_not_supported_profile() => SENTINEL_ACCESS_TOKEN.to_string(),
                    Err(e) => return Err(e),
                }
            }
            Err(e) if e.is_not_supported_profile() => SENTINEL_ACCESS_TOKEN.to_string(),
            Err(e) => return Err(e),
        };

        if token == SENTINEL_ACCESS_TOKEN {
            warn!("gateway has authorization disabled, using sentinel token");
        } else {
            info!("access token acquired");
        }
        self.inner.tokens.set_access_token(token.clone()).await?;
        self.refresh_websocket().await;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_set_deduplicates_in_order() {
        let set = ScopeSet::new(
            ["battery", "system", "battery"]
                .into_iter()
                .map(str::to_string),
        );
        assert_eq!(set.as_slice(), ["battery", "system"]);
    }

    #[test]
    fn test_append_from_uri_uses_profile_segment() {
        let mut set = ScopeSet::new(Vec::new());
        assert!(set.append_from_uri("http://localhost:4035/gotapi/vibration/vibrate?serviceId=x"));
        assert!(!set.append_from_uri("http://localhost:4035/gotapi/vibration"));
        assert!(!set.append_from_uri("http://localhost:4035/gotapi"));
        assert!(!set.append_from_uri("not a uri"));
        assert_eq!(set.as_slice(), ["vibration"]);
    }

    #[test]
    fn test_defaults_cover_catalogue() {
        let set = ScopeSet::defaults();
        assert_eq!(set.len(), INIT_SCOPES.len());
        assert!(set.contains("battery"));
    }

    #[test]
    fn test_combine_scope() {
        assert_eq!(combine_scope(&["a", "b", "c"]), "a,b,c");
        assert_eq!(combine_scope::<&str>(&[]), "");
    }
}
