use crate::core::config::SdkConfig;
use crate::core::errors::DConnectError;
use crate::core::profiles::{common, DEFAULT_API};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Url;
use std::fmt;

/// Characters left untouched by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

pub fn decode_component(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Builder for gateway request targets
///
/// Produces `scheme://host:port/<api>/<profile>[/<interface>][/<attribute>]?k=v&...`.
/// Path segments are emitted in that fixed order and only when set; query
/// parameters keep insertion order, an overwritten key keeps its original
/// position, and parameters without a value are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriBuilder {
    scheme: String,
    host: String,
    port: u16,
    api: Option<String>,
    profile: Option<String>,
    interface: Option<String>,
    attribute: Option<String>,
    params: Vec<(String, Option<String>)>,
}

impl UriBuilder {
    /// Start a target on the configured gateway, seeded with the stored access token.
    pub fn new(config: &SdkConfig, access_token: Option<&str>) -> Self {
        let builder = Self {
            scheme: config.http_scheme().to_string(),
            host: config.host.clone(),
            port: config.port,
            api: Some(config.api.clone()),
            profile: None,
            interface: None,
            attribute: None,
            params: Vec::new(),
        };
        match access_token {
            Some(token) => builder.with_access_token(token),
            None => builder,
        }
    }

    /// Parse an already built target back into its parts.
    ///
    /// Paths are read as `/<api>/<profile>[/<interface>]/<attribute>`.
    pub fn parse(uri: &str) -> Result<Self, DConnectError> {
        let url = Url::parse(uri).map_err(|e| {
            DConnectError::InvalidParameters(format!("Invalid URI '{}': {}", uri, e))
        })?;
        let host = url
            .host_str()
            .ok_or_else(|| DConnectError::InvalidParameters(format!("URI has no host: {}", uri)))?
            .to_string();
        let port = url.port_or_known_default().unwrap_or_default();

        let segments: Vec<String> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).map(decode_component).collect())
            .unwrap_or_default();
        let mut parts = segments.into_iter();
        let api = parts.next();
        let profile = parts.next();
        let rest: Vec<String> = parts.collect();
        let (interface, attribute) = match rest.len() {
            0 => (None, None),
            1 => (None, rest.into_iter().next()),
            _ => {
                let mut rest = rest.into_iter();
                (rest.next(), rest.next())
            }
        };

        let params = url
            .query()
            .map(|q| {
                q.split('&')
                    .filter(|pair| !pair.is_empty())
                    .map(|pair| match pair.split_once('=') {
                        Some((k, v)) => (decode_component(k), Some(decode_component(v))),
                        None => (decode_component(pair), Some(String::new())),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            port,
            api,
            profile,
            interface,
            attribute,
            params,
        })
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_api(mut self, api: impl Into<String>) -> Self {
        self.api = Some(api.into());
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn with_service_id(self, service_id: impl Into<String>) -> Self {
        self.add_parameter(common::PARAM_SERVICE_ID, service_id)
    }

    pub fn with_access_token(self, access_token: impl Into<String>) -> Self {
        self.add_parameter(common::PARAM_ACCESS_TOKEN, access_token)
    }

    pub fn with_session_key(self, session_key: impl Into<String>) -> Self {
        self.add_parameter(common::PARAM_SESSION_KEY, session_key)
    }

    /// Insert or overwrite a query parameter.
    pub fn add_parameter(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_optional_parameter(key, Some(value.into()))
    }

    /// Like [`UriBuilder::add_parameter`]; a `None` value is kept but never emitted.
    pub fn add_optional_parameter(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        let key = key.into();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.params.push((key, value)),
        }
        self
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn api(&self) -> Option<&str> {
        self.api.as_deref()
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn service_id(&self) -> Option<&str> {
        self.parameter(common::PARAM_SERVICE_ID)
    }

    pub fn session_key(&self) -> Option<&str> {
        self.parameter(common::PARAM_SESSION_KEY)
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        [&self.api, &self.profile, &self.interface, &self.attribute]
            .into_iter()
            .filter_map(|s| s.as_deref())
    }

    /// Encoded path without scheme, authority, or query.
    pub fn path(&self) -> String {
        self.segments()
            .map(|s| format!("/{}", encode_component(s)))
            .collect()
    }

    /// Lower-cased `/<api>/<profile>[/<interface>][/<attribute>]` used to key events.
    pub fn event_path(&self) -> String {
        let api = self.api.as_deref().unwrap_or(DEFAULT_API);
        let mut path = format!("/{}", api);
        for segment in [&self.profile, &self.interface, &self.attribute]
            .into_iter()
            .filter_map(|s| s.as_deref())
        {
            path.push('/');
            path.push_str(segment);
        }
        path.to_lowercase()
    }

    pub fn query(&self) -> String {
        self.params
            .iter()
            .filter_map(|(k, v)| {
                v.as_ref()
                    .map(|v| format!("{}={}", encode_component(k), encode_component(v)))
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn build(&self) -> String {
        let mut uri = format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.path());
        let query = self.query();
        if !query.is_empty() {
            uri.push('?');
            uri.push_str(&query);
        }
        uri
    }
}

impl fmt::Display for UriBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

/// Append `key=value` to a built URI without touching existing parameters.
pub fn add_request_parameter(uri: &str, key: &str, value: &str) -> String {
    let sep = if uri.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", uri, sep, key, value)
}

/// Replace every occurrence of `key` in the query of `uri` with a single `key=value`.
pub fn replace_query_parameter(uri: &str, key: &str, value: &str) -> String {
    let (base, query) = uri.split_once('?').unwrap_or((uri, ""));
    let mut pairs: Vec<String> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let k = pair.split_once('=').map_or(*pair, |(k, _)| k);
            decode_component(k) != key
        })
        .map(str::to_string)
        .collect();
    pairs.push(format!("{}={}", encode_component(key), encode_component(value)));
    format!("{}?{}", base, pairs.join("&"))
}

/// Builder for Android `intent://` launch URLs.
#[derive(Debug, Clone)]
pub struct AndroidIntentBuilder {
    scheme: String,
    path: String,
    params: Vec<(String, String)>,
}

impl AndroidIntentBuilder {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            path: String::new(),
            params: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn add_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn build(&self) -> String {
        let mut url = format!("intent://{}#Intent;scheme={};", self.path, self.scheme);
        for (key, value) in &self.params {
            url.push_str(&format!("{}={};", key, value));
        }
        url.push_str("end");
        url
    }
}
