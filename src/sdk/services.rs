use crate::core::errors::DConnectError;
use crate::core::profiles::{availability, service_discovery, service_information, system};
use crate::core::types::{ServiceDescriptor, ServiceDiscoveryResponse, ServiceInformation};
use crate::core::uri::UriBuilder;
use crate::sdk::DConnectSdk;
use serde_json::Value;
use tracing::{debug, instrument};

impl DConnectSdk {
    /// Check that a gateway is listening; returns its version if it reports one.
    ///
    /// Availability is open to unauthenticated clients, so no token is sent.
    #[instrument(skip(self))]
    pub async fn check_device_connect(&self) -> Result<Option<String>, DConnectError> {
        let uri = UriBuilder::new(&self.inner.config, None)
            .with_profile(availability::PROFILE_NAME);
        let json = self.get(uri, &[]).await?;
        Ok(json
            .get(availability::PARAM_VERSION)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    #[instrument(skip(self))]
    pub async fn discover_devices(&self) -> Result<Vec<ServiceDescriptor>, DConnectError> {
        let uri = self
            .uri_builder()
            .with_profile(service_discovery::PROFILE_NAME);
        let json = self.get(uri, &[]).await?;
        let response: ServiceDiscoveryResponse = serde_json::from_value(json)?;
        debug!(count = response.services.len(), "services discovered");
        Ok(response.services)
    }

    #[instrument(skip(self))]
    pub async fn service_information(
        &self,
        service_id: &str,
    ) -> Result<ServiceInformation, DConnectError> {
        let uri = self
            .uri_builder()
            .with_profile(service_information::PROFILE_NAME)
            .with_service_id(service_id);
        let json = self.get(uri, &[]).await?;
        Ok(serde_json::from_value(json)?)
    }

    pub async fn system_info(&self) -> Result<Value, DConnectError> {
        let uri = self.uri_builder().with_profile(system::PROFILE_NAME);
        self.get(uri, &[]).await
    }

    /// Services whose information lists `profile` among the supported ones
    ///
    /// Lookups run one after another; the first failure fails the call.
    #[instrument(skip(self))]
    pub async fn discover_devices_from_profile(
        &self,
        profile: &str,
    ) -> Result<Vec<ServiceDescriptor>, DConnectError> {
        let mut supported = Vec::new();
        for service in self.discover_devices().await? {
            let info = self.service_information(&service.id).await?;
            if info.supports_profile(profile) {
                supported.push(service);
            }
        }
        Ok(supported)
    }
}
