mod common;

use common::{query_param, MockGateway};
use dconnect::core::config::DEFAULT_APP_NAME;
use dconnect::core::profiles::INIT_SCOPES;
use dconnect::core::store::MemoryStorage;
use dconnect::{DConnectError, DConnectSdk, DispatchSnapshot, SdkConfig, SENTINEL_ACCESS_TOKEN};
use std::sync::Arc;

const STALE: &str = r#"{"clientId":"client-0","accessToken":"stale"}"#;

async fn sdk_with(
    gateway: &Arc<MockGateway>,
    storage: &Arc<MemoryStorage>,
    config: SdkConfig,
) -> DConnectSdk {
    DConnectSdk::builder(config)
        .with_transport(gateway.clone())
        .with_storage(storage.clone())
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_replayed() {
    let gateway = Arc::new(MockGateway::new().accept_only("never"));
    let storage = Arc::new(MemoryStorage::with_entry(DEFAULT_APP_NAME, STALE));
    let config = SdkConfig::default().with_scopes(vec!["servicediscovery".to_string()]);
    let sdk = sdk_with(&gateway, &storage, config).await;

    let target = sdk
        .uri_builder()
        .with_profile("battery")
        .with_attribute("level")
        .with_service_id("s1");
    let json = sdk.get(target, &[]).await.unwrap();
    assert_eq!(json["path"], "/gotapi/battery/level");

    let battery = gateway.requests_to("/battery/level");
    assert_eq!(battery.len(), 2);
    assert_eq!(query_param(&battery[0], "accessToken").as_deref(), Some("stale"));
    assert_eq!(query_param(&battery[1], "accessToken").as_deref(), Some("token-1"));
    assert_eq!(query_param(&battery[1], "serviceId").as_deref(), Some("s1"));

    // The failing profile joins the scope list before re-authorizing.
    let token_request = &gateway.requests_to("/authorization/accesstoken")[0];
    assert_eq!(
        query_param(token_request, "scope").as_deref(),
        Some("servicediscovery,battery")
    );
    assert!(sdk.contains_scope("battery"));

    assert_eq!(sdk.access_token().as_deref(), Some("token-1"));
    assert_eq!(sdk.client_id().as_deref(), Some("client-1"));
    assert!(storage.get(DEFAULT_APP_NAME).unwrap().contains("token-1"));
    assert_eq!(
        sdk.dispatch_stats(),
        DispatchSnapshot {
            requests: 1,
            reauthorizations: 1,
            replays: 1,
        }
    );
}

#[tokio::test]
async fn test_non_authorization_error_becomes_access_failed() {
    let gateway = Arc::new(MockGateway::new().fail_resources(6));
    let storage = Arc::new(MemoryStorage::with_entry(DEFAULT_APP_NAME, STALE));
    let sdk = sdk_with(&gateway, &storage, SdkConfig::default()).await;

    let err = sdk
        .get(sdk.uri_builder().with_profile("vibration").with_attribute("vibrate"), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, DConnectError::AccessFailed { .. }));
    assert_eq!(err.error_code(), -1);
    assert_eq!(err.error_message(), "Failed to access to the server.");
    let source = std::error::Error::source(&err).unwrap().to_string();
    assert!(source.contains('6'), "unexpected source: {}", source);
    assert!(gateway.requests_to("/authorization/grant").is_empty());
}

#[tokio::test]
async fn test_retry_budget_returns_authorization_error() {
    let gateway = Arc::new(MockGateway::new().fail_resources(12));
    let storage = Arc::new(MemoryStorage::with_entry(DEFAULT_APP_NAME, STALE));
    let sdk = sdk_with(&gateway, &storage, SdkConfig::default()).await;

    let err = sdk
        .get(sdk.uri_builder().with_profile("battery"), &[])
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), 12);
    assert!(err.is_authorization_class());
    assert_eq!(gateway.requests_to("/battery").len(), 2);
    assert_eq!(gateway.requests_to("/authorization/grant").len(), 1);
}

#[tokio::test]
async fn test_failed_reauthorization_is_reported() {
    let gateway = Arc::new(MockGateway::new().accept_only("never").fail_grant(18));
    let storage = Arc::new(MemoryStorage::with_entry(DEFAULT_APP_NAME, STALE));
    let sdk = sdk_with(&gateway, &storage, SdkConfig::default()).await;

    let err = sdk
        .get(sdk.uri_builder().with_profile("battery"), &[])
        .await
        .unwrap_err();

    assert!(!matches!(err, DConnectError::AccessFailed { .. }));
    assert_eq!(err.error_code(), 18);
    assert_eq!(err.error_message(), "Failed to create client.");
    assert_eq!(gateway.requests_to("/battery").len(), 1);
}

#[tokio::test]
async fn test_authorize_without_scopes_requests_catalogue() {
    let gateway = Arc::new(MockGateway::new());
    let storage = Arc::new(MemoryStorage::new());
    let sdk = sdk_with(&gateway, &storage, SdkConfig::default()).await;

    let token = sdk.authorize(&[], "").await.unwrap();
    assert_eq!(token, "token-1");

    let token_request = &gateway.requests_to("/authorization/accesstoken")[0];
    let scope = query_param(token_request, "scope").unwrap();
    assert_eq!(scope.split(',').count(), INIT_SCOPES.len());
    assert_eq!(
        query_param(token_request, "applicationName").as_deref(),
        Some(DEFAULT_APP_NAME)
    );
    assert_eq!(query_param(token_request, "clientId").as_deref(), Some("client-1"));
}

#[tokio::test]
async fn test_authorization_disabled_yields_sentinel_token() {
    for gateway in [
        MockGateway::new().fail_access_token(2),
        MockGateway::new().fail_grant(2),
    ] {
        let gateway = Arc::new(gateway);
        let storage = Arc::new(MemoryStorage::new());
        let sdk = sdk_with(&gateway, &storage, SdkConfig::default()).await;

        let token = sdk
            .authorize(&["battery".to_string()], "demo")
            .await
            .unwrap();
        assert_eq!(token, SENTINEL_ACCESS_TOKEN);
        assert_eq!(sdk.access_token().as_deref(), Some(SENTINEL_ACCESS_TOKEN));
        assert!(storage
            .get(DEFAULT_APP_NAME)
            .unwrap()
            .contains(SENTINEL_ACCESS_TOKEN));
    }
}

#[tokio::test]
async fn test_authorization_step_failures_carry_server_code() {
    let gateway = Arc::new(MockGateway::new().fail_access_token(10));
    let storage = Arc::new(MemoryStorage::new());
    let sdk = sdk_with(&gateway, &storage, SdkConfig::default()).await;

    let err = sdk.authorize(&[], "demo").await.unwrap_err();
    assert_eq!(err.error_code(), 10);
    assert_eq!(err.error_message(), "Failed to get access token.");
    assert_eq!(sdk.access_token(), None);
}

#[tokio::test]
async fn test_concurrent_failures_share_one_authorization() {
    let gateway = Arc::new(MockGateway::new().accept_only("never"));
    let storage = Arc::new(MemoryStorage::with_entry(DEFAULT_APP_NAME, STALE));
    let sdk = sdk_with(&gateway, &storage, SdkConfig::default()).await;

    let first = sdk.get(sdk.uri_builder().with_profile("battery"), &[]);
    let second = sdk.get(sdk.uri_builder().with_profile("system"), &[]);
    let (first, second) = futures::join!(first, second);

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(gateway.requests_to("/authorization/grant").len(), 1);
    assert_eq!(gateway.issued_tokens(), 1);
    let stats = sdk.dispatch_stats();
    assert_eq!(stats.requests, 2);
    assert_eq!(stats.replays, 2);
}

#[tokio::test]
async fn test_event_listener_registration_round_trip() {
    let gateway = Arc::new(MockGateway::new());
    let storage = Arc::new(MemoryStorage::with_entry(DEFAULT_APP_NAME, STALE));
    let sdk = sdk_with(&gateway, &storage, SdkConfig::default()).await;

    let target = sdk
        .uri_builder()
        .with_profile("battery")
        .with_attribute("onchargingchange")
        .with_service_id("s1");

    sdk.add_event_listener(&target, |_| {}).await.unwrap();
    assert_eq!(sdk.event_listener_count(), 1);
    assert!(sdk.has_event_listener(&target).unwrap());

    sdk.remove_event_listener(&target).await.unwrap();
    assert_eq!(sdk.event_listener_count(), 0);

    let methods: Vec<_> = gateway
        .requests_to("/battery/onchargingchange")
        .into_iter()
        .map(|r| r.method)
        .collect();
    assert_eq!(methods, [reqwest::Method::PUT, reqwest::Method::DELETE]);
}

#[tokio::test]
async fn test_rejected_subscription_leaves_registry_untouched() {
    let gateway = Arc::new(MockGateway::new().fail_resources(3));
    let storage = Arc::new(MemoryStorage::with_entry(DEFAULT_APP_NAME, STALE));
    let sdk = sdk_with(&gateway, &storage, SdkConfig::default()).await;

    let target = sdk
        .uri_builder()
        .with_profile("keyevent")
        .with_attribute("ondown");
    assert!(sdk.add_event_listener(&target, |_| {}).await.is_err());
    assert_eq!(sdk.event_listener_count(), 0);
}

#[tokio::test]
async fn test_service_discovery_helpers() {
    let gateway = Arc::new(
        MockGateway::new()
            .with_service("host", &["battery", "system"])
            .with_service("light", &["light"]),
    );
    let storage = Arc::new(MemoryStorage::with_entry(DEFAULT_APP_NAME, STALE));
    let sdk = sdk_with(&gateway, &storage, SdkConfig::default()).await;

    assert_eq!(sdk.check_device_connect().await.unwrap().as_deref(), Some("2.3.0"));
    let availability = &gateway.requests_to("/availability")[0];
    assert_eq!(query_param(availability, "accessToken"), None);

    let services = sdk.discover_devices().await.unwrap();
    assert_eq!(services.len(), 2);

    let battery = sdk.discover_devices_from_profile("battery").await.unwrap();
    assert_eq!(battery.len(), 1);
    assert_eq!(battery[0].id, "host");

    let info = sdk.service_information("light").await.unwrap();
    assert!(info.supports_profile("light"));
}

#[tokio::test]
async fn test_signed_responses_are_verified() {
    let key = "000102030405060708090a0b0c0d0e0f";
    let config = SdkConfig::default().anti_spoofing(true);

    let gateway = Arc::new(MockGateway::new().sign_with(key));
    let storage = Arc::new(MemoryStorage::with_entry(DEFAULT_APP_NAME, STALE));
    let sdk = sdk_with(&gateway, &storage, config.clone()).await;
    sdk.set_hmac_key(Some(key.to_string()));
    assert!(sdk.is_response_authentication_active());
    sdk.get(sdk.uri_builder().with_profile("system"), &[])
        .await
        .unwrap();
    assert!(query_param(&gateway.requests()[0], "nonce").is_some());

    let impostor = Arc::new(MockGateway::new().sign_with("ffffffffffffffffffffffffffffffff"));
    let sdk = sdk_with(&impostor, &storage, config).await;
    sdk.set_hmac_key(Some(key.to_string()));
    let err = sdk
        .get(sdk.uri_builder().with_profile("system"), &[])
        .await
        .unwrap_err();
    let source = std::error::Error::source(&err).unwrap().to_string();
    assert!(source.contains("invalid server"), "unexpected source: {}", source);
}
