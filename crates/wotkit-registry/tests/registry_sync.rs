//! Integration tests for the thing synchronizer over HTTP.
//!
//! These tests run the synchronizer with the real HTTP transport against a
//! local mock registry and check the requests it receives.

mod common;

use common::{MockRegistry, Reply};
use serde_json::json;
use std::time::Duration;
use wotkit_core::{Error, GatewayConfig, GatewayMetadata, SensorValue, UnknownModelPolicy};
use wotkit_registry::{
    CapabilityMapper, HttpTransport, HttpTransportConfig, ResourceDescriptor, ThingSynchronizer,
};

fn synchronizer(registry: &MockRegistry) -> ThingSynchronizer<HttpTransport> {
    let config = GatewayConfig::new("pi-01").registry_base_url(registry.base_url.clone());
    let transport = HttpTransport::new(HttpTransportConfig::from(&config)).unwrap();
    ThingSynchronizer::from_config(transport, &config)
}

fn metadata() -> GatewayMetadata {
    GatewayMetadata::new("Web Of Things")
        .with_hardware("Raspberry", "Raspberry Pi 2 B")
        .with_domain("House")
}

async fn add_sensor(sync: &ThingSynchronizer<HttpTransport>, url: &str, id: &str) {
    let mapper = CapabilityMapper::new("pi-01", "wpx/raat", UnknownModelPolicy::Reject);
    sync.add_resource(mapper.map(url).unwrap().with_id(id)).await;
}

#[tokio::test]
async fn test_full_lifecycle() {
    let registry = MockRegistry::start().await;
    let sync = synchronizer(&registry);
    add_sensor(&sync, "sensorjs:///i2c/0x40/htu21d/htu21d-0x40", "htu21d-0x40").await;

    let camera = ResourceDescriptor::camera("pi-camera", "/wpx/raat/pi-01/camera");
    sync.register(&metadata(), vec![camera]).await.unwrap();
    add_sensor(&sync, "sensorjs:///i2c/0x23/bh1750/bh1750-0x23", "bh1750-0x23").await;
    sync.update().await.unwrap();
    assert!(
        sync.publish_reading("bh1750-0x23", SensorValue::Number(320.0))
            .await
            .unwrap()
    );
    sync.delete().await.unwrap();

    let requests = registry.requests();
    let calls: Vec<_> = requests
        .iter()
        .map(|r| (r.method.as_str(), r.path.as_str()))
        .collect();
    assert_eq!(
        calls,
        vec![
            ("POST", "/wpx/taar"),
            ("PUT", "/wpx/taar/pi-01"),
            ("POST", "/wpx/taar/pi-01/bh1750-0x23"),
            ("DELETE", "/wpx/taar/pi-01"),
        ]
    );

    let created = requests[0].json();
    assert_eq!(created["metadata"]["id"], "pi-01");
    assert_eq!(created["metadata"]["manufacturer"], "Raspberry");
    assert_eq!(created["metadata"]["resources"][0]["category"], "Humidity");
    assert_eq!(created["metadata"]["resources"][1]["id"], "pi-camera");
    assert_eq!(
        created["metadata"]["resources"][0]["operations"][0]["uri"],
        "/wpx/raat/pi-01/humidity"
    );

    let updated = requests[1].json();
    assert_eq!(updated["metadata"]["resources"].as_array().unwrap().len(), 3);

    let reading = requests[2].json();
    assert_eq!(reading["value"], json!({"light": 320.0}));
}

#[tokio::test]
async fn test_non_success_status_is_reported() {
    let registry = MockRegistry::start().await;
    let sync = synchronizer(&registry);
    registry.reply_with(Reply::with_status(500));

    let result = sync.register(&metadata(), vec![]).await;

    assert!(matches!(
        result,
        Err(Error::RegistryTransport {
            status: Some(500),
            ..
        })
    ));
    assert!(!sync.is_registered().await);
    assert!(sync.document().await.is_some());
    assert_eq!(registry.requests().len(), 1);
}

#[tokio::test]
async fn test_register_after_failure_confirms() {
    let registry = MockRegistry::start().await;
    let sync = synchronizer(&registry);

    registry.reply_with(Reply::with_status(503));
    assert!(sync.register(&metadata(), vec![]).await.is_err());

    registry.reply_with(Reply::ok());
    sync.register(&metadata(), vec![]).await.unwrap();
    assert!(sync.is_registered().await);
    sync.update().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_registry_is_reported() {
    let config = GatewayConfig::new("pi-01");
    let transport = HttpTransport::new(HttpTransportConfig {
        // Reserved port, nothing listens there
        base_url: "http://127.0.0.1:1/wpx".to_string(),
        timeout: Duration::from_millis(500),
    })
    .unwrap();
    let sync = ThingSynchronizer::from_config(transport, &config);

    let result = sync.register(&metadata(), vec![]).await;
    assert!(matches!(
        result,
        Err(Error::RegistryTransport { status: None, .. })
    ));
}

#[tokio::test]
async fn test_list_things() {
    let registry = MockRegistry::start().await;
    let sync = synchronizer(&registry);
    registry.reply_with(Reply::json(json!([{"metadata": {"id": "pi-01"}}])));

    let things = sync.list_things().await.unwrap();

    assert_eq!(things[0]["metadata"]["id"], "pi-01");
    assert_eq!(registry.requests()[0].method, "GET");
    assert_eq!(registry.requests()[0].path, "/wpx/taar");
}

#[tokio::test]
async fn test_publish_without_descriptor_sends_nothing() {
    let registry = MockRegistry::start().await;
    let sync = synchronizer(&registry);

    let published = sync
        .publish_reading("motion-17", SensorValue::Bool(true))
        .await
        .unwrap();

    assert!(!published);
    assert!(registry.requests().is_empty());
}
