//! Common test utilities for gateway integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use wotkit_core::{Error, GatewayConfig, GatewayMetadata, Result};
use wotkit_gateway::Gateway;
use wotkit_hardware::mock::MockDriver;
use wotkit_pipeline::StateChange;
use wotkit_registry::{RegistryRequest, RegistryResponse, RegistryTransport};

pub const HTU21D: &str = "sensorjs:///i2c/0x40/htu21d/htu21d-0x40";
pub const BH1750: &str = "sensorjs:///i2c/0x23/bh1750/bh1750-0x23";
pub const DS18B20: &str = "sensorjs:///w1/28-0000/ds18b20/ds18b20-28";

/// In-memory registry transport that records every request.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    requests: Arc<Mutex<Vec<RegistryRequest>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn requests(&self) -> Vec<RegistryRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Answer every following request with `503`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl RegistryTransport for RecordingTransport {
    async fn send(&self, request: RegistryRequest) -> Result<RegistryResponse> {
        self.requests.lock().unwrap().push(request);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::transport_status(503, "unavailable"));
        }
        Ok(RegistryResponse {
            status: 200,
            body: String::new(),
        })
    }
}

/// Transport whose requests never complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct HangingTransport;

impl RegistryTransport for HangingTransport {
    async fn send(&self, _request: RegistryRequest) -> Result<RegistryResponse> {
        std::future::pending().await
    }
}

pub type TestGateway = Gateway<MockDriver, RecordingTransport>;

/// Configuration of the test gateway `pi-01`.
pub fn config() -> GatewayConfig {
    GatewayConfig::new("pi-01").metadata(
        GatewayMetadata::new("Web Of Things").with_hardware("Raspberry", "Raspberry Pi 2 B"),
    )
}

/// Start a gateway on `driver` with a fresh recording transport.
pub fn start(config: GatewayConfig, driver: &MockDriver) -> (TestGateway, RecordingTransport) {
    let transport = RecordingTransport::default();
    let gateway = Gateway::start(config, Arc::new(driver.clone()), transport.clone()).unwrap();
    (gateway, transport)
}

/// Wait for the next state change, failing the test after one second.
pub async fn next_change(changes: &mut broadcast::Receiver<StateChange>) -> StateChange {
    tokio::time::timeout(Duration::from_secs(1), changes.recv())
        .await
        .expect("no state change within 1s")
        .unwrap()
}
