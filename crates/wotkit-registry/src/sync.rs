//! Thing registry synchronizer.
//!
//! Keeps the gateway's resource list and its [`ThingDocument`], and mirrors
//! them to the registry:
//!
//! | operation           | request                                   |
//! |---------------------|-------------------------------------------|
//! | `register`          | `POST /<collection>`                      |
//! | `update`            | `PUT /<collection>/<thingId>`             |
//! | `delete`            | `DELETE /<collection>/<thingId>`          |
//! | `publish_reading`   | `POST /<collection>/<thingId>/<sensorId>` |
//! | `list_things`       | `GET /<collection>`                       |
//!
//! # Registration state
//!
//! ```text
//!             register (POST ok)
//!  ┌──────┐ ─────────────────────► ┌───────────┐
//!  │ None │                        │ Confirmed │ ◄─┐ update (PUT)
//!  └──────┘ ◄───────────────────── └───────────┘ ──┘
//!     │         delete (DELETE ok)       ▲
//!     │ register (POST failed)           │ register (POST ok)
//!     ▼                                  │
//!  ┌─────────────┐ ──────────────────────┘
//!  │ Unconfirmed │
//!  └─────────────┘
//! ```
//!
//! `update` and `delete` need a confirmed registration. A failed request is
//! reported to the caller and never retried.
//!
//! # Isolation
//!
//! Registry calls are serialized with each other, but the resource list is
//! never locked while a request is in flight, so a hung registry does not
//! block sensor creation or reading publication elsewhere in the gateway.

use crate::thing::{ResourceDescriptor, ThingDocument};
use crate::transport::{RegistryRequest, RegistryTransport};
use chrono::Utc;
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use wotkit_core::constants::THING_TIME_FORMAT;
use wotkit_core::{Error, GatewayConfig, GatewayMetadata, Result, SensorValue};

#[derive(Debug, Default)]
struct SyncState {
    resources: Vec<ResourceDescriptor>,
    extra_ids: HashSet<String>,
    document: Option<ThingDocument>,
    confirmed: bool,
}

impl SyncState {
    fn upsert(&mut self, descriptor: ResourceDescriptor) {
        match self.resources.iter_mut().find(|r| r.id == descriptor.id) {
            Some(existing) => *existing = descriptor,
            None => self.resources.push(descriptor),
        }
    }

    fn descriptor(&self, id: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|r| r.id == id)
    }
}

struct SyncInner<T> {
    transport: T,
    thing_id: String,
    collection: String,
    access_address: String,
    state: Mutex<SyncState>,
    calls: Mutex<()>,
    closed: AtomicBool,
}

/// Mirrors the gateway thing to the registry.
///
/// Cloning is cheap; clones share the resource list and the document, so a
/// clone can be moved into a separate task for publication.
pub struct ThingSynchronizer<T> {
    inner: Arc<SyncInner<T>>,
}

impl<T> Clone for ThingSynchronizer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: RegistryTransport> ThingSynchronizer<T> {
    /// Create a synchronizer for `thing_id`.
    pub fn new(
        transport: T,
        thing_id: impl Into<String>,
        collection: impl Into<String>,
        access_address: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                transport,
                thing_id: thing_id.into(),
                collection: collection.into().trim_matches('/').to_string(),
                access_address: access_address.into(),
                state: Mutex::new(SyncState::default()),
                calls: Mutex::new(()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Create a synchronizer from the gateway configuration.
    pub fn from_config(transport: T, config: &GatewayConfig) -> Self {
        Self::new(
            transport,
            &config.thing_id,
            &config.registry_collection,
            config.access_address(),
        )
    }

    /// Gateway thing id.
    pub fn thing_id(&self) -> &str {
        &self.inner.thing_id
    }

    /// Add a resource descriptor, replacing any descriptor with the same id.
    pub async fn add_resource(&self, descriptor: ResourceDescriptor) {
        debug!(resource = %descriptor.id, category = %descriptor.category, "Resource added");
        self.inner.state.lock().await.upsert(descriptor);
    }

    /// Snapshot of the resource list.
    pub async fn resources(&self) -> Vec<ResourceDescriptor> {
        self.inner.state.lock().await.resources.clone()
    }

    /// Last document built by `register` or `update`.
    pub async fn document(&self) -> Option<ThingDocument> {
        self.inner.state.lock().await.document.clone()
    }

    /// Check if the registry confirmed the registration.
    pub async fn is_registered(&self) -> bool {
        self.inner.state.lock().await.confirmed
    }

    /// Check if the synchronizer refuses further calls.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Refuse every further registry call. Requests already sent are not undone.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            info!(thing = %self.inner.thing_id, "Thing synchronizer closed");
        }
    }

    /// Build the thing document and create it in the registry.
    ///
    /// `extra` resources (e.g. actuators no sensor creation produced) are
    /// upserted into the resource list first, so registering twice with the
    /// same inputs publishes the same resources.
    ///
    /// The document is stored before the request is sent. If the request
    /// fails it stays stored but unconfirmed.
    ///
    /// # Errors
    ///
    /// - `Error::ShuttingDown` after [`close`](Self::close)
    /// - `Error::RegistryTransport` if the registry call failed
    pub async fn register(
        &self,
        metadata: &GatewayMetadata,
        extra: Vec<ResourceDescriptor>,
    ) -> Result<ThingDocument> {
        self.ensure_open()?;
        let _call = self.inner.calls.lock().await;

        let document = {
            let mut state = self.inner.state.lock().await;
            for descriptor in extra {
                state.extra_ids.insert(descriptor.id.clone());
                state.upsert(descriptor);
            }

            let document = ThingDocument::build(
                &self.inner.thing_id,
                &self.inner.access_address,
                metadata,
                state.resources.clone(),
                Utc::now(),
            );
            state.document = Some(document.clone());
            state.confirmed = false;
            document
        };

        let body = serde_json::to_value(&document)?;
        self.send(RegistryRequest::post(self.collection_path(), body))
            .await?;

        self.inner.state.lock().await.confirmed = true;
        info!(
            thing = %self.inner.thing_id,
            resources = document.resources().len(),
            "Thing registered"
        );
        Ok(document)
    }

    /// Refresh the stored document's resources and replace it in the registry.
    ///
    /// # Errors
    ///
    /// - `Error::NotRegistered` before a confirmed `register`
    /// - `Error::ShuttingDown` after [`close`](Self::close)
    /// - `Error::RegistryTransport` if the registry call failed
    pub async fn update(&self) -> Result<()> {
        self.ensure_open()?;
        let _call = self.inner.calls.lock().await;

        let document = {
            let mut state = self.inner.state.lock().await;
            if !state.confirmed {
                return Err(Error::NotRegistered);
            }
            let resources = state.resources.clone();
            let document = state.document.as_mut().ok_or(Error::NotRegistered)?;
            document.metadata.resources = resources;
            document.clone()
        };

        let body = serde_json::to_value(&document)?;
        self.send(RegistryRequest::put(self.thing_path(), body))
            .await?;

        info!(thing = %self.inner.thing_id, "Thing updated");
        Ok(())
    }

    /// Remove the thing from the registry.
    ///
    /// On success the stored document and the extra resources given to
    /// `register` are dropped; sensor descriptors stay so the thing can be
    /// registered again.
    ///
    /// # Errors
    ///
    /// - `Error::NotRegistered` before a confirmed `register`
    /// - `Error::ShuttingDown` after [`close`](Self::close)
    /// - `Error::RegistryTransport` if the registry call failed
    pub async fn delete(&self) -> Result<()> {
        self.ensure_open()?;
        let _call = self.inner.calls.lock().await;

        if !self.inner.state.lock().await.confirmed {
            return Err(Error::NotRegistered);
        }

        self.send(RegistryRequest::delete(self.thing_path()))
            .await?;

        let mut state = self.inner.state.lock().await;
        let extra_ids = std::mem::take(&mut state.extra_ids);
        state.resources.retain(|r| !extra_ids.contains(&r.id));
        state.document = None;
        state.confirmed = false;

        info!(thing = %self.inner.thing_id, "Thing deleted");
        Ok(())
    }

    /// Push one value of a sensor to the registry.
    ///
    /// The value is published as `{"<attribute>": value}` under the first
    /// attribute of the sensor's descriptor. Returns `Ok(false)` without any
    /// request when the sensor has no descriptor or the descriptor has no
    /// attribute.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument` if `sensor_id` is empty
    /// - `Error::ShuttingDown` after [`close`](Self::close)
    /// - `Error::RegistryTransport` if the registry call failed
    pub async fn publish_reading(&self, sensor_id: &str, value: SensorValue) -> Result<bool> {
        if sensor_id.trim().is_empty() {
            return Err(Error::invalid_argument("sensor id can not be empty"));
        }
        self.ensure_open()?;

        let attribute = {
            let state = self.inner.state.lock().await;
            state
                .descriptor(sensor_id)
                .and_then(|d| d.canonical_attribute())
                .map(str::to_string)
        };
        let Some(attribute) = attribute else {
            debug!(sensor = sensor_id, "No descriptor attribute, reading not published");
            return Ok(false);
        };

        let mut values = Map::new();
        values.insert(attribute, serde_json::to_value(&value)?);
        let body = json!({
            "time": Utc::now().format(THING_TIME_FORMAT).to_string(),
            "value": Value::Object(values),
        });

        self.send(RegistryRequest::post(
            format!("{}/{}", self.thing_path(), sensor_id),
            body,
        ))
        .await?;
        Ok(true)
    }

    /// List the things known to the registry.
    ///
    /// # Errors
    ///
    /// - `Error::ShuttingDown` after [`close`](Self::close)
    /// - `Error::RegistryTransport` if the registry call failed
    /// - `Error::Json` if the registry answered with invalid JSON
    pub async fn list_things(&self) -> Result<Value> {
        self.ensure_open()?;
        let response = self.send(RegistryRequest::get(self.collection_path())).await?;
        if response.body.trim().is_empty() {
            return Ok(Value::Array(Vec::new()));
        }
        response.json()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ShuttingDown);
        }
        Ok(())
    }

    async fn send(&self, request: RegistryRequest) -> Result<crate::transport::RegistryResponse> {
        let method = request.method;
        let path = request.path.clone();

        self.inner.transport.send(request).await.inspect_err(|e| {
            warn!(thing = %self.inner.thing_id, %method, path = %path, error = %e, "Registry call failed");
        })
    }

    fn collection_path(&self) -> String {
        format!("/{}", self.inner.collection)
    }

    fn thing_path(&self) -> String {
        format!("/{}/{}", self.inner.collection, self.inner.thing_id)
    }
}
