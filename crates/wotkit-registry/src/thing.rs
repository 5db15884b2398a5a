//! Thing registry documents.
//!
//! JSON shapes exchanged with the thing registry. Field names follow the
//! registry's wire format (`accessAddress`, `createdTime`, `in`/`out`, ...).
//!
//! ```json
//! {
//!   "accessAddress": "http://10.0.0.2:3000/wotkit",
//!   "metadata": {
//!     "id": "pi-01",
//!     "types": ["Sensor", "Actuator"],
//!     "createdTime": "20240501120000",
//!     "expiredTime": "99990501120000",
//!     "name": "Web Of Things",
//!     "resources": [
//!       {
//!         "id": "htu21d-0x40",
//!         "type": "Sensor",
//!         "category": "Humidity",
//!         "attributes": [{ "name": "humidity", "type": "float", "unit": "percentage", ... }],
//!         "operations": [{ "type": "getValue", "method": "GET", "uri": "/wpx/raat/pi-01/humidity", "out": ["humidity"] }]
//!       }
//!     ]
//!   }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wotkit_core::GatewayMetadata;
use wotkit_core::constants::{THING_EXPIRY_FORMAT, THING_TIME_FORMAT};

/// Whether a resource measures or acts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    #[default]
    Sensor,
    Actuator,
}

impl ResourceKind {
    /// Registry name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sensor => "Sensor",
            Self::Actuator => "Actuator",
        }
    }
}

/// Physical quantity exposed by a resource.
///
/// Bounds are strings because the registry stores them as such, and empty
/// strings mean "no bound".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "type", alias = "dataType")]
    pub data_type: String,
    pub unit: String,
    pub min: String,
    pub max: String,
}

impl AttributeDescriptor {
    /// Create an attribute whose description is its name.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            data_type: data_type.into(),
            ..Default::default()
        }
    }

    /// Set the unit.
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Set the inclusive bounds.
    pub fn range(mut self, min: impl Into<String>, max: impl Into<String>) -> Self {
        self.min = min.into();
        self.max = max.into();
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// How the registry may invoke or query a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub method: String,
    pub uri: String,
    #[serde(rename = "in", skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
    #[serde(rename = "out")]
    pub outputs: Vec<String>,
}

impl OperationDescriptor {
    /// `getValue` operation returning `attribute`.
    pub fn get_value(uri: impl Into<String>, attribute: &str) -> Self {
        Self {
            kind: "getValue".to_string(),
            method: "GET".to_string(),
            uri: uri.into(),
            inputs: Vec::new(),
            outputs: vec![attribute.to_string()],
        }
    }

    /// `setState` operation taking and returning `state`.
    pub fn set_state(uri: impl Into<String>, state: &str) -> Self {
        Self {
            kind: "setState".to_string(),
            method: "POST".to_string(),
            uri: uri.into(),
            inputs: vec![state.to_string()],
            outputs: vec![state.to_string()],
        }
    }
}

/// Registry description of one sensor or actuator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub category: String,
    pub attributes: Vec<AttributeDescriptor>,
    pub operations: Vec<OperationDescriptor>,
}

impl ResourceDescriptor {
    /// Create a descriptor without attributes or operations.
    pub fn new(id: impl Into<String>, kind: ResourceKind, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            category: category.into(),
            ..Default::default()
        }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add an operation.
    pub fn with_operation(mut self, operation: OperationDescriptor) -> Self {
        self.operations.push(operation);
        self
    }

    /// Set the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Name of the attribute values are published under (the first one).
    pub fn canonical_attribute(&self) -> Option<&str> {
        self.attributes.first().map(|a| a.name.as_str())
    }

    /// Camera actuator that captures and mails a picture on `setState`.
    ///
    /// `uri` is the operation URI, usually built with
    /// [`CapabilityMapper::operation_uri`](crate::CapabilityMapper::operation_uri).
    pub fn camera(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::new(id, ResourceKind::Actuator, "Camera")
            .with_attribute(
                AttributeDescriptor::new("receiver", "string").description("receiver email address"),
            )
            .with_operation(OperationDescriptor::set_state(uri, "capture"))
    }
}

/// Registry metadata of the gateway thing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThingMetadata {
    pub id: String,
    pub types: Vec<String>,
    pub created_time: String,
    pub expired_time: String,
    #[serde(flatten)]
    pub gateway: GatewayMetadata,
    pub resources: Vec<ResourceDescriptor>,
}

/// Registry-facing aggregate describing the whole gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThingDocument {
    pub access_address: String,
    pub metadata: ThingMetadata,
}

impl ThingDocument {
    /// Assemble a document stamped at `now`.
    ///
    /// `resources` is copied into the document; later changes to the
    /// resource list are only published by the next synchronization.
    pub fn build(
        thing_id: &str,
        access_address: &str,
        gateway: &GatewayMetadata,
        resources: Vec<ResourceDescriptor>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_address: access_address.to_string(),
            metadata: ThingMetadata {
                id: thing_id.to_string(),
                types: vec![
                    ResourceKind::Sensor.as_str().to_string(),
                    ResourceKind::Actuator.as_str().to_string(),
                ],
                created_time: now.format(THING_TIME_FORMAT).to_string(),
                expired_time: now.format(THING_EXPIRY_FORMAT).to_string(),
                gateway: gateway.clone(),
                resources,
            },
        }
    }

    /// Gateway thing id.
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Resources published by this document.
    pub fn resources(&self) -> &[ResourceDescriptor] {
        &self.metadata.resources
    }
}
