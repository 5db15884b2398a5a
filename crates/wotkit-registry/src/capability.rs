//! Capability mapper.
//!
//! Infers the registry description of a sensor from its addressing URL by
//! matching model tokens, case-insensitively, against a fixed table. The
//! first matching entry wins, so table order matters for overlapping tokens.
//!
//! | token     | category     | attribute     | unit         | range         |
//! |-----------|--------------|---------------|--------------|---------------|
//! | `ds18b20` | Temperature  | `temperature` | `degree`     | -45.0 .. 125  |
//! | `bh1750`  | DigitalLight | `light`       | `lx`         | 1 .. 65535    |
//! | `htu21d`  | Humidity     | `humidity`    | `percentage` | 0 .. 100      |
//! | `motion`  | Motion       | `motion`      |              |               |
//!
//! Mapping is pure: no I/O, same input always gives the same descriptor.

use crate::thing::{AttributeDescriptor, OperationDescriptor, ResourceDescriptor, ResourceKind};
use tracing::debug;
use wotkit_core::{Error, GatewayConfig, Result, UnknownModelPolicy};

/// Category assigned to unrecognized models under `UnknownModelPolicy::Generic`.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

struct Capability {
    token: &'static str,
    category: &'static str,
    attribute: &'static str,
    data_type: &'static str,
    unit: &'static str,
    min: &'static str,
    max: &'static str,
}

const CAPABILITIES: &[Capability] = &[
    Capability {
        token: "ds18b20",
        category: "Temperature",
        attribute: "temperature",
        data_type: "float",
        unit: "degree",
        min: "-45.0",
        max: "125",
    },
    Capability {
        token: "bh1750",
        category: "DigitalLight",
        attribute: "light",
        data_type: "float",
        unit: "lx",
        min: "1",
        max: "65535",
    },
    Capability {
        token: "htu21d",
        category: "Humidity",
        attribute: "humidity",
        data_type: "float",
        unit: "percentage",
        min: "0",
        max: "100",
    },
    Capability {
        token: "motion",
        category: "Motion",
        attribute: "motion",
        data_type: "bool",
        unit: "",
        min: "",
        max: "",
    },
];

/// Maps addressing URLs to resource descriptors.
///
/// # Examples
///
/// ```
/// use wotkit_registry::CapabilityMapper;
/// use wotkit_core::UnknownModelPolicy;
///
/// let mapper = CapabilityMapper::new("pi-01", "wpx/raat", UnknownModelPolicy::Reject);
/// let descriptor = mapper.map("sensorjs:///i2c/0x40/htu21d/htu21d-0x40").unwrap();
///
/// assert_eq!(descriptor.category, "Humidity");
/// assert_eq!(descriptor.operations[0].uri, "/wpx/raat/pi-01/humidity");
/// assert!(descriptor.id.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityMapper {
    thing_id: String,
    operation_prefix: String,
    policy: UnknownModelPolicy,
}

impl CapabilityMapper {
    /// Create a mapper for the gateway `thing_id`.
    pub fn new(
        thing_id: impl Into<String>,
        operation_prefix: impl Into<String>,
        policy: UnknownModelPolicy,
    ) -> Self {
        Self {
            thing_id: thing_id.into(),
            operation_prefix: operation_prefix.into().trim_matches('/').to_string(),
            policy,
        }
    }

    /// Create a mapper from the gateway configuration.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            &config.thing_id,
            &config.operation_prefix,
            config.unknown_model_policy,
        )
    }

    /// Policy applied to unrecognized models.
    pub fn policy(&self) -> UnknownModelPolicy {
        self.policy
    }

    /// Operation URI for an attribute: `/<prefix>/<thingId>/<attribute>`.
    pub fn operation_uri(&self, attribute: &str) -> String {
        if self.operation_prefix.is_empty() {
            format!("/{}/{}", self.thing_id, attribute)
        } else {
            format!("/{}/{}/{}", self.operation_prefix, self.thing_id, attribute)
        }
    }

    /// Describe the resource at `url`.
    ///
    /// The descriptor's `id` is left empty for the caller to fill in.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownModel` for an unrecognized model under
    /// `UnknownModelPolicy::Reject`.
    pub fn map(&self, url: &str) -> Result<ResourceDescriptor> {
        let lowered = url.to_lowercase();

        let Some(capability) = CAPABILITIES.iter().find(|c| lowered.contains(c.token)) else {
            debug!(url, policy = ?self.policy, "No capability for model");
            return match self.policy {
                UnknownModelPolicy::Reject => Err(Error::UnknownModel(url.to_string())),
                UnknownModelPolicy::Generic => Ok(ResourceDescriptor::new(
                    "",
                    ResourceKind::Sensor,
                    UNKNOWN_CATEGORY,
                )),
                UnknownModelPolicy::Empty => Ok(ResourceDescriptor::default()),
            };
        };

        let attribute = AttributeDescriptor::new(capability.attribute, capability.data_type)
            .unit(capability.unit)
            .range(capability.min, capability.max);

        Ok(
            ResourceDescriptor::new("", ResourceKind::Sensor, capability.category)
                .with_attribute(attribute)
                .with_operation(OperationDescriptor::get_value(
                    self.operation_uri(capability.attribute),
                    capability.attribute,
                )),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn mapper(policy: UnknownModelPolicy) -> CapabilityMapper {
        CapabilityMapper::new("pi-01", "/wpx/raat/", policy)
    }

    #[rstest]
    #[case("sensorjs:///w1/28-0000/ds18b20/ds18b20-28", "Temperature", "temperature", "degree", "-45.0", "125")]
    #[case("sensorjs:///i2c/0x23/BH1750/BH1750-0x23", "DigitalLight", "light", "lx", "1", "65535")]
    #[case("sensorjs:///i2c/0x40/htu21d/htu21d-0x40", "Humidity", "humidity", "percentage", "0", "100")]
    #[case("sensorjs:///gpio/17/Motion/motion-17", "Motion", "motion", "", "", "")]
    fn test_known_models(
        #[case] url: &str,
        #[case] category: &str,
        #[case] attribute: &str,
        #[case] unit: &str,
        #[case] min: &str,
        #[case] max: &str,
    ) {
        let descriptor = mapper(UnknownModelPolicy::Reject).map(url).unwrap();

        assert_eq!(descriptor.kind, ResourceKind::Sensor);
        assert_eq!(descriptor.category, category);
        assert_eq!(descriptor.attributes.len(), 1);
        assert_eq!(descriptor.attributes[0].name, attribute);
        assert_eq!(descriptor.attributes[0].unit, unit);
        assert_eq!(descriptor.attributes[0].min, min);
        assert_eq!(descriptor.attributes[0].max, max);
        assert_eq!(descriptor.operations.len(), 1);
        assert_eq!(descriptor.operations[0].kind, "getValue");
        assert_eq!(descriptor.operations[0].method, "GET");
        assert_eq!(
            descriptor.operations[0].uri,
            format!("/wpx/raat/pi-01/{attribute}")
        );
        assert_eq!(descriptor.operations[0].outputs, vec![attribute.to_string()]);
    }

    #[test]
    fn test_first_match_wins() {
        // Contains both "ds18b20" and "motion"; table order decides.
        let descriptor = mapper(UnknownModelPolicy::Reject)
            .map("sensorjs:///w1/motion/ds18b20/ds18b20-1")
            .unwrap();
        assert_eq!(descriptor.category, "Temperature");
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let mapper = mapper(UnknownModelPolicy::Reject);
        let url = "sensorjs:///i2c/0x23/bh1750/bh1750-0x23";
        assert_eq!(mapper.map(url).unwrap(), mapper.map(url).unwrap());
    }

    #[rstest]
    #[case(UnknownModelPolicy::Generic)]
    #[case(UnknownModelPolicy::Empty)]
    #[case(UnknownModelPolicy::Reject)]
    fn test_unknown_model_policy(#[case] policy: UnknownModelPolicy) {
        let result = mapper(policy).map("sensorjs:///ble/aa:bb/hue/hue-1");

        match policy {
            UnknownModelPolicy::Reject => {
                assert!(matches!(result, Err(Error::UnknownModel(_))));
            }
            UnknownModelPolicy::Generic => {
                let descriptor = result.unwrap();
                assert_eq!(descriptor.category, UNKNOWN_CATEGORY);
                assert!(descriptor.attributes.is_empty());
                assert!(descriptor.operations.is_empty());
            }
            UnknownModelPolicy::Empty => {
                let descriptor = result.unwrap();
                assert_eq!(descriptor.category, "");
                assert!(descriptor.attributes.is_empty());
            }
        }
    }

    #[test]
    fn test_operation_uri_without_prefix() {
        let mapper = CapabilityMapper::new("pi-01", "", UnknownModelPolicy::Generic);
        assert_eq!(mapper.operation_uri("camera"), "/pi-01/camera");
    }

    #[test]
    fn test_from_config() {
        let config = GatewayConfig::new("pi-02");
        let mapper = CapabilityMapper::from_config(&config);

        assert_eq!(mapper.operation_uri("light"), "/wpx/raat/pi-02/light");
        assert_eq!(mapper.policy(), UnknownModelPolicy::Generic);
    }
}
