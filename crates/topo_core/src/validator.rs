//! Topology configuration validation.

use std::collections::{HashMap, HashSet};

use crate::config::{ComputePoolConfig, TopologyConfig};
use crate::error::{TopologyError, TopologyResult};
use crate::graph::ConstructId;
use crate::model::{MachineImage, Network, SubnetTier};
use crate::template::logical_id;

/// Smallest network or subnet prefix a VPC accepts.
pub const MIN_PREFIX: u8 = 16;
/// Largest network or subnet prefix a VPC accepts.
pub const MAX_PREFIX: u8 = 28;
/// Smallest storage a managed database accepts.
pub const MIN_DATABASE_STORAGE_GIB: u32 = 20;
const MAX_ZONES: u8 = 26;

/// Validation result with details.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Turn accumulated errors into a single configuration error.
    pub fn into_result(self) -> TopologyResult<Vec<String>> {
        if self.valid {
            Ok(self.warnings)
        } else {
            Err(TopologyError::InvalidConfig(self.errors))
        }
    }
}

/// Validator for topology configurations.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate an entire configuration.
    pub fn validate(config: &TopologyConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        result.merge(Self::validate_ids(config));
        result.merge(Self::validate_network(config));
        result.merge(Self::validate_database(config));
        result.merge(Self::validate_pool(&config.compute));
        result.merge(Self::validate_pool(&config.load_balancer.listener.target.pool));
        result.merge(Self::validate_routing(config));

        result
    }

    fn validate_ids(config: &TopologyConfig) -> ValidationResult {
        let mut result = ValidationResult::new();
        let mut seen = HashSet::new();

        for id in config.construct_ids() {
            if let Err(e) = ConstructId::new(id) {
                result.add_error(e.to_string());
            }
            if !seen.insert(id) {
                result.add_error(format!("Construct id '{}' is used more than once", id));
            }
        }

        // Distinct ids can still collapse to one template key once
        // punctuation is stripped.
        let mut keys: HashMap<String, &str> = HashMap::new();
        for (id, key) in Self::template_keys(config) {
            match keys.get(&key) {
                Some(other) if *other != id => result.add_error(format!(
                    "Construct ids '{}' and '{}' both render as template resource '{}'",
                    other, id, key
                )),
                Some(_) => {}
                None => {
                    keys.insert(key, id);
                }
            }
        }

        result
    }

    /// Template key each declared construct renders under.
    fn template_keys(config: &TopologyConfig) -> Vec<(&str, String)> {
        let lb = config.load_balancer.id.as_str();
        config
            .construct_ids()
            .into_iter()
            .map(|id| {
                let key = if id == config.load_balancer.listener.id {
                    logical_id(&[lb, id])
                } else {
                    logical_id(&[id])
                };
                (id, key)
            })
            .collect()
    }

    /// Validate the network block and its subnet layout.
    pub fn validate_network(config: &TopologyConfig) -> ValidationResult {
        let mut result = ValidationResult::new();
        let network = &config.network;
        let prefix = network.cidr.prefix();

        if !(MIN_PREFIX..=MAX_PREFIX).contains(&prefix) {
            result.add_error(format!(
                "Network block {} must have a prefix between /{} and /{}",
                network.cidr, MIN_PREFIX, MAX_PREFIX
            ));
        }

        if network.max_azs == 0 {
            result.add_error("Network needs at least one availability zone");
        } else if network.max_azs > MAX_ZONES {
            result.add_error(format!(
                "Network supports at most {} availability zones",
                MAX_ZONES
            ));
        }

        if network.subnets.is_empty() {
            result.add_error("Network needs at least one subnet group");
        }

        let mut names = HashSet::new();
        for group in &network.subnets {
            if group.name.trim().is_empty() {
                result.add_error("Subnet group name cannot be empty");
            } else if !names.insert(group.name.as_str()) {
                result.add_error(format!("Subnet group '{}' is declared twice", group.name));
            }

            if !(MIN_PREFIX..=MAX_PREFIX).contains(&group.cidr_mask) {
                result.add_error(format!(
                    "Subnet group '{}' mask /{} must be between /{} and /{}",
                    group.name, group.cidr_mask, MIN_PREFIX, MAX_PREFIX
                ));
            }
            if group.cidr_mask < prefix {
                result.add_error(format!(
                    "Subnet group '{}' mask /{} is wider than network block {}",
                    group.name, group.cidr_mask, network.cidr
                ));
            }
        }

        let has_public = network.subnets.iter().any(|g| g.tier == SubnetTier::Public);
        let has_private = network
            .subnets
            .iter()
            .any(|g| g.tier == SubnetTier::PrivateWithEgress);
        if has_private && !has_public {
            result.add_error(
                "Private subnets with egress need a public subnet group to host NAT gateways",
            );
        }

        // Only try a layout once the individual groups are sane.
        if result.valid {
            let zones: Vec<String> = (0..network.max_azs).map(|i| format!("zone{}", i)).collect();
            if let Err(e) = Network::plan(network.cidr, zones, network.subnets.clone()) {
                result.add_error(e.to_string());
            }
        }

        result
    }

    fn validate_database(config: &TopologyConfig) -> ValidationResult {
        let mut result = ValidationResult::new();
        let db = &config.database;

        if db.engine_version.trim().is_empty() {
            result.add_error(format!("Database '{}' needs an engine version", db.id));
        }
        if db.allocated_storage_gib < MIN_DATABASE_STORAGE_GIB {
            result.add_error(format!(
                "Database '{}' needs at least {} GiB of storage",
                db.id, MIN_DATABASE_STORAGE_GIB
            ));
        }

        result
    }

    fn validate_pool(pool: &ComputePoolConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if pool.min_capacity > pool.max_capacity {
            result.add_error(format!(
                "Compute pool '{}' min capacity {} exceeds max capacity {}",
                pool.id, pool.min_capacity, pool.max_capacity
            ));
        }
        if pool.max_capacity == 0 {
            result.add_warning(format!(
                "Compute pool '{}' has max capacity 0 and will never launch instances",
                pool.id
            ));
        }
        if let MachineImage::Ami(ami) = &pool.machine_image {
            if !ami.starts_with("ami-") {
                result.add_error(format!(
                    "Compute pool '{}' image '{}' is not an AMI id",
                    pool.id, ami
                ));
            }
        }

        result
    }

    fn validate_routing(config: &TopologyConfig) -> ValidationResult {
        let mut result = ValidationResult::new();
        let listener = &config.load_balancer.listener;

        if listener.port == 0 {
            result.add_error(format!("Listener '{}' needs a non-zero port", listener.id));
        }
        if listener.target.port == 0 {
            result.add_error(format!(
                "Target group '{}' needs a non-zero port",
                listener.target.id
            ));
        }
        if listener.port != listener.target.port {
            result.add_warning(format!(
                "Listener '{}' port {} differs from target group '{}' port {}",
                listener.id, listener.port, listener.target.id, listener.target.port
            ));
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubnetGroup;

    #[test]
    fn test_default_config_is_valid() {
        let result = ConfigValidator::validate(&TopologyConfig::default());
        assert!(result.valid, "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_min_above_max() {
        let mut config = TopologyConfig::default();
        config.compute.min_capacity = 3;
        config.compute.max_capacity = 2;

        let result = ConfigValidator::validate(&config);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("min capacity")));
    }

    #[test]
    fn test_zero_zones() {
        let mut config = TopologyConfig::default();
        config.network.max_azs = 0;

        let result = ConfigValidator::validate(&config);
        assert!(!result.valid);
    }

    #[test]
    fn test_mask_wider_than_network() {
        let mut config = TopologyConfig::default();
        config.network.cidr = "10.1.0.0/24".parse().unwrap();
        config.network.subnets = vec![SubnetGroup::new("Public", SubnetTier::Public, 20)];

        let result = ConfigValidator::validate(&config);
        assert!(result.errors.iter().any(|e| e.contains("wider than")));
    }

    #[test]
    fn test_layout_does_not_fit() {
        let mut config = TopologyConfig::default();
        config.network.cidr = "10.1.0.0/24".parse().unwrap();
        config.network.max_azs = 3;
        config.network.subnets = vec![
            SubnetGroup::new("Public", SubnetTier::Public, 26),
            SubnetGroup::new("Private", SubnetTier::PrivateWithEgress, 26),
        ];

        let result = ConfigValidator::validate(&config);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("no room")));
    }

    #[test]
    fn test_private_without_public() {
        let mut config = TopologyConfig::default();
        config.network.subnets = vec![SubnetGroup::new(
            "Private",
            SubnetTier::PrivateWithEgress,
            24,
        )];

        let result = ConfigValidator::validate(&config);
        assert!(result.errors.iter().any(|e| e.contains("NAT")));
    }

    #[test]
    fn test_duplicate_ids() {
        let mut config = TopologyConfig::default();
        config.load_balancer.listener.target.pool.id = "ASG".to_string();

        let result = ConfigValidator::validate(&config);
        assert!(result.errors.iter().any(|e| e.contains("more than once")));
    }

    #[test]
    fn test_ids_colliding_as_template_keys() {
        let mut config = TopologyConfig::default();
        config.load_balancer.listener.target.pool.id = "ASG-".to_string();

        let result = ConfigValidator::validate(&config);
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("'ASG' and 'ASG-'") && e.contains("template resource 'ASG'")));

        config.load_balancer.listener.target.pool.id = "web_pool".to_string();
        config.compute.id = "web-pool".to_string();
        assert!(!ConfigValidator::validate(&config).valid);
    }

    #[test]
    fn test_punctuated_ids_are_valid() {
        let mut config = TopologyConfig::default();
        config.compute.id = "batch-pool".to_string();
        config.load_balancer.listener.target.pool.id = "web_pool".to_string();

        let result = ConfigValidator::validate(&config);
        assert!(result.valid, "errors: {:?}", result.errors);
    }

    #[test]
    fn test_port_mismatch_is_warning() {
        let mut config = TopologyConfig::default();
        config.load_balancer.listener.port = 80;

        let result = ConfigValidator::validate(&config);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_into_result() {
        let mut result = ValidationResult::new();
        result.add_warning("careful");
        assert_eq!(result.into_result().unwrap(), vec!["careful"]);

        let mut result = ValidationResult::new();
        result.add_error("broken");
        assert!(matches!(
            result.into_result(),
            Err(TopologyError::InvalidConfig(_))
        ));
    }
}
