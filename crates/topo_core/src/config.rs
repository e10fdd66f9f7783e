//! Declarative topology configuration.
//!
//! Every field has a default, and the defaults describe the reference stack:
//! a two-zone VPC on `10.1.0.0/16`, a PostgreSQL instance, an unattached
//! compute pool and a public load balancer forwarding port 8080 to a second
//! compute pool. Partial config files only override what they name.

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cidr::Ipv4Cidr;
use crate::error::{TopologyError, TopologyResult};
use crate::model::{
    DatabaseEngine, InstanceClass, InstanceSize, InstanceType, MachineImage, SubnetGroup,
    SubnetTier,
};
use crate::validator::{ConfigValidator, ValidationResult};

/// Stack name used when none is given.
pub const DEFAULT_STACK_NAME: &str = "AwsCdkTestStack";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TopologyConfig {
    pub network: NetworkConfig,
    pub database: DatabaseConfig,
    /// Pool declared alongside the routed one but not attached to any listener.
    pub compute: ComputePoolConfig,
    pub load_balancer: LoadBalancerConfig,
}

impl TopologyConfig {
    /// Load configuration from a YAML, JSON or TOML file.
    pub fn from_file(path: &Path) -> TopologyResult<Self> {
        let content = fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        let parse_error = |message: String| TopologyError::ConfigParse {
            path: path.to_path_buf(),
            message,
        };
        let config = match ext.as_deref() {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
            Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
            _ => return Err(TopologyError::UnsupportedConfigFormat(path.to_path_buf())),
        };

        debug!("Loaded topology config from {:?}", path);
        Ok(config)
    }

    /// Save configuration as YAML.
    pub fn to_file(&self, path: &Path) -> TopologyResult<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check the configuration, collecting every problem found.
    pub fn validate(&self) -> ValidationResult {
        ConfigValidator::validate(self)
    }

    /// All construct ids the configuration declares, in build order.
    pub fn construct_ids(&self) -> Vec<&str> {
        let listener = &self.load_balancer.listener;
        vec![
            self.network.id.as_str(),
            self.database.id.as_str(),
            self.compute.id.as_str(),
            self.load_balancer.id.as_str(),
            listener.id.as_str(),
            listener.target.pool.id.as_str(),
            listener.target.id.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub id: String,
    pub cidr: Ipv4Cidr,
    pub max_azs: u8,
    pub subnets: Vec<SubnetGroup>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            id: "MyVPC".to_string(),
            cidr: Ipv4Cidr::from_aligned(Ipv4Addr::new(10, 1, 0, 0), 16),
            max_azs: 2,
            subnets: vec![
                SubnetGroup::new("Public", SubnetTier::Public, 24),
                SubnetGroup::new("Private", SubnetTier::PrivateWithEgress, 24),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub id: String,
    pub engine: DatabaseEngine,
    pub engine_version: String,
    pub instance_type: InstanceType,
    pub allocated_storage_gib: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            id: "MyDatabase".to_string(),
            engine: DatabaseEngine::Postgres,
            engine_version: "12.15".to_string(),
            instance_type: InstanceType::of(InstanceClass::Burstable3, InstanceSize::Micro),
            allocated_storage_gib: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComputePoolConfig {
    pub id: String,
    pub instance_type: InstanceType,
    pub machine_image: MachineImage,
    pub min_capacity: u32,
    pub max_capacity: u32,
}

impl Default for ComputePoolConfig {
    fn default() -> Self {
        Self {
            id: "ASG".to_string(),
            instance_type: InstanceType::of(InstanceClass::Burstable2, InstanceSize::Micro),
            machine_image: MachineImage::AmazonLinux,
            min_capacity: 1,
            max_capacity: 2,
        }
    }
}

impl ComputePoolConfig {
    pub fn named(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadBalancerConfig {
    pub id: String,
    pub internet_facing: bool,
    pub listener: ListenerConfig,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            id: "LB".to_string(),
            internet_facing: true,
            listener: ListenerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListenerConfig {
    pub id: String,
    pub port: u16,
    pub target: TargetConfig,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            id: "Listener".to_string(),
            port: 8080,
            target: TargetConfig::default(),
        }
    }
}

/// Target group routed by the listener, with the pool registered in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    pub id: String,
    pub port: u16,
    pub pool: ComputePoolConfig,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            id: "Target".to_string(),
            port: 8080,
            pool: ComputePoolConfig::named("ASGTargetGroup"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = TopologyConfig::default();
        assert_eq!(config.network.cidr.to_string(), "10.1.0.0/16");
        assert_eq!(config.network.max_azs, 2);
        assert_eq!(config.network.subnets.len(), 2);
        assert_eq!(config.database.instance_type.to_string(), "t3.micro");
        assert_eq!(config.compute.instance_type.to_string(), "t2.micro");
        assert_eq!(config.load_balancer.listener.port, 8080);
        assert_eq!(config.load_balancer.listener.target.port, 8080);
        assert_eq!(config.load_balancer.listener.target.pool.id, "ASGTargetGroup");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("topology.yaml");
        fs::write(
            &path,
            r#"
network:
  cidr: 10.20.0.0/16
  max_azs: 3
load_balancer:
  listener:
    port: 80
"#,
        )
        .unwrap();

        let config = TopologyConfig::from_file(&path).unwrap();
        assert_eq!(config.network.cidr.to_string(), "10.20.0.0/16");
        assert_eq!(config.network.max_azs, 3);
        assert_eq!(config.network.id, "MyVPC");
        assert_eq!(config.load_balancer.listener.port, 80);
        assert_eq!(config.load_balancer.listener.target.port, 8080);
        assert_eq!(config.database.engine_version, "12.15");
    }

    #[test]
    fn test_toml_and_json() {
        let dir = tempdir().unwrap();

        let toml_path = dir.path().join("topology.toml");
        fs::write(
            &toml_path,
            r#"
[compute]
min_capacity = 2
max_capacity = 4
machine_image = "amazon-linux2023"

[compute.instance_type]
class = "burstable3"
size = "small"
"#,
        )
        .unwrap();
        let config = TopologyConfig::from_file(&toml_path).unwrap();
        assert_eq!(config.compute.max_capacity, 4);
        assert_eq!(config.compute.machine_image, MachineImage::AmazonLinux2023);
        assert_eq!(config.compute.instance_type.to_string(), "t3.small");

        let json_path = dir.path().join("topology.json");
        fs::write(
            &json_path,
            r#"{"database": {"engine": "mysql", "engine_version": "8.0.35"}}"#,
        )
        .unwrap();
        let config = TopologyConfig::from_file(&json_path).unwrap();
        assert_eq!(config.database.engine, DatabaseEngine::Mysql);
        assert_eq!(config.database.id, "MyDatabase");
    }

    #[test]
    fn test_invalid_cidr_in_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("topology.yml");
        fs::write(&path, "network:\n  cidr: 10.1.0.1/16\n").unwrap();

        assert!(TopologyConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("topology.json");
        fs::write(&path, r#"{"network": {"max_azs": }"#).unwrap();

        let err = TopologyConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, TopologyError::ConfigParse { .. }));
        assert!(err.is_topology());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("topology.yaml");
        fs::write(&path, "network:\n  max_az: 3\n").unwrap();

        let err = TopologyConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("max_az"), "{}", err);

        let toml_path = dir.path().join("topology.toml");
        fs::write(&toml_path, "[load_balancer.listener]\nprot = 80\n").unwrap();
        assert!(matches!(
            TopologyConfig::from_file(&toml_path),
            Err(TopologyError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("topology.ini");
        fs::write(&path, "").unwrap();

        assert!(matches!(
            TopologyConfig::from_file(&path),
            Err(TopologyError::UnsupportedConfigFormat(_))
        ));
    }

    #[test]
    fn test_round_trip_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.yaml");
        let config = TopologyConfig::default();

        config.to_file(&path).unwrap();
        assert_eq!(TopologyConfig::from_file(&path).unwrap(), config);
    }
}
