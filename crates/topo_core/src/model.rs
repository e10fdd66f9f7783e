//! Resource definitions held by the stack graph.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cidr::{Ipv4Cidr, SubnetAllocator};
use crate::error::TopologyResult;
use crate::graph::ConstructId;

/// Visibility tier of a subnet group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubnetTier {
    Public,
    PrivateWithEgress,
}

impl SubnetTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubnetTier::Public => "public",
            SubnetTier::PrivateWithEgress => "private-with-egress",
        }
    }
}

impl fmt::Display for SubnetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named set of subnets, one per availability zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubnetGroup {
    pub name: String,
    pub tier: SubnetTier,
    pub cidr_mask: u8,
}

impl SubnetGroup {
    pub fn new(name: impl Into<String>, tier: SubnetTier, cidr_mask: u8) -> Self {
        Self {
            name: name.into(),
            tier,
            cidr_mask,
        }
    }
}

/// A concrete subnet carved from the network block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub group: String,
    pub tier: SubnetTier,
    pub availability_zone: String,
    /// 1-based position within its group.
    pub index: usize,
    pub cidr: Ipv4Cidr,
}

/// Virtual network with its allocated subnets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub cidr: Ipv4Cidr,
    pub availability_zones: Vec<String>,
    pub subnet_groups: Vec<SubnetGroup>,
    pub subnets: Vec<Subnet>,
}

impl Network {
    /// Lay out a network, carving one subnet per group and zone.
    ///
    /// Groups are allocated in declaration order and zones in order within
    /// each group, so identical inputs always give identical addresses.
    pub fn plan(
        cidr: Ipv4Cidr,
        availability_zones: Vec<String>,
        subnet_groups: Vec<SubnetGroup>,
    ) -> TopologyResult<Self> {
        let mut allocator = SubnetAllocator::new(cidr);
        let mut subnets = Vec::with_capacity(subnet_groups.len() * availability_zones.len());

        for group in &subnet_groups {
            for (i, zone) in availability_zones.iter().enumerate() {
                subnets.push(Subnet {
                    group: group.name.clone(),
                    tier: group.tier,
                    availability_zone: zone.clone(),
                    index: i + 1,
                    cidr: allocator.allocate(group.cidr_mask)?,
                });
            }
        }

        Ok(Self {
            cidr,
            availability_zones,
            subnet_groups,
            subnets,
        })
    }

    pub fn zone_count(&self) -> usize {
        self.availability_zones.len()
    }

    pub fn subnets_in(&self, tier: SubnetTier) -> Vec<&Subnet> {
        self.subnets.iter().filter(|s| s.tier == tier).collect()
    }

    pub fn has_tier(&self, tier: SubnetTier) -> bool {
        self.subnet_groups.iter().any(|g| g.tier == tier)
    }

    /// Subnets for a placement, falling back to the other tier when the
    /// preferred one is absent.
    pub fn placement(&self, preferred: SubnetTier) -> Vec<&Subnet> {
        let chosen = self.subnets_in(preferred);
        if !chosen.is_empty() {
            return chosen;
        }
        let fallback = match preferred {
            SubnetTier::Public => SubnetTier::PrivateWithEgress,
            SubnetTier::PrivateWithEgress => SubnetTier::Public,
        };
        self.subnets_in(fallback)
    }
}

/// Instance family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceClass {
    Burstable2,
    Burstable3,
    Burstable3Amd,
    Standard5,
    Compute5,
    Memory5,
}

impl InstanceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceClass::Burstable2 => "t2",
            InstanceClass::Burstable3 => "t3",
            InstanceClass::Burstable3Amd => "t3a",
            InstanceClass::Standard5 => "m5",
            InstanceClass::Compute5 => "c5",
            InstanceClass::Memory5 => "r5",
        }
    }

    pub fn is_burstable(&self) -> bool {
        matches!(
            self,
            InstanceClass::Burstable2 | InstanceClass::Burstable3 | InstanceClass::Burstable3Amd
        )
    }
}

/// Instance size within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceSize {
    Nano,
    Micro,
    Small,
    Medium,
    Large,
    Xlarge,
}

impl InstanceSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceSize::Nano => "nano",
            InstanceSize::Micro => "micro",
            InstanceSize::Small => "small",
            InstanceSize::Medium => "medium",
            InstanceSize::Large => "large",
            InstanceSize::Xlarge => "xlarge",
        }
    }
}

/// Instance class and size, rendered as `t3.micro`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceType {
    pub class: InstanceClass,
    pub size: InstanceSize,
}

impl InstanceType {
    pub fn of(class: InstanceClass, size: InstanceSize) -> Self {
        Self { class, size }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class.as_str(), self.size.as_str())
    }
}

/// Managed database engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    Postgres,
    Mysql,
    Mariadb,
}

impl DatabaseEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseEngine::Postgres => "postgres",
            DatabaseEngine::Mysql => "mysql",
            DatabaseEngine::Mariadb => "mariadb",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            DatabaseEngine::Postgres => 5432,
            DatabaseEngine::Mysql | DatabaseEngine::Mariadb => 3306,
        }
    }

    pub fn master_username(&self) -> &'static str {
        match self {
            DatabaseEngine::Postgres => "postgres",
            DatabaseEngine::Mysql | DatabaseEngine::Mariadb => "admin",
        }
    }
}

/// Machine image used by a compute pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MachineImage {
    AmazonLinux,
    AmazonLinux2,
    AmazonLinux2023,
    Ami(String),
}

impl MachineImage {
    /// Public SSM parameter resolving to the latest image, if any.
    pub fn ssm_parameter(&self) -> Option<&'static str> {
        match self {
            MachineImage::AmazonLinux => {
                Some("/aws/service/ami-amazon-linux-latest/amzn-ami-hvm-x86_64-gp2")
            }
            MachineImage::AmazonLinux2 => {
                Some("/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2")
            }
            MachineImage::AmazonLinux2023 => {
                Some("/aws/service/ami-amazon-linux-latest/al2023-ami-kernel-default-x86_64")
            }
            MachineImage::Ami(_) => None,
        }
    }

    /// Value placed in the launch template's image id.
    pub fn image_id(&self) -> String {
        match self {
            MachineImage::Ami(id) => id.clone(),
            other => format!(
                "{{{{resolve:ssm:{}}}}}",
                other.ssm_parameter().unwrap_or_default()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInstance {
    pub network: ConstructId,
    pub engine: DatabaseEngine,
    pub engine_version: String,
    pub instance_type: InstanceType,
    pub allocated_storage_gib: u32,
}

impl DatabaseInstance {
    /// RDS instance class, e.g. `db.t3.micro`.
    pub fn instance_class(&self) -> String {
        format!("db.{}", self.instance_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputePool {
    pub network: ConstructId,
    pub instance_type: InstanceType,
    pub machine_image: MachineImage,
    pub min_capacity: u32,
    pub max_capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub network: ConstructId,
    pub internet_facing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    pub load_balancer: ConstructId,
    pub port: u16,
    pub target_groups: Vec<ConstructId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub network: ConstructId,
    pub port: u16,
    pub targets: Vec<ConstructId>,
}

/// Kind of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Network,
    DatabaseInstance,
    ComputePool,
    LoadBalancer,
    Listener,
    TargetGroup,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Network => "network",
            ResourceKind::DatabaseInstance => "database-instance",
            ResourceKind::ComputePool => "compute-pool",
            ResourceKind::LoadBalancer => "load-balancer",
            ResourceKind::Listener => "listener",
            ResourceKind::TargetGroup => "target-group",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            ResourceKind::Network,
            ResourceKind::DatabaseInstance,
            ResourceKind::ComputePool,
            ResourceKind::LoadBalancer,
            ResourceKind::Listener,
            ResourceKind::TargetGroup,
        ]
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Resource {
    Network(Network),
    DatabaseInstance(DatabaseInstance),
    ComputePool(ComputePool),
    LoadBalancer(LoadBalancer),
    Listener(Listener),
    TargetGroup(TargetGroup),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Network(_) => ResourceKind::Network,
            Resource::DatabaseInstance(_) => ResourceKind::DatabaseInstance,
            Resource::ComputePool(_) => ResourceKind::ComputePool,
            Resource::LoadBalancer(_) => ResourceKind::LoadBalancer,
            Resource::Listener(_) => ResourceKind::Listener,
            Resource::TargetGroup(_) => ResourceKind::TargetGroup,
        }
    }

    /// Outgoing references with the kind each one must resolve to.
    pub fn references(&self) -> Vec<(&ConstructId, ResourceKind)> {
        match self {
            Resource::Network(_) => Vec::new(),
            Resource::DatabaseInstance(db) => vec![(&db.network, ResourceKind::Network)],
            Resource::ComputePool(pool) => vec![(&pool.network, ResourceKind::Network)],
            Resource::LoadBalancer(lb) => vec![(&lb.network, ResourceKind::Network)],
            Resource::Listener(listener) => {
                let mut refs = vec![(&listener.load_balancer, ResourceKind::LoadBalancer)];
                refs.extend(
                    listener
                        .target_groups
                        .iter()
                        .map(|id| (id, ResourceKind::TargetGroup)),
                );
                refs
            }
            Resource::TargetGroup(tg) => {
                let mut refs = vec![(&tg.network, ResourceKind::Network)];
                refs.extend(tg.targets.iter().map(|id| (id, ResourceKind::ComputePool)));
                refs
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_plan_default_layout() {
        let network = Network::plan(
            "10.1.0.0/16".parse().unwrap(),
            vec!["us-east-1a".into(), "us-east-1b".into()],
            vec![
                SubnetGroup::new("Public", SubnetTier::Public, 24),
                SubnetGroup::new("Private", SubnetTier::PrivateWithEgress, 24),
            ],
        )
        .unwrap();

        let cidrs: Vec<String> = network.subnets.iter().map(|s| s.cidr.to_string()).collect();
        assert_eq!(
            cidrs,
            vec!["10.1.0.0/24", "10.1.1.0/24", "10.1.2.0/24", "10.1.3.0/24"]
        );
        assert_eq!(network.subnets_in(SubnetTier::Public).len(), 2);
        assert_eq!(network.subnets[3].availability_zone, "us-east-1b");
        assert_eq!(network.subnets[3].index, 2);
    }

    #[test]
    fn test_network_placement_fallback() {
        let network = Network::plan(
            "10.0.0.0/24".parse().unwrap(),
            vec!["eu-west-1a".into()],
            vec![SubnetGroup::new("Public", SubnetTier::Public, 26)],
        )
        .unwrap();
        let placed = network.placement(SubnetTier::PrivateWithEgress);
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].tier, SubnetTier::Public);
    }

    #[test]
    fn test_network_plan_exhausted() {
        let result = Network::plan(
            "10.0.0.0/24".parse().unwrap(),
            vec!["a".into(), "b".into(), "c".into()],
            vec![SubnetGroup::new("Public", SubnetTier::Public, 25)],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_instance_type_display() {
        let t = InstanceType::of(InstanceClass::Burstable3, InstanceSize::Micro);
        assert_eq!(t.to_string(), "t3.micro");
        assert!(t.class.is_burstable());
    }

    #[test]
    fn test_machine_image_id() {
        assert_eq!(
            MachineImage::AmazonLinux.image_id(),
            "{{resolve:ssm:/aws/service/ami-amazon-linux-latest/amzn-ami-hvm-x86_64-gp2}}"
        );
        assert_eq!(MachineImage::Ami("ami-123".into()).image_id(), "ami-123");
    }

    #[test]
    fn test_listener_references() {
        let listener = Resource::Listener(Listener {
            load_balancer: ConstructId::new("LB").unwrap(),
            port: 8080,
            target_groups: vec![ConstructId::new("Target").unwrap()],
        });
        let refs = listener.references();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].1, ResourceKind::LoadBalancer);
        assert_eq!(refs[1].1, ResourceKind::TargetGroup);
    }
}
