//! Rendering of a stack graph into a CloudFormation template.
//!
//! Each graph node expands into the concrete resources needed to deploy it
//! (a network becomes a VPC, subnets, route tables and gateways, a compute
//! pool becomes a security group, launch template and autoscaling group).
//! Keys are emitted in sorted order so identical graphs always render to
//! identical documents.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::error::{TopologyError, TopologyResult};
use crate::graph::{ConstructId, StackGraph};
use crate::model::{
    ComputePool, DatabaseInstance, Listener, LoadBalancer, Network, Resource, Subnet, SubnetTier,
    TargetGroup,
};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

const ANY_IPV4: &str = "0.0.0.0/0";

/// Output format for rendered templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateFormat {
    #[default]
    Json,
    Yaml,
}

impl TemplateFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(TemplateFormat::Json),
            "yaml" | "yml" => Some(TemplateFormat::Yaml),
            _ => None,
        }
    }
}

/// Derive a template logical id from construct path parts.
///
/// Only ASCII alphanumerics survive, so `web-pool` and `Public` become
/// `webpoolPublic`.
pub fn logical_id(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|p| p.chars())
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

fn allow_all_egress() -> Value {
    json!([{
        "CidrIp": ANY_IPV4,
        "Description": "Allow all outbound traffic by default",
        "IpProtocol": "-1"
    }])
}

/// Render a graph to a template document.
pub fn render(graph: &StackGraph) -> TopologyResult<Value> {
    TemplateRenderer::new(graph).render()
}

/// Render a graph to a string in the requested format.
pub fn render_to_string(graph: &StackGraph, format: TemplateFormat) -> TopologyResult<String> {
    let template = render(graph)?;
    let text = match format {
        TemplateFormat::Json => serde_json::to_string_pretty(&template)?,
        TemplateFormat::Yaml => serde_yaml::to_string(&template)?,
    };
    Ok(text)
}

struct TemplateRenderer<'a> {
    graph: &'a StackGraph,
    resources: Map<String, Value>,
    outputs: Map<String, Value>,
}

impl<'a> TemplateRenderer<'a> {
    fn new(graph: &'a StackGraph) -> Self {
        Self {
            graph,
            resources: Map::new(),
            outputs: Map::new(),
        }
    }

    fn render(mut self) -> TopologyResult<Value> {
        let graph = self.graph;
        for node in graph.nodes() {
            match &node.resource {
                Resource::Network(n) => self.network(&node.id, n)?,
                Resource::DatabaseInstance(db) => self.database(&node.id, db)?,
                Resource::ComputePool(pool) => self.compute_pool(&node.id, pool)?,
                Resource::LoadBalancer(lb) => self.load_balancer(&node.id, lb)?,
                Resource::Listener(l) => self.listener(&node.id, l)?,
                Resource::TargetGroup(tg) => self.target_group(&node.id, tg)?,
            }
        }

        let mut template = json!({
            "AWSTemplateFormatVersion": TEMPLATE_FORMAT_VERSION,
            "Description": format!("Stack {} ({})", graph.stack_name(), graph.environment()),
            "Resources": Value::Object(self.resources),
        });
        if !self.outputs.is_empty() {
            template["Outputs"] = Value::Object(self.outputs);
        }
        Ok(template)
    }

    fn insert(&mut self, logical_id: String, resource: Value) -> TopologyResult<()> {
        if self.resources.contains_key(&logical_id) {
            return Err(TopologyError::DuplicateId(format!(
                "template logical id {} is produced by more than one resource",
                logical_id
            )));
        }
        self.resources.insert(logical_id, resource);
        Ok(())
    }

    fn name_tag(&self, path: &str) -> Value {
        json!([{ "Key": "Name", "Value": format!("{}/{}", self.graph.stack_name(), path) }])
    }

    fn lookup_network(&self, from: &ConstructId, id: &ConstructId) -> TopologyResult<&'a Network> {
        let graph = self.graph;
        graph
            .network(id)
            .ok_or_else(|| TopologyError::DanglingReference {
                from: from.to_string(),
                to: id.to_string(),
            })
    }

    fn subnet_id(network: &ConstructId, subnet: &Subnet) -> String {
        logical_id(&[
            network.as_str(),
            subnet.group.as_str(),
            "Subnet",
            subnet.index.to_string().as_str(),
        ])
    }

    fn subnet_refs(network: &ConstructId, subnets: &[&Subnet]) -> Value {
        Value::Array(
            subnets
                .iter()
                .map(|s| reference(&Self::subnet_id(network, s)))
                .collect(),
        )
    }

    fn network(&mut self, id: &ConstructId, network: &Network) -> TopologyResult<()> {
        let vpc = logical_id(&[id.as_str()]);
        self.insert(
            vpc.clone(),
            json!({
                "Type": "AWS::EC2::VPC",
                "Properties": {
                    "CidrBlock": network.cidr.to_string(),
                    "EnableDnsHostnames": true,
                    "EnableDnsSupport": true,
                    "InstanceTenancy": "default",
                    "Tags": self.name_tag(id.as_str())
                }
            }),
        )?;

        let igw = logical_id(&[id.as_str(), "IGW"]);
        let igw_attachment = logical_id(&[id.as_str(), "VPCGW"]);
        if network.has_tier(SubnetTier::Public) {
            self.insert(
                igw.clone(),
                json!({
                    "Type": "AWS::EC2::InternetGateway",
                    "Properties": { "Tags": self.name_tag(id.as_str()) }
                }),
            )?;
            self.insert(
                igw_attachment.clone(),
                json!({
                    "Type": "AWS::EC2::VPCGatewayAttachment",
                    "Properties": {
                        "VpcId": reference(&vpc),
                        "InternetGatewayId": reference(&igw)
                    }
                }),
            )?;
        }

        // NAT gateways live in the first public group, one per zone.
        let nat_group = network
            .subnet_groups
            .iter()
            .find(|g| g.tier == SubnetTier::Public)
            .map(|g| g.name.as_str());
        let needs_nat = network.has_tier(SubnetTier::PrivateWithEgress);

        for subnet in &network.subnets {
            let subnet_id = Self::subnet_id(id, subnet);
            let route_table = format!("{}RouteTable", subnet_id);
            let association = format!("{}RouteTableAssociation", subnet_id);
            let default_route = format!("{}DefaultRoute", subnet_id);
            let path = format!("{}/{}Subnet{}", id, subnet.group, subnet.index);
            let subnet_type = match subnet.tier {
                SubnetTier::Public => "Public",
                SubnetTier::PrivateWithEgress => "Private",
            };

            self.insert(
                subnet_id.clone(),
                json!({
                    "Type": "AWS::EC2::Subnet",
                    "Properties": {
                        "VpcId": reference(&vpc),
                        "AvailabilityZone": subnet.availability_zone,
                        "CidrBlock": subnet.cidr.to_string(),
                        "MapPublicIpOnLaunch": subnet.tier == SubnetTier::Public,
                        "Tags": [
                            { "Key": "Name", "Value": format!("{}/{}", self.graph.stack_name(), path) },
                            { "Key": "subnet-name", "Value": subnet.group },
                            { "Key": "subnet-type", "Value": subnet_type }
                        ]
                    }
                }),
            )?;
            self.insert(
                route_table.clone(),
                json!({
                    "Type": "AWS::EC2::RouteTable",
                    "Properties": {
                        "VpcId": reference(&vpc),
                        "Tags": self.name_tag(&path)
                    }
                }),
            )?;
            self.insert(
                association.clone(),
                json!({
                    "Type": "AWS::EC2::SubnetRouteTableAssociation",
                    "Properties": {
                        "RouteTableId": reference(&route_table),
                        "SubnetId": reference(&subnet_id)
                    }
                }),
            )?;

            match subnet.tier {
                SubnetTier::Public => {
                    self.insert(
                        default_route.clone(),
                        json!({
                            "Type": "AWS::EC2::Route",
                            "Properties": {
                                "RouteTableId": reference(&route_table),
                                "DestinationCidrBlock": ANY_IPV4,
                                "GatewayId": reference(&igw)
                            },
                            "DependsOn": [igw_attachment]
                        }),
                    )?;

                    if needs_nat && nat_group == Some(subnet.group.as_str()) {
                        let eip = format!("{}EIP", subnet_id);
                        self.insert(
                            eip.clone(),
                            json!({
                                "Type": "AWS::EC2::EIP",
                                "Properties": {
                                    "Domain": "vpc",
                                    "Tags": self.name_tag(&path)
                                }
                            }),
                        )?;
                        self.insert(
                            format!("{}NATGateway", subnet_id),
                            json!({
                                "Type": "AWS::EC2::NatGateway",
                                "Properties": {
                                    "SubnetId": reference(&subnet_id),
                                    "AllocationId": get_att(&eip, "AllocationId"),
                                    "Tags": self.name_tag(&path)
                                },
                                "DependsOn": [default_route, association]
                            }),
                        )?;
                    }
                }
                SubnetTier::PrivateWithEgress => {
                    let nat_host = nat_group.and_then(|group| {
                        network.subnets.iter().find(|s| {
                            s.group == group && s.availability_zone == subnet.availability_zone
                        })
                    });
                    if let Some(host) = nat_host {
                        self.insert(
                            default_route,
                            json!({
                                "Type": "AWS::EC2::Route",
                                "Properties": {
                                    "RouteTableId": reference(&route_table),
                                    "DestinationCidrBlock": ANY_IPV4,
                                    "NatGatewayId": reference(
                                        &format!("{}NATGateway", Self::subnet_id(id, host))
                                    )
                                }
                            }),
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    fn database(&mut self, id: &ConstructId, db: &DatabaseInstance) -> TopologyResult<()> {
        let network = self.lookup_network(id, &db.network)?;
        let subnets = network.placement(SubnetTier::PrivateWithEgress);

        let subnet_group = logical_id(&[id.as_str(), "SubnetGroup"]);
        let security_group = logical_id(&[id.as_str(), "SecurityGroup"]);

        self.insert(
            subnet_group.clone(),
            json!({
                "Type": "AWS::RDS::DBSubnetGroup",
                "Properties": {
                    "DBSubnetGroupDescription": format!("Subnet group for {} database", id),
                    "SubnetIds": Self::subnet_refs(&db.network, &subnets)
                }
            }),
        )?;
        self.insert(
            security_group.clone(),
            json!({
                "Type": "AWS::EC2::SecurityGroup",
                "Properties": {
                    "GroupDescription": format!("Security group for {} database", id),
                    "SecurityGroupEgress": allow_all_egress(),
                    "VpcId": reference(&logical_id(&[db.network.as_str()]))
                }
            }),
        )?;
        self.insert(
            logical_id(&[id.as_str()]),
            json!({
                "Type": "AWS::RDS::DBInstance",
                "Properties": {
                    "AllocatedStorage": db.allocated_storage_gib.to_string(),
                    "CopyTagsToSnapshot": true,
                    "DBInstanceClass": db.instance_class(),
                    "DBSubnetGroupName": reference(&subnet_group),
                    "Engine": db.engine.as_str(),
                    "EngineVersion": db.engine_version,
                    "ManageMasterUserPassword": true,
                    "MasterUsername": db.engine.master_username(),
                    "Port": db.engine.default_port().to_string(),
                    "PubliclyAccessible": false,
                    "StorageType": "gp2",
                    "VPCSecurityGroups": [get_att(&security_group, "GroupId")]
                },
                "UpdateReplacePolicy": "Snapshot",
                "DeletionPolicy": "Snapshot"
            }),
        )?;
        Ok(())
    }

    fn compute_pool(&mut self, id: &ConstructId, pool: &ComputePool) -> TopologyResult<()> {
        let graph = self.graph;
        let network = self.lookup_network(id, &pool.network)?;
        let subnets = network.placement(SubnetTier::PrivateWithEgress);

        let security_group = logical_id(&[id.as_str(), "InstanceSecurityGroup"]);
        let launch_template = logical_id(&[id.as_str(), "LaunchTemplate"]);

        self.insert(
            security_group.clone(),
            json!({
                "Type": "AWS::EC2::SecurityGroup",
                "Properties": {
                    "GroupDescription": format!("{}/{}/InstanceSecurityGroup", self.graph.stack_name(), id),
                    "SecurityGroupEgress": allow_all_egress(),
                    "Tags": self.name_tag(id.as_str()),
                    "VpcId": reference(&logical_id(&[pool.network.as_str()]))
                }
            }),
        )?;
        self.insert(
            launch_template.clone(),
            json!({
                "Type": "AWS::EC2::LaunchTemplate",
                "Properties": {
                    "LaunchTemplateData": {
                        "ImageId": pool.machine_image.image_id(),
                        "InstanceType": pool.instance_type.to_string(),
                        "SecurityGroupIds": [get_att(&security_group, "GroupId")]
                    }
                }
            }),
        )?;

        let target_groups: Vec<&ConstructId> = graph
            .dependents(id)
            .into_iter()
            .filter(|dep| graph.target_group(dep).is_some())
            .collect();

        let mut properties = json!({
            "MinSize": pool.min_capacity.to_string(),
            "MaxSize": pool.max_capacity.to_string(),
            "LaunchTemplate": {
                "LaunchTemplateId": reference(&launch_template),
                "Version": get_att(&launch_template, "LatestVersionNumber")
            },
            "VPCZoneIdentifier": Self::subnet_refs(&pool.network, &subnets)
        });
        if !target_groups.is_empty() {
            properties["TargetGroupARNs"] = Value::Array(
                target_groups
                    .iter()
                    .map(|tg| reference(&logical_id(&[tg.as_str()])))
                    .collect(),
            );
        }

        self.insert(
            logical_id(&[id.as_str()]),
            json!({
                "Type": "AWS::AutoScaling::AutoScalingGroup",
                "Properties": properties,
                "UpdatePolicy": {
                    "AutoScalingScheduledAction": { "IgnoreUnmodifiedGroupSizeProperties": true }
                }
            }),
        )?;

        // Open the instance port to every load balancer routing here.
        for tg_id in target_groups {
            let Some(tg) = graph.target_group(tg_id) else {
                continue;
            };
            for listener_id in graph.dependents(tg_id) {
                let Some(listener) = graph.listener(listener_id) else {
                    continue;
                };
                let lb_security_group =
                    logical_id(&[listener.load_balancer.as_str(), "SecurityGroup"]);
                self.insert(
                    format!("{}From{}{}", security_group, lb_security_group, tg.port),
                    json!({
                        "Type": "AWS::EC2::SecurityGroupIngress",
                        "Properties": {
                            "Description": "Load balancer to target",
                            "FromPort": tg.port,
                            "ToPort": tg.port,
                            "GroupId": get_att(&security_group, "GroupId"),
                            "IpProtocol": "tcp",
                            "SourceSecurityGroupId": get_att(&lb_security_group, "GroupId")
                        }
                    }),
                )?;
            }
        }

        Ok(())
    }

    fn load_balancer(&mut self, id: &ConstructId, lb: &LoadBalancer) -> TopologyResult<()> {
        let graph = self.graph;
        let network = self.lookup_network(id, &lb.network)?;
        let (tier, scheme) = if lb.internet_facing {
            (SubnetTier::Public, "internet-facing")
        } else {
            (SubnetTier::PrivateWithEgress, "internal")
        };
        let subnets = network.placement(tier);
        let security_group = logical_id(&[id.as_str(), "SecurityGroup"]);

        let source = if lb.internet_facing {
            ANY_IPV4.to_string()
        } else {
            network.cidr.to_string()
        };
        let ingress: Vec<Value> = graph
            .dependents(id)
            .into_iter()
            .filter_map(|dep| graph.listener(dep))
            .map(|listener| {
                json!({
                    "CidrIp": source,
                    "Description": format!("Allow from {} on port {}", source, listener.port),
                    "FromPort": listener.port,
                    "IpProtocol": "tcp",
                    "ToPort": listener.port
                })
            })
            .collect();

        self.insert(
            security_group.clone(),
            json!({
                "Type": "AWS::EC2::SecurityGroup",
                "Properties": {
                    "GroupDescription": format!("Automatically created Security Group for ELB {}/{}", self.graph.stack_name(), id),
                    "SecurityGroupEgress": allow_all_egress(),
                    "SecurityGroupIngress": ingress,
                    "VpcId": reference(&logical_id(&[lb.network.as_str()]))
                }
            }),
        )?;

        let mut resource = json!({
            "Type": "AWS::ElasticLoadBalancingV2::LoadBalancer",
            "Properties": {
                "LoadBalancerAttributes": [
                    { "Key": "deletion_protection.enabled", "Value": "false" }
                ],
                "Scheme": scheme,
                "SecurityGroups": [get_att(&security_group, "GroupId")],
                "Subnets": Self::subnet_refs(&lb.network, &subnets),
                "Type": "application"
            }
        });
        if lb.internet_facing {
            // Public balancers must wait for the internet routes.
            let routes: Vec<Value> = subnets
                .iter()
                .filter(|s| s.tier == SubnetTier::Public)
                .map(|s| Value::String(format!("{}DefaultRoute", Self::subnet_id(&lb.network, s))))
                .collect();
            resource["DependsOn"] = Value::Array(routes);

            let lb_id = logical_id(&[id.as_str()]);
            self.outputs.insert(
                format!("{}DNSName", lb_id),
                json!({ "Value": get_att(&lb_id, "DNSName") }),
            );
        }

        self.insert(logical_id(&[id.as_str()]), resource)?;
        Ok(())
    }

    fn listener(&mut self, id: &ConstructId, listener: &Listener) -> TopologyResult<()> {
        let target_arns: Vec<Value> = listener
            .target_groups
            .iter()
            .map(|tg| reference(&logical_id(&[tg.as_str()])))
            .collect();

        let default_actions = match target_arns.as_slice() {
            [] => json!([{
                "Type": "fixed-response",
                "FixedResponseConfig": { "StatusCode": "503" }
            }]),
            [single] => json!([{ "Type": "forward", "TargetGroupArn": single }]),
            many => json!([{
                "Type": "forward",
                "ForwardConfig": {
                    "TargetGroups": many
                        .iter()
                        .map(|arn| json!({ "TargetGroupArn": arn, "Weight": 1 }))
                        .collect::<Vec<_>>()
                }
            }]),
        };

        self.insert(
            logical_id(&[listener.load_balancer.as_str(), id.as_str()]),
            json!({
                "Type": "AWS::ElasticLoadBalancingV2::Listener",
                "Properties": {
                    "DefaultActions": default_actions,
                    "LoadBalancerArn": reference(&logical_id(&[listener.load_balancer.as_str()])),
                    "Port": listener.port,
                    "Protocol": "HTTP"
                }
            }),
        )
    }

    fn target_group(&mut self, id: &ConstructId, tg: &TargetGroup) -> TopologyResult<()> {
        self.insert(
            logical_id(&[id.as_str()]),
            json!({
                "Type": "AWS::ElasticLoadBalancingV2::TargetGroup",
                "Properties": {
                    "Port": tg.port,
                    "Protocol": "HTTP",
                    "TargetGroupAttributes": [
                        { "Key": "stickiness.enabled", "Value": "false" }
                    ],
                    "TargetType": "instance",
                    "VpcId": reference(&logical_id(&[tg.network.as_str()]))
                }
            }),
        )
    }
}

/// Count rendered resources of each template type.
pub fn resource_types(template: &Value) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    if let Some(resources) = template.get("Resources").and_then(Value::as_object) {
        for resource in resources.values() {
            if let Some(kind) = resource.get("Type").and_then(Value::as_str) {
                *counts.entry(kind.to_string()).or_default() += 1;
            }
        }
    }
    counts.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TopologyBuilder;
    use crate::config::TopologyConfig;
    use crate::environment::Environment;
    use crate::model::SubnetGroup;

    fn env() -> Environment {
        Environment::new("123456789012", "us-east-1").unwrap()
    }

    fn graph_for(config: TopologyConfig) -> StackGraph {
        TopologyBuilder::new(config)
            .build("CustomStack", &env())
            .unwrap()
    }

    fn collect_refs(value: &Value, refs: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(target)) = map.get("Ref") {
                    refs.push(target.clone());
                }
                if let Some(Value::Array(parts)) = map.get("Fn::GetAtt") {
                    if let Some(Value::String(target)) = parts.first() {
                        refs.push(target.clone());
                    }
                }
                map.values().for_each(|v| collect_refs(v, refs));
            }
            Value::Array(items) => items.iter().for_each(|v| collect_refs(v, refs)),
            _ => {}
        }
    }

    fn assert_refs_resolve(template: &Value) {
        let resources = template["Resources"].as_object().unwrap();
        let mut refs = Vec::new();
        collect_refs(template, &mut refs);
        for target in refs {
            assert!(resources.contains_key(&target), "unresolved reference {}", target);
        }
    }

    fn default_graph() -> StackGraph {
        let env = Environment::new("123456789012", "us-east-1").unwrap();
        TopologyBuilder::default()
            .build("AwsCdkTestStack", &env)
            .unwrap()
    }

    fn count(template: &Value, kind: &str) -> usize {
        resource_types(template)
            .into_iter()
            .find(|(k, _)| k == kind)
            .map(|(_, n)| n)
            .unwrap_or(0)
    }

    #[test]
    fn test_logical_id() {
        assert_eq!(logical_id(&["MyVPC", "Public", "Subnet", "1"]), "MyVPCPublicSubnet1");
        assert_eq!(logical_id(&["web-pool_2"]), "webpool2");
    }

    #[test]
    fn test_template_format_from_str() {
        assert_eq!(TemplateFormat::from_str("YAML"), Some(TemplateFormat::Yaml));
        assert_eq!(TemplateFormat::from_str("json"), Some(TemplateFormat::Json));
        assert_eq!(TemplateFormat::from_str("xml"), None);
    }

    #[test]
    fn test_default_template_resources() {
        let template = render(&default_graph()).unwrap();

        assert_eq!(template["AWSTemplateFormatVersion"], TEMPLATE_FORMAT_VERSION);
        assert_eq!(count(&template, "AWS::EC2::VPC"), 1);
        assert_eq!(count(&template, "AWS::EC2::Subnet"), 4);
        assert_eq!(count(&template, "AWS::EC2::NatGateway"), 2);
        assert_eq!(count(&template, "AWS::EC2::InternetGateway"), 1);
        assert_eq!(count(&template, "AWS::RDS::DBInstance"), 1);
        assert_eq!(count(&template, "AWS::AutoScaling::AutoScalingGroup"), 2);
        assert_eq!(count(&template, "AWS::ElasticLoadBalancingV2::LoadBalancer"), 1);
        assert_eq!(count(&template, "AWS::ElasticLoadBalancingV2::Listener"), 1);
        assert_eq!(count(&template, "AWS::ElasticLoadBalancingV2::TargetGroup"), 1);
    }

    #[test]
    fn test_subnet_cidrs() {
        let template = render(&default_graph()).unwrap();
        let resources = &template["Resources"];

        assert_eq!(resources["MyVPCPublicSubnet1"]["Properties"]["CidrBlock"], "10.1.0.0/24");
        assert_eq!(resources["MyVPCPublicSubnet2"]["Properties"]["CidrBlock"], "10.1.1.0/24");
        assert_eq!(resources["MyVPCPrivateSubnet1"]["Properties"]["CidrBlock"], "10.1.2.0/24");
        assert_eq!(resources["MyVPCPrivateSubnet2"]["Properties"]["CidrBlock"], "10.1.3.0/24");
        assert_eq!(
            resources["MyVPCPrivateSubnet2DefaultRoute"]["Properties"]["NatGatewayId"]["Ref"],
            "MyVPCPublicSubnet2NATGateway"
        );
    }

    #[test]
    fn test_only_routed_pool_has_target_groups() {
        let template = render(&default_graph()).unwrap();
        let resources = &template["Resources"];

        assert!(resources["ASG"]["Properties"].get("TargetGroupARNs").is_none());
        assert_eq!(
            resources["ASGTargetGroup"]["Properties"]["TargetGroupARNs"][0]["Ref"],
            "Target"
        );
        assert_eq!(
            resources["LBListener"]["Properties"]["DefaultActions"][0]["TargetGroupArn"]["Ref"],
            "Target"
        );
        assert_eq!(resources["LBListener"]["Properties"]["Port"], 8080);
    }

    #[test]
    fn test_database_properties() {
        let template = render(&default_graph()).unwrap();
        let db = &template["Resources"]["MyDatabase"]["Properties"];

        assert_eq!(db["Engine"], "postgres");
        assert_eq!(db["EngineVersion"], "12.15");
        assert_eq!(db["DBInstanceClass"], "db.t3.micro");
    }

    #[test]
    fn test_public_load_balancer_output() {
        let template = render(&default_graph()).unwrap();
        assert!(template["Outputs"].get("LBDNSName").is_some());
        assert_eq!(
            template["Resources"]["LB"]["Properties"]["Scheme"],
            "internet-facing"
        );
    }

    #[test]
    fn test_default_references_resolve() {
        assert_refs_resolve(&render(&default_graph()).unwrap());
    }

    #[test]
    fn test_custom_ids_render() {
        let mut config = TopologyConfig::default();
        config.network.id = "core-net".to_string();
        config.database.id = "orders_db".to_string();
        config.compute.id = "batch-pool".to_string();
        config.load_balancer.id = "edge_lb".to_string();
        config.load_balancer.listener.id = "http-in".to_string();
        config.load_balancer.listener.target.id = "web_targets".to_string();
        config.load_balancer.listener.target.pool.id = "web-pool".to_string();

        let template = render(&graph_for(config)).unwrap();
        let resources = &template["Resources"];

        assert_eq!(resources["corenet"]["Type"], "AWS::EC2::VPC");
        assert_eq!(resources["corenetPublicSubnet1"]["Type"], "AWS::EC2::Subnet");
        assert_eq!(resources["ordersdb"]["Type"], "AWS::RDS::DBInstance");
        assert_eq!(resources["batchpool"]["Type"], "AWS::AutoScaling::AutoScalingGroup");
        assert_eq!(resources["webpool"]["Type"], "AWS::AutoScaling::AutoScalingGroup");
        assert_eq!(resources["edgelbhttpin"]["Type"], "AWS::ElasticLoadBalancingV2::Listener");
        assert_eq!(
            resources["webpool"]["Properties"]["TargetGroupARNs"][0]["Ref"],
            "webtargets"
        );
        assert!(template["Outputs"].get("edgelbDNSName").is_some());
        assert_eq!(count(&template, "AWS::AutoScaling::AutoScalingGroup"), 2);
        assert_refs_resolve(&template);
    }

    #[test]
    fn test_id_matching_derived_key_is_rejected() {
        let mut config = TopologyConfig::default();
        config.compute.id = "MyVPCIGW".to_string();
        let graph = graph_for(config);

        let err = render(&graph).unwrap_err();
        assert!(matches!(err, TopologyError::DuplicateId(_)));
        assert!(err.to_string().contains("MyVPCIGW"));

        let mut config = TopologyConfig::default();
        config.load_balancer.listener.target.pool.id = "LBSecurityGroup".to_string();
        assert!(matches!(
            render(&graph_for(config)),
            Err(TopologyError::DuplicateId(_))
        ));

        let mut config = TopologyConfig::default();
        config.database.id = "MyVPCPublicSubnet1".to_string();
        assert!(matches!(
            render(&graph_for(config)),
            Err(TopologyError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_ids_collapsing_to_one_key_are_rejected() {
        let mut graph = StackGraph::new("CustomStack", env()).unwrap();
        for id in ["edge-net", "edge_net"] {
            let network = Network::plan(
                "10.0.0.0/16".parse().unwrap(),
                vec!["us-east-1a".to_string()],
                vec![SubnetGroup::new("Public", SubnetTier::Public, 24)],
            )
            .unwrap();
            graph
                .add(ConstructId::new(id).unwrap(), Resource::Network(network))
                .unwrap();
        }

        assert_eq!(graph.len(), 2);
        assert!(matches!(render(&graph), Err(TopologyError::DuplicateId(_))));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let graph = default_graph();
        let first = render_to_string(&graph, TemplateFormat::Json).unwrap();
        let second = render_to_string(&graph, TemplateFormat::Json).unwrap();
        assert_eq!(first, second);

        let yaml = render_to_string(&graph, TemplateFormat::Yaml).unwrap();
        assert!(yaml.contains("AWS::EC2::VPC"));
    }
}
