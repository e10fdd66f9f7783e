//! Topology builder.

use tracing::{info, warn};

use crate::config::{ComputePoolConfig, TopologyConfig};
use crate::emitter::GraphEmitter;
use crate::environment::Environment;
use crate::error::TopologyResult;
use crate::graph::{ConstructId, StackGraph};
use crate::model::{
    ComputePool, DatabaseInstance, Listener, LoadBalancer, Network, Resource, TargetGroup,
};

/// Assembles the stack graph described by a [`TopologyConfig`].
///
/// The network is created first and every other resource hangs off it, so
/// the build order is fixed: network, database, unattached pool, load
/// balancer, listener, then the routed pool and its target group.
#[derive(Debug, Clone, Default)]
pub struct TopologyBuilder {
    config: TopologyConfig,
}

impl TopologyBuilder {
    pub fn new(config: TopologyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    /// Build the graph without emitting it.
    pub fn build(&self, stack_name: &str, environment: &Environment) -> TopologyResult<StackGraph> {
        let warnings = self.config.validate().into_result()?;
        for warning in &warnings {
            warn!("{}", warning);
        }

        let mut graph = StackGraph::new(stack_name, environment.clone())?;
        info!("Building stack {} for {}", stack_name, environment);

        let network = self.add_network(&mut graph)?;
        self.add_database(&mut graph, &network)?;
        self.add_pool(&mut graph, &self.config.compute, &network)?;

        let load_balancer = self.add_load_balancer(&mut graph, &network)?;
        let listener = self.add_listener(&mut graph, &load_balancer)?;

        let target = &self.config.load_balancer.listener.target;
        let pool = self.add_pool(&mut graph, &target.pool, &network)?;
        let target_group = graph.add(
            ConstructId::new(&target.id)?,
            Resource::TargetGroup(TargetGroup {
                network: network.clone(),
                port: target.port,
                targets: vec![pool],
            }),
        )?;
        graph.attach_target_group(&listener, &target_group)?;

        info!("Stack {} declares {} resources", stack_name, graph.len());
        Ok(graph)
    }

    /// Build the graph and hand it to an emitter.
    pub fn synth(
        &self,
        stack_name: &str,
        environment: &Environment,
        emitter: &dyn GraphEmitter,
    ) -> TopologyResult<StackGraph> {
        let graph = self.build(stack_name, environment)?;
        emitter.emit(&graph)?;
        info!("Emitted stack {}", stack_name);
        Ok(graph)
    }

    fn add_network(&self, graph: &mut StackGraph) -> TopologyResult<ConstructId> {
        let cfg = &self.config.network;
        let zones = graph.environment().availability_zones(cfg.max_azs);
        let network = Network::plan(cfg.cidr, zones, cfg.subnets.clone())?;
        graph.add(ConstructId::new(&cfg.id)?, Resource::Network(network))
    }

    fn add_database(
        &self,
        graph: &mut StackGraph,
        network: &ConstructId,
    ) -> TopologyResult<ConstructId> {
        let cfg = &self.config.database;
        graph.add(
            ConstructId::new(&cfg.id)?,
            Resource::DatabaseInstance(DatabaseInstance {
                network: network.clone(),
                engine: cfg.engine,
                engine_version: cfg.engine_version.clone(),
                instance_type: cfg.instance_type,
                allocated_storage_gib: cfg.allocated_storage_gib,
            }),
        )
    }

    fn add_pool(
        &self,
        graph: &mut StackGraph,
        cfg: &ComputePoolConfig,
        network: &ConstructId,
    ) -> TopologyResult<ConstructId> {
        graph.add(
            ConstructId::new(&cfg.id)?,
            Resource::ComputePool(ComputePool {
                network: network.clone(),
                instance_type: cfg.instance_type,
                machine_image: cfg.machine_image.clone(),
                min_capacity: cfg.min_capacity,
                max_capacity: cfg.max_capacity,
            }),
        )
    }

    fn add_load_balancer(
        &self,
        graph: &mut StackGraph,
        network: &ConstructId,
    ) -> TopologyResult<ConstructId> {
        let cfg = &self.config.load_balancer;
        graph.add(
            ConstructId::new(&cfg.id)?,
            Resource::LoadBalancer(LoadBalancer {
                network: network.clone(),
                internet_facing: cfg.internet_facing,
            }),
        )
    }

    fn add_listener(
        &self,
        graph: &mut StackGraph,
        load_balancer: &ConstructId,
    ) -> TopologyResult<ConstructId> {
        let cfg = &self.config.load_balancer.listener;
        graph.add(
            ConstructId::new(&cfg.id)?,
            Resource::Listener(Listener {
                load_balancer: load_balancer.clone(),
                port: cfg.port,
                target_groups: Vec::new(),
            }),
        )
    }
}
