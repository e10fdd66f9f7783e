//! # topo_core
//!
//! Declarative resource-topology compiler for a single cloud stack.
//!
//! This crate assembles a validated, in-memory graph of infrastructure
//! resources (network, database, compute pools, load balancer routing) and
//! hands it to a [`GraphEmitter`] that renders a deployable template.
//!
//! ## Features
//!
//! - Declarative [`TopologyConfig`] with defaults for the reference stack
//! - YAML, JSON and TOML config files
//! - Sequential subnet allocation inside the network block
//! - Reference checking at construction time (no dangling or mistyped edges)
//! - CloudFormation-style template rendering and cloud assembly output
//! - Capturing emitter for tests
//!
//! ## Example
//!
//! ```rust,no_run
//! use topo_core::{AssemblyEmitter, Environment, TopologyBuilder, TopologyConfig};
//!
//! let env = Environment::from_env().unwrap();
//! let builder = TopologyBuilder::new(TopologyConfig::default());
//!
//! let graph = builder
//!     .synth("AwsCdkTestStack", &env, &AssemblyEmitter::new("cdk.out"))
//!     .unwrap();
//! println!("declared {} resources", graph.len());
//! ```

pub mod builder;
pub mod capture;
pub mod cidr;
pub mod config;
pub mod emitter;
pub mod environment;
pub mod error;
pub mod graph;
pub mod model;
pub mod template;
pub mod validator;

pub use builder::TopologyBuilder;
pub use capture::CaptureEmitter;
pub use cidr::{Ipv4Cidr, SubnetAllocator};
pub use config::{
    ComputePoolConfig, DatabaseConfig, ListenerConfig, LoadBalancerConfig, NetworkConfig,
    TargetConfig, TopologyConfig, DEFAULT_STACK_NAME,
};
pub use emitter::{AssemblyEmitter, AssemblyManifest, GraphEmitter, WriterEmitter, DEFAULT_OUT_DIR};
pub use environment::{Environment, ACCOUNT_VAR, REGION_VAR};
pub use error::{TopologyError, TopologyResult};
pub use graph::{ConstructId, Node, StackGraph};
pub use model::*;
pub use template::{render, render_to_string, TemplateFormat};
pub use validator::{ConfigValidator, ValidationResult};
