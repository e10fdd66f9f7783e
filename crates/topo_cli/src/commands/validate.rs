//! Validate command - Check a topology configuration.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use topo_core::TopologyError;

#[derive(Args, Debug, Default)]
pub struct ValidateArgs {
    /// Topology configuration file; the built-in topology when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    info!("Validating topology for network {}", config.network.cidr);

    println!("📋 Validating topology...");
    let result = config.validate();

    for warning in &result.warnings {
        println!("   ⚠️  {}", warning);
    }

    if result.valid {
        println!("   ✅ Topology is valid");
        return Ok(());
    }

    println!("   ❌ Topology validation failed:");
    for error in &result.errors {
        println!("      - {}", error);
    }
    Err(TopologyError::InvalidConfig(result.errors).into())
}
