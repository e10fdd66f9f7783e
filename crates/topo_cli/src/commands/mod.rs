//! CLI command definitions.
//!
//! Each subcommand builds the stack topology and does something different
//! with it: emit it, describe it, or only check the configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use topo_core::{TopologyConfig, DEFAULT_STACK_NAME};

pub mod list;
pub mod synth;
pub mod validate;

/// topo - declarative stack topology synthesizer
#[derive(Parser)]
#[command(name = "topo")]
#[command(version, about = "topo - declarative stack topology synthesizer")]
#[command(long_about = r#"
topo builds a single infrastructure stack (VPC, database, autoscaling
compute, load balancer) as a validated resource graph and synthesizes it
into a deployable template.

COMMANDS:
  synth     → Build the stack and write the cloud assembly (default)
  list      → Show the stack and its resources
  validate  → Check a topology configuration file

ENVIRONMENT:
  CDK_DEFAULT_ACCOUNT  Target account (required by synth and list)
  CDK_DEFAULT_REGION   Target region (required by synth and list)

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Missing environment configuration
  4 - Invalid configuration or topology
  5 - Emit failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the stack and emit it
    Synth(synth::SynthArgs),

    /// List the stack and its resources
    #[command(alias = "ls")]
    List(list::ListArgs),

    /// Validate a topology configuration
    Validate(validate::ValidateArgs),
}

/// Options shared by commands that build the stack.
#[derive(Args, Debug, Default)]
pub struct StackArgs {
    /// Name of the stack
    #[arg(short, long, env = "TOPO_STACK_NAME")]
    pub stack: Option<String>,

    /// Topology configuration file (.yaml, .yml, .json or .toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl StackArgs {
    pub fn stack_name(&self) -> &str {
        self.stack.as_deref().unwrap_or(DEFAULT_STACK_NAME)
    }

    pub fn load_config(&self) -> Result<TopologyConfig> {
        load_config(self.config.as_deref())
    }
}

/// Load a configuration file, or the defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<TopologyConfig> {
    match path {
        Some(path) => {
            info!("Loading topology from {:?}", path);
            TopologyConfig::from_file(path)
                .with_context(|| format!("Failed to load topology config {}", path.display()))
        }
        None => Ok(TopologyConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_stack_args_defaults() {
        let args = StackArgs::default();
        assert_eq!(args.stack_name(), DEFAULT_STACK_NAME);
        assert_eq!(args.load_config().unwrap(), TopologyConfig::default());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("topology.yaml");
        fs::write(&path, "load_balancer:\n  internet_facing: false\n").unwrap();

        let config = load_config(Some(path.as_path())).unwrap();
        assert!(!config.load_balancer.internet_facing);
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_config(Some(dir.path().join("missing.yaml").as_path())).unwrap_err();
        assert!(err.to_string().contains("Failed to load topology config"));
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["topo", "synth", "--stdout", "--format", "yaml"]).unwrap();
        match cli.command {
            Some(Commands::Synth(args)) => {
                assert!(args.stdout);
                assert!(matches!(args.format, Some(synth::OutputFormat::Yaml)));
            }
            _ => panic!("expected synth"),
        }

        let cli = Cli::try_parse_from(["topo"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["topo", "ls", "--long", "-s", "other-stack"]).unwrap();
        match cli.command {
            Some(Commands::List(args)) => {
                assert!(args.long);
                assert_eq!(args.stack.stack_name(), "other-stack");
            }
            _ => panic!("expected list"),
        }
    }
}
