//! topo CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Missing environment configuration
//! - 4: Invalid configuration or topology
//! - 5: Emit failure

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use topo_core::TopologyError;

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const MISSING_ENVIRONMENT: u8 = 3;
    pub const INVALID_TOPOLOGY: u8 = 4;
    pub const EMIT_FAILURE: u8 = 5;
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_directives = if verbose {
        "topo=debug,topo_core=debug,warn"
    } else if quiet {
        "warn"
    } else {
        "topo=info,topo_core=info,warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    // Ignore a second initialization, e.g. when embedded in tests.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Some(Commands::Synth(args)) => commands::synth::execute(args),
        Some(Commands::List(args)) => commands::list::execute(args),
        Some(Commands::Validate(args)) => commands::validate::execute(args),
        None => commands::synth::execute(Default::default()),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let topology_error = e
        .chain()
        .find_map(|cause| cause.downcast_ref::<TopologyError>());

    match topology_error {
        Some(err) if err.is_environment() => ExitCodes::MISSING_ENVIRONMENT,
        Some(err) if err.is_topology() => ExitCodes::INVALID_TOPOLOGY,
        Some(err) if err.is_emit() => ExitCodes::EMIT_FAILURE,
        Some(_) => ExitCodes::GENERAL_ERROR,
        None if e.to_string().to_lowercase().contains("argument") => ExitCodes::INVALID_ARGS,
        None => ExitCodes::GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_categorize_missing_environment() {
        let err = anyhow::Error::new(TopologyError::MissingEnvironment(vec![
            topo_core::ACCOUNT_VAR.to_string(),
        ]));
        assert_eq!(categorize_error(&err), ExitCodes::MISSING_ENVIRONMENT);
    }

    #[test]
    fn test_categorize_through_context() {
        let result: Result<(), TopologyError> =
            Err(TopologyError::DuplicateId("LB".to_string()));
        let err = result.context("building stack").unwrap_err();
        assert_eq!(categorize_error(&err), ExitCodes::INVALID_TOPOLOGY);
    }

    #[test]
    fn test_categorize_malformed_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = commands::load_config(Some(path.as_path())).unwrap_err();
        assert_eq!(categorize_error(&err), ExitCodes::INVALID_TOPOLOGY);
    }

    #[test]
    fn test_categorize_emit_and_other() {
        let err = anyhow::Error::new(TopologyError::Emit("disk full".to_string()));
        assert_eq!(categorize_error(&err), ExitCodes::EMIT_FAILURE);

        let err = anyhow::anyhow!("something else");
        assert_eq!(categorize_error(&err), ExitCodes::GENERAL_ERROR);

        let err = anyhow::anyhow!("invalid argument: --format");
        assert_eq!(categorize_error(&err), ExitCodes::INVALID_ARGS);
    }
}
