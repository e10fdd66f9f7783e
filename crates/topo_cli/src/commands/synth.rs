//! Synth command - Build the stack and emit it.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::info;

use topo_core::{
    AssemblyEmitter, Environment, GraphEmitter, TemplateFormat, TopologyBuilder, WriterEmitter,
    DEFAULT_OUT_DIR,
};

use super::StackArgs;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl From<OutputFormat> for TemplateFormat {
    fn from(value: OutputFormat) -> Self {
        match value {
            OutputFormat::Json => TemplateFormat::Json,
            OutputFormat::Yaml => TemplateFormat::Yaml,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct SynthArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Cloud assembly output directory
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Print the template to stdout instead of writing the assembly
    #[arg(long)]
    pub stdout: bool,

    /// Template format used with --stdout
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

pub fn execute(args: SynthArgs) -> Result<()> {
    let environment =
        Environment::from_env().context("Cannot synthesize without a target environment")?;
    let config = args.stack.load_config()?;
    let stack_name = args.stack.stack_name();
    let builder = TopologyBuilder::new(config);

    if args.stdout {
        let format = args.format.unwrap_or_default().into();
        let emitter = WriterEmitter::new(io::stdout(), format);
        synth(&builder, stack_name, &environment, &emitter)?;
        return Ok(());
    }

    let out_dir = args.out.unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR));
    let emitter = AssemblyEmitter::new(&out_dir);
    let graph = synth(&builder, stack_name, &environment, &emitter)?;

    info!("Stack {} synthesized to {:?}", stack_name, out_dir);
    println!(
        "✅ {} ({} resources) → {}",
        graph.stack_name(),
        graph.len(),
        out_dir.join(AssemblyEmitter::template_file(stack_name)).display()
    );
    Ok(())
}

fn synth(
    builder: &TopologyBuilder,
    stack_name: &str,
    environment: &Environment,
    emitter: &dyn GraphEmitter,
) -> Result<topo_core::StackGraph> {
    builder
        .synth(stack_name, environment, emitter)
        .with_context(|| format!("Failed to synthesize stack {}", stack_name))
}
