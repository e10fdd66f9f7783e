//! List command - Show the stack and its resources.

use anyhow::{Context, Result};
use clap::Args;

use topo_core::{render, template::resource_types, Environment, StackGraph, TopologyBuilder};

use super::StackArgs;

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Show resources, their dependencies and rendered resource types
    #[arg(short, long)]
    pub long: bool,
}

pub fn execute(args: ListArgs) -> Result<()> {
    let environment =
        Environment::from_env().context("Cannot list stacks without a target environment")?;
    let config = args.stack.load_config()?;
    let graph = TopologyBuilder::new(config)
        .build(args.stack.stack_name(), &environment)
        .with_context(|| format!("Failed to build stack {}", args.stack.stack_name()))?;

    println!("{} ({})", graph.stack_name(), graph.environment());
    if args.long {
        print_resources(&graph);
        print_template_summary(&graph)?;
    }
    Ok(())
}

fn print_resources(graph: &StackGraph) {
    println!();
    println!("📦 Resources:");
    for node in graph.nodes() {
        println!("   {:<18} {}", node.resource.kind(), graph.construct_path(&node.id));
        for dep in graph.dependencies(&node.id) {
            println!("   {:<18}   → {}", "", dep);
        }
    }
}

fn print_template_summary(graph: &StackGraph) -> Result<()> {
    let template = render(graph)?;
    println!();
    println!("🏗️  Template resources:");
    for (kind, count) in resource_types(&template) {
        println!("   {:>3} × {}", count, kind);
    }
    Ok(())
}
