//! Operator listing.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use clap::Args;
use rivulet_config::OperatorRegistry;

#[derive(Args)]
pub struct OperatorsArgs {
    /// Show only this operator
    #[arg(value_name = "OPERATOR")]
    operator: Option<String>,
}

pub fn run(args: OperatorsArgs) -> anyhow::Result<()> {
    let registry = OperatorRegistry::new();
    let selected: Vec<_> = match &args.operator {
        Some(id) => vec![
            registry
                .get(id)
                .ok_or_else(|| anyhow::anyhow!("Unknown operator: {}", id))?,
        ],
        None => registry.all_operators().collect(),
    };

    println!("Available Operators");
    println!("===================");
    for desc in selected {
        println!();
        println!("{} - {}", desc.id, desc.description);
        println!("  {:4}  {:14}  {:>10}  {}", "#", "Name", "Default", "Range");
        for (i, spec) in registry
            .param_specs(desc.id)
            .unwrap_or_default()
            .iter()
            .enumerate()
        {
            println!(
                "  {:4}  {:14}  {:>10}  {}..={}",
                i + 1,
                spec.name,
                spec.default,
                spec.min,
                spec.max
            );
        }
    }
    Ok(())
}
