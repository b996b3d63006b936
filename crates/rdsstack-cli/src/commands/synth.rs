//! `rdsstack synth`: Write the cloud assembly.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use rdsstack_common::constants::DEFAULT_OUTDIR;

use crate::commands::AppArgs;
use crate::output::format_value;

/// Arguments for the `synth` command.
#[derive(Args, Debug)]
pub struct SynthArgs {
    /// Directory the assembly is written to.
    #[arg(long, short, default_value = DEFAULT_OUTDIR)]
    pub outdir: PathBuf,

    /// Print the template to stdout instead of the output summary.
    #[arg(long)]
    pub print: bool,
}

/// Executes the `synth` command.
///
/// Builds the stack, synthesizes it, and writes every template plus
/// `manifest.json` into the output directory.
///
/// # Errors
///
/// Returns an error if construction, synthesis, or writing fails.
pub fn execute(app: &AppArgs, args: SynthArgs) -> anyhow::Result<()> {
    let mut tree = crate::app::build(app)?;
    let assembly = rdsstack_construct::synthesize(&mut tree).context("synthesis failed")?;
    assembly
        .write_to(&args.outdir)
        .with_context(|| format!("writing assembly to {}", args.outdir.display()))?;

    for stack in &assembly.stacks {
        if args.print {
            println!("{}", serde_json::to_string_pretty(&stack.template)?);
            continue;
        }
        println!("{} ({})", stack.stack_name, stack.environment);
        println!("  template: {}", args.outdir.join(stack.template_file()).display());
        println!("  resources: {}", stack.resource_order.len());
        let names = stack.output_names();
        if !names.is_empty() {
            println!("  outputs:");
            for name in names {
                let value = stack.output_value(name).map(format_value).unwrap_or_default();
                println!("    {name:<28} {value}");
            }
        }
    }
    Ok(())
}
