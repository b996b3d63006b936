//! `rdsstack ls`: List the stacks of the app.

use anyhow::Context;
use clap::Args;

use crate::commands::AppArgs;

/// Arguments for the `ls` command.
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Also show environment and tags.
    #[arg(short, long)]
    pub long: bool,
}

/// Executes the `ls` command.
///
/// # Errors
///
/// Returns an error if the app cannot be built.
pub fn execute(app: &AppArgs, args: LsArgs) -> anyhow::Result<()> {
    let tree = crate::app::build(app)?;

    if args.long {
        println!("{:<16} {:<36} {:<40}", "STACK", "ENVIRONMENT", "TAGS");
    }
    for stack in tree.stacks() {
        let name = tree.node(stack).id();
        if !args.long {
            println!("{name}");
            continue;
        }
        let props = tree
            .stack_props(stack)
            .with_context(|| format!("{name} has no stack properties"))?;
        let tags: Vec<String> = props.tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let tags = if tags.is_empty() { "-".to_string() } else { tags.join(",") };
        println!("{:<16} {:<36} {:<40}", name, props.env.to_string(), tags);
    }
    Ok(())
}
