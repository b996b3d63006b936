//! `rdsstack plan`: Display the resources in creation order.

use clap::Args;
use rdsstack_construct::synth::deployment_order;

use crate::commands::AppArgs;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Also show construct paths.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Executes the `plan` command.
///
/// Builds the stack, applies its aspects, and lists every resource after
/// the resources it depends on. Unanswered lookups are reported instead
/// of failing.
///
/// # Errors
///
/// Returns an error if construction or ordering fails.
pub fn execute(app: &AppArgs, args: PlanArgs) -> anyhow::Result<()> {
    let mut tree = crate::app::build(app)?;
    tree.apply_aspects();

    for stack in tree.stacks() {
        let order = deployment_order(&tree, stack)?;
        let title = format!("Deployment Plan for: {}", tree.node(stack).id());
        println!("{title}");
        println!("{}", "\u{2550}".repeat(title.chars().count()));
        println!();

        for planned in &order {
            println!("  + {:<44} {}", planned.logical_id, planned.type_name);
            if args.verbose {
                println!("      path: {}", planned.path);
            }
        }
        println!();
        println!("  {} resource(s) will be created.", order.len());
    }

    let missing = tree.missing_context();
    if !missing.is_empty() {
        println!();
        println!("  Missing context (synth will fail until these are cached):");
        for m in missing {
            println!("    {} [{}]", m.key, m.stack);
        }
    }
    Ok(())
}
