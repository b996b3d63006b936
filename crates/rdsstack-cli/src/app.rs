//! Shared app assembly: configuration, context, and stack construction.

use anyhow::Context;
use rdsstack_common::config::{Configuration, InstanceConfig};
use rdsstack_common::types::{Environment, Tags};
use rdsstack_construct::{ContextStore, ConstructTree};
use rdsstack_stacks::Variant;

use crate::commands::AppArgs;

/// Resolves the configuration of `variant`.
///
/// The basic program uses fixed settings unless a file is given
/// explicitly. Any failure is logged and aborts the run before a single
/// construct exists.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
pub fn resolve_configuration(args: &AppArgs) -> anyhow::Result<Configuration> {
    let result = match (Variant::from(args.variant), args.config.as_deref()) {
        (Variant::Basic, None) => Ok(Configuration::basic_from_env()),
        (Variant::Basic, Some(path)) => {
            InstanceConfig::load_basic(path).map(|i| Configuration::new(Environment::from_env(), i))
        }
        (Variant::ServerlessV2, explicit) => Configuration::resolve(explicit),
    };
    result.map_err(|e| {
        tracing::error!(error = %e, "configuration failed");
        anyhow::Error::new(e)
    })
}

/// Builds the construct tree of the selected stack.
///
/// # Errors
///
/// Returns an error if configuration, context loading, or construction
/// fails.
pub fn build(args: &AppArgs) -> anyhow::Result<ConstructTree> {
    let config = resolve_configuration(args)?;
    let context = ContextStore::load(&args.context)
        .with_context(|| format!("loading context from {}", args.context.display()))?;
    let global_tags: Tags = args.tags.iter().cloned().collect();
    if config.env.is_agnostic() {
        tracing::warn!("account or region unset; VPC lookup will fail");
    }

    tracing::info!(
        variant = ?args.variant,
        environment = %config.env,
        context_entries = context.len(),
        "building app"
    );
    let mut tree = ConstructTree::with_context(context);
    let _ = Variant::from(args.variant)
        .build(&mut tree, &config, &global_tags)
        .context("building stack")?;
    Ok(tree)
}
