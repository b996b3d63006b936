//! CLI command definitions and dispatch.

pub mod ls;
pub mod plan;
pub mod synth;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rdsstack_common::constants::{BIN_NAME, DEFAULT_CONTEXT_FILE};
use rdsstack_stacks::Variant;

/// rdsstack: Aurora MySQL cluster stacks as CloudFormation.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub app: AppArgs,
}

/// Which stack to build and where its inputs come from.
#[derive(Args, Debug, Clone)]
pub struct AppArgs {
    /// Stack program to build.
    #[arg(long, global = true, value_enum, default_value_t = VariantArg::ServerlessV2)]
    pub variant: VariantArg,

    /// Configuration file (defaults to $RDS_CONFIG_FILE, then config.json).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Cached lookup values.
    #[arg(long, global = true, default_value = DEFAULT_CONTEXT_FILE)]
    pub context: PathBuf,

    /// Tag applied to the whole stack, as KEY=VALUE. Repeatable.
    #[arg(long = "tag", global = true, value_parser = crate::output::parse_tag)]
    pub tags: Vec<(String, String)>,
}

/// Stack programs selectable on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantArg {
    /// Auto-pausing serverless cluster with fixed settings.
    Basic,
    /// Configurable cluster with a serverless v2 instance.
    ServerlessV2,
}

impl From<VariantArg> for Variant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Basic => Self::Basic,
            VariantArg::ServerlessV2 => Self::ServerlessV2,
        }
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Synthesize the stack into a cloud assembly directory.
    Synth(synth::SynthArgs),
    /// List the stacks of the app.
    Ls(ls::LsArgs),
    /// Display the resources in creation order.
    Plan(plan::PlanArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Synth(args) => synth::execute(&cli.app, args),
        Command::Ls(args) => ls::execute(&cli.app, args),
        Command::Plan(args) => plan::execute(&cli.app, args),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_is_named_after_the_binary() {
        assert_eq!(Cli::command().get_name(), BIN_NAME);
    }

    #[test]
    fn global_options_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "rdsstack",
            "synth",
            "--variant",
            "basic",
            "--tag",
            "team=db",
            "--tag",
            "env=dev",
        ])
        .expect("parse");

        assert_eq!(cli.app.variant, VariantArg::Basic);
        assert_eq!(
            cli.app.tags,
            vec![("team".to_string(), "db".to_string()), ("env".to_string(), "dev".to_string())]
        );
        assert!(matches!(cli.command, Command::Synth(_)));
    }

    #[test]
    fn malformed_tag_is_rejected() {
        let result = Cli::try_parse_from(["rdsstack", "ls", "--tag", "novalue"]);
        assert!(result.is_err());
    }

    #[test]
    fn variant_defaults_to_serverless_v2() {
        let cli = Cli::try_parse_from(["rdsstack", "plan"]).expect("parse");
        assert_eq!(Variant::from(cli.app.variant), Variant::ServerlessV2);
        assert_eq!(cli.app.context, PathBuf::from("cdk.context.json"));
    }
}
