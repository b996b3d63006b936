//! # rdsstack: RDS cluster stack synthesizer
//!
//! Builds the basic or serverless v2 database stack and writes it as a
//! CloudFormation cloud assembly.

mod app;
mod commands;
mod output;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    commands::execute(cli)
}
