//! RulesForge CLI: batch rules parsing and output validation.
//!
//! Turns the Markdown rules corpus into one structured JSON file per
//! content category.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
