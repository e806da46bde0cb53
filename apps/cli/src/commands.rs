//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use rulesforge_core::pipeline::{
    ParseConfig, ParseResult, ParserOutcome, ProgressReporter, run_parse,
};
use rulesforge_core::xref::validate_xref;
use rulesforge_shared::{AppConfig, Category, ParserStatus, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// RulesForge — turn the Markdown rules corpus into structured JSON.
#[derive(Parser)]
#[command(
    name = "rulesforge",
    version,
    about = "Parse a Markdown rules corpus into one JSON data file per category.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run every category parser and write the JSON data files.
    Parse {
        /// Rules corpus root (defaults to the configured rules_dir).
        #[arg(long)]
        rules_dir: Option<PathBuf>,

        /// Output directory (defaults to the configured output_dir).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Skip writing manifest.json.
        #[arg(long)]
        no_manifest: bool,
    },

    /// Check feature cross-references between classes.json and features.json.
    Validate {
        /// Output directory holding the JSON data files.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "rulesforge=info",
        1 => "rulesforge=debug",
        _ => "rulesforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Parse {
            rules_dir,
            out,
            no_manifest,
        } => cmd_parse(rules_dir, out, no_manifest),
        Command::Validate { out } => cmd_validate(out),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// parse
// ---------------------------------------------------------------------------

fn cmd_parse(rules_dir: Option<PathBuf>, out: Option<PathBuf>, no_manifest: bool) -> Result<()> {
    let config = load_config()?;

    let parse_config = ParseConfig {
        rules_dir: rules_dir.unwrap_or_else(|| PathBuf::from(&config.defaults.rules_dir)),
        output_dir: out.unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir)),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        write_manifest: !no_manifest && config.output.manifest,
    };

    info!(
        rules_dir = %parse_config.rules_dir.display(),
        output_dir = %parse_config.output_dir.display(),
        "starting parse run"
    );

    println!("{}", "=".repeat(70));
    println!("RULES PARSING PIPELINE");
    println!("{}", "=".repeat(70));

    let reporter = CliProgress::new();
    let result = run_parse(&parse_config, &reporter)?;

    print_summary(&result, &parse_config.output_dir);

    if !result.is_success() {
        let failed: Vec<&str> = result
            .failed_categories()
            .iter()
            .map(Category::name)
            .collect();
        return Err(eyre!(
            "{} parser(s) failed: {}",
            result.failed,
            failed.join(", ")
        ));
    }

    Ok(())
}

fn print_summary(result: &ParseResult, output_dir: &Path) {
    println!();
    println!("{}", "=".repeat(70));
    println!("SUMMARY");
    println!("{}", "=".repeat(70));

    for outcome in &result.outcomes {
        match outcome.status {
            ParserStatus::Succeeded => println!(
                "{:<25} {:<10} {} records, {:.2}s",
                outcome.category.name(),
                outcome.status.to_string(),
                outcome.records,
                outcome.elapsed.as_secs_f64()
            ),
            ParserStatus::Failed => println!(
                "{:<25} {:<10} {}",
                outcome.category.name(),
                outcome.status.to_string(),
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
            _ => println!(
                "{:<25} {}",
                outcome.category.name(),
                outcome.status.to_string()
            ),
        }
    }

    println!();
    println!(
        "Total: {} succeeded, {} failed, {} skipped ({} records, {:.2}s)",
        result.succeeded,
        result.failed,
        result.skipped,
        result.total_records,
        result.elapsed.as_secs_f64()
    );

    let written: Vec<&ParserOutcome> = result
        .outcomes
        .iter()
        .filter(|o| o.status == ParserStatus::Succeeded)
        .collect();
    if !written.is_empty() {
        println!();
        println!("Output files:");
        for outcome in written {
            println!(
                "  {}",
                output_dir.join(outcome.category.output_file()).display()
            );
        }
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn parser_started(&self, category: Category, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Parsing [{current}/{total}] {category}"));
    }

    fn parser_finished(&self, outcome: &ParserOutcome) {
        if outcome.status == ParserStatus::Failed {
            self.spinner
                .println(format!("✗ {} failed", outcome.category));
        }
    }

    fn done(&self, _result: &ParseResult) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn cmd_validate(out: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let output_dir = out.unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir));

    info!(output_dir = %output_dir.display(), "validating feature cross-references");
    println!("Validating feature cross-references between classes.json and features.json...");
    println!();

    let report = validate_xref(&output_dir)?;

    println!(
        "Total feature references in classes.json: {}",
        report.total_refs
    );
    println!("Matched in features.json: {}", report.matched);
    println!("Match rate: {:.1}%", report.match_rate());

    if report.missing.is_empty() {
        println!();
        println!("✓ All feature references validated");
    } else {
        println!();
        println!("Missing features ({}):", report.missing.len());
        for item in report.missing.iter().take(10) {
            println!("  {} level {}: {}", item.class, item.level, item.feature_id);
        }
        if report.missing.len() > 10 {
            println!("  ... and {} more", report.missing.len() - 10);
        }
    }

    if report.unreferenced.is_empty() {
        println!("✓ All features are referenced in classes.json");
    } else {
        println!();
        println!("Unreferenced features ({}):", report.unreferenced.len());
        for item in report.unreferenced.iter().take(10) {
            println!(
                "  {} level {}: {} ({})",
                item.class, item.level, item.feature_id, item.name
            );
        }
        if report.unreferenced.len() > 10 {
            println!("  ... and {} more", report.unreferenced.len() - 10);
        }
    }

    if !report.is_clean() {
        return Err(eyre!(
            "cross-reference check found {} missing and {} unreferenced features",
            report.missing.len(),
            report.unreferenced.len()
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
