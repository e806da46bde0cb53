//! Batch parse pipeline.
//!
//! Runs the category parsers in declared order, one at a time, and
//! writes one JSON file per category. A parser that errors is recorded
//! as failed and the run moves on to the next category; the aggregate
//! tallies come back in the returned [`ParseResult`].

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use rulesforge_parsers::{registry, CategoryParser, ParseContext};
use rulesforge_shared::{Category, ParserStatus, Result, RulesForgeError};

use crate::writer;

/// Configuration for a full parse run.
#[derive(Debug, Clone)]
pub struct ParseConfig {
    /// Root directory of the Markdown rules corpus.
    pub rules_dir: PathBuf,
    /// Directory the category JSON files are written to.
    pub output_dir: PathBuf,
    /// Tool version recorded in the manifest.
    pub tool_version: String,
    /// Whether to write `manifest.json` after the category files.
    pub write_manifest: bool,
}

/// Terminal record for one declared category within a run.
#[derive(Debug, Clone)]
pub struct ParserOutcome {
    /// Category the entry covers.
    pub category: Category,
    /// Terminal status of the entry.
    pub status: ParserStatus,
    /// Records written, zero unless the parser succeeded.
    pub records: usize,
    /// Error text when the parser failed.
    pub error: Option<String>,
    /// Time spent parsing and writing this category.
    pub elapsed: Duration,
}

/// Aggregate result of a full parse run.
#[derive(Debug)]
pub struct ParseResult {
    /// One outcome per declared category, in execution order.
    pub outcomes: Vec<ParserOutcome>,
    /// Parsers that completed and wrote their file.
    pub succeeded: usize,
    /// Parsers that errored.
    pub failed: usize,
    /// Declared categories with no registered parser.
    pub skipped: usize,
    /// Total records across all written files.
    pub total_records: usize,
    /// Wall time for the whole run.
    pub elapsed: Duration,
}

impl ParseResult {
    /// True when no parser failed. Skipped categories do not count
    /// against success.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Categories that failed, in execution order.
    pub fn failed_categories(&self) -> Vec<Category> {
        self.outcomes
            .iter()
            .filter(|o| o.status == ParserStatus::Failed)
            .map(|o| o.category)
            .collect()
    }
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a parser moves from pending to running. `current` is
    /// 1-based. Skipped categories never start and only get
    /// [`Self::parser_finished`].
    fn parser_started(&self, category: Category, current: usize, total: usize);
    /// Called when an entry reaches a terminal state.
    fn parser_finished(&self, outcome: &ParserOutcome);
    /// Called when the run completes.
    fn done(&self, result: &ParseResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn parser_started(&self, _category: Category, _current: usize, _total: usize) {}
    fn parser_finished(&self, _outcome: &ParserOutcome) {}
    fn done(&self, _result: &ParseResult) {}
}

/// Run every registered category parser in declared order.
///
/// The run never stops early: each declared category ends as succeeded,
/// failed, or skipped, and the caller decides what a failed run means
/// for the process exit status.
#[instrument(skip_all, fields(rules_dir = %config.rules_dir.display(), output_dir = %config.output_dir.display()))]
pub fn run_parse(config: &ParseConfig, progress: &dyn ProgressReporter) -> Result<ParseResult> {
    run_with(&registry(), config, progress)
}

fn run_with(
    parsers: &[Box<dyn CategoryParser>],
    config: &ParseConfig,
    progress: &dyn ProgressReporter,
) -> Result<ParseResult> {
    let start = Instant::now();

    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| RulesForgeError::io(&config.output_dir, e))?;

    let ctx = ParseContext::new(&config.rules_dir);
    let total = Category::ALL.len();

    let mut outcomes = Vec::with_capacity(total);
    let mut entries = Vec::new();
    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let mut skipped = 0usize;
    let mut total_records = 0usize;

    for (index, &category) in Category::ALL.iter().enumerate() {
        let Some(parser) = parsers.iter().find(|p| p.category() == category) else {
            skipped += 1;
            warn!(category = %category, "no parser registered, skipping");
            let outcome = ParserOutcome {
                category,
                status: ParserStatus::Skipped,
                records: 0,
                error: None,
                elapsed: Duration::ZERO,
            };
            progress.parser_finished(&outcome);
            outcomes.push(outcome);
            continue;
        };

        progress.parser_started(category, index + 1, total);
        let parser_start = Instant::now();

        let written = parser
            .parse(&ctx)
            .and_then(|value| writer::write_category(&config.output_dir, category, &value));

        let outcome = match written {
            Ok(file) => {
                succeeded += 1;
                total_records += file.records;
                entries.push(file.manifest_entry(category));
                info!(category = %category, records = file.records, "parser succeeded");
                ParserOutcome {
                    category,
                    status: ParserStatus::Succeeded,
                    records: file.records,
                    error: None,
                    elapsed: parser_start.elapsed(),
                }
            }
            Err(e) => {
                failed += 1;
                warn!(category = %category, error = %e, "parser failed, continuing");
                ParserOutcome {
                    category,
                    status: ParserStatus::Failed,
                    records: 0,
                    error: Some(e.to_string()),
                    elapsed: parser_start.elapsed(),
                }
            }
        };

        progress.parser_finished(&outcome);
        outcomes.push(outcome);
    }

    if config.write_manifest {
        writer::write_manifest(&config.output_dir, &config.tool_version, entries)?;
    }

    let result = ParseResult {
        outcomes,
        succeeded,
        failed,
        skipped,
        total_records,
        elapsed: start.elapsed(),
    };

    info!(
        succeeded = result.succeeded,
        failed = result.failed,
        skipped = result.skipped,
        records = result.total_records,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "parse run complete"
    );
    progress.done(&result);

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rulesforge-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn make_config(tmp: &PathBuf) -> ParseConfig {
        ParseConfig {
            rules_dir: tmp.join("Rules"),
            output_dir: tmp.join("data"),
            tool_version: "0.0.0-test".to_string(),
            write_manifest: true,
        }
    }

    fn write_condition(tmp: &PathBuf, file: &str, content: &str) {
        let dir = tmp.join("Rules/Conditions");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file), content).unwrap();
    }

    #[derive(Default)]
    struct CountingProgress {
        started: AtomicUsize,
        finished: AtomicUsize,
        done: AtomicUsize,
    }

    impl ProgressReporter for CountingProgress {
        fn parser_started(&self, _category: Category, _current: usize, _total: usize) {
            self.started.fetch_add(1, Ordering::Relaxed);
        }
        fn parser_finished(&self, _outcome: &ParserOutcome) {
            self.finished.fetch_add(1, Ordering::Relaxed);
        }
        fn done(&self, _result: &ParseResult) {
            self.done.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn a_failing_parser_does_not_stop_the_run() {
        let tmp = temp_dir();
        write_condition(
            &tmp,
            "Bleeding.md",
            "---\nitem_id: bleeding\nitem_name: Bleeding\nitem_index: \"01\"\nsource: mcdm.heroes.v1\n---\n\n##### Bleeding\n\nYou take damage over time.\n",
        );

        let config = make_config(&tmp);
        let progress = CountingProgress::default();
        let result = run_parse(&config, &progress).expect("run");

        // Every declared category ends in a terminal state, in order.
        assert_eq!(result.outcomes.len(), Category::ALL.len());
        let order: Vec<Category> = result.outcomes.iter().map(|o| o.category).collect();
        assert_eq!(order, Category::ALL.to_vec());

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.skipped, 0);
        assert_eq!(result.failed, Category::ALL.len() - 1);
        assert!(!result.is_success());
        assert_eq!(result.failed_categories()[0], Category::Classes);

        let conditions = result
            .outcomes
            .iter()
            .find(|o| o.category == Category::Conditions)
            .unwrap();
        assert_eq!(conditions.status, ParserStatus::Succeeded);
        assert_eq!(conditions.records, 1);
        assert!(conditions.error.is_none());

        let classes = &result.outcomes[0];
        assert_eq!(classes.status, ParserStatus::Failed);
        assert!(classes.error.is_some());

        assert!(config.output_dir.join("conditions.json").exists());
        assert!(!config.output_dir.join("classes.json").exists());

        assert_eq!(progress.started.load(Ordering::Relaxed), Category::ALL.len());
        assert_eq!(
            progress.finished.load(Ordering::Relaxed),
            Category::ALL.len()
        );
        assert_eq!(progress.done.load(Ordering::Relaxed), 1);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn manifest_lists_only_succeeded_categories() {
        let tmp = temp_dir();
        write_condition(
            &tmp,
            "Dazed.md",
            "---\nitem_id: dazed\nitem_name: Dazed\nitem_index: \"02\"\nsource: mcdm.heroes.v1\n---\n\n##### Dazed\n\nYou can take one action.\n",
        );

        let config = make_config(&tmp);
        run_parse(&config, &SilentProgress).expect("run");

        let manifest = std::fs::read_to_string(config.output_dir.join("manifest.json")).unwrap();
        let manifest: rulesforge_shared::RunManifest = serde_json::from_str(&manifest).unwrap();
        assert_eq!(manifest.categories.len(), 1);
        assert_eq!(manifest.categories[0].category, "conditions");
        assert_eq!(manifest.categories[0].records, 1);
        assert_eq!(manifest.categories[0].sha256.len(), 64);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn unregistered_categories_are_skipped_not_failed() {
        let tmp = temp_dir();
        let config = ParseConfig {
            write_manifest: false,
            ..make_config(&tmp)
        };
        let progress = CountingProgress::default();

        let result = run_with(&[], &config, &progress).expect("run");

        assert_eq!(result.skipped, Category::ALL.len());
        assert_eq!(result.failed, 0);
        assert_eq!(result.succeeded, 0);
        assert!(result.is_success());
        assert!(result
            .outcomes
            .iter()
            .all(|o| o.status == ParserStatus::Skipped));

        // Skipped entries never start.
        assert_eq!(progress.started.load(Ordering::Relaxed), 0);
        assert_eq!(
            progress.finished.load(Ordering::Relaxed),
            Category::ALL.len()
        );
        assert!(!config.output_dir.join("manifest.json").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
