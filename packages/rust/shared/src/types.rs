//! Core domain types for the RulesForge pipeline.

use serde::{Deserialize, Serialize};

/// Current schema version for the output manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Content categories, one per parser and output file.
///
/// [`Category::ALL`] lists them in declared execution order: classes and
/// abilities run before the features that reference them; the remaining
/// categories follow in their listed order. No dependency is enforced
/// beyond that convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Classes,
    Abilities,
    Features,
    Ancestries,
    Careers,
    Upbringings,
    Chapters,
    Complications,
    Conditions,
    Environments,
    Kits,
    Languages,
    MotivationsAndPitfalls,
    Movement,
    Deities,
    Perks,
    Skills,
    Titles,
    Treasures,
}

impl Category {
    /// Every category in declared execution order.
    pub const ALL: [Category; 19] = [
        Category::Classes,
        Category::Abilities,
        Category::Features,
        Category::Ancestries,
        Category::Careers,
        Category::Upbringings,
        Category::Chapters,
        Category::Complications,
        Category::Conditions,
        Category::Environments,
        Category::Kits,
        Category::Languages,
        Category::MotivationsAndPitfalls,
        Category::Movement,
        Category::Deities,
        Category::Perks,
        Category::Skills,
        Category::Titles,
        Category::Treasures,
    ];

    /// Stable snake_case name, used for output files and log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Category::Classes => "classes",
            Category::Abilities => "abilities",
            Category::Features => "features",
            Category::Ancestries => "ancestries",
            Category::Careers => "careers",
            Category::Upbringings => "upbringings",
            Category::Chapters => "chapters",
            Category::Complications => "complications",
            Category::Conditions => "conditions",
            Category::Environments => "environments",
            Category::Kits => "kits",
            Category::Languages => "languages",
            Category::MotivationsAndPitfalls => "motivations_and_pitfalls",
            Category::Movement => "movement",
            Category::Deities => "deities",
            Category::Perks => "perks",
            Category::Skills => "skills",
            Category::Titles => "titles",
            Category::Treasures => "treasures",
        }
    }

    /// File name of this category's JSON output (e.g. `classes.json`).
    pub fn output_file(&self) -> String {
        format!("{}.json", self.name())
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// ParserStatus
// ---------------------------------------------------------------------------

/// Lifecycle of one parser entry within a pipeline run.
///
/// Every entry starts `Pending`, moves to `Running` when invoked, and ends
/// in exactly one terminal state. `Skipped` marks a declared category with
/// no registered parser, which is not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParserStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl ParserStatus {
    /// True for the three end states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ParserStatus::Succeeded | ParserStatus::Failed | ParserStatus::Skipped
        )
    }
}

impl std::fmt::Display for ParserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ParserStatus::Pending => "PENDING",
            ParserStatus::Running => "RUNNING",
            ParserStatus::Succeeded => "✓ SUCCESS",
            ParserStatus::Failed => "✗ FAILED",
            ParserStatus::Skipped => "- SKIPPED",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// RunManifest
// ---------------------------------------------------------------------------

/// The `manifest.json` structure written next to the category files.
///
/// Deliberately timestamp-free so an unchanged corpus reproduces the
/// manifest byte for byte.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Tool version that produced the output.
    pub tool_version: String,
    /// One entry per written category file, in execution order.
    pub categories: Vec<ManifestEntry>,
}

/// One category file's entry in [`RunManifest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Category name (`classes`, `abilities`, ...).
    pub category: String,
    /// Output file name within the output directory.
    pub file: String,
    /// Number of records in the file.
    pub records: usize,
    /// SHA-256 hex digest of the file contents.
    pub sha256: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_order_starts_with_class_chain() {
        assert_eq!(Category::ALL[0], Category::Classes);
        assert_eq!(Category::ALL[1], Category::Abilities);
        assert_eq!(Category::ALL[2], Category::Features);
        assert_eq!(Category::ALL.len(), 19);
    }

    #[test]
    fn category_names_are_unique() {
        let mut names: Vec<&str> = Category::ALL.iter().map(|c| c.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 19);
    }

    #[test]
    fn output_file_names() {
        assert_eq!(Category::Classes.output_file(), "classes.json");
        assert_eq!(
            Category::MotivationsAndPitfalls.output_file(),
            "motivations_and_pitfalls.json"
        );
    }

    #[test]
    fn status_terminality() {
        assert!(!ParserStatus::Pending.is_terminal());
        assert!(!ParserStatus::Running.is_terminal());
        assert!(ParserStatus::Succeeded.is_terminal());
        assert!(ParserStatus::Failed.is_terminal());
        assert!(ParserStatus::Skipped.is_terminal());
    }

    #[test]
    fn manifest_serialization() {
        let manifest = RunManifest {
            schema_version: CURRENT_SCHEMA_VERSION,
            tool_version: "0.1.0".into(),
            categories: vec![ManifestEntry {
                category: "classes".into(),
                file: "classes.json".into(),
                records: 9,
                sha256: "ab".repeat(32),
            }],
        };

        let json = serde_json::to_string_pretty(&manifest).expect("serialize");
        let parsed: RunManifest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(parsed.categories.len(), 1);
        assert_eq!(parsed.categories[0].records, 9);
    }
}
