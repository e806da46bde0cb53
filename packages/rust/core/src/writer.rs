//! Output file writing for parsed category data.
//!
//! Category files and the run manifest are written atomically: content
//! goes to a dot-prefixed temp file in the output directory, then
//! renames over the target.

use std::path::{Path, PathBuf};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use rulesforge_shared::{
    Category, ManifestEntry, Result, RulesForgeError, RunManifest, CURRENT_SCHEMA_VERSION,
};

/// A category file written to the output directory.
#[derive(Debug, Clone)]
pub struct CategoryFile {
    /// Final path of the written file.
    pub path: PathBuf,
    /// Number of records in the file.
    pub records: usize,
    /// SHA-256 hex digest of the file contents.
    pub sha256: String,
}

impl CategoryFile {
    /// Manifest entry for this file.
    pub fn manifest_entry(&self, category: Category) -> ManifestEntry {
        ManifestEntry {
            category: category.name().to_string(),
            file: category.output_file(),
            records: self.records,
            sha256: self.sha256.clone(),
        }
    }
}

/// Number of records in a category value.
///
/// Most categories produce an array; keyed outputs such as skills and
/// languages produce an object and count one record per key.
pub fn record_count(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        _ => 1,
    }
}

/// Write one category's parsed value as pretty-printed JSON.
pub fn write_category(
    output_dir: &Path,
    category: Category,
    value: &Value,
) -> Result<CategoryFile> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| RulesForgeError::validation(format!("JSON serialization failed: {e}")))?;

    let file = category.output_file();
    let path = write_atomic(output_dir, &file, &json)?;
    let sha256 = sha256_hex(&json);
    let records = record_count(value);

    debug!(file = %file, records, bytes = json.len(), "wrote category file");

    Ok(CategoryFile {
        path,
        records,
        sha256,
    })
}

/// Write `manifest.json` describing the files produced by a run.
pub fn write_manifest(
    output_dir: &Path,
    tool_version: &str,
    categories: Vec<ManifestEntry>,
) -> Result<PathBuf> {
    let manifest = RunManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        tool_version: tool_version.to_string(),
        categories,
    };
    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| RulesForgeError::validation(format!("JSON serialization failed: {e}")))?;
    let path = write_atomic(output_dir, "manifest.json", &json)?;
    debug!(path = %path.display(), "wrote manifest");
    Ok(path)
}

/// Write `content` under `dir/filename` via a temp file and rename.
fn write_atomic(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let target = dir.join(filename);
    let temp = dir.join(format!(".{filename}.tmp"));
    std::fs::write(&temp, content).map_err(|e| RulesForgeError::io(&temp, e))?;
    std::fs::rename(&temp, &target).map_err(|e| RulesForgeError::io(&target, e))?;
    Ok(target)
}

fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
