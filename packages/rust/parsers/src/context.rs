//! Shared corpus access handed to every category parser.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use rulesforge_document::{parse_document, Document};
use rulesforge_shared::{Result, RulesForgeError};

/// Locates the rules corpus and loads documents from it.
///
/// Index files and directories whose names start with `_` are structural
/// rather than content, and every listing skips them.
#[derive(Debug, Clone)]
pub struct ParseContext {
    rules_dir: PathBuf,
}

impl ParseContext {
    pub fn new(rules_dir: impl Into<PathBuf>) -> Self {
        Self { rules_dir: rules_dir.into() }
    }

    /// Root of the rules corpus.
    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    /// A path under the rules corpus.
    pub fn rules_path(&self, rel: &str) -> PathBuf {
        self.rules_dir.join(rel)
    }

    /// Read a corpus file, mapping a missing path to a dedicated error.
    pub fn read(&self, path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(RulesForgeError::missing_input(path));
        }
        fs::read_to_string(path).map_err(|err| RulesForgeError::io(path, err))
    }

    /// Read and split a document, or `None` with a warning when its
    /// frontmatter header is malformed.
    pub fn load_document(&self, path: &Path) -> Result<Option<Document>> {
        let raw = self.read(path)?;
        match parse_document(&raw) {
            Ok(doc) => Ok(Some(doc)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping malformed document");
                Ok(None)
            }
        }
    }

    /// Markdown files directly inside `dir`, sorted by file name.
    pub fn markdown_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        Ok(read_dir_sorted(dir)?
            .into_iter()
            .filter(|path| path.is_file() && is_content_markdown(path))
            .collect())
    }

    /// Markdown files under `dir` at any depth, sorted by path.
    pub fn markdown_files_recursive(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        collect_markdown(dir, &mut files)?;
        Ok(files)
    }

    /// Immediate subdirectories of `dir`, sorted by name.
    pub fn subdirectories(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        Ok(read_dir_sorted(dir)?
            .into_iter()
            .filter(|path| path.is_dir() && !file_name(path).starts_with('_'))
            .collect())
    }
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RulesForgeError::missing_input(dir));
    }
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|err| RulesForgeError::io(dir, err))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    entries.sort();
    Ok(entries)
}

fn collect_markdown(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for path in read_dir_sorted(dir)? {
        if path.is_dir() {
            if !file_name(&path).starts_with('_') {
                collect_markdown(&path, files)?;
            }
        } else if is_content_markdown(&path) {
            files.push(path);
        }
    }
    Ok(())
}

fn is_content_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md") && !file_name(path).starts_with('_')
}

/// File name as UTF-8, empty when the path has none.
pub fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|name| name.to_str()).unwrap_or("")
}

/// File stem as UTF-8, empty when the path has none.
pub fn file_stem(path: &Path) -> &str {
    path.file_stem().and_then(|stem| stem.to_str()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rulesforge-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn listings_are_sorted_and_skip_structural_files() {
        let tmp = temp_dir();
        write(&tmp.join("Classes/Fury.md"), "---\nitem_id: fury\n---\nbody");
        write(&tmp.join("Classes/Censor.md"), "---\nitem_id: censor\n---\nbody");
        write(&tmp.join("Classes/_Index.md"), "---\n---\nindex");
        write(&tmp.join("Classes/notes.txt"), "not markdown");

        let ctx = ParseContext::new(&tmp);
        let files = ctx.markdown_files(&ctx.rules_path("Classes")).unwrap();
        let names: Vec<&str> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, ["Censor.md", "Fury.md"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn recursive_listing_prunes_underscore_directories() {
        let tmp = temp_dir();
        write(&tmp.join("Perks/Crafting/Handy.md"), "---\nitem_id: handy\n---\nbody");
        write(&tmp.join("Perks/Lore/Polyglot.md"), "---\nitem_id: polyglot\n---\nbody");
        write(&tmp.join("Perks/_Drafts/Hidden.md"), "---\nitem_id: hidden\n---\nbody");

        let ctx = ParseContext::new(&tmp);
        let files = ctx.markdown_files_recursive(&ctx.rules_path("Perks")).unwrap();
        let names: Vec<&str> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, ["Handy.md", "Polyglot.md"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn malformed_documents_load_as_none() {
        let tmp = temp_dir();
        let good = tmp.join("good.md");
        let bad = tmp.join("bad.md");
        write(&good, "---\nitem_id: wolf\n---\nbody");
        write(&bad, "no frontmatter here");

        let ctx = ParseContext::new(&tmp);
        assert!(ctx.load_document(&good).unwrap().is_some());
        assert!(ctx.load_document(&bad).unwrap().is_none());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_directories_are_reported() {
        let ctx = ParseContext::new("/nonexistent-rules-root");
        assert!(ctx.markdown_files(&ctx.rules_path("Classes")).is_err());
    }
}
