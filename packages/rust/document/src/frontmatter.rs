//! YAML frontmatter extraction.
//!
//! Corpus documents open with a `---` delimited YAML header carrying
//! identity fields (`item_id`, `item_name`, `item_index`, `source`,
//! `type`). Documents without a well-formed header are not parseable
//! and the caller is expected to skip them.

use serde_json::{Map, Value};

use rulesforge_shared::{Result, RulesForgeError};

/// A corpus document split into its frontmatter fields and Markdown body.
#[derive(Debug, Clone)]
pub struct Document {
    /// Header fields in file order.
    pub frontmatter: Map<String, Value>,
    /// Everything after the closing `---`.
    pub body: String,
}

impl Document {
    /// String-valued frontmatter field, if present.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.frontmatter.get(key).and_then(Value::as_str)
    }

    /// String-valued frontmatter field, or the empty string.
    pub fn field_or_default(&self, key: &str) -> &str {
        self.field(key).unwrap_or("")
    }

    /// Frontmatter value cloned as-is, or an empty string when absent.
    ///
    /// Keeps non-string scalars (an unquoted `item_index` parses as a
    /// number) flowing through to the output unchanged.
    pub fn field_value(&self, key: &str) -> Value {
        self.frontmatter
            .get(key)
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()))
    }

    /// Frontmatter value cloned as-is, or `null` when absent. For record
    /// shapes that distinguish a missing field from an empty one.
    pub fn field_nullable(&self, key: &str) -> Value {
        self.frontmatter.get(key).cloned().unwrap_or(Value::Null)
    }
}

/// Split a document into frontmatter and body.
///
/// Fails when the header is missing, unterminated, or not valid YAML.
pub fn parse_document(content: &str) -> Result<Document> {
    let rest = content
        .strip_prefix("---")
        .ok_or_else(|| RulesForgeError::parse("document has no frontmatter header"))?;
    let (header, body) = rest
        .split_once("\n---")
        .ok_or_else(|| RulesForgeError::parse("unterminated frontmatter header"))?;

    let frontmatter: Map<String, Value> = if header.trim().is_empty() {
        Map::new()
    } else {
        serde_yaml::from_str(header)
            .map_err(|err| RulesForgeError::parse(format!("invalid frontmatter: {err}")))?
    };

    Ok(Document { frontmatter, body: body.to_string() })
}
