//! Cross-reference validation between the classes and features outputs.
//!
//! `classes.json` names the features each class gains per level;
//! `features.json` holds the full feature records. Both directions are
//! checked: every reference should resolve to a record, and every
//! record should be reachable from some class.

use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, instrument};

use rulesforge_shared::{Category, Result, RulesForgeError};

/// A feature reference in `classes.json` with no matching record.
#[derive(Debug, Clone)]
pub struct MissingFeature {
    /// Class display name the reference sits under.
    pub class: String,
    /// Level key the reference sits under.
    pub level: String,
    /// The unresolved feature id.
    pub feature_id: String,
}

/// A `features.json` record no class ever references.
#[derive(Debug, Clone)]
pub struct UnreferencedFeature {
    /// Lowercase class name of the record.
    pub class: String,
    /// Level of the record.
    pub level: i64,
    /// Feature id of the record.
    pub feature_id: String,
    /// Display name of the record.
    pub name: String,
}

/// Outcome of a cross-reference pass over the two output files.
#[derive(Debug)]
pub struct XrefReport {
    /// Feature references found across all classes.
    pub total_refs: usize,
    /// References that resolved to a feature record.
    pub matched: usize,
    /// References with no matching record, in encounter order.
    pub missing: Vec<MissingFeature>,
    /// Records never referenced by any class, in file order.
    pub unreferenced: Vec<UnreferencedFeature>,
}

impl XrefReport {
    /// True when every reference resolves and every record is used.
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.unreferenced.is_empty()
    }

    /// Share of references that resolved, as a percentage.
    pub fn match_rate(&self) -> f64 {
        if self.total_refs == 0 {
            100.0
        } else {
            self.matched as f64 / self.total_refs as f64 * 100.0
        }
    }
}

/// Check `classes.json` against `features.json` in `output_dir`.
///
/// References are keyed by lowercase class name, level, and feature id.
/// Class entries may name a feature either as a record with a
/// `feature_id` field or as a bare id string.
#[instrument(skip_all, fields(output_dir = %output_dir.display()))]
pub fn validate_xref(output_dir: &Path) -> Result<XrefReport> {
    let classes_json = load_json(&output_dir.join(Category::Classes.output_file()))?;
    let features_json = load_json(&output_dir.join(Category::Features.output_file()))?;

    // Tolerate a wrapper object around the class array.
    let classes: Vec<&Value> = match classes_json.get("classes").unwrap_or(&classes_json) {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    let features = features_json
        .as_array()
        .ok_or_else(|| RulesForgeError::validation("features.json is not an array"))?;

    let mut keyed = Vec::with_capacity(features.len());
    for (index, feature) in features.iter().enumerate() {
        let key = feature_key(feature).ok_or_else(|| {
            RulesForgeError::validation(format!(
                "features.json record {index} is missing class, level, or item_id"
            ))
        })?;
        keyed.push((key, feature));
    }
    let feature_keys: HashSet<(String, i64, String)> =
        keyed.iter().map(|(key, _)| key.clone()).collect();

    let mut total_refs = 0usize;
    let mut matched = 0usize;
    let mut missing = Vec::new();
    let mut referenced: HashSet<(String, i64, String)> = HashSet::new();

    for class in &classes {
        let class_name = class
            .get("item_name")
            .or_else(|| class.get("class_name"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown");
        let Some(by_level) = class.get("features_by_level").and_then(Value::as_object) else {
            continue;
        };
        for (level, feature_list) in by_level {
            let Ok(level_num) = level.parse::<i64>() else {
                continue;
            };
            let Some(items) = feature_list.as_array() else {
                continue;
            };
            for feature_ref in items {
                let feature_id = match feature_ref {
                    Value::Object(map) => map.get("feature_id").and_then(Value::as_str),
                    Value::String(id) => Some(id.as_str()),
                    _ => None,
                };
                let Some(feature_id) = feature_id.filter(|id| !id.is_empty()) else {
                    continue;
                };

                total_refs += 1;
                let key = (class_name.to_lowercase(), level_num, feature_id.to_string());
                if feature_keys.contains(&key) {
                    matched += 1;
                } else {
                    missing.push(MissingFeature {
                        class: class_name.to_string(),
                        level: level.clone(),
                        feature_id: feature_id.to_string(),
                    });
                }
                referenced.insert(key);
            }
        }
    }

    let unreferenced: Vec<UnreferencedFeature> = keyed
        .into_iter()
        .filter(|(key, _)| !referenced.contains(key))
        .map(|((class, level, feature_id), feature)| UnreferencedFeature {
            class,
            level,
            feature_id,
            name: feature
                .get("name")
                .or_else(|| feature.get("item_name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
        .collect();

    debug!(
        total_refs,
        matched,
        missing = missing.len(),
        unreferenced = unreferenced.len(),
        "cross-reference pass complete"
    );

    Ok(XrefReport {
        total_refs,
        matched,
        missing,
        unreferenced,
    })
}

fn feature_key(feature: &Value) -> Option<(String, i64, String)> {
    let class = feature.get("class")?.as_str()?;
    let level = feature.get("level")?.as_i64()?;
    let item_id = feature.get("item_id")?.as_str()?;
    Some((class.to_string(), level, item_id.to_string()))
}

fn load_json(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(RulesForgeError::missing_input(path));
    }
    let content = std::fs::read_to_string(path).map_err(|e| RulesForgeError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| RulesForgeError::parse(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rulesforge-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn write_outputs(dir: &Path, classes: &Value, features: &Value) {
        std::fs::write(
            dir.join("classes.json"),
            serde_json::to_string_pretty(classes).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.join("features.json"),
            serde_json::to_string_pretty(features).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn forward_and_reverse_references_check_out() {
        let tmp = temp_dir();
        let classes = json!([{
            "item_name": "Fury",
            "features_by_level": {
                "1": [
                    {"feature_id": "primordial-aspect"},
                    "ferocity"
                ],
                "2": [
                    {"feature_id": "ghost-feature"}
                ]
            }
        }]);
        let features = json!([
            {"class": "fury", "level": 1, "item_id": "primordial-aspect", "name": "Primordial Aspect"},
            {"class": "fury", "level": 1, "item_id": "ferocity", "name": "Ferocity"},
            {"class": "fury", "level": 3, "item_id": "orphan", "name": "Orphan"}
        ]);
        write_outputs(&tmp, &classes, &features);

        let report = validate_xref(&tmp).expect("validate");

        assert_eq!(report.total_refs, 3);
        assert_eq!(report.matched, 2);
        assert!(!report.is_clean());
        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].class, "Fury");
        assert_eq!(report.missing[0].level, "2");
        assert_eq!(report.missing[0].feature_id, "ghost-feature");
        assert_eq!(report.unreferenced.len(), 1);
        assert_eq!(report.unreferenced[0].feature_id, "orphan");
        assert_eq!(report.unreferenced[0].name, "Orphan");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn clean_outputs_report_full_match() {
        let tmp = temp_dir();
        let classes = json!([{
            "item_name": "Censor",
            "features_by_level": {"1": [{"feature_id": "judgment"}]}
        }]);
        let features = json!([
            {"class": "censor", "level": 1, "item_id": "judgment", "name": "Judgment"}
        ]);
        write_outputs(&tmp, &classes, &features);

        let report = validate_xref(&tmp).expect("validate");

        assert!(report.is_clean());
        assert_eq!(report.total_refs, 1);
        assert_eq!(report.matched, 1);
        assert!((report.match_rate() - 100.0).abs() < f64::EPSILON);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_output_file_is_an_error() {
        let tmp = temp_dir();

        let err = validate_xref(&tmp).unwrap_err();
        assert!(matches!(
            err,
            RulesForgeError::MissingInput { ref path } if path.ends_with("classes.json")
        ));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn empty_reference_set_counts_as_full_match_rate() {
        let tmp = temp_dir();
        write_outputs(&tmp, &json!([]), &json!([]));

        let report = validate_xref(&tmp).expect("validate");

        assert_eq!(report.total_refs, 0);
        assert!((report.match_rate() - 100.0).abs() < f64::EPSILON);
        assert!(report.is_clean());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
