//! Culture environments (nomadic, rural, urban, ...).

use serde_json::Value;

use rulesforge_shared::{Category, Result};

use crate::context::ParseContext;
use crate::{culture, CategoryParser};

pub struct EnvironmentsParser;

impl CategoryParser for EnvironmentsParser {
    fn category(&self) -> Category {
        Category::Environments
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let mut environments = Vec::new();
        for path in ctx.markdown_files(&ctx.rules_path("Cultures/Environments"))? {
            let Some(doc) = ctx.load_document(&path)? else {
                continue;
            };
            environments.push(culture::parse_culture_aspect(&doc, culture::group_choice));
        }
        Ok(Value::Array(environments))
    }
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

    fn write_environment(tmp: &PathBuf, name: &str, content: &str) {
        let dir = tmp.join("Cultures").join("Environments");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn or_group_choice_and_quick_build() {
        let tmp = temp_dir();
        write_environment(
            &tmp,
            "Nomadic.md",
            "---\nitem_id: nomadic\nitem_name: Nomadic\nculture_benefit_type: skill\n---\n\n\
##### Nomadic\n\n\
A nomadic culture [travels](../Travel.md) with the seasons.\n\n\
**Skill Options:** One skill from the exploration or interpersonal skill groups (*Quick Build:* Ride.)\n",
        );

        let value = EnvironmentsParser.parse(&ParseContext::new(&tmp)).unwrap();
        let environment = &value.as_array().unwrap()[0];
        assert_eq!(environment["culture_benefit_type"], "skill");
        assert_eq!(environment["description"], "A nomadic culture travels with the seasons.");

        let options = &environment["skill_options"];
        assert_eq!(
            options["description"],
            "One skill from the exploration or interpersonal skill groups"
        );
        assert_eq!(
            options["choice"],
            json!({
                "number": 1,
                "group": { "names": ["exploration", "interpersonal"], "type": "or" },
            })
        );
        assert_eq!(options["quick_build"], "Ride");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn single_group_choice_uses_from_type() {
        let tmp = temp_dir();
        write_environment(
            &tmp,
            "Rural.md",
            "---\nitem_id: rural\nitem_name: Rural\n---\n\n\
##### Rural\n\n\
A rural culture works the land.\n\n\
**Skill Options:** Two skills from the crafting skill group\n",
        );

        let value = EnvironmentsParser.parse(&ParseContext::new(&tmp)).unwrap();
        assert_eq!(
            value[0]["skill_options"]["choice"],
            json!({ "number": 2, "group": { "names": ["crafting"], "type": "from" } })
        );
        assert_eq!(value[0]["skill_options"]["quick_build"], Value::Null);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_skill_options_line_yields_null() {
        let tmp = temp_dir();
        write_environment(
            &tmp,
            "Secluded.md",
            "---\nitem_id: secluded\nitem_name: Secluded\n---\n\n##### Secluded\n\nHidden from the world.\n",
        );

        let value = EnvironmentsParser.parse(&ParseContext::new(&tmp)).unwrap();
        assert_eq!(value[0]["description"], "Hidden from the world.");
        assert_eq!(value[0]["skill_options"], Value::Null);

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
