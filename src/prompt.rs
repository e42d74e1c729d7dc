//! Prompt payload and its tagged-text form

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, UplanError};

/// Sections of questionnaire answers (plus any context documents) sent to the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a payload from a JSON mapping
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(UplanError::InvalidParams {
                message: format!("payload must be a mapping, got {}", type_name(&other)),
            }),
        }
    }

    /// Build the two-level section → field → answer shape
    pub fn from_answers<S, F, I>(sections: I) -> Self
    where
        S: Into<String>,
        F: IntoIterator<Item = (String, String)>,
        I: IntoIterator<Item = (S, F)>,
    {
        let mut payload = Self::new();
        for (section, fields) in sections {
            let section = section.into();
            for (field, answer) in fields {
                payload.insert_answer(&section, field, answer);
            }
        }
        payload
    }

    /// Set one answer, creating the section on first use
    pub fn insert_answer(
        &mut self,
        section: &str,
        field: impl Into<String>,
        answer: impl Into<String>,
    ) {
        let entry = self
            .0
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(fields) = entry {
            fields.insert(field.into(), Value::String(answer.into()));
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Render as nested tags with blank lines and indentation stripped
    pub fn to_prompt(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.0 {
            render_tag(&mut out, key, value);
        }
        optimize_for_prompt(&out)
    }
}

fn render_tag(out: &mut String, key: &str, value: &Value) {
    let tag = tag_name(key);
    match value {
        Value::Object(map) => {
            out.push_str(&format!("<{}>\n", tag));
            for (k, v) in map {
                render_tag(out, k, v);
            }
            out.push_str(&format!("</{}>\n", tag));
        }
        Value::Array(items) => {
            out.push_str(&format!("<{}>\n", tag));
            for item in items {
                render_tag(out, "item", item);
            }
            out.push_str(&format!("</{}>\n", tag));
        }
        Value::Null => out.push_str(&format!("<{}/>\n", tag)),
        Value::String(s) => out.push_str(&format!("<{}>{}</{}>\n", tag, s.trim(), tag)),
        other => out.push_str(&format!("<{}>{}</{}>\n", tag, other, tag)),
    }
}

fn tag_name(key: &str) -> String {
    let cleaned: String = key
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "field".to_string()
    } else {
        cleaned
    }
}

/// Trim every line and drop the empty ones
pub fn optimize_for_prompt(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_answers_render_as_tags() {
        let payload = Payload::from_answers(vec![(
            "setup",
            vec![("goal".to_string(), "build a CLI".to_string())],
        )]);
        assert_eq!(
            payload.to_prompt(),
            "<setup>\n<goal>build a CLI</goal>\n</setup>"
        );
    }

    #[test]
    fn test_section_order_preserved() {
        let mut payload = Payload::new();
        payload.insert_answer("zeta", "a", "1");
        payload.insert_answer("alpha", "b", "2");
        let prompt = payload.to_prompt();
        assert!(prompt.find("<zeta>").unwrap() < prompt.find("<alpha>").unwrap());
    }

    #[test]
    fn test_nested_lists_and_scalars() {
        let payload = Payload::from_value(json!({
            "plan": {
                "stack": ["rust", "tokio"],
                "weeks": 3,
                "notes": null
            }
        }))
        .unwrap();
        let prompt = payload.to_prompt();
        assert!(prompt.contains("<stack>\n<item>rust</item>\n<item>tokio</item>\n</stack>"));
        assert!(prompt.contains("<weeks>3</weeks>"));
        assert!(prompt.contains("<notes/>"));
    }

    #[test]
    fn test_multiline_answers_are_compacted() {
        let mut payload = Payload::new();
        payload.insert_answer("scope", "details", "  first line\n\n    second line  \n");
        assert_eq!(
            payload.to_prompt(),
            "<scope>\n<details>first line\nsecond line</details>\n</scope>"
        );
    }

    #[test]
    fn test_keys_with_spaces_become_valid_tags() {
        let mut payload = Payload::new();
        payload.insert_answer("user input", "main goal", "ship");
        assert!(payload.to_prompt().contains("<user_input>"));
        assert!(payload.to_prompt().contains("<main_goal>ship</main_goal>"));
    }

    #[test]
    fn test_from_value_requires_mapping() {
        assert!(Payload::from_value(json!(["a"])).is_err());
        assert!(Payload::from_value(json!({})).unwrap().is_empty());
    }
}
