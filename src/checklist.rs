//! Structured document → human-readable checklist
//!
//! Two renderings are produced from a generated todo document:
//! - markdown with `- [ ]` boxes per task
//! - JSON where every task string becomes `{task, completed}`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// One task as it appears in the JSON checklist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecklistEntry {
    pub section: String,
    pub category: Option<String>,
    pub task: String,
    pub completed: bool,
}

/// Render a document as markdown
pub fn to_markdown(document: &Value) -> String {
    let mut markdown = String::new();
    let Some(sections) = document.as_object() else {
        return markdown;
    };

    for (section, content) in sections {
        markdown.push_str(&format!("## {}\n\n", section_title(section)));

        match content {
            Value::Object(fields) => {
                for (key, value) in fields {
                    markdown.push_str(&format!("### {}\n\n", capitalize(key)));

                    match value {
                        Value::Array(items) if key.eq_ignore_ascii_case("categories") => {
                            for category in items {
                                let Some(title) = category.get("title") else {
                                    continue;
                                };
                                markdown.push_str(&format!("\n#### {}\n", scalar_text(title)));
                                if let Some(Value::Array(tasks)) = category.get("tasks") {
                                    for task in tasks {
                                        markdown.push_str(&format!("- [ ] {}\n", scalar_text(task)));
                                    }
                                }
                                markdown.push('\n');
                            }
                        }
                        Value::Array(items) => {
                            for item in items {
                                markdown.push_str(&format!("- {}\n", scalar_text(item)));
                            }
                        }
                        other => markdown.push_str(&format!("{}\n", scalar_text(other))),
                    }
                    markdown.push('\n');
                }
            }
            Value::Null => {}
            other => markdown.push_str(&format!("{}\n\n", scalar_text(other))),
        }
    }

    markdown
}

/// Copy of the document with every task tagged incomplete
pub fn with_completed_status(document: &Value) -> Value {
    let mut out = document.clone();
    let Some(sections) = out.as_object_mut() else {
        return out;
    };

    for section in sections.values_mut() {
        let Some(fields) = section.as_object_mut() else {
            continue;
        };
        if let Some(Value::Array(categories)) = fields.get_mut("categories") {
            for category in categories.iter_mut() {
                if let Some(container) = category.as_object_mut() {
                    tag_tasks(container);
                }
            }
        }
        tag_tasks(fields);
    }

    out
}

fn tag_tasks(container: &mut Map<String, Value>) {
    if let Some(Value::Array(tasks)) = container.get_mut("tasks") {
        for task in tasks.iter_mut() {
            if task.get("completed").is_some() {
                continue;
            }
            *task = json!({"task": task.clone(), "completed": false});
        }
    }
}

/// Flatten a JSON checklist into entries, in document order
pub fn entries(checklist: &Value) -> Vec<ChecklistEntry> {
    let mut out = Vec::new();
    let Some(sections) = checklist.as_object() else {
        return out;
    };

    for (section, content) in sections {
        if let Some(Value::Array(categories)) = content.get("categories") {
            for category in categories {
                let title = category.get("title").map(scalar_text);
                collect_entries(&mut out, section, title, category);
            }
        }
        collect_entries(&mut out, section, None, content);
    }

    out
}

fn collect_entries(out: &mut Vec<ChecklistEntry>, section: &str, category: Option<String>, container: &Value) {
    let Some(Value::Array(tasks)) = container.get("tasks") else {
        return;
    };
    for task in tasks {
        let (text, completed) = match task {
            Value::Object(obj) => (
                obj.get("task").map(scalar_text).unwrap_or_default(),
                obj.get("completed").and_then(Value::as_bool).unwrap_or(false),
            ),
            other => (scalar_text(other), false),
        };
        out.push(ChecklistEntry {
            section: section.to_string(),
            category: category.clone(),
            task: text,
            completed,
        });
    }
}

/// `environment_setup` → `Environment Setup`
fn section_title(section: &str) -> String {
    section
        .split('_')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        json!({
            "environment_setup": {
                "frameworks": ["click", "pytest"],
                "categories": [
                    {"title": "Init", "tasks": ["scaffold project", "add CI"]},
                    {"title": "Docs", "tasks": ["write README"]}
                ]
            }
        })
    }

    #[test]
    fn test_markdown_layout() {
        let md = to_markdown(&sample());
        let expected = "## Environment Setup\n\n\
            ### Frameworks\n\n\
            - click\n\
            - pytest\n\
            \n\
            ### Categories\n\n\
            \n#### Init\n\
            - [ ] scaffold project\n\
            - [ ] add CI\n\
            \n\
            \n#### Docs\n\
            - [ ] write README\n\
            \n\
            \n";
        assert_eq!(md, expected);
    }

    #[test]
    fn test_markdown_scalars_and_plain_sections() {
        let doc = json!({
            "summary": "Ship a CLI",
            "meta": {"owner": "team", "weeks": 3}
        });
        let md = to_markdown(&doc);
        assert!(md.starts_with("## Summary\n\nShip a CLI\n\n"));
        assert!(md.contains("### Owner\n\nteam\n\n"));
        assert!(md.contains("### Weeks\n\n3\n\n"));
    }

    #[test]
    fn test_capitalize_lowercases_tail() {
        assert_eq!(capitalize("FRAMEWORKS"), "Frameworks");
        assert_eq!(section_title("api_DESIGN"), "Api Design");
    }

    #[test]
    fn test_completed_status_added() {
        let tagged = with_completed_status(&sample());
        let init = &tagged["environment_setup"]["categories"][0]["tasks"];
        assert_eq!(init[0], json!({"task": "scaffold project", "completed": false}));
        assert_eq!(init[1], json!({"task": "add CI", "completed": false}));
        // frameworks are not tasks
        assert_eq!(tagged["environment_setup"]["frameworks"][0], json!("click"));
    }

    #[test]
    fn test_section_level_tasks_tagged() {
        let doc = json!({"chores": {"tasks": ["water plants"]}});
        let tagged = with_completed_status(&doc);
        assert_eq!(
            tagged["chores"]["tasks"][0],
            json!({"task": "water plants", "completed": false})
        );
    }

    #[test]
    fn test_tagging_is_idempotent() {
        let once = with_completed_status(&sample());
        assert_eq!(with_completed_status(&once), once);
    }

    #[test]
    fn test_entries_in_order() {
        let tagged = with_completed_status(&sample());
        let tasks: Vec<_> = entries(&tagged).into_iter().map(|e| e.task).collect();
        assert_eq!(tasks, vec!["scaffold project", "add CI", "write README"]);
    }
}
