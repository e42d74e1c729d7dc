use std::collections::HashMap;

use serde_json::{Value, json};

use uplan::checklist;
use uplan::schema::{Schema, TodoDocument};
use uplan::storage;

fn todo_document() -> Value {
    json!({
        "environment_setup": {
            "frameworks": ["tokio", "clap"],
            "categories": [
                {"title": "Init", "tasks": ["create workspace", "add CI", "pin toolchain"]},
                {"title": "Docs", "tasks": ["write README"]}
            ]
        },
        "core_features": {
            "frameworks": ["serde"],
            "categories": [
                {"title": "Parsing", "tasks": ["read config", "validate input"]}
            ]
        }
    })
}

#[test]
fn stored_document_converts_to_checklist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todo.toml");
    let document = todo_document();
    Schema::Todo.validate(&document).unwrap();

    storage::write_document(&path, &document).unwrap();
    let stored = storage::read_document(&path).unwrap();
    assert_eq!(stored, document);

    let tagged = checklist::with_completed_status(&stored);
    let entries = checklist::entries(&tagged);

    let typed: TodoDocument = serde_json::from_value(stored).unwrap();
    let mut expected: HashMap<(String, String), usize> = HashMap::new();
    for (section, body) in &typed {
        for category in &body.categories {
            for task in &category.tasks {
                *expected
                    .entry((format!("{}/{}", section, category.title), task.clone()))
                    .or_default() += 1;
            }
        }
    }

    let mut found: HashMap<(String, String), usize> = HashMap::new();
    for entry in &entries {
        assert!(!entry.completed, "{} should start incomplete", entry.task);
        let category = entry.category.clone().unwrap_or_default();
        *found
            .entry((format!("{}/{}", entry.section, category), entry.task.clone()))
            .or_default() += 1;
    }

    assert_eq!(found, expected);
    assert_eq!(entries.len(), 6);
}

#[test]
fn checklist_files_agree_with_document() {
    let dir = tempfile::tempdir().unwrap();
    let files = storage::write_checklist(dir.path(), &todo_document()).unwrap();

    let markdown = std::fs::read_to_string(&files.markdown).unwrap();
    for task in [
        "create workspace",
        "add CI",
        "pin toolchain",
        "write README",
        "read config",
        "validate input",
    ] {
        assert_eq!(markdown.matches(&format!("- [ ] {}\n", task)).count(), 1);
    }
    assert!(markdown.starts_with("## Environment Setup\n\n### Frameworks\n\n- tokio\n- clap\n"));
    // sections keep document order
    let setup = markdown.find("## Environment Setup").unwrap();
    let core = markdown.find("## Core Features").unwrap();
    assert!(setup < core);

    let json: Value = serde_json::from_str(&std::fs::read_to_string(&files.json).unwrap()).unwrap();
    assert_eq!(json, checklist::with_completed_status(&todo_document()));
    assert_eq!(
        json["core_features"]["categories"][0]["tasks"][1],
        json!({"task": "validate input", "completed": false})
    );
}

#[test]
fn completed_flags_survive_retagging() {
    let mut tagged = checklist::with_completed_status(&todo_document());
    tagged["environment_setup"]["categories"][0]["tasks"][0]["completed"] = json!(true);

    let retagged = checklist::with_completed_status(&tagged);
    let entries = checklist::entries(&retagged);

    let done: Vec<_> = entries.iter().filter(|e| e.completed).map(|e| e.task.as_str()).collect();
    assert_eq!(done, vec!["create workspace"]);
}
