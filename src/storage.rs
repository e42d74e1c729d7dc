//! Durable document storage
//!
//! Generated documents are kept as TOML so they stay human-editable between
//! runs; the checklist is written next to them as markdown and JSON.

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::checklist;
use crate::error::{Result, UplanError};

pub const CHECKLIST_MARKDOWN: &str = "todo.md";
pub const CHECKLIST_JSON: &str = "todo.json";

/// Write a document, creating parent directories and replacing any prior file
pub fn write_document(path: &Path, document: &Value) -> Result<()> {
    if !document.is_object() {
        return Err(UplanError::Serialization {
            message: "only mappings can be stored as TOML documents".to_string(),
        });
    }
    // Encode first so a failed encoding never truncates an existing document
    let encoded = toml::to_string_pretty(document)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, encoded)?;
    tracing::debug!("Wrote document to {}", path.display());
    Ok(())
}

/// Read a stored TOML document as JSON values
pub fn read_document(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| UplanError::Storage {
        message: format!("failed to read {}: {}", path.display(), e),
    })?;
    let value: Value = toml::from_str(&content)?;
    Ok(value)
}

/// Replace one top-level section of a stored document
///
/// A missing file is treated as an empty document.
pub fn update_section(path: &Path, section: &str, content: Value) -> Result<Value> {
    let mut document = if path.exists() {
        read_document(path)?
    } else {
        Value::Object(serde_json::Map::new())
    };

    match document.as_object_mut() {
        Some(map) => {
            map.insert(section.to_string(), content);
        }
        None => {
            return Err(UplanError::Storage {
                message: format!("{} does not hold a mapping", path.display()),
            });
        }
    }

    write_document(path, &document)?;
    Ok(document)
}

/// Paths of the checklist artifacts written by [`write_checklist`]
#[derive(Debug, Clone, PartialEq)]
pub struct ChecklistFiles {
    pub markdown: PathBuf,
    pub json: PathBuf,
}

/// Write `todo.md` and `todo.json` for a todo document into `dir`
pub fn write_checklist(dir: &Path, document: &Value) -> Result<ChecklistFiles> {
    std::fs::create_dir_all(dir)?;

    let markdown_path = dir.join(CHECKLIST_MARKDOWN);
    std::fs::write(&markdown_path, checklist::to_markdown(document))?;

    let json_path = dir.join(CHECKLIST_JSON);
    let tagged = checklist::with_completed_status(document);
    std::fs::write(&json_path, serde_json::to_string_pretty(&tagged)?)?;

    tracing::info!(
        "Checklist written to {} and {}",
        markdown_path.display(),
        json_path.display()
    );

    Ok(ChecklistFiles {
        markdown: markdown_path,
        json: json_path,
    })
}
