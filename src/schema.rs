//! Shape checks applied to model output before it is persisted

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Result, UplanError};

/// One titled group of tasks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub title: String,
    pub tasks: Vec<String>,
}

/// A todo section: the frameworks it relies on and its task groups
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TodoSection {
    pub frameworks: Vec<String>,
    pub categories: Vec<Category>,
}

/// Section name → todo section
pub type TodoDocument = BTreeMap<String, TodoSection>;

/// Expected shape of a generated document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Every section carries `frameworks` and `categories[{title, tasks}]`
    Todo,
}

impl Schema {
    pub fn validate(&self, document: &Value) -> Result<()> {
        match self {
            Schema::Todo => validate_todo(document),
        }
    }
}

fn validate_todo(document: &Value) -> Result<()> {
    let sections = document.as_object().ok_or_else(|| UplanError::Validation {
        message: "todo document must be a mapping of sections".to_string(),
    })?;

    if sections.is_empty() {
        return Err(UplanError::Validation {
            message: "todo document has no sections".to_string(),
        });
    }

    for (name, section) in sections {
        TodoSection::deserialize(section).map_err(|e| UplanError::Validation {
            message: format!("section '{}': {}", name, e),
        })?;
    }

    Ok(())
}
