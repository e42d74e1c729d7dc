//! Questionnaire forms and answer collection
//!
//! A plan form is a TOML file whose `[template]` table maps
//! section → field → `{ ask, description, answer }`. Pre-filled answers are
//! kept; the rest are asked through an [`AnswerSource`].

use std::io::{BufRead, Write};
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{Result, UplanError};
use crate::prompt::Payload;
use crate::storage;

/// The question shown for one form field
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormQuestion {
    pub ask: String,
    pub description: Option<String>,
}

impl FormQuestion {
    fn from_field(field: &str, details: &Value) -> Self {
        match details {
            Value::String(ask) => Self {
                ask: ask.clone(),
                description: None,
            },
            Value::Object(map) => Self {
                ask: map
                    .get("ask")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| field.replace('_', " ")),
                description: map
                    .get("description")
                    .and_then(Value::as_str)
                    .filter(|d| !d.trim().is_empty())
                    .map(str::to_string),
            },
            _ => Self {
                ask: field.replace('_', " "),
                description: None,
            },
        }
    }
}

/// Supplies answers for questions that have none yet
pub trait AnswerSource {
    fn answer(&mut self, section: &str, field: &str, question: &FormQuestion) -> Result<String>;
}

impl<F> AnswerSource for F
where
    F: FnMut(&str, &str, &FormQuestion) -> Result<String>,
{
    fn answer(&mut self, section: &str, field: &str, question: &FormQuestion) -> Result<String> {
        self(section, field, question)
    }
}

/// Reads one line per question from a reader, echoing prompts to a writer
pub struct LineAnswers<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LineAnswers<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> AnswerSource for LineAnswers<R, W> {
    fn answer(&mut self, section: &str, field: &str, question: &FormQuestion) -> Result<String> {
        let io = |e: std::io::Error| ask_error(section, field, e);
        show_question(&mut self.output, question).map_err(io)?;

        let mut line = String::new();
        self.input.read_line(&mut line).map_err(io)?;
        Ok(line.trim().to_string())
    }
}

/// Asks on the terminal, locking stdin only while a line is read
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinAnswers;

impl AnswerSource for StdinAnswers {
    fn answer(&mut self, section: &str, field: &str, question: &FormQuestion) -> Result<String> {
        let io = |e: std::io::Error| ask_error(section, field, e);
        show_question(&mut std::io::stdout().lock(), question).map_err(io)?;

        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map_err(io)?;
        Ok(line.trim().to_string())
    }
}

fn show_question<W: Write>(output: &mut W, question: &FormQuestion) -> std::io::Result<()> {
    writeln!(output, "\n{}", question.ask)?;
    if let Some(description) = &question.description {
        writeln!(output, "  {}", description)?;
    }
    write!(output, "> ")?;
    output.flush()
}

fn ask_error(section: &str, field: &str, err: std::io::Error) -> UplanError {
    UplanError::Internal {
        message: format!("failed to ask {}.{}: {}", section, field, err),
    }
}

/// Load a questionnaire form
pub fn load_form(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(UplanError::Config {
            message: format!("form file {} not found", path.display()),
        });
    }
    storage::read_document(path)
}

/// Fill in every unanswered field of a template
///
/// Returns the template with `answer` set on each field table, and the
/// answers-only payload.
pub fn collect_answers(template: &Value, source: &mut dyn AnswerSource) -> Result<(Value, Payload)> {
    let sections = template.as_object().ok_or_else(|| UplanError::Config {
        message: "form template must be a table of sections".to_string(),
    })?;

    let mut filled = Map::new();
    let mut answers = Payload::new();

    for (section, fields) in sections {
        let Some(fields) = fields.as_object() else {
            filled.insert(section.clone(), fields.clone());
            continue;
        };

        let mut filled_fields = Map::new();
        for (field, details) in fields {
            let existing = details
                .get("answer")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string);

            let answer = match existing {
                Some(answer) => answer,
                None => {
                    let question = FormQuestion::from_field(field, details);
                    source.answer(section, field, &question)?
                }
            };

            let mut details = match details {
                Value::Object(map) => map.clone(),
                Value::String(ask) => {
                    let mut map = Map::new();
                    map.insert("ask".to_string(), Value::String(ask.clone()));
                    map
                }
                _ => Map::new(),
            };
            details.insert("answer".to_string(), Value::String(answer.clone()));
            filled_fields.insert(field.clone(), Value::Object(details));
            answers.insert_answer(section, field.clone(), answer);
        }
        filled.insert(section.clone(), Value::Object(filled_fields));
    }

    Ok((Value::Object(filled), answers))
}

/// Group flat `section.field` keys into an answers payload
///
/// With a prefix (web forms post `answers.<section>.<field>`), keys without
/// it are ignored. Keys lacking a `.` separator are ignored.
pub fn merge_form_fields<I, K, V>(fields: I, prefix: Option<&str>) -> Payload
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut payload = Payload::new();
    for (key, value) in fields {
        let key = key.as_ref();
        let key = match prefix {
            Some(prefix) => match key.strip_prefix(prefix).and_then(|k| k.strip_prefix('.')) {
                Some(rest) => rest,
                None => continue,
            },
            None => key,
        };
        let Some((section, field)) = key.split_once('.') else {
            continue;
        };
        if section.is_empty() || field.is_empty() {
            continue;
        }
        payload.insert_answer(section, field, value);
    }
    payload
}
