//! Plan → todo orchestration over the completion workflow
//!
//! Every step reports a [`WorkflowResponse`] so the CLI can decide whether to
//! continue without inspecting errors.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Result, UplanError};
use crate::forms::{self, AnswerSource};
use crate::prompt::Payload;
use crate::schema::Schema;
use crate::storage;
use crate::workflow::{CompletionWorkflow, GenerationRequest, Outcome, WorkflowResponse};

pub const PLAN_FILE: &str = "plan.toml";
pub const TODO_FILE: &str = "todo.toml";

/// Fragment sink passed through to streaming attempts
pub type ChunkSink<'a> = Option<&'a mut (dyn FnMut(&str) + Send)>;

/// Load `<input>/plan.toml` and fill its `template`
///
/// The whole form becomes the plan payload: every section the form carries,
/// the answered `template`, and a `user_input` section with the answers
/// alone. The form file itself is left untouched.
pub fn prepare_answers(input_folder: &Path, source: &mut dyn AnswerSource) -> Result<Payload> {
    let form_path = input_folder.join(PLAN_FILE);
    let form = forms::load_form(&form_path)?;
    let mut payload = Payload::from_value(form)?;

    let template = payload.get("template").ok_or_else(|| UplanError::Config {
        message: format!("{} has no [template] section", form_path.display()),
    })?;
    let (filled, answers) = forms::collect_answers(template, source)?;

    payload.insert("user_input", answers.into_value());
    payload.insert("template", filled);

    Ok(payload)
}

/// Build the todo payload: `<input>/todo.toml` plus the generated plan under `plan`
pub fn prepare_todo(input_folder: &Path, output_folder: &Path) -> Result<Payload> {
    let plan_path = output_folder.join(PLAN_FILE);
    if !plan_path.exists() {
        return Err(UplanError::Storage {
            message: format!("{} not found; generate a plan first", plan_path.display()),
        });
    }
    let plan = storage::read_document(&plan_path)?;

    let todo_form = input_folder.join(TODO_FILE);
    let mut payload = if todo_form.exists() {
        Payload::from_value(storage::read_document(&todo_form)?)?
    } else {
        warn!("{} not found, sending the plan alone", todo_form.display());
        Payload::new()
    };
    payload.insert("plan", plan);

    Ok(payload)
}

pub struct Pipeline {
    workflow: CompletionWorkflow,
    model: String,
    max_attempts: u32,
    streaming: bool,
    input_folder: PathBuf,
    output_folder: PathBuf,
}

impl Pipeline {
    pub fn new(
        workflow: CompletionWorkflow,
        model: impl Into<String>,
        input_folder: impl Into<PathBuf>,
        output_folder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            workflow,
            model: model.into(),
            max_attempts: crate::workflow::DEFAULT_MAX_ATTEMPTS,
            streaming: false,
            input_folder: input_folder.into(),
            output_folder: output_folder.into(),
        }
    }

    pub fn from_config(workflow: CompletionWorkflow, config: &Config) -> Self {
        Self::new(
            workflow,
            config.generation.model.clone(),
            config.input_folder(),
            config.output_folder(),
        )
        .with_max_attempts(config.generation.max_attempts)
        .with_streaming(config.generation.stream)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    fn request(&self, payload: Payload, file_name: &str) -> GenerationRequest {
        GenerationRequest::new(payload, self.model.clone(), self.output_folder.join(file_name))
            .with_max_attempts(self.max_attempts)
            .with_streaming(self.streaming)
    }

    /// Generate `<output>/plan.toml` from the answered form
    pub async fn plan(&self, answers: Payload, on_chunk: ChunkSink<'_>) -> WorkflowResponse {
        let request = self.request(answers, PLAN_FILE);
        let response: WorkflowResponse = self.workflow.execute(&request, on_chunk).await.into();
        report("plan", &response);
        response
    }

    /// Generate `<output>/todo.toml` and its checklist renderings
    pub async fn todo(&self, payload: Payload, on_chunk: ChunkSink<'_>) -> WorkflowResponse {
        let request = self.request(payload, TODO_FILE).with_schema(Schema::Todo);
        let outcome = self.workflow.execute(&request, on_chunk).await;

        if let Ok(Outcome::Success { document, .. }) = &outcome
            && let Err(e) = storage::write_checklist(&self.output_folder, document)
        {
            let response = WorkflowResponse::error(e.to_string());
            report("todo", &response);
            return response;
        }

        let response: WorkflowResponse = outcome.into();
        report("todo", &response);
        response
    }

    /// Ask for answers, then generate the plan
    pub async fn run_plan(
        &self,
        source: &mut dyn AnswerSource,
        on_chunk: ChunkSink<'_>,
    ) -> WorkflowResponse {
        match prepare_answers(&self.input_folder, source) {
            Ok(answers) => self.plan(answers, on_chunk).await,
            Err(e) => {
                let response = WorkflowResponse::error(e.to_string());
                report("plan", &response);
                response
            }
        }
    }

    /// Generate the todo from the stored plan
    pub async fn run_todo(&self, on_chunk: ChunkSink<'_>) -> WorkflowResponse {
        match prepare_todo(&self.input_folder, &self.output_folder) {
            Ok(payload) => self.todo(payload, on_chunk).await,
            Err(e) => {
                let response = WorkflowResponse::error(e.to_string());
                report("todo", &response);
                response
            }
        }
    }

    /// Plan then todo; the todo step is skipped when the plan exits or fails
    pub async fn all(
        &self,
        source: &mut dyn AnswerSource,
        mut on_chunk: ChunkSink<'_>,
    ) -> (WorkflowResponse, Option<WorkflowResponse>) {
        let plan = self.run_plan(source, reborrow(&mut on_chunk)).await;
        if plan.is_terminal() {
            info!("Skipping todo generation after plan status {:?}", plan.status);
            return (plan, None);
        }
        // streamed plans are never persisted, so there is nothing to build on
        if plan.output_file.is_none() {
            info!("Skipping todo generation: plan was streamed, not stored");
            return (plan, None);
        }
        let todo = self.run_todo(reborrow(&mut on_chunk)).await;
        (plan, Some(todo))
    }
}

fn reborrow<'a>(sink: &'a mut ChunkSink<'_>) -> ChunkSink<'a> {
    match sink {
        Some(f) => Some(&mut **f),
        None => None,
    }
}

fn report(step: &str, response: &WorkflowResponse) {
    match (&response.output_file, &response.message) {
        (_, Some(message)) if !response.is_success() => {
            error!("{} failed: {}", step, message);
        }
        (Some(path), _) => info!("{} {:?}: {}", step, response.status, path.display()),
        _ => info!("{} {:?}", step, response.status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prepare_todo_merges_plan() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        let output = dir.path().join("output");
        storage::write_document(
            &input.join(TODO_FILE),
            &json!({"instructions": {"style": "small tasks"}}),
        )
        .unwrap();
        storage::write_document(&output.join(PLAN_FILE), &json!({"overview": {"goal": "cli"}}))
            .unwrap();

        let payload = prepare_todo(&input, &output).unwrap();
        assert_eq!(
            payload.into_value(),
            json!({
                "instructions": {"style": "small tasks"},
                "plan": {"overview": {"goal": "cli"}}
            })
        );
    }

    #[test]
    fn test_prepare_todo_requires_plan() {
        let dir = tempfile::tempdir().unwrap();
        let err = prepare_todo(dir.path(), dir.path()).unwrap_err();
        assert!(matches!(err, UplanError::Storage { .. }));
    }

    #[test]
    fn test_prepare_answers_sends_whole_form() {
        let dir = tempfile::tempdir().unwrap();
        let form_path = dir.path().join(PLAN_FILE);
        storage::write_document(
            &form_path,
            &json!({
                "prompt": {"instructions": "Reply with one json fenced block"},
                "template": {
                    "project": {
                        "goal": {"ask": "What are you building?"},
                        "users": {"ask": "Who uses it?", "answer": "devs"}
                    }
                }
            }),
        )
        .unwrap();
        let before = std::fs::read_to_string(&form_path).unwrap();

        let mut source = |_: &str, _: &str, _: &forms::FormQuestion| -> Result<String> {
            Ok("a planner".to_string())
        };
        let payload = prepare_answers(dir.path(), &mut source).unwrap().into_value();

        assert_eq!(
            payload["prompt"],
            json!({"instructions": "Reply with one json fenced block"})
        );
        assert_eq!(
            payload["user_input"],
            json!({"project": {"goal": "a planner", "users": "devs"}})
        );
        assert_eq!(payload["template"]["project"]["goal"]["answer"], json!("a planner"));
        assert_eq!(std::fs::read_to_string(&form_path).unwrap(), before);
    }

    #[test]
    fn test_prepare_answers_requires_template() {
        let dir = tempfile::tempdir().unwrap();
        storage::write_document(&dir.path().join(PLAN_FILE), &json!({"other": {"a": "b"}}))
            .unwrap();
        let mut source =
            |_: &str, _: &str, _: &forms::FormQuestion| -> Result<String> { Ok(String::new()) };
        let err = prepare_answers(dir.path(), &mut source).unwrap_err();
        assert!(matches!(err, UplanError::Config { .. }));
    }
}
