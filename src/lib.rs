pub mod checklist;
pub mod clients;
pub mod config;
pub mod error;
pub mod extract;
pub mod forms;
pub mod pipeline;
pub mod prompt;
pub mod review;
pub mod schema;
pub mod storage;
pub mod workflow;

pub use error::{Result, UplanError};
pub use workflow::{CompletionWorkflow, GenerationRequest, Outcome, Status, WorkflowResponse};
