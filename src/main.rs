//! uplan: questionnaire answers → plan.toml → todo checklist
//!
//! Usage:
//!   uplan                      # plan then todo
//!   uplan plan --model ollama/qwq
//!   uplan todo --retry 3
//!   uplan update overview --value '{"goal": "ship it"}'

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use uplan::clients::{OpenAiCompatibleClient, check_model_support};
use uplan::config::{Config, MAX_ATTEMPTS_CEILING};
use uplan::forms::StdinAnswers;
use uplan::pipeline::{ChunkSink, PLAN_FILE, Pipeline};
use uplan::review::TerminalReview;
use uplan::storage;
use uplan::{CompletionWorkflow, Status, WorkflowResponse};

#[derive(Parser)]
#[command(name = "uplan")]
#[command(version, about = "Plan and todo generator", long_about = None)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// LLM model to use (e.g. ollama/qwq, openai/gpt-4o)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Max attempts per generation
    #[arg(long, global = true)]
    retry: Option<u32>,

    /// Form category
    #[arg(long, global = true)]
    category: Option<String>,

    /// Input folder
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Output folder
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Print the reply as it arrives instead of storing it
    #[arg(long, global = true)]
    stream: bool,

    /// Accept every generated document without asking
    #[arg(long, global = true)]
    no_review: bool,

    /// Do not launch the desktop handler for review
    #[arg(long, global = true)]
    no_open: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate plan only
    Plan,
    /// Generate todo only
    Todo,
    /// Generate plan, then todo
    All,
    /// Replace one section of a generated document
    Update {
        /// Top-level section to replace
        section: String,
        /// New content as JSON
        #[arg(long, conflicts_with = "file")]
        value: Option<String>,
        /// Read the new content (JSON) from a file
        #[arg(long)]
        file: Option<PathBuf>,
        /// Document inside the output folder
        #[arg(long, default_value = PLAN_FILE)]
        document: String,
    },
}

enum Step {
    Plan,
    Todo,
    All,
}

impl CommonArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.generation.model = model.clone();
        }
        if let Some(retry) = self.retry {
            config.generation.max_attempts = retry.clamp(1, MAX_ATTEMPTS_CEILING);
        }
        if let Some(category) = &self.category {
            config.paths.category = category.clone();
        }
        if let Some(input) = &self.input {
            config.paths.input_dir = input.clone();
        }
        if let Some(output) = &self.output {
            config.paths.output_dir = output.clone();
        }
        if self.stream {
            config.generation.stream = true;
        }
        if self.no_review {
            config.generation.review = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = Config::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    cli.common.apply(&mut config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.runtime.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let step = match cli.command.unwrap_or(Commands::All) {
        Commands::Update {
            section,
            value,
            file,
            document,
        } => return update(&config, &section, value, file, &document),
        Commands::Plan => Step::Plan,
        Commands::Todo => Step::Todo,
        Commands::All => Step::All,
    };

    let (route, message) = match check_model_support(&config.generation.model, &config) {
        Ok(supported) => supported,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
    };
    println!("{}", message);
    info!("Routing {} via {:?}", route.name, route.kind);

    std::fs::create_dir_all(config.output_folder())
        .with_context(|| format!("creating {}", config.output_folder().display()))?;

    let provider = Arc::new(OpenAiCompatibleClient::new(&config)?);
    let mut workflow = CompletionWorkflow::new(provider);
    if config.generation.review && !config.generation.stream {
        let review = TerminalReview::new().with_open_file(!cli.common.no_open);
        workflow = workflow.with_review(Arc::new(review));
    }
    let pipeline = Pipeline::from_config(workflow, &config);

    let mut print_chunk = |chunk: &str| {
        print!("{}", chunk);
        let _ = std::io::stdout().flush();
    };
    let sink: ChunkSink<'_> = if config.generation.stream {
        Some(&mut print_chunk)
    } else {
        None
    };

    let any_failed = match step {
        Step::Plan => failed(&pipeline.run_plan(&mut StdinAnswers, sink).await),
        Step::Todo => failed(&pipeline.run_todo(sink).await),
        Step::All => {
            let (plan, todo) = pipeline.all(&mut StdinAnswers, sink).await;
            failed(&plan) || todo.as_ref().is_some_and(failed)
        }
    };

    if config.generation.stream {
        println!();
    }
    Ok(if any_failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn failed(response: &WorkflowResponse) -> bool {
    match response.status {
        Status::Error => {
            eprintln!(
                "Failed: {}",
                response.message.as_deref().unwrap_or("unknown error")
            );
            true
        }
        Status::Exit => {
            println!("Stopped at review");
            false
        }
        Status::Success => {
            if let Some(path) = &response.output_file {
                println!("Saved {}", path.display());
            }
            false
        }
    }
}

fn update(
    config: &Config,
    section: &str,
    value: Option<String>,
    file: Option<PathBuf>,
    document: &str,
) -> Result<ExitCode> {
    let raw = match (value, file) {
        (Some(value), _) => value,
        (None, Some(file)) => std::fs::read_to_string(&file)
            .with_context(|| format!("reading {}", file.display()))?,
        (None, None) => anyhow::bail!("pass the new content with --value or --file"),
    };
    let content: Value = serde_json::from_str(&raw).context("section content must be JSON")?;

    let path = config.output_folder().join(document);
    storage::update_section(&path, section, content)?;
    println!("Updated [{}] in {}", section, path.display());
    Ok(ExitCode::SUCCESS)
}
