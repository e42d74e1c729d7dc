//! Human review of a freshly persisted document

use std::io::{BufRead, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{Result, UplanError};

const REVIEW_PROMPT: &str =
    "Please review the generated document\n- Complete: Enter or Y\n- Regenerate: R\n- Exit: X";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Accept,
    Regenerate,
    Exit,
}

/// Presents a persisted document to a human and reads back a decision
pub trait ReviewChannel: Send + Sync {
    fn review(&self, path: &Path) -> Result<ReviewDecision>;
}

/// Accepts every document without asking
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoAccept;

impl ReviewChannel for AutoAccept {
    fn review(&self, _path: &Path) -> Result<ReviewDecision> {
        Ok(ReviewDecision::Accept)
    }
}

/// Opens the file with the desktop handler and asks on stdin
#[derive(Debug, Clone)]
pub struct TerminalReview {
    open_file: bool,
}

impl Default for TerminalReview {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalReview {
    pub fn new() -> Self {
        Self { open_file: true }
    }

    /// Skip launching the desktop handler (e.g. over SSH)
    pub fn with_open_file(mut self, open_file: bool) -> Self {
        self.open_file = open_file;
        self
    }
}

impl ReviewChannel for TerminalReview {
    fn review(&self, path: &Path) -> Result<ReviewDecision> {
        if self.open_file {
            open_file(path);
        }
        println!("Generated {}", path.display());
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        ask_decision(&mut stdin.lock(), &mut stdout.lock())
    }
}

/// Prompt until a valid choice is read
pub fn ask_decision<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<ReviewDecision> {
    loop {
        writeln!(output, "{}", REVIEW_PROMPT).map_err(review_io)?;
        write!(output, "> ").map_err(review_io)?;
        output.flush().map_err(review_io)?;

        let mut line = String::new();
        let read = input.read_line(&mut line).map_err(review_io)?;
        if read == 0 {
            return Err(UplanError::Review {
                message: "input closed before a choice was made".to_string(),
            });
        }

        match parse_choice(&line) {
            Some(decision) => return Ok(decision),
            None => writeln!(output, "Invalid choice: {}", line.trim()).map_err(review_io)?,
        }
    }
}

/// Enter or `y` accepts, `r` regenerates, `x` exits
pub fn parse_choice(input: &str) -> Option<ReviewDecision> {
    match input.trim().to_ascii_lowercase().as_str() {
        "" | "y" => Some(ReviewDecision::Accept),
        "r" => Some(ReviewDecision::Regenerate),
        "x" => Some(ReviewDecision::Exit),
        _ => None,
    }
}

fn review_io(err: std::io::Error) -> UplanError {
    UplanError::Review {
        message: err.to_string(),
    }
}

/// Launch the platform's default handler; failures are only logged
pub fn open_file(path: &Path) {
    let mut cmd = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        Command::new("xdg-open")
    };
    cmd.arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    if let Err(e) = cmd.spawn() {
        tracing::warn!("Could not open {}: {}", path.display(), e);
    }
}
