//! Workflow commands understood by the runner
//!
//! Annotations are written to stdout as `::<command>::<message>` lines.
//! Saved state goes to the file named by `GITHUB_STATE` when the runner
//! provides one, otherwise through the legacy `::save-state` command.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Failed to write workflow command: {0}")]
    WriteError(#[from] io::Error),
    #[error("Value for {0} contains the state delimiter")]
    DelimiterCollision(String),
}

/// Escape a message for use as workflow command data
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Escape a value used as a workflow command property
pub fn escape_property(value: &str) -> String {
    escape_data(value).replace(':', "%3A").replace(',', "%2C")
}

/// Sink for workflow commands
pub struct Workflow<W: Write> {
    out: W,
    state_file: Option<PathBuf>,
    warnings: usize,
}

impl Workflow<io::Stdout> {
    /// Commands on stdout, state file taken from `GITHUB_STATE`
    pub fn from_env() -> Self {
        let state_file = std::env::var_os("GITHUB_STATE")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::new(io::stdout(), state_file)
    }
}

impl<W: Write> Workflow<W> {
    pub fn new(out: W, state_file: Option<PathBuf>) -> Self {
        Self {
            out,
            state_file,
            warnings: 0,
        }
    }

    /// Number of warnings issued so far
    pub fn warnings(&self) -> usize {
        self.warnings
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn issue(&mut self, command: &str, message: &str) -> io::Result<()> {
        writeln!(self.out, "::{}::{}", command, escape_data(message))?;
        self.out.flush()
    }

    /// Non-fatal annotation. Write failures are ignored so a closed stdout
    /// cannot turn a warning into an error.
    pub fn warning(&mut self, message: &str) {
        self.warnings += 1;
        let _ = self.issue("warning", message);
    }

    pub fn notice(&mut self, message: &str) {
        let _ = self.issue("notice", message);
    }

    /// Error annotation. Marking the step failed also requires a non-zero exit.
    pub fn error(&mut self, message: &str) {
        let _ = self.issue("error", message);
    }

    /// Persist `name=value` for the post step
    pub fn save_state(&mut self, name: &str, value: &str) -> Result<(), WorkflowError> {
        match &self.state_file {
            Some(path) => append_state(path, name, value),
            None => {
                writeln!(
                    self.out,
                    "::save-state name={}::{}",
                    escape_property(name),
                    escape_data(value)
                )?;
                self.out.flush()?;
                Ok(())
            }
        }
    }
}

/// Append a `name<<DELIM` heredoc entry to the runner's state file
fn append_state(path: &Path, name: &str, value: &str) -> Result<(), WorkflowError> {
    let delimiter = format!("ghadelimiter_{}", std::process::id());
    if name.contains(&delimiter) || value.contains(&delimiter) {
        return Err(WorkflowError::DelimiterCollision(name.to_string()));
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    write!(file, "{name}<<{delimiter}\n{value}\n{delimiter}\n")?;
    Ok(())
}
