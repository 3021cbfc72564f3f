//! Running the hunt repository's code formatter over written files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::pipeline::Cause;
use crate::config::FormatterConfig;

#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("failed to start formatter '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("formatter '{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

impl FormatError {
    pub fn cause(&self) -> Cause {
        Cause::Subprocess
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOutcome {
    Formatted { files: usize },
    Skipped { reason: String },
}

/// Run the configured formatter with `files` appended to its arguments.
///
/// A missing formatter, configured or installed, is skipped with a warning.
pub fn run_formatter(
    config: &FormatterConfig,
    workdir: &Path,
    files: &[PathBuf],
) -> Result<FormatOutcome, FormatError> {
    let Some(program) = config.command.as_deref().filter(|c| !c.trim().is_empty()) else {
        return Ok(skipped("no formatter configured"));
    };
    if files.is_empty() {
        return Ok(FormatOutcome::Skipped {
            reason: "nothing to format".to_string(),
        });
    }

    tracing::debug!(program, files = files.len(), "running formatter");
    let output = match Command::new(program)
        .args(&config.args)
        .args(files)
        .current_dir(workdir)
        .output()
    {
        Ok(output) => output,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Ok(skipped(&format!("formatter '{program}' is not installed")));
        }
        Err(source) => {
            return Err(FormatError::Spawn {
                program: program.to_string(),
                source,
            });
        }
    };

    if !output.status.success() {
        return Err(FormatError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(FormatOutcome::Formatted { files: files.len() })
}

fn skipped(reason: &str) -> FormatOutcome {
    tracing::warn!("skipping formatting: {reason}");
    FormatOutcome::Skipped {
        reason: reason.to_string(),
    }
}
