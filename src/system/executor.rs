// src/system/executor.rs

use std::path::Path;
use std::process::{Command as StdCommand, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("No command specified to run.")]
    EmptyCommand,
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
    #[error("Command '{command}' exited with a non-zero error code: {stderr}")]
    NonZeroExitStatus { command: String, stderr: String },
    #[error("Command '{command}' produced output that was not valid UTF-8")]
    InvalidUtf8Output {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Runs `program` with `args` in `cwd` and captures its standard output.
/// Blocking; intended for short-running driver commands such as `git tag`.
pub fn capture_output(program: &str, args: &[&str], cwd: &Path) -> Result<String, ExecutionError> {
    if program.trim().is_empty() {
        return Err(ExecutionError::EmptyCommand);
    }
    let command_line = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");
    let clean_cwd = dunce::simplified(cwd);
    log::trace!("Running '{}' in {}", command_line, clean_cwd.display());

    let command_output = StdCommand::new(program)
        .args(args)
        .current_dir(clean_cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| ExecutionError::CommandFailed(command_line.clone(), e))?;

    if !command_output.status.success() {
        return Err(ExecutionError::NonZeroExitStatus {
            command: command_line,
            stderr: String::from_utf8_lossy(&command_output.stderr).trim().to_string(),
        });
    }

    String::from_utf8(command_output.stdout).map_err(|e| ExecutionError::InvalidUtf8Output {
        command: command_line,
        source: e,
    })
}
