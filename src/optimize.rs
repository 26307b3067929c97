//! Optimizers - Minification Behind a Capability
//!
//! A failing optimizer never aborts a build; callers fall back to the
//! markup they passed in.

use std::fmt;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use thiserror::Error;

use crate::normalize::minify_svg;

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("Failed to start optimizer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error talking to optimizer `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Optimizer `{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Optimizer `{0}` produced non UTF-8 output")]
    InvalidUtf8(String),

    #[error("Optimizer produced empty output")]
    Empty,

    #[error("Cannot minify markup: {0}")]
    Parse(String),
}

pub trait Optimize: fmt::Debug {
    fn optimize(&self, markup: &str) -> Result<String, OptimizeError>;
}

/// Built-in minifier. Works on the parsed tree, so attribute values and
/// text inside `<text>` come out untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Minifier;

impl Optimize for Minifier {
    fn optimize(&self, markup: &str) -> Result<String, OptimizeError> {
        minify_svg(markup).map_err(OptimizeError::Parse)
    }
}

/// Pipes markup through an external program (stdin in, stdout out),
/// e.g. `svgo --input - --output -`.
#[derive(Debug, Clone)]
pub struct CommandOptimizer {
    program: String,
    args: Vec<String>,
}

impl CommandOptimizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }

    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    fn io_error(&self, source: io::Error) -> OptimizeError {
        OptimizeError::Io { program: self.program.clone(), source }
    }
}

impl Optimize for CommandOptimizer {
    fn optimize(&self, markup: &str) -> Result<String, OptimizeError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| OptimizeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(markup.as_bytes()).map_err(|e| self.io_error(e))?;
        }

        let output = child.wait_with_output().map_err(|e| self.io_error(e))?;
        if !output.status.success() {
            return Err(OptimizeError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let out = String::from_utf8(output.stdout)
            .map_err(|_| OptimizeError::InvalidUtf8(self.program.clone()))?;
        if out.trim().is_empty() {
            return Err(OptimizeError::Empty);
        }
        Ok(out.trim().to_string())
    }
}

/// The external command when one is configured, the built-in minifier otherwise.
pub fn optimizer_for(argv: Option<&[String]>) -> Box<dyn Optimize> {
    match argv.and_then(CommandOptimizer::from_argv) {
        Some(command) => Box::new(command),
        None => Box::new(Minifier),
    }
}
