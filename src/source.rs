//! Icon Sources - Files on Disk and Rendered Components

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use thiserror::Error;
use walkdir::WalkDir;

/// Extension (case-insensitive) that marks a file as a vector icon.
pub const SVG_EXTENSION: &str = "svg";

/// Directory-level failure. Aborts enumeration of that root only.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Failed to scan {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Fragment-level failure while reading or rendering one icon.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot derive an icon name from {}", .0.display())]
    Unnamed(PathBuf),

    #[error("Failed to start renderer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Renderer `{program}` exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Renderer `{0}` produced non UTF-8 output")]
    InvalidUtf8(String),
}

/// Produces the markup of one component. Implementations are injected
/// into the pipeline, so any rendering technology can sit behind it.
pub trait RenderIcon: fmt::Debug {
    fn render(&self) -> Result<String, LoadError>;
}

/// Markup known up front.
#[derive(Debug, Clone)]
pub struct InlineMarkup(String);

impl InlineMarkup {
    pub fn new(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }
}

impl RenderIcon for InlineMarkup {
    fn render(&self) -> Result<String, LoadError> {
        Ok(self.0.clone())
    }
}

/// Runs an external program and takes its stdout as the markup.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl CommandRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args, current_dir: None }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

impl RenderIcon for CommandRenderer {
    fn render(&self) -> Result<String, LoadError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let output = command.output().map_err(|source| LoadError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(LoadError::CommandFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| LoadError::InvalidUtf8(self.program.clone()))
    }
}

/// One unit of input.
#[derive(Debug, Clone)]
pub enum IconSource {
    File(PathBuf),
    Component {
        name: String,
        renderer: Arc<dyn RenderIcon>,
    },
}

/// Unprocessed markup paired with its logical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFragment {
    pub name: String,
    pub markup: String,
}

impl IconSource {
    pub fn component(name: impl Into<String>, renderer: impl RenderIcon + 'static) -> Self {
        Self::Component { name: name.into(), renderer: Arc::new(renderer) }
    }

    /// Path or component name, for diagnostics.
    pub fn id(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Component { name, .. } => name.clone(),
        }
    }

    /// Read the file or invoke the renderer.
    pub fn load(&self) -> Result<RawFragment, LoadError> {
        match self {
            Self::File(path) => {
                let name = icon_name(path).ok_or_else(|| LoadError::Unnamed(path.clone()))?;
                let markup = fs::read_to_string(path).map_err(|source| LoadError::Read {
                    path: path.clone(),
                    source,
                })?;
                Ok(RawFragment { name, markup })
            }
            Self::Component { name, renderer } => Ok(RawFragment {
                name: icon_id(name),
                markup: renderer.render()?,
            }),
        }
    }
}

pub fn is_svg_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case(SVG_EXTENSION))
}

/// File name without its extension, as an icon name.
pub fn icon_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(icon_id)
        .filter(|s| !s.is_empty())
}

/// Runs of whitespace become `_`, so `arrow left` is addressed as `#arrow_left`.
pub fn icon_id(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Recursively collect every `.svg` file under `root`, as absolute paths.
///
/// Entries come back in the order the filesystem lists them. Any error
/// while descending aborts the whole root.
pub fn collect_svg_files(root: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let root = root.canonicalize()
        .map_err(|_| SourceError::DirectoryNotFound(root.to_path_buf()))?;
    if !root.is_dir() {
        return Err(SourceError::DirectoryNotFound(root));
    }

    let mut files = vec![];
    for entry in WalkDir::new(&root).follow_links(true) {
        let entry = entry.map_err(|source| SourceError::Walk {
            path: source.path().unwrap_or(&root).to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && is_svg_file(entry.path()) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}
