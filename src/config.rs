//! Sprite Configuration - Declarative Build Input
//!
//! Loaded once per run, immutable afterwards.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::source::{CommandRenderer, IconSource, InlineMarkup};

/// File looked up in the working directory when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "sprites.config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing required \"outputDir\" in config")]
    MissingOutputDir,

    #[error("No icon sources provided (set \"iconDirs\" or \"iconComponents\")")]
    NoSources,

    #[error("\"spriteFileName\" must not be empty")]
    EmptySpriteFileName,

    #[error("Component group name must not be empty")]
    EmptyGroupName,

    #[error("Component in group \"{0}\" has an empty name")]
    EmptyComponentName(String),

    #[error("Component \"{0}\" has an empty render command")]
    EmptyCommand(String),

    #[error("\"optimizer\" command must not be empty")]
    EmptyOptimizer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpriteConfig {
    /// Folders scanned recursively for raw `.svg` icons; one sprite each.
    #[serde(default)]
    pub icon_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub icon_components: ComponentGroups,
    #[serde(default)]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub flat_output: bool,
    #[serde(default = "default_sprite_file_name")]
    pub sprite_file_name: String,
    #[serde(default)]
    pub optimize: bool,
    #[serde(default)]
    pub include_title: bool,
    /// External optimizer argv; the built-in minifier runs when absent.
    #[serde(default)]
    pub optimizer: Option<Vec<String>>,
    /// Directory render commands run in. Set to the config file's directory on load.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

fn default_sprite_file_name() -> String { "sprite".to_string() }

/// Either a flat list of components or components keyed by group name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ComponentGroups {
    Flat(Vec<ComponentSpec>),
    Grouped(IndexMap<String, Vec<ComponentSpec>>),
}

impl Default for ComponentGroups {
    fn default() -> Self {
        Self::Flat(vec![])
    }
}

impl ComponentGroups {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Flat(items) => items.is_empty(),
            Self::Grouped(groups) => groups.is_empty(),
        }
    }

    /// Resolve either shape into ordered `(group name, components)` pairs.
    ///
    /// A flat list becomes a single group named `flat_name`; an empty flat
    /// list yields no groups at all.
    pub fn to_groups(&self, flat_name: &str) -> Vec<(String, Vec<ComponentSpec>)> {
        match self {
            Self::Flat(items) if items.is_empty() => vec![],
            Self::Flat(items) => vec![(flat_name.to_string(), items.clone())],
            Self::Grouped(groups) => groups
                .iter()
                .map(|(name, items)| (name.clone(), items.clone()))
                .collect(),
        }
    }
}

/// A component declared in the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentSpec {
    pub name: String,
    #[serde(flatten)]
    pub render: RenderSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RenderSpec {
    /// Markup given inline.
    Markup(String),
    /// Program whose stdout is the rendered markup.
    Command(Vec<String>),
}

impl ComponentSpec {
    pub fn markup(name: impl Into<String>, markup: impl Into<String>) -> Self {
        Self { name: name.into(), render: RenderSpec::Markup(markup.into()) }
    }

    pub fn command(name: impl Into<String>, argv: Vec<String>) -> Self {
        Self { name: name.into(), render: RenderSpec::Command(argv) }
    }

    /// Turn the declaration into a renderable source.
    pub fn to_source(&self, base_dir: Option<&Path>) -> IconSource {
        match &self.render {
            RenderSpec::Markup(markup) => {
                IconSource::component(&self.name, InlineMarkup::new(markup.clone()))
            }
            RenderSpec::Command(argv) => {
                let (program, args) = argv.split_first()
                    .map(|(p, a)| (p.clone(), a.to_vec()))
                    .unwrap_or_default();
                let mut renderer = CommandRenderer::new(program, args);
                if let Some(dir) = base_dir {
                    renderer = renderer.current_dir(dir);
                }
                IconSource::component(&self.name, renderer)
            }
        }
    }
}

impl SpriteConfig {
    /// Minimal config writing to `output_dir`, everything else defaulted.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            icon_dirs: vec![],
            icon_components: ComponentGroups::default(),
            output_dir: output_dir.into(),
            flat_output: false,
            sprite_file_name: default_sprite_file_name(),
            optimize: false,
            include_title: false,
            optimizer: None,
            base_dir: None,
        }
    }

    /// Load `sprites.config.json` from `dir`.
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        Self::load(&dir.join(DEFAULT_CONFIG_FILE))
    }

    /// Load, resolve relative paths against the file's directory, and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.resolve_relative_to(base);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for dir in &mut self.icon_dirs {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        if self.output_dir.is_relative() && !self.output_dir.as_os_str().is_empty() {
            self.output_dir = base.join(&self.output_dir);
        }
        self.base_dir = Some(base.to_path_buf());
    }

    /// Checks that do not touch the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingOutputDir);
        }
        if self.icon_dirs.is_empty() && self.icon_components.is_empty() {
            return Err(ConfigError::NoSources);
        }
        if self.sprite_file_name.trim().is_empty() {
            return Err(ConfigError::EmptySpriteFileName);
        }
        if matches!(&self.optimizer, Some(argv) if argv.is_empty()) {
            return Err(ConfigError::EmptyOptimizer);
        }

        for (group, items) in self.icon_components.to_groups(&self.sprite_file_name) {
            if group.trim().is_empty() {
                return Err(ConfigError::EmptyGroupName);
            }
            for item in &items {
                if item.name.trim().is_empty() {
                    return Err(ConfigError::EmptyComponentName(group.clone()));
                }
                if matches!(&item.render, RenderSpec::Command(argv) if argv.is_empty()) {
                    return Err(ConfigError::EmptyCommand(item.name.clone()));
                }
            }
        }

        Ok(())
    }
}
