//! Sprite Pipeline - Single Entry Point
//!
//! Config errors are the only fatal ones. Everything below a target
//! (unreadable icons, malformed markup, duplicate names) is recorded on
//! that target's report, and a failing target never stops its siblings.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ConfigError, SpriteConfig};
use crate::normalize::Normalizer;
use crate::optimize::optimizer_for;
use crate::router::{plan_targets, RouterError, SourceGroup, TargetPlan};
use crate::source::{collect_svg_files, IconSource};
use crate::sprite::{Admission, CompiledDocument, SpriteTarget};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Configuration error: {0}")]
    Layout(#[from] RouterError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "error")]
pub enum TargetStatus {
    Written,
    /// Compiled but not written (dry run).
    Compiled,
    SourceFailed(String),
    CompileFailed(String),
    WriteFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFragment {
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub name: String,
    pub output_path: PathBuf,
    pub status: TargetStatus,
    pub icons: Vec<String>,
    pub duplicates: Vec<SkippedFragment>,
    pub failures: Vec<SkippedFragment>,
    pub size: Option<usize>,
    pub hash: Option<String>,
}

impl TargetReport {
    fn new(plan: &TargetPlan) -> Self {
        Self {
            name: plan.name.clone(),
            output_path: plan.output_path.clone(),
            status: TargetStatus::Compiled,
            icons: vec![],
            duplicates: vec![],
            failures: vec![],
            size: None,
            hash: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, TargetStatus::Written | TargetStatus::Compiled)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub targets: Vec<TargetReport>,
}

impl BuildReport {
    /// Any target that produced no document.
    pub fn has_failures(&self) -> bool {
        self.targets.iter().any(|t| !t.is_ok())
    }

    pub fn failed(&self) -> usize {
        self.targets.iter().filter(|t| !t.is_ok()).count()
    }

    pub fn target(&self, name: &str) -> Option<&TargetReport> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn written(&self) -> usize {
        self.targets.iter().filter(|t| t.status == TargetStatus::Written).count()
    }
}

/// The sprite pipeline - routes, collects, normalizes, assembles and writes.
#[derive(Debug)]
pub struct SpritePipeline {
    normalizer: Normalizer,
    dry_run: bool,
}

impl SpritePipeline {
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer, dry_run: false }
    }

    /// Title and optimizer settings taken from `config`.
    pub fn from_config(config: &SpriteConfig) -> Self {
        let mut normalizer = Normalizer::new().with_title(config.include_title);
        if config.optimize {
            normalizer = normalizer.with_optimizer(optimizer_for(config.optimizer.as_deref()));
        }
        Self::new(normalizer)
    }

    /// Compile everything but leave the filesystem alone.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Validate `config` and compute its targets without reading any source.
    pub fn plan(config: &SpriteConfig) -> Result<Vec<TargetPlan>, PipelineError> {
        config.validate()?;
        Ok(plan_targets(config)?)
    }

    /// Full run. Fails only when the configuration itself is unusable.
    pub fn run(&self, config: &SpriteConfig) -> Result<BuildReport, PipelineError> {
        let plans = Self::plan(config)?;
        Ok(self.build(&plans))
    }

    pub fn build(&self, plans: &[TargetPlan]) -> BuildReport {
        BuildReport {
            targets: plans.iter().map(|plan| self.build_target(plan)).collect(),
        }
    }

    #[instrument(skip_all, fields(sprite = %plan.name))]
    pub fn build_target(&self, plan: &TargetPlan) -> TargetReport {
        let mut report = TargetReport::new(plan);

        let sources = match &plan.group {
            SourceGroup::Directory(dir) => match collect_svg_files(dir) {
                Ok(files) => files.into_iter().map(IconSource::File).collect(),
                Err(e) => {
                    error!(error = %e, "skipping icon directory");
                    report.status = TargetStatus::SourceFailed(e.to_string());
                    return report;
                }
            },
            SourceGroup::Components(items) => items.clone(),
        };

        let mut target = SpriteTarget::new(&plan.name, &plan.output_path);
        for source in &sources {
            self.add_source(&mut target, source, &mut report);
        }

        let document = match target.compile() {
            Ok(document) => document,
            Err(e) => {
                error!(error = %e, "sprite generation failed");
                report.status = TargetStatus::CompileFailed(e.to_string());
                return report;
            }
        };

        report.icons = document.definitions.clone();
        report.size = Some(document.size());
        report.hash = Some(document.hash());

        if self.dry_run {
            info!(path = %document.output_path.display(), icons = report.icons.len(), "sprite compiled (dry run)");
            return report;
        }

        match write_document(&document) {
            Ok(()) => {
                info!(path = %document.output_path.display(), icons = report.icons.len(), "sprite created");
                report.status = TargetStatus::Written;
            }
            Err(e) => {
                error!(path = %document.output_path.display(), error = %e, "failed to write sprite");
                report.status = TargetStatus::WriteFailed(e.to_string());
            }
        }

        report
    }

    fn add_source(&self, target: &mut SpriteTarget, source: &IconSource, report: &mut TargetReport) {
        let id = source.id();
        let fragment = source
            .load()
            .map_err(|e| e.to_string())
            .and_then(|raw| self.normalizer.normalize(&raw, &id).map_err(|e| e.to_string()));

        let fragment = match fragment {
            Ok(fragment) => fragment,
            Err(reason) => {
                error!(source = %id, "{reason}");
                report.failures.push(SkippedFragment { source: id, reason });
                return;
            }
        };

        let name = fragment.name.clone();
        match target.add(fragment) {
            Admission::Added => debug!(source = %id, name = %name, "icon added"),
            Admission::Duplicate => {
                warn!(source = %id, name = %name, "duplicate icon ignored");
                report.duplicates.push(SkippedFragment {
                    source: id,
                    reason: format!("name \"{name}\" already in sprite"),
                });
            }
        }
    }
}

/// Write `document` to its path, creating parent directories. An existing
/// file is overwritten.
pub fn write_document(document: &CompiledDocument) -> io::Result<()> {
    if let Some(parent) = document.output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&document.output_path, &document.contents)
}
