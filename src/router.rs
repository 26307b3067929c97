//! Output Router - Which Sprites Exist and Where They Go
//!
//! | components | flatOutput | target path                         |
//! |------------|------------|-------------------------------------|
//! | flat list  | true       | `outputDir/<spriteFileName>.svg`    |
//! | flat list  | false      | `outputDir/<spriteFileName>/<spriteFileName>.svg` |
//! | grouped    | true       | `outputDir/<group>.svg`             |
//! | grouped    | false      | `outputDir/<group>/<group>.svg`     |
//!
//! Every icon directory gets its own target named after the directory,
//! routed by the same flat/nested rule.

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::SpriteConfig;
use crate::source::{IconSource, SVG_EXTENSION};

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Cannot name a sprite after {}", .0.display())]
    UnnamedDirectory(PathBuf),

    #[error("Sprites \"{first}\" and \"{second}\" would both be written to {}", .path.display())]
    OutputCollision {
        path: PathBuf,
        first: String,
        second: String,
    },
}

/// Where a target's icons come from.
#[derive(Debug, Clone)]
pub enum SourceGroup {
    Directory(PathBuf),
    Components(Vec<IconSource>),
}

/// A routed target before any source has been read.
#[derive(Debug, Clone)]
pub struct TargetPlan {
    pub name: String,
    pub output_path: PathBuf,
    pub group: SourceGroup,
}

/// Serializable view of a plan, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub name: String,
    pub output_path: PathBuf,
    pub source: String,
}

impl TargetPlan {
    pub fn directory(name: impl Into<String>, output_path: impl Into<PathBuf>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            output_path: output_path.into(),
            group: SourceGroup::Directory(dir.into()),
        }
    }

    pub fn components(name: impl Into<String>, output_path: impl Into<PathBuf>, sources: Vec<IconSource>) -> Self {
        Self {
            name: name.into(),
            output_path: output_path.into(),
            group: SourceGroup::Components(sources),
        }
    }

    pub fn summary(&self) -> PlanSummary {
        let source = match &self.group {
            SourceGroup::Directory(dir) => dir.display().to_string(),
            SourceGroup::Components(items) => format!("{} component(s)", items.len()),
        };
        PlanSummary {
            name: self.name.clone(),
            output_path: self.output_path.clone(),
            source,
        }
    }
}

/// `outputDir/<name>.svg` when flat, `outputDir/<name>/<name>.svg` otherwise.
pub fn output_path(output_dir: &Path, name: &str, flat: bool) -> PathBuf {
    let file = format!("{name}.{SVG_EXTENSION}");
    if flat {
        output_dir.join(file)
    } else {
        output_dir.join(name).join(file)
    }
}

/// Sprite name for an icon directory: its base name.
pub fn directory_name(dir: &Path) -> Result<String, RouterError> {
    if let Some(name) = dir.file_name().and_then(|n| n.to_str()) {
        return Ok(name.to_string());
    }
    // `.`, `..` and friends
    dir.canonicalize()
        .ok()
        .and_then(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .ok_or_else(|| RouterError::UnnamedDirectory(dir.to_path_buf()))
}

/// Compute every target for `config`: icon directories first, then
/// component groups, each in declaration order. Two targets resolving to
/// the same file is an error, reported before anything is written.
pub fn plan_targets(config: &SpriteConfig) -> Result<Vec<TargetPlan>, RouterError> {
    let flat = config.flat_output;
    let mut plans = vec![];

    for dir in &config.icon_dirs {
        let name = directory_name(dir)?;
        let path = output_path(&config.output_dir, &name, flat);
        plans.push(TargetPlan::directory(name, path, dir.clone()));
    }

    let base_dir = config.base_dir.as_deref();
    for (group, items) in config.icon_components.to_groups(&config.sprite_file_name) {
        let path = output_path(&config.output_dir, &group, flat);
        let sources = items.iter().map(|item| item.to_source(base_dir)).collect();
        plans.push(TargetPlan::components(group, path, sources));
    }

    check_collisions(&plans)?;
    Ok(plans)
}

fn check_collisions(plans: &[TargetPlan]) -> Result<(), RouterError> {
    let mut seen: HashMap<&Path, &str> = HashMap::new();
    for plan in plans {
        if let Some(first) = seen.insert(&plan.output_path, &plan.name) {
            return Err(RouterError::OutputCollision {
                path: plan.output_path.clone(),
                first: first.to_string(),
                second: plan.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ComponentGroups, ComponentSpec};
    use indexmap::IndexMap;

    fn component(name: &str) -> ComponentSpec {
        ComponentSpec::markup(name, "<svg/>")
    }

    fn paths(plans: &[TargetPlan]) -> Vec<(String, PathBuf)> {
        plans.iter().map(|p| (p.name.clone(), p.output_path.clone())).collect()
    }

    #[test]
    fn test_flat_list_flat_output() {
        let mut config = SpriteConfig::new("out");
        config.flat_output = true;
        config.icon_components = ComponentGroups::Flat(vec![component("Home")]);

        let plans = plan_targets(&config).unwrap();
        assert_eq!(paths(&plans), vec![("sprite".into(), PathBuf::from("out/sprite.svg"))]);
    }

    #[test]
    fn test_flat_list_nested_output() {
        let mut config = SpriteConfig::new("out");
        config.sprite_file_name = "icons".into();
        config.icon_components = ComponentGroups::Flat(vec![component("Home")]);

        let plans = plan_targets(&config).unwrap();
        assert_eq!(paths(&plans), vec![("icons".into(), PathBuf::from("out/icons/icons.svg"))]);
    }

    #[test]
    fn test_grouped_outputs() {
        let mut groups = IndexMap::new();
        groups.insert("nav".to_string(), vec![component("Home"), component("Settings")]);
        groups.insert("social".to_string(), vec![component("Twitter")]);

        let mut config = SpriteConfig::new("dist/sprites");
        config.icon_components = ComponentGroups::Grouped(groups);

        let nested = plan_targets(&config).unwrap();
        assert_eq!(
            paths(&nested),
            vec![
                ("nav".into(), PathBuf::from("dist/sprites/nav/nav.svg")),
                ("social".into(), PathBuf::from("dist/sprites/social/social.svg")),
            ]
        );
        assert!(matches!(&nested[0].group, SourceGroup::Components(items) if items.len() == 2));

        config.flat_output = true;
        let flat = plan_targets(&config).unwrap();
        assert_eq!(
            paths(&flat),
            vec![
                ("nav".into(), PathBuf::from("dist/sprites/nav.svg")),
                ("social".into(), PathBuf::from("dist/sprites/social.svg")),
            ]
        );
    }

    #[test]
    fn test_directories_come_first() {
        let mut config = SpriteConfig::new("out");
        config.icon_dirs = vec![PathBuf::from("assets/icons/"), PathBuf::from("assets/logos")];
        config.icon_components = ComponentGroups::Flat(vec![component("Home")]);

        let plans = plan_targets(&config).unwrap();
        assert_eq!(
            paths(&plans),
            vec![
                ("icons".into(), PathBuf::from("out/icons/icons.svg")),
                ("logos".into(), PathBuf::from("out/logos/logos.svg")),
                ("sprite".into(), PathBuf::from("out/sprite/sprite.svg")),
            ]
        );
    }

    #[test]
    fn test_collision_rejected() {
        let mut groups = IndexMap::new();
        groups.insert("icons".to_string(), vec![component("Home")]);

        let mut config = SpriteConfig::new("out");
        config.flat_output = true;
        config.icon_dirs = vec![PathBuf::from("src/icons")];
        config.icon_components = ComponentGroups::Grouped(groups);

        match plan_targets(&config) {
            Err(RouterError::OutputCollision { path, first, second }) => {
                assert_eq!(path, PathBuf::from("out/icons.svg"));
                assert_eq!(first, "icons");
                assert_eq!(second, "icons");
            }
            other => panic!("expected collision, got {other:?}"),
        }
    }

    #[test]
    fn test_same_dir_name_in_different_parents_collides() {
        let mut config = SpriteConfig::new("out");
        config.icon_dirs = vec![PathBuf::from("a/icons"), PathBuf::from("b/icons")];
        assert!(matches!(plan_targets(&config), Err(RouterError::OutputCollision { .. })));
    }

    #[test]
    fn test_empty_flat_list_has_no_target() {
        let mut config = SpriteConfig::new("out");
        config.icon_dirs = vec![PathBuf::from("icons")];
        let plans = plan_targets(&config).unwrap();
        assert_eq!(plans.len(), 1);
    }
}
