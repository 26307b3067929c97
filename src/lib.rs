//! Spritegen Core - SVG Sprite Compiler
//!
//! Collects icons from directories and rendered components, normalizes
//! each one, and packs them into symbol sprite sheets:
//!
//! 1. Router decides which sprites exist and where they are written
//! 2. Sources are enumerated (files) or rendered (components)
//! 3. Normalizer strips clashing root attributes, optionally minifies and titles
//! 4. Each sprite admits one fragment per name, first one wins
//! 5. Sprites compile to one `<svg>` of `<symbol>`s and are written to disk

pub mod config;
pub mod source;
pub mod normalize;
pub mod optimize;
pub mod registry;
pub mod sprite;
pub mod router;
pub mod pipeline;
pub mod hashing;

pub use config::{ComponentGroups, ComponentSpec, ConfigError, RenderSpec, SpriteConfig};
pub use source::{IconSource, RawFragment, RenderIcon, collect_svg_files};
pub use normalize::{NormalizedFragment, NormalizeError, Normalizer};
pub use optimize::{CommandOptimizer, Minifier, Optimize, OptimizeError};
pub use registry::NameRegistry;
pub use sprite::{CompileError, CompiledDocument, SpriteTarget};
pub use router::{plan_targets, RouterError, SourceGroup, TargetPlan};
pub use pipeline::{BuildReport, PipelineError, SpritePipeline, TargetReport, TargetStatus};
pub use hashing::{canonical_json, sha256_hex};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
