//! Sprite Assembler - Symbol Sprite Sheets
//!
//! Every admitted fragment becomes one `<symbol id="name">` inside a single
//! container `<svg>`. Consumers reference an icon as `<sprite path>#<name>`.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::hashing::sha256_hex;
use crate::normalize::{is_valid_name, split_root, NormalizedFragment};
use crate::registry::NameRegistry;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;
const CONTAINER_OPEN: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">"#;
const CONTAINER_CLOSE: &str = "</svg>";

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Fragment \"{0}\" is not a single <svg> element")]
    NotSvg(String),

    #[error("\"{0}\" cannot be used as a symbol id")]
    InvalidId(String),
}

/// Outcome of offering a fragment to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Added,
    Duplicate,
}

/// One output file and the ordered fragments assigned to it.
#[derive(Debug, Clone)]
pub struct SpriteTarget {
    name: String,
    output_path: PathBuf,
    fragments: Vec<NormalizedFragment>,
    registry: NameRegistry,
}

/// The combined document of one target, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledDocument {
    pub output_path: PathBuf,
    pub contents: String,
    /// Symbol ids in document order.
    pub definitions: Vec<String>,
}

impl CompiledDocument {
    pub fn hash(&self) -> String {
        sha256_hex(self.contents.as_bytes())
    }

    pub fn size(&self) -> usize {
        self.contents.len()
    }
}

impl SpriteTarget {
    pub fn new(name: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            output_path: output_path.into(),
            fragments: vec![],
            registry: NameRegistry::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn fragments(&self) -> &[NormalizedFragment] {
        &self.fragments
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.registry.names()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Append `fragment` unless its name was already admitted here; the
    /// first fragment under a name always wins.
    pub fn add(&mut self, fragment: NormalizedFragment) -> Admission {
        if !self.registry.admit(&fragment.name) {
            return Admission::Duplicate;
        }
        self.fragments.push(fragment);
        Admission::Added
    }

    /// Build the container document. A target without fragments compiles to
    /// an empty container.
    pub fn compile(&self) -> Result<CompiledDocument, CompileError> {
        let mut contents = String::new();
        contents.push_str(XML_DECLARATION);
        contents.push('\n');
        contents.push_str(CONTAINER_OPEN);
        contents.push('\n');

        let mut definitions = Vec::with_capacity(self.fragments.len());
        for fragment in &self.fragments {
            contents.push_str(&symbol(fragment)?);
            contents.push('\n');
            definitions.push(fragment.name.clone());
        }

        contents.push_str(CONTAINER_CLOSE);
        contents.push('\n');

        Ok(CompiledDocument {
            output_path: self.output_path.clone(),
            contents,
            definitions,
        })
    }
}

/// Re-tag a normalized root `<svg>` as `<symbol id="name">`, carrying its
/// remaining attributes (viewBox, fill, ...) over.
fn symbol(fragment: &NormalizedFragment) -> Result<String, CompileError> {
    if !is_valid_name(&fragment.name) {
        return Err(CompileError::InvalidId(fragment.name.clone()));
    }
    let parts = split_root(&fragment.markup)
        .ok_or_else(|| CompileError::NotSvg(fragment.name.clone()))?;

    Ok(match parts.body {
        Some(body) => format!(
            "<symbol id=\"{}\"{}>{}</symbol>",
            fragment.name, parts.attributes, body
        ),
        None => format!("<symbol id=\"{}\"{}/>", fragment.name, parts.attributes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fragment(name: &str, markup: &str) -> NormalizedFragment {
        NormalizedFragment { name: name.to_string(), markup: markup.to_string() }
    }

    #[test]
    fn test_compile_symbols_in_order() {
        let mut target = SpriteTarget::new("icons", "out/icons/icons.svg");
        target.add(fragment("check", r#"<svg viewBox="0 0 24 24"><path d="M1 1"/></svg>"#));
        target.add(fragment("arrow", r#"<svg viewBox="0 0 16 16"/>"#));

        let doc = target.compile().unwrap();
        assert_eq!(
            doc.contents,
            concat!(
                "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
                "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\">\n",
                "<symbol id=\"check\" viewBox=\"0 0 24 24\"><path d=\"M1 1\"/></symbol>\n",
                "<symbol id=\"arrow\" viewBox=\"0 0 16 16\"/>\n",
                "</svg>\n",
            )
        );
        assert_eq!(doc.definitions, vec!["check", "arrow"]);
        assert_eq!(doc.output_path, PathBuf::from("out/icons/icons.svg"));
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let mut target = SpriteTarget::new("icons", "icons.svg");
        assert_eq!(target.add(fragment("arrow", "<svg><g/></svg>")), Admission::Added);
        assert_eq!(target.add(fragment("arrow", "<svg><rect/></svg>")), Admission::Duplicate);

        assert_eq!(target.fragments().len(), 1);
        assert_eq!(target.fragments()[0].markup, "<svg><g/></svg>");
        assert_eq!(target.names().collect::<Vec<_>>(), vec!["arrow"]);
    }

    #[test]
    fn test_empty_target_compiles() {
        let target = SpriteTarget::new("empty", "empty.svg");
        assert!(target.is_empty());

        let doc = target.compile().unwrap();
        assert!(doc.definitions.is_empty());
        let parsed = roxmltree::Document::parse(&doc.contents).unwrap();
        assert_eq!(parsed.root_element().tag_name().name(), "svg");
        assert_eq!(parsed.root_element().children().filter(|n| n.is_element()).count(), 0);
    }

    #[test]
    fn test_compiled_document_is_well_formed() {
        let mut target = SpriteTarget::new("icons", "icons.svg");
        target.add(fragment("a", r##"<svg viewBox="0 0 1 1"><use xlink:href="#x"/></svg>"##));
        target.add(fragment("b", "<svg><title>b</title><circle r=\"1\"/></svg>"));

        let doc = target.compile().unwrap();
        let parsed = roxmltree::Document::parse(&doc.contents).unwrap();
        let ids: Vec<_> = parsed
            .root_element()
            .children()
            .filter(|n| n.tag_name().name() == "symbol")
            .filter_map(|n| n.attribute("id"))
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_non_svg_fragment_fails() {
        let mut target = SpriteTarget::new("icons", "icons.svg");
        target.add(fragment("broken", "<g/>"));
        assert!(matches!(target.compile(), Err(CompileError::NotSvg(name)) if name == "broken"));
    }

    #[test]
    fn test_invalid_id_fails() {
        let mut target = SpriteTarget::new("icons", "icons.svg");
        target.add(fragment("a b", "<svg/>"));
        assert!(matches!(target.compile(), Err(CompileError::InvalidId(_))));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let mut target = SpriteTarget::new("icons", "icons.svg");
        target.add(fragment("a", "<svg><g/></svg>"));
        let first = target.compile().unwrap();
        let second = target.compile().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.hash(), second.hash());
    }
}
