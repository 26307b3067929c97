//! Fragment Normalizer - Raw Markup to Sprite-Ready Fragments
//!
//! Normalization is a pure `RawFragment -> NormalizedFragment` transform:
//! the source document is parsed, the root `<svg>` is re-serialized
//! without the attributes that would clash once fragments are merged,
//! and the result is optionally minified and titled.

use roxmltree::{Document, Node, NodeType, ParsingOptions};
use thiserror::Error;
use tracing::warn;

use crate::optimize::Optimize;
use crate::source::RawFragment;

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
pub(crate) const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub(crate) const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Elements whose whitespace-only text is rendered or read out.
const TEXT_CONTENT: &[&str] = &["text", "tspan", "textPath", "title", "desc", "style", "script"];

/// Root attributes dropped during cleaning, as `(namespace, local name)`.
/// Namespace declarations (`xmlns`, `xmlns:*`) are never re-emitted at
/// all; the sprite container binds the SVG and XLink namespaces.
const STRIPPED_ATTRIBUTES: &[(Option<&str>, &str)] = &[
    (Some(XML_NS), "space"),
    (None, "version"),
    (None, "width"),
    (None, "height"),
    (None, "style"),
    (None, "id"),
];

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Malformed fragment {source_id}: {reason}")]
    MalformedFragment { source_id: String, reason: String },

    #[error("Invalid icon name {name:?} from {source_id}")]
    InvalidName { source_id: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFragment {
    pub name: String,
    pub markup: String,
}

/// The root `<svg>` of a serialized fragment split at its open tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvgParts<'a> {
    /// Everything between `<svg` and `>`, leading whitespace included.
    pub attributes: &'a str,
    /// Element content; `None` for a self-closing root.
    pub body: Option<&'a str>,
}

/// How a parsed tree is written back out.
#[derive(Debug, Clone, Copy, Default)]
struct WriteOptions {
    /// Drop `STRIPPED_ATTRIBUTES` from the root.
    strip_root: bool,
    /// Drop comments, `<metadata>` and whitespace-only text outside text content.
    minify: bool,
}

#[derive(Debug)]
pub struct Normalizer {
    include_title: bool,
    optimizer: Option<Box<dyn Optimize>>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self { include_title: false, optimizer: None }
    }

    pub fn with_title(mut self, include_title: bool) -> Self {
        self.include_title = include_title;
        self
    }

    pub fn with_optimizer(mut self, optimizer: Box<dyn Optimize>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn normalize(
        &self,
        raw: &RawFragment,
        source_id: &str,
    ) -> Result<NormalizedFragment, NormalizeError> {
        if !is_valid_name(&raw.name) {
            return Err(NormalizeError::InvalidName {
                source_id: source_id.to_string(),
                name: raw.name.clone(),
            });
        }

        let malformed = |reason: String| NormalizeError::MalformedFragment {
            source_id: source_id.to_string(),
            reason,
        };

        let cleaned = clean_svg(&raw.markup).map_err(malformed)?;

        let markup = match &self.optimizer {
            Some(optimizer) => optimize_or_keep(optimizer.as_ref(), cleaned, source_id),
            None => cleaned,
        };

        let markup = if self.include_title {
            with_title(&markup, &raw.name)
                .ok_or_else(|| malformed("cannot insert <title>".to_string()))?
        } else {
            markup
        };

        Ok(NormalizedFragment { name: raw.name.clone(), markup })
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn optimize_or_keep(optimizer: &dyn Optimize, cleaned: String, source_id: &str) -> String {
    match optimizer.optimize(&cleaned) {
        Ok(optimized) if split_root(&optimized).is_some() => optimized,
        Ok(_) => {
            warn!(source = source_id, "optimizer output is not a single <svg>, keeping cleaned markup");
            cleaned
        }
        Err(e) => {
            warn!(source = source_id, error = %e, "optimization failed, keeping cleaned markup");
            cleaned
        }
    }
}

/// Names end up as XML ids and URL fragments.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>' | '&' | '#'))
}

/// Parse `markup`, find the first `<svg>` element and re-serialize it with
/// the root-level presentation and identity attributes removed.
pub fn clean_svg(markup: &str) -> Result<String, String> {
    rewrite(markup, WriteOptions { strip_root: true, minify: false })
}

/// Re-serialize the first `<svg>` of `markup` without comments, metadata or
/// whitespace-only text. Text content and attribute values are kept as is.
pub fn minify_svg(markup: &str) -> Result<String, String> {
    rewrite(markup, WriteOptions { strip_root: false, minify: true })
}

/// Markup that fails to parse on its own (e.g. an `xlink:href` without
/// its declaration) is retried in the scope of a sprite container.
fn rewrite(markup: &str, options: WriteOptions) -> Result<String, String> {
    match Document::parse_with_options(markup, parsing_options()) {
        Ok(doc) => write_first_svg(&doc, options),
        Err(e) => {
            let scoped = format!(r#"<sprite xmlns="{SVG_NS}" xmlns:xlink="{XLINK_NS}">{markup}</sprite>"#);
            let doc = Document::parse_with_options(&scoped, parsing_options()).map_err(|_| e.to_string())?;
            write_first_svg(&doc, options)
        }
    }
}

fn parsing_options() -> ParsingOptions {
    ParsingOptions { allow_dtd: true, ..ParsingOptions::default() }
}

fn write_first_svg(doc: &Document<'_>, options: WriteOptions) -> Result<String, String> {
    let root = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "svg")
        .ok_or_else(|| "no <svg> element".to_string())?;

    let mut out = String::new();
    write_element(&mut out, root, true, false, options);
    Ok(out)
}

/// Insert `<title>name</title>` as the first child of the root.
pub fn with_title(markup: &str, name: &str) -> Option<String> {
    let parts = split_root(markup)?;
    Some(format!(
        "<svg{}><title>{}</title>{}</svg>",
        parts.attributes,
        escape(name, false),
        parts.body.unwrap_or_default(),
    ))
}

/// Split serialized `<svg …>…</svg>` markup. Returns `None` unless the
/// whole (trimmed) input is exactly one `svg` element.
pub fn split_root(markup: &str) -> Option<SvgParts<'_>> {
    let rest = markup.trim().strip_prefix("<svg")?;
    let open_end = find_tag_end(rest)?;
    let (open, after) = (&rest[..open_end], &rest[open_end + 1..]);

    if !open.is_empty() && !open.starts_with(|c: char| c.is_ascii_whitespace() || c == '/') {
        return None;
    }

    if let Some(attributes) = open.strip_suffix('/') {
        return after.is_empty().then_some(SvgParts {
            attributes: attributes.trim_end(),
            body: None,
        });
    }

    let body = after.strip_suffix("</svg>")?;
    Some(SvgParts { attributes: open.trim_end(), body: Some(body) })
}

fn find_tag_end(s: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

fn is_stripped(namespace: Option<&str>, name: &str) -> bool {
    STRIPPED_ATTRIBUTES.iter().any(|&(ns, local)| ns == namespace && local == name)
}

/// Only SVG (or un-namespaced) elements survive. Editor data such as
/// `sodipodi:namedview` is dropped along with its subtree.
fn is_svg_element(node: Node<'_, '_>) -> bool {
    matches!(node.tag_name().namespace(), None | Some(SVG_NS))
}

/// Serialized name for an attribute, `None` when its namespace would be
/// unbound inside the sprite container.
fn attribute_name(namespace: Option<&str>, local: &str) -> Option<String> {
    match namespace {
        None => Some(local.to_string()),
        Some(XML_NS) => Some(format!("xml:{local}")),
        Some(XLINK_NS) => Some(format!("xlink:{local}")),
        Some(_) => None,
    }
}

fn write_element(out: &mut String, node: Node<'_, '_>, is_root: bool, preserve: bool, options: WriteOptions) {
    // SVG elements are written unprefixed; the container binds the default namespace.
    let tag = if is_root { "svg" } else { node.tag_name().name() };

    out.push('<');
    out.push_str(tag);

    for attr in node.attributes() {
        if is_root && options.strip_root && is_stripped(attr.namespace(), attr.name()) {
            continue;
        }
        let Some(name) = attribute_name(attr.namespace(), attr.name()) else {
            continue;
        };
        out.push(' ');
        out.push_str(&name);
        out.push_str("=\"");
        out.push_str(&escape(attr.value(), true));
        out.push('"');
    }

    let preserve = preserve
        || TEXT_CONTENT.contains(&tag)
        || node.attribute((XML_NS, "space")) == Some("preserve");

    let children: Vec<_> = node
        .children()
        .filter(|c| match c.node_type() {
            NodeType::Element => {
                is_svg_element(*c) && !(options.minify && c.tag_name().name() == "metadata")
            }
            NodeType::Text => {
                !(options.minify && !preserve && c.text().map_or(true, |t| t.trim().is_empty()))
            }
            NodeType::Comment => !options.minify,
            _ => false,
        })
        .collect();

    if children.is_empty() {
        out.push_str("/>");
        return;
    }

    out.push('>');
    for child in children {
        match child.node_type() {
            NodeType::Element => write_element(out, child, false, preserve, options),
            NodeType::Text => out.push_str(&escape(child.text().unwrap_or_default(), false)),
            NodeType::Comment => {
                out.push_str("<!--");
                out.push_str(child.text().unwrap_or_default());
                out.push_str("-->");
            }
            _ => {}
        }
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn escape(value: &str, in_attribute: bool) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' if in_attribute => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::{Minifier, OptimizeError};
    use pretty_assertions::assert_eq;

    fn raw(name: &str, markup: &str) -> RawFragment {
        RawFragment { name: name.to_string(), markup: markup.to_string() }
    }

    #[derive(Debug)]
    struct FailingOptimizer;

    impl Optimize for FailingOptimizer {
        fn optimize(&self, _markup: &str) -> Result<String, OptimizeError> {
            Err(OptimizeError::Empty)
        }
    }

    #[derive(Debug)]
    struct GarbageOptimizer;

    impl Optimize for GarbageOptimizer {
        fn optimize(&self, _markup: &str) -> Result<String, OptimizeError> {
            Ok("not markup".to_string())
        }
    }

    #[test]
    fn test_strips_root_attributes() {
        let input = r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" xml:space="preserve" version="1.1" id="Layer_1" width="24" height="24" style="fill:red" viewBox="0 0 24 24"><path d="M0 0h24v24H0z"/></svg>"#;

        let cleaned = clean_svg(input).unwrap();
        assert_eq!(cleaned, r#"<svg viewBox="0 0 24 24"><path d="M0 0h24v24H0z"/></svg>"#);
    }

    #[test]
    fn test_nested_attributes_untouched() {
        let input = r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="10"><rect id="r" width="5" height="5" style="fill:blue"/><use xlink:href="#r"/></svg>"##;

        let cleaned = clean_svg(input).unwrap();
        assert_eq!(
            cleaned,
            r##"<svg><rect id="r" width="5" height="5" style="fill:blue"/><use xlink:href="#r"/></svg>"##
        );
    }

    #[test]
    fn test_editor_namespaces_dropped() {
        let input = r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape" xmlns:sodipodi="http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd" inkscape:version="1.3" sodipodi:docname="gear.svg" viewBox="0 0 8 8"><sodipodi:namedview id="nv" inkscape:zoom="2"/><g inkscape:label="Layer 1" inkscape:groupmode="layer"><path d="M0 0"/></g></svg>"#;

        let cleaned = clean_svg(input).unwrap();
        assert_eq!(cleaned, r#"<svg viewBox="0 0 8 8"><g><path d="M0 0"/></g></svg>"#);
    }

    #[test]
    fn test_prefixed_svg_elements_unprefixed() {
        let input = r#"<svg:svg xmlns:svg="http://www.w3.org/2000/svg" viewBox="0 0 1 1"><svg:rect width="1"/></svg:svg>"#;
        assert_eq!(clean_svg(input).unwrap(), r#"<svg viewBox="0 0 1 1"><rect width="1"/></svg>"#);
    }

    #[test]
    fn test_undeclared_xlink_accepted() {
        let cleaned = clean_svg(r##"<svg><use xlink:href="#a"/></svg>"##).unwrap();
        assert_eq!(cleaned, r##"<svg><use xlink:href="#a"/></svg>"##);
    }

    #[test]
    fn test_finds_svg_inside_wrapper() {
        let cleaned = clean_svg(r#"<div><svg viewBox="0 0 1 1"><g/></svg></div>"#).unwrap();
        assert_eq!(cleaned, r#"<svg viewBox="0 0 1 1"><g/></svg>"#);
    }

    #[test]
    fn test_escapes_text_and_values() {
        let cleaned = clean_svg(r#"<svg data-x="a &quot;b&quot; &amp; c"><text>1 &lt; 2</text></svg>"#).unwrap();
        assert_eq!(cleaned, r#"<svg data-x="a &quot;b&quot; &amp; c"><text>1 &lt; 2</text></svg>"#);
    }

    #[test]
    fn test_missing_svg_is_malformed() {
        let err = Normalizer::new().normalize(&raw("x", "<div/>"), "icons/x.svg").unwrap_err();
        match err {
            NormalizeError::MalformedFragment { source_id, .. } => assert_eq!(source_id, "icons/x.svg"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unparseable_is_malformed() {
        let result = Normalizer::new().normalize(&raw("x", "<svg><path></svg>"), "x");
        assert!(matches!(result, Err(NormalizeError::MalformedFragment { .. })));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let result = Normalizer::new().normalize(&raw("my icon", "<svg/>"), "my icon.svg");
        assert!(matches!(result, Err(NormalizeError::InvalidName { .. })));
    }

    #[test]
    fn test_title_is_first_child() {
        let fragment = Normalizer::new()
            .with_title(true)
            .normalize(&raw("arrow", r#"<svg viewBox="0 0 2 2"><path d="M0 0"/></svg>"#), "arrow")
            .unwrap();
        assert_eq!(
            fragment.markup,
            r#"<svg viewBox="0 0 2 2"><title>arrow</title><path d="M0 0"/></svg>"#
        );
    }

    #[test]
    fn test_title_on_empty_root() {
        let fragment = Normalizer::new()
            .with_title(true)
            .normalize(&raw("dot", r#"<svg width="1"/>"#), "dot")
            .unwrap();
        assert_eq!(fragment.markup, "<svg><title>dot</title></svg>");
    }

    #[test]
    fn test_minifier_applied() {
        let fragment = Normalizer::new()
            .with_optimizer(Box::new(Minifier))
            .normalize(&raw("a", "<svg>\n  <g>\n    <path/>\n  </g>\n</svg>"), "a")
            .unwrap();
        assert_eq!(fragment.markup, "<svg><g><path/></g></svg>");
    }

    #[test]
    fn test_minify_keeps_text_content() {
        let input = "<svg>\n  <text><tspan>Hello</tspan> <tspan>World</tspan></text>\n  <!-- note -->\n  <metadata>x</metadata>\n</svg>";
        assert_eq!(
            minify_svg(input).unwrap(),
            "<svg><text><tspan>Hello</tspan> <tspan>World</tspan></text></svg>"
        );
    }

    #[test]
    fn test_minify_keeps_attribute_values() {
        let input = "<svg>\n<path d=\"M0 0    L1 1\" data-label=\"a  b\"/>\n</svg>";
        assert_eq!(
            minify_svg(input).unwrap(),
            "<svg><path d=\"M0 0    L1 1\" data-label=\"a  b\"/></svg>"
        );
    }

    #[test]
    fn test_optimizer_failure_keeps_cleaned_markup() {
        let input = r#"<svg width="3" viewBox="0 0 3 3"><circle r="1"/></svg>"#;
        let expected = r#"<svg viewBox="0 0 3 3"><circle r="1"/></svg>"#;

        let failing = Normalizer::new().with_optimizer(Box::new(FailingOptimizer));
        assert_eq!(failing.normalize(&raw("c", input), "c").unwrap().markup, expected);

        let garbage = Normalizer::new().with_optimizer(Box::new(GarbageOptimizer));
        assert_eq!(garbage.normalize(&raw("c", input), "c").unwrap().markup, expected);
    }

    #[test]
    fn test_split_root() {
        assert_eq!(
            split_root(r#"<svg viewBox="0 0 1 1"><g/></svg>"#),
            Some(SvgParts { attributes: r#" viewBox="0 0 1 1""#, body: Some("<g/>") })
        );
        assert_eq!(split_root("<svg />"), Some(SvgParts { attributes: "", body: None }));
        assert_eq!(
            split_root(r#"<svg data-a="x>y"></svg>"#),
            Some(SvgParts { attributes: r#" data-a="x>y""#, body: Some("") })
        );
        assert_eq!(split_root("<svgx></svgx>"), None);
        assert_eq!(split_root("<svg/><svg/>"), None);
        assert_eq!(split_root("<g></g>"), None);
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("arrow-left"));
        assert!(is_valid_name("Icon_2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("two words"));
        assert!(!is_valid_name("a#b"));
    }
}
