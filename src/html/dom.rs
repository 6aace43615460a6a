use std::collections::BTreeMap;

use anyhow::anyhow;
use once_cell::sync::Lazy;
use regex::Regex;
use ego_tree::iter::Edge;
use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html};
use sha2::{Digest, Sha256};

/// Element names whose text content is never translated.
pub const SKIP_PARENTS: &[&str] = &["script", "style", "head", "title", "meta"];

static DOC_ENVELOPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<!doctype|<html[\s/>]").expect("envelope regex"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocKind {
    /// Input carried its own html envelope or a doctype.
    Document,
    /// Bare markup; parsed and serialized as body content, so no
    /// html/head/body wrappers are invented on output.
    Fragment,
}

/// A parsed document plus the structural baseline taken at parse time.
/// Reinsertion mutates text nodes in this tree; everything else must still
/// hash to `baseline_hash` before the document is serialized.
pub struct ParsedDocument {
    pub html: Html,
    pub kind: DocKind,
    baseline_hash: String,
}

pub fn parse(input: &str) -> ParsedDocument {
    let kind = if DOC_ENVELOPE.is_match(input) {
        DocKind::Document
    } else {
        DocKind::Fragment
    };
    let html = match kind {
        DocKind::Document => Html::parse_document(input),
        DocKind::Fragment => Html::parse_fragment(input),
    };
    let baseline_hash = structure_hash(&html);
    ParsedDocument {
        html,
        kind,
        baseline_hash,
    }
}

impl ParsedDocument {
    pub fn to_html(&self) -> String {
        match self.kind {
            DocKind::Fragment => self.html.root_element().inner_html(),
            DocKind::Document => {
                let mut out = String::new();
                for child in self.html.tree.root().children() {
                    match child.value() {
                        Node::Doctype(d) => {
                            out.push_str("<!DOCTYPE ");
                            out.push_str(d.name());
                            out.push('>');
                        }
                        Node::Comment(c) => {
                            out.push_str("<!--");
                            out.push_str(c);
                            out.push_str("-->");
                        }
                        Node::Element(_) => {
                            if let Some(el) = ElementRef::wrap(child) {
                                out.push_str(&el.html());
                            }
                        }
                        _ => {}
                    }
                }
                out
            }
        }
    }

    pub fn verify_structure_unchanged(&self) -> anyhow::Result<()> {
        let cur = structure_hash(&self.html);
        if cur != self.baseline_hash {
            return Err(anyhow!(
                "document structure changed during reinsertion (baseline={} current={})",
                self.baseline_hash,
                cur
            ));
        }
        Ok(())
    }
}

/// Whether a text node carries translatable content: non-whitespace text
/// under a regular visible element. Text under script/style/head/title/meta,
/// under an inline-hidden element, or hanging directly off the document root
/// wrapper is structural and stays untouched.
pub fn is_translatable_text(node: NodeRef<'_, Node>) -> bool {
    let Node::Text(text) = node.value() else {
        return false;
    };
    if text.trim().is_empty() {
        return false;
    }
    let Some(parent) = node.parent() else {
        return false;
    };
    match ElementRef::wrap(parent) {
        Some(el) => !skips_text(&el),
        // Parent is the Document/Fragment container itself.
        None => false,
    }
}

fn skips_text(el: &ElementRef<'_>) -> bool {
    let name = el.value().name();
    // Bare text in a fragment parse hangs off the synthetic html element;
    // treat it like root-level text, which has no translatable place.
    if name == "html" || SKIP_PARENTS.contains(&name) {
        return true;
    }
    el.value().attr("style").is_some_and(style_hides)
}

/// Matches a style attribute whose entire effect is `display:none`. Mixed
/// declaration lists keep their text translatable.
fn style_hides(style: &str) -> bool {
    let norm: String = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    norm.trim_end_matches(';') == "display:none"
}

/// Hash of everything reinsertion must not touch: element structure with
/// sorted attributes, comments, doctypes, and every text node that is not
/// translatable. Translatable text is excluded so the hash is stable across
/// the substitution pass.
pub fn structure_hash(html: &Html) -> String {
    let mut hasher = Sha256::new();

    for edge in html.tree.root().traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Element(el) => {
                    hasher.update(b"S:");
                    hasher.update(el.name().as_bytes());
                    hasher.update(b"|");
                    let mut map: BTreeMap<&str, &str> = BTreeMap::new();
                    for (k, v) in el.attrs() {
                        map.insert(k, v);
                    }
                    for (k, v) in map {
                        hasher.update(k.as_bytes());
                        hasher.update(b"=");
                        hasher.update(v.as_bytes());
                        hasher.update(b";");
                    }
                    hasher.update(b"\n");
                }
                Node::Text(t) => {
                    if !is_translatable_text(node) {
                        hasher.update(b"T:");
                        hasher.update(t.as_bytes());
                        hasher.update(b"\n");
                    }
                }
                Node::Comment(c) => {
                    hasher.update(b"M:");
                    hasher.update(c.as_bytes());
                    hasher.update(b"\n");
                }
                Node::Doctype(d) => {
                    hasher.update(b"Y:");
                    hasher.update(d.name().as_bytes());
                    hasher.update(b"\n");
                }
                _ => {}
            },
            Edge::Close(node) => {
                if let Node::Element(el) = node.value() {
                    hasher.update(b"E:");
                    hasher.update(el.name().as_bytes());
                    hasher.update(b"\n");
                }
            }
        }
    }
    hex::encode(hasher.finalize())
}
