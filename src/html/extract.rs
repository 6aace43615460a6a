use scraper::node::Node;
use scraper::ElementRef;

use crate::html::dom::{is_translatable_text, ParsedDocument};
use crate::ir::{Fragment, FragmentDump};

/// Walks the parsed tree once in document order, assigning positional IDs
/// ("a0", "a1", ...) and capturing the node handle each translation is later
/// written back through. Reinsertion never re-traverses the document.
pub fn extract_fragments(doc: &ParsedDocument) -> Vec<Fragment> {
    let mut fragments: Vec<Fragment> = Vec::new();
    for node in doc.html.tree.root().descendants() {
        if !is_translatable_text(node) {
            continue;
        }
        let Node::Text(text) = node.value() else {
            continue;
        };
        let id = format!("a{}", fragments.len());
        fragments.push(Fragment {
            id,
            node: node.id(),
            text: text.to_string(),
        });
    }
    fragments
}

/// Fragment listing with parent element names, for inspection dumps.
pub fn dump_fragments(doc: &ParsedDocument) -> Vec<FragmentDump> {
    extract_fragments(doc)
        .into_iter()
        .map(|f| {
            let parent = doc
                .html
                .tree
                .get(f.node)
                .and_then(|n| n.parent())
                .and_then(ElementRef::wrap)
                .map(|e| e.value().name().to_string())
                .unwrap_or_default();
            FragmentDump {
                id: f.id,
                parent,
                text: f.text,
            }
        })
        .collect()
}
