use std::collections::HashMap;

use scraper::node::Node;

use crate::html::dom::ParsedDocument;
use crate::ir::Fragment;

/// Substitutes translated text into the nodes captured at extraction.
/// Fragments without a translation, or with a whitespace-only one, keep
/// their original text; structure, attributes and skipped regions are never
/// touched. Returns the number of substitutions performed.
pub fn apply_translations(
    doc: &mut ParsedDocument,
    fragments: &[Fragment],
    translated: &HashMap<String, String>,
) -> usize {
    let mut applied = 0;
    for frag in fragments {
        let Some(new_text) = translated.get(&frag.id) else {
            continue;
        };
        if new_text.trim().is_empty() {
            continue;
        }
        let Some(mut node) = doc.html.tree.get_mut(frag.node) else {
            continue;
        };
        if let Node::Text(t) = node.value() {
            t.text = new_text.as_str().into();
            applied += 1;
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::dom::parse;
    use crate::html::extract::extract_fragments;

    #[test]
    fn substitutes_translated_fragments_in_place() {
        let mut doc = parse("<p>Hello</p><script>ignore()</script><p>World</p>");
        let fragments = extract_fragments(&doc);
        assert_eq!(fragments.len(), 2);

        let translated = HashMap::from([
            ("a0".to_string(), "Hola".to_string()),
            ("a1".to_string(), "Mundo".to_string()),
        ]);
        let applied = apply_translations(&mut doc, &fragments, &translated);
        assert_eq!(applied, 2);
        assert_eq!(
            doc.to_html(),
            "<p>Hola</p><script>ignore()</script><p>Mundo</p>"
        );
        doc.verify_structure_unchanged().expect("structure intact");
    }

    #[test]
    fn missing_ids_keep_original_text() {
        let mut doc = parse("<p>Hello</p><p>World</p>");
        let fragments = extract_fragments(&doc);
        let translated = HashMap::from([("a0".to_string(), "Hola".to_string())]);

        let applied = apply_translations(&mut doc, &fragments, &translated);
        assert_eq!(applied, 1);
        assert_eq!(doc.to_html(), "<p>Hola</p><p>World</p>");
    }

    #[test]
    fn whitespace_only_translations_are_ignored() {
        let mut doc = parse("<p>Hello</p>");
        let fragments = extract_fragments(&doc);
        let translated = HashMap::from([("a0".to_string(), "   ".to_string())]);

        let applied = apply_translations(&mut doc, &fragments, &translated);
        assert_eq!(applied, 0);
        assert_eq!(doc.to_html(), "<p>Hello</p>");
    }

    #[test]
    fn attributes_survive_substitution() {
        let mut doc = parse("<a href=\"/home\" title=\"go\">Home</a>");
        let fragments = extract_fragments(&doc);
        let translated = HashMap::from([("a0".to_string(), "Inicio".to_string())]);

        apply_translations(&mut doc, &fragments, &translated);
        assert_eq!(doc.to_html(), "<a href=\"/home\" title=\"go\">Inicio</a>");
        doc.verify_structure_unchanged().expect("structure intact");
    }

    #[test]
    fn identity_translation_round_trips() {
        let src = "<div><p>One</p><ul><li>Two</li><li>Three</li></ul></div>";
        let mut doc = parse(src);
        let fragments = extract_fragments(&doc);
        let identity: HashMap<String, String> = fragments
            .iter()
            .map(|f| (f.id.clone(), f.text.clone()))
            .collect();

        apply_translations(&mut doc, &fragments, &identity);
        assert_eq!(doc.to_html(), src);
        doc.verify_structure_unchanged().expect("structure intact");
    }
}
