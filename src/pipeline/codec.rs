use std::collections::HashMap;

use once_cell::sync::Lazy;
use quick_xml::escape::{partial_escape, unescape};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use crate::ir::Chunk;
use crate::models::ModelRequest;
use crate::pipeline::prompts::{render_template, PromptSet, REPLY_PREFILL};

/// How a model reply was decoded. `LineScan` marks a degraded decode: the
/// reply was not well-formed XML and fragments were recovered line by line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeMode {
    Strict,
    LineScan,
}

/// One element per fragment inside a `<content>` envelope, one per line,
/// text escaped. The numbered tag names double as the reply keys.
pub fn encode_payload(chunk: &Chunk) -> String {
    let mut payload = String::from("<content>\n");
    for frag in &chunk.fragments {
        payload.push('<');
        payload.push_str(&frag.id);
        payload.push('>');
        payload.push_str(&partial_escape(frag.text.as_str()));
        payload.push_str("</");
        payload.push_str(&frag.id);
        payload.push_str(">\n");
    }
    payload.push_str("</content>");
    payload
}

/// Full request for one chunk: instructional prompt around the encoded
/// payload, plus the assistant prefill.
pub fn build_request(chunk: &Chunk, target_language: &str, prompts: &PromptSet) -> ModelRequest {
    let payload = encode_payload(chunk);
    let prompt = render_template(
        &prompts.html_chunk,
        &[("target_language", target_language), ("payload", &payload)],
    );
    ModelRequest {
        prompt,
        prefill: Some(REPLY_PREFILL.to_string()),
    }
}

/// Decodes a model reply into id -> translated text. Strict XML first; any
/// malformation (prose around the envelope, mismatched or nested tags, bad
/// entities) falls back to the line scanner. Empty or whitespace-only values
/// are dropped so reinsertion never blanks a fragment.
pub fn decode_reply(reply: &str) -> (HashMap<String, String>, DecodeMode) {
    let cleaned = strip_code_fences(reply);
    match parse_strict(cleaned) {
        Some(map) if !map.is_empty() => (map, DecodeMode::Strict),
        _ => (scan_lines(cleaned), DecodeMode::LineScan),
    }
}

/// Models occasionally wrap the payload in a markdown fence even when told
/// not to; peel one leading and one trailing fence line.
fn strip_code_fences(reply: &str) -> &str {
    let mut t = reply.trim();
    if let Some(rest) = t.strip_prefix("```") {
        t = match rest.find('\n') {
            Some(nl) => rest[nl + 1..].trim_start(),
            None => "",
        };
    }
    if let Some(rest) = t.strip_suffix("```") {
        t = rest.trim_end();
    }
    t
}

fn parse_strict(reply: &str) -> Option<HashMap<String, String>> {
    let mut reader = Reader::from_str(reply);
    reader.config_mut().trim_text(false);

    let mut out: HashMap<String, String> = HashMap::new();
    let mut depth = 0usize;
    let mut root_seen = false;
    let mut root_done = false;
    let mut current: Option<String> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Err(_) => return None,
            Ok(Event::Eof) => break,
            Ok(Event::Start(s)) => {
                if root_done {
                    // Junk after the envelope closed, e.g. a second root.
                    return None;
                }
                depth += 1;
                match depth {
                    1 => root_seen = true,
                    2 => {
                        current = Some(String::from_utf8_lossy(s.name().as_ref()).into_owned());
                        text.clear();
                    }
                    // Nested markup inside a fragment element cannot be
                    // represented; let the line scanner keep it as text.
                    _ => return None,
                }
            }
            Ok(Event::Empty(_)) => {
                if root_done {
                    return None;
                }
                match depth {
                    0 => {
                        // A bare self-closing envelope: well-formed, empty.
                        root_seen = true;
                        root_done = true;
                    }
                    1 => {} // self-closing child carries no translation
                    _ => return None,
                }
            }
            Ok(Event::Text(t)) => {
                let value = t.unescape().ok()?;
                match depth {
                    0 => {
                        if !value.trim().is_empty() {
                            return None; // prose outside the envelope
                        }
                    }
                    1 => {} // whitespace between children
                    _ => text.push_str(&value),
                }
            }
            Ok(Event::CData(c)) => {
                if depth >= 2 {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                if depth == 0 {
                    return None;
                }
                if depth == 2 {
                    if let Some(tag) = current.take() {
                        if !text.trim().is_empty() {
                            out.insert(tag, std::mem::take(&mut text));
                        } else {
                            text.clear();
                        }
                    }
                }
                depth -= 1;
                if depth == 0 {
                    root_done = true;
                }
            }
            Ok(_) => {} // declarations, comments, processing instructions
        }
    }

    if !root_seen || depth != 0 {
        return None;
    }
    Some(out)
}

static FRAGMENT_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)<(a\d+)>([^\r\n]*?)(?:</a\d+>|\r?$)").expect("fragment tag regex"));

/// Last-resort recovery: scan for `<aN>content` occurrences, stopping each at
/// a closing marker on the same line or at end of line. Handles several tags
/// on one line as well as unclosed trailing tags.
fn scan_lines(reply: &str) -> HashMap<String, String> {
    let mut out: HashMap<String, String> = HashMap::new();
    for cap in FRAGMENT_TAG_RE.captures_iter(reply) {
        let content = cap[2].trim();
        if content.is_empty() {
            continue;
        }
        let content = match unescape(content) {
            Ok(c) => c.into_owned(),
            Err(_) => content.to_string(),
        };
        out.insert(cap[1].to_string(), content);
    }
    out
}
