use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::PromptsSection;

pub const DEFAULT_HTML_CHUNK: &str = "html_chunk.txt";
pub const DEFAULT_PLAIN_TEXT: &str = "plain_text.txt";

/// Assistant prefill priming the reply to start with the payload instead of
/// commentary.
pub const REPLY_PREFILL: &str = "following is the translated content:";

#[derive(Clone, Debug)]
pub struct PromptSet {
    pub html_chunk: String,
    pub plain_text: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            html_chunk: DEFAULT_HTML_CHUNK_TEXT.to_string(),
            plain_text: DEFAULT_PLAIN_TEXT_TEXT.to_string(),
        }
    }
}

impl PromptSet {
    /// Built-in templates, with per-prompt file overrides from the config
    /// directory when configured.
    pub fn load(config_dir: &Path, overrides: &PromptsSection) -> anyhow::Result<Self> {
        Ok(Self {
            html_chunk: read_override(config_dir, overrides.html_chunk.as_deref())?
                .unwrap_or_else(|| DEFAULT_HTML_CHUNK_TEXT.to_string()),
            plain_text: read_override(config_dir, overrides.plain_text.as_deref())?
                .unwrap_or_else(|| DEFAULT_PLAIN_TEXT_TEXT.to_string()),
        })
    }
}

fn read_override(config_dir: &Path, rel: Option<&str>) -> anyhow::Result<Option<String>> {
    let Some(rel) = rel else {
        return Ok(None);
    };
    let mut path = PathBuf::from(rel);
    if path.is_relative() {
        path = config_dir.join(&path);
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("read prompt override: {}", path.display()))?;
    Ok(Some(text))
}

pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (k, v) in vars {
        let pat = format!("{{{{{k}}}}}");
        out = out.replace(&pat, v);
    }
    out
}

pub fn default_prompt_files() -> Vec<(&'static str, &'static str)> {
    vec![
        (DEFAULT_HTML_CHUNK, DEFAULT_HTML_CHUNK_TEXT),
        (DEFAULT_PLAIN_TEXT, DEFAULT_PLAIN_TEXT_TEXT),
    ]
}

pub const DEFAULT_HTML_CHUNK_TEXT: &str = r#"You are a professional translator. Translate the text inside the numbered tags below into {{target_language}}.

{{payload}}

Rules:
- Translate ONLY the text inside the numbered tags (<a0>, <a1>, ...).
- Keep template variables such as $variable and directives such as #if or #set exactly as they are.
- Return every translation inside its original numbered tag, in the same order.
- Do NOT translate code, URLs, or variable names.
- Do NOT add explanations or any text outside the tags.

Example:
Input: <a0>Hello $USERNAME</a0>
Output: <a0>你好 $USERNAME</a0>"#;

pub const DEFAULT_PLAIN_TEXT_TEXT: &str = r#"You are a professional translator. Translate the following text from {{source_language}} to {{target_language}}.
Maintain the original meaning, tone, and formatting as closely as possible.
Return ONLY the translated text, without explanations.

Text to translate:
{{text}}"#;
