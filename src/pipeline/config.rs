use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::config::{
    build_catalog, AppConfig, DEFAULT_API_KEY_ENV, DEFAULT_CONFIG_FILENAME, DEFAULT_ENDPOINT_URL,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SESSION_MAX_AGE_HOURS, DEFAULT_TEMPERATURE,
};
use crate::error::{Result, TranslateError};
use crate::models::{ChatBackend, HttpChatBackend, HttpModelConfig, ModelCatalog, DEFAULT_MODEL};
use crate::pipeline::chunker::DEFAULT_MAX_CHUNK_CHARS;
use crate::pipeline::prompts::{default_prompt_files, PromptSet};

/// Resolved settings for one pipeline instance, after folding the config
/// file onto built-in defaults.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub max_chunk_chars: usize,
    pub use_streaming: bool,
    pub default_model: String,
    pub default_target_language: String,

    pub catalog: ModelCatalog,
    pub endpoint_url: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub request_timeout: Duration,

    pub upload_dir: PathBuf,
    pub generated_dir: PathBuf,
    pub session_max_age: Duration,

    pub prompts: PromptSet,
    pub trace_dir: Option<PathBuf>,
    pub trace_prompts: bool,
}

impl PipelineConfig {
    /// `config_dir` anchors relative prompt-override paths from the file.
    pub fn from_app_config(cfg: &AppConfig, config_dir: Option<&Path>) -> anyhow::Result<Self> {
        let p = &cfg.pipeline;
        let m = &cfg.models;

        let prompts = PromptSet::load(config_dir.unwrap_or(Path::new(".")), &cfg.prompts)?;

        Ok(PipelineConfig {
            max_chunk_chars: p.max_chunk_size.unwrap_or(DEFAULT_MAX_CHUNK_CHARS),
            use_streaming: p.use_streaming.unwrap_or(true),
            default_model: p
                .default_model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            default_target_language: p
                .default_target_language
                .clone()
                .unwrap_or_else(|| "zh-hans".to_string()),

            catalog: build_catalog(cfg),
            endpoint_url: m
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT_URL.to_string()),
            api_key_env: m
                .api_key_env
                .clone()
                .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
            temperature: m.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            request_timeout: Duration::from_secs(
                m.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),

            upload_dir: PathBuf::from(p.upload_dir.as_deref().unwrap_or("uploads")),
            generated_dir: PathBuf::from(p.generated_dir.as_deref().unwrap_or("generated")),
            session_max_age: Duration::from_secs(
                p.session_max_age_hours
                    .unwrap_or(DEFAULT_SESSION_MAX_AGE_HOURS)
                    * 3600,
            ),

            prompts,
            trace_dir: p.trace_dir.as_deref().map(PathBuf::from),
            trace_prompts: p.trace_prompts.unwrap_or(false),
        })
    }

    pub fn defaults() -> Self {
        Self::from_app_config(&AppConfig::default(), None)
            .expect("built-in defaults carry no file overrides")
    }

    /// Resolves a catalog name and opens an HTTP backend for it. The API key
    /// comes from the configured environment variable, never from the file.
    pub fn connect_model(&self, name: &str) -> Result<Box<dyn ChatBackend>> {
        let spec = self.catalog.resolve(name)?;
        let api_key = std::env::var(&self.api_key_env).map_err(|_| {
            TranslateError::Other(anyhow::anyhow!(
                "api key environment variable {} is not set",
                self.api_key_env
            ))
        })?;
        let backend = HttpChatBackend::new(HttpModelConfig {
            name: spec.name.clone(),
            model_id: spec.model_id.clone(),
            url: self.endpoint_url.clone(),
            api_key,
            max_tokens: spec.max_tokens,
            temperature: self.temperature,
            timeout: self.request_timeout,
        })?;
        Ok(Box::new(backend))
    }
}

const DEFAULT_CONFIG_TEXT: &str = r#"# html-translator configuration.
# Every key is optional; missing keys fall back to built-in defaults.

[pipeline]
# Character budget for one model request.
max_chunk_size = 2000
use_streaming = true
default_model = "claude-3-5-sonnet"
default_target_language = "zh-hans"

# Session workspace roots.
upload_dir = "uploads"
generated_dir = "generated"
session_max_age_hours = 24

# Uncomment to dump per-chunk prompts and replies.
# trace_dir = "_trace"
# trace_prompts = true

[prompts]
# Paths are relative to this file. Missing keys use the built-in prompts.
html_chunk = "prompts/html_chunk.txt"
plain_text = "prompts/plain_text.txt"

[models]
url = "https://api.anthropic.com/v1/messages"
api_key_env = "ANTHROPIC_API_KEY"
temperature = 0.7
request_timeout_secs = 300

# Catalog overrides: patch a built-in entry or add a new one.
# [models.catalog.claude-3-haiku]
# max_tokens = 2048
#
# [models.catalog.my-proxy-model]
# model_id = "anthropic.claude-3-5-sonnet-20240620-v1:0"
# max_tokens = 4096
# description = "Sonnet via gateway"
"#;

/// Writes a starter config file plus the default prompt texts next to it.
/// Existing files are left alone unless `force` is set. Returns the paths
/// actually written.
pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;

    let prompts_dir = dir.join("prompts");
    std::fs::create_dir_all(&prompts_dir)
        .with_context(|| format!("create prompts dir: {}", prompts_dir.display()))?;
    for (fname, body) in default_prompt_files() {
        let p = prompts_dir.join(fname);
        if p.exists() && !force {
            continue;
        }
        std::fs::write(&p, body).with_context(|| format!("write prompt: {}", p.display()))?;
        written.push(p);
    }

    let cfg_path = dir.join(DEFAULT_CONFIG_FILENAME);
    if !cfg_path.exists() || force {
        std::fs::write(&cfg_path, DEFAULT_CONFIG_TEXT)
            .with_context(|| format!("write config: {}", cfg_path.display()))?;
        written.push(cfg_path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_text_parses() {
        let cfg: AppConfig = toml::from_str(DEFAULT_CONFIG_TEXT).expect("parse default text");
        assert_eq!(cfg.pipeline.max_chunk_size, Some(2000));
        assert_eq!(cfg.models.api_key_env.as_deref(), Some("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn defaults_fold_in_when_sections_absent() {
        let cfg = PipelineConfig::defaults();
        assert_eq!(cfg.max_chunk_chars, DEFAULT_MAX_CHUNK_CHARS);
        assert!(cfg.use_streaming);
        assert_eq!(cfg.default_model, DEFAULT_MODEL);
        assert_eq!(cfg.request_timeout, Duration::from_secs(300));
        assert_eq!(cfg.session_max_age, Duration::from_secs(24 * 3600));
        assert!(cfg.catalog.contains(&cfg.default_model));
    }

    #[test]
    fn file_values_override_defaults() {
        let app: AppConfig = toml::from_str(
            r#"
[pipeline]
max_chunk_size = 800
use_streaming = false
default_target_language = "de"

[models]
request_timeout_secs = 10
"#,
        )
        .expect("parse");
        let cfg = PipelineConfig::from_app_config(&app, None).expect("fold");
        assert_eq!(cfg.max_chunk_chars, 800);
        assert!(!cfg.use_streaming);
        assert_eq!(cfg.default_target_language, "de");
        assert_eq!(cfg.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn init_writes_config_and_prompts_once() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let written = init_default_config(tmp.path(), false).expect("init");
        assert_eq!(written.len(), default_prompt_files().len() + 1);
        assert!(tmp.path().join(DEFAULT_CONFIG_FILENAME).is_file());
        assert!(tmp.path().join("prompts/html_chunk.txt").is_file());

        let again = init_default_config(tmp.path(), false).expect("init again");
        assert!(again.is_empty());

        let forced = init_default_config(tmp.path(), true).expect("init forced");
        assert_eq!(forced.len(), written.len());
    }
}
