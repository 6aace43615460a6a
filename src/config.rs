use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::models::{ModelCatalog, ModelSpec};

pub const DEFAULT_CONFIG_FILENAME: &str = "html-translator.toml";

pub const DEFAULT_ENDPOINT_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_SESSION_MAX_AGE_HOURS: u64 = 24;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub prompts: PromptsSection,
    #[serde(default)]
    pub models: ModelsSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PipelineSection {
    /// Character budget for one request chunk.
    #[serde(default)]
    pub max_chunk_size: Option<usize>,

    #[serde(default)]
    pub use_streaming: Option<bool>,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub default_target_language: Option<String>,

    #[serde(default)]
    pub upload_dir: Option<String>,
    #[serde(default)]
    pub generated_dir: Option<String>,
    #[serde(default)]
    pub session_max_age_hours: Option<u64>,

    #[serde(default)]
    pub trace_dir: Option<String>,
    #[serde(default)]
    pub trace_prompts: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptsSection {
    #[serde(default)]
    pub html_chunk: Option<String>,
    #[serde(default)]
    pub plain_text: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ModelsSection {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Overrides or additions to the built-in model catalog.
    #[serde(default)]
    pub catalog: HashMap<String, CatalogEntry>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct CatalogEntry {
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
}

pub fn find_file_upwards(start: &Path, filename: &str, max_depth: usize) -> Option<PathBuf> {
    let mut dir = Some(start);
    for _ in 0..max_depth {
        let d = dir?;
        let cand = d.join(filename);
        if cand.is_file() {
            return Some(cand);
        }
        dir = d.parent();
    }
    None
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

/// Built-in catalog with config overrides folded in. A config entry for a
/// known name patches that entry; an unknown name adds a new one, defaulting
/// the wire id to the name itself.
pub fn build_catalog(cfg: &AppConfig) -> ModelCatalog {
    let mut catalog = ModelCatalog::default();
    for (name, entry) in &cfg.models.catalog {
        let base = catalog.get(name).cloned();
        let spec = ModelSpec {
            name: name.clone(),
            model_id: entry
                .model_id
                .clone()
                .or_else(|| base.as_ref().map(|b| b.model_id.clone()))
                .unwrap_or_else(|| name.clone()),
            max_tokens: entry
                .max_tokens
                .or_else(|| base.as_ref().map(|b| b.max_tokens))
                .unwrap_or(4096),
            description: entry
                .description
                .clone()
                .or_else(|| base.map(|b| b.description))
                .unwrap_or_default(),
        };
        catalog.insert(spec);
    }
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_parses_to_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("parse");
        assert!(cfg.pipeline.max_chunk_size.is_none());
        assert!(cfg.models.catalog.is_empty());
    }

    #[test]
    fn sections_parse_independently() {
        let cfg: AppConfig = toml::from_str(
            r#"
[pipeline]
max_chunk_size = 1500
use_streaming = true

[models]
temperature = 0.2

[models.catalog.claude-3-haiku]
max_tokens = 2048
"#,
        )
        .expect("parse");
        assert_eq!(cfg.pipeline.max_chunk_size, Some(1500));
        assert_eq!(cfg.pipeline.use_streaming, Some(true));
        assert_eq!(cfg.models.temperature, Some(0.2));
        assert_eq!(cfg.models.catalog["claude-3-haiku"].max_tokens, Some(2048));
    }

    #[test]
    fn catalog_override_patches_builtin_entry() {
        let cfg: AppConfig = toml::from_str(
            r#"
[models.catalog.claude-3-haiku]
max_tokens = 1024

[models.catalog.local-model]
model_id = "llama-8b"
"#,
        )
        .expect("parse");
        let catalog = build_catalog(&cfg);

        let haiku = catalog.resolve("claude-3-haiku").expect("haiku");
        assert_eq!(haiku.max_tokens, 1024);
        // untouched fields keep the built-in values
        assert_eq!(haiku.model_id, "claude-3-haiku-20240307");

        let local = catalog.resolve("local-model").expect("local");
        assert_eq!(local.model_id, "llama-8b");
        assert_eq!(local.max_tokens, 4096);
    }

    #[test]
    fn find_file_upwards_walks_parents() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let nested = tmp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).expect("mkdirs");
        std::fs::write(tmp.path().join(DEFAULT_CONFIG_FILENAME), "").expect("touch");

        let found = find_file_upwards(&nested, DEFAULT_CONFIG_FILENAME, 8).expect("found");
        assert_eq!(found, tmp.path().join(DEFAULT_CONFIG_FILENAME));
        assert!(find_file_upwards(&nested, "missing.toml", 2).is_none());
    }
}
