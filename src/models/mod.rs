mod http;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Result, TranslateError};

pub use http::{HttpChatBackend, HttpModelConfig};

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet";

/// One request to a chat model.
#[derive(Clone, Debug)]
pub struct ModelRequest {
    pub prompt: String,
    /// Pre-seeded start of the assistant reply, sent as an assistant turn so
    /// the model continues it instead of opening with commentary.
    pub prefill: Option<String>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Clone, Debug)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Events yielded during a streaming invocation, in arrival order.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    /// A piece of generated text.
    Text(String),
    /// Token accounting reported when the stream opens.
    Metrics { input_tokens: u64, output_tokens: u64 },
    /// Final output token count reported as the stream closes.
    Usage { output_tokens: u64 },
}

/// A connected chat model. Calls are synchronous; the caller owns threading.
pub trait ChatBackend: Send {
    fn name(&self) -> &str;

    fn invoke(&mut self, req: &ModelRequest) -> Result<Completion>;

    fn invoke_streaming(
        &mut self,
        req: &ModelRequest,
        on_event: &mut dyn FnMut(StreamEvent),
    ) -> Result<()>;
}

/// Selectable model entry: the public name pollers pick, the wire id sent to
/// the endpoint, and the reply budget.
#[derive(Clone, Debug, Serialize)]
pub struct ModelSpec {
    pub name: String,
    pub model_id: String,
    pub max_tokens: u32,
    pub description: String,
}

/// Known models, keyed by public name. Starts from the built-in table;
/// config may override or extend entries.
#[derive(Clone, Debug)]
pub struct ModelCatalog {
    specs: BTreeMap<String, ModelSpec>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        let mut specs = BTreeMap::new();
        for spec in builtin_models() {
            specs.insert(spec.name.clone(), spec);
        }
        Self { specs }
    }
}

impl ModelCatalog {
    pub fn resolve(&self, name: &str) -> Result<&ModelSpec> {
        self.specs
            .get(name)
            .ok_or_else(|| TranslateError::InvalidModel(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.specs.get(name)
    }

    pub fn insert(&mut self, spec: ModelSpec) {
        self.specs.insert(spec.name.clone(), spec);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelSpec> {
        self.specs.values()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }
}

fn builtin_models() -> Vec<ModelSpec> {
    vec![
        ModelSpec {
            name: "claude-3-5-sonnet".to_string(),
            model_id: "claude-3-5-sonnet-20240620".to_string(),
            max_tokens: 4096,
            description: "Claude 3.5 Sonnet - Balanced performance and speed".to_string(),
        },
        ModelSpec {
            name: "claude-3-haiku".to_string(),
            model_id: "claude-3-haiku-20240307".to_string(),
            max_tokens: 4096,
            description: "Claude 3 Haiku - Fast and cost-effective".to_string(),
        },
        ModelSpec {
            name: "claude-3-sonnet".to_string(),
            model_id: "claude-3-sonnet-20240229".to_string(),
            max_tokens: 4096,
            description: "Claude 3 Sonnet - Balanced performance and speed".to_string(),
        },
        ModelSpec {
            name: "claude-3-opus".to_string(),
            model_id: "claude-3-opus-20240229".to_string(),
            max_tokens: 4096,
            description: "Claude 3 Opus - Most powerful model for complex tasks".to_string(),
        },
    ]
}
