mod chunker;
mod codec;
mod config;
mod prompts;
mod trace;
mod translator;

pub use config::{init_default_config, PipelineConfig};
pub use translator::TranslatorPipeline;
