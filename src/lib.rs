//! HTML translation pipeline: extract translatable fragments, chunk them
//! under a character budget, translate chunk payloads through a remote LLM
//! endpoint, and reinsert the replies without touching markup.

pub mod config;
pub mod error;
pub mod html;
pub mod ir;
pub mod languages;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod session;
