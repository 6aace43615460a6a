//! Intermediate representation shared across the pipeline stages.

use std::time::Duration;

use ego_tree::NodeId;
use serde::{Deserialize, Serialize};

/// One translatable text node, captured during extraction.
///
/// `id` is positional ("a0", "a1", ...) in document traversal order and is
/// the key the model reply is matched against. `node` is the handle into the
/// parsed tree that reinsertion mutates; it is only meaningful for the
/// document the fragment was extracted from.
#[derive(Clone, Debug)]
pub struct Fragment {
    pub id: String,
    pub node: NodeId,
    pub text: String,
}

impl Fragment {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A contiguous run of fragments translated in one request/response cycle.
#[derive(Clone, Debug, Default)]
pub struct Chunk {
    pub fragments: Vec<Fragment>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn char_len(&self) -> usize {
        self.fragments.iter().map(Fragment::char_len).sum()
    }
}

/// Token and timing counters for a single chunk invocation.
#[derive(Clone, Debug, Default)]
pub struct ChunkMetrics {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub stream_events: u64,
    pub first_token_time: Option<Duration>,
    pub elapsed: Duration,
}

/// Serializable fragment view for the `--extract-json` inspection mode.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FragmentDump {
    pub id: String,
    pub parent: String,
    pub text: String,
}
