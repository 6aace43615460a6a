mod apply;
mod dom;
mod extract;

pub use apply::apply_translations;
pub use dom::{is_translatable_text, parse, structure_hash, DocKind, ParsedDocument, SKIP_PARENTS};
pub use extract::{dump_fragments, extract_fragments};
