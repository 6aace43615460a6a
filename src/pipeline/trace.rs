use std::path::PathBuf;

use anyhow::Context;

use crate::session::sanitize_filename;

/// Dumps per-chunk prompts and raw replies for debugging. Disabled writers
/// are no-ops so call sites never branch.
pub struct TraceWriter {
    dir: PathBuf,
    enabled: bool,
}

impl TraceWriter {
    pub fn new(dir: PathBuf, enabled: bool) -> anyhow::Result<Self> {
        if enabled {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create trace dir: {}", dir.display()))?;
        }
        Ok(Self { dir, enabled })
    }

    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::from("_trace"),
            enabled: false,
        }
    }

    pub fn write_named_text(&self, name: &str, text: &str) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let path = self.dir.join(sanitize_filename(name));
        std::fs::write(&path, text).with_context(|| format!("write trace: {}", path.display()))?;
        Ok(())
    }

    pub fn write_chunk_text(
        &self,
        session: &str,
        chunk_index: usize,
        kind: &str,
        text: &str,
    ) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let name = format!("{session}.chunk_{chunk_index:03}.{kind}.txt");
        self.write_named_text(&name, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_writer_writes_nothing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let w = TraceWriter::new(tmp.path().join("t"), false).expect("new");
        w.write_chunk_text("abc", 0, "prompt", "hello").expect("write");
        assert!(!tmp.path().join("t").exists());
    }

    #[test]
    fn chunk_traces_land_under_session_name() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let w = TraceWriter::new(tmp.path().to_path_buf(), true).expect("new");
        w.write_chunk_text("abc12345", 3, "reply", "<content></content>")
            .expect("write");
        let p = tmp.path().join("abc12345.chunk_003.reply.txt");
        assert_eq!(
            std::fs::read_to_string(p).expect("read"),
            "<content></content>"
        );
    }
}
