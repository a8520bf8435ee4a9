use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info};

use super::ChunkSink;
use crate::capture::{AudioChunk, SinkContext};

/// Writes every chunk to its own file
///
/// Files are named `<session>-chunk-<seq>.<ext>` inside the output directory.
pub struct DirectorySink {
    output_dir: PathBuf,
    context: Option<SinkContext>,
    written: usize,
}

impl DirectorySink {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            context: None,
            written: 0,
        }
    }

    pub fn chunk_path(&self, session_id: &str, sequence: u64, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}-chunk-{:03}.{}", session_id, sequence, extension))
    }
}

#[async_trait::async_trait]
impl ChunkSink for DirectorySink {
    async fn open(&mut self, context: &SinkContext) -> Result<()> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .context("Failed to create output directory")?;

        info!(
            "Directory sink ready: {} ({} chunks)",
            self.output_dir.display(),
            context.codec
        );

        self.context = Some(context.clone());
        self.written = 0;
        Ok(())
    }

    async fn deliver(&mut self, chunk: AudioChunk) -> Result<()> {
        let context = self
            .context
            .as_ref()
            .context("Directory sink received a chunk before open")?;
        let path = self.chunk_path(&context.session_id, chunk.sequence(), &context.extension);

        tokio::fs::write(&path, chunk.data())
            .await
            .with_context(|| format!("Failed to write chunk: {:?}", path))?;

        debug!(
            "Chunk {} written: {:.1}s offset, {} bytes",
            chunk.sequence(),
            chunk.offset().as_secs_f64(),
            chunk.len()
        );
        self.written += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(context) = self.context.take() {
            info!(
                "Directory sink closed for {}: {} chunks written",
                context.session_id, self.written
            );
        }
        Ok(())
    }
}
