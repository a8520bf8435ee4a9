use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;

use super::ChunkSink;
use crate::capture::{AudioChunk, SinkContext};

/// One line of a JSON-lines chunk log
#[derive(Debug, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub session_id: String,
    pub sequence: u64,
    pub offset_ms: u64,
    pub frame_count: usize,
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub data: String, // Base64-encoded chunk bytes
}

/// Appends chunks to `<session>.jsonl`, base64-encoding the payload
pub struct JsonLinesSink {
    output_dir: PathBuf,
    session_id: Option<String>,
    writer: Option<BufWriter<File>>,
}

impl JsonLinesSink {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            session_id: None,
            writer: None,
        }
    }
}

#[async_trait::async_trait]
impl ChunkSink for JsonLinesSink {
    async fn open(&mut self, context: &SinkContext) -> Result<()> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .context("Failed to create output directory")?;

        let path = self.output_dir.join(format!("{}.jsonl", context.session_id));
        let file = File::create(&path)
            .await
            .with_context(|| format!("Failed to create chunk log: {:?}", path))?;

        info!("JSON lines sink writing to {}", path.display());
        self.session_id = Some(context.session_id.clone());
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    async fn deliver(&mut self, chunk: AudioChunk) -> Result<()> {
        let session_id = self
            .session_id
            .clone()
            .context("JSON lines sink received a chunk before open")?;
        let writer = self
            .writer
            .as_mut()
            .context("JSON lines sink is closed")?;

        let record = ChunkRecord {
            session_id,
            sequence: chunk.sequence(),
            offset_ms: chunk.offset().as_millis() as u64,
            frame_count: chunk.frame_count(),
            codec: chunk.codec().to_string(),
            sample_rate: chunk.format().sample_rate,
            channels: chunk.format().channels,
            data: base64::engine::general_purpose::STANDARD.encode(chunk.data()),
        };

        let mut line = serde_json::to_vec(&record).context("Failed to serialize chunk record")?;
        line.push(b'\n');
        writer
            .write_all(&line)
            .await
            .context("Failed to append chunk record")?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await.context("Failed to flush chunk log")?;
        }
        self.session_id = None;
        Ok(())
    }
}
