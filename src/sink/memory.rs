use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::ChunkSink;
use crate::capture::{AudioChunk, SinkContext};

/// Keeps delivered chunks in memory
///
/// Clones share the same storage, so a caller can keep one handle while the
/// pipeline owns the other.
#[derive(Clone, Default)]
pub struct MemorySink {
    chunks: Arc<Mutex<Vec<AudioChunk>>>,
    sessions: Arc<Mutex<Vec<SinkContext>>>,
    closed: Arc<Mutex<usize>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunks delivered so far, in delivery order
    pub async fn chunks(&self) -> Vec<AudioChunk> {
        self.chunks.lock().await.clone()
    }

    /// Sessions this sink was opened for
    pub async fn sessions(&self) -> Vec<SinkContext> {
        self.sessions.lock().await.clone()
    }

    /// Number of times `close` was called
    pub async fn close_count(&self) -> usize {
        *self.closed.lock().await
    }
}

#[async_trait::async_trait]
impl ChunkSink for MemorySink {
    async fn open(&mut self, context: &SinkContext) -> Result<()> {
        self.sessions.lock().await.push(context.clone());
        Ok(())
    }

    async fn deliver(&mut self, chunk: AudioChunk) -> Result<()> {
        self.chunks.lock().await.push(chunk);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        *self.closed.lock().await += 1;
        Ok(())
    }
}
