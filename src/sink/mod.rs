//! Chunk sinks
//!
//! A sink receives encoded chunks in sequence order and owns persistence or
//! transport. The pipeline never stores audio itself.

mod directory;
mod jsonl;
mod memory;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::capture::{AudioChunk, SinkContext};

pub use directory::DirectorySink;
pub use jsonl::{ChunkRecord, JsonLinesSink};
pub use memory::MemorySink;

/// Destination for encoded chunks
#[async_trait::async_trait]
pub trait ChunkSink: Send {
    /// Called once at session start, before any chunk
    async fn open(&mut self, _context: &SinkContext) -> Result<()> {
        Ok(())
    }

    /// Receive the next chunk in sequence order
    async fn deliver(&mut self, chunk: AudioChunk) -> Result<()>;

    /// Called once after the final chunk of a session
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Built-in sink selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// One file per chunk
    Directory,
    /// One JSON line per chunk
    Jsonl,
    /// Keep chunks in memory
    Memory,
}

/// Sink factory
pub fn create_sink(kind: SinkKind, output_dir: PathBuf) -> Box<dyn ChunkSink> {
    match kind {
        SinkKind::Directory => Box::new(DirectorySink::new(output_dir)),
        SinkKind::Jsonl => Box::new(JsonLinesSink::new(output_dir)),
        SinkKind::Memory => Box::new(MemorySink::new()),
    }
}
