// Integration tests for the file-backed chunk sinks

use anyhow::Result;
use std::time::Duration;
use tempfile::TempDir;
use waveform_capture::sink::ChunkRecord;
use waveform_capture::{
    create_sink, AudioChunk, ChunkSink, DirectorySink, JsonLinesSink, SinkContext, SinkKind,
    StreamFormat,
};

fn context(session_id: &str) -> SinkContext {
    SinkContext {
        session_id: session_id.to_string(),
        format: StreamFormat::default(),
        codec: "pcm_s16le".to_string(),
        extension: "pcm".to_string(),
    }
}

fn chunk(sequence: u64, data: Vec<u8>) -> AudioChunk {
    AudioChunk::new(
        sequence,
        Duration::from_millis(sequence * 500),
        5,
        "pcm_s16le",
        StreamFormat::default(),
        data,
    )
}

#[tokio::test]
async fn test_directory_sink_writes_one_file_per_chunk() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output_dir = temp_dir.path().join("recordings");
    let mut sink = DirectorySink::new(output_dir.clone());

    sink.open(&context("session-a")).await?;
    sink.deliver(chunk(0, vec![1, 2, 3, 4])).await?;
    sink.deliver(chunk(1, vec![5, 6])).await?;
    sink.close().await?;

    let first = sink.chunk_path("session-a", 0, "pcm");
    assert_eq!(first, output_dir.join("session-a-chunk-000.pcm"));
    assert_eq!(std::fs::read(&first)?, vec![1, 2, 3, 4]);
    assert_eq!(std::fs::read(sink.chunk_path("session-a", 1, "pcm"))?, vec![5, 6]);
    assert_eq!(std::fs::read_dir(&output_dir)?.count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_directory_sink_rejects_chunk_before_open() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut sink = DirectorySink::new(temp_dir.path().to_path_buf());

    let result = sink.deliver(chunk(0, vec![0])).await;

    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_jsonl_sink_appends_records() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut sink = JsonLinesSink::new(temp_dir.path().to_path_buf());

    sink.open(&context("session-b")).await?;
    sink.deliver(chunk(0, vec![0, 1, 2])).await?;
    sink.deliver(chunk(1, b"abc".to_vec())).await?;
    sink.close().await?;

    let contents = std::fs::read_to_string(temp_dir.path().join("session-b.jsonl"))?;
    let records: Vec<ChunkRecord> = contents
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].session_id, "session-b");
    assert_eq!(records[0].data, "AAEC");
    assert_eq!(records[1].sequence, 1);
    assert_eq!(records[1].offset_ms, 500);
    assert_eq!(records[1].data, "YWJj");
    assert_eq!(records[1].sample_rate, 16000);

    // Closed sinks refuse further chunks
    assert!(sink.deliver(chunk(2, vec![9])).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_create_sink_memory_kind_accepts_chunks() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut sink = create_sink(SinkKind::Memory, temp_dir.path().to_path_buf());

    sink.open(&context("session-c")).await?;
    sink.deliver(chunk(0, vec![1])).await?;
    sink.close().await?;

    // Memory sinks never touch the output directory
    assert_eq!(std::fs::read_dir(temp_dir.path())?.count(), 0);
    Ok(())
}
