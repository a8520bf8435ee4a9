use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use waveform_capture::{
    create_encoder, create_router, create_sink, waveform_channel, AppState, CapturePipeline,
    CaptureState, Config, PipelineEvent, SourceFactory, SourceKind, WaveformReader,
};

#[derive(Parser)]
#[command(name = "waveform-capture")]
#[command(about = "Capture audio into encoded chunks and a live waveform")]
struct Cli {
    /// Config file (TOML); defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record from a WAV file or a test tone until done or for a duration
    Record {
        /// WAV file to replay as the microphone
        #[arg(short, long, conflicts_with = "tone")]
        input: Option<PathBuf>,

        /// Generate a sine tone at this frequency instead
        #[arg(short, long)]
        tone: Option<f32>,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Override the sink output directory
        #[arg(short, long)]
        output_dir: Option<String>,
    },
    /// Serve the HTTP control API with a tone source
    Serve {
        /// Tone frequency in Hz
        #[arg(long, default_value = "440")]
        tone: f32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut cfg = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Record {
            input,
            tone,
            duration,
            output_dir,
        } => {
            if let Some(dir) = output_dir {
                cfg.sink.output_dir = dir;
            }
            let kind = match (input, tone) {
                (Some(path), _) => SourceKind::File(path),
                (None, Some(frequency_hz)) => SourceKind::Tone { frequency_hz },
                (None, None) => anyhow::bail!("Pass --input <wav> or --tone <hz>"),
            };
            if matches!(kind, SourceKind::Tone { .. }) && duration.is_none() {
                anyhow::bail!("--tone needs --duration");
            }
            record(&cfg, kind, duration.map(Duration::from_secs)).await
        }
        Command::Serve { tone } => serve(&cfg, tone).await,
    }
}

fn build_pipeline(cfg: &Config, kind: SourceKind) -> (CapturePipeline, WaveformReader) {
    let source = SourceFactory::create(kind, cfg.source_settings());
    let encoder = create_encoder(cfg.encoder.codec, cfg.encoder.frames_per_chunk);
    let sink = create_sink(cfg.sink.kind, cfg.output_dir());
    let (writer, reader) = waveform_channel(cfg.waveform.capacity);

    let pipeline = CapturePipeline::new(cfg.pipeline_config(), source, encoder, sink, writer);
    (pipeline, reader)
}

async fn record(cfg: &Config, kind: SourceKind, duration: Option<Duration>) -> Result<()> {
    let (pipeline, mut reader) = build_pipeline(cfg, kind);
    let mut events = pipeline.subscribe();

    let session = pipeline.start().await.context("Failed to start capture")?;
    info!(
        "Recording {} to {}",
        session.id,
        cfg.output_dir().display()
    );

    let deadline = duration.map(|d| tokio::time::Instant::now() + d);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            } => {
                info!("Duration reached");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = ticker.tick() => {
                let snapshot = reader.snapshot();
                if let Some(last) = snapshot.samples.last() {
                    info!(
                        "{:>6.1}s  level {:<40} {:.2}",
                        last.offset.as_secs_f64(),
                        "#".repeat((last.value * 40.0).round() as usize),
                        last.value
                    );
                }
            }
            event = events.recv() => match event {
                Ok(PipelineEvent::SessionEnded(_)) => break,
                Ok(PipelineEvent::EncodeError { message, .. }) => warn!("Encode error: {}", message),
                Ok(PipelineEvent::SinkError { sequence, message }) => {
                    warn!("Chunk {} not stored: {}", sequence, message)
                }
                Ok(_) => {}
                Err(e) => warn!("Event stream: {}", e),
            },
        }
    }

    let summary = pipeline.stop().await?;
    if pipeline.state().await != CaptureState::Stopped {
        warn!("Pipeline did not reach the stopped state");
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn serve(cfg: &Config, tone: f32) -> Result<()> {
    let (pipeline, reader) = build_pipeline(cfg, SourceKind::Tone { frequency_hz: tone });
    let pipeline = Arc::new(pipeline);
    let app = create_router(AppState::new(Arc::clone(&pipeline), reader));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server failed")?;

    if pipeline.state().await.is_active() {
        let summary = pipeline.stop().await?;
        info!("Stopped session {} on shutdown", summary.session_id);
    }
    Ok(())
}
