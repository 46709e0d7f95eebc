use std::time::Duration;

use tokio::{io::AsyncWrite, sync::mpsc};
use url::Url;

use crate::{
    error::{HlsrecError, HlsrecResult},
    hls::{DurationMode, PlaylistPoller, DEFAULT_CACHE_CAPACITY, DEFAULT_RETRY_BACKOFF},
    pipeline::{PipelineStats, SegmentPipeline},
    sink::{OutputSink, OutputTarget},
    util::http::HttpClient,
};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub playlist_url: Url,
    pub output: OutputTarget,

    /// Zero records until the playlist ends
    pub target: Duration,
    pub mode: DurationMode,

    pub retry_backoff: Duration,
    pub queue_capacity: usize,
    pub cache_capacity: usize,
    pub manual_key: Option<[u8; 16]>,
}

impl RecorderConfig {
    pub fn new(playlist_url: &str, output: impl Into<OutputTarget>) -> HlsrecResult<Self> {
        let playlist_url = Url::parse(playlist_url)?;
        if !matches!(playlist_url.scheme(), "http" | "https") {
            return Err(HlsrecError::UnsupportedScheme(playlist_url.to_string()));
        }

        Ok(Self {
            playlist_url,
            output: output.into(),
            target: Duration::ZERO,
            mode: DurationMode::default(),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            manual_key: None,
        })
    }

    pub fn with_target(mut self, target: Duration) -> Self {
        self.target = target;
        self
    }

    pub fn with_duration_mode(mut self, mode: DurationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// AES-128 key in hex, used instead of the key URIs in the playlist.
    pub fn with_manual_key(mut self, key: Option<&str>) -> HlsrecResult<Self> {
        self.manual_key = match key {
            Some(key) => {
                let key = key.strip_prefix("0x").unwrap_or(key);
                let key = hex::decode(key)?;
                Some(key.try_into().map_err(HlsrecError::InvalidAes128Key)?)
            }
            None => None,
        };
        Ok(self)
    }
}

/// ┌────────────────┐   ChunkJob   ┌─────────────────┐   bytes   ┌────────────┐
/// │ PlaylistPoller ├──[bounded]──►│ SegmentPipeline ├──────────►│ OutputSink │
/// └───────┬────────┘              └────────┬────────┘           └────────────┘
///         │ DedupCache, KeyStore           │ decrypt
///         ▼                                ▼
///   playlist + keys                     chunks
pub struct Recorder {
    client: HttpClient,
    config: RecorderConfig,
}

impl Recorder {
    pub fn new(client: HttpClient, config: RecorderConfig) -> Self {
        Self { client, config }
    }

    /// Opens the output, then records until the playlist ends or the target
    /// duration is reached.
    pub async fn run(self) -> HlsrecResult<PipelineStats> {
        let mut sink = OutputSink::open(&self.config.output).await?;
        let stats = self.run_with_sink(&mut sink).await?;
        sink.finish().await?;
        Ok(stats)
    }

    pub async fn run_with_sink<W>(&self, sink: &mut OutputSink<W>) -> HlsrecResult<PipelineStats>
    where
        W: AsyncWrite + Unpin,
    {
        let config = &self.config;
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));

        let poller = PlaylistPoller::new(
            self.client.clone(),
            config.playlist_url.clone(),
            config.mode,
        )
        .with_target(config.target)
        .with_cache_capacity(config.cache_capacity)
        .with_retry_backoff(config.retry_backoff)
        .with_manual_key(config.manual_key);
        let pipeline = SegmentPipeline::new(self.client.clone());

        log::info!("Recording {}", config.playlist_url);
        let ((), stats) = tokio::try_join!(poller.run(sender), pipeline.run(receiver, sink))?;
        log::info!(
            "Recording finished: {} chunks written, {} skipped, {} bytes in output",
            stats.written,
            stats.skipped,
            sink.written()
        );
        Ok(stats)
    }
}
