use std::time::Duration;

use tokio::{sync::mpsc, time::Instant};
use url::Url;

use crate::{
    decrypt::KeyStore,
    dedup::DedupCache,
    error::HlsrecResult,
    hls::playlist::PlaylistSnapshot,
    segment::ChunkJob,
    util::http::HttpClient,
};

pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(3);
pub const DEFAULT_CACHE_CAPACITY: usize = 64;
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// How the recorded length of a stream is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DurationMode {
    /// Sum of the `#EXTINF` durations of queued chunks
    #[default]
    Playlist,
    /// Wall-clock time since recording started
    Local,
}

/// Recorded length so far. Never decreases.
#[derive(Debug, Clone)]
pub struct RecordedDuration {
    mode: DurationMode,
    started_at: Instant,
    total: Duration,
}

impl RecordedDuration {
    pub fn new(mode: DurationMode) -> Self {
        Self {
            mode,
            started_at: Instant::now(),
            total: Duration::ZERO,
        }
    }

    pub fn restart(&mut self) {
        self.started_at = Instant::now();
        self.total = Duration::ZERO;
    }

    /// Accounts for one newly queued chunk of `declared` length.
    pub fn advance(&mut self, declared: Duration) -> Duration {
        let next = match self.mode {
            DurationMode::Playlist => self.total + declared,
            DurationMode::Local => self.started_at.elapsed(),
        };
        self.total = self.total.max(next);
        self.total
    }

    pub fn get(&self) -> Duration {
        self.total
    }
}

enum Cycle {
    /// More chunks may appear, poll again after the refresh interval
    Continue,
    /// The queue should be closed
    Finished,
    /// A transient error happened mid-snapshot, poll again after the backoff
    Retry,
}

/// Producer side of a recording: polls a media playlist and queues every
/// chunk it has not seen before.
pub struct PlaylistPoller {
    client: HttpClient,
    playlist_url: Url,

    target: Duration,
    recorded: RecordedDuration,
    cache: DedupCache,
    keys: KeyStore,

    retry_backoff: Duration,
}

impl PlaylistPoller {
    pub fn new(client: HttpClient, playlist_url: Url, mode: DurationMode) -> Self {
        Self {
            keys: KeyStore::new(client.clone()),
            client,
            playlist_url,

            target: Duration::ZERO,
            recorded: RecordedDuration::new(mode),
            cache: DedupCache::new(DEFAULT_CACHE_CAPACITY),

            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Stop once this much has been recorded. Zero records until the playlist ends.
    pub fn with_target(mut self, target: Duration) -> Self {
        self.target = target;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = DedupCache::new(capacity);
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_manual_key(mut self, key: Option<[u8; 16]>) -> Self {
        self.keys = KeyStore::new(self.client.clone()).with_manual_key(key);
        self
    }

    pub fn recorded(&self) -> Duration {
        self.recorded.get()
    }

    /// Polls until a stop condition is met. Dropping `sender` on return closes the queue.
    pub async fn run(mut self, sender: mpsc::Sender<ChunkJob>) -> HlsrecResult<()> {
        self.recorded.restart();

        loop {
            let snapshot = self.fetch_snapshot().await?;
            let refresh = snapshot.target_duration.max(MIN_REFRESH_INTERVAL);

            match self.process(snapshot, &sender).await? {
                Cycle::Finished => break,
                Cycle::Continue => tokio::time::sleep(refresh).await,
                Cycle::Retry => tokio::time::sleep(self.retry_backoff).await,
            }
        }

        log::info!("Playlist polling finished, {:?} recorded", self.recorded());
        Ok(())
    }

    /// Fetches the playlist until a response arrives. Only a response that is
    /// not a media playlist is an error.
    async fn fetch_snapshot(&self) -> HlsrecResult<PlaylistSnapshot> {
        loop {
            match self.client.get_bytes(self.playlist_url.clone()).await {
                Ok(bytes) => return PlaylistSnapshot::parse(&bytes),
                Err(error) => {
                    log::warn!("Failed to fetch playlist: {error}");
                    tokio::time::sleep(self.retry_backoff).await;
                }
            }
        }
    }

    async fn process(
        &mut self,
        snapshot: PlaylistSnapshot,
        sender: &mpsc::Sender<ChunkJob>,
    ) -> HlsrecResult<Cycle> {
        for (index, chunk) in snapshot.chunks.iter().enumerate() {
            let url = match self.playlist_url.join(&chunk.uri) {
                Ok(url) => url,
                Err(error) => {
                    log::warn!("Skipped chunk with invalid uri {}: {error}", chunk.uri);
                    continue;
                }
            };

            let locator = normalize_locator(&url);
            if self.cache.contains(&locator) {
                log::debug!("Skipped seen chunk {url}");
                continue;
            }

            let Some(sequence) = snapshot.sequence_of(index) else {
                log::warn!("Skipped chunk {url}: media sequence overflows");
                self.cache.record(locator);
                continue;
            };
            let key = match &chunk.key {
                Some(descriptor) => match self.keys.resolve(descriptor, &self.playlist_url).await {
                    Ok(key) => Some(key),
                    Err(error) if error.is_retryable() => {
                        log::warn!("Failed to fetch key for chunk {sequence}: {error}");
                        return Ok(Cycle::Retry);
                    }
                    Err(error) => {
                        // rejected for good, later polls skip it as seen
                        log::warn!("Skipped chunk {sequence} with invalid key: {error}");
                        self.cache.record(locator);
                        continue;
                    }
                },
                None => None,
            };

            self.cache.record(locator);
            let recorded = self.recorded.advance(chunk.duration);
            let job = ChunkJob {
                url,
                sequence,
                key,
                recorded,
            };

            log::info!("Queued {}", job.url);
            if sender.send(job).await.is_err() {
                log::debug!("Chunk queue closed by the consumer");
                return Ok(Cycle::Finished);
            }

            if self.target.is_zero() {
                log::info!("Recorded {recorded:?}");
            } else {
                log::info!("Recorded {recorded:?} of {:?}", self.target);
                if recorded >= self.target {
                    return Ok(Cycle::Finished);
                }
            }
        }

        if snapshot.end_list {
            return Ok(Cycle::Finished);
        }

        Ok(Cycle::Continue)
    }
}

/// Dedup key for a chunk: its resolved URL with percent-encoding undone.
pub fn normalize_locator(url: &Url) -> String {
    match urlencoding::decode(url.as_str()) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => url.to_string(),
    }
}
