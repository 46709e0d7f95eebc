use std::time::Duration;

use url::Url;

use crate::decrypt::ChunkKey;

/// A chunk queued for download. Built by the poller, consumed once by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkJob {
    pub url: Url,
    /// Media sequence number from the playlist
    pub sequence: u64,
    pub key: Option<ChunkKey>,
    /// Total recorded duration after this chunk was queued
    pub recorded: Duration,
}

impl ChunkJob {
    pub fn file_name(&self) -> &str {
        self.url
            .path_segments()
            .and_then(|mut c| c.next_back())
            .filter(|name| !name.is_empty())
            .unwrap_or("chunk")
    }
}
