use tokio::{io::AsyncWrite, sync::mpsc};

use crate::{
    error::HlsrecResult, segment::ChunkJob, sink::OutputSink, util::http::HttpClient,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Chunks appended to the sink
    pub written: u64,
    /// Chunks dropped after a fetch or decrypt failure
    pub skipped: u64,
    pub bytes: u64,
}

/// Consumer side of a recording: downloads queued chunks one at a time and
/// appends them to the sink in queue order.
pub struct SegmentPipeline {
    client: HttpClient,
}

impl SegmentPipeline {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Drains `receiver` until the producer closes it. Only sink write
    /// failures end the run early.
    pub async fn run<W>(
        &self,
        mut receiver: mpsc::Receiver<ChunkJob>,
        sink: &mut OutputSink<W>,
    ) -> HlsrecResult<PipelineStats>
    where
        W: AsyncWrite + Unpin,
    {
        let mut stats = PipelineStats::default();

        while let Some(job) = receiver.recv().await {
            let data = match self.fetch(&job).await {
                Ok(data) => data,
                Err(error) => {
                    log::warn!("Skipped chunk {}: {error}", job.url);
                    stats.skipped += 1;
                    continue;
                }
            };

            sink.append(&data).await?;
            stats.written += 1;
            stats.bytes += data.len() as u64;
            log::info!(
                "Downloaded {} ({}, {:?} recorded)",
                job.file_name(),
                job.sequence,
                job.recorded
            );
        }

        Ok(stats)
    }

    async fn fetch(&self, job: &ChunkJob) -> HlsrecResult<Vec<u8>> {
        let bytes = self.client.get_bytes(job.url.clone()).await?;
        match &job.key {
            Some(key) => key.decrypt(job.sequence, bytes.to_vec()),
            None => Ok(bytes.to_vec()),
        }
    }
}
