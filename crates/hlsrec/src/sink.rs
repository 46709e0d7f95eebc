use std::{path::PathBuf, pin::Pin};

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{HlsrecError, HlsrecResult};

pub type OutputStream = Pin<Box<dyn AsyncWrite + Send + 'static>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    File(PathBuf),
    Stdout,
}

impl From<PathBuf> for OutputTarget {
    /// `-` selects standard output.
    fn from(path: PathBuf) -> Self {
        if path.as_os_str() == "-" {
            Self::Stdout
        } else {
            Self::File(path)
        }
    }
}

/// Append-only destination for recorded chunks.
pub struct OutputSink<W = OutputStream> {
    writer: W,
    written: u64,
}

impl OutputSink {
    /// Opens the destination, truncating an existing file.
    pub async fn open(target: &OutputTarget) -> HlsrecResult<Self> {
        let writer: OutputStream = match target {
            OutputTarget::File(path) => {
                let file = tokio::fs::File::create(path).await.map_err(|source| {
                    HlsrecError::OutputOpenError {
                        path: path.clone(),
                        source,
                    }
                })?;
                Box::pin(file)
            }
            OutputTarget::Stdout => Box::pin(tokio::io::stdout()),
        };

        Ok(Self::new(writer))
    }
}

impl<W> OutputSink<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub async fn append(&mut self, data: &[u8]) -> HlsrecResult<()> {
        self.writer.write_all(data).await?;
        self.writer.flush().await?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes appended so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn finish(mut self) -> HlsrecResult<W> {
        self.writer.shutdown().await?;
        Ok(self.writer)
    }
}
