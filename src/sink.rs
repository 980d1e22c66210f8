//! Elementary-stream sinks (spec §6): where the caller hands emitted,
//! Annex B-framed bytes to either an append-only file or a decoder.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Consumer of Annex B-framed bytes, in emission order.
#[async_trait]
pub trait ElementaryStreamSink {
    async fn write_nal(&mut self, framed: &[u8]) -> Result<()>;
}

/// Append-only file sink, writing each framed NAL as it arrives so the
/// output file is a valid, growing HEVC elementary stream throughout the
/// session.
pub struct FileSink {
    file: File,
    bytes_written: u64,
}

impl FileSink {
    pub async fn create(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .await
            .with_context(|| format!("creating elementary stream file {}", path.display()))?;
        Ok(FileSink {
            file,
            bytes_written: 0,
        })
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[async_trait]
impl ElementaryStreamSink for FileSink {
    async fn write_nal(&mut self, framed: &[u8]) -> Result<()> {
        self.file.write_all(framed).await?;
        self.bytes_written += framed.len() as u64;
        Ok(())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        info!("wrote {} bytes to elementary stream", self.bytes_written);
    }
}

/// In-memory sink, for tests and for wiring straight into a decoder
/// context that wants the concatenated stream.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub buffer: Vec<u8>,
}

#[async_trait]
impl ElementaryStreamSink for MemorySink {
    async fn write_nal(&mut self, framed: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(framed);
        Ok(())
    }
}
