use crate::config::SourceConfig;
use crate::error::Error;
use async_trait::async_trait;
use std::io::{self, SeekFrom};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Something that hands out received bytes in chunks, the way a UART
/// receive path does.
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Reads up to `max` bytes.
    ///
    /// `Ok(None)` means the source is exhausted. With a non-zero
    /// `timeout_ms`, a read that produced nothing in time returns an empty
    /// chunk.
    async fn read_chunk(&self, max: usize, timeout_ms: u64) -> Result<Option<Vec<u8>>, Error>;
}

/// Reads a regular file or a character device such as `/dev/ttyUSB0`.
pub struct FileSource {
    file: Mutex<File>,
    loop_on_eof: bool,
}

impl FileSource {
    pub async fn open(path: &str, loop_on_eof: bool) -> io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self {
            file: Mutex::new(file),
            loop_on_eof,
        })
    }

    async fn read_inner(
        file: &mut File,
        buf: &mut [u8],
        loop_on_eof: bool,
    ) -> Result<Option<usize>, Error> {
        match file.read(buf).await? {
            0 if loop_on_eof => {
                file.seek(SeekFrom::Start(0)).await?;
                match file.read(buf).await? {
                    // Empty file, looping would spin forever
                    0 => Ok(None),
                    n => Ok(Some(n)),
                }
            }
            0 => Ok(None),
            n => Ok(Some(n)),
        }
    }
}

#[async_trait]
impl ByteSource for FileSource {
    async fn read_chunk(&self, max: usize, timeout_ms: u64) -> Result<Option<Vec<u8>>, Error> {
        let mut file = self.file.lock().await;
        let mut buf = vec![0u8; max];

        let read = if timeout_ms == 0 {
            Self::read_inner(&mut file, &mut buf, self.loop_on_eof).await?
        } else {
            let deadline = Instant::now() + Duration::from_millis(timeout_ms);
            let sleep = sleep_until(deadline);
            tokio::pin!(sleep);
            tokio::select! {
                res = Self::read_inner(&mut file, &mut buf, self.loop_on_eof) => res?,
                _ = &mut sleep => Some(0),
            }
        };

        Ok(read.map(|n| {
            buf.truncate(n);
            buf
        }))
    }
}

/// Replays a fixed byte string, for tests and captured traffic.
pub struct MemorySource {
    data: Vec<u8>,
    offset: Mutex<usize>,
    loop_on_eof: bool,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>, loop_on_eof: bool) -> Self {
        Self {
            data: data.into(),
            offset: Mutex::new(0),
            loop_on_eof,
        }
    }
}

#[async_trait]
impl ByteSource for MemorySource {
    async fn read_chunk(&self, max: usize, _timeout_ms: u64) -> Result<Option<Vec<u8>>, Error> {
        let mut offset = self.offset.lock().await;
        if *offset >= self.data.len() {
            if !self.loop_on_eof || self.data.is_empty() {
                return Ok(None);
            }
            *offset = 0;
        }
        let end = (*offset + max).min(self.data.len());
        let chunk = self.data[*offset..end].to_vec();
        *offset = end;
        Ok(Some(chunk))
    }
}

/// Opens the source described by `cfg`. `once` overrides `loop = true`.
pub async fn open_source(cfg: &SourceConfig, once: bool) -> Result<Arc<dyn ByteSource>, Error> {
    let loop_on_eof = cfg.loop_.unwrap_or(false) && !once;
    match (&cfg.path, &cfg.data) {
        (Some(path), _) => {
            let source = FileSource::open(path, loop_on_eof)
                .await
                .map_err(|e| Error::Config(format!("Failed to open source {}: {}", path, e)))?;
            Ok(Arc::new(source))
        }
        (None, Some(data)) => Ok(Arc::new(MemorySource::new(data.as_bytes(), loop_on_eof))),
        (None, None) => Err(Error::Config("Source has neither 'path' nor 'data'".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("ringscan-{}-{}", std::process::id(), name))
    }

    #[tokio::test]
    async fn test_memory_source_chunks() {
        let src = MemorySource::new(b"abcdefg".to_vec(), false);
        assert_eq!(src.read_chunk(3, 0).await.unwrap(), Some(b"abc".to_vec()));
        assert_eq!(src.read_chunk(3, 0).await.unwrap(), Some(b"def".to_vec()));
        assert_eq!(src.read_chunk(3, 0).await.unwrap(), Some(b"g".to_vec()));
        assert_eq!(src.read_chunk(3, 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_source_loops() {
        let src = MemorySource::new(b"ab".to_vec(), true);
        assert_eq!(src.read_chunk(4, 0).await.unwrap(), Some(b"ab".to_vec()));
        assert_eq!(src.read_chunk(4, 0).await.unwrap(), Some(b"ab".to_vec()));

        let empty = MemorySource::new(Vec::new(), true);
        assert_eq!(empty.read_chunk(4, 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_source_reads_to_eof() {
        let path = temp_path("eof");
        std::fs::write(&path, b"T=21;\r\n").unwrap();

        let src = FileSource::open(path.to_str().unwrap(), false).await.unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = src.read_chunk(4, 0).await.unwrap() {
            collected.extend(chunk);
        }
        assert_eq!(collected, b"T=21;\r\n");

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_file_source_loops_with_timeout() {
        let path = temp_path("loop");
        std::fs::write(&path, b"xy").unwrap();

        let src = FileSource::open(path.to_str().unwrap(), true).await.unwrap();
        let mut collected = Vec::new();
        for _ in 0..3 {
            let chunk = src.read_chunk(2, 1000).await.unwrap().unwrap();
            collected.extend(chunk);
        }
        assert_eq!(collected, b"xyxyxy");

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_open_source() {
        let cfg = SourceConfig {
            path: None,
            data: Some("hi".into()),
            loop_: Some(true),
        };
        let src = open_source(&cfg, true).await.unwrap();
        assert_eq!(src.read_chunk(8, 0).await.unwrap(), Some(b"hi".to_vec()));
        assert_eq!(src.read_chunk(8, 0).await.unwrap(), None);

        let missing = SourceConfig {
            path: Some("/nonexistent/ringscan-device".into()),
            ..Default::default()
        };
        assert!(matches!(open_source(&missing, false).await, Err(Error::Config(_))));
    }
}
