//! Image acquisition over a byte stream.
//!
//! The camera sends each JPEG as a frame: a little-endian `u32` payload
//! length followed by exactly that many bytes. Frames are stored as
//! `<root>/<YYYY-MM-DD>/image_<YYYYMMDD_HHMMSS>.jpg`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{info, warn};
use time::OffsetDateTime;
use time::macros::format_description;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Frames announcing this many bytes or more are rejected
pub const MAX_FRAME_LEN: u32 = 10_000_000;

/// Reads length-prefixed frames from an async byte stream
pub struct FrameReader<R> {
    reader: R,
    rejected: u64,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, rejected: 0 }
    }

    /// Number of length prefixes skipped as implausible
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Fill `buf` completely. `Ok(false)` on EOF before the first byte.
    async fn read_prefix(&mut self, buf: &mut [u8; 4]) -> Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(false);
                }
                bail!("Stream ended inside a length prefix ({} of 4 bytes)", filled);
            }
            filled += n;
        }
        Ok(true)
    }

    /// Next payload, or `None` once the stream ends at a frame boundary.
    /// Prefixes of 0 or at least `MAX_FRAME_LEN` bytes are skipped.
    pub async fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let mut prefix = [0u8; 4];
            if !self.read_prefix(&mut prefix).await? {
                return Ok(None);
            }
            let len = u32::from_le_bytes(prefix);
            if len == 0 || len >= MAX_FRAME_LEN {
                self.rejected += 1;
                warn!("Rejecting frame with implausible length {}", len);
                continue;
            }
            let mut payload = vec![0u8; len as usize];
            self.reader
                .read_exact(&mut payload)
                .await
                .with_context(|| format!("Stream ended inside a {} byte frame", len))?;
            return Ok(Some(payload));
        }
    }
}

/// Writes received images into dated folders
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Save with the current local time (UTC if the offset is unknown)
    pub async fn save(&self, payload: &[u8]) -> Result<PathBuf> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        self.save_at(payload, now).await
    }

    /// Save as captured at `at`. A taken name gets a `_<n>` suffix.
    pub async fn save_at(&self, payload: &[u8], at: OffsetDateTime) -> Result<PathBuf> {
        let folder = at.format(format_description!("[year]-[month]-[day]"))?;
        let stamp = at.format(format_description!("[year][month][day]_[hour][minute][second]"))?;
        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir).await?;

        let stem = format!("image_{}", stamp);
        let mut path = dir.join(format!("{}.jpg", stem));
        let mut n = 1;
        while tokio::fs::try_exists(&path).await? {
            path = dir.join(format!("{}_{}.jpg", stem, n));
            n += 1;
        }
        tokio::fs::write(&path, payload)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Store every frame of `reader` until the stream ends; returns the count
pub async fn receive_into<R: AsyncRead + Unpin>(reader: R, store: &ImageStore) -> Result<usize> {
    let mut frames = FrameReader::new(reader);
    let mut saved = 0;
    while let Some(payload) = frames.next_frame().await? {
        let path = store.save(&payload).await?;
        info!("Image saved: {} ({} bytes)", path.display(), payload.len());
        saved += 1;
    }
    if frames.rejected() > 0 {
        warn!("{} frame(s) rejected", frames.rejected());
    }
    Ok(saved)
}
