use std::{
    collections::{HashMap, VecDeque},
    io::{self, Read, Seek, SeekFrom},
};

use tracing::trace;
use ureq::http::{
    header::{ACCEPT_RANGES, CONTENT_LENGTH},
    StatusCode,
};

use crate::{
    error::{DownloadError, Result},
    http::Http,
};

const DEFAULT_BLOCK_SIZE: u64 = 128 * 1024;
const DEFAULT_MAX_BLOCKS: usize = 64;

/// Something that can hand out arbitrary byte ranges of a fixed-length blob.
pub trait RangeSource {
    fn len(&self) -> u64;

    /// Returns the bytes in `start..end`. `end` never exceeds [`RangeSource::len`].
    fn fetch(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>>;
}

/// A remote file addressed through HTTP `Range` requests.
pub struct HttpRange {
    url: String,
    len: u64,
}

impl HttpRange {
    /// Probes `url` with a HEAD request for its size and range support.
    pub fn open(url: &str) -> Result<Self> {
        let resp = Http::head(url)?;
        let headers = resp.headers();

        if headers
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("none"))
        {
            return Err(DownloadError::RangeNotSupported { url: url.into() });
        }

        let len = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| DownloadError::InvalidResponse {
                url: url.into(),
                reason: "missing Content-Length".into(),
            })?;

        Ok(Self {
            url: url.into(),
            len,
        })
    }
}

impl RangeSource for HttpRange {
    fn len(&self) -> u64 {
        self.len
    }

    fn fetch(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let resp = Http::fetch(&self.url, Some((start, end - 1))).map_err(io::Error::other)?;
        if resp.status() != StatusCode::PARTIAL_CONTENT {
            return Err(io::Error::other(DownloadError::RangeNotSupported {
                url: self.url.clone(),
            }));
        }

        let expected = (end - start) as usize;
        let mut buf = Vec::with_capacity(expected);
        resp.into_body()
            .into_reader()
            .take(expected as u64)
            .read_to_end(&mut buf)?;
        if buf.len() != expected {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "short range read from {}: wanted {expected} bytes, got {}",
                    self.url,
                    buf.len()
                ),
            ));
        }

        Ok(buf)
    }
}

/// Seekable reader over a [`RangeSource`] that fetches fixed-size blocks on demand and keeps
/// the most recent ones around.
pub struct RangeReader<S> {
    source: S,
    pos: u64,
    block_size: u64,
    max_blocks: usize,
    blocks: HashMap<u64, Vec<u8>>,
    order: VecDeque<u64>,
    requests: usize,
}

pub type HttpRangeReader = RangeReader<HttpRange>;

impl HttpRangeReader {
    pub fn open(url: &str) -> Result<Self> {
        Ok(RangeReader::new(HttpRange::open(url)?))
    }
}

impl<S: RangeSource> RangeReader<S> {
    pub fn new(source: S) -> Self {
        Self::with_block_size(source, DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(source: S, block_size: u64) -> Self {
        Self {
            source,
            pos: 0,
            block_size: block_size.max(1),
            max_blocks: DEFAULT_MAX_BLOCKS,
            blocks: HashMap::new(),
            order: VecDeque::new(),
            requests: 0,
        }
    }

    pub fn len(&self) -> u64 {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of range requests issued so far.
    pub fn requests(&self) -> usize {
        self.requests
    }

    fn load_block(&mut self, idx: u64) -> io::Result<()> {
        if self.blocks.contains_key(&idx) {
            return Ok(());
        }

        let start = idx * self.block_size;
        let end = (start + self.block_size).min(self.len());
        trace!(start, end, "fetching block");
        let data = self.source.fetch(start, end)?;
        self.requests += 1;

        if self.order.len() >= self.max_blocks {
            if let Some(oldest) = self.order.pop_front() {
                self.blocks.remove(&oldest);
            }
        }
        self.order.push_back(idx);
        self.blocks.insert(idx, data);
        Ok(())
    }
}

impl<S: RangeSource> Read for RangeReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.pos >= self.len() {
            return Ok(0);
        }

        let idx = self.pos / self.block_size;
        self.load_block(idx)?;

        let block = self
            .blocks
            .get(&idx)
            .ok_or_else(|| io::Error::other("block evicted while reading"))?;
        let offset = (self.pos - idx * self.block_size) as usize;
        let available = &block[offset.min(block.len())..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n as u64;

        Ok(n)
    }
}

impl<S: RangeSource> Seek for RangeReader<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(offset) => self.len().checked_add_signed(offset),
            SeekFrom::Current(offset) => self.pos.checked_add_signed(offset),
        };

        match target {
            Some(target) => {
                self.pos = target;
                Ok(target)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )),
        }
    }
}
