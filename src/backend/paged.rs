//! File-backed backend with an LRU page cache
//!
//! Keeps a bounded number of fixed-size pages of the backing file in memory.
//! Pages are loaded on first touch, marked dirty on write, and written back
//! when evicted, flushed, or when the backend is dropped.

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

#[cfg(feature = "log")]
use log::{debug, error, warn};

use super::range_in_bounds;
use crate::{StorageBackend, StoreError, StoreResult};

/// Cache counters for a [`PagedFileBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
    pub write_backs: usize,
}

struct Frame {
    page: usize,
    data: Vec<u8>,
    dirty: bool,
    last_used: u64,
}

/// Disk-paged byte store.
pub struct PagedFileBackend {
    file: File,
    page_bytes: usize,
    max_frames: usize,
    capacity: usize,
    frames: Vec<Frame>,
    /// Page number to frame index
    page_table: BTreeMap<usize, usize>,
    tick: u64,
    stats: CacheStats,
}

#[allow(unused_variables)]
fn io_error(context: &str, err: io::Error) -> StoreError {
    error!("paged backend: {}: {}", context, err);
    StoreError::Io
}

impl PagedFileBackend {
    /// Create (or truncate) the file at `path` and cache up to `max_frames`
    /// pages of `page_bytes` bytes each.
    pub fn create<P: AsRef<Path>>(
        path: P,
        page_bytes: usize,
        max_frames: usize,
    ) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| io_error("create", e))?;
        Self::from_file(file, page_bytes, max_frames)
    }

    /// Wrap an already opened read/write file. Its current length becomes the capacity.
    pub fn from_file(file: File, page_bytes: usize, max_frames: usize) -> StoreResult<Self> {
        if page_bytes == 0 || max_frames == 0 {
            return Err(StoreError::InvalidParam);
        }
        let len = file.metadata().map_err(|e| io_error("metadata", e))?.len();
        let capacity = usize::try_from(len).map_err(|_| StoreError::OutOfRange)?;
        Ok(Self {
            file,
            page_bytes,
            max_frames,
            capacity,
            frames: Vec::with_capacity(max_frames),
            page_table: BTreeMap::new(),
            tick: 0,
            stats: CacheStats::default(),
        })
    }

    pub fn page_bytes(&self) -> usize {
        self.page_bytes
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of cached pages holding unwritten changes.
    pub fn dirty_pages(&self) -> usize {
        self.frames.iter().filter(|f| f.dirty).count()
    }

    /// Frame holding `page`, loading it (and evicting if needed) on a miss.
    ///
    /// With `overwrite` set the caller is about to replace the whole page, so
    /// its current contents are not read from disk.
    fn frame_for(&mut self, page: usize, overwrite: bool) -> StoreResult<usize> {
        self.tick += 1;
        if let Some(&idx) = self.page_table.get(&page) {
            self.stats.hits += 1;
            self.frames[idx].last_used = self.tick;
            return Ok(idx);
        }
        self.stats.misses += 1;

        let (idx, fresh) = if self.frames.len() < self.max_frames {
            self.frames.push(Frame {
                page,
                data: vec![0; self.page_bytes],
                dirty: false,
                last_used: self.tick,
            });
            (self.frames.len() - 1, true)
        } else {
            let victim = self
                .frames
                .iter()
                .enumerate()
                .min_by_key(|(_, f)| f.last_used)
                .map(|(i, _)| i)
                .ok_or(StoreError::InvalidParam)?;
            self.write_back(victim)?;
            let old_page = self.frames[victim].page;
            // Frames invalidated by a shrink no longer own their page entry.
            if self.page_table.get(&old_page) == Some(&victim) {
                self.page_table.remove(&old_page);
            }
            self.stats.evictions += 1;
            debug!("paged backend: evicted page {} for page {}", old_page, page);

            let frame = &mut self.frames[victim];
            frame.page = page;
            frame.last_used = self.tick;
            frame.data.fill(0);
            (victim, false)
        };

        if !overwrite {
            if let Err(e) = self.load(idx) {
                if fresh {
                    self.frames.pop();
                } else {
                    // Unowned, so it is the next eviction victim.
                    let frame = &mut self.frames[idx];
                    frame.page = usize::MAX;
                    frame.last_used = 0;
                }
                return Err(e);
            }
        }
        self.page_table.insert(page, idx);
        Ok(idx)
    }

    /// Fill frame `idx` from disk; bytes past end of file read as zero.
    fn load(&mut self, idx: usize) -> StoreResult {
        let start = self.frames[idx].page * self.page_bytes;
        self.file
            .seek(SeekFrom::Start(start as u64))
            .map_err(|e| io_error("seek", e))?;
        let buf = &mut self.frames[idx].data;
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(io_error("read", e)),
            }
        }
        Ok(())
    }

    /// Write frame `idx` to disk if dirty.
    fn write_back(&mut self, idx: usize) -> StoreResult {
        let frame = &self.frames[idx];
        if !frame.dirty {
            return Ok(());
        }
        let start = frame.page * self.page_bytes;
        let len = self.page_bytes.min(self.capacity.saturating_sub(start));
        if len > 0 {
            self.file
                .seek(SeekFrom::Start(start as u64))
                .map_err(|e| io_error("seek", e))?;
            self.file
                .write_all(&frame.data[..len])
                .map_err(|e| io_error("write", e))?;
        }
        self.frames[idx].dirty = false;
        self.stats.write_backs += 1;
        Ok(())
    }

    /// Walk `[offset, offset + len)` page by page as `(page, in-page start, chunk start, chunk len)`.
    fn chunks(
        &self,
        offset: usize,
        len: usize,
    ) -> impl Iterator<Item = (usize, usize, usize, usize)> {
        let page_bytes = self.page_bytes;
        let mut done = 0;
        core::iter::from_fn(move || {
            if done >= len {
                return None;
            }
            let pos = offset + done;
            let in_page = pos % page_bytes;
            let n = (page_bytes - in_page).min(len - done);
            let chunk = (pos / page_bytes, in_page, done, n);
            done += n;
            Some(chunk)
        })
    }
}

impl StorageBackend for PagedFileBackend {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read_at(&mut self, offset: usize, buf: &mut [u8]) -> StoreResult {
        if !range_in_bounds(offset, buf.len(), self.capacity) {
            warn!(
                "paged backend: read [{:#x}, +{:#x}) past capacity {:#x}",
                offset,
                buf.len(),
                self.capacity
            );
            return Err(StoreError::OutOfRange);
        }
        let chunks: Vec<_> = self.chunks(offset, buf.len()).collect();
        for (page, in_page, at, n) in chunks {
            let idx = self.frame_for(page, false)?;
            buf[at..at + n].copy_from_slice(&self.frames[idx].data[in_page..in_page + n]);
        }
        Ok(())
    }

    fn write_at(&mut self, offset: usize, data: &[u8]) -> StoreResult {
        if !range_in_bounds(offset, data.len(), self.capacity) {
            warn!(
                "paged backend: write [{:#x}, +{:#x}) past capacity {:#x}",
                offset,
                data.len(),
                self.capacity
            );
            return Err(StoreError::OutOfRange);
        }
        let chunks: Vec<_> = self.chunks(offset, data.len()).collect();
        for (page, in_page, at, n) in chunks {
            let idx = self.frame_for(page, n == self.page_bytes)?;
            let frame = &mut self.frames[idx];
            frame.data[in_page..in_page + n].copy_from_slice(&data[at..at + n]);
            frame.dirty = true;
        }
        Ok(())
    }

    fn resize(&mut self, new_capacity: usize) -> StoreResult {
        if new_capacity < self.capacity {
            let first_dropped = new_capacity.div_ceil(self.page_bytes);
            let dropped: Vec<usize> = self
                .page_table
                .range(first_dropped..)
                .map(|(&page, _)| page)
                .collect();
            for page in dropped {
                if let Some(idx) = self.page_table.remove(&page) {
                    self.frames[idx].dirty = false;
                    self.frames[idx].last_used = 0;
                }
            }
            // The page straddling the new end keeps its prefix; the cut-off
            // tail must read back as zeros if the store grows again.
            let tail = new_capacity % self.page_bytes;
            if tail != 0 {
                if let Some(&idx) = self.page_table.get(&(new_capacity / self.page_bytes)) {
                    self.frames[idx].data[tail..].fill(0);
                }
            }
        }
        self.file
            .set_len(new_capacity as u64)
            .map_err(|e| io_error("set_len", e))?;
        debug!(
            "paged backend: resized from {:#x} to {:#x}",
            self.capacity, new_capacity
        );
        self.capacity = new_capacity;
        Ok(())
    }

    fn flush(&mut self) -> StoreResult {
        for idx in 0..self.frames.len() {
            self.write_back(idx)?;
        }
        self.file.flush().map_err(|e| io_error("flush", e))
    }
}

impl Drop for PagedFileBackend {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!("paged backend: flush on drop failed: {:?}", e);
        }
    }
}
