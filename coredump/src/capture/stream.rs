//! Sector-chunked output stream
//!
//! Turns the snapshot producer's arbitrary-sized writes into whole-sector
//! writes over the payload area. A partial sector is staged in a
//! caller-supplied buffer; aligned runs go straight to the device.
//!
//! ```text
//! put(bytes) ──► cache empty and ≥ 1 sector? ──yes──► write_payload(n sectors)
//!                        │ no
//!                        ▼
//!                 fill cache ──full──► write_payload(1 sector)
//! ```

use super::SnapshotSink;
use crate::error::{DumpError, Result};
use crate::volume::Volume;
use gpt_disk_io::BlockIo;

/// Payload writer over volume sectors `[0, …)`
pub struct SectorWriter<'a, B: BlockIo> {
    /// Target volume
    volume: &'a mut Volume<B>,
    /// One-sector staging buffer
    cache: &'a mut [u8],
    /// Bytes currently staged in `cache`
    cached: usize,
    /// Next sector to write
    sector: u64,
    /// Bytes accepted so far
    written: u64,
}

impl<'a, B: BlockIo> SectorWriter<'a, B> {
    /// Start a payload at sector 0; `cache` must hold at least one sector
    pub fn new(volume: &'a mut Volume<B>, cache: &'a mut [u8]) -> Result<Self> {
        if cache.len() < volume.sector_size() {
            return Err(DumpError::ShortBuffer);
        }
        Ok(Self {
            volume,
            cache,
            cached: 0,
            sector: 0,
            written: 0,
        })
    }

    /// Zero-pad and write any staged tail; returns the payload size
    pub fn finish(mut self) -> Result<u64> {
        if self.cached > 0 {
            let sector_size = self.volume.sector_size();
            self.cache[self.cached..sector_size].fill(0);
            self.flush_cache()?;
        }
        Ok(self.written)
    }

    fn flush_cache(&mut self) -> Result<()> {
        self.volume.write_payload(self.sector, 1, self.cache)?;
        self.sector += 1;
        self.cached = 0;
        Ok(())
    }
}

impl<B: BlockIo> SnapshotSink for SectorWriter<'_, B> {
    fn put(&mut self, mut bytes: &[u8]) -> Result<()> {
        let sector_size = self.volume.sector_size();

        while !bytes.is_empty() {
            if self.cached == 0 && bytes.len() >= sector_size {
                let sectors = bytes.len() / sector_size;
                let len = sectors * sector_size;
                self.volume.write_payload(self.sector, sectors as u64, &bytes[..len])?;
                self.sector += sectors as u64;
                self.written += len as u64;
                bytes = &bytes[len..];
            } else {
                let take = (sector_size - self.cached).min(bytes.len());
                self.cache[self.cached..self.cached + take].copy_from_slice(&bytes[..take]);
                self.cached += take;
                self.written += take as u64;
                bytes = &bytes[take..];

                if self.cached == sector_size {
                    self.flush_cache()?;
                }
            }
        }
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}
