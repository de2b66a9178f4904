//! Raw coredump volume
//!
//! Sector-addressed access to the block device that stages dumps. The last
//! sector is reserved for the [`DumpHeader`](crate::DumpHeader); everything
//! before it is payload space.
//!
//! ```text
//! Sector  0 ........................ N-2 │ N-1
//!         └──────── payload ─────────────┘ header
//! ```

#[cfg(feature = "std")]
pub mod file;

use crate::error::{DumpError, Result};
use crate::header::HEADER_SIZE;
use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;
use log::error;

/// Block device with fixed geometry, whole-sector I/O only
pub struct Volume<B: BlockIo> {
    device: B,
    sector_size: usize,
    sector_count: u64,
}

impl<B: BlockIo> Volume<B> {
    /// Wrap a block device, querying its geometry once
    pub fn open(mut device: B) -> Result<Self> {
        let sector_size = device.block_size().to_u32() as usize;
        let sector_count = device.num_blocks().map_err(|e| {
            error!("coredump: geometry query failed: {}", e);
            DumpError::VolumeUnavailable
        })?;

        // One payload sector plus the header sector at minimum
        if sector_count < 2 || sector_size < HEADER_SIZE {
            error!(
                "coredump: unusable geometry ({} sectors of {} bytes)",
                sector_count, sector_size
            );
            return Err(DumpError::UnsupportedGeometry);
        }

        Ok(Self {
            device,
            sector_size,
            sector_count,
        })
    }

    /// Sector size in bytes
    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    /// Total number of sectors, header included
    pub fn sector_count(&self) -> u64 {
        self.sector_count
    }

    /// Sector holding the dump header
    pub fn header_sector(&self) -> u64 {
        self.sector_count - 1
    }

    /// Number of sectors available for payload
    pub fn payload_sectors(&self) -> u64 {
        self.sector_count - 1
    }

    /// Payload capacity in bytes
    pub fn payload_capacity(&self) -> u64 {
        self.payload_sectors() * self.sector_size as u64
    }

    /// Read `count` sectors starting at `offset` into the front of `buf`
    pub fn read(&mut self, offset: u64, count: u64, buf: &mut [u8]) -> Result<()> {
        let len = self.span(offset, count, self.sector_count, buf.len())?;
        self.device
            .read_blocks(Lba(offset), &mut buf[..len])
            .map_err(|e| {
                error!("coredump: read of sectors {}+{} failed: {}", offset, count, e);
                DumpError::Io
            })
    }

    /// Write `count` sectors starting at `offset` from the front of `buf`
    pub fn write(&mut self, offset: u64, count: u64, buf: &[u8]) -> Result<()> {
        let len = self.span(offset, count, self.sector_count, buf.len())?;
        self.device
            .write_blocks(Lba(offset), &buf[..len])
            .map_err(|e| {
                error!("coredump: write of sectors {}+{} failed: {}", offset, count, e);
                DumpError::Io
            })
    }

    /// Read payload sectors; refuses to touch the header sector
    pub fn read_payload(&mut self, offset: u64, count: u64, buf: &mut [u8]) -> Result<()> {
        self.span(offset, count, self.payload_sectors(), buf.len())?;
        self.read(offset, count, buf)
    }

    /// Write payload sectors; refuses to touch the header sector
    pub fn write_payload(&mut self, offset: u64, count: u64, buf: &[u8]) -> Result<()> {
        self.span(offset, count, self.payload_sectors(), buf.len())?;
        self.write(offset, count, buf)
    }

    /// Read the header sector into `block`
    pub fn read_header_block(&mut self, block: &mut [u8]) -> Result<()> {
        self.read(self.header_sector(), 1, block)
    }

    /// Write `block` to the header sector
    pub fn write_header_block(&mut self, block: &[u8]) -> Result<()> {
        self.write(self.header_sector(), 1, block)?;
        self.device.flush().map_err(|e| {
            error!("coredump: flush after header write failed: {}", e);
            DumpError::Io
        })
    }

    /// Flush and hand the device back
    pub fn close(mut self) -> B {
        if let Err(e) = self.device.flush() {
            error!("coredump: flush on close failed: {}", e);
        }
        self.device
    }

    /// Validate a sector range against `limit` and return its byte length
    fn span(&self, offset: u64, count: u64, limit: u64, buf_len: usize) -> Result<usize> {
        let end = offset.checked_add(count);
        if end.map_or(true, |end| end > limit) {
            return Err(DumpError::OutOfRange {
                offset,
                count,
                limit,
            });
        }

        let len = (count as usize)
            .checked_mul(self.sector_size)
            .ok_or(DumpError::ShortBuffer)?;
        if buf_len < len {
            return Err(DumpError::ShortBuffer);
        }
        Ok(len)
    }
}
