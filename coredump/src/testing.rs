//! In-memory block device shared by the unit tests

use alloc::vec;
use alloc::vec::Vec;
use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};
use std::io;

/// RAM-backed device that can be told to fail at a given sector
pub struct RamDisk {
    pub data: Vec<u8>,
    pub block_size: usize,
    pub fail_read_at: Option<u64>,
    pub fail_write_at: Option<u64>,
    pub reads: usize,
    pub writes: usize,
    pub flushes: usize,
}

impl RamDisk {
    pub fn new(block_size: usize, sectors: usize) -> Self {
        Self {
            data: vec![0u8; block_size * sectors],
            block_size,
            fail_read_at: None,
            fail_write_at: None,
            reads: 0,
            writes: 0,
            flushes: 0,
        }
    }

    /// Whether the request `[start, start + len)` covers `sector`
    fn hits(&self, fail_at: Option<u64>, start: Lba, len: usize) -> bool {
        let first = start.0;
        let last = first + (len / self.block_size) as u64;
        fail_at.map_or(false, |s| s >= first && s < last)
    }
}

impl BlockIo for RamDisk {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        BlockSize::new(self.block_size as u32).expect("valid block size")
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        Ok((self.data.len() / self.block_size) as u64)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        self.reads += 1;
        if self.hits(self.fail_read_at, start_lba, dst.len()) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected read fault"));
        }
        let offset = start_lba.0 as usize * self.block_size;
        dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
        Ok(())
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        self.writes += 1;
        if self.hits(self.fail_write_at, start_lba, src.len()) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write fault"));
        }
        let offset = start_lba.0 as usize * self.block_size;
        self.data[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.flushes += 1;
        Ok(())
    }
}
