//! Common test utilities and mock block devices

use coredump::{DumpError, HostIdentity, MemoryRegion, Platform, SnapshotSink};
use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};
use std::io;

/// In-memory block device for testing
#[derive(Debug, Clone)]
pub struct MemoryBlockDevice {
    pub data: Vec<u8>,
    pub block_size: usize,
    /// Reads covering this sector fail
    pub fail_read_at: Option<u64>,
}

impl MemoryBlockDevice {
    /// Zeroed device of `sectors` sectors
    pub fn new(block_size: usize, sectors: usize) -> Self {
        Self {
            data: vec![0u8; block_size * sectors],
            block_size,
            fail_read_at: None,
        }
    }
}

impl BlockIo for MemoryBlockDevice {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        BlockSize::new(self.block_size as u32).expect("valid block size")
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        Ok((self.data.len() / self.block_size) as u64)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        let sectors = (dst.len() / self.block_size) as u64;
        if let Some(bad) = self.fail_read_at {
            if bad >= start_lba.0 && bad < start_lba.0 + sectors {
                return Err(io::Error::new(io::ErrorKind::Other, "injected read fault"));
            }
        }

        let offset = start_lba.0 as usize * self.block_size;
        if offset + dst.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read beyond end of device",
            ));
        }
        dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
        Ok(())
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        let offset = start_lba.0 as usize * self.block_size;
        if offset + src.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write beyond end of device",
            ));
        }
        self.data[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Platform with a fixed identity and clock
pub struct TestPlatform {
    pub name: &'static str,
    pub version: &'static str,
    pub now: i64,
}

impl Default for TestPlatform {
    fn default() -> Self {
        Self {
            name: "devkit",
            version: "1.0",
            now: 1_700_000_000,
        }
    }
}

impl Platform for TestPlatform {
    fn identity(&self) -> HostIdentity {
        HostIdentity::new(self.name, self.version)
    }

    fn now(&self) -> i64 {
        self.now
    }
}

/// Deterministic non-repeating-looking payload
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 256) as u8).collect()
}

/// Producer that emits `data` in uneven slices
pub fn slicing_producer(data: &[u8]) -> impl FnMut(&[MemoryRegion], &mut dyn SnapshotSink) -> Result<(), DumpError> + '_ {
    move |_regions: &[MemoryRegion], sink: &mut dyn SnapshotSink| -> Result<(), DumpError> {
        let mut rest = data;
        let mut step = 1;
        while !rest.is_empty() {
            let take = step.min(rest.len());
            sink.put(&rest[..take])?;
            rest = &rest[take..];
            step = step * 3 + 1;
        }
        Ok(())
    }
}
