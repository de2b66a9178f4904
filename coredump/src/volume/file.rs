//! File-backed block device
//!
//! Drives a device node such as `/dev/coredump`, or a plain image file, as a
//! `gpt_disk_io::BlockIo`. Block device nodes report their logical sector
//! size through `BLKSSZGET`; image files use the caller-supplied size. The
//! sector count comes from seeking to the end, which also works for device
//! nodes whose metadata length is zero.

use crate::error::{DumpError, Result};
use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};
use log::{debug, error, info};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Block device over a read/write file handle
#[derive(Debug)]
pub struct FileBlockIo {
    file: File,
    block_size: BlockSize,
    num_blocks: u64,
}

impl FileBlockIo {
    /// Open `path` read/write
    ///
    /// `sector_size` applies when the device cannot report its own, as with
    /// image files.
    pub fn open(path: impl AsRef<Path>, sector_size: u32) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                error!("coredump: open {} failed: {}", path.display(), e);
                DumpError::VolumeUnavailable
            })?;

        let sector_size = match device_sector_size(&file) {
            Some(reported) if reported != sector_size => {
                info!(
                    "coredump: {} reports {} byte sectors, configured {}",
                    path.display(),
                    reported,
                    sector_size
                );
                reported
            }
            Some(reported) => reported,
            None => sector_size,
        };
        let block_size = BlockSize::new(sector_size).ok_or_else(|| {
            error!("coredump: invalid sector size {}", sector_size);
            DumpError::UnsupportedGeometry
        })?;

        let len = file.seek(SeekFrom::End(0)).map_err(|e| {
            error!("coredump: size query on {} failed: {}", path.display(), e);
            DumpError::VolumeUnavailable
        })?;
        let num_blocks = len / block_size.to_u64();

        debug!(
            "coredump: opened {} ({} sectors of {} bytes)",
            path.display(),
            num_blocks,
            sector_size
        );

        Ok(Self {
            file,
            block_size,
            num_blocks,
        })
    }

    /// Create (or truncate) an image file of `sectors` zeroed sectors
    pub fn create_image(path: impl AsRef<Path>, sector_size: u32, sectors: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|_| DumpError::VolumeUnavailable)?;
        file.set_len(sectors * sector_size as u64)
            .map_err(|_| DumpError::VolumeUnavailable)?;
        drop(file);
        Self::open(path, sector_size)
    }

    fn seek_to(&mut self, lba: Lba) -> io::Result<()> {
        self.file
            .seek(SeekFrom::Start(lba.0 * self.block_size.to_u64()))
            .map(|_| ())
    }
}

#[cfg(target_os = "linux")]
mod ioctl {
    use core::ffi::c_int;

    nix::ioctl_read_bad!(blksszget, nix::request_code_none!(0x12, 104), c_int);
}

/// Logical sector size of a block device node; `None` for anything else
#[cfg(target_os = "linux")]
fn device_sector_size(file: &File) -> Option<u32> {
    use std::os::fd::AsRawFd;
    use std::os::unix::fs::FileTypeExt;

    if !file.metadata().ok()?.file_type().is_block_device() {
        return None;
    }
    let mut size: core::ffi::c_int = 0;
    // SAFETY: BLKSSZGET stores one int through the pointer
    match unsafe { ioctl::blksszget(file.as_raw_fd(), &mut size) } {
        Ok(_) => u32::try_from(size).ok().filter(|&s| s > 0),
        Err(e) => {
            log::warn!("coredump: BLKSSZGET failed: {}", e);
            None
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn device_sector_size(_file: &File) -> Option<u32> {
    None
}

impl BlockIo for FileBlockIo {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        self.block_size
    }

    fn num_blocks(&mut self) -> core::result::Result<u64, Self::Error> {
        Ok(self.num_blocks)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> core::result::Result<(), Self::Error> {
        self.seek_to(start_lba)?;
        self.file.read_exact(dst)
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> core::result::Result<(), Self::Error> {
        self.seek_to(start_lba)?;
        self.file.write_all(src)
    }

    fn flush(&mut self) -> core::result::Result<(), Self::Error> {
        self.file.sync_data()
    }
}
