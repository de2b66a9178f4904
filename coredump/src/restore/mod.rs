//! Boot-time extraction
//!
//! Copies a pending payload out of the volume into a regular file, then
//! leaves it to the lifecycle to clear the header.
//!
//! # Flow
//!
//! ```text
//! create dir ─► retention check ─► name file ─► reserve chunk buffer
//!      ─► create file ─► copy loop (128 sectors per chunk) ─► close
//! ```
//!
//! Failures before the copy loop are returned as errors. A read or write
//! failure inside the loop stops the copy and the report carries the
//! partial byte count instead.

pub mod naming;
pub mod progress;
pub mod retention;

use crate::error::{DumpError, Result};
use crate::header::DumpHeader;
use crate::lifecycle::{RestoreStatus, Restorer};
use crate::volume::Volume;
use crate::{CHUNK_SECTORS, MAX_RETAINED_FILES};
use chrono::{Local, NaiveDateTime, TimeZone};
use gpt_disk_io::BlockIo;
use log::{error, info, warn};
use progress::ProgressTracker;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

/// Default directory for extracted dumps
pub const DEFAULT_DUMP_DIR: &str = "/data/coredump";

/// Default file name prefix; also identifies the retention set
pub const DEFAULT_PREFIX: &str = "Core";

/// Default file extension
pub const DEFAULT_EXTENSION: &str = "core";

/// Where and how extracted dumps are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOptions {
    /// Destination directory, created if absent
    pub dir: PathBuf,
    /// File name prefix
    pub prefix: String,
    /// File extension, without the dot
    pub extension: String,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_DUMP_DIR),
            prefix: DEFAULT_PREFIX.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl RestoreOptions {
    /// Default naming in a different directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    /// Destination file for the payload described by `header`
    pub fn path_for(&self, header: &DumpHeader) -> PathBuf {
        let name = naming::file_name(
            &self.prefix,
            &header.identity,
            local_time(header.captured_at),
            &self.extension,
        );
        self.dir.join(name)
    }
}

/// Outcome of one extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    /// File the payload was written to
    pub path: PathBuf,
    /// Bytes actually copied
    pub bytes_copied: u64,
    /// Bytes the header promised
    pub payload_size: u64,
}

impl RestoreReport {
    /// Whether the whole payload made it into the file
    pub fn is_complete(&self) -> bool {
        self.bytes_copied == self.payload_size
    }

    /// Completion as seen by the lifecycle
    pub fn status(&self) -> RestoreStatus {
        if self.is_complete() {
            RestoreStatus::Complete
        } else {
            RestoreStatus::Partial {
                copied: self.bytes_copied,
                expected: self.payload_size,
            }
        }
    }
}

/// One extraction of a pending payload
pub struct RestoreSession<'a, B: BlockIo> {
    volume: &'a mut Volume<B>,
    header: &'a DumpHeader,
    options: &'a RestoreOptions,
    on_progress: Option<&'a mut dyn FnMut(u8)>,
}

impl<'a, B: BlockIo> RestoreSession<'a, B> {
    /// Prepare an extraction of the payload described by `header`
    pub fn new(volume: &'a mut Volume<B>, header: &'a DumpHeader, options: &'a RestoreOptions) -> Self {
        Self {
            volume,
            header,
            options,
            on_progress: None,
        }
    }

    /// Also hand each reported percentage to `f`
    pub fn with_progress(mut self, f: &'a mut dyn FnMut(u8)) -> Self {
        self.on_progress = Some(f);
        self
    }

    /// Run the extraction
    pub fn run(mut self) -> Result<RestoreReport> {
        let dir = &self.options.dir;
        fs::create_dir_all(dir).map_err(|e| {
            error!("coredump: cannot create {}: {}", dir.display(), e);
            DumpError::DestinationIo
        })?;

        let retained = retention::count_retained(dir, &self.options.prefix).map_err(|e| {
            error!("coredump: cannot scan {}: {}", dir.display(), e);
            DumpError::DestinationIo
        })?;
        if retained + 1 > MAX_RETAINED_FILES {
            error!(
                "coredump: too many coredump files in {} (>= {})",
                dir.display(),
                MAX_RETAINED_FILES
            );
            return Err(DumpError::TooManyRetainedFiles(MAX_RETAINED_FILES));
        }

        let path = self.options.path_for(self.header);

        let chunk_len = self.volume.sector_size() * CHUNK_SECTORS;
        let mut buf = Vec::new();
        buf.try_reserve_exact(chunk_len).map_err(|_| {
            error!("coredump: cannot reserve {} byte copy buffer", chunk_len);
            DumpError::AllocationFailure
        })?;
        buf.resize(chunk_len, 0);

        let mut file = File::create(&path).map_err(|e| {
            error!("coredump: open {} failed: {}", path.display(), e);
            DumpError::DestinationIo
        })?;

        info!("coredump: extracting to {} ...", path.display());
        let bytes_copied = self.copy(&mut file, &mut buf);

        if let Err(e) = file.sync_all() {
            warn!("coredump: sync of {} failed: {}", path.display(), e);
        }
        drop(file);

        info!(
            "coredump: extracted {} [{} / {} bytes]",
            path.display(),
            bytes_copied,
            self.header.payload_size
        );

        Ok(RestoreReport {
            path,
            bytes_copied,
            payload_size: self.header.payload_size,
        })
    }

    /// Copy loop; returns the bytes that reached the file
    fn copy(&mut self, file: &mut File, buf: &mut [u8]) -> u64 {
        let sector_size = self.volume.sector_size() as u64;
        let chunk_len = buf.len() as u64;
        let total = self.header.payload_size;
        let mut tracker = ProgressTracker::new(total);
        let mut copied = 0u64;

        while copied < total {
            let sector = copied / sector_size;
            let remaining = total - copied;

            // Full chunk, or the final partial one rounded up to whole sectors
            let (sectors, span) = if remaining >= chunk_len {
                (CHUNK_SECTORS as u64, chunk_len as usize)
            } else {
                (remaining.div_ceil(sector_size), remaining as usize)
            };

            if let Err(e) = self.volume.read_payload(sector, sectors, buf) {
                error!("coredump: read at sector {} failed: {}", sector, e);
                break;
            }
            if let Err(e) = file.write_all(&buf[..span]) {
                error!("coredump: write at offset {} failed: {}", copied, e);
                break;
            }
            copied += span as u64;

            for percent in tracker.advance(copied) {
                info!("coredump: extracting ... [{}%]", percent);
                if let Some(f) = self.on_progress.as_mut() {
                    f(percent);
                }
            }
        }

        copied
    }
}

/// Local wall-clock time of a capture, if representable
fn local_time(captured_at: i64) -> Option<NaiveDateTime> {
    Local
        .timestamp_opt(captured_at, 0)
        .single()
        .map(|t| t.naive_local())
}

/// [`Restorer`] that extracts into a directory via [`RestoreSession`]
#[derive(Debug, Clone, Default)]
pub struct FileRestorer {
    options: RestoreOptions,
    last_report: Option<RestoreReport>,
}

impl FileRestorer {
    /// Restorer writing with `options`
    pub fn new(options: RestoreOptions) -> Self {
        Self {
            options,
            last_report: None,
        }
    }

    /// Report of this boot's extraction, unless none was made or it was discarded
    pub fn last_report(&self) -> Option<&RestoreReport> {
        self.last_report.as_ref()
    }
}

impl<B: BlockIo> Restorer<B> for FileRestorer {
    fn restore(&mut self, volume: &mut Volume<B>, header: &DumpHeader) -> Result<RestoreStatus> {
        self.last_report = None;
        let report = RestoreSession::new(volume, header, &self.options).run()?;
        let status = report.status();
        self.last_report = Some(report);
        Ok(status)
    }

    fn discard(&mut self) {
        let Some(report) = self.last_report.take_if(|r| !r.is_complete()) else {
            return;
        };
        match fs::remove_file(&report.path) {
            Ok(()) => info!("coredump: removed partial {}", report.path.display()),
            Err(e) => warn!("coredump: cannot remove partial {}: {}", report.path.display(), e),
        }
    }
}
