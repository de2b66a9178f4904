//! Coredump Staging
//!
//! Persists a crash dump to a raw, filesystem-less block volume while the
//! system is failing, then extracts it into a regular file on the next boot.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Coredump (lifecycle)                     │
//! │   init: config → open volume → pending header? → restore    │
//! │   capture: header check → snapshot stream → commit header   │
//! └───────────────┬──────────────────────────────┬───────────────┘
//!                 │                              │
//!                 ▼                              ▼
//!        ┌─────────────────┐            ┌─────────────────┐
//!        │  SectorWriter   │            │ RestoreSession  │
//!        │ (crash context) │            │ (boot context)  │
//!        └────────┬────────┘            └────────┬────────┘
//!                 │                              │
//!                 ▼                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Volume: sectors [0, N-1) payload          sector N-1 header  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The capture path never allocates: the one-sector scratch buffer it
//! streams through is reserved during [`Coredump::init`]. Everything that
//! needs a filesystem (restore, file-backed volumes, property files, the
//! system platform) lives behind the `std` feature.
//!
//! # Usage
//!
//! ```ignore
//! use coredump::{Coredump, FileBlockIo, FileRestorer, PropertyFile, RestoreOptions};
//!
//! let mut dump = Coredump::new();
//! let config = PropertyFile::load("/data/property.conf")?;
//! let mut restorer = FileRestorer::new(RestoreOptions::default());
//! dump.init(&config, || FileBlockIo::open("/dev/coredump", 512), &mut restorer)?;
//!
//! // Later, from the failure handler:
//! let _ = dump.capture(&regions, &mut producer, &SystemPlatform);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;
#[cfg(all(test, not(feature = "std")))]
extern crate std;

pub mod capture;
pub mod config;
pub mod error;
pub mod header;
pub mod lifecycle;
pub mod platform;
#[cfg(feature = "std")]
pub mod restore;
pub mod volume;

#[cfg(test)]
mod testing;

pub use capture::{capture, CaptureOutcome, MemoryRegion, SectorWriter, SnapshotProducer, SnapshotSink};
pub use config::{is_enabled, ConfigStore, StaticConfig, ENABLE_KEY};
pub use error::{DumpError, Result};
pub use header::{DumpHeader, HostIdentity, HEADER_SIZE, MAGIC};
pub use lifecycle::{ClearPolicy, Coredump, RestoreStatus, Restorer, SubsystemState};
pub use platform::Platform;
pub use volume::Volume;

#[cfg(feature = "std")]
pub use capture::SinkWriter;
#[cfg(feature = "std")]
pub use config::PropertyFile;
#[cfg(feature = "std")]
pub use platform::SystemPlatform;
#[cfg(feature = "std")]
pub use restore::{FileRestorer, RestoreOptions, RestoreReport, RestoreSession};
#[cfg(feature = "std")]
pub use volume::file::FileBlockIo;

/// Maximum number of extracted dump files kept in the destination directory
pub const MAX_RETAINED_FILES: usize = 5;

/// Sectors transferred per iteration of the restore copy loop
pub const CHUNK_SECTORS: usize = 128;
