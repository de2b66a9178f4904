//! Error types for coredump operations

use thiserror::Error;

/// Result type for coredump operations
pub type Result<T> = core::result::Result<T, DumpError>;

/// Errors that can occur while staging or extracting a dump
///
/// Capture, restore and init share this type. None of the variants carry
/// heap data so the capture path can build and return them after a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DumpError {
    /// Block device missing or could not be opened
    #[error("coredump volume unavailable")]
    VolumeUnavailable,

    /// Sector read or write failed in the device driver
    #[error("sector I/O failed")]
    Io,

    /// Sector range falls outside the addressable area
    #[error("sector range {offset}+{count} exceeds limit of {limit} sectors")]
    OutOfRange {
        /// First sector of the request
        offset: u64,
        /// Number of sectors requested
        count: u64,
        /// Number of addressable sectors
        limit: u64,
    },

    /// Caller buffer smaller than the requested sector span
    #[error("buffer too small for requested sectors")]
    ShortBuffer,

    /// Volume too small or sectors too small to hold the header
    #[error("unsupported volume geometry")]
    UnsupportedGeometry,

    /// Destination directory already holds the maximum number of dumps
    #[error("too many retained coredump files (>= {0})")]
    TooManyRetainedFiles(usize),

    /// Copy or header buffer could not be reserved
    #[error("buffer allocation failed")]
    AllocationFailure,

    /// Sector does not contain a pending dump header
    #[error("no valid dump header")]
    InvalidHeader,

    /// Snapshot producer reported a failure of its own
    #[error("snapshot producer failed")]
    SnapshotFailed,

    /// Destination directory or file could not be created or written
    #[error("destination filesystem error")]
    DestinationIo,
}
