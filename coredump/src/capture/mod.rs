//! Crash-time capture
//!
//! Runs inside the failure handler. The snapshot producer serializes memory
//! into a [`SectorWriter`]; only after it finishes cleanly is a header
//! committed, so an aborted capture leaves inert bytes and no pending dump.
//!
//! Nothing here allocates. The only buffer in play is the one-sector scratch
//! block the lifecycle reserved at init, which doubles as the stream cache
//! and the header encoding buffer.

mod stream;

pub use stream::SectorWriter;

use crate::error::Result;
use crate::header::{read_header, write_header, DumpHeader};
use crate::platform::Platform;
use crate::volume::Volume;
use gpt_disk_io::BlockIo;
use log::{error, info, warn};

/// One memory range handed over by the failure handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    /// First address of the range
    pub start: u64,
    /// One past the last address
    pub end: u64,
    /// Platform-defined attribute bits
    pub flags: u32,
}

impl MemoryRegion {
    /// Create a region descriptor
    pub const fn new(start: u64, end: u64, flags: u32) -> Self {
        Self { start, end, flags }
    }

    /// Length of the range in bytes
    pub const fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the range is empty
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Byte sink the snapshot producer writes into
pub trait SnapshotSink {
    /// Append bytes to the payload
    fn put(&mut self, bytes: &[u8]) -> Result<()>;

    /// Bytes accepted so far
    fn bytes_written(&self) -> u64;
}

/// External serializer of the memory image
///
/// The produced bytes are opaque to this crate.
pub trait SnapshotProducer {
    /// Serialize `regions` into `sink`
    fn produce(&mut self, regions: &[MemoryRegion], sink: &mut dyn SnapshotSink) -> Result<()>;
}

impl<F> SnapshotProducer for F
where
    F: FnMut(&[MemoryRegion], &mut dyn SnapshotSink) -> Result<()>,
{
    fn produce(&mut self, regions: &[MemoryRegion], sink: &mut dyn SnapshotSink) -> Result<()> {
        self(regions, sink)
    }
}

/// Result of a capture attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Subsystem disabled or not initialized; nothing was touched
    Disabled,
    /// An unconsumed dump already occupies the volume; new one discarded
    AlreadyPending,
    /// Payload written and header committed
    Captured {
        /// Bytes in the payload
        payload_size: u64,
    },
}

/// Stream a snapshot into `volume` and commit its header
///
/// `scratch` must hold at least one sector.
pub fn capture<B, P, S>(
    volume: &mut Volume<B>,
    scratch: &mut [u8],
    regions: &[MemoryRegion],
    producer: &mut P,
    platform: &S,
) -> Result<CaptureOutcome>
where
    B: BlockIo,
    P: SnapshotProducer + ?Sized,
    S: Platform + ?Sized,
{
    if let Some(pending) = read_header(volume, scratch)? {
        warn!(
            "coredump: dump from {} ({} bytes) not yet extracted, discarding new capture",
            pending.identity.name(),
            pending.payload_size
        );
        return Ok(CaptureOutcome::AlreadyPending);
    }

    let mut writer = SectorWriter::new(volume, scratch)?;
    if let Err(e) = producer.produce(regions, &mut writer) {
        error!(
            "coredump: snapshot aborted after {} bytes: {}",
            writer.bytes_written(),
            e
        );
        return Err(e);
    }
    let payload_size = writer.finish()?;

    let header = DumpHeader::new(platform.identity(), platform.now(), payload_size);
    write_header(volume, scratch, &header)?;

    info!(
        "coredump: captured {} bytes in {} sectors",
        payload_size,
        header.payload_sectors(volume.sector_size())
    );
    Ok(CaptureOutcome::Captured { payload_size })
}

/// `std::io::Write` view of a sink, for producers built on `std::io`
#[cfg(feature = "std")]
pub struct SinkWriter<'a>(pub &'a mut dyn SnapshotSink);

#[cfg(feature = "std")]
impl std::io::Write for SinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.put(buf).map_err(std::io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
