//! Subsystem lifecycle
//!
//! One [`Coredump`] value owns the volume and the header buffer for the life
//! of the process. The boot sequence calls [`Coredump::init`]; the failure
//! handler later calls [`Coredump::capture`] on the same value. Both take
//! `&mut self`, so a capture and a restore can never overlap.
//!
//! # States
//!
//! ```text
//!                 flag off
//! Uninitialized ───────────► Disabled
//!       │  ▲
//!  init │  │ failure (volume closed, buffer freed)
//!       ▼  │
//!   [restore pending dump, clear header]
//!       │
//!       ▼
//!     Ready ──► capture() streams into the volume
//! ```

use crate::capture::{self, CaptureOutcome, MemoryRegion, SnapshotProducer};
use crate::config::{is_enabled, ConfigStore};
use crate::error::{DumpError, Result};
use crate::header::{clear_header, read_header, DumpHeader};
use crate::platform::Platform;
use crate::volume::Volume;
use alloc::vec::Vec;
use gpt_disk_io::BlockIo;
use log::{error, info, warn};

/// How far a restore got
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStatus {
    /// Every payload byte was extracted
    Complete,
    /// The copy stopped early
    Partial {
        /// Bytes extracted
        copied: u64,
        /// Bytes the header described
        expected: u64,
    },
}

/// Extracts a pending payload during init
pub trait Restorer<B: BlockIo> {
    /// Extract the payload described by `header` from `volume`
    fn restore(&mut self, volume: &mut Volume<B>, header: &DumpHeader) -> Result<RestoreStatus>;

    /// Remove the output of an incomplete attempt whose header stays pending
    ///
    /// Called before init returns when the next boot will retry, so a
    /// partial copy does not count against the retention cap.
    fn discard(&mut self) {}
}

impl<B, F> Restorer<B> for F
where
    B: BlockIo,
    F: FnMut(&mut Volume<B>, &DumpHeader) -> Result<RestoreStatus>,
{
    fn restore(&mut self, volume: &mut Volume<B>, header: &DumpHeader) -> Result<RestoreStatus> {
        self(volume, header)
    }
}

/// When the pending header is cleared after a restore attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearPolicy {
    /// Clear after every attempt, even a failed one. The snapshot is lost
    /// if extraction fails.
    #[default]
    Always,
    /// Clear only after a complete extraction; otherwise retry next boot
    OnSuccess,
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsystemState {
    /// `init` not run, or it failed
    Uninitialized,
    /// Enable flag off; capture is a no-op
    Disabled,
    /// Volume open; capture armed
    Ready,
}

/// The coredump subsystem instance
pub struct Coredump<B: BlockIo> {
    volume: Option<Volume<B>>,
    header_block: Vec<u8>,
    state: SubsystemState,
    policy: ClearPolicy,
}

impl<B: BlockIo> Default for Coredump<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: BlockIo> Coredump<B> {
    /// Uninitialized subsystem with the default clear policy
    pub fn new() -> Self {
        Self::with_policy(ClearPolicy::default())
    }

    /// Uninitialized subsystem with an explicit clear policy
    pub fn with_policy(policy: ClearPolicy) -> Self {
        Self {
            volume: None,
            header_block: Vec::new(),
            state: SubsystemState::Uninitialized,
            policy,
        }
    }

    /// Current state
    pub fn state(&self) -> SubsystemState {
        self.state
    }

    /// Whether `capture` will write
    pub fn is_ready(&self) -> bool {
        self.state == SubsystemState::Ready
    }

    /// The open volume, if any
    pub fn volume(&self) -> Option<&Volume<B>> {
        self.volume.as_ref()
    }

    /// Bring the subsystem up, extracting any dump left by the previous boot
    ///
    /// `open` is only called when the enable flag is set and no volume is
    /// open yet. A second call after success returns immediately.
    pub fn init<C, O, R>(&mut self, config: &C, open: O, restorer: &mut R) -> Result<()>
    where
        C: ConfigStore + ?Sized,
        O: FnOnce() -> Result<B>,
        R: Restorer<B> + ?Sized,
    {
        if self.volume.is_some() {
            return Ok(());
        }

        if !is_enabled(config) {
            info!("coredump: disabled by configuration");
            self.state = SubsystemState::Disabled;
            return Ok(());
        }

        match self.bring_up(open, restorer) {
            Ok(()) => {
                self.state = SubsystemState::Ready;
                Ok(())
            }
            Err(e) => {
                error!("coredump: init failed: {}", e);
                self.shutdown();
                Err(e)
            }
        }
    }

    fn bring_up<O, R>(&mut self, open: O, restorer: &mut R) -> Result<()>
    where
        O: FnOnce() -> Result<B>,
        R: Restorer<B> + ?Sized,
    {
        let volume = self.volume.insert(Volume::open(open()?)?);

        let sector_size = volume.sector_size();
        let mut block = Vec::new();
        block
            .try_reserve_exact(sector_size)
            .map_err(|_| DumpError::AllocationFailure)?;
        block.resize(sector_size, 0);
        self.header_block = block;

        let Some(header) = read_header(volume, &mut self.header_block)? else {
            return Ok(());
        };

        info!(
            "coredump: pending dump from {} {} ({} bytes)",
            header.identity.name(),
            header.identity.version(),
            header.payload_size
        );

        let complete = match restorer.restore(volume, &header) {
            Ok(RestoreStatus::Complete) => true,
            Ok(RestoreStatus::Partial { copied, expected }) => {
                warn!("coredump: partial extraction, {} of {} bytes", copied, expected);
                false
            }
            Err(e) => {
                error!("coredump: extraction failed: {}", e);
                false
            }
        };

        if !complete && self.policy == ClearPolicy::OnSuccess {
            warn!("coredump: keeping pending dump for the next boot");
            restorer.discard();
            return Ok(());
        }
        if !complete {
            warn!("coredump: discarding unextracted dump");
        }

        // The restorer may have used the volume; the block still holds the header
        clear_header(volume, &mut self.header_block)
    }

    /// Stream a snapshot of `regions` into the volume
    ///
    /// Returns `Disabled` without touching anything unless the subsystem is
    /// ready. Callers in the failure handler should log and drop errors.
    pub fn capture<P, S>(&mut self, regions: &[MemoryRegion], producer: &mut P, platform: &S) -> Result<CaptureOutcome>
    where
        P: SnapshotProducer + ?Sized,
        S: Platform + ?Sized,
    {
        let volume = match (self.state, self.volume.as_mut()) {
            (SubsystemState::Ready, Some(volume)) => volume,
            _ => {
                info!("coredump: capture disabled");
                return Ok(CaptureOutcome::Disabled);
            }
        };
        capture::capture(volume, &mut self.header_block, regions, producer, platform)
    }

    /// Header currently on the volume, if one is pending
    pub fn pending_header(&mut self) -> Result<Option<DumpHeader>> {
        match self.volume.as_mut() {
            Some(volume) => read_header(volume, &mut self.header_block),
            None => Ok(None),
        }
    }

    /// Release the volume and return the device
    pub fn shutdown(&mut self) -> Option<B> {
        let device = self.volume.take().map(Volume::close);
        self.header_block = Vec::new();
        self.state = SubsystemState::Uninitialized;
        device
    }
}
