//! Platform services the capture path depends on
//!
//! Kept to two calls that are safe to make after a crash: the host identity
//! and the wall clock.

use crate::header::HostIdentity;

/// Host identity and clock
pub trait Platform {
    /// Name and version of the running system
    fn identity(&self) -> HostIdentity;

    /// Current time in seconds since the Unix epoch
    fn now(&self) -> i64;
}

/// Platform backed by `uname(2)` and the system clock
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPlatform;

#[cfg(feature = "std")]
impl Platform for SystemPlatform {
    #[cfg(unix)]
    fn identity(&self) -> HostIdentity {
        match nix::sys::utsname::uname() {
            Ok(uts) => HostIdentity::new(
                &uts.nodename().to_string_lossy(),
                &uts.version().to_string_lossy(),
            ),
            Err(e) => {
                log::warn!("coredump: uname failed: {}", e);
                HostIdentity::new("unknown", "unknown")
            }
        }
    }

    #[cfg(not(unix))]
    fn identity(&self) -> HostIdentity {
        HostIdentity::new("unknown", "unknown")
    }

    fn now(&self) -> i64 {
        use std::time::{SystemTime, UNIX_EPOCH};

        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}
