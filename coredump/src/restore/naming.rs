//! Extracted file naming
//!
//! `<prefix>-<host>-<version>-<year>-<month>-<day>-<hour>-<minute>-<second>.<ext>`,
//! with spaces and colons turned into dashes so the name is safe on any
//! filesystem the dump directory may live on.

use crate::header::HostIdentity;
use chrono::{Datelike, NaiveDateTime, Timelike};
use std::fmt::Write;

/// Build the destination file name for a dump
///
/// The date part is omitted when `time` is `None` (unrepresentable
/// timestamp).
pub fn file_name(prefix: &str, identity: &HostIdentity, time: Option<NaiveDateTime>, extension: &str) -> String {
    let mut name = format!("{}-{}-{}", prefix, identity.name(), identity.version());

    if let Some(t) = time {
        // Writing to a String cannot fail
        let _ = write!(
            name,
            "-{}-{}-{}-{}-{}-{}",
            t.year(),
            t.month(),
            t.day(),
            t.hour(),
            t.minute(),
            t.second()
        );
    }

    name.push('.');
    name.push_str(extension);
    sanitize(&name)
}

/// Replace spaces and colons with dashes
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c == ' ' || c == ':' { '-' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(y, mo, d).and_then(|date| date.and_hms_opt(h, mi, s))
    }

    #[test]
    fn test_space_and_colon_replaced() {
        let identity = HostIdentity::new("dev kit 1", "1:2.3");
        let name = file_name("Core", &identity, at(2024, 3, 7, 9, 5, 3), "core");
        assert_eq!(name, "Core-dev-kit-1-1-2.3-2024-3-7-9-5-3.core");
    }

    #[test]
    fn test_other_characters_untouched() {
        let identity = HostIdentity::new("node_A.local", "v2+build#7");
        let name = file_name("Core", &identity, at(2023, 12, 31, 23, 59, 59), "core");
        assert_eq!(name, "Core-node_A.local-v2+build#7-2023-12-31-23-59-59.core");
    }

    #[test]
    fn test_missing_time_omits_date() {
        let identity = HostIdentity::new("board", "v1");
        assert_eq!(file_name("Core", &identity, None, "core"), "Core-board-v1.core");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a b:c::d"), "a-b-c--d");
        assert_eq!(sanitize("plain"), "plain");
    }
}
