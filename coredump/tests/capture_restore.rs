//! Capture followed by restore against an in-memory volume

mod common;

use common::{payload, slicing_producer, MemoryBlockDevice, TestPlatform};
use coredump::header::read_header;
use coredump::{capture, CaptureOutcome, DumpError, RestoreOptions, RestoreSession, Volume};
use proptest::prelude::*;
use std::fs;

fn captured_volume(sectors: usize, data: &[u8]) -> Volume<MemoryBlockDevice> {
    let mut volume = Volume::open(MemoryBlockDevice::new(512, sectors)).unwrap();
    let mut scratch = vec![0u8; 512];
    let outcome = capture(
        &mut volume,
        &mut scratch,
        &[],
        &mut slicing_producer(data),
        &TestPlatform::default(),
    )
    .unwrap();
    assert_eq!(
        outcome,
        CaptureOutcome::Captured {
            payload_size: data.len() as u64
        }
    );
    volume
}

#[test]
fn test_scenario_200k_payload() {
    let data = payload(200_000);
    let mut volume = captured_volume(1000, &data);

    let mut scratch = vec![0u8; 512];
    let header = read_header(&mut volume, &mut scratch).unwrap().unwrap();
    assert_eq!(header.payload_size, 200_000);
    assert_eq!(header.payload_sectors(512), 391);

    let dir = tempfile::tempdir().unwrap();
    let options = RestoreOptions::in_dir(dir.path());
    let mut percents = Vec::new();
    let mut record = |p: u8| percents.push(p);

    let report = RestoreSession::new(&mut volume, &header, &options)
        .with_progress(&mut record)
        .run()
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(fs::read(&report.path).unwrap(), data);
    assert_eq!(percents, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);

    // Sectors 391..999 untouched, header in 999
    let device = volume.close();
    assert!(device.data[391 * 512..999 * 512].iter().all(|&b| b == 0));
    assert_ne!(&device.data[999 * 512..999 * 512 + 4], &[0u8; 4]);
}

#[test]
fn test_file_name_from_header() {
    let data = payload(10);
    let mut volume = Volume::open(MemoryBlockDevice::new(512, 16)).unwrap();
    let mut scratch = vec![0u8; 512];
    let platform = TestPlatform {
        name: "dev kit 1",
        version: "1:2.3",
        now: 1_700_000_000,
    };
    capture(&mut volume, &mut scratch, &[], &mut slicing_producer(&data), &platform).unwrap();
    let header = read_header(&mut volume, &mut scratch).unwrap().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let options = RestoreOptions::in_dir(dir.path());
    let report = RestoreSession::new(&mut volume, &header, &options).run().unwrap();

    let name = report.path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("Core-dev-kit-1-1-2.3-"), "{}", name);
    assert!(name.ends_with(".core"));
    assert!(!name.contains(' ') && !name.contains(':'));
}

#[test]
fn test_retention_cap_reached() {
    let data = payload(5000);
    let mut volume = captured_volume(64, &data);
    let mut scratch = vec![0u8; 512];
    let header = read_header(&mut volume, &mut scratch).unwrap().unwrap();

    let dir = tempfile::tempdir().unwrap();
    for i in 0..5 {
        fs::write(dir.path().join(format!("Core-old-{}.core", i)), b"old").unwrap();
    }

    let options = RestoreOptions::in_dir(dir.path());
    let result = RestoreSession::new(&mut volume, &header, &options).run();
    assert_eq!(result, Err(DumpError::TooManyRetainedFiles(5)));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 5);
}

#[test]
fn test_retention_below_cap() {
    let data = payload(5000);
    let mut volume = captured_volume(64, &data);
    let mut scratch = vec![0u8; 512];
    let header = read_header(&mut volume, &mut scratch).unwrap().unwrap();

    let dir = tempfile::tempdir().unwrap();
    for i in 0..4 {
        fs::write(dir.path().join(format!("Core-old-{}.core", i)), b"old").unwrap();
    }

    let options = RestoreOptions::in_dir(dir.path());
    let report = RestoreSession::new(&mut volume, &header, &options).run().unwrap();
    assert!(report.is_complete());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 5);
}

#[test]
fn test_destination_directory_created() {
    let data = payload(700);
    let mut volume = captured_volume(16, &data);
    let mut scratch = vec![0u8; 512];
    let header = read_header(&mut volume, &mut scratch).unwrap().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("data").join("coredump");
    let options = RestoreOptions::in_dir(&target);
    let report = RestoreSession::new(&mut volume, &header, &options).run().unwrap();

    assert!(report.path.starts_with(&target));
    assert_eq!(fs::read(&report.path).unwrap(), data);
}

#[test]
fn test_read_fault_yields_partial_file() {
    // Two full chunks then a fault inside the third
    let data = payload(512 * 128 * 3);
    let volume = captured_volume(512, &data);
    let mut device = volume.close();
    device.fail_read_at = Some(2 * 128 + 5);
    let mut volume = Volume::open(device).unwrap();

    let mut scratch = vec![0u8; 512];
    let header = read_header(&mut volume, &mut scratch).unwrap().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let options = RestoreOptions::in_dir(dir.path());
    let report = RestoreSession::new(&mut volume, &header, &options).run().unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.bytes_copied, 2 * 512 * 128);
    let written = fs::read(&report.path).unwrap();
    assert_eq!(written, &data[..2 * 512 * 128]);
}

#[cfg(target_os = "linux")]
#[test]
fn test_write_fault_yields_partial_file() {
    let data = payload(200_000);
    let mut volume = captured_volume(1000, &data);
    let mut scratch = vec![0u8; 512];
    let header = read_header(&mut volume, &mut scratch).unwrap().unwrap();

    // Destination name resolves to a device that rejects every write
    let dir = tempfile::tempdir().unwrap();
    let options = RestoreOptions::in_dir(dir.path());
    std::os::unix::fs::symlink("/dev/full", options.path_for(&header)).unwrap();

    let report = RestoreSession::new(&mut volume, &header, &options).run().unwrap();

    assert!(!report.is_complete());
    assert!(report.bytes_copied < report.payload_size);
    assert_eq!(report.payload_size, 200_000);
}

#[test]
fn test_second_capture_keeps_first() {
    let first = payload(3000);
    let mut volume = captured_volume(64, &first);

    let second = vec![0xEEu8; 9000];
    let mut scratch = vec![0u8; 512];
    let outcome = capture(
        &mut volume,
        &mut scratch,
        &[],
        &mut slicing_producer(&second),
        &TestPlatform::default(),
    )
    .unwrap();
    assert_eq!(outcome, CaptureOutcome::AlreadyPending);

    let header = read_header(&mut volume, &mut scratch).unwrap().unwrap();
    assert_eq!(header.payload_size, 3000);

    let dir = tempfile::tempdir().unwrap();
    let options = RestoreOptions::in_dir(dir.path());
    let report = RestoreSession::new(&mut volume, &header, &options).run().unwrap();
    assert_eq!(fs::read(&report.path).unwrap(), first);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_capture_restore_roundtrip(len in 1usize..=512 * 128 * 2 + 700) {
        let data = payload(len);
        let mut volume = captured_volume(600, &data);
        let mut scratch = vec![0u8; 512];
        let header = read_header(&mut volume, &mut scratch).unwrap().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let options = RestoreOptions::in_dir(dir.path());
        let report = RestoreSession::new(&mut volume, &header, &options).run().unwrap();

        prop_assert!(report.is_complete());
        prop_assert_eq!(fs::read(&report.path).unwrap(), data);
    }
}
