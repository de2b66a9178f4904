//! Dump Header Format
//!
//! Fixed-size record in the volume's last sector. Its magic is the
//! cross-reboot handoff: present means "one unconsumed payload of
//! `payload_size` bytes starts at sector 0".
//!
//! # Binary Format
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0x00    4     Magic 0x434f5245 (little-endian u32)
//! 0x04    4     Reserved
//! 0x08    8     Capture time, seconds since epoch (little-endian i64)
//! 0x10    8     Payload size in bytes (little-endian u64)
//! 0x18    64    Host name (UTF-8, NUL padded)
//! 0x58    64    Version string (UTF-8, NUL padded)
//! 0x98    4     CRC32 of header (offset 0x00-0x97)
//! 0x9C    4     Reserved
//! ```
//!
//! The remainder of the sector is zero.

use crate::error::{DumpError, Result};
use crate::volume::Volume;
use gpt_disk_io::BlockIo;
use log::warn;

/// Header magic marking a pending dump
pub const MAGIC: u32 = 0x434f_5245;

/// Encoded header size in bytes
pub const HEADER_SIZE: usize = 0xA0;

/// Maximum stored length of each identity string
pub const MAX_IDENTITY_LEN: usize = 64;

const CAPTURED_AT: usize = 0x08;
const PAYLOAD_SIZE: usize = 0x10;
const HOST_NAME: usize = 0x18;
const VERSION: usize = 0x58;
const CRC: usize = 0x98;

/// Host name and version string of the system that crashed
#[derive(Clone, PartialEq, Eq)]
pub struct HostIdentity {
    name: [u8; MAX_IDENTITY_LEN],
    name_len: usize,
    version: [u8; MAX_IDENTITY_LEN],
    version_len: usize,
}

impl HostIdentity {
    /// Build an identity, truncating each string to fit the header
    pub fn new(name: &str, version: &str) -> Self {
        let mut identity = Self {
            name: [0u8; MAX_IDENTITY_LEN],
            name_len: 0,
            version: [0u8; MAX_IDENTITY_LEN],
            version_len: 0,
        };
        identity.name_len = store(&mut identity.name, name);
        identity.version_len = store(&mut identity.version, version);
        identity
    }

    /// Host name
    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len]).unwrap_or("")
    }

    /// Version string
    pub fn version(&self) -> &str {
        core::str::from_utf8(&self.version[..self.version_len]).unwrap_or("")
    }
}

impl core::fmt::Debug for HostIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HostIdentity")
            .field("name", &self.name())
            .field("version", &self.version())
            .finish()
    }
}

/// Copy `s` into `field`, leaving a NUL terminator and cutting on a char boundary
fn store(field: &mut [u8; MAX_IDENTITY_LEN], s: &str) -> usize {
    let mut len = s.len().min(MAX_IDENTITY_LEN - 1);
    while !s.is_char_boundary(len) {
        len -= 1;
    }
    field[..len].copy_from_slice(&s.as_bytes()[..len]);
    len
}

/// Parse a NUL padded identity field
fn load(bytes: &[u8]) -> ([u8; MAX_IDENTITY_LEN], usize) {
    let mut field = [0u8; MAX_IDENTITY_LEN];
    let len = bytes
        .iter()
        .take(MAX_IDENTITY_LEN - 1)
        .position(|&b| b == 0)
        .unwrap_or(MAX_IDENTITY_LEN - 1);
    field[..len].copy_from_slice(&bytes[..len]);

    // Drop a torn multi-byte tail rather than reject the whole header
    let valid = match core::str::from_utf8(&field[..len]) {
        Ok(_) => len,
        Err(e) => e.valid_up_to(),
    };
    field[valid..].fill(0);
    (field, valid)
}

/// Metadata of a pending dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpHeader {
    /// Who crashed
    pub identity: HostIdentity,
    /// Capture time, seconds since the Unix epoch
    pub captured_at: i64,
    /// Payload length in bytes
    pub payload_size: u64,
}

impl DumpHeader {
    /// Create a header for a freshly captured payload
    pub fn new(identity: HostIdentity, captured_at: i64, payload_size: u64) -> Self {
        Self {
            identity,
            captured_at,
            payload_size,
        }
    }

    /// Sectors occupied by the payload
    pub fn payload_sectors(&self, sector_size: usize) -> u64 {
        self.payload_size.div_ceil(sector_size as u64)
    }

    /// Serialize into the front of `block`, zeroing the rest of it
    pub fn encode(&self, block: &mut [u8]) -> Result<()> {
        if block.len() < HEADER_SIZE {
            return Err(DumpError::ShortBuffer);
        }
        block.fill(0);

        block[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        block[CAPTURED_AT..CAPTURED_AT + 8].copy_from_slice(&self.captured_at.to_le_bytes());
        block[PAYLOAD_SIZE..PAYLOAD_SIZE + 8].copy_from_slice(&self.payload_size.to_le_bytes());

        let name = self.identity.name().as_bytes();
        block[HOST_NAME..HOST_NAME + name.len()].copy_from_slice(name);
        let version = self.identity.version().as_bytes();
        block[VERSION..VERSION + version.len()].copy_from_slice(version);

        let crc = crc32(&block[..CRC]);
        block[CRC..CRC + 4].copy_from_slice(&crc.to_le_bytes());
        Ok(())
    }

    /// Parse a header sector
    ///
    /// Returns `InvalidHeader` when the magic is missing or the checksum does
    /// not match. Callers treat that as "no pending dump".
    pub fn decode(block: &[u8]) -> Result<Self> {
        if block.len() < HEADER_SIZE {
            return Err(DumpError::InvalidHeader);
        }
        if read_u32(block, 0) != MAGIC {
            return Err(DumpError::InvalidHeader);
        }

        let stored_crc = read_u32(block, CRC);
        let computed_crc = crc32(&block[..CRC]);
        if stored_crc != computed_crc {
            warn!(
                "coredump: header checksum mismatch ({:#010x} != {:#010x}), ignoring",
                stored_crc, computed_crc
            );
            return Err(DumpError::InvalidHeader);
        }

        let (name, name_len) = load(&block[HOST_NAME..HOST_NAME + MAX_IDENTITY_LEN]);
        let (version, version_len) = load(&block[VERSION..VERSION + MAX_IDENTITY_LEN]);

        Ok(Self {
            identity: HostIdentity {
                name,
                name_len,
                version,
                version_len,
            },
            captured_at: read_u64(block, CAPTURED_AT) as i64,
            payload_size: read_u64(block, PAYLOAD_SIZE),
        })
    }
}

/// Reset the magic in an already-read header sector
pub fn clear_magic(block: &mut [u8]) {
    block[0..4].fill(0);
}

/// Read the header sector into `block` and decode it; `None` when absent
pub fn read_header<B: BlockIo>(volume: &mut Volume<B>, block: &mut [u8]) -> Result<Option<DumpHeader>> {
    volume.read_header_block(block)?;
    match DumpHeader::decode(block) {
        Ok(header) => Ok(Some(header)),
        Err(DumpError::InvalidHeader) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Encode `header` into `block` and persist it in the header sector
pub fn write_header<B: BlockIo>(volume: &mut Volume<B>, block: &mut [u8], header: &DumpHeader) -> Result<()> {
    header.encode(block)?;
    volume.write_header_block(block)
}

/// Clear the magic of the header held in `block` and persist it
pub fn clear_header<B: BlockIo>(volume: &mut Volume<B>, block: &mut [u8]) -> Result<()> {
    clear_magic(block);
    volume.write_header_block(block)
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

/// CRC32 (IEEE 802.3), table built at compile time
fn crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = generate_crc32_table();

    let mut crc = 0xFFFF_FFFF;
    for &byte in data {
        let index = ((crc ^ byte as u32) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

const fn generate_crc32_table() -> [u32; 256] {
    const POLYNOMIAL: u32 = 0xEDB8_8320;
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ POLYNOMIAL } else { crc >> 1 };
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}
