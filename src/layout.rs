//! Fixed-size GIA header and footer records.
//!
//! ```text
//! offset  size  field
//!      0     4  file_len      total length - 4
//!      4     4  file_ver      preserved verbatim
//!      8     4  magic_num     HEAD_MAGIC
//!     12     4  file_type     FileType::Gia
//!     16     4  content_len   total length - HEADER_SIZE - FOOTER_SIZE
//!   20..N-4     body
//!    N-4     4  magic_num     TAIL_MAGIC
//! ```
//!
//! # Endianness
//! Every field is a big-endian `u32`.  Decoding never inspects the values;
//! any bit pattern parses, and [`Header::validate`] / [`Footer::validate`]
//! decide whether the record belongs to a well-formed file.

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{self, Read, Write};

use crate::error::FormatError;

// ── Constants ────────────────────────────────────────────────────────────────

pub const HEADER_SIZE: usize = 20;
pub const FOOTER_SIZE: usize = 4;
/// Smallest file that can hold both records.
pub const MIN_FILE_SIZE: usize = HEADER_SIZE + FOOTER_SIZE;

/// `file_len` does not count its own four bytes.
pub const FILE_LEN_EXCLUDED: usize = 4;

pub const HEAD_MAGIC: u32 = 806;
pub const TAIL_MAGIC: u32 = 1657;

/// Present immediately before the terminator in Classic mode files.
pub const CLASSIC_MODE_TAG:    [u8; 2] = [0x20, 0x01];
/// Ends the embedded filename; anchors the mode-tag lookup.
pub const FILENAME_TERMINATOR: [u8; 2] = [0x2A, 0x05];

// ── FileType ─────────────────────────────────────────────────────────────────

/// Container kinds sharing this header layout.  Only [`FileType::Gia`] is
/// accepted; the others are named in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FileType {
    Gip = 1,
    Gil = 2,
    Gia = 3,
    Gir = 4,
}

impl FileType {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(FileType::Gip),
            2 => Some(FileType::Gil),
            3 => Some(FileType::Gia),
            4 => Some(FileType::Gir),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FileType::Gip => "GIP",
            FileType::Gil => "GIL",
            FileType::Gia => "GIA",
            FileType::Gir => "GIR",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub file_len:    u32,
    pub file_ver:    u32,
    pub magic_num:   u32,
    pub file_type:   u32,
    pub content_len: u32,
}

impl Header {
    /// A header describing a well-formed GIA file of `total_len` bytes, or
    /// `None` when `total_len` is below [`MIN_FILE_SIZE`].
    pub fn for_total_len(total_len: u32, file_ver: u32) -> Option<Self> {
        Some(Self {
            file_len:    total_len.checked_sub(FILE_LEN_EXCLUDED as u32)?,
            file_ver,
            magic_num:   HEAD_MAGIC,
            file_type:   FileType::Gia as u32,
            content_len: total_len.checked_sub(MIN_FILE_SIZE as u32)?,
        })
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<BigEndian>(self.file_len)?;
        writer.write_u32::<BigEndian>(self.file_ver)?;
        writer.write_u32::<BigEndian>(self.magic_num)?;
        writer.write_u32::<BigEndian>(self.file_type)?;
        writer.write_u32::<BigEndian>(self.content_len)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            file_len:    reader.read_u32::<BigEndian>()?,
            file_ver:    reader.read_u32::<BigEndian>()?,
            magic_num:   reader.read_u32::<BigEndian>()?,
            file_type:   reader.read_u32::<BigEndian>()?,
            content_len: reader.read_u32::<BigEndian>()?,
        })
    }

    /// Decode the first [`HEADER_SIZE`] bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::TooShort(bytes.len() as u64));
        }
        Ok(Self {
            file_len:    BigEndian::read_u32(&bytes[0..4]),
            file_ver:    BigEndian::read_u32(&bytes[4..8]),
            magic_num:   BigEndian::read_u32(&bytes[8..12]),
            file_type:   BigEndian::read_u32(&bytes[12..16]),
            content_len: BigEndian::read_u32(&bytes[16..20]),
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        BigEndian::write_u32_into(
            &[self.file_len, self.file_ver, self.magic_num, self.file_type, self.content_len],
            &mut out,
        );
        out
    }

    /// Check the header against a file of `total_len` bytes.  Returns the
    /// first violated field, in the order the fields are laid out.
    pub fn validate(&self, total_len: u64) -> Result<(), FormatError> {
        let expected_file_len = total_len.saturating_sub(FILE_LEN_EXCLUDED as u64);
        if self.file_len as u64 != expected_file_len {
            return Err(FormatError::FileLen { found: self.file_len, expected: expected_file_len });
        }
        if self.magic_num != HEAD_MAGIC {
            return Err(FormatError::HeadMagic(self.magic_num));
        }
        if self.file_type != FileType::Gia as u32 {
            return Err(FormatError::FileType(self.file_type));
        }
        let expected_content_len = total_len.saturating_sub(MIN_FILE_SIZE as u64);
        if self.content_len as u64 != expected_content_len {
            return Err(FormatError::ContentLen { found: self.content_len, expected: expected_content_len });
        }
        Ok(())
    }
}

// ── Footer ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub magic_num: u32,
}

impl Footer {
    pub fn new() -> Self {
        Self { magic_num: TAIL_MAGIC }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<BigEndian>(self.magic_num)
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self { magic_num: reader.read_u32::<BigEndian>()? })
    }

    /// Decode the last [`FOOTER_SIZE`] bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < FOOTER_SIZE {
            return Err(FormatError::TooShort(bytes.len() as u64));
        }
        Ok(Self { magic_num: BigEndian::read_u32(&bytes[bytes.len() - FOOTER_SIZE..]) })
    }

    pub fn to_bytes(&self) -> [u8; FOOTER_SIZE] {
        self.magic_num.to_be_bytes()
    }

    pub fn validate(&self) -> Result<(), FormatError> {
        if self.magic_num != TAIL_MAGIC {
            return Err(FormatError::TailMagic(self.magic_num));
        }
        Ok(())
    }
}

impl Default for Footer {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse and validate both records of a whole-file byte region.
pub fn check_records(bytes: &[u8]) -> Result<(Header, Footer), FormatError> {
    if bytes.len() < MIN_FILE_SIZE {
        return Err(FormatError::TooShort(bytes.len() as u64));
    }
    let header = Header::parse(bytes)?;
    header.validate(bytes.len() as u64)?;
    let footer = Footer::parse(bytes)?;
    footer.validate()?;
    Ok((header, footer))
}
