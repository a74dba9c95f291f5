use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::layout::{FileType, FOOTER_SIZE, HEAD_MAGIC, HEADER_SIZE, TAIL_MAGIC};

/// The specific layout rule a rejected file breaks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("file is {0} bytes, smaller than the {HEADER_SIZE}-byte header plus {FOOTER_SIZE}-byte footer")]
    TooShort(u64),
    #[error("header file_len is {found}, expected {expected}")]
    FileLen { found: u32, expected: u64 },
    #[error("header magic_num is {0}, expected {HEAD_MAGIC}")]
    HeadMagic(u32),
    #[error("header file_type is {}, expected {} (GIA)", describe_type(.0), FileType::Gia as u32)]
    FileType(u32),
    #[error("header content_len is {found}, expected {expected}")]
    ContentLen { found: u32, expected: u64 },
    #[error("footer magic_num is {0}, expected {TAIL_MAGIC}")]
    TailMagic(u32),
    #[error("no filename terminator before the footer")]
    NoTerminator,
    #[error("converted length does not fit the 32-bit header fields")]
    LengthOverflow,
}

fn describe_type(raw: &u32) -> String {
    match FileType::from_u32(*raw) {
        Some(t) => format!("{raw} ({t})"),
        None    => raw.to_string(),
    }
}

#[derive(Error, Debug)]
pub enum GiaError {
    #[error("Input file is not a valid GIA file: \"{}\" ({reason})", .path.display())]
    InvalidFormat { path: PathBuf, reason: FormatError },
    #[error("\"{}\": {source}", .path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
}

impl GiaError {
    pub fn invalid(path: &Path, reason: FormatError) -> Self {
        GiaError::InvalidFormat { path: path.to_owned(), reason }
    }

    pub fn io(path: &Path, source: io::Error) -> Self {
        GiaError::Io { path: path.to_owned(), source }
    }

    /// Process exit status for the CLI.  Usage errors (2) never reach here.
    pub fn exit_code(&self) -> u8 {
        match self {
            GiaError::InvalidFormat { .. } => 1,
            GiaError::Io { .. }            => 1,
        }
    }

    pub fn format_reason(&self) -> Option<&FormatError> {
        match self {
            GiaError::InvalidFormat { reason, .. } => Some(reason),
            GiaError::Io { .. }                    => None,
        }
    }
}
