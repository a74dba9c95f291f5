//! Mode detection: find the filename terminator and look for the Classic
//! mode tag directly in front of it.
//!
//! The scan runs backward over the body only (`[HEADER_SIZE, len - FOOTER_SIZE)`),
//! so the last terminator before the footer wins even when the filename or
//! other body data contains earlier `2A 05` pairs.

use std::fmt;
use std::str::FromStr;

use crate::error::FormatError;
use crate::layout::{CLASSIC_MODE_TAG, FILENAME_TERMINATOR, FOOTER_SIZE, HEADER_SIZE};

// ── AssetMode ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetMode {
    Beyond,
    Classic,
}

impl AssetMode {
    pub fn name(self) -> &'static str {
        match self {
            AssetMode::Beyond  => "Beyond",
            AssetMode::Classic => "Classic",
        }
    }

    pub fn other(self) -> Self {
        match self {
            AssetMode::Beyond  => AssetMode::Classic,
            AssetMode::Classic => AssetMode::Beyond,
        }
    }
}

impl fmt::Display for AssetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AssetMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beyond"  => Ok(AssetMode::Beyond),
            "classic" => Ok(AssetMode::Classic),
            _         => Err(format!("unknown asset mode '{s}'")),
        }
    }
}

// ── Detection ────────────────────────────────────────────────────────────────

/// Marker positions for one file at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub mode:             AssetMode,
    pub terminator_index: usize,
    /// Start of the mode tag in Classic files; equal to `terminator_index`
    /// in Beyond files.
    pub anchor_index:     usize,
}

impl Detection {
    pub fn has_tag(&self) -> bool {
        self.anchor_index != self.terminator_index
    }
}

pub fn detect(bytes: &[u8]) -> Result<Detection, FormatError> {
    if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
        return Err(FormatError::TooShort(bytes.len() as u64));
    }
    let body = &bytes[HEADER_SIZE..bytes.len() - FOOTER_SIZE];
    let terminator_index = body
        .windows(FILENAME_TERMINATOR.len())
        .rposition(|w| w == FILENAME_TERMINATOR)
        .map(|i| i + HEADER_SIZE)
        .ok_or(FormatError::NoTerminator)?;

    let tagged = terminator_index
        .checked_sub(CLASSIC_MODE_TAG.len())
        .filter(|&tag_index| tag_index >= HEADER_SIZE)
        .filter(|&tag_index| bytes[tag_index..terminator_index] == CLASSIC_MODE_TAG);

    Ok(match tagged {
        Some(tag_index) => Detection {
            mode:             AssetMode::Classic,
            terminator_index,
            anchor_index:     tag_index,
        },
        None => Detection {
            mode:             AssetMode::Beyond,
            terminator_index,
            anchor_index:     terminator_index,
        },
    })
}
