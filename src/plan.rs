//! Layout planning: turn a detection and a target mode into the exact byte
//! edit.  Pure; the editors and the rewriter only ever execute a [`Plan`].

use crate::detect::{AssetMode, Detection};
use crate::error::FormatError;
use crate::layout::{Header, CLASSIC_MODE_TAG};

const TAG_LEN: isize = CLASSIC_MODE_TAG.len() as isize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Source already in the target mode.
    NoOp,
    Edit(Edit),
}

/// Insert or remove the mode tag at `anchor_index` and rewrite the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    pub new_header:           Header,
    /// `+TAG_LEN` when inserting, `-TAG_LEN` when removing.
    pub delta:                isize,
    pub anchor_index:         usize,
    pub terminator_index:     usize,
    pub new_terminator_index: usize,
    pub old_len:              usize,
    pub new_len:              usize,
    pub to_mode:              AssetMode,
}

impl Edit {
    pub fn inserts_tag(&self) -> bool {
        self.delta > 0
    }

    pub fn shift(&self) -> usize {
        self.delta.unsigned_abs()
    }
}

impl Plan {
    pub fn is_noop(&self) -> bool {
        matches!(self, Plan::NoOp)
    }

    /// Length of the file after the plan is applied.
    pub fn output_len(&self, old_len: usize) -> usize {
        match self {
            Plan::NoOp    => old_len,
            Plan::Edit(e) => e.new_len,
        }
    }
}

pub fn plan(
    header:    &Header,
    total_len: usize,
    detection: &Detection,
    to_mode:   AssetMode,
) -> Result<Plan, FormatError> {
    if detection.mode == to_mode {
        return Ok(Plan::NoOp);
    }

    let delta = match to_mode {
        AssetMode::Classic => TAG_LEN,
        AssetMode::Beyond  => -TAG_LEN,
    };
    let delta32 = delta as i32;

    let file_len = header.file_len
        .checked_add_signed(delta32)
        .ok_or(FormatError::LengthOverflow)?;
    let content_len = header.content_len
        .checked_add_signed(delta32)
        .ok_or(FormatError::LengthOverflow)?;
    let new_terminator_index = detection.terminator_index
        .checked_add_signed(delta)
        .ok_or(FormatError::LengthOverflow)?;
    let new_len = total_len
        .checked_add_signed(delta)
        .ok_or(FormatError::LengthOverflow)?;

    Ok(Plan::Edit(Edit {
        new_header: Header { file_len, content_len, ..*header },
        delta,
        anchor_index: detection.anchor_index,
        terminator_index: detection.terminator_index,
        new_terminator_index,
        old_len: total_len,
        new_len,
        to_mode,
    }))
}
