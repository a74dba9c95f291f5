//! In-place editing of a resizable byte region.
//!
//! [`EditBuffer`] is the single seam: anything that can report its length,
//! expose its bytes mutably, and change its length can have a [`Plan`]
//! applied to it.  Two backings ship with the crate:
//!
//! | Backing | Resize | Failure mid-edit |
//! |---------|--------|------------------|
//! | `Vec<u8>` | `Vec::resize` | cannot fail after validation |
//! | [`MappedFile`] | unmap, `set_len`, remap | file left half-edited |
//!
//! # Ordering
//! Growing happens *before* the tail is shifted forward so the destination
//! range exists; shrinking happens *after* the tail is shifted backward so no
//! live byte is truncated before it moves.  Both shifts use
//! [`slice::copy_within`], which has `memmove` semantics, so the overlapping
//! source and destination ranges are safe.

mod mapped;

pub use mapped::MappedFile;

use std::io;

use tracing::trace;

use crate::layout::CLASSIC_MODE_TAG;
use crate::plan::Plan;

// ── EditBuffer ───────────────────────────────────────────────────────────────

pub trait EditBuffer {
    fn len(&self) -> usize;

    fn as_mut_bytes(&mut self) -> &mut [u8];

    /// Change the backing length.  New bytes past the old end are zeroed.
    fn resize(&mut self, new_len: usize) -> io::Result<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grow by `by` bytes, then move `[at, old_len)` to `[at + by, new_len)`.
    /// The bytes `[at, at + by)` keep their old contents until overwritten.
    fn grow_and_shift_forward(&mut self, at: usize, by: usize) -> io::Result<()> {
        let old_len = self.len();
        if at > old_len {
            return Err(out_of_range(format!("shift start {at} is past the end ({old_len})")));
        }
        let new_len = old_len
            .checked_add(by)
            .ok_or_else(|| out_of_range(format!("cannot grow {old_len} bytes by {by}")))?;
        self.resize(new_len)?;
        self.as_mut_bytes().copy_within(at..old_len, at + by);
        trace!(at, by, old_len, new_len, "shifted tail forward");
        Ok(())
    }

    /// Move `[at, old_len)` to `[at - by, old_len - by)`, then shrink by `by`.
    fn shift_backward_and_shrink(&mut self, at: usize, by: usize) -> io::Result<()> {
        let old_len = self.len();
        if at > old_len {
            return Err(out_of_range(format!("shift start {at} is past the end ({old_len})")));
        }
        if by > at {
            return Err(out_of_range(format!("cannot shift {by} bytes back from offset {at}")));
        }
        self.as_mut_bytes().copy_within(at..old_len, at - by);
        self.resize(old_len - by)?;
        trace!(at, by, old_len, new_len = old_len - by, "shifted tail backward");
        Ok(())
    }

    /// Overwrite `bytes.len()` bytes at `offset`.
    fn write_at(&mut self, offset: usize, bytes: &[u8]) -> io::Result<()> {
        let len = self.len();
        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= len)
            .ok_or_else(|| out_of_range(format!("write of {} bytes at {offset} exceeds length {len}", bytes.len())))?;
        self.as_mut_bytes()[offset..end].copy_from_slice(bytes);
        Ok(())
    }
}

impl EditBuffer for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn as_mut_bytes(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }

    fn resize(&mut self, new_len: usize) -> io::Result<()> {
        Vec::resize(self, new_len, 0);
        Ok(())
    }
}

fn out_of_range(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg)
}

// ── InPlaceEditor ────────────────────────────────────────────────────────────

/// Apply `plan` to `buf`, which must hold the whole file the plan was made
/// for.  A [`Plan::NoOp`] leaves `buf` untouched.
pub fn apply_in_place<B: EditBuffer + ?Sized>(buf: &mut B, plan: &Plan) -> io::Result<()> {
    let edit = match plan {
        Plan::NoOp    => return Ok(()),
        Plan::Edit(e) => e,
    };
    if buf.len() != edit.old_len {
        return Err(out_of_range(format!(
            "plan expects {} bytes, buffer holds {}", edit.old_len, buf.len()
        )));
    }

    if edit.inserts_tag() {
        buf.grow_and_shift_forward(edit.terminator_index, edit.shift())?;
        buf.write_at(edit.anchor_index, &CLASSIC_MODE_TAG)?;
    } else {
        buf.shift_backward_and_shrink(edit.terminator_index, edit.shift())?;
    }
    buf.write_at(0, &edit.new_header.to_bytes())?;
    debug_assert_eq!(buf.len(), edit.new_len);
    Ok(())
}
