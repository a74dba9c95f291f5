//! Copy-based conversion: stream a converted image of `src` into any writer.
//!
//! The source is never mutated and the destination is built front to back,
//! so unlike the in-place editor there is no resize or overlap hazard.
//!
//! Output of an [`Edit`](crate::plan::Edit):
//!
//! ```text
//! new header | src[HEADER_SIZE..anchor] | tag (to Classic only) | src[terminator..]
//! ```

use std::io::{self, Write};

use crate::layout::{CLASSIC_MODE_TAG, HEADER_SIZE};
use crate::plan::Plan;

pub fn rewrite<W: Write>(src: &[u8], plan: &Plan, mut out: W) -> io::Result<()> {
    let edit = match plan {
        Plan::NoOp    => return out.write_all(src),
        Plan::Edit(e) => e,
    };
    if src.len() != edit.old_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("plan expects {} source bytes, got {}", edit.old_len, src.len()),
        ));
    }

    edit.new_header.write(&mut out)?;
    out.write_all(&src[HEADER_SIZE..edit.anchor_index])?;
    if edit.inserts_tag() {
        out.write_all(&CLASSIC_MODE_TAG)?;
    }
    out.write_all(&src[edit.terminator_index..])?;
    Ok(())
}

/// Convenience wrapper collecting the output in memory.
pub fn rewrite_to_vec(src: &[u8], plan: &Plan) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(plan.output_len(src.len()));
    rewrite(src, plan, &mut out)?;
    Ok(out)
}
