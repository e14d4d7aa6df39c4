//! n-counted edit primitives over the buffer store.
//!
//! Every operation here takes an explicit count with the editor's count
//! conventions: default 1, negative reverses direction (or selects literal
//! behavior for inserts), zero usually means "operate on the region" or
//! "hold point". The insert commands all funnel through `insert_text`,
//! which is where overwrite/replace modes and the hold-point and
//! literal-newline policies live.

pub mod chars;
pub mod insert;
pub mod kill;
pub mod tabs;
pub mod word;
pub mod wrap;

pub use chars::CharClass;
pub use insert::{insert_tab, insert_text, InsertStyle};
pub use kill::{kdc_bytes, kdc_lines, kdc_region, yank, EditDisp};
pub use word::{back_word, case_lines, case_words, forw_word, CaseMode};

use core_status::{EdError, Result};
use core_text::{Buffer, Point};

/// Fence matching: from an opening or closing bracket at (or before) the
/// point, scan to its partner and return the matching position. Supported
/// fence pairs: `()`, `[]`, `{}`, `<>`.
pub fn match_fence(buf: &Buffer, at: Point) -> Result<Point> {
    let fence = buf
        .char_at(at)
        .ok_or_else(|| EdError::failure("No fence character at point"))?;
    let (other, forward) = match fence {
        b'(' => (b')', true),
        b'[' => (b']', true),
        b'{' => (b'}', true),
        b'<' => (b'>', true),
        b')' => (b'(', false),
        b']' => (b'[', false),
        b'}' => (b'{', false),
        b'>' => (b'<', false),
        _ => return Err(EdError::failure("No fence character at point")),
    };
    let mut depth = 1i32;
    let mut pt = at;
    loop {
        let moved = if forward {
            buf.forw_char(&mut pt)
        } else {
            buf.back_char(&mut pt)
        };
        if !moved {
            return Err(EdError::failure("Unbalanced fence"));
        }
        match buf.char_at(pt) {
            Some(c) if c == fence => depth += 1,
            Some(c) if c == other => {
                depth -= 1;
                if depth == 0 {
                    return Ok(pt);
                }
            }
            _ => {}
        }
    }
}
