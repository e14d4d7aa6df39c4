//! The insert funnel.
//!
//! All text-inserting commands compose their text first (argument
//! concatenation or a format string, done by the caller) and push it
//! through `insert_text`, which applies the count conventions:
//! `n == 0` holds the point at the insertion start, `n < 0` inserts newline
//! bytes literally instead of splitting lines, and `|n|` is the repeat
//! count. Overwrite and replace modes divert single bytes through a
//! delete-then-insert path.

use core_status::Result;
use core_text::{Buffer, Mark, Point};
use tracing::trace;

/// Temporary mark used to hold the point across an `n == 0` insert. Marks
/// do not slide on inserts at their own offset, which is exactly the
/// hold-point behavior.
const WORK_MARK: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertStyle {
    Insert,
    /// Replace the byte at point unless it is a line delimiter.
    Overwrite,
    /// Replace unconditionally until end of buffer.
    Replace,
}

/// Insert `text` `|n|` times at the point (n == 0 inserts once). Returns
/// the number of bytes inserted.
pub fn insert_text(
    buf: &mut Buffer,
    pt: &mut Point,
    text: &[u8],
    n: i64,
    style: InsertStyle,
) -> Result<usize> {
    if text.is_empty() {
        return Ok(0);
    }
    let reps = if n == 0 { 1 } else { n.unsigned_abs() as usize };
    let literal_nl = n < 0;
    let hold = n == 0;
    if hold {
        buf.set_mark(Mark::new(WORK_MARK, pt.line, pt.off, 0));
    }

    let mut inserted = 0usize;
    for _ in 0..reps {
        if literal_nl {
            inserted += insert_run(buf, pt, text, style)?;
        } else {
            let mut first = true;
            for seg in text.split(|&b| b == b'\n') {
                if !first {
                    buf.insert_newline(pt);
                    inserted += 1;
                }
                first = false;
                inserted += insert_run(buf, pt, seg, style)?;
            }
        }
    }

    if hold {
        if let Some(mark) = buf.mark(WORK_MARK).copied() {
            *pt = Point::new(mark.line, mark.offset());
        }
        buf.delete_mark(WORK_MARK);
    }
    trace!(target: "edit.insert", n, bytes = inserted, "insert_text");
    Ok(inserted)
}

/// Insert a newline-free run under the given style.
fn insert_run(buf: &mut Buffer, pt: &mut Point, seg: &[u8], style: InsertStyle) -> Result<usize> {
    match style {
        InsertStyle::Insert => {
            buf.insert_slice(pt, seg);
            Ok(seg.len())
        }
        InsertStyle::Overwrite => {
            for &b in seg {
                match buf.char_at(*pt) {
                    Some(c) if c != b'\n' => {
                        buf.delete_at(pt, 1)?;
                    }
                    _ => {}
                }
                buf.insert_slice(pt, &[b]);
            }
            Ok(seg.len())
        }
        InsertStyle::Replace => {
            for &b in seg {
                if buf.char_at(*pt).is_some() {
                    buf.delete_at(pt, 1)?;
                }
                buf.insert_slice(pt, &[b]);
            }
            Ok(seg.len())
        }
    }
}

/// Display column of the point, expanding hard tabs.
pub fn current_column(buf: &Buffer, pt: Point, hard_tab: usize) -> usize {
    let tab = hard_tab.max(1);
    let text = buf.line_text(pt.line);
    let mut col = 0usize;
    for &c in &text[..pt.off.min(text.len())] {
        col = if c == b'\t' {
            col + tab - col % tab
        } else {
            col + 1
        };
    }
    col
}

/// Insert `n` tabs: a literal tab byte when the soft tab size is zero,
/// otherwise spaces out to the next soft tab stop.
pub fn insert_tab(
    buf: &mut Buffer,
    pt: &mut Point,
    n: i64,
    soft_tab: usize,
    hard_tab: usize,
) -> Result<()> {
    let reps = n.max(1) as usize;
    for _ in 0..reps {
        if soft_tab == 0 {
            buf.insert_char(pt, b'\t', 1);
        } else {
            let col = current_column(buf, *pt, hard_tab);
            let pad = soft_tab - col % soft_tab;
            buf.insert_char(pt, b' ', pad);
        }
    }
    Ok(())
}
