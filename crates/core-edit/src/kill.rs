//! Kill, delete, and copy: the three dispositions of an edit range.
//!
//! Kill saves to the kill ring and deletes; delete saves to the delete
//! ring and deletes; copy saves without deleting. Consecutive kills from
//! one spot accumulate into a single ring entry, appending when the range
//! ran forward and prepending when it ran backward, so a run of `killLine`
//! or backward kills yanks back as one block.

use core_ring::Ring;
use core_status::Result;
use core_text::{Buffer, Point, Region};
use core_value::Datum;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditDisp {
    Kill,
    Delete,
    Copy,
}

/// Store freshly killed/copied bytes, accumulating into the current ring
/// entry when `accum` is set (the previous command was a kill in the same
/// ring).
fn save_bytes(ring: &mut Ring, bytes: &[u8], forward: bool, accum: bool) {
    if accum && !ring.is_empty() {
        let mut top = match ring.top() {
            Some(Datum::Str(s)) => s.clone(),
            _ => Vec::new(),
        };
        if forward {
            top.extend_from_slice(bytes);
        } else {
            let mut merged = bytes.to_vec();
            merged.extend_from_slice(&top);
            top = merged;
        }
        let _ = ring.set_top(Datum::Str(top));
    } else {
        ring.push(Datum::Str(bytes.to_vec()));
    }
}

/// Kill, delete, or copy `n` bytes at the point (negative runs backward).
pub fn kdc_bytes(
    buf: &mut Buffer,
    pt: &mut Point,
    n: i64,
    disp: EditDisp,
    ring: &mut Ring,
    accum: bool,
) -> Result<()> {
    if n == 0 {
        return Ok(());
    }
    match disp {
        EditDisp::Copy => {
            let bytes = peek_bytes(buf, *pt, n)?;
            save_bytes(ring, &bytes, n > 0, accum);
        }
        EditDisp::Kill | EditDisp::Delete => {
            let bytes = buf.delete_at(pt, n)?;
            save_bytes(ring, &bytes, n > 0, accum);
        }
    }
    trace!(target: "edit.kill", n, ?disp, "kdc_bytes");
    Ok(())
}

/// Kill/delete/copy whole lines per the line-count conventions of
/// `Region::lines`.
pub fn kdc_lines(
    buf: &mut Buffer,
    pt: &mut Point,
    n: i64,
    disp: EditDisp,
    ring: &mut Ring,
    accum: bool,
) -> Result<()> {
    let region = Region::lines(buf, *pt, n)?;
    kdc_region(buf, pt, &region, disp, ring, accum, n >= 0)
}

/// Apply a disposition to an arbitrary region. `forward` picks the
/// accumulation direction.
pub fn kdc_region(
    buf: &mut Buffer,
    pt: &mut Point,
    region: &Region,
    disp: EditDisp,
    ring: &mut Ring,
    accum: bool,
    forward: bool,
) -> Result<()> {
    match disp {
        EditDisp::Copy => {
            let bytes = region.text(buf);
            save_bytes(ring, &bytes, forward, accum);
        }
        EditDisp::Kill | EditDisp::Delete => {
            *pt = region.start;
            let bytes = buf.delete_at(pt, region.size as i64)?;
            save_bytes(ring, &bytes, forward, accum);
        }
    }
    Ok(())
}

/// Insert ring entry `n` (0 = most recent, negative earlier) at the point,
/// leaving the point after the inserted text.
pub fn yank(buf: &mut Buffer, pt: &mut Point, ring: &Ring, n: i64) -> Result<usize> {
    let entry = ring.fetch(n)?;
    let bytes = entry.to_bytes();
    let mut first = true;
    for seg in bytes.split(|&b| b == b'\n') {
        if !first {
            buf.insert_newline(pt);
        }
        first = false;
        buf.insert_slice(pt, seg);
    }
    Ok(bytes.len())
}

fn peek_bytes(buf: &Buffer, start: Point, n: i64) -> Result<Vec<u8>> {
    let count = n.unsigned_abs() as usize;
    let mut pt = start;
    if n < 0 {
        for _ in 0..count {
            if !buf.back_char(&mut pt) {
                return Err(core_status::EdError::failure("Copy range exceeds buffer"));
            }
        }
    }
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        match buf.char_at(pt) {
            Some(c) => out.push(c),
            None => return Err(core_status::EdError::failure("Copy range exceeds buffer")),
        }
        buf.forw_char(&mut pt);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_ring::RingName;

    fn setup(text: &str) -> (Buffer, Ring) {
        let mut b = Buffer::new("t");
        b.set_text(text.as_bytes());
        (b, Ring::with_size(RingName::Kill, 0))
    }

    #[test]
    fn forward_kill_saves_and_deletes() {
        let (mut b, mut ring) = setup("hello world");
        let mut pt = Point::new(b.first_line(), 0);
        kdc_bytes(&mut b, &mut pt, 5, EditDisp::Kill, &mut ring, false).unwrap();
        assert_eq!(b.contents(), b" world");
        assert_eq!(ring.top().unwrap(), &Datum::Str(b"hello".to_vec()));
    }

    #[test]
    fn backward_kill_moves_point() {
        let (mut b, mut ring) = setup("hello");
        let mut pt = Point::new(b.first_line(), 5);
        kdc_bytes(&mut b, &mut pt, -3, EditDisp::Kill, &mut ring, false).unwrap();
        assert_eq!(b.contents(), b"he");
        assert_eq!(pt.off, 2);
        assert_eq!(ring.top().unwrap(), &Datum::Str(b"llo".to_vec()));
    }

    #[test]
    fn consecutive_kills_accumulate_forward() {
        let (mut b, mut ring) = setup("abcdef");
        let mut pt = Point::new(b.first_line(), 0);
        kdc_bytes(&mut b, &mut pt, 2, EditDisp::Kill, &mut ring, false).unwrap();
        kdc_bytes(&mut b, &mut pt, 2, EditDisp::Kill, &mut ring, true).unwrap();
        assert_eq!(ring.size(), 1);
        assert_eq!(ring.top().unwrap(), &Datum::Str(b"abcd".to_vec()));
    }

    #[test]
    fn backward_accumulation_prepends() {
        let (mut b, mut ring) = setup("abcdef");
        let mut pt = Point::new(b.first_line(), 6);
        kdc_bytes(&mut b, &mut pt, -2, EditDisp::Kill, &mut ring, false).unwrap();
        kdc_bytes(&mut b, &mut pt, -2, EditDisp::Kill, &mut ring, true).unwrap();
        assert_eq!(ring.top().unwrap(), &Datum::Str(b"cdef".to_vec()));
    }

    #[test]
    fn copy_leaves_buffer_alone() {
        let (mut b, mut ring) = setup("abc");
        let mut pt = Point::new(b.first_line(), 0);
        kdc_bytes(&mut b, &mut pt, 3, EditDisp::Copy, &mut ring, false).unwrap();
        assert_eq!(b.contents(), b"abc");
        assert_eq!(ring.top().unwrap(), &Datum::Str(b"abc".to_vec()));
    }

    #[test]
    fn line_kill_includes_delimiter() {
        let (mut b, mut ring) = setup("one\ntwo\nthree");
        let mut pt = Point::new(b.first_line(), 1);
        kdc_lines(&mut b, &mut pt, 1, EditDisp::Kill, &mut ring, false).unwrap();
        assert_eq!(b.contents(), b"two\nthree");
        assert_eq!(ring.top().unwrap(), &Datum::Str(b"one\n".to_vec()));
    }

    #[test]
    fn yank_restores_multiline_entry() {
        let (mut b, mut ring) = setup("xy");
        ring.push(Datum::Str(b"a\nb".to_vec()));
        let mut pt = Point::new(b.first_line(), 1);
        yank(&mut b, &mut pt, &ring, 0).unwrap();
        assert_eq!(b.contents(), b"xa\nby");
        assert_eq!(pt.line, b.last_line());
        assert_eq!(pt.off, 1);
    }

    #[test]
    fn kill_then_yank_round_trips() {
        let (mut b, mut ring) = setup("abc\ndef\n");
        let mut pt = Point::new(b.first_line(), 3);
        kdc_bytes(&mut b, &mut pt, -3, EditDisp::Delete, &mut ring, false).unwrap();
        assert_eq!(b.contents(), b"\ndef\n");
        assert_eq!(pt, Point::new(b.first_line(), 0));
        yank(&mut b, &mut pt, &ring, 0).unwrap();
        assert_eq!(b.contents(), b"abc\ndef\n");
        assert_eq!(pt.off, 3);
    }
}
