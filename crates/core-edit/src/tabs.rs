//! Tab/space conversion over a block of lines.

use core_status::{EdError, Result};
use core_text::{Buffer, LineId, Point};

/// Expand every hard tab in a line to spaces at `tab`-column stops.
fn detab_text(text: &[u8], tab: usize) -> Vec<u8> {
    let tab = tab.max(1);
    let mut out = Vec::with_capacity(text.len());
    let mut col = 0usize;
    for &c in text {
        if c == b'\t' {
            let pad = tab - col % tab;
            out.extend(std::iter::repeat(b' ').take(pad));
            col += pad;
        } else {
            out.push(c);
            col += 1;
        }
    }
    out
}

/// Collapse space runs that reach a tab stop into single tabs, preserving
/// the column of every non-whitespace byte. Single spaces at a stop stay
/// spaces.
fn entab_text(text: &[u8], tab: usize) -> Vec<u8> {
    let tab = tab.max(1);
    let expanded = detab_text(text, tab);
    let mut out = Vec::with_capacity(expanded.len());
    let mut col = 0usize;
    let mut pending = 0usize;
    for &c in &expanded {
        if c == b' ' {
            pending += 1;
            col += 1;
            if col % tab == 0 {
                if pending > 1 {
                    out.push(b'\t');
                } else {
                    out.push(b' ');
                }
                pending = 0;
            }
        } else {
            out.extend(std::iter::repeat(b' ').take(pending));
            pending = 0;
            out.push(c);
            col += 1;
        }
    }
    out.extend(std::iter::repeat(b' ').take(pending));
    out
}

fn block_lines(buf: &Buffer, start: LineId, n: i64) -> Result<Vec<LineId>> {
    if n < 0 {
        return Err(EdError::failure("Invalid line count"));
    }
    let mut ids = Vec::new();
    let mut cur = start;
    for _ in 0..n.max(1) {
        ids.push(cur);
        match buf.next_line(cur) {
            Some(next) => cur = next,
            None => break,
        }
    }
    Ok(ids)
}

/// Convert tabs to spaces on `n` lines starting at the point's line. The
/// point lands at the start of the line past the block.
pub fn detab_lines(buf: &mut Buffer, pt: &mut Point, n: i64, hard_tab: usize) -> Result<()> {
    for id in block_lines(buf, pt.line, n)? {
        let new = detab_text(buf.line_text(id), hard_tab);
        if new != buf.line_text(id) {
            buf.replace_line(id, &new);
        }
        pt.line = id;
    }
    pt.off = 0;
    if let Some(next) = buf.next_line(pt.line) {
        pt.line = next;
    }
    Ok(())
}

/// Convert space runs to tabs on `n` lines starting at the point's line.
pub fn entab_lines(buf: &mut Buffer, pt: &mut Point, n: i64, hard_tab: usize) -> Result<()> {
    for id in block_lines(buf, pt.line, n)? {
        let new = entab_text(buf.line_text(id), hard_tab);
        if new != buf.line_text(id) {
            buf.replace_line(id, &new);
        }
        pt.line = id;
    }
    pt.off = 0;
    if let Some(next) = buf.next_line(pt.line) {
        pt.line = next;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detab_aligns_to_stops() {
        assert_eq!(detab_text(b"\tx", 8), b"        x".to_vec());
        assert_eq!(detab_text(b"ab\tx", 8), b"ab      x".to_vec());
        assert_eq!(detab_text(b"ab\tx", 4), b"ab  x".to_vec());
    }

    #[test]
    fn entab_collapses_runs_crossing_stops() {
        assert_eq!(entab_text(b"ab      cd", 4), b"ab\t\tcd".to_vec());
        // A single space reaching a stop stays a space.
        assert_eq!(entab_text(b"abc x", 4), b"abc x".to_vec());
        // Trailing spaces short of a stop are preserved.
        assert_eq!(entab_text(b"a  ", 8), b"a  ".to_vec());
    }

    #[test]
    fn entab_then_detab_preserves_columns() {
        let original = b"one     two   three";
        let tab = 4;
        let entabbed = entab_text(original, tab);
        assert_eq!(detab_text(&entabbed, tab), original.to_vec());
    }

    #[test]
    fn block_conversion_walks_lines() {
        let mut b = Buffer::new("t");
        b.set_text(b"\ta\n\tb\n\tc");
        let mut pt = Point::new(b.first_line(), 0);
        detab_lines(&mut b, &mut pt, 2, 4).unwrap();
        assert_eq!(b.contents(), b"    a\n    b\n\tc");
        assert_eq!(pt.line, b.last_line());
    }

    #[test]
    fn entab_lines_round_trip() {
        let mut b = Buffer::new("t");
        b.set_text(b"        x");
        let mut pt = Point::new(b.first_line(), 0);
        entab_lines(&mut b, &mut pt, 1, 8).unwrap();
        assert_eq!(b.contents(), b"\tx");
    }
}
