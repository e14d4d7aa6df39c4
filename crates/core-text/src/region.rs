//! Regions: contiguous byte spans of a buffer.
//!
//! A region is a starting point, a byte size (delimiters counted), and the
//! number of delimiters crossed. Derivation forms that need the character
//! classifier (word regions, fences) live in `core-edit`; the structural
//! forms are here.

use core_status::{EdError, Result};

use crate::buffer::Buffer;
use crate::mark::MarkId;
use crate::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Earliest position of the span.
    pub start: Point,
    /// Bytes in the span, line delimiters included.
    pub size: usize,
    /// Delimiters crossed by the span.
    pub line_count: usize,
}

impl Region {
    /// Span between the point and a mark, normalized forward.
    pub fn from_mark(buf: &Buffer, pt: Point, id: MarkId) -> Result<Region> {
        let mark = buf
            .mark(id)
            .filter(|m| !m.is_hidden())
            .ok_or_else(|| EdError::failure(format!("Mark '{}' not set", id as char)))?;
        let mpt = Point::new(mark.line, mark.offset());
        let (start, size) = match buf.bytes_between(pt, mpt) {
            Some(n) => (pt, n),
            None => {
                let n = buf
                    .bytes_between(mpt, pt)
                    .ok_or_else(|| EdError::failure("Mark not reachable"))?;
                (mpt, n)
            }
        };
        let line_count = count_delims(buf, start, size);
        Ok(Region {
            start,
            size,
            line_count,
        })
    }

    /// Whole-line span: the current line plus `n - 1` following lines when
    /// `n > 0` (delimiters included), or `|n|` preceding lines when
    /// `n < 0`. `n == 0` spans just the current line without its delimiter.
    pub fn lines(buf: &Buffer, at: Point, n: i64) -> Result<Region> {
        if n == 0 {
            return Ok(Region {
                start: Point::new(at.line, 0),
                size: buf.line_used(at.line),
                line_count: 0,
            });
        }
        if n > 0 {
            let start = Point::new(at.line, 0);
            let mut size = 0;
            let mut line_count = 0;
            let mut cur = at.line;
            for _ in 0..n {
                size += buf.line_used(cur);
                // A short buffer yields what is there.
                match buf.next_line(cur) {
                    Some(next) => {
                        size += 1;
                        line_count += 1;
                        cur = next;
                    }
                    None => break,
                }
            }
            Ok(Region {
                start,
                size,
                line_count,
            })
        } else {
            let mut first = at.line;
            let mut line_count = 0;
            for _ in 0..(-n) {
                match buf.prev_line(first) {
                    Some(prev) => {
                        first = prev;
                        line_count += 1;
                    }
                    None => break,
                }
            }
            let start = Point::new(first, 0);
            let end = Point::new(at.line, buf.line_used(at.line));
            let size = buf
                .bytes_between(start, end)
                .expect("backward line walk is forward-reachable");
            Ok(Region {
                start,
                size,
                line_count,
            })
        }
    }

    /// Point to end of line (or across `n - 1` delimiters when the point
    /// already sits at line end).
    pub fn to_line_break(buf: &Buffer, at: Point) -> Region {
        let used = buf.line_used(at.line);
        if at.off < used {
            Region {
                start: at,
                size: used - at.off,
                line_count: 0,
            }
        } else {
            match buf.next_line(at.line) {
                Some(next) => Region {
                    start: at,
                    size: 1 + buf.line_used(next),
                    line_count: 1,
                },
                None => Region {
                    start: at,
                    size: 0,
                    line_count: 0,
                },
            }
        }
    }

    /// Materialize the region's bytes.
    pub fn text(&self, buf: &Buffer) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size);
        let mut pt = self.start;
        for _ in 0..self.size {
            match buf.char_at(pt) {
                Some(c) => out.push(c),
                None => break,
            }
            buf.forw_char(&mut pt);
        }
        out
    }
}

fn count_delims(buf: &Buffer, start: Point, size: usize) -> usize {
    let mut n = 0;
    let mut pt = start;
    for _ in 0..size {
        if buf.char_at(pt) == Some(b'\n') {
            n += 1;
        }
        if !buf.forw_char(&mut pt) {
            break;
        }
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mark::Mark;

    fn buf(text: &str) -> Buffer {
        let mut b = Buffer::new("t");
        b.set_text(text.as_bytes());
        b
    }

    #[test]
    fn mark_region_normalizes_direction() {
        let mut b = buf("abc\ndef");
        let second = b.next_line(b.first_line()).unwrap();
        b.set_mark(Mark::new(b' ', b.first_line(), 1, 0));
        let pt = Point::new(second, 2);
        let r = Region::from_mark(&b, pt, b' ').unwrap();
        assert_eq!(r.start, Point::new(b.first_line(), 1));
        assert_eq!(r.size, 5);
        assert_eq!(r.line_count, 1);
        assert_eq!(r.text(&b), b"bc\nde");
    }

    #[test]
    fn line_region_forward_includes_delimiters() {
        let b = buf("aa\nbb\ncc");
        let at = Point::new(b.first_line(), 1);
        let r = Region::lines(&b, at, 2).unwrap();
        assert_eq!(r.start.off, 0);
        assert_eq!(r.size, 6);
        assert_eq!(r.text(&b), b"aa\nbb\n");
    }

    #[test]
    fn line_region_backward() {
        let b = buf("aa\nbb\ncc");
        let last = b.last_line();
        let r = Region::lines(&b, Point::new(last, 0), -2).unwrap();
        assert_eq!(r.start, Point::new(b.first_line(), 0));
        assert_eq!(r.text(&b), b"aa\nbb\ncc");
    }

    #[test]
    fn zero_spans_current_line_without_delim() {
        let b = buf("aa\nbb");
        let r = Region::lines(&b, Point::new(b.first_line(), 1), 0).unwrap();
        assert_eq!(r.text(&b), b"aa");
    }

    #[test]
    fn to_line_break_stops_at_eol() {
        let b = buf("abcd\nef");
        let r = Region::to_line_break(&b, Point::new(b.first_line(), 1));
        assert_eq!(r.text(&b), b"bcd");
        let r2 = Region::to_line_break(&b, Point::new(b.first_line(), 4));
        assert_eq!(r2.text(&b), b"\nef");
    }
}
