//! The buffer: a chain of lines plus marks, modes, and file metadata.
//!
//! Edit primitives journal each structural change as an `EditStep`; the
//! session drains the journal after a primitive and replays it onto every
//! window face displaying the buffer. Marks are adjusted here, inline,
//! because they belong to the buffer. The mark rule for inserts is strict
//! `>` (text inserted *at* a mark does not push it), the point/face rule is
//! `>=`.

use std::path::PathBuf;

use bitflags::bitflags;
use core_status::{EdError, Result};
use tracing::trace;

use crate::line::{block_size, LineId, LineStore};
use crate::mark::{Mark, MarkId, REGION_MARK};
use crate::{Face, Point};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufFlags: u16 {
        /// Buffer has been read (file contents loaded or text set).
        const ACTIVE    = 1 << 0;
        const CHANGED   = 1 << 1;
        const HIDDEN    = 1 << 2;
        const READ_ONLY = 1 << 3;
        const NARROWED  = 1 << 4;
        /// Buffer text carries terminal attribute markers.
        const TERM_ATTR = 1 << 5;
        /// Body of a user command.
        const COMMAND   = 1 << 6;
        /// Body of a user function.
        const FUNCTION  = 1 << 7;
    }
}

/// Input record delimiter detected when the buffer's file was read. The
/// first kind encountered is locked in for the whole file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordDelim {
    #[default]
    None,
    Lf,
    Cr,
    CrLf,
}

impl RecordDelim {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            RecordDelim::None | RecordDelim::Lf => b"\n",
            RecordDelim::Cr => b"\r",
            RecordDelim::CrLf => b"\r\n",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineKind {
    Command,
    Function,
}

/// Call information for a buffer holding a user command or function body.
#[derive(Debug, Clone)]
pub struct CallInfo {
    pub kind: RoutineKind,
    pub min_args: u16,
    /// Negative means unlimited.
    pub max_args: i32,
    /// Current execution nesting depth; a buffer being executed refuses
    /// deletion and re-preprocessing.
    pub exec_depth: u32,
    pub arg_syntax: Option<String>,
    pub descrip: Option<String>,
}

impl CallInfo {
    pub fn new(kind: RoutineKind, min_args: u16, max_args: i32) -> Self {
        Self {
            kind,
            min_args,
            max_args,
            exec_depth: 0,
            arg_syntax: None,
            descrip: None,
        }
    }
}

/// One structural change to the line chain, journaled for face replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStep {
    /// `n` bytes inserted at (`line`, `at`).
    Insert { line: LineId, at: usize, n: usize },
    /// `suffix` split at `at`; `prefix` is the new line linked before it and
    /// holds the bytes that preceded the split position.
    Split {
        prefix: LineId,
        suffix: LineId,
        at: usize,
    },
    /// `n` bytes deleted at (`line`, `at`).
    Delete { line: LineId, at: usize, n: usize },
    /// `lower` merged into `upper`, whose prior length was `at`.
    Join {
        upper: LineId,
        lower: LineId,
        at: usize,
    },
}

/// Parked fragment of a narrowed buffer: a detached chain of lines.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fragment {
    pub first: LineId,
    pub last: LineId,
}

#[derive(Debug)]
pub struct Buffer {
    pub name: String,
    pub filename: Option<PathBuf>,
    pub flags: BufFlags,
    /// Enabled buffer modes, kept sorted by name.
    pub modes: Vec<String>,
    pub delim: RecordDelim,
    pub call_info: Option<CallInfo>,
    /// Windows currently displaying this buffer, across all screens.
    pub wind_count: u32,
    /// Aliases referencing this buffer's executable entry.
    pub alias_count: u32,
    pub(crate) store: LineStore,
    pub(crate) first: LineId,
    pub(crate) marks: Vec<Mark>,
    pub(crate) background: Face,
    pub(crate) nar_top: Option<Fragment>,
    pub(crate) nar_bot: Option<Fragment>,
    steps: Vec<EditStep>,
}

impl Buffer {
    pub fn new(name: impl Into<String>) -> Self {
        let mut store = LineStore::new();
        let first = store.alloc(b"");
        // A one-line buffer is its own prev (first.prev == last == first).
        store.get_mut(first).prev = first;
        let background = Face::at(first);
        Self {
            name: name.into(),
            filename: None,
            flags: BufFlags::empty(),
            modes: Vec::new(),
            delim: RecordDelim::None,
            call_info: None,
            wind_count: 0,
            alias_count: 0,
            store,
            first,
            marks: vec![Mark::new(REGION_MARK, first, 0, 0)],
            background,
            nar_top: None,
            nar_bot: None,
            steps: Vec::new(),
        }
    }

    // ---- navigation -----------------------------------------------------

    pub fn first_line(&self) -> LineId {
        self.first
    }

    pub fn last_line(&self) -> LineId {
        self.store.get(self.first).prev
    }

    pub fn next_line(&self, id: LineId) -> Option<LineId> {
        self.store.get(id).next
    }

    pub fn prev_line(&self, id: LineId) -> Option<LineId> {
        if id == self.first {
            None
        } else {
            Some(self.store.get(id).prev)
        }
    }

    pub fn line_text(&self, id: LineId) -> &[u8] {
        &self.store.get(id).text
    }

    pub fn line_used(&self, id: LineId) -> usize {
        self.store.get(id).text.len()
    }

    pub fn line_count(&self) -> usize {
        let mut n = 0;
        let mut cur = Some(self.first);
        while let Some(id) = cur {
            n += 1;
            cur = self.next_line(id);
        }
        n
    }

    /// 1-based number of `id` within the (possibly narrowed) line chain.
    pub fn line_num(&self, id: LineId) -> usize {
        let mut n = 1;
        let mut cur = self.first;
        while cur != id {
            cur = self.next_line(cur).expect("line not in buffer");
            n += 1;
        }
        n
    }

    /// 1-based lookup; `None` when past the end.
    pub fn line_at(&self, num: usize) -> Option<LineId> {
        let mut cur = Some(self.first);
        let mut n = 1;
        while let Some(id) = cur {
            if n == num {
                return Some(id);
            }
            cur = self.next_line(id);
            n += 1;
        }
        None
    }

    pub fn lines(&self) -> impl Iterator<Item = LineId> + '_ {
        let mut cur = Some(self.first);
        std::iter::from_fn(move || {
            let id = cur?;
            cur = self.next_line(id);
            Some(id)
        })
    }

    pub fn begin_point(&self) -> Point {
        Point::new(self.first, 0)
    }

    pub fn end_point(&self) -> Point {
        let last = self.last_line();
        Point::new(last, self.line_used(last))
    }

    /// O(1) begin-of-buffer predicate.
    pub fn buf_begin(&self, pt: Point) -> bool {
        pt.line == self.first && pt.off == 0
    }

    /// O(1) end-of-buffer predicate.
    pub fn buf_end(&self, pt: Point) -> bool {
        self.store.get(pt.line).next.is_none() && pt.off == self.line_used(pt.line)
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.store.get(self.first).next.is_none() && self.line_used(self.first) == 0
    }

    /// Byte at the point: line byte, the `\n` delimiter at end-of-line, or
    /// `None` at end-of-buffer (the last line has no delimiter).
    pub fn char_at(&self, pt: Point) -> Option<u8> {
        let line = self.store.get(pt.line);
        if pt.off < line.text.len() {
            Some(line.text[pt.off])
        } else if line.next.is_some() {
            Some(b'\n')
        } else {
            None
        }
    }

    /// Advance one byte; false at end-of-buffer.
    pub fn forw_char(&self, pt: &mut Point) -> bool {
        let line = self.store.get(pt.line);
        if pt.off < line.text.len() {
            pt.off += 1;
            true
        } else if let Some(next) = line.next {
            pt.line = next;
            pt.off = 0;
            true
        } else {
            false
        }
    }

    /// Retreat one byte; false at beginning-of-buffer.
    pub fn back_char(&self, pt: &mut Point) -> bool {
        if pt.off > 0 {
            pt.off -= 1;
            true
        } else if let Some(prev) = self.prev_line(pt.line) {
            pt.line = prev;
            pt.off = self.line_used(prev);
            true
        } else {
            false
        }
    }

    /// Bytes (delimiters included) from `from` forward to `to`. `None` when
    /// `to` is not reachable forward of `from`.
    pub fn bytes_between(&self, from: Point, to: Point) -> Option<usize> {
        if from.line == to.line {
            return to.off.checked_sub(from.off);
        }
        let mut n = self.line_used(from.line) - from.off + 1;
        let mut cur = self.next_line(from.line)?;
        while cur != to.line {
            n += self.line_used(cur) + 1;
            cur = self.next_line(cur)?;
        }
        Some(n + to.off)
    }

    // ---- contents -------------------------------------------------------

    /// Whole-buffer contents; every line but the last is followed by `\n`.
    pub fn contents(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut cur = Some(self.first);
        while let Some(id) = cur {
            out.extend_from_slice(self.line_text(id));
            cur = self.next_line(id);
            if cur.is_some() {
                out.push(b'\n');
            }
        }
        out
    }

    /// Replace the whole contents; marks collapse to the new first line.
    pub fn set_text(&mut self, text: &[u8]) {
        self.clear();
        let mut segments = text.split(|&b| b == b'\n');
        if let Some(first_seg) = segments.next() {
            let first = self.first;
            self.store.get_mut(first).text = with_block_capacity(first_seg);
            let mut at = first;
            for seg in segments {
                let id = self.store.alloc(seg);
                self.link_after(id, at);
                at = id;
            }
        }
        self.flags.insert(BufFlags::ACTIVE);
    }

    /// Delete every line, leaving one empty line. The first line is kept
    /// (its allocation reused) when its capacity is modest.
    pub fn clear(&mut self) {
        let keep_first = self.store.get(self.first).text.capacity() <= block_size(0);
        let mut cur = self.next_line(self.first);
        while let Some(id) = cur {
            cur = self.next_line(id);
            self.store.free(id);
        }
        if keep_first {
            let first = self.first;
            let line = self.store.get_mut(first);
            line.text.clear();
            line.next = None;
            line.prev = first;
        } else {
            self.store.free(self.first);
            let first = self.store.alloc(b"");
            self.store.get_mut(first).prev = first;
            self.first = first;
        }
        let first = self.first;
        self.marks.clear();
        self.marks.push(Mark::new(REGION_MARK, first, 0, 0));
        self.background = Face::at(first);
        self.nar_top = None;
        self.nar_bot = None;
        self.flags.remove(BufFlags::NARROWED);
        self.steps.clear();
    }

    // ---- marks ----------------------------------------------------------

    pub fn set_mark(&mut self, mark: Mark) {
        match self.marks.iter_mut().find(|m| m.id == mark.id) {
            Some(slot) => *slot = mark,
            None => self.marks.push(mark),
        }
    }

    pub fn mark(&self, id: MarkId) -> Option<&Mark> {
        self.marks.iter().find(|m| m.id == id)
    }

    pub fn delete_mark(&mut self, id: MarkId) -> bool {
        // The root (region) mark cannot be removed.
        if id == REGION_MARK {
            return false;
        }
        let before = self.marks.len();
        self.marks.retain(|m| m.id != id);
        self.marks.len() != before
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn background_face(&self) -> Face {
        self.background
    }

    pub fn set_background_face(&mut self, face: Face) {
        self.background = face;
    }

    // ---- edit journal ---------------------------------------------------

    pub fn take_steps(&mut self) -> Vec<EditStep> {
        std::mem::take(&mut self.steps)
    }

    fn journal(&mut self, step: EditStep) {
        self.adjust_marks(&step);
        self.steps.push(step);
    }

    fn adjust_marks(&mut self, step: &EditStep) {
        for mark in &mut self.marks {
            if mark.is_hidden() {
                continue;
            }
            match *step {
                EditStep::Insert { line, at, n } => {
                    // Strict: a mark at the insert point stays put.
                    if mark.line == line && mark.off > at as i64 {
                        mark.off += n as i64;
                    }
                }
                EditStep::Split { prefix, suffix, at } => {
                    if mark.line == suffix {
                        if mark.off < at as i64 {
                            mark.line = prefix;
                        } else {
                            mark.off -= at as i64;
                        }
                    }
                }
                EditStep::Delete { line, at, n } => {
                    if mark.line == line && mark.off > at as i64 {
                        mark.off -= (n as i64).min(mark.off - at as i64);
                    }
                }
                EditStep::Join { upper, lower, at } => {
                    if mark.line == lower {
                        mark.line = upper;
                        mark.off += at as i64;
                    }
                }
            }
        }
    }

    // ---- linking --------------------------------------------------------

    pub(crate) fn link_before(&mut self, new: LineId, at: LineId) {
        let at_prev = self.store.get(at).prev;
        self.store.get_mut(new).prev = at_prev;
        self.store.get_mut(new).next = Some(at);
        self.store.get_mut(at).prev = new;
        if at == self.first {
            self.first = new;
        } else {
            self.store.get_mut(at_prev).next = Some(new);
        }
    }

    pub(crate) fn link_after(&mut self, new: LineId, at: LineId) {
        let at_next = self.store.get(at).next;
        self.store.get_mut(new).prev = at;
        self.store.get_mut(new).next = at_next;
        self.store.get_mut(at).next = Some(new);
        match at_next {
            Some(next) => self.store.get_mut(next).prev = new,
            // `new` is the new last line.
            None => self.store.get_mut(self.first).prev = new,
        }
    }

    /// Unlink and free a line. The caller has already migrated every mark
    /// and face off it; the only line of a buffer cannot be unlinked.
    pub(crate) fn unlink(&mut self, id: LineId) {
        let prev = self.store.get(id).prev;
        let next = self.store.get(id).next;
        if id == self.first {
            let new_first = next.expect("cannot unlink the only line");
            self.store.get_mut(new_first).prev = prev;
            self.first = new_first;
        } else {
            match next {
                Some(n) => {
                    self.store.get_mut(prev).next = Some(n);
                    self.store.get_mut(n).prev = prev;
                }
                None => {
                    self.store.get_mut(prev).next = None;
                    self.store.get_mut(self.first).prev = prev;
                }
            }
        }
        self.store.free(id);
    }

    // ---- edit primitives ------------------------------------------------

    /// Insert `n` copies of a non-newline byte at the point. The point (and
    /// any face replaying the journal) slides past the insertion; marks at
    /// the insert offset stay.
    pub fn insert_char(&mut self, pt: &mut Point, c: u8, n: usize) {
        debug_assert_ne!(c, b'\n');
        if n == 0 {
            return;
        }
        let at = pt.off;
        {
            let line = self.store.get_mut(pt.line);
            if line.text.len() + n > line.text.capacity() {
                line.text.reserve(block_size(line.text.len() + n) - line.text.len());
            }
            line.text.splice(at..at, std::iter::repeat(c).take(n));
        }
        self.journal(EditStep::Insert {
            line: pt.line,
            at,
            n,
        });
        pt.off += n;
        self.flags.insert(BufFlags::CHANGED);
    }

    /// Insert a byte slice into the current line at the point. A `\n` byte
    /// here lands as a literal line byte, not a split; callers wanting
    /// splits go through `insert_newline`.
    pub fn insert_slice(&mut self, pt: &mut Point, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let at = pt.off;
        {
            let line = self.store.get_mut(pt.line);
            let need = line.text.len() + bytes.len();
            if need > line.text.capacity() {
                line.text.reserve(block_size(need) - line.text.len());
            }
            line.text.splice(at..at, bytes.iter().copied());
        }
        self.journal(EditStep::Insert {
            line: pt.line,
            at,
            n: bytes.len(),
        });
        pt.off += bytes.len();
        self.flags.insert(BufFlags::CHANGED);
    }

    /// Split the current line at the point. The pre-point prefix moves to a
    /// freshly allocated line linked before the current one; the point stays
    /// on the (shifted) current line, at column zero when it sat exactly at
    /// the split.
    pub fn insert_newline(&mut self, pt: &mut Point) {
        let at = pt.off;
        let prefix_text: Vec<u8> = self.store.get(pt.line).text[..at].to_vec();
        let prefix = self.store.alloc(&prefix_text);
        self.link_before(prefix, pt.line);
        self.store.get_mut(pt.line).text.drain(..at);
        let suffix = pt.line;
        self.journal(EditStep::Split { prefix, suffix, at });
        // Point rule matches the mark rule for splits: off >= at stays on
        // the suffix line, decremented.
        pt.off -= at;
        self.flags.insert(BufFlags::CHANGED);
    }

    /// Overwrite one byte in place (case conversion and the like). Marks
    /// and point positions are unaffected; a zero-length insert step is
    /// journaled so displaying windows still repaint the line.
    pub fn set_byte(&mut self, pt: Point, c: u8) {
        let line = self.store.get_mut(pt.line);
        if pt.off < line.text.len() {
            line.text[pt.off] = c;
            self.steps.push(EditStep::Insert {
                line: pt.line,
                at: pt.off,
                n: 0,
            });
            self.flags.insert(BufFlags::CHANGED);
        }
    }

    /// Replace a whole line's text (detab, entab, wrap). Marks on the line
    /// collapse to its start; the caller repositions the point.
    pub fn replace_line(&mut self, id: LineId, text: &[u8]) {
        let old_len = self.line_used(id);
        {
            let line = self.store.get_mut(id);
            line.text.clear();
            line.text.extend_from_slice(text);
        }
        self.journal(EditStep::Delete {
            line: id,
            at: 0,
            n: old_len,
        });
        self.steps.push(EditStep::Insert {
            line: id,
            at: 0,
            n: 0,
        });
        self.flags.insert(BufFlags::CHANGED);
    }

    /// Merge the next line into `upper`, deleting the delimiter between
    /// them. Fails at the last line.
    pub fn join_next(&mut self, upper: LineId) -> Result<()> {
        let lower = self
            .next_line(upper)
            .ok_or_else(|| EdError::failure("End of buffer"))?;
        let at = self.line_used(upper);
        let lower_text = std::mem::take(&mut self.store.get_mut(lower).text);
        {
            let line = self.store.get_mut(upper);
            let need = line.text.len() + lower_text.len();
            if need > line.text.capacity() {
                line.text.reserve(block_size(need) - line.text.len());
            }
            line.text.extend_from_slice(&lower_text);
        }
        self.journal(EditStep::Join { upper, lower, at });
        self.unlink(lower);
        self.flags.insert(BufFlags::CHANGED);
        Ok(())
    }

    /// Delete `n` bytes at the point; negative `n` deletes backward. Returns
    /// the deleted bytes (line delimiters as `\n`). Fails without touching
    /// anything if the range runs past either end of the buffer.
    pub fn delete_at(&mut self, pt: &mut Point, n: i64) -> Result<Vec<u8>> {
        let count = n.unsigned_abs() as usize;
        if count == 0 {
            return Ok(Vec::new());
        }
        if n < 0 {
            let mut probe = *pt;
            for _ in 0..count {
                if !self.back_char(&mut probe) {
                    return Err(EdError::failure("Delete range exceeds buffer"));
                }
            }
            *pt = probe;
        } else {
            // Validate the forward range first so a failing delete is a no-op.
            let mut probe = *pt;
            for _ in 0..count {
                if !self.forw_char(&mut probe) {
                    return Err(EdError::failure("Delete range exceeds buffer"));
                }
            }
        }

        let mut out = Vec::with_capacity(count);
        let mut remaining = count;
        while remaining > 0 {
            let avail = self.line_used(pt.line) - pt.off;
            if remaining <= avail {
                let at = pt.off;
                {
                    let line = self.store.get_mut(pt.line);
                    out.extend(line.text.drain(at..at + remaining));
                }
                self.journal(EditStep::Delete {
                    line: pt.line,
                    at,
                    n: remaining,
                });
                remaining = 0;
            } else {
                if avail > 0 {
                    let at = pt.off;
                    {
                        let line = self.store.get_mut(pt.line);
                        out.extend(line.text.drain(at..));
                    }
                    self.journal(EditStep::Delete {
                        line: pt.line,
                        at,
                        n: avail,
                    });
                }
                out.push(b'\n');
                self.join_next(pt.line)?;
                remaining -= avail + 1;
            }
        }
        self.flags.insert(BufFlags::CHANGED);
        trace!(target: "text.edit", buffer = %self.name, n, "delete");
        Ok(out)
    }

    // ---- invariants (test support) --------------------------------------

    /// Verify the link invariants: `first.prev == last`, `last.next == None`,
    /// and `prev`/`next` mutually consistent on every interior line.
    pub fn check_links(&self) -> bool {
        let last = self.store.get(self.first).prev;
        if self.store.get(last).next.is_some() {
            return false;
        }
        let mut cur = self.first;
        loop {
            match self.store.get(cur).next {
                Some(next) => {
                    if self.store.get(next).prev != cur {
                        return false;
                    }
                    cur = next;
                }
                None => return cur == last,
            }
        }
    }
}

fn with_block_capacity(text: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(block_size(text.len()));
    v.extend_from_slice(text);
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(text: &str) -> Buffer {
        let mut b = Buffer::new("test");
        b.set_text(text.as_bytes());
        b
    }

    #[test]
    fn new_buffer_is_one_empty_line() {
        let b = Buffer::new("t");
        assert!(b.is_empty_buffer());
        assert_eq!(b.first_line(), b.last_line());
        assert!(b.check_links());
        assert_eq!(b.contents(), b"");
    }

    #[test]
    fn set_text_and_contents_round_trip() {
        let b = buf("abc\ndef\n");
        assert_eq!(b.line_count(), 3);
        assert_eq!(b.contents(), b"abc\ndef\n");
        assert!(b.check_links());
    }

    #[test]
    fn insert_char_slides_point_not_mark() {
        let mut b = buf("abc");
        let line = b.first_line();
        b.set_mark(Mark::new(b'a', line, 1, 0));
        let mut pt = Point::new(line, 1);
        b.insert_char(&mut pt, b'X', 2);
        assert_eq!(b.contents(), b"aXXbc");
        assert_eq!(pt.off, 3);
        // Mark at the insert offset must not slide.
        assert_eq!(b.mark(b'a').unwrap().offset(), 1);
    }

    #[test]
    fn insert_char_advances_mark_past_point() {
        let mut b = buf("abcd");
        let line = b.first_line();
        b.set_mark(Mark::new(b'm', line, 3, 0));
        let mut pt = Point::new(line, 1);
        b.insert_char(&mut pt, b'X', 2);
        assert_eq!(b.mark(b'm').unwrap().offset(), 5);
    }

    #[test]
    fn newline_split_migrates_positions() {
        let mut b = buf("abcdef");
        let line = b.first_line();
        b.set_mark(Mark::new(b'p', line, 1, 0)); // before split -> prefix line
        b.set_mark(Mark::new(b's', line, 5, 0)); // after split -> stays
        let mut pt = Point::new(line, 3);
        b.insert_newline(&mut pt);
        assert_eq!(b.contents(), b"abc\ndef");
        assert_eq!(pt.line, line);
        assert_eq!(pt.off, 0);
        let p = *b.mark(b'p').unwrap();
        assert_ne!(p.line, line);
        assert_eq!(p.offset(), 1);
        let s = *b.mark(b's').unwrap();
        assert_eq!(s.line, line);
        assert_eq!(s.offset(), 2);
        assert!(b.check_links());
    }

    #[test]
    fn delete_within_line_adjusts_marks_per_rule() {
        // Marks at q <= p stay; p < q <= p+k collapse to p; q > p+k shift.
        let mut b = buf("abcdefgh");
        let line = b.first_line();
        b.set_mark(Mark::new(b'1', line, 2, 0));
        b.set_mark(Mark::new(b'2', line, 4, 0));
        b.set_mark(Mark::new(b'3', line, 7, 0));
        let mut pt = Point::new(line, 2);
        let deleted = b.delete_at(&mut pt, 3).unwrap();
        assert_eq!(deleted, b"cde");
        assert_eq!(b.contents(), b"abfgh");
        assert_eq!(b.mark(b'1').unwrap().offset(), 2);
        assert_eq!(b.mark(b'2').unwrap().offset(), 2);
        assert_eq!(b.mark(b'3').unwrap().offset(), 4);
    }

    #[test]
    fn delete_across_lines_joins_and_collects() {
        let mut b = buf("abc\ndef\nghi");
        let line = b.first_line();
        let mut pt = Point::new(line, 2);
        let deleted = b.delete_at(&mut pt, 5).unwrap();
        assert_eq!(deleted, b"c\nde");
        assert_eq!(b.contents(), b"abf\nghi");
        assert_eq!(pt.line, line);
        assert_eq!(pt.off, 2);
        assert!(b.check_links());
    }

    #[test]
    fn backward_delete_moves_point() {
        let mut b = buf("abc\ndef");
        let second = b.next_line(b.first_line()).unwrap();
        let mut pt = Point::new(second, 1);
        let deleted = b.delete_at(&mut pt, -3).unwrap();
        assert_eq!(deleted, b"c\nd");
        assert_eq!(b.contents(), b"abef");
        assert_eq!(pt.line, b.first_line());
        assert_eq!(pt.off, 2);
    }

    #[test]
    fn delete_past_end_is_a_clean_failure() {
        let mut b = buf("ab");
        let mut pt = Point::new(b.first_line(), 1);
        assert!(b.delete_at(&mut pt, 5).is_err());
        // Nothing was touched.
        assert_eq!(b.contents(), b"ab");
        assert_eq!(pt.off, 1);
    }

    #[test]
    fn char_at_sees_delimiters_but_not_eob() {
        let b = buf("ab\ncd");
        let first = b.first_line();
        assert_eq!(b.char_at(Point::new(first, 0)), Some(b'a'));
        assert_eq!(b.char_at(Point::new(first, 2)), Some(b'\n'));
        let last = b.last_line();
        assert_eq!(b.char_at(Point::new(last, 2)), None);
    }

    #[test]
    fn bytes_between_counts_delimiters() {
        let b = buf("ab\ncd\nef");
        let from = b.begin_point();
        let to = b.end_point();
        assert_eq!(b.bytes_between(from, to), Some(8));
        let mid = Point::new(b.next_line(b.first_line()).unwrap(), 1);
        assert_eq!(b.bytes_between(from, mid), Some(4));
        assert_eq!(b.bytes_between(mid, from), None);
    }

    #[test]
    fn clear_keeps_small_first_line() {
        let mut b = buf("hello\nworld");
        b.clear();
        assert!(b.is_empty_buffer());
        assert!(b.check_links());
        assert_eq!(b.marks().len(), 1);
    }

    #[test]
    fn face_step_replay_matches_point_semantics() {
        let mut b = buf("abcdef");
        let line = b.first_line();
        let mut face = Face {
            top: line,
            point: Point::new(line, 3),
            left_col: 0,
        };
        let mut pt = Point::new(line, 3);
        b.insert_char(&mut pt, b'!', 1);
        for step in b.take_steps() {
            face.apply_step(&step);
        }
        // Face point at the insert offset slides, like the active point.
        assert_eq!(face.point.off, 4);
    }
}
