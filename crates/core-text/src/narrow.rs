//! Buffer narrowing: temporarily truncate the line chain to a contiguous
//! middle segment, parking the excised top and bottom fragments on the
//! buffer for restoration.
//!
//! While narrowed: `BufFlags::NARROWED` is set, user marks outside the
//! visible region are hidden by offset negation, and the last visible line
//! takes on last-line-of-buffer behavior (no trailing delimiter).

use core_status::{EdError, Result};
use tracing::debug;

use crate::buffer::{BufFlags, Buffer, Fragment};
use crate::LineId;

impl Buffer {
    pub fn is_narrowed(&self) -> bool {
        self.flags.contains(BufFlags::NARROWED)
    }

    /// Narrow to `count` lines starting at `first_keep`. Every window face
    /// displaying the buffer must be saved by the caller (via window marks)
    /// before calling, and reset to the narrowed first line afterward.
    pub fn narrow(&mut self, first_keep: LineId, count: usize) -> Result<()> {
        if self.is_narrowed() {
            return Err(EdError::failure(format!(
                "Buffer '{}' is already narrowed",
                self.name
            )));
        }
        if count == 0 {
            return Err(EdError::failure("Zero lines to narrow to"));
        }
        // Find the last kept line, clamping at end of buffer.
        let mut last_keep = first_keep;
        for _ in 1..count {
            match self.next_line(last_keep) {
                Some(next) => last_keep = next,
                None => break,
            }
        }

        let old_first = self.first;
        let old_last = self.last_line();

        // Park the top fragment.
        if first_keep != old_first {
            let top_last = self.prev_line(first_keep).expect("not first");
            self.store.get_mut(top_last).next = None;
            self.nar_top = Some(Fragment {
                first: old_first,
                last: top_last,
            });
            self.first = first_keep;
        }
        // Park the bottom fragment; the narrowed last line inherits the
        // last-line convention.
        if last_keep != old_last {
            let bot_first = self.next_line(last_keep).expect("not last");
            self.store.get_mut(last_keep).next = None;
            // bot_first keeps its prev; harmless while parked.
            self.nar_bot = Some(Fragment {
                first: bot_first,
                last: old_last,
            });
        }
        self.store.get_mut(self.first).prev = last_keep;

        // Hide every user mark, then re-show the ones whose line remained
        // visible.
        for mark in &mut self.marks {
            if mark.is_user() && !mark.is_hidden() {
                mark.flip_hidden();
            }
        }
        let visible: Vec<LineId> = self.lines().collect();
        for mark in &mut self.marks {
            if mark.is_user() && mark.is_hidden() && visible.contains(&mark.line) {
                mark.flip_hidden();
            }
        }

        self.flags.insert(BufFlags::NARROWED);
        debug!(target: "text.narrow", buffer = %self.name, count, "narrowed");
        Ok(())
    }

    /// Restore the parked fragments and every hidden mark.
    pub fn widen(&mut self) -> Result<()> {
        if !self.is_narrowed() {
            return Err(EdError::failure(format!(
                "Buffer '{}' is not narrowed",
                self.name
            )));
        }
        let nar_first = self.first;
        let nar_last = self.last_line();

        if let Some(top) = self.nar_top.take() {
            self.store.get_mut(top.last).next = Some(nar_first);
            self.store.get_mut(nar_first).prev = top.last;
            self.first = top.first;
        }
        if let Some(bot) = self.nar_bot.take() {
            self.store.get_mut(nar_last).next = Some(bot.first);
            self.store.get_mut(bot.first).prev = nar_last;
            let first = self.first;
            self.store.get_mut(first).prev = bot.last;
        } else {
            let first = self.first;
            self.store.get_mut(first).prev = nar_last;
        }

        for mark in &mut self.marks {
            if mark.is_hidden() {
                mark.flip_hidden();
            }
        }

        self.flags.remove(BufFlags::NARROWED);
        debug!(target: "text.narrow", buffer = %self.name, "widened");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mark::Mark;
    use crate::Point;

    fn buf(text: &str) -> Buffer {
        let mut b = Buffer::new("t");
        b.set_text(text.as_bytes());
        b
    }

    #[test]
    fn narrow_then_widen_round_trips() {
        let mut b = buf("one\ntwo\nthree\nfour\n");
        let before = b.contents();
        let line2 = b.line_at(2).unwrap();
        let line4 = b.line_at(4).unwrap();
        b.set_mark(Mark::new(b'x', line4, 2, 0));

        b.narrow(line2, 2).unwrap();
        assert!(b.is_narrowed());
        assert_eq!(b.contents(), b"two\nthree");
        assert!(b.check_links());
        // The outside mark is hidden.
        assert!(b.mark(b'x').unwrap().is_hidden());

        b.widen().unwrap();
        assert!(!b.is_narrowed());
        assert_eq!(b.contents(), before);
        assert!(b.check_links());
        let m = b.mark(b'x').unwrap();
        assert_eq!(m.line, line4);
        assert_eq!(m.offset(), 2);
    }

    #[test]
    fn marks_inside_region_stay_visible() {
        let mut b = buf("a\nb\nc\nd");
        let line2 = b.line_at(2).unwrap();
        b.set_mark(Mark::new(b'i', line2, 1, 0));
        b.narrow(line2, 2).unwrap();
        assert!(!b.mark(b'i').unwrap().is_hidden());
        b.widen().unwrap();
        assert_eq!(b.mark(b'i').unwrap().offset(), 1);
    }

    #[test]
    fn narrow_to_top_has_no_top_fragment() {
        let mut b = buf("a\nb\nc");
        let first = b.first_line();
        b.narrow(first, 2).unwrap();
        assert_eq!(b.contents(), b"a\nb");
        b.widen().unwrap();
        assert_eq!(b.contents(), b"a\nb\nc");
        assert!(b.check_links());
    }

    #[test]
    fn narrow_to_bottom_has_no_bottom_fragment() {
        let mut b = buf("a\nb\nc");
        let line2 = b.line_at(2).unwrap();
        b.narrow(line2, 5).unwrap();
        assert_eq!(b.contents(), b"b\nc");
        b.widen().unwrap();
        assert_eq!(b.contents(), b"a\nb\nc");
        assert!(b.check_links());
    }

    #[test]
    fn edits_inside_narrowed_region_persist_after_widen() {
        let mut b = buf("one\ntwo\nthree\nfour\n");
        let line2 = b.line_at(2).unwrap();
        b.narrow(line2, 2).unwrap();
        let mut pt = Point::new(b.first_line(), 0);
        b.insert_char(&mut pt, b'X', 1);
        b.widen().unwrap();
        assert_eq!(b.contents(), b"one\nXtwo\nthree\nfour\n");
    }

    #[test]
    fn double_narrow_fails() {
        let mut b = buf("a\nb\nc");
        let first = b.first_line();
        b.narrow(first, 1).unwrap();
        assert!(b.narrow(first, 1).is_err());
        b.widen().unwrap();
        assert!(b.widen().is_err());
    }
}
