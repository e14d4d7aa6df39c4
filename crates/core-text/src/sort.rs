//! In-buffer line sort.
//!
//! One line is a no-op; two lines compare and swap by relinking; three or
//! more materialize a handle array, quicksort it (last-element pivot), and
//! relink the whole block in sorted order.

use core_status::{EdError, Result};
use tracing::debug;

use crate::buffer::Buffer;
use crate::LineId;

#[derive(Debug, Clone, Copy, Default)]
pub struct SortOptions {
    pub descending: bool,
    pub ignore_case: bool,
}

impl Buffer {
    /// Sort `count` lines starting at `start`. Returns the handles of the
    /// block's new first and last lines.
    pub fn sort_lines(
        &mut self,
        start: LineId,
        count: usize,
        opts: SortOptions,
    ) -> Result<(LineId, LineId)> {
        if count == 0 {
            return Err(EdError::failure("Zero lines to sort"));
        }
        if count == 1 {
            return Ok((start, start));
        }

        let mut ids: Vec<LineId> = Vec::with_capacity(count);
        let mut cur = Some(start);
        for _ in 0..count {
            match cur {
                Some(id) => {
                    ids.push(id);
                    cur = self.next_line(id);
                }
                None => return Err(EdError::failure("Sort range exceeds buffer")),
            }
        }

        let before = self.prev_line(start);
        let after = self.next_line(*ids.last().expect("nonempty"));

        if ids.len() == 2 {
            if self.in_order(ids[1], ids[0], opts) {
                ids.swap(0, 1);
            }
        } else {
            let mut sorted = ids.clone();
            let len = sorted.len();
            self.quicksort(&mut sorted, 0, len - 1, opts);
            ids = sorted;
        }

        self.relink_block(&ids, before, after);
        debug!(target: "text.sort", buffer = %self.name, count, "sorted");
        self.flags.insert(crate::buffer::BufFlags::CHANGED);
        Ok((ids[0], *ids.last().expect("nonempty")))
    }

    /// Strict ordering test under the sort options.
    fn in_order(&self, a: LineId, b: LineId, opts: SortOptions) -> bool {
        let ta = self.line_text(a);
        let tb = self.line_text(b);
        let ord = if opts.ignore_case {
            let fa: Vec<u8> = ta.iter().map(|c| c.to_ascii_lowercase()).collect();
            let fb: Vec<u8> = tb.iter().map(|c| c.to_ascii_lowercase()).collect();
            fa.cmp(&fb)
        } else {
            ta.cmp(tb)
        };
        if opts.descending {
            ord == std::cmp::Ordering::Greater
        } else {
            ord == std::cmp::Ordering::Less
        }
    }

    fn quicksort(&self, ids: &mut [LineId], lo: usize, hi: usize, opts: SortOptions) {
        if lo >= hi {
            return;
        }
        // Last-element pivot.
        let pivot = ids[hi];
        let mut i = lo;
        for j in lo..hi {
            if self.in_order(ids[j], pivot, opts) {
                ids.swap(i, j);
                i += 1;
            }
        }
        ids.swap(i, hi);
        if i > lo {
            self.quicksort(ids, lo, i - 1, opts);
        }
        if i + 1 < hi {
            self.quicksort(ids, i + 1, hi, opts);
        }
    }

    /// Splice the sorted handle sequence back between `before` and `after`.
    fn relink_block(&mut self, ids: &[LineId], before: Option<LineId>, after: Option<LineId>) {
        let head = ids[0];
        let tail = *ids.last().expect("nonempty");

        for pair in ids.windows(2) {
            self.store.get_mut(pair[0]).next = Some(pair[1]);
            self.store.get_mut(pair[1]).prev = pair[0];
        }

        match before {
            Some(b) => {
                self.store.get_mut(b).next = Some(head);
                self.store.get_mut(head).prev = b;
            }
            None => {
                // Block starts the buffer; head.prev must be the last line.
                self.first = head;
            }
        }
        match after {
            Some(a) => {
                self.store.get_mut(tail).next = Some(a);
                self.store.get_mut(a).prev = tail;
                if before.is_none() {
                    let last = {
                        let mut cur = a;
                        while let Some(next) = self.store.get(cur).next {
                            cur = next;
                        }
                        cur
                    };
                    self.store.get_mut(head).prev = last;
                }
            }
            None => {
                self.store.get_mut(tail).next = None;
                let first = self.first;
                self.store.get_mut(first).prev = tail;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(text: &str) -> Buffer {
        let mut b = Buffer::new("t");
        b.set_text(text.as_bytes());
        b
    }

    fn sorted_contents(text: &str, count: usize, opts: SortOptions) -> Vec<u8> {
        let mut b = buf(text);
        let first = b.first_line();
        b.sort_lines(first, count, opts).unwrap();
        assert!(b.check_links());
        b.contents()
    }

    #[test]
    fn ascending_sort() {
        let out = sorted_contents("banana\napple\ncherry\ndate", 4, SortOptions::default());
        assert_eq!(out, b"apple\nbanana\ncherry\ndate");
    }

    #[test]
    fn descending_sort() {
        let out = sorted_contents(
            "banana\napple\ncherry\ndate",
            4,
            SortOptions {
                descending: true,
                ignore_case: false,
            },
        );
        assert_eq!(out, b"date\ncherry\nbanana\napple");
    }

    #[test]
    fn two_line_swap() {
        let out = sorted_contents("bb\naa\nzz", 2, SortOptions::default());
        assert_eq!(out, b"aa\nbb\nzz");
    }

    #[test]
    fn single_line_is_noop() {
        let out = sorted_contents("bb\naa", 1, SortOptions::default());
        assert_eq!(out, b"bb\naa");
    }

    #[test]
    fn case_insensitive_sort() {
        let out = sorted_contents(
            "Bravo\nalpha\nCharlie",
            3,
            SortOptions {
                descending: false,
                ignore_case: true,
            },
        );
        assert_eq!(out, b"alpha\nBravo\nCharlie");
    }

    #[test]
    fn interior_block_sort_preserves_surroundings() {
        let mut b = buf("top\nccc\naaa\nbbb\nbottom");
        let start = b.line_at(2).unwrap();
        b.sort_lines(start, 3, SortOptions::default()).unwrap();
        assert!(b.check_links());
        assert_eq!(b.contents(), b"top\naaa\nbbb\nccc\nbottom");
    }
}
