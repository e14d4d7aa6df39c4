//! Line and buffer store.
//!
//! Text lives in variable-length byte lines linked into buffers. The C-era
//! convention `first.prev == last`, `last.next == None` is kept as data so
//! begin/end-of-buffer checks stay O(1); raw line pointers become stable
//! `LineId` handles into a per-buffer slab, which is what lets marks and
//! window faces reference lines across edits without lifetime trouble.

pub mod buffer;
pub mod line;
pub mod list;
pub mod mark;
pub mod narrow;
pub mod region;
pub mod sort;

pub use buffer::{BufFlags, Buffer, CallInfo, EditStep, RecordDelim, RoutineKind};
pub use line::{LineId, LineStore};
pub use list::{BufferId, BufferList, MAX_BUFNAME, ROUTINE_PREFIX};
pub use mark::{Mark, MarkId, REGION_MARK, WIND_MARK_BASE};
pub use region::Region;
pub use sort::SortOptions;

/// The insertion position inside a buffer: a line handle plus a byte offset
/// (0 ≤ off ≤ line.used).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub line: LineId,
    pub off: usize,
}

impl Point {
    pub fn new(line: LineId, off: usize) -> Self {
        Self { line, off }
    }
}

/// The visible-position state of a buffer in a window: top line, point, and
/// first displayed column. Buffers keep a background face for when they are
/// not displayed; each window owns its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub top: LineId,
    pub point: Point,
    pub left_col: usize,
}

impl Face {
    pub fn at(line: LineId) -> Self {
        Self {
            top: line,
            point: Point::new(line, 0),
            left_col: 0,
        }
    }

    /// Migrate this face across one edit step. Face points slide on inserts
    /// at the point itself (`>=`), unlike marks which use strict `>`.
    pub fn apply_step(&mut self, step: &EditStep) {
        match *step {
            EditStep::Insert { line, at, n } => {
                if self.point.line == line && self.point.off >= at {
                    self.point.off += n;
                }
            }
            EditStep::Split { prefix, suffix, at } => {
                if self.top == suffix {
                    self.top = prefix;
                }
                if self.point.line == suffix {
                    if self.point.off < at {
                        self.point.line = prefix;
                    } else {
                        self.point.off -= at;
                    }
                }
            }
            EditStep::Delete { line, at, n } => {
                if self.point.line == line && self.point.off > at {
                    self.point.off -= n.min(self.point.off - at);
                }
            }
            EditStep::Join { upper, lower, at } => {
                if self.top == lower {
                    self.top = upper;
                }
                if self.point.line == lower {
                    self.point.line = upper;
                    self.point.off += at;
                }
            }
        }
    }
}
