//! Window and screen composition.
//!
//! A screen tiles windows top to bottom; each window shows one buffer
//! through its own face. The current screen, current window, and current
//! buffer together define the editing focus; the invariants (current window
//! belongs to the current screen, its buffer is the current buffer, every
//! buffer's `wind_count` equals the number of windows displaying it) are
//! maintained by the session, which owns the screen list.
//!
//! Redraw state accumulates on each window as dirty flags and is consumed
//! by the refresh pass.

use std::path::PathBuf;

use bitflags::bitflags;
use core_status::{EdError, Result};
use core_text::{Buffer, BufferId, BufferList, EditStep, Face};
use tracing::debug;

bitflags! {
    /// Window dirty flags, accumulated per edit and cleared on redraw.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WindFlags: u8 {
        /// One line changed within the window.
        const EDIT    = 1 << 0;
        /// Multi-line (structural) change; repaint the whole window.
        const HARD    = 1 << 1;
        /// Point moved other than one forward column.
        const MOVE    = 1 << 2;
        /// Mode line content changed.
        const MODE    = 1 << 3;
        /// Recompute the point's row relative to the top line.
        const REFRAME = 1 << 4;
    }
}

/// Minimum text rows a window may shrink to.
pub const MIN_WIND_ROWS: u16 = 2;

#[derive(Debug)]
pub struct Window {
    pub buf: BufferId,
    pub face: Face,
    /// Requested row for the point's line on the next reframe; 0 centers.
    pub reframe_row: i16,
    pub flags: WindFlags,
    /// First terminal row of this window's text area.
    pub top_row: u16,
    /// Text rows (mode line excluded).
    pub rows: u16,
}

impl Window {
    pub fn new(buf: BufferId, face: Face, top_row: u16, rows: u16) -> Self {
        Self {
            buf,
            face,
            reframe_row: 0,
            flags: WindFlags::HARD | WindFlags::MODE,
            top_row,
            rows,
        }
    }

    /// Replay an edit journal onto this window's face and accumulate dirty
    /// flags. `shared` is true when more than one window displays the
    /// buffer, which escalates every edit to a hard repaint.
    pub fn apply_steps(&mut self, steps: &[EditStep], shared: bool) {
        if steps.is_empty() {
            return;
        }
        let structural = steps
            .iter()
            .any(|s| matches!(s, EditStep::Split { .. } | EditStep::Join { .. }));
        for step in steps {
            self.face.apply_step(step);
        }
        if structural || shared {
            self.flags.insert(WindFlags::HARD);
        } else {
            self.flags.insert(WindFlags::EDIT);
        }
    }

    /// True when the face's point line is visible in the current frame.
    pub fn point_in_frame(&self, buf: &Buffer) -> bool {
        let mut line = self.face.top;
        for _ in 0..self.rows {
            if line == self.face.point.line {
                return true;
            }
            match buf.next_line(line) {
                Some(next) => line = next,
                None => return false,
            }
        }
        false
    }

    /// Choose a new top line so the point lands on `reframe_row` (0 means
    /// center). Clears the reframe request.
    pub fn reframe(&mut self, buf: &Buffer) {
        if self.point_in_frame(buf) && !self.flags.contains(WindFlags::REFRAME) {
            return;
        }
        let target = if self.reframe_row == 0 {
            (self.rows / 2) as i16
        } else if self.reframe_row < 0 {
            (self.rows as i16 + self.reframe_row).max(0)
        } else {
            (self.reframe_row - 1).min(self.rows as i16 - 1)
        };
        let mut top = self.face.point.line;
        for _ in 0..target {
            match buf.prev_line(top) {
                Some(prev) => top = prev,
                None => break,
            }
        }
        self.face.top = top;
        self.reframe_row = 0;
        self.flags.remove(WindFlags::REFRAME);
        self.flags.insert(WindFlags::HARD);
    }
}

#[derive(Debug)]
pub struct Screen {
    pub windows: Vec<Window>,
    pub cur: usize,
    pub work_dir: PathBuf,
    pub hard_tab: usize,
    pub soft_tab: usize,
    pub wrap_col: usize,
    /// Total terminal rows available to windows (message line excluded).
    pub rows: u16,
    pub cols: u16,
}

impl Screen {
    pub fn new(buf: BufferId, face: Face, rows: u16, cols: u16, work_dir: PathBuf) -> Self {
        // One window over the whole text area; each window reserves one row
        // for its mode line.
        let wind = Window::new(buf, face, 0, rows.saturating_sub(1));
        Self {
            windows: vec![wind],
            cur: 0,
            work_dir,
            hard_tab: 8,
            soft_tab: 0,
            wrap_col: 74,
            rows,
            cols,
        }
    }

    pub fn cur_window(&self) -> &Window {
        &self.windows[self.cur]
    }

    pub fn cur_window_mut(&mut self) -> &mut Window {
        &mut self.windows[self.cur]
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Split the current window in half; the new window goes below and
    /// becomes current when `select_new` is set. Both windows display the
    /// same buffer with independent faces.
    pub fn split(&mut self, select_new: bool) -> Result<usize> {
        let (buf, face, top_row, rows) = {
            let w = self.cur_window();
            (w.buf, w.face, w.top_row, w.rows)
        };
        // Each half keeps a mode line row; total must leave both halves
        // at least MIN_WIND_ROWS tall.
        let upper_rows = rows / 2;
        let lower_rows = rows - upper_rows - 1;
        if upper_rows < MIN_WIND_ROWS || lower_rows < MIN_WIND_ROWS {
            return Err(EdError::failure("Cannot split a window this small"));
        }
        {
            let w = self.cur_window_mut();
            w.rows = upper_rows;
            w.flags.insert(WindFlags::HARD | WindFlags::MODE | WindFlags::REFRAME);
        }
        let new_top = top_row + upper_rows + 1;
        let mut wind = Window::new(buf, face, new_top, lower_rows);
        wind.flags.insert(WindFlags::REFRAME);
        let new_index = self.cur + 1;
        self.windows.insert(new_index, wind);
        if select_new {
            self.cur = new_index;
        }
        debug!(target: "display.wind", windows = self.windows.len(), "split");
        Ok(new_index)
    }

    /// Delete the window at `index`, growing its upper neighbor (or the
    /// lower one when deleting the top window). The last window of a screen
    /// cannot be deleted. Returns the removed window so the session can
    /// drop its display count and save its face.
    pub fn delete_window(&mut self, index: usize) -> Result<Window> {
        if self.windows.len() == 1 {
            return Err(EdError::failure("Cannot delete the only window"));
        }
        if index >= self.windows.len() {
            return Err(EdError::failure("No such window"));
        }
        let removed = self.windows.remove(index);
        let heir = if index > 0 { index - 1 } else { 0 };
        {
            let w = &mut self.windows[heir];
            w.rows += removed.rows + 1;
            if index == 0 {
                w.top_row = 0;
            }
            w.flags.insert(WindFlags::HARD | WindFlags::MODE);
        }
        if self.cur >= self.windows.len() {
            self.cur = self.windows.len() - 1;
        } else if self.cur > index {
            self.cur -= 1;
        }
        Ok(removed)
    }

    /// Delete every window except the current one; returns the removed
    /// windows.
    pub fn only(&mut self) -> Vec<Window> {
        let keep = self.cur;
        let mut removed = Vec::new();
        let mut kept = None;
        for (i, w) in self.windows.drain(..).enumerate() {
            if i == keep {
                kept = Some(w);
            } else {
                removed.push(w);
            }
        }
        let mut w = kept.expect("current window exists");
        w.top_row = 0;
        w.rows = self.rows.saturating_sub(1);
        w.flags.insert(WindFlags::HARD | WindFlags::MODE | WindFlags::REFRAME);
        self.windows.push(w);
        self.cur = 0;
        removed
    }
}

/// Switch a window to a different buffer, synchronizing faces: the old
/// buffer inherits the window's face as its background face, the window
/// loads the new buffer's background face. Display counts move with it.
pub fn attach_buffer(wind: &mut Window, new_buf: BufferId, buffers: &mut BufferList) {
    if wind.buf == new_buf {
        return;
    }
    let old_face = wind.face;
    {
        let old = buffers.get_mut(wind.buf);
        old.set_background_face(old_face);
        old.wind_count = old.wind_count.saturating_sub(1);
    }
    let new = buffers.get_mut(new_buf);
    wind.face = new.background_face();
    new.wind_count += 1;
    wind.buf = new_buf;
    wind.flags
        .insert(WindFlags::HARD | WindFlags::MODE | WindFlags::REFRAME);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_text::{BufferList, Face};
    use std::path::PathBuf;

    fn setup() -> (BufferList, BufferId, Screen) {
        let mut buffers = BufferList::new();
        let (id, _) = buffers.obtain("main").unwrap();
        buffers.get_mut(id).set_text(b"a\nb\nc\nd\ne\nf\ng\nh");
        buffers.get_mut(id).wind_count = 1;
        let face = Face::at(buffers.get(id).first_line());
        let screen = Screen::new(id, face, 24, 80, PathBuf::from("/"));
        (buffers, id, screen)
    }

    #[test]
    fn split_halves_rows_and_keeps_buffer() {
        let (_buffers, id, mut screen) = setup();
        let new_index = screen.split(false).unwrap();
        assert_eq!(screen.window_count(), 2);
        assert_eq!(screen.windows[new_index].buf, id);
        let total: u16 = screen.windows.iter().map(|w| w.rows + 1).sum();
        assert_eq!(total, 24);
    }

    #[test]
    fn delete_window_gives_rows_to_neighbor() {
        let (_buffers, _id, mut screen) = setup();
        let idx = screen.split(true).unwrap();
        let before: u16 = screen.windows.iter().map(|w| w.rows + 1).sum();
        screen.delete_window(idx).unwrap();
        assert_eq!(screen.window_count(), 1);
        let after: u16 = screen.windows.iter().map(|w| w.rows + 1).sum();
        assert_eq!(before, after);
    }

    #[test]
    fn last_window_refuses_deletion() {
        let (_buffers, _id, mut screen) = setup();
        assert!(screen.delete_window(0).is_err());
    }

    #[test]
    fn only_removes_all_but_current() {
        let (_buffers, _id, mut screen) = setup();
        screen.split(true).unwrap();
        screen.split(true).unwrap();
        let removed = screen.only();
        assert_eq!(removed.len(), 2);
        assert_eq!(screen.window_count(), 1);
        assert_eq!(screen.windows[0].rows, 23);
    }

    #[test]
    fn attach_buffer_syncs_faces_and_counts() {
        let (mut buffers, id, mut screen) = setup();
        let (other, _) = buffers.obtain("other").unwrap();
        buffers.get_mut(other).set_text(b"x\ny");
        attach_buffer(&mut screen.windows[0], other, &mut buffers);
        assert_eq!(buffers.get(id).wind_count, 0);
        assert_eq!(buffers.get(other).wind_count, 1);
        assert_eq!(screen.windows[0].buf, other);
        // Old buffer remembers where it was.
        assert_eq!(buffers.get(id).background_face().point.off, 0);
    }

    #[test]
    fn reframe_centers_point() {
        let (buffers, id, mut screen) = setup();
        let buf = buffers.get(id);
        let mut w = Window::new(id, Face::at(buf.first_line()), 0, 4);
        // Move point to line 7, far outside the 4-row frame.
        let line7 = buf.line_at(7).unwrap();
        w.face.point = core_text::Point::new(line7, 0);
        assert!(!w.point_in_frame(buf));
        w.reframe(buf);
        assert!(w.point_in_frame(buf));
        let _ = &mut screen;
    }

    #[test]
    fn shared_buffer_escalates_to_hard() {
        let (mut buffers, id, mut screen) = setup();
        screen.split(false).unwrap();
        buffers.get_mut(id).wind_count = 2;
        let mut pt = core_text::Point::new(buffers.get(id).first_line(), 0);
        buffers.get_mut(id).insert_char(&mut pt, b'!', 1);
        let steps = buffers.get_mut(id).take_steps();
        for w in &mut screen.windows {
            w.flags = WindFlags::empty();
            w.apply_steps(&steps, true);
        }
        assert!(screen.windows[0].flags.contains(WindFlags::HARD));
        assert!(screen.windows[1].flags.contains(WindFlags::HARD));
    }
}
