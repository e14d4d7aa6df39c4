//! Screen refresh: paint dirty windows, mode lines, the message line, and
//! place the cursor.

use anyhow::Result;
use core_display::WindFlags;
use core_edit::insert::current_column;
use core_session::Session;
use core_terminal::{TerminalBackend, TextAttr};
use core_text::BufFlags;
use core_value::viz;

/// Redraw everything a window's dirty flags call for, then the message
/// line, then park the cursor on the point.
pub fn refresh(session: &mut Session, backend: &mut dyn TerminalBackend) -> Result<()> {
    let cols = session.screen().cols as usize;
    let screen_idx = session.cur_screen;

    // Reframe first so top lines are valid before painting.
    {
        let screen = &mut session.screens[screen_idx];
        for wind in &mut screen.windows {
            let buf = session.buffers.get(wind.buf);
            wind.reframe(buf);
        }
    }

    let wind_count = session.screens[screen_idx].windows.len();
    for wi in 0..wind_count {
        let (buf_id, top, top_row, rows, left_col, flags) = {
            let w = &session.screens[screen_idx].windows[wi];
            (w.buf, w.face.top, w.top_row, w.rows, w.face.left_col, w.flags)
        };
        if !flags.intersects(WindFlags::HARD | WindFlags::EDIT | WindFlags::MODE) {
            continue;
        }

        let buf = session.buffers.get(buf_id);
        if flags.intersects(WindFlags::HARD | WindFlags::EDIT) {
            let mut line = Some(top);
            for row in 0..rows {
                backend.move_to(top_row + row, 0)?;
                backend.erase_eol()?;
                if let Some(id) = line {
                    let text = viz::viz_bytes(buf.line_text(id));
                    let shown: Vec<u8> = text
                        .into_iter()
                        .skip(left_col)
                        .take(cols)
                        .collect();
                    backend.write_text(&shown, TextAttr::Plain)?;
                    line = buf.next_line(id);
                }
            }
        }

        // Mode line, reverse video.
        let changed = if buf.flags.contains(BufFlags::CHANGED) { "*" } else { " " };
        let narrowed = if buf.flags.contains(BufFlags::NARROWED) { "<>" } else { "" };
        let mode_names = buf.modes.join(" ");
        let mut mode_line = format!("-- {}{} {} [{}]", changed, narrowed, buf.name, mode_names);
        if modes_workdir(session) {
            mode_line.push_str(&format!(" {}", session.screen().work_dir.display()));
        }
        mode_line.truncate(cols);
        let pad = cols.saturating_sub(mode_line.len());
        mode_line.push_str(&"-".repeat(pad));
        backend.move_to(top_row + rows, 0)?;
        backend.write_text(mode_line.as_bytes(), TextAttr::Reverse)?;

        let w = &mut session.screens[screen_idx].windows[wi];
        w.flags = WindFlags::empty();
    }

    // Message line on the last terminal row.
    let msg_row = session.screen().rows;
    backend.move_to(msg_row, 0)?;
    backend.erase_eol()?;
    if session.global_modes.is_enabled("RtnMsg") && !session.rtn_msg.is_empty() {
        let msg: Vec<u8> = session.rtn_msg.iter().copied().take(cols).collect();
        backend.write_text(&msg, TextAttr::Plain)?;
    }

    // Cursor on the point.
    let (row, col) = point_cell(session);
    backend.move_to(row, col)?;
    backend.flush()?;
    Ok(())
}

fn modes_workdir(session: &Session) -> bool {
    session.global_modes.is_enabled("WorkDir")
}

/// Terminal cell of the current point within its window.
fn point_cell(session: &Session) -> (u16, u16) {
    let wind = session.cur_wind();
    let buf = session.buffers.get(wind.buf);
    let mut row = wind.top_row;
    let mut line = wind.face.top;
    while line != wind.face.point.line {
        match buf.next_line(line) {
            Some(next) => {
                line = next;
                row += 1;
            }
            None => break,
        }
    }
    let col = current_column(buf, wind.face.point, session.screen().hard_tab)
        .saturating_sub(wind.face.left_col);
    (row.min(wind.top_row + wind.rows), col.min(u16::MAX as usize) as u16)
}
