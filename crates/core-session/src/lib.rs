//! The editor aggregate.
//!
//! All process-wide state the C original kept in globals lives here in one
//! `Session` passed explicitly: the buffer list, screens and windows, the
//! five rings, the hook table, the execution table, global modes, and the
//! return message. The interpreter context travels alongside as a separate
//! `Interp` value so script execution can borrow both without aliasing
//! (the `Host` trait hands the interpreter back into session calls).

use core_display::{Screen, WindFlags, Window};
use core_edit::CharClass;
use core_input::{ExtKey, KeyDecoder, MacroRecorder};
use core_ring::{Ring, RingName};
use core_script::{exec_lines, CalleeInfo, Interp};
use core_status::{EdError, Result};
use core_text::{BufFlags, Buffer, BufferId, BufferList, Face, Mark, Point, WIND_MARK_BASE};
use core_value::Datum;
use tracing::debug;

pub mod bindings;
pub mod builtins;
pub mod dispatch;
pub mod fileio;
pub mod hooks;
pub mod host;
pub mod modes;
pub mod registry;
pub mod search;

pub use hooks::{HookId, HookTable};
pub use registry::{BuiltinDef, CmdFlags, ExecEntry, ExecTable};

/// The five named rings.
#[derive(Debug)]
pub struct Rings {
    pub kill: Ring,
    pub delete: Ring,
    pub search: Ring,
    pub replace: Ring,
    pub macro_ring: Ring,
}

impl Default for Rings {
    fn default() -> Self {
        Self {
            kill: Ring::new(RingName::Kill),
            delete: Ring::new(RingName::Delete),
            search: Ring::new(RingName::Search),
            replace: Ring::new(RingName::Replace),
            macro_ring: Ring::new(RingName::Macro),
        }
    }
}

pub struct Session {
    pub buffers: BufferList,
    pub screens: Vec<Screen>,
    pub cur_screen: usize,
    pub rings: Rings,
    pub hooks: HookTable,
    pub exec: ExecTable,
    pub global_modes: modes::GlobalModes,
    pub char_class: CharClass,
    pub macro_rec: MacroRecorder,
    pub decoder: KeyDecoder,
    pub bindings: bindings::KeyBindings,
    /// The process-wide return message, shown after the command completes.
    pub rtn_msg: Vec<u8>,
    /// Last command was a kill (enables kill-ring accumulation).
    pub last_was_kill: bool,
    /// Set by a kill command during execution; dispatch rolls it into
    /// `last_was_kill` after the command completes.
    pub this_kill: bool,
    pub search_pat: Vec<u8>,
    pub replace_pat: Vec<u8>,
    /// Abort key (Ctrl-G unless rebound).
    pub abort_key: ExtKey,
}

impl Session {
    /// Build a session with one screen showing a scratch buffer.
    pub fn new(rows: u16, cols: u16) -> Result<Self> {
        let mut buffers = BufferList::new();
        let (buf_id, _) = buffers.obtain("untitled")?;
        buffers.get_mut(buf_id).wind_count = 1;
        let face = Face::at(buffers.get(buf_id).first_line());
        let work_dir = std::env::current_dir().unwrap_or_default();
        let screen = Screen::new(buf_id, face, rows, cols, work_dir);
        let mut exec = ExecTable::new();
        exec.register_builtins(builtins::BUILTINS);
        Ok(Self {
            buffers,
            screens: vec![screen],
            cur_screen: 0,
            rings: Rings::default(),
            hooks: HookTable::new(),
            exec,
            global_modes: modes::GlobalModes::new(),
            char_class: CharClass::new(),
            macro_rec: MacroRecorder::new(),
            decoder: KeyDecoder::new(),
            bindings: bindings::KeyBindings::defaults(),
            rtn_msg: Vec::new(),
            last_was_kill: false,
            this_kill: false,
            search_pat: Vec::new(),
            replace_pat: Vec::new(),
            abort_key: ExtKey::ctrl(b'g'),
        })
    }

    // ---- focus -----------------------------------------------------------

    pub fn screen(&self) -> &Screen {
        &self.screens[self.cur_screen]
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screens[self.cur_screen]
    }

    pub fn cur_wind(&self) -> &Window {
        self.screen().cur_window()
    }

    pub fn cur_wind_mut(&mut self) -> &mut Window {
        self.screen_mut().cur_window_mut()
    }

    pub fn cur_buf_id(&self) -> BufferId {
        self.cur_wind().buf
    }

    pub fn cur_buf(&self) -> &Buffer {
        self.buffers.get(self.cur_buf_id())
    }

    pub fn cur_buf_mut(&mut self) -> &mut Buffer {
        let id = self.cur_buf_id();
        self.buffers.get_mut(id)
    }

    pub fn point(&self) -> Point {
        self.cur_wind().face.point
    }

    pub fn set_point(&mut self, pt: Point) {
        let wind = self.cur_wind_mut();
        wind.face.point = pt;
        wind.flags.insert(WindFlags::MOVE | WindFlags::REFRAME);
    }

    /// Set the return message shown on the message line after the command.
    pub fn set_rtn_msg(&mut self, msg: impl Into<Vec<u8>>) {
        self.rtn_msg = msg.into();
    }

    // ---- edit plumbing ---------------------------------------------------

    /// Fail when the current buffer cannot be edited.
    pub fn check_writable(&self) -> Result<()> {
        let buf = self.cur_buf();
        if buf.flags.contains(BufFlags::READ_ONLY)
            || modes::buf_mode_enabled(buf, "ReadOnly")
        {
            return Err(EdError::failure(format!(
                "Buffer '{}' is read-only",
                buf.name
            )));
        }
        Ok(())
    }

    /// Replay the buffer's journaled edit steps onto every window face
    /// displaying it; with multiple windows every change escalates to a
    /// hard repaint.
    pub fn sync_edits(&mut self, buf_id: BufferId) {
        let steps = self.buffers.get_mut(buf_id).take_steps();
        if steps.is_empty() {
            return;
        }
        let shared = self.buffers.get(buf_id).wind_count > 1;
        for screen in &mut self.screens {
            for wind in &mut screen.windows {
                if wind.buf == buf_id {
                    wind.apply_steps(&steps, shared);
                }
            }
        }
    }

    /// Finish an edit to the current buffer: propagate faces, then land the
    /// point where the primitive left it.
    pub fn finish_edit(&mut self, pt: Point) {
        let buf_id = self.cur_buf_id();
        self.sync_edits(buf_id);
        let wind = self.cur_wind_mut();
        wind.face.point = pt;
        wind.flags.insert(WindFlags::REFRAME);
    }

    // ---- buffer switching ------------------------------------------------

    /// Make `buf_id` current in the current window, firing exitBuf/enterBuf
    /// hooks.
    pub fn select_buffer(&mut self, interp: &mut Interp, buf_id: BufferId) -> Result<()> {
        if buf_id == self.cur_buf_id() {
            return Ok(());
        }
        let old_name = self.cur_buf().name.clone();
        self.run_hook(interp, HookId::ExitBuf, vec![Datum::str(old_name)])?;
        let si = self.cur_screen;
        let wi = self.screens[si].cur;
        let wind = &mut self.screens[si].windows[wi];
        core_display::attach_buffer(wind, buf_id, &mut self.buffers);
        let new_name = self.buffers.get(buf_id).name.clone();
        self.run_hook(interp, HookId::EnterBuf, vec![Datum::str(new_name)])?;
        Ok(())
    }

    /// Find or create a buffer by name, firing the createBuf hook on
    /// creation.
    pub fn obtain_buffer(&mut self, interp: &mut Interp, name: &str) -> Result<BufferId> {
        let (id, created) = self.buffers.obtain(name)?;
        if created {
            let name = self.buffers.get(id).name.clone();
            self.run_hook(interp, HookId::CreateBuf, vec![Datum::str(name)])?;
        }
        Ok(id)
    }

    // ---- narrowing (face preservation) -----------------------------------

    /// Narrow the current buffer to `count` lines from the point's line,
    /// saving each displaying window's face in a window mark and resetting
    /// faces to the narrowed first line.
    pub fn narrow_current(&mut self, count: usize) -> Result<()> {
        let buf_id = self.cur_buf_id();
        let first_keep = self.point().line;

        // Save window faces into window-preservation marks.
        let mut saved: Vec<Mark> = Vec::new();
        let mut n = 0u8;
        for screen in &self.screens {
            for wind in &screen.windows {
                if wind.buf == buf_id {
                    saved.push(Mark::new(
                        WIND_MARK_BASE.wrapping_add(1 + n),
                        wind.face.point.line,
                        wind.face.point.off,
                        0,
                    ));
                    n += 1;
                }
            }
        }
        {
            let buf = self.buffers.get_mut(buf_id);
            for mark in &saved {
                buf.set_mark(*mark);
            }
            buf.narrow(first_keep, count)?;
        }
        // Reset every displaying face to the narrowed first line.
        let first = self.buffers.get(buf_id).first_line();
        for screen in &mut self.screens {
            for wind in &mut screen.windows {
                if wind.buf == buf_id {
                    wind.face = Face::at(first);
                    wind.flags.insert(WindFlags::HARD | WindFlags::MODE);
                }
            }
        }
        let name = self.cur_buf().name.clone();
        self.set_rtn_msg(format!("Buffer '{name}' narrowed"));
        Ok(())
    }

    /// Widen the current buffer and restore the displaying windows' faces
    /// from their preservation marks.
    pub fn widen_current(&mut self) -> Result<()> {
        let buf_id = self.cur_buf_id();
        self.buffers.get_mut(buf_id).widen()?;

        let mut n = 0u8;
        let mut restores: Vec<(usize, usize, Mark)> = Vec::new();
        for (si, screen) in self.screens.iter().enumerate() {
            for (wi, wind) in screen.windows.iter().enumerate() {
                if wind.buf == buf_id {
                    let id = WIND_MARK_BASE.wrapping_add(1 + n);
                    n += 1;
                    if let Some(mark) = self.buffers.get(buf_id).mark(id) {
                        restores.push((si, wi, *mark));
                    }
                }
            }
        }
        for (si, wi, mark) in restores {
            let wind = &mut self.screens[si].windows[wi];
            wind.face.point = Point::new(mark.line, mark.offset());
            wind.face.top = mark.line;
            wind.flags.insert(WindFlags::HARD | WindFlags::MODE | WindFlags::REFRAME);
            self.buffers.get_mut(buf_id).delete_mark(mark.id);
        }
        let name = self.cur_buf().name.clone();
        self.set_rtn_msg(format!("Buffer '{name}' widened"));
        Ok(())
    }

    // ---- execution -------------------------------------------------------

    /// Invoke a named executable: built-in, alias, or user routine.
    pub fn call_by_name(
        &mut self,
        interp: &mut Interp,
        name: &str,
        n: Option<i64>,
        args: Vec<Datum>,
    ) -> Result<Datum> {
        let entry = self
            .exec
            .resolve(name)
            .ok_or_else(|| EdError::failure(format!("No such command or function '{name}'")))?;
        match entry {
            ExecEntry::Builtin(def) => {
                let info = CalleeInfo {
                    min_args: def.min_args,
                    max_args: def.max_args,
                };
                if !info.accepts(args.len()) {
                    return Err(EdError::failure(format!(
                        "Wrong number of arguments for '{}'",
                        def.name
                    )));
                }
                if def.flags.contains(CmdFlags::EDIT) {
                    self.check_writable()?;
                }
                debug!(target: "session.dispatch", cmd = def.name, ?n, "builtin");
                (def.func)(self, interp, n, &args)
            }
            ExecEntry::UserCmd { buf } | ExecEntry::UserFunc { buf } => {
                if !self.buffers.exists(buf) {
                    return Err(EdError::failure(format!(
                        "Body buffer for '{name}' is gone"
                    )));
                }
                let (lines, min_args, max_args) = {
                    let b = self.buffers.get(buf);
                    let ci = b.call_info.as_ref();
                    (
                        split_lines(&b.contents()),
                        ci.map(|c| c.min_args).unwrap_or(0),
                        ci.map(|c| c.max_args).unwrap_or(-1),
                    )
                };
                let info = CalleeInfo { min_args, max_args };
                if !info.accepts(args.len()) {
                    return Err(EdError::failure(format!(
                        "Wrong number of arguments for '{name}'"
                    )));
                }
                if let Some(ci) = self.buffers.get_mut(buf).call_info.as_mut() {
                    ci.exec_depth += 1;
                }
                let result = exec_lines(interp, self, name, &lines, args, n);
                if let Some(ci) = self.buffers.get_mut(buf).call_info.as_mut() {
                    ci.exec_depth -= 1;
                }
                result
            }
            ExecEntry::Alias { .. } => unreachable!("resolve() follows aliases"),
        }
    }
}

pub(crate) fn split_lines(contents: &[u8]) -> Vec<String> {
    contents
        .split(|&b| b == b'\n')
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}
