//! Key-to-command dispatch.
//!
//! Ordering within one dispatch: the preKey hook fires, the command
//! executes (possibly re-entering the interpreter), point/flag state
//! settles, the postKey hook fires, and the caller redraws. The array
//! garbage sweep runs between top-level commands, never during one.

use core_input::ExtKey;
use core_script::Interp;
use core_status::{EdError, Result, Severity};
use core_value::Datum;
use tracing::{debug, trace};

use crate::hooks::HookId;
use crate::{modes, Session};

/// Resolve one key sequence to an executable name, or a self-insert.
enum KeyAction {
    Command(String),
    SelfInsert(u8),
    Unbound,
}

fn resolve(session: &Session, key: ExtKey) -> KeyAction {
    if let Some(name) = session.bindings.lookup(key) {
        return KeyAction::Command(name.to_string());
    }
    let flags = key.flags();
    let code = key.code();
    if flags.is_empty() && (0x20..0x7f).contains(&code) {
        return KeyAction::SelfInsert(code);
    }
    KeyAction::Unbound
}

/// Insert one typed character, honoring overwrite/replace modes and firing
/// the wrap hook when the wrap conditions hold.
fn self_insert(session: &mut Session, interp: &mut Interp, c: u8, n: i64) -> Result<Datum> {
    session.check_writable()?;
    let style = {
        let buf = session.cur_buf();
        if modes::buf_mode_enabled(buf, "Repl") {
            core_edit::InsertStyle::Replace
        } else if modes::buf_mode_enabled(buf, "Over") {
            core_edit::InsertStyle::Overwrite
        } else {
            core_edit::InsertStyle::Insert
        }
    };
    let mut pt = session.point();
    let buf_id = session.cur_buf_id();
    core_edit::insert_text(session.buffers.get_mut(buf_id), &mut pt, &[c], n, style)?;
    session.finish_edit(pt);

    // Wrap check: wrap mode on, no overwrite/replace, positive wrap
    // column, and the column has been exceeded.
    let wrap_col = session.screen().wrap_col;
    if style == core_edit::InsertStyle::Insert
        && wrap_col > 0
        && modes::buf_mode_enabled(session.cur_buf(), "Wrap")
    {
        let col = core_edit::insert::current_column(
            session.cur_buf(),
            session.point(),
            session.screen().hard_tab,
        );
        if col > wrap_col {
            session.run_hook(interp, HookId::Wrap, Vec::new())?;
        }
    }
    Ok(Datum::Nil)
}

/// Execute one decoded key sequence: preKey hook, the bound command (or
/// self-insert), postKey hook. Returns the command's value.
pub fn execute_key(session: &mut Session, interp: &mut Interp, key: ExtKey) -> Result<Datum> {
    if key == session.abort_key {
        return Err(EdError::user_abort());
    }
    trace!(target: "session.dispatch", key = %key.name(), "execute");
    session.run_hook(interp, HookId::PreKey, Vec::new())?;

    let result = match resolve(session, key) {
        KeyAction::Command(name) => {
            // The endMacro trigger key is not part of the capture.
            if name == "endMacro" && session.macro_rec.is_recording() {
                session.macro_rec.drop_last();
            }
            session.call_by_name(interp, &name, None, Vec::new())
        }
        KeyAction::SelfInsert(c) => self_insert(session, interp, c, 1),
        KeyAction::Unbound => Err(EdError::failure(format!(
            "Key '{}' not bound",
            key.name()
        ))),
    };

    let post = session.run_hook(interp, HookId::PostKey, Vec::new());
    // Kill accumulation window: only immediately consecutive kills chain.
    session.last_was_kill = session.this_kill;
    session.this_kill = false;
    let value = result?;
    post?;
    Ok(value)
}

/// One top-level iteration: record the key when a macro is being captured,
/// execute it, then run the inter-command sweep.
pub fn top_level_key(session: &mut Session, interp: &mut Interp, key: ExtKey) -> Result<Datum> {
    if session.macro_rec.is_recording() {
        session.macro_rec.record(key);
    }
    let result = execute_key(session, interp, key);
    interp.sweep();
    if let Err(e) = &result {
        if e.severity == Severity::UserAbort {
            session.macro_rec.stop();
        }
        debug!(target: "session.dispatch", severity = ?e.severity, msg = %e.message, "command failed");
    }
    result
}

/// Drain a playing macro, executing every key it yields. Playback stops on
/// the first failing iteration.
pub fn drain_macro(session: &mut Session, interp: &mut Interp) -> Result<()> {
    while let Some(key) = session.macro_rec.play_key() {
        match execute_key(session, interp, key) {
            Ok(_) => {}
            Err(e) => {
                session.macro_rec.stop();
                return Err(e);
            }
        }
    }
    interp.sweep();
    Ok(())
}
