//! Built-in commands and functions.
//!
//! Each entry carries its flags, argument bounds, native function, and one
//! line of help text. Commands move the point or edit the current buffer;
//! functions (the `FUNC` flag) compute values for the expression language.
//! Dispatch has already verified argument counts and the read-only guard
//! for `EDIT` entries.

use core_edit::{
    back_word, case_lines, case_words, forw_word, insert_tab, insert_text, kdc_bytes, kdc_lines,
    kdc_region, match_fence, yank as yank_text, CaseMode, EditDisp, InsertStyle,
};
use core_script::{eval_expr, exec_lines, Interp};
use core_status::{EdError, Result, Severity};
use core_text::{
    BufFlags, Point, RecordDelim, Region, SortOptions, REGION_MARK,
};
use core_value::{viz, Datum};

use crate::bindings::parse_key;
use crate::fileio;
use crate::hooks::HookId;
use crate::registry::{BuiltinDef, CmdFlags};
use crate::search::{search_back, search_forw, substitute, Pattern};
use crate::{modes, Session};

type Args<'a> = &'a [Datum];

fn count(n: Option<i64>) -> i64 {
    n.unwrap_or(1)
}

fn arg_bytes(args: Args, i: usize) -> Result<Vec<u8>> {
    args.get(i)
        .ok_or_else(|| EdError::failure("Missing argument"))?
        .as_str()
        .map(|s| s.to_vec())
}

fn arg_string(args: Args, i: usize) -> Result<String> {
    Ok(String::from_utf8_lossy(&arg_bytes(args, i)?).into_owned())
}

fn arg_int(args: Args, i: usize) -> Result<i64> {
    args.get(i)
        .ok_or_else(|| EdError::failure("Missing argument"))?
        .as_int()
}

fn compile_pat(s: &mut Session, raw: &[u8]) -> Result<Pattern> {
    if raw.is_empty() {
        return Err(EdError::failure("Empty pattern"));
    }
    let regexp = s.global_modes.is_enabled("Regexp");
    let exact = s.global_modes.is_enabled("Exact");
    Pattern::compile(raw, regexp, exact)
}

// ---- motion ---------------------------------------------------------------

fn cmd_forw_char(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    let n = count(n);
    if n < 0 {
        return cmd_back_char(s, _i, Some(-n), _a);
    }
    let mut pt = s.point();
    for _ in 0..n {
        if !s.cur_buf().forw_char(&mut pt) {
            s.set_point(pt);
            return Err(EdError::failure("End of buffer"));
        }
    }
    s.set_point(pt);
    Ok(Datum::Nil)
}

fn cmd_back_char(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    let n = count(n);
    if n < 0 {
        return cmd_forw_char(s, _i, Some(-n), _a);
    }
    let mut pt = s.point();
    for _ in 0..n {
        if !s.cur_buf().back_char(&mut pt) {
            s.set_point(pt);
            return Err(EdError::failure("Beginning of buffer"));
        }
    }
    s.set_point(pt);
    Ok(Datum::Nil)
}

fn move_lines(s: &mut Session, n: i64) -> Result<Datum> {
    let mut pt = s.point();
    {
        let buf = s.cur_buf();
        if n >= 0 {
            for _ in 0..n {
                match buf.next_line(pt.line) {
                    Some(next) => pt.line = next,
                    None => return Err(EdError::failure("End of buffer")),
                }
            }
        } else {
            for _ in 0..-n {
                match buf.prev_line(pt.line) {
                    Some(prev) => pt.line = prev,
                    None => return Err(EdError::failure("Beginning of buffer")),
                }
            }
        }
        pt.off = pt.off.min(buf.line_used(pt.line));
    }
    s.set_point(pt);
    Ok(Datum::Nil)
}

fn cmd_forw_line(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    move_lines(s, count(n))
}

fn cmd_back_line(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    move_lines(s, -count(n))
}

fn cmd_begin_line(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    let mut pt = s.point();
    pt.off = 0;
    s.set_point(pt);
    Ok(Datum::Nil)
}

fn cmd_end_line(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    let mut pt = s.point();
    pt.off = s.cur_buf().line_used(pt.line);
    s.set_point(pt);
    Ok(Datum::Nil)
}

fn cmd_begin_buf(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    let pt = s.cur_buf().begin_point();
    s.set_point(pt);
    Ok(Datum::Nil)
}

fn cmd_end_buf(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    let pt = s.cur_buf().end_point();
    s.set_point(pt);
    Ok(Datum::Nil)
}

fn cmd_goto_line(s: &mut Session, _i: &mut Interp, n: Option<i64>, a: Args) -> Result<Datum> {
    let target = match a.first() {
        Some(v) => v.as_int()?,
        None => count(n),
    };
    let line = s
        .cur_buf()
        .line_at(target.max(1) as usize)
        .ok_or_else(|| EdError::failure(format!("No such line {target}")))?;
    s.set_point(Point::new(line, 0));
    Ok(Datum::Nil)
}

fn cmd_forw_word(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    let mut pt = s.point();
    forw_word(s.cur_buf(), &mut pt, &s.char_class, count(n).max(1) as usize);
    s.set_point(pt);
    Ok(Datum::Nil)
}

fn cmd_back_word(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    let mut pt = s.point();
    back_word(s.cur_buf(), &mut pt, &s.char_class, count(n).max(1) as usize);
    s.set_point(pt);
    Ok(Datum::Nil)
}

fn cmd_forw_page(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    let rows = s.cur_wind().rows.max(2) as i64 - 1;
    move_lines(s, rows * count(n))
}

fn cmd_back_page(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    let rows = s.cur_wind().rows.max(2) as i64 - 1;
    move_lines(s, -rows * count(n))
}

fn mark_id_arg(a: Args) -> u8 {
    a.first()
        .and_then(|v| v.as_str().ok().and_then(|s| s.first().copied()))
        .unwrap_or(REGION_MARK)
}

fn cmd_set_mark(s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let id = mark_id_arg(a);
    let pt = s.point();
    s.cur_buf_mut()
        .set_mark(core_text::Mark::new(id, pt.line, pt.off, 0));
    s.set_rtn_msg(format!("Mark '{}' set", id as char));
    Ok(Datum::Nil)
}

fn cmd_goto_mark(s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let id = mark_id_arg(a);
    let mark = s
        .cur_buf()
        .mark(id)
        .filter(|m| !m.is_hidden())
        .copied()
        .ok_or_else(|| EdError::failure(format!("Mark '{}' not set", id as char)))?;
    s.set_point(Point::new(mark.line, mark.offset()));
    Ok(Datum::Nil)
}

fn cmd_delete_mark(s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let id = mark_id_arg(a);
    if !s.cur_buf_mut().delete_mark(id) {
        return Err(EdError::failure(format!("Mark '{}' not set", id as char)));
    }
    Ok(Datum::Nil)
}

fn cmd_goto_fence(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    let pt = s.point();
    let target = match_fence(s.cur_buf(), pt)?;
    s.set_point(target);
    Ok(Datum::Nil)
}

// ---- insertion ------------------------------------------------------------

fn insert_style(s: &Session) -> InsertStyle {
    if modes::buf_mode_enabled(s.cur_buf(), "Repl") {
        InsertStyle::Replace
    } else if modes::buf_mode_enabled(s.cur_buf(), "Over") {
        InsertStyle::Overwrite
    } else {
        InsertStyle::Insert
    }
}

/// Compose the text of the (stringified) arguments, the insert-funnel way.
fn compose(args: Args) -> Vec<u8> {
    let mut out = Vec::new();
    for a in args {
        out.extend_from_slice(&a.to_bytes());
    }
    out
}

fn cmd_insert(s: &mut Session, _i: &mut Interp, n: Option<i64>, a: Args) -> Result<Datum> {
    let text = compose(a);
    let style = insert_style(s);
    let mut pt = s.point();
    let buf_id = s.cur_buf_id();
    insert_text(s.buffers.get_mut(buf_id), &mut pt, &text, count(n), style)?;
    s.finish_edit(pt);
    Ok(Datum::Str(text))
}

fn cmd_newline(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    let mut pt = s.point();
    let buf_id = s.cur_buf_id();
    {
        let buf = s.buffers.get_mut(buf_id);
        for _ in 0..count(n).max(1) {
            buf.insert_newline(&mut pt);
        }
    }
    s.finish_edit(pt);
    Ok(Datum::Nil)
}

fn cmd_open_line(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    // Insert newlines after the point without moving it.
    let mut pt = s.point();
    let buf_id = s.cur_buf_id();
    insert_text(
        s.buffers.get_mut(buf_id),
        &mut pt,
        &vec![b'\n'; count(n).max(1) as usize],
        0,
        InsertStyle::Insert,
    )?;
    s.finish_edit(pt);
    Ok(Datum::Nil)
}

fn cmd_tab(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    let (soft, hard) = (s.screen().soft_tab, s.screen().hard_tab);
    let mut pt = s.point();
    let buf_id = s.cur_buf_id();
    insert_tab(s.buffers.get_mut(buf_id), &mut pt, count(n), soft, hard)?;
    s.finish_edit(pt);
    Ok(Datum::Nil)
}

// ---- delete / kill / copy -------------------------------------------------

fn kdc_chars(s: &mut Session, n: i64, disp: EditDisp) -> Result<Datum> {
    let accum = s.last_was_kill;
    let mut pt = s.point();
    let buf_id = s.cur_buf_id();
    let ring = match disp {
        EditDisp::Kill | EditDisp::Copy => &mut s.rings.kill,
        EditDisp::Delete => &mut s.rings.delete,
    };
    kdc_bytes(s.buffers.get_mut(buf_id), &mut pt, n, disp, ring, accum)?;
    if disp != EditDisp::Copy {
        s.finish_edit(pt);
    }
    s.this_kill = true;
    Ok(Datum::Nil)
}

fn cmd_delete_forw_char(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    kdc_chars(s, count(n), EditDisp::Delete)
}

fn cmd_backspace(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    kdc_chars(s, -count(n), EditDisp::Delete)
}

fn kdc_line_cmd(s: &mut Session, n: Option<i64>, disp: EditDisp) -> Result<Datum> {
    let accum = s.last_was_kill;
    let mut pt = s.point();
    let buf_id = s.cur_buf_id();
    let ring = match disp {
        EditDisp::Kill | EditDisp::Copy => &mut s.rings.kill,
        EditDisp::Delete => &mut s.rings.delete,
    };
    kdc_lines(s.buffers.get_mut(buf_id), &mut pt, count(n), disp, ring, accum)?;
    if disp != EditDisp::Copy {
        s.finish_edit(pt);
    }
    s.this_kill = true;
    Ok(Datum::Nil)
}

fn cmd_kill_line(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    kdc_line_cmd(s, n, EditDisp::Kill)
}

fn cmd_delete_line(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    kdc_line_cmd(s, n, EditDisp::Delete)
}

fn cmd_copy_line(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    kdc_line_cmd(s, n, EditDisp::Copy)
}

fn kdc_region_cmd(s: &mut Session, disp: EditDisp) -> Result<Datum> {
    let accum = s.last_was_kill;
    let mut pt = s.point();
    let buf_id = s.cur_buf_id();
    let region = Region::from_mark(s.buffers.get(buf_id), pt, REGION_MARK)?;
    let forward = region.start == pt;
    let ring = match disp {
        EditDisp::Kill | EditDisp::Copy => &mut s.rings.kill,
        EditDisp::Delete => &mut s.rings.delete,
    };
    kdc_region(
        s.buffers.get_mut(buf_id),
        &mut pt,
        &region,
        disp,
        ring,
        accum,
        forward,
    )?;
    if disp != EditDisp::Copy {
        s.finish_edit(pt);
    }
    s.this_kill = true;
    Ok(Datum::Nil)
}

fn cmd_kill_region(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    kdc_region_cmd(s, EditDisp::Kill)
}

fn cmd_delete_region(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    kdc_region_cmd(s, EditDisp::Delete)
}

fn cmd_copy_region(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    kdc_region_cmd(s, EditDisp::Copy)
}

fn cmd_kill_word(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    let n = count(n);
    let pt = s.point();
    let mut end = pt;
    {
        let buf = s.cur_buf();
        if n >= 0 {
            forw_word(buf, &mut end, &s.char_class, n.max(1) as usize);
        } else {
            back_word(buf, &mut end, &s.char_class, (-n) as usize);
        }
    }
    let bytes = match s.cur_buf().bytes_between(pt, end) {
        Some(b) => b as i64,
        None => -(s.cur_buf().bytes_between(end, pt).unwrap_or(0) as i64),
    };
    kdc_chars(s, bytes, EditDisp::Kill)
}

fn cmd_yank(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    let mut pt = s.point();
    let buf_id = s.cur_buf_id();
    yank_text(
        s.buffers.get_mut(buf_id),
        &mut pt,
        &s.rings.kill,
        n.unwrap_or(0).min(0),
    )?;
    s.finish_edit(pt);
    Ok(Datum::Nil)
}

fn cmd_undelete(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    let mut pt = s.point();
    let buf_id = s.cur_buf_id();
    yank_text(
        s.buffers.get_mut(buf_id),
        &mut pt,
        &s.rings.delete,
        n.unwrap_or(0).min(0),
    )?;
    s.finish_edit(pt);
    Ok(Datum::Nil)
}

fn cmd_cycle_kill_ring(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    s.rings.kill.cycle(count(n))?;
    Ok(Datum::Nil)
}

// ---- case / tabs / wrap ---------------------------------------------------

fn case_word_cmd(s: &mut Session, n: Option<i64>, mode: CaseMode) -> Result<Datum> {
    let mut pt = s.point();
    let buf_id = s.cur_buf_id();
    case_words(s.buffers.get_mut(buf_id), &mut pt, &s.char_class, count(n), mode)?;
    s.finish_edit(pt);
    Ok(Datum::Nil)
}

fn cmd_upper_word(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    case_word_cmd(s, n, CaseMode::Upper)
}

fn cmd_lower_word(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    case_word_cmd(s, n, CaseMode::Lower)
}

fn cmd_title_word(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    case_word_cmd(s, n, CaseMode::Title)
}

fn case_line_cmd(s: &mut Session, n: Option<i64>, mode: CaseMode) -> Result<Datum> {
    let mut pt = s.point();
    let buf_id = s.cur_buf_id();
    case_lines(s.buffers.get_mut(buf_id), &mut pt, &s.char_class, count(n), mode)?;
    s.finish_edit(pt);
    Ok(Datum::Nil)
}

fn cmd_upper_line(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    case_line_cmd(s, n, CaseMode::Upper)
}

fn cmd_lower_line(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    case_line_cmd(s, n, CaseMode::Lower)
}

fn cmd_detab_line(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    let hard = s.screen().hard_tab;
    let mut pt = s.point();
    let buf_id = s.cur_buf_id();
    core_edit::tabs::detab_lines(s.buffers.get_mut(buf_id), &mut pt, count(n), hard)?;
    s.finish_edit(pt);
    Ok(Datum::Nil)
}

fn cmd_entab_line(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    let hard = s.screen().hard_tab;
    let mut pt = s.point();
    let buf_id = s.cur_buf_id();
    core_edit::tabs::entab_lines(s.buffers.get_mut(buf_id), &mut pt, count(n), hard)?;
    s.finish_edit(pt);
    Ok(Datum::Nil)
}

fn cmd_wrap_line(s: &mut Session, _i: &mut Interp, n: Option<i64>, a: Args) -> Result<Datum> {
    let wrap_col = s.screen().wrap_col;
    let prefix = match a.first() {
        Some(Datum::Nil) | None => None,
        Some(v) => Some(v.as_str()?.to_vec()),
    };
    let mut pt = s.point();
    let buf_id = s.cur_buf_id();
    core_edit::wrap::wrap_lines(
        s.buffers.get_mut(buf_id),
        &mut pt,
        count(n),
        wrap_col,
        prefix.as_deref(),
    )?;
    s.finish_edit(pt);
    Ok(Datum::Nil)
}

fn cmd_sort_region(s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let mut opts = SortOptions::default();
    if let Some(Datum::Array(arr)) = a.first() {
        for opt in arr.to_vec() {
            match opt.as_str()? {
                b"Descending" => opts.descending = true,
                b"Ignore" => opts.ignore_case = true,
                other => {
                    return Err(EdError::failure(format!(
                        "Invalid sort option '{}'",
                        String::from_utf8_lossy(other)
                    )))
                }
            }
        }
    }
    let pt = s.point();
    let buf_id = s.cur_buf_id();
    let region = Region::from_mark(s.buffers.get(buf_id), pt, REGION_MARK)?;
    // Sort whole lines covered by the region.
    let start_line = region.start.line;
    let line_count = region.line_count + 1;
    let (first, last) = s
        .buffers
        .get_mut(buf_id)
        .sort_lines(start_line, line_count, opts)?;
    s.sync_edits(buf_id);
    // Leave a region marked over the sorted block.
    {
        let buf = s.buffers.get_mut(buf_id);
        buf.set_mark(core_text::Mark::new(REGION_MARK, first, 0, 0));
    }
    let end_off = s.buffers.get(buf_id).line_used(last);
    s.set_point(Point::new(last, end_off));
    s.cur_wind_mut().flags.insert(core_display::WindFlags::HARD);
    s.set_rtn_msg(format!("{line_count} lines sorted"));
    Ok(Datum::Nil)
}

// ---- narrowing ------------------------------------------------------------

fn cmd_narrow_buf(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    let n = count(n);
    if n < 0 {
        // Narrow to |n| lines ending at the point's line.
        let mut first = s.point().line;
        {
            let buf = s.cur_buf();
            for _ in 1..-n {
                match buf.prev_line(first) {
                    Some(prev) => first = prev,
                    None => break,
                }
            }
        }
        let mut pt = s.point();
        pt.line = first;
        pt.off = 0;
        s.set_point(pt);
        s.narrow_current((-n) as usize)?;
    } else {
        s.narrow_current(n.max(1) as usize)?;
    }
    Ok(Datum::Nil)
}

fn cmd_widen_buf(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    s.widen_current()?;
    Ok(Datum::Nil)
}

// ---- buffers and files ----------------------------------------------------

fn cmd_select_buf(s: &mut Session, i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let name = arg_string(a, 0)?;
    let id = s.obtain_buffer(i, &name)?;
    s.select_buffer(i, id)?;
    Ok(Datum::str(name))
}

fn cmd_delete_buf(s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let name = arg_string(a, 0)?;
    let id = s
        .buffers
        .find(&name)
        .ok_or_else(|| EdError::failure(format!("No such buffer '{name}'")))?;
    if id == s.cur_buf_id() {
        return Err(EdError::failure(format!(
            "Buffer '{name}' is being displayed"
        )));
    }
    // A buffer bound to a hook cannot be deleted.
    if let Some(entry_name) = s.routine_name_of(id) {
        if s.hook_targets().any(|t| t == entry_name) {
            return Err(EdError::failure(format!(
                "Buffer '{name}' is bound to a hook"
            )));
        }
        s.exec.remove(&entry_name);
    }
    self::delete_buffer_checked(s, id)?;
    s.set_rtn_msg(format!("Buffer '{name}' deleted"));
    Ok(Datum::Nil)
}

fn delete_buffer_checked(s: &mut Session, id: core_text::BufferId) -> Result<()> {
    s.buffers.delete(id)
}

fn cmd_rename_buf(s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let new_name = arg_string(a, 0)?;
    let id = s.cur_buf_id();
    s.buffers.rename(id, &new_name)?;
    s.cur_wind_mut().flags.insert(core_display::WindFlags::MODE);
    Ok(Datum::str(new_name))
}

fn cmd_clear_buf(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    s.check_writable()?;
    let id = s.cur_buf_id();
    s.buffers.get_mut(id).clear();
    let first = s.buffers.get(id).first_line();
    for screen in &mut s.screens {
        for wind in &mut screen.windows {
            if wind.buf == id {
                wind.face = core_text::Face::at(first);
                wind.flags
                    .insert(core_display::WindFlags::HARD | core_display::WindFlags::MODE);
            }
        }
    }
    Ok(Datum::Nil)
}

fn cmd_find_file(s: &mut Session, i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let raw = arg_string(a, 0)?;
    let path = fileio::expand_path(&raw);
    // Reuse a buffer already visiting the file.
    let existing = s.buffers.ids().into_iter().find(|id| {
        s.buffers.get(*id).filename.as_deref() == Some(path.as_path())
    });
    let id = match existing {
        Some(id) => id,
        None => {
            let id = s.buffers.create_from_file(&path)?;
            let buf_name = s.buffers.get(id).name.clone();
            s.run_hook(i, HookId::CreateBuf, vec![Datum::str(buf_name)])?;
            if path.exists() {
                fileio::read_into(s.buffers.get_mut(id), &path)?;
                let buf_name = s.buffers.get(id).name.clone();
                s.run_hook(i, HookId::Read, vec![Datum::str(buf_name)])?;
            } else {
                s.buffers.get_mut(id).filename = Some(path.clone());
                s.set_rtn_msg("New file");
            }
            s.buffers.get_mut(id).flags.remove(BufFlags::CHANGED);
            id
        }
    };
    s.select_buffer(i, id)?;
    Ok(Datum::str(s.cur_buf().name.clone()))
}

fn cmd_read_file(s: &mut Session, i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    s.check_writable()?;
    let raw = arg_string(a, 0)?;
    let path = fileio::expand_path(&raw);
    let id = s.cur_buf_id();
    fileio::read_into(s.buffers.get_mut(id), &path)?;
    s.buffers.get_mut(id).flags.remove(BufFlags::CHANGED);
    let first = s.buffers.get(id).first_line();
    for screen in &mut s.screens {
        for wind in &mut screen.windows {
            if wind.buf == id {
                wind.face = core_text::Face::at(first);
                wind.flags
                    .insert(core_display::WindFlags::HARD | core_display::WindFlags::MODE);
            }
        }
    }
    let name = s.buffers.get(id).name.clone();
    s.run_hook(i, HookId::Read, vec![Datum::str(name)])?;
    Ok(Datum::Nil)
}

fn write_current(s: &mut Session, i: &mut Interp, path: std::path::PathBuf) -> Result<Datum> {
    let id = s.cur_buf_id();
    let name = s.buffers.get(id).name.clone();
    s.run_hook(i, HookId::Write, vec![Datum::str(name)])?;
    let safe = s.global_modes.is_enabled("Safe");
    let delim = match s.buffers.get(id).delim {
        RecordDelim::None => RecordDelim::Lf,
        d => d,
    };
    let written = fileio::write_buffer(s.buffers.get(id), &path, delim, safe)?;
    {
        let buf = s.buffers.get_mut(id);
        buf.filename = Some(path.clone());
        buf.flags.remove(BufFlags::CHANGED);
    }
    s.cur_wind_mut().flags.insert(core_display::WindFlags::MODE);
    s.set_rtn_msg(format!("Wrote {} bytes to '{}'", written, path.display()));
    Ok(Datum::Nil)
}

fn cmd_save_file(s: &mut Session, i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    let path = s
        .cur_buf()
        .filename
        .clone()
        .ok_or_else(|| EdError::failure("No filename associated with buffer"))?;
    write_current(s, i, path)
}

fn cmd_write_file(s: &mut Session, i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let raw = arg_string(a, 0)?;
    let path = fileio::expand_path(&raw);
    write_current(s, i, path)
}

// ---- windows and screens --------------------------------------------------

fn cmd_split_wind(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    let buf_id = s.cur_buf_id();
    s.screen_mut().split(false)?;
    s.buffers.get_mut(buf_id).wind_count += 1;
    Ok(Datum::Nil)
}

fn cmd_join_wind(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    let cur = s.screen().cur;
    let removed = s.screen_mut().delete_window(cur)?;
    let buf = s.buffers.get_mut(removed.buf);
    buf.wind_count = buf.wind_count.saturating_sub(1);
    buf.set_background_face(removed.face);
    Ok(Datum::Nil)
}

fn cmd_only_wind(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    let removed = s.screen_mut().only();
    for wind in removed {
        let buf = s.buffers.get_mut(wind.buf);
        buf.wind_count = buf.wind_count.saturating_sub(1);
        buf.set_background_face(wind.face);
    }
    Ok(Datum::Nil)
}

fn cmd_next_wind(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    let screen = s.screen_mut();
    screen.cur = (screen.cur + 1) % screen.windows.len();
    Ok(Datum::Nil)
}

fn cmd_prev_wind(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    let screen = s.screen_mut();
    screen.cur = (screen.cur + screen.windows.len() - 1) % screen.windows.len();
    Ok(Datum::Nil)
}

// ---- screens --------------------------------------------------------------

fn cmd_new_screen(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    let buf_id = s.cur_buf_id();
    let face = s.cur_wind().face;
    let (rows, cols) = (s.screen().rows, s.screen().cols);
    let work_dir = s.screen().work_dir.clone();
    let screen = core_display::Screen::new(buf_id, face, rows, cols, work_dir);
    s.buffers.get_mut(buf_id).wind_count += 1;
    s.screens.push(screen);
    s.cur_screen = s.screens.len() - 1;
    s.set_rtn_msg(format!("Screen {} created", s.screens.len()));
    Ok(Datum::Int(s.screens.len() as i64))
}

fn cmd_next_screen(s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    let len = s.screens.len();
    let step = count(n).rem_euclid(len as i64) as usize;
    s.cur_screen = (s.cur_screen + step) % len;
    for wind in &mut s.screens[s.cur_screen].windows {
        wind.flags
            .insert(core_display::WindFlags::HARD | core_display::WindFlags::MODE);
    }
    Ok(Datum::Nil)
}

fn cmd_delete_screen(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    if s.screens.len() == 1 {
        return Err(EdError::failure("Cannot delete the only screen"));
    }
    let screen = s.screens.remove(s.cur_screen);
    for wind in screen.windows {
        let buf = s.buffers.get_mut(wind.buf);
        buf.wind_count = buf.wind_count.saturating_sub(1);
        buf.set_background_face(wind.face);
    }
    if s.cur_screen >= s.screens.len() {
        s.cur_screen = s.screens.len() - 1;
    }
    for wind in &mut s.screens[s.cur_screen].windows {
        wind.flags
            .insert(core_display::WindFlags::HARD | core_display::WindFlags::MODE);
    }
    Ok(Datum::Nil)
}

// ---- modes ----------------------------------------------------------------

fn cmd_chg_mode(s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let spec = arg_string(a, 0)?;
    for (name, on) in modes::parse_mode_spec(&spec) {
        let info = modes::find_mode(&name)?;
        match info.scope {
            modes::ModeScope::Global => s.global_modes.set(&name, on)?,
            modes::ModeScope::Buffer => {
                modes::set_buf_mode(s.cur_buf_mut(), &name, on)?;
            }
        }
    }
    s.cur_wind_mut().flags.insert(core_display::WindFlags::MODE);
    Ok(Datum::Nil)
}

// ---- macros ---------------------------------------------------------------

fn cmd_begin_macro(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    s.macro_rec.begin_record()?;
    s.set_rtn_msg("Macro recording started");
    Ok(Datum::Nil)
}

fn cmd_end_macro(s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    s.macro_rec.end_record()?;
    // Archive the capture on the macro ring, keys encoded as byte pairs.
    let mut encoded = Vec::with_capacity(s.macro_rec.keys().len() * 2);
    for key in s.macro_rec.keys() {
        encoded.extend_from_slice(&key.0.to_le_bytes());
    }
    s.rings.macro_ring.push(Datum::Str(encoded));
    s.set_rtn_msg("Macro recording ended");
    Ok(Datum::Nil)
}

fn cmd_play_macro(s: &mut Session, i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    s.macro_rec.begin_play(count(n), i.max_loop)?;
    Ok(Datum::Nil)
}

// ---- bindings, aliases, hooks ---------------------------------------------

fn cmd_bind_key(s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let spec = arg_string(a, 0)?;
    let name = arg_string(a, 1)?;
    if s.exec.get(&name).is_none() {
        return Err(EdError::failure(format!(
            "No such command or function '{name}'"
        )));
    }
    let key = parse_key(&spec)?;
    // Rebinding the sole key of a permanent command is refused.
    if let Some(old) = s.bindings.lookup(key).map(str::to_string) {
        if let Some(crate::registry::ExecEntry::Builtin(def)) = s.exec.get(&old) {
            if def.flags.contains(CmdFlags::PERM) && s.bindings.bound_count(&old) == 1 {
                return Err(EdError::failure(format!(
                    "Cannot unbind the only key of '{old}'"
                )));
            }
        }
    }
    s.bindings.bind(key, &name);
    s.set_rtn_msg(format!("'{spec}' bound to '{name}'"));
    Ok(Datum::Nil)
}

fn cmd_unbind_key(s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let spec = arg_string(a, 0)?;
    let key = parse_key(&spec)?;
    if let Some(old) = s.bindings.lookup(key).map(str::to_string) {
        if let Some(crate::registry::ExecEntry::Builtin(def)) = s.exec.get(&old) {
            if def.flags.contains(CmdFlags::PERM) && s.bindings.bound_count(&old) == 1 {
                return Err(EdError::failure(format!(
                    "Cannot unbind the only key of '{old}'"
                )));
            }
        }
    }
    s.bindings
        .unbind(key)
        .ok_or_else(|| EdError::failure(format!("Key '{spec}' is not bound")))?;
    Ok(Datum::Nil)
}

fn cmd_alias(s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let name = arg_string(a, 0)?;
    let target = arg_string(a, 1)?;
    s.exec.add_alias(&name, &target)?;
    if let Some(crate::registry::ExecEntry::UserCmd { buf })
    | Some(crate::registry::ExecEntry::UserFunc { buf }) = s.exec.resolve(&target)
    {
        s.buffers.get_mut(buf).alias_count += 1;
    }
    Ok(Datum::Nil)
}

fn cmd_delete_alias(s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let name = arg_string(a, 0)?;
    let target = s.exec.delete_alias(&name)?;
    if let Some(crate::registry::ExecEntry::UserCmd { buf })
    | Some(crate::registry::ExecEntry::UserFunc { buf }) = s.exec.resolve(&target)
    {
        let b = s.buffers.get_mut(buf);
        b.alias_count = b.alias_count.saturating_sub(1);
    }
    Ok(Datum::Nil)
}

fn cmd_set_hook(s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let hook_name = arg_string(a, 0)?;
    let target = arg_string(a, 1)?;
    let id = HookId::from_name(&hook_name)
        .ok_or_else(|| EdError::failure(format!("No such hook '{hook_name}'")))?;
    s.set_hook(id, &target)?;
    Ok(Datum::Nil)
}

fn cmd_clear_hook(s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let hook_name = arg_string(a, 0)?;
    let id = HookId::from_name(&hook_name)
        .ok_or_else(|| EdError::failure(format!("No such hook '{hook_name}'")))?;
    s.hooks.unbind(id);
    Ok(Datum::Nil)
}

// ---- script execution -----------------------------------------------------

fn cmd_eval(s: &mut Session, i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let src = arg_string(a, 0)?;
    eval_expr(i, s, &src)
}

fn cmd_xeq_buf(s: &mut Session, i: &mut Interp, n: Option<i64>, a: Args) -> Result<Datum> {
    let name = arg_string(a, 0)?;
    let id = s
        .buffers
        .find(&name)
        .ok_or_else(|| EdError::failure(format!("No such buffer '{name}'")))?;
    let lines = crate::split_lines(&s.buffers.get(id).contents());
    let args: Vec<Datum> = a.get(1..).unwrap_or(&[]).to_vec();
    exec_lines(i, s, &name, &lines, args, n)
}

fn cmd_message(s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let text = compose(a);
    s.set_rtn_msg(text);
    Ok(Datum::Nil)
}

fn cmd_exit_editor(_s: &mut Session, _i: &mut Interp, n: Option<i64>, _a: Args) -> Result<Datum> {
    // Forced exit (any n) skips modified-buffer checks in the caller.
    let _ = n;
    Err(EdError::new(Severity::UserExit, "exit"))
}

// ---- search and replace ---------------------------------------------------

fn remember_search(s: &mut Session, pat: &[u8]) {
    s.search_pat = pat.to_vec();
    s.rings.search.push(Datum::Str(pat.to_vec()));
}

fn cmd_search_forw(s: &mut Session, _i: &mut Interp, n: Option<i64>, a: Args) -> Result<Datum> {
    let raw = arg_bytes(a, 0)?;
    let pat = compile_pat(s, &raw)?;
    let mut from = s.point();
    let mut found = None;
    for _ in 0..count(n).max(1) {
        match search_forw(s.cur_buf(), from, &pat) {
            Some(span) => {
                from = span.end;
                found = Some(span);
            }
            None => return Err(EdError::failure("Not found")),
        }
    }
    remember_search(s, &raw);
    let span = found.expect("count >= 1");
    s.set_point(span.end);
    Ok(Datum::Str(region_bytes(s, span)))
}

fn cmd_search_back(s: &mut Session, _i: &mut Interp, n: Option<i64>, a: Args) -> Result<Datum> {
    let raw = arg_bytes(a, 0)?;
    let pat = compile_pat(s, &raw)?;
    let mut before = s.point();
    let mut found = None;
    for _ in 0..count(n).max(1) {
        match search_back(s.cur_buf(), before, &pat) {
            Some(span) => {
                before = span.start;
                found = Some(span);
            }
            None => return Err(EdError::failure("Not found")),
        }
    }
    remember_search(s, &raw);
    let span = found.expect("count >= 1");
    s.set_point(span.start);
    Ok(Datum::Str(region_bytes(s, span)))
}

fn region_bytes(s: &Session, span: crate::search::MatchSpan) -> Vec<u8> {
    let buf = s.cur_buf();
    let size = buf.bytes_between(span.start, span.end).unwrap_or(0);
    Region {
        start: span.start,
        size,
        line_count: 0,
    }
    .text(buf)
}

fn cmd_replace(s: &mut Session, _i: &mut Interp, n: Option<i64>, a: Args) -> Result<Datum> {
    let raw = arg_bytes(a, 0)?;
    let repl = arg_bytes(a, 1)?;
    let pat = compile_pat(s, &raw)?;
    let limit = n.unwrap_or(-1);
    let mut replaced = 0i64;
    let buf_id = s.cur_buf_id();
    let mut pt = s.point();
    loop {
        if limit >= 0 && replaced >= limit {
            break;
        }
        let Some(span) = search_forw(s.buffers.get(buf_id), pt, &pat) else {
            break;
        };
        let buf = s.buffers.get_mut(buf_id);
        let size = buf
            .bytes_between(span.start, span.end)
            .expect("span is ordered") as i64;
        if size == 0 {
            // A zero-width match cannot advance; step past it or stop.
            pt = span.start;
            if !buf.forw_char(&mut pt) {
                break;
            }
            continue;
        }
        pt = span.start;
        buf.delete_at(&mut pt, size)?;
        insert_text(buf, &mut pt, &repl, 1, InsertStyle::Insert)?;
        replaced += 1;
    }
    if replaced == 0 {
        return Err(EdError::failure("Not found"));
    }
    remember_search(s, &raw);
    s.replace_pat = repl.clone();
    s.rings.replace.push(Datum::Str(repl));
    s.finish_edit(pt);
    s.set_rtn_msg(format!("{replaced} substitutions"));
    Ok(Datum::Int(replaced))
}

// ---- functions ------------------------------------------------------------

fn fn_abs(_s: &mut Session, _i: &mut Interp, n: Option<i64>, a: Args) -> Result<Datum> {
    // With no argument the numeric prefix is the operand (`5 => abs()`).
    let value = match a.first() {
        Some(v) => v.as_int()?,
        None => n.ok_or_else(|| EdError::failure("Missing argument"))?,
    };
    Ok(Datum::Int(value.abs()))
}

fn fn_length(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let len = match a.first() {
        Some(Datum::Str(s)) => s.len() as i64,
        Some(Datum::Array(arr)) => arr.len() as i64,
        Some(other) => {
            return Err(EdError::failure(format!(
                "String or array expected, got {}",
                other.kind().name()
            )))
        }
        None => 0,
    };
    Ok(Datum::Int(len))
}

fn fn_to_str(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    Ok(Datum::Str(a[0].to_bytes()))
}

fn fn_to_int(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    match &a[0] {
        Datum::Int(n) => Ok(Datum::Int(*n)),
        Datum::Str(s) => {
            let text = String::from_utf8_lossy(s);
            text.trim()
                .parse::<i64>()
                .map(Datum::Int)
                .map_err(|_| EdError::failure(format!("Invalid number '{}'", text.trim())))
        }
        Datum::Bool(b) => Ok(Datum::Int(*b as i64)),
        other => Err(EdError::failure(format!(
            "Cannot convert {} to integer",
            other.kind().name()
        ))),
    }
}

fn fn_type_of(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    Ok(Datum::str(a[0].kind().name()))
}

fn fn_ord(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let s = arg_bytes(a, 0)?;
    s.first()
        .map(|&c| Datum::Int(c as i64))
        .ok_or_else(|| EdError::failure("Empty string"))
}

fn fn_chr(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let n = arg_int(a, 0)?;
    if !(0..=255).contains(&n) {
        return Err(EdError::failure(format!("Character value {n} out of range")));
    }
    Ok(Datum::Str(vec![n as u8]))
}

fn fn_str_index(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let hay = arg_bytes(a, 0)?;
    let needle = arg_bytes(a, 1)?;
    if needle.is_empty() {
        return Ok(Datum::Nil);
    }
    let found = hay
        .windows(needle.len())
        .position(|w| w == needle.as_slice());
    Ok(found.map(|p| Datum::Int(p as i64)).unwrap_or(Datum::Nil))
}

fn fn_sub(s: &mut Session, _i: &mut Interp, n: Option<i64>, a: Args) -> Result<Datum> {
    let source = arg_bytes(a, 0)?;
    let raw = arg_bytes(a, 1)?;
    let repl = arg_bytes(a, 2)?;
    let pat = compile_pat(s, &raw)?;
    Ok(Datum::Str(substitute(&source, &pat, &repl, n.unwrap_or(0))))
}

fn fn_upper_str(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    Ok(Datum::Str(arg_bytes(a, 0)?.to_ascii_uppercase()))
}

fn fn_lower_str(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    Ok(Datum::Str(arg_bytes(a, 0)?.to_ascii_lowercase()))
}

fn fn_split(_s: &mut Session, i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let delim = arg_bytes(a, 0)?;
    let text = arg_bytes(a, 1)?;
    let parts: Vec<Datum> = if delim.is_empty() {
        text.iter().map(|&c| Datum::Str(vec![c])).collect()
    } else {
        text.split(|&c| c == delim[0])
            .map(|p| Datum::Str(p.to_vec()))
            .collect()
    };
    Ok(Datum::Array(i.pool.alloc(parts)))
}

fn fn_join(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let delim = arg_bytes(a, 0)?;
    let arr = a[1].as_array()?;
    let mut out = Vec::new();
    for (idx, elem) in arr.to_vec().iter().enumerate() {
        if idx > 0 {
            out.extend_from_slice(&delim);
        }
        out.extend_from_slice(&elem.to_bytes());
    }
    Ok(Datum::Str(out))
}

fn fn_push(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let arr = a[0].as_array()?;
    arr.push(a[1].clone());
    Ok(a[0].clone())
}

fn fn_pop(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let arr = a[0].as_array()?;
    let mut elems = arr.to_vec();
    let last = elems.pop().unwrap_or(Datum::Nil);
    replace_elems(arr, elems);
    Ok(last)
}

fn fn_shift(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let arr = a[0].as_array()?;
    let mut elems = arr.to_vec();
    let first = if elems.is_empty() {
        Datum::Nil
    } else {
        elems.remove(0)
    };
    replace_elems(arr, elems);
    Ok(first)
}

fn fn_unshift(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let arr = a[0].as_array()?;
    let mut elems = arr.to_vec();
    elems.insert(0, a[1].clone());
    replace_elems(arr, elems);
    Ok(a[0].clone())
}

fn replace_elems(arr: &core_value::ArrayRef, elems: Vec<Datum>) {
    // Rewrite in place so every shared reference observes the change.
    arr.replace(elems);
}

fn fn_array(_s: &mut Session, i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    // array(len [, fill])
    let len = arg_int(a, 0)?.max(0) as usize;
    let fill = a.get(1).cloned().unwrap_or(Datum::Nil);
    Ok(Datum::Array(i.pool.alloc(vec![fill; len])))
}

fn fn_env(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let name = arg_string(a, 0)?;
    Ok(std::env::var(&name)
        .map(Datum::str)
        .unwrap_or(Datum::Nil))
}

fn fn_defined(s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let name = arg_string(a, 0)?;
    use core_script::Host;
    Ok(Datum::Bool(s.lookup(&name).is_some()))
}

fn fn_sprintf(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    let fmt = arg_bytes(a, 0)?;
    Ok(Datum::Str(core_script::expr::format_bytes(&fmt, &a[1..])?))
}

fn fn_viz(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, a: Args) -> Result<Datum> {
    Ok(Datum::Str(a[0].to_viz_bytes()))
}

fn cmd_beep(_s: &mut Session, _i: &mut Interp, _n: Option<i64>, _a: Args) -> Result<Datum> {
    // The terminal driver beeps at refresh; nothing to do here.
    Ok(Datum::Nil)
}

// ---- the table ------------------------------------------------------------

const E: CmdFlags = CmdFlags::EDIT;
const F: CmdFlags = CmdFlags::FUNC;

macro_rules! cmd {
    ($name:literal, $flags:expr, $min:literal, $max:literal, $f:expr, $help:literal) => {
        BuiltinDef {
            name: $name,
            flags: $flags,
            min_args: $min,
            max_args: $max,
            func: $f,
            help: $help,
        }
    };
}

pub static BUILTINS: &[BuiltinDef] = &[
    // Motion.
    cmd!("forwChar", CmdFlags::PERM, 0, 0, cmd_forw_char, "Move point forward [-]n characters"),
    cmd!("backChar", CmdFlags::PERM, 0, 0, cmd_back_char, "Move point backward [-]n characters"),
    cmd!("forwLine", CmdFlags::empty(), 0, 0, cmd_forw_line, "Move point forward [-]n lines"),
    cmd!("backLine", CmdFlags::empty(), 0, 0, cmd_back_line, "Move point backward [-]n lines"),
    cmd!("beginLine", CmdFlags::empty(), 0, 0, cmd_begin_line, "Move point to beginning of line"),
    cmd!("endLine", CmdFlags::empty(), 0, 0, cmd_end_line, "Move point to end of line"),
    cmd!("beginBuf", CmdFlags::empty(), 0, 0, cmd_begin_buf, "Move point to beginning of buffer"),
    cmd!("endBuf", CmdFlags::empty(), 0, 0, cmd_end_buf, "Move point to end of buffer"),
    cmd!("gotoLine", CmdFlags::empty(), 0, 1, cmd_goto_line, "Move point to line n"),
    cmd!("forwWord", CmdFlags::empty(), 0, 0, cmd_forw_word, "Move point forward n words"),
    cmd!("backWord", CmdFlags::empty(), 0, 0, cmd_back_word, "Move point backward n words"),
    cmd!("forwPage", CmdFlags::empty(), 0, 0, cmd_forw_page, "Scroll forward n pages"),
    cmd!("backPage", CmdFlags::empty(), 0, 0, cmd_back_page, "Scroll backward n pages"),
    cmd!("setMark", CmdFlags::empty(), 0, 1, cmd_set_mark, "Set a mark at point"),
    cmd!("gotoMark", CmdFlags::empty(), 0, 1, cmd_goto_mark, "Move point to a mark"),
    cmd!("deleteMark", CmdFlags::empty(), 0, 1, cmd_delete_mark, "Delete a mark"),
    cmd!("gotoFence", CmdFlags::empty(), 0, 0, cmd_goto_fence, "Move point to the matching fence"),
    // Insertion.
    cmd!("insert", E, 1, -1, cmd_insert, "Insert concatenated arguments at point n times"),
    cmd!("newline", E, 0, 0, cmd_newline, "Insert n line breaks at point"),
    cmd!("openLine", E, 0, 0, cmd_open_line, "Open n lines after point"),
    cmd!("tab", E, 0, 0, cmd_tab, "Insert a tab (or soft tab spaces) n times"),
    // Delete/kill/copy.
    cmd!("deleteForwChar", E, 0, 0, cmd_delete_forw_char, "Delete n characters forward"),
    cmd!("backspace", E.union(CmdFlags::PERM), 0, 0, cmd_backspace, "Delete n characters backward"),
    cmd!("killLine", E, 0, 0, cmd_kill_line, "Kill [-]n lines to the kill ring"),
    cmd!("deleteLine", E, 0, 0, cmd_delete_line, "Delete [-]n lines to the delete ring"),
    cmd!("copyLine", CmdFlags::empty(), 0, 0, cmd_copy_line, "Copy [-]n lines to the kill ring"),
    cmd!("killRegion", E, 0, 0, cmd_kill_region, "Kill the region to the kill ring"),
    cmd!("deleteRegion", E, 0, 0, cmd_delete_region, "Delete the region to the delete ring"),
    cmd!("copyRegion", CmdFlags::empty(), 0, 0, cmd_copy_region, "Copy the region to the kill ring"),
    cmd!("killWord", E, 0, 0, cmd_kill_word, "Kill [-]n words to the kill ring"),
    cmd!("yank", E, 0, 0, cmd_yank, "Insert kill ring entry n at point"),
    cmd!("undelete", E, 0, 0, cmd_undelete, "Insert delete ring entry n at point"),
    cmd!("cycleKillRing", CmdFlags::empty(), 0, 0, cmd_cycle_kill_ring, "Cycle the kill ring [-]n entries"),
    // Case, tabs, wrap, sort.
    cmd!("upperCaseWord", E, 0, 0, cmd_upper_word, "Upper-case n words from point"),
    cmd!("lowerCaseWord", E, 0, 0, cmd_lower_word, "Lower-case n words from point"),
    cmd!("titleCaseWord", E, 0, 0, cmd_title_word, "Title-case n words from point"),
    cmd!("upperCaseLine", E, 0, 0, cmd_upper_line, "Upper-case n lines"),
    cmd!("lowerCaseLine", E, 0, 0, cmd_lower_line, "Lower-case n lines"),
    cmd!("detabLine", E, 0, 0, cmd_detab_line, "Convert tabs to spaces on n lines"),
    cmd!("entabLine", E, 0, 0, cmd_entab_line, "Convert spaces to tabs on n lines"),
    cmd!("wrapLine", E, 0, 1, cmd_wrap_line, "Rewrap n lines at the wrap column"),
    cmd!("sortRegion", E, 0, 1, cmd_sort_region, "Sort the lines of the region"),
    // Narrowing.
    cmd!("narrowBuf", CmdFlags::empty(), 0, 0, cmd_narrow_buf, "Narrow buffer to [-]n lines from point"),
    cmd!("widenBuf", CmdFlags::empty(), 0, 0, cmd_widen_buf, "Restore a narrowed buffer"),
    // Buffers and files.
    cmd!("selectBuf", CmdFlags::empty(), 1, 1, cmd_select_buf, "Switch to a buffer, creating it if needed"),
    cmd!("deleteBuf", CmdFlags::empty(), 1, 1, cmd_delete_buf, "Delete a buffer"),
    cmd!("renameBuf", CmdFlags::empty(), 1, 1, cmd_rename_buf, "Rename the current buffer"),
    cmd!("clearBuf", CmdFlags::empty(), 0, 0, cmd_clear_buf, "Clear the current buffer"),
    cmd!("findFile", CmdFlags::empty(), 1, 1, cmd_find_file, "Visit a file in its own buffer"),
    cmd!("readFile", CmdFlags::empty(), 1, 1, cmd_read_file, "Read a file into the current buffer"),
    cmd!("saveFile", CmdFlags::empty(), 0, 0, cmd_save_file, "Save the current buffer to its file"),
    cmd!("writeFile", CmdFlags::empty(), 1, 1, cmd_write_file, "Write the current buffer to a file"),
    // Windows.
    cmd!("splitWind", CmdFlags::empty(), 0, 0, cmd_split_wind, "Split the current window"),
    cmd!("joinWind", CmdFlags::empty(), 0, 0, cmd_join_wind, "Delete the current window, growing a neighbor"),
    cmd!("onlyWind", CmdFlags::empty(), 0, 0, cmd_only_wind, "Make the current window the only one"),
    cmd!("nextWind", CmdFlags::empty(), 0, 0, cmd_next_wind, "Switch to the next window"),
    cmd!("prevWind", CmdFlags::empty(), 0, 0, cmd_prev_wind, "Switch to the previous window"),
    cmd!("newScreen", CmdFlags::empty(), 0, 0, cmd_new_screen, "Create a screen showing the current buffer"),
    cmd!("nextScreen", CmdFlags::empty(), 0, 0, cmd_next_screen, "Switch to the next screen"),
    cmd!("deleteScreen", CmdFlags::empty(), 0, 0, cmd_delete_screen, "Delete the current screen"),
    // Modes.
    cmd!("chgMode", CmdFlags::empty(), 1, 1, cmd_chg_mode, "Change modes: [^]MODE[,...]"),
    // Macros.
    cmd!("beginMacro", CmdFlags::empty(), 0, 0, cmd_begin_macro, "Begin recording a keyboard macro"),
    cmd!("endMacro", CmdFlags::empty(), 0, 0, cmd_end_macro, "End macro recording"),
    cmd!("playMacro", CmdFlags::empty(), 0, 0, cmd_play_macro, "Play the keyboard macro n times"),
    // Bindings, aliases, hooks.
    cmd!("bindKey", CmdFlags::empty(), 2, 2, cmd_bind_key, "Bind a key sequence to a command"),
    cmd!("unbindKey", CmdFlags::empty(), 1, 1, cmd_unbind_key, "Unbind a key sequence"),
    cmd!("alias", CmdFlags::empty(), 2, 2, cmd_alias, "Create an alias for a command or function"),
    cmd!("deleteAlias", CmdFlags::empty(), 1, 1, cmd_delete_alias, "Delete an alias"),
    cmd!("setHook", CmdFlags::HOOK, 2, 2, cmd_set_hook, "Bind a function to a hook"),
    cmd!("clearHook", CmdFlags::empty(), 1, 1, cmd_clear_hook, "Unbind a hook"),
    // Script execution.
    cmd!("eval", CmdFlags::empty(), 1, 1, cmd_eval, "Evaluate an expression string"),
    cmd!("xeqBuf", CmdFlags::empty(), 1, -1, cmd_xeq_buf, "Execute a buffer as a script"),
    cmd!("message", CmdFlags::empty(), 1, -1, cmd_message, "Set the return message"),
    cmd!("exitEditor", CmdFlags::empty(), 0, 0, cmd_exit_editor, "Exit the editor"),
    cmd!("beep", CmdFlags::empty(), 0, 0, cmd_beep, "Sound the terminal bell"),
    // Search.
    cmd!("searchForw", CmdFlags::empty(), 1, 1, cmd_search_forw, "Search forward for a pattern"),
    cmd!("searchBack", CmdFlags::empty(), 1, 1, cmd_search_back, "Search backward for a pattern"),
    cmd!("replace", E, 2, 2, cmd_replace, "Replace n occurrences of a pattern"),
    // Functions.
    cmd!("abs", F, 0, 1, fn_abs, "Absolute value"),
    cmd!("length", F, 1, 1, fn_length, "Length of a string or array"),
    cmd!("toStr", F, 1, 1, fn_to_str, "Stringify a value"),
    cmd!("toInt", F, 1, 1, fn_to_int, "Convert a value to an integer"),
    cmd!("typeOf", F, 1, 1, fn_type_of, "Type name of a value"),
    cmd!("ord", F, 1, 1, fn_ord, "First byte of a string"),
    cmd!("chr", F, 1, 1, fn_chr, "One-byte string from a character code"),
    cmd!("index", F, 2, 2, fn_str_index, "Position of a substring, or nil"),
    cmd!("sub", F, 3, 3, fn_sub, "Substitute n occurrences in a string"),
    cmd!("upperCaseStr", F, 1, 1, fn_upper_str, "Upper-case a string"),
    cmd!("lowerCaseStr", F, 1, 1, fn_lower_str, "Lower-case a string"),
    cmd!("split", F, 2, 2, fn_split, "Split a string into an array"),
    cmd!("join", F, 2, 2, fn_join, "Join an array into a string"),
    cmd!("push", F, 2, 2, fn_push, "Append an element to an array"),
    cmd!("pop", F, 1, 1, fn_pop, "Remove and return the last element"),
    cmd!("shift", F, 1, 1, fn_shift, "Remove and return the first element"),
    cmd!("unshift", F, 2, 2, fn_unshift, "Prepend an element to an array"),
    cmd!("array", F, 1, 2, fn_array, "Build an array of n elements"),
    cmd!("env", F, 1, 1, fn_env, "Value of an environment variable, or nil"),
    cmd!("defined?", F, 1, 1, fn_defined, "True when a name is an executable"),
    cmd!("sprintf", F, 1, -1, fn_sprintf, "Format a string"),
    cmd!("viz", F, 1, 1, fn_viz, "Visualize non-printable characters"),
];

impl Session {
    /// Name under which a user-routine buffer is registered, if any.
    pub(crate) fn routine_name_of(&self, id: core_text::BufferId) -> Option<String> {
        let name = &self.buffers.get(id).name;
        name.strip_prefix(core_text::ROUTINE_PREFIX).map(|r| r.to_string())
    }

    pub(crate) fn hook_targets(&self) -> impl Iterator<Item = &str> {
        crate::hooks::HOOK_IDS
            .iter()
            .filter_map(|id| self.hooks.target(*id))
    }
}

/// Format a datum for the message line, visualizing non-printables.
pub fn display_value(value: &Datum) -> String {
    String::from_utf8_lossy(&viz::viz_bytes(&value.to_bytes())).into_owned()
}
