//! End-to-end editor scenarios: edits through the command table, narrowing
//! with mark preservation, macro playback, hooks, and the inter-command
//! garbage sweep.

use core_input::{ExtKey, KeyFlags};
use core_script::{exec_lines, Interp};
use core_session::dispatch;
use core_session::{HookId, Session};
use core_text::{Face, Mark, Point};
use core_value::Datum;
use pretty_assertions::assert_eq;

fn setup() -> (Session, Interp) {
    let session = Session::new(24, 80).unwrap();
    let interp = Interp::new();
    (session, interp)
}

fn set_text(s: &mut Session, text: &str) {
    let id = s.cur_buf_id();
    s.buffers.get_mut(id).set_text(text.as_bytes());
    // Old line handles are gone; rebuild the whole face.
    let first = s.buffers.get(id).first_line();
    s.cur_wind_mut().face = Face::at(first);
}

fn contents(s: &Session) -> Vec<u8> {
    s.cur_buf().contents()
}

fn run_script(s: &mut Session, i: &mut Interp, lines: &[&str]) -> Datum {
    let body: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    exec_lines(i, s, "test", &body, Vec::new(), None).unwrap()
}

#[test]
fn insert_then_undelete_round_trips() {
    let (mut s, mut i) = setup();
    s.call_by_name(&mut i, "insert", None, vec![Datum::str("abc\ndef\n")])
        .unwrap();
    assert_eq!(contents(&s), b"abc\ndef\n");

    let first = s.cur_buf().first_line();
    s.set_point(Point::new(first, 3));
    s.call_by_name(&mut i, "backspace", Some(3), Vec::new())
        .unwrap();
    assert_eq!(contents(&s), b"\ndef\n");
    assert_eq!(s.point(), Point::new(s.cur_buf().first_line(), 0));

    s.call_by_name(&mut i, "undelete", None, Vec::new()).unwrap();
    assert_eq!(contents(&s), b"abc\ndef\n");
    assert_eq!(s.point().off, 3);
}

#[test]
fn narrow_edit_widen_preserves_outside_mark() {
    let (mut s, mut i) = setup();
    set_text(&mut s, "one\ntwo\nthree\nfour\n");
    let line4 = s.cur_buf().line_at(4).unwrap();
    {
        let id = s.cur_buf_id();
        s.buffers.get_mut(id).set_mark(Mark::new(b'a', line4, 2, 0));
    }

    // Point at line 2, keep 2 lines.
    let line2 = s.cur_buf().line_at(2).unwrap();
    s.set_point(Point::new(line2, 0));
    s.call_by_name(&mut i, "narrowBuf", Some(2), Vec::new())
        .unwrap();
    assert_eq!(contents(&s), b"two\nthree");

    // Insert at the start of the narrowed view.
    let first = s.cur_buf().first_line();
    s.set_point(Point::new(first, 0));
    s.call_by_name(&mut i, "insert", None, vec![Datum::str("X")])
        .unwrap();

    s.call_by_name(&mut i, "widenBuf", None, Vec::new()).unwrap();
    assert_eq!(contents(&s), b"one\nXtwo\nthree\nfour\n");
    let mark = *s.cur_buf().mark(b'a').unwrap();
    assert_eq!(mark.line, line4);
    assert_eq!(mark.offset(), 2);
}

#[test]
fn macro_playback_repeats_edits() {
    let (mut s, mut i) = setup();
    set_text(&mut s, "foo bar baz");

    let forw = ExtKey::ctrl(b'f');
    let upper = ExtKey::new(b'u', KeyFlags::META);

    s.call_by_name(&mut i, "beginMacro", None, Vec::new()).unwrap();
    for key in [forw, forw, upper] {
        dispatch::top_level_key(&mut s, &mut i, key).unwrap();
    }
    s.call_by_name(&mut i, "endMacro", None, Vec::new()).unwrap();
    // The three keys ran once during recording.
    assert_eq!(contents(&s), b"foO bar baz");
    assert_eq!(s.macro_rec.keys().len(), 3);

    // Rewind the buffer and play the macro three times.
    set_text(&mut s, "foo bar baz");
    s.macro_rec.begin_play(3, 0).unwrap();
    dispatch::drain_macro(&mut s, &mut i).unwrap();
    assert_eq!(contents(&s), b"foO bAR bAZ");
}

#[test]
fn sort_region_descending_marks_block() {
    let (mut s, mut i) = setup();
    set_text(&mut s, "banana\napple\ncherry\ndate\n");

    // Region: mark at buffer start, point at end of the fourth line.
    s.call_by_name(&mut i, "setMark", None, Vec::new()).unwrap();
    let line4 = s.cur_buf().line_at(4).unwrap();
    s.set_point(Point::new(line4, 4));

    let opts = i.pool.alloc(vec![Datum::str("Descending")]);
    s.call_by_name(&mut i, "sortRegion", None, vec![Datum::Array(opts)])
        .unwrap();
    assert_eq!(contents(&s), b"date\ncherry\nbanana\napple\n");

    // The region covers the sorted block.
    let mark = s.cur_buf().mark(b' ').unwrap();
    assert_eq!(mark.line, s.cur_buf().first_line());
    assert_eq!(s.cur_buf().line_num(s.point().line), 4);
}

#[test]
fn script_substitution() {
    let (mut s, mut i) = setup();
    let one = s
        .call_by_name(
            &mut i,
            "sub",
            None,
            vec![
                Datum::str("The quick brown fox"),
                Datum::str("quick"),
                Datum::str("lazy"),
            ],
        )
        .unwrap();
    assert_eq!(one, Datum::str("The lazy brown fox"));

    let both = s
        .call_by_name(
            &mut i,
            "sub",
            Some(2),
            vec![
                Datum::str("aha aha"),
                Datum::str("aha"),
                Datum::str("oho"),
            ],
        )
        .unwrap();
    assert_eq!(both, Datum::str("oho oho"));
}

#[test]
fn create_buf_hook_fires_once_per_new_buffer() {
    let (mut s, mut i) = setup();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("new");
    std::fs::write(&path, b"hello\n").unwrap();

    run_script(
        &mut s,
        &mut i,
        &[
            "$names = []",
            "function logNew(1)",
            "  push $names, $1",
            "endroutine",
            "setHook 'createBuf', 'logNew'",
        ],
    );
    let path_str = path.to_string_lossy().into_owned();
    s.call_by_name(&mut i, "findFile", None, vec![Datum::str(path_str.clone())])
        .unwrap();

    let names = i.globals.get("names").unwrap().as_array().unwrap().to_vec();
    assert_eq!(names, vec![Datum::str("new")]);
    assert_eq!(contents(&s), b"hello\n");

    // Visiting the same file again reuses the buffer; no second firing.
    s.call_by_name(&mut i, "selectBuf", None, vec![Datum::str("untitled")])
        .unwrap();
    s.call_by_name(&mut i, "findFile", None, vec![Datum::str(path_str)])
        .unwrap();
    let names = i.globals.get("names").unwrap().as_array().unwrap().to_vec();
    assert_eq!(names.len(), 1);

    // The logged array is rooted in a global: it survives the sweep.
    i.sweep();
    let names = i.globals.get("names").unwrap().as_array().unwrap().to_vec();
    assert_eq!(names, vec![Datum::str("new")]);
}

#[test]
fn failing_hook_is_quarantined() {
    let (mut s, mut i) = setup();
    run_script(
        &mut s,
        &mut i,
        &[
            "function badHook(1)",
            "  return 1 / 0",
            "endroutine",
            "setHook 'createBuf', 'badHook'",
        ],
    );
    assert_eq!(s.hooks.target(HookId::CreateBuf), Some("badHook"));

    let err = s.obtain_buffer(&mut i, "fresh").unwrap_err();
    assert!(err.message.contains("disabled 'createBuf' hook"), "{err}");
    // The hook is erased but rebindable.
    assert!(s.hooks.target(HookId::CreateBuf).is_none());
    s.set_hook(HookId::CreateBuf, "badHook").unwrap();
}

#[test]
fn consecutive_kill_keys_accumulate() {
    let (mut s, mut i) = setup();
    set_text(&mut s, "one\ntwo\nthree\n");
    let kill_key = ExtKey::ctrl(b'k');
    dispatch::top_level_key(&mut s, &mut i, kill_key).unwrap();
    dispatch::top_level_key(&mut s, &mut i, kill_key).unwrap();
    // Both lines landed in one kill ring entry.
    assert_eq!(s.rings.kill.size(), 1);
    assert_eq!(
        s.rings.kill.top().unwrap(),
        &Datum::Str(b"one\ntwo\n".to_vec())
    );

    // A non-kill command breaks the chain.
    dispatch::top_level_key(&mut s, &mut i, ExtKey::ctrl(b'f')).unwrap();
    dispatch::top_level_key(&mut s, &mut i, kill_key).unwrap();
    assert_eq!(s.rings.kill.size(), 2);
}

#[test]
fn self_insert_respects_overwrite_mode() {
    let (mut s, mut i) = setup();
    set_text(&mut s, "abcd");
    run_script(&mut s, &mut i, &["chgMode 'Over'"]);
    dispatch::top_level_key(&mut s, &mut i, ExtKey::plain(b'Z')).unwrap();
    assert_eq!(contents(&s), b"Zbcd");
}

#[test]
fn wrap_hook_fires_past_wrap_column() {
    let (mut s, mut i) = setup();
    run_script(
        &mut s,
        &mut i,
        &[
            "$wrapCol = 4",
            "$fired = 0",
            "function onWrap",
            "  $fired++",
            "endroutine",
            "setHook 'wrap', 'onWrap'",
            "chgMode 'Wrap'",
        ],
    );
    for c in *b"hello" {
        dispatch::top_level_key(&mut s, &mut i, ExtKey::plain(c)).unwrap();
    }
    assert_eq!(i.globals.get("fired"), Some(&Datum::Int(1)));
}

#[test]
fn script_errors_carry_buffer_and_line() {
    let (mut s, mut i) = setup();
    let body: Vec<String> = ["$x = 1", "badcall()"].iter().map(|l| l.to_string()).collect();
    let err = exec_lines(&mut i, &mut s, "startup", &body, Vec::new(), None).unwrap_err();
    let shown = format!("{err}");
    assert!(
        shown.starts_with("Script failed, in buffer 'startup' at line 2"),
        "{shown}"
    );
}

#[test]
fn user_command_reaches_editor_state() {
    let (mut s, mut i) = setup();
    set_text(&mut s, "alpha\nbeta\n");
    run_script(
        &mut s,
        &mut i,
        &[
            "command stamp(1)",
            "  endBuf",
            "  insert $1",
            "endroutine",
            "stamp '!'",
        ],
    );
    assert_eq!(contents(&s), b"alpha\nbeta\n!");
}

#[test]
fn abort_key_unwinds_with_user_abort() {
    let (mut s, mut i) = setup();
    let err = dispatch::top_level_key(&mut s, &mut i, ExtKey::ctrl(b'g')).unwrap_err();
    assert_eq!(err.severity, core_status::Severity::UserAbort);
    assert_eq!(err.message, "Aborted");
}

#[test]
fn alias_dispatches_to_target() {
    let (mut s, mut i) = setup();
    set_text(&mut s, "x");
    s.call_by_name(
        &mut i,
        "alias",
        None,
        vec![Datum::str("fc"), Datum::str("forwChar")],
    )
    .unwrap();
    s.call_by_name(&mut i, "fc", None, Vec::new()).unwrap();
    assert_eq!(s.point().off, 1);
    s.call_by_name(&mut i, "deleteAlias", None, vec![Datum::str("fc")])
        .unwrap();
    assert!(s.call_by_name(&mut i, "fc", None, Vec::new()).is_err());
}

#[test]
fn split_and_only_maintain_wind_counts() {
    let (mut s, mut i) = setup();
    s.call_by_name(&mut i, "splitWind", None, Vec::new()).unwrap();
    assert_eq!(s.cur_buf().wind_count, 2);
    assert_eq!(s.screen().window_count(), 2);
    s.call_by_name(&mut i, "onlyWind", None, Vec::new()).unwrap();
    assert_eq!(s.cur_buf().wind_count, 1);
    assert_eq!(s.screen().window_count(), 1);
}

#[test]
fn search_commands_move_point_and_remember_pattern() {
    let (mut s, mut i) = setup();
    set_text(&mut s, "alpha beta gamma\nbeta again\n");
    let found = s
        .call_by_name(&mut i, "searchForw", None, vec![Datum::str("beta")])
        .unwrap();
    assert_eq!(found, Datum::str("beta"));
    assert_eq!(s.point().off, 10);
    assert_eq!(s.search_pat, b"beta".to_vec());
    assert_eq!(s.rings.search.size(), 1);

    let err = s
        .call_by_name(&mut i, "searchForw", None, vec![Datum::str("zeta")])
        .unwrap_err();
    assert_eq!(err.message, "Not found");
}

#[test]
fn replace_rewrites_from_point() {
    let (mut s, mut i) = setup();
    set_text(&mut s, "aa bb aa\n");
    let n = s
        .call_by_name(
            &mut i,
            "replace",
            None,
            vec![Datum::str("aa"), Datum::str("XX")],
        )
        .unwrap();
    assert_eq!(n, Datum::Int(2));
    assert_eq!(contents(&s), b"XX bb XX\n");
}
