//! Property tests for the line store: link invariants under arbitrary edit
//! sequences, mark adjustment rules, and narrow/widen round-trips.

use proptest::prelude::*;

use core_text::{Buffer, Mark, Point};

#[derive(Debug, Clone)]
enum EditOp {
    InsertChar { line_pick: usize, off_pick: usize, c: u8, n: usize },
    InsertNewline { line_pick: usize, off_pick: usize },
    Delete { line_pick: usize, off_pick: usize, n: i64 },
}

fn edit_op() -> impl Strategy<Value = EditOp> {
    prop_oneof![
        (any::<usize>(), any::<usize>(), b'a'..=b'z', 1usize..5).prop_map(
            |(line_pick, off_pick, c, n)| EditOp::InsertChar {
                line_pick,
                off_pick,
                c,
                n
            }
        ),
        (any::<usize>(), any::<usize>())
            .prop_map(|(line_pick, off_pick)| EditOp::InsertNewline { line_pick, off_pick }),
        (any::<usize>(), any::<usize>(), -6i64..6).prop_map(|(line_pick, off_pick, n)| {
            EditOp::Delete {
                line_pick,
                off_pick,
                n,
            }
        }),
    ]
}

fn pick_point(buf: &Buffer, line_pick: usize, off_pick: usize) -> Point {
    let count = buf.line_count();
    let line = buf.line_at(line_pick % count + 1).expect("in range");
    let used = buf.line_used(line);
    Point::new(line, if used == 0 { 0 } else { off_pick % (used + 1) })
}

fn apply(buf: &mut Buffer, op: &EditOp) {
    match *op {
        EditOp::InsertChar {
            line_pick,
            off_pick,
            c,
            n,
        } => {
            let mut pt = pick_point(buf, line_pick, off_pick);
            buf.insert_char(&mut pt, c, n);
        }
        EditOp::InsertNewline { line_pick, off_pick } => {
            let mut pt = pick_point(buf, line_pick, off_pick);
            buf.insert_newline(&mut pt);
        }
        EditOp::Delete {
            line_pick,
            off_pick,
            n,
        } => {
            let mut pt = pick_point(buf, line_pick, off_pick);
            // Out-of-range deletes fail without mutating; both paths are
            // exercised.
            let _ = buf.delete_at(&mut pt, n);
        }
    }
}

proptest! {
    /// §1: after any edit sequence the chain still satisfies
    /// first.prev == last, last.next == None, and mutual prev/next links.
    #[test]
    fn line_links_hold_under_edits(
        seed in "[a-z\n]{0,40}",
        ops in proptest::collection::vec(edit_op(), 0..40),
    ) {
        let mut buf = Buffer::new("prop");
        buf.set_text(seed.as_bytes());
        for op in &ops {
            apply(&mut buf, op);
            prop_assert!(buf.check_links());
        }
    }

    /// Buffer contents stay consistent with the line walk (no lost bytes
    /// between contents() and per-line reads).
    #[test]
    fn contents_matches_line_walk(
        seed in "[a-z\n]{0,30}",
        ops in proptest::collection::vec(edit_op(), 0..25),
    ) {
        let mut buf = Buffer::new("prop");
        buf.set_text(seed.as_bytes());
        for op in &ops {
            apply(&mut buf, op);
        }
        let mut walked = Vec::new();
        let mut first = true;
        for id in buf.lines().collect::<Vec<_>>() {
            if !first {
                walked.push(b'\n');
            }
            first = false;
            walked.extend_from_slice(buf.line_text(id));
        }
        prop_assert_eq!(walked, buf.contents());
    }

    /// §3 insert rule: a mark strictly past the insert offset advances by
    /// n, a mark at or before it stays.
    #[test]
    fn mark_insert_adjustment(
        text in "[a-z]{1,20}",
        p in 0usize..20,
        q in 0usize..20,
        k in 1usize..5,
    ) {
        let mut buf = Buffer::new("prop");
        buf.set_text(text.as_bytes());
        let line = buf.first_line();
        let used = buf.line_used(line);
        let p = p.min(used);
        let q = q.min(used);
        buf.set_mark(Mark::new(b'm', line, q, 0));
        let mut pt = Point::new(line, p);
        buf.insert_char(&mut pt, b'!', k);
        let moved = buf.mark(b'm').unwrap().offset();
        if q > p {
            prop_assert_eq!(moved, q + k);
        } else {
            prop_assert_eq!(moved, q);
        }
    }

    /// §3 delete rule: q <= p stays; p < q <= p+k collapses to p;
    /// q > p+k shifts left by k.
    #[test]
    fn mark_delete_adjustment(
        text in "[a-z]{2,24}",
        p in 0usize..24,
        q in 0usize..24,
        k in 1usize..6,
    ) {
        let mut buf = Buffer::new("prop");
        buf.set_text(text.as_bytes());
        let line = buf.first_line();
        let used = buf.line_used(line);
        let p = p.min(used.saturating_sub(1));
        let k = k.min(used - p);
        let q = q.min(used);
        buf.set_mark(Mark::new(b'm', line, q, 0));
        let mut pt = Point::new(line, p);
        buf.delete_at(&mut pt, k as i64).unwrap();
        let moved = buf.mark(b'm').unwrap().offset();
        if q <= p {
            prop_assert_eq!(moved, q);
        } else if q <= p + k {
            prop_assert_eq!(moved, p);
        } else {
            prop_assert_eq!(moved, q - k);
        }
    }

    /// §2: narrow then widen restores the buffer byte-for-byte and every
    /// user mark.
    #[test]
    fn narrow_widen_round_trip(
        text in "[a-c\n]{1,60}",
        start_pick in any::<usize>(),
        count in 1usize..10,
        mark_line_pick in any::<usize>(),
        mark_off_pick in any::<usize>(),
    ) {
        let mut buf = Buffer::new("prop");
        buf.set_text(text.as_bytes());
        let before = buf.contents();
        let lines = buf.line_count();
        let mark_at = pick_point(&buf, mark_line_pick, mark_off_pick);
        buf.set_mark(Mark::new(b'z', mark_at.line, mark_at.off, 0));

        let first_keep = buf.line_at(start_pick % lines + 1).unwrap();
        buf.narrow(first_keep, count).unwrap();
        prop_assert!(buf.check_links());
        buf.widen().unwrap();
        prop_assert!(buf.check_links());
        prop_assert_eq!(before, buf.contents());
        let mark = buf.mark(b'z').unwrap();
        prop_assert_eq!(mark.line, mark_at.line);
        prop_assert_eq!(mark.offset(), mark_at.off);
    }
}
