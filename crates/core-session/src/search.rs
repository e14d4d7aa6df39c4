//! Buffer search over the regex engine.
//!
//! Patterns compile once per search; plain (non-Regexp) searches compile
//! the pattern with metacharacters escaped, and case folding follows the
//! `Exact` global mode. Backward search reuses the forward automaton and
//! takes the last match before the point.

use core_status::{EdError, Result};
use core_text::{Buffer, Point};
use regex::bytes::{Regex, RegexBuilder};

#[derive(Debug)]
pub struct Pattern {
    pub raw: Vec<u8>,
    re: Regex,
}

impl Pattern {
    /// Compile `raw`. `regexp` selects regular-expression syntax; `exact`
    /// selects case-sensitive matching.
    pub fn compile(raw: &[u8], regexp: bool, exact: bool) -> Result<Pattern> {
        let text = String::from_utf8_lossy(raw);
        let source = if regexp {
            text.into_owned()
        } else {
            regex::escape(&text)
        };
        let re = RegexBuilder::new(&source)
            .case_insensitive(!exact)
            .multi_line(true)
            .build()
            .map_err(|e| EdError::failure(format!("Invalid pattern: {e}")))?;
        Ok(Pattern {
            raw: raw.to_vec(),
            re,
        })
    }

    pub fn is_match(&self, subject: &[u8]) -> bool {
        self.re.is_match(subject)
    }
}

/// A match location as buffer points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: Point,
    pub end: Point,
}

fn abs_of(buf: &Buffer, pt: Point) -> usize {
    buf.bytes_between(buf.begin_point(), pt)
        .expect("point is in buffer")
}

fn point_at(buf: &Buffer, abs: usize) -> Point {
    let mut pt = buf.begin_point();
    for _ in 0..abs {
        if !buf.forw_char(&mut pt) {
            break;
        }
    }
    pt
}

/// Find the first match at or after `from`.
pub fn search_forw(buf: &Buffer, from: Point, pat: &Pattern) -> Option<MatchSpan> {
    let contents = buf.contents();
    let start = abs_of(buf, from);
    pat.re.find_at(&contents, start).map(|m| MatchSpan {
        start: point_at(buf, m.start()),
        end: point_at(buf, m.end()),
    })
}

/// Find the last match ending at or before `before`.
pub fn search_back(buf: &Buffer, before: Point, pat: &Pattern) -> Option<MatchSpan> {
    let contents = buf.contents();
    let limit = abs_of(buf, before);
    let mut found = None;
    for m in pat.re.find_iter(&contents) {
        if m.end() <= limit {
            found = Some(m);
        } else {
            break;
        }
    }
    found.map(|m| MatchSpan {
        start: point_at(buf, m.start()),
        end: point_at(buf, m.end()),
    })
}

/// Substitute the first `count` occurrences of `pat` in `source` with
/// `replacement` (0 = first only, negative = all).
pub fn substitute(source: &[u8], pat: &Pattern, replacement: &[u8], count: i64) -> Vec<u8> {
    let limit = if count < 0 {
        usize::MAX
    } else if count == 0 {
        1
    } else {
        count as usize
    };
    let mut out = Vec::with_capacity(source.len());
    let mut last = 0usize;
    let mut done = 0usize;
    for m in pat.re.find_iter(source) {
        if done == limit {
            break;
        }
        out.extend_from_slice(&source[last..m.start()]);
        out.extend_from_slice(replacement);
        last = m.end();
        done += 1;
    }
    out.extend_from_slice(&source[last..]);
    out
}
