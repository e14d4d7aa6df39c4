//! Paragraph rewrap.
//!
//! `wrap_lines` takes a block of lines, lifts the first line's indentation
//! and an optional per-line comment prefix, joins the block into one long
//! line (sentence-ending punctuation keeps two spaces), then refills at the
//! wrap column with the indentation and prefix reinstated on every output
//! line.

use core_status::{EdError, Result};
use core_text::{Buffer, Point, Region};
use tracing::debug;

fn is_sentence_end(word: &[u8]) -> bool {
    matches!(word.last(), Some(b'.') | Some(b'?') | Some(b'!'))
}

/// Refill `words` at `wrap_col`, prefixing every line with `lead`.
fn refill(words: &[Vec<u8>], lead: &[u8], wrap_col: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut line: Vec<u8> = lead.to_vec();
    let mut line_has_word = false;
    for word in words {
        let sep = if line_has_word {
            if is_sentence_end(&line) {
                2
            } else {
                1
            }
        } else {
            0
        };
        if line_has_word && line.len() + sep + word.len() > wrap_col {
            out.extend_from_slice(&line);
            out.push(b'\n');
            line = lead.to_vec();
            line_has_word = false;
        }
        if line_has_word {
            let sep = if is_sentence_end(&line) { 2 } else { 1 };
            line.extend(std::iter::repeat(b' ').take(sep));
        }
        line.extend_from_slice(word);
        line_has_word = true;
    }
    out.extend_from_slice(&line);
    out
}

/// Rewrap `n` lines at the point (per the whole-line count conventions) at
/// `wrap_col`. `prefix`, when given, is stripped after the indentation on
/// every input line and reinstated on every output line.
pub fn wrap_lines(
    buf: &mut Buffer,
    pt: &mut Point,
    n: i64,
    wrap_col: usize,
    prefix: Option<&[u8]>,
) -> Result<()> {
    if wrap_col == 0 {
        return Err(EdError::failure("Wrap column not set"));
    }
    let region = Region::lines(buf, *pt, n.max(1))?;
    let text = region.text(buf);
    let had_trailing_nl = text.ends_with(b"\n");

    // Indentation comes from the first line only.
    let first_line = text.split(|&b| b == b'\n').next().unwrap_or(b"");
    let indent: Vec<u8> = first_line
        .iter()
        .take_while(|&&c| c == b' ' || c == b'\t')
        .copied()
        .collect();

    let mut words: Vec<Vec<u8>> = Vec::new();
    for line in text.split(|&b| b == b'\n') {
        let mut body = line;
        // Strip indentation, then the comment prefix if present.
        while let Some((&c, rest)) = body.split_first() {
            if c == b' ' || c == b'\t' {
                body = rest;
            } else {
                break;
            }
        }
        if let Some(pfx) = prefix {
            if body.starts_with(pfx) {
                body = &body[pfx.len()..];
                if body.first() == Some(&b' ') {
                    body = &body[1..];
                }
            }
        }
        for word in body.split(|&b| b == b' ' || b == b'\t') {
            if !word.is_empty() {
                words.push(word.to_vec());
            }
        }
    }

    let mut lead = indent.clone();
    if let Some(pfx) = prefix {
        lead.extend_from_slice(pfx);
        lead.push(b' ');
    }
    let mut filled = refill(&words, &lead, wrap_col);
    if had_trailing_nl {
        filled.push(b'\n');
    }

    // Swap the block for the refilled text.
    *pt = region.start;
    buf.delete_at(pt, region.size as i64)?;
    let mut first = true;
    for seg in filled.split(|&b| b == b'\n') {
        if !first {
            buf.insert_newline(pt);
        }
        first = false;
        buf.insert_slice(pt, seg);
    }
    debug!(target: "edit.wrap", col = wrap_col, words = words.len(), "wrapped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(text: &str) -> Buffer {
        let mut b = Buffer::new("t");
        b.set_text(text.as_bytes());
        b
    }

    fn max_line_len(b: &Buffer) -> usize {
        b.lines().map(|id| b.line_text(id).len()).max().unwrap_or(0)
    }

    #[test]
    fn refills_at_wrap_column() {
        let mut b = buf("alpha beta gamma delta epsilon zeta eta theta\n");
        let mut pt = Point::new(b.first_line(), 0);
        wrap_lines(&mut b, &mut pt, 1, 20, None).unwrap();
        assert!(max_line_len(&b) <= 20, "got {:?}", b.contents());
        // Round trip: joining the words back reproduces the input words.
        let joined: Vec<u8> = b
            .contents()
            .split(|&c| c == b'\n' || c == b' ')
            .filter(|w| !w.is_empty())
            .flat_map(|w| {
                let mut v = w.to_vec();
                v.push(b' ');
                v
            })
            .collect();
        assert_eq!(
            String::from_utf8_lossy(&joined).trim(),
            "alpha beta gamma delta epsilon zeta eta theta"
        );
    }

    #[test]
    fn indentation_is_reinstated() {
        let mut b = buf("    one two three four five six seven\n");
        let mut pt = Point::new(b.first_line(), 0);
        wrap_lines(&mut b, &mut pt, 1, 16, None).unwrap();
        for id in b.lines() {
            let text = b.line_text(id);
            if !text.is_empty() {
                assert!(text.starts_with(b"    "), "line {:?}", text);
            }
        }
    }

    #[test]
    fn comment_prefix_stripped_and_reapplied() {
        let mut b = buf("# aa bb cc dd ee ff gg hh\n# ii jj\n");
        let mut pt = Point::new(b.first_line(), 0);
        wrap_lines(&mut b, &mut pt, 2, 14, Some(b"#")).unwrap();
        for id in b.lines() {
            let text = b.line_text(id);
            if !text.is_empty() {
                assert!(text.starts_with(b"# "), "line {:?}", text);
                assert!(text.len() <= 14);
            }
        }
    }

    #[test]
    fn sentence_ends_get_two_spaces() {
        let mut b = buf("One. Two\n");
        let mut pt = Point::new(b.first_line(), 0);
        wrap_lines(&mut b, &mut pt, 1, 40, None).unwrap();
        assert_eq!(b.contents(), b"One.  Two\n");
    }

    #[test]
    fn multi_line_block_joins_before_filling() {
        let mut b = buf("aa bb\ncc dd\nee\nuntouched\n");
        let mut pt = Point::new(b.first_line(), 0);
        wrap_lines(&mut b, &mut pt, 3, 40, None).unwrap();
        assert_eq!(b.contents(), b"aa bb cc dd ee\nuntouched\n");
    }

    #[test]
    fn long_words_never_split() {
        let mut b = buf("short verylongunbreakableword end\n");
        let mut pt = Point::new(b.first_line(), 0);
        wrap_lines(&mut b, &mut pt, 1, 10, None).unwrap();
        let words: Vec<Vec<u8>> = b
            .contents()
            .split(|&c| c == b'\n' || c == b' ')
            .filter(|w| !w.is_empty())
            .map(|w| w.to_vec())
            .collect();
        assert!(words.contains(&b"verylongunbreakableword".to_vec()));
    }
}
