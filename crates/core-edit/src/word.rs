//! Word motions and case conversion.

use core_status::{EdError, Result};
use core_text::{Buffer, Point};

use crate::chars::CharClass;

/// True when the byte at the point is a word character.
pub fn in_word(buf: &Buffer, pt: Point, cc: &CharClass) -> bool {
    buf.char_at(pt).map(|c| cc.is_word(c)).unwrap_or(false)
}

/// Move forward `n` words: off the current word, then past any intervening
/// non-word bytes to the start of the next. False at end of buffer.
pub fn forw_word(buf: &Buffer, pt: &mut Point, cc: &CharClass, n: usize) -> bool {
    for _ in 0..n.max(1) {
        while in_word(buf, *pt, cc) {
            if !buf.forw_char(pt) {
                return false;
            }
        }
        while !in_word(buf, *pt, cc) {
            if !buf.forw_char(pt) {
                return false;
            }
        }
    }
    true
}

/// Move backward `n` words, landing on the first byte of each word.
pub fn back_word(buf: &Buffer, pt: &mut Point, cc: &CharClass, n: usize) -> bool {
    for _ in 0..n.max(1) {
        if !buf.back_char(pt) {
            return false;
        }
        while !in_word(buf, *pt, cc) {
            if !buf.back_char(pt) {
                return false;
            }
        }
        while in_word(buf, *pt, cc) {
            if !buf.back_char(pt) {
                // Hit buffer start while inside the word.
                return true;
            }
        }
        buf.forw_char(pt);
    }
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    Lower,
    Upper,
    /// First word byte upper, the rest lower.
    Title,
}

fn convert(c: u8, mode: CaseMode, first_of_word: bool) -> u8 {
    match mode {
        CaseMode::Lower => c.to_ascii_lowercase(),
        CaseMode::Upper => c.to_ascii_uppercase(),
        CaseMode::Title => {
            if first_of_word {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            }
        }
    }
}

/// Convert `n` words starting at the point. Outside a word the point first
/// advances to the next word; conversion runs to each word's end, leaving
/// the point after the last converted word.
pub fn case_words(
    buf: &mut Buffer,
    pt: &mut Point,
    cc: &CharClass,
    n: i64,
    mode: CaseMode,
) -> Result<()> {
    if n < 0 {
        // Negative count converts backward: move back |n| words first.
        back_word(buf, pt, cc, n.unsigned_abs() as usize);
        return case_words(buf, pt, cc, n.unsigned_abs() as i64, mode);
    }
    for _ in 0..n.max(1) {
        while !in_word(buf, *pt, cc) {
            if !buf.forw_char(pt) {
                return Ok(());
            }
        }
        let mut first = true;
        while let Some(c) = buf.char_at(*pt) {
            if !cc.is_word(c) {
                break;
            }
            buf.set_byte(*pt, convert(c, mode, first));
            first = false;
            if !buf.forw_char(pt) {
                break;
            }
        }
    }
    Ok(())
}

/// Convert whole lines: the current line plus `n - 1` following ones.
pub fn case_lines(
    buf: &mut Buffer,
    pt: &mut Point,
    cc: &CharClass,
    n: i64,
    mode: CaseMode,
) -> Result<()> {
    if n < 0 {
        return Err(EdError::failure("Invalid line count"));
    }
    let mut line = pt.line;
    for i in 0..n.max(1) {
        let len = buf.line_used(line);
        let mut first_of_word = true;
        for off in 0..len {
            let at = Point::new(line, off);
            let c = buf.line_text(line)[off];
            if cc.is_word(c) {
                buf.set_byte(at, convert(c, mode, first_of_word));
                first_of_word = false;
            } else {
                first_of_word = true;
            }
        }
        match buf.next_line(line) {
            Some(next) => line = next,
            None => {
                if i + 1 < n.max(1) {
                    break;
                }
            }
        }
    }
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

    #[test]
    fn forw_word_lands_on_next_word_start() {
        let b = buf("foo bar baz");
        let cc = CharClass::new();
        let mut pt = Point::new(b.first_line(), 0);
        assert!(forw_word(&b, &mut pt, &cc, 1));
        assert_eq!(pt.off, 4);
        assert!(forw_word(&b, &mut pt, &cc, 1));
        assert_eq!(pt.off, 8);
    }

    #[test]
    fn back_word_lands_on_word_start() {
        let b = buf("foo bar baz");
        let cc = CharClass::new();
        let mut pt = Point::new(b.first_line(), 11);
        assert!(back_word(&b, &mut pt, &cc, 1));
        assert_eq!(pt.off, 8);
        assert!(back_word(&b, &mut pt, &cc, 2));
        assert_eq!(pt.off, 0);
    }

    #[test]
    fn words_cross_lines() {
        let b = buf("one\ntwo");
        let cc = CharClass::new();
        let mut pt = Point::new(b.first_line(), 0);
        assert!(forw_word(&b, &mut pt, &cc, 1));
        assert_eq!(pt.line, b.last_line());
        assert_eq!(pt.off, 0);
    }

    #[test]
    fn upper_case_rest_of_word() {
        let mut b = buf("foo bar");
        let cc = CharClass::new();
        let mut pt = Point::new(b.first_line(), 1);
        case_words(&mut b, &mut pt, &cc, 1, CaseMode::Upper).unwrap();
        assert_eq!(b.contents(), b"fOO bar");
        assert_eq!(pt.off, 3);
    }

    #[test]
    fn upper_case_from_outside_word_skips_to_it() {
        let mut b = buf("a  bc");
        let cc = CharClass::new();
        let mut pt = Point::new(b.first_line(), 1);
        case_words(&mut b, &mut pt, &cc, 1, CaseMode::Upper).unwrap();
        assert_eq!(b.contents(), b"a  BC");
    }

    #[test]
    fn title_case_words() {
        let mut b = buf("hello WORLD again");
        let cc = CharClass::new();
        let mut pt = Point::new(b.first_line(), 0);
        case_words(&mut b, &mut pt, &cc, 3, CaseMode::Title).unwrap();
        assert_eq!(b.contents(), b"Hello World Again");
    }

    #[test]
    fn case_lines_converts_block() {
        let mut b = buf("one two\nthree\nfour");
        let cc = CharClass::new();
        let mut pt = Point::new(b.first_line(), 3);
        case_lines(&mut b, &mut pt, &cc, 2, CaseMode::Upper).unwrap();
        assert_eq!(b.contents(), b"ONE TWO\nTHREE\nfour");
    }

    #[test]
    fn marks_survive_case_conversion() {
        let mut b = buf("word");
        let cc = CharClass::new();
        b.set_mark(core_text::Mark::new(b'm', b.first_line(), 2, 0));
        let mut pt = Point::new(b.first_line(), 0);
        case_words(&mut b, &mut pt, &cc, 1, CaseMode::Upper).unwrap();
        assert_eq!(b.contents(), b"WORD");
        assert_eq!(b.mark(b'm').unwrap().offset(), 2);
    }
}
