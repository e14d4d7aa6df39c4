//! File reading and writing with record-delimiter handling.
//!
//! Reading sniffs the record delimiter: the first LF, CR, or CR-LF
//! encountered is locked in for the whole file and recorded on the buffer.
//! Writing emits the caller's delimiter between lines (not after the last
//! line). Safe save writes a temporary file beside the target and renames
//! it over the original.

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use core_status::{EdError, Result};
use core_text::{Buffer, RecordDelim};
use tracing::{debug, info};

/// Split raw file contents into lines, sniffing the delimiter.
pub fn split_records(data: &[u8]) -> (Vec<Vec<u8>>, RecordDelim) {
    let mut delim = RecordDelim::None;
    // Lock in the first delimiter kind encountered.
    for (i, &b) in data.iter().enumerate() {
        match b {
            b'\n' => {
                delim = RecordDelim::Lf;
                break;
            }
            b'\r' => {
                delim = if data.get(i + 1) == Some(&b'\n') {
                    RecordDelim::CrLf
                } else {
                    RecordDelim::Cr
                };
                break;
            }
            _ => {}
        }
    }
    let lines: Vec<Vec<u8>> = match delim {
        RecordDelim::None => vec![data.to_vec()],
        RecordDelim::Lf => data.split(|&b| b == b'\n').map(|s| s.to_vec()).collect(),
        RecordDelim::Cr => data.split(|&b| b == b'\r').map(|s| s.to_vec()).collect(),
        RecordDelim::CrLf => {
            let mut out = Vec::new();
            let mut start = 0usize;
            let mut i = 0usize;
            while i < data.len() {
                if data[i] == b'\r' && data.get(i + 1) == Some(&b'\n') {
                    out.push(data[start..i].to_vec());
                    i += 2;
                    start = i;
                } else {
                    i += 1;
                }
            }
            out.push(data[start..].to_vec());
            out
        }
    };
    (lines, delim)
}

/// Read a file into a buffer, recording the detected delimiter. Returns
/// the number of lines read.
pub fn read_into(buf: &mut Buffer, path: &Path) -> Result<usize> {
    let data = fs::read(path)
        .map_err(|e| EdError::failure(format!("Cannot read '{}': {e}", path.display())))?;
    let (lines, delim) = split_records(&data);
    let joined: Vec<u8> = lines.join(&b'\n');
    buf.set_text(&joined);
    buf.delim = delim;
    buf.filename = Some(path.to_path_buf());
    info!(target: "session.file", path = %path.display(), lines = lines.len(), "read");
    Ok(lines.len())
}

/// Write a buffer's contents to `path` with the given delimiter. With
/// `safe`, the write goes to a temporary sibling which is renamed over the
/// target.
pub fn write_buffer(buf: &Buffer, path: &Path, delim: RecordDelim, safe: bool) -> Result<usize> {
    let delim_bytes = delim.as_bytes();
    let mut written = 0usize;
    let target: PathBuf = if safe {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp~");
        PathBuf::from(tmp)
    } else {
        path.to_path_buf()
    };
    {
        let mut file = fs::File::create(&target)
            .map_err(|e| EdError::failure(format!("Cannot write '{}': {e}", target.display())))?;
        let mut first = true;
        for id in buf.lines() {
            if !first {
                file.write_all(delim_bytes)
                    .map_err(|e| EdError::failure(format!("Write error: {e}")))?;
                written += delim_bytes.len();
            }
            first = false;
            let text = buf.line_text(id);
            file.write_all(text)
                .map_err(|e| EdError::failure(format!("Write error: {e}")))?;
            written += text.len();
        }
    }
    if safe {
        fs::rename(&target, path)
            .map_err(|e| EdError::failure(format!("Cannot rename '{}': {e}", target.display())))?;
    }
    debug!(target: "session.file", path = %path.display(), bytes = written, safe, "write");
    Ok(written)
}

/// Expand `~`, `$VAR`, and `${VAR}` in a path typed at a prompt.
pub fn expand_path(input: &str) -> PathBuf {
    let mut text = input.to_string();
    if let Some(rest) = text.strip_prefix("~/") {
        if let Ok(home) = env::var("HOME") {
            text = format!("{home}/{rest}");
        }
    } else if text == "~" {
        if let Ok(home) = env::var("HOME") {
            text = home;
        }
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('{') => {
                chars.next();
                let mut name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    name.push(c);
                }
                out.push_str(&env::var(&name).unwrap_or_default());
            }
            Some(c2) if c2.is_ascii_alphanumeric() || *c2 == '_' => {
                let mut name = String::new();
                while let Some(c2) = chars.peek() {
                    if c2.is_ascii_alphanumeric() || *c2 == '_' {
                        name.push(*c2);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&env::var(&name).unwrap_or_default());
            }
            _ => out.push('$'),
        }
    }
    PathBuf::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_lf() {
        let (lines, delim) = split_records(b"a\nb\nc");
        assert_eq!(delim, RecordDelim::Lf);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn sniffs_crlf_and_locks_it_in() {
        let (lines, delim) = split_records(b"a\r\nb\nc");
        assert_eq!(delim, RecordDelim::CrLf);
        // The bare \n is not a CRLF delimiter; it stays in the line.
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], b"b\nc".to_vec());
    }

    #[test]
    fn sniffs_cr() {
        let (lines, delim) = split_records(b"a\rb");
        assert_eq!(delim, RecordDelim::Cr);
        assert_eq!(lines, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn no_delimiter_is_one_record() {
        let (lines, delim) = split_records(b"plain");
        assert_eq!(delim, RecordDelim::None);
        assert_eq!(lines, vec![b"plain".to_vec()]);
    }

    #[test]
    fn read_write_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        std::fs::write(&path, b"one\ntwo\nthree\n").unwrap();

        let mut buf = Buffer::new("t");
        read_into(&mut buf, &path).unwrap();
        assert_eq!(buf.delim, RecordDelim::Lf);
        assert_eq!(buf.contents(), b"one\ntwo\nthree\n");

        let out = dir.path().join("out.txt");
        write_buffer(&buf, &out, RecordDelim::Lf, true).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"one\ntwo\nthree\n");
    }

    #[test]
    fn crlf_write_uses_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = Buffer::new("t");
        buf.set_text(b"a\nb");
        let out = dir.path().join("crlf.txt");
        write_buffer(&buf, &out, RecordDelim::CrLf, false).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"a\r\nb");
    }

    #[test]
    fn env_expansion_in_paths() {
        std::env::set_var("MM_TEST_DIR", "/opt/mm");
        assert_eq!(
            expand_path("$MM_TEST_DIR/scripts"),
            PathBuf::from("/opt/mm/scripts")
        );
        assert_eq!(
            expand_path("${MM_TEST_DIR}x"),
            PathBuf::from("/opt/mmx")
        );
    }
}
