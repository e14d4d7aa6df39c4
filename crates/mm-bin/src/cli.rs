//! Command-line surface.
//!
//! Global switches go through clap; the positional tail intermixes
//! `@script` names, filenames, and per-file switches (`{+|-}LINE`,
//! `-B [^]MODE[,...]`, `-r`/`-rw`, `-s PAT`) that clap cannot express, so
//! it is captured raw and parsed by hand. Historical single-dash long
//! spellings (`-help`, `-version`, ...) are normalized to double-dash
//! before clap sees them.

use clap::Parser;
use core_status::{EdError, Result};

#[derive(Parser, Debug, Default)]
#[command(name = "mm", disable_help_flag = true, disable_version_flag = true)]
pub struct Args {
    /// Show usage and exit.
    #[arg(long)]
    pub usage: bool,
    /// Show copyright and exit.
    #[arg(short = 'C', long)]
    pub copyright: bool,
    /// Show help and exit.
    #[arg(long)]
    pub help: bool,
    /// Show version and exit.
    #[arg(short = 'V', long)]
    pub version: bool,
    /// Working directory to switch to at startup.
    #[arg(short = 'd', long)]
    pub dir: Option<String>,
    /// Statement(s) to execute after startup, repeatable, in order.
    #[arg(short = 'e', long = "exec")]
    pub exec: Vec<String>,
    /// Global mode changes: [^]MODE[,...], repeatable.
    #[arg(short = 'G', long = "global-mode")]
    pub global_modes: Vec<String>,
    /// Input record delimiter override.
    #[arg(short = 'i', long = "inp-delim")]
    pub inp_delim: Option<String>,
    /// Do not read any file into the first buffer.
    #[arg(short = 'N', long = "no-read")]
    pub no_read: bool,
    /// Skip the startup script.
    #[arg(short = 'n', long = "no-startup")]
    pub no_startup: bool,
    /// Output record delimiter override.
    #[arg(short = 'o', long = "otp-delim")]
    pub otp_delim: Option<String>,
    /// Script search path (overrides MMPATH).
    #[arg(long)]
    pub path: Option<String>,
    /// Open every buffer read-only.
    #[arg(short = 'r')]
    pub read_only: bool,
    /// Shebang mode: the first positional is the script.
    #[arg(short = 'S', long = "shell")]
    pub shell: bool,
    /// Files, @scripts, and per-file switches.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub files: Vec<String>,
}

/// Rewrite historical single-dash long options (and `-?`) into forms clap
/// accepts.
pub fn normalize_argv(argv: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(argv.len());
    let mut past_globals = false;
    for (i, arg) in argv.into_iter().enumerate() {
        if i == 0 {
            out.push(arg);
            continue;
        }
        if past_globals {
            out.push(arg);
            continue;
        }
        let mapped = match arg.as_str() {
            "-?" | "-usage" => "--usage".to_string(),
            "-copyright" => "--copyright".to_string(),
            "-help" => "--help".to_string(),
            "-version" => "--version".to_string(),
            "-dir" => "--dir".to_string(),
            "-exec" => "--exec".to_string(),
            "-global-mode" => "--global-mode".to_string(),
            "-inp-delim" => "--inp-delim".to_string(),
            "-no-read" => "--no-read".to_string(),
            "-no-startup" => "--no-startup".to_string(),
            "-otp-delim" => "--otp-delim".to_string(),
            "-path" => "--path".to_string(),
            "-shell" => "--shell".to_string(),
            other => {
                // The first non-switch argument starts the positional tail.
                if !other.starts_with('-') || other == "-" {
                    past_globals = true;
                }
                other.to_string()
            }
        };
        out.push(mapped);
    }
    out
}

pub fn print_usage() {
    println!(
        "usage: mm [-?|-usage] [-C|-copyright] [-help] [-V|-version] [-d DIR] [-e STMT]...\n\
         \x20         [-G [^]MODE[,...]]... [-i DELIM] [-N] [-n] [-o DELIM] [-path LIST] [-r] [-S]\n\
         \x20         [@script | file [{{+|-}}LINE] [-B [^]MODE[,...]] [-r|-rw] [-s PAT]]..."
    );
}

/// One positional item after hand-parsing.
#[derive(Debug, PartialEq, Eq)]
pub enum FileSpec {
    Script(std::path::PathBuf),
    File(FileArg),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct FileArg {
    pub path: String,
    pub goto_line: Option<i64>,
    pub buf_modes: Vec<String>,
    pub read_only: bool,
    pub search: Option<String>,
}

/// Parse the positional tail: every filename may be followed by its own
/// switches, which apply to that file only. In shebang mode the first
/// positional is the script even without an `@` prefix.
pub fn parse_file_args(raw: &[String], shell: bool) -> Result<Vec<FileSpec>> {
    let mut out: Vec<FileSpec> = Vec::new();
    let mut iter = raw.iter().peekable();
    let mut first = true;
    while let Some(arg) = iter.next() {
        if let Some(script) = arg.strip_prefix('@') {
            out.push(FileSpec::Script(std::path::PathBuf::from(script)));
            first = false;
            continue;
        }
        if shell && first && !arg.starts_with(['+', '-']) {
            out.push(FileSpec::Script(std::path::PathBuf::from(arg)));
            first = false;
            continue;
        }
        first = false;
        if arg.starts_with('+') || arg.starts_with('-') {
            // A per-file switch must follow a filename.
            let last = out.iter_mut().rev().find_map(|spec| match spec {
                FileSpec::File(f) => Some(f),
                FileSpec::Script(_) => None,
            });
            let Some(file) = last else {
                return Err(EdError::failure(format!(
                    "Switch '{arg}' precedes any filename"
                )));
            };
            match arg.as_str() {
                "-r" => file.read_only = true,
                "-rw" => file.read_only = false,
                "-B" | "-buf-mode" => {
                    let spec = iter
                        .next()
                        .ok_or_else(|| EdError::failure("Missing argument for -B"))?;
                    file.buf_modes.push(spec.clone());
                }
                "-s" | "-search" => {
                    let pat = iter
                        .next()
                        .ok_or_else(|| EdError::failure("Missing argument for -s"))?;
                    file.search = Some(pat.clone());
                }
                other => {
                    // {+|-}LINE.
                    let (sign, digits) = other.split_at(1);
                    let n: i64 = digits
                        .parse()
                        .map_err(|_| EdError::failure(format!("Unknown switch '{other}'")))?;
                    file.goto_line = Some(if sign == "+" { n } else { -n });
                }
            }
            continue;
        }
        out.push(FileSpec::File(FileArg {
            path: arg.clone(),
            ..Default::default()
        }));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalizes_single_dash_longs() {
        let argv = normalize_argv(strings(&["mm", "-?", "-no-startup", "file.txt", "-r"]));
        assert_eq!(argv, strings(&["mm", "--usage", "--no-startup", "file.txt", "-r"]));
    }

    #[test]
    fn shebang_mode_takes_first_positional_as_script() {
        let specs = parse_file_args(&strings(&["job.mm", "data.txt"]), true).unwrap();
        assert_eq!(
            specs[0],
            FileSpec::Script(std::path::PathBuf::from("job.mm"))
        );
        assert!(matches!(specs[1], FileSpec::File(_)));
    }

    #[test]
    fn per_file_switches_attach_to_preceding_file() {
        let specs = parse_file_args(
            &strings(&["a.txt", "+10", "-B", "Wrap", "b.txt", "-r", "-s", "main"]),
            false,
        )
        .unwrap();
        assert_eq!(specs.len(), 2);
        match &specs[0] {
            FileSpec::File(f) => {
                assert_eq!(f.path, "a.txt");
                assert_eq!(f.goto_line, Some(10));
                assert_eq!(f.buf_modes, vec!["Wrap".to_string()]);
                assert!(!f.read_only);
            }
            other => panic!("unexpected {other:?}"),
        }
        match &specs[1] {
            FileSpec::File(f) => {
                assert!(f.read_only);
                assert_eq!(f.search.as_deref(), Some("main"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn minus_line_counts_from_bottom() {
        let specs = parse_file_args(&strings(&["a.txt", "-5"]), false).unwrap();
        match &specs[0] {
            FileSpec::File(f) => assert_eq!(f.goto_line, Some(-5)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn at_prefix_marks_scripts() {
        let specs = parse_file_args(&strings(&["@setup.mm", "data.txt"]), false).unwrap();
        assert_eq!(
            specs[0],
            FileSpec::Script(std::path::PathBuf::from("setup.mm"))
        );
    }

    #[test]
    fn switch_before_any_file_is_an_error() {
        assert!(parse_file_args(&strings(&["+3", "a.txt"]), false).is_err());
    }
}
