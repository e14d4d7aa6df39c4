//! mm entrypoint: argument handling, startup, and the cooperative main
//! loop.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use core_input::KeySource;
use core_script::{exec_lines, eval_expr, Interp};
use core_session::{dispatch, fileio, modes, Session};
use core_status::{EdError, Severity};
use core_terminal::{CrosstermBackend, TerminalBackend};
use core_text::{BufFlags, Point};
use core_value::Datum;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

mod cli;
mod render;

use cli::{Args, FileSpec};

/// Exit codes: success, failure, script error, forced abort.
const EXIT_OK: i32 = 0;
const EXIT_FAIL: i32 = 1;
const EXIT_SCRIPT: i32 = 2;
const EXIT_ABORT: i32 = 255;

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self) {
        let file_appender = tracing_appender::rolling::never(".", "mm.log");
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        if tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(writer)
            .with_ansi(false)
            .try_init()
            .is_ok()
        {
            self.log_guard = Some(guard);
        }
    }

    fn install_panic_hook() {
        let default = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            // Leave raw mode before printing so the report is readable.
            let _ = crossterm_cleanup();
            error!(target: "runtime", %info, "panic");
            default(info);
        }));
    }
}

fn crossterm_cleanup() -> Result<()> {
    use std::io::Write;
    let mut out = std::io::stdout();
    out.write_all(b"\x1b[?1049l")?;
    out.flush()?;
    Ok(())
}

fn main() {
    std::process::exit(match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("mm: {e}");
            EXIT_FAIL
        }
    });
}

fn run() -> Result<i32> {
    let mut startup = AppStartup::new();
    startup.configure_logging();
    AppStartup::install_panic_hook();

    let args = Args::parse_from(cli::normalize_argv(std::env::args().collect()));
    if args.version {
        println!("mm {}", env!("CARGO_PKG_VERSION"));
        return Ok(EXIT_OK);
    }
    if args.copyright {
        println!("mm: MIT licensed");
        return Ok(EXIT_OK);
    }
    if args.usage || args.help {
        cli::print_usage();
        return Ok(EXIT_OK);
    }

    if let Some(dir) = &args.dir {
        std::env::set_current_dir(dir)?;
    }

    let mut backend = CrosstermBackend::new();
    let (rows, cols) = backend.size();
    // The last terminal row is the message line.
    let mut session = Session::new(rows.saturating_sub(1), cols).map_err(anyhow_err)?;
    let mut interp = Interp::new();

    info!(target: "runtime", rows, cols, "startup");

    // Global switches before any file is read.
    for spec in &args.global_modes {
        apply_global_modes(&mut session, spec).map_err(anyhow_err)?;
    }
    if args.read_only {
        let id = session.cur_buf_id();
        session.buffers.get_mut(id).flags.insert(BufFlags::READ_ONLY);
    }

    // Startup script, unless suppressed.
    if !args.no_startup {
        if let Err(e) = run_startup_script(&mut session, &mut interp, &args) {
            warn!(target: "runtime", %e, "startup script failed");
            session.set_rtn_msg(format!("{e}"));
        }
    }

    // -e statements, in order.
    for stmt in &args.exec {
        if let Err(e) = eval_expr(&mut interp, &mut session, stmt) {
            return Ok(finish_batch_error(e));
        }
    }

    // Positional arguments: scripts, files, per-file switches.
    let specs = cli::parse_file_args(&args.files, args.shell).map_err(anyhow_err)?;
    for spec in specs {
        match spec {
            FileSpec::Script(path) => {
                if let Err(e) = run_script_file(&mut session, &mut interp, &path) {
                    return Ok(finish_batch_error(e));
                }
            }
            FileSpec::File(file) => {
                if let Err(e) = visit_file(&mut session, &mut interp, &file, &args) {
                    warn!(target: "runtime", %e, "file open failed");
                    session.set_rtn_msg(format!("{e}"));
                }
            }
        }
    }

    backend.enter()?;
    let code = main_loop(&mut session, &mut interp, &mut backend);
    backend.leave()?;
    match code {
        Ok(c) => Ok(c),
        Err(e) => {
            eprintln!("mm: {e}");
            Ok(EXIT_FAIL)
        }
    }
}

fn anyhow_err(e: EdError) -> anyhow::Error {
    anyhow::anyhow!("{e}")
}

fn finish_batch_error(e: EdError) -> i32 {
    eprintln!("mm: {e}");
    if e.severity == Severity::ScriptError {
        EXIT_SCRIPT
    } else {
        EXIT_FAIL
    }
}

fn apply_global_modes(session: &mut Session, spec: &str) -> core_status::Result<()> {
    for (name, on) in modes::parse_mode_spec(spec) {
        session.global_modes.set(&name, on)?;
    }
    Ok(())
}

/// Locate and run the startup script: `.memacs` in `$HOME`, then on the
/// `MMPATH` search path.
fn run_startup_script(
    session: &mut Session,
    interp: &mut Interp,
    args: &Args,
) -> core_status::Result<()> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(home) = std::env::var("HOME") {
        candidates.push(Path::new(&home).join(".memacs"));
    }
    let path_list = args
        .path
        .clone()
        .or_else(|| std::env::var("MMPATH").ok())
        .unwrap_or_default();
    for dir in path_list.split(':').filter(|d| !d.is_empty()) {
        candidates.push(Path::new(dir).join(".memacs"));
    }
    for candidate in candidates {
        if candidate.exists() {
            info!(target: "runtime", path = %candidate.display(), "startup script");
            return run_script_file(session, interp, &candidate).map(|_| ());
        }
    }
    Ok(())
}

fn run_script_file(
    session: &mut Session,
    interp: &mut Interp,
    path: &Path,
) -> core_status::Result<Datum> {
    let text = std::fs::read(path)
        .map_err(|e| EdError::failure(format!("Cannot read '{}': {e}", path.display())))?;
    let (records, _) = fileio::split_records(&text);
    let lines: Vec<String> = records
        .into_iter()
        .map(|l| String::from_utf8_lossy(&l).into_owned())
        .collect();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "script".to_string());
    exec_lines(interp, session, &name, &lines, Vec::new(), None)
}

fn visit_file(
    session: &mut Session,
    interp: &mut Interp,
    file: &cli::FileArg,
    args: &Args,
) -> core_status::Result<()> {
    if args.no_read {
        // Create the buffer without reading the file.
        let id = session
            .buffers
            .create_from_file(Path::new(&file.path))?;
        session.select_buffer(interp, id)?;
    } else {
        session.call_by_name(
            interp,
            "findFile",
            None,
            vec![Datum::str(file.path.clone())],
        )?;
    }

    // Record-delimiter overrides apply to the visited buffer.
    let delim_override = args
        .otp_delim
        .as_deref()
        .or(args.inp_delim.as_deref())
        .and_then(parse_delim);
    if let Some(delim) = delim_override {
        let id = session.cur_buf_id();
        session.buffers.get_mut(id).delim = delim;
    }

    let read_only = args.read_only || file.read_only;
    if read_only {
        let id = session.cur_buf_id();
        session.buffers.get_mut(id).flags.insert(BufFlags::READ_ONLY);
    }
    for spec in &file.buf_modes {
        for (name, on) in modes::parse_mode_spec(spec) {
            modes::set_buf_mode(session.cur_buf_mut(), &name, on)?;
        }
    }
    if let Some(line) = file.goto_line {
        let buf = session.cur_buf();
        let target = if line >= 0 {
            buf.line_at(line.max(1) as usize)
        } else {
            // -N counts from the bottom.
            let count = buf.line_count() as i64;
            buf.line_at((count + line).max(1) as usize)
        };
        if let Some(id) = target {
            session.set_point(Point::new(id, 0));
        }
    }
    if let Some(pat) = &file.search {
        session.call_by_name(interp, "searchForw", None, vec![Datum::str(pat.clone())])?;
    }
    Ok(())
}

fn parse_delim(spec: &str) -> Option<core_text::RecordDelim> {
    match spec {
        "lf" | "\n" => Some(core_text::RecordDelim::Lf),
        "cr" | "\r" => Some(core_text::RecordDelim::Cr),
        "crlf" | "\r\n" => Some(core_text::RecordDelim::CrLf),
        _ => None,
    }
}

struct TermSource<'a> {
    backend: &'a mut dyn TerminalBackend,
}

impl KeySource for TermSource<'_> {
    fn get_key(&mut self) -> core_status::Result<core_input::ExtKey> {
        self.backend
            .get_key()
            .map_err(|e| EdError::failure(format!("Terminal input failed: {e}")))
    }
}

fn main_loop(
    session: &mut Session,
    interp: &mut Interp,
    backend: &mut CrosstermBackend,
) -> Result<i32> {
    loop {
        render::refresh(session, backend)?;

        // A playing macro supplies keys until it runs dry.
        if session.macro_rec.is_playing() {
            if let Err(e) = dispatch::drain_macro(session, interp) {
                report(session, &e);
            }
            continue;
        }

        let key = {
            let mut source = TermSource { backend };
            let prefix = |k| session.bindings.prefix_of(k);
            match session.decoder.next_sequence(&mut source, prefix) {
                Ok(key) => key,
                Err(e) => {
                    report(session, &e);
                    continue;
                }
            }
        };

        match dispatch::top_level_key(session, interp, key) {
            Ok(_) => {}
            Err(e) if e.severity == Severity::UserExit => return Ok(EXIT_OK),
            Err(e) if e.severity == Severity::HelpExit => return Ok(EXIT_OK),
            Err(e) if e.severity >= Severity::FatalError => {
                error!(target: "runtime", msg = %e.message, "fatal");
                eprintln!("mm: {e}");
                return Ok(EXIT_ABORT);
            }
            Err(e) => report(session, &e),
        }
    }
}

fn report(session: &mut Session, e: &EdError) {
    if e.severity == Severity::UserAbort {
        session.set_rtn_msg("Aborted");
    } else {
        session.set_rtn_msg(format!("{e}"));
    }
}
