//! Statement executor.
//!
//! Runs a script body (a buffer's lines) one logical line at a time.
//! Trailing-backslash continuation, blank-line and comment skipping happen
//! here, before keyword recognition, so preprocessing decisions are made on
//! the joined logical line. User command/function definitions are the one
//! exception: their body lines are salted verbatim as physical lines.
//!
//! Loop blocks (`while`/`until`/`for`/`loop` ... `endloop`) are collected in
//! a preprocessing scan recording each block's opening and closing line, so
//! execution can jump over or out of a body without re-scanning.

use core_status::{force, EdError, Result};
use core_value::{ArrayRef, Datum};
use tracing::{debug, trace};

use crate::expr::eval_expr;
use crate::{Frame, Host, Interp, RoutineDef, RoutineKind};

/// One logical line: joined text plus the physical range it came from.
#[derive(Debug, Clone)]
pub struct Logical {
    pub text: String,
    /// 1-based physical line number of the first physical line.
    pub line_no: usize,
    /// 0-based inclusive physical range.
    pub first_phys: usize,
    pub last_phys: usize,
}

/// Join physical lines into logical lines: a trailing `\` continues onto
/// the next line; blank lines, `#` comment lines, and `/# ... #/` block
/// comments are skipped.
pub fn join_logical(lines: &[String]) -> Vec<Logical> {
    let mut out = Vec::new();
    let mut i = 0usize;
    let mut in_block_comment = false;
    while i < lines.len() {
        let raw = lines[i].as_str();
        let trimmed = raw.trim();
        if in_block_comment {
            if trimmed.ends_with("#/") || trimmed.contains("#/") {
                in_block_comment = false;
            }
            i += 1;
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with('#') && !trimmed.starts_with("#{") {
            i += 1;
            continue;
        }
        if trimmed.starts_with("/#") {
            if !trimmed.contains("#/") {
                in_block_comment = true;
            }
            i += 1;
            continue;
        }
        let first_phys = i;
        let mut text = String::new();
        loop {
            let line = lines[i].as_str();
            let stripped = line.trim_end();
            if stripped.ends_with('\\') && i + 1 < lines.len() {
                text.push_str(&stripped[..stripped.len() - 1]);
                i += 1;
            } else {
                text.push_str(line);
                break;
            }
        }
        out.push(Logical {
            text,
            line_no: first_phys + 1,
            first_phys,
            last_phys: i,
        });
        i += 1;
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    While,
    Until,
    Loop,
    For,
}

/// A preprocessed loop block: `mark` is the opening logical line, `jump`
/// the matching `endloop`.
#[derive(Debug, Clone, Copy)]
pub struct LoopBlock {
    pub kind: LoopKind,
    pub mark: usize,
    pub jump: usize,
}

fn first_word(text: &str) -> (&str, &str) {
    let trimmed = text.trim_start();
    let end = trimmed
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(trimmed.len());
    (&trimmed[..end], trimmed[end..].trim_start())
}

/// Scan logical lines for loop blocks and structural errors. Idempotent;
/// invalidated (by the caller) whenever the underlying buffer changes.
pub fn preprocess(logical: &[Logical]) -> Result<Vec<LoopBlock>> {
    let mut blocks: Vec<LoopBlock> = Vec::new();
    let mut open: Vec<usize> = Vec::new(); // indexes into blocks
    let mut routine_depth = 0u32;
    for (i, line) in logical.iter().enumerate() {
        let (word, _) = first_word(&line.text);
        match word {
            "command" | "function" => {
                routine_depth += 1;
                if routine_depth > 1 {
                    return Err(stmt_err(line, "Nested routine definition"));
                }
            }
            "endroutine" => {
                if routine_depth == 0 {
                    return Err(stmt_err(line, "'endroutine' without 'command' or 'function'"));
                }
                routine_depth -= 1;
            }
            "while" | "until" | "loop" | "for" => {
                let kind = match word {
                    "while" => LoopKind::While,
                    "until" => LoopKind::Until,
                    "loop" => LoopKind::Loop,
                    _ => LoopKind::For,
                };
                blocks.push(LoopBlock {
                    kind,
                    mark: i,
                    jump: usize::MAX,
                });
                open.push(blocks.len() - 1);
            }
            "endloop" => match open.pop() {
                Some(idx) => blocks[idx].jump = i,
                None => return Err(stmt_err(line, "'endloop' without a loop")),
            },
            "break" | "next" => {
                if open.is_empty() {
                    return Err(stmt_err(line, &format!("'{word}' outside a loop")));
                }
            }
            _ => {}
        }
    }
    if let Some(idx) = open.pop() {
        let line = &logical[blocks[idx].mark];
        return Err(stmt_err(line, "Loop not closed with 'endloop'"));
    }
    if routine_depth > 0 {
        return Err(EdError::failure("Routine not closed with 'endroutine'"));
    }
    Ok(blocks)
}

fn stmt_err(line: &Logical, msg: &str) -> EdError {
    EdError::failure(format!("{msg}, at line {}", line.line_no))
}

/// Per-nesting-level execution state. If-levels and loop-levels share the
/// stack; loop levels remember their opening line and iteration state.
#[derive(Debug)]
struct Level {
    live: bool,
    parent_live: bool,
    is_loop: bool,
    taken: bool,
    else_seen: bool,
    start: usize,
    count: u32,
    for_state: Option<ForState>,
}

#[derive(Debug)]
struct ForState {
    var: String,
    array: ArrayRef,
    index: usize,
}

/// Execute a script body. `name` labels errors; `args`/`nval` populate the
/// new frame's numeric argument variables and prefix.
pub fn exec_lines<H: Host>(
    interp: &mut Interp,
    host: &mut H,
    name: &str,
    lines: &[String],
    args: Vec<Datum>,
    nval: Option<i64>,
) -> Result<Datum> {
    if interp.depth() as u32 >= interp.max_depth {
        return Err(EdError::failure(format!(
            "Maximum execution depth ({}) exceeded",
            interp.max_depth
        )));
    }
    interp.frames.push(Frame {
        locals: Default::default(),
        args,
        nval,
    });
    debug!(target: "script.exec", routine = name, depth = interp.depth(), "enter");
    let result = exec_body(interp, host, name, lines);
    interp.frames.pop();
    result
}

fn exec_body<H: Host>(
    interp: &mut Interp,
    host: &mut H,
    name: &str,
    lines: &[String],
) -> Result<Datum> {
    let logical = join_logical(lines);
    let blocks = preprocess(&logical)?;
    let block_at = |mark: usize| {
        blocks
            .iter()
            .find(|b| b.mark == mark)
            .copied()
            .expect("preprocessed block")
    };

    let mut levels: Vec<Level> = Vec::new();
    let mut last_value = Datum::Nil;
    let mut i = 0usize;

    macro_rules! live {
        () => {
            levels.last().map(|l| l.live).unwrap_or(true)
        };
    }

    while i < logical.len() {
        let line = &logical[i];
        let (word, rest) = first_word(&line.text);
        let rest = rest.to_string();
        trace!(target: "script.exec", line = line.line_no, word, live = live!(), "step");

        match word {
            "command" | "function" => {
                let kind = if word == "command" {
                    RoutineKind::Command
                } else {
                    RoutineKind::Function
                };
                // Find the matching endroutine (validated by preprocess).
                let mut end = i + 1;
                while end < logical.len() {
                    if first_word(&logical[end].text).0 == "endroutine" {
                        break;
                    }
                    end += 1;
                }
                if end == logical.len() {
                    return Err(stmt_err(line, "Routine not closed with 'endroutine'")
                        .with_context(name, line.line_no));
                }
                if live!() {
                    let def = parse_routine_header(kind, &rest)
                        .map_err(|e| e.with_context(name, line.line_no))?;
                    // Body: the physical lines between header and endroutine,
                    // stored verbatim (comments and blanks included).
                    let body: Vec<String> = lines
                        [logical[i].last_phys + 1..logical[end].first_phys]
                        .to_vec();
                    host.define_routine(RoutineDef { body, ..def })
                        .map_err(|e| e.with_context(name, line.line_no))?;
                }
                i = end + 1;
            }
            "endroutine" => {
                return Err(stmt_err(line, "'endroutine' without 'command' or 'function'")
                    .with_context(name, line.line_no));
            }
            "if" => {
                let parent = live!();
                let truth = if parent {
                    eval_cond(interp, host, &rest)
                        .map_err(|e| e.with_context(name, line.line_no))?
                } else {
                    false
                };
                levels.push(Level {
                    live: parent && truth,
                    parent_live: parent,
                    is_loop: false,
                    taken: truth,
                    else_seen: false,
                    start: i,
                    count: 0,
                    for_state: None,
                });
                i += 1;
            }
            "elsif" => {
                let level = levels
                    .last_mut()
                    .filter(|l| !l.is_loop)
                    .ok_or_else(|| {
                        stmt_err(line, "'elsif' without 'if'").with_context(name, line.line_no)
                    })?;
                if level.else_seen {
                    return Err(stmt_err(line, "'elsif' after 'else'")
                        .with_context(name, line.line_no));
                }
                if level.taken || !level.parent_live {
                    level.live = false;
                    i += 1;
                } else {
                    let parent = level.parent_live;
                    let truth = eval_cond(interp, host, &rest)
                        .map_err(|e| e.with_context(name, line.line_no))?;
                    let level = levels.last_mut().expect("checked above");
                    level.live = parent && truth;
                    level.taken = truth;
                    i += 1;
                }
            }
            "else" => {
                let level = levels
                    .last_mut()
                    .filter(|l| !l.is_loop)
                    .ok_or_else(|| {
                        stmt_err(line, "'else' without 'if'").with_context(name, line.line_no)
                    })?;
                if level.else_seen {
                    return Err(stmt_err(line, "Duplicate 'else'")
                        .with_context(name, line.line_no));
                }
                level.else_seen = true;
                level.live = level.parent_live && !level.taken;
                level.taken = true;
                i += 1;
            }
            "endif" => {
                match levels.pop() {
                    Some(l) if !l.is_loop => {}
                    _ => {
                        return Err(stmt_err(line, "'endif' without 'if'")
                            .with_context(name, line.line_no))
                    }
                }
                i += 1;
            }
            "while" | "until" | "loop" | "for" => {
                let block = block_at(i);
                if !live!() {
                    i = block.jump + 1;
                    continue;
                }
                let returning = levels
                    .last()
                    .map(|l| l.is_loop && l.start == i)
                    .unwrap_or(false);
                let proceed = match block.kind {
                    LoopKind::While => eval_cond(interp, host, &rest)
                        .map_err(|e| e.with_context(name, line.line_no))?,
                    LoopKind::Until => !eval_cond(interp, host, &rest)
                        .map_err(|e| e.with_context(name, line.line_no))?,
                    LoopKind::Loop => true,
                    LoopKind::For => {
                        if !returning {
                            let state = parse_for_header(interp, host, &rest)
                                .map_err(|e| e.with_context(name, line.line_no))?;
                            levels.push(Level {
                                live: true,
                                parent_live: true,
                                is_loop: true,
                                taken: false,
                                else_seen: false,
                                start: i,
                                count: 0,
                                for_state: Some(state),
                            });
                        }
                        let level = levels.last_mut().expect("for level pushed");
                        let state = level.for_state.as_mut().expect("for state");
                        if state.index < state.array.len() {
                            let value =
                                state.array.get(state.index).unwrap_or(Datum::Nil);
                            let var = state.var.clone();
                            state.index += 1;
                            interp.frame_mut().locals.insert(var, value);
                            true
                        } else {
                            false
                        }
                    }
                };
                if block.kind != LoopKind::For && !returning && proceed {
                    levels.push(Level {
                        live: true,
                        parent_live: true,
                        is_loop: true,
                        taken: false,
                        else_seen: false,
                        start: i,
                        count: 0,
                        for_state: None,
                    });
                }
                if proceed {
                    i += 1;
                } else {
                    if returning || block.kind == LoopKind::For {
                        levels.pop();
                    }
                    i = block.jump + 1;
                }
            }
            "endloop" => {
                let level = match levels.last_mut() {
                    Some(level) if level.is_loop => level,
                    _ => {
                        return Err(stmt_err(line, "'endloop' without a loop")
                            .with_context(name, line.line_no))
                    }
                };
                level.count += 1;
                if interp.max_loop > 0 && level.count > interp.max_loop {
                    return Err(EdError::failure(format!(
                        "Maximum number of loop iterations ({}) exceeded",
                        interp.max_loop
                    ))
                    .with_context(name, line.line_no));
                }
                i = level.start;
            }
            "break" => {
                if !live!() {
                    i += 1;
                    continue;
                }
                let n = if rest.is_empty() {
                    1
                } else {
                    eval_expr(interp, host, &rest)
                        .and_then(|v| v.as_int())
                        .map_err(|e| e.with_context(name, line.line_no))?
                };
                if n < 1 {
                    return Err(stmt_err(line, "Invalid 'break' level")
                        .with_context(name, line.line_no));
                }
                let mut remaining = n as usize;
                let mut target = None;
                while let Some(level) = levels.pop() {
                    if level.is_loop {
                        remaining -= 1;
                        if remaining == 0 {
                            target = Some(level.start);
                            break;
                        }
                    }
                }
                match target {
                    Some(start) => i = block_at(start).jump + 1,
                    None => {
                        return Err(stmt_err(line, "Too many 'break' levels")
                            .with_context(name, line.line_no))
                    }
                }
            }
            "next" => {
                if !live!() {
                    i += 1;
                    continue;
                }
                // Unwind if-levels down to the innermost loop, then jump to
                // its endloop so the iteration advances.
                while levels.last().map(|l| !l.is_loop).unwrap_or(false) {
                    levels.pop();
                }
                match levels.last() {
                    Some(level) if level.is_loop => {
                        i = block_at(level.start).jump;
                    }
                    _ => {
                        return Err(stmt_err(line, "'next' outside a loop")
                            .with_context(name, line.line_no))
                    }
                }
            }
            "return" => {
                if !live!() {
                    i += 1;
                    continue;
                }
                let value = if rest.is_empty() {
                    Datum::Nil
                } else {
                    eval_expr(interp, host, &rest)
                        .map_err(|e| e.with_context(name, line.line_no))?
                };
                return Ok(value);
            }
            "force" => {
                if live!() {
                    let result = eval_expr(interp, host, &rest);
                    match force(result, Datum::Nil) {
                        Ok(value) => last_value = value,
                        Err(e) => return Err(e.with_context(name, line.line_no)),
                    }
                }
                i += 1;
            }
            _ => {
                if live!() {
                    match eval_expr(interp, host, &line.text) {
                        Ok(value) => last_value = value,
                        Err(e) => return Err(e.with_context(name, line.line_no)),
                    }
                }
                i += 1;
            }
        }
    }

    if let Some(level) = levels.last() {
        let line = &logical[level.start];
        return Err(stmt_err(line, "Block not closed").with_context(name, line.line_no));
    }
    Ok(last_value)
}

fn eval_cond<H: Host>(interp: &mut Interp, host: &mut H, src: &str) -> Result<bool> {
    if src.trim().is_empty() {
        return Err(EdError::failure("Missing condition"));
    }
    Ok(eval_expr(interp, host, src)?.is_true())
}

/// `for VAR in EXPR`.
fn parse_for_header<H: Host>(
    interp: &mut Interp,
    host: &mut H,
    rest: &str,
) -> Result<ForState> {
    let (var, tail) = first_word(rest);
    if var.is_empty() {
        return Err(EdError::failure("Missing 'for' variable"));
    }
    let (kw, expr_src) = first_word(tail);
    if kw != "in" {
        return Err(EdError::failure("Missing 'in' in 'for' statement"));
    }
    let value = eval_expr(interp, host, expr_src)?;
    let array = value.as_array()?.clone();
    Ok(ForState {
        var: var.to_string(),
        array,
        index: 0,
    })
}

/// `command NAME(min[, max])` or bare `command NAME`; a trailing quoted
/// string is kept as the routine's description.
fn parse_routine_header(kind: RoutineKind, rest: &str) -> Result<RoutineDef> {
    let (name, tail) = first_word(rest);
    if name.is_empty() || !name.chars().next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false) {
        return Err(EdError::failure("Missing routine name"));
    }
    let mut min_args: u16 = 0;
    let mut max_args: i32 = -1;
    let mut descrip = None;
    let tail = tail.trim();
    let tail = if let Some(inner) = tail.strip_prefix('(') {
        let close = inner
            .find(')')
            .ok_or_else(|| EdError::failure("Unbalanced routine argument spec"))?;
        let spec = &inner[..close];
        let mut parts = spec.split(',').map(str::trim);
        if let Some(first) = parts.next().filter(|s| !s.is_empty()) {
            min_args = first
                .parse()
                .map_err(|_| EdError::failure("Invalid routine argument count"))?;
            max_args = min_args as i32;
        }
        if let Some(second) = parts.next() {
            max_args = if second.is_empty() {
                -1
            } else {
                second
                    .parse()
                    .map_err(|_| EdError::failure("Invalid routine argument count"))?
            };
        }
        inner[close + 1..].trim()
    } else {
        tail
    };
    if let Some(stripped) = tail.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        descrip = Some(stripped.to_string());
    }
    Ok(RoutineDef {
        kind,
        name: name.to_string(),
        min_args,
        max_args,
        descrip,
        body: Vec::new(),
    })
}
