//! The embedded expression language: tokenizer, expression evaluator, and
//! statement executor.
//!
//! The crate is host-generic, the way an interpreter should be: everything
//! editor-shaped (command dispatch, special variables, regex matching,
//! user-routine storage) reaches the editor through the `Host` trait, so the
//! language core never depends on buffer or window types. Expressions are
//! parsed and evaluated in a single pass; a global "evaluating" flag lets
//! short-circuit operators consume the tokens of a skipped subexpression
//! without performing its effects.

use std::collections::HashMap;

use core_status::Result;
use core_value::{ArrayPool, Datum};

pub mod exec;
pub mod expr;
pub mod lexer;

pub use exec::{exec_lines, join_logical, preprocess, Logical, LoopBlock, LoopKind};
pub use expr::eval_expr;

/// Default bound on loop iterations; 0 disables the guard.
pub const DEFAULT_MAX_LOOP: u32 = 2500;
/// Default bound on routine-call nesting.
pub const DEFAULT_MAX_DEPTH: u32 = 100;

/// Arity of a callable resolved through the host.
#[derive(Debug, Clone, Copy)]
pub struct CalleeInfo {
    pub min_args: u16,
    /// Negative means unlimited.
    pub max_args: i32,
}

impl CalleeInfo {
    pub fn accepts(&self, n: usize) -> bool {
        n >= self.min_args as usize && (self.max_args < 0 || n <= self.max_args as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineKind {
    Command,
    Function,
}

/// A user command/function definition salted out of a script body.
#[derive(Debug, Clone)]
pub struct RoutineDef {
    pub kind: RoutineKind,
    pub name: String,
    pub min_args: u16,
    pub max_args: i32,
    pub descrip: Option<String>,
    /// Physical body lines, stored verbatim.
    pub body: Vec<String>,
}

/// The editor as seen from the interpreter.
pub trait Host {
    /// Resolve a bare name to a callable's arity.
    fn lookup(&self, name: &str) -> Option<CalleeInfo>;

    /// Invoke a callable with evaluated arguments and an optional numeric
    /// prefix. May re-enter the interpreter.
    fn call(
        &mut self,
        interp: &mut Interp,
        name: &str,
        n: Option<i64>,
        args: Vec<Datum>,
    ) -> Result<Datum>;

    /// Read a system (`$`-sigil) variable; `None` defers to the global
    /// variable table. Takes the interpreter so array-valued variables can
    /// allocate from the pool.
    fn get_special(&mut self, interp: &mut Interp, name: &str) -> Result<Option<Datum>>;

    /// Write a system variable; `false` defers to the global table.
    fn set_special(&mut self, interp: &mut Interp, name: &str, value: &Datum) -> Result<bool>;

    /// Match `subject` against a pattern (used by `=~` / `!~`).
    fn match_pattern(&mut self, subject: &[u8], pattern: &[u8]) -> Result<bool>;

    /// Store a routine definition encountered during execution.
    fn define_routine(&mut self, def: RoutineDef) -> Result<()>;
}

/// One execution frame: routine-local variables, numeric argument
/// variables, and the numeric prefix the routine was invoked with.
#[derive(Debug, Default)]
pub struct Frame {
    pub locals: HashMap<String, Datum>,
    pub args: Vec<Datum>,
    pub nval: Option<i64>,
}

/// Interpreter state shared across all execution: the global variable
/// table (the garbage sweep's root set), the array pool, and the
/// evaluation controls.
#[derive(Debug)]
pub struct Interp {
    pub globals: HashMap<String, Datum>,
    pub pool: ArrayPool,
    /// Cleared around skipped subexpressions; all value-producing
    /// operations no-op while clear.
    pub evaluating: bool,
    pub max_loop: u32,
    pub max_depth: u32,
    pub frames: Vec<Frame>,
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interp {
    pub fn new() -> Self {
        Self {
            globals: HashMap::new(),
            pool: ArrayPool::new(),
            evaluating: true,
            max_loop: DEFAULT_MAX_LOOP,
            max_depth: DEFAULT_MAX_DEPTH,
            // A base frame so top-level expressions have locals.
            frames: vec![Frame::default()],
        }
    }

    pub fn frame(&self) -> &Frame {
        self.frames.last().expect("base frame always present")
    }

    pub fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("base frame always present")
    }

    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Inter-command garbage sweep: every array reachable from the global
    /// table (plus any live frame, a safe superset) survives; everything
    /// else is freed. Runs between top-level commands, never during one.
    pub fn sweep(&mut self) {
        let Interp {
            globals,
            pool,
            frames,
            ..
        } = self;
        let roots = globals.values().chain(
            frames
                .iter()
                .flat_map(|f| f.locals.values().chain(f.args.iter())),
        );
        pool.sweep(roots);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_keeps_globals_and_drops_temporaries() {
        let mut interp = Interp::new();
        let kept = interp.pool.alloc(vec![Datum::Int(1)]);
        let _temp = interp.pool.alloc(vec![Datum::Int(2)]);
        interp
            .globals
            .insert("keep".to_string(), Datum::Array(kept.clone()));
        interp.sweep();
        assert_eq!(interp.pool.len(), 1);
        assert_eq!(kept.get(0), Some(Datum::Int(1)));
    }

    #[test]
    fn sweep_tolerates_self_reference_in_global() {
        let mut interp = Interp::new();
        let a = interp.pool.alloc(vec![]);
        a.push(Datum::Array(a.clone()));
        interp.globals.insert("cyc".to_string(), Datum::Array(a));
        interp.sweep();
        assert_eq!(interp.pool.len(), 1);
    }

    #[test]
    fn callee_arity_window() {
        let info = CalleeInfo {
            min_args: 1,
            max_args: 2,
        };
        assert!(!info.accepts(0));
        assert!(info.accepts(1));
        assert!(info.accepts(2));
        assert!(!info.accepts(3));
        let unlimited = CalleeInfo {
            min_args: 0,
            max_args: -1,
        };
        assert!(unlimited.accepts(99));
    }
}
