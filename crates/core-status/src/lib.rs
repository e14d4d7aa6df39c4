//! Status ladder and error type shared by every crate in the workspace.
//!
//! Statuses form an ordered ladder from `Success` to `Panic`. Subsystems
//! return `Result<T>`; the evaluator and statement executor propagate any
//! non-success upward, and a `force` statement prefix demotes the catchable
//! band back to success. Script context (buffer name + line number) is
//! attached lazily by the statement executor, which is the only layer that
//! knows where execution currently is.

/// Severity ladder, least severe first. Ordering is meaningful: `force`
/// catches everything in the catchable band, exit statuses sort above
/// `MinExit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Success,
    /// Internal sentinel (lookup misses); never shown to the user.
    NotFound,
    /// User declined a prompt.
    Cancelled,
    /// Abort key pressed.
    UserAbort,
    /// Recoverable runtime error.
    Failure,
    /// A `Failure` annotated with script buffer and line context.
    ScriptError,
    /// Boundary marker: everything at or above this is an exit condition.
    MinExit,
    UserExit,
    HelpExit,
    FatalError,
    /// Invariant violation or allocation failure; terminates the process.
    Panic,
}

impl Severity {
    /// True for statuses a `force` statement prefix resets to success.
    /// `UserAbort` and the exit band are deliberately not catchable.
    pub fn catchable(self) -> bool {
        matches!(
            self,
            Severity::NotFound | Severity::Cancelled | Severity::Failure | Severity::ScriptError
        )
    }

    pub fn is_exit(self) -> bool {
        self >= Severity::MinExit
    }
}

/// Script execution context attached to an error by the statement executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptContext {
    pub buffer: String,
    pub line: usize,
}

/// The workspace-wide error value: a severity plus a user-visible message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", render(.message, .context))]
pub struct EdError {
    pub severity: Severity,
    pub message: String,
    pub context: Option<ScriptContext>,
}

fn render(message: &String, context: &Option<ScriptContext>) -> String {
    match context {
        Some(ctx) => format!(
            "Script failed, in buffer '{}' at line {}: {}",
            ctx.buffer, ctx.line, message
        ),
        None => message.to_string(),
    }
}

impl EdError {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            context: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(Severity::Failure, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Severity::NotFound, message)
    }

    pub fn cancelled() -> Self {
        Self::new(Severity::Cancelled, "Cancelled")
    }

    pub fn user_abort() -> Self {
        Self::new(Severity::UserAbort, "Aborted")
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(Severity::FatalError, message)
    }

    pub fn panic(message: impl Into<String>) -> Self {
        Self::new(Severity::Panic, message)
    }

    /// Promote a plain failure to a script error carrying (buffer, line).
    /// Errors already annotated and non-catchable severities pass through.
    pub fn with_context(mut self, buffer: &str, line: usize) -> Self {
        if self.context.is_none() && self.severity == Severity::Failure {
            self.severity = Severity::ScriptError;
            self.context = Some(ScriptContext {
                buffer: buffer.to_string(),
                line,
            });
        }
        self
    }
}

pub type Result<T> = std::result::Result<T, EdError>;

/// Apply `force` semantics to a statement result: catchable errors become
/// `Ok(default)`, everything else propagates.
pub fn force<T>(result: Result<T>, default: T) -> Result<T> {
    match result {
        Err(e) if e.severity.catchable() => Ok(default),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_ordering() {
        assert!(Severity::Success < Severity::NotFound);
        assert!(Severity::Failure < Severity::ScriptError);
        assert!(Severity::ScriptError < Severity::MinExit);
        assert!(Severity::UserExit.is_exit());
        assert!(!Severity::Failure.is_exit());
    }

    #[test]
    fn force_catches_failure_not_abort() {
        let caught = force(Err::<i32, _>(EdError::failure("boom")), 0);
        assert_eq!(caught.unwrap(), 0);
        let abort = force(Err::<i32, _>(EdError::user_abort()), 0);
        assert!(abort.is_err());
    }

    #[test]
    fn context_annotation_is_lazy_and_idempotent() {
        let e = EdError::failure("bad arg").with_context("startup", 12);
        assert_eq!(e.severity, Severity::ScriptError);
        let again = e.clone().with_context("other", 99);
        assert_eq!(again.context.unwrap().buffer, "startup");
        assert!(format!("{e}").contains("in buffer 'startup' at line 12"));
    }
}
