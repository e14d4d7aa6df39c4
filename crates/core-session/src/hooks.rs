//! Hook slots and failure quarantine.
//!
//! A fixed set of named slots, each optionally bound to an executable. A
//! hook that is unbound or already running is a silent no-op. A hook whose
//! body fails is erased on the spot and the failure is annotated with the
//! hook's name, so a broken hook cannot wedge every subsequent command.

use core_script::Interp;
use core_status::Result;
use core_value::Datum;

use crate::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookId {
    CreateBuf,
    EnterBuf,
    ExitBuf,
    Filename,
    Help,
    Mode,
    PostKey,
    PreKey,
    Read,
    Wrap,
    Write,
    Exit,
}

pub const HOOK_IDS: &[HookId] = &[
    HookId::CreateBuf,
    HookId::EnterBuf,
    HookId::ExitBuf,
    HookId::Filename,
    HookId::Help,
    HookId::Mode,
    HookId::PostKey,
    HookId::PreKey,
    HookId::Read,
    HookId::Wrap,
    HookId::Write,
    HookId::Exit,
];

impl HookId {
    pub fn name(self) -> &'static str {
        match self {
            HookId::CreateBuf => "createBuf",
            HookId::EnterBuf => "enterBuf",
            HookId::ExitBuf => "exitBuf",
            HookId::Filename => "filename",
            HookId::Help => "help",
            HookId::Mode => "mode",
            HookId::PostKey => "postKey",
            HookId::PreKey => "preKey",
            HookId::Read => "read",
            HookId::Wrap => "wrap",
            HookId::Write => "write",
            HookId::Exit => "exit",
        }
    }

    pub fn from_name(name: &str) -> Option<HookId> {
        HOOK_IDS.iter().copied().find(|h| h.name() == name)
    }

    /// Number of arguments the hook target is called with; bind time
    /// verifies the target accepts exactly this count.
    pub fn arg_count(self) -> usize {
        match self {
            HookId::CreateBuf | HookId::EnterBuf | HookId::ExitBuf | HookId::Read
            | HookId::Write => 1,
            HookId::Filename | HookId::Mode => 2,
            _ => 0,
        }
    }

    fn index(self) -> usize {
        HOOK_IDS.iter().position(|h| *h == self).expect("known hook")
    }
}

#[derive(Debug, Default, Clone)]
struct HookSlot {
    target: Option<String>,
    running: bool,
}

#[derive(Debug, Default)]
pub struct HookTable {
    slots: Vec<HookSlot>,
}

impl HookTable {
    pub fn new() -> Self {
        Self {
            slots: vec![HookSlot::default(); HOOK_IDS.len()],
        }
    }

    pub fn target(&self, id: HookId) -> Option<&str> {
        self.slots[id.index()].target.as_deref()
    }

    pub fn bind(&mut self, id: HookId, target: String) {
        self.slots[id.index()].target = Some(target);
    }

    pub fn unbind(&mut self, id: HookId) {
        let slot = &mut self.slots[id.index()];
        slot.target = None;
        slot.running = false;
    }

    fn begin(&mut self, id: HookId) -> Option<String> {
        let slot = &mut self.slots[id.index()];
        if slot.running {
            return None;
        }
        let target = slot.target.clone()?;
        slot.running = true;
        Some(target)
    }

    fn end(&mut self, id: HookId) {
        self.slots[id.index()].running = false;
    }
}

impl Session {
    /// Bind a hook, verifying the target's declared arity covers the
    /// hook's argument tuple.
    pub fn set_hook(&mut self, id: HookId, target: &str) -> Result<()> {
        use core_script::Host;
        let info = self.lookup(target).ok_or_else(|| {
            core_status::EdError::failure(format!("No such command or function '{target}'"))
        })?;
        if !info.accepts(id.arg_count()) {
            return Err(core_status::EdError::failure(format!(
                "Hook '{}' takes {} argument(s), which '{}' does not accept",
                id.name(),
                id.arg_count(),
                target
            )));
        }
        self.hooks.bind(id, target.to_string());
        Ok(())
    }

    /// Invoke a hook with the given arguments. Unbound or re-entered hooks
    /// return nil. On failure the hook is disabled and the error message
    /// names it.
    pub fn run_hook(&mut self, interp: &mut Interp, id: HookId, args: Vec<Datum>) -> Result<Datum> {
        let Some(target) = self.hooks.begin(id) else {
            return Ok(Datum::Nil);
        };
        tracing::debug!(target: "session.hook", hook = id.name(), exec = %target, "fire");
        let result = self.call_by_name(interp, &target, None, args);
        self.hooks.end(id);
        match result {
            Ok(value) => Ok(value),
            Err(mut e) => {
                self.hooks.unbind(id);
                if e.message.is_empty() {
                    e.message = format!("User function '{target}' failed");
                }
                e.message.push_str(&format!(" (disabled '{}' hook)", id.name()));
                Err(e)
            }
        }
    }
}
