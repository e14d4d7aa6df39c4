//! The execution table: name → built-in command/function, alias, or user
//! routine buffer.

use std::collections::HashMap;

use bitflags::bitflags;
use core_script::Interp;
use core_status::{EdError, Result};
use core_text::BufferId;
use core_value::Datum;

use crate::Session;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CmdFlags: u16 {
        /// Mutates the current buffer; refused on read-only buffers.
        const EDIT   = 1 << 0;
        /// A function (usable in expressions) rather than a command.
        const FUNC   = 1 << 1;
        /// Hidden from completion listings.
        const HIDDEN = 1 << 2;
        /// Cannot be unbound from its last key or deleted.
        const PERM   = 1 << 3;
        /// Eligible as a hook target.
        const HOOK   = 1 << 4;
        /// Terminal interaction only; unavailable in batch scripts.
        const TERM   = 1 << 5;
    }
}

pub type CmdFn = fn(&mut Session, &mut Interp, Option<i64>, &[Datum]) -> Result<Datum>;

#[derive(Debug)]
pub struct BuiltinDef {
    pub name: &'static str,
    pub flags: CmdFlags,
    pub min_args: u16,
    /// Negative means unlimited.
    pub max_args: i32,
    pub func: CmdFn,
    pub help: &'static str,
}

#[derive(Debug, Clone)]
pub enum ExecEntry {
    Builtin(&'static BuiltinDef),
    Alias { target: String },
    UserCmd { buf: BufferId },
    UserFunc { buf: BufferId },
}

#[derive(Debug, Default)]
pub struct ExecTable {
    map: HashMap<String, ExecEntry>,
    /// Alias names in sorted order, for listing.
    aliases: Vec<String>,
}

impl ExecTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_builtins(&mut self, defs: &'static [BuiltinDef]) {
        for def in defs {
            self.map.insert(def.name.to_string(), ExecEntry::Builtin(def));
        }
    }

    pub fn get(&self, name: &str) -> Option<&ExecEntry> {
        self.map.get(name)
    }

    /// Resolve through at most one level of alias indirection.
    pub fn resolve(&self, name: &str) -> Option<ExecEntry> {
        match self.map.get(name)? {
            ExecEntry::Alias { target } => self.map.get(target).cloned(),
            entry => Some(entry.clone()),
        }
    }

    pub fn insert_user(&mut self, name: &str, entry: ExecEntry) -> Result<()> {
        if let Some(ExecEntry::Builtin(def)) = self.map.get(name) {
            return Err(EdError::failure(format!(
                "Cannot redefine built-in '{}'",
                def.name
            )));
        }
        self.map.insert(name.to_string(), entry);
        Ok(())
    }

    /// Create an alias. The target must exist and must not itself be an
    /// alias.
    pub fn add_alias(&mut self, name: &str, target: &str) -> Result<()> {
        if self.map.contains_key(name) {
            return Err(EdError::failure(format!("Name '{name}' already in use")));
        }
        match self.map.get(target) {
            None => {
                return Err(EdError::failure(format!(
                    "No such command or function '{target}'"
                )))
            }
            Some(ExecEntry::Alias { .. }) => {
                return Err(EdError::failure("Cannot alias an alias"))
            }
            Some(_) => {}
        }
        self.map.insert(
            name.to_string(),
            ExecEntry::Alias {
                target: target.to_string(),
            },
        );
        // Sorted insertion keeps the listing order without a re-sort.
        let pos = self
            .aliases
            .binary_search(&name.to_string())
            .unwrap_or_else(|p| p);
        self.aliases.insert(pos, name.to_string());
        Ok(())
    }

    pub fn delete_alias(&mut self, name: &str) -> Result<String> {
        match self.map.get(name) {
            Some(ExecEntry::Alias { target }) => {
                let target = target.clone();
                self.map.remove(name);
                self.aliases.retain(|a| a != name);
                Ok(target)
            }
            _ => Err(EdError::failure(format!("No such alias '{name}'"))),
        }
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn remove(&mut self, name: &str) {
        self.map.remove(name);
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.map.keys()
    }
}
