//! Global and buffer mode table.
//!
//! Modes are named switches: global modes live on the session, buffer
//! modes in each buffer's ordered mode set. The built-in names are seeded
//! here; user modes can be added at runtime.

use core_status::{EdError, Result};
use core_text::Buffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeScope {
    Global,
    Buffer,
}

#[derive(Debug, Clone)]
pub struct ModeInfo {
    pub name: &'static str,
    pub scope: ModeScope,
    pub descrip: &'static str,
}

pub const MODES: &[ModeInfo] = &[
    ModeInfo {
        name: "Exact",
        scope: ModeScope::Global,
        descrip: "Case-sensitive searching",
    },
    ModeInfo {
        name: "Regexp",
        scope: ModeScope::Global,
        descrip: "Regular-expression searching",
    },
    ModeInfo {
        name: "Horiz",
        scope: ModeScope::Global,
        descrip: "Horizontal scrolling of the whole window",
    },
    ModeInfo {
        name: "RtnMsg",
        scope: ModeScope::Global,
        descrip: "Display command return messages",
    },
    ModeInfo {
        name: "Safe",
        scope: ModeScope::Global,
        descrip: "Safe save through a temporary file",
    },
    ModeInfo {
        name: "WorkDir",
        scope: ModeScope::Global,
        descrip: "Show working directory on the mode line",
    },
    ModeInfo {
        name: "Over",
        scope: ModeScope::Buffer,
        descrip: "Overwrite columns",
    },
    ModeInfo {
        name: "Repl",
        scope: ModeScope::Buffer,
        descrip: "Replace characters",
    },
    ModeInfo {
        name: "Wrap",
        scope: ModeScope::Buffer,
        descrip: "Automatic line wrap",
    },
    ModeInfo {
        name: "ReadOnly",
        scope: ModeScope::Buffer,
        descrip: "Read-only buffer",
    },
];

/// Global mode state: the enabled subset, kept sorted.
#[derive(Debug, Default)]
pub struct GlobalModes {
    enabled: Vec<String>,
}

impl GlobalModes {
    pub fn new() -> Self {
        let mut modes = Self::default();
        // RtnMsg and Exact start enabled.
        modes.enabled.push("Exact".to_string());
        modes.enabled.push("RtnMsg".to_string());
        modes
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.iter().any(|m| m == name)
    }

    pub fn set(&mut self, name: &str, on: bool) -> Result<()> {
        let info = find_mode(name)?;
        if info.scope != ModeScope::Global {
            return Err(EdError::failure(format!("'{name}' is not a global mode")));
        }
        self.set_raw(info.name, on);
        Ok(())
    }

    fn set_raw(&mut self, name: &str, on: bool) {
        if on {
            if !self.is_enabled(name) {
                self.enabled.push(name.to_string());
                self.enabled.sort();
            }
        } else {
            self.enabled.retain(|m| m != name);
        }
    }

    pub fn enabled(&self) -> &[String] {
        &self.enabled
    }
}

pub fn find_mode(name: &str) -> Result<&'static ModeInfo> {
    MODES
        .iter()
        .find(|m| m.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| EdError::failure(format!("No such mode '{name}'")))
}

/// Enable or disable a buffer mode, keeping the set ordered by name.
pub fn set_buf_mode(buf: &mut Buffer, name: &str, on: bool) -> Result<()> {
    let info = find_mode(name)?;
    if info.scope != ModeScope::Buffer {
        return Err(EdError::failure(format!("'{name}' is not a buffer mode")));
    }
    if on {
        if !buf.modes.iter().any(|m| m == info.name) {
            buf.modes.push(info.name.to_string());
            buf.modes.sort();
        }
    } else {
        buf.modes.retain(|m| m != info.name);
    }
    Ok(())
}

pub fn buf_mode_enabled(buf: &Buffer, name: &str) -> bool {
    buf.modes.iter().any(|m| m == name)
}

/// Parse a `[^]MODE[,...]` specification into (name, enable) pairs.
pub fn parse_mode_spec(spec: &str) -> Vec<(String, bool)> {
    spec.split(',')
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix('^') {
            Some(name) => (name.to_string(), false),
            None => (s.to_string(), true),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_mode_toggles() {
        let mut gm = GlobalModes::new();
        assert!(gm.is_enabled("Exact"));
        gm.set("Exact", false).unwrap();
        assert!(!gm.is_enabled("Exact"));
        gm.set("regexp", true).unwrap();
        assert!(gm.is_enabled("Regexp"));
        assert!(gm.set("Over", true).is_err());
    }

    #[test]
    fn buffer_modes_stay_sorted() {
        let mut buf = Buffer::new("t");
        set_buf_mode(&mut buf, "Wrap", true).unwrap();
        set_buf_mode(&mut buf, "Over", true).unwrap();
        assert_eq!(buf.modes, vec!["Over".to_string(), "Wrap".to_string()]);
        set_buf_mode(&mut buf, "Over", false).unwrap();
        assert_eq!(buf.modes, vec!["Wrap".to_string()]);
    }

    #[test]
    fn mode_spec_parses_negation() {
        let spec = parse_mode_spec("Exact,^Regexp");
        assert_eq!(
            spec,
            vec![("Exact".to_string(), true), ("Regexp".to_string(), false)]
        );
    }
}
