//! The process-wide buffer collection.
//!
//! Buffers are created on demand by name, optionally deriving the name from
//! a filename and making it unique by suffixing digits. Deletion is guarded:
//! a buffer that is displayed, aliased, executing, or bound to a hook stays.

use std::collections::HashMap;
use std::path::Path;

use core_status::{EdError, Result};
use tracing::debug;

use crate::buffer::Buffer;

/// Maximum buffer name length.
pub const MAX_BUFNAME: usize = 24;

/// Names of user command/function buffers begin with this byte, which also
/// hides them from ordinary buffer cycling.
pub const ROUTINE_PREFIX: char = '@';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

#[derive(Debug, Default)]
pub struct BufferList {
    slots: Vec<Option<Buffer>>,
    by_name: HashMap<String, BufferId>,
}

impl BufferList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: BufferId) -> &Buffer {
        self.slots[id.0 as usize].as_ref().expect("stale buffer id")
    }

    pub fn get_mut(&mut self, id: BufferId) -> &mut Buffer {
        self.slots[id.0 as usize].as_mut().expect("stale buffer id")
    }

    pub fn find(&self, name: &str) -> Option<BufferId> {
        self.by_name.get(name).copied()
    }

    pub fn exists(&self, id: BufferId) -> bool {
        self.slots
            .get(id.0 as usize)
            .map(|s| s.is_some())
            .unwrap_or(false)
    }

    /// Find or create a buffer by name. Returns (id, created).
    pub fn obtain(&mut self, name: &str) -> Result<(BufferId, bool)> {
        if let Some(id) = self.find(name) {
            return Ok((id, false));
        }
        let id = self.insert(Buffer::new(validate_name(name)?))?;
        Ok((id, true))
    }

    /// Create a buffer with a name derived from `path`'s basename, suffixing
    /// digits until unique.
    pub fn create_from_file(&mut self, path: &Path) -> Result<BufferId> {
        let base = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        let mut name: String = base.chars().take(MAX_BUFNAME).collect();
        let mut n = 0u32;
        while self.by_name.contains_key(&name) {
            n += 1;
            let suffix = n.to_string();
            let stem: String = base
                .chars()
                .take(MAX_BUFNAME.saturating_sub(suffix.len()))
                .collect();
            name = format!("{stem}{suffix}");
        }
        let mut buffer = Buffer::new(validate_name(&name)?);
        buffer.filename = Some(path.to_path_buf());
        self.insert(buffer)
    }

    fn insert(&mut self, buffer: Buffer) -> Result<BufferId> {
        let name = buffer.name.clone();
        let id = match self.slots.iter().position(|s| s.is_none()) {
            Some(idx) => {
                self.slots[idx] = Some(buffer);
                BufferId(idx as u32)
            }
            None => {
                self.slots.push(Some(buffer));
                BufferId((self.slots.len() - 1) as u32)
            }
        };
        self.by_name.insert(name, id);
        debug!(target: "text.buflist", id = id.0, "buffer created");
        Ok(id)
    }

    /// Delete a buffer. Refused while displayed, aliased, or executing.
    pub fn delete(&mut self, id: BufferId) -> Result<()> {
        {
            let buffer = self.get(id);
            if buffer.wind_count > 0 {
                return Err(EdError::failure(format!(
                    "Buffer '{}' is being displayed",
                    buffer.name
                )));
            }
            if buffer.alias_count > 0 {
                return Err(EdError::failure(format!(
                    "Buffer '{}' is aliased",
                    buffer.name
                )));
            }
            if buffer
                .call_info
                .as_ref()
                .map(|ci| ci.exec_depth > 0)
                .unwrap_or(false)
            {
                return Err(EdError::failure(format!(
                    "Buffer '{}' is being executed",
                    buffer.name
                )));
            }
        }
        let mut buffer = self.slots[id.0 as usize].take().expect("stale buffer id");
        buffer.clear();
        self.by_name.remove(&buffer.name);
        debug!(target: "text.buflist", id = id.0, name = %buffer.name, "buffer deleted");
        Ok(())
    }

    pub fn rename(&mut self, id: BufferId, new_name: &str) -> Result<()> {
        let new_name = validate_name(new_name)?;
        if self.by_name.contains_key(new_name) {
            return Err(EdError::failure(format!(
                "Buffer '{new_name}' already exists"
            )));
        }
        let old = self.get(id).name.clone();
        self.by_name.remove(&old);
        self.by_name.insert(new_name.to_string(), id);
        self.get_mut(id).name = new_name.to_string();
        Ok(())
    }

    /// All buffer ids, visible (non-hidden) first, each group sorted by name.
    pub fn ids(&self) -> Vec<BufferId> {
        let mut ids: Vec<BufferId> = (0..self.slots.len() as u32)
            .map(BufferId)
            .filter(|id| self.exists(*id))
            .collect();
        ids.sort_by(|a, b| self.get(*a).name.cmp(&self.get(*b).name));
        ids
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn validate_name(name: &str) -> Result<&str> {
    if name.is_empty() || name.len() > MAX_BUFNAME {
        return Err(EdError::failure(format!("Invalid buffer name '{name}'")));
    }
    if name.bytes().any(|b| b < 0x20 || b == 0x7f) {
        return Err(EdError::failure(format!("Invalid buffer name '{name}'")));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn obtain_finds_or_creates() {
        let mut list = BufferList::new();
        let (a, created) = list.obtain("scratch").unwrap();
        assert!(created);
        let (b, created2) = list.obtain("scratch").unwrap();
        assert!(!created2);
        assert_eq!(a, b);
    }

    #[test]
    fn file_names_are_uniquified_with_digits() {
        let mut list = BufferList::new();
        let p = PathBuf::from("/tmp/notes.txt");
        let a = list.create_from_file(&p).unwrap();
        let b = list.create_from_file(&p).unwrap();
        assert_eq!(list.get(a).name, "notes.txt");
        assert_eq!(list.get(b).name, "notes.txt1");
    }

    #[test]
    fn displayed_buffer_refuses_deletion() {
        let mut list = BufferList::new();
        let (id, _) = list.obtain("shown").unwrap();
        list.get_mut(id).wind_count = 1;
        assert!(list.delete(id).is_err());
        list.get_mut(id).wind_count = 0;
        list.delete(id).unwrap();
        assert!(list.find("shown").is_none());
    }

    #[test]
    fn rename_updates_index() {
        let mut list = BufferList::new();
        let (id, _) = list.obtain("old").unwrap();
        list.rename(id, "new").unwrap();
        assert!(list.find("old").is_none());
        assert_eq!(list.find("new"), Some(id));
    }

    #[test]
    fn control_bytes_rejected_in_names() {
        let mut list = BufferList::new();
        assert!(list.obtain("bad\x01name").is_err());
        assert!(list.obtain("").is_err());
    }
}
