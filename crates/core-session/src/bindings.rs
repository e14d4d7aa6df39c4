//! Key bindings: extended key sequence → executable name.

use std::collections::HashMap;

use core_input::{ExtKey, KeyFlags};
use core_status::{EdError, Result};

#[derive(Debug, Default)]
pub struct KeyBindings {
    map: HashMap<ExtKey, String>,
}

impl KeyBindings {
    /// The stock binding set.
    pub fn defaults() -> Self {
        let mut b = KeyBindings::default();
        let ctrl = |c| ExtKey::ctrl(c);
        let meta = |c| ExtKey::new(c, KeyFlags::META);
        let cx = |k: ExtKey| k.with_prefix(KeyFlags::PREF1);

        // Prefix pseudo-commands.
        b.bind(ctrl(b'x'), "prefix1");
        b.bind(ctrl(b'c'), "prefix2");
        b.bind(ctrl(b'h'), "prefix3");

        b.bind(ctrl(b'f'), "forwChar");
        b.bind(ctrl(b'b'), "backChar");
        b.bind(ctrl(b'n'), "forwLine");
        b.bind(ctrl(b'p'), "backLine");
        b.bind(ctrl(b'a'), "beginLine");
        b.bind(ctrl(b'e'), "endLine");
        b.bind(ctrl(b'v'), "forwPage");
        b.bind(meta(b'v'), "backPage");
        b.bind(meta(b'f'), "forwWord");
        b.bind(meta(b'b'), "backWord");
        b.bind(meta(b'<'), "beginBuf");
        b.bind(meta(b'>'), "endBuf");
        b.bind(ExtKey::new(b'g', KeyFlags::META), "gotoLine");

        b.bind(ExtKey::plain(b'\r'), "newline");
        b.bind(ExtKey::plain(b'\t'), "tab");
        b.bind(ctrl(b'd'), "deleteForwChar");
        b.bind(ExtKey::plain(0x7f), "backspace");
        b.bind(ctrl(b'k'), "killLine");
        b.bind(ctrl(b'w'), "killRegion");
        b.bind(meta(b'w'), "copyRegion");
        b.bind(ctrl(b'y'), "yank");
        b.bind(ctrl(b'u'), "undelete");
        b.bind(ctrl(b' '), "setMark");
        b.bind(meta(b'u'), "upperCaseWord");
        b.bind(meta(b'l'), "lowerCaseWord");
        b.bind(meta(b'c'), "titleCaseWord");
        b.bind(meta(b'd'), "killWord");

        b.bind(cx(ctrl(b'f')), "findFile");
        b.bind(cx(ctrl(b's')), "saveFile");
        b.bind(cx(ctrl(b'w')), "writeFile");
        b.bind(cx(ctrl(b'c')), "exitEditor");
        b.bind(cx(ExtKey::plain(b'2')), "splitWind");
        b.bind(cx(ExtKey::plain(b'1')), "onlyWind");
        b.bind(cx(ExtKey::plain(b'0')), "joinWind");
        b.bind(cx(ExtKey::plain(b'o')), "nextWind");
        b.bind(cx(ExtKey::plain(b'b')), "selectBuf");
        b.bind(cx(ExtKey::plain(b'k')), "deleteBuf");
        b.bind(cx(ExtKey::plain(b'(')), "beginMacro");
        b.bind(cx(ExtKey::plain(b')')), "endMacro");
        b.bind(cx(ExtKey::plain(b'e')), "playMacro");
        b.bind(cx(ExtKey::plain(b'n')), "narrowBuf");
        b.bind(cx(ExtKey::plain(b'w')), "widenBuf");

        // Arrow keys.
        b.bind(ExtKey::new(b'F', KeyFlags::FKEY), "forwChar");
        b.bind(ExtKey::new(b'B', KeyFlags::FKEY), "backChar");
        b.bind(ExtKey::new(b'N', KeyFlags::FKEY), "forwLine");
        b.bind(ExtKey::new(b'P', KeyFlags::FKEY), "backLine");
        b
    }

    pub fn bind(&mut self, key: ExtKey, name: &str) {
        self.map.insert(key, name.to_string());
    }

    pub fn unbind(&mut self, key: ExtKey) -> Option<String> {
        self.map.remove(&key)
    }

    pub fn lookup(&self, key: ExtKey) -> Option<&str> {
        self.map.get(&key).map(|s| s.as_str())
    }

    /// Prefix flag carried by a key bound to one of the prefix
    /// pseudo-commands.
    pub fn prefix_of(&self, key: ExtKey) -> Option<KeyFlags> {
        match self.lookup(key)? {
            "prefix1" => Some(KeyFlags::PREF1),
            "prefix2" => Some(KeyFlags::PREF2),
            "prefix3" => Some(KeyFlags::PREF3),
            _ => None,
        }
    }

    /// Number of keys bound to `name`.
    pub fn bound_count(&self, name: &str) -> usize {
        self.map.values().filter(|v| *v == name).count()
    }

    pub fn keys_of(&self, name: &str) -> Vec<ExtKey> {
        self.map
            .iter()
            .filter(|(_, v)| *v == name)
            .map(|(k, _)| *k)
            .collect()
    }
}

/// Parse a key spelling: `C-x f`, `M-d`, `C-SPC`, `RET`, `DEL`, `a`.
pub fn parse_key(spec: &str) -> Result<ExtKey> {
    let mut flags = KeyFlags::empty();
    let mut parts = spec.split_whitespace().peekable();
    let mut code: Option<u8> = None;
    while let Some(part) = parts.next() {
        // A prefix chunk before the final key.
        if parts.peek().is_some() {
            match part {
                "C-x" => flags |= KeyFlags::PREF1,
                "C-c" => flags |= KeyFlags::PREF2,
                "C-h" => flags |= KeyFlags::PREF3,
                _ => return Err(EdError::failure(format!("Invalid key prefix '{part}'"))),
            }
            continue;
        }
        let mut rest = part;
        loop {
            if let Some(r) = rest.strip_prefix("C-") {
                if r.is_empty() {
                    return Err(EdError::failure(format!("Invalid key '{spec}'")));
                }
                flags |= KeyFlags::CTRL;
                rest = r;
            } else if let Some(r) = rest.strip_prefix("M-") {
                if r.is_empty() {
                    return Err(EdError::failure(format!("Invalid key '{spec}'")));
                }
                flags |= KeyFlags::META;
                rest = r;
            } else if let Some(r) = rest.strip_prefix("S-") {
                flags |= KeyFlags::SHIFT;
                rest = r;
            } else if let Some(r) = rest.strip_prefix("FN") {
                flags |= KeyFlags::FKEY;
                rest = r;
            } else {
                break;
            }
        }
        code = Some(match rest {
            "SPC" => b' ',
            "TAB" => b'\t',
            "RET" => b'\r',
            "ESC" => 0x1b,
            "DEL" => 0x7f,
            s if s.len() == 1 => s.as_bytes()[0],
            _ => return Err(EdError::failure(format!("Invalid key '{spec}'"))),
        });
    }
    match code {
        Some(c) => Ok(ExtKey::new(c, flags)),
        None => Err(EdError::failure(format!("Invalid key '{spec}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_basic_motion() {
        let b = KeyBindings::defaults();
        assert_eq!(b.lookup(ExtKey::ctrl(b'f')), Some("forwChar"));
        assert_eq!(b.prefix_of(ExtKey::ctrl(b'x')), Some(KeyFlags::PREF1));
        assert_eq!(b.prefix_of(ExtKey::ctrl(b'f')), None);
    }

    #[test]
    fn parse_simple_and_prefixed_keys() {
        assert_eq!(parse_key("a").unwrap(), ExtKey::plain(b'a'));
        assert_eq!(parse_key("C-g").unwrap(), ExtKey::ctrl(b'g'));
        assert_eq!(
            parse_key("C-x f").unwrap(),
            ExtKey::plain(b'f').with_prefix(KeyFlags::PREF1)
        );
        assert_eq!(
            parse_key("M-d").unwrap(),
            ExtKey::new(b'd', KeyFlags::META)
        );
        assert_eq!(parse_key("C-SPC").unwrap(), ExtKey::ctrl(b' '));
        assert!(parse_key("").is_err());
        assert!(parse_key("Q-x").is_err());
    }

    #[test]
    fn parse_round_trips_names() {
        let b = KeyBindings::defaults();
        for key in b.keys_of("killLine") {
            assert_eq!(parse_key(&key.name()).unwrap(), key);
        }
    }
}
