//! Extended keys, key-sequence decoding, and the keyboard macro
//! recorder/player.
//!
//! An extended key is a 16-bit value: an 8-bit code point plus flag bits
//! for Ctrl, Meta, Shift, function keys, and the three prefix-key slots. A
//! key sequence is one key, or a prefix key OR-ed with the key that
//! follows it.

use bitflags::bitflags;
use core_status::{EdError, Result};
use smallvec::SmallVec;
use tracing::debug;

bitflags! {
    /// Modifier and prefix bits of an extended key.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeyFlags: u16 {
        const CTRL  = 0x0100;
        const META  = 0x0200;
        const SHIFT = 0x0400;
        const FKEY  = 0x0800;
        const PREF1 = 0x1000;
        const PREF2 = 0x2000;
        const PREF3 = 0x4000;
    }
}

/// A 16-bit extended key: 8-bit code point plus `KeyFlags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtKey(pub u16);

impl ExtKey {
    pub fn new(code: u8, flags: KeyFlags) -> Self {
        ExtKey(code as u16 | flags.bits())
    }

    pub fn plain(code: u8) -> Self {
        ExtKey(code as u16)
    }

    pub fn ctrl(code: u8) -> Self {
        Self::new(code, KeyFlags::CTRL)
    }

    pub fn code(self) -> u8 {
        (self.0 & 0x00ff) as u8
    }

    pub fn flags(self) -> KeyFlags {
        KeyFlags::from_bits_truncate(self.0)
    }

    pub fn with_prefix(self, prefix: KeyFlags) -> Self {
        ExtKey(self.0 | prefix.bits())
    }

    /// Printable name: `C-h TAB`-style spelling for binding display.
    pub fn name(self) -> String {
        let mut out = String::new();
        let flags = self.flags();
        if flags.contains(KeyFlags::PREF1) {
            out.push_str("C-x ");
        }
        if flags.contains(KeyFlags::PREF2) {
            out.push_str("C-c ");
        }
        if flags.contains(KeyFlags::PREF3) {
            out.push_str("C-h ");
        }
        if flags.contains(KeyFlags::META) {
            out.push_str("M-");
        }
        if flags.contains(KeyFlags::CTRL) {
            out.push_str("C-");
        }
        if flags.contains(KeyFlags::SHIFT) {
            out.push_str("S-");
        }
        if flags.contains(KeyFlags::FKEY) {
            out.push_str("FN");
        }
        let code = self.code();
        match code {
            b' ' => out.push_str("SPC"),
            b'\t' => out.push_str("TAB"),
            b'\r' => out.push_str("RET"),
            0x1b => out.push_str("ESC"),
            0x7f => out.push_str("DEL"),
            c if c.is_ascii_graphic() => out.push(c as char),
            c => out.push_str(&format!("\\{c:o}")),
        }
        out
    }
}

/// Anything that can produce raw extended keys (the terminal driver, or a
/// playing macro interposed in front of it).
pub trait KeySource {
    fn get_key(&mut self) -> Result<ExtKey>;
}

/// Key-sequence assembly with one-key pushback.
#[derive(Debug, Default)]
pub struct KeyDecoder {
    pending: Option<ExtKey>,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push back one key to be returned by the next `next_key`.
    pub fn unget(&mut self, key: ExtKey) {
        debug_assert!(self.pending.is_none());
        self.pending = Some(key);
    }

    pub fn next_key(&mut self, source: &mut dyn KeySource) -> Result<ExtKey> {
        match self.pending.take() {
            Some(key) => Ok(key),
            None => source.get_key(),
        }
    }

    /// Read one key sequence: a key, or a prefix key (per `prefix_of`)
    /// OR-ed into the key that follows.
    pub fn next_sequence(
        &mut self,
        source: &mut dyn KeySource,
        prefix_of: impl Fn(ExtKey) -> Option<KeyFlags>,
    ) -> Result<ExtKey> {
        let first = self.next_key(source)?;
        match prefix_of(first) {
            Some(prefix) => {
                let second = self.next_key(source)?;
                Ok(second.with_prefix(prefix))
            }
            None => Ok(first),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MacroState {
    Stopped,
    Recording,
    Playing,
}

/// Keyboard macro recorder and player.
///
/// Recording captures extended keys, so playback replays keys, not command
/// semantics: playing a macro under different key bindings runs whatever
/// the keys currently bind to. That matches the recorded-keystroke design
/// this editor inherits.
#[derive(Debug)]
pub struct MacroRecorder {
    state: MacroState,
    keys: SmallVec<[ExtKey; 32]>,
    play_index: usize,
    /// Remaining playback iterations.
    remaining: u32,
}

impl Default for MacroRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroRecorder {
    pub fn new() -> Self {
        Self {
            state: MacroState::Stopped,
            keys: SmallVec::new(),
            play_index: 0,
            remaining: 0,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state == MacroState::Recording
    }

    pub fn is_playing(&self) -> bool {
        self.state == MacroState::Playing
    }

    /// Begin recording; nested recording is rejected.
    pub fn begin_record(&mut self) -> Result<()> {
        match self.state {
            MacroState::Stopped => {
                self.keys.clear();
                self.state = MacroState::Recording;
                debug!(target: "input.macro", "record begin");
                Ok(())
            }
            _ => Err(EdError::failure("Macro already active")),
        }
    }

    /// Stop recording; the captured keys become the current macro. The
    /// terminating key of `endMacro` itself is not part of the capture
    /// (the dispatcher records keys before executing them and calls
    /// `drop_last` for the terminator).
    pub fn end_record(&mut self) -> Result<()> {
        if self.state != MacroState::Recording {
            return Err(EdError::failure("Not recording a macro"));
        }
        self.state = MacroState::Stopped;
        debug!(target: "input.macro", keys = self.keys.len(), "record end");
        Ok(())
    }

    /// Capture one key while recording.
    pub fn record(&mut self, key: ExtKey) {
        if self.state == MacroState::Recording {
            self.keys.push(key);
        }
    }

    /// Remove the most recently recorded key (the `endMacro` trigger).
    pub fn drop_last(&mut self) {
        self.keys.pop();
    }

    /// Start playback of the captured macro `n` times; `n < 0` plays until
    /// the iteration guard trips, clamped by `max_loop`.
    pub fn begin_play(&mut self, n: i64, max_loop: u32) -> Result<()> {
        if self.state != MacroState::Stopped {
            return Err(EdError::failure("Macro already active"))
        }
        if self.keys.is_empty() {
            return Err(EdError::failure("No macro defined"));
        }
        let iterations = if n < 0 {
            if max_loop == 0 { u32::MAX } else { max_loop }
        } else {
            n.min(u32::MAX as i64) as u32
        };
        if iterations == 0 {
            return Ok(());
        }
        self.remaining = iterations;
        self.play_index = 0;
        self.state = MacroState::Playing;
        debug!(target: "input.macro", iterations, "play begin");
        Ok(())
    }

    /// Next key during playback; `None` when playback has finished. At the
    /// end of an iteration the play index rewinds while iterations remain.
    pub fn play_key(&mut self) -> Option<ExtKey> {
        if self.state != MacroState::Playing {
            return None;
        }
        if self.play_index >= self.keys.len() {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.state = MacroState::Stopped;
                return None;
            }
            self.play_index = 0;
        }
        let key = self.keys[self.play_index];
        self.play_index += 1;
        Some(key)
    }

    /// Abort any recording or playback.
    pub fn stop(&mut self) {
        self.state = MacroState::Stopped;
    }

    pub fn keys(&self) -> &[ExtKey] {
        &self.keys
    }

    /// Replace the captured macro (macro-ring retrieval).
    pub fn load(&mut self, keys: &[ExtKey]) -> Result<()> {
        if self.state != MacroState::Stopped {
            return Err(EdError::failure("Macro already active"));
        }
        self.keys = SmallVec::from_slice(keys);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Feed(Vec<ExtKey>);
    impl KeySource for Feed {
        fn get_key(&mut self) -> Result<ExtKey> {
            if self.0.is_empty() {
                Err(EdError::failure("out of keys"))
            } else {
                Ok(self.0.remove(0))
            }
        }
    }

    #[test]
    fn extended_key_packs_code_and_flags() {
        let k = ExtKey::new(b'x', KeyFlags::CTRL | KeyFlags::META);
        assert_eq!(k.code(), b'x');
        assert!(k.flags().contains(KeyFlags::CTRL));
        assert!(k.flags().contains(KeyFlags::META));
        assert!(!k.flags().contains(KeyFlags::SHIFT));
    }

    #[test]
    fn prefix_composes_sequences() {
        let ctrl_x = ExtKey::ctrl(b'x');
        let mut feed = Feed(vec![ctrl_x, ExtKey::plain(b'f')]);
        let mut dec = KeyDecoder::new();
        let seq = dec
            .next_sequence(&mut feed, |k| {
                (k == ctrl_x).then_some(KeyFlags::PREF1)
            })
            .unwrap();
        assert_eq!(seq.code(), b'f');
        assert!(seq.flags().contains(KeyFlags::PREF1));
    }

    #[test]
    fn pushback_returns_key_first() {
        let mut feed = Feed(vec![ExtKey::plain(b'b')]);
        let mut dec = KeyDecoder::new();
        dec.unget(ExtKey::plain(b'a'));
        assert_eq!(dec.next_key(&mut feed).unwrap(), ExtKey::plain(b'a'));
        assert_eq!(dec.next_key(&mut feed).unwrap(), ExtKey::plain(b'b'));
    }

    #[test]
    fn record_and_play_n_iterations() {
        let mut mac = MacroRecorder::new();
        mac.begin_record().unwrap();
        mac.record(ExtKey::plain(b'a'));
        mac.record(ExtKey::plain(b'b'));
        mac.end_record().unwrap();

        mac.begin_play(3, 0).unwrap();
        let mut played = Vec::new();
        while let Some(k) = mac.play_key() {
            played.push(k.code());
        }
        assert_eq!(played, b"ababab".to_vec());
        assert!(!mac.is_playing());
    }

    #[test]
    fn nested_record_is_rejected() {
        let mut mac = MacroRecorder::new();
        mac.begin_record().unwrap();
        assert!(mac.begin_record().is_err());
    }

    #[test]
    fn play_of_empty_macro_fails() {
        let mut mac = MacroRecorder::new();
        assert!(mac.begin_play(1, 0).is_err());
    }

    #[test]
    fn unlimited_play_bounded_by_max_loop() {
        let mut mac = MacroRecorder::new();
        mac.begin_record().unwrap();
        mac.record(ExtKey::plain(b'z'));
        mac.end_record().unwrap();
        mac.begin_play(-1, 5).unwrap();
        let mut count = 0;
        while mac.play_key().is_some() {
            count += 1;
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn drop_last_removes_terminator() {
        let mut mac = MacroRecorder::new();
        mac.begin_record().unwrap();
        mac.record(ExtKey::plain(b'a'));
        mac.record(ExtKey::ctrl(b'e'));
        mac.drop_last();
        mac.end_record().unwrap();
        assert_eq!(mac.keys(), &[ExtKey::plain(b'a')]);
    }

    #[test]
    fn key_names_render() {
        assert_eq!(ExtKey::plain(b'a').name(), "a");
        assert_eq!(ExtKey::ctrl(b'g').name(), "C-g");
        assert_eq!(
            ExtKey::new(b'f', KeyFlags::PREF1).name(),
            "C-x f"
        );
    }
}
