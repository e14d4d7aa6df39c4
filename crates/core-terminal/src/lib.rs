//! Terminal backend abstraction and the crossterm implementation.
//!
//! The editor core consumes only this trait: raw key input decoded to
//! extended keys, absolute cursor positioning, erase-to-EOL, attribute
//! runs, beep, and size queries. Attribute markers embedded in buffer text
//! map onto `TextAttr` runs here.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{cursor, event, execute, queue, style, terminal};

use core_input::{ExtKey, KeyFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAttr {
    Plain,
    Bold,
    Underline,
    Reverse,
}

pub trait TerminalBackend {
    fn enter(&mut self) -> Result<()>;
    fn leave(&mut self) -> Result<()>;
    /// Block for the next extended key. Resize events update the cached
    /// size and surface as a refresh request key (`C-l`).
    fn get_key(&mut self) -> Result<ExtKey>;
    /// Non-blocking poll used by abort checks at suspension points.
    fn key_pending(&mut self, wait: Duration) -> Result<bool>;
    fn size(&self) -> (u16, u16);
    fn move_to(&mut self, row: u16, col: u16) -> Result<()>;
    fn erase_eol(&mut self) -> Result<()>;
    fn write_text(&mut self, text: &[u8], attr: TextAttr) -> Result<()>;
    fn beep(&mut self) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// Crossterm-backed terminal.
pub struct CrosstermBackend {
    out: io::Stdout,
    size: (u16, u16),
    entered: bool,
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermBackend {
    pub fn new() -> Self {
        let size = terminal::size().unwrap_or((80, 24));
        Self {
            out: io::stdout(),
            size: (size.1, size.0),
            entered: false,
        }
    }

    fn translate(key: KeyEvent) -> Option<ExtKey> {
        let mut flags = KeyFlags::empty();
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            flags |= KeyFlags::CTRL;
        }
        if key.modifiers.contains(KeyModifiers::ALT) {
            flags |= KeyFlags::META;
        }
        let code = match key.code {
            // Shift is implicit in the character for printables.
            KeyCode::Char(c) if c.is_ascii() => c as u8,
            KeyCode::Enter => b'\r',
            KeyCode::Tab => b'\t',
            KeyCode::Backspace => 0x7f,
            KeyCode::Esc => 0x1b,
            KeyCode::Up => {
                flags |= KeyFlags::FKEY;
                b'P'
            }
            KeyCode::Down => {
                flags |= KeyFlags::FKEY;
                b'N'
            }
            KeyCode::Left => {
                flags |= KeyFlags::FKEY;
                b'B'
            }
            KeyCode::Right => {
                flags |= KeyFlags::FKEY;
                b'F'
            }
            KeyCode::Home => {
                flags |= KeyFlags::FKEY;
                b'<'
            }
            KeyCode::End => {
                flags |= KeyFlags::FKEY;
                b'>'
            }
            KeyCode::PageUp => {
                flags |= KeyFlags::FKEY;
                b'V'
            }
            KeyCode::PageDown => {
                flags |= KeyFlags::FKEY;
                b'v'
            }
            KeyCode::Delete => {
                flags |= KeyFlags::FKEY;
                b'D'
            }
            KeyCode::F(n) => {
                flags |= KeyFlags::FKEY;
                b'0' + (n % 10) as u8
            }
            _ => return None,
        };
        // Control characters arrive already folded (C-a as 0x01) in some
        // terminals; normalize to the letter + CTRL form.
        if flags.contains(KeyFlags::CTRL) && code.is_ascii_alphabetic() {
            Some(ExtKey::new(code.to_ascii_lowercase(), flags))
        } else if code < 0x20 && !matches!(code, b'\r' | b'\t' | 0x1b) {
            Some(ExtKey::new(code + 0x60, flags | KeyFlags::CTRL))
        } else {
            Some(ExtKey::new(code, flags))
        }
    }
}

impl TerminalBackend for CrosstermBackend {
    fn enter(&mut self) -> Result<()> {
        terminal::enable_raw_mode()?;
        execute!(self.out, terminal::EnterAlternateScreen, cursor::Hide)?;
        self.entered = true;
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        if self.entered {
            execute!(self.out, terminal::LeaveAlternateScreen, cursor::Show)?;
            terminal::disable_raw_mode()?;
            self.entered = false;
        }
        Ok(())
    }

    fn get_key(&mut self) -> Result<ExtKey> {
        loop {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if let Some(ext) = Self::translate(key) {
                        return Ok(ext);
                    }
                }
                Event::Resize(cols, rows) => {
                    self.size = (rows, cols);
                    return Ok(ExtKey::ctrl(b'l'));
                }
                _ => {}
            }
        }
    }

    fn key_pending(&mut self, wait: Duration) -> Result<bool> {
        Ok(event::poll(wait)?)
    }

    fn size(&self) -> (u16, u16) {
        self.size
    }

    fn move_to(&mut self, row: u16, col: u16) -> Result<()> {
        queue!(self.out, cursor::MoveTo(col, row))?;
        Ok(())
    }

    fn erase_eol(&mut self) -> Result<()> {
        queue!(
            self.out,
            terminal::Clear(terminal::ClearType::UntilNewLine)
        )?;
        Ok(())
    }

    fn write_text(&mut self, text: &[u8], attr: TextAttr) -> Result<()> {
        let rendered = String::from_utf8_lossy(text);
        match attr {
            TextAttr::Plain => queue!(self.out, style::Print(rendered))?,
            TextAttr::Bold => queue!(
                self.out,
                style::SetAttribute(style::Attribute::Bold),
                style::Print(rendered),
                style::SetAttribute(style::Attribute::Reset)
            )?,
            TextAttr::Underline => queue!(
                self.out,
                style::SetAttribute(style::Attribute::Underlined),
                style::Print(rendered),
                style::SetAttribute(style::Attribute::Reset)
            )?,
            TextAttr::Reverse => queue!(
                self.out,
                style::SetAttribute(style::Attribute::Reverse),
                style::Print(rendered),
                style::SetAttribute(style::Attribute::Reset)
            )?,
        }
        Ok(())
    }

    fn beep(&mut self) -> Result<()> {
        self.out.write_all(b"\x07")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

impl Drop for CrosstermBackend {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}
