//! Key handling for the interactive view.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::core::KeyConfig;
use crate::engine::Input;

/// Single-key bindings for the interactive actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keymap {
    pub execute: char,
    pub execute_all: char,
    pub execute_many: char,
    pub pause: char,
    pub quit: char,
}

impl Default for Keymap {
    fn default() -> Self {
        Self::from(&KeyConfig::default())
    }
}

impl From<&KeyConfig> for Keymap {
    /// Each binding is the first character of its config entry. Empty
    /// entries keep the built-in key.
    fn from(config: &KeyConfig) -> Self {
        fn key(value: &str, fallback: char) -> char {
            value.chars().next().unwrap_or(fallback)
        }
        Self {
            execute: key(&config.execute, 'e'),
            execute_all: key(&config.execute_all, 'a'),
            execute_many: key(&config.execute_many, 'm'),
            pause: key(&config.pause, 'p'),
            quit: key(&config.quit, 'q'),
        }
    }
}

impl Keymap {
    /// Translate a key press.
    pub fn map(&self, key: KeyEvent) -> Input {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return if key.code == KeyCode::Char('c') { Input::Quit } else { Input::Other };
        }
        match key.code {
            KeyCode::Left => Input::Previous,
            KeyCode::Right => Input::Next,
            KeyCode::Enter => Input::Enter,
            KeyCode::Char(c) if c.is_ascii_digit() => Input::Digit(c as u8 - b'0'),
            KeyCode::Char(c) if c == self.execute => Input::Execute,
            KeyCode::Char(c) if c == self.execute_all => Input::ExecuteAll,
            KeyCode::Char(c) if c == self.execute_many => Input::ExecuteMany,
            KeyCode::Char(c) if c == self.pause => Input::Pause,
            KeyCode::Char(c) if c == self.quit => Input::Quit,
            _ => Input::Other,
        }
    }
}
