//! Keyboard simulation for bound gestures.

use crate::{AppError, AppResult};

use std::panic::Location;

use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use error_location::ErrorLocation;
use tracing::trace;

/// Presses and releases keys on the host.
///
/// Calls are blocking and must run off the async runtime.
pub trait KeyInjector: Send + Sync + 'static {
    /// Press `key` and leave it down.
    fn press(&self, key: Key) -> AppResult<()>;

    /// Release `key`.
    fn release(&self, key: Key) -> AppResult<()>;
}

/// [`KeyInjector`] backed by `enigo`.
///
/// `Enigo` is not `Send`, so a fresh instance is created for every call.
#[derive(Debug, Default)]
pub struct EnigoInjector;

impl EnigoInjector {
    #[track_caller]
    fn send(key: Key, direction: Direction) -> AppResult<()> {
        let mut enigo = Enigo::new(&Settings::default()).map_err(|e| {
            AppError::KeyInjectionFailed {
                reason: format!("Failed to create Enigo: {}", e),
                location: ErrorLocation::from(Location::caller()),
            }
        })?;

        enigo
            .key(key, direction)
            .map_err(|e| AppError::KeyInjectionFailed {
                reason: format!("Failed to send {:?} {:?}: {}", key, direction, e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        trace!(key = ?key, direction = ?direction, "Key event sent");

        Ok(())
    }
}

impl KeyInjector for EnigoInjector {
    fn press(&self, key: Key) -> AppResult<()> {
        Self::send(key, Direction::Press)
    }

    fn release(&self, key: Key) -> AppResult<()> {
        Self::send(key, Direction::Release)
    }
}

/// Map a bind's key name to an `enigo` key. Case-insensitive.
///
/// Returns `None` for names that have no mapping.
pub fn parse_key(name: &str) -> Option<Key> {
    let trimmed = name.trim();

    let mut chars = trimmed.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(Key::Unicode(c.to_ascii_lowercase()));
    }

    let key = match trimmed.to_ascii_lowercase().as_str() {
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        "space" => Key::Space,
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "esc" | "escape" => Key::Escape,
        "backspace" => Key::Backspace,
        "delete" => Key::Delete,
        "shift" => Key::Shift,
        "ctrl" | "control" => Key::Control,
        "alt" => Key::Alt,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        _ => return None,
    };

    Some(key)
}
