use serde::{Deserialize, Serialize};

/// How a bound key behaves when its gesture is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    /// Press, keep the key down for the hold duration, then release.
    Hold,
    /// Each detection flips the key between pressed and released.
    Toggle,
}

impl BindMode {
    /// Maps the wire-level `modoToggle` flag onto a mode.
    pub fn from_toggle(toggle: bool) -> Self {
        if toggle { BindMode::Toggle } else { BindMode::Hold }
    }

    /// Whether this is [`BindMode::Toggle`].
    pub fn is_toggle(self) -> bool {
        matches!(self, BindMode::Toggle)
    }
}

/// Key action bound to a gesture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bind {
    /// Key name handed to the input injector (e.g. `F1`, `space`, `a`).
    pub key: String,
    /// Hold or toggle behaviour.
    pub mode: BindMode,
    /// How long a hold-mode press lasts.
    #[serde(default)]
    pub hold_duration_ms: u64,
    /// Whether clients may replace this bind.
    #[serde(default = "default_customizable")]
    pub customizable: bool,
}

fn default_customizable() -> bool {
    true
}
