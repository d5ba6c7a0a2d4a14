//! Keyboard shortcuts suppressed while the lockdown is active.
//!
//! Blocking raises the cost of evasion but is not a detection mechanism;
//! nothing here adds a strike.

use crate::collector::types::KeyInput;
use serde::{Deserialize, Serialize};

/// Why an input was suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockedInput {
    DevTools,
    ViewSource,
    TabOrWindow,
    AppSwitch,
    ScreenCapture,
    Print,
    FullscreenToggle,
    Escape,
    ContextMenu,
}

/// Shortcut classifier.
#[derive(Debug, Clone, Default)]
pub struct KeyPolicy;

impl KeyPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Classify a key press; `None` means it passes through.
    pub fn classify(&self, input: &KeyInput) -> Option<BlockedInput> {
        let key = input.key.to_lowercase();
        let cmd = input.command();

        match key.as_str() {
            "f12" => return Some(BlockedInput::DevTools),
            "f11" => return Some(BlockedInput::FullscreenToggle),
            "escape" | "esc" => return Some(BlockedInput::Escape),
            "printscreen" | "prtsc" => return Some(BlockedInput::ScreenCapture),
            "tab" if input.alt => return Some(BlockedInput::AppSwitch),
            "f4" if input.alt => return Some(BlockedInput::AppSwitch),
            _ => {}
        }

        if !cmd {
            return None;
        }

        if input.shift {
            match key.as_str() {
                "i" | "j" | "c" => Some(BlockedInput::DevTools),
                "n" | "t" => Some(BlockedInput::TabOrWindow),
                _ => None,
            }
        } else if input.alt && input.meta && key == "i" {
            // Cmd+Option+I on macOS
            Some(BlockedInput::DevTools)
        } else {
            match key.as_str() {
                "u" => Some(BlockedInput::ViewSource),
                "w" | "t" | "n" => Some(BlockedInput::TabOrWindow),
                "p" => Some(BlockedInput::Print),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_devtools_shortcuts() {
        let policy = KeyPolicy::new();
        assert_eq!(
            policy.classify(&KeyInput::plain("F12")),
            Some(BlockedInput::DevTools)
        );
        assert_eq!(
            policy.classify(&KeyInput::ctrl_shift("I")),
            Some(BlockedInput::DevTools)
        );
        assert_eq!(
            policy.classify(&KeyInput::ctrl_shift("j")),
            Some(BlockedInput::DevTools)
        );
        let mac = KeyInput {
            key: "i".to_string(),
            meta: true,
            alt: true,
            ..Default::default()
        };
        assert_eq!(policy.classify(&mac), Some(BlockedInput::DevTools));
    }

    #[test]
    fn test_window_shortcuts() {
        let policy = KeyPolicy::new();
        assert_eq!(
            policy.classify(&KeyInput::ctrl("u")),
            Some(BlockedInput::ViewSource)
        );
        assert_eq!(
            policy.classify(&KeyInput::ctrl("w")),
            Some(BlockedInput::TabOrWindow)
        );
        assert_eq!(
            policy.classify(&KeyInput::ctrl_shift("N")),
            Some(BlockedInput::TabOrWindow)
        );
        assert_eq!(
            policy.classify(&KeyInput::alt("Tab")),
            Some(BlockedInput::AppSwitch)
        );
        assert_eq!(
            policy.classify(&KeyInput::alt("F4")),
            Some(BlockedInput::AppSwitch)
        );
        assert_eq!(
            policy.classify(&KeyInput::plain("PrintScreen")),
            Some(BlockedInput::ScreenCapture)
        );
        assert_eq!(
            policy.classify(&KeyInput::plain("Escape")),
            Some(BlockedInput::Escape)
        );
    }

    #[test]
    fn test_ordinary_typing_passes() {
        let policy = KeyPolicy::new();
        for key in ["a", "Tab", "Enter", "Backspace", "u", "F4"] {
            assert_eq!(policy.classify(&KeyInput::plain(key)), None, "{key}");
        }
        assert_eq!(policy.classify(&KeyInput::ctrl("c")), None);
        assert_eq!(policy.classify(&KeyInput::ctrl("v")), None);
    }
}
