//! Environment-driven configuration.
//!
//! Read once, at [`crate::scene::Scene`] creation, exactly as `smithay`
//! reads its own `WAYLAND_DEBUG`-style knobs: a single lookup, a small
//! closed enum, and a logged fallback for anything unrecognized.

use std::env;

/// Debug visualization mode for damage tracking, selected via
/// `WLR_SCENE_DEBUG_DAMAGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugDamageMode {
    /// No extra visualization; damage is only used to scissor rendering.
    #[default]
    None,
    /// Force a full-output repaint on every commit, as if nothing were cached.
    Rerender,
    /// Render composited frames normally, but overlay fading red rectangles
    /// over the regions that were actually damaged.
    Highlight,
}

impl DebugDamageMode {
    /// Reads `WLR_SCENE_DEBUG_DAMAGE` from the environment.
    ///
    /// Unset or `"none"` maps to [`DebugDamageMode::None`]. Any other
    /// unrecognized value is logged at `error` level and also falls back to
    /// `None`; it is never treated as fatal.
    pub fn from_env() -> Self {
        match env::var("WLR_SCENE_DEBUG_DAMAGE") {
            Err(_) => DebugDamageMode::None,
            Ok(value) => Self::parse(&value),
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "" | "none" => DebugDamageMode::None,
            "rerender" => DebugDamageMode::Rerender,
            "highlight" => DebugDamageMode::Highlight,
            other => {
                tracing::error!(value = other, "unknown WLR_SCENE_DEBUG_DAMAGE value, defaulting to none");
                DebugDamageMode::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_values() {
        assert_eq!(DebugDamageMode::parse("none"), DebugDamageMode::None);
        assert_eq!(DebugDamageMode::parse(""), DebugDamageMode::None);
        assert_eq!(DebugDamageMode::parse("rerender"), DebugDamageMode::Rerender);
        assert_eq!(DebugDamageMode::parse("highlight"), DebugDamageMode::Highlight);
    }

    #[test]
    fn unknown_value_falls_back_to_none() {
        assert_eq!(DebugDamageMode::parse("bogus"), DebugDamageMode::None);
    }
}
