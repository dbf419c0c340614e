use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Jeu par défaut de l'éditeur (du plus sombre au plus dense).
pub const CHARSET_DEFAULT: &str = " *,    ./O#SF";

/// 10 caractères, compact, bon contraste.
pub const CHARSET_COMPACT: &str = " .:-=+*#%@";

/// Blocs Unicode, pseudo-pixels.
pub const CHARSET_BLOCKS: &str = " ░▒▓█";

/// Minimal, haut contraste.
pub const CHARSET_MINIMAL: &str = " .:░▒▓█";

/// Presets selectable from the editor, with their display names.
pub const PRESETS: &[(&str, &str)] = &[
    ("Default", CHARSET_DEFAULT),
    ("Compact", CHARSET_COMPACT),
    ("Blocks", CHARSET_BLOCKS),
    ("Minimal", CHARSET_MINIMAL),
];

/// Ordered, non-empty sequence of glyphs.
///
/// Index order is the brightness/selection order used by the effect.
/// Duplicates are allowed.
///
/// # Example
/// ```
/// use gg_core::charset::CharacterSet;
/// let set = CharacterSet::new(" .#").unwrap();
/// assert_eq!(set.len(), 3);
/// assert_eq!(set.get(2), Some('#'));
/// assert!(CharacterSet::new("").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CharacterSet {
    chars: Vec<char>,
}

impl CharacterSet {
    /// Split `text` into glyphs.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] if `text` is empty.
    pub fn new(text: &str) -> Result<Self, CoreError> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Err(CoreError::config("jeu de caractères vide"));
        }
        Ok(Self { chars })
    }

    /// Number of glyphs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Always `false`; kept for API symmetry with slices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Glyph at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<char> {
        self.chars.get(index).copied()
    }

    /// Glyphs in selection order.
    #[must_use]
    pub fn as_slice(&self) -> &[char] {
        &self.chars
    }

    /// The first `limit` glyphs (at least one is always kept).
    #[must_use]
    pub fn truncated(&self, limit: usize) -> Self {
        let keep = limit.clamp(1, self.chars.len());
        Self {
            chars: self.chars[..keep].to_vec(),
        }
    }
}

impl Default for CharacterSet {
    fn default() -> Self {
        Self {
            chars: CHARSET_DEFAULT.chars().collect(),
        }
    }
}

impl fmt::Display for CharacterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ch in &self.chars {
            write!(f, "{ch}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for CharacterSet {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CharacterSet> for String {
    fn from(value: CharacterSet) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_editor_default() {
        let set = CharacterSet::default();
        assert_eq!(set.to_string(), CHARSET_DEFAULT);
        assert_eq!(set.len(), 13);
    }

    #[test]
    fn keeps_duplicates_and_order() {
        let set = CharacterSet::new("a  a").unwrap();
        assert_eq!(set.as_slice(), &['a', ' ', ' ', 'a']);
    }

    #[test]
    fn unicode_glyphs_count_as_one() {
        let set = CharacterSet::new(CHARSET_BLOCKS).unwrap();
        assert_eq!(set.len(), 5);
        assert_eq!(set.get(4), Some('█'));
    }

    #[test]
    fn truncated_keeps_prefix() {
        let set = CharacterSet::new("abcdef").unwrap();
        assert_eq!(set.truncated(3).to_string(), "abc");
        assert_eq!(set.truncated(0).to_string(), "a");
        assert_eq!(set.truncated(99).to_string(), "abcdef");
    }
}
