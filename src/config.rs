//! Engine configuration.
//!
//! Root selection and node coloring were implicit, inconsistent behaviors in
//! earlier tooling for this format; here both are explicit configuration.

use crate::color::ColorConfig;
use crate::error::Result;
use crate::id::NoteId;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the root note (from which depth is measured) is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RootSelection {
    /// A fixed, configured identity.
    Fixed { id: NoteId },
    /// The lexicographically smallest identity in the graph.
    LexicographicMin,
}

impl Default for RootSelection {
    fn default() -> Self {
        RootSelection::LexicographicMin
    }
}

/// Top-level configuration for a [`Zettelkasten`](crate::Zettelkasten).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KastenConfig {
    pub root: RootSelection,
    pub color: ColorConfig,
}

impl KastenConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_root_is_lexicographic_min() {
        let config = KastenConfig::default();
        assert_eq!(config.root, RootSelection::LexicographicMin);
    }

    #[test]
    fn test_parse_fixed_root() {
        let config = KastenConfig::from_toml_str(
            r#"
            [root]
            strategy = "fixed"
            id = "20200416143522"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.root,
            RootSelection::Fixed {
                id: NoteId::from("20200416143522")
            }
        );
    }

    #[test]
    fn test_parse_lexicographic_root() {
        let config = KastenConfig::from_toml_str(
            r#"
            [root]
            strategy = "lexicographic_min"
            "#,
        )
        .unwrap();
        assert_eq!(config.root, RootSelection::LexicographicMin);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = KastenConfig::from_toml_str("").unwrap();
        assert_eq!(config.root, RootSelection::LexicographicMin);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(KastenConfig::from_toml_str("root = [").is_err());
    }
}
