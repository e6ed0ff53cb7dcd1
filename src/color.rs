//! Node coloring for graph renderers.
//!
//! Every scheme is total: any note in any graph gets a color, falling back
//! to `"white"` rather than failing.

use crate::kasten::Zettelkasten;
use crate::note::Note;
use serde::{Deserialize, Serialize};

/// Color assigned when no scheme rule applies.
pub const FALLBACK_COLOR: &str = "white";

fn default_palette() -> Vec<String> {
    [
        "#8dd3c7", "#ffffb3", "#bebada", "#fb8072", "#80b1d3", "#fdb462", "#b3de69", "#fccde5",
        "#d9d9d9", "#bc80bd", "#ccebc5", "#ffed6f",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// How nodes are colored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum ColorConfig {
    /// Every node gets the same color.
    Constant { color: String },
    /// Color by category tag. Sorted categories are assigned palette
    /// entries in order, cycling; a note colored this way must carry
    /// exactly one category tag, anything else falls back.
    Category {
        #[serde(default = "default_palette")]
        palette: Vec<String>,
    },
    /// Color by depth below the root; depths beyond the palette share its
    /// last entry.
    Depth {
        #[serde(default = "default_palette")]
        palette: Vec<String>,
    },
}

impl Default for ColorConfig {
    fn default() -> Self {
        ColorConfig::Depth {
            palette: default_palette(),
        }
    }
}

impl ColorConfig {
    /// Color for one note.
    pub fn pick(&self, kasten: &Zettelkasten, note: &Note) -> String {
        match self {
            ColorConfig::Constant { color } => color.clone(),
            ColorConfig::Category { palette } => {
                if palette.is_empty() {
                    return FALLBACK_COLOR.to_string();
                }
                let categories: Vec<&String> =
                    note.tags.iter().filter(|t| t.starts_with("c_")).collect();
                let [category] = categories.as_slice() else {
                    return FALLBACK_COLOR.to_string();
                };
                match kasten.categories().iter().position(|c| c == *category) {
                    Some(index) => palette[index % palette.len()].clone(),
                    None => FALLBACK_COLOR.to_string(),
                }
            }
            ColorConfig::Depth { palette } => {
                if palette.is_empty() {
                    return FALLBACK_COLOR.to_string();
                }
                let index = (kasten.depth(&note.id) as usize).min(palette.len() - 1);
                palette[index].clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::MemorySink;
    use crate::id::NoteId;

    fn note(id: &str, content: &str) -> Note {
        let sink = MemorySink::new();
        Note::from_content(NoteId::from(id), format!("n_{}.md", id), content, &sink)
    }

    #[test]
    fn test_constant() {
        let zk = Zettelkasten::default();
        let n = note("00000000000001", "# A\n");
        let config = ColorConfig::Constant {
            color: "red".to_string(),
        };
        assert_eq!(config.pick(&zk, &n), "red");
    }

    #[test]
    fn test_depth_indexes_palette() {
        let mut zk = Zettelkasten::default();
        let root = note("00000000000001", "# A\n\n[[00000000000002]]\n");
        let child = note("00000000000002", "# B\n");
        zk.insert(root.clone());
        zk.insert(child.clone());

        let config = ColorConfig::Depth {
            palette: vec!["zero".to_string(), "one".to_string()],
        };
        assert_eq!(config.pick(&zk, &root), "zero");
        assert_eq!(config.pick(&zk, &child), "one");
    }

    #[test]
    fn test_depth_saturates_at_palette_end() {
        let mut zk = Zettelkasten::default();
        let a = note("00000000000001", "# A\n\n[[00000000000002]]\n");
        let b = note("00000000000002", "# B\n\n[[00000000000003]]\n");
        let c = note("00000000000003", "# C\n");
        zk.add_notes([a, b, c.clone()]);

        let config = ColorConfig::Depth {
            palette: vec!["zero".to_string(), "rest".to_string()],
        };
        assert_eq!(config.pick(&zk, &c), "rest");
    }

    #[test]
    fn test_category_assigns_by_sorted_order() {
        let mut zk = Zettelkasten::default();
        let art = note("00000000000001", "# Art\nTags: #c_art\n");
        let math = note("00000000000002", "# Math\nTags: #c_math\n");
        zk.add_notes([art.clone(), math.clone()]);

        let config = ColorConfig::Category {
            palette: vec!["first".to_string(), "second".to_string()],
        };
        assert_eq!(config.pick(&zk, &art), "first");
        assert_eq!(config.pick(&zk, &math), "second");
    }

    #[test]
    fn test_category_requires_exactly_one() {
        let mut zk = Zettelkasten::default();
        let none = note("00000000000001", "# A\nTags: #plain\n");
        let two = note("00000000000002", "# B\nTags: #c_x #c_y\n");
        zk.add_notes([none.clone(), two.clone()]);

        let config = ColorConfig::Category {
            palette: default_palette(),
        };
        assert_eq!(config.pick(&zk, &none), FALLBACK_COLOR);
        assert_eq!(config.pick(&zk, &two), FALLBACK_COLOR);
    }

    #[test]
    fn test_parse_scheme_from_toml() {
        let config: ColorConfig = toml::from_str(
            r##"
            scheme = "constant"
            color = "#abcdef"
            "##,
        )
        .unwrap();
        assert_eq!(
            config,
            ColorConfig::Constant {
                color: "#abcdef".to_string()
            }
        );
    }

    #[test]
    fn test_default_is_depth() {
        assert!(matches!(ColorConfig::default(), ColorConfig::Depth { .. }));
    }
}
