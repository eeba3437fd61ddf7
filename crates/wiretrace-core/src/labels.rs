//! Neurite type and cluster label tables.

use serde::{Deserialize, Serialize};

/// Number of neurite type slots.
pub const TYPE_SLOTS: usize = 11;

/// Number of cluster slots.
pub const CLUSTER_SLOTS: usize = 11;

/// The fixed drawing palette. Discriminants are the indices stored in
/// data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedColor {
    /// `#000000`
    Black,
    /// `#0000FF`
    Blue,
    /// `#00FFFF`
    Cyan,
    /// `#00FF00`
    Green,
    /// `#FF00FF`
    Magenta,
    /// `#FFC800`
    Orange,
    /// `#FFAFAF`
    Pink,
    /// `#FF0000`
    Red,
    /// `#FFFF00`
    Yellow,
}

impl NamedColor {
    /// Every palette entry in index order.
    pub const ALL: [Self; 9] = [
        Self::Black,
        Self::Blue,
        Self::Cyan,
        Self::Green,
        Self::Magenta,
        Self::Orange,
        Self::Pink,
        Self::Red,
        Self::Yellow,
    ];

    /// Palette entry for a stored index.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Stored index of this entry.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Black => "Black",
            Self::Blue => "Blue",
            Self::Cyan => "Cyan",
            Self::Green => "Green",
            Self::Magenta => "Magenta",
            Self::Orange => "Orange",
            Self::Pink => "Pink",
            Self::Red => "Red",
            Self::Yellow => "Yellow",
        }
    }

    /// RGB components.
    #[must_use]
    pub const fn rgb(self) -> [u8; 3] {
        match self {
            Self::Black => [0, 0, 0],
            Self::Blue => [0, 0, 255],
            Self::Cyan => [0, 255, 255],
            Self::Green => [0, 255, 0],
            Self::Magenta => [255, 0, 255],
            Self::Orange => [255, 200, 0],
            Self::Pink => [255, 175, 175],
            Self::Red => [255, 0, 0],
            Self::Yellow => [255, 255, 0],
        }
    }

    /// `#rrggbb` notation.
    #[must_use]
    pub fn hex(self) -> String {
        let [r, g, b] = self.rgb();
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

/// Name and drawing color of one neurite type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeLabel {
    /// Type name.
    pub name: String,
    /// Color used to draw tracings of this type.
    pub color: NamedColor,
}

/// The type and cluster tables shared by all tracings.
///
/// Tracings store indices into these tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTables {
    /// Exactly [`TYPE_SLOTS`] entries.
    pub types: Vec<TypeLabel>,
    /// Exactly [`CLUSTER_SLOTS`] entries.
    pub clusters: Vec<String>,
}

impl LabelTables {
    /// Name of type `index`, empty for unknown indices.
    #[must_use]
    pub fn type_name(&self, index: usize) -> &str {
        self.types.get(index).map_or("", |t| t.name.as_str())
    }

    /// Drawing color of type `index`, magenta for unknown indices.
    #[must_use]
    pub fn type_color(&self, index: usize) -> NamedColor {
        self.types.get(index).map_or(NamedColor::Magenta, |t| t.color)
    }

    /// Name of cluster `index`, empty for unknown indices.
    #[must_use]
    pub fn cluster_name(&self, index: usize) -> &str {
        self.clusters.get(index).map_or("", String::as_str)
    }
}

impl Default for LabelTables {
    fn default() -> Self {
        let mut types: Vec<TypeLabel> = [
            ("Default", NamedColor::Magenta),
            ("Axon", NamedColor::Red),
            ("Dendrite", NamedColor::Blue),
            ("Primary", NamedColor::Red),
            ("Secondary", NamedColor::Blue),
            ("Tertiary", NamedColor::Yellow),
        ]
        .into_iter()
        .map(|(name, color)| TypeLabel {
            name: name.to_owned(),
            color,
        })
        .collect();
        types.extend((6..TYPE_SLOTS).map(|i| TypeLabel {
            name: format!("Type {i:02}"),
            color: NamedColor::Magenta,
        }));

        let mut clusters = vec![String::from("Default")];
        clusters.extend((1..CLUSTER_SLOTS).map(|i| format!("Cluster {i:02}")));

        Self { types, clusters }
    }
}
