use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    S,
    SW,
    W,
    NW,
    N,
    NE,
    E,
    SE,
}

impl Direction {
    /// Positional order the rotation and character services report in.
    pub const SERVICE_ORDER: [Direction; 8] = [
        Direction::S,
        Direction::SW,
        Direction::W,
        Direction::NW,
        Direction::N,
        Direction::NE,
        Direction::E,
        Direction::SE,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::S => "s",
            Direction::SW => "sw",
            Direction::W => "w",
            Direction::NW => "nw",
            Direction::N => "n",
            Direction::NE => "ne",
            Direction::E => "e",
            Direction::SE => "se",
        }
    }

    /// Accepts short ("se") and long ("south-east", "South East") names.
    pub fn from_name(name: &str) -> Option<Direction> {
        let key: String = name
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        let direction = match key.as_str() {
            "s" | "south" => Direction::S,
            "sw" | "southwest" => Direction::SW,
            "w" | "west" => Direction::W,
            "nw" | "northwest" => Direction::NW,
            "n" | "north" => Direction::N,
            "ne" | "northeast" => Direction::NE,
            "e" | "east" => Direction::E,
            "se" | "southeast" => Direction::SE,
            _ => return None,
        };
        Some(direction)
    }

    /// Service label for a position, `dir{i}` past the eighth.
    pub fn service_label(index: usize) -> String {
        Direction::SERVICE_ORDER
            .get(index)
            .map(|d| d.as_str().to_string())
            .unwrap_or_else(|| format!("dir{}", index))
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct LabeledImage {
    pub label: String,
    pub image: RgbaImage,
}

impl LabeledImage {
    pub fn new(label: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            label: label.into(),
            image,
        }
    }
}

/// Up to 8 (label, image) pairs in the order a service returned them.
#[derive(Debug, Clone, Default)]
pub struct RotationSet {
    entries: Vec<LabeledImage>,
}

impl RotationSet {
    pub fn new(entries: Vec<LabeledImage>) -> Self {
        Self { entries }
    }

    /// Labels images positionally with the service's own order.
    pub fn from_service_order(images: Vec<RgbaImage>) -> Self {
        let entries = images
            .into_iter()
            .enumerate()
            .map(|(i, image)| LabeledImage::new(Direction::service_label(i), image))
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[LabeledImage] {
        &self.entries
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<LabeledImage> {
        self.entries
    }
}

impl IntoIterator for RotationSet {
    type Item = LabeledImage;
    type IntoIter = std::vec::IntoIter<LabeledImage>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
