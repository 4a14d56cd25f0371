//! Direction correction for the 8-way rotation service.
//!
//! The service returns its rotations in the positional order
//! s, sw, w, nw, n, ne, e, se, but the east/west axis of the rendered
//! images is mirrored relative to those labels. Verified against a
//! south-east arrow reference at 64x64, low top-down view; other sizes and
//! views are assumed to behave the same, which `tests/rotation_mapping.rs`
//! pins down.

use crate::models::{Direction, LabeledImage, RotationSet};

/// Label each service position actually depicts.
pub const CORRECTED_ORDER: [Direction; 8] = [
    Direction::S,
    Direction::SE,
    Direction::E,
    Direction::NE,
    Direction::N,
    Direction::NW,
    Direction::W,
    Direction::SW,
];

/// Relabels a rotation set by position, ignoring the service's own labels.
/// Positions past the table keep whatever label the service gave them.
pub fn correct(set: RotationSet) -> RotationSet {
    let entries = set
        .into_iter()
        .enumerate()
        .map(|(i, entry)| match CORRECTED_ORDER.get(i) {
            Some(direction) => LabeledImage::new(direction.as_str(), entry.image),
            None => entry,
        })
        .collect();
    RotationSet::new(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn tagged(n: usize) -> RotationSet {
        let images = (0..n)
            .map(|i| RgbaImage::from_pixel(1, 1, Rgba([i as u8, 0, 0, 255])))
            .collect();
        RotationSet::from_service_order(images)
    }

    #[test]
    fn full_set_is_relabelled_positionally() {
        let corrected = correct(tagged(8));
        assert_eq!(
            corrected.labels(),
            vec!["s", "se", "e", "ne", "n", "nw", "w", "sw"]
        );
        // images stay where they were
        for (i, entry) in corrected.entries().iter().enumerate() {
            assert_eq!(entry.image.get_pixel(0, 0)[0], i as u8);
        }
    }

    #[test]
    fn service_labels_are_ignored() {
        let set = RotationSet::new(vec![
            LabeledImage::new("se", RgbaImage::new(1, 1)),
            LabeledImage::new("whatever", RgbaImage::new(1, 1)),
        ]);
        assert_eq!(correct(set).labels(), vec!["s", "se"]);
    }

    #[test]
    fn partial_set_keeps_its_length() {
        let corrected = correct(tagged(3));
        assert_eq!(corrected.labels(), vec!["s", "se", "e"]);
    }

    #[test]
    fn entries_past_eight_keep_service_label() {
        let corrected = correct(tagged(9));
        assert_eq!(corrected.len(), 9);
        assert_eq!(corrected.entries()[8].label, "dir8");
        assert_eq!(corrected.entries()[7].label, "sw");
    }
}
