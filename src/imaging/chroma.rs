//! Background and artifact removal for generated sprites.
//!
//! Both extractors only ever touch the alpha channel; RGB values are kept so
//! a second pass sees exactly the same colors as the first.

use image::{Rgba, RgbaImage};
use std::collections::VecDeque;

pub const DEFAULT_TOLERANCE: f64 = 30.0;

const DARK_BACKGROUND_SUM: u32 = 90;
const DARK_TOLERANCE: f64 = 10.0;
const BRIGHT_BACKGROUND_SUM: u32 = 400;
const BRIGHT_TOLERANCE: f64 = 60.0;

/// Clears the background of `image` by flood filling from its border.
///
/// The background color is `expected` when given, otherwise the most
/// frequent of the four corner colors. Only pixels reachable from a
/// background-like border pixel through 4-connected background-like
/// neighbours are cleared, so enclosed pixels that happen to share the
/// background color survive. Images with at least three fully transparent
/// corners are returned untouched.
pub fn remove_background(
    mut image: RgbaImage,
    expected: Option<[u8; 3]>,
    tolerance: f64,
) -> RgbaImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image;
    }

    let corners = corner_pixels(&image);
    let transparent = corners.iter().filter(|px| px[3] == 0).count();
    if transparent >= 3 {
        return image;
    }

    let background = expected.unwrap_or_else(|| corner_mode(&corners));
    let tolerance = adaptive_tolerance(background, tolerance);

    let cleared = flood_from_border(&image, background, tolerance);
    let mut count = 0usize;
    for (idx, clear) in cleared.iter().enumerate() {
        if *clear {
            let x = (idx as u32) % width;
            let y = (idx as u32) / width;
            image.get_pixel_mut(x, y)[3] = 0;
            count += 1;
        }
    }

    log::debug!(
        "Background {:?} (tolerance {}): cleared {} of {} pixels",
        background,
        tolerance,
        count,
        width * height
    );
    image
}

/// Clears every pixel with a strong red cast (R > 150 and R exceeding both
/// G and B by more than 60), wherever it sits. Returns the number cleared.
pub fn remove_ground_stain(image: &mut RgbaImage) -> usize {
    let mut count = 0;
    for px in image.pixels_mut() {
        if is_ground_stain(px) {
            px[3] = 0;
            count += 1;
        }
    }
    if count > 0 {
        log::debug!("Removed {} ground stain pixels", count);
    }
    count
}

fn is_ground_stain(px: &Rgba<u8>) -> bool {
    let [r, g, b, a] = px.0.map(u16::from);
    a > 10 && r > 150 && r > g + 60 && r > b + 60
}

fn corner_pixels(image: &RgbaImage) -> [Rgba<u8>; 4] {
    let (w, h) = image.dimensions();
    [
        *image.get_pixel(0, 0),
        *image.get_pixel(w - 1, 0),
        *image.get_pixel(0, h - 1),
        *image.get_pixel(w - 1, h - 1),
    ]
}

/// Most frequent corner RGB; ties go to the corner seen first.
fn corner_mode(corners: &[Rgba<u8>; 4]) -> [u8; 3] {
    let rgb: Vec<[u8; 3]> = corners.iter().map(|px| [px[0], px[1], px[2]]).collect();
    let mut best = rgb[0];
    let mut best_count = 0;
    for candidate in &rgb {
        let count = rgb.iter().filter(|c| *c == candidate).count();
        if count > best_count {
            best = *candidate;
            best_count = count;
        }
    }
    best
}

fn adaptive_tolerance(background: [u8; 3], requested: f64) -> f64 {
    let brightness: u32 = background.iter().map(|c| u32::from(*c)).sum();
    if brightness < DARK_BACKGROUND_SUM {
        DARK_TOLERANCE
    } else if brightness > BRIGHT_BACKGROUND_SUM {
        BRIGHT_TOLERANCE
    } else {
        requested
    }
}

fn color_distance(px: &Rgba<u8>, background: [u8; 3]) -> f64 {
    px.0[..3]
        .iter()
        .zip(background.iter())
        .map(|(a, b)| {
            let d = f64::from(*a) - f64::from(*b);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Row-major mask of pixels reachable from the border.
fn flood_from_border(image: &RgbaImage, background: [u8; 3], tolerance: f64) -> Vec<bool> {
    let (width, height) = image.dimensions();
    let index = |x: u32, y: u32| (y * width + x) as usize;
    let matches = |x: u32, y: u32| color_distance(image.get_pixel(x, y), background) <= tolerance;

    let mut visited = vec![false; (width * height) as usize];
    let mut cleared = vec![false; (width * height) as usize];
    let mut queue = VecDeque::new();

    let seed = |x: u32, y: u32, visited: &mut Vec<bool>, queue: &mut VecDeque<(u32, u32)>| {
        if !visited[index(x, y)] && matches(x, y) {
            visited[index(x, y)] = true;
            queue.push_back((x, y));
        }
    };
    for x in 0..width {
        seed(x, 0, &mut visited, &mut queue);
        seed(x, height - 1, &mut visited, &mut queue);
    }
    for y in 0..height {
        seed(0, y, &mut visited, &mut queue);
        seed(width - 1, y, &mut visited, &mut queue);
    }

    while let Some((x, y)) = queue.pop_front() {
        cleared[index(x, y)] = true;
        let neighbours = [
            (x.checked_sub(1), Some(y)),
            (x.checked_add(1).filter(|nx| *nx < width), Some(y)),
            (Some(x), y.checked_sub(1)),
            (Some(x), y.checked_add(1).filter(|ny| *ny < height)),
        ];
        for (nx, ny) in neighbours {
            let (Some(nx), Some(ny)) = (nx, ny) else {
                continue;
            };
            let idx = index(nx, ny);
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            if matches(nx, ny) {
                queue.push_back((nx, ny));
            }
        }
    }

    cleared
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGENTA: Rgba<u8> = Rgba([255, 0, 255, 255]);
    const NAVY: Rgba<u8> = Rgba([20, 30, 90, 255]);

    /// Magenta canvas with a navy square outline enclosing a magenta hole.
    fn framed_sprite() -> RgbaImage {
        let mut img = RgbaImage::from_pixel(7, 7, MAGENTA);
        for i in 1..=5 {
            img.put_pixel(i, 1, NAVY);
            img.put_pixel(i, 5, NAVY);
            img.put_pixel(1, i, NAVY);
            img.put_pixel(5, i, NAVY);
        }
        for y in 2..=4 {
            for x in 2..=4 {
                img.put_pixel(x, y, NAVY);
            }
        }
        img.put_pixel(3, 3, MAGENTA);
        img
    }

    #[test]
    fn clears_border_connected_background_only() {
        let out = remove_background(framed_sprite(), None, DEFAULT_TOLERANCE);

        assert_eq!(out.get_pixel(0, 0)[3], 0);
        assert_eq!(out.get_pixel(6, 3)[3], 0);
        assert_eq!(out.get_pixel(1, 1)[3], 255);
        // enclosed magenta pixel is foreground detail
        assert_eq!(*out.get_pixel(3, 3), MAGENTA);
    }

    #[test]
    fn keeps_rgb_when_clearing() {
        let out = remove_background(framed_sprite(), None, DEFAULT_TOLERANCE);
        assert_eq!(*out.get_pixel(0, 0), Rgba([255, 0, 255, 0]));
    }

    #[test]
    fn second_pass_changes_nothing() {
        let once = remove_background(framed_sprite(), None, DEFAULT_TOLERANCE);
        let twice = remove_background(once.clone(), None, DEFAULT_TOLERANCE);
        assert_eq!(once, twice);
    }

    #[test]
    fn second_pass_floods_again_without_changes() {
        // foreground on the bottom rows keeps two corners opaque, so the
        // second pass runs the full fill instead of short-circuiting
        let mut img = RgbaImage::from_pixel(6, 6, MAGENTA);
        for y in 4..6 {
            for x in 0..6 {
                img.put_pixel(x, y, NAVY);
            }
        }

        let once = remove_background(img, None, DEFAULT_TOLERANCE);
        let transparent = corner_pixels(&once).iter().filter(|px| px[3] == 0).count();
        assert_eq!(transparent, 2);
        assert_eq!(once.get_pixel(3, 3)[3], 0);
        assert_eq!(once.get_pixel(3, 4)[3], 255);

        let twice = remove_background(once.clone(), None, DEFAULT_TOLERANCE);
        assert_eq!(once, twice);
    }

    #[test]
    fn transparent_corners_short_circuit() {
        let mut img = RgbaImage::from_pixel(4, 4, MAGENTA);
        img.put_pixel(0, 0, Rgba([255, 0, 255, 0]));
        img.put_pixel(3, 0, Rgba([0, 0, 0, 0]));
        img.put_pixel(0, 3, Rgba([9, 9, 9, 0]));

        let out = remove_background(img.clone(), None, DEFAULT_TOLERANCE);
        assert_eq!(out, img);
    }

    #[test]
    fn dark_background_tightens_tolerance() {
        let black = Rgba([0, 0, 0, 255]);
        let near_black = Rgba([12, 12, 12, 255]);
        let mut img = RgbaImage::from_pixel(5, 5, black);
        // distance ~20.8 from black: inside the requested 30, outside 10
        img.put_pixel(2, 0, near_black);
        img.put_pixel(2, 1, near_black);

        let out = remove_background(img, None, DEFAULT_TOLERANCE);
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        assert_eq!(out.get_pixel(2, 0)[3], 255);
        assert_eq!(out.get_pixel(2, 1)[3], 255);
    }

    #[test]
    fn bright_chroma_key_loosens_tolerance() {
        let off_magenta = Rgba([215, 20, 230, 255]);
        let mut img = RgbaImage::from_pixel(5, 5, MAGENTA);
        img.put_pixel(2, 2, off_magenta);

        // ~50 away from magenta: outside 30 but inside the bright-key 60
        let out = remove_background(img, None, 5.0);
        assert_eq!(out.get_pixel(2, 2)[3], 0);
    }

    #[test]
    fn no_background_like_border_is_a_noop() {
        let mut img = RgbaImage::from_pixel(3, 3, NAVY);
        img.put_pixel(0, 0, MAGENTA);
        img.put_pixel(2, 2, Rgba([200, 200, 10, 255]));
        // nothing on the border is close to the expected green
        let out = remove_background(img.clone(), Some([0, 255, 0]), DEFAULT_TOLERANCE);
        assert_eq!(out, img);
    }

    #[test]
    fn corner_mode_breaks_ties_by_encounter_order() {
        let corners = [MAGENTA, NAVY, NAVY, MAGENTA];
        assert_eq!(corner_mode(&corners), [255, 0, 255]);
    }

    #[test]
    fn ground_stain_clears_red_cast_anywhere() {
        let mut img = RgbaImage::from_pixel(3, 3, NAVY);
        img.put_pixel(1, 1, Rgba([200, 60, 40, 255]));
        img.put_pixel(2, 2, Rgba([200, 160, 40, 255]));
        img.put_pixel(0, 0, Rgba([220, 20, 20, 5]));

        assert_eq!(remove_ground_stain(&mut img), 1);
        assert_eq!(img.get_pixel(1, 1)[3], 0);
        assert_eq!(img.get_pixel(2, 2)[3], 255);
        assert_eq!(img.get_pixel(0, 0)[3], 5);
    }
}
