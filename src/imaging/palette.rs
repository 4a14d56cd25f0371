use super::codec::{encode_png, to_base64};
use crate::error::{Result, SpriteError};
use image::{imageops, imageops::FilterType, Rgba, RgbaImage};
use std::fs;
use std::path::Path;

/// Project palette, sent as a color guide with every PixelLab request.
pub const PALETTE_COLORS: [&str; 30] = [
    "#0E0E12", "#161618", "#1A1A1E", "#1E1E22", "#28282C", "#2E2E32", "#3A3A3E", "#484850",
    "#585860", "#606068", "#808898", "#C8A040", "#D8A040", "#E8A040", "#D06030", "#D04040",
    "#903020", "#5080A0", "#3868A0", "#D06040", "#A84030", "#802818", "#E89060", "#F0E0C0",
    "#70A040", "#50A0D0", "#6090B0", "#A0D8A0", "#88C888", "#9A9AA0",
];

const SWATCH_SCALE: u32 = 4;

pub fn hex_to_rgba(hex: &str) -> Result<Rgba<u8>> {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(SpriteError::Config(format!("Invalid palette color '{}'", hex)));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .map_err(|_| SpriteError::Config(format!("Invalid palette color '{}'", hex)))
    };
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}

/// One swatch cell per color, upscaled with nearest-neighbour.
pub fn swatch_image(colors: &[&str]) -> Result<RgbaImage> {
    let mut strip = RgbaImage::new(colors.len() as u32, 1);
    for (i, hex) in colors.iter().enumerate() {
        strip.put_pixel(i as u32, 0, hex_to_rgba(hex)?);
    }
    Ok(imageops::resize(
        &strip,
        strip.width() * SWATCH_SCALE,
        SWATCH_SCALE,
        FilterType::Nearest,
    ))
}

/// Base64 PNG of the palette swatch, reusing `cache` when it exists and
/// writing it otherwise.
pub fn load_or_create_swatch(cache: &Path) -> Result<String> {
    if cache.exists() {
        return Ok(to_base64(&fs::read(cache)?));
    }

    let png = encode_png(&swatch_image(&PALETTE_COLORS)?)?;
    if let Some(parent) = cache.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(cache, &png)?;
    log::debug!("Palette swatch cached at {}", cache.display());
    Ok(to_base64(&png))
}
