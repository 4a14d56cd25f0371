use crate::error::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn png_base64(image: &RgbaImage) -> Result<String> {
    Ok(to_base64(&encode_png(image)?))
}

pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(data.trim())?)
}

/// Decodes a base64 string holding an encoded image container.
pub fn decode_base64_image(data: &str) -> Result<RgbaImage> {
    decode_image(&decode_base64(data)?)
}

/// Rebuilds an image from a bare RGBA byte blob. `None` if the blob length
/// doesn't match the stated dimensions.
pub fn from_raw_rgba(width: u32, height: u32, bytes: Vec<u8>) -> Option<RgbaImage> {
    let expected = (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(4)?;
    if width == 0 || height == 0 || bytes.len() != expected {
        return None;
    }
    RgbaImage::from_raw(width, height, bytes)
}
