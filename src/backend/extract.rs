//! Normalization of backend payloads into images.
//!
//! Each backend answers in several dialects. Every known location is an
//! extraction strategy: a pure function from the raw JSON to an optional
//! image. Strategies are tried in order and the first hit wins; a payload no
//! strategy recognizes becomes `UnrecognizedResponseShape` upstream.

use crate::error::SpriteError;
use crate::imaging::codec::{decode_base64, decode_image, from_raw_rgba};
use crate::models::{Direction, ImageEntry, ImageObject};
use chrono::Utc;
use image::RgbaImage;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

/// Assumed canvas for raw RGBA blobs that omit their dimensions.
const DEFAULT_RAW_SIDE: u32 = 32;
const MAX_ROTATIONS: usize = 8;

type Strategy = fn(&Value) -> Option<RgbaImage>;

const IMAGE_STRATEGIES: [(&str, Strategy); 7] = [
    ("last_response.quantized_image", from_last_quantized),
    ("last_response.image", from_last_image),
    ("image", from_top_image),
    ("data", from_top_data),
    ("result", from_top_result),
    ("images[0]", from_first_image),
    ("base64_images[0]", from_first_base64_image),
];

/// First image any strategy can pull out of `value`.
pub fn single_image(value: &Value) -> Option<RgbaImage> {
    IMAGE_STRATEGIES.iter().find_map(|(name, strategy)| {
        let image = strategy(value)?;
        log::debug!("Image extracted via {}", name);
        Some(image)
    })
}

/// Up to eight rotation images, in the order the service listed them.
pub fn rotation_images(value: &Value) -> Option<Vec<RgbaImage>> {
    let nested = last_response(value).and_then(|last| {
        non_empty_array(last, "rotation_images").or_else(|| non_empty_array(last, "images"))
    });
    let top_level = ["rotation_images", "images", "directions"]
        .iter()
        .filter_map(|key| non_empty_array(value, key));

    nested.into_iter().chain(top_level).find_map(|list| {
        let images: Vec<RgbaImage> = list
            .iter()
            .take(MAX_ROTATIONS)
            .filter_map(|item| {
                let entry = as_entry(item)?;
                match entry {
                    ImageEntry::Object(obj) if obj.encoded().is_none() => {
                        obj.image.as_deref().and_then(object_to_image)
                    }
                    other => entry_to_image(&other),
                }
            })
            .collect();
        (!images.is_empty()).then_some(images)
    })
}

/// Animation frames grouped by direction label.
pub fn animation_frames(value: &Value) -> Option<Vec<(String, Vec<RgbaImage>)>> {
    let source = last_response(value).unwrap_or(value);

    let listed = non_empty_array(source, "animations").or_else(|| non_empty_array(source, "directions"));
    if let Some(list) = listed {
        let mut grouped = Vec::new();
        for (i, item) in list.iter().enumerate() {
            let Some(obj) = item.as_object() else {
                continue;
            };
            let raw_name = obj
                .get("direction")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Direction::service_label(i));
            let label = Direction::from_name(&raw_name)
                .map(|d| d.as_str().to_string())
                .unwrap_or(raw_name);
            let frames = obj
                .get("frames")
                .or_else(|| obj.get("images"))
                .and_then(Value::as_array)
                .map(|frames| decode_list(frames))
                .unwrap_or_default();
            if !frames.is_empty() {
                grouped.push((label, frames));
            }
        }
        if !grouped.is_empty() {
            return Some(grouped);
        }
    }

    let flat = decode_list(non_empty_array(source, "images")?);
    if flat.is_empty() {
        return None;
    }
    let per_direction = if flat.len() >= Direction::SERVICE_ORDER.len() {
        flat.len() / Direction::SERVICE_ORDER.len()
    } else {
        flat.len()
    };
    let grouped: Vec<(String, Vec<RgbaImage>)> = Direction::SERVICE_ORDER
        .iter()
        .enumerate()
        .filter_map(|(i, direction)| {
            let start = i * per_direction;
            if start >= flat.len() {
                return None;
            }
            let end = (start + per_direction).min(flat.len());
            Some((direction.as_str().to_string(), flat[start..end].to_vec()))
        })
        .collect();
    Some(grouped)
}

pub fn character_token(value: &Value) -> Option<String> {
    let lookup = |source: &Value| {
        ["character_id", "id"]
            .iter()
            .find_map(|key| scalar_string(source.get(*key)?))
    };
    lookup(value).or_else(|| last_response(value).and_then(lookup))
}

pub fn job_id(value: &Value) -> Option<String> {
    ["background_job_id", "job_id"]
        .iter()
        .find_map(|key| scalar_string(value.get(*key)?))
}

pub fn top_level_keys(value: &Value) -> Vec<String> {
    value
        .as_object()
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or_default()
}

/// Directory where payloads nobody could parse are kept for inspection.
#[derive(Debug, Clone)]
pub struct ResponseArchive {
    dir: PathBuf,
}

impl ResponseArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writes `value` as pretty JSON under a unique name. Failures to write
    /// are logged, not raised.
    pub fn preserve(&self, value: &Value, context: &str) -> Option<PathBuf> {
        let name = format!(
            "{}_{}_{}.json",
            Utc::now().format("%Y%m%dT%H%M%S"),
            context.replace(['/', '\\'], "_"),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let path = self.dir.join(name);
        let written = fs::create_dir_all(&self.dir)
            .and_then(|_| {
                let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
                fs::write(&path, text)
            });
        match written {
            Ok(()) => {
                log::warn!("Response saved to {}", path.display());
                Some(path)
            }
            Err(e) => {
                log::error!("Could not preserve response for {}: {}", context, e);
                None
            }
        }
    }

    pub fn unrecognized(&self, value: &Value, context: &str) -> SpriteError {
        let keys = top_level_keys(value);
        log::warn!("Could not extract images from {} response keys: {:?}", context, keys);
        SpriteError::UnrecognizedResponseShape {
            keys,
            preserved_at: self.preserve(value, context),
        }
    }
}

fn last_response(value: &Value) -> Option<&Value> {
    value.get("last_response").filter(|v| v.is_object())
}

fn non_empty_array<'a>(value: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    value
        .get(key)
        .and_then(Value::as_array)
        .filter(|list| !list.is_empty())
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_entry(value: &Value) -> Option<ImageEntry> {
    serde_json::from_value(value.clone()).ok()
}

fn as_object(value: &Value) -> Option<ImageObject> {
    match as_entry(value)? {
        ImageEntry::Object(obj) => Some(obj),
        ImageEntry::Encoded(_) => None,
    }
}

fn decode_list(list: &[Value]) -> Vec<RgbaImage> {
    list.iter()
        .filter_map(|item| entry_to_image(&as_entry(item)?))
        .collect()
}

fn entry_to_image(entry: &ImageEntry) -> Option<RgbaImage> {
    match entry {
        ImageEntry::Encoded(data) => encoded_to_image(data),
        ImageEntry::Object(obj) => object_to_image(obj),
    }
}

fn encoded_to_image(data: &str) -> Option<RgbaImage> {
    if data.is_empty() {
        return None;
    }
    match decode_base64(data).and_then(|bytes| decode_image(&bytes)) {
        Ok(image) => Some(image),
        Err(e) => {
            log::debug!("Skipping undecodable image entry: {}", e);
            None
        }
    }
}

/// Raw RGBA blobs are rebuilt from their dimensions; anything else, or a
/// blob whose size doesn't fit, is decoded as an image container.
fn object_to_image(obj: &ImageObject) -> Option<RgbaImage> {
    let data = obj.encoded()?;
    let bytes = match decode_base64(data) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => return None,
        Err(e) => {
            log::debug!("Skipping undecodable image object: {}", e);
            return None;
        }
    };

    if obj.is_rgba_bytes() || obj.width.is_some() {
        let width = obj.width.unwrap_or(DEFAULT_RAW_SIDE);
        let height = obj.height.unwrap_or(DEFAULT_RAW_SIDE);
        if let Some(image) = from_raw_rgba(width, height, bytes.clone()) {
            return Some(image);
        }
    }
    decode_image(&bytes).ok()
}

fn from_last_quantized(value: &Value) -> Option<RgbaImage> {
    object_to_image(&as_object(last_response(value)?.get("quantized_image")?)?)
}

fn from_last_image(value: &Value) -> Option<RgbaImage> {
    object_to_image(&as_object(last_response(value)?.get("image")?)?)
}

fn from_top_image(value: &Value) -> Option<RgbaImage> {
    object_to_image(&as_object(value.get("image")?)?)
}

fn from_top_data(value: &Value) -> Option<RgbaImage> {
    object_to_image(&as_object(value.get("data")?)?)
}

fn from_top_result(value: &Value) -> Option<RgbaImage> {
    object_to_image(&as_object(value.get("result")?)?)
}

fn from_first_image(value: &Value) -> Option<RgbaImage> {
    entry_to_image(&as_entry(non_empty_array(value, "images")?.first()?)?)
}

fn from_first_base64_image(value: &Value) -> Option<RgbaImage> {
    encoded_to_image(non_empty_array(value, "base64_images")?.first()?.as_str()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::codec::{png_base64, to_base64};
    use image::Rgba;
    use serde_json::json;

    fn solid(w: u32, h: u32, shade: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([shade, 0, 0, 255]))
    }

    fn raw_object(img: &RgbaImage) -> Value {
        json!({
            "type": "rgba_bytes",
            "base64": to_base64(img.as_raw()),
            "width": img.width(),
            "height": img.height(),
        })
    }

    #[test]
    fn prefers_last_response_quantized_image() {
        let value = json!({
            "last_response": {
                "quantized_image": raw_object(&solid(2, 2, 1)),
                "image": raw_object(&solid(2, 2, 2)),
            },
            "images": [png_base64(&solid(2, 2, 3)).unwrap()],
        });
        assert_eq!(single_image(&value).unwrap().get_pixel(0, 0)[0], 1);
    }

    #[test]
    fn reads_nested_data_object_with_encoded_png() {
        let value = json!({"data": {"image_base64": png_base64(&solid(3, 1, 7)).unwrap()}});
        let image = single_image(&value).unwrap();
        assert_eq!(image.dimensions(), (3, 1));
    }

    #[test]
    fn reads_first_candidate_of_string_array() {
        let value = json!({"base64_images": [png_base64(&solid(4, 4, 9)).unwrap(), "junk"]});
        assert_eq!(single_image(&value).unwrap().get_pixel(3, 3)[0], 9);
    }

    #[test]
    fn raw_blob_with_wrong_size_falls_back_to_container() {
        let png = png_base64(&solid(5, 5, 4)).unwrap();
        let value = json!({"image": {"type": "rgba_bytes", "base64": png, "width": 64, "height": 64}});
        assert_eq!(single_image(&value).unwrap().dimensions(), (5, 5));
    }

    #[test]
    fn unknown_shape_yields_nothing() {
        let value = json!({"status": "completed", "usage": {"usd": 0.01}});
        assert!(single_image(&value).is_none());
        assert!(rotation_images(&value).is_none());
        assert_eq!(top_level_keys(&value), vec!["status", "usage"]);
    }

    #[test]
    fn rotation_images_cap_at_eight_and_accept_nesting() {
        let nested: Vec<Value> = (0..10)
            .map(|i| json!({"direction": "x", "image": raw_object(&solid(2, 2, i))}))
            .collect();
        let value = json!({"rotation_images": nested});

        let images = rotation_images(&value).unwrap();
        assert_eq!(images.len(), 8);
        assert_eq!(images[7].get_pixel(0, 0)[0], 7);
    }

    #[test]
    fn animation_frames_normalize_direction_names() {
        let value = json!({
            "last_response": {
                "animations": [
                    {"direction": "south-east", "frames": [raw_object(&solid(2, 2, 1)), raw_object(&solid(2, 2, 2))]},
                    {"direction": "north", "images": [png_base64(&solid(2, 2, 3)).unwrap()]},
                ]
            }
        });
        let frames = animation_frames(&value).unwrap();
        assert_eq!(frames[0].0, "se");
        assert_eq!(frames[0].1.len(), 2);
        assert_eq!(frames[1].0, "n");
    }

    #[test]
    fn flat_animation_frames_split_across_directions() {
        let images: Vec<Value> = (0..16).map(|i| raw_object(&solid(1, 1, i))).collect();
        let frames = animation_frames(&json!({"images": images})).unwrap();

        assert_eq!(frames.len(), 8);
        assert_eq!(frames[1].0, "sw");
        assert_eq!(frames[1].1[0].get_pixel(0, 0)[0], 2);
    }

    #[test]
    fn character_token_checks_last_response() {
        assert_eq!(
            character_token(&json!({"last_response": {"character_id": "c-42"}})).as_deref(),
            Some("c-42")
        );
        assert_eq!(character_token(&json!({"id": 17})).as_deref(), Some("17"));
        assert_eq!(character_token(&json!({"id": ""})), None);
    }

    #[test]
    fn job_id_prefers_background_job_id() {
        let value = json!({"background_job_id": "bg-1", "job_id": "j-1"});
        assert_eq!(job_id(&value).as_deref(), Some("bg-1"));
        assert_eq!(job_id(&json!({"images": []})), None);
    }

    #[test]
    fn archive_keeps_unrecognized_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ResponseArchive::new(dir.path().join("responses"));
        let value = json!({"weird": true});

        match archive.unrecognized(&value, "create-image-pixflux") {
            SpriteError::UnrecognizedResponseShape { keys, preserved_at } => {
                assert_eq!(keys, vec!["weird"]);
                let saved = fs::read_to_string(preserved_at.unwrap()).unwrap();
                assert_eq!(serde_json::from_str::<Value>(&saved).unwrap(), value);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
