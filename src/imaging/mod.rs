pub mod chroma;
pub mod codec;
pub mod palette;

pub use chroma::{remove_background, remove_ground_stain, DEFAULT_TOLERANCE};
pub use codec::{decode_base64_image, decode_image, encode_png, png_base64, to_base64};
