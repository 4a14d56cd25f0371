pub mod direction;
pub mod image;
pub mod request;
pub mod response;

pub use direction::*;
pub use image::*;
pub use request::*;
pub use response::*;
