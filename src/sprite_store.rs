//! On-disk sprite corpus. A file's existence is the only "done" marker.

use crate::error::Result;
use crate::imaging::decode_image;
use image::RgbaImage;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SpriteStore {
    root: PathBuf,
}

impl SpriteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).is_file()
    }

    /// Writes `image` as PNG at `rel`, creating parent directories.
    pub fn save(&self, rel: &str, image: &RgbaImage) -> Result<PathBuf> {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        image.save(&path)?;
        log::info!("💾 Saved: {} ({}x{})", rel, image.width(), image.height());
        Ok(path)
    }

    pub fn load(&self, rel: &str) -> Result<RgbaImage> {
        decode_image(&fs::read(self.path(rel))?)
    }

    /// Fully transparent stand-in for assets that are intentionally empty.
    pub fn save_placeholder(&self, rel: &str, width: u32, height: u32) -> Result<PathBuf> {
        self.save(rel, &RgbaImage::new(width, height))
    }
}
