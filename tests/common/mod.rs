#![allow(dead_code)]

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use spritegen::{
    backend::DirectionalFrames, rotation, AssetCatalog, Backends, Balance, CharacterService,
    CreatedCharacter, Direction, GeneratedImage, GenerationRequest, ImageBackend, LabeledImage,
    PipelineContext, RotationService, RotationSet, SpriteError, SpriteStore, TaskScheduler,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const MAGENTA: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Magenta canvas with an opaque grey block in the middle.
pub fn chroma_sprite(side: u32) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(side, side, MAGENTA);
    for y in side / 4..side * 3 / 4 {
        for x in side / 4..side * 3 / 4 {
            image.put_pixel(x, y, Rgba([90, 90, 100, 255]));
        }
    }
    image
}

pub fn shaded(shade: u8) -> RgbaImage {
    RgbaImage::from_pixel(4, 4, Rgba([shade, 10, 10, 255]))
}

/// Image backend that fails for any description containing `fail_on`.
#[derive(Default)]
pub struct FakeImages {
    pub fail_on: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeImages {
    pub fn failing_on(needle: &str) -> Self {
        Self {
            fail_on: Some(needle.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageBackend for FakeImages {
    fn name(&self) -> &str {
        "fake-images"
    }

    async fn submit(&self, request: &GenerationRequest) -> spritegen::Result<GeneratedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(needle) = &self.fail_on {
            if request.description().contains(needle.as_str()) {
                return Err(SpriteError::JobFailed {
                    job_id: "simulated".into(),
                    detail: format!("always fails for {}", needle),
                });
            }
        }
        Ok(GeneratedImage::new(chroma_sprite(request.width())))
    }

    async fn balance(&self) -> spritegen::Result<Balance> {
        Ok(Balance::default())
    }
}

/// Rotation service returning `shaded(i)` for service position `i`.
#[derive(Default)]
pub struct FakeRotations {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl RotationService for FakeRotations {
    async fn rotate_8(&self, _reference: &RgbaImage, _view: &str) -> spritegen::Result<RotationSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SpriteError::Http {
                status: 500,
                body: "rotation unavailable".into(),
            });
        }
        let images = (0..8).map(shaded).collect();
        Ok(rotation::correct(RotationSet::from_service_order(images)))
    }
}

#[derive(Default)]
pub struct FakeCharacters {
    pub creates: AtomicUsize,
    pub animations: AtomicUsize,
}

impl FakeCharacters {
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CharacterService for FakeCharacters {
    async fn create_character(
        &self,
        request: &GenerationRequest,
    ) -> spritegen::Result<CreatedCharacter> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst);
        let directions = Direction::SERVICE_ORDER
            .iter()
            .enumerate()
            .map(|(i, d)| LabeledImage::new(d.as_str(), shaded(i as u8)))
            .collect();
        Ok(CreatedCharacter {
            token: format!("char-{}-{}", n, request.width()),
            directions,
        })
    }

    async fn animate_character(
        &self,
        _token: &str,
        _template: &str,
    ) -> spritegen::Result<DirectionalFrames> {
        self.animations.fetch_add(1, Ordering::SeqCst);
        Ok(Direction::SERVICE_ORDER
            .iter()
            .map(|d| (d.as_str().to_string(), (1..=4).map(shaded).collect()))
            .collect())
    }
}

pub struct Fakes {
    pub images: Arc<FakeImages>,
    pub rotations: Arc<FakeRotations>,
    pub characters: Arc<FakeCharacters>,
}

impl Fakes {
    pub fn new(images: FakeImages) -> Self {
        Self {
            images: Arc::new(images),
            rotations: Arc::new(FakeRotations::default()),
            characters: Arc::new(FakeCharacters::default()),
        }
    }

    pub fn backends(&self) -> Backends {
        Backends {
            reference: self.images.clone(),
            images: self.images.clone(),
            rotations: self.rotations.clone(),
            characters: self.characters.clone(),
        }
    }
}

pub fn context(root: &Path, catalog: &str, fakes: &Fakes, workers: usize) -> PipelineContext {
    PipelineContext::new(
        AssetCatalog::from_json(catalog).unwrap(),
        fakes.backends(),
        SpriteStore::new(root.join("sprites")),
        root.join("tools/.character_manifest.json"),
    )
    .with_scheduler(TaskScheduler::new(workers))
}
