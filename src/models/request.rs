use serde::Serialize;

/// Everything a backend needs to produce one image. Built once through the
/// `with_*` methods, then only read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    description: String,
    width: u32,
    height: u32,
    reference_image: Option<String>,
    negative: Option<String>,
    seed: Option<u64>,
    style: Option<String>,
    isometric: bool,
}

impl GenerationRequest {
    pub fn new(description: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            description: description.into(),
            width,
            height,
            reference_image: None,
            negative: None,
            seed: None,
            style: None,
            isometric: false,
        }
    }

    /// Base64-encoded raster used as init/reference image.
    pub fn with_reference_image(mut self, base64: impl Into<String>) -> Self {
        self.reference_image = Some(base64.into());
        self
    }

    pub fn with_negative(mut self, negative: impl Into<String>) -> Self {
        let negative = negative.into();
        if !negative.is_empty() {
            self.negative = Some(negative);
        }
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn isometric(mut self, isometric: bool) -> Self {
        self.isometric = isometric;
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn reference_image(&self) -> Option<&str> {
        self.reference_image.as_deref()
    }

    pub fn negative(&self) -> Option<&str> {
        self.negative.as_deref()
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    pub fn is_isometric(&self) -> bool {
        self.isometric
    }

    /// Canvas size raised to at least `floor` on both axes; backends reject
    /// smaller canvases.
    pub fn clamped_size(&self, floor: u32) -> (u32, u32) {
        (self.width.max(floor), self.height.max(floor))
    }
}
