pub mod extract;
pub mod pixellab;
pub mod retro_diffusion;
pub mod retry;
pub mod transport;

use crate::{
    config::Config,
    error::Result,
    models::{Balance, CreatedCharacter, GeneratedImage, GenerationRequest, RotationSet},
};
use async_trait::async_trait;
use image::RgbaImage;
use std::sync::Arc;

pub use extract::ResponseArchive;
pub use pixellab::PixelLabClient;
pub use retro_diffusion::RetroDiffusionClient;
pub use retry::{PollPolicy, RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};
pub use transport::{HttpReply, HttpTransport, RecordedRequest, ScriptedTransport, Transport};

/// Frames of one animation, grouped by direction label.
pub type DirectionalFrames = Vec<(String, Vec<RgbaImage>)>;

/// Single-image generation. Both backends implement this.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn submit(&self, request: &GenerationRequest) -> Result<GeneratedImage>;

    /// Remaining account balance, for logging only.
    async fn balance(&self) -> Result<Balance>;
}

#[async_trait]
pub trait RotationService: Send + Sync {
    /// Eight views of `reference`. Labels in the returned set are already
    /// corrected to the canonical compass order.
    async fn rotate_8(&self, reference: &RgbaImage, view: &str) -> Result<RotationSet>;
}

#[async_trait]
pub trait CharacterService: Send + Sync {
    async fn create_character(&self, request: &GenerationRequest) -> Result<CreatedCharacter>;

    async fn animate_character(&self, token: &str, template: &str) -> Result<DirectionalFrames>;
}

/// Every remote service a pipeline run talks to.
#[derive(Clone)]
pub struct Backends {
    /// Generates tower references; Retro Diffusion when selected.
    pub reference: Arc<dyn ImageBackend>,
    /// Generates everything else.
    pub images: Arc<dyn ImageBackend>,
    pub rotations: Arc<dyn RotationService>,
    pub characters: Arc<dyn CharacterService>,
}

impl Backends {
    /// Builds the production clients. `palette` is the base64 swatch shared by
    /// every PixelLab request.
    pub fn from_config(config: &Config, palette: String) -> Result<Self> {
        let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);
        let archive = ResponseArchive::new(&config.response_archive);

        let pixellab = Arc::new(
            PixelLabClient::connect(&config.pixellab, palette, sleeper.clone(), archive.clone())?
                .with_retry(RetryPolicy::from(&config.timing))
                .with_poll(PollPolicy::from(&config.timing)),
        );

        let retro_diffusion = config
            .retro_diffusion
            .as_ref()
            .filter(|_| config.uses_retro_diffusion());
        let reference: Arc<dyn ImageBackend> = match retro_diffusion {
            Some(rd) => {
                log::info!("Using Retro Diffusion for tower references ({})", rd.default_style);
                Arc::new(
                    RetroDiffusionClient::connect(rd, sleeper, archive)?
                        .with_retry(RetryPolicy::from(&config.timing)),
                )
            }
            None => pixellab.clone(),
        };

        Ok(Self {
            reference,
            images: pixellab.clone(),
            rotations: pixellab.clone(),
            characters: pixellab,
        })
    }

    /// Logs each distinct backend's balance. Failures are logged, never raised.
    pub async fn log_balances(&self) {
        let mut backends = vec![self.images.clone()];
        if self.reference.name() != self.images.name() {
            backends.push(self.reference.clone());
        }
        for backend in backends {
            match backend.balance().await {
                Ok(balance) => log::info!("💰 {} balance: {}", backend.name(), balance.describe()),
                Err(e) => log::warn!("Could not check {} balance: {}", backend.name(), e),
            }
        }
    }
}
