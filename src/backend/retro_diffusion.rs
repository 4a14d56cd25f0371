use super::{
    extract::{self, ResponseArchive},
    retry::{RetryPolicy, Sleeper},
    transport::{HttpTransport, Transport},
    ImageBackend,
};
use crate::{
    config::RetroDiffusionConfig,
    error::{Result, SpriteError},
    models::{Balance, GeneratedImage, GenerationRequest},
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

const SERVICE: &str = "Retro Diffusion";
const AUTH_HEADER: &str = "X-RD-Token";
const ENDPOINT: &str = "inferences";
/// Smallest canvas sent to the service.
const MIN_SIDE: u32 = 32;

/// Credit fields the service attaches to every reply. Anything that is not
/// a number reads as absent.
fn credits(value: &Value) -> Balance {
    Balance {
        remaining: value.get("remaining_credits").and_then(Value::as_f64),
        cost: value.get("credit_cost").and_then(Value::as_f64),
        raw: None,
    }
}

/// Single round-trip client: every inference answers with its images.
pub struct RetroDiffusionClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    style: String,
    sleeper: Arc<dyn Sleeper>,
    archive: ResponseArchive,
    retry: RetryPolicy,
}

impl RetroDiffusionClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        style: impl Into<String>,
        sleeper: Arc<dyn Sleeper>,
        archive: ResponseArchive,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            style: style.into(),
            sleeper,
            archive,
            retry: RetryPolicy::default(),
        }
    }

    pub fn connect(
        config: &RetroDiffusionConfig,
        sleeper: Arc<dyn Sleeper>,
        archive: ResponseArchive,
    ) -> Result<Self> {
        let api_key = config.api_key.as_deref().ok_or_else(|| {
            SpriteError::Config("Retro Diffusion API key is not set".to_string())
        })?;
        let transport = HttpTransport::new(AUTH_HEADER, api_key, config.request_timeout)?;
        Ok(Self::new(
            Arc::new(transport),
            config.base_url.clone(),
            config.default_style.clone(),
            sleeper,
            archive,
        ))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn inferences_url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), ENDPOINT)
    }

    async fn infer(&self, payload: &Value) -> Result<Value> {
        let url = self.inferences_url();
        let reply = self
            .retry
            .send(SERVICE, self.sleeper.as_ref(), || {
                self.transport.post_json(&url, payload)
            })
            .await?;
        reply.into_json()
    }
}

#[async_trait]
impl ImageBackend for RetroDiffusionClient {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let style = request.style().unwrap_or(self.style.as_str());
        let (width, height) = request.clamped_size(MIN_SIDE);
        let mut payload = json!({
            "prompt": request.description(),
            "width": width,
            "height": height,
            "num_images": 1,
            "prompt_style": style,
            "remove_bg": true,
        });
        if let Some(reference) = request.reference_image() {
            payload["reference_images"] = json!([reference]);
        }
        if let Some(seed) = request.seed() {
            payload["seed"] = json!(seed);
        }

        log::info!(
            "🎨 Generating {}x{} image with {} ({})",
            width,
            height,
            SERVICE,
            style
        );
        let value = self.infer(&payload).await?;
        let balance = credits(&value);
        log::info!("RD credits: {}", balance.describe());

        let image = extract::single_image(&value)
            .ok_or_else(|| self.archive.unrecognized(&value, ENDPOINT))?;
        Ok(GeneratedImage::new(image).with_balance(Some(balance)))
    }

    async fn balance(&self) -> Result<Balance> {
        let payload = json!({
            "prompt": "test",
            "width": 64,
            "height": 64,
            "num_images": 1,
            "prompt_style": self.style,
            "check_cost": true,
        });
        let value = self.infer(&payload).await?;
        Ok(Balance {
            raw: Some(value.clone()),
            ..credits(&value)
        })
    }
}
