use super::{
    extract::{self, ResponseArchive},
    retry::{PollPolicy, RetryPolicy, Sleeper},
    transport::{HttpTransport, Transport},
    CharacterService, DirectionalFrames, ImageBackend, RotationService,
};
use crate::{
    config::PixelLabConfig,
    error::{Result, SpriteError},
    imaging::png_base64,
    models::{
        Balance, CreatedCharacter, GeneratedImage, GenerationRequest, JobState, JobStatus,
        RotationSet,
    },
    rotation,
};
use async_trait::async_trait;
use image::RgbaImage;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const SERVICE: &str = "PixelLab";
/// The service rejects canvases smaller than this.
const MIN_SIDE: u32 = 32;
const TEXT_GUIDANCE_SCALE: f64 = 8.0;
const JOB_DETAIL_LIMIT: usize = 500;

pub const DEFAULT_VIEW: &str = "low top-down";
pub const WALK_TEMPLATE: &str = "walking-4-frames";

/// Submit-then-poll client. Any POST answered with a background job id is
/// polled until the job completes, fails, or runs out of budget.
pub struct PixelLabClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    palette: String,
    sleeper: Arc<dyn Sleeper>,
    archive: ResponseArchive,
    retry: RetryPolicy,
    poll: PollPolicy,
}

impl PixelLabClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        palette: impl Into<String>,
        sleeper: Arc<dyn Sleeper>,
        archive: ResponseArchive,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            palette: palette.into(),
            sleeper,
            archive,
            retry: RetryPolicy::default(),
            poll: PollPolicy::default(),
        }
    }

    pub fn connect(
        config: &PixelLabConfig,
        palette: String,
        sleeper: Arc<dyn Sleeper>,
        archive: ResponseArchive,
    ) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| SpriteError::Config("PixelLab API key is not set".to_string()))?;
        let transport = HttpTransport::bearer(api_key, config.request_timeout)?;
        Ok(Self::new(
            Arc::new(transport),
            config.base_url.clone(),
            palette,
            sleeper,
            archive,
        ))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    /// POSTs `payload` and, if the reply names a background job, waits for
    /// the job's terminal payload.
    async fn post(&self, endpoint: &str, payload: &Value) -> Result<Value> {
        let url = self.url(endpoint);
        log::debug!("POST {}", url);
        let reply = self
            .retry
            .send(SERVICE, self.sleeper.as_ref(), || {
                self.transport.post_json(&url, payload)
            })
            .await?;
        let value = reply.into_json()?;

        match extract::job_id(&value) {
            Some(job_id) => self.wait_for_job(&job_id).await,
            None => Ok(value),
        }
    }

    /// GETs `url` under the same rate-limit policy as submissions.
    async fn get(&self, url: &str) -> Result<Value> {
        self.retry
            .send(SERVICE, self.sleeper.as_ref(), || self.transport.get(url))
            .await?
            .into_json()
    }

    async fn wait_for_job(&self, job_id: &str) -> Result<Value> {
        let url = self.url(&format!("background-jobs/{}", job_id));
        let mut waited = Duration::ZERO;

        while waited < self.poll.budget {
            let value = self.get(&url).await?;
            let status: JobStatus = serde_json::from_value(value.clone())?;
            match status.state() {
                JobState::Completed => return Ok(value),
                JobState::Failed => {
                    return Err(SpriteError::JobFailed {
                        job_id: job_id.to_string(),
                        detail: value.to_string().chars().take(JOB_DETAIL_LIMIT).collect(),
                    })
                }
                _ => {}
            }
            self.sleeper.sleep(self.poll.interval).await;
            waited += self.poll.interval;
            log::debug!("Waiting for job {}... ({}s)", job_id, waited.as_secs());
        }

        Err(SpriteError::TimedOut {
            job_id: job_id.to_string(),
            waited,
        })
    }

    fn image_payload(&self, request: &GenerationRequest) -> Value {
        let (width, height) = request.clamped_size(MIN_SIDE);
        let mut payload = json!({
            "description": request.description(),
            "image_size": {"width": width, "height": height},
            "isometric": request.is_isometric(),
            "color_image": {"base64": self.palette},
            "text_guidance_scale": TEXT_GUIDANCE_SCALE,
        });
        if let Some(negative) = request.negative() {
            payload["negative_description"] = json!(negative);
        }
        if let Some(seed) = request.seed() {
            payload["seed"] = json!(seed);
        }
        payload
    }
}

#[async_trait]
impl ImageBackend for PixelLabClient {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let endpoint = "create-image-pixflux";
        let mut payload = self.image_payload(request);
        if let Some(reference) = request.reference_image() {
            payload["init_image"] = json!({"base64": reference});
        }

        log::info!(
            "🎨 Generating {}x{} image with {}",
            request.width(),
            request.height(),
            SERVICE
        );
        let value = self.post(endpoint, &payload).await?;
        let image = extract::single_image(&value)
            .ok_or_else(|| self.archive.unrecognized(&value, endpoint))?;
        Ok(GeneratedImage::new(image))
    }

    async fn balance(&self) -> Result<Balance> {
        let raw = self.get(&self.url("balance")).await?;
        let remaining = ["remaining_balance", "remaining_credits"]
            .iter()
            .find_map(|key| raw.get(*key).and_then(Value::as_f64));
        Ok(Balance {
            remaining,
            cost: None,
            raw: Some(raw),
        })
    }
}

#[async_trait]
impl RotationService for PixelLabClient {
    async fn rotate_8(&self, reference: &RgbaImage, view: &str) -> Result<RotationSet> {
        let endpoint = "generate-8-rotations-v2";
        let (width, height) = reference.dimensions();
        let payload = json!({
            "reference_image": {
                "image": {"base64": png_base64(reference)?},
                "width": width,
                "height": height,
            },
            "image_size": {"width": width, "height": height},
            "view": view,
            "method": "rotate_character",
        });

        let value = self.post(endpoint, &payload).await?;
        let images = extract::rotation_images(&value)
            .ok_or_else(|| self.archive.unrecognized(&value, endpoint))?;
        log::debug!("Got {} rotations", images.len());
        Ok(rotation::correct(RotationSet::from_service_order(images)))
    }
}

#[async_trait]
impl CharacterService for PixelLabClient {
    async fn create_character(&self, request: &GenerationRequest) -> Result<CreatedCharacter> {
        let endpoint = "create-character-with-8-directions";
        let payload = self.image_payload(request);

        let value = self.post(endpoint, &payload).await?;
        let images = extract::rotation_images(&value);
        let token = extract::character_token(&value);
        if images.is_none() && token.is_none() {
            return Err(self.archive.unrecognized(&value, endpoint));
        }

        let token = match token {
            Some(token) => token,
            None => {
                log::warn!("Could not extract character id");
                self.archive.preserve(&value, endpoint);
                String::new()
            }
        };
        let directions = images
            .map(|images| RotationSet::from_service_order(images).into_entries())
            .unwrap_or_default();
        Ok(CreatedCharacter { token, directions })
    }

    async fn animate_character(&self, token: &str, template: &str) -> Result<DirectionalFrames> {
        let endpoint = "characters/animations";
        let payload = json!({
            "character_id": token,
            "template_animation_id": template,
        });

        let value = self.post(endpoint, &payload).await?;
        extract::animation_frames(&value).ok_or_else(|| self.archive.unrecognized(&value, endpoint))
    }
}
