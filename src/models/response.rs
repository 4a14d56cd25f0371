use serde::Deserialize;

/// One image as it may appear in a backend payload: either a bare base64
/// string or an object describing the bytes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ImageEntry {
    Encoded(String),
    Object(ImageObject),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageObject {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub base64: Option<String>,
    pub image_base64: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Some rotation payloads nest the actual image one level down.
    pub image: Option<Box<ImageObject>>,
}

impl ImageObject {
    pub fn is_rgba_bytes(&self) -> bool {
        self.kind.as_deref() == Some("rgba_bytes")
    }

    pub fn encoded(&self) -> Option<&str> {
        self.base64
            .as_deref()
            .or(self.image_base64.as_deref())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobStatus {
    pub status: Option<JobState>,
}

impl JobStatus {
    pub fn state(&self) -> JobState {
        self.status.unwrap_or(JobState::Pending)
    }
}
