use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Account balance as reported by a backend. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub remaining: Option<f64>,
    pub cost: Option<f64>,
    pub raw: Option<serde_json::Value>,
}

impl Balance {
    pub fn describe(&self) -> String {
        match (self.remaining, self.cost) {
            (Some(remaining), Some(cost)) => format!("{} used, {} remaining", cost, remaining),
            (Some(remaining), None) => format!("{} remaining", remaining),
            _ => match &self.raw {
                Some(raw) => raw.to_string(),
                None => "unknown".to_string(),
            },
        }
    }
}

/// A successfully normalized generation result.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub image: RgbaImage,
    pub balance: Option<Balance>,
}

impl GeneratedImage {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            balance: None,
        }
    }

    pub fn with_balance(mut self, balance: Option<Balance>) -> Self {
        self.balance = balance;
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// A stateful character created on the remote service.
#[derive(Debug, Clone)]
pub struct CreatedCharacter {
    pub token: String,
    pub directions: Vec<super::LabeledImage>,
}
