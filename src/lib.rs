pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod imaging;
pub mod logger;
pub mod manifest;
pub mod models;
pub mod pipeline;
pub mod rotation;
pub mod scheduler;
pub mod sprite_store;

pub use backend::{
    Backends, CharacterService, ImageBackend, PixelLabClient, RetroDiffusionClient,
    RotationService,
};
pub use catalog::AssetCatalog;
pub use config::{BackendChoice, Config, PixelLabConfig, RetroDiffusionConfig};
pub use error::{Result, SpriteError};
pub use manifest::IdentityManifest;
pub use models::*;
pub use pipeline::{Phase, PipelineContext, Selection};
pub use scheduler::{BatchSummary, Task, TaskScheduler};
pub use sprite_store::SpriteStore;
