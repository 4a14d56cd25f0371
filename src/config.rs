use crate::error::{Result, SpriteError};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const PIXELLAB_KEY_VAR: &str = "PIXELLAB_API_KEY";
pub const RETRO_DIFFUSION_KEY_VAR: &str = "RD_API_KEY";

/// Worker budget matching the PixelLab concurrent-request ceiling.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendChoice {
    Auto,
    PixelLab,
    RetroDiffusion,
}

impl FromStr for BackendChoice {
    type Err = SpriteError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(BackendChoice::Auto),
            "pixellab" => Ok(BackendChoice::PixelLab),
            "retrodiffusion" => Ok(BackendChoice::RetroDiffusion),
            other => Err(SpriteError::Config(format!(
                "Unknown backend '{}'. Available: auto, pixellab, retrodiffusion",
                other
            ))),
        }
    }
}

/// Timing knobs shared by both backend clients.
#[derive(Debug, Clone)]
pub struct TimingConfig {
    pub rate_limit_backoff: Duration,
    pub poll_interval: Duration,
    pub poll_budget: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            rate_limit_backoff: Duration::from_secs(30),
            poll_interval: Duration::from_secs(5),
            poll_budget: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PixelLabConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for PixelLabConfig {
    fn default() -> Self {
        PixelLabConfig {
            api_key: None,
            base_url: "https://api.pixellab.ai/v2".to_string(),
            request_timeout: Duration::from_secs(480),
        }
    }
}

impl PixelLabConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct RetroDiffusionConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub request_timeout: Duration,
    pub default_style: String,
}

impl Default for RetroDiffusionConfig {
    fn default() -> Self {
        RetroDiffusionConfig {
            api_key: None,
            base_url: "https://api.retrodiffusion.ai/v1".to_string(),
            request_timeout: Duration::from_secs(120),
            default_style: "rd_pro__isometric".to_string(),
        }
    }
}

impl RetroDiffusionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.default_style = style.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendChoice,
    pub pixellab: PixelLabConfig,
    pub retro_diffusion: Option<RetroDiffusionConfig>,
    pub timing: TimingConfig,
    pub sprites_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub palette_cache: PathBuf,
    pub response_archive: PathBuf,
    pub max_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: BackendChoice::Auto,
            pixellab: PixelLabConfig::default(),
            retro_diffusion: None,
            timing: TimingConfig::default(),
            sprites_dir: PathBuf::from("assets/sprites"),
            manifest_path: PathBuf::from("tools/.character_manifest.json"),
            palette_cache: PathBuf::from("tools/.palette_swatch.png"),
            response_archive: PathBuf::from("tools/.responses"),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a config from the environment, falling back to `settings_file`
    /// (dotenv format) for credentials.
    ///
    /// A missing PixelLab key is always fatal. A missing Retro Diffusion key is
    /// fatal only when that backend was explicitly requested; under `Auto` the
    /// run falls back to PixelLab.
    pub fn from_env(backend: BackendChoice, settings_file: &Path) -> Result<Self> {
        let pixellab_key = resolve_key(PIXELLAB_KEY_VAR, settings_file).ok_or_else(|| {
            SpriteError::Config(format!(
                "{} not found. Set it in {} or as environment variable.",
                PIXELLAB_KEY_VAR,
                settings_file.display()
            ))
        })?;

        let mut config = Config::new()
            .with_backend(backend)
            .with_pixellab(PixelLabConfig::new().with_api_key(pixellab_key));

        if backend != BackendChoice::PixelLab {
            match resolve_key(RETRO_DIFFUSION_KEY_VAR, settings_file) {
                Some(key) => {
                    config = config
                        .with_retro_diffusion(RetroDiffusionConfig::new().with_api_key(key));
                }
                None if backend == BackendChoice::RetroDiffusion => {
                    return Err(SpriteError::Config(format!(
                        "{} not found. Set it in {} or as environment variable.",
                        RETRO_DIFFUSION_KEY_VAR,
                        settings_file.display()
                    )));
                }
                None => {
                    log::info!(
                        "{} not found, falling back to PixelLab for reference generation",
                        RETRO_DIFFUSION_KEY_VAR
                    );
                }
            }
        }

        Ok(config.with_overrides(|var| env::var(var).ok()))
    }

    /// Applies `SPRITES_DIR`, `SPRITEGEN_MAX_WORKERS` and `RD_PROMPT_STYLE`
    /// as resolved by `lookup`. Unparseable worker counts are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("SPRITES_DIR").filter(|d| !d.trim().is_empty()) {
            self = self.with_sprites_dir(dir);
        }
        if let Some(workers) = lookup("SPRITEGEN_MAX_WORKERS").and_then(|v| v.trim().parse().ok()) {
            self = self.with_max_concurrency(workers);
        }
        if let Some(style) = lookup("RD_PROMPT_STYLE").filter(|s| !s.trim().is_empty()) {
            self.retro_diffusion = self.retro_diffusion.map(|rd| rd.with_style(style));
        }
        self
    }

    pub fn with_backend(mut self, backend: BackendChoice) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_pixellab(mut self, config: PixelLabConfig) -> Self {
        self.pixellab = config;
        self
    }

    pub fn with_retro_diffusion(mut self, config: RetroDiffusionConfig) -> Self {
        self.retro_diffusion = Some(config);
        self
    }

    pub fn with_sprites_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sprites_dir = dir.into();
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Whether reference images should come from Retro Diffusion.
    pub fn uses_retro_diffusion(&self) -> bool {
        self.backend != BackendChoice::PixelLab && self.retro_diffusion.is_some()
    }
}

/// Looks a credential up in the process environment, then in a dotenv-style
/// settings file. Empty values count as absent.
pub fn resolve_key(var: &str, settings_file: &Path) -> Option<String> {
    if let Ok(value) = env::var(var) {
        if !value.trim().is_empty() {
            return Some(value.trim().to_string());
        }
    }

    let entries = dotenv::from_path_iter(settings_file).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .find(|(key, value)| key == var && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn resolves_key_from_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join(".env");
        fs::write(&settings, "OTHER=1\nSPRITEGEN_TEST_ONLY_KEY=from-file\n").unwrap();

        assert_eq!(
            resolve_key("SPRITEGEN_TEST_ONLY_KEY", &settings).as_deref(),
            Some("from-file")
        );
        assert_eq!(resolve_key("SPRITEGEN_TEST_ABSENT_KEY", &settings), None);
    }

    #[test]
    fn missing_settings_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_key("SPRITEGEN_TEST_ABSENT_KEY", &dir.path().join("nope.env")),
            None
        );
    }

    #[test]
    fn parses_backend_names() {
        assert_eq!("auto".parse::<BackendChoice>().unwrap(), BackendChoice::Auto);
        assert_eq!(
            "retrodiffusion".parse::<BackendChoice>().unwrap(),
            BackendChoice::RetroDiffusion
        );
        assert!("dalle".parse::<BackendChoice>().unwrap_err().is_fatal());
    }

    #[test]
    fn overrides_come_from_lookup() {
        let vars = |var: &str| match var {
            "SPRITES_DIR" => Some("out/sprites".to_string()),
            "SPRITEGEN_MAX_WORKERS" => Some("0".to_string()),
            "RD_PROMPT_STYLE" => Some("rd_fast__default".to_string()),
            _ => None,
        };
        let config = Config::new()
            .with_retro_diffusion(RetroDiffusionConfig::new().with_api_key("k"))
            .with_overrides(vars);

        assert_eq!(config.sprites_dir, PathBuf::from("out/sprites"));
        // a zero budget still leaves one worker
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.retro_diffusion.unwrap().default_style, "rd_fast__default");
    }

    #[test]
    fn bad_worker_count_keeps_default() {
        let config = Config::new().with_overrides(|var| {
            (var == "SPRITEGEN_MAX_WORKERS").then(|| "many".to_string())
        });
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(config.sprites_dir, PathBuf::from("assets/sprites"));
    }

    #[test]
    fn retro_diffusion_only_used_when_configured() {
        let config = Config::new().with_backend(BackendChoice::Auto);
        assert!(!config.uses_retro_diffusion());

        let config = config.with_retro_diffusion(RetroDiffusionConfig::new().with_api_key("k"));
        assert!(config.uses_retro_diffusion());

        let config = config.with_backend(BackendChoice::PixelLab);
        assert!(!config.uses_retro_diffusion());
    }
}
