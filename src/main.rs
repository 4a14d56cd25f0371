use clap::Parser;
use spritegen::{
    imaging::palette::load_or_create_swatch,
    logger::{LogLevel, LoggerConfig},
    pipeline::{self, Phase, PipelineContext, Selection},
    AssetCatalog, BackendChoice, Backends, Config, SpriteStore, TaskScheduler,
};
use std::path::PathBuf;

/// Batch-generate pixel-art sprites through PixelLab and Retro Diffusion.
#[derive(Debug, Parser)]
#[command(name = "spritegen", version, about)]
struct Cli {
    /// Which assets to produce.
    #[arg(long, value_enum, required_unless_present = "balance_only")]
    phase: Option<Phase>,

    /// Reference-image backend: auto, pixellab or retrodiffusion.
    #[arg(long, default_value = "auto")]
    backend: BackendChoice,

    /// Comma-separated tower names (default: all).
    #[arg(long, value_delimiter = ',')]
    towers: Option<Vec<String>>,

    /// Comma-separated enemy names (default: all).
    #[arg(long, value_delimiter = ',')]
    enemies: Option<Vec<String>>,

    /// Asset catalog with the prompt tables.
    #[arg(long, default_value = "tools/asset_catalog.json")]
    catalog: PathBuf,

    /// Untracked settings file holding API keys.
    #[arg(long, default_value = ".env")]
    settings: PathBuf,

    #[arg(long)]
    seed: Option<u64>,

    /// Only report account balances.
    #[arg(long)]
    balance_only: bool,

    #[arg(short, long)]
    verbose: bool,

    /// Also append log lines to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Everything that can be wrong before a single task runs.
fn prepare(cli: &Cli) -> spritegen::Result<(Config, AssetCatalog, Selection)> {
    let config = Config::from_env(cli.backend, &cli.settings)?;
    let catalog = AssetCatalog::load(&cli.catalog)?;
    let selection = Selection::resolve(&catalog, cli.towers.as_deref(), cli.enemies.as_deref())?;
    Ok((config, catalog, selection))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut logger_config = if cli.verbose {
        LoggerConfig::development().with_level(LogLevel::Debug)
    } else {
        LoggerConfig::new()
    };
    if let Some(path) = &cli.log_file {
        logger_config = logger_config.with_file_output(path);
    }
    spritegen::logger::init_with_config(logger_config)?;

    match dotenv::from_path(&cli.settings) {
        Ok(_) => log::info!("✅ {} loaded", cli.settings.display()),
        Err(_) => log::warn!(
            "⚠️  No {} found, using system environment variables",
            cli.settings.display()
        ),
    }

    let (config, catalog, selection) = match prepare(&cli) {
        Ok(prepared) => prepared,
        Err(e) => {
            log::error!("❌ {}", e);
            return Err(e.into());
        }
    };

    let palette = load_or_create_swatch(&config.palette_cache)?;
    let backends = Backends::from_config(&config, palette)?;
    backends.log_balances().await;

    let Some(phase) = cli.phase else {
        return Ok(());
    };

    let ctx = PipelineContext::new(
        catalog,
        backends,
        SpriteStore::new(&config.sprites_dir),
        &config.manifest_path,
    )
    .with_scheduler(TaskScheduler::new(config.max_concurrency))
    .with_seed(cli.seed);

    log::info!(
        "🚀 Phase {:?}: {} towers, {} enemies, {} workers",
        phase,
        selection.towers.len(),
        selection.enemies.len(),
        config.max_concurrency
    );
    let reports = pipeline::run(&ctx, phase, &selection).await?;

    let failed: usize = reports.iter().map(|r| r.summary.failed.len()).sum();
    let succeeded: usize = reports.iter().map(|r| r.summary.succeeded).sum();
    for report in &reports {
        log::info!(
            "  {:<12} {:>4} ok {:>4} failed",
            report.phase,
            report.summary.succeeded,
            report.summary.failed.len()
        );
    }
    if failed > 0 {
        log::warn!("{} items failed; re-run the same phase to fill the gaps", failed);
    }
    log::info!("🎉 Done: {} succeeded, {} failed", succeeded, failed);
    Ok(())
}
