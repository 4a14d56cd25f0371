//! Multi-phase asset production.
//!
//! Every phase fans its items out through the [`TaskScheduler`]; one item
//! failing never stops the phase. Re-running a phase only fills gaps: sprites
//! already on disk and characters already in the manifest are skipped.

pub mod characters;
pub mod sprites;
pub mod towers;

use crate::{
    backend::Backends,
    catalog::AssetCatalog,
    error::Result,
    logger::PhaseTimer,
    scheduler::{BatchSummary, TaskScheduler},
    sprite_store::SpriteStore,
};
use clap::ValueEnum;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a phase needs, built once per run and shared read-only.
#[derive(Clone)]
pub struct PipelineContext {
    pub catalog: Arc<AssetCatalog>,
    pub backends: Backends,
    pub store: SpriteStore,
    pub scheduler: TaskScheduler,
    pub manifest_path: PathBuf,
    pub seed: Option<u64>,
}

impl PipelineContext {
    pub fn new(
        catalog: AssetCatalog,
        backends: Backends,
        store: SpriteStore,
        manifest_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            backends,
            store,
            scheduler: TaskScheduler::default(),
            manifest_path: manifest_path.into(),
            seed: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: TaskScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Phase {
    /// Tower base platforms.
    Bases,
    /// Turret references and their 8 rotations.
    Turrets,
    /// Bases, then turrets.
    Towers,
    /// Stateful enemy characters with 8 directional views.
    EnemyChars,
    /// Walk cycles for characters already in the manifest.
    EnemyAnims,
    /// Every catalog sprite group.
    Sprites,
    All,
}

/// Validated asset names a run is restricted to.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub towers: Vec<String>,
    pub enemies: Vec<String>,
}

impl Selection {
    /// Resolves CLI filters against the catalog. Unknown names fail here,
    /// before any task runs.
    pub fn resolve(
        catalog: &AssetCatalog,
        towers: Option<&[String]>,
        enemies: Option<&[String]>,
    ) -> Result<Self> {
        Ok(Self {
            towers: catalog.select_towers(towers)?,
            enemies: catalog.select_enemies(enemies)?,
        })
    }
}

/// Outcome of one phase, for the end-of-run report.
#[derive(Debug, Clone)]
pub struct PhaseReport {
    pub phase: &'static str,
    pub summary: BatchSummary,
}

/// Runs `phase` (and, for composite phases, its parts in order).
pub async fn run(
    ctx: &PipelineContext,
    phase: Phase,
    selection: &Selection,
) -> Result<Vec<PhaseReport>> {
    let mut reports = Vec::new();

    if matches!(phase, Phase::Bases | Phase::Towers | Phase::All) {
        let _timer = PhaseTimer::new("TOWER BASES");
        let summary = towers::generate_bases(ctx, &selection.towers).await;
        reports.push(report("bases", summary));
    }
    if matches!(phase, Phase::Turrets | Phase::Towers | Phase::All) {
        let _timer = PhaseTimer::new("TURRETS");
        let summary = towers::generate_turrets(ctx, &selection.towers).await;
        reports.push(report("turrets", summary));
    }
    if matches!(phase, Phase::EnemyChars | Phase::All) {
        let _timer = PhaseTimer::new("ENEMY CHARACTERS");
        let summary = characters::create_characters(ctx, &selection.enemies).await?;
        reports.push(report("enemy-chars", summary));
    }
    if matches!(phase, Phase::EnemyAnims | Phase::All) {
        let _timer = PhaseTimer::new("ENEMY WALK ANIMATIONS");
        let summary = characters::animate_characters(ctx, &selection.enemies).await?;
        reports.push(report("enemy-anims", summary));
    }
    if matches!(phase, Phase::Sprites | Phase::All) {
        let _timer = PhaseTimer::new("SPRITE GROUPS");
        let summary = sprites::generate_sprite_groups(ctx).await;
        reports.push(report("sprites", summary));
    }

    Ok(reports)
}

fn report(phase: &'static str, summary: BatchSummary) -> PhaseReport {
    if summary.failed.is_empty() {
        log::info!("✅ {}: {} succeeded", phase, summary.succeeded);
    } else {
        log::warn!(
            "{}: {} succeeded, {} failed ({})",
            phase,
            summary.succeeded,
            summary.failed.len(),
            summary.failed.join(", ")
        );
    }
    PhaseReport { phase, summary }
}
