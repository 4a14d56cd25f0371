use super::PipelineContext;
use crate::{
    backend::pixellab::DEFAULT_VIEW,
    catalog::{StyleStrings, TowerSpec},
    error::{Result, SpriteError},
    imaging::{png_base64, remove_background, remove_ground_stain, DEFAULT_TOLERANCE},
    models::{Direction, GenerationRequest},
    scheduler::{BatchSummary, Task},
};
use image::RgbaImage;

/// Bases and turrets share one square canvas.
pub const TOWER_SIDE: u32 = 64;

pub fn base_path(name: &str) -> String {
    format!("towers/{}/base.png", name)
}

pub fn turret_ref_path(name: &str) -> String {
    format!("towers/{}/turret_ref.png", name)
}

pub fn turret_path(name: &str, direction: &str) -> String {
    format!("towers/{}/turret_{}.png", name, direction)
}

fn tower<'a>(ctx: &'a PipelineContext, name: &str) -> Result<&'a TowerSpec> {
    ctx.catalog
        .towers
        .get(name)
        .ok_or_else(|| SpriteError::Config(format!("Unknown tower '{}'", name)))
}

pub async fn generate_bases(ctx: &PipelineContext, names: &[String]) -> BatchSummary {
    let tasks = names
        .iter()
        .map(|name| {
            let ctx = ctx.clone();
            let name = name.clone();
            Task::new(name.clone(), async move { generate_base(&ctx, &name).await })
        })
        .collect();
    let (_, summary) = ctx.scheduler.run_with_summary(tasks).await;
    summary
}

async fn generate_base(ctx: &PipelineContext, name: &str) -> Result<()> {
    let rel = base_path(name);
    if ctx.store.exists(&rel) {
        log::info!("{}: base exists, skipping", name);
        return Ok(());
    }

    let tower = tower(ctx, name)?;
    if tower.skip_base {
        log::info!("Emitting transparent base for {} (skip_base)", name);
        ctx.store.save_placeholder(&rel, TOWER_SIDE, TOWER_SIDE)?;
        return Ok(());
    }

    let style = &ctx.catalog.style;
    let request = GenerationRequest::new(
        StyleStrings::compose(&[&style.sprite, &tower.base_prompt]),
        TOWER_SIDE,
        TOWER_SIDE,
    )
    .isometric(true)
    .with_negative(style.base_negative.as_str())
    .with_seed(ctx.seed);

    log::info!("Generating base for {}...", name);
    let generated = ctx.backends.reference.submit(&request).await?;
    let image = remove_background(generated.image, None, DEFAULT_TOLERANCE);
    ctx.store.save(&rel, &image)?;
    Ok(())
}

/// Turret references, then their rotations. A tower whose reference could
/// not be produced gets no rotations.
pub async fn generate_turrets(ctx: &PipelineContext, names: &[String]) -> BatchSummary {
    let tasks = names
        .iter()
        .map(|name| {
            let ctx = ctx.clone();
            let name = name.clone();
            Task::new(name.clone(), async move {
                let reference = turret_reference(&ctx, &name).await?;
                Ok((name, reference))
            })
        })
        .collect();
    let (references, mut summary) = ctx.scheduler.run_with_summary(tasks).await;

    let tasks = references
        .into_iter()
        .flatten()
        .map(|(name, reference)| {
            let ctx = ctx.clone();
            Task::new(format!("{}/rotations", name), async move {
                rotate_turret(&ctx, &name, reference).await
            })
        })
        .collect();
    let (_, rotations) = ctx.scheduler.run_with_summary(tasks).await;
    summary.absorb(rotations);
    summary
}

/// Loads the turret reference from disk, generating it first if missing.
async fn turret_reference(ctx: &PipelineContext, name: &str) -> Result<RgbaImage> {
    let rel = turret_ref_path(name);
    if ctx.store.exists(&rel) {
        log::info!("{}: turret reference exists, reusing", name);
        return ctx.store.load(&rel);
    }

    let tower = tower(ctx, name)?;
    let style = &ctx.catalog.style;
    let mut request = match &tower.figure_prompt {
        Some(figure) => GenerationRequest::new(figure.as_str(), TOWER_SIDE, TOWER_SIDE)
            .with_negative(style.negative.as_str()),
        None => GenerationRequest::new(
            StyleStrings::compose(&[&style.sprite, &tower.turret_prompt]),
            TOWER_SIDE,
            TOWER_SIDE,
        )
        .with_negative(style.turret_negative.as_str()),
    }
    .isometric(true)
    .with_seed(ctx.seed);

    // Figures are not anchored to a platform, so the base would only bias them.
    if !tower.is_figure() && ctx.store.exists(&base_path(name)) {
        let base = ctx.store.load(&base_path(name))?;
        request = request.with_reference_image(png_base64(&base)?);
    } else if !tower.is_figure() {
        log::warn!("No base image for {}, generating turret without reference", name);
    }

    log::info!("Generating turret reference for {}...", name);
    let generated = ctx.backends.reference.submit(&request).await?;
    let mut image = remove_background(generated.image, None, DEFAULT_TOLERANCE);
    if tower.is_figure() {
        let cleared = remove_ground_stain(&mut image);
        log::debug!("{}: cleared {} stain pixels", name, cleared);
    }
    ctx.store.save(&rel, &image)?;
    Ok(image)
}

async fn rotate_turret(ctx: &PipelineContext, name: &str, reference: RgbaImage) -> Result<()> {
    let done = Direction::SERVICE_ORDER
        .iter()
        .all(|d| ctx.store.exists(&turret_path(name, d.as_str())));
    if done {
        log::info!("{}: all 8 rotations exist, skipping", name);
        return Ok(());
    }

    let figure = tower(ctx, name)?.is_figure();
    log::info!("Generating 8 rotations for {}...", name);
    match ctx.backends.rotations.rotate_8(&reference, DEFAULT_VIEW).await {
        Ok(set) => {
            let count = set.len();
            for entry in set {
                let mut image = entry.image;
                if figure {
                    remove_ground_stain(&mut image);
                }
                ctx.store.save(&turret_path(name, &entry.label), &image)?;
            }
            log::info!("Got {} rotations for {} (direction-corrected)", count, name);
        }
        Err(e) => {
            log::warn!(
                "Rotation failed for {}: {}. Saving reference for all directions",
                name,
                e
            );
            for direction in Direction::SERVICE_ORDER {
                ctx.store
                    .save(&turret_path(name, direction.as_str()), &reference)?;
            }
        }
    }
    Ok(())
}
