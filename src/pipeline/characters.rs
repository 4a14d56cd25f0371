use super::PipelineContext;
use crate::{
    backend::pixellab::WALK_TEMPLATE,
    catalog::{EnemySpec, StyleStrings},
    error::{Result, SpriteError},
    imaging::{remove_background, DEFAULT_TOLERANCE},
    manifest::IdentityManifest,
    models::GenerationRequest,
    scheduler::{BatchSummary, Task},
};

pub fn walk_frame_path(name: &str, direction: &str, frame: usize) -> String {
    format!("enemies/{}/walk_{}_{:02}.png", name, direction, frame)
}

fn enemy<'a>(ctx: &'a PipelineContext, name: &str) -> Result<&'a EnemySpec> {
    ctx.catalog
        .enemies
        .get(name)
        .ok_or_else(|| SpriteError::Config(format!("Unknown enemy '{}'", name)))
}

/// Creates a remote character for every name not yet in the manifest.
///
/// The manifest is read before the batch and written once after it; names it
/// already holds cost no remote call at all.
pub async fn create_characters(ctx: &PipelineContext, names: &[String]) -> Result<BatchSummary> {
    let mut manifest = IdentityManifest::load(&ctx.manifest_path)?;

    let to_create: Vec<String> = names
        .iter()
        .filter(|name| match manifest.get(name) {
            Some(token) => {
                log::info!("{}: already created ({}), skipping", name, token);
                false
            }
            None => true,
        })
        .cloned()
        .collect();

    if to_create.is_empty() {
        log::info!("All characters already exist in manifest");
        return Ok(BatchSummary::default());
    }

    let tasks = to_create
        .into_iter()
        .map(|name| {
            let ctx = ctx.clone();
            Task::new(name.clone(), async move {
                let token = create_character(&ctx, &name).await?;
                Ok((name, token))
            })
        })
        .collect();
    let (results, summary) = ctx.scheduler.run_with_summary(tasks).await;

    let added = manifest.merge(results.into_iter().flatten());
    log::info!("{} new character identities", added);
    manifest.save()?;
    Ok(summary)
}

/// Returns the new token, or an empty token when creation failed and a
/// single south-east sprite was generated instead.
async fn create_character(ctx: &PipelineContext, name: &str) -> Result<String> {
    let enemy = enemy(ctx, name)?;
    let style = &ctx.catalog.style;
    let [width, height] = enemy.size;

    let request = GenerationRequest::new(
        StyleStrings::compose(&[&style.character, &enemy.description]),
        width,
        height,
    )
    .isometric(true)
    .with_seed(ctx.seed);

    log::info!("Creating character: {}...", name);
    match ctx.backends.characters.create_character(&request).await {
        Ok(created) => {
            for entry in &created.directions {
                ctx.store
                    .save(&walk_frame_path(name, &entry.label, 1), &entry.image)?;
            }
            log::info!(
                "Saved {} directional sprites for {}",
                created.directions.len(),
                name
            );
            Ok(created.token)
        }
        Err(e) => {
            log::warn!(
                "Character creation failed for {}: {}. Falling back to a single south-east sprite",
                name,
                e
            );
            let request = GenerationRequest::new(
                StyleStrings::compose(&[
                    &style.character,
                    "single character",
                    &style.chroma_background,
                    "facing south-east, walking pose",
                    &enemy.description,
                ]),
                width,
                height,
            )
            .isometric(true)
            .with_negative(style.negative.as_str())
            .with_seed(ctx.seed);

            let generated = ctx.backends.images.submit(&request).await?;
            let image = remove_background(generated.image, None, DEFAULT_TOLERANCE);
            ctx.store.save(&walk_frame_path(name, "se", 1), &image)?;
            Ok(String::new())
        }
    }
}

/// Animates the walk cycle of every selected character that has a token.
pub async fn animate_characters(ctx: &PipelineContext, names: &[String]) -> Result<BatchSummary> {
    let manifest = IdentityManifest::load(&ctx.manifest_path)?;

    let tasks: Vec<Task<()>> = names
        .iter()
        .filter_map(|name| {
            let Some(token) = manifest.get(name) else {
                log::warn!(
                    "{}: no character id in manifest, skipping (run enemy-chars first)",
                    name
                );
                return None;
            };
            let ctx = ctx.clone();
            let name = name.clone();
            let token = token.to_string();
            Some(Task::new(name.clone(), async move {
                animate_character(&ctx, &name, &token).await
            }))
        })
        .collect();

    if tasks.is_empty() {
        return Ok(BatchSummary::default());
    }
    let (_, summary) = ctx.scheduler.run_with_summary(tasks).await;
    Ok(summary)
}

async fn animate_character(ctx: &PipelineContext, name: &str, token: &str) -> Result<()> {
    log::info!("Animating walk cycle for {} ({})...", name, token);
    let frames = ctx
        .backends
        .characters
        .animate_character(token, WALK_TEMPLATE)
        .await?;

    let mut total = 0;
    for (direction, images) in &frames {
        for (i, image) in images.iter().enumerate() {
            ctx.store
                .save(&walk_frame_path(name, direction, i + 1), image)?;
            total += 1;
        }
    }
    log::info!(
        "Saved {} animation frames for {} across {} directions",
        total,
        name,
        frames.len()
    );
    Ok(())
}

