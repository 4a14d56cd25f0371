use super::PipelineContext;
use crate::{
    catalog::{SpriteGroup, SpriteItem, StyleStrings},
    error::Result,
    imaging::{remove_background, DEFAULT_TOLERANCE},
    models::GenerationRequest,
    scheduler::{BatchSummary, Task},
};
use std::sync::Arc;

/// Runs every catalog sprite group, one scheduler batch per group.
pub async fn generate_sprite_groups(ctx: &PipelineContext) -> BatchSummary {
    let mut total = BatchSummary::default();
    for group in &ctx.catalog.sprite_groups {
        log::info!("--- {} ({} items) ---", group.name, group.items.len());
        total.absorb(generate_group(ctx, group).await);
    }
    total
}

pub async fn generate_group(ctx: &PipelineContext, group: &SpriteGroup) -> BatchSummary {
    let group = Arc::new(group.clone());
    let tasks = group
        .items
        .iter()
        .map(|(name, item)| {
            let ctx = ctx.clone();
            let group = group.clone();
            let name = name.clone();
            let item = item.clone();
            Task::new(format!("{}_{}", group.prefix, name), async move {
                generate_sprite(&ctx, &group, &name, &item).await
            })
        })
        .collect();
    let (_, summary) = ctx.scheduler.run_with_summary(tasks).await;
    summary
}

async fn generate_sprite(
    ctx: &PipelineContext,
    group: &SpriteGroup,
    name: &str,
    item: &SpriteItem,
) -> Result<()> {
    let rel = group.sprite_path(name);
    if ctx.store.exists(&rel) {
        log::info!("{}: exists, skipping", rel);
        return Ok(());
    }

    let style = &ctx.catalog.style;
    let [width, height] = item.size;
    let request = GenerationRequest::new(
        StyleStrings::compose(&[&style.sprite, &group.prompt, &item.description]),
        width,
        height,
    )
    .isometric(group.isometric)
    .with_negative(style.negative.as_str())
    .with_seed(ctx.seed);

    log::info!("Generating {}...", rel);
    let generated = ctx.backends.images.submit(&request).await?;
    let image = remove_background(generated.image, None, DEFAULT_TOLERANCE);
    ctx.store.save(&rel, &image)?;
    Ok(())
}
