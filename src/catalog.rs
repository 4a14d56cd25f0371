//! Asset catalog: what to generate and the prompt text for each asset.
//!
//! Prompt text is data. The pipeline only composes catalog strings, it never
//! hard-codes art direction.

use crate::error::{Result, SpriteError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

fn default_character_size() -> [u32; 2] {
    [32, 48]
}

fn default_sprite_size() -> [u32; 2] {
    [32, 32]
}

/// Prompt fragments shared across assets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleStrings {
    /// Leading layer for isolated sprites (turrets, projectiles, effects).
    pub sprite: String,
    /// Leading layer for characters; kept short.
    pub character: String,
    pub chroma_background: String,
    pub negative: String,
    pub base_negative: String,
    pub turret_negative: String,
}

impl StyleStrings {
    /// Joins the non-empty parts with ", ".
    pub fn compose(parts: &[&str]) -> String {
        parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TowerSpec {
    pub base_prompt: String,
    pub turret_prompt: String,
    /// Set for towers whose turret is a standing figure rather than a weapon.
    #[serde(default)]
    pub figure_prompt: Option<String>,
    /// The tower has no platform; its base is a transparent placeholder.
    #[serde(default)]
    pub skip_base: bool,
}

impl TowerSpec {
    pub fn is_figure(&self) -> bool {
        self.figure_prompt.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemySpec {
    pub description: String,
    #[serde(default = "default_character_size")]
    pub size: [u32; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteItem {
    pub description: String,
    #[serde(default = "default_sprite_size")]
    pub size: [u32; 2],
}

/// A generic single-image category, written to `{dir}/{prefix}_{name}.png`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteGroup {
    pub name: String,
    pub dir: String,
    pub prefix: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub isometric: bool,
    #[serde(default)]
    pub items: BTreeMap<String, SpriteItem>,
}

impl SpriteGroup {
    pub fn sprite_path(&self, item: &str) -> String {
        format!("{}/{}_{}.png", self.dir, self.prefix, item)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetCatalog {
    #[serde(default)]
    pub style: StyleStrings,
    #[serde(default)]
    pub towers: BTreeMap<String, TowerSpec>,
    #[serde(default)]
    pub enemies: BTreeMap<String, EnemySpec>,
    #[serde(default)]
    pub sprite_groups: Vec<SpriteGroup>,
}

impl AssetCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            SpriteError::Config(format!("Cannot read catalog {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_json(&text)?;
        log::info!(
            "📚 Catalog: {} towers, {} enemies, {} sprite groups",
            catalog.towers.len(),
            catalog.enemies.len(),
            catalog.sprite_groups.len()
        );
        Ok(catalog)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| SpriteError::Config(format!("Invalid catalog: {}", e)))
    }

    /// Tower names to process. `None` selects every tower; unknown names are
    /// a configuration error.
    pub fn select_towers(&self, filter: Option<&[String]>) -> Result<Vec<String>> {
        select("tower", &self.towers, filter)
    }

    pub fn select_enemies(&self, filter: Option<&[String]>) -> Result<Vec<String>> {
        select("enemy", &self.enemies, filter)
    }
}

fn select<V>(
    kind: &str,
    table: &BTreeMap<String, V>,
    filter: Option<&[String]>,
) -> Result<Vec<String>> {
    let Some(names) = filter else {
        return Ok(table.keys().cloned().collect());
    };

    let unknown: Vec<&str> = names
        .iter()
        .filter(|name| !table.contains_key(name.as_str()))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(SpriteError::Config(format!(
            "Unknown {} name(s): {}. Available: {}",
            kind,
            unknown.join(", "),
            table.keys().cloned().collect::<Vec<_>>().join(", ")
        )));
    }
    Ok(names.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "style": {"sprite": "16-bit isometric pixel art", "negative": "background"},
        "towers": {
            "rubber_bullet": {"base_prompt": "squat housing", "turret_prompt": "twin barrels"},
            "riot_cop": {"base_prompt": "", "turret_prompt": "", "figure_prompt": "cop with shield", "skip_base": true}
        },
        "enemies": {"rioter": {"description": "hooded protester"}},
        "sprite_groups": [
            {"name": "projectiles", "dir": "projectiles", "prefix": "proj",
             "items": {"rubber": {"description": "small pellet", "size": [16, 16]}}}
        ]
    }"#;

    #[test]
    fn parses_with_defaults() {
        let catalog = AssetCatalog::from_json(CATALOG).unwrap();
        assert!(catalog.towers["riot_cop"].is_figure());
        assert!(catalog.towers["riot_cop"].skip_base);
        assert!(!catalog.towers["rubber_bullet"].skip_base);
        assert_eq!(catalog.enemies["rioter"].size, [32, 48]);
        assert_eq!(catalog.sprite_groups[0].items["rubber"].size, [16, 16]);
        assert_eq!(
            catalog.sprite_groups[0].sprite_path("rubber"),
            "projectiles/proj_rubber.png"
        );
    }

    #[test]
    fn unknown_filter_names_are_config_errors() {
        let catalog = AssetCatalog::from_json(CATALOG).unwrap();
        let filter = vec!["rubber_bullet".to_string(), "laser".to_string()];

        let err = catalog.select_towers(Some(&filter)).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("laser"));
    }

    #[test]
    fn no_filter_selects_everything_in_order() {
        let catalog = AssetCatalog::from_json(CATALOG).unwrap();
        assert_eq!(
            catalog.select_towers(None).unwrap(),
            vec!["riot_cop", "rubber_bullet"]
        );
        assert_eq!(catalog.select_enemies(None).unwrap(), vec!["rioter"]);
    }

    #[test]
    fn compose_skips_empty_parts() {
        assert_eq!(StyleStrings::compose(&["a", "", " b "]), "a, b");
    }

    #[test]
    fn malformed_catalog_is_fatal() {
        assert!(AssetCatalog::from_json("{\"towers\": 3}").unwrap_err().is_fatal());
    }
}
