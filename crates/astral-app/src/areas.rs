use std::path::Path;

use serde::Deserialize;

use astral_core::error::{AstralError, Result};
use astral_core::traits::ScreenAreas;
use astral_core::types::{Area, Rect};

const BUILTIN_AREAS: &str = include_str!("../data/areas.toml");

/// Screen area definitions loaded from TOML.
#[derive(Debug, Clone, Default)]
pub struct AreaBook {
    areas: Vec<Area>,
}

#[derive(Debug, Deserialize)]
struct AreaFile {
    #[serde(default)]
    screens: Vec<ScreenDef>,
}

#[derive(Debug, Deserialize)]
struct ScreenDef {
    name: String,
    #[serde(default)]
    areas: Vec<AreaDef>,
}

#[derive(Debug, Deserialize)]
struct AreaDef {
    name: String,
    rect: [i32; 4],
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    template_id: Option<String>,
    #[serde(default)]
    threshold: Option<f32>,
    #[serde(default)]
    lcs_percent: Option<f64>,
}

impl AreaBook {
    /// The area book shipped with the binary.
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_AREAS)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load `path` when it exists, otherwise the built-in book.
    pub fn load_or_builtin(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Self::builtin()
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: AreaFile = toml::from_str(content)?;
        let mut areas = Vec::new();
        for screen in file.screens {
            for def in screen.areas {
                let [x1, y1, x2, y2] = def.rect;
                if x2 <= x1 || y2 <= y1 {
                    return Err(AstralError::Config(format!(
                        "area {}/{} has an empty rect",
                        screen.name, def.name
                    )));
                }
                if areas
                    .iter()
                    .any(|a: &Area| a.screen == screen.name && a.name == def.name)
                {
                    return Err(AstralError::Config(format!(
                        "duplicate area {}/{}",
                        screen.name, def.name
                    )));
                }
                let mut area = Area::new(screen.name.clone(), def.name, Rect::new(x1, y1, x2, y2));
                area.text = def.text;
                area.template_id = def.template_id;
                if let Some(t) = def.threshold {
                    area.threshold = t;
                }
                if let Some(p) = def.lcs_percent {
                    area.lcs_percent = p;
                }
                areas.push(area);
            }
        }
        Ok(Self { areas })
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }
}

impl ScreenAreas for AreaBook {
    fn get_area(&self, screen: &str, area: &str) -> Result<Area> {
        self.areas
            .iter()
            .find(|a| a.screen == screen && a.name == area)
            .cloned()
            .ok_or_else(|| AstralError::AreaNotFound {
                screen: screen.to_string(),
                area: area.to_string(),
            })
    }

    fn screen_areas(&self, screen: &str) -> Vec<Area> {
        self.areas
            .iter()
            .filter(|a| a.screen == screen)
            .cloned()
            .collect()
    }
}
