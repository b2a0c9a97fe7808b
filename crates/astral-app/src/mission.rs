use std::collections::HashSet;

use astral_core::config::{MissionConfig, MissionKind};
use astral_core::error::{AstralError, Result};

/// The screen and area that confirm a teleport to a mission has landed.
pub fn arrival_area(kind: &MissionKind) -> (&'static str, &'static str) {
    match kind {
        MissionKind::Calyx { .. } | MissionKind::OrnamentExtraction { .. } => {
            ("mission", "challenge")
        }
        MissionKind::SimulatedUniverse { .. } => ("sim_uni", "start"),
    }
}

/// Most runs a single challenge can batch through the repeat selector.
pub fn max_batch(kind: &MissionKind) -> u32 {
    match kind {
        MissionKind::Calyx { .. } => 6,
        MissionKind::SimulatedUniverse { .. } | MissionKind::OrnamentExtraction { .. } => 1,
    }
}

/// Validated, data-driven mission catalog.
#[derive(Debug, Clone, Default)]
pub struct MissionCatalog {
    missions: Vec<MissionConfig>,
}

impl MissionCatalog {
    pub fn new(missions: Vec<MissionConfig>) -> Result<Self> {
        let mut seen = HashSet::new();
        for m in &missions {
            if !seen.insert(m.id.as_str()) {
                return Err(AstralError::Config(format!("duplicate mission id '{}'", m.id)));
            }
            if m.kind.power_cost() == 0 {
                return Err(AstralError::Config(format!(
                    "mission '{}' must cost at least 1 power",
                    m.id
                )));
            }
            if m.name.trim().is_empty() || m.category.trim().is_empty() {
                return Err(AstralError::Config(format!(
                    "mission '{}' needs a name and a category",
                    m.id
                )));
            }
        }
        Ok(Self { missions })
    }

    pub fn get(&self, id: &str) -> Result<&MissionConfig> {
        self.missions
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| AstralError::UnknownMission(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.missions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MissionConfig> {
        self.missions.iter()
    }
}
