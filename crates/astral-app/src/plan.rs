use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use astral_core::config::{MissionConfig, MissionKind, PlanItemConfig};
use astral_core::error::{AstralError, Result};
use astral_core::traits::ProgressStore;

use crate::mission::MissionCatalog;
use crate::ops::team::MAX_TEAMS;

/// What one confirmed unit of work completed and cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReport {
    pub runs: u32,
    pub power_used: u32,
    pub qty_used: u32,
}

/// Trailblaze Power and immersifiers available to the plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerBudget {
    pub power: u32,
    pub qty: u32,
}

/// How many runs to attempt next, or why none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerDecision {
    Run(u32),
    Exhausted,
    PlanComplete,
}

impl PowerBudget {
    pub fn new(power: u32, qty: u32) -> Self {
        Self { power, qty }
    }

    /// Runs the budget affords for a mission, ignoring the plan.
    pub fn runs_possible(&self, kind: &MissionKind) -> u32 {
        let mut runs = self.power / kind.power_cost().max(1);
        if kind.uses_immersifier() {
            runs += self.qty;
        }
        runs
    }

    /// Plan completion wins over an empty budget.
    pub fn decide(&self, entry: &PlanEntry) -> PowerDecision {
        let remaining = entry.remaining();
        if remaining == 0 {
            return PowerDecision::PlanComplete;
        }
        match self.runs_possible(&entry.mission.kind).min(remaining) {
            0 => PowerDecision::Exhausted,
            n => PowerDecision::Run(n),
        }
    }

    /// What `runs` would cost, spending immersifiers before power.
    pub fn quote(&self, kind: &MissionKind, runs: u32) -> UnitReport {
        let qty_used = if kind.uses_immersifier() {
            runs.min(self.qty)
        } else {
            0
        };
        UnitReport {
            runs,
            power_used: (runs - qty_used) * kind.power_cost(),
            qty_used,
        }
    }

    pub fn charge(&mut self, report: &UnitReport) {
        self.power = self.power.saturating_sub(report.power_used);
        self.qty = self.qty.saturating_sub(report.qty_used);
    }
}

/// One plan line resolved against the catalog and stored progress.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub key: String,
    pub mission: MissionConfig,
    pub plan_times: u32,
    pub run_times: u32,
    pub team_num: u32,
    pub support: Option<String>,
}

impl PlanEntry {
    pub fn remaining(&self) -> u32 {
        self.plan_times.saturating_sub(self.run_times)
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }
}

/// Progress of one plan entry, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanProgress {
    pub key: String,
    pub mission_id: String,
    pub run_times: u32,
    pub plan_times: u32,
}

/// The Trailblaze Power plan with write-through progress.
pub struct PowerPlan {
    entries: Vec<PlanEntry>,
    store: Box<dyn ProgressStore>,
}

impl fmt::Debug for PowerPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PowerPlan")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl PowerPlan {
    /// Resolve plan items; unknown missions are a configuration error.
    pub fn load(
        items: &[PlanItemConfig],
        catalog: &MissionCatalog,
        store: Box<dyn ProgressStore>,
    ) -> Result<Self> {
        let mut entries: Vec<PlanEntry> = Vec::with_capacity(items.len());
        for item in items {
            let key = item.key().to_string();
            if entries.iter().any(|e| e.key == key) {
                return Err(AstralError::Plan(format!("duplicate plan entry '{}'", key)));
            }
            if item.plan_times == 0 {
                return Err(AstralError::Plan(format!("plan entry '{}' has zero runs", key)));
            }
            if !(1..=MAX_TEAMS).contains(&item.team_num) {
                return Err(AstralError::Plan(format!(
                    "plan entry '{}' has team {}, expected 1 to {}",
                    key, item.team_num, MAX_TEAMS
                )));
            }
            let mission = catalog.get(&item.mission_id)?.clone();
            let run_times = store.load(&key)?.min(item.plan_times);
            entries.push(PlanEntry {
                key,
                mission,
                plan_times: item.plan_times,
                run_times,
                team_num: item.team_num,
                support: item.support.clone().filter(|s| s != "none"),
            });
        }
        Ok(Self { entries, store })
    }

    /// Re-read progress from the store, e.g. before a new run.
    pub fn reload(&mut self) -> Result<()> {
        for entry in &mut self.entries {
            entry.run_times = self.store.load(&entry.key)?.min(entry.plan_times);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Index of the first entry with runs left.
    pub fn next_pending(&self) -> Option<usize> {
        self.entries.iter().position(|e| !e.is_complete())
    }

    pub fn entry(&self, idx: usize) -> Option<&PlanEntry> {
        self.entries.get(idx)
    }

    /// Add confirmed runs to an entry and persist the new total at once.
    pub fn record_runs(&mut self, idx: usize, runs: u32) -> Result<u32> {
        let entry = self
            .entries
            .get_mut(idx)
            .ok_or_else(|| AstralError::Plan(format!("no plan entry at {}", idx)))?;
        let total = (entry.run_times + runs).min(entry.plan_times);
        self.store.save(&entry.key, total)?;
        entry.run_times = total;
        info!(
            plan = %entry.key,
            run_times = total,
            plan_times = entry.plan_times,
            "Plan progress saved"
        );
        Ok(total)
    }

    pub fn progress(&self) -> Vec<PlanProgress> {
        self.entries
            .iter()
            .map(|e| PlanProgress {
                key: e.key.clone(),
                mission_id: e.mission.id.clone(),
                run_times: e.run_times,
                plan_times: e.plan_times,
            })
            .collect()
    }
}
