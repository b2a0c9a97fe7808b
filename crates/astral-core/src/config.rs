use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AstralError, Result};

/// Top-level Astral configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub areas: AreasConfig,
    #[serde(default)]
    pub sim_uni: SimUniConfig,
    /// Mission catalog.
    #[serde(default)]
    pub missions: Vec<MissionConfig>,
    /// Trailblaze Power plan, consumed in order.
    #[serde(default)]
    pub plan: Vec<PlanItemConfig>,
}

/// Operation engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Retry budget for nodes that do not declare their own.
    #[serde(default = "default_node_max_retries")]
    pub default_node_max_retries: u32,
    /// How often a paused run re-checks the pause flag.
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,
    /// Backoff applied to a RETRY that carries no explicit wait (0 = disabled).
    #[serde(default)]
    pub retry_initial_backoff_ms: u64,
    #[serde(default = "default_retry_max_backoff_ms")]
    pub retry_max_backoff_ms: u64,
    /// Upper bound for one top-level operation run.
    #[serde(default)]
    pub operation_timeout_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_node_max_retries: default_node_max_retries(),
            pause_poll_ms: default_pause_poll_ms(),
            retry_initial_backoff_ms: 0,
            retry_max_backoff_ms: default_retry_max_backoff_ms(),
            operation_timeout_secs: None,
        }
    }
}

impl EngineConfig {
    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms.max(1))
    }

    /// Backoff before retry attempt `attempt` (1-based), doubling each time.
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        if self.retry_initial_backoff_ms == 0 {
            return Duration::ZERO;
        }
        let exp = attempt.saturating_sub(1).min(20);
        let ms = self
            .retry_initial_backoff_ms
            .saturating_mul(2u64.pow(exp))
            .min(self.retry_max_backoff_ms);
        Duration::from_millis(ms)
    }
}

fn default_node_max_retries() -> u32 { 3 }
fn default_pause_poll_ms() -> u64 { 100 }
fn default_retry_max_backoff_ms() -> u64 { 5000 }

/// Key bindings and character constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_key_guide")]
    pub key_guide: String,
    #[serde(default = "default_key_esc")]
    pub key_esc: String,
    #[serde(default = "default_key_interact")]
    pub key_interact: String,
    #[serde(default = "default_key_technique")]
    pub key_technique: String,
    #[serde(default = "default_key_forward")]
    pub key_forward: String,
    /// Walking speed in map pixels per second.
    #[serde(default = "default_walk_speed")]
    pub walk_speed: f64,
    #[serde(default = "default_screen_width")]
    pub screen_width: u32,
    #[serde(default = "default_screen_height")]
    pub screen_height: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            key_guide: default_key_guide(),
            key_esc: default_key_esc(),
            key_interact: default_key_interact(),
            key_technique: default_key_technique(),
            key_forward: default_key_forward(),
            walk_speed: default_walk_speed(),
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
        }
    }
}

fn default_key_guide() -> String { "f4".to_string() }
fn default_key_esc() -> String { "esc".to_string() }
fn default_key_interact() -> String { "f".to_string() }
fn default_key_technique() -> String { "e".to_string() }
fn default_key_forward() -> String { "w".to_string() }
fn default_walk_speed() -> f64 { 20.0 }
fn default_screen_width() -> u32 { 1920 }
fn default_screen_height() -> u32 { 1080 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding plan progress. `~` is expanded.
    #[serde(default = "default_progress_db")]
    pub progress_db: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            progress_db: default_progress_db(),
        }
    }
}

fn default_progress_db() -> String { "~/.astral/progress.db".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreasConfig {
    /// TOML file with screen area definitions. Relative to the config file.
    #[serde(default = "default_areas_path")]
    pub path: String,
}

impl Default for AreasConfig {
    fn default() -> Self {
        Self {
            path: default_areas_path(),
        }
    }
}

fn default_areas_path() -> String { "areas.toml".to_string() }

/// Simulated Universe preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimUniConfig {
    /// Blessing names in order of preference.
    #[serde(default)]
    pub bless_priority: Vec<String>,
    /// How far to walk toward the next level's portal, in map pixels.
    #[serde(default = "default_level_walk_distance")]
    pub level_walk_distance: f64,
}

impl Default for SimUniConfig {
    fn default() -> Self {
        Self {
            bless_priority: Vec::new(),
            level_walk_distance: default_level_walk_distance(),
        }
    }
}

fn default_level_walk_distance() -> f64 { 30.0 }

/// One repeatable mission in the guide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionConfig {
    pub id: String,
    pub name: String,
    /// Guide tab holding the mission (e.g. "Survival Index").
    #[serde(default = "default_mission_tab")]
    pub tab: String,
    pub category: String,
    /// Region label used to disambiguate missions sharing a name.
    #[serde(default)]
    pub region: Option<String>,
    pub kind: MissionKind,
}

fn default_mission_tab() -> String { "Survival Index".to_string() }

/// How a mission is played and paid for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MissionKind {
    /// Ordinary power-spending mission (Calyx, Shadow, Cavern, Echo of War).
    Calyx { power: u32 },
    /// Simulated Universe world; rewards paid with immersifiers or power.
    SimulatedUniverse {
        world: u32,
        #[serde(default = "default_reward_power")]
        power: u32,
    },
    /// Ornament Extraction; rewards paid with immersifiers or power.
    OrnamentExtraction {
        #[serde(default = "default_reward_power")]
        power: u32,
    },
}

fn default_reward_power() -> u32 { 40 }

impl MissionKind {
    /// Power spent per run when no immersifier is used.
    pub fn power_cost(&self) -> u32 {
        match self {
            MissionKind::Calyx { power } => *power,
            MissionKind::SimulatedUniverse { power, .. } => *power,
            MissionKind::OrnamentExtraction { power } => *power,
        }
    }

    /// Whether immersifiers can pay for a run.
    pub fn uses_immersifier(&self) -> bool {
        match self {
            MissionKind::Calyx { .. } => false,
            MissionKind::SimulatedUniverse { .. } | MissionKind::OrnamentExtraction { .. } => true,
        }
    }
}

/// One entry in the Trailblaze Power plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItemConfig {
    /// Stable key for persisted progress. Defaults to the mission id.
    #[serde(default)]
    pub id: Option<String>,
    pub mission_id: String,
    pub plan_times: u32,
    #[serde(default = "default_team_num")]
    pub team_num: u32,
    #[serde(default)]
    pub support: Option<String>,
}

fn default_team_num() -> u32 { 1 }

impl PlanItemConfig {
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.mission_id)
    }
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| AstralError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| AstralError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot turn into timings.
    pub fn validate(&self) -> Result<()> {
        let speed = self.game.walk_speed;
        if !(speed.is_finite() && speed > 0.0) {
            return Err(AstralError::Config(format!(
                "game.walk_speed must be a positive number, got {}",
                speed
            )));
        }
        let distance = self.sim_uni.level_walk_distance;
        if !(distance.is_finite() && distance >= 0.0) {
            return Err(AstralError::Config(format!(
                "sim_uni.level_walk_distance must be a non-negative number, got {}",
                distance
            )));
        }
        Ok(())
    }

    /// Resolve the progress database path (expand ~).
    pub fn progress_db_path(&self) -> PathBuf {
        expand_home(&self.storage.progress_db)
    }

    /// Resolve the area book path relative to the config file's directory.
    pub fn areas_path(&self, config_path: &Path) -> PathBuf {
        let p = expand_home(&self.areas.path);
        if p.is_absolute() {
            return p;
        }
        config_path
            .parent()
            .map(|dir| dir.join(&p))
            .unwrap_or(p)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    tracing::warn!(var = %var_name, "Config references unset environment variable");
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
