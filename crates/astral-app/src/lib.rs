//! Game side of Astral: the mission catalog, Trailblaze Power plans and
//! their persisted progress, screen areas and the operations that drive
//! the game through the engine.

pub mod areas;
pub mod mission;
pub mod ops;
pub mod parse;
pub mod plan;
pub mod progress;
pub mod replay;
pub mod screen_state;
pub mod trailblaze_power;

pub use areas::AreaBook;
pub use mission::MissionCatalog;
pub use plan::{PlanEntry, PlanProgress, PowerBudget, PowerDecision, PowerPlan, UnitReport};
pub use progress::SqliteProgressStore;
pub use replay::{ReplayBackend, ReplayFrame, ReplayScript};
pub use screen_state::ScreenState;
pub use trailblaze_power::{PowerExit, PowerReport, TrailblazePowerApp};
