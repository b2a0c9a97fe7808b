//! Game operations, each a validated node/edge graph.

pub mod back_to_world;
pub mod challenge;
pub mod guide;
pub mod movement;
pub mod reward;
pub mod sim_uni;
pub mod team;
pub mod transport;

use std::time::Duration;

use astral_core::error::Result;
use astral_core::types::OcrItem;
use astral_engine::Round;

pub use back_to_world::BackToWorld;
pub use challenge::{ChallengeMission, ChooseChallengeTimes};
pub use guide::{GuideCheckPower, GuideChooseTab, GuideOpen};
pub use movement::{MoveInteract, MoveWithoutPos, STATUS_PAUSE_INTERRUPTED};
pub use reward::{OrnamentExtractionRun, SimUniRun};
pub use sim_uni::SimUniChooseBless;
pub use team::{ChooseSupport, ChooseTeam};
pub use transport::GuideTransport;

/// Delay before re-checking a screen that has not changed yet.
pub(crate) const RETRY_WAIT: Duration = Duration::from_secs(1);
/// Delay after a click that opens another screen.
pub(crate) const SCREEN_CHANGE_WAIT: Duration = Duration::from_secs(2);

/// OCR everything inside a named area.
pub(crate) fn ocr_area(round: &mut Round<'_>, screen: &str, area: &str) -> Result<Vec<OcrItem>> {
    let area = round.ctx.area(screen, area)?;
    let frame = round.screenshot()?;
    round.ctx.ocr.recognize(&frame, area.rect)
}

/// OCR a named area as a single line.
pub(crate) fn ocr_line(round: &mut Round<'_>, screen: &str, area: &str) -> Result<String> {
    let area = round.ctx.area(screen, area)?;
    let frame = round.screenshot()?;
    round.ctx.ocr.recognize_line(&frame, area.rect)
}
