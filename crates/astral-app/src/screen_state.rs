//! Coarse classification of what the game is showing.

use std::fmt;
use std::mem::discriminant;

use astral_core::error::Result;
use astral_engine::area::{find_area, FindArea};
use astral_engine::Round;

/// A recognised screen. `Unknown` is a real answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenState {
    NormalWorld,
    PhoneMenu,
    /// The Interastral Guide, with the selected tab when it could be read.
    Guide(Option<String>),
    Battle,
    BattleFail,
    EmptyToClose,
    SimUniBless,
    SimUniEvent,
    ChallengeComplete,
    Unknown,
}

impl ScreenState {
    /// Area whose presence identifies this state.
    pub fn marker(&self) -> Option<(&'static str, &'static str)> {
        match self {
            ScreenState::NormalWorld => Some(("world", "menu_icon")),
            ScreenState::PhoneMenu => Some(("phone_menu", "trailblaze_level")),
            ScreenState::Guide(_) => Some(("guide", "title")),
            ScreenState::Battle => Some(("battle", "pause_icon")),
            ScreenState::BattleFail => Some(("battle_fail", "title")),
            ScreenState::EmptyToClose => Some(("dialog", "empty_to_close")),
            ScreenState::SimUniBless => Some(("sim_uni", "bless_title")),
            ScreenState::SimUniEvent => Some(("sim_uni", "event_title")),
            ScreenState::ChallengeComplete => Some(("challenge_complete", "title")),
            ScreenState::Unknown => None,
        }
    }

    /// Same variant, ignoring the guide tab.
    pub fn is(&self, other: &ScreenState) -> bool {
        discriminant(self) == discriminant(other)
    }
}

impl fmt::Display for ScreenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScreenState::NormalWorld => write!(f, "normal world"),
            ScreenState::PhoneMenu => write!(f, "phone menu"),
            ScreenState::Guide(Some(tab)) => write!(f, "guide ({})", tab),
            ScreenState::Guide(None) => write!(f, "guide"),
            ScreenState::Battle => write!(f, "battle"),
            ScreenState::BattleFail => write!(f, "battle fail"),
            ScreenState::EmptyToClose => write!(f, "empty to close"),
            ScreenState::SimUniBless => write!(f, "sim uni bless"),
            ScreenState::SimUniEvent => write!(f, "sim uni event"),
            ScreenState::ChallengeComplete => write!(f, "challenge complete"),
            ScreenState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Check the candidates in order against the round's screenshot and
/// return the first one present, or `Unknown`.
pub fn resolve(round: &mut Round<'_>, candidates: &[ScreenState]) -> Result<ScreenState> {
    for candidate in candidates {
        let Some((screen, name)) = candidate.marker() else {
            continue;
        };
        let area = round.ctx.area(screen, name)?;
        if find_area(round, &area)? == FindArea::NotFound {
            continue;
        }
        return Ok(match candidate {
            ScreenState::Guide(_) => ScreenState::Guide(guide_tab(round)?),
            other => other.clone(),
        });
    }
    Ok(ScreenState::Unknown)
}

/// Text of the selected guide tab, if any.
pub fn guide_tab(round: &mut Round<'_>) -> Result<Option<String>> {
    let area = round.ctx.area("guide", "current_tab")?;
    let frame = round.screenshot()?;
    let line = round.ctx.ocr.recognize_line(&frame, area.rect)?;
    let line = line.trim();
    Ok(if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    })
}
