//! Interastral Guide navigation.

use std::time::Duration;

use tracing::info;

use astral_engine::area::round_by_ocr_and_click;
use astral_engine::text::fuzzy_match;
use astral_engine::{Edge, Node, Operation, Round, RoundResult};

use super::{ocr_line, RETRY_WAIT};
use crate::parse::{parse_immersifiers, parse_power};
use crate::plan::PowerBudget;
use crate::screen_state::{guide_tab, resolve, ScreenState};

/// Tab that shows both counters and the repeatable missions.
pub const SURVIVAL_INDEX: &str = "Survival Index";

/// Open the guide with its hotkey.
#[derive(Debug, Default)]
pub struct GuideOpen;

impl GuideOpen {
    pub fn new() -> Self {
        Self
    }

    fn open(&mut self, round: &mut Round<'_>) -> RoundResult {
        match resolve(round, &[ScreenState::Guide(None)]) {
            Ok(ScreenState::Guide(_)) => return RoundResult::success_with("guide opened"),
            Ok(_) => {}
            Err(e) => return RoundResult::from_error(&e),
        }
        let key = round.ctx.config.game.key_guide.clone();
        match round.ctx.press(&key) {
            Ok(()) => RoundResult::retry("guide not open").with_wait(RETRY_WAIT),
            Err(e) => RoundResult::from_error(&e),
        }
    }
}

impl Operation for GuideOpen {
    fn name(&self) -> String {
        "guide_open".into()
    }

    fn nodes(&self) -> Vec<Node<Self>> {
        vec![Node::new("open", Self::open).start().with_max_retries(5)]
    }
}

/// Select a guide tab by its label.
#[derive(Debug)]
pub struct GuideChooseTab {
    tab: String,
}

impl GuideChooseTab {
    pub fn new(tab: impl Into<String>) -> Self {
        Self { tab: tab.into() }
    }

    fn is_selected(&self, round: &mut Round<'_>) -> astral_core::Result<bool> {
        Ok(guide_tab(round)?
            .map(|current| fuzzy_match(&self.tab, &current, 0.8))
            .unwrap_or(false))
    }

    fn click(&mut self, round: &mut Round<'_>) -> RoundResult {
        match self.is_selected(round) {
            Ok(true) => return RoundResult::success_with("already selected"),
            Ok(false) => {}
            Err(e) => return RoundResult::from_error(&e),
        }
        let tab = self.tab.clone();
        round_by_ocr_and_click(round, "guide", "tab_list", &tab, RETRY_WAIT, RETRY_WAIT)
    }

    fn confirm(&mut self, round: &mut Round<'_>) -> RoundResult {
        match self.is_selected(round) {
            Ok(true) => RoundResult::success_with(self.tab.clone()),
            Ok(false) => RoundResult::retry(format!("tab {} not selected", self.tab))
                .with_wait(RETRY_WAIT),
            Err(e) => RoundResult::from_error(&e),
        }
    }
}

impl Operation for GuideChooseTab {
    fn name(&self) -> String {
        format!("guide_choose_tab({})", self.tab)
    }

    fn nodes(&self) -> Vec<Node<Self>> {
        vec![
            Node::new("click", Self::click).start().with_max_retries(5),
            Node::new("confirm", Self::confirm).with_max_retries(5),
        ]
    }

    fn edges(&self) -> Vec<Edge> {
        vec![Edge::on_success("click", "confirm")]
    }
}

/// Read Trailblaze Power and immersifiers from the guide header.
///
/// Succeeds with a [`PowerBudget`] payload.
#[derive(Debug)]
pub struct GuideCheckPower {
    tab: String,
}

impl Default for GuideCheckPower {
    fn default() -> Self {
        Self::new()
    }
}

impl GuideCheckPower {
    pub fn new() -> Self {
        Self {
            tab: SURVIVAL_INDEX.to_string(),
        }
    }

    fn open(&mut self, round: &mut Round<'_>) -> RoundResult {
        RoundResult::by_op_result(&round.run(GuideOpen::new()))
    }

    fn tab(&mut self, round: &mut Round<'_>) -> RoundResult {
        RoundResult::by_op_result(&round.run(GuideChooseTab::new(self.tab.clone())))
    }

    fn read(&mut self, round: &mut Round<'_>) -> RoundResult {
        let power = match ocr_line(round, "guide", "power") {
            Ok(text) => parse_power(&text),
            Err(e) => return RoundResult::from_error(&e),
        };
        let qty = match ocr_line(round, "guide", "immersifier") {
            Ok(text) => parse_immersifiers(&text),
            Err(e) => return RoundResult::from_error(&e),
        };
        let (Some(power), Some(qty)) = (power, qty) else {
            return RoundResult::retry("power and immersifiers unreadable")
                .with_wait(Duration::from_millis(500));
        };
        info!(power, qty, "Checked Trailblaze Power");
        match serde_json::to_value(PowerBudget::new(power, qty)) {
            Ok(data) => RoundResult::success_with("power checked").with_data(data),
            Err(e) => RoundResult::fail(e.to_string()),
        }
    }
}

impl Operation for GuideCheckPower {
    fn name(&self) -> String {
        "guide_check_power".into()
    }

    fn nodes(&self) -> Vec<Node<Self>> {
        vec![
            Node::new("open", Self::open).start(),
            Node::new("tab", Self::tab),
            Node::new("read", Self::read).with_max_retries(5),
        ]
    }

    fn edges(&self) -> Vec<Edge> {
        vec![
            Edge::on_success("open", "tab"),
            Edge::on_success("tab", "read"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use astral_core::types::{InputAction, Rect};
    use astral_test_utils::ScreenContent;

    use crate::test_support::{areas_content, test_ctx};

    fn guide(tab: &str) -> ScreenContent {
        areas_content(&[("guide", "title")]).text(tab, Rect::new(460, 30, 700, 70))
    }

    #[test]
    fn test_open_presses_hotkey_until_visible() {
        let (mut ctx, game, _) = test_ctx();
        game.queue([ScreenContent::new(), guide("Daily Training")]);
        let result = ctx.run(GuideOpen::new());
        assert!(result.success);
        assert_eq!(game.keys(), vec!["f4".to_string()]);
    }

    #[test]
    fn test_open_gives_up() {
        let (mut ctx, game, _) = test_ctx();
        let result = ctx.run(GuideOpen::new());
        assert!(!result.success);
        assert!(result.status_is("guide not open"));
        assert_eq!(game.keys().len(), 5);
    }

    #[test]
    fn test_choose_tab_clicks_label() {
        let (mut ctx, game, _) = test_ctx();
        game.show(
            guide("Daily Training")
                .text("Daily Training", Rect::new(300, 140, 500, 190))
                .text("Survival Index", Rect::new(700, 140, 900, 190)),
        );
        game.on_action(|action, screen| {
            if let InputAction::Click { .. } = action {
                *screen = guide("Survival Index");
            }
        });
        let result = ctx.run(GuideChooseTab::new("Survival Index"));
        assert!(result.success);
        assert!(result.status_is("Survival Index"));
        assert_eq!(game.clicks().len(), 1);
        assert_eq!(game.clicks()[0].y, 165);
    }

    #[test]
    fn test_check_power_tolerates_ocr_noise() {
        let (mut ctx, game, _) = test_ctx();
        game.show(
            guide("Survival Index")
                .text("1201300", Rect::new(1400, 50, 1560, 90))
                .text("3/12", Rect::new(1180, 50, 1340, 90)),
        );
        let result = ctx.run(GuideCheckPower::new());
        assert!(result.success);
        assert_eq!(result.data_as::<PowerBudget>(), Some(PowerBudget::new(120, 3)));
        assert!(game.actions().is_empty());
    }

    #[test]
    fn test_check_power_retries_unreadable() {
        let (mut ctx, game, _) = test_ctx();
        game.show(guide("Survival Index").text("3/12", Rect::new(1180, 50, 1340, 90)));
        let result = ctx.run(GuideCheckPower::new());
        assert!(!result.success);
        assert!(result.status_is("power and immersifiers unreadable"));
    }
}
