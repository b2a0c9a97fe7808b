use tracing::info;

use astral_core::types::OcrItem;
use astral_engine::area::{find_area, round_by_find_and_click_area, FindArea};
use astral_engine::text::best_match;
use astral_engine::{Context, Edge, Node, Operation, Round, RoundResult};

use super::{ocr_area, RETRY_WAIT};
use crate::screen_state::{resolve, ScreenState};

/// Rounds the bless screen may linger after confirming before it is
/// treated as a fresh choice.
const BLESS_LINGER_ROUNDS: u32 = 3;

/// Pick a Simulated Universe blessing by priority.
///
/// When no card matches the priority list the cards are re-rolled once;
/// after that the leftmost card is taken.
#[derive(Debug)]
pub struct SimUniChooseBless {
    priority: Vec<String>,
    reset_used: bool,
    chosen: Option<String>,
}

impl SimUniChooseBless {
    pub fn new(priority: Vec<String>) -> Self {
        Self {
            priority,
            reset_used: false,
            chosen: None,
        }
    }

    fn pick<'a>(&self, cards: &'a [OcrItem], min_ratio: f64) -> Option<&'a OcrItem> {
        self.priority
            .iter()
            .find_map(|name| best_match(cards, name, min_ratio))
    }

    fn choose(&mut self, round: &mut Round<'_>) -> RoundResult {
        let min_ratio = match round.ctx.area("sim_uni", "bless_cards") {
            Ok(area) => area.lcs_percent,
            Err(e) => return RoundResult::from_error(&e),
        };
        let cards = match ocr_area(round, "sim_uni", "bless_cards") {
            Ok(items) => items,
            Err(e) => return RoundResult::from_error(&e),
        };
        let Some(leftmost) = cards.iter().min_by_key(|c| c.rect.x1) else {
            return RoundResult::retry("no blessing cards").with_wait(RETRY_WAIT);
        };

        let card = match self.pick(&cards, min_ratio) {
            Some(card) => card,
            None if !self.reset_used && !self.priority.is_empty() => {
                let reset = match round.ctx.area("sim_uni", "bless_reset") {
                    Ok(area) => area,
                    Err(e) => return RoundResult::from_error(&e),
                };
                match find_area(round, &reset) {
                    Ok(FindArea::Found(at)) => {
                        self.reset_used = true;
                        info!("No preferred blessing, resetting cards");
                        return match round.ctx.click(at) {
                            Ok(()) => RoundResult::wait(RETRY_WAIT),
                            Err(e) => RoundResult::from_error(&e),
                        };
                    }
                    Ok(FindArea::NotFound) => leftmost,
                    Err(e) => return RoundResult::from_error(&e),
                }
            }
            None => leftmost,
        };

        info!(blessing = %card.text, "Choosing blessing");
        self.chosen = Some(card.text.clone());
        match round.ctx.click(card.rect.center()) {
            Ok(()) => RoundResult::success_with("card chosen").with_wait_secs(0.5),
            Err(e) => RoundResult::from_error(&e),
        }
    }

    fn confirm(&mut self, round: &mut Round<'_>) -> RoundResult {
        round_by_find_and_click_area(round, "sim_uni", "bless_confirm", RETRY_WAIT, RETRY_WAIT)
    }

    fn check(&mut self, round: &mut Round<'_>) -> RoundResult {
        match resolve(round, &[ScreenState::SimUniBless]) {
            Ok(ScreenState::SimUniBless) if round.attempt() < BLESS_LINGER_ROUNDS => {
                RoundResult::wait(RETRY_WAIT)
            }
            Ok(ScreenState::SimUniBless) => {
                self.reset_used = false;
                RoundResult::success_with("bless again")
            }
            Ok(_) => {
                let chosen = self.chosen.clone().unwrap_or_default();
                RoundResult::success_with("bless chosen").with_data(serde_json::json!(chosen))
            }
            Err(e) => RoundResult::from_error(&e),
        }
    }
}

impl Operation for SimUniChooseBless {
    fn name(&self) -> String {
        "sim_uni_choose_bless".into()
    }

    fn nodes(&self) -> Vec<Node<Self>> {
        vec![
            Node::new("choose", Self::choose).start().with_max_retries(5),
            Node::new("confirm", Self::confirm).with_max_retries(5),
            Node::new("check", Self::check),
        ]
    }

    fn edges(&self) -> Vec<Edge> {
        vec![
            Edge::on_success("choose", "confirm"),
            Edge::on_success("confirm", "check"),
            Edge::on_success("check", "choose").when("bless again"),
        ]
    }

    fn handle_init(&mut self, _ctx: &mut Context) -> Option<RoundResult> {
        self.reset_used = false;
        self.chosen = None;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use astral_core::types::{InputAction, Point, Rect};
    use astral_test_utils::ScreenContent;

    use crate::test_support::{areas_content, test_ctx};

    fn bless_screen(cards: &[&str]) -> ScreenContent {
        let mut content = areas_content(&[
            ("sim_uni", "bless_title"),
            ("sim_uni", "bless_reset"),
            ("sim_uni", "bless_confirm"),
        ]);
        for (i, card) in cards.iter().enumerate() {
            let x = 300 + 500 * i as i32;
            content = content.text(card, Rect::new(x, 400, x + 300, 440));
        }
        content
    }

    fn leave_on_confirm(game: &astral_test_utils::FakeGame, after_reset: ScreenContent) {
        game.on_action(move |action, screen| {
            if let InputAction::Click { at } = action {
                if *at == Point::new(1697, 980) {
                    *screen = ScreenContent::new();
                } else if *at == Point::new(1310, 980) {
                    *screen = after_reset.clone();
                }
            }
        });
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_priority_beats_position() {
        let (mut ctx, game, _) = test_ctx();
        game.show(bless_screen(&["Alarm Bell", "Outrage", "Dogma"]));
        leave_on_confirm(&game, ScreenContent::new());
        let result = ctx.run(SimUniChooseBless::new(names(&["Dogma", "Outrage"])));
        assert!(result.success);
        assert_eq!(result.data_as::<String>().as_deref(), Some("Dogma"));
        assert_eq!(game.clicks()[0], Point::new(1450, 420));
    }

    #[test]
    fn test_reset_once_then_leftmost() {
        let (mut ctx, game, _) = test_ctx();
        game.show(bless_screen(&["Alarm Bell", "Outrage"]));
        leave_on_confirm(&game, bless_screen(&["Chilling Hand", "Anchor"]));
        let result = ctx.run(SimUniChooseBless::new(names(&["Dogma"])));
        assert!(result.success);
        assert_eq!(result.data_as::<String>().as_deref(), Some("Chilling Hand"));
        let clicks = game.clicks();
        assert_eq!(clicks[0], Point::new(1310, 980));
        assert_eq!(clicks[1], Point::new(450, 420));
    }

    #[test]
    fn test_waits_while_screen_lingers() {
        let (mut ctx, game, clock) = test_ctx();
        game.show(bless_screen(&["Alarm Bell"]));
        let mut confirmed = 0;
        game.on_action(move |action, screen| {
            if let InputAction::Click { at } = action {
                if *at == Point::new(1697, 980) {
                    confirmed += 1;
                    if confirmed == 2 {
                        *screen = ScreenContent::new();
                    }
                }
            }
        });
        let result = ctx.run(SimUniChooseBless::new(Vec::new()));
        assert!(result.success);
        // Lingered two rounds, then chose again.
        assert_eq!(game.clicks().len(), 4);
        assert!(clock.0.elapsed() >= std::time::Duration::from_secs(2));
    }
}
