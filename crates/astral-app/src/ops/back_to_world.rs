use tracing::debug;

use astral_engine::{Node, Operation, Round, RoundResult};

use super::RETRY_WAIT;
use crate::screen_state::{resolve, ScreenState};

const CANDIDATES: [ScreenState; 7] = [
    ScreenState::NormalWorld,
    ScreenState::Battle,
    ScreenState::BattleFail,
    ScreenState::ChallengeComplete,
    ScreenState::EmptyToClose,
    ScreenState::PhoneMenu,
    ScreenState::Guide(None),
];

/// Return to the open world from whatever screen is showing.
///
/// Dialogs and result screens are closed, menus are escaped, battles are
/// waited out. An unrecognised screen is treated like a menu.
#[derive(Debug, Default)]
pub struct BackToWorld;

impl BackToWorld {
    pub fn new() -> Self {
        Self
    }

    fn check(&mut self, round: &mut Round<'_>) -> RoundResult {
        let state = match resolve(round, &CANDIDATES) {
            Ok(s) => s,
            Err(e) => return RoundResult::from_error(&e),
        };
        debug!(state = %state, "Back to world check");
        let acted = match &state {
            ScreenState::NormalWorld => return RoundResult::success_with("normal world"),
            ScreenState::Battle => return RoundResult::wait(RETRY_WAIT),
            ScreenState::BattleFail => click_area(round, "battle_fail", "exit"),
            ScreenState::ChallengeComplete => click_area(round, "challenge_complete", "exit"),
            ScreenState::EmptyToClose => click_area(round, "dialog", "empty_to_close"),
            ScreenState::PhoneMenu
            | ScreenState::Guide(_)
            | ScreenState::SimUniBless
            | ScreenState::SimUniEvent
            | ScreenState::Unknown => {
                let key = round.ctx.config.game.key_esc.clone();
                round.ctx.press(&key)
            }
        };
        match acted {
            Ok(()) => RoundResult::retry(format!("left {}", state)).with_wait(RETRY_WAIT),
            Err(e) => RoundResult::from_error(&e),
        }
    }
}

fn click_area(round: &mut Round<'_>, screen: &str, area: &str) -> astral_core::Result<()> {
    let area = round.ctx.area(screen, area)?;
    round.ctx.click(area.center())
}

impl Operation for BackToWorld {
    fn name(&self) -> String {
        "back_to_world".into()
    }

    fn nodes(&self) -> Vec<Node<Self>> {
        vec![Node::new("check", Self::check).start().with_max_retries(20)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use astral_core::types::{InputAction, Point};
    use astral_test_utils::ScreenContent;

    use crate::test_support::{areas_content, test_ctx};

    #[test]
    fn test_already_in_world() {
        let (mut ctx, game, _) = test_ctx();
        game.show(areas_content(&[("world", "menu_icon")]));
        let result = ctx.run(BackToWorld::new());
        assert!(result.success);
        assert!(result.status_is("normal world"));
        assert!(game.actions().is_empty());
    }

    #[test]
    fn test_escapes_menus_and_closes_dialogs() {
        let (mut ctx, game, _) = test_ctx();
        game.queue([
            areas_content(&[("guide", "title")]),
            areas_content(&[("dialog", "empty_to_close")]),
            ScreenContent::new(),
            areas_content(&[("world", "menu_icon")]),
        ]);
        let result = ctx.run(BackToWorld::new());
        assert!(result.success);
        assert_eq!(
            game.actions(),
            vec![
                InputAction::key("esc"),
                InputAction::click(Point::new(960, 1015)),
                InputAction::key("esc"),
            ]
        );
    }

    #[test]
    fn test_battle_is_waited_out() {
        let (mut ctx, game, clock) = test_ctx();
        let mut screens = vec![areas_content(&[("battle", "pause_icon")]); 30];
        screens.push(areas_content(&[("world", "menu_icon")]));
        game.queue(screens);
        let result = ctx.run(BackToWorld::new());
        // Thirty battle rounds exceed the retry budget but waits are free.
        assert!(result.success);
        assert!(game.actions().is_empty());
        assert_eq!(clock.0.elapsed().as_secs(), 30);
    }
}
