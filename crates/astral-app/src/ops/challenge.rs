//! Normal power-spending missions.

use std::time::Duration;

use tracing::info;

use astral_core::config::MissionConfig;
use astral_engine::area::{find_area, round_by_find_and_click_area, FindArea};
use astral_engine::{Context, Edge, Node, Operation, Round, RoundResult};

use super::team::prepare_team;
use super::transport::enter_mission;
use super::{ocr_line, RETRY_WAIT, SCREEN_CHANGE_WAIT};
use crate::mission::max_batch;
use crate::parse::positive_digits;
use crate::plan::PowerBudget;
use crate::screen_state::{resolve, ScreenState};

/// Most repeats the challenge selector allows.
pub const MAX_CHALLENGE_TIMES: u32 = 6;

/// Pause between repeated clicks on the same button.
const CLICK_INTERVAL: Duration = Duration::from_millis(200);

/// Set the repeat-count selector on the mission screen.
#[derive(Debug)]
pub struct ChooseChallengeTimes {
    times: u32,
}

impl ChooseChallengeTimes {
    pub fn new(times: u32) -> Self {
        Self {
            times: times.clamp(1, MAX_CHALLENGE_TIMES),
        }
    }

    fn click_repeatedly(&self, round: &mut Round<'_>, area: &str, clicks: u32) -> RoundResult {
        let area = match round.ctx.area("mission", area) {
            Ok(a) => a,
            Err(e) => return RoundResult::from_error(&e),
        };
        match find_area(round, &area) {
            Ok(FindArea::Found(at)) => {
                for _ in 0..clicks {
                    if let Err(e) = round.ctx.click(at) {
                        return RoundResult::from_error(&e);
                    }
                    round.ctx.sleep(CLICK_INTERVAL);
                }
                RoundResult::success_with(format!("{} times", self.times))
            }
            Ok(FindArea::NotFound) => {
                RoundResult::retry("times selector not found").with_wait(RETRY_WAIT)
            }
            Err(e) => RoundResult::from_error(&e),
        }
    }

    fn choose(&mut self, round: &mut Round<'_>) -> RoundResult {
        let current = match ocr_line(round, "mission", "times_value") {
            Ok(text) => positive_digits(&text).unwrap_or(0),
            Err(e) => return RoundResult::from_error(&e),
        };
        // Zero means the screen has not finished loading.
        if current == 0 {
            return RoundResult::retry("challenge times not loaded")
                .with_wait(Duration::from_millis(500));
        }
        if current == self.times {
            return RoundResult::success_with(format!("{} times", self.times));
        }
        if current < self.times {
            self.click_repeatedly(round, "times_plus", self.times - current)
        } else {
            self.click_repeatedly(round, "times_minus", current - self.times)
        }
    }
}

impl Operation for ChooseChallengeTimes {
    fn name(&self) -> String {
        format!("choose_challenge_times({})", self.times)
    }

    fn nodes(&self) -> Vec<Node<Self>> {
        vec![Node::new("choose", Self::choose).start().with_max_retries(5)]
    }
}

/// One confirmed batch of a normal mission.
///
/// Teleports, sets the repeat count, fights and claims. Succeeds with a
/// [`UnitReport`](crate::plan::UnitReport) payload describing what the
/// batch completed and cost.
#[derive(Debug)]
pub struct ChallengeMission {
    mission: MissionConfig,
    runs: u32,
    team_num: u32,
    support: Option<String>,
    need_transport: bool,
    budget: PowerBudget,
}

impl ChallengeMission {
    pub fn new(mission: MissionConfig, runs: u32, budget: PowerBudget) -> Self {
        let runs = runs.clamp(1, max_batch(&mission.kind));
        Self {
            mission,
            runs,
            team_num: 1,
            support: None,
            need_transport: true,
            budget,
        }
    }

    pub fn with_team(mut self, team_num: u32, support: Option<String>) -> Self {
        self.team_num = team_num;
        self.support = support;
        self
    }

    /// Reopen the mission where the character stands instead of teleporting.
    pub fn without_transport(mut self) -> Self {
        self.need_transport = false;
        self
    }

    pub fn runs(&self) -> u32 {
        self.runs
    }

    fn transport(&mut self, round: &mut Round<'_>) -> RoundResult {
        enter_mission(round, &self.mission, self.need_transport)
    }

    fn times(&mut self, round: &mut Round<'_>) -> RoundResult {
        if max_batch(&self.mission.kind) <= 1 {
            return RoundResult::success_with("single run");
        }
        RoundResult::by_op_result(&round.run(ChooseChallengeTimes::new(self.runs)))
    }

    fn challenge(&mut self, round: &mut Round<'_>) -> RoundResult {
        round_by_find_and_click_area(round, "mission", "challenge", SCREEN_CHANGE_WAIT, RETRY_WAIT)
    }

    fn team(&mut self, round: &mut Round<'_>) -> RoundResult {
        prepare_team(round, self.team_num, self.support.as_deref())
    }

    fn start(&mut self, round: &mut Round<'_>) -> RoundResult {
        info!(mission = %self.mission.id, team = self.team_num, "Starting battle");
        round_by_find_and_click_area(round, "team", "start", SCREEN_CHANGE_WAIT, RETRY_WAIT)
    }

    fn battle(&mut self, round: &mut Round<'_>) -> RoundResult {
        let candidates = [
            ScreenState::ChallengeComplete,
            ScreenState::BattleFail,
            ScreenState::Battle,
        ];
        match resolve(round, &candidates) {
            Ok(ScreenState::ChallengeComplete) => RoundResult::success_with("challenge complete"),
            Ok(ScreenState::BattleFail) => RoundResult::fail("battle failed"),
            Ok(_) => RoundResult::wait(RETRY_WAIT),
            Err(e) => RoundResult::from_error(&e),
        }
    }

    fn claim(&mut self, round: &mut Round<'_>) -> RoundResult {
        let report = self.budget.quote(&self.mission.kind, self.runs);
        let clicked = round_by_find_and_click_area(
            round,
            "challenge_complete",
            "exit",
            SCREEN_CHANGE_WAIT,
            RETRY_WAIT,
        );
        if !clicked.is_success() {
            return clicked;
        }
        info!(
            mission = %self.mission.id,
            runs = report.runs,
            power_used = report.power_used,
            "Challenge completed"
        );
        match serde_json::to_value(report) {
            Ok(data) => clicked.with_status("challenge complete").with_data(data),
            Err(e) => RoundResult::fail(e.to_string()),
        }
    }
}

impl Operation for ChallengeMission {
    fn name(&self) -> String {
        format!("challenge_mission({} x{})", self.mission.id, self.runs)
    }

    fn nodes(&self) -> Vec<Node<Self>> {
        vec![
            Node::new("transport", Self::transport).start(),
            Node::new("times", Self::times),
            Node::new("challenge", Self::challenge).with_max_retries(10),
            Node::new("team", Self::team),
            Node::new("start", Self::start).with_max_retries(10),
            Node::new("battle", Self::battle).with_max_retries(5),
            Node::new("claim", Self::claim).with_max_retries(5),
        ]
    }

    fn edges(&self) -> Vec<Edge> {
        vec![
            Edge::on_success("transport", "times"),
            Edge::on_success("times", "challenge"),
            Edge::on_success("challenge", "team"),
            Edge::on_success("team", "start"),
            Edge::on_success("start", "battle"),
            Edge::on_success("battle", "claim"),
        ]
    }

    fn handle_init(&mut self, _ctx: &mut Context) -> Option<RoundResult> {
        if self.budget.runs_possible(&self.mission.kind) < self.runs {
            return Some(RoundResult::fail("not enough power"));
        }
        None
    }

    /// Battles are waited on without a retry budget; this bounds them.
    fn timeout(&self) -> Option<Duration> {
        Some(Duration::from_secs(600 * u64::from(self.runs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use astral_core::config::MissionKind;
    use astral_core::types::{InputAction, Point, Rect};
    use astral_test_utils::ScreenContent;

    use crate::plan::UnitReport;
    use crate::test_support::{areas_content, team_screen, test_ctx};

    fn times_screen(value: &str) -> ScreenContent {
        areas_content(&[
            ("mission", "challenge"),
            ("mission", "times_plus"),
            ("mission", "times_minus"),
        ])
        .text(value, Rect::new(1620, 875, 1680, 915))
    }

    fn calyx() -> MissionConfig {
        MissionConfig {
            id: "calyx_gold_memory".into(),
            name: "Bud of Memories".into(),
            tab: "Survival Index".into(),
            category: "Calyx (Golden)".into(),
            region: None,
            kind: MissionKind::Calyx { power: 10 },
        }
    }

    #[test]
    fn test_times_plus_clicks_difference() {
        let (mut ctx, game, _) = test_ctx();
        game.show(times_screen("1"));
        let result = ctx.run(ChooseChallengeTimes::new(4));
        assert!(result.success);
        assert_eq!(game.clicks(), vec![Point::new(1770, 895); 3]);
    }

    #[test]
    fn test_times_minus_and_clamp() {
        let (mut ctx, game, _) = test_ctx();
        game.show(times_screen("6"));
        let result = ctx.run(ChooseChallengeTimes::new(0));
        assert!(result.success);
        assert!(result.status_is("1 times"));
        assert_eq!(game.clicks(), vec![Point::new(1530, 895); 5]);
    }

    #[test]
    fn test_times_zero_waits_for_screen() {
        let (mut ctx, game, _) = test_ctx();
        game.queue([times_screen("0"), times_screen("3")]);
        let result = ctx.run(ChooseChallengeTimes::new(3));
        assert!(result.success);
        assert!(game.clicks().is_empty());
    }

    /// Interacting opens the mission; the buttons lead through one battle.
    fn scripted_battle(game: &astral_test_utils::FakeGame, fail: bool) {
        game.on_action(move |action, screen| {
            let at = match action {
                InputAction::Key { key } if key == "f" => {
                    *screen = times_screen("1");
                    return;
                }
                InputAction::Click { at } => *at,
                _ => return,
            };
            // Challenge button, then Start Battle on the same spot.
            if at.y == 995 && screen.texts.iter().any(|t| t.text == "Challenge") {
                *screen = team_screen(1);
            } else if at.y == 995 {
                *screen = if fail {
                    areas_content(&[("battle_fail", "title")])
                } else {
                    areas_content(&[("challenge_complete", "title"), ("challenge_complete", "exit")])
                };
            } else if at.y == 940 {
                *screen = areas_content(&[("world", "menu_icon")]);
            }
        });
    }

    #[test]
    fn test_challenge_reports_unit() {
        let (mut ctx, game, _) = test_ctx();
        game.show(times_screen("3"));
        scripted_battle(&game, false);
        let op = ChallengeMission::new(calyx(), 3, PowerBudget::new(35, 0)).without_transport();
        let result = ctx.run(op);
        assert!(result.success, "{:?}", result);
        assert_eq!(
            result.data_as::<UnitReport>(),
            Some(UnitReport { runs: 3, power_used: 30, qty_used: 0 })
        );
    }

    #[test]
    fn test_challenge_uses_plan_team_and_support() {
        let (mut ctx, game, _) = test_ctx();
        game.show(times_screen("1"));
        game.on_action(|action, screen| {
            let InputAction::Click { at } = action else {
                return;
            };
            match (at.x, at.y) {
                (1690, 995) if screen.texts.iter().any(|t| t.text == "Challenge") => {
                    *screen = team_screen(1);
                }
                (871, 70) => *screen = team_screen(4),
                (230, 895) => {
                    *screen = areas_content(&[("support", "join")])
                        .text("Bronya", Rect::new(100, 200, 400, 240));
                }
                (1290, 995) => *screen = team_screen(4),
                (1690, 995) => {
                    *screen = areas_content(&[
                        ("challenge_complete", "title"),
                        ("challenge_complete", "exit"),
                    ]);
                }
                _ => {}
            }
        });
        let op = ChallengeMission::new(calyx(), 1, PowerBudget::new(10, 0))
            .with_team(4, Some("Bronya".into()))
            .without_transport();
        let result = ctx.run(op);
        assert!(result.success, "{:?}", result);
        assert_eq!(
            game.clicks(),
            vec![
                Point::new(1690, 995),
                Point::new(871, 70),
                Point::new(230, 895),
                Point::new(250, 220),
                Point::new(1290, 995),
                Point::new(1690, 995),
                Point::new(730, 940),
            ]
        );
    }

    #[test]
    fn test_without_transport_reopens_mission_by_interacting() {
        let (mut ctx, game, _) = test_ctx();
        game.show(areas_content(&[("world", "menu_icon")]));
        scripted_battle(&game, false);
        let op = ChallengeMission::new(calyx(), 1, PowerBudget::new(10, 0)).without_transport();
        let result = ctx.run(op);
        assert!(result.success, "{:?}", result);
        assert_eq!(game.keys(), vec!["f"]);
    }

    #[test]
    fn test_challenge_battle_failed() {
        let (mut ctx, game, _) = test_ctx();
        game.show(times_screen("1"));
        scripted_battle(&game, true);
        let op = ChallengeMission::new(calyx(), 1, PowerBudget::new(10, 0)).without_transport();
        let result = ctx.run(op);
        assert!(!result.success);
        assert!(result.status_is("battle failed"));
        assert!(result.data.is_none());
    }

    #[test]
    fn test_challenge_refuses_unaffordable_batch() {
        let (mut ctx, game, _) = test_ctx();
        let op = ChallengeMission::new(calyx(), 3, PowerBudget::new(20, 0));
        let result = ctx.run(op);
        assert!(result.status_is("not enough power"));
        assert!(game.actions().is_empty());
    }
}
