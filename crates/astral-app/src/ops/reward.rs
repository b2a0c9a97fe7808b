//! Immersion reward runs: Simulated Universe and Ornament Extraction.
//!
//! Each run ends with exactly one reward claim, paid with an immersifier
//! when one is left and with Trailblaze Power otherwise.

use std::time::Duration;

use tracing::{info, warn};

use astral_core::config::MissionConfig;
use astral_engine::area::{find_area, round_by_find_and_click_area, FindArea};
use astral_engine::{Context, Edge, Node, Operation, Round, RoundResult};

use super::movement::{MoveInteract, MoveWithoutPos, STATUS_PAUSE_INTERRUPTED};
use super::sim_uni::SimUniChooseBless;
use super::team::prepare_team;
use super::transport::enter_mission;
use super::{ocr_area, RETRY_WAIT, SCREEN_CHANGE_WAIT};
use crate::plan::{PowerBudget, UnitReport};
use crate::screen_state::{resolve, ScreenState};

/// Interaction prompt on the Simulated Universe reward chest.
pub const SIM_UNI_REWARD_PROMPT: &str = "Claim Immersion Reward";

/// Click the paying button on the reward screen and report the spend.
fn claim_reward(
    round: &mut Round<'_>,
    mission: &MissionConfig,
    budget: &PowerBudget,
    report: &mut Option<UnitReport>,
) -> RoundResult {
    let quote = budget.quote(&mission.kind, 1);
    let button = if quote.qty_used > 0 {
        "use_immersifier"
    } else {
        "use_power"
    };
    let result = round_by_find_and_click_area(round, "reward", button, SCREEN_CHANGE_WAIT, RETRY_WAIT);
    if result.is_success() {
        info!(
            mission = %mission.id,
            power_used = quote.power_used,
            qty_used = quote.qty_used,
            "Immersion reward claimed"
        );
        *report = Some(quote);
    }
    result
}

/// Leave the reward screen and hand the claim's report to the caller.
fn leave_reward(round: &mut Round<'_>, report: Option<UnitReport>) -> RoundResult {
    let Some(report) = report else {
        return RoundResult::fail("no reward claimed");
    };
    let result = round_by_find_and_click_area(round, "reward", "leave", SCREEN_CHANGE_WAIT, RETRY_WAIT);
    if !result.is_success() {
        return result;
    }
    match serde_json::to_value(report) {
        Ok(data) => result.with_status("reward claimed").with_data(data),
        Err(e) => RoundResult::fail(e.to_string()),
    }
}

fn affordable(mission: &MissionConfig, budget: &PowerBudget) -> Option<RoundResult> {
    if budget.runs_possible(&mission.kind) == 0 {
        Some(RoundResult::fail("not enough power"))
    } else {
        None
    }
}

/// One Simulated Universe run up to its immersion reward.
#[derive(Debug)]
pub struct SimUniRun {
    mission: MissionConfig,
    budget: PowerBudget,
    bless_priority: Vec<String>,
    need_transport: bool,
    walked: bool,
    report: Option<UnitReport>,
}

impl SimUniRun {
    pub fn new(mission: MissionConfig, budget: PowerBudget) -> Self {
        Self {
            mission,
            budget,
            bless_priority: Vec::new(),
            need_transport: true,
            walked: false,
            report: None,
        }
    }

    pub fn with_bless_priority(mut self, priority: Vec<String>) -> Self {
        self.bless_priority = priority;
        self
    }

    /// Reopen the Simulated Universe where the character stands instead of
    /// teleporting.
    pub fn without_transport(mut self) -> Self {
        self.need_transport = false;
        self
    }

    fn transport(&mut self, round: &mut Round<'_>) -> RoundResult {
        enter_mission(round, &self.mission, self.need_transport)
    }

    fn start(&mut self, round: &mut Round<'_>) -> RoundResult {
        round_by_find_and_click_area(round, "sim_uni", "start", SCREEN_CHANGE_WAIT, RETRY_WAIT)
    }

    fn explore(&mut self, round: &mut Round<'_>) -> RoundResult {
        let reward = match round.ctx.area("sim_uni", "reward_title") {
            Ok(area) => find_area(round, &area),
            Err(e) => Err(e),
        };
        match reward {
            Ok(FindArea::Found(_)) => return RoundResult::success_with("reward"),
            Ok(FindArea::NotFound) => {}
            Err(e) => return RoundResult::from_error(&e),
        }

        let candidates = [
            ScreenState::SimUniBless,
            ScreenState::SimUniEvent,
            ScreenState::Battle,
            ScreenState::NormalWorld,
        ];
        let state = match resolve(round, &candidates) {
            Ok(s) => s,
            Err(e) => return RoundResult::from_error(&e),
        };
        match state {
            ScreenState::SimUniBless => {
                let result = round.run(SimUniChooseBless::new(self.bless_priority.clone()));
                if !result.success {
                    return RoundResult::by_op_result(&result);
                }
                RoundResult::success_with("explore")
            }
            ScreenState::SimUniEvent => self.event(round),
            ScreenState::Battle => RoundResult::wait(RETRY_WAIT),
            ScreenState::NormalWorld if !self.walked => {
                let distance = round.ctx.config.sim_uni.level_walk_distance;
                let result = round.run(MoveWithoutPos::new(0.0, distance));
                if !result.success {
                    return RoundResult::by_op_result(&result);
                }
                // A paused walk is redone from scratch next round.
                self.walked = !result.status_is(STATUS_PAUSE_INTERRUPTED);
                RoundResult::success_with("explore")
            }
            ScreenState::NormalWorld => {
                let result = round.run(MoveInteract::new(SIM_UNI_REWARD_PROMPT));
                if !result.success {
                    return RoundResult::by_op_result(&result);
                }
                RoundResult::success_with("explore").with_wait(SCREEN_CHANGE_WAIT)
            }
            other => {
                warn!(state = %other, "Unexpected screen in Simulated Universe");
                RoundResult::retry(format!("unexpected screen: {}", other)).with_wait(RETRY_WAIT)
            }
        }
    }

    /// Take the first option of an event.
    fn event(&mut self, round: &mut Round<'_>) -> RoundResult {
        let options = match ocr_area(round, "sim_uni", "event_options") {
            Ok(items) => items,
            Err(e) => return RoundResult::from_error(&e),
        };
        let Some(first) = options.iter().min_by_key(|o| o.rect.y1) else {
            return RoundResult::retry("no event options").with_wait(RETRY_WAIT);
        };
        info!(option = %first.text, "Choosing event option");
        match round.ctx.click(first.rect.center()) {
            Ok(()) => RoundResult::success_with("explore").with_wait(RETRY_WAIT),
            Err(e) => RoundResult::from_error(&e),
        }
    }

    fn claim(&mut self, round: &mut Round<'_>) -> RoundResult {
        claim_reward(round, &self.mission, &self.budget, &mut self.report)
    }

    fn leave(&mut self, round: &mut Round<'_>) -> RoundResult {
        leave_reward(round, self.report)
    }
}

impl Operation for SimUniRun {
    fn name(&self) -> String {
        format!("sim_uni_run({})", self.mission.id)
    }

    fn nodes(&self) -> Vec<Node<Self>> {
        vec![
            Node::new("transport", Self::transport).start(),
            Node::new("start", Self::start).with_max_retries(10),
            Node::new("explore", Self::explore).with_max_retries(20),
            Node::new("claim", Self::claim).with_max_retries(5),
            Node::new("leave", Self::leave).with_max_retries(5),
        ]
    }

    fn edges(&self) -> Vec<Edge> {
        vec![
            Edge::on_success("transport", "start"),
            Edge::on_success("start", "explore"),
            Edge::self_loop("explore").when("explore"),
            Edge::on_success("explore", "claim").when("reward"),
            Edge::on_success("claim", "leave"),
        ]
    }

    fn handle_init(&mut self, _ctx: &mut Context) -> Option<RoundResult> {
        self.walked = false;
        self.report = None;
        affordable(&self.mission, &self.budget)
    }
}

/// One Ornament Extraction run up to its reward.
#[derive(Debug)]
pub struct OrnamentExtractionRun {
    mission: MissionConfig,
    budget: PowerBudget,
    team_num: u32,
    support: Option<String>,
    need_transport: bool,
    report: Option<UnitReport>,
}

impl OrnamentExtractionRun {
    pub fn new(mission: MissionConfig, budget: PowerBudget) -> Self {
        Self {
            mission,
            budget,
            team_num: 1,
            support: None,
            need_transport: true,
            report: None,
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

    fn transport(&mut self, round: &mut Round<'_>) -> RoundResult {
        enter_mission(round, &self.mission, self.need_transport)
    }

    fn challenge(&mut self, round: &mut Round<'_>) -> RoundResult {
        round_by_find_and_click_area(round, "mission", "challenge", SCREEN_CHANGE_WAIT, RETRY_WAIT)
    }

    fn team(&mut self, round: &mut Round<'_>) -> RoundResult {
        prepare_team(round, self.team_num, self.support.as_deref())
    }

    fn start(&mut self, round: &mut Round<'_>) -> RoundResult {
        info!(mission = %self.mission.id, team = self.team_num, "Starting extraction");
        round_by_find_and_click_area(round, "team", "start", SCREEN_CHANGE_WAIT, RETRY_WAIT)
    }

    fn battle(&mut self, round: &mut Round<'_>) -> RoundResult {
        let reward = match round.ctx.area("ornament", "reward_title") {
            Ok(area) => find_area(round, &area),
            Err(e) => Err(e),
        };
        match reward {
            Ok(FindArea::Found(_)) => return RoundResult::success_with("reward"),
            Ok(FindArea::NotFound) => {}
            Err(e) => return RoundResult::from_error(&e),
        }
        match resolve(round, &[ScreenState::BattleFail]) {
            Ok(ScreenState::BattleFail) => RoundResult::fail("battle failed"),
            Ok(_) => RoundResult::wait(RETRY_WAIT),
            Err(e) => RoundResult::from_error(&e),
        }
    }

    fn claim(&mut self, round: &mut Round<'_>) -> RoundResult {
        claim_reward(round, &self.mission, &self.budget, &mut self.report)
    }

    fn leave(&mut self, round: &mut Round<'_>) -> RoundResult {
        leave_reward(round, self.report)
    }
}

impl Operation for OrnamentExtractionRun {
    fn name(&self) -> String {
        format!("ornament_extraction_run({})", self.mission.id)
    }

    fn nodes(&self) -> Vec<Node<Self>> {
        vec![
            Node::new("transport", Self::transport).start(),
            Node::new("challenge", Self::challenge).with_max_retries(10),
            Node::new("team", Self::team),
            Node::new("start", Self::start).with_max_retries(10),
            Node::new("battle", Self::battle).with_max_retries(5),
            Node::new("claim", Self::claim).with_max_retries(5),
            Node::new("leave", Self::leave).with_max_retries(5),
        ]
    }

    fn edges(&self) -> Vec<Edge> {
        vec![
            Edge::on_success("transport", "challenge"),
            Edge::on_success("challenge", "team"),
            Edge::on_success("team", "start"),
            Edge::on_success("start", "battle"),
            Edge::on_success("battle", "claim"),
            Edge::on_success("claim", "leave"),
        ]
    }

    fn handle_init(&mut self, _ctx: &mut Context) -> Option<RoundResult> {
        self.report = None;
        affordable(&self.mission, &self.budget)
    }

    fn timeout(&self) -> Option<Duration> {
        Some(Duration::from_secs(1200))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use astral_core::config::MissionKind;
    use astral_core::types::{InputAction, Point, Rect};
    use astral_test_utils::{FakeGame, ScreenContent};

    use crate::test_support::{areas_content, team_screen, test_ctx};

    fn sim_uni() -> MissionConfig {
        MissionConfig {
            id: "su_world_8".into(),
            name: "Simulated Universe: World 8".into(),
            tab: "Survival Index".into(),
            category: "Simulated Universe".into(),
            region: None,
            kind: MissionKind::SimulatedUniverse { world: 8, power: 40 },
        }
    }

    fn ornament() -> MissionConfig {
        MissionConfig {
            id: "oe_sulfago".into(),
            name: "Divergent Universe: Sulfago".into(),
            tab: "Survival Index".into(),
            category: "Ornament Extraction".into(),
            region: None,
            kind: MissionKind::OrnamentExtraction { power: 40 },
        }
    }

    fn reward_screen(title: (&str, &str)) -> ScreenContent {
        areas_content(&[title, ("reward", "use_immersifier"), ("reward", "use_power")])
    }

    /// Paying buttons lead to the leave button, which returns to the world.
    fn on_reward_click(at: Point, screen: &mut ScreenContent) {
        if at == Point::new(730, 840) || at == Point::new(1190, 840) {
            *screen = areas_content(&[("reward", "leave")]);
        } else if at == Point::new(960, 995) {
            *screen = areas_content(&[("world", "menu_icon")]);
        }
    }

    fn script_sim_uni(game: &FakeGame) {
        game.show(areas_content(&[("sim_uni", "start")]));
        game.on_action(|action, screen| match action {
            InputAction::Click { at } if *at == Point::new(1690, 995) => {
                *screen = areas_content(&[("sim_uni", "event_title")])
                    .text("Offer a coin", Rect::new(1200, 400, 1700, 440))
                    .text("Walk away", Rect::new(1200, 600, 1700, 640));
            }
            InputAction::Click { at } if *at == Point::new(1450, 420) => {
                *screen = areas_content(&[("world", "menu_icon")])
                    .text(SIM_UNI_REWARD_PROMPT, Rect::new(1200, 500, 1500, 540));
            }
            InputAction::Click { at } => on_reward_click(*at, screen),
            InputAction::Key { key } if key == "f" => {
                *screen = reward_screen(("sim_uni", "reward_title"));
            }
            _ => {}
        });
    }

    #[test]
    fn test_sim_uni_pays_with_immersifier_first() {
        let (mut ctx, game, _) = test_ctx();
        script_sim_uni(&game);
        let op = SimUniRun::new(sim_uni(), PowerBudget::new(80, 2)).without_transport();
        let result = ctx.run(op);
        assert!(result.success, "{:?}", result);
        assert!(result.status_is("reward claimed"));
        assert_eq!(
            result.data_as::<UnitReport>(),
            Some(UnitReport { runs: 1, power_used: 0, qty_used: 1 })
        );
        // Event option, immersifier button, leave.
        let clicks = game.clicks();
        assert!(clicks.contains(&Point::new(1450, 420)));
        assert!(clicks.contains(&Point::new(730, 840)));
        assert_eq!(clicks.last(), Some(&Point::new(960, 995)));
        // Walked toward the reward before interacting.
        assert!(game
            .actions()
            .contains(&InputAction::KeyDown { key: "w".into() }));
    }

    #[test]
    fn test_sim_uni_pays_with_power_without_immersifiers() {
        let (mut ctx, game, _) = test_ctx();
        script_sim_uni(&game);
        let op = SimUniRun::new(sim_uni(), PowerBudget::new(80, 0)).without_transport();
        let result = ctx.run(op);
        assert_eq!(
            result.data_as::<UnitReport>(),
            Some(UnitReport { runs: 1, power_used: 40, qty_used: 0 })
        );
        assert!(game.clicks().contains(&Point::new(1190, 840)));
    }

    #[test]
    fn test_sim_uni_refuses_without_budget() {
        let (mut ctx, game, _) = test_ctx();
        let result = ctx.run(SimUniRun::new(sim_uni(), PowerBudget::new(39, 0)));
        assert!(result.status_is("not enough power"));
        assert!(game.actions().is_empty());
    }

    fn script_ornament(game: &FakeGame, fail: bool) {
        game.show(areas_content(&[("mission", "challenge")]));
        game.on_action(move |action, screen| {
            let InputAction::Click { at } = action else {
                return;
            };
            if *at == Point::new(693, 70) {
                *screen = team_screen(2);
            } else if *at != Point::new(1690, 995) {
                on_reward_click(*at, screen);
            } else if screen.texts.iter().any(|t| t.text == "Challenge") {
                *screen = team_screen(1);
            } else if fail {
                *screen = areas_content(&[("battle_fail", "title")]);
            } else {
                *screen = reward_screen(("ornament", "reward_title"));
            }
        });
    }

    #[test]
    fn test_ornament_extraction_claims_once() {
        let (mut ctx, game, _) = test_ctx();
        script_ornament(&game, false);
        let op = OrnamentExtractionRun::new(ornament(), PowerBudget::new(100, 0))
            .with_team(2, None)
            .without_transport();
        let result = ctx.run(op);
        assert!(result.success, "{:?}", result);
        assert_eq!(
            result.data_as::<UnitReport>(),
            Some(UnitReport { runs: 1, power_used: 40, qty_used: 0 })
        );
        // Challenge, team 2 tab, start, pay with power, leave.
        assert_eq!(
            game.clicks(),
            vec![
                Point::new(1690, 995),
                Point::new(693, 70),
                Point::new(1690, 995),
                Point::new(1190, 840),
                Point::new(960, 995),
            ]
        );
    }

    #[test]
    fn test_ornament_extraction_battle_failed() {
        let (mut ctx, game, _) = test_ctx();
        script_ornament(&game, true);
        let op = OrnamentExtractionRun::new(ornament(), PowerBudget::new(0, 1)).without_transport();
        let result = ctx.run(op);
        assert!(!result.success);
        assert!(result.status_is("battle failed"));
    }
}
