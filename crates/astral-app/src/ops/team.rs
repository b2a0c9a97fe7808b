//! Team and support character selection before a battle.

use tracing::{info, warn};

use astral_core::types::{Point, Rect};
use astral_engine::area::{round_by_find_and_click_area, round_by_ocr_and_click};
use astral_engine::{Edge, Node, Operation, Round, RoundResult};

use super::{ocr_line, RETRY_WAIT, SCREEN_CHANGE_WAIT};
use crate::parse::positive_digits;

/// Team slots along the top of the team screen.
pub const MAX_TEAMS: u32 = 9;

pub const STATUS_SUPPORT_JOINED: &str = "support joined";
pub const STATUS_NO_SUPPORT: &str = "no support";

/// Center of the tab for team `team_num` inside the tab strip.
fn tab_center(tabs: &Rect, team_num: u32) -> Point {
    let slot = 2 * team_num.clamp(1, MAX_TEAMS) as i32 - 1;
    let x = tabs.x1 + slot * tabs.width() / (2 * MAX_TEAMS as i32);
    Point::new(x, tabs.center().y)
}

/// Switch the team screen to a numbered team.
#[derive(Debug)]
pub struct ChooseTeam {
    team_num: u32,
}

impl ChooseTeam {
    pub fn new(team_num: u32) -> Self {
        Self {
            team_num: team_num.clamp(1, MAX_TEAMS),
        }
    }

    fn choose(&mut self, round: &mut Round<'_>) -> RoundResult {
        let current = match ocr_line(round, "team", "team_name") {
            Ok(text) => positive_digits(&text),
            Err(e) => return RoundResult::from_error(&e),
        };
        if current == Some(self.team_num) {
            return RoundResult::success_with(format!("team {}", self.team_num));
        }
        let tabs = match round.ctx.area("team", "team_tabs") {
            Ok(area) => area,
            Err(e) => return RoundResult::from_error(&e),
        };
        info!(from = ?current, to = self.team_num, "Switching team");
        match round.ctx.click(tab_center(&tabs.rect, self.team_num)) {
            Ok(()) => RoundResult::retry(format!("switching to team {}", self.team_num))
                .with_wait(RETRY_WAIT),
            Err(e) => RoundResult::from_error(&e),
        }
    }
}

impl Operation for ChooseTeam {
    fn name(&self) -> String {
        format!("choose_team({})", self.team_num)
    }

    fn nodes(&self) -> Vec<Node<Self>> {
        vec![Node::new("choose", Self::choose).start().with_max_retries(5)]
    }
}

/// Borrow a support character by name.
///
/// A character missing from the support list is not fatal: the list is
/// closed and the battle goes ahead with the own team only.
#[derive(Debug)]
pub struct ChooseSupport {
    character: String,
}

impl ChooseSupport {
    pub fn new(character: impl Into<String>) -> Self {
        Self {
            character: character.into(),
        }
    }

    fn open(&mut self, round: &mut Round<'_>) -> RoundResult {
        round_by_find_and_click_area(round, "team", "support", SCREEN_CHANGE_WAIT, RETRY_WAIT)
    }

    fn choose(&mut self, round: &mut Round<'_>) -> RoundResult {
        let character = self.character.clone();
        round_by_ocr_and_click(round, "support", "list", &character, RETRY_WAIT, RETRY_WAIT)
    }

    fn join(&mut self, round: &mut Round<'_>) -> RoundResult {
        let joined = round_by_find_and_click_area(round, "support", "join", SCREEN_CHANGE_WAIT, RETRY_WAIT);
        if !joined.is_success() {
            return joined;
        }
        info!(support = %self.character, "Support character joined");
        joined.with_status(STATUS_SUPPORT_JOINED)
    }

    fn close(&mut self, round: &mut Round<'_>) -> RoundResult {
        warn!(support = %self.character, "Support character not found, going without");
        let key = round.ctx.config.game.key_esc.clone();
        match round.ctx.press(&key) {
            Ok(()) => RoundResult::success_with(STATUS_NO_SUPPORT).with_wait(SCREEN_CHANGE_WAIT),
            Err(e) => RoundResult::from_error(&e),
        }
    }
}

impl Operation for ChooseSupport {
    fn name(&self) -> String {
        format!("choose_support({})", self.character)
    }

    fn nodes(&self) -> Vec<Node<Self>> {
        vec![
            Node::new("open", Self::open).start().with_max_retries(5),
            Node::new("choose", Self::choose).with_max_retries(3),
            Node::new("join", Self::join).with_max_retries(5),
            Node::new("close", Self::close).without_screenshot(),
        ]
    }

    fn edges(&self) -> Vec<Edge> {
        vec![
            Edge::on_success("open", "choose"),
            Edge::on_success("choose", "join"),
            Edge::on_failure("choose", "close"),
        ]
    }
}

/// Pick the team, then the support character if one is wanted.
pub(crate) fn prepare_team(
    round: &mut Round<'_>,
    team_num: u32,
    support: Option<&str>,
) -> RoundResult {
    let team = round.run(ChooseTeam::new(team_num));
    if !team.success {
        return RoundResult::by_op_result(&team);
    }
    match support {
        Some(character) => RoundResult::by_op_result(&round.run(ChooseSupport::new(character))),
        None => RoundResult::success_with(STATUS_NO_SUPPORT),
    }
}
