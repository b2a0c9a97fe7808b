use std::time::Duration;

use tracing::{debug, info};

use astral_core::config::MissionConfig;
use astral_core::types::{InputAction, OcrItem, Point};
use astral_engine::area::{find_area, round_by_find_area, round_by_ocr_and_click, FindArea};
use astral_engine::text::{best_match, fuzzy_match};
use astral_engine::{Context, Edge, Node, Operation, Round, RoundResult};

use super::guide::{GuideChooseTab, GuideOpen};
use super::{ocr_area, RETRY_WAIT, SCREEN_CHANGE_WAIT};
use crate::mission::arrival_area;

/// How far one drag scrolls the mission list.
const LIST_DRAG: i32 = -200;

/// Teleport to a mission through the guide.
#[derive(Debug)]
pub struct GuideTransport {
    mission: MissionConfig,
    drags: u32,
}

impl GuideTransport {
    pub fn new(mission: MissionConfig) -> Self {
        Self { mission, drags: 0 }
    }

    fn open(&mut self, round: &mut Round<'_>) -> RoundResult {
        RoundResult::by_op_result(&round.run(GuideOpen::new()))
    }

    fn tab(&mut self, round: &mut Round<'_>) -> RoundResult {
        RoundResult::by_op_result(&round.run(GuideChooseTab::new(self.mission.tab.clone())))
    }

    fn category(&mut self, round: &mut Round<'_>) -> RoundResult {
        let category = self.mission.category.clone();
        round_by_ocr_and_click(
            round,
            "guide",
            "category_list",
            &category,
            RETRY_WAIT,
            RETRY_WAIT,
        )
    }

    /// The mission row, disambiguated by region when one is configured.
    fn find_row<'a>(&self, items: &'a [OcrItem], min_ratio: f64) -> Option<&'a OcrItem> {
        let Some(region) = &self.mission.region else {
            return best_match(items, &self.mission.name, min_ratio);
        };
        let rows: Vec<OcrItem> = items
            .iter()
            .filter(|item| {
                items.iter().any(|other| {
                    other.rect.y1 < item.rect.y2
                        && item.rect.y1 < other.rect.y2
                        && fuzzy_match(region, &other.text, min_ratio)
                })
            })
            .cloned()
            .collect();
        let hit = best_match(&rows, &self.mission.name, min_ratio)?;
        items.iter().find(|item| item.rect == hit.rect)
    }

    fn mission(&mut self, round: &mut Round<'_>) -> RoundResult {
        let (list, column) = match round
            .ctx
            .area("guide", "mission_list")
            .and_then(|list| Ok((list, round.ctx.area("guide", "teleport_column")?)))
        {
            Ok(areas) => areas,
            Err(e) => return RoundResult::from_error(&e),
        };
        let items = match ocr_area(round, "guide", "mission_list") {
            Ok(items) => items,
            Err(e) => return RoundResult::from_error(&e),
        };

        if let Some(row) = self.find_row(&items, list.lcs_percent) {
            let at = Point::new(column.center().x, row.rect.center().y);
            info!(mission = %self.mission.id, at = %at, "Teleporting");
            return match round.ctx.click(at) {
                Ok(()) => RoundResult::success_with("teleport").with_wait(SCREEN_CHANGE_WAIT),
                Err(e) => RoundResult::from_error(&e),
            };
        }

        let from = list.center();
        let to = Point::new(from.x, from.y + LIST_DRAG);
        self.drags += 1;
        debug!(mission = %self.mission.id, drags = self.drags, "Mission not visible, scrolling");
        match round.ctx.send(InputAction::Drag { from, to }) {
            Ok(()) => RoundResult::retry(format!("{} not found", self.mission.name))
                .with_wait(RETRY_WAIT),
            Err(e) => RoundResult::from_error(&e),
        }
    }

    fn arrive(&mut self, round: &mut Round<'_>) -> RoundResult {
        let (screen, area) = arrival_area(&self.mission.kind);
        round_by_find_area(round, screen, area, Duration::from_millis(500))
    }
}

impl Operation for GuideTransport {
    fn name(&self) -> String {
        format!("guide_transport({})", self.mission.id)
    }

    fn nodes(&self) -> Vec<Node<Self>> {
        vec![
            Node::new("open", Self::open).start(),
            Node::new("tab", Self::tab),
            Node::new("category", Self::category).with_max_retries(5),
            Node::new("mission", Self::mission).with_max_retries(10),
            Node::new("arrive", Self::arrive).with_max_retries(20),
        ]
    }

    fn edges(&self) -> Vec<Edge> {
        vec![
            Edge::on_success("open", "tab"),
            Edge::on_success("tab", "category"),
            Edge::on_success("category", "mission"),
            Edge::on_success("mission", "arrive"),
        ]
    }

    fn handle_init(&mut self, _ctx: &mut Context) -> Option<RoundResult> {
        self.drags = 0;
        None
    }
}

/// Reach the mission's start screen.
///
/// With `need_transport` the guide teleports there. Otherwise the character
/// still stands at the mission it just ran, so interacting reopens it.
pub(crate) fn enter_mission(
    round: &mut Round<'_>,
    mission: &MissionConfig,
    need_transport: bool,
) -> RoundResult {
    if need_transport {
        return RoundResult::by_op_result(&round.run(GuideTransport::new(mission.clone())));
    }
    let (screen, name) = arrival_area(&mission.kind);
    let area = match round.ctx.area(screen, name) {
        Ok(area) => area,
        Err(e) => return RoundResult::from_error(&e),
    };
    match find_area(round, &area) {
        Ok(FindArea::Found(_)) => return RoundResult::success_with("on mission screen"),
        Ok(FindArea::NotFound) => {}
        Err(e) => return RoundResult::from_error(&e),
    }
    debug!(mission = %mission.id, "Reopening mission by interacting");
    let key = round.ctx.config.game.key_interact.clone();
    match round.ctx.press(&key) {
        Ok(()) => RoundResult::retry("mission screen not open").with_wait(SCREEN_CHANGE_WAIT),
        Err(e) => RoundResult::from_error(&e),
    }
}
