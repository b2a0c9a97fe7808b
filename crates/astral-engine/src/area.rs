//! Round helpers built on declarative screen areas.

use std::time::Duration;

use astral_core::error::{AstralError, Result};
use astral_core::types::{Area, Point};

use crate::context::Round;
use crate::round::RoundResult;
use crate::text::{best_match, fuzzy_match};

/// Whether an area's expected content is on the current screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindArea {
    Found(Point),
    NotFound,
}

/// Look for an area by its template or expected text.
pub fn find_area(round: &mut Round<'_>, area: &Area) -> Result<FindArea> {
    let frame = round.screenshot()?;
    if let Some(template_id) = &area.template_id {
        let hit = round
            .ctx
            .matcher
            .match_template(&frame, template_id, area.rect, area.threshold)?;
        return Ok(match hit {
            Some(m) => FindArea::Found(m.rect.center()),
            None => FindArea::NotFound,
        });
    }
    if let Some(text) = &area.text {
        let items = round.ctx.ocr.recognize(&frame, area.rect)?;
        let found = items
            .iter()
            .any(|item| fuzzy_match(text, &item.text, area.lcs_percent));
        return Ok(if found {
            FindArea::Found(area.center())
        } else {
            FindArea::NotFound
        });
    }
    Err(AstralError::Config(format!(
        "area {}/{} has neither text nor template",
        area.screen, area.name
    )))
}

/// Succeed with the area name as status when the area is visible.
pub fn round_by_find_area(
    round: &mut Round<'_>,
    screen: &str,
    area_name: &str,
    retry_wait: Duration,
) -> RoundResult {
    let area = match round.ctx.area(screen, area_name) {
        Ok(a) => a,
        Err(e) => return RoundResult::from_error(&e),
    };
    match find_area(round, &area) {
        Ok(FindArea::Found(_)) => RoundResult::success_with(area_name),
        Ok(FindArea::NotFound) => {
            RoundResult::retry(format!("{} not found", area_name)).with_wait(retry_wait)
        }
        Err(e) => RoundResult::from_error(&e),
    }
}

/// Click an area once it is visible.
pub fn round_by_find_and_click_area(
    round: &mut Round<'_>,
    screen: &str,
    area_name: &str,
    success_wait: Duration,
    retry_wait: Duration,
) -> RoundResult {
    let area = match round.ctx.area(screen, area_name) {
        Ok(a) => a,
        Err(e) => return RoundResult::from_error(&e),
    };
    match find_area(round, &area) {
        Ok(FindArea::Found(at)) => match round.ctx.click(at) {
            Ok(()) => RoundResult::success_with(area_name).with_wait(success_wait),
            Err(e) => RoundResult::from_error(&e),
        },
        Ok(FindArea::NotFound) => {
            RoundResult::retry(format!("{} not found", area_name)).with_wait(retry_wait)
        }
        Err(e) => RoundResult::from_error(&e),
    }
}

/// Click an area without checking that it is visible.
pub fn round_by_click_area(
    round: &mut Round<'_>,
    screen: &str,
    area_name: &str,
    success_wait: Duration,
) -> RoundResult {
    let clicked = round
        .ctx
        .area(screen, area_name)
        .and_then(|area| round.ctx.click(area.center()));
    match clicked {
        Ok(()) => RoundResult::success_with(area_name).with_wait(success_wait),
        Err(e) => RoundResult::from_error(&e),
    }
}

/// OCR an area's region and click the line best matching `target`.
pub fn round_by_ocr_and_click(
    round: &mut Round<'_>,
    screen: &str,
    area_name: &str,
    target: &str,
    success_wait: Duration,
    retry_wait: Duration,
) -> RoundResult {
    let area = match round.ctx.area(screen, area_name) {
        Ok(a) => a,
        Err(e) => return RoundResult::from_error(&e),
    };
    let frame = match round.screenshot() {
        Ok(f) => f,
        Err(e) => return RoundResult::from_error(&e),
    };
    let items = match round.ctx.ocr.recognize(&frame, area.rect) {
        Ok(items) => items,
        Err(e) => return RoundResult::from_error(&e),
    };
    match best_match(&items, target, area.lcs_percent) {
        Some(item) => match round.ctx.click(item.rect.center()) {
            Ok(()) => RoundResult::success_with(target).with_wait(success_wait),
            Err(e) => RoundResult::from_error(&e),
        },
        None => RoundResult::retry(format!("{} not found", target)).with_wait(retry_wait),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use astral_core::types::Rect;
    use astral_test_utils::{FakeGame, ManualClock, MapAreas, ScreenContent};

    use crate::context::Context;
    use crate::round::Outcome;

    fn areas() -> MapAreas {
        MapAreas::default()
            .with(Area::new("guide", "title", Rect::new(0, 0, 200, 50)).with_text("Interastral Guide"))
            .with(Area::new("guide", "close", Rect::new(1800, 0, 1900, 50)).with_template("btn_close"))
            .with(Area::new("guide", "list", Rect::new(0, 100, 800, 900)))
            .with(Area::new("guide", "broken", Rect::new(0, 0, 10, 10)))
    }

    fn ctx(game: &FakeGame) -> Context {
        Context::builder()
            .capture(game.clone())
            .ocr(game.clone())
            .matcher(game.clone())
            .controller(game.clone())
            .areas(areas())
            .clock(ManualClock::new())
            .build()
    }

    #[test]
    fn test_find_area_by_text() {
        let game = FakeGame::new();
        game.show(ScreenContent::new().text("Interastral Guide", Rect::new(10, 10, 190, 40)));
        let mut ctx = ctx(&game);
        let mut round = Round::new(&mut ctx, None, "n", 1, 1);
        let r = round_by_find_area(&mut round, "guide", "title", Duration::ZERO);
        assert!(r.is_success());
        assert!(r.status_is("title"));
    }

    #[test]
    fn test_find_and_click_template() {
        let game = FakeGame::new();
        game.show(ScreenContent::new().template("btn_close", Rect::new(1820, 10, 1860, 40)));
        let mut ctx = ctx(&game);
        let mut round = Round::new(&mut ctx, None, "n", 1, 1);
        let r = round_by_find_and_click_area(
            &mut round,
            "guide",
            "close",
            Duration::from_secs(1),
            Duration::ZERO,
        );
        assert!(r.is_success());
        assert_eq!(r.wait, Duration::from_secs(1));
        assert_eq!(game.clicks(), vec![Point::new(1840, 25)]);
    }

    #[test]
    fn test_missing_content_retries_and_bad_area_fails() {
        let game = FakeGame::new();
        let mut ctx = ctx(&game);
        let mut round = Round::new(&mut ctx, None, "n", 1, 1);
        let r = round_by_find_area(&mut round, "guide", "title", Duration::from_millis(500));
        assert_eq!(r.outcome, Outcome::Retry);
        assert_eq!(r.wait, Duration::from_millis(500));

        let r = round_by_find_area(&mut round, "guide", "nope", Duration::ZERO);
        assert_eq!(r.outcome, Outcome::Fail);

        let r = round_by_find_area(&mut round, "guide", "broken", Duration::ZERO);
        assert_eq!(r.outcome, Outcome::Fail);
    }

    #[test]
    fn test_ocr_and_click_best_line() {
        let game = FakeGame::new();
        game.show(
            ScreenContent::new()
                .text("Bud of Aether", Rect::new(100, 200, 300, 240))
                .text("Bud of Memories", Rect::new(100, 300, 300, 340)),
        );
        let mut ctx = ctx(&game);
        let mut round = Round::new(&mut ctx, None, "n", 1, 1);
        let r = round_by_ocr_and_click(
            &mut round,
            "guide",
            "list",
            "Bud of Memories",
            Duration::ZERO,
            Duration::ZERO,
        );
        assert!(r.is_success());
        assert_eq!(game.clicks(), vec![Point::new(200, 320)]);
    }
}
