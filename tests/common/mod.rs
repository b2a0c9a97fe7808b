//! A small simulated game for driving the Trailblaze Power app end to end.

use std::sync::{Arc, Mutex};

use astral_app::AreaBook;
use astral_core::config::{MissionConfig, MissionKind};
use astral_core::types::{InputAction, Point, Rect};
use astral_engine::{Context, RunControl};
use astral_test_utils::{FakeGame, ManualClock, ScreenContent, Shared};

pub const MISSION_ID: &str = "calyx_gold_memory";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    World,
    Guide,
    Mission,
    Team,
    Complete,
}

/// What the simulated game knows about itself.
#[derive(Debug)]
pub struct Sim {
    pub screen: Screen,
    pub power: u32,
    pub cost: u32,
    pub times: u32,
    /// Runs the game has actually paid for.
    pub runs_completed: u32,
}

pub fn mission(cost: u32) -> MissionConfig {
    MissionConfig {
        id: MISSION_ID.into(),
        name: "Bud of Memories".into(),
        tab: "Survival Index".into(),
        category: "Calyx (Golden)".into(),
        region: None,
        kind: MissionKind::Calyx { power: cost },
    }
}

/// Draw built-in areas the way the game shows them.
pub fn areas_content(areas: &[(&str, &str)]) -> ScreenContent {
    let book = AreaBook::builtin().expect("built-in areas");
    let mut content = ScreenContent::new();
    for (screen, name) in areas {
        let area = book
            .areas()
            .iter()
            .find(|a| a.screen == *screen && a.name == *name)
            .unwrap_or_else(|| panic!("no built-in area {}/{}", screen, name));
        if let Some(template) = &area.template_id {
            content = content.template(template, area.rect);
        } else if let Some(text) = &area.text {
            content = content.text(text, area.rect);
        }
    }
    content
}

fn render(sim: &Sim) -> ScreenContent {
    match sim.screen {
        Screen::World => areas_content(&[("world", "menu_icon")]),
        Screen::Guide => areas_content(&[("guide", "title")])
            .text("Survival Index", Rect::new(460, 30, 700, 70))
            .text(&format!("{}/300", sim.power), Rect::new(1400, 50, 1560, 90))
            .text("0/12", Rect::new(1180, 50, 1340, 90))
            .text("Calyx (Golden)", Rect::new(280, 300, 680, 340))
            .text("Bud of Memories", Rect::new(740, 300, 1200, 340)),
        Screen::Mission => areas_content(&[
            ("mission", "challenge"),
            ("mission", "times_plus"),
            ("mission", "times_minus"),
        ])
        .text(&sim.times.to_string(), Rect::new(1620, 875, 1680, 915)),
        Screen::Team => areas_content(&[("team", "start"), ("team", "support")])
            .text("Team 1", Rect::new(760, 110, 1160, 160)),
        Screen::Complete => {
            areas_content(&[("challenge_complete", "title"), ("challenge_complete", "exit")])
        }
    }
}

fn react(sim: &mut Sim, action: &InputAction) {
    match (sim.screen, action) {
        (Screen::World, InputAction::Key { key }) if key == "f4" => sim.screen = Screen::Guide,
        // Interacting in front of the mission reopens it.
        (Screen::World, InputAction::Key { key }) if key == "f" => {
            sim.screen = Screen::Mission;
            sim.times = 1;
        }
        (_, InputAction::Key { key }) if key == "esc" => sim.screen = Screen::World,
        (Screen::Guide, InputAction::Click { at }) if *at == Point::new(1650, 320) => {
            sim.screen = Screen::Mission;
            sim.times = 1;
        }
        (Screen::Mission, InputAction::Click { at }) if *at == Point::new(1770, 895) => {
            sim.times = (sim.times + 1).min(6);
        }
        (Screen::Mission, InputAction::Click { at }) if *at == Point::new(1530, 895) => {
            sim.times = sim.times.saturating_sub(1).max(1);
        }
        (Screen::Mission, InputAction::Click { at }) if *at == Point::new(1690, 995) => {
            sim.screen = Screen::Team;
        }
        (Screen::Team, InputAction::Click { at }) if *at == Point::new(1690, 995) => {
            let cost = sim.cost * sim.times;
            assert!(sim.power >= cost, "battle started without enough power");
            sim.power -= cost;
            sim.runs_completed += sim.times;
            sim.screen = Screen::Complete;
        }
        (Screen::Complete, InputAction::Click { at }) if *at == Point::new(730, 940) => {
            sim.screen = Screen::World;
        }
        _ => {}
    }
}

/// A fake game in the open world with `power` Trailblaze Power.
pub fn simulated_game(power: u32, cost: u32) -> (FakeGame, Arc<Mutex<Sim>>) {
    let sim = Arc::new(Mutex::new(Sim {
        screen: Screen::World,
        power,
        cost,
        times: 1,
        runs_completed: 0,
    }));
    let game = FakeGame::new();
    game.show(render(&sim.lock().unwrap()));
    let hook_sim = sim.clone();
    game.on_action(move |action, screen| {
        let mut sim = hook_sim.lock().unwrap();
        react(&mut sim, action);
        *screen = render(&sim);
    });
    (game, sim)
}

pub fn context(game: &FakeGame, control: RunControl) -> (Context, Shared<ManualClock>) {
    let clock = Shared(Arc::new(ManualClock::new()));
    let ctx = Context::builder()
        .capture(game.clone())
        .ocr(game.clone())
        .matcher(game.clone())
        .controller(game.clone())
        .areas(AreaBook::builtin().expect("built-in areas"))
        .clock(clock.clone())
        .control(control)
        .build();
    (ctx, clock)
}
