//! Character movement without a minimap position.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use astral_core::types::InputAction;
use astral_engine::text::best_match;
use astral_engine::{Context, Edge, Node, Operation, Round, RoundResult};

use super::ocr_area;

/// Circles outward in every direction to walk into an interaction range.
const NUDGE_PATTERN: &str = "sssaaawwwdddsssdddwwwaaawwwaaasssdddwwwdddsssaaa";

/// How long the prompt is given to appear after each nudge.
const NUDGE_WAIT: Duration = Duration::from_millis(300);

/// Status of a walk cut short by a pause; the caller should recompute.
pub const STATUS_PAUSE_INTERRUPTED: &str = "pause interrupted";

/// Find an interaction prompt and press interact, nudging the character
/// through a fixed pattern until the prompt shows up.
#[derive(Debug)]
pub struct MoveInteract {
    target: String,
    nudges: usize,
}

impl MoveInteract {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            nudges: 0,
        }
    }

    fn interact(&mut self, round: &mut Round<'_>) -> RoundResult {
        let min_ratio = match round.ctx.area("world", "interact") {
            Ok(area) => area.lcs_percent,
            Err(e) => return RoundResult::from_error(&e),
        };
        let items = match ocr_area(round, "world", "interact") {
            Ok(items) => items,
            Err(e) => return RoundResult::from_error(&e),
        };

        if best_match(&items, &self.target, min_ratio).is_some() {
            let key = round.ctx.config.game.key_interact.clone();
            return match round.ctx.press(&key) {
                Ok(()) => RoundResult::success_with("interacted"),
                Err(e) => RoundResult::from_error(&e),
            };
        }

        let Some(step) = NUDGE_PATTERN.chars().nth(self.nudges) else {
            return RoundResult::fail(format!("{} not found", self.target));
        };
        self.nudges += 1;
        debug!(target = %self.target, step = %step, nudges = self.nudges, "Nudging toward interaction");
        match round.ctx.press(&step.to_string()) {
            Ok(()) => RoundResult::wait(NUDGE_WAIT),
            Err(e) => RoundResult::from_error(&e),
        }
    }
}

impl Operation for MoveInteract {
    fn name(&self) -> String {
        format!("move_interact({})", self.target)
    }

    fn nodes(&self) -> Vec<Node<Self>> {
        vec![Node::new("interact", Self::interact)
            .start()
            .without_screenshot()]
    }

    fn handle_init(&mut self, _ctx: &mut Context) -> Option<RoundResult> {
        self.nudges = 0;
        None
    }
}

/// Turn by `angle` degrees and walk forward `distance` map pixels, timing
/// the walk from the configured walking speed.
///
/// A pause makes the elapsed time meaningless, so the walk stops with
/// [`STATUS_PAUSE_INTERRUPTED`] for the caller to recompute.
#[derive(Debug)]
pub struct MoveWithoutPos {
    angle: f64,
    distance: f64,
    walk_started: Option<Instant>,
    ever_paused: bool,
}

impl MoveWithoutPos {
    pub fn new(angle: f64, distance: f64) -> Self {
        Self {
            angle,
            distance,
            walk_started: None,
            ever_paused: false,
        }
    }

    fn forward_key(ctx: &Context) -> String {
        ctx.config.game.key_forward.clone()
    }

    fn turn(&mut self, round: &mut Round<'_>) -> RoundResult {
        if self.angle == 0.0 {
            return RoundResult::success_with("facing target");
        }
        match round.ctx.send(InputAction::Turn { angle: self.angle }) {
            Ok(()) => RoundResult::success_with("turned").with_wait(Duration::from_millis(200)),
            Err(e) => RoundResult::from_error(&e),
        }
    }

    fn walk(&mut self, round: &mut Round<'_>) -> RoundResult {
        let key = Self::forward_key(round.ctx);
        if self.ever_paused {
            return RoundResult::success_with(STATUS_PAUSE_INTERRUPTED);
        }

        let speed = round.ctx.config.game.walk_speed;
        if !(speed.is_finite() && speed > 0.0) {
            return RoundResult::fail(format!("invalid walk speed {}", speed));
        }
        let total = match Duration::try_from_secs_f64((self.distance / speed).max(0.0)) {
            Ok(total) => total,
            Err(e) => return RoundResult::fail(format!("invalid walk distance {}: {}", self.distance, e)),
        };
        let Some(started) = self.walk_started else {
            if let Err(e) = round.ctx.send(InputAction::KeyDown { key }) {
                return RoundResult::from_error(&e);
            }
            self.walk_started = Some(round.ctx.now());
            return RoundResult::wait(total);
        };

        let elapsed = round.ctx.now().saturating_duration_since(started);
        if elapsed < total {
            return RoundResult::wait(total - elapsed);
        }
        self.walk_started = None;
        match round.ctx.send(InputAction::KeyUp { key }) {
            Ok(()) => RoundResult::success_with("arrived"),
            Err(e) => RoundResult::from_error(&e),
        }
    }
}

impl Operation for MoveWithoutPos {
    fn name(&self) -> String {
        "move_without_pos".into()
    }

    fn nodes(&self) -> Vec<Node<Self>> {
        vec![
            Node::new("turn", Self::turn).start().without_screenshot(),
            Node::new("walk", Self::walk).without_screenshot(),
        ]
    }

    fn edges(&self) -> Vec<Edge> {
        vec![Edge::on_success("turn", "walk")]
    }

    fn handle_init(&mut self, _ctx: &mut Context) -> Option<RoundResult> {
        self.walk_started = None;
        self.ever_paused = false;
        None
    }

    fn handle_pause(&mut self, ctx: &mut Context) {
        self.ever_paused = true;
        if self.walk_started.take().is_some() {
            info!("Walk paused, releasing movement key");
            let key = Self::forward_key(ctx);
            if let Err(e) = ctx.send(InputAction::KeyUp { key: key.clone() }) {
                warn!(key = %key, error = %e, "Failed to release movement key");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use std::sync::Mutex;

    use astral_core::error::{AstralError, Result};
    use astral_core::traits::InputController;
    use astral_core::types::Rect;
    use astral_test_utils::ScreenContent;

    use crate::test_support::test_ctx;

    fn prompt(text: &str) -> ScreenContent {
        ScreenContent::new().text(text, Rect::new(1200, 500, 1500, 540))
    }

    #[test]
    fn test_interact_nudges_until_prompt() {
        let (mut ctx, game, clock) = test_ctx();
        game.queue([
            ScreenContent::new(),
            ScreenContent::new(),
            ScreenContent::new(),
            prompt("Claim Immersion Reward"),
        ]);
        let result = ctx.run(MoveInteract::new("Claim Immersion Reward"));
        assert!(result.success);
        assert_eq!(game.keys(), vec!["s", "s", "s", "f"]);
        assert_eq!(clock.0.elapsed(), Duration::from_millis(900));
    }

    #[test]
    fn test_interact_fails_when_pattern_exhausted() {
        let (mut ctx, game, _) = test_ctx();
        let result = ctx.run(MoveInteract::new("Claim Immersion Reward"));
        assert!(!result.success);
        assert_eq!(game.keys().len(), NUDGE_PATTERN.len());
        // Waits never consume the node's retry budget.
        assert!(game.captures() > 5);
    }

    #[test]
    fn test_walk_is_timed_from_speed() {
        let (mut ctx, game, clock) = test_ctx();
        let result = ctx.run(MoveWithoutPos::new(90.0, 30.0));
        assert!(result.status_is("arrived"));
        assert_eq!(
            game.actions(),
            vec![
                InputAction::Turn { angle: 90.0 },
                InputAction::KeyDown { key: "w".into() },
                InputAction::KeyUp { key: "w".into() },
            ]
        );
        // 30 px at 20 px/s, plus the turn settle time.
        assert_eq!(clock.0.elapsed(), Duration::from_millis(1700));
        assert_eq!(game.captures(), 0);
    }

    #[test]
    fn test_bad_walk_speed_fails_without_moving() {
        let (mut ctx, game, _) = test_ctx();
        let mut config = (*ctx.config).clone();
        config.game.walk_speed = 0.0;
        ctx.config = Arc::new(config);
        let result = ctx.run(MoveWithoutPos::new(0.0, 5000.0));
        assert!(!result.success);
        assert!(result.status_is("invalid walk speed 0"));
        assert!(game.actions().is_empty());
    }

    #[test]
    fn test_unbounded_distance_fails_without_moving() {
        let (mut ctx, game, _) = test_ctx();
        let result = ctx.run(MoveWithoutPos::new(0.0, f64::INFINITY));
        assert!(!result.success);
        assert!(game.actions().is_empty());
    }

    #[test]
    fn test_pause_interrupts_walk() {
        let (mut ctx, game, clock) = test_ctx();
        let control = ctx.control.clone();
        let fired = Arc::new(AtomicBool::new(false));
        clock.0.on_sleep(move |total| {
            if total >= Duration::from_millis(500) && !fired.swap(true, Ordering::SeqCst) {
                control.pause();
            } else {
                control.resume();
            }
        });
        let result = ctx.run(MoveWithoutPos::new(0.0, 30.0));
        assert!(result.success);
        assert!(result.status_is(STATUS_PAUSE_INTERRUPTED));
        let keys: Vec<InputAction> = game.actions();
        assert_eq!(
            keys,
            vec![
                InputAction::KeyDown { key: "w".into() },
                InputAction::KeyUp { key: "w".into() },
            ]
        );
    }

    /// Accepts key presses but cannot release them.
    #[derive(Default)]
    struct StuckKeys {
        sent: Arc<Mutex<Vec<InputAction>>>,
    }

    impl InputController for StuckKeys {
        fn send(&self, action: InputAction) -> Result<()> {
            if matches!(action, InputAction::KeyUp { .. }) {
                return Err(AstralError::Input("key release lost".into()));
            }
            self.sent.lock().unwrap().push(action);
            Ok(())
        }
    }

    #[test]
    fn test_failed_release_on_pause_still_interrupts() {
        let (mut ctx, _, clock) = test_ctx();
        let keys = StuckKeys::default();
        let sent = keys.sent.clone();
        ctx.controller = Box::new(keys);
        let control = ctx.control.clone();
        let fired = Arc::new(AtomicBool::new(false));
        clock.0.on_sleep(move |total| {
            if total >= Duration::from_millis(500) && !fired.swap(true, Ordering::SeqCst) {
                control.pause();
            } else {
                control.resume();
            }
        });
        let result = ctx.run(MoveWithoutPos::new(0.0, 30.0));
        assert!(result.status_is(STATUS_PAUSE_INTERRUPTED));
        assert_eq!(*sent.lock().unwrap(), vec![InputAction::KeyDown { key: "w".into() }]);
    }
}
