use std::sync::Arc;
use std::time::{Duration, Instant};

use astral_core::config::AppConfig;
use astral_core::error::{AstralError, Result};
use astral_core::event::{EventBus, OperationEvent};
use astral_core::traits::*;
use astral_core::types::*;

use crate::control::RunControl;
use crate::operation::{Operation, StateOperation};
use crate::round::OperationResult;

/// Shared handle bundling every collaborator an operation tree needs.
///
/// Borrowed mutably by the running operation; children borrow it in turn,
/// so only one tree drives the input controller at a time.
pub struct Context {
    pub capture: Box<dyn ScreenCapture>,
    pub ocr: Box<dyn TextRecognizer>,
    pub matcher: Box<dyn TemplateMatcher>,
    pub controller: Box<dyn InputController>,
    pub areas: Box<dyn ScreenAreas>,
    pub clock: Box<dyn Clock>,
    pub control: RunControl,
    pub events: Arc<EventBus>,
    pub config: Arc<AppConfig>,
    depth: usize,
}

impl Context {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// Nesting depth of the operation currently running (0 = top level).
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn enter(&mut self) -> usize {
        let depth = self.depth;
        self.depth += 1;
        depth
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn screenshot(&self) -> Result<Arc<Frame>> {
        self.capture.capture().map(Arc::new)
    }

    pub fn send(&self, action: InputAction) -> Result<()> {
        self.controller.send(action)
    }

    pub fn click(&self, at: Point) -> Result<()> {
        self.send(InputAction::click(at))
    }

    pub fn press(&self, key: &str) -> Result<()> {
        self.send(InputAction::key(key))
    }

    pub fn area(&self, screen: &str, area: &str) -> Result<Area> {
        self.areas.get_area(screen, area)
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn publish(&self, event: OperationEvent) {
        self.events.publish(event);
    }

    /// Sleep in pause-poll sized slices, returning early on cancellation.
    pub fn sleep(&self, duration: Duration) {
        let slice = self.config.engine.pause_poll();
        let mut remaining = duration;
        while !remaining.is_zero() && !self.control.is_cancelled() {
            let step = remaining.min(slice);
            self.clock.sleep(step);
            remaining -= step;
        }
    }

    /// Build and run a child operation to completion.
    ///
    /// A graph that fails validation is reported as a failed result.
    pub fn run<O: Operation>(&mut self, op: O) -> OperationResult {
        match StateOperation::new(op) {
            Ok(mut child) => child.execute(self),
            Err(e) => OperationResult::failed(e.to_string()),
        }
    }
}

/// Assembles a `Context`; collaborators left unset report an error when used.
#[derive(Default)]
pub struct ContextBuilder {
    capture: Option<Box<dyn ScreenCapture>>,
    ocr: Option<Box<dyn TextRecognizer>>,
    matcher: Option<Box<dyn TemplateMatcher>>,
    controller: Option<Box<dyn InputController>>,
    areas: Option<Box<dyn ScreenAreas>>,
    clock: Option<Box<dyn Clock>>,
    control: Option<RunControl>,
    events: Option<Arc<EventBus>>,
    config: Option<Arc<AppConfig>>,
}

impl ContextBuilder {
    pub fn capture(mut self, capture: impl ScreenCapture) -> Self {
        self.capture = Some(Box::new(capture));
        self
    }

    pub fn ocr(mut self, ocr: impl TextRecognizer) -> Self {
        self.ocr = Some(Box::new(ocr));
        self
    }

    pub fn matcher(mut self, matcher: impl TemplateMatcher) -> Self {
        self.matcher = Some(Box::new(matcher));
        self
    }

    pub fn controller(mut self, controller: impl InputController) -> Self {
        self.controller = Some(Box::new(controller));
        self
    }

    pub fn areas(mut self, areas: impl ScreenAreas) -> Self {
        self.areas = Some(Box::new(areas));
        self
    }

    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    pub fn control(mut self, control: RunControl) -> Self {
        self.control = Some(control);
        self
    }

    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(mut self, config: Arc<AppConfig>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Context {
        Context {
            capture: self.capture.unwrap_or_else(|| Box::new(Detached)),
            ocr: self.ocr.unwrap_or_else(|| Box::new(Detached)),
            matcher: self.matcher.unwrap_or_else(|| Box::new(Detached)),
            controller: self.controller.unwrap_or_else(|| Box::new(Detached)),
            areas: self.areas.unwrap_or_else(|| Box::new(Detached)),
            clock: self.clock.unwrap_or_else(|| Box::new(SystemClock)),
            control: self.control.unwrap_or_default(),
            events: self.events.unwrap_or_default(),
            config: self.config.unwrap_or_default(),
            depth: 0,
        }
    }
}

/// Placeholder for a collaborator that was never configured.
struct Detached;

impl ScreenCapture for Detached {
    fn capture(&self) -> Result<Frame> {
        Err(AstralError::Capture("no screen capture configured".into()))
    }
}

impl TextRecognizer for Detached {
    fn recognize(&self, _frame: &Frame, _region: Rect) -> Result<Vec<OcrItem>> {
        Err(AstralError::Recognition("no text recognizer configured".into()))
    }
}

impl TemplateMatcher for Detached {
    fn match_template(
        &self,
        _frame: &Frame,
        template_id: &str,
        _region: Rect,
        _threshold: f32,
    ) -> Result<Option<TemplateMatch>> {
        Err(AstralError::TemplateMatch {
            template: template_id.to_string(),
            message: "no template matcher configured".into(),
        })
    }
}

impl InputController for Detached {
    fn send(&self, _action: InputAction) -> Result<()> {
        Err(AstralError::Input("no input controller configured".into()))
    }
}

impl ScreenAreas for Detached {
    fn get_area(&self, screen: &str, area: &str) -> Result<Area> {
        Err(AstralError::AreaNotFound {
            screen: screen.to_string(),
            area: area.to_string(),
        })
    }

    fn screen_areas(&self, _screen: &str) -> Vec<Area> {
        Vec::new()
    }
}

/// What a step function sees during one round.
pub struct Round<'a> {
    pub ctx: &'a mut Context,
    screenshot: Option<Arc<Frame>>,
    node: &'a str,
    attempt: u32,
    round: u64,
}

impl<'a> Round<'a> {
    pub(crate) fn new(
        ctx: &'a mut Context,
        screenshot: Option<Arc<Frame>>,
        node: &'a str,
        attempt: u32,
        round: u64,
    ) -> Self {
        Self {
            ctx,
            screenshot,
            node,
            attempt,
            round,
        }
    }

    /// The screenshot of this round, captured on first use if the node
    /// skipped the pre-round capture.
    pub fn screenshot(&mut self) -> Result<Arc<Frame>> {
        match &self.screenshot {
            Some(frame) => Ok(frame.clone()),
            None => self.refresh_screenshot(),
        }
    }

    /// Capture a new frame and make it the round's screenshot.
    pub fn refresh_screenshot(&mut self) -> Result<Arc<Frame>> {
        let frame = self.ctx.screenshot()?;
        self.screenshot = Some(frame.clone());
        Ok(frame)
    }

    pub fn node(&self) -> &str {
        self.node
    }

    /// 1-based attempt number on the current node since it was entered.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Step invocations so far in this run, including this one.
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn run<O: Operation>(&mut self, op: O) -> OperationResult {
        self.ctx.run(op)
    }

    pub(crate) fn into_screenshot(self) -> Option<Arc<Frame>> {
        self.screenshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use astral_test_utils::{FakeGame, ManualClock, Shared};

    #[test]
    fn test_detached_collaborators_error() {
        let ctx = Context::builder().build();
        assert!(ctx.screenshot().is_err());
        assert!(ctx.press("esc").is_err());
        assert!(matches!(
            ctx.area("guide", "tab"),
            Err(AstralError::AreaNotFound { .. })
        ));
    }

    #[test]
    fn test_sleep_is_sliced_and_stops_on_cancel() {
        let clock = Shared(Arc::new(ManualClock::new()));
        let ctx = Context::builder().clock(clock.clone()).build();
        ctx.sleep(Duration::from_millis(250));
        assert_eq!(clock.0.elapsed(), Duration::from_millis(250));
        assert_eq!(clock.0.sleeps().len(), 3);

        ctx.control.cancel();
        ctx.sleep(Duration::from_secs(5));
        assert_eq!(clock.0.elapsed(), Duration::from_millis(250));
    }

    #[test]
    fn test_round_caches_screenshot() {
        let game = FakeGame::new();
        let mut ctx = Context::builder().capture(game.clone()).build();
        let mut round = Round::new(&mut ctx, None, "n", 1, 1);
        let a = round.screenshot().unwrap();
        let b = round.screenshot().unwrap();
        assert_eq!(a.id, b.id);
        let c = round.refresh_screenshot().unwrap();
        assert_ne!(a.id, c.id);
        assert_eq!(game.captures(), 2);
    }
}
