//! Shared test utilities for Astral crates.
//!
//! `FakeGame` implements every recognition/input collaborator over a scripted
//! screen; `ManualClock` runs the step loop in virtual time;
//! `MemoryProgressStore` and `MapAreas` stand in for persisted data.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use astral_core::error::{AstralError, Result};
use astral_core::traits::*;
use astral_core::types::*;

/// What the fake game shows in one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenContent {
    pub texts: Vec<OcrItem>,
    pub templates: Vec<TemplateMatch>,
}

impl ScreenContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: &str, rect: Rect) -> Self {
        self.texts.push(OcrItem::new(text, rect));
        self
    }

    pub fn template(mut self, template_id: &str, rect: Rect) -> Self {
        self.templates.push(TemplateMatch {
            template_id: template_id.to_string(),
            rect,
            score: 0.95,
        });
        self
    }
}

type ActionHook = Box<dyn FnMut(&InputAction, &mut ScreenContent) + Send>;

struct FakeGameState {
    current: ScreenContent,
    queued: VecDeque<ScreenContent>,
    by_frame: HashMap<u64, ScreenContent>,
    actions: Vec<InputAction>,
    hook: Option<ActionHook>,
    capture_errors: u32,
}

/// A scripted game screen shared by capture, OCR, template and input handles.
#[derive(Clone)]
pub struct FakeGame {
    state: Arc<Mutex<FakeGameState>>,
    next_id: Arc<AtomicU64>,
}

impl Default for FakeGame {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGame {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeGameState {
                current: ScreenContent::default(),
                queued: VecDeque::new(),
                by_frame: HashMap::new(),
                actions: Vec::new(),
                hook: None,
                capture_errors: 0,
            })),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Replace what is on screen now.
    pub fn show(&self, content: ScreenContent) {
        let mut s = self.state.lock().unwrap();
        s.current = content;
    }

    /// Queue contents; each capture pops one, the last one stays on screen.
    pub fn queue(&self, contents: impl IntoIterator<Item = ScreenContent>) {
        let mut s = self.state.lock().unwrap();
        s.queued.extend(contents);
    }

    /// React to input, e.g. change the screen when a button is clicked.
    pub fn on_action(&self, hook: impl FnMut(&InputAction, &mut ScreenContent) + Send + 'static) {
        let mut s = self.state.lock().unwrap();
        s.hook = Some(Box::new(hook));
    }

    /// Make the next `n` captures fail.
    pub fn fail_captures(&self, n: u32) {
        self.state.lock().unwrap().capture_errors = n;
    }

    pub fn actions(&self) -> Vec<InputAction> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn clicks(&self) -> Vec<Point> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                InputAction::Click { at } => Some(at),
                _ => None,
            })
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                InputAction::Key { key } => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn captures(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst) - 1
    }

    fn content_of(&self, frame: &Frame) -> ScreenContent {
        let s = self.state.lock().unwrap();
        s.by_frame
            .get(&frame.id)
            .cloned()
            .unwrap_or_else(|| s.current.clone())
    }
}

impl ScreenCapture for FakeGame {
    fn capture(&self) -> Result<Frame> {
        let mut s = self.state.lock().unwrap();
        if s.capture_errors > 0 {
            s.capture_errors -= 1;
            return Err(AstralError::Capture("scripted capture failure".into()));
        }
        if let Some(next) = s.queued.pop_front() {
            s.current = next;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let content = s.current.clone();
        s.by_frame.insert(id, content);
        Ok(Frame::blank(id))
    }
}

impl TextRecognizer for FakeGame {
    fn recognize(&self, frame: &Frame, region: Rect) -> Result<Vec<OcrItem>> {
        let content = self.content_of(frame);
        Ok(content
            .texts
            .into_iter()
            .filter(|t| region.overlaps(&t.rect))
            .collect())
    }
}

impl TemplateMatcher for FakeGame {
    fn match_template(
        &self,
        frame: &Frame,
        template_id: &str,
        region: Rect,
        threshold: f32,
    ) -> Result<Option<TemplateMatch>> {
        let content = self.content_of(frame);
        Ok(content.templates.into_iter().find(|t| {
            t.template_id == template_id && t.score >= threshold && region.overlaps(&t.rect)
        }))
    }
}

impl InputController for FakeGame {
    fn send(&self, action: InputAction) -> Result<()> {
        let mut guard = self.state.lock().unwrap();
        let s = &mut *guard;
        s.actions.push(action.clone());
        if let Some(hook) = s.hook.as_mut() {
            hook(&action, &mut s.current);
        }
        Ok(())
    }
}

type SleepHook = Box<dyn Fn(Duration) + Send + Sync>;

/// Virtual time: `sleep` advances `now` instantly.
pub struct ManualClock {
    start: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
    hook: Mutex<Option<SleepHook>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
            hook: Mutex::new(None),
        }
    }

    /// Called after every sleep with the total virtual time elapsed.
    pub fn on_sleep(&self, hook: impl Fn(Duration) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock().unwrap() += by;
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap()
    }

    /// Non-zero sleeps in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let total = {
            let mut e = self.elapsed.lock().unwrap();
            *e += duration;
            *e
        };
        self.sleeps.lock().unwrap().push(duration);
        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook(total);
        }
    }
}

/// Shared-handle wrapper so a test keeps a reference to a collaborator
/// it also hands to the context.
pub struct Shared<T>(pub Arc<T>);

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared(self.0.clone())
    }
}

impl<T: Clock> Clock for Shared<T> {
    fn now(&self) -> Instant {
        self.0.now()
    }

    fn sleep(&self, duration: Duration) {
        self.0.sleep(duration)
    }
}

impl<T: ProgressStore> ProgressStore for Shared<T> {
    fn load(&self, plan_item_id: &str) -> Result<u32> {
        self.0.load(plan_item_id)
    }

    fn save(&self, plan_item_id: &str, run_times: u32) -> Result<()> {
        self.0.save(plan_item_id, run_times)
    }

    fn reset(&self, plan_item_id: &str) -> Result<bool> {
        self.0.reset(plan_item_id)
    }

    fn list(&self) -> Result<Vec<ProgressRecord>> {
        self.0.list()
    }
}

type SaveHook = Box<dyn Fn(&str, u32) + Send + Sync>;

/// In-memory progress counters with a write log.
#[derive(Default)]
pub struct MemoryProgressStore {
    records: Mutex<HashMap<String, u32>>,
    writes: Mutex<Vec<(String, u32)>>,
    hook: Mutex<Option<SaveHook>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after every successful save, e.g. to simulate a crash.
    pub fn on_save(&self, hook: impl Fn(&str, u32) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn writes(&self) -> Vec<(String, u32)> {
        self.writes.lock().unwrap().clone()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load(&self, plan_item_id: &str) -> Result<u32> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(plan_item_id)
            .copied()
            .unwrap_or(0))
    }

    fn save(&self, plan_item_id: &str, run_times: u32) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .insert(plan_item_id.to_string(), run_times);
        self.writes
            .lock()
            .unwrap()
            .push((plan_item_id.to_string(), run_times));
        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook(plan_item_id, run_times);
        }
        Ok(())
    }

    fn reset(&self, plan_item_id: &str) -> Result<bool> {
        Ok(self.records.lock().unwrap().remove(plan_item_id).is_some())
    }

    fn list(&self) -> Result<Vec<ProgressRecord>> {
        let mut out: Vec<ProgressRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| ProgressRecord {
                plan_item_id: k.clone(),
                run_times: *v,
                updated_at: String::new(),
            })
            .collect();
        out.sort_by(|a, b| a.plan_item_id.cmp(&b.plan_item_id));
        Ok(out)
    }
}

/// Screen areas from a fixed list.
#[derive(Debug, Clone, Default)]
pub struct MapAreas {
    areas: Vec<Area>,
}

impl MapAreas {
    pub fn new(areas: Vec<Area>) -> Self {
        Self { areas }
    }

    pub fn with(mut self, area: Area) -> Self {
        self.areas.push(area);
        self
    }
}

impl ScreenAreas for MapAreas {
    fn get_area(&self, screen: &str, area: &str) -> Result<Area> {
        self.areas
            .iter()
            .find(|a| a.screen == screen && a.name == area)
            .cloned()
            .ok_or_else(|| AstralError::AreaNotFound {
                screen: screen.to_string(),
                area: area.to_string(),
            })
    }

    fn screen_areas(&self, screen: &str) -> Vec<Area> {
        self.areas
            .iter()
            .filter(|a| a.screen == screen)
            .cloned()
            .collect()
    }
}
