use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::*;

/// Screenshot source. Must tolerate being called several times per second.
pub trait ScreenCapture: Send + Sync + 'static {
    fn capture(&self) -> Result<Frame>;
}

/// OCR over a region of a frame.
///
/// An empty list is a normal outcome ("no text"), not an error.
pub trait TextRecognizer: Send + Sync + 'static {
    fn recognize(&self, frame: &Frame, region: Rect) -> Result<Vec<OcrItem>>;

    /// Recognize a region that holds a single line of text.
    fn recognize_line(&self, frame: &Frame, region: Rect) -> Result<String> {
        let items = self.recognize(frame, region)?;
        Ok(items
            .into_iter()
            .map(|i| i.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

/// Template/feature matching. `Ok(None)` means no match above `threshold`.
pub trait TemplateMatcher: Send + Sync + 'static {
    fn match_template(
        &self,
        frame: &Frame,
        template_id: &str,
        region: Rect,
        threshold: f32,
    ) -> Result<Option<TemplateMatch>>;
}

/// Game input. Exclusively owned by the running operation tree.
pub trait InputController: Send + Sync + 'static {
    fn send(&self, action: InputAction) -> Result<()>;
}

/// Declarative lookup of named screen regions.
pub trait ScreenAreas: Send + Sync + 'static {
    fn get_area(&self, screen: &str, area: &str) -> Result<Area>;

    /// All areas of one screen, in declaration order.
    fn screen_areas(&self, screen: &str) -> Vec<Area>;
}

/// Persisted progress of one plan entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub plan_item_id: String,
    pub run_times: u32,
    /// RFC 3339 timestamp of the last write.
    pub updated_at: String,
}

/// Durable per-plan progress counters.
///
/// Every completed unit of work is written through immediately.
pub trait ProgressStore: Send + Sync + 'static {
    /// Completed runs for a plan entry (0 when never recorded).
    fn load(&self, plan_item_id: &str) -> Result<u32>;

    /// Persist the new completed-runs total for a plan entry.
    fn save(&self, plan_item_id: &str, run_times: u32) -> Result<()>;

    /// Forget a plan entry's progress. Returns whether a record existed.
    fn reset(&self, plan_item_id: &str) -> Result<bool>;

    fn list(&self) -> Result<Vec<ProgressRecord>>;
}

/// Time source and sleeper for the step loop.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration);
}

/// Wall-clock time with blocking sleeps.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}
