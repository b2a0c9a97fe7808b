use std::fmt;
use std::ops::Add;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// A point in screen coordinates (standard 1920x1080 space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An axis-aligned rectangle given by its top-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn left_top(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x1 && p.x <= self.x2 && p.y >= self.y1 && p.y <= self.y2
    }

    /// Whether the two rectangles share any area.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x1 < other.x2 && other.x1 < self.x2 && self.y1 < other.y2 && other.y1 < self.y2
    }

    /// Translate by an offset, e.g. from crop-local to screen coordinates.
    pub fn offset(&self, by: Point) -> Rect {
        Rect::new(self.x1 + by.x, self.y1 + by.y, self.x2 + by.x, self.y2 + by.y)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.x1, self.y1, self.x2, self.y2)
    }
}

/// A captured game frame.
///
/// Pixel data is opaque to the engine; recognizers interpret it. Frames are
/// shared as `Arc<Frame>` so every node in one round reads the same capture.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic capture sequence number.
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(id: u64, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            id,
            width,
            height,
            pixels,
            captured_at: Instant::now(),
        }
    }

    /// A frame with no pixel payload, used by replayed and scripted sources.
    pub fn blank(id: u64) -> Self {
        Self::new(id, 1920, 1080, Vec::new())
    }
}

/// One recognized line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrItem {
    pub text: String,
    pub rect: Rect,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl OcrItem {
    pub fn new(text: impl Into<String>, rect: Rect) -> Self {
        Self {
            text: text.into(),
            rect,
            confidence: default_confidence(),
        }
    }
}

/// A template hit with its location and score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMatch {
    pub template_id: String,
    pub rect: Rect,
    pub score: f32,
}

/// A simulated input action. Fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputAction {
    Click { at: Point },
    Drag { from: Point, to: Point },
    /// Press and release a key.
    Key { key: String },
    KeyDown { key: String },
    KeyUp { key: String },
    Scroll { at: Point, delta: i32 },
    /// Rotate the camera by an angle in degrees (positive = clockwise).
    Turn { angle: f64 },
}

impl InputAction {
    pub fn click(at: Point) -> Self {
        InputAction::Click { at }
    }

    pub fn key(key: impl Into<String>) -> Self {
        InputAction::Key { key: key.into() }
    }
}

/// A named region on a named screen, looked up from data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub screen: String,
    pub name: String,
    pub rect: Rect,
    /// Text expected inside the region when the area is present.
    #[serde(default)]
    pub text: Option<String>,
    /// Template expected inside the region when the area is present.
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Minimum longest-common-subsequence ratio for a fuzzy text hit.
    #[serde(default = "default_lcs_percent")]
    pub lcs_percent: f64,
}

fn default_threshold() -> f32 {
    0.7
}

fn default_lcs_percent() -> f64 {
    0.5
}

impl Area {
    pub fn new(screen: impl Into<String>, name: impl Into<String>, rect: Rect) -> Self {
        Self {
            screen: screen.into(),
            name: name.into(),
            rect,
            text: None,
            template_id: None,
            threshold: default_threshold(),
            lcs_percent: default_lcs_percent(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }

    pub fn center(&self) -> Point {
        self.rect.center()
    }
}
