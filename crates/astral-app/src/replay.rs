//! Offline game backend driven by a recorded JSON script.
//!
//! Each frame lists the text boxes and template hits visible on screen.
//! A frame stays up until the next input action, or for a fixed number of
//! captures when it sets `captures`; the last frame stays up for good.
//! Input actions are logged and recorded instead of reaching a game.
//!
//! ```json
//! { "frames": [
//!   { "templates": [{ "id": "world_menu", "rect": [1800, 20, 1900, 80] }] },
//!   { "texts": [{ "text": "Interastral Guide", "rect": [60, 20, 420, 80] }] }
//! ] }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use astral_core::error::{AstralError, Result};
use astral_core::traits::{InputController, ScreenCapture, TemplateMatcher, TextRecognizer};
use astral_core::types::{Frame, InputAction, OcrItem, Rect, TemplateMatch};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayText {
    pub text: String,
    pub rect: [i32; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayTemplate {
    pub id: String,
    pub rect: [i32; 4],
    #[serde(default = "default_score")]
    pub score: f32,
}

fn default_score() -> f32 {
    0.95
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    #[serde(default)]
    pub texts: Vec<ReplayText>,
    #[serde(default)]
    pub templates: Vec<ReplayTemplate>,
    /// Advance after this many captures instead of on the next input.
    #[serde(default)]
    pub captures: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    pub frames: Vec<ReplayFrame>,
}

impl ReplayScript {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let script: ReplayScript = serde_json::from_str(content)?;
        if script.frames.is_empty() {
            return Err(AstralError::Config("replay script has no frames".into()));
        }
        for (i, frame) in script.frames.iter().enumerate() {
            let rects = frame
                .texts
                .iter()
                .map(|t| t.rect)
                .chain(frame.templates.iter().map(|t| t.rect));
            for [x1, y1, x2, y2] in rects {
                if x2 <= x1 || y2 <= y1 {
                    return Err(AstralError::Config(format!(
                        "replay frame {} has an empty rect",
                        i
                    )));
                }
            }
        }
        Ok(script)
    }
}

fn to_rect([x1, y1, x2, y2]: [i32; 4]) -> Rect {
    Rect::new(x1, y1, x2, y2)
}

struct ReplayState {
    script: ReplayScript,
    current: usize,
    captures_on_current: u32,
    next_id: u64,
    frames_by_id: HashMap<u64, usize>,
    actions: Vec<InputAction>,
}

impl ReplayState {
    fn advance(&mut self) {
        if self.current + 1 < self.script.frames.len() {
            self.current += 1;
            self.captures_on_current = 0;
            debug!(frame = self.current, "Replay advanced");
        }
    }

    fn frame_for(&self, frame: &Frame) -> Result<&ReplayFrame> {
        self.frames_by_id
            .get(&frame.id)
            .and_then(|idx| self.script.frames.get(*idx))
            .ok_or_else(|| AstralError::Recognition(format!("frame {} was not captured here", frame.id)))
    }
}

/// Capture, recognition and input collaborators over one replay script.
///
/// Clones share the same playback position.
#[derive(Clone)]
pub struct ReplayBackend {
    state: Arc<Mutex<ReplayState>>,
}

impl ReplayBackend {
    pub fn new(script: ReplayScript) -> Self {
        Self {
            state: Arc::new(Mutex::new(ReplayState {
                script,
                current: 0,
                captures_on_current: 0,
                next_id: 1,
                frames_by_id: HashMap::new(),
                actions: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ReplayState>> {
        self.state
            .lock()
            .map_err(|e| AstralError::Capture(format!("replay state poisoned: {}", e)))
    }

    /// Index of the frame currently on screen.
    pub fn position(&self) -> usize {
        self.lock().map(|s| s.current).unwrap_or_default()
    }

    /// Input actions received so far.
    pub fn actions(&self) -> Vec<InputAction> {
        self.lock().map(|s| s.actions.clone()).unwrap_or_default()
    }
}

impl ScreenCapture for ReplayBackend {
    fn capture(&self) -> Result<Frame> {
        let mut s = self.lock()?;
        let limit = s.script.frames.get(s.current).and_then(|f| f.captures);
        if limit.is_some_and(|n| s.captures_on_current >= n) {
            s.advance();
        }
        s.captures_on_current += 1;
        let id = s.next_id;
        s.next_id += 1;
        let current = s.current;
        s.frames_by_id.insert(id, current);
        Ok(Frame::blank(id))
    }
}

impl TextRecognizer for ReplayBackend {
    fn recognize(&self, frame: &Frame, region: Rect) -> Result<Vec<OcrItem>> {
        let s = self.lock()?;
        Ok(s.frame_for(frame)?
            .texts
            .iter()
            .map(|t| OcrItem::new(&t.text, to_rect(t.rect)))
            .filter(|item| region.overlaps(&item.rect))
            .collect())
    }
}

impl TemplateMatcher for ReplayBackend {
    fn match_template(
        &self,
        frame: &Frame,
        template_id: &str,
        region: Rect,
        threshold: f32,
    ) -> Result<Option<TemplateMatch>> {
        let s = self.lock()?;
        Ok(s.frame_for(frame)?
            .templates
            .iter()
            .filter(|t| t.id == template_id && t.score >= threshold)
            .map(|t| TemplateMatch {
                template_id: t.id.clone(),
                rect: to_rect(t.rect),
                score: t.score,
            })
            .find(|m| region.overlaps(&m.rect)))
    }
}

impl InputController for ReplayBackend {
    fn send(&self, action: InputAction) -> Result<()> {
        let mut s = self
            .state
            .lock()
            .map_err(|e| AstralError::Input(format!("replay state poisoned: {}", e)))?;
        info!(action = ?action, frame = s.current, "Replayed input");
        s.actions.push(action);
        let timed = s
            .script
            .frames
            .get(s.current)
            .is_some_and(|f| f.captures.is_some());
        if !timed {
            s.advance();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use astral_core::types::Point;

    const SCRIPT: &str = r#"{
        "frames": [
            { "templates": [{ "id": "world_menu", "rect": [1800, 20, 1900, 80] }] },
            { "texts": [{ "text": "Interastral Guide", "rect": [60, 20, 420, 80] }], "captures": 2 },
            { "texts": [{ "text": "Survival Index", "rect": [460, 30, 700, 70] }] }
        ]
    }"#;

    #[test]
    fn test_parse_rejects_empty_script() {
        assert!(ReplayScript::parse(r#"{ "frames": [] }"#).is_err());
        assert!(ReplayScript::parse(r#"{ "frames": [{ "texts": [{ "text": "x", "rect": [5, 5, 5, 9] }] }] }"#).is_err());
    }

    #[test]
    fn test_frame_holds_until_input() {
        let backend = ReplayBackend::new(ReplayScript::parse(SCRIPT).unwrap());
        let everywhere = Rect::new(0, 0, 1920, 1080);

        let f1 = backend.capture().unwrap();
        let f2 = backend.capture().unwrap();
        assert!(backend
            .match_template(&f2, "world_menu", everywhere, 0.9)
            .unwrap()
            .is_some());

        backend.send(InputAction::key("f4")).unwrap();
        let f3 = backend.capture().unwrap();
        let texts = backend.recognize(&f3, everywhere).unwrap();
        assert_eq!(texts[0].text, "Interastral Guide");
        // Older frames still answer with what they showed.
        assert!(backend.recognize(&f1, everywhere).unwrap().is_empty());
    }

    #[test]
    fn test_timed_frame_advances_on_captures() {
        let backend = ReplayBackend::new(ReplayScript::parse(SCRIPT).unwrap());
        backend.send(InputAction::click(Point::new(1, 1))).unwrap();
        assert_eq!(backend.position(), 1);
        backend.capture().unwrap();
        backend.capture().unwrap();
        // Input does not skip a timed frame.
        backend.send(InputAction::key("esc")).unwrap();
        assert_eq!(backend.position(), 1);
        backend.capture().unwrap();
        assert_eq!(backend.position(), 2);
        // The last frame stays.
        backend.send(InputAction::key("esc")).unwrap();
        backend.capture().unwrap();
        assert_eq!(backend.position(), 2);
        assert_eq!(backend.actions().len(), 3);
    }

    #[test]
    fn test_region_filters_texts() {
        let backend = ReplayBackend::new(ReplayScript::parse(SCRIPT).unwrap());
        backend.send(InputAction::key("f4")).unwrap();
        let frame = backend.capture().unwrap();
        assert!(backend
            .recognize(&frame, Rect::new(1000, 500, 1100, 600))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCRIPT.as_bytes()).unwrap();
        let script = ReplayScript::load(file.path()).unwrap();
        assert_eq!(script.frames.len(), 3);
        assert_eq!(script.frames[1].captures, Some(2));
    }
}
