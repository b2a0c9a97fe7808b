use std::fmt;

use crate::context::Round;
use crate::round::RoundResult;

/// Step function of a node: runs against the operation's own state and the
/// current round (context, cached screenshot, counters).
pub type StepFn<O> = fn(&mut O, &mut Round<'_>) -> RoundResult;

/// A named step in an operation's graph.
pub struct Node<O> {
    /// Unique within the owning graph.
    pub name: String,
    pub step: StepFn<O>,
    /// Retry budget; `None` uses the engine default.
    pub max_retries: Option<u32>,
    pub is_start: bool,
    /// Capture a fresh screenshot before each call.
    pub screenshot_before_round: bool,
}

impl<O> Node<O> {
    pub fn new(name: impl Into<String>, step: StepFn<O>) -> Self {
        Self {
            name: name.into(),
            step,
            max_retries: None,
            is_start: false,
            screenshot_before_round: true,
        }
    }

    /// Mark this node as the graph's entry point.
    pub fn start(mut self) -> Self {
        self.is_start = true;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Skip the pre-round capture; the step captures on demand.
    pub fn without_screenshot(mut self) -> Self {
        self.screenshot_before_round = false;
        self
    }
}

impl<O> Clone for Node<O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            step: self.step,
            max_retries: self.max_retries,
            is_start: self.is_start,
            screenshot_before_round: self.screenshot_before_round,
        }
    }
}

impl<O> fmt::Debug for Node<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("max_retries", &self.max_retries)
            .field("is_start", &self.is_start)
            .field("screenshot_before_round", &self.screenshot_before_round)
            .finish()
    }
}
