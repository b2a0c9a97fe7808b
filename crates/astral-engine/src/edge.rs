use serde::{Deserialize, Serialize};

use crate::round::Outcome;

/// Which terminal outcome of the source node an edge reacts to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeOn {
    #[default]
    Success,
    Failure,
}

impl EdgeOn {
    /// Polarity for a terminal outcome; `None` for RETRY/WAIT.
    pub fn of(outcome: Outcome) -> Option<Self> {
        match outcome {
            Outcome::Success => Some(EdgeOn::Success),
            Outcome::Fail => Some(EdgeOn::Failure),
            Outcome::Retry | Outcome::Wait => None,
        }
    }
}

/// A transition between two nodes of an operation graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub on: EdgeOn,
    /// Only eligible when the source node's status equals this value.
    /// Unguarded edges are the fallback.
    #[serde(default)]
    pub status: Option<String>,
}

impl Edge {
    /// An edge taken when the source node succeeds.
    pub fn on_success(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            on: EdgeOn::Success,
            status: None,
        }
    }

    /// An edge taken when the source node fails.
    pub fn on_failure(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            on: EdgeOn::Failure,
            status: None,
        }
    }

    /// A success edge from a node back to itself.
    pub fn self_loop(node: impl Into<String>) -> Self {
        let node = node.into();
        Self::on_success(node.clone(), node)
    }

    /// Guard the edge with a required status.
    pub fn when(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}
