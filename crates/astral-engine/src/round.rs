use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use astral_core::error::AstralError;

/// Status reported when a run is cancelled through its `RunControl`.
pub const STATUS_CANCELLED: &str = "cancelled";
/// Status reported when an operation exceeds its timeout.
pub const STATUS_TIMEOUT: &str = "timeout";

/// What a single step invocation concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Fail,
    /// Run the same node again, consuming retry budget.
    Retry,
    /// Run the same node again without consuming retry budget.
    Wait,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Fail => "fail",
            Outcome::Retry => "retry",
            Outcome::Wait => "wait",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Outcome::Success | Outcome::Fail)
    }
}

/// The outcome of one step of an operation node.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundResult {
    pub outcome: Outcome,
    /// Edge-selection key and diagnostic label.
    pub status: Option<String>,
    /// Payload carried to the caller on success/failure.
    pub data: Option<serde_json::Value>,
    /// Delay before the next step runs.
    pub wait: Duration,
    /// Let the next round reuse the current screenshot instead of capturing.
    pub reuse_screenshot: bool,
}

impl RoundResult {
    fn with_outcome(outcome: Outcome) -> Self {
        Self {
            outcome,
            status: None,
            data: None,
            wait: Duration::ZERO,
            reuse_screenshot: false,
        }
    }

    pub fn success() -> Self {
        Self::with_outcome(Outcome::Success)
    }

    /// Success labelled with a status, used to pick a guarded edge.
    pub fn success_with(status: impl Into<String>) -> Self {
        Self::success().with_status(status)
    }

    pub fn fail(status: impl Into<String>) -> Self {
        Self::with_outcome(Outcome::Fail).with_status(status)
    }

    /// A retry always carries the reason, which becomes the failure status
    /// once the node's budget runs out.
    pub fn retry(reason: impl Into<String>) -> Self {
        Self::with_outcome(Outcome::Retry).with_status(reason)
    }

    pub fn wait(wait: Duration) -> Self {
        Self::with_outcome(Outcome::Wait).with_wait(wait)
    }

    /// A wait given in seconds; a non-finite or out-of-range delay fails.
    pub fn wait_secs(secs: f64) -> Self {
        Self::wait(Duration::ZERO).with_wait_secs(secs)
    }

    /// Forward a child operation's terminal result into the parent graph.
    pub fn by_op_result(result: &OperationResult) -> Self {
        let mut out = if result.success {
            Self::success()
        } else {
            Self::with_outcome(Outcome::Fail)
        };
        out.status = result.status.clone();
        out.data = result.data.clone();
        out
    }

    /// Map a collaborator error: transient recognition errors are retried,
    /// everything else fails the node immediately.
    pub fn from_error(err: &AstralError) -> Self {
        if err.is_transient() {
            Self::retry(err.to_string())
        } else {
            Self::fail(err.to_string())
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_wait_secs(self, secs: f64) -> Self {
        match Duration::try_from_secs_f64(secs.max(0.0)) {
            Ok(wait) => self.with_wait(wait),
            Err(e) => Self::fail(format!("invalid wait of {} seconds: {}", secs, e)),
        }
    }

    pub fn reusing_screenshot(mut self) -> Self {
        self.reuse_screenshot = true;
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub fn status_is(&self, status: &str) -> bool {
        self.status.as_deref() == Some(status)
    }
}

/// Terminal result of a whole operation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub status: Option<String>,
    pub data: Option<serde_json::Value>,
}

impl OperationResult {
    pub fn succeeded(status: Option<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            success: true,
            status,
            data,
        }
    }

    pub fn failed(status: impl Into<String>) -> Self {
        Self {
            success: false,
            status: Some(status.into()),
            data: None,
        }
    }

    pub fn cancelled() -> Self {
        Self::failed(STATUS_CANCELLED)
    }

    pub fn timed_out() -> Self {
        Self::failed(STATUS_TIMEOUT)
    }

    pub fn is_cancelled(&self) -> bool {
        !self.success && self.status.as_deref() == Some(STATUS_CANCELLED)
    }

    pub fn status_is(&self, status: &str) -> bool {
        self.status.as_deref() == Some(status)
    }

    /// Deserialize the payload, if any.
    pub fn data_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.data
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub(crate) fn from_round(result: RoundResult) -> Self {
        Self {
            success: result.outcome == Outcome::Success,
            status: result.status,
            data: result.data,
        }
    }
}
