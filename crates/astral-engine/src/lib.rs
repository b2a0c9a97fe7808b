//! Operation graph engine.
//!
//! An [`Operation`] declares named step functions ([`Node`]) and guarded
//! transitions ([`Edge`]); [`StateOperation`] validates that table once and
//! runs it against a [`Context`], handling retries, waits, pause/resume and
//! cancellation.

pub mod area;
pub mod context;
pub mod control;
pub mod edge;
pub mod graph;
pub mod node;
pub mod operation;
pub mod round;
pub mod text;

pub use context::{Context, ContextBuilder, Round};
pub use control::RunControl;
pub use edge::{Edge, EdgeOn};
pub use graph::Graph;
pub use node::{Node, StepFn};
pub use operation::{Operation, StateOperation};
pub use round::{OperationResult, Outcome, RoundResult, STATUS_CANCELLED, STATUS_TIMEOUT};
