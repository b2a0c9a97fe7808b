use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use astral_core::error::Result;
use astral_core::event::OperationEvent;
use astral_core::types::Frame;

use crate::context::{Context, Round};
use crate::edge::{Edge, EdgeOn};
use crate::graph::Graph;
use crate::node::Node;
use crate::round::{OperationResult, Outcome, RoundResult};

/// A resumable unit of automated work described by a node/edge table.
///
/// Leaf operations declare a single start node and no edges.
pub trait Operation: Sized + Send + 'static {
    /// Display name used in logs and events.
    fn name(&self) -> String;

    fn nodes(&self) -> Vec<Node<Self>>;

    fn edges(&self) -> Vec<Edge> {
        Vec::new()
    }

    /// Reset per-run state. Returning a result ends the run before the
    /// graph starts.
    fn handle_init(&mut self, _ctx: &mut Context) -> Option<RoundResult> {
        None
    }

    fn handle_pause(&mut self, _ctx: &mut Context) {}

    fn handle_resume(&mut self, _ctx: &mut Context) {}

    /// Upper bound for one run. Top-level runs fall back to the configured
    /// `engine.operation_timeout_secs`.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// An `Operation` bound to its validated graph, ready to execute.
pub struct StateOperation<O: Operation> {
    op: O,
    graph: Graph<O>,
    name: String,
}

/// Why the step loop stopped early.
enum Interrupt {
    Cancelled,
    TimedOut,
}

impl<O: Operation> StateOperation<O> {
    /// Validate the operation's graph.
    pub fn new(op: O) -> Result<Self> {
        let name = op.name();
        let graph = Graph::new(&name, op.nodes(), op.edges())?;
        Ok(Self { op, graph, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &Graph<O> {
        &self.graph
    }

    pub fn inner(&self) -> &O {
        &self.op
    }

    pub fn inner_mut(&mut self) -> &mut O {
        &mut self.op
    }

    pub fn into_inner(self) -> O {
        self.op
    }

    /// Run the graph from its start node until a terminal result.
    ///
    /// May be called repeatedly; every call starts over with `handle_init`.
    pub fn execute(&mut self, ctx: &mut Context) -> OperationResult {
        let run_id = Uuid::new_v4().to_string();
        let depth = ctx.enter();
        let started = ctx.now();

        info!(op = %self.name, run_id = %run_id, depth, "Operation started");
        ctx.publish(OperationEvent::Started {
            run_id: run_id.clone(),
            operation: self.name.clone(),
            depth,
        });

        let result = self.run_loop(ctx, &run_id, depth);

        let elapsed_ms = ctx.now().saturating_duration_since(started).as_millis() as u64;
        if result.success {
            info!(op = %self.name, status = ?result.status, elapsed_ms, "Operation succeeded");
        } else {
            warn!(op = %self.name, status = ?result.status, elapsed_ms, "Operation failed");
        }
        ctx.publish(OperationEvent::Finished {
            run_id,
            operation: self.name.clone(),
            success: result.success,
            status: result.status.clone(),
            elapsed_ms,
        });
        ctx.leave();
        result
    }

    fn run_loop(&mut self, ctx: &mut Context, run_id: &str, depth: usize) -> OperationResult {
        if ctx.control.is_cancelled() {
            return self.interrupted(Interrupt::Cancelled);
        }
        if let Some(init) = self.op.handle_init(ctx) {
            debug!(op = %self.name, outcome = init.outcome.as_str(), "Init ended the run");
            return match init.outcome {
                Outcome::Success | Outcome::Fail => OperationResult::from_round(init),
                Outcome::Retry | Outcome::Wait => OperationResult {
                    success: false,
                    status: init.status,
                    data: init.data,
                },
            };
        }

        let timeout = self.op.timeout().or_else(|| {
            if depth == 0 {
                ctx.config.engine.operation_timeout_secs.map(Duration::from_secs)
            } else {
                None
            }
        });
        let started = ctx.now();
        let default_retries = ctx.config.engine.default_node_max_retries;

        let mut current = self.graph.start();
        let mut retries: u32 = 0;
        let mut attempt: u32 = 0;
        let mut round: u64 = 0;
        let mut last_frame: Option<Arc<Frame>> = None;
        let mut reuse_frame = false;
        let mut seen_generation = ctx.control.pause_generation();

        self.publish_node_entered(ctx, run_id, current);

        loop {
            if ctx.control.is_cancelled() {
                return self.interrupted(Interrupt::Cancelled);
            }

            if ctx.control.is_paused() || ctx.control.pause_generation() != seen_generation {
                if let Err(interrupt) = self.wait_paused(ctx, run_id) {
                    return self.interrupted(interrupt);
                }
                seen_generation = ctx.control.pause_generation();
                reuse_frame = false;
            }

            if let Some(limit) = timeout {
                if ctx.now().saturating_duration_since(started) >= limit {
                    return self.interrupted(Interrupt::TimedOut);
                }
            }

            let node = self.graph.node(current);
            let max_retries = node.max_retries.unwrap_or(default_retries);
            round += 1;
            attempt += 1;

            let capture_error = if node.screenshot_before_round && !reuse_frame {
                match ctx.screenshot() {
                    Ok(frame) => {
                        last_frame = Some(frame);
                        None
                    }
                    Err(e) => Some(e),
                }
            } else {
                None
            };

            let mut result = match capture_error {
                Some(e) => RoundResult::from_error(&e),
                None => {
                    let frame = if node.screenshot_before_round || reuse_frame {
                        last_frame.take()
                    } else {
                        None
                    };
                    let mut r = Round::new(ctx, frame, &node.name, attempt, round);
                    let result = (node.step)(&mut self.op, &mut r);
                    last_frame = r.into_screenshot();
                    result
                }
            };
            reuse_frame = result.reuse_screenshot;

            ctx.publish(OperationEvent::RoundFinished {
                run_id: run_id.to_string(),
                operation: self.name.clone(),
                node: node.name.clone(),
                outcome: result.outcome.as_str().to_string(),
                status: result.status.clone(),
                attempt,
            });

            if ctx.control.is_cancelled() {
                return self.interrupted(Interrupt::Cancelled);
            }

            match result.outcome {
                Outcome::Retry => {
                    retries += 1;
                    if retries >= max_retries {
                        warn!(
                            op = %self.name,
                            node = %node.name,
                            attempts = attempt,
                            max_retries,
                            reason = ?result.status,
                            "Retry budget exhausted"
                        );
                        result.outcome = Outcome::Fail;
                    } else {
                        warn!(
                            op = %self.name,
                            node = %node.name,
                            attempt = retries,
                            max_retries,
                            reason = ?result.status,
                            "Retrying node"
                        );
                        let wait = if result.wait.is_zero() {
                            ctx.config.engine.retry_backoff(retries)
                        } else {
                            result.wait
                        };
                        ctx.sleep(wait);
                        continue;
                    }
                }
                Outcome::Wait => {
                    debug!(op = %self.name, node = %node.name, wait_ms = result.wait.as_millis() as u64, "Waiting");
                    ctx.sleep(result.wait);
                    continue;
                }
                Outcome::Success | Outcome::Fail => {}
            }

            let on = if result.outcome == Outcome::Success {
                EdgeOn::Success
            } else {
                EdgeOn::Failure
            };
            match self.graph.next(&node.name, on, result.status.as_deref()) {
                Some(edge) => {
                    debug!(
                        op = %self.name,
                        from = %edge.from,
                        to = %edge.to,
                        status = ?result.status,
                        "Following edge"
                    );
                    let Some(next) = self.graph.index_of(&edge.to) else {
                        return OperationResult::failed(format!("unknown node '{}'", edge.to));
                    };
                    current = next;
                    retries = 0;
                    attempt = 0;
                    ctx.sleep(result.wait);
                    self.publish_node_entered(ctx, run_id, current);
                }
                None => return OperationResult::from_round(result),
            }
        }
    }

    /// Fire the pause hooks and block until resumed or cancelled.
    fn wait_paused(&mut self, ctx: &mut Context, run_id: &str) -> std::result::Result<(), Interrupt> {
        info!(op = %self.name, "Operation paused");
        self.op.handle_pause(ctx);
        ctx.publish(OperationEvent::Paused {
            run_id: run_id.to_string(),
            operation: self.name.clone(),
        });

        let poll = ctx.config.engine.pause_poll();
        while ctx.control.is_paused() {
            if ctx.control.is_cancelled() {
                return Err(Interrupt::Cancelled);
            }
            ctx.clock.sleep(poll);
        }
        if ctx.control.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }

        info!(op = %self.name, "Operation resumed");
        self.op.handle_resume(ctx);
        ctx.publish(OperationEvent::Resumed {
            run_id: run_id.to_string(),
            operation: self.name.clone(),
        });
        Ok(())
    }

    fn interrupted(&self, interrupt: Interrupt) -> OperationResult {
        match interrupt {
            Interrupt::Cancelled => {
                info!(op = %self.name, "Operation cancelled");
                OperationResult::cancelled()
            }
            Interrupt::TimedOut => {
                warn!(op = %self.name, "Operation timed out");
                OperationResult::timed_out()
            }
        }
    }

    fn publish_node_entered(&self, ctx: &Context, run_id: &str, idx: usize) {
        let node = &self.graph.node(idx).name;
        debug!(op = %self.name, node = %node, "Entering node");
        ctx.publish(OperationEvent::NodeEntered {
            run_id: run_id.to_string(),
            operation: self.name.clone(),
            node: node.clone(),
        });
    }
}
