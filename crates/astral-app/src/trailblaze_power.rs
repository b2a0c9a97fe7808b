//! Spend Trailblaze Power on the configured plan.
//!
//! The app checks the plan and the counters once, then runs one confirmed
//! unit per round of its `execute` node, charging the budget and saving
//! plan progress after every unit.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use astral_core::config::MissionKind;
use astral_engine::{Context, Edge, Node, Operation, OperationResult, Round, RoundResult};

use crate::ops::{BackToWorld, ChallengeMission, GuideCheckPower, OrnamentExtractionRun, SimUniRun};
use crate::plan::{PlanEntry, PlanProgress, PowerBudget, PowerDecision, PowerPlan, UnitReport};

const STATUS_WITH_PLAN: &str = "with plan";
const STATUS_UNIT_DONE: &str = "unit done";

/// Why the app stopped spending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerExit {
    NoPlan,
    PlanComplete,
    Exhausted,
}

impl PowerExit {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerExit::NoPlan => "no plan",
            PowerExit::PlanComplete => "plan complete",
            PowerExit::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for PowerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a finished app run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerReport {
    pub runs: u32,
    pub power_used: u32,
    pub qty_used: u32,
    pub power_left: u32,
    pub qty_left: u32,
    pub exit: PowerExit,
    pub progress: Vec<PlanProgress>,
}

pub struct TrailblazePowerApp {
    plan: PowerPlan,
    budget: PowerBudget,
    spent: UnitReport,
    exit: Option<PowerExit>,
    /// Mission of the last finished unit; the character still stands at it.
    last_mission: Option<String>,
}

impl TrailblazePowerApp {
    pub fn new(plan: PowerPlan) -> Self {
        Self {
            plan,
            budget: PowerBudget::default(),
            spent: UnitReport::default(),
            exit: None,
            last_mission: None,
        }
    }

    pub fn plan(&self) -> &PowerPlan {
        &self.plan
    }

    fn exit_with(&mut self, exit: PowerExit) -> RoundResult {
        self.exit = Some(exit);
        RoundResult::success_with(exit.as_str())
    }

    fn back_to_world(&mut self, round: &mut Round<'_>) -> RoundResult {
        RoundResult::by_op_result(&round.run(BackToWorld::new()))
    }

    fn check_task(&mut self, _round: &mut Round<'_>) -> RoundResult {
        if self.plan.is_empty() {
            return self.exit_with(PowerExit::NoPlan);
        }
        if self.plan.next_pending().is_none() {
            return self.exit_with(PowerExit::PlanComplete);
        }
        RoundResult::success_with(STATUS_WITH_PLAN)
    }

    fn check_power(&mut self, round: &mut Round<'_>) -> RoundResult {
        let result = round.run(GuideCheckPower::new());
        if !result.success {
            return RoundResult::by_op_result(&result);
        }
        let Some(budget) = result.data_as::<PowerBudget>() else {
            return RoundResult::fail("power check returned no counters");
        };
        self.budget = budget;
        RoundResult::success_with("power checked")
    }

    /// Run the inner workflow for one unit of the plan entry.
    ///
    /// A unit of the mission the previous unit finished skips the guide and
    /// reopens the mission in place.
    fn run_unit(&self, round: &mut Round<'_>, entry: &PlanEntry, runs: u32) -> OperationResult {
        let mission = entry.mission.clone();
        let support = entry.support.clone();
        let need_transport = self.last_mission.as_deref() != Some(mission.id.as_str());
        if !need_transport {
            info!(mission = %mission.id, "Already at the mission, skipping transport");
        }
        match &mission.kind {
            MissionKind::Calyx { .. } => {
                let op = ChallengeMission::new(mission, runs, self.budget)
                    .with_team(entry.team_num, support);
                if need_transport {
                    round.run(op)
                } else {
                    round.run(op.without_transport())
                }
            }
            MissionKind::SimulatedUniverse { .. } => {
                let priority = round.ctx.config.sim_uni.bless_priority.clone();
                let op = SimUniRun::new(mission, self.budget).with_bless_priority(priority);
                if need_transport {
                    round.run(op)
                } else {
                    round.run(op.without_transport())
                }
            }
            MissionKind::OrnamentExtraction { .. } => {
                let op = OrnamentExtractionRun::new(mission, self.budget)
                    .with_team(entry.team_num, support);
                if need_transport {
                    round.run(op)
                } else {
                    round.run(op.without_transport())
                }
            }
        }
    }

    fn execute(&mut self, round: &mut Round<'_>) -> RoundResult {
        let Some(idx) = self.plan.next_pending() else {
            return self.exit_with(PowerExit::PlanComplete);
        };
        let Some(entry) = self.plan.entry(idx).cloned() else {
            return RoundResult::fail(format!("no plan entry at {}", idx));
        };

        let runs = match self.budget.decide(&entry) {
            PowerDecision::Run(runs) => runs,
            PowerDecision::PlanComplete => return self.exit_with(PowerExit::PlanComplete),
            PowerDecision::Exhausted => {
                warn!(
                    plan = %entry.key,
                    power = self.budget.power,
                    qty = self.budget.qty,
                    "Not enough Trailblaze Power for the next run"
                );
                return self.exit_with(PowerExit::Exhausted);
            }
        };

        info!(plan = %entry.key, mission = %entry.mission.id, runs, "Running plan unit");
        let result = self.run_unit(round, &entry, runs);
        if !result.success {
            self.last_mission = None;
            return RoundResult::by_op_result(&result);
        }
        self.last_mission = Some(entry.mission.id.clone());
        let Some(report) = result.data_as::<UnitReport>() else {
            return RoundResult::fail("unit finished without a report");
        };

        self.budget.charge(&report);
        self.spent.runs += report.runs;
        self.spent.power_used += report.power_used;
        self.spent.qty_used += report.qty_used;
        if let Err(e) = self.plan.record_runs(idx, report.runs) {
            return RoundResult::from_error(&e);
        }
        RoundResult::success_with(STATUS_UNIT_DONE)
    }

    fn finish(&mut self, round: &mut Round<'_>) -> RoundResult {
        let Some(exit) = self.exit else {
            return RoundResult::fail("finished without an exit");
        };
        let back = round.run(BackToWorld::new());
        if !back.success {
            return RoundResult::by_op_result(&back);
        }
        let report = PowerReport {
            runs: self.spent.runs,
            power_used: self.spent.power_used,
            qty_used: self.spent.qty_used,
            power_left: self.budget.power,
            qty_left: self.budget.qty,
            exit,
            progress: self.plan.progress(),
        };
        info!(
            exit = %exit,
            runs = report.runs,
            power_used = report.power_used,
            qty_used = report.qty_used,
            "Trailblaze Power done"
        );
        match serde_json::to_value(&report) {
            Ok(data) => RoundResult::success_with(exit.as_str()).with_data(data),
            Err(e) => RoundResult::fail(e.to_string()),
        }
    }
}

impl Operation for TrailblazePowerApp {
    fn name(&self) -> String {
        "trailblaze_power".into()
    }

    fn nodes(&self) -> Vec<Node<Self>> {
        vec![
            Node::new("back_to_world", Self::back_to_world).start(),
            Node::new("check_task", Self::check_task).without_screenshot(),
            Node::new("check_power", Self::check_power),
            Node::new("execute", Self::execute).without_screenshot(),
            Node::new("finish", Self::finish),
        ]
    }

    fn edges(&self) -> Vec<Edge> {
        vec![
            Edge::on_success("back_to_world", "check_task"),
            Edge::on_success("check_task", "check_power").when(STATUS_WITH_PLAN),
            Edge::on_success("check_task", "finish"),
            Edge::on_success("check_power", "execute"),
            Edge::self_loop("execute").when(STATUS_UNIT_DONE),
            Edge::on_success("execute", "finish"),
        ]
    }

    fn handle_init(&mut self, _ctx: &mut Context) -> Option<RoundResult> {
        self.budget = PowerBudget::default();
        self.spent = UnitReport::default();
        self.exit = None;
        self.last_mission = None;
        match self.plan.reload() {
            Ok(()) => None,
            Err(e) => Some(RoundResult::fail(e.to_string())),
        }
    }
}
