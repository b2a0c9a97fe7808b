use std::path::Path;

use astral_app::ops::{
    BackToWorld, ChallengeMission, ChooseChallengeTimes, ChooseSupport, ChooseTeam,
    GuideCheckPower, GuideChooseTab, GuideOpen, GuideTransport, MoveInteract, MoveWithoutPos,
    OrnamentExtractionRun, SimUniChooseBless, SimUniRun,
};
use astral_app::{AreaBook, MissionCatalog, PowerBudget, PowerPlan, ScreenState, SqliteProgressStore, TrailblazePowerApp};
use astral_core::config::{AppConfig, MissionKind};
use astral_core::traits::ScreenAreas;
use astral_engine::{Operation, StateOperation};

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

impl CheckResult {
    fn ok(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ok: true,
            detail: detail.into(),
        }
    }

    fn issue(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Check the configuration and every operation graph; returns the number
/// of issues found.
pub fn run_validate(config: &AppConfig, config_path: &Path) -> usize {
    let mut checks = Vec::new();

    let areas_path = config.areas_path(config_path);
    let book = match AreaBook::load_or_builtin(&areas_path) {
        Ok(book) => {
            checks.push(CheckResult::ok(
                "Areas",
                format!("{} areas ({})", book.len(), source(&areas_path)),
            ));
            Some(book)
        }
        Err(e) => {
            checks.push(CheckResult::issue("Areas", e.to_string()));
            None
        }
    };
    if let Some(book) = &book {
        checks.push(check_markers(book));
    }

    let catalog = match MissionCatalog::new(config.missions.clone()) {
        Ok(catalog) => {
            checks.push(CheckResult::ok("Missions", format!("{} missions", catalog.len())));
            Some(catalog)
        }
        Err(e) => {
            checks.push(CheckResult::issue("Missions", e.to_string()));
            None
        }
    };

    if let Some(catalog) = &catalog {
        checks.push(check_plan(config, catalog));
        checks.extend(check_graphs(catalog));
    }

    checks.push(check_database(config));

    let mut ok_count = 0;
    let mut fail_count = 0;
    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
    fail_count
}

fn source(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        "built-in".to_string()
    }
}

/// Every screen state must be recognisable with the loaded areas.
fn check_markers(book: &AreaBook) -> CheckResult {
    let states = [
        ScreenState::NormalWorld,
        ScreenState::PhoneMenu,
        ScreenState::Guide(None),
        ScreenState::Battle,
        ScreenState::BattleFail,
        ScreenState::EmptyToClose,
        ScreenState::SimUniBless,
        ScreenState::SimUniEvent,
        ScreenState::ChallengeComplete,
    ];
    let missing: Vec<String> = states
        .iter()
        .filter_map(|s| s.marker())
        .filter(|(screen, area)| book.get_area(screen, area).is_err())
        .map(|(screen, area)| format!("{}.{}", screen, area))
        .collect();
    if missing.is_empty() {
        CheckResult::ok("Screen states", format!("{} markers found", states.len()))
    } else {
        CheckResult::issue("Screen states", format!("missing {}", missing.join(", ")))
    }
}

fn check_plan(config: &AppConfig, catalog: &MissionCatalog) -> CheckResult {
    let store = match SqliteProgressStore::in_memory() {
        Ok(store) => store,
        Err(e) => return CheckResult::issue("Plan", e.to_string()),
    };
    match PowerPlan::load(&config.plan, catalog, Box::new(store)) {
        Ok(plan) if plan.is_empty() => CheckResult::ok("Plan", "empty"),
        Ok(plan) => {
            let runs: u32 = plan.entries().iter().map(|e| e.plan_times).sum();
            CheckResult::ok(
                "Plan",
                format!("{} entries, {} runs", plan.entries().len(), runs),
            )
        }
        Err(e) => CheckResult::issue("Plan", e.to_string()),
    }
}

fn graph<O: Operation>(op: O) -> CheckResult {
    let name = op.name();
    match StateOperation::new(op) {
        Ok(op) => CheckResult::ok(
            format!("Graph {}", name),
            format!(
                "{} nodes, {} edges",
                op.graph().nodes().len(),
                op.graph().edges().len()
            ),
        ),
        Err(e) => CheckResult::issue(format!("Graph {}", name), e.to_string()),
    }
}

fn check_graphs(catalog: &MissionCatalog) -> Vec<CheckResult> {
    let mut checks = vec![
        graph(BackToWorld::new()),
        graph(GuideOpen::new()),
        graph(GuideChooseTab::new("Survival Index")),
        graph(GuideCheckPower::new()),
        graph(ChooseChallengeTimes::new(1)),
        graph(ChooseTeam::new(1)),
        graph(ChooseSupport::new("support")),
        graph(MoveInteract::new("interact")),
        graph(MoveWithoutPos::new(0.0, 1.0)),
        graph(SimUniChooseBless::new(Vec::new())),
    ];
    if let Ok(store) = SqliteProgressStore::in_memory() {
        if let Ok(plan) = PowerPlan::load(&[], catalog, Box::new(store)) {
            checks.push(graph(TrailblazePowerApp::new(plan)));
        }
    }

    let budget = PowerBudget::default();
    for mission in catalog.iter() {
        checks.push(graph(GuideTransport::new(mission.clone())));
        checks.push(match mission.kind {
            MissionKind::Calyx { .. } => graph(ChallengeMission::new(mission.clone(), 1, budget)),
            MissionKind::SimulatedUniverse { .. } => graph(SimUniRun::new(mission.clone(), budget)),
            MissionKind::OrnamentExtraction { .. } => {
                graph(OrnamentExtractionRun::new(mission.clone(), budget))
            }
        });
    }
    checks
}

fn check_database(config: &AppConfig) -> CheckResult {
    let path = config.progress_db_path();
    match SqliteProgressStore::open(&path) {
        Ok(_) => CheckResult::ok("Progress", path.display().to_string()),
        Err(e) => CheckResult::issue("Progress", e.to_string()),
    }
}
