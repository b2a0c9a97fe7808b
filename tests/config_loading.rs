use std::io::Write;

use astral_app::{AreaBook, MissionCatalog, PowerPlan, SqliteProgressStore};
use astral_core::config::{AppConfig, MissionKind};
use astral_core::error::AstralError;
use astral_core::traits::ProgressStore;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[engine]
default_node_max_retries = 5
pause_poll_ms = 50
retry_initial_backoff_ms = 200

[game]
key_guide = "f4"
walk_speed = 25.0

[storage]
progress_db = "/tmp/astral-test/progress.db"

[sim_uni]
bless_priority = ["Dogma", "Outrage"]

[[missions]]
id = "calyx_gold_memory"
name = "Bud of Memories"
category = "Calyx (Golden)"
region = "Jarilo-VI"
kind = { type = "calyx", power = 10 }

[[missions]]
id = "su_world_8"
name = "Simulated Universe: World 8"
category = "Simulated Universe"
kind = { type = "simulated_universe", world = 8 }

[[missions]]
id = "oe_sulfago"
name = "Divergent Universe: Sulfago"
category = "Ornament Extraction"
kind = { type = "ornament_extraction" }

[[plan]]
id = "memory"
mission_id = "calyx_gold_memory"
plan_times = 12
team_num = 2
support = "none"

[[plan]]
mission_id = "su_world_8"
plan_times = 1
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.engine.default_node_max_retries, 5);
    assert_eq!(config.engine.pause_poll_ms, 50);
    assert_eq!(config.engine.retry_max_backoff_ms, 5000);
    assert_eq!(config.game.walk_speed, 25.0);
    assert_eq!(config.game.key_esc, "esc");
    assert_eq!(config.sim_uni.bless_priority, vec!["Dogma", "Outrage"]);
    assert_eq!(config.missions.len(), 3);
    assert_eq!(config.missions[0].region.as_deref(), Some("Jarilo-VI"));
    assert_eq!(config.missions[2].kind, MissionKind::OrnamentExtraction { power: 40 });
    assert_eq!(config.plan[0].key(), "memory");
    assert_eq!(config.plan[1].key(), "su_world_8");
    assert_eq!(config.plan[1].team_num, 1);

    let catalog = MissionCatalog::new(config.missions.clone()).expect("catalog");
    let store = SqliteProgressStore::in_memory().expect("store");
    let plan = PowerPlan::load(&config.plan, &catalog, Box::new(store)).expect("plan");
    assert_eq!(plan.entries().len(), 2);
    assert_eq!(plan.entries()[0].support, None);
    assert_eq!(plan.next_pending(), Some(0));
}

#[test]
fn test_missing_config_file() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/astral.toml")).unwrap_err();
    assert!(matches!(err, AstralError::ConfigNotFound(_)));
}

#[test]
fn test_plan_with_unknown_mission_is_rejected() {
    let config: AppConfig = toml::from_str(
        r#"
[[plan]]
mission_id = "calyx_missing"
plan_times = 3
"#,
    )
    .unwrap();
    let catalog = MissionCatalog::new(config.missions.clone()).unwrap();
    let store = SqliteProgressStore::in_memory().unwrap();
    let err = PowerPlan::load(&config.plan, &catalog, Box::new(store)).unwrap_err();
    assert!(matches!(err, AstralError::UnknownMission(_)));
}

#[test]
fn test_custom_area_book_next_to_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("astral.toml");
    std::fs::write(&config_path, "[areas]\npath = \"my_areas.toml\"\n").unwrap();
    std::fs::write(
        dir.path().join("my_areas.toml"),
        r#"
[[screens]]
name = "world"

  [[screens.areas]]
  name = "menu_icon"
  rect = [1800, 20, 1900, 80]
  template_id = "world_menu"
"#,
    )
    .unwrap();

    let config = AppConfig::load(&config_path).unwrap();
    let book = AreaBook::load_or_builtin(&config.areas_path(&config_path)).unwrap();
    assert_eq!(book.len(), 1);

    // Falls back to the built-in book when the file is absent.
    std::fs::remove_file(dir.path().join("my_areas.toml")).unwrap();
    let book = AreaBook::load_or_builtin(&config.areas_path(&config_path)).unwrap();
    assert!(book.len() > 1);
}

#[test]
fn test_progress_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("progress.db");
    {
        let store = SqliteProgressStore::open(&path).unwrap();
        store.save("memory", 4).unwrap();
    }
    let store = SqliteProgressStore::open(&path).unwrap();
    assert_eq!(store.load("memory").unwrap(), 4);
    assert_eq!(store.list().unwrap()[0].plan_item_id, "memory");
    assert!(store.reset("memory").unwrap());
    assert_eq!(store.load("memory").unwrap(), 0);
}
