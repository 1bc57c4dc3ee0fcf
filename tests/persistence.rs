use std::fs;

use taskdeck::config::Config;
use taskdeck::durable::DurableFile;
use taskdeck::store::{StoreWarning, TaskStore};
use tempfile::TempDir;

fn no_tag_warn(_: taskdeck::tags::TagWarning) {}
fn no_store_warn(_: StoreWarning) {}

fn file_in(dir: &TempDir) -> DurableFile {
    DurableFile::new(dir.path().join("tasks.json"), 3)
}

/// Make data-loss-guard `tracing` output visible under `--nocapture`.
/// `try_init` because test binaries share one global subscriber.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn save_load_round_trips_field_for_field() {
    let dir = TempDir::new().unwrap();
    let file = file_in(&dir);

    let mut store = TaskStore::default();
    store
        .add("Fix bug", "blocker", "crash on start", 1, "work,urgent", no_tag_warn)
        .unwrap();
    store.add("Write docs", "", "", 2, "docs", no_tag_warn).unwrap();
    store.set_done(1, true).unwrap();
    store.save(&file, no_store_warn).unwrap();

    let mut fresh = TaskStore::default();
    fresh.load(&file).unwrap();

    assert_eq!(fresh.tasks(), store.tasks());
    assert_eq!(fresh.next_id(), 3);
    assert!(fresh.get_by_id(1).unwrap().done);
    assert!(fresh.get_by_id(1).unwrap().completed_at.is_some());
    assert_eq!(fresh.get_by_id(2).unwrap().tags, vec!["docs".to_string()]);
}

#[test]
fn next_id_recomputed_from_max_id() {
    let dir = TempDir::new().unwrap();
    let file = file_in(&dir);

    let mut store = TaskStore::default();
    for name in ["a", "b", "c"] {
        store.add(name, "", "", 1, "", no_tag_warn).unwrap();
    }
    store.remove(3);
    store.save(&file, no_store_warn).unwrap();

    let mut fresh = TaskStore::default();
    fresh.load(&file).unwrap();
    // Highest surviving id is 2, so assignment resumes at 3.
    assert_eq!(fresh.next_id(), 3);

    let task = fresh.add("d", "", "", 1, "", no_tag_warn).unwrap();
    assert_eq!(task.id, 3);
}

#[test]
fn load_of_missing_file_starts_empty() {
    let dir = TempDir::new().unwrap();
    let file = file_in(&dir);

    let mut store = TaskStore::default();
    store.load(&file).unwrap();
    assert!(store.is_empty());
    assert_eq!(store.next_id(), 1);
}

#[test]
fn loads_legacy_file_with_single_tag_field() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tasks.json");
    let legacy = r#"[
        {
            "id": 5,
            "name": "old task",
            "comment": "",
            "description": "",
            "priority": 2,
            "tag": "legacy",
            "done": false,
            "created_at": "2023-05-01T10:00:00Z",
            "completed_at": "",
            "updated_at": "2023-05-01T10:00:00Z"
        }
    ]"#;
    fs::write(&path, legacy).unwrap();

    let file = DurableFile::new(&path, 3);
    let mut store = TaskStore::default();
    store.load(&file).unwrap();

    let task = store.get_by_id(5).unwrap();
    assert_eq!(task.tags, vec!["legacy".to_string()]);
    assert_eq!(store.next_id(), 6);
    assert_eq!(store.tags_with_stats()["legacy"].total, 1);
}

#[test]
fn saved_file_carries_legacy_tag_mirror() {
    let dir = TempDir::new().unwrap();
    let file = file_in(&dir);

    let mut store = TaskStore::default();
    store.add("t", "", "", 1, "alpha,beta", no_tag_warn).unwrap();
    store.save(&file, no_store_warn).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(file.path()).unwrap()).unwrap();
    assert_eq!(raw[0]["tag"], "alpha");
    assert_eq!(raw[0]["tags"][0], "alpha");
    assert_eq!(raw[0]["tags"][1], "beta");
    assert_eq!(raw[0]["completed_at"], "");
}

#[test]
fn empty_save_over_existing_tasks_warns_but_proceeds() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let file = file_in(&dir);

    let mut store = TaskStore::default();
    for name in ["a", "b", "c"] {
        store.add(name, "", "", 1, "", no_tag_warn).unwrap();
    }
    store.save(&file, no_store_warn).unwrap();

    store.remove(1);
    store.remove(2);
    store.remove(3);

    let mut warnings = Vec::new();
    store.save(&file, |w| warnings.push(w)).unwrap();
    assert_eq!(warnings, vec![StoreWarning::AllTasksDropped { previous: 3 }]);

    // The deliberate bulk delete was honored on disk.
    let mut fresh = TaskStore::default();
    fresh.load(&file).unwrap();
    assert!(fresh.is_empty());
}

#[test]
fn steep_shrink_warns_once() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let file = file_in(&dir);

    let mut store = TaskStore::default();
    for i in 0..10 {
        store.add(&format!("task {i}"), "", "", 1, "", no_tag_warn).unwrap();
    }
    store.save(&file, no_store_warn).unwrap();

    for id in 1..=7 {
        store.remove(id);
    }

    let mut warnings = Vec::new();
    store.save(&file, |w| warnings.push(w)).unwrap();
    assert_eq!(
        warnings,
        vec![StoreWarning::SteepShrink {
            previous: 10,
            current: 3
        }]
    );
}

#[test]
fn small_collections_shrink_without_warning() {
    let dir = TempDir::new().unwrap();
    let file = file_in(&dir);

    // Below guard.min_previous, dropping most tasks is routine cleanup.
    let mut store = TaskStore::default();
    store.add("a", "", "", 1, "", no_tag_warn).unwrap();
    store.add("b", "", "", 1, "", no_tag_warn).unwrap();
    store.save(&file, no_store_warn).unwrap();

    store.remove(1);
    let mut warnings = Vec::new();
    store.save(&file, |w| warnings.push(w)).unwrap();
    assert!(warnings.is_empty());
}

#[test]
fn guard_tracks_count_across_load() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let file = file_in(&dir);

    let mut store = TaskStore::default();
    for i in 0..5 {
        store.add(&format!("task {i}"), "", "", 1, "", no_tag_warn).unwrap();
    }
    store.save(&file, no_store_warn).unwrap();

    // A fresh process loads five tasks, deletes them all, saves: the guard
    // still fires because load seeded the last-saved count.
    let mut fresh = TaskStore::default();
    fresh.load(&file).unwrap();
    for id in 1..=5 {
        fresh.remove(id);
    }
    let mut warnings = Vec::new();
    fresh.save(&file, |w| warnings.push(w)).unwrap();
    assert_eq!(warnings, vec![StoreWarning::AllTasksDropped { previous: 5 }]);
}

#[test]
fn compact_indent_config_round_trips() {
    let dir = TempDir::new().unwrap();
    let file = file_in(&dir);

    let mut config = Config::default();
    config.store.indent = 0;
    let mut store = TaskStore::new(config);
    store.add("t", "", "", 1, "work", no_tag_warn).unwrap();
    store.save(&file, no_store_warn).unwrap();

    let text = fs::read_to_string(file.path()).unwrap();
    assert!(!text.contains('\n'));

    let mut fresh = TaskStore::default();
    fresh.load(&file).unwrap();
    assert_eq!(fresh.len(), 1);
}
