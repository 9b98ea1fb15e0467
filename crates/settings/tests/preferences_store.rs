use scratchpad_settings::{PreferencesStore, ScratchPreferences};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn load_missing_file_returns_defaults() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("preferences.json");

    let store = PreferencesStore::load(&path).expect("load defaults");
    let prefs = store.preferences();
    assert_eq!(prefs.naming.file_prefix, "scratch");
    assert_eq!(prefs.naming.default_extension, ".txt");
    assert_eq!(prefs.storage.solution_subdir, PathBuf::from(".vs/ScratchFiles"));
    assert_eq!(prefs.timing.rebuild_debounce(), Duration::from_millis(300));
    assert_eq!(prefs.timing.autosave_debounce(), Duration::from_millis(1000));
    assert!(prefs.global_root().ends_with("ScratchFiles"));
}

#[test]
fn save_and_reload_roundtrip() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("preferences.json");
    let custom_root = temp.path().join("scratch-home");

    let mut store = PreferencesStore::new(path.clone(), ScratchPreferences::default());
    store
        .update(|prefs| {
            prefs.storage.global_root = Some(custom_root.clone());
            prefs.naming.file_prefix = "note".to_string();
            prefs.naming.default_extension = "md".to_string();
            prefs.timing.autosave_debounce_ms = 750;
        })
        .expect("save");

    let reloaded = PreferencesStore::load(&path).expect("reload");
    let prefs = reloaded.preferences();
    assert_eq!(prefs.global_root(), custom_root);
    assert_eq!(prefs.naming.file_prefix, "note");
    assert_eq!(prefs.naming.default_extension, ".md");
    assert_eq!(prefs.timing.autosave_debounce_ms, 750);

    let names: Vec<_> = fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("preferences.json")]);
}

#[test]
fn overwrite_sanitizes_invalid_values() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("preferences.json");

    let mut store = PreferencesStore::load(&path).expect("default");
    let mut prefs = store.preferences().clone();
    prefs.naming.file_prefix = "../escape".to_string();
    prefs.naming.default_extension = String::new();
    prefs.timing.rebuild_debounce_ms = 0;
    prefs.timing.settle_delay_ms = 90_000;
    prefs.storage.global_root = Some(PathBuf::new());

    store.overwrite(prefs).expect("overwrite");

    let current = store.preferences();
    assert_eq!(current.naming.file_prefix, "scratch");
    assert_eq!(current.naming.default_extension, ".txt");
    assert_eq!(current.timing.rebuild_debounce_ms, 300);
    assert_eq!(current.timing.settle_delay_ms, 10_000);
    assert!(current.storage.global_root.is_none());
}

#[test]
fn legacy_version_is_upgraded_on_load() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("preferences.json");
    fs::write(
        &path,
        r#"{
            "version": 0,
            "naming": { "file_prefix": "", "default_extension": ".log" },
            "timing": { "autosave_debounce_ms": 10 }
        }"#,
    )
    .expect("write legacy prefs");

    let store = PreferencesStore::load(&path).expect("load legacy file");
    let prefs = store.preferences();
    assert_eq!(
        prefs.version, 1,
        "legacy preferences should be upgraded to schema version 1"
    );
    assert_eq!(prefs.naming.file_prefix, "scratch");
    assert_eq!(prefs.naming.default_extension, ".log");
    assert_eq!(
        prefs.timing.autosave_debounce_ms, 50,
        "autosave debounce is clamped to its minimum"
    );
    assert_eq!(prefs.timing.rebuild_debounce_ms, 300);
}

#[test]
fn malformed_file_reports_parse_error() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("preferences.json");
    fs::write(&path, "{ not json").expect("write");
    assert!(PreferencesStore::load(&path).is_err());
}
