//! ProgressLedger over a real JSON file

use std::fs;
use std::path::{Path, PathBuf};

use strum_trainer::practice::{JsonFileStore, ProgressLedger, ProgressStore};
use strum_trainer::ProgressError;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "strum_trainer_{}_{}.json",
        name,
        std::process::id()
    ))
}

fn open(path: &Path) -> ProgressLedger {
    ProgressLedger::open(Box::new(JsonFileStore::new(path)), 60).unwrap()
}

#[test]
fn test_best_survives_reopen_and_never_decreases() {
    let path = temp_path("reopen");
    let _ = fs::remove_file(&path);

    {
        let mut ledger = open(&path);
        assert!(ledger.record_accuracy("C / Am", "I-V-vi-IV", 45).unwrap().is_none());
        let notice = ledger.record_accuracy("C / Am", "I-V-vi-IV", 75).unwrap();
        assert_eq!(notice.map(|n| n.accuracy), Some(75));
        assert!(ledger.record_accuracy("C / Am", "I-V-vi-IV", 30).unwrap().is_none());
        assert_eq!(ledger.best("C / Am", "I-V-vi-IV"), Some(75));
    }

    let mut reopened = open(&path);
    assert_eq!(reopened.best("C / Am", "I-V-vi-IV"), Some(75));
    // Already passed in an earlier run: no second notice
    assert!(reopened
        .record_accuracy("C / Am", "I-V-vi-IV", 95)
        .unwrap()
        .is_none());
    assert_eq!(reopened.best("C / Am", "I-V-vi-IV"), Some(95));

    let _ = fs::remove_file(&path);
}

#[test]
fn test_file_layout_is_tone_then_progression() {
    let path = temp_path("layout");
    let _ = fs::remove_file(&path);

    let mut ledger = open(&path);
    ledger.record_accuracy("G / Em", "I-IV-V", 50).unwrap();
    ledger.record_accuracy("G / Em", "ii-V-I", 80).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["G / Em"]["I-IV-V"], 50);
    assert_eq!(json["G / Em"]["ii-V-I"], 80);

    let _ = fs::remove_file(&path);
}

#[test]
fn test_corrupt_file_refuses_to_open() {
    let path = temp_path("corrupt");
    fs::write(&path, "[1, 2,").unwrap();

    let result = ProgressLedger::open(Box::new(JsonFileStore::new(&path)), 60);
    assert!(matches!(result, Err(ProgressError::Corrupt { .. })));

    let mut store = JsonFileStore::new(&path);
    assert!(store.load().is_err());
    let _ = fs::remove_file(&path);
}
