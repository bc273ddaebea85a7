//! Integration tests for persistence

use quote_sync::alert::{Alert, AlertDirection};
use quote_sync::store::{DisplayPreferences, FileStore, KeyValueStore, Persistence};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::assert_err;

#[test]
fn test_file_backed_persistence_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");

    let alert = Alert::new("AAPL", dec!(250), AlertDirection::Below, Some(dec!(260))).unwrap();
    {
        let persistence = Persistence::new(Arc::new(FileStore::open(&path).unwrap()), "qs:");
        persistence
            .save_symbols(&["AAPL".to_string(), "SPY".to_string()])
            .unwrap();
        persistence
            .save_holdings(&HashMap::from([("SPY".to_string(), dec!(3))]))
            .unwrap();
        persistence.save_alerts(std::slice::from_ref(&alert)).unwrap();
        persistence
            .save_preferences(&DisplayPreferences {
                decimals: 4,
                sound_enabled: true,
                ..Default::default()
            })
            .unwrap();
    }

    let persistence = Persistence::new(Arc::new(FileStore::open(&path).unwrap()), "qs:");
    assert_eq!(persistence.load_symbols().unwrap(), vec!["AAPL", "SPY"]);
    assert_eq!(persistence.load_holdings().unwrap()["SPY"], dec!(3));
    assert_eq!(persistence.load_alerts().unwrap(), vec![alert]);

    let prefs = persistence.load_preferences().unwrap();
    assert_eq!(prefs.decimals, 4);
    assert!(prefs.sound_enabled);
}

#[test]
fn test_prefixes_isolate_profiles() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::open(dir.path().join("state.json")).unwrap());
    let work = Persistence::new(store.clone(), "work:");
    let home = Persistence::new(store.clone(), "home:");

    work.save_symbols(&["MSFT".to_string()]).unwrap();
    home.save_symbols(&["TSLA".to_string()]).unwrap();

    assert_eq!(work.clear().unwrap(), 1);
    assert!(work.load_symbols().unwrap().is_empty());
    assert_eq!(home.load_symbols().unwrap(), vec!["TSLA"]);
    assert!(store.get("home:symbols").unwrap().is_some());
}

#[test]
fn test_corrupt_file_fails_to_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "[1, 2").unwrap();

    assert_err!(FileStore::open(&path));
}
