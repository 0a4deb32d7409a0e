use adaad6_config::AdaadConfig;
use adaad6_ledger::{
    append_event, ensure_ledger, ledger_path, read_events, utc_now_iso_z, verify_chain,
    LedgerError,
};
use serde_json::{json, Map, Value};

fn ledger_cfg(home: &std::path::Path) -> AdaadConfig {
    AdaadConfig {
        home: home.display().to_string(),
        ledger_enabled: true,
        ..AdaadConfig::default()
    }
}

fn payload(value: i64) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("value".to_string(), json!(value));
    map
}

#[test]
fn append_then_read_round_trips() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = ledger_cfg(tmp.path());

    let first = append_event(&cfg, "alpha", payload(1), &utc_now_iso_z(), "test").expect("append");
    let second = append_event(&cfg, "beta", payload(2), &utc_now_iso_z(), "test").expect("append");

    let events = read_events(&cfg, None).expect("read");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], first);
    assert_eq!(events[1], second);
    assert_eq!(events[0]["prev_hash"], Value::Null);
    assert_eq!(events[1]["prev_hash"], events[0]["hash"]);
    assert!(verify_chain(&events));
}

#[test]
fn event_shape_is_exact() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = ledger_cfg(tmp.path());

    let event = append_event(&cfg, "alpha", payload(1), "2026-01-01T00:00:00Z", "probe")
        .expect("append");
    let object = event.as_object().expect("object");
    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        ["actor", "event_id", "hash", "payload", "prev_hash", "schema_version", "ts", "type"]
    );
    assert_eq!(event["ts"], json!("2026-01-01T00:00:00Z"));
    assert_eq!(event["actor"], json!("probe"));
    let hash = event["hash"].as_str().expect("hash");
    assert_eq!(hash.len(), 64);
}

#[test]
fn tampering_breaks_the_chain() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = ledger_cfg(tmp.path());

    append_event(&cfg, "alpha", payload(1), &utc_now_iso_z(), "test").expect("append");
    append_event(&cfg, "beta", payload(2), &utc_now_iso_z(), "test").expect("append");

    let mut events = read_events(&cfg, None).expect("read");
    events[1]["payload"]["value"] = json!(999);
    assert!(!verify_chain(&events));

    // Swapping adjacent events also breaks it.
    let mut swapped = read_events(&cfg, None).expect("read");
    swapped.swap(0, 1);
    assert!(!verify_chain(&swapped));
}

#[test]
fn read_limit_keeps_the_tail() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = ledger_cfg(tmp.path());

    for i in 0..5 {
        append_event(&cfg, "tick", payload(i), &utc_now_iso_z(), "test").expect("append");
    }
    let tail = read_events(&cfg, Some(2)).expect("read");
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0]["payload"]["value"], json!(3));
    assert_eq!(tail[1]["payload"]["value"], json!(4));
}

#[test]
fn missing_file_reads_empty() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = ledger_cfg(tmp.path());
    let events = read_events(&cfg, None).expect("read");
    assert!(events.is_empty());
}

#[test]
fn disabled_ledger_rejects_reads_and_ensure() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = AdaadConfig {
        home: tmp.path().display().to_string(),
        ledger_enabled: false,
        ..AdaadConfig::default()
    };
    assert!(matches!(read_events(&cfg, None), Err(LedgerError::Disabled)));
    assert!(matches!(ensure_ledger(&cfg), Err(LedgerError::Disabled)));
}

#[test]
fn readonly_ledger_rejects_appends() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut cfg = ledger_cfg(tmp.path());
    append_event(&cfg, "alpha", payload(1), &utc_now_iso_z(), "test").expect("append");

    cfg.ledger_readonly = true;
    let err = append_event(&cfg, "beta", payload(2), &utc_now_iso_z(), "test")
        .expect_err("append must fail");
    assert!(matches!(err, LedgerError::ReadOnly));
    assert_eq!(err.to_string(), "LEDGER_READONLY");

    // The existing chain is untouched and still reads.
    let events = read_events(&cfg, None).expect("read");
    assert_eq!(events.len(), 1);
}

#[test]
fn directory_at_ledger_path_is_fatal() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = ledger_cfg(tmp.path());
    let path = ledger_path(&cfg).expect("path");
    std::fs::create_dir_all(&path).expect("mkdir");

    assert!(matches!(
        ensure_ledger(&cfg),
        Err(LedgerError::PathIsDirectory { .. })
    ));
}

#[test]
fn corrupt_line_is_fatal_on_read() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = ledger_cfg(tmp.path());
    append_event(&cfg, "alpha", payload(1), &utc_now_iso_z(), "test").expect("append");

    let path = ledger_path(&cfg).expect("path");
    let mut contents = std::fs::read_to_string(&path).expect("read file");
    contents.push_str("{not json\n");
    std::fs::write(&path, contents).expect("write file");

    assert!(matches!(
        read_events(&cfg, None),
        Err(LedgerError::Corrupt { line: 2, .. })
    ));
}

#[test]
fn ledger_path_stays_under_home() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg = AdaadConfig {
        home: tmp.path().display().to_string(),
        ledger_enabled: true,
        ledger_dir: "../outside".to_string(),
        ..AdaadConfig::default()
    };
    assert!(ledger_path(&cfg).is_err());
}

#[test]
fn timestamps_are_utc_with_trailing_z() {
    let ts = utc_now_iso_z();
    assert!(ts.ends_with('Z'));
    assert_eq!(ts.len(), "2026-01-01T00:00:00Z".len());
}
