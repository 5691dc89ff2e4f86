use std::collections::HashMap;
use std::path::PathBuf;

use chrono_tz::Australia::Brisbane;

use fixture_calendar_sync::config::{Backend, LayoutKind, Settings, DEFAULT_CALENDAR_ID, TARGETS};
use fixture_calendar_sync::extractor::Extractor;

fn settings(pairs: &[(&str, &str)]) -> anyhow::Result<Settings> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    Settings::from_lookup(|key| map.get(key).cloned())
}

#[test]
fn defaults_apply_when_environment_is_empty() {
    let s = settings(&[]).expect("settings");
    assert_eq!(s.calendar_id, DEFAULT_CALENDAR_ID);
    assert_eq!(s.backend, Backend::Google);
    assert_eq!(s.ics_path, PathBuf::from("fixtures.ics"));
    assert_eq!(s.auth.service_account_json, None);
    assert_eq!(s.auth.client_secrets_path, PathBuf::from("credentials.json"));
    assert_eq!(s.auth.token_path, PathBuf::from("token.json"));
    assert!(s.year >= 2025);
}

#[test]
fn overrides_are_read() {
    let s = settings(&[
        ("FIXTURE_SYNC_CALENDAR_ID", "abc@group.calendar.google.com"),
        ("FIXTURE_SYNC_YEAR", "2025"),
        ("FIXTURE_SYNC_BACKEND", "ics"),
        ("FIXTURE_SYNC_ICS_PATH", "/tmp/out.ics"),
        ("GOOGLE_SA", "{}"),
        ("FIXTURE_SYNC_TOKEN", "/tmp/token.json"),
    ])
    .unwrap();
    assert_eq!(s.calendar_id, "abc@group.calendar.google.com");
    assert_eq!(s.year, 2025);
    assert_eq!(s.backend, Backend::Ics);
    assert_eq!(s.ics_path, PathBuf::from("/tmp/out.ics"));
    assert_eq!(s.auth.service_account_json.as_deref(), Some("{}"));
    assert_eq!(s.auth.token_path, PathBuf::from("/tmp/token.json"));
}

#[test]
fn blank_values_fall_back_to_defaults() {
    let s = settings(&[("GOOGLE_SA", "  "), ("FIXTURE_SYNC_CALENDAR_ID", "")]).unwrap();
    assert_eq!(s.auth.service_account_json, None);
    assert_eq!(s.calendar_id, DEFAULT_CALENDAR_ID);
}

#[test]
fn invalid_values_are_errors() {
    assert!(settings(&[("FIXTURE_SYNC_YEAR", "next year")]).is_err());
    assert!(settings(&[("FIXTURE_SYNC_BACKEND", "outlook")]).is_err());
}

#[test]
fn backend_name_is_case_insensitive() {
    assert_eq!(settings(&[("FIXTURE_SYNC_BACKEND", " ICS ")]).unwrap().backend, Backend::Ics);
    assert_eq!(settings(&[("FIXTURE_SYNC_BACKEND", "Google")]).unwrap().backend, Backend::Google);
    let err = settings(&[("FIXTURE_SYNC_BACKEND", "outlook")]).unwrap_err();
    assert!(format!("{:#}", err).contains("\"outlook\""), "error was: {:#}", err);
}

#[test]
fn backend_serde_is_lowercase() {
    let b: Backend = serde_json::from_str("\"ics\"").unwrap();
    assert_eq!(b, Backend::Ics);
    assert_eq!(serde_json::to_string(&Backend::Google).unwrap(), "\"google\"");
}

#[test]
fn target_table_matches_family_setup() {
    let names: Vec<&str> = TARGETS.iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["Twins", "Rob", "Saoirse", "Cillian"]);

    assert_eq!(TARGETS[0].layout, LayoutKind::Table { team: Some("SC Freiburg") });
    assert!(TARGETS[1..].iter().all(|t| t.layout == LayoutKind::Card));

    let durations: Vec<i64> = TARGETS.iter().map(|t| t.duration_hours).collect();
    assert_eq!(durations, vec![1, 2, 1, 1]);
}

#[test]
fn target_builds_matching_extractor() {
    assert_eq!(TARGETS[0].extractor(2025, Brisbane).name(), "table");
    assert_eq!(TARGETS[1].extractor(2025, Brisbane).name(), "card");
}
