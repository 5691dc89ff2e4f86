mod common;

use chrono::TimeZone;
use chrono_tz::Australia::Brisbane;

use common::{FakeCalendar, Op};
use fixture_calendar_sync::calendar::{create, event_body, wipe};
use fixture_calendar_sync::model::fixture::Fixture;

fn fixture(home: &str, away: &str) -> Fixture {
    Fixture {
        round: "Round 5".to_string(),
        start: Brisbane.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap(),
        home: home.to_string(),
        away: away.to_string(),
        location: "Field 1".to_string(),
        result: "vs".to_string(),
    }
}

#[test]
fn event_body_carries_prefix_duration_and_timezone() {
    let body = event_body(&fixture("A", "B"), "Rob", 2);
    assert_eq!(body.summary, "Rob: A vs B");
    assert_eq!(body.location, "Field 1");
    assert_eq!(body.description.as_deref(), Some("Round 5"));
    assert_eq!(body.start.date_time, "2025-05-01T10:00:00+10:00");
    assert_eq!(body.end.date_time, "2025-05-01T12:00:00+10:00");
    assert_eq!(body.start.time_zone, "Australia/Brisbane");
    assert_eq!(body.end.time_zone, "Australia/Brisbane");
}

#[test]
fn event_body_serializes_as_calendar_json() {
    let mut f = fixture("A", "B");
    f.round.clear();
    let json = serde_json::to_value(event_body(&f, "Rob", 1)).unwrap();
    assert_eq!(json["start"]["dateTime"], "2025-05-01T10:00:00+10:00");
    assert_eq!(json["end"]["timeZone"], "Australia/Brisbane");
    assert!(json.get("description").is_none(), "json was: {}", json);
}

#[test]
fn scored_result_lands_between_team_names() {
    let mut f = fixture("A", "B");
    f.result = "2 vs 1".to_string();
    assert_eq!(event_body(&f, "Saoirse", 1).summary, "Saoirse: A 2 vs 1 B");
}

#[test]
fn wipe_follows_page_tokens_until_empty() {
    let mut cal = FakeCalendar::with_page_size(2);
    cal.seed(&["one", "two", "three", "four", "five"]);

    let deleted = wipe(&mut cal, "cal").expect("wipe");

    assert_eq!(deleted, 5);
    assert!(cal.events.is_empty());
    let lists = cal.ops.iter().filter(|op| matches!(op, Op::List(_))).count();
    assert_eq!(lists, 3);
}

#[test]
fn wipe_of_empty_calendar_lists_once() {
    let mut cal = FakeCalendar::default();
    assert_eq!(wipe(&mut cal, "cal").unwrap(), 0);
    assert_eq!(cal.ops, vec![Op::List(None)]);
}

#[test]
fn wipe_removes_events_it_did_not_create() {
    let mut cal = FakeCalendar::default();
    cal.seed(&["Dentist", "Rob: X vs Y"]);
    wipe(&mut cal, "cal").unwrap();
    assert!(cal.events.is_empty());
}

#[test]
fn reconciling_twice_leaves_one_event_per_fixture() {
    let fixtures = vec![fixture("A", "B"), fixture("C", "D")];
    let mut cal = FakeCalendar::default();

    for _ in 0..2 {
        wipe(&mut cal, "cal").unwrap();
        for f in &fixtures {
            create(&mut cal, "cal", f, "Rob", 2).unwrap();
        }
    }

    assert_eq!(cal.summaries(), vec!["Rob: A vs B", "Rob: C vs D"]);
}
