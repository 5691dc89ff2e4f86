use fixture_calendar_sync::auth::Credential;
use fixture_calendar_sync::google::GoogleCalendar;

fn client() -> GoogleCalendar {
    let credential = Credential { access_token: "token".to_string(), expires_at: None };
    GoogleCalendar::new(&credential).expect("client")
}

#[test]
fn events_url_escapes_calendar_id() {
    let url = client().events_url("team#cal@group.calendar.google.com", None).unwrap();
    assert_eq!(
        url.as_str(),
        "https://www.googleapis.com/calendar/v3/calendars/team%23cal@group.calendar.google.com/events"
    );
}

#[test]
fn event_url_appends_event_id() {
    let url = client().events_url("primary", Some("abc123")).unwrap();
    assert_eq!(url.as_str(), "https://www.googleapis.com/calendar/v3/calendars/primary/events/abc123");
}

#[test]
fn custom_base_is_respected() {
    let credential = Credential { access_token: "token".to_string(), expires_at: None };
    let client = GoogleCalendar::with_base(&credential, "http://127.0.0.1:9/v3/").unwrap();
    let url = client.events_url("primary", None).unwrap();
    assert_eq!(url.as_str(), "http://127.0.0.1:9/v3/calendars/primary/events");
    assert!(GoogleCalendar::with_base(&credential, "not a url").is_err());
}
