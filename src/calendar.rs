use anyhow::{Context, Result};
use chrono::Duration;
use tracing::{info, instrument};

use crate::model::event::{EventBody, EventDateTime, EventItem, EventPage};
use crate::model::fixture::Fixture;

/// Largest page requested when listing events.
pub const LIST_PAGE_SIZE: u32 = 1000;

/// The three calendar operations the sync needs.
pub trait Calendar {
    fn list_events(&mut self, calendar_id: &str, page_token: Option<&str>, max_results: u32) -> Result<EventPage>;
    fn delete_event(&mut self, calendar_id: &str, event_id: &str) -> Result<()>;
    fn insert_event(&mut self, calendar_id: &str, event: &EventBody) -> Result<EventItem>;
}

/// Delete every event in the calendar, page by page. Returns the number deleted.
///
/// This is not limited to events this tool created.
#[instrument(level = "info", skip(calendar))]
pub fn wipe(calendar: &mut dyn Calendar, calendar_id: &str) -> Result<usize> {
    let mut total = 0;
    let mut page_token: Option<String> = None;
    loop {
        let page = calendar
            .list_events(calendar_id, page_token.as_deref(), LIST_PAGE_SIZE)
            .context("Failed to list calendar events")?;
        let mut deleted = 0;
        for item in &page.items {
            calendar
                .delete_event(calendar_id, &item.id)
                .with_context(|| format!("Failed to delete event {}", item.id))?;
            deleted += 1;
        }
        info!(deleted, "Events deleted");
        total += deleted;

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }
    Ok(total)
}

/// Build the event body for one fixture.
pub fn event_body(fixture: &Fixture, name_prefix: &str, duration_hours: i64) -> EventBody {
    let end = fixture.start + Duration::hours(duration_hours);
    let time_zone = fixture.start.timezone().name().to_string();
    EventBody {
        summary: fixture.summary(name_prefix),
        location: fixture.location.clone(),
        description: (!fixture.round.is_empty()).then(|| fixture.round.clone()),
        start: EventDateTime { date_time: fixture.start.to_rfc3339(), time_zone: time_zone.clone() },
        end: EventDateTime { date_time: end.to_rfc3339(), time_zone },
    }
}

/// Insert one event for `fixture`.
pub fn create(
    calendar: &mut dyn Calendar,
    calendar_id: &str,
    fixture: &Fixture,
    name_prefix: &str,
    duration_hours: i64,
) -> Result<EventItem> {
    let body = event_body(fixture, name_prefix, duration_hours);
    let created = calendar
        .insert_event(calendar_id, &body)
        .with_context(|| format!("Failed to create event {:?}", body.summary))?;
    info!(summary = %body.summary, link = created.html_link.as_deref().unwrap_or(""), "Created event");
    Ok(created)
}
