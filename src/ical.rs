use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use icalendar::{Calendar as IcsDocument, CalendarComponent, Component, Event, EventLike};
use tracing::{debug, info};

use crate::calendar::Calendar;
use crate::model::event::{EventBody, EventItem, EventPage};

/// A calendar kept in a local iCalendar file. The whole file is one calendar and one page.
pub struct IcsCalendar {
    path: PathBuf,
    document: IcsDocument,
    next_seq: u64,
}

impl IcsCalendar {
    /// Open `path`, starting an empty calendar when the file does not exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        let document = if path.exists() {
            let body = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
            Self::parse(&body)?
        } else {
            info!(path = %path.display(), "Starting new calendar file");
            IcsDocument::new()
        };
        let mut calendar = Self { path: path.to_path_buf(), document, next_seq: 0 };
        calendar.assign_missing_uids();
        Ok(calendar)
    }

    // Events written by other tools may lack a UID; give them one so they can be deleted.
    fn assign_missing_uids(&mut self) {
        let mut seq = self.next_seq;
        for component in self.document.components.iter_mut() {
            if let CalendarComponent::Event(e) = component {
                if e.property_value("UID").is_none() {
                    seq += 1;
                    e.uid(&generated_uid(seq, "local"));
                }
            }
        }
        if seq > self.next_seq {
            debug!(count = seq - self.next_seq, "Assigned UIDs to events without one");
        }
        self.next_seq = seq;
    }

    fn parse(ics: &str) -> Result<IcsDocument> {
        let parsed = icalendar::parser::read_calendar(ics).map_err(|e| anyhow!("ICS parse error: {}", e))?;
        Ok(parsed.into())
    }

    fn events(&self) -> impl Iterator<Item = &Event> {
        self.document.components.iter().filter_map(|c| match c {
            CalendarComponent::Event(e) => Some(e),
            _ => None,
        })
    }

    fn save(&self) -> Result<()> {
        fs::write(&self.path, self.document.to_string())
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    fn new_uid(&mut self, calendar_id: &str) -> String {
        self.next_seq += 1;
        generated_uid(self.next_seq, calendar_id)
    }
}

fn generated_uid(seq: u64, domain: &str) -> String {
    let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{}-{}@{}", stamp, seq, domain)
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid event time {:?}", raw))
}

impl Calendar for IcsCalendar {
    /// One item per UID. Overrides of a recurring event share its UID and are listed once.
    fn list_events(&mut self, _calendar_id: &str, _page_token: Option<&str>, _max_results: u32) -> Result<EventPage> {
        let mut seen = HashSet::new();
        let items = self
            .events()
            .filter_map(|e| {
                let uid = e.property_value("UID")?;
                seen.insert(uid).then(|| EventItem {
                    id: uid.to_string(),
                    summary: e.property_value("SUMMARY").map(str::to_string),
                    html_link: None,
                })
            })
            .collect();
        Ok(EventPage { items, next_page_token: None })
    }

    /// Removes every component carrying `event_id`, recurrence overrides included.
    fn delete_event(&mut self, _calendar_id: &str, event_id: &str) -> Result<()> {
        let before = self.document.components.len();
        self.document.components.retain(|c| match c {
            CalendarComponent::Event(e) => e.property_value("UID") != Some(event_id),
            _ => true,
        });
        if self.document.components.len() == before {
            return Err(anyhow!("No event with UID {}", event_id));
        }
        debug!(uid = event_id, "Removed event");
        self.save()
    }

    fn insert_event(&mut self, calendar_id: &str, event: &EventBody) -> Result<EventItem> {
        let start = parse_instant(&event.start.date_time)?;
        let end = parse_instant(&event.end.date_time)?;
        let uid = self.new_uid(calendar_id);

        let mut ev = Event::new();
        ev.uid(&uid).summary(&event.summary).location(&event.location).starts(start).ends(end);
        if let Some(description) = &event.description {
            ev.description(description);
        }
        self.document.push(ev.done());
        self.save()?;

        Ok(EventItem { id: uid, summary: Some(event.summary.clone()), html_link: None })
    }
}
