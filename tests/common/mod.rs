#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use anyhow::{anyhow, Result};

use fixture_calendar_sync::browser::{PageSource, RenderRequest};
use fixture_calendar_sync::calendar::Calendar;
use fixture_calendar_sync::model::event::{EventBody, EventItem, EventPage};

/// Calls seen by the fake calendar, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    List(Option<String>),
    Delete(String),
    Insert(String),
}

/// In-memory calendar that pages its listing like the real API.
#[derive(Debug, Default)]
pub struct FakeCalendar {
    pub events: Vec<(String, EventBody)>,
    pub ops: Vec<Op>,
    pub page_size: usize,
    next_id: usize,
}

impl FakeCalendar {
    pub fn with_page_size(page_size: usize) -> Self {
        Self { page_size, ..Default::default() }
    }

    pub fn seed(&mut self, summaries: &[&str]) {
        for s in summaries {
            let body = EventBody {
                summary: s.to_string(),
                location: String::new(),
                description: None,
                start: fixture_calendar_sync::model::event::EventDateTime {
                    date_time: "2025-01-01T00:00:00+10:00".to_string(),
                    time_zone: "Australia/Brisbane".to_string(),
                },
                end: fixture_calendar_sync::model::event::EventDateTime {
                    date_time: "2025-01-01T01:00:00+10:00".to_string(),
                    time_zone: "Australia/Brisbane".to_string(),
                },
            };
            self.next_id += 1;
            self.events.push((format!("seed{}", self.next_id), body));
        }
    }

    pub fn summaries(&self) -> Vec<String> {
        self.events.iter().map(|(_, b)| b.summary.clone()).collect()
    }

    pub fn inserts(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, Op::Insert(_))).count()
    }
}

impl Calendar for FakeCalendar {
    fn list_events(&mut self, _calendar_id: &str, page_token: Option<&str>, max_results: u32) -> Result<EventPage> {
        self.ops.push(Op::List(page_token.map(str::to_string)));
        let size = if self.page_size == 0 { max_results as usize } else { self.page_size.min(max_results as usize) };
        // Deleting shifts the remaining events forward, so every page is read from the front
        // and the token only signals that more remain.
        let items: Vec<EventItem> = self
            .events
            .iter()
            .take(size)
            .map(|(id, b)| EventItem { id: id.clone(), summary: Some(b.summary.clone()), html_link: None })
            .collect();
        let next_page_token = (self.events.len() > size).then(|| "more".to_string());
        Ok(EventPage { items, next_page_token })
    }

    fn delete_event(&mut self, _calendar_id: &str, event_id: &str) -> Result<()> {
        self.ops.push(Op::Delete(event_id.to_string()));
        let before = self.events.len();
        self.events.retain(|(id, _)| id != event_id);
        if self.events.len() == before {
            return Err(anyhow!("no such event {}", event_id));
        }
        Ok(())
    }

    fn insert_event(&mut self, _calendar_id: &str, event: &EventBody) -> Result<EventItem> {
        self.ops.push(Op::Insert(event.summary.clone()));
        self.next_id += 1;
        let id = format!("ev{}", self.next_id);
        self.events.push((id.clone(), event.clone()));
        Ok(EventItem { id, summary: Some(event.summary.clone()), html_link: None })
    }
}

/// Page source that serves canned HTML by URL and records each request.
#[derive(Debug, Default)]
pub struct FakePages {
    pub pages: HashMap<String, String>,
    pub requests: RefCell<Vec<RenderRequest>>,
}

impl FakePages {
    pub fn with(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

impl PageSource for FakePages {
    fn render(&self, request: &RenderRequest) -> Result<String> {
        self.requests.borrow_mut().push(request.clone());
        self.pages
            .get(&request.url)
            .cloned()
            .ok_or_else(|| anyhow!("timed out waiting for {}", request.ready_selector))
    }
}

/// Card-layout page with one card per (round, start, home, away, location, score) tuple.
pub fn card_page(cards: &[(&str, &str, &str, &str, &str, Option<&str>)]) -> String {
    let mut body = String::new();
    for (round, start, home, away, location, score) in cards {
        let score_box = score
            .map(|s| format!(r#"<div class="styles_scoreBox__3xSTT">{}</div>"#, s))
            .unwrap_or_default();
        body.push_str(&format!(
            r#"<div class="styles_compRound__VH6GP">
  <div class="styles_header__CMgUx">{round}</div>
  <div class="ant-row">
    <div class="ant-col"><div class="styles_matchStartDatetime__i4RmM"><span>{start}</span></div></div>
    <div class="ant-col"><div class="styles_teamName__v4OQh">{home}</div></div>
    <div class="ant-col">{score_box}</div>
    <div class="ant-col"><div class="styles_teamName__v4OQh">{away}</div></div>
    <div class="ant-col"></div>
    <div class="ant-col"></div>
    <div class="ant-col"></div>
    <div class="ant-col">{location}</div>
  </div>
</div>
"#
        ));
    }
    format!(
        r#"<html><body><div class="styles_tableContainer__pii69">{}</div></body></html>"#,
        body
    )
}
