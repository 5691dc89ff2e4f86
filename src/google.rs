use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info_span};
use ureq::Agent;
use url::Url;

use crate::auth::Credential;
use crate::calendar::Calendar;
use crate::model::event::{EventBody, EventItem, EventPage};

pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";

/// Google Calendar v3 client for the events collection.
#[derive(Clone)]
pub struct GoogleCalendar {
    agent: Agent,
    base: Url,
    bearer: String,
}

impl GoogleCalendar {
    pub fn new(credential: &Credential) -> Result<Self> {
        Self::with_base(credential, CALENDAR_API_BASE)
    }

    /// Point the client at another API root.
    pub fn with_base(credential: &Credential, base: &str) -> Result<Self> {
        let config = Agent::config_builder().timeout_global(Some(Duration::from_secs(30))).build();
        Ok(Self {
            agent: config.into(),
            base: Url::parse(base).with_context(|| format!("Invalid calendar API base {:?}", base))?,
            bearer: format!("Bearer {}", credential.access_token),
        })
    }

    /// URL of `calendars/{calendar_id}/events[/{event_id}]` with each segment escaped.
    pub fn events_url(&self, calendar_id: &str, event_id: Option<&str>) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow!("Calendar API base cannot carry a path"))?;
            segments.pop_if_empty().extend(["calendars", calendar_id, "events"]);
            if let Some(id) = event_id {
                segments.push(id);
            }
        }
        Ok(url)
    }
}

impl Calendar for GoogleCalendar {
    fn list_events(&mut self, calendar_id: &str, page_token: Option<&str>, max_results: u32) -> Result<EventPage> {
        let mut url = self.events_url(calendar_id, None)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("maxResults", &max_results.to_string());
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        let _span = info_span!("calendar_list", calendar_id).entered();
        let response = self.agent.get(url.as_str()).header("Authorization", self.bearer.as_str()).call()?;
        let page: EventPage = response.into_body().read_json()?;
        debug!(items = page.items.len(), more = page.next_page_token.is_some(), "Listed events");
        Ok(page)
    }

    fn delete_event(&mut self, calendar_id: &str, event_id: &str) -> Result<()> {
        let url = self.events_url(calendar_id, Some(event_id))?;
        self.agent.delete(url.as_str()).header("Authorization", self.bearer.as_str()).call()?;
        Ok(())
    }

    fn insert_event(&mut self, calendar_id: &str, event: &EventBody) -> Result<EventItem> {
        let url = self.events_url(calendar_id, None)?;
        let _span = info_span!("calendar_insert", calendar_id).entered();
        let response = self
            .agent
            .post(url.as_str())
            .header("Authorization", self.bearer.as_str())
            .send_json(event)?;
        Ok(response.into_body().read_json()?)
    }
}
