use std::process;

use anyhow::{anyhow, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fixture_calendar_sync::auth::acquire_credential;
use fixture_calendar_sync::browser::{ChromePageSource, Deadlines};
use fixture_calendar_sync::calendar::Calendar;
use fixture_calendar_sync::config::{Backend, Settings, SOURCE_LOCALE, SOURCE_TZ, TARGETS};
use fixture_calendar_sync::google::GoogleCalendar;
use fixture_calendar_sync::handler::{run_sync, SyncReport};
use fixture_calendar_sync::ical::IcsCalendar;

fn run(settings: Settings) -> Result<SyncReport> {
    let mut calendar: Box<dyn Calendar> = match settings.backend {
        Backend::Google => Box::new(GoogleCalendar::new(&acquire_credential(&settings.auth)?)?),
        Backend::Ics => Box::new(IcsCalendar::open(&settings.ics_path)?),
    };
    let pages = ChromePageSource::new(SOURCE_LOCALE, SOURCE_TZ.name(), Deadlines::default());
    run_sync(&pages, calendar.as_mut(), &settings.calendar_id, TARGETS, settings.year, SOURCE_TZ)
}

async fn sync() -> Result<SyncReport> {
    let settings = Settings::from_env()?;
    info!(calendar_id = %settings.calendar_id, backend = ?settings.backend, year = settings.year, "Syncing fixtures");
    // Browser and HTTP clients block; keep them off the async workers.
    tokio::task::spawn_blocking(move || run(settings))
        .await
        .map_err(|e| anyhow!("Sync task join error: {}", e))?
}

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .try_init();

    match sync().await {
        Ok(report) => info!(message = %report.message(), "Done"),
        Err(e) => {
            error!(error = ?e, "Sync failed");
            process::exit(1);
        }
    }
}
