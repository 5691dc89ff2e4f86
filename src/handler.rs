use anyhow::{Context, Result};
use chrono_tz::Tz;
use tracing::{info, info_span};

use crate::browser::PageSource;
use crate::calendar::{self, Calendar};
use crate::config::Target;
use crate::extractor::fetch_fixtures;

/// What one sync run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub deleted: usize,
    /// Events created per target, in target order.
    pub created: Vec<(String, usize)>,
}

impl SyncReport {
    pub fn message(&self) -> String {
        let parts: Vec<String> = self.created.iter().map(|(name, n)| format!("{}: {}", name, n)).collect();
        format!("Deleted {} events; created {}", self.deleted, parts.join(", "))
    }
}

/// Wipe `calendar_id`, then extract and insert every target's fixtures in order.
///
/// The first failure stops the run; targets after it are not processed.
pub fn run_sync(
    pages: &dyn PageSource,
    calendar: &mut dyn Calendar,
    calendar_id: &str,
    targets: &[Target],
    year: i32,
    tz: Tz,
) -> Result<SyncReport> {
    let mut report = SyncReport { deleted: calendar::wipe(calendar, calendar_id)?, ..Default::default() };

    for target in targets {
        let _span = info_span!("target", name = target.name).entered();
        let created = sync_target(pages, calendar, calendar_id, target, year, tz)
            .with_context(|| format!("{}: sync failed", target.name))?;
        report.created.push((target.name.to_string(), created));
    }

    info!(summary = %report.message(), "Sync complete");
    Ok(report)
}

/// Extract one target's fixtures and insert an event for each. Returns the number created.
pub fn sync_target(
    pages: &dyn PageSource,
    calendar: &mut dyn Calendar,
    calendar_id: &str,
    target: &Target,
    year: i32,
    tz: Tz,
) -> Result<usize> {
    info!(url = target.url, "Extracting fixtures");
    let extractor = target.extractor(year, tz);
    let fixtures = fetch_fixtures(pages, target.url, extractor.as_ref())?;

    if fixtures.is_empty() {
        info!("No fixtures found so no events created");
        return Ok(0);
    }

    for fixture in &fixtures {
        calendar::create(calendar, calendar_id, fixture, target.name, target.duration_hours)?;
    }
    info!(count = fixtures.len(), "Events successfully created");
    Ok(fixtures.len())
}
