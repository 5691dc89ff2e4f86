use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

/// Format of the combined "<date> <year> <time>" string built from a table row, e.g. "12 Apr 2025 3:30PM".
pub const TABLE_FORMAT: &str = "%d %b %Y %I:%M%p";

/// Format of a card's start text once the timezone annotation is removed, e.g. "Sat, Apr 12, 2025 3:30 PM".
pub const CARD_FORMAT: &str = "%a, %b %d, %Y %I:%M %p";

/// Parse a table-layout date and time. The page omits the year, so the caller supplies it.
pub fn parse_table_datetime(date: &str, year: i32, time: &str, tz: Tz) -> Result<DateTime<Tz>> {
    let combined = format!("{} {} {}", collapse_whitespace(date), year, collapse_whitespace(time));
    let naive = NaiveDateTime::parse_from_str(&combined, TABLE_FORMAT)
        .with_context(|| format!("Unrecognized table date/time: {:?}", combined))?;
    localize(naive, tz)
}

/// Parse a card-layout start text such as "Sat, Apr 12, 2025\n3:30 PM (AEST)".
///
/// The trailing annotation is dropped rather than interpreted; `tz` is taken as authoritative.
pub fn parse_card_datetime(raw: &str, tz: Tz) -> Result<DateTime<Tz>> {
    let collapsed = collapse_whitespace(raw);
    let stripped = strip_tz_annotation(&collapsed);
    let naive = NaiveDateTime::parse_from_str(stripped, CARD_FORMAT)
        .with_context(|| format!("Unrecognized card date/time: {:?}", raw))?;
    localize(naive, tz)
}

fn localize(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .single()
        .ok_or_else(|| anyhow!("{} does not map to a single instant in {}", naive, tz.name()))
}

/// Remove one trailing "(...)" group, e.g. " (AEST)".
fn strip_tz_annotation(s: &str) -> &str {
    if s.ends_with(')') {
        if let Some(idx) = s.rfind('(') {
            return s[..idx].trim_end();
        }
    }
    s
}

/// Trim and fold any run of whitespace (including newlines from rendered text) into one space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
