use chrono::DateTime;
use chrono_tz::Tz;

/// Result text for a fixture without a score.
pub const RESULT_PLACEHOLDER: &str = "vs";

/// A single scheduled match as read from a fixtures page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fixture {
    pub round: String,
    pub start: DateTime<Tz>,
    pub home: String,
    pub away: String,
    pub location: String,
    // Either RESULT_PLACEHOLDER or "<home score> vs <away score>"
    pub result: String,
}

impl Fixture {
    /// Calendar summary for this fixture, prefixed with the owning target's name.
    pub fn summary(&self, name_prefix: &str) -> String {
        format!("{}: {} {} {}", name_prefix, self.home, self.result, self.away)
    }
}
