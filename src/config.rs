use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extractor::Extractor;
use crate::gapfc::TableLayout;
use crate::squadi::CardLayout;

/// Timezone every source page is published in.
pub const SOURCE_TZ: Tz = chrono_tz::Australia::Brisbane;
pub const SOURCE_LOCALE: &str = "en-AU";

/// Shared family calendar all targets are synced into.
pub const DEFAULT_CALENDAR_ID: &str =
    "986b042e3651ea9db48e021d35660582e4013f3a5b6d0000c8409c56ff5a8908@group.calendar.google.com";

/// Which page layout a target uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutKind {
    /// Draw table, optionally filtered to one team.
    Table { team: Option<&'static str> },
    Card,
}

/// One named fixture source synced into the shared calendar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Target {
    pub name: &'static str,
    pub url: &'static str,
    pub layout: LayoutKind,
    pub duration_hours: i64,
}

impl Target {
    pub fn extractor(&self, year: i32, tz: Tz) -> Box<dyn Extractor> {
        match self.layout {
            LayoutKind::Table { team } => Box::new(TableLayout::new(team, year, tz)),
            LayoutKind::Card => Box::new(CardLayout::new(tz)),
        }
    }
}

pub const TARGETS: &[Target] = &[
    Target {
        name: "Twins",
        url: "https://www.gapfootball.org.au/football/miniroos/fixtures/under-6-draw/",
        layout: LayoutKind::Table { team: Some("SC Freiburg") },
        duration_hours: 1,
    },
    Target {
        name: "Rob",
        url: "https://registration.squadi.com/competitions?yearId=7&matchid=622227&organisationKey=bede218b-68e3-45cb-9ec0-892683988b5b&competitionUniqueKey=6a795117-75e8-448c-8f21-977c2412946a&divisionId=5876&teamId=59512",
        layout: LayoutKind::Card,
        duration_hours: 2,
    },
    Target {
        name: "Saoirse",
        url: "https://registration.squadi.com/competitions?yearId=7&organisationKey=eb9849ba-05f7-4dae-8c3c-52a23f774dad&matchid=622227&competitionUniqueKey=b63aa285-57d7-4ac7-b10c-7c443fc0d80c&divisionId=6690&teamId=68173",
        layout: LayoutKind::Card,
        duration_hours: 1,
    },
    Target {
        name: "Cillian",
        url: "https://registration.squadi.com/competitions?yearId=7&organisationKey=eb9849ba-05f7-4dae-8c3c-52a23f774dad&matchid=622227&competitionUniqueKey=b63aa285-57d7-4ac7-b10c-7c443fc0d80c&divisionId=5666&teamId=67848",
        layout: LayoutKind::Card,
        duration_hours: 1,
    },
];

/// Where events are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Google,
    Ics,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub service_account_json: Option<String>,
    pub client_secrets_path: PathBuf,
    pub token_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub calendar_id: String,
    pub year: i32,
    pub backend: Backend,
    pub ics_path: PathBuf,
    pub auth: AuthSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup; unset or blank keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let year = match get("FIXTURE_SYNC_YEAR") {
            Some(raw) => raw
                .trim()
                .parse::<i32>()
                .with_context(|| format!("FIXTURE_SYNC_YEAR is not a year: {:?}", raw))?,
            None => Utc::now().with_timezone(&SOURCE_TZ).year(),
        };

        let backend = match get("FIXTURE_SYNC_BACKEND") {
            Some(raw) => serde_json::from_value(Value::String(raw.trim().to_lowercase()))
                .with_context(|| format!("FIXTURE_SYNC_BACKEND must be \"google\" or \"ics\", got {:?}", raw))?,
            None => Backend::default(),
        };

        Ok(Settings {
            calendar_id: get("FIXTURE_SYNC_CALENDAR_ID").unwrap_or_else(|| DEFAULT_CALENDAR_ID.to_string()),
            year,
            backend,
            ics_path: get("FIXTURE_SYNC_ICS_PATH").unwrap_or_else(|| "fixtures.ics".to_string()).into(),
            auth: AuthSettings {
                service_account_json: get("GOOGLE_SA"),
                client_secrets_path: get("FIXTURE_SYNC_CREDENTIALS")
                    .unwrap_or_else(|| "credentials.json".to_string())
                    .into(),
                token_path: get("FIXTURE_SYNC_TOKEN").unwrap_or_else(|| "token.json".to_string()).into(),
            },
        })
    }
}
