use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use scraper::{ElementRef, Html};
use tracing::{debug, info};

use crate::datetime::{collapse_whitespace, parse_card_datetime};
use crate::extractor::{element_text, nth_text, selector, Extractor};
use crate::model::fixture::{Fixture, RESULT_PLACEHOLDER};

/// Where each field lives inside a fixture card.
#[derive(Clone, Copy, Debug)]
pub struct CardFields {
    pub container: &'static str,
    pub card: &'static str,
    pub round: &'static str,
    pub start: &'static str,
    // First match is home, second is away
    pub team_name: &'static str,
    pub location: (&'static str, usize),
    pub score: &'static str,
}

pub const CARD_FIELDS: CardFields = CardFields {
    container: "div.styles_tableContainer__pii69",
    card: "div.styles_compRound__VH6GP",
    round: "div.styles_header__CMgUx",
    start: "div.styles_matchStartDatetime__i4RmM",
    team_name: "div.styles_teamName__v4OQh",
    location: ("div.ant-col", 7),
    score: "div.styles_scoreBox__3xSTT",
};

/// Competition-portal layout: one card per fixture, scores shown once played.
#[derive(Clone, Debug)]
pub struct CardLayout {
    tz: Tz,
    fields: CardFields,
}

impl CardLayout {
    pub fn new(tz: Tz) -> Self {
        Self { tz, fields: CARD_FIELDS }
    }
}

impl Extractor for CardLayout {
    fn name(&self) -> &'static str {
        "card"
    }

    fn ready_selector(&self) -> &str {
        self.fields.container
    }

    fn extract(&self, html: &str) -> Result<Vec<Fixture>> {
        let f = &self.fields;
        let document = Html::parse_document(html);
        let container_sel = selector(f.container)?;
        let card_sel = selector(f.card)?;
        let round_sel = selector(f.round)?;
        let start_sel = selector(f.start)?;
        let team_sel = selector(f.team_name)?;
        let location_sel = selector(f.location.0)?;
        let score_sel = selector(f.score)?;

        // Some competitions render one container per round group.
        let containers: Vec<ElementRef<'_>> = document.select(&container_sel).collect();
        if containers.is_empty() {
            bail!("Fixtures container {:?} not found", f.container);
        }

        let mut fixtures = Vec::new();
        for (i, card) in containers.iter().flat_map(|c| c.select(&card_sel)).enumerate() {
            let round = nth_text(card, &round_sel, 0, "round header").with_context(|| format!("Card {}", i))?;
            let raw_start = nth_text(card, &start_sel, 0, "start time").with_context(|| format!("Card {}", i))?;
            let start = parse_card_datetime(&raw_start, self.tz).with_context(|| format!("Card {}", i))?;
            let home = nth_text(card, &team_sel, 0, "home team").with_context(|| format!("Card {}", i))?;
            let away = nth_text(card, &team_sel, 1, "away team").with_context(|| format!("Card {}", i))?;
            let location =
                nth_text(card, &location_sel, f.location.1, "location column").with_context(|| format!("Card {}", i))?;
            let result = match card.select(&score_sel).next() {
                Some(score) => normalize_score(&element_text(score)),
                None => {
                    debug!(card = i, "No score box; treating fixture as unplayed");
                    RESULT_PLACEHOLDER.to_string()
                }
            };

            debug!(card = i, %home, %away, %result, %start, "Parsed fixture card");
            fixtures.push(Fixture { round, start, home, away, location, result });
        }

        info!(cards = fixtures.len(), containers = containers.len(), "Read fixture cards");
        Ok(fixtures)
    }
}

/// Rewrite score text like "2-1" into "2 vs 1". Anything without two scores becomes the placeholder.
pub fn normalize_score(raw: &str) -> String {
    let text = collapse_whitespace(raw);
    match text.split_once(['-', '–']) {
        Some((home, away)) if !home.trim().is_empty() && !away.trim().is_empty() => {
            format!("{} {} {}", home.trim(), RESULT_PLACEHOLDER, away.trim())
        }
        _ => RESULT_PLACEHOLDER.to_string(),
    }
}
