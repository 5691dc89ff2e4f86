use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use scraper::Html;
use tracing::{debug, info};

use crate::browser::SelectFilter;
use crate::datetime::parse_table_datetime;
use crate::extractor::{element_text, nth_text, selector, Extractor};
use crate::model::fixture::{Fixture, RESULT_PLACEHOLDER};

pub const CONTAINER_SELECTOR: &str = "table.draw";
pub const ROW_SELECTOR: &str = "table.draw tbody tr";
pub const FILTER_SELECTOR: &str = "select#filter";

/// Where each field lives in a draw-table row. Cell offsets count `<td>` elements only.
#[derive(Clone, Copy, Debug)]
pub struct TableColumns {
    pub round: &'static str,
    pub date: usize,
    pub home: usize,
    pub away: usize,
    pub time: usize,
    pub location: usize,
}

pub const TABLE_COLUMNS: TableColumns = TableColumns {
    round: "th.round",
    date: 0,
    home: 2,
    away: 3,
    time: 4,
    location: 5,
};

/// Club-site draw table: one row per fixture, no scores, dates without a year.
#[derive(Clone, Debug)]
pub struct TableLayout {
    team: Option<String>,
    year: i32,
    tz: Tz,
    columns: TableColumns,
}

impl TableLayout {
    pub fn new(team: Option<&str>, year: i32, tz: Tz) -> Self {
        Self { team: team.map(str::to_string), year, tz, columns: TABLE_COLUMNS }
    }
}

impl Extractor for TableLayout {
    fn name(&self) -> &'static str {
        "table"
    }

    fn ready_selector(&self) -> &str {
        CONTAINER_SELECTOR
    }

    fn filter(&self) -> Option<SelectFilter> {
        self.team.as_ref().map(|team| SelectFilter {
            selector: FILTER_SELECTOR.to_string(),
            option: team.clone(),
        })
    }

    fn extract(&self, html: &str) -> Result<Vec<Fixture>> {
        let document = Html::parse_document(html);
        let row_sel = selector(ROW_SELECTOR)?;
        let round_sel = selector(self.columns.round)?;
        let cell_sel = selector("td")?;
        let cols = &self.columns;

        let mut fixtures = Vec::new();
        for (i, row) in document.select(&row_sel).enumerate() {
            let round = row
                .select(&round_sel)
                .next()
                .map(element_text)
                .ok_or_else(|| anyhow!("Row {} has no round header", i))?;
            let date = nth_text(row, &cell_sel, cols.date, "date cell").with_context(|| format!("Row {}", i))?;
            let time = nth_text(row, &cell_sel, cols.time, "time cell").with_context(|| format!("Row {}", i))?;
            let home = nth_text(row, &cell_sel, cols.home, "home cell").with_context(|| format!("Row {}", i))?;
            let away = nth_text(row, &cell_sel, cols.away, "away cell").with_context(|| format!("Row {}", i))?;
            let location =
                nth_text(row, &cell_sel, cols.location, "location cell").with_context(|| format!("Row {}", i))?;
            let start = parse_table_datetime(&date, self.year, &time, self.tz).with_context(|| format!("Row {}", i))?;

            debug!(row = i, %home, %away, %start, "Parsed table row");
            fixtures.push(Fixture {
                round,
                start,
                home,
                away,
                location,
                result: RESULT_PLACEHOLDER.to_string(),
            });
        }

        info!(rows = fixtures.len(), "Read draw table");
        Ok(fixtures)
    }
}
