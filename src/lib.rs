pub mod auth;
pub mod browser;
pub mod calendar;
pub mod config;
pub mod datetime;
pub mod extractor;
pub mod gapfc;
pub mod google;
pub mod handler;
pub mod ical;
pub mod model;
pub mod squadi;
