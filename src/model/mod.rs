pub mod event;
pub mod fixture;
