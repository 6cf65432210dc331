//! Analytics for a survey bot: answer distributions, stress scoring, click
//! statistics and the text reports built from them.

pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod report;
pub mod samples;

pub use config::Config;
pub use db::{ClickFilter, Database, EventStore};
pub use error::{Result, StatsError};
