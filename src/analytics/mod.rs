pub mod clicks;
pub mod responses;
pub mod stress;

pub use clicks::ClickAnalytics;
pub use responses::{analyze, analyze_poll, calculate_distributions};
pub use stress::{assess_stress, StressAssessment, StressLevel};
