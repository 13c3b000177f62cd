pub mod alerts;
pub mod indicators;
pub mod trend;
pub mod trend_log;
