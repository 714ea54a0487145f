//! Metric derivation from parsed statements: TTM aggregates, growth streaks,
//! per-company metrics and peer PE medians.

pub mod growth;
pub mod metrics;
pub mod peers;
pub mod ttm;

pub use growth::{GrowthAnalyzer, GrowthSummary};
pub use metrics::MetricsCalculator;
pub use peers::{PeerAverages, PeerPool};
