//! Background maintenance: trending scores and orphan cleanup.
//!
//! Both tasks run on a fixed interval until the shutdown signal fires and
//! only read the catalog, apart from the trending score write-back.

mod sweeper;
mod trending;

pub use sweeper::{OrphanSweeper, SweepReport, SweeperConfig};
pub use trending::{TrendingConfig, TrendingScorer, TrendingWeights, MAX_WINDOW_HOURS};
