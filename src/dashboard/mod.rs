pub mod aggregator;
pub mod clock;

pub use aggregator::{DashboardAggregator, DashboardStats, DashboardView};
pub use clock::{greeting_for, ClockReading, ClockTicker};
