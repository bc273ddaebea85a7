//! Portfolio module
//!
//! Aggregates cached quotes into portfolio value and change.

mod aggregator;

pub use aggregator::{Aggregator, PortfolioTotals};
