//! Price alert module
//!
//! One-shot threshold alerts evaluated against every accepted snapshot.

mod evaluator;
mod types;

pub use evaluator::AlertEvaluator;
pub use types::{Alert, AlertDirection, AlertError, AlertFired, AlertId};
