//! Quote module
//!
//! Normalized quote snapshots, the fetch error taxonomy, and the
//! [`MarketDataSource`] trait the request layer wraps.

mod http;
mod types;
mod validate;

pub use http::HttpQuoteSource;
pub use types::{FetchError, Snapshot};
pub use validate::validate_snapshot;

use async_trait::async_trait;
use std::sync::Arc;

/// Trait for upstream quote providers
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch the latest quote for a symbol
    async fn fetch_quote(&self, symbol: &str) -> Result<Snapshot, FetchError>;
}

#[async_trait]
impl<T: MarketDataSource + ?Sized> MarketDataSource for Arc<T> {
    async fn fetch_quote(&self, symbol: &str) -> Result<Snapshot, FetchError> {
        (**self).fetch_quote(symbol).await
    }
}
