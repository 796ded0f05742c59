pub mod yahoo;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::SourceError;
use crate::model::{Bar, Lookback, Symbol};

/// Abstraction over a historical price-data provider.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn PriceSource`).
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch daily bars covering `range`, oldest first.
    fn fetch_daily(
        &self,
        symbol: &Symbol,
        range: Lookback,
    ) -> BoxFuture<'_, Result<Vec<Bar>, Report<SourceError>>>;
}
