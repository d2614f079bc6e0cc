//! The entry point UI collaborators use to list amortized spending.

use time::Date;

use crate::{
    Error,
    aggregate::{aggregate_date_range, aggregate_range},
    database_id::UserId,
    filters::TransactionFilters,
    materialize::materialize_month,
    month::YearMonth,
    pagination::PaginationConfig,
    store::TransactionStore,
    transaction::LineItem,
};

/// Settings for an [AmortizationEngine].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How rows are paged out of the store.
    pub pagination: PaginationConfig,
}

/// Lists real transactions alongside the monthly shares of amortized ones.
///
/// The engine holds no state besides its store and config, so it can be
/// shared between concurrent callers.
#[derive(Debug, Clone)]
pub struct AmortizationEngine<S> {
    store: S,
    config: EngineConfig,
}

impl<S: TransactionStore> AmortizationEngine<S> {
    /// Create an engine that reads from `store`.
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// The store the engine reads from.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The engine's settings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Every line item for `owner_id` in `month`, sorted by date.
    ///
    /// # Errors
    /// Returns the store's error if a request fails.
    pub async fn materialize_month(
        &self,
        owner_id: UserId,
        month: YearMonth,
        filters: &TransactionFilters,
    ) -> Result<Vec<LineItem>, Error> {
        materialize_month(
            &self.store,
            &self.config.pagination,
            owner_id,
            month,
            filters,
        )
        .await
    }

    /// Every line item for `owner_id` between two `YYYY-MM-DD` dates,
    /// inclusive. Unparsable dates give an empty list.
    ///
    /// # Errors
    /// Returns the store's error if any month fails to load.
    pub async fn aggregate(
        &self,
        owner_id: UserId,
        date_from: &str,
        date_to: &str,
        filters: &TransactionFilters,
    ) -> Result<Vec<LineItem>, Error> {
        aggregate_range(
            &self.store,
            &self.config.pagination,
            owner_id,
            date_from,
            date_to,
            filters,
        )
        .await
    }

    /// Like [AmortizationEngine::aggregate], but with parsed dates.
    ///
    /// # Errors
    /// Returns the store's error if any month fails to load.
    pub async fn aggregate_dates(
        &self,
        owner_id: UserId,
        from: Date,
        to: Date,
        filters: &TransactionFilters,
    ) -> Result<Vec<LineItem>, Error> {
        aggregate_date_range(
            &self.store,
            &self.config.pagination,
            owner_id,
            from,
            to,
            filters,
        )
        .await
    }
}
