//! Defines the transaction store trait the amortization engine reads from.

use std::{future::Future, ops::RangeInclusive};

use time::Date;

use crate::{Error, database_id::UserId, filters::TransactionFilters, transaction::Transaction};

mod sqlite;

pub use sqlite::SQLiteTransactionStore;

/// A read-only source of transactions that answers one bounded page at a time.
///
/// Stores may refuse to return more than a fixed number of rows per request.
/// Use [fetch_all](crate::fetch_all) to read every matching row.
pub trait TransactionStore: Send + Sync {
    /// Retrieve up to `page.limit` transactions matching `query`, skipping the
    /// first `page.offset` matches.
    ///
    /// Implementers must order rows by date and then ID so that consecutive
    /// pages neither skip nor repeat rows.
    fn get_page(
        &self,
        query: &TransactionQuery,
        page: PageRange,
    ) -> impl Future<Output = Result<Vec<Transaction>, Error>> + Send;

    /// The most rows the store will return for a single request, if capped.
    fn max_rows_per_request(&self) -> Option<u64> {
        None
    }
}

/// A window of rows to request from a [TransactionStore].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    /// The number of matching rows to skip.
    pub offset: u64,
    /// The maximum number of rows to return.
    pub limit: u64,
}

/// The order to sort transactions in a [TransactionQuery].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Sort in order of increasing value.
    #[default]
    Ascending,
    /// Sort in order of decreasing value.
    Descending,
}

/// Defines which transactions [TransactionStore::get_page] should return.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionQuery {
    /// Only return transactions owned by this user.
    pub owner_id: UserId,
    /// Include transactions within `date_range` (inclusive).
    pub date_range: Option<RangeInclusive<Date>>,
    /// `Some(true)` selects amortized parents, `Some(false)` selects rows where
    /// the flag is false or missing, `None` selects both.
    pub amortized: Option<bool>,
    /// Extra filters on the selected rows.
    pub filters: TransactionFilters,
    /// Orders transactions by date, then ID.
    pub sort_date: SortOrder,
}

impl TransactionQuery {
    /// Every transaction owned by `owner_id`.
    pub fn for_owner(owner_id: UserId) -> Self {
        Self {
            owner_id,
            date_range: None,
            amortized: None,
            filters: TransactionFilters::default(),
            sort_date: SortOrder::Ascending,
        }
    }

    /// The non-amortized transactions of `owner_id` in `date_range`.
    pub fn real_in_range(
        owner_id: UserId,
        date_range: RangeInclusive<Date>,
        filters: TransactionFilters,
    ) -> Self {
        Self {
            date_range: Some(date_range),
            amortized: Some(false),
            filters,
            ..Self::for_owner(owner_id)
        }
    }

    /// Every amortized parent of `owner_id`, regardless of date.
    pub fn amortized_parents(owner_id: UserId) -> Self {
        Self {
            amortized: Some(true),
            ..Self::for_owner(owner_id)
        }
    }
}
