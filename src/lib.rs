//! Expense spreading for a household budget.
//!
//! A lump-sum transaction can be spread ("amortized") across a run of
//! consecutive calendar months. The per-month shares are never written back to
//! storage: they are synthesised as [VirtualAllocation]s every time a month or
//! date range is read and merged with the real transactions for that period.
//!
//! The main entry points are [AmortizationEngine::materialize_month] and
//! [AmortizationEngine::aggregate], plus the pure helpers [split_amount] and
//! [month_offset] for previewing a plan before it is saved.

#![warn(missing_docs)]

use rust_decimal::Decimal;

mod aggregate;
mod database_id;
mod engine;
mod filters;
mod lifecycle;
mod materialize;
mod month;
mod pagination;
mod split;
mod store;
mod transaction;

pub use aggregate::{aggregate_date_range, aggregate_range, monthly_totals};
pub use database_id::{DatabaseId, TransactionId, UserId};
pub use engine::{AmortizationEngine, EngineConfig};
pub use filters::{ExceptionalFilter, TransactionFilters};
pub use lifecycle::{
    MAX_AMORTIZATION_MONTHS, adjust_amortization, cancel_amortization, completed_months,
    setup_amortization,
};
pub use materialize::{allocate_for_month, materialize_month};
pub use month::{InvalidYearMonth, YearMonth, month_offset, months_between};
pub use pagination::{PaginationConfig, fetch_all};
pub use split::{from_minor_units, split_amount, to_minor_units};
pub use store::{
    PageRange, SQLiteTransactionStore, SortOrder, TransactionQuery, TransactionStore,
};
pub use transaction::{
    AmortizationPlan, AmortizationStatus, LineItem, Transaction, TransactionBuilder,
    VirtualAllocation, VirtualAllocationId,
};

/// The errors that may occur while reading or amortizing transactions.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// A store other than the SQLite store failed to answer a request.
    ///
    /// Store collaborators should put enough detail in the message to debug
    /// the failure from the logs. No retry is attempted by this crate.
    #[error("the transaction store failed: {0}")]
    StoreError(String),

    /// An amount was too large to be represented in minor currency units.
    #[error("{0} cannot be represented in minor currency units")]
    InvalidAmount(Decimal),

    /// The planned number of months is outside the allowed range.
    #[error("an amortization must span between 1 and 60 months, got {0}")]
    InvalidAmortizationMonths(u32),

    /// The adjusted number of months is outside the allowed range.
    ///
    /// An adjustment may shorten a plan, but never below the number of months
    /// that have already elapsed, and never lengthen it.
    #[error("cannot adjust amortization to {requested} months, must be between {minimum} and {maximum}")]
    InvalidAdjustedMonths {
        /// The number of months that was asked for.
        requested: u32,
        /// The smallest number of months allowed.
        minimum: u32,
        /// The largest number of months allowed.
        maximum: u32,
    },

    /// Tried to set up an amortization on a transaction that already has one.
    #[error("the transaction is already amortized")]
    AlreadyAmortized,

    /// Tried to adjust or cancel an amortization that does not exist.
    #[error("the transaction is not amortized")]
    NotAmortized,

    /// The amortized transaction has no start month, so it cannot be adjusted.
    #[error("the amortized transaction has no start month")]
    MissingStartMonth,

    /// Tried to update a transaction that does not exist
    #[error("tried to update a transaction that is not in the database")]
    UpdateMissingTransaction,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
