//! Optional filters applied when reading real transactions for a month.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How exceptional transactions should be treated in a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExceptionalFilter {
    /// Show exceptional transactions alongside everything else.
    #[default]
    Include,
    /// Hide exceptional transactions.
    Exclude,
    /// Show only exceptional transactions.
    Only,
}

/// Narrows down which real transactions are returned.
///
/// These filters only apply to stored transactions. Amortized parents are
/// always read unfiltered so that every month of a plan is accounted for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilters {
    /// Include, exclude, or isolate exceptional transactions.
    #[serde(default)]
    pub exceptional: ExceptionalFilter,
    /// Smallest amount to include (inclusive).
    ///
    /// Amounts are stored in whole cents, so a bound between two cents only
    /// admits amounts on its side of it.
    pub min_amount: Option<Decimal>,
    /// Largest amount to include (inclusive).
    pub max_amount: Option<Decimal>,
    /// Case-insensitive substring the merchant must contain. Case folding
    /// covers all of Unicode, not just ASCII.
    pub merchant: Option<String>,
}

impl TransactionFilters {
    /// The merchant search term, ignoring blank input.
    pub fn merchant_term(&self) -> Option<&str> {
        self.merchant
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }
}
