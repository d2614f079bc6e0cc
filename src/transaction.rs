//! Defines the stored transaction record, its amortization plan, and the
//! virtual allocations synthesised from amortized parents.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    database_id::{DatabaseId, TransactionId, UserId},
    month::YearMonth,
};

// ============================================================================
// MODELS
// ============================================================================

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// A transaction with an [AmortizationPlan] is a *parent*: its amount is the
/// original lump sum, which is excluded from simple totals and instead shows up
/// as one [VirtualAllocation] per month of the plan.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The ID of the user that owns the transaction.
    pub owner_id: UserId,
    /// When the transaction happened.
    pub date: Date,
    /// The amount of money spent or earned in this transaction.
    pub amount: Decimal,
    /// Who the money was paid to or received from.
    pub merchant: String,
    /// The ID of the category the transaction belongs to.
    pub category_id: Option<DatabaseId>,
    /// The display name of the category, if any.
    pub category_name: Option<String>,
    /// Marks one-off spending the user wants to be able to filter out.
    pub is_exceptional: bool,
    /// Whether the amount should be left out of simple sums.
    ///
    /// Always true for amortized parents.
    pub excluded_from_totals: bool,
    /// The amortization plan, present only on parent records.
    pub amortization: Option<AmortizationPlan>,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(owner_id: UserId, amount: Decimal, date: Date, merchant: &str) -> TransactionBuilder {
        TransactionBuilder {
            owner_id,
            amount,
            date,
            merchant: merchant.to_owned(),
            category_id: None,
            category_name: None,
            is_exceptional: false,
        }
    }

    /// Whether this is an amortized parent record.
    pub fn is_amortized(&self) -> bool {
        self.amortization.is_some()
    }
}

/// A builder for creating [Transaction] instances.
///
/// New transactions always start out unamortized. Use
/// [setup_amortization](crate::setup_amortization) to turn a stored
/// transaction into a parent.
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The ID of the user that owns the transaction.
    pub owner_id: UserId,

    /// The monetary amount of the transaction.
    pub amount: Decimal,

    /// The date when the transaction occurred.
    pub date: Date,

    /// Who the money was paid to or received from.
    pub merchant: String,

    /// The category of the transaction, e.g. "Groceries", "Transport", "Rent".
    pub category_id: Option<DatabaseId>,

    /// The display name of the category.
    pub category_name: Option<String>,

    /// Whether the transaction is a one-off the user may want to hide.
    pub is_exceptional: bool,
}

impl TransactionBuilder {
    /// Set the category for the transaction.
    pub fn category(mut self, category_id: Option<DatabaseId>, name: Option<&str>) -> Self {
        self.category_id = category_id;
        self.category_name = name.map(str::to_owned);
        self
    }

    /// Mark the transaction as exceptional.
    pub fn exceptional(mut self, is_exceptional: bool) -> Self {
        self.is_exceptional = is_exceptional;
        self
    }

    /// Create the [Transaction] with the ID assigned by the store.
    pub fn finalise(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            owner_id: self.owner_id,
            date: self.date,
            amount: self.amount,
            merchant: self.merchant,
            category_id: self.category_id,
            category_name: self.category_name,
            is_exceptional: self.is_exceptional,
            excluded_from_totals: false,
            amortization: None,
        }
    }
}

/// How a parent transaction is spread across months.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationPlan {
    /// The duration chosen when the plan was set up, 1 to 60 months.
    pub months: u32,
    /// A shorter duration set later. Overrides `months` when present.
    pub adjusted_months: Option<u32>,
    /// The first month the allocation applies to.
    ///
    /// Plans without a start month produce no allocations.
    pub start_month: Option<YearMonth>,
    /// The share of the first month at set-up time, for display only.
    pub monthly_amount: Decimal,
    /// Audit state of the plan.
    pub status: AmortizationStatus,
    /// When the plan was last adjusted.
    pub adjusted_at: Option<OffsetDateTime>,
}

impl AmortizationPlan {
    /// The adjusted duration if set, else the original duration.
    pub fn effective_months(&self) -> u32 {
        self.adjusted_months.unwrap_or(self.months)
    }
}

/// Audit state of an [AmortizationPlan].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmortizationStatus {
    /// The plan runs for its original duration.
    #[default]
    Active,
    /// The plan's duration has been changed since set-up.
    Adjusted,
}

impl AmortizationStatus {
    /// The name stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Adjusted => "adjusted",
        }
    }

    /// Parse a stored status name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "active" => Some(Self::Active),
            "adjusted" => Some(Self::Adjusted),
            _ => None,
        }
    }
}

/// Identifies one virtual allocation: a parent and a zero-based month index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VirtualAllocationId {
    /// The parent transaction the allocation was derived from.
    pub parent_id: TransactionId,
    /// Zero-based month index within the parent's plan.
    pub month_index: u32,
}

impl fmt::Display for VirtualAllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "amortized-{}-{}", self.parent_id, self.month_index)
    }
}

/// One month's share of an amortized parent.
///
/// Virtual allocations are never stored. They are built fresh on every read
/// and carry a copy of the parent so they can be displayed like a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualAllocation {
    /// Synthetic ID, unique per parent and month.
    pub id: VirtualAllocationId,
    /// The parent record this share was derived from.
    pub parent: Transaction,
    /// This month's share of the parent's amount.
    pub amount: Decimal,
    /// The first day of the month the share belongs to.
    pub date: Date,
    /// One-based position of this month within the plan.
    pub index: u32,
    /// The number of months the parent was split over.
    pub total: u32,
}

/// A row in a month or range listing: either a stored transaction or a
/// virtual allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineItem {
    /// A stored, non-amortized transaction.
    Real(Transaction),
    /// A synthesised monthly share of an amortized parent.
    Virtual(VirtualAllocation),
}

impl LineItem {
    /// The date the row is listed under.
    pub fn date(&self) -> Date {
        match self {
            Self::Real(transaction) => transaction.date,
            Self::Virtual(allocation) => allocation.date,
        }
    }

    /// The amount the row contributes.
    pub fn amount(&self) -> Decimal {
        match self {
            Self::Real(transaction) => transaction.amount,
            Self::Virtual(allocation) => allocation.amount,
        }
    }

    /// Who the money was paid to or received from.
    pub fn merchant(&self) -> &str {
        match self {
            Self::Real(transaction) => &transaction.merchant,
            Self::Virtual(allocation) => &allocation.parent.merchant,
        }
    }

    /// Whether the row was synthesised rather than read from the store.
    pub fn is_virtual(&self) -> bool {
        matches!(self, Self::Virtual(_))
    }

    /// Whether the row counts towards simple sums.
    pub fn counts_towards_totals(&self) -> bool {
        match self {
            Self::Real(transaction) => !transaction.excluded_from_totals,
            Self::Virtual(_) => true,
        }
    }
}
