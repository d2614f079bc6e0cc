//! Combines month listings into a listing for an arbitrary date range, and
//! sums line items by month.

use std::collections::BTreeMap;

use futures::future::try_join_all;
use rust_decimal::Decimal;
use time::{Date, macros::format_description};

use crate::{
    Error,
    database_id::UserId,
    filters::TransactionFilters,
    materialize::materialize_month,
    month::{YearMonth, months_between},
    pagination::PaginationConfig,
    store::TransactionStore,
    transaction::LineItem,
};

/// Get every line item for `owner_id` dated from `date_from` to `date_to`
/// inclusive, where both dates are `YYYY-MM-DD` strings.
///
/// Returns an empty list if either date cannot be parsed.
///
/// # Errors
/// Returns the store's error if any month fails to load.
pub async fn aggregate_range<S: TransactionStore>(
    store: &S,
    config: &PaginationConfig,
    owner_id: UserId,
    date_from: &str,
    date_to: &str,
    filters: &TransactionFilters,
) -> Result<Vec<LineItem>, Error> {
    let format = format_description!("[year]-[month]-[day]");

    let (Ok(from), Ok(to)) = (
        Date::parse(date_from.trim(), format),
        Date::parse(date_to.trim(), format),
    ) else {
        tracing::debug!("ignoring invalid date range \"{date_from}\" to \"{date_to}\"");
        return Ok(Vec::new());
    };

    aggregate_date_range(store, config, owner_id, from, to, filters).await
}

/// Get every line item for `owner_id` dated from `from` to `to` inclusive.
///
/// Each calendar month touched by the range is materialized in full, all
/// months concurrently, and the rows are then clipped to the exact range.
/// Rows come back grouped by month in calendar order, each month sorted by
/// date. Returns an empty list if `from` is after `to`.
///
/// # Errors
/// Returns the first store error from any month. The remaining months are
/// dropped and no partial result is returned.
pub async fn aggregate_date_range<S: TransactionStore>(
    store: &S,
    config: &PaginationConfig,
    owner_id: UserId,
    from: Date,
    to: Date,
    filters: &TransactionFilters,
) -> Result<Vec<LineItem>, Error> {
    let months = months_between(YearMonth::from(from), YearMonth::from(to));
    if months.is_empty() {
        return Ok(Vec::new());
    }

    let per_month = try_join_all(
        months
            .iter()
            .map(|&month| materialize_month(store, config, owner_id, month, filters)),
    )
    .await?;

    let items: Vec<LineItem> = per_month
        .into_iter()
        .flatten()
        .filter(|item| (from..=to).contains(&item.date()))
        .collect();

    tracing::info!(
        "aggregated {} line items over {} months for owner {owner_id} ({from} to {to})",
        items.len(),
        months.len()
    );

    Ok(items)
}

/// Sums line items by calendar month.
///
/// Rows excluded from totals are skipped, so an amortized parent never counts
/// twice alongside its monthly shares.
pub fn monthly_totals(items: &[LineItem]) -> BTreeMap<YearMonth, Decimal> {
    let mut totals = BTreeMap::new();

    for item in items.iter().filter(|item| item.counts_towards_totals()) {
        *totals
            .entry(YearMonth::from(item.date()))
            .or_insert(Decimal::ZERO) += item.amount();
    }

    totals
}
