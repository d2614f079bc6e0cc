//! Reads every row matching a query, one bounded page at a time.
//!
//! Hosted row stores cap how many rows a single request may return, so a naive
//! single request silently truncates long expense histories. [fetch_all] keeps
//! asking for the next page until the store runs out of rows.

use crate::{
    Error,
    store::{PageRange, TransactionQuery, TransactionStore},
    transaction::Transaction,
};

/// The config for reading data one page at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    /// The number of rows to request per page.
    ///
    /// If the store has a smaller per-request cap, the cap is used instead.
    pub page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self { page_size: 1000 }
    }
}

/// Retrieve every transaction matching `query` from `store`.
///
/// Pages are requested in increasing offset order and appended as they
/// arrive. Reading stops at the first page with fewer rows than were asked
/// for, including an empty page.
///
/// # Errors
/// Returns the store's error as soon as any page request fails. Rows from
/// earlier pages are discarded.
pub async fn fetch_all<S: TransactionStore>(
    store: &S,
    query: &TransactionQuery,
    config: &PaginationConfig,
) -> Result<Vec<Transaction>, Error> {
    let page_size = effective_page_size(config.page_size, store.max_rows_per_request());
    let mut transactions = Vec::new();
    let mut offset = 0;

    loop {
        let page = store
            .get_page(query, PageRange { offset, limit: page_size })
            .await?;
        let page_len = page.len() as u64;

        tracing::debug!(
            "fetched {page_len} transactions for owner {} at offset {offset}",
            query.owner_id
        );

        transactions.extend(page);

        if page_len < page_size {
            break;
        }

        offset += page_len;
    }

    Ok(transactions)
}

/// A page must never be larger than the store's cap, otherwise a full page
/// looks like a short final page and the remaining rows are skipped.
fn effective_page_size(page_size: u64, store_cap: Option<u64>) -> u64 {
    let page_size = page_size.max(1);

    match store_cap {
        Some(cap) => page_size.min(cap.max(1)),
        None => page_size,
    }
}
