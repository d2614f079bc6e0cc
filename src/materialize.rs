//! Builds the listing for a single calendar month: the real transactions
//! dated in that month plus one virtual allocation for every amortized parent
//! whose plan covers it.

use crate::{
    Error,
    database_id::UserId,
    filters::TransactionFilters,
    month::{YearMonth, month_offset},
    pagination::{PaginationConfig, fetch_all},
    split::split_amount,
    store::{TransactionQuery, TransactionStore},
    transaction::{LineItem, Transaction, VirtualAllocation, VirtualAllocationId},
};

/// Get every line item for `owner_id` in `month`, sorted by date.
///
/// Real transactions are read with `filters` applied. Amortized parents are
/// read unfiltered, since a parent dated in another month may still have a
/// share in this one. Rows with equal dates keep their relative order, real
/// transactions first.
///
/// Nothing is written to the store, so calling this again with unchanged data
/// returns the same items in the same order.
///
/// # Errors
/// Returns the store's error if either read fails.
pub async fn materialize_month<S: TransactionStore>(
    store: &S,
    config: &PaginationConfig,
    owner_id: UserId,
    month: YearMonth,
    filters: &TransactionFilters,
) -> Result<Vec<LineItem>, Error> {
    let real_query = TransactionQuery::real_in_range(
        owner_id,
        month.first_day()..=month.last_day(),
        filters.clone(),
    );
    let parent_query = TransactionQuery::amortized_parents(owner_id);

    let (transactions, parents) = futures::try_join!(
        fetch_all(store, &real_query, config),
        fetch_all(store, &parent_query, config)
    )?;

    let allocations: Vec<VirtualAllocation> = parents
        .iter()
        .filter_map(|parent| allocate_for_month(parent, month))
        .collect();

    tracing::debug!(
        "materialized {month} for owner {owner_id}: {} transactions, {} allocations",
        transactions.len(),
        allocations.len()
    );

    let mut items: Vec<LineItem> = transactions
        .into_iter()
        .map(LineItem::Real)
        .chain(allocations.into_iter().map(LineItem::Virtual))
        .collect();
    items.sort_by_key(LineItem::date);

    Ok(items)
}

/// The share of `parent` that falls in `month`, if any.
///
/// Returns `None` if `parent` is not amortized, has no start month, or its
/// plan does not cover `month`. The share is always recomputed from the
/// parent's full amount and its current effective duration.
pub fn allocate_for_month(parent: &Transaction, month: YearMonth) -> Option<VirtualAllocation> {
    let plan = parent.amortization.as_ref()?;

    let Some(start_month) = plan.start_month else {
        tracing::warn!(
            "skipping amortized transaction {} because it has no start month",
            parent.id
        );
        return None;
    };

    let effective_months = plan.effective_months();
    let index = u32::try_from(month_offset(start_month, month)).ok()?;
    if index >= effective_months {
        return None;
    }

    let shares = split_amount(parent.amount, effective_months);
    let amount = shares
        .get(index as usize)
        .copied()
        .unwrap_or(plan.monthly_amount);

    Some(VirtualAllocation {
        id: VirtualAllocationId {
            parent_id: parent.id,
            month_index: index,
        },
        parent: parent.clone(),
        amount,
        date: month.first_day(),
        index: index + 1,
        total: effective_months,
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use time::{OffsetDateTime, macros::date};

    use crate::{
        filters::{ExceptionalFilter, TransactionFilters},
        lifecycle::{adjust_amortization, setup_amortization},
        month::YearMonth,
        pagination::PaginationConfig,
        split::split_amount,
        store::SQLiteTransactionStore,
        transaction::{LineItem, Transaction},
    };

    use super::{allocate_for_month, materialize_month};

    fn get_test_store() -> SQLiteTransactionStore {
        SQLiteTransactionStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn dec(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    fn ym(text: &str) -> YearMonth {
        text.parse().unwrap()
    }

    fn create_parent(
        store: &SQLiteTransactionStore,
        amount: &str,
        months: u32,
        start: &str,
    ) -> Transaction {
        let transaction = store
            .create(Transaction::build(1, dec(amount), date!(2025 - 12 - 20), "Insurer"))
            .unwrap();
        let parent = setup_amortization(transaction, months, ym(start)).unwrap();
        store.update(&parent).unwrap();
        parent
    }

    fn virtual_items(items: &[LineItem]) -> Vec<&LineItem> {
        items.iter().filter(|item| item.is_virtual()).collect()
    }

    #[tokio::test]
    async fn start_month_gets_first_share() {
        let store = get_test_store();
        let parent = create_parent(&store, "1000", 3, "2026-01");

        let items = materialize_month(
            &store,
            &PaginationConfig::default(),
            1,
            ym("2026-01"),
            &TransactionFilters::default(),
        )
        .await
        .unwrap();

        assert_eq!(items.len(), 1);
        let LineItem::Virtual(allocation) = &items[0] else {
            panic!("want a virtual allocation, got {:?}", items[0]);
        };
        assert_eq!(allocation.amount, split_amount(dec("1000"), 3)[0]);
        assert_eq!(allocation.amount, dec("333.34"));
        assert_eq!(allocation.date, date!(2026 - 01 - 01));
        assert_eq!(allocation.index, 1);
        assert_eq!(allocation.total, 3);
        assert_eq!(allocation.id.parent_id, parent.id);
    }

    #[tokio::test]
    async fn months_outside_plan_get_nothing() {
        let store = get_test_store();
        create_parent(&store, "1000", 3, "2026-01");
        let config = PaginationConfig::default();
        let filters = TransactionFilters::default();

        for month in ["2025-12", "2026-04", "2027-01"] {
            let items = materialize_month(&store, &config, 1, ym(month), &filters)
                .await
                .unwrap();

            assert!(items.is_empty(), "want no items in {month}, got {items:?}");
        }
    }

    #[tokio::test]
    async fn merges_and_sorts_real_and_virtual_rows() {
        let store = get_test_store();
        create_parent(&store, "600", 6, "2026-02");
        let late = store
            .create(Transaction::build(1, dec("12"), date!(2026 - 02 - 20), "Bakery"))
            .unwrap();
        let early = store
            .create(Transaction::build(1, dec("30"), date!(2026 - 02 - 01), "Fuel"))
            .unwrap();

        let items = materialize_month(
            &store,
            &PaginationConfig::default(),
            1,
            ym("2026-02"),
            &TransactionFilters::default(),
        )
        .await
        .unwrap();

        let dates: Vec<_> = items.iter().map(LineItem::date).collect();
        assert_eq!(
            dates,
            vec![date!(2026 - 02 - 01), date!(2026 - 02 - 01), date!(2026 - 02 - 20)]
        );
        assert_eq!(items[0], LineItem::Real(early));
        assert!(items[1].is_virtual());
        assert_eq!(items[1].amount(), dec("100"));
        assert_eq!(items[2], LineItem::Real(late));
    }

    #[tokio::test]
    async fn parent_never_appears_as_real_row() {
        let store = get_test_store();
        let parent = create_parent(&store, "1200", 12, "2025-12");

        let items = materialize_month(
            &store,
            &PaginationConfig::default(),
            1,
            ym("2025-12"),
            &TransactionFilters::default(),
        )
        .await
        .unwrap();

        assert!(!items.contains(&LineItem::Real(parent)));
        assert_eq!(virtual_items(&items).len(), 1);
    }

    #[tokio::test]
    async fn filters_apply_to_real_rows_only() {
        let store = get_test_store();
        create_parent(&store, "300", 3, "2026-01");
        store
            .create(
                Transaction::build(1, dec("900"), date!(2026 - 01 - 09), "Flights")
                    .exceptional(true),
            )
            .unwrap();
        let groceries = store
            .create(Transaction::build(1, dec("80"), date!(2026 - 01 - 10), "Grocer"))
            .unwrap();

        let items = materialize_month(
            &store,
            &PaginationConfig::default(),
            1,
            ym("2026-01"),
            &TransactionFilters {
                exceptional: ExceptionalFilter::Exclude,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(items.len(), 2);
        assert!(items[0].is_virtual());
        assert_eq!(items[1], LineItem::Real(groceries));
    }

    #[tokio::test]
    async fn other_owners_are_ignored() {
        let store = get_test_store();
        create_parent(&store, "300", 3, "2026-01");
        store
            .create(Transaction::build(1, dec("5"), date!(2026 - 01 - 09), ""))
            .unwrap();

        let items = materialize_month(
            &store,
            &PaginationConfig::default(),
            2,
            ym("2026-01"),
            &TransactionFilters::default(),
        )
        .await
        .unwrap();

        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn materializing_twice_gives_identical_results() {
        let store = get_test_store();
        create_parent(&store, "1000", 3, "2026-01");
        create_parent(&store, "250", 2, "2025-12");
        for day in [3, 3, 17] {
            store
                .create(Transaction::build(
                    1,
                    dec("9.99"),
                    date!(2026 - 01 - 01).replace_day(day).unwrap(),
                    "Shop",
                ))
                .unwrap();
        }
        let config = PaginationConfig { page_size: 2 };
        let filters = TransactionFilters::default();

        let first = materialize_month(&store, &config, 1, ym("2026-01"), &filters)
            .await
            .unwrap();
        let second = materialize_month(&store, &config, 1, ym("2026-01"), &filters)
            .await
            .unwrap();

        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
    }

    #[test]
    fn each_parent_gets_its_own_allocation_id() {
        let store = get_test_store();
        let a = create_parent(&store, "100", 2, "2026-01");
        let b = create_parent(&store, "100", 2, "2026-01");

        let a_share = allocate_for_month(&a, ym("2026-02")).unwrap();
        let b_share = allocate_for_month(&b, ym("2026-02")).unwrap();

        assert_ne!(a_share.id, b_share.id);
        assert_eq!(a_share.id.month_index, 1);
        assert_eq!(a_share.index, 2);
    }

    #[test]
    fn plain_transactions_have_no_allocation() {
        let transaction =
            Transaction::build(1, dec("100"), date!(2026 - 01 - 01), "").finalise(1);

        assert_eq!(allocate_for_month(&transaction, ym("2026-01")), None);
    }

    #[test]
    fn parent_without_start_month_is_skipped() {
        let store = get_test_store();
        let mut parent = create_parent(&store, "100", 2, "2026-01");
        if let Some(plan) = parent.amortization.as_mut() {
            plan.start_month = None;
        }

        assert_eq!(allocate_for_month(&parent, ym("2026-01")), None);
    }

    #[test]
    fn shortening_a_plan_removes_later_months() {
        let store = get_test_store();
        let parent = create_parent(&store, "1200", 12, "2026-01");
        let now = OffsetDateTime::from_unix_timestamp(1_775_000_000).unwrap();
        let adjusted = adjust_amortization(parent.clone(), 6, date!(2026 - 04 - 01), now).unwrap();

        let months: Vec<_> = (1..=12u8)
            .map(|month| YearMonth::new(2026, month.try_into().unwrap()).unwrap())
            .collect();
        let before = months
            .iter()
            .filter(|month| allocate_for_month(&parent, **month).is_some())
            .count();
        let after = months
            .iter()
            .filter(|month| allocate_for_month(&adjusted, **month).is_some())
            .count();

        assert_eq!(before, 12);
        assert_eq!(after, 6);
        assert_eq!(allocate_for_month(&adjusted, ym("2026-07")), None);
    }

    /// Shortening a plan re-splits the original total over the new duration,
    /// which also changes the share of months that have already passed.
    #[test]
    fn adjustment_resplits_elapsed_months_from_original_total() {
        let store = get_test_store();
        let parent = create_parent(&store, "1200", 12, "2026-01");
        let now = OffsetDateTime::from_unix_timestamp(1_775_000_000).unwrap();
        let adjusted = adjust_amortization(parent.clone(), 6, date!(2026 - 04 - 01), now).unwrap();

        let january_before = allocate_for_month(&parent, ym("2026-01")).unwrap();
        let january_after = allocate_for_month(&adjusted, ym("2026-01")).unwrap();

        assert_eq!(january_before.amount, dec("100"));
        assert_eq!(january_after.amount, dec("200"));
        assert_eq!(
            adjusted.amortization.as_ref().map(|plan| plan.monthly_amount),
            Some(dec("100")),
            "the recorded monthly amount is left as it was at set-up"
        );

        let total: Decimal = (1..=6u8)
            .filter_map(|month| {
                allocate_for_month(&adjusted, YearMonth::new(2026, month.try_into().ok()?)?)
            })
            .map(|allocation| allocation.amount)
            .sum();
        assert_eq!(total, dec("1200"));
    }
}
