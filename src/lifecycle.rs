//! Sets up, adjusts, and cancels the amortization of a transaction.
//!
//! These functions only compute the new state of the record. Saving it is up
//! to the caller, e.g. with [SQLiteTransactionStore::update](crate::SQLiteTransactionStore::update).

use time::{Date, OffsetDateTime};

use crate::{
    Error,
    month::{YearMonth, month_offset},
    split::split_amount,
    transaction::{AmortizationPlan, AmortizationStatus, Transaction},
};

/// The longest plan a transaction can be spread over.
pub const MAX_AMORTIZATION_MONTHS: u32 = 60;

/// Turn `transaction` into an amortized parent spread over `months` months,
/// starting in `start_month`.
///
/// The parent's own amount is excluded from totals from now on; only its
/// monthly shares count.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmortizationMonths] if `months` is not between 1 and 60,
/// - or [Error::AlreadyAmortized] if `transaction` already has a plan.
pub fn setup_amortization(
    mut transaction: Transaction,
    months: u32,
    start_month: YearMonth,
) -> Result<Transaction, Error> {
    if !(1..=MAX_AMORTIZATION_MONTHS).contains(&months) {
        return Err(Error::InvalidAmortizationMonths(months));
    }

    if transaction.is_amortized() {
        return Err(Error::AlreadyAmortized);
    }

    let monthly_amount = split_amount(transaction.amount, months)
        .first()
        .copied()
        .ok_or(Error::InvalidAmount(transaction.amount))?;

    tracing::info!(
        "amortizing transaction {} over {months} months from {start_month}",
        transaction.id
    );

    transaction.excluded_from_totals = true;
    transaction.amortization = Some(AmortizationPlan {
        months,
        adjusted_months: None,
        start_month: Some(start_month),
        monthly_amount,
        status: AmortizationStatus::Active,
        adjusted_at: None,
    });

    Ok(transaction)
}

/// Change how many months an amortized `transaction` is spread over.
///
/// A plan can be shortened down to the number of months that have already
/// passed as of `today` (but never below one), and lengthened back up to its
/// original duration. The parent's amount and the recorded monthly amount are
/// left unchanged.
///
/// # Errors
/// This function will return a:
/// - [Error::NotAmortized] if `transaction` has no plan,
/// - [Error::MissingStartMonth] if the plan has no start month,
/// - or [Error::InvalidAdjustedMonths] if `months` is out of range.
pub fn adjust_amortization(
    mut transaction: Transaction,
    months: u32,
    today: Date,
    now: OffsetDateTime,
) -> Result<Transaction, Error> {
    let transaction_id = transaction.id;
    let plan = transaction
        .amortization
        .as_mut()
        .ok_or(Error::NotAmortized)?;
    let start_month = plan.start_month.ok_or(Error::MissingStartMonth)?;

    let minimum = completed_months(start_month, plan.months, today).max(1);
    let maximum = plan.months;
    if !(minimum..=maximum).contains(&months) {
        return Err(Error::InvalidAdjustedMonths {
            requested: months,
            minimum,
            maximum,
        });
    }

    tracing::info!(
        "adjusting amortization of transaction {transaction_id} from {} to {months} months",
        plan.effective_months()
    );

    plan.adjusted_months = Some(months);
    plan.status = AmortizationStatus::Adjusted;
    plan.adjusted_at = Some(now);

    Ok(transaction)
}

/// Turn an amortized parent back into a plain transaction.
///
/// # Errors
/// Returns [Error::NotAmortized] if `transaction` has no plan.
pub fn cancel_amortization(mut transaction: Transaction) -> Result<Transaction, Error> {
    if transaction.amortization.take().is_none() {
        return Err(Error::NotAmortized);
    }

    tracing::info!("cancelled amortization of transaction {}", transaction.id);
    transaction.excluded_from_totals = false;

    Ok(transaction)
}

/// The number of months of a `months`-long plan starting in `start_month`
/// that are fully behind `today`.
pub fn completed_months(start_month: YearMonth, months: u32, today: Date) -> u32 {
    let elapsed = month_offset(start_month, today).max(0);

    u32::try_from(elapsed).unwrap_or(u32::MAX).min(months)
}
