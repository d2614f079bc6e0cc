//! Splits a lump sum into equal monthly shares without losing a cent.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

/// The number of decimal places in one minor currency unit (cents).
const MINOR_UNIT_SCALE: u32 = 2;

/// Convert `amount` to whole minor units, rounding half away from zero at the
/// cent boundary.
///
/// Returns `None` if the result does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    to_minor_units_with(amount, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert `amount` to whole minor units, rounding with `strategy`.
pub(crate) fn to_minor_units_with(amount: Decimal, strategy: RoundingStrategy) -> Option<i64> {
    amount
        .round_dp_with_strategy(MINOR_UNIT_SCALE, strategy)
        .checked_mul(Decimal::ONE_HUNDRED)?
        .to_i64()
}

/// Convert whole minor units back to a decimal amount.
pub fn from_minor_units(minor_units: i64) -> Decimal {
    Decimal::new(minor_units, MINOR_UNIT_SCALE)
}

/// Split `total` into `months` shares that add up to exactly `total`.
///
/// Every share is the floor of `total / months` in minor units, except the
/// first which also takes the remainder. For example, splitting 1000 over
/// three months gives `[333.34, 333.33, 333.33]`.
///
/// An empty list is returned if `months` is zero or `total` cannot be
/// represented in minor units. Callers should treat an empty list as "nothing
/// to allocate".
pub fn split_amount(total: Decimal, months: u32) -> Vec<Decimal> {
    if months == 0 {
        return Vec::new();
    }

    let Some(total_minor) = to_minor_units(total) else {
        tracing::warn!("cannot split {total}, it does not fit in minor currency units");
        return Vec::new();
    };

    let months = i64::from(months);
    let base = total_minor.div_euclid(months);
    let remainder = total_minor - base * months;

    (0..months)
        .map(|index| {
            if index == 0 {
                from_minor_units(base + remainder)
            } else {
                from_minor_units(base)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::{from_minor_units, split_amount, to_minor_units};

    fn dec(text: &str) -> Decimal {
        Decimal::from_str(text).expect("invalid decimal literal")
    }

    #[test]
    fn remainder_goes_to_first_month() {
        let got = split_amount(dec("1000"), 3);

        assert_eq!(got, vec![dec("333.34"), dec("333.33"), dec("333.33")]);
    }

    #[test]
    fn single_month_is_whole_total() {
        assert_eq!(split_amount(dec("1234.56"), 1), vec![dec("1234.56")]);
    }

    #[test]
    fn zero_months_is_empty() {
        assert!(split_amount(dec("1000"), 0).is_empty());
    }

    #[test]
    fn shares_always_add_up_to_total() {
        let totals = ["0", "0.01", "0.05", "1", "99.99", "1000", "1234.56", "98765.43"];

        for total in totals.map(dec) {
            for months in 1..=60 {
                let shares = split_amount(total, months);

                assert_eq!(shares.len(), months as usize, "wrong length for {total}/{months}");
                assert_eq!(
                    shares.iter().sum::<Decimal>(),
                    total,
                    "shares of {total} over {months} months do not add up"
                );
                assert!(
                    shares.iter().all(|share| *share >= Decimal::ZERO),
                    "negative share when splitting {total} over {months} months"
                );
            }
        }
    }

    #[test]
    fn later_shares_are_equal() {
        let shares = split_amount(dec("100"), 7);

        assert_eq!(shares[0], dec("14.32"));
        assert!(shares[1..].iter().all(|share| *share == dec("14.28")));
    }

    #[test]
    fn rounds_half_away_from_zero_before_splitting() {
        assert_eq!(to_minor_units(dec("10.005")), Some(1001));
        assert_eq!(to_minor_units(dec("-10.005")), Some(-1001));
        assert_eq!(split_amount(dec("10.005"), 1), vec![dec("10.01")]);
    }

    #[test]
    fn negative_totals_still_add_up() {
        let shares = split_amount(dec("-1000"), 3);

        assert_eq!(shares.iter().sum::<Decimal>(), dec("-1000"));
        assert_eq!(shares, vec![dec("-333.32"), dec("-333.34"), dec("-333.34")]);
    }

    #[test]
    fn amounts_too_large_for_minor_units_are_rejected() {
        assert_eq!(to_minor_units(Decimal::MAX), None);
        assert_eq!(to_minor_units(Decimal::MIN), None);
        assert!(split_amount(Decimal::MAX, 3).is_empty());
    }

    #[test]
    fn minor_units_round_trip() {
        assert_eq!(from_minor_units(123456), dec("1234.56"));
    }
}
