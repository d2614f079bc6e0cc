//! Calendar-month helpers for placing amortized allocations.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::{Date, Duration, Month, macros::format_description, util::days_in_year_month};

/// A calendar month with no day component, e.g. `2026-03`.
///
/// Internally this is the first day of the month, so ordering and equality
/// follow the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth(Date);

impl YearMonth {
    /// Create the month `month` of `year`.
    ///
    /// Returns `None` if the year is outside the range supported by [Date].
    pub fn new(year: i32, month: Month) -> Option<Self> {
        Date::from_calendar_date(year, month, 1).ok().map(Self)
    }

    /// The calendar year.
    pub fn year(self) -> i32 {
        self.0.year()
    }

    /// The month of the year.
    pub fn month(self) -> Month {
        self.0.month()
    }

    /// The first day of the month.
    pub fn first_day(self) -> Date {
        self.0
    }

    /// The last day of the month.
    pub fn last_day(self) -> Date {
        let days = days_in_year_month(self.year(), self.month());
        self.0 + Duration::days(i64::from(days) - 1)
    }

    /// Whether `date` falls inside this month.
    pub fn contains(self, date: Date) -> bool {
        Self::from(date) == self
    }

    /// The month after this one, or `None` past the last representable date.
    pub fn next(self) -> Option<Self> {
        self.last_day().next_day().map(Self)
    }
}

impl From<Date> for YearMonth {
    fn from(date: Date) -> Self {
        // Day 1 exists in every month, so this never falls back.
        Self(date.replace_day(1).unwrap_or(date))
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), u8::from(self.month()))
    }
}

/// A string could not be parsed as a calendar month.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("\"{0}\" is not a valid calendar month, expected YYYY-MM or YYYY-MM-DD")]
pub struct InvalidYearMonth(String);

impl FromStr for YearMonth {
    type Err = InvalidYearMonth;

    /// Parse either a bare `YYYY-MM` or a full `YYYY-MM-DD` date.
    ///
    /// The day, if present, must be valid but is otherwise ignored.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidYearMonth(text.to_owned());
        let text = text.trim();

        if let Ok(date) = Date::parse(text, format_description!("[year]-[month]-[day]")) {
            return Ok(Self::from(date));
        }

        let (year, month) = text.split_once('-').ok_or_else(invalid)?;
        if month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u8 = month.parse().map_err(|_| invalid())?;
        let month = Month::try_from(month).map_err(|_| invalid())?;

        Self::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = InvalidYearMonth;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

/// The zero-based index of `target` relative to `start`, counted in calendar
/// months.
///
/// Accepts either a [Date] or a [YearMonth]; the day of a date is ignored.
/// The result is negative when `target` comes before `start` and callers must
/// range-check it against the number of months they care about.
pub fn month_offset(start: impl Into<YearMonth>, target: impl Into<YearMonth>) -> i32 {
    let start = start.into();
    let target = target.into();

    (target.year() - start.year()) * 12 + i32::from(u8::from(target.month()))
        - i32::from(u8::from(start.month()))
}

/// Every calendar month from `from` to `to`, inclusive.
///
/// Returns an empty list if `from` comes after `to`.
pub fn months_between(from: YearMonth, to: YearMonth) -> Vec<YearMonth> {
    std::iter::successors(Some(from), |month| month.next())
        .take_while(|month| *month <= to)
        .collect()
}
