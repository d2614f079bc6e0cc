//! Implements a SQLite backed transaction store.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, Row, functions::FunctionFlags, params_from_iter, types::Value};
use rust_decimal::RoundingStrategy;
use time::Date;

use crate::{
    Error,
    database_id::TransactionId,
    filters::ExceptionalFilter,
    month::YearMonth,
    split::{from_minor_units, to_minor_units, to_minor_units_with},
    store::{PageRange, SortOrder, TransactionQuery, TransactionStore},
    transaction::{AmortizationPlan, AmortizationStatus, Transaction, TransactionBuilder},
};

/// The default cap on rows returned by a single [TransactionStore::get_page] call.
pub const DEFAULT_MAX_ROWS_PER_REQUEST: u64 = 1000;

/// SQLite's `lower()` only folds ASCII, so merchant searches use this instead.
const FOLD_CASE_FUNCTION: &str = "fold_case";

const COLUMNS: &str = "id, owner_id, date, amount, merchant, category_id, category_name, \
    is_exceptional, excluded_from_totals, is_amortized, amortization_months, \
    amortization_adjusted_months, amortization_start_date, amortization_monthly_amount, \
    amortization_status, amortization_adjusted_at";

/// Stores transactions in a SQLite database.
///
/// Amounts are stored as integer minor units (cents). Like a hosted row store,
/// a single page request never returns more than
/// [max_rows_per_request](TransactionStore::max_rows_per_request) rows.
#[derive(Debug, Clone)]
pub struct SQLiteTransactionStore {
    connection: Arc<Mutex<Connection>>,
    max_rows_per_request: u64,
}

impl SQLiteTransactionStore {
    /// Create a new store for the SQLite `connection`, creating the
    /// transaction table if it does not exist.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if the table or the merchant search
    /// function cannot be created.
    pub fn new(connection: Connection) -> Result<Self, Error> {
        Self::create_table(&connection)?;
        register_fold_case(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            max_rows_per_request: DEFAULT_MAX_ROWS_PER_REQUEST,
        })
    }

    /// Cap the number of rows a single page request may return.
    ///
    /// A cap of zero is treated as one.
    pub fn with_max_rows_per_request(mut self, max_rows: u64) -> Self {
        self.max_rows_per_request = max_rows.max(1);
        self
    }

    /// Create the transaction table.
    ///
    /// # Errors
    /// Returns an error if there is an SQL error.
    pub fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute_batch(
            "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                amount INTEGER NOT NULL,
                merchant TEXT NOT NULL,
                category_id INTEGER,
                category_name TEXT,
                is_exceptional INTEGER NOT NULL DEFAULT 0,
                excluded_from_totals INTEGER NOT NULL DEFAULT 0,
                is_amortized INTEGER,
                amortization_months INTEGER,
                amortization_adjusted_months INTEGER,
                amortization_start_date TEXT,
                amortization_monthly_amount INTEGER,
                amortization_status TEXT,
                amortization_adjusted_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_transaction_owner_date
                ON \"transaction\" (owner_id, date);",
        )
    }

    /// Create a new transaction in the database.
    ///
    /// The amount is rounded to whole cents.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::InvalidAmount] if the amount does not fit in minor units,
    /// - [Error::DatabaseLockError] if the connection lock is poisoned,
    /// - or [Error::SqlError] if there is some other SQL error.
    pub fn create(&self, builder: TransactionBuilder) -> Result<Transaction, Error> {
        let amount =
            to_minor_units(builder.amount).ok_or(Error::InvalidAmount(builder.amount))?;

        let transaction = self
            .lock()?
            .prepare(&format!(
                "INSERT INTO \"transaction\" \
                 (owner_id, date, amount, merchant, category_id, category_name, is_exceptional)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 RETURNING {COLUMNS}"
            ))?
            .query_row(
                (
                    builder.owner_id,
                    builder.date,
                    amount,
                    builder.merchant,
                    builder.category_id,
                    builder.category_name,
                    builder.is_exceptional,
                ),
                Self::map_row,
            )?;

        Ok(transaction)
    }

    /// Retrieve a transaction in the database by its `id`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a valid transaction,
    /// - or [Error::SqlError] there is some other SQL error.
    pub fn get(&self, id: TransactionId) -> Result<Transaction, Error> {
        let transaction = self
            .lock()?
            .prepare(&format!(
                "SELECT {COLUMNS} FROM \"transaction\" WHERE id = :id"
            ))?
            .query_row(&[(":id", &id)], Self::map_row)?;

        Ok(transaction)
    }

    /// Save every field of `transaction`, including its amortization plan.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::UpdateMissingTransaction] if the transaction is not in the database,
    /// - [Error::InvalidAmount] if an amount does not fit in minor units,
    /// - or [Error::SqlError] there is some other SQL error.
    pub fn update(&self, transaction: &Transaction) -> Result<(), Error> {
        let amount = to_minor_units(transaction.amount)
            .ok_or(Error::InvalidAmount(transaction.amount))?;
        let plan = transaction.amortization.as_ref();
        let monthly_amount = plan
            .map(|plan| {
                to_minor_units(plan.monthly_amount).ok_or(Error::InvalidAmount(plan.monthly_amount))
            })
            .transpose()?;

        let rows_affected = self.lock()?.execute(
            "UPDATE \"transaction\" SET
                date = ?2,
                amount = ?3,
                merchant = ?4,
                category_id = ?5,
                category_name = ?6,
                is_exceptional = ?7,
                excluded_from_totals = ?8,
                is_amortized = ?9,
                amortization_months = ?10,
                amortization_adjusted_months = ?11,
                amortization_start_date = ?12,
                amortization_monthly_amount = ?13,
                amortization_status = ?14,
                amortization_adjusted_at = ?15
            WHERE id = ?1",
            (
                transaction.id,
                transaction.date,
                amount,
                &transaction.merchant,
                transaction.category_id,
                &transaction.category_name,
                transaction.is_exceptional,
                transaction.excluded_from_totals,
                transaction.is_amortized(),
                plan.map(|plan| plan.months),
                plan.and_then(|plan| plan.adjusted_months),
                plan.and_then(|plan| plan.start_month)
                    .map(YearMonth::first_day),
                monthly_amount,
                plan.map(|plan| plan.status.as_str()),
                plan.and_then(|plan| plan.adjusted_at),
            ),
        )?;

        if rows_affected == 0 {
            return Err(Error::UpdateMissingTransaction);
        }

        Ok(())
    }

    /// Query for one page of transactions in the database.
    ///
    /// # Errors
    /// This function will return a [Error::SqlError] there is a SQL error.
    fn query_page(
        &self,
        query: &TransactionQuery,
        page: PageRange,
    ) -> Result<Vec<Transaction>, Error> {
        let mut where_clause_parts = vec!["owner_id = ?1".to_owned()];
        let mut query_parameters = vec![Value::Integer(query.owner_id)];

        if let Some(date_range) = &query.date_range {
            where_clause_parts.push(format!(
                "date BETWEEN ?{} AND ?{}",
                query_parameters.len() + 1,
                query_parameters.len() + 2,
            ));
            query_parameters.push(Value::Text(date_range.start().to_string()));
            query_parameters.push(Value::Text(date_range.end().to_string()));
        }

        match query.amortized {
            Some(true) => where_clause_parts.push("is_amortized = 1".to_owned()),
            Some(false) => {
                where_clause_parts.push("(is_amortized IS NULL OR is_amortized = 0)".to_owned())
            }
            None => {}
        }

        match query.filters.exceptional {
            ExceptionalFilter::Include => {}
            ExceptionalFilter::Exclude => where_clause_parts.push("is_exceptional = 0".to_owned()),
            ExceptionalFilter::Only => where_clause_parts.push("is_exceptional = 1".to_owned()),
        }

        if let Some(min_amount) = query.filters.min_amount {
            // Stored amounts are whole cents, so rounding the bound towards the
            // inside of the range keeps it inclusive.
            let min_amount = to_minor_units_with(min_amount, RoundingStrategy::ToPositiveInfinity)
                .ok_or(Error::InvalidAmount(min_amount))?;
            where_clause_parts.push(format!("amount >= ?{}", query_parameters.len() + 1));
            query_parameters.push(Value::Integer(min_amount));
        }

        if let Some(max_amount) = query.filters.max_amount {
            let max_amount = to_minor_units_with(max_amount, RoundingStrategy::ToNegativeInfinity)
                .ok_or(Error::InvalidAmount(max_amount))?;
            where_clause_parts.push(format!("amount <= ?{}", query_parameters.len() + 1));
            query_parameters.push(Value::Integer(max_amount));
        }

        if let Some(term) = query.filters.merchant_term() {
            where_clause_parts.push(format!(
                "instr({FOLD_CASE_FUNCTION}(merchant), ?{}) > 0",
                query_parameters.len() + 1
            ));
            query_parameters.push(Value::Text(term.to_lowercase()));
        }

        // Sort by date, and then ID to keep page boundaries stable
        let order_clause = match query.sort_date {
            SortOrder::Ascending => "ORDER BY date ASC, id ASC",
            SortOrder::Descending => "ORDER BY date DESC, id DESC",
        };

        let limit = page.limit.min(self.max_rows_per_request);
        let query_string = format!(
            "SELECT {COLUMNS} FROM \"transaction\" WHERE {} {order_clause} LIMIT ?{} OFFSET ?{}",
            where_clause_parts.join(" AND "),
            query_parameters.len() + 1,
            query_parameters.len() + 2,
        );
        query_parameters.push(Value::Integer(to_sql_integer(limit)));
        query_parameters.push(Value::Integer(to_sql_integer(page.offset)));

        let transactions = self
            .lock()?
            .prepare(&query_string)?
            .query_map(params_from_iter(query_parameters.iter()), Self::map_row)?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;

        Ok(transactions)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|_| Error::DatabaseLockError)
    }

    fn map_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
        let is_amortized: Option<bool> = row.get(9)?;

        let amortization = if is_amortized.unwrap_or(false) {
            let status: Option<String> = row.get(14)?;

            Some(AmortizationPlan {
                months: row.get::<usize, Option<u32>>(10)?.unwrap_or(0),
                adjusted_months: row.get(11)?,
                start_month: row.get::<usize, Option<Date>>(12)?.map(YearMonth::from),
                monthly_amount: from_minor_units(row.get::<usize, Option<i64>>(13)?.unwrap_or(0)),
                status: status
                    .as_deref()
                    .and_then(AmortizationStatus::from_name)
                    .unwrap_or_default(),
                adjusted_at: row.get(15)?,
            })
        } else {
            None
        };

        Ok(Transaction {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            date: row.get(2)?,
            amount: from_minor_units(row.get(3)?),
            merchant: row.get(4)?,
            category_id: row.get(5)?,
            category_name: row.get(6)?,
            is_exceptional: row.get(7)?,
            excluded_from_totals: row.get(8)?,
            amortization,
        })
    }
}

impl TransactionStore for SQLiteTransactionStore {
    async fn get_page(
        &self,
        query: &TransactionQuery,
        page: PageRange,
    ) -> Result<Vec<Transaction>, Error> {
        self.query_page(query, page)
    }

    fn max_rows_per_request(&self) -> Option<u64> {
        Some(self.max_rows_per_request)
    }
}

fn register_fold_case(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.create_scalar_function(
        FOLD_CASE_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |context| Ok(context.get::<String>(0)?.to_lowercase()),
    )
}

fn to_sql_integer(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
