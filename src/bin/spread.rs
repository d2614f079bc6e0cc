use std::error::Error;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use time::{Date, OffsetDateTime, macros::format_description};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use expense_spread::{
    AmortizationEngine, EngineConfig, ExceptionalFilter, PaginationConfig, SQLiteTransactionStore,
    Transaction, TransactionFilters, TransactionId, UserId, YearMonth, adjust_amortization,
    cancel_amortization, month_offset, monthly_totals, setup_amortization, split_amount,
};

/// Preview and manage expenses spread over several months.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the SQLite database.
    #[arg(long, global = true, default_value = "spread.db")]
    db_path: String,

    /// The number of rows to request from the database at a time.
    #[arg(long, global = true, default_value_t = PaginationConfig::default().page_size)]
    page_size: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show how an amount would be split over a number of months.
    Split { amount: Decimal, months: u32 },

    /// Show how many months `target` is after `start`.
    Offset { start: YearMonth, target: YearMonth },

    /// Record a new transaction.
    Add {
        #[arg(long)]
        owner: UserId,
        amount: Decimal,
        #[arg(value_parser = parse_date)]
        date: Date,
        #[arg(default_value = "")]
        merchant: String,
        /// Mark the transaction as a one-off.
        #[arg(long)]
        exceptional: bool,
    },

    /// List the transactions and monthly shares in a month.
    Month {
        #[arg(long)]
        owner: UserId,
        month: YearMonth,
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// List the transactions and monthly shares between two dates, inclusive.
    Range {
        #[arg(long)]
        owner: UserId,
        from: String,
        to: String,
        #[command(flatten)]
        filters: FilterArgs,
        /// Print the total for each month instead of the line items.
        #[arg(long)]
        totals: bool,
    },

    /// Spread a transaction over a number of months.
    Setup {
        id: TransactionId,
        months: u32,
        start: YearMonth,
    },

    /// Change how many months an amortized transaction is spread over.
    Adjust { id: TransactionId, months: u32 },

    /// Stop spreading a transaction.
    Cancel { id: TransactionId },
}

#[derive(ClapArgs, Debug)]
struct FilterArgs {
    /// How to treat exceptional transactions.
    #[arg(long, value_enum, default_value_t = Exceptional::Include)]
    exceptional: Exceptional,

    /// Smallest amount to include.
    #[arg(long)]
    min: Option<Decimal>,

    /// Largest amount to include.
    #[arg(long)]
    max: Option<Decimal>,

    /// Text the merchant must contain.
    #[arg(long)]
    merchant: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Exceptional {
    Include,
    Exclude,
    Only,
}

impl From<FilterArgs> for TransactionFilters {
    fn from(args: FilterArgs) -> Self {
        let exceptional = match args.exceptional {
            Exceptional::Include => ExceptionalFilter::Include,
            Exceptional::Exclude => ExceptionalFilter::Exclude,
            Exceptional::Only => ExceptionalFilter::Only,
        };

        Self {
            exceptional,
            min_amount: args.min,
            max_amount: args.max,
            merchant: args.merchant,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_logging();

    let args = Args::parse();

    match args.command {
        Command::Split { amount, months } => print_json(&split_amount(amount, months)),
        Command::Offset { start, target } => print_json(&month_offset(start, target)),
        command => {
            let store = SQLiteTransactionStore::new(Connection::open(&args.db_path)?)?;
            let config = EngineConfig {
                pagination: PaginationConfig {
                    page_size: args.page_size,
                },
            };

            run_store_command(AmortizationEngine::new(store, config), command).await
        }
    }
}

async fn run_store_command(
    engine: AmortizationEngine<SQLiteTransactionStore>,
    command: Command,
) -> Result<(), Box<dyn Error>> {
    let store = engine.store();

    match command {
        Command::Add {
            owner,
            amount,
            date,
            merchant,
            exceptional,
        } => {
            let builder = Transaction::build(owner, amount, date, &merchant).exceptional(exceptional);
            print_json(&store.create(builder)?)
        }
        Command::Month {
            owner,
            month,
            filters,
        } => print_json(
            &engine
                .materialize_month(owner, month, &filters.into())
                .await?,
        ),
        Command::Range {
            owner,
            from,
            to,
            filters,
            totals,
        } => {
            let items = engine.aggregate(owner, &from, &to, &filters.into()).await?;

            if totals {
                print_json(&monthly_totals(&items))
            } else {
                print_json(&items)
            }
        }
        Command::Setup { id, months, start } => {
            let transaction = setup_amortization(store.get(id)?, months, start)?;
            store.update(&transaction)?;
            print_json(&transaction)
        }
        Command::Adjust { id, months } => {
            let now = OffsetDateTime::now_utc();
            let transaction = adjust_amortization(store.get(id)?, months, now.date(), now)?;
            store.update(&transaction)?;
            print_json(&transaction)
        }
        Command::Cancel { id } => {
            let transaction = cancel_amortization(store.get(id)?)?;
            store.update(&transaction)?;
            print_json(&transaction)
        }
        Command::Split { .. } | Command::Offset { .. } => Ok(()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);

    Ok(())
}

fn parse_date(text: &str) -> Result<Date, time::error::Parse> {
    Date::parse(text, format_description!("[year]-[month]-[day]"))
}

/// Logs go to stderr so that stdout only carries JSON.
fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("expense_spread=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
