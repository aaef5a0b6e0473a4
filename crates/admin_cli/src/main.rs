use std::error::Error;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use engine::{
    Amount, Booking, BookingStatus, ChargePolicy, CreateBookingCmd, Engine, TransitionCmd,
    WalletTransaction,
};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "servicehub_admin")]
#[command(about = "Operator utilities for ServiceHub (bookings, wallets, ledger audit)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./servicehub.db?mode=rwc"
    )]
    database_url: String,

    /// When customers are charged: `on-completion` or `on-accept`.
    #[arg(long, env = "CHARGE_POLICY", default_value = "on-completion", value_parser = parse_charge_policy)]
    charge_policy: ChargePolicy,

    /// Actor allowed to complete bookings for providers; repeatable.
    #[arg(long = "closer")]
    closers: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Booking(BookingArgs),
    Wallet(WalletArgs),
    /// Earnings summary of a provider.
    Earnings {
        #[arg(long)]
        provider: String,
    },
    Ledger(LedgerArgs),
}

#[derive(Args, Debug)]
struct BookingArgs {
    #[command(subcommand)]
    command: BookingCommand,
}

#[derive(Subcommand, Debug)]
enum BookingCommand {
    Create(BookingCreateArgs),
    /// Request a status change on behalf of an actor.
    Status(BookingStatusArgs),
    /// Booking and its ledger rows.
    Show {
        #[arg(long)]
        id: Uuid,
    },
}

#[derive(Args, Debug)]
struct BookingCreateArgs {
    #[arg(long)]
    customer: String,
    #[arg(long)]
    provider: String,
    /// Price, e.g. `200.00`.
    #[arg(long)]
    price: Amount,
    /// Service date (RFC 3339); defaults to now.
    #[arg(long)]
    at: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
struct BookingStatusArgs {
    #[arg(long)]
    id: Uuid,
    #[arg(long)]
    status: String,
    #[arg(long)]
    actor: String,
    /// Status the booking must still be in; cancelling an accepted
    /// booking requires `--expect ACCEPTED`.
    #[arg(long)]
    expect: Option<BookingStatus>,
}

#[derive(Args, Debug)]
struct WalletArgs {
    #[command(subcommand)]
    command: WalletCommand,
}

#[derive(Subcommand, Debug)]
enum WalletCommand {
    Topup {
        #[arg(long)]
        user: String,
        #[arg(long)]
        amount: Amount,
    },
    Show {
        #[arg(long)]
        user: String,
    },
    Transactions {
        #[arg(long)]
        user: String,
    },
}

#[derive(Args, Debug)]
struct LedgerArgs {
    #[command(subcommand)]
    command: LedgerCommand,
}

#[derive(Subcommand, Debug)]
enum LedgerCommand {
    /// Check that balances plus platform fees equal top-ups.
    Audit,
}

fn parse_charge_policy(raw: &str) -> Result<ChargePolicy, String> {
    match raw {
        "on-completion" | "on_completion" => Ok(ChargePolicy::OnCompletion),
        "on-accept" | "on_accept" => Ok(ChargePolicy::OnAccept),
        other => Err(format!("unsupported charge policy: {other}")),
    }
}

fn print_booking(booking: &Booking) {
    println!(
        "{} {} customer={} provider={} price={} at={}",
        booking.id,
        booking.status,
        booking.user_id,
        booking.provider_id,
        Amount::new(booking.price),
        booking.date_time.to_rfc3339(),
    );
}

fn print_transaction(tx: &WalletTransaction) {
    let booking = tx
        .booking_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{} {} {:>6} {:>12} {:<18} booking={}",
        tx.created_at.to_rfc3339(),
        tx.user_id,
        tx.kind.as_str(),
        Amount::new(tx.amount),
        tx.source.as_str(),
        booking,
    );
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("engine=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder()
        .database(db.clone())
        .charge_policy(cli.charge_policy)
        .closers(cli.closers)
        .build()
        .await?;

    match cli.command {
        Command::Booking(BookingArgs {
            command: BookingCommand::Create(args),
        }) => {
            let booking = engine
                .create_booking(CreateBookingCmd::new(
                    args.customer,
                    args.provider,
                    args.price.minor(),
                    args.at.unwrap_or_else(Utc::now),
                ))
                .await?;
            print_booking(&booking);
        }
        Command::Booking(BookingArgs {
            command: BookingCommand::Status(args),
        }) => {
            let mut cmd = TransitionCmd::new(args.id, args.status, args.actor);
            if let Some(expected) = args.expect {
                cmd = cmd.expecting(expected);
            }
            match engine.apply_transition(cmd).await {
                Ok(booking) => print_booking(&booking),
                Err(err) => {
                    let current = engine
                        .booking_status(args.id)
                        .await
                        .map(|status| status.to_string())
                        .unwrap_or_else(|_| "unknown".to_string());
                    eprintln!("{}: {err} (status: {current})", err.kind().as_str());
                    std::process::exit(1);
                }
            }
        }
        Command::Booking(BookingArgs {
            command: BookingCommand::Show { id },
        }) => {
            let booking = engine.booking_repository().load(&db, id).await?;
            print_booking(&booking);
            for tx in engine.booking_ledger(id).await? {
                print_transaction(&tx);
            }
        }
        Command::Wallet(WalletArgs {
            command: WalletCommand::Topup { user, amount },
        }) => {
            engine.top_up(&user, amount.minor()).await?;
            let wallet = engine.wallet(&user).await?;
            println!("{} balance={}", wallet.user_id, Amount::new(wallet.balance));
        }
        Command::Wallet(WalletArgs {
            command: WalletCommand::Show { user },
        }) => {
            let wallet = engine.wallet(&user).await?;
            println!("{} balance={}", wallet.user_id, Amount::new(wallet.balance));
        }
        Command::Wallet(WalletArgs {
            command: WalletCommand::Transactions { user },
        }) => {
            for tx in engine.wallet_transactions(&user).await? {
                print_transaction(&tx);
            }
        }
        Command::Earnings { provider } => {
            let summary = engine.earnings_summary(&provider).await?;
            println!("completed jobs:    {}", summary.completed_jobs);
            println!("total earnings:    {}", Amount::new(summary.total_earnings));
            println!("pending earnings:  {}", Amount::new(summary.pending_earnings));
            println!("average job value: {}", Amount::new(summary.average_job_value));
        }
        Command::Ledger(LedgerArgs {
            command: LedgerCommand::Audit,
        }) => {
            let totals = engine.ledger_totals().await?;
            println!("wallet balances: {}", Amount::new(totals.wallet_balances));
            println!("  of which escrow: {}", Amount::new(totals.escrow_balance));
            println!("platform fees:   {}", Amount::new(totals.platform_fees));
            println!("top-ups:         {}", Amount::new(totals.top_ups));
            if !totals.is_balanced() {
                eprintln!("ledger is NOT balanced");
                std::process::exit(1);
            }
            println!("ledger is balanced");
        }
    }

    Ok(())
}
