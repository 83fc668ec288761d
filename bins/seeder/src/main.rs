//! Database seeder for Coffer development and testing.
//!
//! Applies migrations, then seeds a demo user's accounts, records their
//! opening deposits through the write gateway and moves some money between
//! them. Running it twice leaves an already seeded database alone.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use coffer_core::events::{BroadcastPublisher, TransactionLoggedConsumer};
use coffer_core::ledger::{
    Account, LedgerService, NewTransactionLog, TransactionLogGateway, transaction_statuses,
    transaction_types,
};
use coffer_core::store::{AccountRepository, Repository, Store, UnitOfWork};
use coffer_db::{Migrator, SeaStore, connect};
use coffer_shared::config::LoggingConfig;
use coffer_shared::{AppConfig, UserId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm_migration::MigratorTrait;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Owner of every seeded account.
const DEMO_USER: UserId = UserId::new(1);

/// Demo accounts: type, number, opening deposit.
const DEMO_ACCOUNTS: [(&str, &str, Decimal); 2] = [
    ("Checking", "CHK-0001", dec!(1500.00)),
    ("Savings", "SAV-0001", dec!(10000.00)),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let db = connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    Migrator::up(&db, None).await.context("Failed to run migrations")?;
    info!("Migrations applied");
    let store = SeaStore::new(db);

    let mut gateway = TransactionLogGateway::new(store.clone());
    let consumer = if config.events.enabled {
        let publisher = BroadcastPublisher::new(config.events.channel_capacity);
        let consumer = TransactionLoggedConsumer::new(publisher.subscribe());
        gateway = gateway.with_publisher(Arc::new(publisher), config.events.routing_key.clone());
        Some(tokio::spawn(consumer.run()))
    } else {
        None
    };

    let ledger = LedgerService::new(store.clone());
    seed_demo_user(&store, &gateway, &ledger).await?;

    let summary = ledger.get_account_balance_summary(DEMO_USER).await?;
    info!(
        user_id = %summary.user_id,
        total_accounts = summary.total_accounts,
        total_deposits = %summary.total_deposits,
        total_balance = %summary.total_balance,
        "Seeding complete"
    );

    // Dropping the gateway drops the last sender and lets the consumer finish.
    drop(gateway);
    if let Some(consumer) = consumer {
        let handled = consumer.await?;
        info!(handled, "Event consumer finished");
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Seeds the demo accounts unless the demo user already has some.
async fn seed_demo_user(
    store: &SeaStore,
    gateway: &TransactionLogGateway<SeaStore>,
    ledger: &LedgerService<SeaStore>,
) -> anyhow::Result<()> {
    let mut uow = UnitOfWork::new(store.open_session());
    if !uow.accounts().find_by_user(DEMO_USER).await?.is_empty() {
        info!(user_id = %DEMO_USER, "Demo accounts already exist, skipping");
        return Ok(());
    }

    let now = Utc::now();
    for (account_type, number, deposit) in DEMO_ACCOUNTS {
        uow.accounts_mut()
            .add(Account::new(DEMO_USER, account_type, number, deposit, now));
    }
    uow.commit().await?;
    let accounts = uow.accounts_mut().take_inserted();

    for account in &accounts {
        gateway
            .create_transaction_log(NewTransactionLog {
                account_id: account.id,
                transaction_type: transaction_types::DEPOSIT.to_string(),
                amount: account.current_balance,
                status: transaction_statuses::COMPLETED.to_string(),
                details: format!("Opening deposit for {}", account.account_number),
                timestamp: None,
            })
            .await?;
        info!(
            account_id = %account.id,
            account_number = %account.account_number,
            balance = %account.current_balance,
            "Seeded account"
        );
    }

    if let [checking, savings] = accounts.as_slice() {
        let receipt = ledger
            .try_transfer_funds(savings.id, checking.id, dec!(250.00))
            .await?;
        info!(
            from_balance = %receipt.from_balance,
            to_balance = %receipt.to_balance,
            "Seeded transfer"
        );
    }

    Ok(())
}
