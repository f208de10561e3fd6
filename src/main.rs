use anyhow::Result;
use sqlx::postgres::PgPool;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use expense_tracker::bot::{self, DialogueManager};
use expense_tracker::config::BotConfig;
use expense_tracker::db::{self, PgStore};
use expense_tracker::memory_store::InMemoryStore;
use expense_tracker::reaper::spawn_context_reaper;
use expense_tracker::store::{MessageContextStore, Store};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,expense_tracker=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    init_logging();

    info!("Starting Expense Tracker Telegram Bot");

    let config = BotConfig::from_env()?;

    let (store, contexts): (Arc<dyn Store>, Arc<dyn MessageContextStore>) =
        match &config.database_url {
            Some(url) => {
                info!("Connecting to database");
                let pool = PgPool::connect(url).await?;
                db::init_database_schema(&pool).await?;
                db::seed_catalog(&pool).await?;
                let store = Arc::new(PgStore::new(pool));
                (store.clone() as Arc<dyn Store>, store as Arc<dyn MessageContextStore>)
            }
            None => {
                warn!("DATABASE_URL not set, data will be kept in memory only");
                let store = Arc::new(InMemoryStore::with_default_catalog().await);
                (store.clone() as Arc<dyn Store>, store as Arc<dyn MessageContextStore>)
            }
        };

    spawn_context_reaper(
        contexts,
        Duration::from_secs(config.context_ttl_secs),
        Duration::from_secs(config.reaper_interval_secs),
    );

    let bot = Bot::new(&config.token);
    let workers = Arc::new(Semaphore::new(config.worker_count));
    info!(workers = config.worker_count, "Bot initialized, starting dispatcher");
    let manager = Arc::new(DialogueManager::new(store, config));

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::message_handler))
        .branch(Update::filter_callback_query().endpoint(bot::callback_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![manager, workers])
        // Updates are processed concurrently; the semaphore bounds the work
        .distribution_function(|_| None::<()>)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
