//! Sync subcommand: one fetch-reconcile-commit run.
//!
//! Exits non-zero only on fatal failures (feed unreachable, ledger
//! unreadable or uncommittable). Per-event failures are printed and
//! retried on the next run.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use url::Url;

use calbridge_core::{plan, run_sync, Config, Fetcher, LedgerStore, NotionClient};

#[derive(Args)]
pub struct SyncArgs {
    /// Feed URL (overrides feed.url from config)
    #[arg(long)]
    pub url: Option<String>,

    /// Notion integration token (overrides notion.token)
    #[arg(long)]
    pub token: Option<String>,

    /// Notion database id (overrides notion.database_id)
    #[arg(long)]
    pub database_id: Option<String>,

    /// Ledger file location (overrides ledger.path)
    #[arg(long)]
    pub ledger: Option<PathBuf>,

    /// Classify only: fetch and diff, but make no target-store calls and
    /// commit nothing
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(args: SyncArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    if let Some(url) = args.url {
        config.feed.url = url;
    }
    if let Some(token) = args.token {
        config.notion.token = token;
    }
    if let Some(database_id) = args.database_id {
        config.notion.database_id = database_id;
    }
    if let Some(ledger) = args.ledger {
        config.ledger.path = Some(ledger);
    }
    config.validate()?;

    let feed_url = Url::parse(&config.feed.url)?;
    let fetcher = Fetcher::new().with_retry(
        config.feed.max_attempts,
        Duration::from_secs(config.feed.retry_delay_secs),
    );
    let store = LedgerStore::new(config.ledger_path()?);

    if args.dry_run {
        return dry_run(&fetcher, &feed_url, &store).await;
    }

    let target = NotionClient::new(&config.notion.token, &config.notion.database_id);
    let summary = run_sync(&fetcher, &feed_url, &store, target).await?;

    println!("created:   {}", summary.created);
    println!("updated:   {}", summary.updated);
    println!("deleted:   {}", summary.deleted);
    println!("unchanged: {}", summary.unchanged);
    println!("skipped:   {}", summary.skipped);
    println!("failed:    {}", summary.failed);

    if summary.has_failures() {
        println!("\nfailed events (will be retried next run):");
        for error in &summary.errors {
            println!("  {error}");
        }
    }

    Ok(())
}

/// Fetch and classify without side effects.
async fn dry_run(
    fetcher: &Fetcher,
    feed_url: &Url,
    store: &LedgerStore,
) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = store.load()?;
    let fetched = fetcher.fetch(feed_url).await?;
    let plan = plan(&fetched.snapshot, &ledger);

    if plan.is_noop() {
        println!("nothing to do: {} events already in sync", plan.unchanged.len());
        return Ok(());
    }

    for id in &plan.to_create {
        println!("would create: {id}");
    }
    for id in &plan.to_update {
        println!("would update: {id}");
    }
    for id in &plan.to_delete {
        println!("would delete: {id}");
    }
    println!(
        "\n{} to create, {} to update, {} to delete, {} unchanged, {} malformed",
        plan.to_create.len(),
        plan.to_update.len(),
        plan.to_delete.len(),
        plan.unchanged.len(),
        fetched.malformed.len(),
    );

    Ok(())
}
