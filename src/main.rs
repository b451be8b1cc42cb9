mod cli;
mod error;
mod output;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use serde::Serialize;
use shelf_catalog::{Database, SqliteStore, Store};
use shelf_config::Config;
use shelf_library::{CatalogWriter, ScanOptions, admin};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:?}");
            if err.is_retryable() {
                eprintln!("(this may succeed if retried)");
            }
            ExitCode::FAILURE
        },
    }
}

#[derive(Serialize)]
struct BlockedEntry<'a> {
    fingerprint: &'a str,
    reason: Option<&'a str>,
    blocked_at: i64,
}

/// The catalog database, opened on first use so commands that never touch
/// it don't create one.
struct Catalog<'a> {
    path: &'a Path,
    db: Option<Database>,
}

impl<'a> Catalog<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, db: None }
    }

    async fn store(&mut self) -> Result<Arc<dyn Store>> {
        if let Some(db) = &self.db {
            return Ok(Arc::new(SqliteStore::from(db)));
        }
        let db = Database::connect(self.path).await.or_raise(|| ErrorKind::Catalog)?;
        let store = Arc::new(SqliteStore::from(&db));
        self.db = Some(db);
        Ok(store)
    }

    async fn close(self) {
        if let Some(db) = self.db {
            db.close().await;
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let mut catalog = Catalog::new(&config.catalog.database);
    let result = command(&cli, &config, &mut catalog).await;
    catalog.close().await;
    result
}

async fn inspect(json: bool, config: &Config, path: &Path) -> Result<()> {
    let path = std::path::absolute(path).or_raise(|| ErrorKind::Command("inspect"))?;
    let roots: Vec<_> = config.library.enabled_import_paths().map(|i| i.path.clone()).collect();
    let inspection = shelf_library::inspect(path, &roots).await.or_raise(|| ErrorKind::Command("inspect"))?;
    if json {
        output::json(&inspection)
    } else {
        output::inspection(&inspection);
        Ok(())
    }
}

async fn command(cli: &Cli, config: &Config, catalog: &mut Catalog<'_>) -> Result<ExitCode> {
    match &cli.command {
        Command::Scan { dry_run } => {
            let store = catalog.store().await?;
            let source = shelf_library::import_source(&config.library).or_raise(|| ErrorKind::Command("scan"))?;
            let writer = CatalogWriter::new(store);
            let options = ScanOptions {
                dry_run: *dry_run,
                ..ScanOptions::from(&config.scan)
            };
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted; finishing files in flight");
                    on_interrupt.cancel();
                }
            });
            let report = shelf_library::scan(&source, &writer, &options, &cancel)
                .await
                .or_raise(|| ErrorKind::Command("scan"))?;
            if cli.json {
                output::json(&report)?;
            } else {
                output::report(&report);
            }
            let clean = report.counts.groups_failed == 0 && !report.completion.is_partial();
            return Ok(if clean { ExitCode::SUCCESS } else { ExitCode::from(2) });
        },
        Command::Inspect { path } => inspect(cli.json, config, path).await?,
        Command::Stats => {
            let store = catalog.store().await?;
            let stats = admin::stats(store.as_ref()).await.or_raise(|| ErrorKind::Command("stats"))?;
            if cli.json {
                output::json(&stats)?;
            } else {
                output::stats(&stats);
            }
        },
        Command::Delete { id, block, reason } => {
            let store = catalog.store().await?;
            let deleted = admin::delete_version(store.as_ref(), *id, *block, reason.as_deref())
                .await
                .or_raise(|| ErrorKind::Command("delete"))?;
            println!("deleted version {}", deleted.version);
            if deleted.blocked {
                println!("blocked {}", deleted.fingerprint);
            }
        },
        Command::Restore { id } => {
            let store = catalog.store().await?;
            let restored = admin::restore_version(store.as_ref(), *id)
                .await
                .or_raise(|| ErrorKind::Command("restore"))?;
            println!("restored version {} ({})", restored.id, restored.fields.file_path.display());
        },
        Command::Block { fingerprint, reason } => {
            let store = catalog.store().await?;
            admin::block_fingerprint(store.as_ref(), fingerprint, reason.as_deref())
                .await
                .or_raise(|| ErrorKind::Command("block"))?;
            println!("blocked {fingerprint}");
        },
        Command::Unblock { fingerprint } => {
            let store = catalog.store().await?;
            admin::unblock_fingerprint(store.as_ref(), fingerprint)
                .await
                .or_raise(|| ErrorKind::Command("unblock"))?;
            println!("unblocked {fingerprint}");
        },
        Command::Blocklist => {
            let store = catalog.store().await?;
            let blocked = admin::blocked_fingerprints(store.as_ref())
                .await
                .or_raise(|| ErrorKind::Command("blocklist"))?;
            if cli.json {
                let entries: Vec<_> = blocked
                    .iter()
                    .map(|b| BlockedEntry {
                        fingerprint: &b.fingerprint,
                        reason: b.reason.as_deref(),
                        blocked_at: b.blocked_at.unix_timestamp(),
                    })
                    .collect();
                output::json(&entries)?;
            } else {
                output::blocklist(&blocked);
            }
        },
        Command::Purge { days } => {
            let store = catalog.store().await?;
            let days = days.unwrap_or(config.catalog.purge_soft_deleted_after_days);
            let purged = admin::purge(store.as_ref(), time::Duration::days(i64::from(days)))
                .await
                .or_raise(|| ErrorKind::Command("purge"))?;
            println!("purged {purged} version(s) soft-deleted more than {days} day(s) ago");
        },
    }
    Ok(ExitCode::SUCCESS)
}
