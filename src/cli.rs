use clap::{ArgAction, Parser, Subcommand};
use shelf_catalog::models::VersionId;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about = "Scan, group and catalogue an audiobook library")]
pub struct Cli {
    /// Config file (TOML, YAML or JSON). Defaults to the platform config dir.
    #[arg(short, long, global = true, env = "SHELF_CONFIG")]
    pub config: Option<PathBuf>,
    /// More logging (-v, -vv). Ignored when RUST_LOG is set.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan every enabled import path and update the catalog.
    Scan {
        /// Report what would change without writing anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Show everything the scanner learns about one file.
    Inspect { path: PathBuf },
    /// Catalog totals.
    Stats,
    /// Soft-delete a version.
    Delete {
        #[arg(value_parser = parse_version_id)]
        id: VersionId,
        /// Also block its fingerprint from future scans.
        #[arg(long)]
        block: bool,
        #[arg(long, requires = "block")]
        reason: Option<String>,
    },
    /// Restore a soft-deleted version.
    Restore {
        #[arg(value_parser = parse_version_id)]
        id: VersionId,
    },
    /// Add a fingerprint to the blocklist.
    Block {
        fingerprint: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Remove a fingerprint from the blocklist.
    Unblock { fingerprint: String },
    /// List blocked fingerprints.
    Blocklist,
    /// Permanently remove long soft-deleted versions.
    Purge {
        /// Defaults to `catalog.purge_soft_deleted_after_days`.
        #[arg(long)]
        days: Option<u32>,
    },
}

fn parse_version_id(raw: &str) -> Result<VersionId, String> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .map(VersionId)
        .ok_or_else(|| format!("not a version id: {raw:?}"))
}
