//! Terminal rendering for command results.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::Serialize;
use shelf_catalog::models::{BlockedFingerprint, CatalogStats};
use shelf_extract::models::{Field, RawMetadata, ResolvedMetadata};
use shelf_library::{GroupOutcome, Inspection, ScanReport};
use std::io::Write;

pub fn json(value: &impl Serialize) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).or_raise(|| ErrorKind::Output)?;
    writeln!(stdout).or_raise(|| ErrorKind::Output)
}

pub fn report(report: &ScanReport) {
    let counts = &report.counts;
    let mode = if report.dry_run { " (dry run)" } else { "" };
    println!("Scan {:?}{mode} in {:.1}s", report.completion, report.elapsed.as_secs_f64());
    for (label, value) in [
        ("files seen", counts.files_seen),
        ("resolved", counts.resolved),
        ("skipped unreadable", counts.skipped_unreadable),
        ("fingerprint I/O errors", counts.fingerprint_io_errors),
        ("discovery errors", counts.discovery_errors),
        ("incomplete", counts.incomplete),
        ("exact duplicates", counts.exact_duplicates_found),
        ("blocked skipped", counts.blocked_skipped),
        ("groups created", counts.groups_created),
        ("groups updated", counts.groups_updated),
        ("groups failed", counts.groups_failed),
        ("versions inserted", counts.versions_inserted),
        ("versions updated", counts.versions_updated),
        ("possible mismatches", counts.possible_mismatches),
    ] {
        println!("  {label:<24}{value}");
    }
    for advisory in &report.advisories {
        println!("possible mismatch: {} ({})", advisory.key, advisory.reason);
        for path in &advisory.paths {
            println!("    {}", path.display());
        }
    }
    for group in &report.groups {
        if let GroupOutcome::Failed { reason } = &group.outcome {
            println!("failed: {}: {reason}", group.key);
        }
    }
    for (label, paths) in [
        ("unreadable", &report.unreadable),
        ("unhashable", &report.unhashable),
        ("incomplete", &report.incomplete),
    ] {
        for path in paths {
            println!("{label}: {}", path.display());
        }
    }
}

fn raw_value(raw: &RawMetadata, field: Field) -> Option<String> {
    match field {
        Field::Title => raw.title.clone(),
        Field::Author => raw.author.clone(),
        Field::Narrator => raw.narrator.clone(),
        Field::Series => raw.series.clone(),
        Field::SeriesPosition => raw.series_position.clone(),
        Field::Duration => raw.duration.map(|d| format!("{:.1}s", d.as_secs_f64())),
        Field::Format => raw.format.clone(),
    }
}

fn resolved_value(resolved: &ResolvedMetadata, field: Field) -> Option<String> {
    match field {
        Field::Title => resolved.title.clone(),
        Field::Author => resolved.author.clone(),
        Field::Narrator => resolved.narrator.clone(),
        Field::Series => resolved.series.clone(),
        Field::SeriesPosition => resolved.series_position.map(|p| p.to_string()),
        Field::Duration => resolved.duration.map(|d| format!("{:.1}s", d.as_secs_f64())),
        Field::Format => resolved.format.clone(),
    }
}

pub fn inspection(inspection: &Inspection) {
    println!("{}", inspection.path.display());
    println!("  parsed as      {}", inspection.parsed_as.display());
    println!("  tags           {:?}", inspection.tag_status);
    println!("  filename rule  {}", inspection.filename_rule.unwrap_or("(none)"));
    println!("  fingerprint    {} ({} bytes)", inspection.fingerprint, inspection.size);
    match &inspection.group_key {
        Some(key) => println!("  group key      {key}"),
        None => println!("  group key      (incomplete: needs a title and an author)"),
    }
    println!();
    println!("  {:<16}{:<32}{:<32}{:<32}source", "field", "tag", "filename", "resolved");
    let show = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    for field in Field::ALL {
        let source = inspection.resolved.source_of(field).map_or("-".to_string(), |s| s.to_string());
        println!(
            "  {:<16}{:<32}{:<32}{:<32}{source}",
            field.to_string(),
            show(raw_value(&inspection.tags, field)),
            show(raw_value(&inspection.filename, field)),
            show(resolved_value(&inspection.resolved, field)),
        );
    }
    let stream = &inspection.stream;
    println!();
    println!(
        "  stream: format={} bitrate={}/{}kbps rate={}Hz channels={} depth={}",
        show(stream.format.clone()),
        show(stream.overall_bitrate.map(|b| b.to_string())),
        show(stream.audio_bitrate.map(|b| b.to_string())),
        show(stream.sample_rate.map(|r| r.to_string())),
        show(stream.channels.map(|c| c.to_string())),
        show(stream.bit_depth.map(|d| d.to_string())),
    );
}

pub fn stats(stats: &CatalogStats) {
    println!("authors                {}", stats.authors);
    println!("series                 {}", stats.series);
    println!("works                  {}", stats.works);
    println!("active versions        {}", stats.active_versions);
    println!("soft-deleted versions  {}", stats.soft_deleted_versions);
    println!("blocked fingerprints   {}", stats.blocked_fingerprints);
}

pub fn blocklist(blocked: &[BlockedFingerprint]) {
    for entry in blocked {
        println!(
            "{}  {}  {}",
            entry.fingerprint,
            entry.blocked_at.date(),
            entry.reason.as_deref().unwrap_or("")
        );
    }
}
