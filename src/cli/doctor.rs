//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};
use relfs::config::RelfsConfig;
use relfs::content::ContentStore;
use relfs::db;
use relfs::rules::RuleEngine;

use super::format_bytes;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &RelfsConfig) -> Result<()> {
    let db_path = config.db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `relfs serve` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("relfs Health Report");
    println!("===================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!();
    println!("Row counts:");
    println!("  Relations:       {}", report.relation_count);
    println!("  Deleted:         {}", report.deleted_count);
    println!("  Audit log:       {}", report.log_count);
    println!();

    match ContentStore::open(config.objects_dir()).and_then(|store| store.usage()) {
        Ok((objects, bytes)) => {
            println!("Content objects:   {objects} ({})", format_bytes(bytes));
        }
        Err(e) => println!("Content store:     UNREADABLE ({e})"),
    }

    match RuleEngine::from_config(&config.rules, config.rules_file().as_deref()) {
        Ok(rules) => {
            let enabled = rules.rules().iter().filter(|r| r.enabled).count();
            println!("Rules:             {enabled} enabled of {}", rules.rules().len());
        }
        Err(e) => println!("Rules:             INVALID ({e:#})"),
    }
    println!();

    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db {}", db_path.display());
        println!("  2. Then run `relfs rebuild-index` to regenerate paths and search.");
    }

    Ok(())
}
