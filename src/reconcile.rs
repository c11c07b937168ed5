//! `reconcile-types` command.
//!
//! Concurrent creates of two entities with the same new category can both
//! miss the existing index entry and insert one each. This command merges
//! those duplicates, keeping the oldest entry per label.

use anyhow::Result;

use gemstore_core::index::ReconcileReport;
use gemstore_core::repo::Repositories;

use crate::config::Config;
use crate::db;

pub async fn run_reconcile(config: &Config) -> Result<Vec<ReconcileReport>> {
    let store = db::open_store(config).await?;
    let repos = Repositories::new(store, &config.listing.settings());
    let reports = repos.reconcile_categories().await?;

    for report in &reports {
        tracing::info!(
            collection = %report.collection,
            labels = report.labels,
            removed = report.removed,
            "category index reconciled"
        );
        println!(
            "{:<14} {} labels, {} duplicates removed",
            report.collection, report.labels, report.removed
        );
    }

    Ok(reports)
}
