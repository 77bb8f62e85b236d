use super::open_store;
use crate::config::Config;
use crate::domain::ShowId;
use crate::models::{SeasonRecord, ShowSummary};
use crate::services::{SeasonTracker, TrackerError};
use std::sync::Arc;

fn format_count(count: Option<u32>) -> String {
    count.map_or_else(|| "?".to_string(), |c| c.to_string())
}

fn print_record(record: &SeasonRecord) {
    println!(
        "Season {:>2}  {:<12} {}/{} aired ({} total)",
        record.season_number,
        record.status.as_str(),
        record.confirmed_episodes.len(),
        format_count(record.aired_count()),
        format_count(record.episode_count),
    );
    if let Some(method) = record.completion_method {
        println!("  Completed via: {method}");
    }
    if let Some(reason) = &record.discrepancy_reason {
        println!("  Discrepant: {reason}");
    }
    if !record.failed_episodes.is_empty() {
        let failed: Vec<String> = record.failed_episodes.iter().map(ToString::to_string).collect();
        println!("  Failed: {}", failed.join(", "));
    }
}

pub async fn cmd_seasons(config: &Config, show_id: i64) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let tracker = SeasonTracker::new(Arc::new(store));
    let records = tracker.list(ShowId::new(show_id)).await?;

    if records.is_empty() {
        println!("No season records for show {show_id}.");
        return Ok(());
    }

    println!("Show {show_id}");
    println!("{:-<60}", "");
    for record in &records {
        print_record(record);
    }

    let summary = ShowSummary::from_records(&records);
    println!("{:-<60}", "");
    println!(
        "Status: {} | {}/{} episodes confirmed",
        summary.status, summary.confirmed_episodes, summary.aired_episodes
    );
    Ok(())
}

async fn maintain(
    config: &Config,
    show_id: i64,
    season: u32,
    reset: bool,
) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let tracker = SeasonTracker::new(Arc::new(store));
    let show = ShowId::new(show_id);

    let result = if reset {
        tracker.reset(show, season).await
    } else {
        tracker.clear_discrepancy(show, season).await
    };

    match result {
        Ok(record) => {
            print_record(&record);
            Ok(())
        }
        Err(TrackerError::Missing { .. }) => {
            println!("No record for show {show_id} season {season}.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn cmd_clear_discrepancy(config: &Config, show_id: i64, season: u32) -> anyhow::Result<()> {
    maintain(config, show_id, season, false).await
}

pub async fn cmd_reset_season(config: &Config, show_id: i64, season: u32) -> anyhow::Result<()> {
    maintain(config, show_id, season, true).await
}
