use super::open_store;
use crate::config::Config;
use crate::services::StateStore;

pub async fn cmd_history(config: &Config, limit: u64) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let entries = store.recent_history(limit).await?;

    if entries.is_empty() {
        println!("No reconciliation history.");
        return Ok(());
    }

    println!("Recent Passes (last {}):", entries.len());
    println!("{:-<70}", "");

    for entry in entries {
        println!(
            "• {} [request {}] - {}",
            entry.title, entry.request_id, entry.outcome
        );
        println!(
            "  Seasons: {} completed, {} partial, {} failed | {} ms | {}",
            entry.seasons_completed,
            entry.seasons_partial,
            entry.seasons_failed,
            entry.duration_ms,
            entry.recorded_at
        );
    }

    Ok(())
}
