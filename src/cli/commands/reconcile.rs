use super::open_store;
use crate::clients::{FixtureProvider, RetryPolicy, RetryingProvider};
use crate::config::Config;
use crate::domain::MediaRequest;
use crate::services::{CancellationFlag, Coordinator, Outcome};
use anyhow::Context;
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

fn load_request(path: &Path) -> anyhow::Result<MediaRequest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse request file: {}", path.display()))
}

pub async fn cmd_reconcile(
    config: &Config,
    request_path: &Path,
    fixture_path: &Path,
    metrics: Option<&PrometheusHandle>,
) -> anyhow::Result<()> {
    let request = load_request(request_path)?;
    let fixture = FixtureProvider::load(fixture_path)
        .with_context(|| format!("Failed to load fixture: {}", fixture_path.display()))?;
    let mut provider = RetryingProvider::new(fixture, RetryPolicy::from(&config.provider));

    let store = open_store(config).await?;
    let coordinator = Coordinator::new(Arc::new(store), config);

    let cancel = Arc::new(CancellationFlag::new());
    let watcher = {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping after the current step");
                cancel.cancel();
            }
        })
    };

    let result = coordinator
        .reconcile(&request, &mut provider, cancel.as_ref())
        .await;
    watcher.abort();
    let report = result?;

    let marker = match report.outcome {
        Outcome::Confirmed => "✓",
        Outcome::Cancelled | Outcome::Skipped => "•",
        Outcome::Failed => "✗",
    };
    println!("{marker} {} [request {}]: {}", request.title, request.id, report.outcome);

    if let Some(release) = &report.movie_release {
        println!("  Release: {release}");
    }
    for record in &report.seasons {
        println!(
            "  Season {:>2}: {} ({} confirmed, {} failed, {} unprocessed)",
            record.season_number,
            record.status.as_str(),
            record.confirmed_episodes.len(),
            record.failed_episodes.len(),
            record.unprocessed_episodes.len()
        );
        if let Some(reason) = &record.discrepancy_reason {
            println!("    Discrepant: {reason}");
        }
    }

    let activated = provider.inner().activated();
    if !activated.is_empty() {
        println!("  Activated: {}", activated.join(", "));
    }

    if let Some(handle) = metrics {
        println!();
        println!("{}", handle.render());
    }

    Ok(())
}
