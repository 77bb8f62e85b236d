pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod db;
pub mod domain;
pub mod entities;
pub mod matching;
pub mod models;
pub mod parser;
pub mod services;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
pub use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Init) {
        return cli::cmd_init();
    }

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    config.validate()?;

    init_tracing(&config)?;
    let prometheus_handle = init_metrics(&config)?;

    match cli.command {
        Commands::Init => Ok(()),

        Commands::Reconcile {
            request,
            fixture,
            print_metrics,
        } => {
            let handle = prometheus_handle.as_ref().filter(|_| print_metrics);
            cli::cmd_reconcile(&config, &request, &fixture, handle).await
        }

        Commands::Seasons { show_id } => cli::cmd_seasons(&config, show_id).await,

        Commands::ClearDiscrepancy { show_id, season } => {
            cli::cmd_clear_discrepancy(&config, show_id, season).await
        }

        Commands::ResetSeason { show_id, season } => {
            cli::cmd_reset_season(&config, show_id, season).await
        }

        Commands::Cancel { request_id } => cli::cmd_cancel_request(&config, request_id).await,

        Commands::History { limit } => cli::cmd_history(&config, limit).await,
    }
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let (plain_layer, json_layer) = if config.general.log_json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(plain_layer)
        .with(json_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let mut builder = tracing_loki::builder();
        for (key, value) in &config.observability.loki_labels {
            builder = builder.label(key.as_str(), value.as_str())?;
        }
        let (layer, task) = builder
            .extra_field("pid", std::process::id().to_string())?
            .build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    Ok(())
}

fn init_metrics(config: &Config) -> anyhow::Result<Option<PrometheusHandle>> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    if !config.observability.metrics_enabled {
        return Ok(None);
    }

    let handle = if let Some(port) = config.observability.metrics_port {
        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .build()
            .context("Failed to build Prometheus exporter")?;
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder)
            .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {e}"))?;
        tokio::spawn(exporter);
        info!(port, "Prometheus metrics exporter listening");
        handle
    } else {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        handle
    };

    Ok(Some(handle))
}
