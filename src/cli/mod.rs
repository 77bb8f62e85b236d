//! CLI module - maintenance commands for Seasonarr
//!
//! Request intake lives elsewhere; these commands run single passes and
//! inspect or adjust persisted season state.

mod commands;

use crate::constants::limits;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Seasonarr - release matching and season reconciliation
#[derive(Parser)]
#[command(name = "seasonarr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default search paths
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Run one reconciliation pass for a request
    #[command(alias = "r")]
    Reconcile {
        /// Request description (TOML)
        #[arg(long)]
        request: PathBuf,
        /// Scripted search results (TOML)
        #[arg(long)]
        fixture: PathBuf,
        /// Print the metrics snapshot after the pass
        #[arg(long)]
        print_metrics: bool,
    },

    /// Show season records and the summary for a show
    #[command(alias = "s")]
    Seasons {
        /// Show id (catalog id)
        show_id: i64,
    },

    /// Allow pack strategies again for a discrepant season
    ClearDiscrepancy { show_id: i64, season: u32 },

    /// Mark every aired episode of a season unprocessed again
    ResetSeason { show_id: i64, season: u32 },

    /// Withdraw a request; running passes stop at the next step
    Cancel { request_id: i64 },

    /// Show recent reconciliation passes
    #[command(alias = "h")]
    History {
        /// Number of entries to show
        #[arg(long, default_value_t = limits::DEFAULT_HISTORY_LIMIT)]
        limit: u64,
    },
}

pub use commands::*;
