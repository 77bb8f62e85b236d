mod history;
mod init;
mod reconcile;
mod requests;
mod seasons;

pub use history::cmd_history;
pub use init::cmd_init;
pub use reconcile::cmd_reconcile;
pub use requests::cmd_cancel_request;
pub use seasons::{cmd_clear_discrepancy, cmd_reset_season, cmd_seasons};

use crate::config::Config;
use crate::db::Store;
use anyhow::Context;

async fn open_store(config: &Config) -> anyhow::Result<Store> {
    Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await
    .with_context(|| format!("Failed to open database {}", config.general.database_path))
}
