use super::open_store;
use crate::config::Config;
use crate::domain::RequestId;
use crate::models::RequestStatus;
use crate::services::StateStore;

pub async fn cmd_cancel_request(config: &Config, request_id: i64) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let id = RequestId::new(request_id);

    let Some(record) = store.get_request(id).await? else {
        println!("Request {id} not found.");
        return Ok(());
    };

    if record.status.is_settled() {
        println!("Request {id} is already {}.", record.status.as_str());
        return Ok(());
    }

    store
        .set_request_status(id, RequestStatus::Cancelled)
        .await?;
    println!("✓ Request {id} cancelled.");
    Ok(())
}
