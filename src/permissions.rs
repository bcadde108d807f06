use anyhow::Result;
use reqwest::StatusCode;
use tracing::warn;

use crate::graph::GraphClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionCheck {
    pub status: u16,
    pub authorized: bool,
}

/// Request a single message to confirm the token may read the mailbox.
pub async fn test_permissions(client: &GraphClient) -> Result<PermissionCheck> {
    let url = client.messages_url(1)?;
    let (status, _body) = client.get_status_and_body(&url).await?;

    let authorized = status == StatusCode::OK;
    if !authorized {
        warn!(
            "permission check failed for {}: status={}",
            client.config().target_user,
            status
        );
    }

    Ok(PermissionCheck {
        status: status.as_u16(),
        authorized,
    })
}
