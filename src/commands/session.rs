use habit_sync::{EntryStore, GatewayError, HttpGateway, OwnerId, Payload, RollbackPolicy};

use crate::config::Config;

/// Everything a record command needs to reach the remote store.
pub struct Session {
    pub owner: OwnerId,
    pub gateway: HttpGateway,
    pub rollback: RollbackPolicy,
}

impl Session {
    pub fn from_config(config: &Config) -> Result<Self, SessionError> {
        let owner = config
            .owner_id
            .value
            .clone()
            .filter(|owner| !owner.is_empty())
            .ok_or(SessionError::MissingOwner)?;
        let (Some(url), Some(api_key)) = (&config.server.url, &config.server.api_key) else {
            return Err(SessionError::NotConfigured);
        };

        let gateway = HttpGateway::with_timeout(url, api_key, config.server.timeout())?;
        Ok(Self {
            owner: OwnerId::new(owner),
            gateway,
            rollback: config.rollback.value,
        })
    }

    pub fn store<P: Payload>(&self) -> EntryStore<P, HttpGateway> {
        EntryStore::with_policy(self.gateway.clone(), self.rollback)
    }

    /// A store with the owner's collection already loaded.
    pub async fn loaded_store<P: Payload>(
        &self,
    ) -> Result<EntryStore<P, HttpGateway>, habit_sync::StoreError> {
        let store = self.store();
        store.load(&self.owner).await?;
        Ok(store)
    }
}

/// Errors setting up a session
#[derive(Debug)]
pub enum SessionError {
    MissingOwner,
    NotConfigured,
    Gateway(GatewayError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::MissingOwner => write!(
                f,
                "No owner configured. Set owner_id in the config file or HABIT_OWNER_ID"
            ),
            SessionError::NotConfigured => write!(
                f,
                "Server not configured. Set server.url and server.api_key, or HABIT_SERVER_URL and HABIT_API_KEY"
            ),
            SessionError::Gateway(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Gateway(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GatewayError> for SessionError {
    fn from(e: GatewayError) -> Self {
        SessionError::Gateway(e)
    }
}
