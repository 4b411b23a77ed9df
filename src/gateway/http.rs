//! HTTP binding of the remote store.
//!
//! Routes (per record type, e.g. `water-intake`):
//! - `GET    /v1/<type>?owner=<owner>`  → `[Entry]`
//! - `POST   /v1/<type>`                → `Entry` (body: `NewEntry`)
//! - `DELETE /v1/<type>/<id>`           → 204
//! - `GET    /v1/<type>/changes?owner=<owner>&key=<key>` → websocket; each frame is a change notice
//!
//! Requests authenticate with `Authorization: Bearer <api key>`; the websocket
//! passes the key as a query parameter.

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{ChangeFeed, ChangeNotice, GatewayError, RemoteGateway};
use crate::models::{Entry, EntryId, NewEntry, OwnerId, Payload, RecordType};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
/// Timeout for the health probe.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

/// Remote store reached over HTTP.
///
/// One instance serves every record type; the record type picks the route.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    server_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpGateway {
    /// Creates a gateway with the default request timeout.
    pub fn new(
        server_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        Self::with_timeout(server_url, api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        server_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Connection(e.to_string()))?;

        Ok(Self {
            server_url: server_url.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Returns the server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn collection_url(&self, record_type: RecordType) -> String {
        self.build_http_url(&format!("/v1/{}", record_type))
    }

    fn owner_url(&self, record_type: RecordType, owner: &OwnerId) -> String {
        format!(
            "{}?owner={}",
            self.collection_url(record_type),
            urlencoding::encode(owner.as_str())
        )
    }

    fn entry_url(&self, record_type: RecordType, id: &EntryId) -> String {
        format!(
            "{}/{}",
            self.collection_url(record_type),
            urlencoding::encode(id.as_str())
        )
    }

    fn changes_url(&self, record_type: RecordType, owner: &OwnerId) -> String {
        self.build_ws_url(&format!(
            "/v1/{}/changes?owner={}&key={}",
            record_type,
            urlencoding::encode(owner.as_str()),
            urlencoding::encode(&self.api_key)
        ))
    }

    /// Builds a websocket URL for a given path.
    fn build_ws_url(&self, path: &str) -> String {
        // Convert http(s) to ws(s) if needed
        let base_url = if self.server_url.starts_with("http://") {
            self.server_url.replacen("http://", "ws://", 1)
        } else if self.server_url.starts_with("https://") {
            self.server_url.replacen("https://", "wss://", 1)
        } else if !self.server_url.starts_with("ws://") && !self.server_url.starts_with("wss://") {
            format!("ws://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!("{}{}", base_url.trim_end_matches('/'), path)
    }

    /// Builds an HTTP URL for a given path.
    fn build_http_url(&self, path: &str) -> String {
        build_http_url(&self.server_url, path)
    }
}

fn build_http_url(server_url: &str, path: &str) -> String {
    // Convert ws(s) to http(s) if needed
    let base_url = if server_url.starts_with("ws://") {
        server_url.replacen("ws://", "http://", 1)
    } else if server_url.starts_with("wss://") {
        server_url.replacen("wss://", "https://", 1)
    } else if !server_url.starts_with("http://") && !server_url.starts_with("https://") {
        format!("http://{}", server_url)
    } else {
        server_url.to_string()
    };

    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Maps non-success statuses onto gateway errors.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        401 | 403 => Err(GatewayError::Unauthorized),
        404 => Err(GatewayError::NotFound(response.url().path().to_string())),
        code => {
            let message = response.text().await.unwrap_or_default();
            Err(GatewayError::Status {
                status: code,
                message,
            })
        }
    }
}

/// Returns true if the server answers its health check.
pub async fn check_server(server_url: &str) -> bool {
    let client = match reqwest::Client::builder().timeout(HEALTH_TIMEOUT).build() {
        Ok(client) => client,
        Err(_) => return false,
    };

    match client.get(build_http_url(server_url, "/health")).send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

impl<P: Payload> RemoteGateway<P> for HttpGateway {
    fn fetch_all<'a>(
        &'a self,
        owner: &'a OwnerId,
    ) -> BoxFuture<'a, Result<Vec<Entry<P>>, GatewayError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.owner_url(P::RECORD_TYPE, owner))
                .bearer_auth(&self.api_key)
                .send()
                .await?;

            let entries = check_status(response).await?.json::<Vec<Entry<P>>>().await?;
            Ok(entries)
        })
    }

    fn create(&self, entry: NewEntry<P>) -> BoxFuture<'_, Result<Entry<P>, GatewayError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.collection_url(P::RECORD_TYPE))
                .bearer_auth(&self.api_key)
                .json(&entry)
                .send()
                .await?;

            let created = check_status(response).await?.json::<Entry<P>>().await?;
            if created.id.is_transient() {
                return Err(GatewayError::Decode(format!(
                    "server returned a transient id: {}",
                    created.id
                )));
            }
            Ok(created)
        })
    }

    fn delete<'a>(&'a self, id: &'a EntryId) -> BoxFuture<'a, Result<(), GatewayError>> {
        Box::pin(async move {
            let response = self
                .client
                .delete(self.entry_url(P::RECORD_TYPE, id))
                .bearer_auth(&self.api_key)
                .send()
                .await?;

            check_status(response).await?;
            Ok(())
        })
    }

    fn subscribe<'a>(
        &'a self,
        owner: &'a OwnerId,
    ) -> BoxFuture<'a, Result<ChangeFeed, GatewayError>> {
        Box::pin(async move {
            let url = self.changes_url(P::RECORD_TYPE, owner);
            let (ws_stream, _) = connect_async(url.as_str())
                .await
                .map_err(|e| GatewayError::Subscription(e.to_string()))?;

            tracing::debug!("Change feed connected for {} ({})", owner, P::RECORD_TYPE);

            // The feed ends after the first transport error or a close frame
            let feed = stream::unfold(Some(ws_stream), |state| async move {
                let mut ws_stream = state?;
                loop {
                    match ws_stream.next().await {
                        Some(Ok(Message::Text(_))) | Some(Ok(Message::Binary(_))) => {
                            return Some((Ok(ChangeNotice), Some(ws_stream)));
                        }
                        Some(Ok(Message::Close(_))) | None => return None,
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            return Some((Err(GatewayError::Subscription(e.to_string())), None));
                        }
                    }
                }
            })
            .boxed();

            Ok(feed)
        })
    }
}
