//! Habit Sync Server
//!
//! Reference remote store for the habit tracker. Keeps every owner's
//! collections in memory and pushes a change notice over websocket whenever a
//! collection changes.
//!
//! # Configuration
//!
//! Environment variables:
//! - `HABIT_PORT`: Port to listen on (default: 8080)
//! - `HABIT_SERVER_CONFIG`: Path to config file (default: ~/.config/habit-server/config.yaml)
//!
//! # Config File Format
//!
//! ```yaml
//! api_keys:
//!   - key: "your-secret-key-here"
//!     user_id: "user1"
//! ```
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint (no auth required)
//! - `GET /me`: Returns current user info (auth required)
//! - `GET|POST /v1/<type>`, `DELETE /v1/<type>/<id>`, `GET /v1/<type>/changes` (websocket)
//!   for `bathroom-event`, `water-intake`, `food-entry` and `therapy-session`

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, Request, State,
    },
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use habit_sync::{
    BathroomEvent, ChangeNotice, Entry, EntryId, FoodEntry, MemoryGateway, NewEntry, OwnerId,
    Payload, TherapySession, WaterIntake,
};

// ============================================================================
// Configuration
// ============================================================================

/// API key entry in config
#[derive(Debug, Clone, Deserialize)]
struct ApiKeyEntry {
    key: String,
    user_id: String,
}

/// Config file structure
#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    api_keys: Vec<ApiKeyEntry>,
}

/// Server configuration
#[derive(Debug, Clone)]
struct Config {
    /// Port to listen on
    port: u16,
    /// Path to config file
    config_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let port = std::env::var("HABIT_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let config_path = std::env::var("HABIT_SERVER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("habit-server")
                    .join("config.yaml")
            });

        Self { port, config_path }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Authenticated user info, added to request extensions after auth
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

impl AuthUser {
    fn owner_id(&self) -> OwnerId {
        OwnerId::new(self.user_id.clone())
    }
}

/// API key store - maps key -> AuthUser
#[derive(Debug, Clone, Default)]
struct ApiKeyStore {
    keys: HashMap<String, AuthUser>,
}

impl ApiKeyStore {
    fn from_entries(entries: Vec<ApiKeyEntry>) -> Self {
        let keys = entries
            .into_iter()
            .map(|entry| {
                (
                    entry.key,
                    AuthUser {
                        user_id: entry.user_id,
                    },
                )
            })
            .collect();
        Self { keys }
    }

    /// Load API keys from config file
    fn load(config_path: &FsPath) -> Self {
        match std::fs::read_to_string(config_path) {
            Ok(contents) => match serde_yaml::from_str::<ConfigFile>(&contents) {
                Ok(config) => {
                    let store = Self::from_entries(config.api_keys);
                    tracing::info!("Loaded {} API key(s)", store.keys.len());
                    store
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read config file {}: {}",
                    config_path.display(),
                    e
                );
                tracing::warn!("No API keys loaded - all authenticated requests will fail");
                Self::default()
            }
        }
    }

    /// Validate an API key and return the associated user
    fn validate(&self, key: &str) -> Option<AuthUser> {
        self.keys.get(key).cloned()
    }
}

/// Application state shared across handlers
#[derive(Clone, Default)]
struct AppState {
    api_keys: Arc<ApiKeyStore>,
    bathroom: MemoryGateway<BathroomEvent>,
    water: MemoryGateway<WaterIntake>,
    food: MemoryGateway<FoodEntry>,
    therapy: MemoryGateway<TherapySession>,
}

/// Picks the collection for one record type out of the app state.
trait Collection<P: Payload> {
    fn collection(&self) -> &MemoryGateway<P>;
}

impl Collection<BathroomEvent> for AppState {
    fn collection(&self) -> &MemoryGateway<BathroomEvent> {
        &self.bathroom
    }
}

impl Collection<WaterIntake> for AppState {
    fn collection(&self) -> &MemoryGateway<WaterIntake> {
        &self.water
    }
}

impl Collection<FoodEntry> for AppState {
    fn collection(&self) -> &MemoryGateway<FoodEntry> {
        &self.food
    }
}

impl Collection<TherapySession> for AppState {
    fn collection(&self) -> &MemoryGateway<TherapySession> {
        &self.therapy
    }
}

/// Error response body
#[derive(Serialize)]
struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Websockets cannot set headers from a browser, so the key may also come as `?key=`.
fn key_from_query(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == "key")
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|value| value.into_owned())
}

/// Authentication middleware
async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let api_key = match auth_header {
        Some(h) => match h.strip_prefix("Bearer ") {
            Some(key) => key.to_string(),
            None => {
                return ApiError::new(
                    StatusCode::UNAUTHORIZED,
                    "invalid_auth",
                    "Authorization header must use Bearer scheme",
                )
                .into_response();
            }
        },
        None => match key_from_query(request.uri().query()) {
            Some(key) => key,
            None => {
                return ApiError::new(
                    StatusCode::UNAUTHORIZED,
                    "missing_auth",
                    "Authorization header required",
                )
                .into_response();
            }
        },
    };

    // Validate API key
    match state.api_keys.validate(&api_key) {
        Some(user) => {
            // Add user info to request extensions
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => ApiError::new(StatusCode::UNAUTHORIZED, "invalid_key", "Invalid API key")
            .into_response(),
    }
}

/// Only the owner may read or write their collection.
fn authorize(user: &AuthUser, owner: &str) -> Result<OwnerId, ApiError> {
    if user.user_id != owner {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "forbidden",
            format!("Not allowed to access records of '{}'", owner),
        ));
    }
    Ok(user.owner_id())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint (no auth required)
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Current user response
#[derive(Serialize)]
struct MeResponse {
    user_id: String,
}

/// Get current user info (auth required)
async fn me(Extension(user): Extension<AuthUser>) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: user.user_id,
    })
}

#[derive(Debug, Deserialize)]
struct OwnerQuery {
    owner: String,
}

async fn list_entries<P: Payload>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<Entry<P>>>, ApiError>
where
    AppState: Collection<P>,
{
    let owner = authorize(&user, &query.owner)?;
    Ok(Json(Collection::<P>::collection(&state).list(&owner).await))
}

async fn create_entry<P: Payload>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(new_entry): Json<NewEntry<P>>,
) -> Result<(StatusCode, Json<Entry<P>>), ApiError>
where
    AppState: Collection<P>,
{
    authorize(&user, new_entry.owner_id.as_str())?;

    let entry = Collection::<P>::collection(&state)
        .insert(new_entry)
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, "rejected", e.to_string()))?;

    tracing::info!("{} created {} {}", user.user_id, P::RECORD_TYPE, entry.id);
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn delete_entry<P: Payload>(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
    AppState: Collection<P>,
{
    let id = EntryId::from(id.as_str());
    if id.is_transient() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("'{}' is not a durable id", id),
        ));
    }

    // Unknown ids are accepted so retries stay harmless
    if Collection::<P>::collection(&state)
        .remove_for(&user.owner_id(), &id)
        .await
    {
        tracing::info!("{} deleted {} {}", user.user_id, P::RECORD_TYPE, id);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn changes<P: Payload>(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<OwnerQuery>,
) -> Result<Response, ApiError>
where
    AppState: Collection<P>,
{
    let owner = authorize(&user, &query.owner)?;
    let receiver = Collection::<P>::collection(&state)
        .hub()
        .subscribe(&owner)
        .await;

    tracing::debug!("{} subscribed to {} changes", owner, P::RECORD_TYPE);
    Ok(ws.on_upgrade(move |socket| forward_changes(socket, receiver, owner)))
}

/// Pushes one text frame per change notice until either side goes away.
async fn forward_changes(
    mut socket: WebSocket,
    mut receiver: broadcast::Receiver<ChangeNotice>,
    owner: OwnerId,
) {
    loop {
        tokio::select! {
            notice = receiver.recv() => match notice {
                Ok(_) | Err(RecvError::Lagged(_)) => {
                    if socket.send(Message::Text("changed".into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!("Change stream for {} closed", owner);
}

// ============================================================================
// Router
// ============================================================================

fn collection_routes<P: Payload>() -> Router<AppState>
where
    AppState: Collection<P>,
{
    let base = format!("/v1/{}", P::RECORD_TYPE);
    Router::new()
        .route(&base, get(list_entries::<P>).post(create_entry::<P>))
        .route(&format!("{}/changes", base), get(changes::<P>))
        .route(&format!("{}/{{id}}", base), delete(delete_entry::<P>))
}

fn app(state: AppState) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new().route("/health", get(health));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/me", get(me))
        .merge(collection_routes::<BathroomEvent>())
        .merge(collection_routes::<WaterIntake>())
        .merge(collection_routes::<FoodEntry>())
        .merge(collection_routes::<TherapySession>())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "habit_sync_server=info,habit_sync=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!("Config file: {}", config.config_path.display());

    let state = AppState {
        api_keys: Arc::new(ApiKeyStore::load(&config.config_path)),
        ..AppState::default()
    };

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app(state)).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
