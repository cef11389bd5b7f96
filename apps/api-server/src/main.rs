//! api-server: HTTP API for the Deposit resource of the payment service.
//!
//! Serves CRUD and free-text search for deposits, plus a passthrough of the
//! payment gateway configuration:
//! - Storage: SQLite store + SQLite search index (default), or in-memory for both.
//! - Every write goes to the store first and is then mirrored into the index.
//! - CORS: Configurable via CORS_ALLOW_ORIGIN (origin string).
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! cargo run -p api-server
//!
//! # volatile storage, JSON logs
//! STORAGE_PROVIDER=memory LOG_FORMAT=json cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.
//!

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use domain::adapters::memory_repo::{InMemoryDepositRepo, InMemorySearchIndex};
use domain::service::DepositService;
use domain::{CoreError, Deposit, DepositDto, DepositRepository, DepositSearchRepository};
use serde::Deserialize;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ENTITY_NAME: &str = "deposit";
const DEPOSITS_PATH: &str = "/api/deposits";

// Store and index implementations selectable at startup (sqlite is feature-gated).
enum RepoKind {
    Memory(InMemoryDepositRepo),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteDepositRepo),
}

enum IndexKind {
    Memory(InMemorySearchIndex),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteSearchIndex),
}

impl DepositRepository for RepoKind {
    fn save(&self, deposit: Deposit) -> Result<Deposit, CoreError> {
        match self {
            RepoKind::Memory(r) => r.save(deposit),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.save(deposit),
        }
    }

    fn find_all(&self) -> Result<Vec<Deposit>, CoreError> {
        match self {
            RepoKind::Memory(r) => r.find_all(),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.find_all(),
        }
    }

    fn find_one(&self, id: i64) -> Result<Option<Deposit>, CoreError> {
        match self {
            RepoKind::Memory(r) => r.find_one(id),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.find_one(id),
        }
    }

    fn delete(&self, id: i64) -> Result<(), CoreError> {
        match self {
            RepoKind::Memory(r) => r.delete(id),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.delete(id),
        }
    }

    fn count(&self) -> Result<usize, CoreError> {
        match self {
            RepoKind::Memory(r) => r.count(),
            #[cfg(feature = "sqlite")]
            RepoKind::Sqlite(r) => r.count(),
        }
    }
}

impl DepositSearchRepository for IndexKind {
    fn index(&self, deposit: &Deposit) -> Result<(), CoreError> {
        match self {
            IndexKind::Memory(i) => i.index(deposit),
            #[cfg(feature = "sqlite")]
            IndexKind::Sqlite(i) => i.index(deposit),
        }
    }

    fn remove(&self, id: i64) -> Result<(), CoreError> {
        match self {
            IndexKind::Memory(i) => i.remove(id),
            #[cfg(feature = "sqlite")]
            IndexKind::Sqlite(i) => i.remove(id),
        }
    }

    fn find_one(&self, id: i64) -> Result<Option<Deposit>, CoreError> {
        match self {
            IndexKind::Memory(i) => i.find_one(id),
            #[cfg(feature = "sqlite")]
            IndexKind::Sqlite(i) => i.find_one(id),
        }
    }

    fn search(&self, query: &str) -> Result<Vec<Deposit>, CoreError> {
        match self {
            IndexKind::Memory(i) => i.search(query),
            #[cfg(feature = "sqlite")]
            IndexKind::Sqlite(i) => i.search(query),
        }
    }

    fn delete_all(&self) -> Result<(), CoreError> {
        match self {
            IndexKind::Memory(i) => i.delete_all(),
            #[cfg(feature = "sqlite")]
            IndexKind::Sqlite(i) => i.delete_all(),
        }
    }
}

type Deposits = DepositService<RepoKind, IndexKind>;

#[derive(Clone)]
struct AppState {
    deposits: Arc<Deposits>,
    gateway: Arc<config::GatewayProperties>,
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_insecure();

    let deposits = match build_service(&cfg) {
        Ok(s) => s,
        Err(e) => {
            error!(err = %e, "failed to open storage");
            std::process::exit(1);
        }
    };
    let state = AppState {
        deposits: Arc::new(deposits),
        gateway: Arc::new(cfg.gateway.clone()),
    };

    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    let mut app = router(state)
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

    // CORS - already validated in Config::from_env()
    let cors = if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin]))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE])
    };
    app = app.layer(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    info!(%addr, "api-server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind port");
    axum::serve(listener, app).await.expect("server error");
}

fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/deposits",
            get(get_all_deposits)
                .post(create_deposit)
                .put(update_deposit),
        )
        .route(
            "/api/deposits/:id",
            get(get_deposit).delete(delete_deposit),
        )
        .route("/api/_search/deposits", get(search_deposits))
        .route("/api/gateway-properties", get(gateway_properties))
        .with_state(state)
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Construct store and index based on config and feature flags.
fn build_service(cfg: &config::Config) -> Result<Deposits, CoreError> {
    let (repo, index) = match cfg.storage_provider {
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => (
            RepoKind::Sqlite(sqlite_adapter::SqliteDepositRepo::new(&cfg.db_path)?),
            IndexKind::Sqlite(sqlite_adapter::SqliteSearchIndex::new(&cfg.index_path)?),
        ),
        #[cfg(not(feature = "sqlite"))]
        config::StorageProvider::Sqlite => {
            warn!("built without the `sqlite` feature; using in-memory storage");
            memory_storage()
        }
        config::StorageProvider::Memory => memory_storage(),
    };
    Ok(DepositService::new(repo, index))
}

fn memory_storage() -> (RepoKind, IndexKind) {
    (
        RepoKind::Memory(InMemoryDepositRepo::new()),
        IndexKind::Memory(InMemorySearchIndex::new()),
    )
}

/// Translate service errors that no handler treats specially.
fn error_response(e: CoreError, op: &'static str) -> Response {
    match e {
        CoreError::NotFound => StatusCode::NOT_FOUND.into_response(),
        CoreError::IdExists => id_exists_response(),
        CoreError::InvalidQuery(msg) => {
            warn!(op, %msg, "invalid search query");
            (
                StatusCode::BAD_REQUEST,
                Json(http_common::json_error_with_message("invalid_query", &msg)),
            )
                .into_response()
        }
        e => {
            error!(op, err = ?e, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(http_common::json_err("internal")),
            )
                .into_response()
        }
    }
}

fn id_exists_response() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(http_common::json_entity_error(
            ENTITY_NAME,
            "idexists",
            "A new deposit cannot already have an ID",
            StatusCode::BAD_REQUEST.as_u16(),
        )),
    )
        .into_response()
}

fn create(state: &AppState, dto: DepositDto) -> Response {
    if domain::validate::validate_new_deposit(&dto).is_err() {
        warn!(deposit = %dto, "create rejected: id already set");
        return id_exists_response();
    }
    match state.deposits.save(dto) {
        Ok(created) => {
            let Some(id) = created.id else {
                let e = CoreError::Repository("store returned a deposit without id".into());
                return error_response(e, "create");
            };
            info!(id, "create ok");
            (
                StatusCode::CREATED,
                [(
                    header::LOCATION,
                    http_common::resource_location(DEPOSITS_PATH, id),
                )],
                Json(created),
            )
                .into_response()
        }
        Err(e) => error_response(e, "create"),
    }
}

async fn create_deposit(State(state): State<AppState>, Json(dto): Json<DepositDto>) -> Response {
    debug!(deposit = %dto, "REST request to save deposit");
    create(&state, dto)
}

async fn update_deposit(State(state): State<AppState>, Json(dto): Json<DepositDto>) -> Response {
    debug!(deposit = %dto, "REST request to update deposit");
    // A body without id is treated as a create (upsert), returning 201.
    if dto.id.is_none() {
        return create(&state, dto);
    }
    match state.deposits.save(dto) {
        Ok(updated) => {
            info!(id = ?updated.id, "update ok");
            (StatusCode::OK, Json(updated)).into_response()
        }
        Err(e) => error_response(e, "update"),
    }
}

async fn get_all_deposits(State(state): State<AppState>) -> Response {
    debug!("REST request to get all deposits");
    match state.deposits.find_all() {
        Ok(all) => (StatusCode::OK, Json(all)).into_response(),
        Err(e) => error_response(e, "list"),
    }
}

async fn get_deposit(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    debug!(id, "REST request to get deposit");
    match state.deposits.find_one(id) {
        Ok(Some(dto)) => (StatusCode::OK, Json(dto)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => error_response(e, "get"),
    }
}

async fn delete_deposit(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    debug!(id, "REST request to delete deposit");
    match state.deposits.delete(id) {
        Ok(()) => {
            info!(id, "delete ok");
            StatusCode::OK.into_response()
        }
        Err(e) => error_response(e, "delete"),
    }
}

#[derive(Deserialize)]
struct SearchQuery {
    query: String,
}

async fn search_deposits(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Response {
    debug!(query = %q.query, "REST request to search deposits");
    match state.deposits.search(&q.query) {
        Ok(hits) => (StatusCode::OK, Json(hits)).into_response(),
        Err(e) => error_response(e, "search"),
    }
}

async fn gateway_properties(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.gateway.as_ref().clone())
}
