//! NeuraProof API server. Scans wallets, issues income proofs and answers
//! verification queries.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use neuraproof_chain::{ChainFeed, provider};
use neuraproof_core::{
    AppError, ConnectedWallet, FeedPolicy, IncomeProfile, Issuer, Jurisdiction, JurisdictionTable,
    Notification, ProofRecord, ProofRegistry, QueryKind, Resolver, Session, Settings,
    TransactionFeed, VerificationResult, aggregate, fetch_with_policy, telemetry,
};
use neuraproof_storage::{self as storage, PgRegistry};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};

/// Shared application state.
struct AppState {
    feed: Arc<dyn TransactionFeed>,
    feed_policy: FeedPolicy,
    issuer: Issuer,
    resolver: Resolver,
    chain_id: u64,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    telemetry::init();
    let settings = Settings::from_env()?;

    tracing::info!(rpc = %settings.rpc_url, chain_id = settings.chain_id, "Starting NeuraProof API Server");

    // Connect to database
    let pool = storage::connect(&settings.database_url).await?;
    storage::migrate(&pool).await?;
    tracing::info!("Database ready");

    let chain_feed = ChainFeed::new(provider::create_provider(&settings.rpc_url)?, &settings)?;
    if let Err(e) = chain_feed.check_chain(settings.chain_id).await {
        tracing::warn!(error = %e, "Could not confirm RPC chain id");
    }

    let registry: Arc<dyn ProofRegistry> = Arc::new(PgRegistry::new(pool));
    let state = Arc::new(AppState {
        feed: Arc::new(chain_feed),
        feed_policy: settings.feed_policy(),
        issuer: Issuer::new(registry.clone(), JurisdictionTable::standard())
            .with_network(settings.chain_id)
            .with_token_uri_base(settings.token_uri_base.clone()),
        resolver: Resolver::new(registry),
        chain_id: settings.chain_id,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.api_port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/jurisdictions", get(list_jurisdictions))
        .route("/api/v1/scan", post(scan))
        .route("/api/v1/proofs", post(mint_proof))
        .route("/api/v1/proofs/:token_id", get(get_proof))
        .route("/api/v1/verify", get(verify))
        .route("/api/v1/wallets/:address/proofs", get(wallet_history))
        .route("/health", get(health))
        .with_state(state)
}

// ─── Request Types ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ScanRequest {
    wallet: String,
}

#[derive(Debug, Deserialize)]
struct MintRequest {
    wallet: String,
    /// Chain id the wallet is connected to; defaults to the configured chain.
    network: Option<u64>,
    jurisdiction: String,
}

#[derive(Debug, Deserialize)]
struct VerifyParams {
    kind: String,
    value: String,
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    data: T,
}

#[derive(Serialize)]
struct ScanResponse {
    profile: IncomeProfile,
    notification: Notification,
}

#[derive(Serialize)]
struct MintResponse {
    proof: ProofRecord,
    notification: Notification,
}

#[derive(Serialize)]
struct VerifyResponse {
    result: VerificationResult,
    notification: Notification,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    wallet: String,
    count: usize,
    latest_mint: Option<DateTime<Utc>>,
    proofs: Vec<VerificationResult>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    notification: Notification,
}

fn json_ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

/// Engine error rendered with a status code and a user-facing notification.
struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::JurisdictionBlocked(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::FeedUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DuplicateTokenId(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if self.0.is_client_error() {
            tracing::debug!(status = status.as_u16(), error = %self.0, "Request rejected");
        } else {
            tracing::error!(status = status.as_u16(), error = %self.0, "Request failed");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
            notification: Notification::from_error(&self.0),
        };
        (
            status,
            Json(ApiResponse {
                success: false,
                data: body,
            }),
        )
            .into_response()
    }
}

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn health() -> &'static str {
    "ok"
}

/// GET /api/v1/jurisdictions: the issuance policy table.
async fn list_jurisdictions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let jurisdictions: Vec<Jurisdiction> = state.issuer.jurisdictions().iter().cloned().collect();
    json_ok(jurisdictions)
}

async fn load_profile(state: &AppState, wallet: &str) -> Result<IncomeProfile, AppError> {
    let transactions = fetch_with_policy(state.feed.as_ref(), wallet, &state.feed_policy).await?;
    Ok(aggregate(&transactions))
}

/// POST /api/v1/scan: fetch payment history and compute the income profile.
async fn scan(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = load_profile(&state, req.wallet.trim()).await?;
    let notification = Notification::scan_complete(&profile);
    Ok(json_ok(ScanResponse {
        profile,
        notification,
    }))
}

/// POST /api/v1/proofs: rescan the wallet and issue a proof from the result.
async fn mint_proof(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MintRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Gate before hitting the feed so blocked requests cost nothing.
    state.issuer.jurisdictions().check(&req.jurisdiction)?;

    let wallet_address = req.wallet.trim();
    let profile = load_profile(&state, wallet_address).await?;
    let wallet = ConnectedWallet::new(wallet_address, req.network.unwrap_or(state.chain_id));
    let session = Session {
        wallet: &wallet,
        jurisdiction: &req.jurisdiction,
    };

    let proof = state.issuer.issue(&profile, &session).await?;
    let notification = Notification::proof_minted(&proof);
    Ok((
        StatusCode::CREATED,
        json_ok(MintResponse {
            proof,
            notification,
        }),
    ))
}

/// GET /api/v1/proofs/:token_id: a single proof with its verdict.
async fn get_proof(
    State(state): State<Arc<AppState>>,
    Path(token_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.resolver.verify(QueryKind::TokenId, &token_id).await?;
    if !result.found {
        return Err(AppError::NotFound(format!("proof #{token_id}")).into());
    }
    Ok(json_ok(result))
}

/// GET /api/v1/verify?kind=tokenId|hash|wallet&value=... : verification query.
async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> Result<impl IntoResponse, ApiError> {
    let kind: QueryKind = params.kind.parse()?;
    if params.value.trim().is_empty() {
        return Err(AppError::Validation("Please enter a value to search".into()).into());
    }
    let result = state.resolver.verify(kind, &params.value).await?;
    let notification = Notification::verification(&result);
    Ok(json_ok(VerifyResponse {
        result,
        notification,
    }))
}

/// GET /api/v1/wallets/:address/proofs: every proof issued to a wallet.
async fn wallet_history(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let proofs = state.resolver.verify_wallet_history(&address).await?;
    let latest_mint = proofs
        .last()
        .and_then(|p| p.record.as_ref())
        .map(|r| r.verification_timestamp);
    Ok(json_ok(HistoryResponse {
        wallet: address,
        count: proofs.len(),
        latest_mint,
        proofs,
    }))
}
