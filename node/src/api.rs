//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the escrows over HTTP. All endpoints
//! share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                        | Description                        |
//! |--------|-----------------------------|------------------------------------|
//! | GET    | `/health`                   | Liveness probe                     |
//! | GET    | `/status`                   | Node status summary                |
//! | GET    | `/contracts/:id`            | Contract record                    |
//! | POST   | `/contracts/native`         | Lock native value (signed)         |
//! | POST   | `/contracts/token`          | Lock tokens (signed)               |
//! | POST   | `/contracts/:id/withdraw`   | Reveal the preimage (signed)       |
//! | POST   | `/contracts/:id/refund`     | Reclaim after the timelock (signed)|
//! | POST   | `/tokens/:token/approve`    | Approve token custody (signed)     |
//! | GET    | `/accounts/:address`        | Balances, nonce, and contracts     |
//! | GET    | `/ws`                       | WebSocket stream of contract events|
//!
//! ## Signed requests
//!
//! Every POST body carries `caller`, `nonce`, and `signature` alongside the
//! action's own fields. The signature covers these canonical field lists:
//!
//! | Action       | Fields                                              |
//! |--------------|-----------------------------------------------------|
//! | `new_native` | receiver, amount, hashlock, timelock                |
//! | `new_token`  | token, receiver, amount, hashlock, timelock         |
//! | `withdraw`   | contract id, preimage                               |
//! | `refund`     | contract id                                         |
//! | `approve`    | token, amount                                       |
//!
//! Integers are decimal and byte strings lowercase hex.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use htlc_contracts::{
    Asset, ContractId, ContractLedger, EventSink, Hashlock, HtlcContract, HtlcError, HtlcEvent,
    NativeEscrow, NewContract, Preimage, TokenEscrow,
};
use htlc_protocol::config::{EVENT_CHANNEL_CAPACITY, PROTOCOL_VERSION};
use htlc_protocol::vault::{FungibleToken, NativeBank, TokenLedger};
use htlc_protocol::{Address, Clock};

use crate::auth::{AuthError, Authenticator};
use crate::genesis::Genesis;
use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub ledger: Arc<ContractLedger>,
    pub native: Arc<NativeEscrow>,
    pub tokens: Arc<TokenEscrow>,
    /// Concrete token handles, for approvals.
    pub fungibles: Arc<HashMap<Address, Arc<FungibleToken>>>,
    pub auth: Arc<Authenticator>,
    /// Contract events, fanned out to WebSocket subscribers.
    pub event_tx: broadcast::Sender<HtlcEvent>,
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Wire the ledger, both escrows, and the event channel, then apply
    /// `genesis`.
    pub fn build(
        clock: Arc<dyn Clock>,
        metrics: SharedMetrics,
        genesis: &Genesis,
    ) -> anyhow::Result<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let sink = Arc::new(BroadcastSink::new(event_tx.clone()));
        let ledger = Arc::new(ContractLedger::new(clock, sink));
        let native = Arc::new(NativeEscrow::new(ledger.clone(), Arc::new(NativeBank::new())));
        let tokens = Arc::new(TokenEscrow::new(ledger.clone()));
        let fungibles = genesis.apply(native.bank(), &tokens)?;

        Ok(Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            ledger,
            native,
            tokens,
            fungibles: Arc::new(fungibles),
            auth: Arc::new(Authenticator::new()),
            event_tx,
            metrics,
        })
    }

    /// Run an escrow operation with latency and rejection accounting.
    fn track<T>(&self, op: impl FnOnce() -> Result<T, HtlcError>) -> Result<T, HtlcError> {
        let timer = self.metrics.operation_latency_seconds.start_timer();
        let result = op();
        timer.observe_duration();
        if let Err(e) = &result {
            self.metrics.record_rejection(e);
        }
        result
    }
}

/// Forwards ledger events onto the broadcast channel.
///
/// Runs under the ledger's record lock; `send` never blocks.
#[derive(Debug)]
pub struct BroadcastSink {
    tx: broadcast::Sender<HtlcEvent>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<HtlcEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: &HtlcEvent) {
        // Err only means nobody is subscribed.
        let _ = self.tx.send(event.clone());
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the API router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/contracts/native", post(new_native_handler))
        .route("/contracts/token", post(new_token_handler))
        .route("/contracts/:id", get(contract_handler))
        .route("/contracts/:id/withdraw", post(withdraw_handler))
        .route("/contracts/:id/refund", post(refund_handler))
        .route("/tokens/:token/approve", post(approve_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Authentication envelope around an action's fields.
#[derive(Debug, Deserialize)]
pub struct Signed<T> {
    pub caller: Address,
    pub nonce: u64,
    /// Hex Ed25519 signature over the canonical message.
    pub signature: String,
    #[serde(flatten)]
    pub body: T,
}

#[derive(Debug, Deserialize)]
pub struct NewNativeRequest {
    pub receiver: Address,
    pub amount: u64,
    pub hashlock: Hashlock,
    pub timelock: u64,
}

#[derive(Debug, Deserialize)]
pub struct NewTokenRequest {
    pub token: Address,
    pub receiver: Address,
    pub amount: u64,
    pub hashlock: Hashlock,
    pub timelock: u64,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub preimage: Preimage,
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub amount: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: ContractId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettledResponse {
    pub id: ContractId,
    pub amount: u64,
    pub state: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub allowance: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub protocol_version: String,
    pub contracts: usize,
    pub active_contracts: usize,
    pub tokens: Vec<Address>,
    /// The ledger clock, unix seconds.
    pub now: u64,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: Address,
    pub native_balance: u64,
    pub token_balances: BTreeMap<Address, u64>,
    /// Last accepted request nonce; absent if the address never signed.
    pub nonce: Option<u64>,
    pub contracts: Vec<ContractId>,
}

/// Error body returned by every endpoint on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable error kind.
    pub kind: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    Htlc(HtlcError),
    Auth(AuthError),
    BadRequest(String),
}

impl From<HtlcError> for ApiError {
    fn from(e: HtlcError) -> Self {
        ApiError::Htlc(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

/// HTTP status for an escrow rejection.
pub fn status_for(error: &HtlcError) -> StatusCode {
    match error {
        HtlcError::InvalidAmount { .. }
        | HtlcError::InvalidTimelock { .. }
        | HtlcError::InvalidReceiver { .. }
        | HtlcError::CustodyAccount { .. }
        | HtlcError::AssetMismatch { .. } => StatusCode::BAD_REQUEST,
        HtlcError::InvalidSecret { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        HtlcError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        HtlcError::UnknownContract { .. } | HtlcError::UnknownToken { .. } => {
            StatusCode::NOT_FOUND
        }
        HtlcError::DuplicateContract { .. }
        | HtlcError::AlreadySettled { .. }
        | HtlcError::TimelockNotExpired { .. } => StatusCode::CONFLICT,
        HtlcError::InsufficientAuthorization { .. } | HtlcError::InsufficientFunds { .. } => {
            StatusCode::PAYMENT_REQUIRED
        }
        HtlcError::ExternalTransferFailed { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, error) = match &self {
            ApiError::Htlc(e) => (status_for(e), e.kind(), e.to_string()),
            ApiError::Auth(e @ AuthError::BadSignature(_)) => {
                (StatusCode::UNAUTHORIZED, e.kind(), e.to_string())
            }
            ApiError::Auth(e @ AuthError::StaleNonce { .. }) => {
                (StatusCode::CONFLICT, e.kind(), e.to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
        };
        (
            status,
            Json(ErrorResponse {
                error,
                kind: kind.to_string(),
            }),
        )
            .into_response()
    }
}

fn parse_id(raw: &str) -> Result<ContractId, ApiError> {
    ContractId::from_hex(raw).map_err(|e| ApiError::BadRequest(format!("invalid contract id: {e}")))
}

fn parse_address(raw: String) -> Result<Address, ApiError> {
    Address::new(raw).map_err(|e| ApiError::BadRequest(format!("invalid address: {e}")))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: 200 while the process is up.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        version: state.version.clone(),
        protocol_version: PROTOCOL_VERSION.to_string(),
        contracts: state.ledger.len(),
        active_contracts: state.ledger.active_count(),
        tokens: state.tokens.tokens(),
        now: state.ledger.now(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `GET /contracts/:id`
async fn contract_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<HtlcContract>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.ledger.get(&id)?))
}

/// `POST /contracts/native`
async fn new_native_handler(
    State(state): State<AppState>,
    Json(req): Json<Signed<NewNativeRequest>>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let body = &req.body;
    state.auth.authenticate(
        &req.caller,
        "new_native",
        &[
            body.receiver.as_str(),
            &body.amount.to_string(),
            &body.hashlock.to_hex(),
            &body.timelock.to_string(),
        ],
        req.nonce,
        &req.signature,
    )?;

    let terms = NewContract {
        receiver: body.receiver.clone(),
        amount: body.amount,
        hashlock: body.hashlock,
        timelock: body.timelock,
    };
    let id = state.track(|| state.native.new_contract(&req.caller, &terms))?;
    state.metrics.contracts_created_total.inc();
    state.metrics.active_contracts.inc();
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// `POST /contracts/token`
async fn new_token_handler(
    State(state): State<AppState>,
    Json(req): Json<Signed<NewTokenRequest>>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let body = &req.body;
    state.auth.authenticate(
        &req.caller,
        "new_token",
        &[
            body.token.as_str(),
            body.receiver.as_str(),
            &body.amount.to_string(),
            &body.hashlock.to_hex(),
            &body.timelock.to_string(),
        ],
        req.nonce,
        &req.signature,
    )?;

    let terms = NewContract {
        receiver: body.receiver.clone(),
        amount: body.amount,
        hashlock: body.hashlock,
        timelock: body.timelock,
    };
    let id = state.track(|| state.tokens.new_contract(&req.caller, &body.token, &terms))?;
    state.metrics.contracts_created_total.inc();
    state.metrics.active_contracts.inc();
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// `POST /contracts/:id/withdraw`
///
/// Routed to the escrow that holds the contract's asset.
async fn withdraw_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<Signed<WithdrawRequest>>,
) -> Result<Json<SettledResponse>, ApiError> {
    let id = parse_id(&id)?;
    let preimage = req.body.preimage;
    state.auth.authenticate(
        &req.caller,
        "withdraw",
        &[&id.to_hex(), &preimage.to_hex()],
        req.nonce,
        &req.signature,
    )?;

    let amount = state.track(|| match state.ledger.get(&id)?.asset {
        Asset::Native => state.native.withdraw(&id, &req.caller, &preimage),
        Asset::Token(_) => state.tokens.withdraw(&id, &req.caller, &preimage),
    })?;
    state.metrics.contracts_withdrawn_total.inc();
    state.metrics.active_contracts.dec();
    Ok(Json(SettledResponse {
        id,
        amount,
        state: "withdrawn".into(),
    }))
}

/// `POST /contracts/:id/refund`
async fn refund_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<Signed<RefundRequest>>,
) -> Result<Json<SettledResponse>, ApiError> {
    let id = parse_id(&id)?;
    state.auth.authenticate(
        &req.caller,
        "refund",
        &[&id.to_hex()],
        req.nonce,
        &req.signature,
    )?;

    let amount = state.track(|| match state.ledger.get(&id)?.asset {
        Asset::Native => state.native.refund(&id, &req.caller),
        Asset::Token(_) => state.tokens.refund(&id, &req.caller),
    })?;
    state.metrics.contracts_refunded_total.inc();
    state.metrics.active_contracts.dec();
    Ok(Json(SettledResponse {
        id,
        amount,
        state: "refunded".into(),
    }))
}

/// `POST /tokens/:token/approve`: set the caller's allowance to the token
/// escrow's custody account.
async fn approve_handler(
    Path(token): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<Signed<ApproveRequest>>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    let token = parse_address(token)?;
    let amount = req.body.amount;
    state.auth.authenticate(
        &req.caller,
        "approve",
        &[token.as_str(), &amount.to_string()],
        req.nonce,
        &req.signature,
    )?;

    let ledger = state
        .fungibles
        .get(&token)
        .ok_or_else(|| HtlcError::UnknownToken {
            token: token.clone(),
        })?;
    let spender = state.tokens.custody().clone();
    ledger.approve(&req.caller, &spender, amount);

    Ok(Json(ApprovalResponse {
        allowance: ledger.allowance(&req.caller, &spender),
        token,
        owner: req.caller,
        spender,
    }))
}

/// `GET /accounts/:address`: native and token balances, last nonce, and
/// every contract the address is party to.
async fn account_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AccountResponse>, ApiError> {
    let address = parse_address(address)?;

    let token_balances = state
        .fungibles
        .iter()
        .map(|(token, ledger)| (token.clone(), ledger.balance_of(&address)))
        .collect();
    let contracts = state
        .ledger
        .contracts_for(&address)
        .into_iter()
        .map(|c| c.id)
        .collect();

    Ok(Json(AccountResponse {
        native_balance: state.native.bank().balance_of(&address),
        token_balances,
        nonce: state.auth.last_nonce(&address),
        contracts,
        address,
    }))
}

/// `GET /ws`: WebSocket upgrade for live contract events.
///
/// Clients receive JSON-encoded [`HtlcEvent`]s. The channel is push-only;
/// client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Forward broadcast events until the client disconnects or the channel
/// closes.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
