//! HTTP API server for the IOU node.
//!
//! JSON endpoints for every ledger operation, plus a server-sent-event stream
//! per room. The acting identity is taken from the `x-identity-id` header.

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::Stream;
use iou_core::{Amount, Debt, DebtId, DebtPatch, ErrorKind, IdentityId, LedgerError, NewDebt, Reminders};
use iou_events::{Notification, Room};
use iou_identity::{Identity, IdentityStore};
use iou_scheduler::{SchedulerError, TaskReport};
use iou_settlement::ContactDebt;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

/// Header carrying the caller's identity id.
pub const IDENTITY_HEADER: &str = "x-identity-id";

// --- Request / response types ---

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub uptime_secs: u64,
    pub store: String,
    pub rooms: usize,
    pub identities: usize,
    pub scheduler_running: bool,
    pub tasks: Vec<&'static str>,
}

#[derive(Deserialize)]
pub struct CreateIdentityRequest {
    pub phone: String,
    pub display_name: String,
}

#[derive(Serialize, Deserialize)]
pub struct CreateIdentityResponse {
    pub id: IdentityId,
}

/// Debtor is given either by id or by phone number.
#[derive(Deserialize)]
pub struct CreateDebtRequest {
    #[serde(default)]
    pub receiver_id: Option<IdentityId>,
    #[serde(default)]
    pub receiver_phone: Option<String>,
    #[serde(default)]
    pub receiver_name: Option<String>,
    pub amount_total: Amount,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminders: Option<Reminders>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct AmountRequest {
    pub amount: Amount,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub accept: bool,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub error: String,
}

// --- Errors ---

#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    Unauthenticated(String),
    BadRequest(String),
    NotFound(String),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::UnknownTask(name) => ApiError::NotFound(format!("unknown task: {}", name)),
            SchedulerError::Task { source, .. } => ApiError::Ledger(source),
        }
    }
}

/// HTTP status for a ledger error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::SelfReference => StatusCode::BAD_REQUEST,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::InvalidState | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::SideEffectFailure | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, error) = match self {
            ApiError::Ledger(e) => {
                let kind = e.kind();
                if status_for(kind).is_server_error() {
                    tracing::error!(error = %e, "request failed");
                }
                (status_for(kind), kind.as_str().to_string(), e.to_string())
            }
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, "unauthenticated".to_string(), msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation_error".to_string(), msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found_error".to_string(), msg),
        };
        (status, Json(ErrorResponse { kind, error })).into_response()
    }
}

/// The identity making the request.
pub struct Caller(pub IdentityId);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(IDENTITY_HEADER)
            .ok_or_else(|| ApiError::Unauthenticated(format!("missing {} header", IDENTITY_HEADER)))?;
        let id = raw
            .to_str()
            .ok()
            .and_then(|s| s.parse::<IdentityId>().ok())
            .ok_or_else(|| ApiError::Unauthenticated(format!("malformed {} header", IDENTITY_HEADER)))?;
        Ok(Caller(id))
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// --- Handlers ---

async fn handle_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        store: state.engine.ledger().store().store_id().to_string(),
        rooms: state.bus.room_count(),
        identities: state.identities.len(),
        scheduler_running: state.scheduler.is_running(),
        tasks: state.scheduler.task_names(),
    })
}

async fn handle_create_identity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateIdentityRequest>,
) -> Result<(StatusCode, Json<CreateIdentityResponse>), ApiError> {
    let id = state
        .identities
        .resolve_or_create(&req.phone, &req.display_name)
        .await
        .map_err(LedgerError::from)?;
    Ok((StatusCode::CREATED, Json(CreateIdentityResponse { id })))
}

async fn handle_get_identity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<IdentityId>,
) -> ApiResult<Identity> {
    let identity = state
        .identities
        .get(id)
        .await
        .map_err(|e| ApiError::NotFound(e.to_string()))?;
    Ok(Json(identity))
}

async fn handle_notifications(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> ApiResult<Vec<Notification>> {
    Ok(Json(state.notifications.list_for(caller)))
}

async fn handle_create_debt(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Json(req): Json<CreateDebtRequest>,
) -> Result<(StatusCode, Json<Debt>), ApiError> {
    let debt = match (req.receiver_id, req.receiver_phone) {
        (Some(receiver), None) => {
            let mut new = NewDebt::new(caller, receiver, req.amount_total);
            new.due_date = req.due_date;
            new.reminders = req.reminders;
            new.description = req.description;
            state.engine.create_debt(new).await?
        }
        (None, Some(phone)) => {
            let contact = ContactDebt {
                display_name: req.receiver_name.unwrap_or_else(|| phone.clone()),
                phone,
                amount_total: req.amount_total,
                due_date: req.due_date,
                reminders: req.reminders,
                description: req.description,
            };
            state.engine.create_debt_for_contact(caller, contact).await?
        }
        _ => {
            return Err(ApiError::BadRequest(
                "exactly one of receiver_id or receiver_phone is required".into(),
            ))
        }
    };
    Ok((StatusCode::CREATED, Json(debt)))
}

async fn handle_list_debts(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> ApiResult<Vec<Debt>> {
    Ok(Json(state.engine.list_debts(caller).await?))
}

async fn handle_get_debt(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(id): Path<DebtId>,
) -> ApiResult<Debt> {
    Ok(Json(state.engine.get_debt(id, caller).await?))
}

async fn handle_update_debt(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(id): Path<DebtId>,
    Json(patch): Json<DebtPatch>,
) -> ApiResult<Debt> {
    Ok(Json(state.engine.update_debt(id, caller, patch).await?))
}

async fn handle_request_payment(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(id): Path<DebtId>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<Debt> {
    Ok(Json(state.engine.request_payment(id, caller, req.amount).await?))
}

async fn handle_acknowledge_payment(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(id): Path<DebtId>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<Debt> {
    Ok(Json(state.engine.acknowledge_payment(id, caller, req.amount).await?))
}

async fn handle_verify_payment(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(id): Path<DebtId>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<Debt> {
    Ok(Json(state.engine.verify_payment(id, caller, req.accept).await?))
}

async fn handle_cancel_debt(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(id): Path<DebtId>,
) -> ApiResult<Debt> {
    Ok(Json(state.engine.cancel_debt(id, caller).await?))
}

async fn handle_trigger_task(
    State(state): State<Arc<AppState>>,
    Path(task): Path<String>,
) -> ApiResult<TaskReport> {
    Ok(Json(state.scheduler.trigger(&task, Utc::now()).await?))
}

/// Stream a room as server-sent events. Callers may join their own user room
/// and the rooms of debts they are party to.
async fn handle_room_events(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(room): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let room: Room = room
        .parse()
        .map_err(|e: iou_events::EventError| ApiError::BadRequest(e.to_string()))?;
    match room {
        Room::User(id) if id != caller => {
            return Err(LedgerError::Forbidden("cannot join another user's room".into()).into())
        }
        Room::User(_) => {}
        Room::Debt(debt_id) => {
            state.engine.get_debt(debt_id, caller).await?;
        }
    }

    let rx = state.bus.subscribe(room);
    let stream = futures::stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let sse = Event::default().event(event.name.as_str()).json_data(&event);
                    return Some((sse, rx));
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(room = %room, missed, "room subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// --- Server ---

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/identities", post(handle_create_identity))
        .route("/api/v1/identities/{id}", get(handle_get_identity))
        .route("/api/v1/notifications", get(handle_notifications))
        .route("/api/v1/debts", get(handle_list_debts).post(handle_create_debt))
        .route("/api/v1/debts/{id}", get(handle_get_debt).patch(handle_update_debt))
        .route("/api/v1/debts/{id}/request-payment", post(handle_request_payment))
        .route("/api/v1/debts/{id}/acknowledge-payment", post(handle_acknowledge_payment))
        .route("/api/v1/debts/{id}/verify-payment", post(handle_verify_payment))
        .route("/api/v1/debts/{id}/cancel", post(handle_cancel_debt))
        .route("/api/v1/scheduler/{task}/trigger", post(handle_trigger_task))
        .route("/api/v1/rooms/{room}/events", get(handle_room_events))
        .with_state(state)
}

pub async fn start_api_server(listen_addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "HTTP API server started");
    axum::serve(listener, app).await?;
    Ok(())
}
