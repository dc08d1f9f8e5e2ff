//! Request handlers. Each one builds the caller's context through the
//! [`Portal`] facade; no per-user state lives in the server.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::NaiveDate;
use portal_sdk::{
    AggregateFilter, ConflictId, DocumentKind, Fetched, FieldMap, InstanceId,
    InstanceStatus, PersonalInfo, Portal, RequestKind, Resolution, ResolutionResult, Routed,
    SessionId, SessionSummary, SyncResult, UserId,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ServerError, ServerResult};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub portal: Arc<Portal>,
}

impl AppState {
    pub fn new(portal: Arc<Portal>) -> Self {
        Self { portal }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<Value> {
    let kinds: Vec<&str> = RequestKind::ALL.iter().map(|k| k.as_str()).collect();
    Json(json!({
        "name": "portal-server",
        "version": env!("CARGO_PKG_VERSION"),
        "users": state.portal.directory().users().len(),
        "requestKinds": kinds,
    }))
}

// ---- Routing ----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResponse {
    pub kind: String,
    pub instance_id: InstanceId,
}

pub async fn route_handler(
    State(state): State<AppState>,
    Path((user, kind)): Path<(String, String)>,
) -> ServerResult<Json<RouteResponse>> {
    let instance_id = state.portal.resolve_named(&kind, &UserId::from(user))?;
    Ok(Json(RouteResponse { kind, instance_id }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectInstanceRequest {
    pub instance_id: InstanceId,
}

pub async fn select_instance_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(req): Json<SelectInstanceRequest>,
) -> ServerResult<StatusCode> {
    state.portal.select_instance(&UserId::from(user), req.instance_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn instances_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> ServerResult<Json<Vec<InstanceStatus>>> {
    Ok(Json(state.portal.instance_status(&UserId::from(user)).await?))
}

// ---- Aggregated listings ----

/// Query string shared by the listing endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub instance: Option<InstanceId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub kind: Option<DocumentKind>,
}

impl ListQuery {
    fn filter(&self) -> AggregateFilter {
        AggregateFilter {
            instance: self.instance.clone(),
            from: self.from,
            to: self.to,
        }
    }

    /// The listing implied by `?type=`; no type lists every document.
    fn listing(&self) -> ServerResult<RequestKind> {
        match &self.kind {
            None => Ok(RequestKind::GetDocuments),
            Some(DocumentKind::Certificate) => Ok(RequestKind::GetCertificates),
            Some(DocumentKind::Contract) => Ok(RequestKind::GetContracts),
            Some(DocumentKind::Payslip) => Ok(RequestKind::GetPayslips),
            Some(DocumentKind::Other(other)) => {
                Err(ServerError::BadRequest(format!("unsupported document type: {other}")))
            }
        }
    }
}

pub async fn payslips_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Query(query): Query<ListQuery>,
) -> ServerResult<Json<Fetched>> {
    let fetched = state
        .portal
        .aggregate_fetch(RequestKind::GetPayslips, &UserId::from(user), Some(query.filter()))
        .await?;
    Ok(Json(fetched))
}

pub async fn documents_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Query(query): Query<ListQuery>,
) -> ServerResult<Json<Fetched>> {
    let kind = query.listing()?;
    let fetched = state
        .portal
        .aggregate_fetch(kind, &UserId::from(user), Some(query.filter()))
        .await?;
    Ok(Json(fetched))
}

// ---- Personal info ----

pub async fn get_personal_info_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> ServerResult<Json<Routed<PersonalInfo>>> {
    Ok(Json(state.portal.get_personal_info(&UserId::from(user)).await?))
}

pub async fn put_personal_info_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(info): Json<PersonalInfo>,
) -> ServerResult<Json<Value>> {
    let user = UserId::from(user);
    if info.user_id != user {
        return Err(ServerError::BadRequest(format!(
            "body belongs to {}, not {user}",
            info.user_id
        )));
    }
    let instance = state.portal.update_personal_info(&user, &info).await?;
    Ok(Json(json!({ "instanceId": instance })))
}

// ---- Sync and conflict sessions ----

/// Candidate values may be nested JSON or already-flattened dotted paths.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub candidate: Value,
    #[serde(default)]
    pub baseline: Option<Value>,
    /// Open a resolution session when conflicts are found.
    #[serde(default)]
    pub open_session: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    #[serde(flatten)]
    pub result: SyncResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSummary>,
}

fn field_map(value: &Value) -> ServerResult<FieldMap> {
    portal_diff::flatten(value).map_err(|e| ServerError::BadRequest(e.to_string()))
}

pub async fn sync_handler(
    State(state): State<AppState>,
    Path((user, entity)): Path<(String, String)>,
    Json(req): Json<SyncRequest>,
) -> ServerResult<Json<SyncResponse>> {
    let user = UserId::from(user);
    let candidate = field_map(&req.candidate)?;
    let result = match &req.baseline {
        Some(baseline) => {
            state
                .portal
                .sync_with_baseline(&user, &entity, field_map(baseline)?, candidate)
                .await?
        }
        None => state.portal.sync(&user, &entity, candidate).await?,
    };

    let session = if req.open_session && result.has_conflicts() {
        let ids: Vec<ConflictId> = result.conflicts().iter().map(|c| c.id).collect();
        Some(state.portal.open_conflict_session(&user, &entity, &ids).await?)
    } else {
        None
    };
    Ok(Json(SyncResponse { result, session }))
}

/// Conflicts are named by id; their content comes from the sync that
/// reported them.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    pub entity: String,
    pub conflict_ids: Vec<ConflictId>,
}

pub async fn open_session_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(req): Json<OpenSessionRequest>,
) -> ServerResult<(StatusCode, Json<SessionSummary>)> {
    let summary = state
        .portal
        .open_conflict_session(&UserId::from(user), &req.entity, &req.conflict_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

fn session_id(raw: &str) -> ServerResult<SessionId> {
    raw.parse()
        .map_err(|e: portal_sdk::TypeError| ServerError::BadRequest(e.to_string()))
}

pub async fn get_session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<SessionSummary>> {
    Ok(Json(state.portal.session(&session_id(&id)?).await?))
}

#[derive(Debug, Deserialize)]
pub struct ResolutionRequest {
    pub resolution: Resolution,
}

pub async fn set_resolution_handler(
    State(state): State<AppState>,
    Path((id, conflict)): Path<(String, String)>,
    Json(req): Json<ResolutionRequest>,
) -> ServerResult<Json<SessionSummary>> {
    let id = session_id(&id)?;
    let conflict: ConflictId = conflict
        .parse()
        .map_err(|e: portal_sdk::TypeError| ServerError::BadRequest(e.to_string()))?;
    state.portal.set_resolution(&id, conflict, req.resolution).await?;
    Ok(Json(state.portal.session(&id).await?))
}

pub async fn resolve_all_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ResolutionRequest>,
) -> ServerResult<Json<SessionSummary>> {
    let id = session_id(&id)?;
    state.portal.resolve_all(&id, req.resolution).await?;
    Ok(Json(state.portal.session(&id).await?))
}

pub async fn commit_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<ResolutionResult>> {
    Ok(Json(state.portal.commit(&session_id(&id)?).await?))
}
