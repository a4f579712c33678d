use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::ai_engine::{
    CvRequest, GeneratedCv, ScoringInput, ScoringOutput, SearchInput, SearchOutput,
};
use crate::credits::admin;
use crate::credits::gate::{can_afford, Affordability, GateReceipt, ServiceSpec};
use crate::credits::services::{generate_cv, score_profile, search_candidates};
use crate::errors::AppError;
use crate::models::credits::{
    CreditAccount, NewService, ServiceCost, ServiceCostHistory, ServiceCostPatch,
    ServiceStatistics, UsageRecord,
};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub user_id: Uuid,
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    50
}

#[derive(Deserialize)]
pub struct AffordQuery {
    pub user_id: Uuid,
    pub service_code: String,
}

#[derive(Deserialize)]
pub struct ServiceCreate {
    pub actor_id: Uuid,
    #[serde(flatten)]
    pub service: NewService,
}

#[derive(Deserialize)]
pub struct ServiceUpdate {
    pub actor_id: Uuid,
    pub change_reason: Option<String>,
    #[serde(flatten)]
    pub patch: ServiceCostPatch,
}

#[derive(Deserialize)]
pub struct ServiceDeleteQuery {
    pub actor_id: Uuid,
    pub change_reason: Option<String>,
}

#[derive(Deserialize)]
pub struct CostHistoryQuery {
    pub service_code: Option<String>,
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

/// Body of every AI call: the caller plus the feature's own input.
#[derive(Deserialize)]
pub struct AiRequest<T> {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub input: T,
}

/// GET /api/v1/credits/balance?user_id=
pub async fn handle_balance(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<CreditAccount>, AppError> {
    Ok(Json(state.ledger.account(params.user_id).await?))
}

/// GET /api/v1/credits/services
pub async fn handle_list_services(
    State(state): State<AppState>,
) -> Result<Json<Vec<ServiceCost>>, AppError> {
    Ok(Json(state.ledger.list_services().await?))
}

/// POST /api/v1/credits/services
pub async fn handle_add_service(
    State(state): State<AppState>,
    Json(req): Json<ServiceCreate>,
) -> Result<(StatusCode, Json<ServiceCost>), AppError> {
    let created = admin::add_service(state.ledger.as_ref(), &req.service, req.actor_id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PATCH /api/v1/credits/services/:code
pub async fn handle_update_service(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<ServiceUpdate>,
) -> Result<Json<ServiceCost>, AppError> {
    let updated = admin::update_service_cost(
        state.ledger.as_ref(),
        &code,
        &req.patch,
        req.change_reason.as_deref(),
        req.actor_id,
    )
    .await?;
    Ok(Json(updated))
}

/// DELETE /api/v1/credits/services/:code?actor_id=&change_reason=
pub async fn handle_delete_service(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(params): Query<ServiceDeleteQuery>,
) -> Result<StatusCode, AppError> {
    admin::delete_service(
        state.ledger.as_ref(),
        &code,
        params.change_reason.as_deref(),
        params.actor_id,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/credits/statistics
pub async fn handle_service_statistics(
    State(state): State<AppState>,
) -> Result<Json<Vec<ServiceStatistics>>, AppError> {
    Ok(Json(state.ledger.service_statistics().await?))
}

/// GET /api/v1/credits/cost-history?service_code=&limit=
pub async fn handle_cost_history(
    State(state): State<AppState>,
    Query(params): Query<CostHistoryQuery>,
) -> Result<Json<Vec<ServiceCostHistory>>, AppError> {
    let limit = params.limit.clamp(1, 200);
    Ok(Json(
        state
            .ledger
            .cost_history(params.service_code.as_deref(), limit)
            .await?,
    ))
}

/// GET /api/v1/credits/history?user_id=&limit=
pub async fn handle_usage_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<UsageRecord>>, AppError> {
    let limit = params.limit.clamp(1, 200);
    Ok(Json(
        state.ledger.usage_history(params.user_id, limit).await?,
    ))
}

/// GET /api/v1/credits/check?user_id=&service_code=
pub async fn handle_can_afford(
    State(state): State<AppState>,
    Query(params): Query<AffordQuery>,
) -> Result<Json<Affordability>, AppError> {
    let spec = ServiceSpec::from_code(&params.service_code).ok_or_else(|| {
        AppError::NotFound(format!("Service {} inconnu", params.service_code))
    })?;
    Ok(Json(
        can_afford(state.ledger.as_ref(), params.user_id, spec).await?,
    ))
}

/// POST /api/v1/ai/score
pub async fn handle_score_profile(
    State(state): State<AppState>,
    Json(req): Json<AiRequest<ScoringInput>>,
) -> Result<Json<GateReceipt<ScoringOutput>>, AppError> {
    let receipt = score_profile(
        state.ledger.as_ref(),
        state.ai_engine.as_ref(),
        req.user_id,
        req.input,
    )
    .await?;
    Ok(Json(receipt))
}

/// POST /api/v1/ai/search
pub async fn handle_search_candidates(
    State(state): State<AppState>,
    Json(req): Json<AiRequest<SearchInput>>,
) -> Result<Json<GateReceipt<SearchOutput>>, AppError> {
    let receipt = search_candidates(
        state.ledger.as_ref(),
        state.ai_engine.as_ref(),
        req.user_id,
        req.input,
    )
    .await?;
    Ok(Json(receipt))
}

/// POST /api/v1/ai/cv
pub async fn handle_generate_cv(
    State(state): State<AppState>,
    Json(req): Json<AiRequest<CvRequest>>,
) -> Result<Json<GateReceipt<GeneratedCv>>, AppError> {
    let receipt = generate_cv(
        state.ledger.as_ref(),
        state.ai_engine.as_ref(),
        req.user_id,
        req.input,
    )
    .await?;
    Ok(Json(receipt))
}
