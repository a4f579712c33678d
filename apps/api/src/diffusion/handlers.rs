use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diffusion::approval::{
    cancel_campaign, reject_payment, submit_for_payment, validate_payment,
};
use crate::diffusion::audience::estimate_audience;
use crate::diffusion::builder::{
    create_campaign, quote_campaign, CampaignQuote, CreateCampaignRequest, QuoteRequest,
};
use crate::diffusion::labels::{payment_status_label, status_label};
use crate::diffusion::stats::{compute_campaign_stats, CampaignStats};
use crate::errors::AppError;
use crate::models::campaign::{
    AudienceFilters, Campaign, CampaignWithChannels, EntityType, PaymentStatus,
};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct AudienceResponse {
    pub audience_available: i64,
}

#[derive(Serialize)]
pub struct CampaignDetail {
    #[serde(flatten)]
    pub campaign: CampaignWithChannels,
    pub status_label: &'static str,
    pub payment_status_label: &'static str,
}

#[derive(Deserialize)]
pub struct ApproveRequest {
    pub admin_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct RejectRequest {
    pub admin_id: Uuid,
    #[serde(default)]
    pub notes: String,
}

/// POST /api/v1/diffusion/audience
pub async fn handle_estimate_audience(
    State(state): State<AppState>,
    Json(filters): Json<AudienceFilters>,
) -> Result<Json<AudienceResponse>, AppError> {
    let audience_available = estimate_audience(state.audience.as_ref(), &filters).await?;
    Ok(Json(AudienceResponse { audience_available }))
}

/// POST /api/v1/diffusion/quote
pub async fn handle_quote(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Result<Json<CampaignQuote>, AppError> {
    let quote = quote_campaign(state.audience.as_ref(), &state.diffusion, &req).await?;
    Ok(Json(quote))
}

/// POST /api/v1/campaigns
pub async fn handle_create_campaign(
    State(state): State<AppState>,
    Json(req): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CampaignWithChannels>), AppError> {
    let created = create_campaign(
        state.campaigns.as_ref(),
        state.audience.as_ref(),
        &state.diffusion,
        req,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/campaigns?user_id=
pub async fn handle_list_campaigns(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<Campaign>>, AppError> {
    Ok(Json(state.campaigns.list_by_creator(params.user_id).await?))
}

/// GET /api/v1/campaigns/pending
///
/// Admin queue: campaigns whose payment proof awaits review.
pub async fn handle_pending_campaigns(
    State(state): State<AppState>,
) -> Result<Json<Vec<Campaign>>, AppError> {
    Ok(Json(
        state
            .campaigns
            .list_by_payment_status(PaymentStatus::WaitingProof)
            .await?,
    ))
}

/// GET /api/v1/campaigns/by-entity/:entity_type/:entity_id
pub async fn handle_campaigns_by_entity(
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(EntityType, Uuid)>,
) -> Result<Json<Vec<Campaign>>, AppError> {
    Ok(Json(
        state
            .campaigns
            .list_by_entity(entity_type, entity_id)
            .await?,
    ))
}

/// GET /api/v1/campaigns/:id
pub async fn handle_get_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignDetail>, AppError> {
    let campaign = state
        .campaigns
        .get_campaign(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Campagne {id} introuvable")))?;
    let channels = state.campaigns.get_channels(id).await?;

    Ok(Json(CampaignDetail {
        status_label: status_label(campaign.status),
        payment_status_label: payment_status_label(campaign.payment_status),
        campaign: CampaignWithChannels { campaign, channels },
    }))
}

/// GET /api/v1/campaigns/:id/stats
pub async fn handle_campaign_stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignStats>, AppError> {
    if state.campaigns.get_campaign(id).await?.is_none() {
        return Err(AppError::NotFound(format!("Campagne {id} introuvable")));
    }
    let channels = state.campaigns.get_channels(id).await?;
    Ok(Json(compute_campaign_stats(&channels)))
}

/// POST /api/v1/campaigns/:id/submit
pub async fn handle_submit_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Campaign>, AppError> {
    let campaign = submit_for_payment(state.campaigns.as_ref(), id, state.clock.now()).await?;
    Ok(Json(campaign))
}

/// POST /api/v1/campaigns/:id/approve
pub async fn handle_approve_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<Campaign>, AppError> {
    let campaign = validate_payment(
        state.campaigns.as_ref(),
        &state.diffusion,
        id,
        req.admin_id,
        req.notes,
        state.clock.now(),
    )
    .await?;
    Ok(Json(campaign))
}

/// POST /api/v1/campaigns/:id/reject
pub async fn handle_reject_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<Campaign>, AppError> {
    if req.notes.trim().is_empty() {
        return Err(AppError::Validation(
            "Un motif de rejet est obligatoire".to_string(),
        ));
    }
    let campaign = reject_payment(
        state.campaigns.as_ref(),
        &state.diffusion,
        id,
        req.admin_id,
        req.notes,
        state.clock.now(),
    )
    .await?;
    Ok(Json(campaign))
}

/// POST /api/v1/campaigns/:id/cancel
pub async fn handle_cancel_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<Campaign>, AppError> {
    if req.notes.trim().is_empty() {
        return Err(AppError::Validation(
            "Un motif d'annulation est obligatoire".to_string(),
        ));
    }
    let campaign = cancel_campaign(
        state.campaigns.as_ref(),
        &state.diffusion,
        id,
        req.admin_id,
        req.notes,
        state.clock.now(),
    )
    .await?;
    Ok(Json(campaign))
}
