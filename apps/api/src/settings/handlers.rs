use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::campaign::ChannelType;
use crate::models::settings::{
    AuditLogEntry, ChannelPricing, DiffusionSettings, MessageTemplate, NewTemplate, PricingPatch,
    SettingsPatch, TemplatePatch, TemplateType,
};
use crate::state::AppState;

#[derive(Serialize)]
pub struct SettingsResponse {
    #[serde(flatten)]
    pub settings: DiffusionSettings,
    /// Resolved Orange Money number, fallback applied.
    pub payment_number: String,
}

#[derive(Deserialize)]
pub struct SettingsUpdate {
    pub actor_id: Uuid,
    #[serde(flatten)]
    pub patch: SettingsPatch,
}

#[derive(Deserialize)]
pub struct PricingUpdate {
    pub actor_id: Uuid,
    #[serde(flatten)]
    pub patch: PricingPatch,
}

#[derive(Deserialize)]
pub struct PricingQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Deserialize)]
pub struct AuditQuery {
    pub action_type: Option<String>,
    #[serde(default = "default_audit_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_audit_limit() -> i64 {
    50
}

#[derive(Deserialize)]
pub struct TemplateQuery {
    pub template_type: Option<TemplateType>,
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Deserialize)]
pub struct TemplateCreate {
    pub actor_id: Uuid,
    #[serde(flatten)]
    pub template: NewTemplate,
}

#[derive(Deserialize)]
pub struct TemplateUpdate {
    pub actor_id: Uuid,
    #[serde(flatten)]
    pub patch: TemplatePatch,
}

#[derive(Deserialize)]
pub struct ActorQuery {
    pub actor_id: Uuid,
}

/// GET /api/v1/diffusion/settings
pub async fn handle_get_settings(
    State(state): State<AppState>,
) -> Result<Json<SettingsResponse>, AppError> {
    let settings = state.diffusion.get_settings(false).await?;
    let payment_number = state.diffusion.payment_number().await;
    Ok(Json(SettingsResponse {
        settings,
        payment_number,
    }))
}

/// PATCH /api/v1/diffusion/settings
pub async fn handle_update_settings(
    State(state): State<AppState>,
    Json(req): Json<SettingsUpdate>,
) -> Result<Json<DiffusionSettings>, AppError> {
    let updated = state
        .diffusion
        .update_settings(&req.patch, req.actor_id)
        .await?;
    Ok(Json(updated))
}

/// GET /api/v1/diffusion/pricing
pub async fn handle_get_pricing(
    State(state): State<AppState>,
    Query(params): Query<PricingQuery>,
) -> Result<Json<Vec<ChannelPricing>>, AppError> {
    let pricing = if params.active_only {
        state.diffusion.active_channels().await?
    } else {
        state.diffusion.get_channel_pricing(false).await?
    };
    Ok(Json(pricing))
}

/// GET /api/v1/diffusion/pricing/costs
pub async fn handle_channel_costs(
    State(state): State<AppState>,
) -> Result<Json<HashMap<ChannelType, i64>>, AppError> {
    Ok(Json(state.diffusion.channel_costs(false).await?))
}

/// PATCH /api/v1/diffusion/pricing/:channel
pub async fn handle_update_pricing(
    State(state): State<AppState>,
    Path(channel): Path<ChannelType>,
    Json(req): Json<PricingUpdate>,
) -> Result<Json<ChannelPricing>, AppError> {
    let updated = state
        .diffusion
        .update_channel_pricing(channel, &req.patch, req.actor_id)
        .await?;
    Ok(Json(updated))
}

/// GET /api/v1/diffusion/audit
pub async fn handle_audit_logs(
    State(state): State<AppState>,
    Query(params): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLogEntry>>, AppError> {
    let entries = state
        .diffusion
        .audit_logs(params.action_type.as_deref(), params.limit, params.offset)
        .await?;
    Ok(Json(entries))
}

/// POST /api/v1/diffusion/cache/clear
pub async fn handle_clear_cache(State(state): State<AppState>) -> StatusCode {
    state.diffusion.clear_cache();
    info!("Diffusion settings cache cleared");
    StatusCode::NO_CONTENT
}

/// GET /api/v1/diffusion/templates
pub async fn handle_list_templates(
    State(state): State<AppState>,
    Query(params): Query<TemplateQuery>,
) -> Result<Json<Vec<MessageTemplate>>, AppError> {
    let templates = state
        .diffusion
        .message_templates(params.template_type, params.active_only)
        .await?;
    Ok(Json(templates))
}

/// GET /api/v1/diffusion/templates/default/:template_type
pub async fn handle_default_template(
    State(state): State<AppState>,
    Path(template_type): Path<TemplateType>,
) -> Result<Json<MessageTemplate>, AppError> {
    state
        .diffusion
        .default_template(template_type)
        .await?
        .map(Json)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Aucun modèle par défaut pour {}",
                template_type.as_str()
            ))
        })
}

/// POST /api/v1/diffusion/templates
pub async fn handle_create_template(
    State(state): State<AppState>,
    Json(req): Json<TemplateCreate>,
) -> Result<(StatusCode, Json<MessageTemplate>), AppError> {
    let created = state
        .diffusion
        .create_template(&req.template, req.actor_id)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PATCH /api/v1/diffusion/templates/:id
pub async fn handle_update_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TemplateUpdate>,
) -> Result<Json<MessageTemplate>, AppError> {
    let updated = state
        .diffusion
        .update_template(id, &req.patch, req.actor_id)
        .await?;
    Ok(Json(updated))
}

/// DELETE /api/v1/diffusion/templates/:id
pub async fn handle_delete_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ActorQuery>,
) -> Result<StatusCode, AppError> {
    state.diffusion.delete_template(id, params.actor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
