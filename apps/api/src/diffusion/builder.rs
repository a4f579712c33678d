//! Turns a targeting form into a persisted draft campaign.
//!
//! Flow: validate request → module enabled → entity approved →
//!       fresh audience + fresh pricing → per-channel audience check →
//!       price → atomic insert (status=draft, payment_status=pending).
//!
//! Audience and unit costs are always re-read here, never taken from the
//! estimate the form displayed earlier.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::diffusion::audience::{estimate_audience, AudienceEstimator};
use crate::diffusion::pricing::{
    check_against_audience, enabled_channels, quote_channels, total_cost, ChannelQuote,
    ChannelRequest,
};
use crate::diffusion::store::{CampaignStore, NewCampaign};
use crate::errors::AppError;
use crate::models::campaign::{AudienceFilters, CampaignWithChannels, EntityType};
use crate::settings::service::DiffusionConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCampaignRequest {
    pub user_id: Uuid,
    pub company_id: Option<Uuid>,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub campaign_name: String,
    #[serde(default)]
    pub audience_filters: AudienceFilters,
    pub channels: Vec<ChannelRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    #[serde(default)]
    pub audience_filters: AudienceFilters,
    pub channels: Vec<ChannelRequest>,
}

/// Advisory price shown before submission. The store-side values at
/// creation time are authoritative.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignQuote {
    pub audience_available: i64,
    pub channels: Vec<ChannelQuote>,
    pub total_cost: i64,
    pub total_cost_display: String,
    pub exceeds_audience: bool,
}

pub async fn create_campaign(
    store: &dyn CampaignStore,
    estimator: &dyn AudienceEstimator,
    config: &DiffusionConfig,
    request: CreateCampaignRequest,
) -> Result<CampaignWithChannels, AppError> {
    let campaign_name = request.campaign_name.trim().to_string();
    if campaign_name.is_empty() {
        return Err(AppError::Validation(
            "Le nom de la campagne est obligatoire".to_string(),
        ));
    }
    let channels = enabled_channels(&request.channels)?;

    let settings = config.get_settings(false).await?;
    if !config.is_module_enabled(request.entity_type).await? {
        return Err(AppError::ModuleDisabled(format!(
            "La diffusion ciblée n'est pas activée pour ce type de contenu ({})",
            request.entity_type.as_str()
        )));
    }
    if !settings.allow_multi_channels && channels.len() > 1 {
        return Err(AppError::Validation(
            "Un seul canal est autorisé par campagne".to_string(),
        ));
    }

    if !store
        .is_entity_approved(request.entity_type, request.entity_id)
        .await?
    {
        warn!(
            "Campaign refused: {} {} is not approved",
            request.entity_type.as_str(),
            request.entity_id
        );
        return Err(AppError::EntityNotApproved(
            "Le contenu doit être approuvé avant toute diffusion".to_string(),
        ));
    }

    let audience_available = estimate_audience(estimator, &request.audience_filters).await?;
    check_against_audience(&channels, audience_available)?;

    if settings.max_recipients_per_campaign > 0 {
        if let Some(over) = channels
            .iter()
            .find(|c| c.quantity > settings.max_recipients_per_campaign)
        {
            return Err(AppError::Validation(format!(
                "Quantité pour {} dépasse le maximum autorisé par campagne ({})",
                over.channel_type.as_str(),
                settings.max_recipients_per_campaign
            )));
        }
    }

    let pricing = config.get_channel_pricing(true).await?;
    let quotes = quote_channels(&channels, &pricing)?;
    let total = total_cost(&quotes)?;

    let created = store
        .insert_campaign(
            NewCampaign {
                created_by: request.user_id,
                company_id: request.company_id,
                entity_type: request.entity_type,
                entity_id: request.entity_id,
                campaign_name,
                audience_filters: request.audience_filters.normalized(),
                audience_available,
                total_cost: total,
            },
            quotes,
        )
        .await?;

    info!(
        "Campaign {} created by {}: audience={}, total_cost={}",
        created.campaign.id, request.user_id, audience_available, total
    );
    Ok(created)
}

/// Prices a form without persisting anything.
pub async fn quote_campaign(
    estimator: &dyn AudienceEstimator,
    config: &DiffusionConfig,
    request: &QuoteRequest,
) -> Result<CampaignQuote, AppError> {
    let channels = enabled_channels(&request.channels)?;
    let audience_available = estimate_audience(estimator, &request.audience_filters).await?;
    let pricing = config.get_channel_pricing(false).await?;
    let quotes = quote_channels(&channels, &pricing)?;
    let total = total_cost(&quotes)?;

    Ok(CampaignQuote {
        audience_available,
        exceeds_audience: check_against_audience(&channels, audience_available).is_err(),
        channels: quotes,
        total_cost: total,
        total_cost_display: config.format_currency(total),
    })
}
