//! Payment / approval workflow.
//!
//! ```text
//! draft --submit--> pending_payment --approve--> payment_approved
//!                                  \--reject---> cancelled
//! any state before completed --cancel--> cancelled
//! ```
//!
//! Each step is a conditional update in the store. Repeating a step whose
//! target state is already reached returns the campaign as-is: nothing is
//! re-stamped and no second audit entry is written. Crossing over
//! (approving a rejected campaign, rejecting an approved one) is a conflict.
//! Launching into `in_progress` / `completed` belongs to the sender.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::diffusion::labels::{payment_status_label, status_label};
use crate::diffusion::store::{AdminStamp, CampaignStore, Transition};
use crate::errors::AppError;
use crate::models::campaign::{Campaign, CampaignStatus, PaymentStatus};
use crate::models::settings::NewAuditEntry;
use crate::settings::service::DiffusionConfig;

pub async fn submit_for_payment(
    store: &dyn CampaignStore,
    campaign_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Campaign, AppError> {
    let transition = Transition {
        from_status: vec![CampaignStatus::Draft, CampaignStatus::PendingPayment],
        from_payment: vec![PaymentStatus::Pending, PaymentStatus::WaitingProof],
        to_status: CampaignStatus::PendingPayment,
        to_payment: Some(PaymentStatus::WaitingProof),
        stamp: None,
        at: now,
    };

    match store.transition(campaign_id, &transition).await? {
        Some(campaign) => {
            info!("Campaign {campaign_id} submitted for payment");
            Ok(campaign)
        }
        None => Err(conflict_or_missing(store, campaign_id, "soumise au paiement").await),
    }
}

pub async fn validate_payment(
    store: &dyn CampaignStore,
    config: &DiffusionConfig,
    campaign_id: Uuid,
    admin_id: Uuid,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<Campaign, AppError> {
    let transition = Transition {
        from_status: vec![CampaignStatus::PendingPayment],
        from_payment: vec![PaymentStatus::WaitingProof],
        to_status: CampaignStatus::PaymentApproved,
        to_payment: Some(PaymentStatus::Approved),
        stamp: Some(AdminStamp {
            admin_id,
            notes: clean_notes(notes),
            at: now,
        }),
        at: now,
    };

    settle(
        store,
        config,
        campaign_id,
        &transition,
        "campaign_payment_approved",
        "Paiement de campagne validé",
    )
    .await
}

/// Notes are mandatory at the HTTP boundary; here they are recorded as given.
pub async fn reject_payment(
    store: &dyn CampaignStore,
    config: &DiffusionConfig,
    campaign_id: Uuid,
    admin_id: Uuid,
    notes: String,
    now: DateTime<Utc>,
) -> Result<Campaign, AppError> {
    let transition = Transition {
        from_status: vec![CampaignStatus::Draft, CampaignStatus::PendingPayment],
        from_payment: vec![PaymentStatus::Pending, PaymentStatus::WaitingProof],
        to_status: CampaignStatus::Cancelled,
        to_payment: Some(PaymentStatus::Rejected),
        stamp: Some(AdminStamp {
            admin_id,
            notes: clean_notes(Some(notes)),
            at: now,
        }),
        at: now,
    };

    settle(
        store,
        config,
        campaign_id,
        &transition,
        "campaign_payment_rejected",
        "Paiement de campagne rejeté",
    )
    .await
}

/// Admin cancellation of a campaign that has not completed, whatever its
/// payment state. The payment status is left as recorded.
pub async fn cancel_campaign(
    store: &dyn CampaignStore,
    config: &DiffusionConfig,
    campaign_id: Uuid,
    admin_id: Uuid,
    reason: String,
    now: DateTime<Utc>,
) -> Result<Campaign, AppError> {
    let transition = Transition {
        from_status: vec![
            CampaignStatus::Draft,
            CampaignStatus::PendingPayment,
            CampaignStatus::PaymentApproved,
            CampaignStatus::InProgress,
        ],
        from_payment: vec![
            PaymentStatus::Pending,
            PaymentStatus::WaitingProof,
            PaymentStatus::Approved,
            PaymentStatus::Rejected,
        ],
        to_status: CampaignStatus::Cancelled,
        to_payment: None,
        stamp: Some(AdminStamp {
            admin_id,
            notes: clean_notes(Some(reason)),
            at: now,
        }),
        at: now,
    };

    settle(
        store,
        config,
        campaign_id,
        &transition,
        "campaign_cancelled",
        "Campagne annulée",
    )
    .await
}

async fn settle(
    store: &dyn CampaignStore,
    config: &DiffusionConfig,
    campaign_id: Uuid,
    transition: &Transition,
    action_type: &'static str,
    description: &str,
) -> Result<Campaign, AppError> {
    if let Some(campaign) = store.transition(campaign_id, transition).await? {
        info!(
            "Campaign {campaign_id} moved to {}/{}",
            campaign.status.as_str(),
            campaign.payment_status.as_str()
        );
        config
            .log_action(NewAuditEntry {
                action_type,
                description: format!("{description} : {}", campaign.campaign_name),
                entity_type: Some("campaign"),
                entity_id: Some(campaign_id),
                old_value: None,
                new_value: Some(json!({
                    "status": campaign.status,
                    "payment_status": campaign.payment_status,
                    "admin_notes": campaign.admin_notes,
                })),
                performed_by: transition.stamp.as_ref().map(|s| s.admin_id),
            })
            .await;
        return Ok(campaign);
    }

    let current = store
        .get_campaign(campaign_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Campagne {campaign_id} introuvable")))?;

    if current.status == transition.to_status
        && transition
            .to_payment
            .map_or(true, |p| p == current.payment_status)
    {
        info!(
            "Campaign {campaign_id} already {}; nothing to do",
            current.payment_status.as_str()
        );
        return Ok(current);
    }

    Err(AppError::Conflict(format!(
        "Action impossible : la campagne est {} ({})",
        status_label(current.status).to_lowercase(),
        payment_status_label(current.payment_status).to_lowercase()
    )))
}

async fn conflict_or_missing(
    store: &dyn CampaignStore,
    campaign_id: Uuid,
    action: &str,
) -> AppError {
    match store.get_campaign(campaign_id).await {
        Ok(Some(current)) => AppError::Conflict(format!(
            "La campagne ne peut plus être {action} (statut : {})",
            status_label(current.status).to_lowercase()
        )),
        Ok(None) => AppError::NotFound(format!("Campagne {campaign_id} introuvable")),
        Err(e) => e,
    }
}

fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}
