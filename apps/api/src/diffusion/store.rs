//! Campaign persistence seam.
//!
//! The store owns atomicity: a campaign and its channels are written in one
//! transaction, and status transitions are conditional updates that only
//! apply when the row is still in an expected state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::diffusion::pricing::ChannelQuote;
use crate::errors::AppError;
use crate::models::campaign::{
    AudienceFilters, Campaign, CampaignChannel, CampaignStatus, CampaignWithChannels, EntityType,
    PaymentStatus,
};

/// Campaign about to be inserted in `draft` / `pending`.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub created_by: Uuid,
    pub company_id: Option<Uuid>,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub campaign_name: String,
    pub audience_filters: AudienceFilters,
    pub audience_available: i64,
    pub total_cost: i64,
}

/// Admin stamp recorded on approval or rejection.
#[derive(Debug, Clone)]
pub struct AdminStamp {
    pub admin_id: Uuid,
    pub notes: Option<String>,
    pub at: DateTime<Utc>,
}

/// Conditional status change. Applies only when the current row matches
/// one of `from_status` and one of `from_payment`. `to_payment: None`
/// leaves the payment status as it is.
#[derive(Debug, Clone)]
pub struct Transition {
    pub from_status: Vec<CampaignStatus>,
    pub from_payment: Vec<PaymentStatus>,
    pub to_status: CampaignStatus,
    pub to_payment: Option<PaymentStatus>,
    pub stamp: Option<AdminStamp>,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// True when the target row exists and its `status` is `approved`.
    async fn is_entity_approved(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<bool, AppError>;

    /// Inserts the campaign and all its channel rows atomically.
    async fn insert_campaign(
        &self,
        campaign: NewCampaign,
        channels: Vec<ChannelQuote>,
    ) -> Result<CampaignWithChannels, AppError>;

    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, AppError>;

    async fn get_channels(&self, campaign_id: Uuid) -> Result<Vec<CampaignChannel>, AppError>;

    /// Newest first.
    async fn list_by_creator(&self, user_id: Uuid) -> Result<Vec<Campaign>, AppError>;

    /// Newest first.
    async fn list_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<Vec<Campaign>, AppError>;

    /// Newest first.
    async fn list_by_payment_status(
        &self,
        payment_status: PaymentStatus,
    ) -> Result<Vec<Campaign>, AppError>;

    /// Applies `transition` and returns the updated row, or `None` when no
    /// row with `id` is in an allowed state.
    async fn transition(
        &self,
        id: Uuid,
        transition: &Transition,
    ) -> Result<Option<Campaign>, AppError>;
}

pub struct PgCampaignStore {
    pool: PgPool,
}

impl PgCampaignStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignStore for PgCampaignStore {
    async fn is_entity_approved(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<bool, AppError> {
        // table name comes from a closed enum, never from input
        let query = format!(
            "SELECT status FROM {} WHERE id = $1",
            entity_type.table_name()
        );
        let status: Option<String> = sqlx::query_scalar(&query)
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(status.as_deref() == Some("approved"))
    }

    async fn insert_campaign(
        &self,
        campaign: NewCampaign,
        channels: Vec<ChannelQuote>,
    ) -> Result<CampaignWithChannels, AppError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns
                (created_by, company_id, entity_type, entity_id, campaign_name,
                 audience_filters, audience_available, total_cost, status, payment_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'draft', 'pending')
            RETURNING *
            "#,
        )
        .bind(campaign.created_by)
        .bind(campaign.company_id)
        .bind(campaign.entity_type.as_str())
        .bind(campaign.entity_id)
        .bind(&campaign.campaign_name)
        .bind(Json(&campaign.audience_filters))
        .bind(campaign.audience_available)
        .bind(campaign.total_cost)
        .fetch_one(&mut *tx)
        .await?;

        let mut rows = Vec::with_capacity(channels.len());
        for channel in &channels {
            let row = sqlx::query_as::<_, CampaignChannel>(
                r#"
                INSERT INTO campaign_channels
                    (campaign_id, channel_type, quantity, unit_cost, total_cost, status)
                VALUES ($1, $2, $3, $4, $5, 'pending')
                RETURNING *
                "#,
            )
            .bind(inserted.id)
            .bind(channel.channel_type.as_str())
            .bind(channel.quantity)
            .bind(channel.unit_cost)
            .bind(channel.total_cost)
            .fetch_one(&mut *tx)
            .await?;
            rows.push(row);
        }

        // Dropping `tx` on any `?` above rolls back the campaign row too.
        tx.commit().await?;
        info!(
            "Inserted campaign {} with {} channels",
            inserted.id,
            rows.len()
        );

        Ok(CampaignWithChannels {
            campaign: inserted,
            channels: rows,
        })
    }

    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, AppError> {
        Ok(
            sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_channels(&self, campaign_id: Uuid) -> Result<Vec<CampaignChannel>, AppError> {
        Ok(sqlx::query_as::<_, CampaignChannel>(
            "SELECT * FROM campaign_channels WHERE campaign_id = $1 ORDER BY channel_type",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_by_creator(&self, user_id: Uuid) -> Result<Vec<Campaign>, AppError> {
        Ok(sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE created_by = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<Vec<Campaign>, AppError> {
        Ok(sqlx::query_as::<_, Campaign>(
            r#"
            SELECT * FROM campaigns
            WHERE entity_type = $1 AND entity_id = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(entity_type.as_str())
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_by_payment_status(
        &self,
        payment_status: PaymentStatus,
    ) -> Result<Vec<Campaign>, AppError> {
        Ok(sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE payment_status = $1 ORDER BY created_at DESC",
        )
        .bind(payment_status.as_str())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: &Transition,
    ) -> Result<Option<Campaign>, AppError> {
        let from_status: Vec<&str> = transition.from_status.iter().map(|s| s.as_str()).collect();
        let from_payment: Vec<&str> = transition
            .from_payment
            .iter()
            .map(|s| s.as_str())
            .collect();
        let stamp = transition.stamp.as_ref();

        Ok(sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
                status = $4,
                payment_status = COALESCE($5, payment_status),
                admin_validated_by = COALESCE($6, admin_validated_by),
                admin_validated_at = COALESCE($7, admin_validated_at),
                admin_notes = CASE WHEN $6 IS NULL THEN admin_notes ELSE $8 END,
                updated_at = $9
            WHERE id = $1 AND status = ANY($2) AND payment_status = ANY($3)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&from_status)
        .bind(&from_payment)
        .bind(transition.to_status.as_str())
        .bind(transition.to_payment.map(|p| p.as_str()))
        .bind(stamp.map(|s| s.admin_id))
        .bind(stamp.map(|s| s.at))
        .bind(stamp.and_then(|s| s.notes.clone()))
        .bind(transition.at)
        .fetch_optional(&self.pool)
        .await?)
    }
}
