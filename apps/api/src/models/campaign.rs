use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Kind of approved entity a campaign promotes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Job,
    Training,
    Post,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Job => "job",
            EntityType::Training => "training",
            EntityType::Post => "post",
        }
    }

    /// Table that owns the entity and its moderation `status` column.
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityType::Job => "jobs",
            EntityType::Training => "formations",
            EntityType::Post => "blog_posts",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Email,
    Sms,
    Whatsapp,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Email => "email",
            ChannelType::Sms => "sms",
            ChannelType::Whatsapp => "whatsapp",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    PendingPayment,
    PaymentApproved,
    InProgress,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::PendingPayment => "pending_payment",
            CampaignStatus::PaymentApproved => "payment_approved",
            CampaignStatus::InProgress => "in_progress",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    WaitingProof,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::WaitingProof => "waiting_proof",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

/// Delivery state of one channel, driven by the external sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Audience targeting criteria. Substring filters are optional; the two
/// activity thresholds default to 30 days and 80 % profile completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AudienceFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_experience: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_experience: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_within_days: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_completion: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Campaign {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub company_id: Option<Uuid>,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub campaign_name: String,
    pub audience_filters: Json<AudienceFilters>,
    /// Audience count at creation time; not refreshed afterwards.
    pub audience_available: i64,
    pub total_cost: i64,
    pub status: CampaignStatus,
    pub payment_status: PaymentStatus,
    pub admin_validated_by: Option<Uuid>,
    pub admin_validated_at: Option<DateTime<Utc>>,
    pub admin_notes: Option<String>,
    pub total_sent: i64,
    pub total_clicks: i64,
    pub launched_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CampaignChannel {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub channel_type: ChannelType,
    pub quantity: i64,
    /// Price per message captured when the campaign was created.
    pub unit_cost: i64,
    pub total_cost: i64,
    pub status: ChannelStatus,
    pub sent_count: i64,
    pub delivered_count: i64,
    pub failed_count: i64,
    pub click_count: i64,
}

/// A campaign together with the channels it owns.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignWithChannels {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub channels: Vec<CampaignChannel>,
}
