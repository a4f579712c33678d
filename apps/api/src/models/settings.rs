use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::campaign::ChannelType;

/// Singleton row that drives the diffusion module.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DiffusionSettings {
    pub id: Uuid,
    pub module_enabled: bool,
    pub jobs_enabled: bool,
    pub trainings_enabled: bool,
    pub posts_enabled: bool,
    pub test_mode: bool,
    pub admin_info_message: Option<String>,
    pub min_profile_completion: i32,
    pub max_inactive_days: i32,
    pub allow_multi_channels: bool,
    pub max_recipients_per_campaign: i64,
    pub orange_money_number: Option<String>,
    pub orange_money_recipient_name: Option<String>,
    pub payment_instructions: Option<String>,
    pub require_payment_validation: bool,
    pub updated_at: DateTime<Utc>,
}

/// Partial update of [`DiffusionSettings`]. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub module_enabled: Option<bool>,
    pub jobs_enabled: Option<bool>,
    pub trainings_enabled: Option<bool>,
    pub posts_enabled: Option<bool>,
    pub test_mode: Option<bool>,
    pub admin_info_message: Option<String>,
    pub min_profile_completion: Option<i32>,
    pub max_inactive_days: Option<i32>,
    pub allow_multi_channels: Option<bool>,
    pub max_recipients_per_campaign: Option<i64>,
    pub orange_money_number: Option<String>,
    pub orange_money_recipient_name: Option<String>,
    pub payment_instructions: Option<String>,
    pub require_payment_validation: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChannelPricing {
    pub id: Uuid,
    pub channel_type: ChannelType,
    pub enabled: bool,
    pub unit_cost: i64,
    pub currency: String,
    pub min_quantity: i64,
    /// Zero means no upper bound.
    pub max_quantity: i64,
    pub display_name: String,
    pub description: Option<String>,
    pub display_order: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingPatch {
    pub enabled: Option<bool>,
    pub unit_cost: Option<i64>,
    pub min_quantity: Option<i64>,
    pub max_quantity: Option<i64>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub display_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub action_type: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub description: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub performed_by: Option<Uuid>,
}

/// Audit entry about to be written.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub action_type: &'static str,
    pub description: String,
    pub entity_type: Option<&'static str>,
    pub entity_id: Option<Uuid>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub performed_by: Option<Uuid>,
}

/// Channel a message template is written for. `admin_whatsapp` is the
/// notice sent to the admin line when a payment proof arrives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    Email,
    Sms,
    Whatsapp,
    AdminWhatsapp,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::Email => "email",
            TemplateType::Sms => "sms",
            TemplateType::Whatsapp => "whatsapp",
            TemplateType::AdminWhatsapp => "admin_whatsapp",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MessageTemplate {
    pub id: Uuid,
    pub template_type: TemplateType,
    pub template_name: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub body: String,
    /// Placeholders such as `{{job_title}}` the body may use.
    pub available_variables: Vec<String>,
    pub is_active: bool,
    /// At most one default per template type.
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTemplate {
    pub template_type: TemplateType,
    pub template_name: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub body: String,
    #[serde(default)]
    pub available_variables: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: bool,
}

fn default_true() -> bool {
    true
}

/// Partial update of a [`MessageTemplate`]. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplatePatch {
    pub template_name: Option<String>,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub available_variables: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub is_default: Option<bool>,
}
