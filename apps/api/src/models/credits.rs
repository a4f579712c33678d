use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Credit balance held on a profile.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditAccount {
    pub user_id: Uuid,
    pub balance: i64,
    /// Premium accounts are never blocked by an insufficient balance.
    pub is_premium: bool,
}

/// Priced AI-backed service as configured by admins.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceCost {
    pub service_code: String,
    pub service_name: String,
    pub credits_cost: i64,
    pub is_active: bool,
    pub category: String,
    pub promotion_active: bool,
    pub discount_percent: i32,
}

impl ServiceCost {
    /// Cost after an active promotion, rounded to the nearest credit.
    pub fn effective_cost(&self) -> i64 {
        if self.promotion_active && self.discount_percent > 0 {
            let discount = i64::from(self.discount_percent.min(100));
            // round half up in integer arithmetic
            (self.credits_cost * (100 - discount) + 50) / 100
        } else {
            self.credits_cost
        }
    }
}

/// Answer of the store's atomic debit procedure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebitOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub credits_consumed: Option<i64>,
    #[serde(default)]
    pub credits_remaining: Option<i64>,
    #[serde(default)]
    pub required_credits: Option<i64>,
    #[serde(default)]
    pub available_credits: Option<i64>,
    #[serde(default)]
    pub usage_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service_code: String,
    pub credits_consumed: i64,
    pub input_payload: Option<Value>,
    pub output_response: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// New priced service registered by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewService {
    pub service_code: String,
    pub service_name: String,
    pub credits_cost: i64,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub promotion_active: bool,
    #[serde(default)]
    pub discount_percent: i32,
}

fn default_category() -> String {
    "ia".to_string()
}

fn default_true() -> bool {
    true
}

/// Partial update of a [`ServiceCost`]. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceCostPatch {
    pub service_name: Option<String>,
    pub credits_cost: Option<i64>,
    pub is_active: Option<bool>,
    pub promotion_active: Option<bool>,
    pub discount_percent: Option<i32>,
}

impl ServiceCostPatch {
    pub fn is_empty(&self) -> bool {
        self.service_name.is_none()
            && self.credits_cost.is_none()
            && self.is_active.is_none()
            && self.promotion_active.is_none()
            && self.discount_percent.is_none()
    }

    pub fn apply(&self, cost: &mut ServiceCost) {
        if let Some(name) = &self.service_name {
            cost.service_name = name.clone();
        }
        if let Some(v) = self.credits_cost {
            cost.credits_cost = v;
        }
        if let Some(v) = self.is_active {
            cost.is_active = v;
        }
        if let Some(v) = self.promotion_active {
            cost.promotion_active = v;
        }
        if let Some(v) = self.discount_percent {
            cost.discount_percent = v;
        }
    }
}

/// Usage totals for one service, all users included.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceStatistics {
    pub service_code: String,
    pub service_name: String,
    pub total_usage_count: i64,
    pub total_credits_consumed: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub unique_users_count: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CostChangeType {
    Created,
    Updated,
    Deleted,
}

impl CostChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostChangeType::Created => "created",
            CostChangeType::Updated => "updated",
            CostChangeType::Deleted => "deleted",
        }
    }
}

/// One row of the price change log. `old_*` is empty for a creation and
/// `new_*` for a deletion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceCostHistory {
    pub id: Uuid,
    pub service_code: String,
    pub old_credits_cost: Option<i64>,
    pub new_credits_cost: Option<i64>,
    pub old_is_active: Option<bool>,
    pub new_is_active: Option<bool>,
    pub old_promotion_active: Option<bool>,
    pub new_promotion_active: Option<bool>,
    pub old_discount_percent: Option<i32>,
    pub new_discount_percent: Option<i32>,
    pub change_type: CostChangeType,
    pub change_reason: Option<String>,
    pub changed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ServiceCostHistory {
    pub fn between(
        service_code: &str,
        old: Option<&ServiceCost>,
        new: Option<&ServiceCost>,
        change_type: CostChangeType,
        change_reason: Option<&str>,
        changed_by: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_code: service_code.to_string(),
            old_credits_cost: old.map(|c| c.credits_cost),
            new_credits_cost: new.map(|c| c.credits_cost),
            old_is_active: old.map(|c| c.is_active),
            new_is_active: new.map(|c| c.is_active),
            old_promotion_active: old.map(|c| c.promotion_active),
            new_promotion_active: new.map(|c| c.promotion_active),
            old_discount_percent: old.map(|c| c.discount_percent),
            new_discount_percent: new.map(|c| c.discount_percent),
            change_type,
            change_reason: change_reason.map(str::to_string),
            changed_by,
            created_at,
        }
    }
}
