//! Persistence seam for credit balances, service prices and usage history.
//!
//! The debit itself is the store procedure `use_ai_credits`, which checks
//! the balance, debits and records the usage row in one transaction.
//! Admin price changes write a `service_cost_history` row in the same
//! transaction as the change.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::credits::{
    CostChangeType, CreditAccount, DebitOutcome, NewService, ServiceCost, ServiceCostHistory,
    ServiceCostPatch, ServiceStatistics, UsageRecord,
};

#[async_trait]
pub trait CreditLedger: Send + Sync {
    async fn account(&self, user_id: Uuid) -> Result<CreditAccount, AppError>;

    /// Active configuration for `service_code`, or `None` when the service
    /// is unknown or deactivated.
    async fn service_cost(&self, service_code: &str) -> Result<Option<ServiceCost>, AppError>;

    /// Atomic debit. A `success: false` answer is a business rejection,
    /// not an error.
    async fn use_credits(
        &self,
        user_id: Uuid,
        service_code: &str,
        cost: i64,
        input: &Value,
        output: Option<&Value>,
    ) -> Result<DebitOutcome, AppError>;

    /// Attaches the service output to a usage row written by `use_credits`.
    async fn log_usage(&self, usage_id: Uuid, output: &Value) -> Result<(), AppError>;

    /// Active services ordered by category then name.
    async fn list_services(&self) -> Result<Vec<ServiceCost>, AppError>;

    /// Newest first.
    async fn usage_history(&self, user_id: Uuid, limit: i64)
        -> Result<Vec<UsageRecord>, AppError>;

    /// Applies `patch` to a service, active or not. `None` when the code is
    /// unknown.
    async fn update_service_cost(
        &self,
        service_code: &str,
        patch: &ServiceCostPatch,
        reason: Option<&str>,
        actor: Uuid,
    ) -> Result<Option<ServiceCost>, AppError>;

    /// Fails with `Conflict` when the code is already taken.
    async fn add_service(&self, service: &NewService, actor: Uuid)
        -> Result<ServiceCost, AppError>;

    async fn delete_service(
        &self,
        service_code: &str,
        reason: Option<&str>,
        actor: Uuid,
    ) -> Result<Option<ServiceCost>, AppError>;

    /// One row per configured service, heaviest consumers first.
    async fn service_statistics(&self) -> Result<Vec<ServiceStatistics>, AppError>;

    /// Newest first, optionally for a single service.
    async fn cost_history(
        &self,
        service_code: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ServiceCostHistory>, AppError>;
}

const SERVICE_COLUMNS: &str = "service_code, service_name, credits_cost, is_active, category, \
                               promotion_active, discount_percent";

pub struct PgCreditLedger {
    pool: PgPool,
}

impl PgCreditLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn record_cost_change(
    conn: &mut PgConnection,
    entry: &ServiceCostHistory,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO service_cost_history
            (id, service_code, old_credits_cost, new_credits_cost, old_is_active, new_is_active,
             old_promotion_active, new_promotion_active, old_discount_percent,
             new_discount_percent, change_type, change_reason, changed_by, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(entry.id)
    .bind(&entry.service_code)
    .bind(entry.old_credits_cost)
    .bind(entry.new_credits_cost)
    .bind(entry.old_is_active)
    .bind(entry.new_is_active)
    .bind(entry.old_promotion_active)
    .bind(entry.new_promotion_active)
    .bind(entry.old_discount_percent)
    .bind(entry.new_discount_percent)
    .bind(entry.change_type.as_str())
    .bind(&entry.change_reason)
    .bind(entry.changed_by)
    .bind(entry.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl CreditLedger for PgCreditLedger {
    async fn account(&self, user_id: Uuid) -> Result<CreditAccount, AppError> {
        sqlx::query_as::<_, CreditAccount>(
            r#"
            SELECT id AS user_id, credits_balance AS balance, is_premium
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profil {user_id} introuvable")))
    }

    async fn service_cost(&self, service_code: &str) -> Result<Option<ServiceCost>, AppError> {
        Ok(sqlx::query_as::<_, ServiceCost>(
            r#"
            SELECT service_code, service_name, credits_cost, is_active, category,
                   promotion_active, discount_percent
            FROM service_credit_costs
            WHERE service_code = $1 AND is_active = true
            "#,
        )
        .bind(service_code)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn use_credits(
        &self,
        user_id: Uuid,
        service_code: &str,
        cost: i64,
        input: &Value,
        output: Option<&Value>,
    ) -> Result<DebitOutcome, AppError> {
        let answer: Json<DebitOutcome> =
            sqlx::query_scalar("SELECT use_ai_credits($1, $2, $3, $4, $5)")
                .bind(user_id)
                .bind(service_code)
                .bind(cost)
                .bind(Json(input))
                .bind(output.map(Json))
                .fetch_one(&self.pool)
                .await?;
        debug!(
            "use_ai_credits({user_id}, {service_code}, {cost}) -> success={}",
            answer.0.success
        );
        Ok(answer.0)
    }

    async fn log_usage(&self, usage_id: Uuid, output: &Value) -> Result<(), AppError> {
        sqlx::query("UPDATE ai_service_usage_history SET output_response = $2 WHERE id = $1")
            .bind(usage_id)
            .bind(Json(output))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_services(&self) -> Result<Vec<ServiceCost>, AppError> {
        Ok(sqlx::query_as::<_, ServiceCost>(
            r#"
            SELECT service_code, service_name, credits_cost, is_active, category,
                   promotion_active, discount_percent
            FROM service_credit_costs
            WHERE is_active = true
            ORDER BY category, service_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn usage_history(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<UsageRecord>, AppError> {
        Ok(sqlx::query_as::<_, UsageRecord>(
            r#"
            SELECT id, user_id, service_code, credits_consumed,
                   input_payload, output_response, created_at
            FROM ai_service_usage_history
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_service_cost(
        &self,
        service_code: &str,
        patch: &ServiceCostPatch,
        reason: Option<&str>,
        actor: Uuid,
    ) -> Result<Option<ServiceCost>, AppError> {
        let mut tx = self.pool.begin().await?;

        let old = sqlx::query_as::<_, ServiceCost>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM service_credit_costs WHERE service_code = $1 FOR UPDATE"
        ))
        .bind(service_code)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(old) = old else {
            return Ok(None);
        };

        let updated = sqlx::query_as::<_, ServiceCost>(&format!(
            r#"
            UPDATE service_credit_costs SET
                service_name = COALESCE($2, service_name),
                credits_cost = COALESCE($3, credits_cost),
                is_active = COALESCE($4, is_active),
                promotion_active = COALESCE($5, promotion_active),
                discount_percent = COALESCE($6, discount_percent)
            WHERE service_code = $1
            RETURNING {SERVICE_COLUMNS}
            "#
        ))
        .bind(service_code)
        .bind(&patch.service_name)
        .bind(patch.credits_cost)
        .bind(patch.is_active)
        .bind(patch.promotion_active)
        .bind(patch.discount_percent)
        .fetch_one(&mut *tx)
        .await?;

        let entry = ServiceCostHistory::between(
            service_code,
            Some(&old),
            Some(&updated),
            CostChangeType::Updated,
            reason,
            Some(actor),
            Utc::now(),
        );
        record_cost_change(&mut *tx, &entry).await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn add_service(
        &self,
        service: &NewService,
        actor: Uuid,
    ) -> Result<ServiceCost, AppError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, ServiceCost>(&format!(
            r#"
            INSERT INTO service_credit_costs ({SERVICE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (service_code) DO NOTHING
            RETURNING {SERVICE_COLUMNS}
            "#
        ))
        .bind(&service.service_code)
        .bind(&service.service_name)
        .bind(service.credits_cost)
        .bind(service.is_active)
        .bind(&service.category)
        .bind(service.promotion_active)
        .bind(service.discount_percent)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::Conflict(format!("Le service {} existe déjà", service.service_code))
        })?;

        let entry = ServiceCostHistory::between(
            &created.service_code,
            None,
            Some(&created),
            CostChangeType::Created,
            None,
            Some(actor),
            Utc::now(),
        );
        record_cost_change(&mut *tx, &entry).await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn delete_service(
        &self,
        service_code: &str,
        reason: Option<&str>,
        actor: Uuid,
    ) -> Result<Option<ServiceCost>, AppError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query_as::<_, ServiceCost>(&format!(
            "DELETE FROM service_credit_costs WHERE service_code = $1 RETURNING {SERVICE_COLUMNS}"
        ))
        .bind(service_code)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(deleted) = deleted else {
            return Ok(None);
        };

        let entry = ServiceCostHistory::between(
            service_code,
            Some(&deleted),
            None,
            CostChangeType::Deleted,
            reason,
            Some(actor),
            Utc::now(),
        );
        record_cost_change(&mut *tx, &entry).await?;

        tx.commit().await?;
        Ok(Some(deleted))
    }

    async fn service_statistics(&self) -> Result<Vec<ServiceStatistics>, AppError> {
        Ok(sqlx::query_as::<_, ServiceStatistics>(
            r#"
            SELECT s.service_code,
                   s.service_name,
                   count(u.id) AS total_usage_count,
                   COALESCE(sum(u.credits_consumed), 0)::BIGINT AS total_credits_consumed,
                   max(u.created_at) AS last_used_at,
                   count(DISTINCT u.user_id) AS unique_users_count
            FROM service_credit_costs s
            LEFT JOIN ai_service_usage_history u ON u.service_code = s.service_code
            GROUP BY s.service_code, s.service_name
            ORDER BY total_credits_consumed DESC, s.service_code
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn cost_history(
        &self,
        service_code: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ServiceCostHistory>, AppError> {
        Ok(sqlx::query_as::<_, ServiceCostHistory>(
            r#"
            SELECT *
            FROM service_cost_history
            WHERE ($1::TEXT IS NULL OR service_code = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(service_code)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}
