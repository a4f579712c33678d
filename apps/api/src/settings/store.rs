//! Persistence seam for diffusion settings, channel pricing, message
//! templates and the audit log.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::campaign::ChannelType;
use crate::models::settings::{
    AuditLogEntry, ChannelPricing, DiffusionSettings, MessageTemplate, NewAuditEntry, NewTemplate,
    PricingPatch, SettingsPatch, TemplatePatch, TemplateType,
};

/// Fixed id of the singleton settings row.
pub const SETTINGS_ROW_ID: Uuid = Uuid::from_u128(1);

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn fetch_settings(&self) -> Result<DiffusionSettings, AppError>;

    async fn update_settings(
        &self,
        patch: &SettingsPatch,
        actor: Uuid,
    ) -> Result<DiffusionSettings, AppError>;

    /// All channels ordered by `display_order`, enabled or not.
    async fn fetch_channel_pricing(&self) -> Result<Vec<ChannelPricing>, AppError>;

    async fn update_channel_pricing(
        &self,
        channel: ChannelType,
        patch: &PricingPatch,
        actor: Uuid,
    ) -> Result<ChannelPricing, AppError>;

    /// Ordered by name.
    async fn list_templates(
        &self,
        template_type: Option<TemplateType>,
        active_only: bool,
    ) -> Result<Vec<MessageTemplate>, AppError>;

    /// The active default template of a type, if any.
    async fn default_template(
        &self,
        template_type: TemplateType,
    ) -> Result<Option<MessageTemplate>, AppError>;

    /// Inserting a default clears the previous default of the same type.
    async fn create_template(
        &self,
        template: &NewTemplate,
        actor: Uuid,
    ) -> Result<MessageTemplate, AppError>;

    /// `None` when no template has this id. Promoting a template to default
    /// clears the previous default of its type.
    async fn update_template(
        &self,
        id: Uuid,
        patch: &TemplatePatch,
        actor: Uuid,
    ) -> Result<Option<MessageTemplate>, AppError>;

    /// Returns the deleted row, `None` when no template has this id.
    async fn delete_template(&self, id: Uuid) -> Result<Option<MessageTemplate>, AppError>;

    async fn log_action(&self, entry: NewAuditEntry) -> Result<(), AppError>;

    async fn audit_logs(
        &self,
        action_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLogEntry>, AppError>;
}

pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn fetch_settings(&self) -> Result<DiffusionSettings, AppError> {
        sqlx::query_as::<_, DiffusionSettings>("SELECT * FROM diffusion_settings WHERE id = $1")
            .bind(SETTINGS_ROW_ID)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Paramètres de diffusion introuvables".to_string()))
    }

    async fn update_settings(
        &self,
        patch: &SettingsPatch,
        actor: Uuid,
    ) -> Result<DiffusionSettings, AppError> {
        sqlx::query_as::<_, DiffusionSettings>(
            r#"
            UPDATE diffusion_settings SET
                module_enabled = COALESCE($2, module_enabled),
                jobs_enabled = COALESCE($3, jobs_enabled),
                trainings_enabled = COALESCE($4, trainings_enabled),
                posts_enabled = COALESCE($5, posts_enabled),
                test_mode = COALESCE($6, test_mode),
                admin_info_message = COALESCE($7, admin_info_message),
                min_profile_completion = COALESCE($8, min_profile_completion),
                max_inactive_days = COALESCE($9, max_inactive_days),
                allow_multi_channels = COALESCE($10, allow_multi_channels),
                max_recipients_per_campaign = COALESCE($11, max_recipients_per_campaign),
                orange_money_number = COALESCE($12, orange_money_number),
                orange_money_recipient_name = COALESCE($13, orange_money_recipient_name),
                payment_instructions = COALESCE($14, payment_instructions),
                require_payment_validation = COALESCE($15, require_payment_validation),
                last_updated_by = $16,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(SETTINGS_ROW_ID)
        .bind(patch.module_enabled)
        .bind(patch.jobs_enabled)
        .bind(patch.trainings_enabled)
        .bind(patch.posts_enabled)
        .bind(patch.test_mode)
        .bind(&patch.admin_info_message)
        .bind(patch.min_profile_completion)
        .bind(patch.max_inactive_days)
        .bind(patch.allow_multi_channels)
        .bind(patch.max_recipients_per_campaign)
        .bind(&patch.orange_money_number)
        .bind(&patch.orange_money_recipient_name)
        .bind(&patch.payment_instructions)
        .bind(patch.require_payment_validation)
        .bind(actor)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Paramètres de diffusion introuvables".to_string()))
    }

    async fn fetch_channel_pricing(&self) -> Result<Vec<ChannelPricing>, AppError> {
        Ok(sqlx::query_as::<_, ChannelPricing>(
            "SELECT * FROM channel_pricing ORDER BY display_order",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_channel_pricing(
        &self,
        channel: ChannelType,
        patch: &PricingPatch,
        actor: Uuid,
    ) -> Result<ChannelPricing, AppError> {
        sqlx::query_as::<_, ChannelPricing>(
            r#"
            UPDATE channel_pricing SET
                enabled = COALESCE($2, enabled),
                unit_cost = COALESCE($3, unit_cost),
                min_quantity = COALESCE($4, min_quantity),
                max_quantity = COALESCE($5, max_quantity),
                display_name = COALESCE($6, display_name),
                description = COALESCE($7, description),
                display_order = COALESCE($8, display_order),
                last_updated_by = $9,
                updated_at = NOW()
            WHERE channel_type = $1
            RETURNING *
            "#,
        )
        .bind(channel.as_str())
        .bind(patch.enabled)
        .bind(patch.unit_cost)
        .bind(patch.min_quantity)
        .bind(patch.max_quantity)
        .bind(&patch.display_name)
        .bind(&patch.description)
        .bind(patch.display_order)
        .bind(actor)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Canal {} introuvable", channel.as_str())))
    }

    async fn list_templates(
        &self,
        template_type: Option<TemplateType>,
        active_only: bool,
    ) -> Result<Vec<MessageTemplate>, AppError> {
        Ok(sqlx::query_as::<_, MessageTemplate>(
            r#"
            SELECT * FROM message_templates
            WHERE ($1::text IS NULL OR template_type = $1)
              AND (NOT $2 OR is_active)
            ORDER BY template_name
            "#,
        )
        .bind(template_type.map(|t| t.as_str()))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn default_template(
        &self,
        template_type: TemplateType,
    ) -> Result<Option<MessageTemplate>, AppError> {
        Ok(sqlx::query_as::<_, MessageTemplate>(
            r#"
            SELECT * FROM message_templates
            WHERE template_type = $1 AND is_default AND is_active
            LIMIT 1
            "#,
        )
        .bind(template_type.as_str())
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_template(
        &self,
        template: &NewTemplate,
        actor: Uuid,
    ) -> Result<MessageTemplate, AppError> {
        let mut tx = self.pool.begin().await?;

        if template.is_default {
            sqlx::query(
                r#"
                UPDATE message_templates SET is_default = false
                WHERE template_type = $1 AND is_default
                "#,
            )
            .bind(template.template_type.as_str())
            .execute(&mut *tx)
            .await?;
        }

        let created = sqlx::query_as::<_, MessageTemplate>(
            r#"
            INSERT INTO message_templates
                (template_type, template_name, description, subject, body,
                 available_variables, is_active, is_default, created_by, last_updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *
            "#,
        )
        .bind(template.template_type.as_str())
        .bind(&template.template_name)
        .bind(&template.description)
        .bind(&template.subject)
        .bind(&template.body)
        .bind(&template.available_variables)
        .bind(template.is_active)
        .bind(template.is_default)
        .bind(actor)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn update_template(
        &self,
        id: Uuid,
        patch: &TemplatePatch,
        actor: Uuid,
    ) -> Result<Option<MessageTemplate>, AppError> {
        let mut tx = self.pool.begin().await?;

        if patch.is_default == Some(true) {
            sqlx::query(
                r#"
                UPDATE message_templates SET is_default = false
                WHERE is_default AND id <> $1
                  AND template_type = (SELECT template_type FROM message_templates WHERE id = $1)
                "#,
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        let updated = sqlx::query_as::<_, MessageTemplate>(
            r#"
            UPDATE message_templates SET
                template_name = COALESCE($2, template_name),
                description = COALESCE($3, description),
                subject = COALESCE($4, subject),
                body = COALESCE($5, body),
                available_variables = COALESCE($6, available_variables),
                is_active = COALESCE($7, is_active),
                is_default = COALESCE($8, is_default),
                last_updated_by = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&patch.template_name)
        .bind(&patch.description)
        .bind(&patch.subject)
        .bind(&patch.body)
        .bind(&patch.available_variables)
        .bind(patch.is_active)
        .bind(patch.is_default)
        .bind(actor)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_template(&self, id: Uuid) -> Result<Option<MessageTemplate>, AppError> {
        Ok(sqlx::query_as::<_, MessageTemplate>(
            "DELETE FROM message_templates WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn log_action(&self, entry: NewAuditEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO diffusion_audit_log
                (action_type, entity_type, entity_id, description, old_value, new_value, performed_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.action_type)
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.description)
        .bind(&entry.old_value)
        .bind(&entry.new_value)
        .bind(entry.performed_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn audit_logs(
        &self,
        action_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLogEntry>, AppError> {
        Ok(sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT * FROM diffusion_audit_log
            WHERE ($1::text IS NULL OR action_type = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(action_type)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?)
    }
}
