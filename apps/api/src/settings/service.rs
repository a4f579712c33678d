//! Cached accessor over diffusion settings and channel pricing.
//!
//! Reads go through two [`TtlCache`]s (one per record set). Every write
//! invalidates the matching cache and appends an audit entry; audit
//! failures are logged and swallowed. Message templates are read straight
//! from the store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::errors::AppError;
use crate::models::campaign::{ChannelType, EntityType};
use crate::models::settings::{
    AuditLogEntry, ChannelPricing, DiffusionSettings, MessageTemplate, NewAuditEntry, NewTemplate,
    PricingPatch, SettingsPatch, TemplatePatch, TemplateType,
};
use crate::settings::cache::TtlCache;
use crate::settings::format::format_currency;
use crate::settings::store::{SettingsStore, SETTINGS_ROW_ID};

pub struct DiffusionConfig {
    store: Arc<dyn SettingsStore>,
    settings_cache: TtlCache<DiffusionSettings>,
    pricing_cache: TtlCache<Vec<ChannelPricing>>,
    fallback_payment_number: String,
    currency: String,
}

impl DiffusionConfig {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        fallback_payment_number: String,
        currency: String,
    ) -> Self {
        Self {
            store,
            settings_cache: TtlCache::new(ttl, clock.clone()),
            pricing_cache: TtlCache::new(ttl, clock),
            fallback_payment_number,
            currency,
        }
    }

    pub async fn get_settings(&self, force_refresh: bool) -> Result<DiffusionSettings, AppError> {
        if !force_refresh {
            if let Some(settings) = self.settings_cache.get() {
                return Ok(settings);
            }
        }

        let generation = self.settings_cache.generation();
        let settings = self.store.fetch_settings().await.map_err(|e| {
            warn!("Failed to fetch diffusion settings: {e}");
            e
        })?;
        if !self.settings_cache.put_if_current(generation, settings.clone()) {
            debug!("Settings changed during fetch; not caching");
        }
        Ok(settings)
    }

    pub async fn get_channel_pricing(
        &self,
        force_refresh: bool,
    ) -> Result<Vec<ChannelPricing>, AppError> {
        if !force_refresh {
            if let Some(pricing) = self.pricing_cache.get() {
                return Ok(pricing);
            }
        }

        let generation = self.pricing_cache.generation();
        let pricing = self.store.fetch_channel_pricing().await.map_err(|e| {
            warn!("Failed to fetch channel pricing: {e}");
            e
        })?;
        debug!("Loaded pricing for {} channels", pricing.len());
        if !self.pricing_cache.put_if_current(generation, pricing.clone()) {
            debug!("Pricing changed during fetch; not caching");
        }
        Ok(pricing)
    }

    pub async fn active_channels(&self) -> Result<Vec<ChannelPricing>, AppError> {
        Ok(self
            .get_channel_pricing(false)
            .await?
            .into_iter()
            .filter(|c| c.enabled)
            .collect())
    }

    /// Unit cost per enabled channel.
    pub async fn channel_costs(
        &self,
        force_refresh: bool,
    ) -> Result<HashMap<ChannelType, i64>, AppError> {
        Ok(self
            .get_channel_pricing(force_refresh)
            .await?
            .into_iter()
            .filter(|c| c.enabled)
            .map(|c| (c.channel_type, c.unit_cost))
            .collect())
    }

    /// Orange Money number payments are sent to. Never fails: a missing
    /// settings row or blank number yields the configured fallback.
    pub async fn payment_number(&self) -> String {
        match self.get_settings(false).await {
            Ok(settings) => settings
                .orange_money_number
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| self.fallback_payment_number.clone()),
            Err(_) => self.fallback_payment_number.clone(),
        }
    }

    pub async fn is_module_enabled(&self, entity_type: EntityType) -> Result<bool, AppError> {
        let settings = self.get_settings(false).await?;
        if !settings.module_enabled {
            return Ok(false);
        }
        Ok(match entity_type {
            EntityType::Job => settings.jobs_enabled,
            EntityType::Training => settings.trainings_enabled,
            EntityType::Post => settings.posts_enabled,
        })
    }

    pub async fn update_settings(
        &self,
        patch: &SettingsPatch,
        actor: Uuid,
    ) -> Result<DiffusionSettings, AppError> {
        let old = self.settings_cache.get();
        let updated = self.store.update_settings(patch, actor).await?;
        self.settings_cache.invalidate();
        info!("Diffusion settings updated by {actor}");

        self.log_action(NewAuditEntry {
            action_type: "settings_updated",
            description: "Paramètres de diffusion mis à jour".to_string(),
            entity_type: Some("diffusion_settings"),
            entity_id: Some(SETTINGS_ROW_ID),
            old_value: old.and_then(|s| serde_json::to_value(s).ok()),
            new_value: serde_json::to_value(patch).ok(),
            performed_by: Some(actor),
        })
        .await;

        Ok(updated)
    }

    pub async fn update_channel_pricing(
        &self,
        channel: ChannelType,
        patch: &PricingPatch,
        actor: Uuid,
    ) -> Result<ChannelPricing, AppError> {
        if matches!(patch.unit_cost, Some(cost) if cost < 0) {
            return Err(AppError::Validation(
                "Le coût unitaire ne peut pas être négatif".to_string(),
            ));
        }

        let updated = self
            .store
            .update_channel_pricing(channel, patch, actor)
            .await?;
        self.pricing_cache.invalidate();
        info!("Pricing for {} updated by {actor}", channel.as_str());

        self.log_action(NewAuditEntry {
            action_type: "pricing_updated",
            description: format!("Tarification {} mise à jour", channel.as_str()),
            entity_type: Some("channel_pricing"),
            entity_id: None,
            old_value: None,
            new_value: serde_json::to_value(patch).ok(),
            performed_by: Some(actor),
        })
        .await;

        Ok(updated)
    }

    pub async fn message_templates(
        &self,
        template_type: Option<TemplateType>,
        active_only: bool,
    ) -> Result<Vec<MessageTemplate>, AppError> {
        self.store.list_templates(template_type, active_only).await
    }

    pub async fn default_template(
        &self,
        template_type: TemplateType,
    ) -> Result<Option<MessageTemplate>, AppError> {
        self.store.default_template(template_type).await
    }

    pub async fn create_template(
        &self,
        template: &NewTemplate,
        actor: Uuid,
    ) -> Result<MessageTemplate, AppError> {
        if template.template_name.trim().is_empty() {
            return Err(AppError::Validation(
                "Le nom du modèle est obligatoire".to_string(),
            ));
        }
        if template.body.trim().is_empty() {
            return Err(AppError::Validation(
                "Le contenu du modèle est obligatoire".to_string(),
            ));
        }

        let created = self.store.create_template(template, actor).await?;
        info!(
            "Template '{}' ({}) created by {actor}",
            created.template_name,
            created.template_type.as_str()
        );

        self.log_action(NewAuditEntry {
            action_type: "template_created",
            description: format!("Template {} créé", created.template_name),
            entity_type: Some("message_templates"),
            entity_id: Some(created.id),
            old_value: None,
            new_value: serde_json::to_value(template).ok(),
            performed_by: Some(actor),
        })
        .await;

        Ok(created)
    }

    pub async fn update_template(
        &self,
        id: Uuid,
        patch: &TemplatePatch,
        actor: Uuid,
    ) -> Result<MessageTemplate, AppError> {
        let blank = |v: &Option<String>| matches!(v, Some(v) if v.trim().is_empty());
        if blank(&patch.template_name) || blank(&patch.body) {
            return Err(AppError::Validation(
                "Le nom et le contenu du modèle ne peuvent pas être vides".to_string(),
            ));
        }

        let updated = self
            .store
            .update_template(id, patch, actor)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Modèle {id} introuvable")))?;
        info!("Template {id} updated by {actor}");

        self.log_action(NewAuditEntry {
            action_type: "template_updated",
            description: "Template mis à jour".to_string(),
            entity_type: Some("message_templates"),
            entity_id: Some(id),
            old_value: None,
            new_value: serde_json::to_value(patch).ok(),
            performed_by: Some(actor),
        })
        .await;

        Ok(updated)
    }

    pub async fn delete_template(&self, id: Uuid, actor: Uuid) -> Result<(), AppError> {
        let deleted = self
            .store
            .delete_template(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Modèle {id} introuvable")))?;
        info!("Template {id} deleted by {actor}");

        self.log_action(NewAuditEntry {
            action_type: "template_deleted",
            description: "Template supprimé".to_string(),
            entity_type: Some("message_templates"),
            entity_id: Some(id),
            old_value: serde_json::to_value(&deleted).ok(),
            new_value: None,
            performed_by: Some(actor),
        })
        .await;

        Ok(())
    }

    /// Appends an audit entry. Best-effort: failures are logged only.
    pub async fn log_action(&self, entry: NewAuditEntry) {
        let action = entry.action_type;
        if let Err(e) = self.store.log_action(entry).await {
            warn!("Failed to write audit entry '{action}': {e}");
        }
    }

    pub async fn audit_logs(
        &self,
        action_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLogEntry>, AppError> {
        self.store
            .audit_logs(action_type, limit.clamp(1, 200), offset.max(0))
            .await
    }

    pub fn clear_cache(&self) {
        self.settings_cache.invalidate();
        self.pricing_cache.invalidate();
    }

    pub fn format_currency(&self, amount: i64) -> String {
        format_currency(amount, &self.currency)
    }
}
