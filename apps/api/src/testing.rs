//! In-memory stand-ins for every store seam, plus test constructors.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use sqlx::types::Json;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::ai_engine::mock::MockAiEngine;
use crate::clock::{Clock, SystemClock};
use crate::credits::ledger::CreditLedger;
use crate::diffusion::audience::AudienceEstimator;
use crate::diffusion::pricing::ChannelQuote;
use crate::diffusion::store::{CampaignStore, NewCampaign, Transition};
use crate::errors::AppError;
use crate::models::campaign::{
    AudienceFilters, Campaign, CampaignChannel, CampaignStatus, CampaignWithChannels,
    ChannelStatus, ChannelType, EntityType, PaymentStatus,
};
use crate::models::credits::{
    CostChangeType, CreditAccount, DebitOutcome, NewService, ServiceCost, ServiceCostHistory,
    ServiceCostPatch, ServiceStatistics, UsageRecord,
};
use crate::models::settings::{
    AuditLogEntry, ChannelPricing, DiffusionSettings, MessageTemplate, NewAuditEntry, NewTemplate,
    PricingPatch, SettingsPatch, TemplatePatch, TemplateType,
};
use crate::settings::service::DiffusionConfig;
use crate::settings::store::{SettingsStore, SETTINGS_ROW_ID};
use crate::state::AppState;

pub const FALLBACK_PAYMENT_NUMBER: &str = "+224 622 00 00 00";

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap()
}

// ────────────────────────────────────────────────────────────────────────────
// Settings
// ────────────────────────────────────────────────────────────────────────────

/// email 500, sms 1000, whatsapp 1500; all enabled, no upper bound.
pub fn make_pricing() -> Vec<ChannelPricing> {
    [
        (ChannelType::Email, 500, "Email"),
        (ChannelType::Sms, 1000, "SMS"),
        (ChannelType::Whatsapp, 1500, "WhatsApp"),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (channel_type, unit_cost, name))| ChannelPricing {
        id: Uuid::new_v4(),
        channel_type,
        enabled: true,
        unit_cost,
        currency: "GNF".to_string(),
        min_quantity: 1,
        max_quantity: 0,
        display_name: name.to_string(),
        description: None,
        display_order: i as i32,
    })
    .collect()
}

pub fn make_settings() -> DiffusionSettings {
    DiffusionSettings {
        id: SETTINGS_ROW_ID,
        module_enabled: true,
        jobs_enabled: true,
        trainings_enabled: true,
        posts_enabled: true,
        test_mode: false,
        admin_info_message: None,
        min_profile_completion: 80,
        max_inactive_days: 30,
        allow_multi_channels: true,
        max_recipients_per_campaign: 0,
        orange_money_number: Some("+224 620 11 22 33".to_string()),
        orange_money_recipient_name: Some("JobGuinée".to_string()),
        payment_instructions: None,
        require_payment_validation: true,
        updated_at: Utc::now(),
    }
}

/// Holds a store fetch open until the test releases it.
#[derive(Default)]
pub struct FetchPause {
    pub started: Notify,
    pub release: Notify,
}

pub fn make_new_template(template_type: TemplateType, name: &str, is_default: bool) -> NewTemplate {
    NewTemplate {
        template_type,
        template_name: name.to_string(),
        description: None,
        subject: Some("Nouvelle offre : {{job_title}}".to_string()),
        body: "Bonjour {{candidate_name}}, découvrez {{job_title}} : {{link}}".to_string(),
        available_variables: vec![
            "candidate_name".to_string(),
            "job_title".to_string(),
            "link".to_string(),
        ],
        is_active: true,
        is_default,
    }
}

pub struct InMemorySettingsStore {
    settings: Mutex<DiffusionSettings>,
    settings_pause: Mutex<Option<Arc<FetchPause>>>,
    pricing: Mutex<Vec<ChannelPricing>>,
    templates: Mutex<Vec<MessageTemplate>>,
    audit: Mutex<Vec<NewAuditEntry>>,
    fail_audit: AtomicBool,
    settings_fetches: AtomicUsize,
    pricing_fetches: AtomicUsize,
}

impl Default for InMemorySettingsStore {
    fn default() -> Self {
        Self {
            settings: Mutex::new(make_settings()),
            settings_pause: Mutex::new(None),
            pricing: Mutex::new(make_pricing()),
            templates: Mutex::new(Vec::new()),
            audit: Mutex::new(Vec::new()),
            fail_audit: AtomicBool::new(false),
            settings_fetches: AtomicUsize::new(0),
            pricing_fetches: AtomicUsize::new(0),
        }
    }
}

impl InMemorySettingsStore {
    pub fn settings_fetches(&self) -> usize {
        self.settings_fetches.load(Ordering::SeqCst)
    }

    pub fn pricing_fetches(&self) -> usize {
        self.pricing_fetches.load(Ordering::SeqCst)
    }

    pub fn audit_entries(&self, action_type: &str) -> usize {
        lock(&self.audit)
            .iter()
            .filter(|e| e.action_type == action_type)
            .count()
    }

    pub fn patch_settings(&self, f: impl FnOnce(&mut DiffusionSettings)) {
        f(&mut lock(&self.settings));
    }

    pub fn set_channel_enabled(&self, channel: ChannelType, enabled: bool) {
        for p in lock(&self.pricing)
            .iter_mut()
            .filter(|p| p.channel_type == channel)
        {
            p.enabled = enabled;
        }
    }

    pub fn set_unit_cost(&self, channel: ChannelType, unit_cost: i64) {
        for p in lock(&self.pricing)
            .iter_mut()
            .filter(|p| p.channel_type == channel)
        {
            p.unit_cost = unit_cost;
        }
    }

    /// The next settings fetch reads its snapshot, then waits for
    /// `release` before answering.
    pub fn pause_next_settings_fetch(&self) -> Arc<FetchPause> {
        let pause = Arc::new(FetchPause::default());
        *lock(&self.settings_pause) = Some(pause.clone());
        pause
    }

    pub fn fail_audit_writes(&self) {
        self.fail_audit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn fetch_settings(&self) -> Result<DiffusionSettings, AppError> {
        self.settings_fetches.fetch_add(1, Ordering::SeqCst);
        let snapshot = lock(&self.settings).clone();
        let pause = lock(&self.settings_pause).take();
        if let Some(pause) = pause {
            pause.started.notify_one();
            pause.release.notified().await;
        }
        Ok(snapshot)
    }

    async fn update_settings(
        &self,
        patch: &SettingsPatch,
        _actor: Uuid,
    ) -> Result<DiffusionSettings, AppError> {
        let mut guard = lock(&self.settings);
        let s = &mut *guard;
        let p = patch.clone();
        s.module_enabled = p.module_enabled.unwrap_or(s.module_enabled);
        s.jobs_enabled = p.jobs_enabled.unwrap_or(s.jobs_enabled);
        s.trainings_enabled = p.trainings_enabled.unwrap_or(s.trainings_enabled);
        s.posts_enabled = p.posts_enabled.unwrap_or(s.posts_enabled);
        s.test_mode = p.test_mode.unwrap_or(s.test_mode);
        s.admin_info_message = p.admin_info_message.or(s.admin_info_message.take());
        s.min_profile_completion = p.min_profile_completion.unwrap_or(s.min_profile_completion);
        s.max_inactive_days = p.max_inactive_days.unwrap_or(s.max_inactive_days);
        s.allow_multi_channels = p.allow_multi_channels.unwrap_or(s.allow_multi_channels);
        s.max_recipients_per_campaign = p
            .max_recipients_per_campaign
            .unwrap_or(s.max_recipients_per_campaign);
        s.orange_money_number = p.orange_money_number.or(s.orange_money_number.take());
        s.orange_money_recipient_name = p
            .orange_money_recipient_name
            .or(s.orange_money_recipient_name.take());
        s.payment_instructions = p.payment_instructions.or(s.payment_instructions.take());
        s.require_payment_validation = p
            .require_payment_validation
            .unwrap_or(s.require_payment_validation);
        s.updated_at = Utc::now();
        Ok(s.clone())
    }

    async fn fetch_channel_pricing(&self) -> Result<Vec<ChannelPricing>, AppError> {
        self.pricing_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.pricing).clone())
    }

    async fn update_channel_pricing(
        &self,
        channel: ChannelType,
        patch: &PricingPatch,
        _actor: Uuid,
    ) -> Result<ChannelPricing, AppError> {
        let mut pricing = lock(&self.pricing);
        let row = pricing
            .iter_mut()
            .find(|p| p.channel_type == channel)
            .ok_or_else(|| AppError::NotFound(format!("Canal {} inconnu", channel.as_str())))?;
        let p = patch.clone();
        row.enabled = p.enabled.unwrap_or(row.enabled);
        row.unit_cost = p.unit_cost.unwrap_or(row.unit_cost);
        row.min_quantity = p.min_quantity.unwrap_or(row.min_quantity);
        row.max_quantity = p.max_quantity.unwrap_or(row.max_quantity);
        row.display_name = p.display_name.unwrap_or_else(|| row.display_name.clone());
        row.description = p.description.or(row.description.take());
        row.display_order = p.display_order.unwrap_or(row.display_order);
        Ok(row.clone())
    }

    async fn list_templates(
        &self,
        template_type: Option<TemplateType>,
        active_only: bool,
    ) -> Result<Vec<MessageTemplate>, AppError> {
        let mut templates: Vec<MessageTemplate> = lock(&self.templates)
            .iter()
            .filter(|t| template_type.map_or(true, |ty| t.template_type == ty))
            .filter(|t| !active_only || t.is_active)
            .cloned()
            .collect();
        templates.sort_by(|a, b| a.template_name.cmp(&b.template_name));
        Ok(templates)
    }

    async fn default_template(
        &self,
        template_type: TemplateType,
    ) -> Result<Option<MessageTemplate>, AppError> {
        Ok(lock(&self.templates)
            .iter()
            .find(|t| t.template_type == template_type && t.is_default && t.is_active)
            .cloned())
    }

    async fn create_template(
        &self,
        template: &NewTemplate,
        _actor: Uuid,
    ) -> Result<MessageTemplate, AppError> {
        let mut templates = lock(&self.templates);
        if template.is_default {
            for t in templates
                .iter_mut()
                .filter(|t| t.template_type == template.template_type)
            {
                t.is_default = false;
            }
        }
        let now = Utc::now();
        let created = MessageTemplate {
            id: Uuid::new_v4(),
            template_type: template.template_type,
            template_name: template.template_name.clone(),
            description: template.description.clone(),
            subject: template.subject.clone(),
            body: template.body.clone(),
            available_variables: template.available_variables.clone(),
            is_active: template.is_active,
            is_default: template.is_default,
            created_at: now,
            updated_at: now,
        };
        templates.push(created.clone());
        Ok(created)
    }

    async fn update_template(
        &self,
        id: Uuid,
        patch: &TemplatePatch,
        _actor: Uuid,
    ) -> Result<Option<MessageTemplate>, AppError> {
        let mut templates = lock(&self.templates);
        let Some(template_type) = templates
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.template_type)
        else {
            return Ok(None);
        };
        if patch.is_default == Some(true) {
            for t in templates
                .iter_mut()
                .filter(|t| t.template_type == template_type && t.id != id)
            {
                t.is_default = false;
            }
        }

        let Some(t) = templates.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        let p = patch.clone();
        t.template_name = p.template_name.unwrap_or_else(|| t.template_name.clone());
        t.description = p.description.or(t.description.take());
        t.subject = p.subject.or(t.subject.take());
        t.body = p.body.unwrap_or_else(|| t.body.clone());
        t.available_variables = p
            .available_variables
            .unwrap_or_else(|| t.available_variables.clone());
        t.is_active = p.is_active.unwrap_or(t.is_active);
        t.is_default = p.is_default.unwrap_or(t.is_default);
        t.updated_at = Utc::now();
        Ok(Some(t.clone()))
    }

    async fn delete_template(&self, id: Uuid) -> Result<Option<MessageTemplate>, AppError> {
        let mut templates = lock(&self.templates);
        Ok(templates
            .iter()
            .position(|t| t.id == id)
            .map(|i| templates.remove(i)))
    }

    async fn log_action(&self, entry: NewAuditEntry) -> Result<(), AppError> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(AppError::Internal(anyhow!("audit log unavailable")));
        }
        lock(&self.audit).push(entry);
        Ok(())
    }

    async fn audit_logs(
        &self,
        action_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLogEntry>, AppError> {
        Ok(lock(&self.audit)
            .iter()
            .rev()
            .filter(|e| action_type.map_or(true, |a| e.action_type == a))
            .skip(offset as usize)
            .take(limit as usize)
            .map(|e| AuditLogEntry {
                id: Uuid::new_v4(),
                created_at: Utc::now(),
                action_type: e.action_type.to_string(),
                entity_type: e.entity_type.map(str::to_string),
                entity_id: e.entity_id,
                description: e.description.clone(),
                old_value: e.old_value.clone(),
                new_value: e.new_value.clone(),
                performed_by: e.performed_by,
            })
            .collect())
    }
}

pub fn make_config(store: Arc<InMemorySettingsStore>, clock: Arc<dyn Clock>) -> DiffusionConfig {
    DiffusionConfig::new(
        store,
        clock,
        Duration::minutes(5),
        FALLBACK_PAYMENT_NUMBER.to_string(),
        "GNF".to_string(),
    )
}

pub fn make_config_default() -> (Arc<InMemorySettingsStore>, DiffusionConfig) {
    let store = Arc::new(InMemorySettingsStore::default());
    let config = make_config(store.clone(), Arc::new(SystemClock));
    (store, config)
}

// ────────────────────────────────────────────────────────────────────────────
// Audience
// ────────────────────────────────────────────────────────────────────────────

pub struct FixedAudience {
    count: AtomicI64,
    fail: bool,
    calls: AtomicUsize,
    last: Mutex<Option<AudienceFilters>>,
}

impl FixedAudience {
    pub fn new(count: i64) -> Self {
        Self {
            count: AtomicI64::new(count),
            fail: false,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(0)
        }
    }

    pub fn set(&self, count: i64) {
        self.count.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_filters(&self) -> Option<AudienceFilters> {
        lock(&self.last).clone()
    }
}

#[async_trait]
impl AudienceEstimator for FixedAudience {
    async fn count(&self, filters: &AudienceFilters) -> Result<i64, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last) = Some(filters.clone());
        if self.fail {
            return Err(AppError::Internal(anyhow!("audience function unavailable")));
        }
        Ok(self.count.load(Ordering::SeqCst))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Campaigns
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryCampaignStore {
    campaigns: Mutex<Vec<Campaign>>,
    channels: Mutex<Vec<CampaignChannel>>,
    approved: Mutex<HashSet<(EntityType, Uuid)>>,
}

impl InMemoryCampaignStore {
    /// Registers an approved entity and returns its id.
    pub fn approve_entity(&self, entity_type: EntityType) -> Uuid {
        let id = Uuid::new_v4();
        lock(&self.approved).insert((entity_type, id));
        id
    }

    /// Inserts a draft campaign with `(channel, quantity, unit_cost)` lines.
    pub fn seed_draft(&self, entity_type: EntityType, lines: &[(ChannelType, i64, i64)]) -> Uuid {
        let entity_id = self.approve_entity(entity_type);
        let quotes: Vec<ChannelQuote> = lines
            .iter()
            .map(|&(channel_type, quantity, unit_cost)| ChannelQuote {
                channel_type,
                quantity,
                unit_cost,
                total_cost: quantity * unit_cost,
            })
            .collect();
        let total: i64 = quotes.iter().map(|q| q.total_cost).sum();
        let created = self.insert(
            NewCampaign {
                created_by: Uuid::new_v4(),
                company_id: None,
                entity_type,
                entity_id,
                campaign_name: "Campagne test".to_string(),
                audience_filters: AudienceFilters::default(),
                audience_available: 100,
                total_cost: total,
            },
            quotes,
        );
        created.campaign.id
    }

    pub fn campaign_count(&self) -> usize {
        lock(&self.campaigns).len()
    }

    pub fn channel_count(&self) -> usize {
        lock(&self.channels).len()
    }

    /// Moves a campaign as the external launcher would.
    pub fn force_status(&self, id: Uuid, status: CampaignStatus, payment_status: PaymentStatus) {
        for c in lock(&self.campaigns).iter_mut().filter(|c| c.id == id) {
            c.status = status;
            c.payment_status = payment_status;
        }
    }

    /// Simulates the external sender updating delivery counters.
    pub fn record_delivery(
        &self,
        campaign_id: Uuid,
        channel: ChannelType,
        sent: i64,
        delivered: i64,
        clicks: i64,
    ) {
        for c in lock(&self.channels)
            .iter_mut()
            .filter(|c| c.campaign_id == campaign_id && c.channel_type == channel)
        {
            c.sent_count = sent;
            c.delivered_count = delivered;
            c.failed_count = sent - delivered;
            c.click_count = clicks;
        }
    }

    fn insert(&self, new: NewCampaign, quotes: Vec<ChannelQuote>) -> CampaignWithChannels {
        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            created_by: new.created_by,
            company_id: new.company_id,
            entity_type: new.entity_type,
            entity_id: new.entity_id,
            campaign_name: new.campaign_name,
            audience_filters: Json(new.audience_filters),
            audience_available: new.audience_available,
            total_cost: new.total_cost,
            status: CampaignStatus::Draft,
            payment_status: PaymentStatus::Pending,
            admin_validated_by: None,
            admin_validated_at: None,
            admin_notes: None,
            total_sent: 0,
            total_clicks: 0,
            launched_at: None,
            completed_at: None,
        };
        let channels: Vec<CampaignChannel> = quotes
            .into_iter()
            .map(|q| CampaignChannel {
                id: Uuid::new_v4(),
                campaign_id: campaign.id,
                channel_type: q.channel_type,
                quantity: q.quantity,
                unit_cost: q.unit_cost,
                total_cost: q.total_cost,
                status: ChannelStatus::Pending,
                sent_count: 0,
                delivered_count: 0,
                failed_count: 0,
                click_count: 0,
            })
            .collect();

        lock(&self.campaigns).push(campaign.clone());
        lock(&self.channels).extend(channels.iter().cloned());
        CampaignWithChannels { campaign, channels }
    }

    fn newest_first(&self, keep: impl Fn(&Campaign) -> bool) -> Vec<Campaign> {
        lock(&self.campaigns)
            .iter()
            .rev()
            .filter(|c| keep(c))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CampaignStore for InMemoryCampaignStore {
    async fn is_entity_approved(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<bool, AppError> {
        Ok(lock(&self.approved).contains(&(entity_type, entity_id)))
    }

    async fn insert_campaign(
        &self,
        campaign: NewCampaign,
        channels: Vec<ChannelQuote>,
    ) -> Result<CampaignWithChannels, AppError> {
        Ok(self.insert(campaign, channels))
    }

    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, AppError> {
        Ok(lock(&self.campaigns).iter().find(|c| c.id == id).cloned())
    }

    async fn get_channels(&self, campaign_id: Uuid) -> Result<Vec<CampaignChannel>, AppError> {
        Ok(lock(&self.channels)
            .iter()
            .filter(|c| c.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn list_by_creator(&self, user_id: Uuid) -> Result<Vec<Campaign>, AppError> {
        Ok(self.newest_first(|c| c.created_by == user_id))
    }

    async fn list_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<Vec<Campaign>, AppError> {
        Ok(self.newest_first(|c| c.entity_type == entity_type && c.entity_id == entity_id))
    }

    async fn list_by_payment_status(
        &self,
        payment_status: PaymentStatus,
    ) -> Result<Vec<Campaign>, AppError> {
        Ok(self.newest_first(|c| c.payment_status == payment_status))
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: &Transition,
    ) -> Result<Option<Campaign>, AppError> {
        let mut campaigns = lock(&self.campaigns);
        let Some(campaign) = campaigns
            .iter_mut()
            .find(|c| {
                c.id == id
                    && transition.from_status.contains(&c.status)
                    && transition.from_payment.contains(&c.payment_status)
            })
        else {
            return Ok(None);
        };

        campaign.status = transition.to_status;
        if let Some(payment_status) = transition.to_payment {
            campaign.payment_status = payment_status;
        }
        if let Some(stamp) = &transition.stamp {
            campaign.admin_validated_by = Some(stamp.admin_id);
            campaign.admin_validated_at = Some(stamp.at);
            campaign.admin_notes = stamp.notes.clone();
        }
        campaign.updated_at = transition.at;
        Ok(Some(campaign.clone()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Credits
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryLedger {
    accounts: Mutex<HashMap<Uuid, CreditAccount>>,
    costs: Mutex<HashMap<String, ServiceCost>>,
    usage: Mutex<Vec<UsageRecord>>,
    cost_history: Mutex<Vec<ServiceCostHistory>>,
    debit_calls: AtomicUsize,
    logged_outputs: AtomicUsize,
    refuse_debits: AtomicBool,
    fail_usage_logs: AtomicBool,
    fail_cost_lookups: AtomicBool,
    drop_before_debit: AtomicBool,
}

impl InMemoryLedger {
    /// Opens an account and returns its user id.
    pub fn with_account(&self, balance: i64, is_premium: bool) -> Uuid {
        let user_id = Uuid::new_v4();
        lock(&self.accounts).insert(
            user_id,
            CreditAccount {
                user_id,
                balance,
                is_premium,
            },
        );
        user_id
    }

    pub fn set_cost(&self, cost: ServiceCost) {
        lock(&self.costs).insert(cost.service_code.clone(), cost);
    }

    pub fn balance(&self, user_id: Uuid) -> i64 {
        lock(&self.accounts)
            .get(&user_id)
            .map(|a| a.balance)
            .unwrap_or_default()
    }

    pub fn debit_calls(&self) -> usize {
        self.debit_calls.load(Ordering::SeqCst)
    }

    pub fn logged_outputs(&self) -> usize {
        self.logged_outputs.load(Ordering::SeqCst)
    }

    /// Every debit answers `success: false`, as if the balance moved.
    pub fn refuse_debits(&self) {
        self.refuse_debits.store(true, Ordering::SeqCst);
    }

    pub fn fail_usage_logs(&self) {
        self.fail_usage_logs.store(true, Ordering::SeqCst);
    }

    pub fn fail_cost_lookups(&self) {
        self.fail_cost_lookups.store(true, Ordering::SeqCst);
    }

    /// The profile disappears between the balance check and the debit.
    pub fn drop_accounts_before_debit(&self) {
        self.drop_before_debit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CreditLedger for InMemoryLedger {
    async fn account(&self, user_id: Uuid) -> Result<CreditAccount, AppError> {
        lock(&self.accounts)
            .get(&user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Profil {user_id} introuvable")))
    }

    async fn service_cost(&self, service_code: &str) -> Result<Option<ServiceCost>, AppError> {
        if self.fail_cost_lookups.load(Ordering::SeqCst) {
            return Err(AppError::Internal(anyhow!("pricing table unavailable")));
        }
        Ok(lock(&self.costs)
            .get(service_code)
            .filter(|c| c.is_active)
            .cloned())
    }

    async fn use_credits(
        &self,
        user_id: Uuid,
        service_code: &str,
        cost: i64,
        input: &Value,
        output: Option<&Value>,
    ) -> Result<DebitOutcome, AppError> {
        self.debit_calls.fetch_add(1, Ordering::SeqCst);
        let mut accounts = lock(&self.accounts);
        if self.drop_before_debit.load(Ordering::SeqCst) {
            accounts.remove(&user_id);
        }
        let Some(account) = accounts.get_mut(&user_id) else {
            return Ok(DebitOutcome {
                success: false,
                error: Some("USER_NOT_FOUND".to_string()),
                ..Default::default()
            });
        };

        if self.refuse_debits.load(Ordering::SeqCst)
            || (!account.is_premium && account.balance < cost)
        {
            return Ok(DebitOutcome {
                success: false,
                error: Some("INSUFFICIENT_CREDITS".to_string()),
                message: Some("Crédits insuffisants".to_string()),
                required_credits: Some(cost),
                available_credits: Some(account.balance),
                ..Default::default()
            });
        }

        let consumed = if account.is_premium { 0 } else { cost };
        account.balance -= consumed;
        let usage_id = Uuid::new_v4();
        lock(&self.usage).push(UsageRecord {
            id: usage_id,
            user_id,
            service_code: service_code.to_string(),
            credits_consumed: consumed,
            input_payload: Some(input.clone()),
            output_response: output.cloned(),
            created_at: Utc::now(),
        });

        Ok(DebitOutcome {
            success: true,
            message: Some("Crédits consommés avec succès".to_string()),
            credits_consumed: Some(consumed),
            credits_remaining: Some(account.balance),
            usage_id: Some(usage_id),
            ..Default::default()
        })
    }

    async fn log_usage(&self, usage_id: Uuid, output: &Value) -> Result<(), AppError> {
        if self.fail_usage_logs.load(Ordering::SeqCst) {
            return Err(AppError::Internal(anyhow!("usage history unavailable")));
        }
        if let Some(record) = lock(&self.usage).iter_mut().find(|u| u.id == usage_id) {
            record.output_response = Some(output.clone());
            self.logged_outputs.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn list_services(&self) -> Result<Vec<ServiceCost>, AppError> {
        let mut services: Vec<ServiceCost> = lock(&self.costs)
            .values()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        services.sort_by(|a, b| {
            (&a.category, &a.service_name).cmp(&(&b.category, &b.service_name))
        });
        Ok(services)
    }

    async fn usage_history(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<UsageRecord>, AppError> {
        Ok(lock(&self.usage)
            .iter()
            .rev()
            .filter(|u| u.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn update_service_cost(
        &self,
        service_code: &str,
        patch: &ServiceCostPatch,
        reason: Option<&str>,
        actor: Uuid,
    ) -> Result<Option<ServiceCost>, AppError> {
        let mut costs = lock(&self.costs);
        let Some(cost) = costs.get_mut(service_code) else {
            return Ok(None);
        };
        let old = cost.clone();
        patch.apply(cost);
        lock(&self.cost_history).push(ServiceCostHistory::between(
            service_code,
            Some(&old),
            Some(&*cost),
            CostChangeType::Updated,
            reason,
            Some(actor),
            Utc::now(),
        ));
        Ok(Some(cost.clone()))
    }

    async fn add_service(
        &self,
        service: &NewService,
        actor: Uuid,
    ) -> Result<ServiceCost, AppError> {
        let mut costs = lock(&self.costs);
        if costs.contains_key(&service.service_code) {
            return Err(AppError::Conflict(format!(
                "Le service {} existe déjà",
                service.service_code
            )));
        }
        let created = ServiceCost {
            service_code: service.service_code.clone(),
            service_name: service.service_name.clone(),
            credits_cost: service.credits_cost,
            is_active: service.is_active,
            category: service.category.clone(),
            promotion_active: service.promotion_active,
            discount_percent: service.discount_percent,
        };
        costs.insert(created.service_code.clone(), created.clone());
        lock(&self.cost_history).push(ServiceCostHistory::between(
            &created.service_code,
            None,
            Some(&created),
            CostChangeType::Created,
            None,
            Some(actor),
            Utc::now(),
        ));
        Ok(created)
    }

    async fn delete_service(
        &self,
        service_code: &str,
        reason: Option<&str>,
        actor: Uuid,
    ) -> Result<Option<ServiceCost>, AppError> {
        let Some(deleted) = lock(&self.costs).remove(service_code) else {
            return Ok(None);
        };
        lock(&self.cost_history).push(ServiceCostHistory::between(
            service_code,
            Some(&deleted),
            None,
            CostChangeType::Deleted,
            reason,
            Some(actor),
            Utc::now(),
        ));
        Ok(Some(deleted))
    }

    async fn service_statistics(&self) -> Result<Vec<ServiceStatistics>, AppError> {
        let usage = lock(&self.usage);
        let mut stats: Vec<ServiceStatistics> = lock(&self.costs)
            .values()
            .map(|cost| {
                let rows: Vec<&UsageRecord> = usage
                    .iter()
                    .filter(|u| u.service_code == cost.service_code)
                    .collect();
                let users: HashSet<Uuid> = rows.iter().map(|u| u.user_id).collect();
                ServiceStatistics {
                    service_code: cost.service_code.clone(),
                    service_name: cost.service_name.clone(),
                    total_usage_count: rows.len() as i64,
                    total_credits_consumed: rows.iter().map(|u| u.credits_consumed).sum(),
                    last_used_at: rows.iter().map(|u| u.created_at).max(),
                    unique_users_count: users.len() as i64,
                }
            })
            .collect();
        stats.sort_by(|a, b| {
            b.total_credits_consumed
                .cmp(&a.total_credits_consumed)
                .then_with(|| a.service_code.cmp(&b.service_code))
        });
        Ok(stats)
    }

    async fn cost_history(
        &self,
        service_code: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ServiceCostHistory>, AppError> {
        Ok(lock(&self.cost_history)
            .iter()
            .rev()
            .filter(|h| service_code.map_or(true, |code| h.service_code == code))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Application
// ────────────────────────────────────────────────────────────────────────────

/// Router state wired to in-memory stores, with handles kept for assertions.
pub struct TestApp {
    pub state: AppState,
    pub campaigns: Arc<InMemoryCampaignStore>,
    pub audience: Arc<FixedAudience>,
    pub settings: Arc<InMemorySettingsStore>,
    pub ledger: Arc<InMemoryLedger>,
}

pub fn make_test_app(audience: i64) -> TestApp {
    let campaigns = Arc::new(InMemoryCampaignStore::default());
    let audience = Arc::new(FixedAudience::new(audience));
    let settings = Arc::new(InMemorySettingsStore::default());
    let ledger = Arc::new(InMemoryLedger::default());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let state = AppState {
        campaigns: campaigns.clone(),
        audience: audience.clone(),
        diffusion: Arc::new(make_config(settings.clone(), clock.clone())),
        ledger: ledger.clone(),
        ai_engine: Arc::new(MockAiEngine),
        clock,
    };

    TestApp {
        state,
        campaigns,
        audience,
        settings,
        ledger,
    }
}
