use std::sync::Arc;

use crate::ai_engine::AiEngine;
use crate::clock::Clock;
use crate::credits::ledger::CreditLedger;
use crate::diffusion::audience::AudienceEstimator;
use crate::diffusion::store::CampaignStore;
use crate::settings::service::DiffusionConfig;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub campaigns: Arc<dyn CampaignStore>,
    pub audience: Arc<dyn AudienceEstimator>,
    /// Cached settings and channel pricing. Shared so every handler sees the
    /// same cache and the same invalidations.
    pub diffusion: Arc<DiffusionConfig>,
    pub ledger: Arc<dyn CreditLedger>,
    /// Pluggable AI backend. Default: MockAiEngine.
    pub ai_engine: Arc<dyn AiEngine>,
    pub clock: Arc<dyn Clock>,
}
