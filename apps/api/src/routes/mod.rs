pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::credits::handlers as credits;
use crate::diffusion::handlers as diffusion;
use crate::settings::handlers as settings;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Diffusion configuration (admin)
        .route(
            "/api/v1/diffusion/settings",
            get(settings::handle_get_settings).patch(settings::handle_update_settings),
        )
        .route("/api/v1/diffusion/pricing", get(settings::handle_get_pricing))
        .route(
            "/api/v1/diffusion/pricing/costs",
            get(settings::handle_channel_costs),
        )
        .route(
            "/api/v1/diffusion/pricing/:channel",
            patch(settings::handle_update_pricing),
        )
        .route("/api/v1/diffusion/audit", get(settings::handle_audit_logs))
        .route(
            "/api/v1/diffusion/cache/clear",
            post(settings::handle_clear_cache),
        )
        .route(
            "/api/v1/diffusion/templates",
            get(settings::handle_list_templates).post(settings::handle_create_template),
        )
        .route(
            "/api/v1/diffusion/templates/default/:template_type",
            get(settings::handle_default_template),
        )
        .route(
            "/api/v1/diffusion/templates/:id",
            patch(settings::handle_update_template).delete(settings::handle_delete_template),
        )
        // Targeting form
        .route(
            "/api/v1/diffusion/audience",
            post(diffusion::handle_estimate_audience),
        )
        .route("/api/v1/diffusion/quote", post(diffusion::handle_quote))
        // Campaign lifecycle
        .route(
            "/api/v1/campaigns",
            post(diffusion::handle_create_campaign).get(diffusion::handle_list_campaigns),
        )
        .route(
            "/api/v1/campaigns/pending",
            get(diffusion::handle_pending_campaigns),
        )
        .route(
            "/api/v1/campaigns/by-entity/:entity_type/:entity_id",
            get(diffusion::handle_campaigns_by_entity),
        )
        .route("/api/v1/campaigns/:id", get(diffusion::handle_get_campaign))
        .route(
            "/api/v1/campaigns/:id/stats",
            get(diffusion::handle_campaign_stats),
        )
        .route(
            "/api/v1/campaigns/:id/submit",
            post(diffusion::handle_submit_campaign),
        )
        .route(
            "/api/v1/campaigns/:id/approve",
            post(diffusion::handle_approve_campaign),
        )
        .route(
            "/api/v1/campaigns/:id/reject",
            post(diffusion::handle_reject_campaign),
        )
        .route(
            "/api/v1/campaigns/:id/cancel",
            post(diffusion::handle_cancel_campaign),
        )
        // Credits
        .route("/api/v1/credits/balance", get(credits::handle_balance))
        .route(
            "/api/v1/credits/services",
            get(credits::handle_list_services).post(credits::handle_add_service),
        )
        .route(
            "/api/v1/credits/services/:code",
            patch(credits::handle_update_service).delete(credits::handle_delete_service),
        )
        .route(
            "/api/v1/credits/statistics",
            get(credits::handle_service_statistics),
        )
        .route("/api/v1/credits/cost-history", get(credits::handle_cost_history))
        .route("/api/v1/credits/history", get(credits::handle_usage_history))
        .route("/api/v1/credits/check", get(credits::handle_can_afford))
        // Credit-gated AI features
        .route("/api/v1/ai/score", post(credits::handle_score_profile))
        .route("/api/v1/ai/search", post(credits::handle_search_candidates))
        .route("/api/v1/ai/cv", post(credits::handle_generate_cv))
        .with_state(state)
}
