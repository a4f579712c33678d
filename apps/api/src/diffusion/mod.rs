// Targeted diffusion: audience, pricing, campaign creation and payment approval.
pub mod approval;
pub mod audience;
pub mod builder;
pub mod handlers;
pub mod labels;
pub mod pricing;
pub mod stats;
pub mod store;
