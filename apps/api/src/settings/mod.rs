// Diffusion settings and channel pricing: cached reads, audited writes.

pub mod cache;
pub mod format;
pub mod handlers;
pub mod service;
pub mod store;
