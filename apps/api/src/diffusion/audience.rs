//! Counts addressable candidates for a filter set.
//!
//! The count itself is computed by the store (`calculate_available_audience`).
//! This module normalises filters before the call and guarantees the
//! caller never sees a negative count. A remote failure is an error
//! ("audience unknown"), never a silent zero.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, error};

use crate::errors::AppError;
use crate::models::campaign::AudienceFilters;

pub const DEFAULT_ACTIVE_WITHIN_DAYS: i32 = 30;
pub const DEFAULT_MIN_COMPLETION: i32 = 80;

#[async_trait]
pub trait AudienceEstimator: Send + Sync {
    /// Raw count as reported by the store for already-normalised filters.
    async fn count(&self, filters: &AudienceFilters) -> Result<i64, AppError>;
}

pub struct PgAudienceEstimator {
    pool: PgPool,
}

impl PgAudienceEstimator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AudienceEstimator for PgAudienceEstimator {
    async fn count(&self, filters: &AudienceFilters) -> Result<i64, AppError> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT calculate_available_audience($1)::bigint")
                .bind(Json(filters))
                .fetch_one(&self.pool)
                .await?;
        Ok(count.unwrap_or(0))
    }
}

impl AudienceFilters {
    /// Applies defaults and repairs degenerate bounds:
    /// blank substrings are dropped, negative values clamp to zero,
    /// inverted experience bounds are swapped, completion is capped at 100.
    pub fn normalized(&self) -> AudienceFilters {
        let clean = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let mut min_experience = self.min_experience.map(|v| v.max(0));
        let mut max_experience = self.max_experience.map(|v| v.max(0));
        if let (Some(lo), Some(hi)) = (min_experience, max_experience) {
            if lo > hi {
                min_experience = Some(hi);
                max_experience = Some(lo);
            }
        }

        let active_within_days = match self.active_within_days {
            Some(days) if days > 0 => days,
            _ => DEFAULT_ACTIVE_WITHIN_DAYS,
        };

        AudienceFilters {
            job_title: clean(&self.job_title),
            sector: clean(&self.sector),
            location: clean(&self.location),
            min_experience,
            max_experience,
            active_within_days: Some(active_within_days),
            min_completion: Some(
                self.min_completion
                    .unwrap_or(DEFAULT_MIN_COMPLETION)
                    .clamp(0, 100),
            ),
        }
    }
}

/// Counts the audience for `filters`. Always ≥ 0 on success.
pub async fn estimate_audience(
    estimator: &dyn AudienceEstimator,
    filters: &AudienceFilters,
) -> Result<i64, AppError> {
    let normalized = filters.normalized();
    let count = estimator.count(&normalized).await.map_err(|e| {
        error!("Error calculating audience: {e}");
        e
    })?;
    debug!("Audience estimate: {count} for {normalized:?}");
    Ok(count.max(0))
}
