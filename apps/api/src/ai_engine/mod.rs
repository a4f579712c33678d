//! The boundary every AI-backed feature calls through.
//!
//! Callers never talk to a model directly: they hold an `Arc<dyn AiEngine>`
//! from `AppState` and only reach it from inside the credit gate.
//! The shipped backend is [`mock::MockAiEngine`], a deterministic local
//! stand-in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;

pub mod mock;

/// Upper bound on years of experience accepted anywhere in a profile or query.
pub const MAX_EXPERIENCE_YEARS: i32 = 60;

// ────────────────────────────────────────────────────────────────────────────
// Profile scoring
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    Bac,
    Licence,
    Master,
    Doctorat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringInput {
    pub candidate_id: Uuid,
    pub experience_years: i32,
    pub education_level: EducationLevel,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_gold: bool,
    pub profile_completion: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub experience_score: u32,
    pub education_score: u32,
    pub skills_score: u32,
    pub verification_score: u32,
    pub completion_score: u32,
    /// Boost for gold profiles, on top of the five weighted criteria.
    pub gold_bonus: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoringOutput {
    pub score: u32, // 0 – 100
    pub breakdown: ScoreBreakdown,
    pub reasoning: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Semantic search
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchInput {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_filters: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchCriteria {
    pub skills: Vec<String>,
    pub experience_min: Option<i32>,
    pub experience_max: Option<i32>,
    pub education_level: Option<EducationLevel>,
    pub location: Option<String>,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchOutput {
    pub interpreted_query: String,
    pub search_criteria: SearchCriteria,
    pub suggested_keywords: Vec<String>,
    pub relevance_factors: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// CV generation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvExperience {
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvRequest {
    pub full_name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub experiences: Vec<CvExperience>,
    #[serde(default)]
    pub education: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    /// Job title the CV should be tailored to.
    #[serde(default)]
    pub target_job: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedCv {
    pub format: String, // "markdown"
    pub content: String,
    pub sections: Vec<String>,
}

/// Carried in `AppState` as `Arc<dyn AiEngine>`.
#[async_trait]
pub trait AiEngine: Send + Sync {
    async fn score_profile(&self, input: &ScoringInput) -> Result<ScoringOutput, AppError>;

    async fn semantic_search(&self, input: &SearchInput) -> Result<SearchOutput, AppError>;

    async fn generate_cv(&self, input: &CvRequest) -> Result<GeneratedCv, AppError>;
}
