//! AI-backed features sold for credits. Each one validates its input,
//! then runs the engine call inside the credit gate.

use uuid::Uuid;

use crate::ai_engine::{
    AiEngine, CvRequest, GeneratedCv, ScoringInput, ScoringOutput, SearchInput, SearchOutput,
    MAX_EXPERIENCE_YEARS,
};
use crate::credits::gate::{
    with_credit_gate, GateReceipt, CV_GENERATION, PROFILE_SCORING, SEMANTIC_SEARCH,
};
use crate::credits::ledger::CreditLedger;
use crate::errors::AppError;

const MAX_QUERY_CHARS: usize = 500;

pub async fn score_profile(
    ledger: &dyn CreditLedger,
    engine: &dyn AiEngine,
    user_id: Uuid,
    input: ScoringInput,
) -> Result<GateReceipt<ScoringOutput>, AppError> {
    validate_scoring(&input)?;
    with_credit_gate(ledger, user_id, PROFILE_SCORING, &input, || {
        engine.score_profile(&input)
    })
    .await
    .into_result()
}

pub async fn search_candidates(
    ledger: &dyn CreditLedger,
    engine: &dyn AiEngine,
    user_id: Uuid,
    input: SearchInput,
) -> Result<GateReceipt<SearchOutput>, AppError> {
    let input = SearchInput {
        query: input.query.trim().to_string(),
        ..input
    };
    validate_search(&input)?;
    with_credit_gate(ledger, user_id, SEMANTIC_SEARCH, &input, || {
        engine.semantic_search(&input)
    })
    .await
    .into_result()
}

pub async fn generate_cv(
    ledger: &dyn CreditLedger,
    engine: &dyn AiEngine,
    user_id: Uuid,
    input: CvRequest,
) -> Result<GateReceipt<GeneratedCv>, AppError> {
    validate_cv(&input)?;
    with_credit_gate(ledger, user_id, CV_GENERATION, &input, || {
        engine.generate_cv(&input)
    })
    .await
    .into_result()
}

fn validate_scoring(input: &ScoringInput) -> Result<(), AppError> {
    if !(0..=MAX_EXPERIENCE_YEARS).contains(&input.experience_years) {
        return Err(AppError::Validation(format!(
            "Les années d'expérience doivent être comprises entre 0 et {MAX_EXPERIENCE_YEARS}"
        )));
    }
    if matches!(input.profile_completion, Some(c) if !(0..=100).contains(&c)) {
        return Err(AppError::Validation(
            "Le taux de complétion doit être compris entre 0 et 100".to_string(),
        ));
    }
    Ok(())
}

fn validate_search(input: &SearchInput) -> Result<(), AppError> {
    if input.query.is_empty() {
        return Err(AppError::Validation(
            "La requête de recherche est obligatoire".to_string(),
        ));
    }
    if input.query.chars().count() > MAX_QUERY_CHARS {
        return Err(AppError::Validation(format!(
            "La requête ne doit pas dépasser {MAX_QUERY_CHARS} caractères"
        )));
    }
    Ok(())
}

fn validate_cv(input: &CvRequest) -> Result<(), AppError> {
    if input.full_name.trim().is_empty() {
        return Err(AppError::Validation("Le nom complet est obligatoire".to_string()));
    }
    if input.experiences.is_empty() && input.education.is_empty() && input.skills.is_empty() {
        return Err(AppError::Validation(
            "Renseignez au moins une expérience, une formation ou une compétence".to_string(),
        ));
    }
    Ok(())
}
