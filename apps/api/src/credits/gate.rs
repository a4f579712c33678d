//! Credit gate wrapped around every AI-backed feature.
//!
//! ```text
//! account → cost (configured or fallback) → balance check
//!         → atomic debit → work → attach output to usage row
//! ```
//!
//! Each remote call is attempted once. Nothing is refunded when `work`
//! fails after the debit went through.

use std::future::Future;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::credits::ledger::CreditLedger;
use crate::errors::AppError;

/// Error code `use_ai_credits` answers with when the balance is too low.
const INSUFFICIENT_CREDITS: &str = "INSUFFICIENT_CREDITS";

/// Service code plus the price used when no active configuration exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSpec {
    pub code: &'static str,
    pub fallback_cost: i64,
}

pub const PROFILE_SCORING: ServiceSpec = ServiceSpec {
    code: "cv_profile_scoring",
    fallback_cost: 1,
};

pub const SEMANTIC_SEARCH: ServiceSpec = ServiceSpec {
    code: "cv_semantic_search",
    fallback_cost: 5,
};

pub const CV_GENERATION: ServiceSpec = ServiceSpec {
    code: "ai_cv_generation",
    fallback_cost: 50,
};

pub const KNOWN_SERVICES: [ServiceSpec; 3] = [PROFILE_SCORING, SEMANTIC_SEARCH, CV_GENERATION];

impl ServiceSpec {
    pub fn from_code(code: &str) -> Option<ServiceSpec> {
        KNOWN_SERVICES.iter().copied().find(|s| s.code == code)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GateReceipt<T> {
    pub output: T,
    pub credits_consumed: i64,
    pub credits_remaining: i64,
}

#[derive(Debug)]
pub enum GateOutcome<T> {
    Completed(GateReceipt<T>),
    InsufficientCredits {
        required: i64,
        available: i64,
    },
    Failed {
        reason: String,
    },
}

impl<T> GateOutcome<T> {
    pub fn into_result(self) -> Result<GateReceipt<T>, AppError> {
        match self {
            GateOutcome::Completed(receipt) => Ok(receipt),
            GateOutcome::InsufficientCredits {
                required,
                available,
            } => Err(AppError::InsufficientCredits {
                required,
                available,
            }),
            GateOutcome::Failed { reason } => Err(AppError::AiService(reason)),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Affordability {
    pub sufficient: bool,
    pub required: i64,
    pub available: i64,
    pub message: String,
}

fn insufficient_message(required: i64, available: i64) -> String {
    format!("Crédits insuffisants. Requis: {required}, Disponible: {available}")
}

/// Configured cost with promotion applied, or the fallback when the
/// service is unconfigured or its configuration cannot be read.
pub async fn resolve_cost(ledger: &dyn CreditLedger, spec: ServiceSpec) -> i64 {
    match ledger.service_cost(spec.code).await {
        Ok(Some(config)) => config.effective_cost(),
        Ok(None) => spec.fallback_cost,
        Err(e) => {
            warn!(
                "Cost lookup for {} failed, using fallback {}: {e}",
                spec.code, spec.fallback_cost
            );
            spec.fallback_cost
        }
    }
}

/// Pre-check shown before a user triggers a paid feature.
pub async fn can_afford(
    ledger: &dyn CreditLedger,
    user_id: Uuid,
    spec: ServiceSpec,
) -> Result<Affordability, AppError> {
    let account = ledger.account(user_id).await?;
    let required = resolve_cost(ledger, spec).await;
    let sufficient = account.is_premium || account.balance >= required;

    Ok(Affordability {
        sufficient,
        required,
        available: account.balance,
        message: if sufficient {
            "Crédits suffisants".to_string()
        } else {
            insufficient_message(required, account.balance)
        },
    })
}

/// Runs `work` only after the caller has been charged for `spec`.
pub async fn with_credit_gate<I, T, F, Fut>(
    ledger: &dyn CreditLedger,
    user_id: Uuid,
    spec: ServiceSpec,
    input: &I,
    work: F,
) -> GateOutcome<T>
where
    I: Serialize + ?Sized,
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let account = match ledger.account(user_id).await {
        Ok(account) => account,
        Err(e) => {
            warn!("Credit gate {}: cannot read account {user_id}: {e}", spec.code);
            return GateOutcome::Failed {
                reason: format!("Impossible de récupérer le solde : {e}"),
            };
        }
    };

    let cost = resolve_cost(ledger, spec).await;
    if !account.is_premium && account.balance < cost {
        info!(
            "Credit gate {}: user {user_id} has {} credits, needs {cost}",
            spec.code, account.balance
        );
        return GateOutcome::InsufficientCredits {
            required: cost,
            available: account.balance,
        };
    }

    let input_payload = match serde_json::to_value(input) {
        Ok(value) => value,
        Err(e) => {
            return GateOutcome::Failed {
                reason: format!("Entrée non sérialisable : {e}"),
            }
        }
    };

    let debit = match ledger
        .use_credits(user_id, spec.code, cost, &input_payload, None)
        .await
    {
        Ok(debit) => debit,
        Err(e) => {
            warn!("Credit gate {}: debit failed for {user_id}: {e}", spec.code);
            return GateOutcome::Failed {
                reason: format!("Erreur lors de la consommation des crédits : {e}"),
            };
        }
    };

    if !debit.success {
        let code = debit.error.as_deref().unwrap_or("UNKNOWN_ERROR");
        warn!(
            "Credit gate {}: debit refused for {user_id} ({code})",
            spec.code
        );
        if code != INSUFFICIENT_CREDITS {
            return GateOutcome::Failed {
                reason: debit
                    .message
                    .unwrap_or_else(|| format!("Débit refusé : {code}")),
            };
        }
        // the balance moved between the check and the debit
        return GateOutcome::InsufficientCredits {
            required: debit.required_credits.unwrap_or(cost),
            available: debit.available_credits.unwrap_or(account.balance),
        };
    }

    let output = match work().await {
        Ok(output) => output,
        Err(e) => {
            warn!(
                "Credit gate {}: work failed after debit for {user_id}, credits not refunded: {e}",
                spec.code
            );
            return GateOutcome::Failed {
                reason: e.to_string(),
            };
        }
    };

    if let Some(usage_id) = debit.usage_id {
        log_output(ledger, usage_id, &output).await;
    }

    let credits_consumed = debit
        .credits_consumed
        .unwrap_or(if account.is_premium { 0 } else { cost });
    let credits_remaining = debit
        .credits_remaining
        .unwrap_or(account.balance - credits_consumed);
    info!(
        "Credit gate {}: user {user_id} charged {credits_consumed}, {credits_remaining} left",
        spec.code
    );

    GateOutcome::Completed(GateReceipt {
        output,
        credits_consumed,
        credits_remaining,
    })
}

async fn log_output<T: Serialize>(ledger: &dyn CreditLedger, usage_id: Uuid, output: &T) {
    let value: Value = match serde_json::to_value(output) {
        Ok(value) => value,
        Err(e) => {
            warn!("Usage {usage_id}: output not serialisable: {e}");
            return;
        }
    };
    if let Err(e) = ledger.log_usage(usage_id, &value).await {
        warn!("Usage {usage_id}: failed to record output: {e}");
    }
}
