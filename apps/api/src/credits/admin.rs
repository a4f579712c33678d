//! Admin side of the service price list. Every write goes through the
//! ledger, which keeps the cost change log.

use tracing::info;
use uuid::Uuid;

use crate::credits::gate::ServiceSpec;
use crate::credits::ledger::CreditLedger;
use crate::errors::AppError;
use crate::models::credits::{NewService, ServiceCost, ServiceCostPatch};

fn validate_cost(credits_cost: i64) -> Result<(), AppError> {
    if credits_cost < 0 {
        return Err(AppError::Validation(
            "Le coût en crédits ne peut pas être négatif".to_string(),
        ));
    }
    Ok(())
}

fn validate_discount(discount_percent: i32) -> Result<(), AppError> {
    if !(0..=100).contains(&discount_percent) {
        return Err(AppError::Validation(
            "La réduction doit être comprise entre 0 et 100 %".to_string(),
        ));
    }
    Ok(())
}

fn validate_name(service_name: &str) -> Result<(), AppError> {
    if service_name.trim().is_empty() {
        return Err(AppError::Validation(
            "Le nom du service est obligatoire".to_string(),
        ));
    }
    Ok(())
}

/// Codes are snake_case identifiers, e.g. `cv_semantic_search`.
fn validate_code(service_code: &str) -> Result<(), AppError> {
    let well_formed = !service_code.is_empty()
        && service_code
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !well_formed {
        return Err(AppError::Validation(format!(
            "Code de service invalide : '{service_code}'"
        )));
    }
    Ok(())
}

pub async fn update_service_cost(
    ledger: &dyn CreditLedger,
    service_code: &str,
    patch: &ServiceCostPatch,
    reason: Option<&str>,
    actor: Uuid,
) -> Result<ServiceCost, AppError> {
    if patch.is_empty() {
        return Err(AppError::Validation("Aucune modification fournie".to_string()));
    }
    if let Some(cost) = patch.credits_cost {
        validate_cost(cost)?;
    }
    if let Some(discount) = patch.discount_percent {
        validate_discount(discount)?;
    }
    if let Some(name) = &patch.service_name {
        validate_name(name)?;
    }

    let updated = ledger
        .update_service_cost(service_code, patch, reason, actor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Service {service_code} inconnu")))?;
    info!(
        "Service {service_code} repriced by {actor}: {} credits (effective {})",
        updated.credits_cost,
        updated.effective_cost()
    );
    Ok(updated)
}

pub async fn add_service(
    ledger: &dyn CreditLedger,
    service: &NewService,
    actor: Uuid,
) -> Result<ServiceCost, AppError> {
    validate_code(&service.service_code)?;
    validate_name(&service.service_name)?;
    validate_cost(service.credits_cost)?;
    validate_discount(service.discount_percent)?;

    let created = ledger.add_service(service, actor).await?;
    info!(
        "Service {} added by {actor} at {} credits",
        created.service_code, created.credits_cost
    );
    Ok(created)
}

/// Built-in services can only be deactivated: deleting their row would
/// leave the gate charging the fallback price.
pub async fn delete_service(
    ledger: &dyn CreditLedger,
    service_code: &str,
    reason: Option<&str>,
    actor: Uuid,
) -> Result<ServiceCost, AppError> {
    if ServiceSpec::from_code(service_code).is_some() {
        return Err(AppError::Validation(format!(
            "Le service {service_code} est intégré : désactivez-le plutôt que de le supprimer"
        )));
    }

    let deleted = ledger
        .delete_service(service_code, reason, actor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Service {service_code} inconnu")))?;
    info!("Service {service_code} deleted by {actor}");
    Ok(deleted)
}
