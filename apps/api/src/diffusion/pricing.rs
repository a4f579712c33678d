//! Channel cost computation.
//!
//! All amounts are whole GNF in `i64`; every multiplication and sum is
//! checked so an absurd quantity is a validation error, not a wrap.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::campaign::ChannelType;
use crate::models::settings::ChannelPricing;

/// A channel the user asked for, before pricing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ChannelRequest {
    pub channel_type: ChannelType,
    pub quantity: i64,
}

/// A priced channel line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelQuote {
    pub channel_type: ChannelType,
    pub quantity: i64,
    pub unit_cost: i64,
    pub total_cost: i64,
}

/// Drops channels with quantity 0 and rejects malformed requests:
/// negative quantities, duplicated channel types, or nothing left to send.
pub fn enabled_channels(channels: &[ChannelRequest]) -> Result<Vec<ChannelRequest>, AppError> {
    if let Some(bad) = channels.iter().find(|c| c.quantity < 0) {
        return Err(AppError::Validation(format!(
            "Quantité invalide pour {}",
            bad.channel_type.as_str()
        )));
    }

    let mut enabled: Vec<ChannelRequest> = Vec::with_capacity(channels.len());
    for channel in channels.iter().filter(|c| c.quantity > 0) {
        if enabled.iter().any(|c| c.channel_type == channel.channel_type) {
            return Err(AppError::Validation(format!(
                "Canal {} sélectionné plusieurs fois",
                channel.channel_type.as_str()
            )));
        }
        enabled.push(*channel);
    }

    if enabled.is_empty() {
        return Err(AppError::Validation(
            "Sélectionnez au moins un canal avec une quantité positive".to_string(),
        ));
    }
    Ok(enabled)
}

/// Prices each channel against the current pricing table.
/// A channel that is missing or disabled in the table cannot be bought.
pub fn quote_channels(
    channels: &[ChannelRequest],
    pricing: &[ChannelPricing],
) -> Result<Vec<ChannelQuote>, AppError> {
    channels
        .iter()
        .map(|channel| {
            let price = pricing
                .iter()
                .find(|p| p.channel_type == channel.channel_type && p.enabled)
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "Le canal {} n'est pas disponible",
                        channel.channel_type.as_str()
                    ))
                })?;

            if channel.quantity < price.min_quantity {
                return Err(AppError::Validation(format!(
                    "Quantité minimale pour {} : {}",
                    channel.channel_type.as_str(),
                    price.min_quantity
                )));
            }
            if price.max_quantity > 0 && channel.quantity > price.max_quantity {
                return Err(AppError::Validation(format!(
                    "Quantité maximale pour {} : {}",
                    channel.channel_type.as_str(),
                    price.max_quantity
                )));
            }

            let total_cost = channel
                .quantity
                .checked_mul(price.unit_cost)
                .ok_or_else(|| AppError::Validation("Montant hors limites".to_string()))?;

            Ok(ChannelQuote {
                channel_type: channel.channel_type,
                quantity: channel.quantity,
                unit_cost: price.unit_cost,
                total_cost,
            })
        })
        .collect()
}

/// Σ quantity × unit_cost over the quoted channels.
pub fn total_cost(quotes: &[ChannelQuote]) -> Result<i64, AppError> {
    quotes.iter().try_fold(0_i64, |sum, q| {
        sum.checked_add(q.total_cost)
            .ok_or_else(|| AppError::Validation("Montant hors limites".to_string()))
    })
}

/// Every channel quantity must fit within the audience.
pub fn check_against_audience(
    channels: &[ChannelRequest],
    audience_available: i64,
) -> Result<(), AppError> {
    for channel in channels {
        if channel.quantity > audience_available {
            return Err(AppError::Validation(format!(
                "Quantité pour {} dépasse l'audience disponible ({audience_available})",
                channel.channel_type.as_str()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::make_pricing;

    fn req(channel_type: ChannelType, quantity: i64) -> ChannelRequest {
        ChannelRequest {
            channel_type,
            quantity,
        }
    }

    #[test]
    fn test_total_is_exact_sum_of_products() {
        let pricing = make_pricing();
        let quotes = quote_channels(
            &[
                req(ChannelType::Email, 40),
                req(ChannelType::Sms, 13),
                req(ChannelType::Whatsapp, 7),
            ],
            &pricing,
        )
        .unwrap();
        // 40*500 + 13*1000 + 7*1500
        assert_eq!(total_cost(&quotes).unwrap(), 20_000 + 13_000 + 10_500);
    }

    #[test]
    fn test_unit_cost_is_snapshotted_per_line() {
        let quotes = quote_channels(&[req(ChannelType::Sms, 3)], &make_pricing()).unwrap();
        assert_eq!(quotes[0].unit_cost, 1000);
        assert_eq!(quotes[0].total_cost, 3000);
    }

    #[test]
    fn test_zero_quantity_channels_are_skipped() {
        let enabled =
            enabled_channels(&[req(ChannelType::Email, 0), req(ChannelType::Sms, 5)]).unwrap();
        assert_eq!(enabled, vec![req(ChannelType::Sms, 5)]);
    }

    #[test]
    fn test_all_zero_is_rejected() {
        let result = enabled_channels(&[req(ChannelType::Email, 0)]);
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(enabled_channels(&[]).is_err());
    }

    #[test]
    fn test_negative_quantity_is_rejected() {
        assert!(enabled_channels(&[req(ChannelType::Email, -1)]).is_err());
    }

    #[test]
    fn test_duplicate_channel_is_rejected() {
        let result = enabled_channels(&[req(ChannelType::Email, 2), req(ChannelType::Email, 3)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_disabled_channel_cannot_be_quoted() {
        let mut pricing = make_pricing();
        pricing
            .iter_mut()
            .filter(|p| p.channel_type == ChannelType::Whatsapp)
            .for_each(|p| p.enabled = false);
        let result = quote_channels(&[req(ChannelType::Whatsapp, 1)], &pricing);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_quantity_bounds_enforced() {
        let mut pricing = make_pricing();
        pricing[0].min_quantity = 10;
        pricing[0].max_quantity = 100;
        assert!(quote_channels(&[req(ChannelType::Email, 9)], &pricing).is_err());
        assert!(quote_channels(&[req(ChannelType::Email, 101)], &pricing).is_err());
        assert!(quote_channels(&[req(ChannelType::Email, 100)], &pricing).is_ok());
    }

    #[test]
    fn test_overflow_is_a_validation_error() {
        let result = quote_channels(&[req(ChannelType::Email, i64::MAX)], &make_pricing());
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_audience_bound_is_inclusive() {
        assert!(check_against_audience(&[req(ChannelType::Email, 42)], 42).is_ok());
        let err = check_against_audience(&[req(ChannelType::Email, 43)], 42).unwrap_err();
        assert!(err.to_string().contains("audience disponible (42)"));
    }
}
