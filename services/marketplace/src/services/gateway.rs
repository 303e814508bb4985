use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pocketlegal_common::{AppError, PaymentMethod};
use rand::Rng;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::{GatewayKind, PaymentConfig};

#[derive(Debug, Clone)]
pub struct ChargeRequest<'a> {
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub currency: &'a str,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Approved { transaction_id: String },
    Declined { transaction_id: String, reason: String },
}

/// Capture and refund against an external processor. Errors mean the
/// gateway could not be reached; a refused charge is `Declined`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest<'_>) -> Result<ChargeOutcome, AppError>;

    async fn refund(&self, transaction_id: Option<&str>, amount: Decimal) -> Result<(), AppError>;

    fn name(&self) -> &'static str;
}

/// Approves every charge.
#[derive(Debug, Default, Clone)]
pub struct DemoGateway;

#[async_trait]
impl PaymentGateway for DemoGateway {
    async fn charge(&self, request: &ChargeRequest<'_>) -> Result<ChargeOutcome, AppError> {
        tracing::debug!(
            booking_id = %request.booking_id,
            amount = %request.amount,
            method = %request.method,
            "demo charge approved"
        );
        Ok(ChargeOutcome::Approved {
            transaction_id: format!("DEMO_{}", Utc::now().timestamp_millis()),
        })
    }

    async fn refund(&self, transaction_id: Option<&str>, amount: Decimal) -> Result<(), AppError> {
        tracing::debug!(?transaction_id, %amount, "demo refund issued");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "demo"
    }
}

/// Approves a charge with probability `success_rate`.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    success_rate: f64,
}

impl SimulatedGateway {
    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, request: &ChargeRequest<'_>) -> Result<ChargeOutcome, AppError> {
        let approved = rand::thread_rng().gen_bool(self.success_rate);
        let transaction_id = format!("SIM_{}", Uuid::new_v4().simple());

        if approved {
            Ok(ChargeOutcome::Approved { transaction_id })
        } else {
            tracing::debug!(booking_id = %request.booking_id, "simulated charge declined");
            Ok(ChargeOutcome::Declined {
                transaction_id,
                reason: "Card declined by issuer".to_string(),
            })
        }
    }

    async fn refund(&self, _transaction_id: Option<&str>, _amount: Decimal) -> Result<(), AppError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

pub fn gateway_from_config(config: &PaymentConfig) -> Arc<dyn PaymentGateway> {
    match config.gateway {
        GatewayKind::Demo => Arc::new(DemoGateway),
        GatewayKind::Simulated => Arc::new(SimulatedGateway::new(config.success_rate)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChargeRequest<'static> {
        ChargeRequest {
            booking_id: Uuid::new_v4(),
            amount: Decimal::new(150, 0),
            currency: "USD",
            method: PaymentMethod::CreditCard,
        }
    }

    #[tokio::test]
    async fn test_demo_gateway_always_approves() {
        match DemoGateway.charge(&request()).await.unwrap() {
            ChargeOutcome::Approved { transaction_id } => {
                assert!(transaction_id.starts_with("DEMO_"))
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_simulated_gateway_extremes() {
        let always = SimulatedGateway::new(1.0);
        let never = SimulatedGateway::new(0.0);
        for _ in 0..20 {
            assert!(matches!(
                always.charge(&request()).await.unwrap(),
                ChargeOutcome::Approved { .. }
            ));
            assert!(matches!(
                never.charge(&request()).await.unwrap(),
                ChargeOutcome::Declined { .. }
            ));
        }
    }

    #[test]
    fn test_success_rate_is_clamped() {
        assert_eq!(SimulatedGateway::new(3.0).success_rate, 1.0);
        assert_eq!(SimulatedGateway::new(-1.0).success_rate, 0.0);
    }
}
