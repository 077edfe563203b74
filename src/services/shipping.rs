use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// A shipping method offered for a delivery order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingOption {
    pub method_id: i64,
    pub name: String,
    pub cost: Decimal,
    pub eta_days: u32,
}

/// Quotes delivery options for a destination. Checkout re-prices the
/// buyer's selected method through this trait instead of trusting a
/// client-supplied cost.
#[async_trait]
pub trait ShippingRates: Send + Sync {
    async fn quote(
        &self,
        origin_zip: &str,
        dest_zip: &str,
        order_amount: Decimal,
    ) -> Result<Vec<ShippingOption>, ServiceError>;
}

/// In-process flat-rate table. Orders above the free-shipping threshold
/// ship standard at no cost.
pub struct FlatRateShipping {
    flat_rate: Decimal,
    free_shipping_threshold: Decimal,
}

impl FlatRateShipping {
    pub fn new() -> Self {
        Self::with_flat_rate(dec!(5.00))
    }

    pub fn with_flat_rate(flat_rate: Decimal) -> Self {
        Self {
            flat_rate,
            free_shipping_threshold: dec!(100),
        }
    }
}

impl Default for FlatRateShipping {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShippingRates for FlatRateShipping {
    async fn quote(
        &self,
        _origin_zip: &str,
        _dest_zip: &str,
        order_amount: Decimal,
    ) -> Result<Vec<ShippingOption>, ServiceError> {
        let standard_cost = if order_amount >= self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.flat_rate
        };

        Ok(vec![
            ShippingOption {
                method_id: 1,
                name: "Standard".to_string(),
                cost: standard_cost,
                eta_days: 5,
            },
            ShippingOption {
                method_id: 2,
                name: "Express".to_string(),
                cost: dec!(15.00),
                eta_days: 1,
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn standard_is_free_above_threshold() {
        let rates = FlatRateShipping::new();
        let options = rates.quote("1000", "2000", dec!(150)).await.unwrap();
        let standard = options.iter().find(|o| o.method_id == 1).unwrap();
        assert_eq!(standard.cost, Decimal::ZERO);
    }

    #[tokio::test]
    async fn standard_costs_below_threshold() {
        let rates = FlatRateShipping::new();
        let options = rates.quote("1000", "2000", dec!(20)).await.unwrap();
        let standard = options.iter().find(|o| o.method_id == 1).unwrap();
        assert_eq!(standard.cost, dec!(5.00));
    }
}
