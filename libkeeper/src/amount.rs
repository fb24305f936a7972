use crate::error::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use std::fmt;

/// An exact decimal quantity tagged with its currency or commodity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    magnitude: Decimal,
    currency: Option<String>,
}

impl Money {
    pub fn new(text: &str, currency: Option<&str>) -> Result<Money> {
        let magnitude = Decimal::from_str_exact(text.trim())
            .map_err(|_| Error::InvalidAmount(text.to_string()))?;
        Ok(Money::from_decimal(magnitude, currency))
    }

    pub fn from_decimal(magnitude: Decimal, currency: Option<&str>) -> Money {
        Money {
            magnitude,
            currency: currency.map(|c| c.to_string()),
        }
    }

    pub fn zero(currency: Option<&str>) -> Money {
        Money::from_decimal(Decimal::ZERO, currency)
    }

    pub fn magnitude(&self) -> Decimal {
        self.magnitude
    }

    pub fn currency(&self) -> Option<&str> {
        self.currency.as_deref()
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude.is_zero()
    }

    fn common_currency(&self, rhs: &Money) -> Result<Option<String>> {
        match (&self.currency, &rhs.currency) {
            (Some(left), Some(right)) if left != right => Err(Error::CurrencyMismatch {
                left: left.clone(),
                right: right.clone(),
            }),
            (Some(c), _) | (None, Some(c)) => Ok(Some(c.clone())),
            (None, None) => Ok(None),
        }
    }

    fn combine(
        &self,
        rhs: &Money,
        op: &'static str,
        f: impl FnOnce(Decimal, Decimal) -> Option<Decimal>,
    ) -> Result<Money> {
        let currency = self.common_currency(rhs)?;
        let magnitude = f(self.magnitude, rhs.magnitude).ok_or_else(|| Error::Overflow {
            left: self.to_string(),
            op,
            right: rhs.to_string(),
        })?;
        Ok(Money {
            magnitude,
            currency,
        })
    }

    pub fn checked_add(&self, rhs: &Money) -> Result<Money> {
        self.combine(rhs, "+", Decimal::checked_add)
    }

    pub fn checked_sub(&self, rhs: &Money) -> Result<Money> {
        self.combine(rhs, "-", Decimal::checked_sub)
    }

    pub fn checked_mul(&self, rhs: &Money) -> Result<Money> {
        self.combine(rhs, "*", Decimal::checked_mul)
    }

    /// Multiplies by a dimensionless factor, keeping the currency.
    pub fn checked_scale(&self, factor: Decimal) -> Result<Money> {
        let magnitude = self.magnitude.checked_mul(factor).ok_or_else(|| Error::Overflow {
            left: self.to_string(),
            op: "*",
            right: factor.to_string(),
        })?;
        Ok(Money {
            magnitude,
            currency: self.currency.clone(),
        })
    }

    /// Renders the magnitude with at least `scale` decimal places, never rounding.
    pub fn format_magnitude(&self, scale: u32) -> String {
        let mut magnitude = self.magnitude;
        if magnitude.scale() < scale {
            magnitude.rescale(scale);
        }
        magnitude.to_string()
    }
}

impl std::ops::Neg for &Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money {
            magnitude: -self.magnitude,
            currency: self.currency.clone(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.currency {
            Some(currency) => write!(f, "{} {}", self.magnitude, currency),
            None => write!(f, "{}", self.magnitude),
        }
    }
}
