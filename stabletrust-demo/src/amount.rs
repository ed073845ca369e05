//! Fixed-point token amounts.
//!
//! Every [`Amount`] carries its own precision. Confidential balances and
//! public token balances use different precisions for the same token, so
//! combining two amounts requires equal `decimals` and [`Amount::rescale`]
//! is the only way across.

use std::fmt;

use ethers::types::U256;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Largest precision representable in a `U256` scale factor.
pub const MAX_DECIMALS: u8 = 77;

/// Decimals of the chain's native gas token.
pub const NATIVE_DECIMALS: u8 = 18;

/// A raw integer amount interpreted at a fixed number of decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    raw: U256,
    decimals: u8,
}

impl Amount {
    /// Create an amount from raw base units
    pub fn new(raw: impl Into<U256>, decimals: u8) -> Self {
        Self {
            raw: raw.into(),
            decimals,
        }
    }

    pub fn zero(decimals: u8) -> Self {
        Self::new(U256::zero(), decimals)
    }

    /// Parse a decimal string such as `"0.5"` into base units at `decimals`.
    ///
    /// Fractional digits beyond the precision are accepted only when they
    /// are all zero; anything else would silently lose value.
    pub fn parse(text: &str, decimals: u8) -> Result<Self> {
        if decimals > MAX_DECIMALS {
            return Err(Error::InvalidAmount(format!(
                "precision {} exceeds {}",
                decimals, MAX_DECIMALS
            )));
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidAmount("Empty amount".to_string()));
        }

        let (whole_part, frac_part) = text.split_once('.').unwrap_or((text, ""));

        if frac_part.contains('.') {
            return Err(Error::InvalidAmount(format!(
                "Multiple decimal points: {}",
                text
            )));
        }
        if whole_part.is_empty() && frac_part.is_empty() {
            return Err(Error::InvalidAmount(format!("No digits: {}", text)));
        }
        if !whole_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidAmount(format!(
                "Invalid whole part: {}",
                whole_part
            )));
        }
        if !frac_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidAmount(format!(
                "Invalid fractional part: {}",
                frac_part
            )));
        }

        let width = decimals as usize;
        let frac_part = if frac_part.len() > width {
            let (kept, dropped) = frac_part.split_at(width);
            if dropped.bytes().any(|b| b != b'0') {
                return Err(Error::TooManyDecimalPlaces {
                    amount: text.to_string(),
                    decimals,
                });
            }
            kept
        } else {
            frac_part
        };

        let scale = U256::exp10(width);
        let whole_units = if whole_part.is_empty() {
            U256::zero()
        } else {
            U256::from_dec_str(whole_part)
                .map_err(|e| Error::InvalidAmount(format!("Invalid whole part: {:?}", e)))?
                .checked_mul(scale)
                .ok_or_else(|| Error::InvalidAmount("Amount overflow".to_string()))?
        };

        let frac_units = if frac_part.is_empty() {
            U256::zero()
        } else {
            let padded = format!("{:0<width$}", frac_part, width = width);
            U256::from_dec_str(&padded)
                .map_err(|e| Error::InvalidAmount(format!("Invalid fractional part: {:?}", e)))?
        };

        let raw = whole_units
            .checked_add(frac_units)
            .ok_or_else(|| Error::InvalidAmount("Amount overflow".to_string()))?;

        Ok(Self { raw, decimals })
    }

    pub fn raw(&self) -> U256 {
        self.raw
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }

    /// Express the same value at another precision.
    ///
    /// Narrowing fails unless the dropped digits are zero.
    pub fn rescale(&self, decimals: u8) -> Result<Self> {
        if decimals > MAX_DECIMALS {
            return Err(Error::InvalidAmount(format!(
                "precision {} exceeds {}",
                decimals, MAX_DECIMALS
            )));
        }

        let raw = if decimals >= self.decimals {
            let factor = U256::exp10((decimals - self.decimals) as usize);
            self.raw
                .checked_mul(factor)
                .ok_or_else(|| Error::InvalidAmount("Amount overflow".to_string()))?
        } else {
            let factor = U256::exp10((self.decimals - decimals) as usize);
            if !(self.raw % factor).is_zero() {
                return Err(Error::InvalidAmount(format!(
                    "{} is not representable at {} decimals",
                    self, decimals
                )));
            }
            self.raw / factor
        };

        Ok(Self { raw, decimals })
    }

    pub fn checked_add(&self, other: &Amount) -> Result<Amount> {
        self.ensure_same_precision(other)?;
        let raw = self
            .raw
            .checked_add(other.raw)
            .ok_or_else(|| Error::InvalidAmount("Amount overflow".to_string()))?;
        Ok(Self::new(raw, self.decimals))
    }

    /// Subtract `other`, returning `Ok(None)` when it exceeds `self`.
    pub fn checked_sub(&self, other: &Amount) -> Result<Option<Amount>> {
        self.ensure_same_precision(other)?;
        Ok(self
            .raw
            .checked_sub(other.raw)
            .map(|raw| Self::new(raw, self.decimals)))
    }

    fn ensure_same_precision(&self, other: &Amount) -> Result<()> {
        if self.decimals != other.decimals {
            return Err(Error::PrecisionMismatch {
                expected: self.decimals,
                actual: other.decimals,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Amount {
    /// Always renders exactly `decimals` fractional digits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.raw.to_string();
        if self.decimals == 0 {
            return f.write_str(&digits);
        }

        // Split the digit string instead of dividing by 10^decimals, which
        // does not fit in a U256 past MAX_DECIMALS.
        let width = self.decimals as usize;
        let padded = format!("{:0>len$}", digits, len = width + 1);
        let (whole, frac) = padded.split_at(padded.len() - width);
        write!(f, "{}.{}", whole, frac)
    }
}
