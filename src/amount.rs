//! Exact decimal token amounts.
//!
//! Uses `rust_decimal` internally so balances and payment amounts never pass
//! through floating point. Conversion to and from the token's integer base
//! units happens only at the remote ledger boundary.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::SubAssign;
use std::str::FromStr;

/// A token amount in whole-token units (e.g. `12.5` tokens).
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use token_payout::Amount;
///
/// let amount = Amount::from_str("12.5").unwrap();
/// assert_eq!(amount.to_base_units(8), Some(1_250_000_000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    /// Zero value.
    pub const ZERO: Self = Amount(Decimal::ZERO);

    /// Returns `true` if this value is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Converts to integer base units for a token with `decimals` places,
    /// rounding half away from zero.
    ///
    /// Returns `None` for negative amounts or when the result does not fit.
    pub fn to_base_units(&self, decimals: u32) -> Option<u128> {
        if self.0.is_sign_negative() && !self.0.is_zero() {
            return None;
        }
        let factor = Decimal::try_from_i128_with_scale(10i128.checked_pow(decimals)?, 0).ok()?;
        self.0
            .checked_mul(factor)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u128()
    }

    /// Builds an amount from integer base units of a token with `decimals` places.
    pub fn from_base_units(units: u128, decimals: u32) -> Option<Self> {
        let units = i128::try_from(units).ok()?;
        Decimal::try_from_i128_with_scale(units, decimals)
            .ok()
            .map(|d| Amount(d.normalize()))
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}
