use std::{fmt, str::FromStr};

use crate::{EngineError, ResultEngine};

/// Share of a booking price credited to the provider, in percent.
pub const PROVIDER_SHARE_PERCENT: i64 = 85;

/// Smallest bookable price; the provider share of it is at least 1.
pub const MIN_PRICE: i64 = 2;

/// Non-negative money amount in **integer minor units**.
///
/// All ledger values (prices, balances, transaction amounts) are minor units;
/// `Amount` is the typed form used where a value crosses a user boundary
/// (CLI arguments, display).
///
/// # Examples
///
/// ```rust
/// use engine::Amount;
///
/// let amount = Amount::new(200_00);
/// assert_eq!(amount.minor(), 20000);
/// assert_eq!(amount.to_string(), "200.00");
/// ```
///
/// Parsing from user input (accepts `.` or `,` as decimal separator; rejects
/// signs and more than 2 decimals):
///
/// ```rust
/// use engine::Amount;
///
/// assert_eq!("10".parse::<Amount>().unwrap().minor(), 1000);
/// assert_eq!("10,5".parse::<Amount>().unwrap().minor(), 1050);
/// assert!("-1".parse::<Amount>().is_err());
/// assert!("12.345".parse::<Amount>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Amount(i64);

impl Amount {
    /// Creates a new amount from minor units.
    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Amount> for i64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl FromStr for Amount {
    type Err = EngineError;

    /// Parses a decimal string into minor units.
    ///
    /// Validation rules:
    /// - max 2 fractional digits (rejects `12.345`)
    /// - no sign: ledger amounts are magnitudes
    /// - rejects empty/invalid strings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidAmount(format!("invalid amount: {s}"));
        let overflow = || EngineError::InvalidAmount("amount too large".to_string());

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EngineError::InvalidAmount("empty amount".to_string()));
        }

        let normalized = trimmed.replace(',', ".");
        let (units_str, frac_str) = match normalized.split_once('.') {
            Some((units, frac)) => (units, frac),
            None => (normalized.as_str(), ""),
        };

        if units_str.is_empty() || !units_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if !frac_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let units: i64 = units_str.parse().map_err(|_| overflow())?;
        let frac: i64 = match frac_str.len() {
            0 => 0,
            1 => frac_str.parse::<i64>().map_err(|_| invalid())? * 10,
            2 => frac_str.parse::<i64>().map_err(|_| invalid())?,
            _ => return Err(EngineError::InvalidAmount("too many decimals".to_string())),
        };

        units
            .checked_mul(100)
            .and_then(|v| v.checked_add(frac))
            .map(Amount)
            .ok_or_else(overflow)
    }
}

/// Result of splitting a booking price between provider and platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Split {
    pub provider_share: i64,
    pub platform_fee: i64,
}

/// Split `price` into the provider share (floored) and the platform fee.
///
/// `provider_share + platform_fee == price` holds for every valid price.
pub fn provider_split(price: i64) -> ResultEngine<Split> {
    if price <= 0 {
        return Err(EngineError::InvalidAmount(
            "price must be > 0".to_string(),
        ));
    }
    // price = 100q + r, so floor(85 * price / 100) = 85q + floor(85r / 100)
    // without ever forming 85 * price.
    let provider_share =
        (price / 100) * PROVIDER_SHARE_PERCENT + (price % 100) * PROVIDER_SHARE_PERCENT / 100;
    Ok(Split {
        provider_share,
        platform_fee: price - provider_share,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn display_formats_minor_units() {
        assert_eq!(Amount::new(0).to_string(), "0.00");
        assert_eq!(Amount::new(1).to_string(), "0.01");
        assert_eq!(Amount::new(10).to_string(), "0.10");
        assert_eq!(Amount::new(1050).to_string(), "10.50");
    }

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!("10".parse::<Amount>().unwrap().minor(), 1000);
        assert_eq!("10.5".parse::<Amount>().unwrap().minor(), 1050);
        assert_eq!("10,50".parse::<Amount>().unwrap().minor(), 1050);
        assert_eq!("  2.30 ".parse::<Amount>().unwrap().minor(), 230);
        assert_eq!("7.".parse::<Amount>().unwrap().minor(), 700);
    }

    #[test]
    fn parse_rejects_signs_and_garbage() {
        assert!("-0.01".parse::<Amount>().is_err());
        assert!("+1".parse::<Amount>().is_err());
        assert!("12.345".parse::<Amount>().is_err());
        assert!("1.2.3".parse::<Amount>().is_err());
        assert!("".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
    }

    #[test]
    fn split_known_values() {
        assert_eq!(
            provider_split(20000).unwrap(),
            Split {
                provider_share: 17000,
                platform_fee: 3000
            }
        );
        assert_eq!(
            provider_split(1).unwrap(),
            Split {
                provider_share: 0,
                platform_fee: 1
            }
        );
        assert_eq!(
            provider_split(199).unwrap(),
            Split {
                provider_share: 169,
                platform_fee: 30
            }
        );
        assert_eq!(
            provider_split(1_000_000_000).unwrap(),
            Split {
                provider_share: 850_000_000,
                platform_fee: 150_000_000
            }
        );
    }

    #[test]
    fn split_rejects_non_positive_prices() {
        assert!(provider_split(0).is_err());
        assert!(provider_split(-10).is_err());
    }

    #[test]
    fn split_does_not_overflow_at_the_top_of_the_range() {
        let split = provider_split(i64::MAX).unwrap();
        assert_eq!(split.provider_share + split.platform_fee, i64::MAX);
    }

    proptest! {
        #[test]
        fn split_is_exact_and_floored(price in 1i64..=1_000_000_000) {
            let split = provider_split(price).unwrap();
            prop_assert_eq!(split.provider_share + split.platform_fee, price);
            prop_assert_eq!(split.provider_share, price * 85 / 100);
            prop_assert!(split.platform_fee >= 0);
            prop_assert!(split.provider_share <= price);
        }
    }
}
