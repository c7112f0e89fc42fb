use std::{
    fmt,
    ops::Sub,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{EngineError, Percentage, ResultEngine};

/// Signed money amount represented as **integer cents**.
///
/// Use this type for **all** monetary values in the engine (expense amounts,
/// allocation amounts, paid amounts) to avoid floating-point drift.
///
/// # Examples
///
/// ```rust
/// use engine::MoneyCents;
///
/// let amount = MoneyCents::new(12_34);
/// assert_eq!(amount.cents(), 1234);
/// assert_eq!(amount.to_string(), "12.34€");
/// ```
///
/// Parsing from user input (accepts `.` or `,` as decimal separator; rejects >
/// 2 decimals):
///
/// ```rust
/// use engine::MoneyCents;
///
/// assert_eq!("10".parse::<MoneyCents>().unwrap().cents(), 1000);
/// assert_eq!("10,5".parse::<MoneyCents>().unwrap().cents(), 1050);
/// assert!("12.345".parse::<MoneyCents>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    pub const ZERO: MoneyCents = MoneyCents(0);

    /// Creates a new amount from integer cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the raw value in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_add(rhs.0).map(MoneyCents)
    }

    /// The part of `self` that `pct` represents, rounded half away from zero
    /// to the cent.
    ///
    /// ```rust
    /// use engine::{MoneyCents, Percentage};
    ///
    /// let total = MoneyCents::new(100_00);
    /// assert_eq!(total.share(Percentage::from_percent(50)).unwrap().cents(), 50_00);
    /// assert_eq!(total.share(Percentage::from_units(333_333)).unwrap().cents(), 33_33);
    /// ```
    pub fn share(self, pct: Percentage) -> ResultEngine<MoneyCents> {
        let num = i128::from(self.0) * i128::from(pct.units());
        let den = i128::from(Percentage::HUNDRED.units());
        narrow(div_round_half_away(num, den))
    }

    /// Scales `self` by `to / from`, rounded half away from zero to the cent.
    ///
    /// Used when an expense amount changes and every allocation must keep its
    /// share of the new total.
    pub fn rescale(self, from: MoneyCents, to: MoneyCents) -> ResultEngine<MoneyCents> {
        if from.is_zero() {
            return Err(EngineError::InvalidAmount(
                "cannot rescale from a zero amount".to_string(),
            ));
        }
        let num = i128::from(self.0) * i128::from(to.0);
        narrow(div_round_half_away(num, i128::from(from.0)))
    }
}

fn div_round_half_away(num: i128, den: i128) -> i128 {
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    let quotient = num / den;
    let rest = num % den;
    if 2 * rest.abs() >= den {
        quotient + num.signum()
    } else {
        quotient
    }
}

fn narrow(value: i128) -> ResultEngine<MoneyCents> {
    i64::try_from(value)
        .map(MoneyCents)
        .map_err(|_| EngineError::InvalidAmount("amount too large".to_string()))
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let euros = abs / 100;
        let cents = abs % 100;
        write!(f, "{sign}{euros}.{cents:02}€")
    }
}

impl Sub for MoneyCents {
    type Output = MoneyCents;

    fn sub(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 - rhs.0)
    }
}

impl FromStr for MoneyCents {
    type Err = EngineError;

    /// Parses a decimal string into cents.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    ///
    /// Validation rules:
    /// - max 2 fractional digits (rejects `12.345`)
    /// - rejects empty/invalid strings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let empty = || EngineError::InvalidAmount("empty amount".to_string());
        let invalid = || EngineError::InvalidAmount("invalid amount".to_string());
        let overflow = || EngineError::InvalidAmount("amount too large".to_string());

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(empty());
        }

        let (sign, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (-1i64, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (1i64, stripped)
        } else {
            (1i64, trimmed)
        };

        let rest = rest.trim();
        if rest.is_empty() {
            return Err(empty());
        }

        let rest = rest.replace(',', ".");
        let mut parts = rest.split('.');
        let euros_str = parts
            .next()
            .ok_or_else(invalid)?;
        let cents_str = parts.next();

        if parts.next().is_some() {
            return Err(invalid());
        }

        if euros_str.is_empty() || !euros_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let euros: i64 = euros_str
            .parse()
            .map_err(|_| invalid())?;

        let cents: i64 = match cents_str {
            None => 0,
            Some("") => 0,
            Some(frac) => {
                if !frac.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                match frac.len() {
                    0 => 0,
                    1 => {
                        frac.parse::<i64>()
                            .map_err(|_| invalid())?
                            * 10
                    }
                    2 => frac
                        .parse::<i64>()
                        .map_err(|_| invalid())?,
                    _ => return Err(EngineError::InvalidAmount("too many decimals".to_string())),
                }
            }
        };

        let total = euros
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(overflow)?;

        let signed = if sign < 0 {
            total.checked_neg().ok_or_else(overflow)?
        } else {
            total
        };

        Ok(MoneyCents(signed))
    }
}
