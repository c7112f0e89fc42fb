use std::{
    fmt,
    iter::Sum,
    ops::Add,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Number of fixed-point units in one percent.
pub const UNITS_PER_PERCENT: i64 = 10_000;

/// Signed percentage represented as **fixed-point units of 1/10 000 %**.
///
/// Every allocation share in the engine is a `Percentage`; `100%` is
/// `1_000_000` units. Four fractional digits are kept, which is the
/// precision of every split the engine computes.
///
/// # Examples
///
/// ```rust
/// use engine::Percentage;
///
/// let third = Percentage::HUNDRED.split_evenly(3);
/// assert_eq!(third[0].to_string(), "33.3333%");
/// assert_eq!(third[2].to_string(), "33.3334%");
/// assert_eq!(third.into_iter().sum::<Percentage>(), Percentage::HUNDRED);
/// ```
///
/// Parsing accepts `.` or `,` as decimal separator and an optional `%`:
///
/// ```rust
/// use engine::Percentage;
///
/// assert_eq!("12,5".parse::<Percentage>().unwrap().units(), 125_000);
/// assert_eq!("40%".parse::<Percentage>().unwrap(), Percentage::from_percent(40));
/// assert!("12.34567".parse::<Percentage>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Percentage(i64);

impl Percentage {
    pub const ZERO: Percentage = Percentage(0);
    pub const HUNDRED: Percentage = Percentage(100 * UNITS_PER_PERCENT);

    /// Creates a percentage from raw fixed-point units.
    #[must_use]
    pub const fn from_units(units: i64) -> Self {
        Self(units)
    }

    /// Creates a whole percentage (`from_percent(25)` is `25%`).
    #[must_use]
    pub const fn from_percent(percent: i64) -> Self {
        Self(percent * UNITS_PER_PERCENT)
    }

    /// Returns the raw fixed-point units.
    #[must_use]
    pub const fn units(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// What is left to reach `100%` (negative when `self` exceeds it).
    #[must_use]
    pub const fn remaining(self) -> Percentage {
        Percentage(Self::HUNDRED.0 - self.0)
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Percentage) -> Option<Percentage> {
        self.0.checked_add(rhs.0).map(Percentage)
    }

    /// Splits `self` into `parts` shares whose sum is exactly `self`.
    ///
    /// Every share is `self / parts` truncated to the unit; the leftover
    /// units are handed out one each to the trailing shares, so no two
    /// shares differ by more than one unit.
    #[must_use]
    pub fn split_evenly(self, parts: usize) -> Vec<Percentage> {
        if parts == 0 || self.0 <= 0 {
            return vec![Percentage::ZERO; parts];
        }
        let parts_i64 = parts as i64;
        let base = self.0 / parts_i64;
        let leftover = (self.0 % parts_i64) as usize;
        (0..parts)
            .map(|idx| {
                if idx >= parts - leftover {
                    Percentage(base + 1)
                } else {
                    Percentage(base)
                }
            })
            .collect()
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / UNITS_PER_PERCENT as u64;
        let frac = abs % UNITS_PER_PERCENT as u64;
        if frac == 0 {
            return write!(f, "{sign}{whole}%");
        }
        let frac = format!("{frac:04}");
        write!(f, "{sign}{whole}.{}%", frac.trim_end_matches('0'))
    }
}

impl Add for Percentage {
    type Output = Percentage;

    fn add(self, rhs: Percentage) -> Self::Output {
        Percentage(self.0 + rhs.0)
    }
}

impl Sum for Percentage {
    fn sum<I: Iterator<Item = Percentage>>(iter: I) -> Self {
        iter.fold(Percentage::ZERO, |acc, p| acc + p)
    }
}

impl FromStr for Percentage {
    type Err = EngineError;

    /// Parses a decimal string into fixed-point units.
    ///
    /// Accepts `.` or `,` as decimal separator, an optional leading `+`/`-`
    /// and an optional trailing `%`. At most 4 fractional digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidPercentage(format!("invalid percentage: {s:?}"));

        let trimmed = s.trim();
        let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
        let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (true, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (false, stripped)
        } else {
            (false, trimmed)
        };
        if rest.is_empty() {
            return Err(invalid());
        }

        let rest = rest.replace(',', ".");
        let mut parts = rest.split('.');
        let whole_str = parts.next().ok_or_else(invalid)?;
        let frac_str = parts.next();
        if parts.next().is_some() {
            return Err(invalid());
        }
        if whole_str.is_empty() || !whole_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let whole: i64 = whole_str.parse().map_err(|_| invalid())?;

        let frac: i64 = match frac_str {
            None | Some("") => 0,
            Some(frac) => {
                if !frac.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                if frac.len() > 4 {
                    return Err(EngineError::InvalidPercentage(format!(
                        "too many decimals: {s:?}"
                    )));
                }
                let padded = format!("{frac:0<4}");
                padded.parse().map_err(|_| invalid())?
            }
        };

        let units = whole
            .checked_mul(UNITS_PER_PERCENT)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(invalid)?;
        Ok(Percentage(if negative { -units } else { units }))
    }
}
