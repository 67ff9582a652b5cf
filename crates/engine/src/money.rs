use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Number of fractional units in one whole unit (`10^15`).
///
/// Large enough for crypto currencies with many decimal places and for
/// compounding rate multiplication without precision loss.
pub const SCALE: u64 = 1_000_000_000_000_000;

const SCALE_I: i128 = SCALE as i128;
const HALF_SCALE: i128 = SCALE_I / 2;

/// Signed fixed-point money value, represented as an `{int, frac}` pair.
///
/// Use this type for **all** monetary values in the engine (balances, line
/// amounts, rates, percentages) to avoid floating-point drift.
///
/// The value is `int + frac / SCALE` with `frac ∈ [0, SCALE)`. For negative
/// values `int` is the *floor*, so `frac` stays non-negative:
///
/// ```rust
/// use engine::Amount;
///
/// let a = Amount::from_decimal(-10.5).unwrap();
/// assert_eq!(a.int(), -11);
/// assert_eq!(a.frac(), engine::SCALE / 2);
/// assert_eq!(a.to_string(), "-10.5");
/// ```
///
/// This single-representation convention avoids the signed-zero ambiguity of
/// naive `(sign, magnitude)` pairs: every value has exactly one encoding, so
/// derived equality and ordering agree with numeric equality and ordering.
///
/// Parsing from user input (accepts `.` or `,` as decimal separator; rejects
/// more than 15 decimals):
///
/// ```rust
/// use engine::Amount;
///
/// assert_eq!("10,5".parse::<Amount>().unwrap(), Amount::from_decimal(10.5).unwrap());
/// assert!("1.0000000000000001".parse::<Amount>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount {
    int: i64,
    frac: u64,
}

impl Amount {
    pub const ZERO: Amount = Amount { int: 0, frac: 0 };
    pub const ONE: Amount = Amount { int: 1, frac: 0 };

    /// Creates an amount from its integer part and fractional units.
    ///
    /// Rejects `frac >= SCALE`.
    pub fn new(int: i64, frac: u64) -> ResultEngine<Self> {
        if frac >= SCALE {
            return Err(EngineError::InvalidAmount(format!(
                "frac must be < {SCALE}, got {frac}"
            )));
        }
        Ok(Self { int, frac })
    }

    /// Integer part (the floor of the value).
    #[must_use]
    pub const fn int(self) -> i64 {
        self.int
    }

    /// Fractional part in `[0, SCALE)`, non-negative even for negative values.
    #[must_use]
    pub const fn frac(self) -> u64 {
        self.frac
    }

    /// Total value in fractional units. Never overflows: `|int| * SCALE + frac`
    /// is far below `i128::MAX`.
    const fn units(self) -> i128 {
        self.int as i128 * SCALE_I + self.frac as i128
    }

    fn from_units(units: i128) -> ResultEngine<Self> {
        let int = i64::try_from(units.div_euclid(SCALE_I))
            .map_err(|_| EngineError::InvalidAmount("amount too large".to_string()))?;
        #[allow(clippy::cast_sign_loss)]
        let frac = units.rem_euclid(SCALE_I) as u64;
        Ok(Self { int, frac })
    }

    /// Converts a decimal value into fixed-point, rounding to the nearest
    /// representable value.
    ///
    /// Round-trips with [`to_decimal`](Self::to_decimal) within f64 epsilon
    /// for all representable monetary values.
    pub fn from_decimal(value: f64) -> ResultEngine<Self> {
        if !value.is_finite() {
            return Err(EngineError::InvalidAmount(
                "amount must be finite".to_string(),
            ));
        }
        let floor = value.floor();
        if floor < i64::MIN as f64 || floor >= i64::MAX as f64 {
            return Err(EngineError::InvalidAmount("amount too large".to_string()));
        }
        let mut int = floor as i64;
        #[allow(clippy::cast_sign_loss)]
        let mut frac = ((value - floor) * SCALE as f64).round() as u64;
        if frac >= SCALE {
            frac -= SCALE;
            int = int
                .checked_add(1)
                .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))?;
        }
        Ok(Self { int, frac })
    }

    /// Converts back to a decimal value for display and interchange.
    #[must_use]
    pub fn to_decimal(self) -> f64 {
        self.int as f64 + self.frac as f64 / SCALE as f64
    }

    /// Lossless conversion from the legacy encoding: a single integer scaled
    /// by a currency's decimal-places count (e.g. `1250` with 2 places is
    /// `12.50`).
    ///
    /// One-way and import-time only; the `{int, frac}` pair is canonical.
    pub fn from_minor_units(scaled: i64, decimal_places: u8) -> ResultEngine<Self> {
        if u32::from(decimal_places) > 15 {
            return Err(EngineError::InvalidAmount(format!(
                "decimal places must be <= 15, got {decimal_places}"
            )));
        }
        let pow = 10i64.pow(u32::from(decimal_places));
        let int = scaled.div_euclid(pow);
        #[allow(clippy::cast_sign_loss)]
        let rem = scaled.rem_euclid(pow) as u64;
        Ok(Self {
            int,
            frac: rem * (SCALE / pow as u64),
        })
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.int == 0 && self.frac == 0
    }

    /// Returns `true` if the amount is strictly positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.int > 0 || (self.int == 0 && self.frac > 0)
    }

    /// Returns `true` if the amount is strictly negative.
    ///
    /// With the floor convention this is exactly `int < 0`.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.int < 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        Self::from_units(self.units() + rhs.units()).ok()
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        Self::from_units(self.units() - rhs.units()).ok()
    }

    /// Checked negation (returns `None` on overflow).
    #[must_use]
    pub fn checked_neg(self) -> Option<Amount> {
        Self::from_units(-self.units()).ok()
    }

    /// Absolute value.
    #[must_use]
    pub fn abs(self) -> Amount {
        if self.is_negative() { -self } else { self }
    }

    /// Fixed-point multiplication, rounding half away from zero at `SCALE`.
    ///
    /// Used for percentage add-ons and for valuing a line through its rate
    /// snapshot.
    pub fn checked_mul(self, rhs: Amount) -> ResultEngine<Amount> {
        let prod = self
            .units()
            .checked_mul(rhs.units())
            .ok_or_else(|| EngineError::InvalidAmount("amount overflow".to_string()))?;
        let rounded = if prod >= 0 {
            (prod + HALF_SCALE) / SCALE_I
        } else {
            (prod - HALF_SCALE) / SCALE_I
        };
        Self::from_units(rounded)
    }

    /// Fixed-point division, rounding half away from zero at `SCALE`.
    ///
    /// Used to derive implied exchange rates from realized amounts.
    pub fn checked_div(self, rhs: Amount) -> ResultEngine<Amount> {
        if rhs.is_zero() {
            return Err(EngineError::InvalidAmount("division by zero".to_string()));
        }
        let num = self
            .units()
            .checked_mul(SCALE_I)
            .ok_or_else(|| EngineError::InvalidAmount("amount overflow".to_string()))?;
        let den = rhs.units();
        let quot = num / den;
        let rem = num % den;
        let adjust = if rem.abs() * 2 >= den.abs() {
            if (num < 0) == (den < 0) { 1 } else { -1 }
        } else {
            0
        };
        Self::from_units(quot + adjust)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = self.units();
        let sign = if units < 0 { "-" } else { "" };
        let magnitude = units.unsigned_abs();
        let whole = magnitude / SCALE as u128;
        let frac = magnitude % SCALE as u128;
        if frac == 0 {
            write!(f, "{sign}{whole}")
        } else {
            let digits = format!("{frac:015}");
            write!(f, "{sign}{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}

impl Add for Amount {
    type Output = Amount;

    /// Pair addition with explicit carry into `int`.
    ///
    /// # Panics
    ///
    /// Panics on `i64` overflow of the integer part; use
    /// [`checked_add`](Self::checked_add) for fallible arithmetic.
    fn add(self, rhs: Amount) -> Self::Output {
        let mut int = self.int + rhs.int;
        let mut frac = self.frac + rhs.frac;
        if frac >= SCALE {
            frac -= SCALE;
            int += 1;
        }
        Amount { int, frac }
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        *self = *self + rhs;
    }
}

impl Sub for Amount {
    type Output = Amount;

    /// Pair subtraction with explicit borrow from `int`.
    ///
    /// # Panics
    ///
    /// Panics on `i64` overflow of the integer part; use
    /// [`checked_sub`](Self::checked_sub) for fallible arithmetic.
    fn sub(self, rhs: Amount) -> Self::Output {
        let int = self.int - rhs.int;
        if self.frac >= rhs.frac {
            Amount {
                int,
                frac: self.frac - rhs.frac,
            }
        } else {
            Amount {
                int: int - 1,
                frac: self.frac + SCALE - rhs.frac,
            }
        }
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        *self = *self - rhs;
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Self::Output {
        if self.frac == 0 {
            Amount {
                int: -self.int,
                frac: 0,
            }
        } else {
            Amount {
                int: -self.int - 1,
                frac: SCALE - self.frac,
            }
        }
    }
}

impl FromStr for Amount {
    type Err = EngineError;

    /// Parses a decimal string into fixed-point.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading
    /// `+`/`-`.
    ///
    /// Validation rules:
    /// - max 15 fractional digits
    /// - rejects empty/invalid strings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let empty = || EngineError::InvalidAmount("empty amount".to_string());
        let invalid = || EngineError::InvalidAmount("invalid amount".to_string());
        let overflow = || EngineError::InvalidAmount("amount too large".to_string());

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(empty());
        }

        let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (true, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (false, stripped)
        } else {
            (false, trimmed)
        };

        let rest = rest.trim();
        if rest.is_empty() {
            return Err(empty());
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

        let frac: u64 = match frac_str {
            None | Some("") => 0,
            Some(digits) => {
                if !digits.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                if digits.len() > 15 {
                    return Err(EngineError::InvalidAmount(
                        "too many decimals".to_string(),
                    ));
                }
                let parsed: u64 = digits.parse().map_err(|_| invalid())?;
                parsed * 10u64.pow(15 - digits.len() as u32)
            }
        };

        let magnitude = (whole as i128)
            .checked_mul(SCALE_I)
            .and_then(|v| v.checked_add(frac as i128))
            .ok_or_else(overflow)?;
        let units = if negative { -magnitude } else { magnitude };

        Self::from_units(units)
    }
}
