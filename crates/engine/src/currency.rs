use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, SCALE};

/// A currency known to the ledger.
///
/// Currencies are open reference data (any code can be registered), unlike
/// [`SystemTag`](crate::SystemTag)s which are a closed set. Exactly one
/// currency should carry `is_payment_default`: it is the **reference
/// currency** every line's [`rate`](crate::Line::rate) snapshot is expressed
/// against.
///
/// ## Decimal places
///
/// `decimal_places` only drives display formatting; amounts are stored at
/// full [`SCALE`] precision regardless. The count may be *widened* when
/// observed data needs more precision than currently recorded, never
/// narrowed (see [`observe_decimal_places`](Self::observe_decimal_places)).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub id: Uuid,
    pub code: String,
    pub symbol: String,
    pub decimal_places: u8,
    pub is_fiat: bool,
    pub is_crypto: bool,
    pub is_payment_default: bool,
}

impl Currency {
    /// Creates a fiat currency.
    #[must_use]
    pub fn fiat(code: &str, symbol: &str, decimal_places: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.trim().to_ascii_uppercase(),
            symbol: symbol.to_string(),
            decimal_places,
            is_fiat: true,
            is_crypto: false,
            is_payment_default: false,
        }
    }

    /// Creates a crypto currency.
    #[must_use]
    pub fn crypto(code: &str, symbol: &str, decimal_places: u8) -> Self {
        Self {
            is_fiat: false,
            is_crypto: true,
            ..Self::fiat(code, symbol, decimal_places)
        }
    }

    /// Marks this currency as the reference/payment default.
    #[must_use]
    pub fn payment_default(mut self) -> Self {
        self.is_payment_default = true;
        self
    }

    /// Widens `decimal_places` if `observed` needs more precision.
    ///
    /// Narrowing never happens: recorded data may already rely on the wider
    /// display precision.
    pub fn observe_decimal_places(&mut self, observed: u8) {
        if observed > self.decimal_places {
            self.decimal_places = observed;
        }
    }

    /// Formats an amount with this currency's display precision and symbol,
    /// rounding half away from zero.
    #[must_use]
    pub fn format(&self, amount: Amount) -> String {
        let places = u32::from(self.decimal_places.min(15));
        let step = SCALE / 10u64.pow(places);
        let units = i128::from(amount.int()) * SCALE as i128 + i128::from(amount.frac());
        let step = step as i128;
        let scaled = if units >= 0 {
            (units + step / 2) / step
        } else {
            (units - step / 2) / step
        };
        let sign = if scaled < 0 { "-" } else { "" };
        let magnitude = scaled.unsigned_abs();
        let pow = 10u128.pow(places);
        let whole = magnitude / pow;
        if places == 0 {
            format!("{sign}{whole}{}", self.symbol)
        } else {
            let frac = magnitude % pow;
            format!(
                "{sign}{whole}.{frac:0width$}{}",
                self.symbol,
                width = places as usize
            )
        }
    }
}
