use crate::error::EvalError;
use crate::model::PriceObservation;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Absolute delta a move has to exceed before it is alerted on.
pub const ALERT_THRESHOLD: Decimal = Decimal::TWO;

const DELTA_DECIMALS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Surge,
    Drop,
    Stable,
}

impl Classification {
    /// Strict comparison: a delta of exactly +/-2.00 is `Stable`.
    pub fn from_delta(delta: Decimal) -> Self {
        if delta > ALERT_THRESHOLD {
            Classification::Surge
        } else if delta < -ALERT_THRESHOLD {
            Classification::Drop
        } else {
            Classification::Stable
        }
    }
}

/// How the delta is rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundingMode {
    /// Banker's rounding: 2.005 -> 2.00, 2.015 -> 2.02.
    #[default]
    HalfEven,
    /// Midpoints away from zero: 2.005 -> 2.01, -2.005 -> -2.01.
    HalfUp,
}

impl RoundingMode {
    pub fn round(&self, value: Decimal) -> Decimal {
        let strategy = match self {
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
        };
        value.round_dp_with_strategy(DELTA_DECIMALS, strategy)
    }
}

impl FromStr for RoundingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "half-even" | "even" => Ok(RoundingMode::HalfEven),
            "half-up" | "up" => Ok(RoundingMode::HalfUp),
            other => Err(format!("invalid rounding mode: {} (expected half-even or half-up)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendResult {
    pub symbol: String,
    pub current: Decimal,
    pub previous: Decimal,
    pub delta: Decimal,
    pub classification: Classification,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrendEvaluator {
    rounding: RoundingMode,
}

impl TrendEvaluator {
    pub fn new(rounding: RoundingMode) -> Self {
        Self { rounding }
    }

    /// Compares the last two closes of `observations`, which must be in time order.
    pub fn evaluate(
        &self,
        symbol: &str,
        observations: &[PriceObservation],
    ) -> Result<TrendResult, EvalError> {
        let [.., previous, current] = observations else {
            return Err(EvalError::InsufficientData {
                found: observations.len(),
            });
        };

        let delta = self.rounding.round(current.close - previous.close);

        Ok(TrendResult {
            symbol: symbol.to_string(),
            current: current.close,
            previous: previous.close,
            delta,
            classification: Classification::from_delta(delta),
        })
    }
}
