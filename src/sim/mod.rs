//! Trade simulators and their shared types.
//!
//! Two independent strategies run over the same candle data:
//!
//! - [`level_break`]: one trade per detected streak, resolved by a forward
//!   scan with an optional continuously-ratcheting trailing stop and a
//!   20-target risk-multiple sweep.
//! - [`reversal`]: a stateful multi-position engine that re-derives runs from
//!   raw candle colors and manages setups, entries, and stair-step trailing
//!   stops under a fixed concurrency cap.
//!
//! Neither simulator mutates its input or the other's state; both produce
//! owned [`Trade`] collections.

pub mod level_break;
pub mod reversal;

use crate::Candle;

/// Number of integer risk-multiple targets tracked per trade (1R..=20R).
pub const RR_LEVELS: usize = 20;

/// Round to 2 decimals, the precision all monetary outputs are reported at.
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to 1 decimal, used for percentage reporting.
#[inline]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ============================================================
// TRADE
// ============================================================

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeDirection {
    Long,
    Short,
}

impl TradeDirection {
    /// Signed pnl for an exit at `exit_price` from `entry_price`.
    #[inline]
    pub fn pnl(self, entry_price: f64, exit_price: f64) -> f64 {
        match self {
            TradeDirection::Long => exit_price - entry_price,
            TradeDirection::Short => entry_price - exit_price,
        }
    }
}

/// Why a trade closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitReason {
    /// Stop-loss hit at or below breakeven.
    Sl,
    /// Stop hit after it had ratcheted into profit.
    Trail,
    /// Forward window exhausted; closed at the last available close.
    Time,
}

/// A closed trade. Immutable once appended to a trade collection.
///
/// `rr_hits[r-1]` records whether the `r`-multiple target was touched before
/// the stop level; the reversal engine does not run the sweep and leaves the
/// array all-false.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Trade {
    pub entry_price: f64,
    pub entry_time: i64,
    pub entry_time_original: Option<String>,
    pub exit_price: f64,
    pub exit_time: i64,
    pub exit_time_original: Option<String>,
    pub pnl: f64,
    pub exit_reason: ExitReason,
    /// True when the stop moved off its initial level before exit.
    pub trailed: bool,
    pub direction: TradeDirection,
    /// Initial entry-to-stop distance (the trade's 1R).
    pub sl_distance: f64,
    /// Stop level at exit time.
    pub final_sl: f64,
    pub rr_hits: [bool; RR_LEVELS],
}

impl Trade {
    /// Whether the `r`-multiple target (1-based, `1..=20`) was reached.
    #[inline]
    pub fn rr_hit(&self, r: usize) -> bool {
        r >= 1 && r <= RR_LEVELS && self.rr_hits[r - 1]
    }
}

/// Copy a candle's source timestamp for a trade record.
#[inline]
pub(crate) fn original_ts(candle: &Candle) -> Option<String> {
    candle.original_timestamp.clone()
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.006), 1.01);
        assert_eq!(round2(101.4999), 101.5);
        assert_eq!(round2(-0.125), -0.13);
    }

    #[test]
    fn test_direction_pnl() {
        assert_eq!(TradeDirection::Long.pnl(100.0, 105.0), 5.0);
        assert_eq!(TradeDirection::Long.pnl(100.0, 95.0), -5.0);
        assert_eq!(TradeDirection::Short.pnl(100.0, 95.0), 5.0);
        assert_eq!(TradeDirection::Short.pnl(100.0, 105.0), -5.0);
    }

    #[test]
    fn test_rr_hit_bounds() {
        let mut trade = Trade {
            entry_price: 100.0,
            entry_time: 0,
            entry_time_original: None,
            exit_price: 110.0,
            exit_time: 60,
            exit_time_original: None,
            pnl: 10.0,
            exit_reason: ExitReason::Time,
            trailed: false,
            direction: TradeDirection::Long,
            sl_distance: 5.0,
            final_sl: 95.0,
            rr_hits: [false; RR_LEVELS],
        };
        trade.rr_hits[0] = true;
        trade.rr_hits[19] = true;

        assert!(trade.rr_hit(1));
        assert!(trade.rr_hit(20));
        assert!(!trade.rr_hit(2));
        assert!(!trade.rr_hit(0));
        assert!(!trade.rr_hit(21));
    }
}
