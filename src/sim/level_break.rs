//! Level-break simulator: one trade per detected streak.
//!
//! For each streak, the strategy type crossed with the streak's color picks a
//! side, the breakout candle anchors the entry, and a forward scan over the
//! remaining series resolves the trade. Trades are independent of each other,
//! so streak resolution fans out across a rayon thread pool; the output
//! collection keeps streak order.
//!
//! Execution realism constants (entry buffer, slippage, minimum trail
//! clearance) are preserved from the system of record and exposed as named
//! constants. They are tunables of record, not configuration.

use rayon::prelude::*;

use crate::{
    config::{LevelBreakConfig, SlMode, StrategyType},
    detector::Streak,
    sim::{original_ts, round2, ExitReason, Trade, TradeDirection, RR_LEVELS},
    stats::{summarize, Summary},
    Candle, CandleColor, Result,
};

/// Points past the broken level at which a stop-order fill is assumed when
/// the breakout candle opened on the wrong side of the level.
pub const ENTRY_BUFFER: f64 = 0.5;
/// Execution slippage applied against the trader at entry.
pub const ENTRY_SLIPPAGE: f64 = 0.1;
/// Execution slippage applied against the trader at a stop exit.
pub const EXIT_SLIPPAGE: f64 = 0.2;
/// A trailed stop must clear the original stop by at least this much,
/// preventing premature moves to breakeven.
pub const MIN_TRAIL_CLEARANCE: f64 = 2.0;

/// Result of a level-break simulation run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LevelBreakOutcome {
    /// One resolved trade per streak that produced a valid breakout entry,
    /// in streak order.
    pub trades: Vec<Trade>,
    /// Aggregate statistics over `trades`.
    pub summary: Summary,
    /// Whether trailing was enabled for this run.
    pub trail_active: bool,
}

/// Simulate the level-break strategy over `streaks`.
///
/// Streaks without a breakout candle (end-of-series tails) and streaks whose
/// breakout never broke the traded side produce no trade. An empty streak
/// collection yields an outcome with a fully-zeroed [`Summary`].
pub fn simulate_level_break(
    streaks: &[Streak],
    candles: &[Candle],
    config: &LevelBreakConfig,
) -> Result<LevelBreakOutcome> {
    config.validate()?;
    crate::verify_sorted(candles)?;

    let trades: Vec<Trade> = streaks
        .par_iter()
        .filter_map(|streak| resolve_streak(streak, candles, config))
        .collect();

    let summary = summarize(&trades);

    Ok(LevelBreakOutcome {
        trades,
        summary,
        trail_active: config.trail.is_some(),
    })
}

/// Derive and resolve the single trade a streak can produce.
fn resolve_streak(streak: &Streak, candles: &[Candle], config: &LevelBreakConfig) -> Option<Trade> {
    let breakout_idx = streak.breakout_index?;
    let breakout = candles.get(breakout_idx)?;

    let level_high = streak.extreme_high;
    let level_low = streak.extreme_low;

    let is_reversal = config.strategy == StrategyType::Reversal;
    let expect_long = (is_reversal && streak.direction == CandleColor::Red)
        || (!is_reversal && streak.direction == CandleColor::Green);

    // Entry anchoring: open already beyond the level fills at open; otherwise
    // the stop-order fills a small buffer beyond the level. Slippage is then
    // applied against the trader.
    let (direction, entry, stop_loss) = if expect_long && breakout.high > level_high {
        let raw = if breakout.open >= level_high {
            breakout.open
        } else {
            level_high + ENTRY_BUFFER
        };
        let entry = raw + ENTRY_SLIPPAGE;
        let stop = match config.sl_mode {
            SlMode::Fixed => entry - config.fixed_points,
            SlMode::Entry | SlMode::Last => level_low,
        };
        (TradeDirection::Long, entry, stop)
    } else if !expect_long && breakout.low < level_low {
        let raw = if breakout.open <= level_low {
            breakout.open
        } else {
            level_low - ENTRY_BUFFER
        };
        let entry = raw - ENTRY_SLIPPAGE;
        let stop = match config.sl_mode {
            SlMode::Fixed => entry + config.fixed_points,
            SlMode::Entry | SlMode::Last => level_high,
        };
        (TradeDirection::Short, entry, stop)
    } else {
        // Breakout went the other way; this streak is not traded.
        return None;
    };

    let risk = (entry - stop_loss).abs();
    let future = &candles[breakout_idx + 1..];

    let mut sl = stop_loss;
    let mut trailed = false;
    let mut exited = false;
    let mut exit_price = entry;
    let mut exit_candle = breakout;
    let mut reason = ExitReason::Sl;

    // Same-bar invalidation: a breakout candle that also breaches the stop
    // side closes the trade immediately and never reaches the forward scan.
    let breakout_stopped = match direction {
        TradeDirection::Long => breakout.low <= sl,
        TradeDirection::Short => breakout.high >= sl,
    };
    if breakout_stopped {
        exit_price = match direction {
            TradeDirection::Long => sl - EXIT_SLIPPAGE,
            TradeDirection::Short => sl + EXIT_SLIPPAGE,
        };
        exited = true;
    }

    if !exited {
        let mut best = entry;
        for candle in future {
            match direction {
                TradeDirection::Long => {
                    if candle.high > best {
                        best = candle.high;
                        if let Some(trail) = &config.trail {
                            let profit = best - entry;
                            if profit >= trail.trigger {
                                let new_sl = best - trail.trail_by;
                                let min_sl = stop_loss + MIN_TRAIL_CLEARANCE;
                                if new_sl > sl && new_sl >= min_sl {
                                    sl = new_sl;
                                    trailed = true;
                                }
                            }
                        }
                    }
                    if candle.low <= sl {
                        exit_price = sl - EXIT_SLIPPAGE;
                        exit_candle = candle;
                        reason = if trailed { ExitReason::Trail } else { ExitReason::Sl };
                        exited = true;
                        break;
                    }
                }
                TradeDirection::Short => {
                    if candle.low < best {
                        best = candle.low;
                        if let Some(trail) = &config.trail {
                            let profit = entry - best;
                            if profit >= trail.trigger {
                                let new_sl = best + trail.trail_by;
                                let max_sl = stop_loss - MIN_TRAIL_CLEARANCE;
                                if new_sl < sl && new_sl <= max_sl {
                                    sl = new_sl;
                                    trailed = true;
                                }
                            }
                        }
                    }
                    if candle.high >= sl {
                        exit_price = sl + EXIT_SLIPPAGE;
                        exit_candle = candle;
                        reason = if trailed { ExitReason::Trail } else { ExitReason::Sl };
                        exited = true;
                        break;
                    }
                }
            }
        }
    }

    // Boundary exhaustion: never leave a trade open. Without any forward
    // candle the breakout bar itself is the last available close.
    if !exited {
        let last = future.last().unwrap_or(breakout);
        exit_price = last.close;
        exit_candle = last;
        reason = ExitReason::Time;
    }

    let pnl = direction.pnl(entry, exit_price);
    let rr_hits = rr_sweep(direction, entry, stop_loss, risk, future);

    Some(Trade {
        entry_price: round2(entry),
        entry_time: breakout.time,
        entry_time_original: original_ts(breakout),
        exit_price: round2(exit_price),
        exit_time: exit_candle.time,
        exit_time_original: original_ts(exit_candle),
        pnl: round2(pnl),
        exit_reason: reason,
        trailed,
        direction,
        sl_distance: round2(risk),
        final_sl: round2(sl),
        rr_hits,
    })
}

/// Sweep the 20 integer risk-multiple targets, independent of the stop-exit
/// simulation. Each bucket scans forward until its target is touched or the
/// initial stop level is touched, whichever comes first.
fn rr_sweep(
    direction: TradeDirection,
    entry: f64,
    stop_loss: f64,
    risk: f64,
    future: &[Candle],
) -> [bool; RR_LEVELS] {
    let mut hits = [false; RR_LEVELS];
    for (slot, r) in hits.iter_mut().zip(1..=RR_LEVELS) {
        let target = match direction {
            TradeDirection::Long => entry + risk * r as f64,
            TradeDirection::Short => entry - risk * r as f64,
        };
        for candle in future {
            let target_hit = match direction {
                TradeDirection::Long => candle.high >= target,
                TradeDirection::Short => candle.low <= target,
            };
            if target_hit {
                *slot = true;
                break;
            }
            let stopped = match direction {
                TradeDirection::Long => candle.low <= stop_loss,
                TradeDirection::Short => candle.high >= stop_loss,
            };
            if stopped {
                break;
            }
        }
    }
    hits
}

// ============================================================
// TESTS
// ============================================================
