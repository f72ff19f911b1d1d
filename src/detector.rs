//! Streak detection and breakout classification.
//!
//! A streak is a maximal run of same-color candles whose closes keep making
//! progress in the run's direction (a momentum condition, not merely a color
//! match). When a run terminates, the candle that broke it is classified
//! against the run's terminal extremes as a reversal, continuation, or
//! dual-break, with penetration depth and next-candle confirmation.
//!
//! Rules, in evaluation order:
//!
//! 1. Only runs of **exactly** the configured length emit; longer runs never
//!    retroactively emit at a shorter sub-length.
//! 2. The full-run move percent must clear `min_move_percent`.
//! 3. At least one extreme must have been broken by the breakout candle,
//!    except for the end-of-series tail run, which emits unclassified.
//!
//! The detection pass is a single left-to-right O(n) scan; emitted streaks
//! never overlap, and the candle that breaks a run immediately seeds the
//! next one when its color passes the filter.

use crate::{
    config::DetectorConfig, sim::round2, Candle, CandleColor, Result,
};

/// Penetration (points beyond the broken extreme) at or above which a
/// breakout counts as strong even without next-candle confirmation.
/// Domain constant, not user-configurable.
pub const STRONG_PENETRATION: f64 = 6.0;

// ============================================================
// STREAK
// ============================================================

/// How the candle after a dual-break candle resolved the ambiguity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolResolution {
    /// Closed/extended beyond the breakout candle's high only.
    High,
    /// Extended beyond the breakout candle's low only.
    Low,
    /// Extended beyond both.
    Both,
    /// Stayed inside the breakout candle's range.
    Inside,
}

/// A detected streak: a read-only snapshot, never mutated after creation.
///
/// `extreme_high`/`extreme_low` are the high/low of the run's **final**
/// candle; for a momentum run these are the levels the run ends on and the
/// levels the breakout candle is classified against. Follow-up candles are
/// referenced by index into the caller's series rather than copied.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Streak {
    /// Index of the first candle of the run.
    pub start_index: usize,
    /// Run length; always equals the configured `min_streak` exactly.
    pub length: usize,
    pub direction: CandleColor,
    /// Full-run (max high - min low) / min low, in percent, 2 decimals.
    pub move_percent: f64,
    /// High of the run's final candle.
    pub extreme_high: f64,
    /// Low of the run's final candle.
    pub extreme_low: f64,
    /// Index of the breakout candle (first candle after the run).
    /// `None` only for the end-of-series tail run.
    pub breakout_index: Option<usize>,
    /// Index of the candle after the breakout candle, when one exists.
    pub next_after_index: Option<usize>,
    /// True when the breakout candle breached at least one extreme.
    pub broke_extreme: bool,
    /// Breakout breached the extreme opposite the run's direction.
    /// Always false on a dual break; `vol_resolution` governs there.
    pub is_reversal: bool,
    /// Breakout breached the extreme in the run's direction.
    /// Always false on a dual break.
    pub is_continuation: bool,
    /// Breakout breached both extremes on the same bar.
    pub is_dual_break: bool,
    /// Resolution of a dual break by the following candle, when present.
    pub vol_resolution: Option<VolResolution>,
    /// Points beyond the broken extreme, >= 0; reversal side on a dual break.
    pub penetration: f64,
    /// The candle after the breakout closed further in the break direction.
    pub confirmed_by_next: bool,
    /// `penetration >= 6` or confirmed by the next candle.
    pub is_strong: bool,
}

impl Streak {
    /// The breakout candle resolved against the series this streak came from.
    pub fn breakout_candle<'a>(&self, candles: &'a [Candle]) -> Option<&'a Candle> {
        self.breakout_index.and_then(|i| candles.get(i))
    }

    /// The confirmation candle resolved against the originating series.
    pub fn next_after_candle<'a>(&self, candles: &'a [Candle]) -> Option<&'a Candle> {
        self.next_after_index.and_then(|i| candles.get(i))
    }
}

// ============================================================
// RUN ACCUMULATOR
// ============================================================

/// Open run state: an explicit accumulator rather than loose counters, so
/// the extension rule is a pure, testable predicate.
#[derive(Debug, Clone)]
struct Run {
    start: usize,
    color: CandleColor,
    len: usize,
    max_high: f64,
    min_low: f64,
    last_high: f64,
    last_low: f64,
    last_close: f64,
}

impl Run {
    /// Seed a run from a candle, subject to the direction filter.
    /// Dojis never seed.
    fn seed(index: usize, candle: &Candle, config: &DetectorConfig) -> Option<Run> {
        let color = candle.color()?;
        if !config.direction.admits(color) {
            return None;
        }
        Some(Run {
            start: index,
            color,
            len: 1,
            max_high: candle.high,
            min_low: candle.low,
            last_high: candle.high,
            last_low: candle.low,
            last_close: candle.close,
        })
    }

    /// Momentum continuation rule: same color AND strictly further close.
    fn extends(&self, candle: &Candle) -> bool {
        match self.color {
            CandleColor::Green => candle.is_green() && candle.close > self.last_close,
            CandleColor::Red => candle.is_red() && candle.close < self.last_close,
        }
    }

    fn push(&mut self, candle: &Candle) {
        self.len += 1;
        self.max_high = self.max_high.max(candle.high);
        self.min_low = self.min_low.min(candle.low);
        self.last_high = candle.high;
        self.last_low = candle.low;
        self.last_close = candle.close;
    }

    fn move_percent(&self) -> f64 {
        (self.max_high - self.min_low) / self.min_low * 100.0
    }
}

// ============================================================
// DETECTION
// ============================================================

/// Scan the series and return every qualifying streak, in index order.
///
/// Fails only on contract violations: an unsorted series or an invalid
/// config. An empty series yields an empty list.
pub fn detect_streaks(candles: &[Candle], config: &DetectorConfig) -> Result<Vec<Streak>> {
    config.validate()?;
    crate::verify_sorted(candles)?;

    let mut streaks = Vec::new();
    let mut run: Option<Run> = None;

    for (i, candle) in candles.iter().enumerate() {
        match run.as_mut() {
            None => run = Run::seed(i, candle, config),
            Some(open) => {
                if open.extends(candle) {
                    open.push(candle);
                } else {
                    if let Some(streak) = close_run(open, i, candles, config) {
                        streaks.push(streak);
                    }
                    // The breaking candle seeds the next run.
                    run = Run::seed(i, candle, config);
                }
            }
        }
    }

    // Unterminated tail run: emitted without breakout classification.
    if let Some(open) = run {
        if open.len == config.min_streak.get() && open.move_percent() >= config.min_move_percent {
            streaks.push(tail_streak(&open));
        }
    }

    Ok(streaks)
}

/// Classify a closed run against its breakout candle at `break_index`.
/// Returns `None` when the run fails the length/move filters or the breakout
/// candle stayed fully inside the run's terminal range.
fn close_run(
    run: &Run,
    break_index: usize,
    candles: &[Candle],
    config: &DetectorConfig,
) -> Option<Streak> {
    if run.len != config.min_streak.get() {
        return None;
    }
    let move_percent = run.move_percent();
    if move_percent < config.min_move_percent {
        return None;
    }

    let breakout = &candles[break_index];
    let next_after = candles.get(break_index + 1);
    let green = run.color == CandleColor::Green;

    // Break checks run against the final candle's extremes.
    let broke_reversal = if green {
        breakout.low < run.last_low
    } else {
        breakout.high > run.last_high
    };
    let broke_continuation = if green {
        breakout.high > run.last_high
    } else {
        breakout.low < run.last_low
    };

    if !broke_reversal && !broke_continuation {
        return None;
    }

    let is_dual_break = broke_reversal && broke_continuation;

    // Penetration from the broken extreme; the reversal side wins on a dual
    // break, preserving evaluation order.
    let penetration = if broke_reversal {
        if green {
            run.last_low - breakout.low
        } else {
            breakout.high - run.last_high
        }
    } else if green {
        breakout.high - run.last_high
    } else {
        run.last_low - breakout.low
    };
    let penetration = round2(penetration);

    let confirmed_by_next = next_after.is_some_and(|na| {
        if broke_reversal {
            if green {
                na.close < breakout.close
            } else {
                na.close > breakout.close
            }
        } else if green {
            na.close > breakout.close
        } else {
            na.close < breakout.close
        }
    });

    let vol_resolution = if is_dual_break {
        next_after.map(|na| {
            let broke_vol_high = na.high > breakout.high;
            let broke_vol_low = na.low < breakout.low;
            match (broke_vol_high, broke_vol_low) {
                (true, false) => VolResolution::High,
                (false, true) => VolResolution::Low,
                (true, true) => VolResolution::Both,
                (false, false) => VolResolution::Inside,
            }
        })
    } else {
        None
    };

    Some(Streak {
        start_index: break_index - run.len,
        length: run.len,
        direction: run.color,
        move_percent: round2(move_percent),
        extreme_high: run.last_high,
        extreme_low: run.last_low,
        breakout_index: Some(break_index),
        next_after_index: next_after.map(|_| break_index + 1),
        broke_extreme: true,
        is_reversal: broke_reversal && !is_dual_break,
        is_continuation: broke_continuation && !is_dual_break,
        is_dual_break,
        vol_resolution,
        penetration,
        confirmed_by_next,
        is_strong: penetration >= STRONG_PENETRATION || confirmed_by_next,
    })
}

fn tail_streak(run: &Run) -> Streak {
    Streak {
        start_index: run.start,
        length: run.len,
        direction: run.color,
        move_percent: round2(run.move_percent()),
        extreme_high: run.last_high,
        extreme_low: run.last_low,
        breakout_index: None,
        next_after_index: None,
        broke_extreme: false,
        is_reversal: false,
        is_continuation: false,
        is_dual_break: false,
        vol_resolution: None,
        penetration: 0.0,
        confirmed_by_next: false,
        is_strong: false,
    }
}

// ============================================================
// TESTS
// ============================================================
