//! Streak-reversal engine: a stateful, multi-position simulator.
//!
//! Independent of the streak detector, this engine re-derives runs from raw
//! candle colors (green iff close > open, dojis count red) with a plain
//! counter, and drives a continuous setup -> entry -> trail -> exit state
//! machine per candle:
//!
//! - a red run of exactly the configured length arms a LONG setup at the
//!   triggering candle's open/low (mirror for green/SHORT);
//! - a waiting setup walks its reference level down each same-color candle
//!   that fails to close beyond it, pauses on the first opposite-color
//!   candle, and cancels when price then breaches its reference extreme;
//! - entry fires at the reference open when a candle closes beyond it, capped
//!   at [`MAX_OPEN_POSITIONS`] concurrent positions; over-cap entries are
//!   simply not taken (the setup stays waiting, nothing is queued);
//! - the stop ratchets toward profit in whole multiples of the trade's
//!   initial risk (`trail_distance`), producing a stair-step trail.
//!
//! Setups and positions live in id-addressed arenas; each candle walks a
//! newest-first snapshot and applies removals afterwards, so no index
//! shifting happens mid-iteration.

use crate::{
    config::ReversalConfig,
    sim::{original_ts, round2, ExitReason, Trade, TradeDirection, RR_LEVELS},
    Candle, CandleColor, Result,
};

/// Maximum simultaneously open positions.
pub const MAX_OPEN_POSITIONS: usize = 3;

// ============================================================
// SETUPS AND POSITIONS
// ============================================================

/// Lifecycle state of a setup. Only `Waiting` setups are evaluated; a setup
/// is marked `Consumed` the moment it converts to a position and the
/// post-walk sweep drops it from the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetupStatus {
    Waiting,
    Consumed,
}

/// A pending entry armed by a completed raw-color run.
///
/// `ref_extreme` is the triggering candle's low for a LONG setup and its
/// high for a SHORT setup; both references walk bar by bar until a candle
/// closes beyond `ref_open`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Setup {
    pub id: u64,
    pub ref_open: f64,
    pub ref_extreme: f64,
    pub pause_seen: bool,
    pub status: SetupStatus,
}

/// A live trade being managed by the engine.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Position {
    pub id: u64,
    pub direction: TradeDirection,
    pub entry_price: f64,
    pub entry_time: i64,
    pub entry_time_original: Option<String>,
    /// Ratchets monotonically toward profit; never loosens.
    pub current_sl: f64,
    /// Initial entry-to-stop distance; the stair-step trail unit.
    pub trail_distance: f64,
    pub entry_candle_index: usize,
    /// Favorable extreme of the entry candle, snapshotted at entry.
    pub previous_extreme: f64,
}

/// One row of the per-candle engine trace.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DebugRecord {
    pub time: i64,
    pub streak_count: usize,
    pub color: CandleColor,
    pub long_setups: usize,
    pub short_setups: usize,
    pub positions: usize,
}

/// Result of a streak-reversal run: closed trades in exit order plus the
/// per-candle trace. Positions still open at end of data are not reported as
/// trades; the final debug record carries the residual open count.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReversalOutcome {
    pub trades: Vec<Trade>,
    pub debug_log: Vec<DebugRecord>,
}

// ============================================================
// ENGINE
// ============================================================

/// Run the streak-reversal strategy over the series.
pub fn run_streak_reversal(candles: &[Candle], config: &ReversalConfig) -> Result<ReversalOutcome> {
    crate::verify_sorted(candles)?;
    let mut engine = Engine::new(config.clone());
    for (i, candle) in candles.iter().enumerate() {
        engine.step(i, candle);
    }
    Ok(ReversalOutcome {
        trades: engine.closed,
        debug_log: engine.debug_log,
    })
}

struct Engine {
    config: ReversalConfig,
    long_setups: Vec<Setup>,
    short_setups: Vec<Setup>,
    positions: Vec<Position>,
    closed: Vec<Trade>,
    debug_log: Vec<DebugRecord>,
    streak_count: usize,
    streak_color: Option<CandleColor>,
    next_setup_id: u64,
    next_position_id: u64,
}

impl Engine {
    fn new(config: ReversalConfig) -> Self {
        Self {
            config,
            long_setups: Vec::new(),
            short_setups: Vec::new(),
            positions: Vec::new(),
            closed: Vec::new(),
            debug_log: Vec::new(),
            streak_count: 0,
            streak_color: None,
            next_setup_id: 0,
            next_position_id: 0,
        }
    }

    /// Process one candle: run counter, setup arming, setup walks for both
    /// sides, then position management.
    fn step(&mut self, index: usize, candle: &Candle) {
        let color = candle.binary_color();

        if self.streak_color == Some(color) {
            self.streak_count += 1;
        } else {
            self.streak_count = 1;
            self.streak_color = Some(color);
        }

        // Arming happens only when the count passes through the exact length.
        if self.streak_count == self.config.streak_length.get()
            && self.config.color_filter.admits(color)
        {
            match color {
                CandleColor::Red => {
                    let setup = self.new_setup(candle.open, candle.low);
                    self.long_setups.push(setup);
                }
                CandleColor::Green => {
                    let setup = self.new_setup(candle.open, candle.high);
                    self.short_setups.push(setup);
                }
            }
        }

        self.walk_setups(TradeDirection::Long, index, candle);
        self.walk_setups(TradeDirection::Short, index, candle);
        self.manage_positions(index, candle);

        self.debug_log.push(DebugRecord {
            time: candle.time,
            streak_count: self.streak_count,
            color,
            // The post-walk sweep leaves only waiting setups in the arenas.
            long_setups: self.long_setups.len(),
            short_setups: self.short_setups.len(),
            positions: self.positions.len(),
        });
    }

    fn new_setup(&mut self, ref_open: f64, ref_extreme: f64) -> Setup {
        self.next_setup_id += 1;
        Setup {
            id: self.next_setup_id,
            ref_open,
            ref_extreme,
            pause_seen: false,
            status: SetupStatus::Waiting,
        }
    }

    /// Walk one side's setups, newest first. Cancellations and consumptions
    /// are marked during the walk; removals and replacement seeds apply after
    /// it, so the arena never shifts mid-iteration.
    fn walk_setups(&mut self, side: TradeDirection, index: usize, candle: &Candle) {
        let is_green = candle.is_green();
        let same_color = match side {
            TradeDirection::Long => !is_green,
            TradeDirection::Short => is_green,
        };

        let mut cancelled: Vec<u64> = Vec::new();
        let mut seeds: Vec<Setup> = Vec::new();
        let mut entries: Vec<Position> = Vec::new();

        let setups = match side {
            TradeDirection::Long => &mut self.long_setups,
            TradeDirection::Short => &mut self.short_setups,
        };

        for j in (0..setups.len()).rev() {
            let open_positions = self.positions.len() + entries.len();
            let setup = &mut setups[j];
            if setup.status != SetupStatus::Waiting {
                continue;
            }

            // The first opposite-color candle pauses the setup; a same-color
            // candle breaching the reference extreme after a pause cancels it.
            if !same_color {
                setup.pause_seen = true;
            }
            let breached = match side {
                TradeDirection::Long => candle.low < setup.ref_extreme,
                TradeDirection::Short => candle.high > setup.ref_extreme,
            };
            if same_color && setup.pause_seen && breached {
                cancelled.push(setup.id);
                continue;
            }

            let crossed = match side {
                TradeDirection::Long => candle.close > setup.ref_open,
                TradeDirection::Short => candle.close < setup.ref_open,
            };
            if crossed && open_positions < MAX_OPEN_POSITIONS {
                let entry_price = setup.ref_open;
                let (initial_sl, previous_extreme) = match side {
                    TradeDirection::Long => (candle.low, candle.high),
                    TradeDirection::Short => (candle.high, candle.low),
                };
                let trail_distance = match side {
                    TradeDirection::Long => entry_price - initial_sl,
                    TradeDirection::Short => initial_sl - entry_price,
                };

                self.next_position_id += 1;
                entries.push(Position {
                    id: self.next_position_id,
                    direction: side,
                    entry_price,
                    entry_time: candle.time,
                    entry_time_original: original_ts(candle),
                    current_sl: initial_sl,
                    trail_distance,
                    entry_candle_index: index,
                    previous_extreme,
                });

                setup.status = SetupStatus::Consumed;

                // Dynamic re-arming: an entry candle that itself continues
                // the run seeds a replacement setup.
                if same_color {
                    let (ref_open, ref_extreme) = match side {
                        TradeDirection::Long => (candle.open, candle.low),
                        TradeDirection::Short => (candle.open, candle.high),
                    };
                    self.next_setup_id += 1;
                    seeds.push(Setup {
                        id: self.next_setup_id,
                        ref_open,
                        ref_extreme,
                        pause_seen: false,
                        status: SetupStatus::Waiting,
                    });
                }
            } else if same_color && !crossed {
                // Same color, no breach: the trigger level walks to this bar.
                let (ref_open, ref_extreme) = match side {
                    TradeDirection::Long => (candle.open, candle.low),
                    TradeDirection::Short => (candle.open, candle.high),
                };
                setup.ref_open = ref_open;
                setup.ref_extreme = ref_extreme;
            }
        }

        // Post-walk sweep: cancelled ids and consumed setups leave together.
        setups.retain(|s| s.status == SetupStatus::Waiting && !cancelled.contains(&s.id));
        setups.extend(seeds);
        self.positions.extend(entries);
    }

    /// Stop check first, then the stair-step trail recompute. A position's
    /// own entry candle is never evaluated.
    fn manage_positions(&mut self, index: usize, candle: &Candle) {
        let mut exited: Vec<u64> = Vec::new();

        for position in self.positions.iter_mut().rev() {
            if position.entry_candle_index == index {
                continue;
            }

            let stopped = match position.direction {
                TradeDirection::Long => candle.low <= position.current_sl,
                TradeDirection::Short => candle.high >= position.current_sl,
            };
            if stopped {
                let pnl = position.direction.pnl(position.entry_price, position.current_sl);
                self.closed.push(Trade {
                    entry_price: round2(position.entry_price),
                    entry_time: position.entry_time,
                    entry_time_original: position.entry_time_original.clone(),
                    exit_price: round2(position.current_sl),
                    exit_time: candle.time,
                    exit_time_original: original_ts(candle),
                    pnl: round2(pnl),
                    exit_reason: if pnl > 0.0 { ExitReason::Trail } else { ExitReason::Sl },
                    trailed: trailed(position),
                    direction: position.direction,
                    sl_distance: round2(position.trail_distance),
                    final_sl: round2(position.current_sl),
                    rr_hits: [false; RR_LEVELS],
                });
                exited.push(position.id);
                continue;
            }

            // Whole-multiple trail. A zero or inverted trail distance
            // disables trailing; the position can still stop out above.
            if position.trail_distance > 0.0 {
                match position.direction {
                    TradeDirection::Long => {
                        if candle.high >= position.entry_price + position.trail_distance {
                            let multiple = ((candle.high - position.entry_price)
                                / position.trail_distance)
                                .floor();
                            let new_sl = position.entry_price
                                + (multiple - 1.0) * position.trail_distance;
                            if new_sl > position.current_sl {
                                position.current_sl = new_sl;
                            }
                        }
                    }
                    TradeDirection::Short => {
                        if candle.low <= position.entry_price - position.trail_distance {
                            let multiple = ((position.entry_price - candle.low)
                                / position.trail_distance)
                                .floor();
                            let new_sl = position.entry_price
                                - (multiple - 1.0) * position.trail_distance;
                            if new_sl < position.current_sl {
                                position.current_sl = new_sl;
                            }
                        }
                    }
                }
            }
        }

        self.positions.retain(|p| !exited.contains(&p.id));
    }
}

/// Whether the stop has moved off its initial level.
fn trailed(position: &Position) -> bool {
    let initial = match position.direction {
        TradeDirection::Long => position.entry_price - position.trail_distance,
        TradeDirection::Short => position.entry_price + position.trail_distance,
    };
    (position.current_sl - initial).abs() > f64::EPSILON
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColorFilter;

    fn candle(time: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(time, open, high, low, close)
    }

    fn config(length: usize) -> ReversalConfig {
        ReversalConfig::new(length, ColorFilter::Both).unwrap()
    }

    /// Red run: opens 100, 98, 96, 94; closes 98, 96, 94, 92.
    fn four_reds() -> Vec<Candle> {
        (0..4)
            .map(|i| {
                let open = 100.0 - 2.0 * i as f64;
                candle(i as i64 * 60, open, open + 0.2, open - 2.2, open - 2.0)
            })
            .collect()
    }

    fn run(candles: &[Candle], length: usize) -> ReversalOutcome {
        run_streak_reversal(candles, &config(length)).unwrap()
    }

    #[test]
    fn test_long_entry_at_reference_open() {
        let mut candles = four_reds();
        // Green candle closes above the arming candle's open (94): entry at
        // 94, stop at this candle's low.
        candles.push(candle(240, 92.0, 95.5, 91.8, 95.0));
        // Stop hit.
        candles.push(candle(300, 95.0, 95.2, 91.0, 91.2));

        let outcome = run(&candles, 4);
        assert_eq!(outcome.trades.len(), 1);

        let trade = &outcome.trades[0];
        assert_eq!(trade.direction, TradeDirection::Long);
        assert!((trade.entry_price - 94.0).abs() < 1e-9);
        assert_eq!(trade.entry_time, 240);
        assert!((trade.exit_price - 91.8).abs() < 1e-9);
        assert_eq!(trade.exit_reason, ExitReason::Sl);
        assert!((trade.sl_distance - 2.2).abs() < 1e-9);
        assert!(!trade.trailed);
    }

    #[test]
    fn test_reference_walks_down_with_run() {
        let mut candles = four_reds();
        // Fifth red continues the run without closing above the reference:
        // the trigger walks to open 92 / low 89.8.
        candles.push(candle(240, 92.0, 92.2, 89.8, 90.0));
        // Green entry clears the walked reference (92), not the armed one.
        candles.push(candle(300, 90.0, 93.5, 89.9, 93.0));

        let outcome = run(&candles, 4);
        assert!(outcome.trades.is_empty());
        let last = outcome.debug_log.last().unwrap();
        assert_eq!(last.positions, 1);

        // Add a stop-out candle to read the entry price back.
        candles.push(candle(360, 93.0, 93.2, 89.0, 89.2));
        let outcome = run(&candles, 4);
        assert_eq!(outcome.trades.len(), 1);
        assert!((outcome.trades[0].entry_price - 92.0).abs() < 1e-9);
        // Initial stop is the entry candle's low.
        assert!((outcome.trades[0].exit_price - 89.9).abs() < 1e-9);
    }

    #[test]
    fn test_pause_then_breach_cancels_setup() {
        let mut candles = four_reds();
        // Green candle pauses the setup without entering (close 93.5 <= 94).
        candles.push(candle(240, 92.0, 93.8, 91.9, 93.5));
        // Red candle breaches the armed reference low (91.8).
        candles.push(candle(300, 93.5, 93.6, 91.0, 91.2));
        // A later close above 94 must not enter: the setup is gone.
        candles.push(candle(360, 91.2, 96.0, 91.1, 95.5));

        let outcome = run(&candles, 4);
        assert!(outcome.trades.is_empty());
        let last = outcome.debug_log.last().unwrap();
        assert_eq!(last.long_setups, 0);
        assert_eq!(last.positions, 0);
    }

    #[test]
    fn test_short_side_mirror() {
        // Green run: opens 100, 102, 104, 106; closes 102, 104, 106, 108.
        let mut candles: Vec<Candle> = (0..4)
            .map(|i| {
                let open = 100.0 + 2.0 * i as f64;
                candle(i as i64 * 60, open, open + 2.2, open - 0.2, open + 2.0)
            })
            .collect();
        // Red candle closes below the arming candle's open (106): short at
        // 106, stop at this candle's high.
        candles.push(candle(240, 108.0, 108.3, 104.5, 105.0));
        // Stop hit.
        candles.push(candle(300, 105.0, 109.0, 104.8, 108.8));

        let outcome = run(&candles, 4);
        assert_eq!(outcome.trades.len(), 1);

        let trade = &outcome.trades[0];
        assert_eq!(trade.direction, TradeDirection::Short);
        assert!((trade.entry_price - 106.0).abs() < 1e-9);
        assert!((trade.exit_price - 108.3).abs() < 1e-9);
        assert_eq!(trade.exit_reason, ExitReason::Sl);
    }

    #[test]
    fn test_stair_step_trailing() {
        // Entry 100 with trail distance 10: a rally to 131 steps the stop to
        // entry + (floor(31/10) - 1) * 10 = 120, not a smooth 121.
        let mut candles: Vec<Candle> = (0..4)
            .map(|i| {
                let open = 106.0 - 2.0 * i as f64;
                candle(i as i64 * 60, open, open + 0.2, open - 2.2, open - 2.0)
            })
            .collect();
        // Arming candle open is 100. Entry candle low 90 -> trail unit 10.
        candles.push(candle(240, 91.0, 101.5, 90.0, 101.0));
        candles.push(candle(300, 101.0, 131.0, 100.5, 130.0));
        // Pullback through the stepped stop.
        candles.push(candle(360, 130.0, 130.2, 119.0, 119.5));

        let outcome = run(&candles, 4);
        assert_eq!(outcome.trades.len(), 1);

        let trade = &outcome.trades[0];
        assert!(trade.trailed);
        assert!((trade.exit_price - 120.0).abs() < 1e-9);
        assert!((trade.pnl - 20.0).abs() < 1e-9);
        assert_eq!(trade.exit_reason, ExitReason::Trail);
    }

    #[test]
    fn test_position_cap_blocks_fourth_entry() {
        // Four arm-and-enter cycles at rising price levels; stops sit far
        // below so nothing exits and all entries stay open.
        let mut candles = Vec::new();
        let mut time = 0;
        for k in 0..4 {
            let base = 100.0 + 10.0 * k as f64;
            for j in 0..4 {
                let open = base - j as f64;
                candles.push(candle(time, open, open + 0.2, open - 1.2, open - 1.0));
                time += 60;
            }
            // Deep-wick green entry candle: close clears the reference open.
            candles.push(candle(time, base - 4.0, base - 1.9, base - 54.0, base - 2.0));
            time += 60;
        }

        let outcome = run(&candles, 4);
        assert!(outcome.trades.is_empty());

        let last = outcome.debug_log.last().unwrap();
        assert_eq!(last.positions, MAX_OPEN_POSITIONS);
        // The fourth setup was not consumed and not queued.
        assert_eq!(last.long_setups, 1);
        // The cap held on every candle.
        assert!(outcome
            .debug_log
            .iter()
            .all(|r| r.positions <= MAX_OPEN_POSITIONS));
    }

    #[test]
    fn test_replacement_setup_on_red_entry_candle() {
        let mut candles = four_reds();
        // Red candle whose close (95) clears the reference open (94): entry
        // fires and, because the entry candle continues the red run, a
        // replacement setup is seeded from it.
        candles.push(candle(240, 96.0, 96.5, 93.0, 95.0));

        let outcome = run(&candles, 4);
        let last = outcome.debug_log.last().unwrap();
        assert_eq!(last.positions, 1);
        assert_eq!(last.long_setups, 1);
    }

    #[test]
    fn test_profitable_stop_exit_labeled_trail() {
        let mut candles = four_reds();
        candles.push(candle(240, 92.0, 95.5, 91.8, 95.0));
        // Rally steps the stop above entry, then collapse through it.
        candles.push(candle(300, 95.0, 101.0, 94.9, 100.5));
        candles.push(candle(360, 100.5, 100.6, 90.0, 90.5));

        let outcome = run(&candles, 4);
        assert_eq!(outcome.trades.len(), 1);
        let trade = &outcome.trades[0];
        assert!(trade.pnl > 0.0);
        assert_eq!(trade.exit_reason, ExitReason::Trail);
    }

    #[test]
    fn test_color_filter_red_only_skips_short_setups() {
        let mut candles: Vec<Candle> = (0..4)
            .map(|i| {
                let open = 100.0 + 2.0 * i as f64;
                candle(i as i64 * 60, open, open + 2.2, open - 0.2, open + 2.0)
            })
            .collect();
        candles.push(candle(240, 108.0, 108.3, 104.5, 105.0));

        let config = ReversalConfig::new(4, ColorFilter::Red).unwrap();
        let outcome = run_streak_reversal(&candles, &config).unwrap();
        assert!(outcome.trades.is_empty());
        assert!(outcome.debug_log.iter().all(|r| r.short_setups == 0));
    }

    #[test]
    fn test_consumed_setup_swept_from_arena() {
        let mut candles = four_reds();
        // Green entry candle consumes the only setup without re-arming.
        candles.push(candle(240, 92.0, 95.5, 91.8, 95.0));

        let outcome = run(&candles, 4);
        let last = outcome.debug_log.last().unwrap();
        assert_eq!(last.positions, 1);
        // The consumed setup is gone the same candle; the arm candle's
        // record still shows it waiting.
        assert_eq!(last.long_setups, 0);
        assert_eq!(outcome.debug_log[3].long_setups, 1);
    }

    #[test]
    fn test_open_position_not_reported_as_trade() {
        let mut candles = four_reds();
        candles.push(candle(240, 92.0, 95.5, 91.8, 95.0));

        let outcome = run(&candles, 4);
        assert!(outcome.trades.is_empty());
        assert_eq!(outcome.debug_log.last().unwrap().positions, 1);
    }

    #[test]
    fn test_debug_log_row_per_candle() {
        let candles = four_reds();
        let outcome = run(&candles, 4);
        assert_eq!(outcome.debug_log.len(), candles.len());
        assert_eq!(outcome.debug_log[3].streak_count, 4);
        assert_eq!(outcome.debug_log[3].long_setups, 1);
    }

    #[test]
    fn test_empty_series() {
        let outcome = run(&[], 4);
        assert!(outcome.trades.is_empty());
        assert!(outcome.debug_log.is_empty());
    }
}
