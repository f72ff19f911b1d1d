//! Aggregate statistics over completed trades.
//!
//! Two independent reductions: [`summarize`] produces the headline summary
//! (counts, net pnl, win rate, per-risk-multiple hit rates) and
//! [`score_points`] converts each trade into a whole-number risk-multiple
//! score. Both are pure folds over a trade slice and never fail; an empty
//! slice yields a fully zeroed report.

use crate::sim::{round1, round2, ExitReason, Trade, RR_LEVELS};

// ============================================================
// SUMMARY
// ============================================================

/// Hit statistics for one integer risk-multiple target.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RrBucket {
    /// Trades whose excursion reached this multiple of initial risk.
    pub hits: usize,
    /// `hits` as a share of all trades, one decimal.
    pub percentage: f64,
}

/// Headline aggregate over a population of completed trades.
///
/// `rr_stats` always holds [`RR_LEVELS`] entries, `rr_stats[i]` describing
/// the `i + 1`R target.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Summary {
    pub total_trades: usize,
    /// Trades closed by a stop (initial or trailed), i.e. not time exits.
    pub sl_hits: usize,
    pub winners: usize,
    pub losers: usize,
    pub breakeven: usize,
    pub net_pnl: f64,
    /// Winners as a percentage of all trades, one decimal.
    pub win_rate: f64,
    pub trailed_count: usize,
    pub rr_stats: Vec<RrBucket>,
}

impl Summary {
    /// The all-zero summary reported for an empty population.
    pub fn empty() -> Self {
        Self {
            total_trades: 0,
            sl_hits: 0,
            winners: 0,
            losers: 0,
            breakeven: 0,
            net_pnl: 0.0,
            win_rate: 0.0,
            trailed_count: 0,
            rr_stats: vec![RrBucket { hits: 0, percentage: 0.0 }; RR_LEVELS],
        }
    }
}

/// Fold a trade population into its [`Summary`].
pub fn summarize(trades: &[Trade]) -> Summary {
    let mut summary = Summary::empty();
    summary.total_trades = trades.len();

    let mut net_pnl = 0.0;
    for trade in trades {
        net_pnl += trade.pnl;
        if trade.exit_reason != ExitReason::Time {
            summary.sl_hits += 1;
        }
        if trade.pnl > 0.0 {
            summary.winners += 1;
        } else if trade.pnl < 0.0 {
            summary.losers += 1;
        } else {
            summary.breakeven += 1;
        }
        if trade.trailed {
            summary.trailed_count += 1;
        }
        for (bucket, hit) in summary.rr_stats.iter_mut().zip(trade.rr_hits) {
            if hit {
                bucket.hits += 1;
            }
        }
    }

    summary.net_pnl = round2(net_pnl);
    if summary.total_trades > 0 {
        let total = summary.total_trades as f64;
        summary.win_rate = round1(summary.winners as f64 / total * 100.0);
        for bucket in &mut summary.rr_stats {
            bucket.percentage = round1(bucket.hits as f64 / total * 100.0);
        }
    }
    summary
}

// ============================================================
// POINTS SCORING
// ============================================================

/// Whole-number risk-multiple scoring of a trade population.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PointsSummary {
    pub total_points: i64,
    /// `total_points / total trades`, two decimals; `0.0` when empty.
    pub avg_points: f64,
    /// Sum of positive per-trade scores.
    pub points_won: i64,
    /// Absolute sum of negative per-trade scores.
    pub points_lost: i64,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
}

/// Score of one trade: `floor(pnl / risk)` for non-negative outcomes, a flat
/// `-1` for any loss. A zero risk distance degenerates to `-1`/`0`.
fn trade_points(trade: &Trade) -> i64 {
    let risk = trade.sl_distance.abs();
    if risk == 0.0 {
        return if trade.pnl < 0.0 { -1 } else { 0 };
    }
    let r = trade.pnl / risk;
    if r < 0.0 {
        -1
    } else {
        r.floor() as i64
    }
}

/// Score each trade in whole risk multiples and fold the results.
pub fn score_points(trades: &[Trade]) -> PointsSummary {
    let mut summary = PointsSummary {
        total_points: 0,
        avg_points: 0.0,
        points_won: 0,
        points_lost: 0,
        winning_trades: 0,
        losing_trades: 0,
        breakeven_trades: 0,
    };

    for trade in trades {
        let points = trade_points(trade);
        summary.total_points += points;
        match points.cmp(&0) {
            std::cmp::Ordering::Greater => {
                summary.points_won += points;
                summary.winning_trades += 1;
            }
            std::cmp::Ordering::Less => {
                summary.points_lost += -points;
                summary.losing_trades += 1;
            }
            std::cmp::Ordering::Equal => summary.breakeven_trades += 1,
        }
    }

    if !trades.is_empty() {
        summary.avg_points = round2(summary.total_points as f64 / trades.len() as f64);
    }
    summary
}

// ============================================================
// TESTS
// ============================================================
