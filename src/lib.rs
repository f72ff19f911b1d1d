//! # streaksim - Streak Detection & Trade Simulation
//!
//! Pattern-detection and trade-simulation engine for OHLC candle series.
//! Finds runs of same-direction candles ("streaks"), classifies how price
//! behaves after each streak ends, and simulates trading strategies against
//! those streaks to produce performance statistics.
//!
//! ## Quick Start
//!
//! ```rust
//! use streaksim::prelude::*;
//!
//! let candles = vec![
//!     Candle::new(0, 100.0, 101.0, 99.0, 98.0),
//!     Candle::new(60, 98.0, 99.0, 96.0, 97.0),
//! ];
//!
//! // Detect streaks
//! let config = DetectorConfig::default();
//! let streaks = detect_streaks(&candles, &config).unwrap();
//!
//! // Simulate the level-break strategy against them
//! let sim = LevelBreakConfig::default();
//! let outcome = simulate_level_break(&streaks, &candles, &sim).unwrap();
//! assert_eq!(outcome.summary.total_trades, outcome.trades.len());
//! ```
//!
//! The crate is a pure function of (candle sequence, configuration) ->
//! (streaks | trades | statistics). It holds no state across invocations,
//! never mutates its input, and both simulators may run concurrently on the
//! same candle slice.

pub mod config;
pub mod detector;
pub mod sim;
pub mod stats;

pub mod prelude {
    pub use crate::{
        // Configuration
        config::{
            ColorFilter, DetectorConfig, LevelBreakConfig, ReversalConfig, SlMode, StrategyType,
            StreakLength, TrailConfig,
        },
        // Detection
        detector::{detect_streaks, Streak, VolResolution},
        // Simulation
        sim::{
            level_break::{simulate_level_break, LevelBreakOutcome},
            reversal::{run_streak_reversal, DebugRecord, ReversalOutcome},
            ExitReason, Trade, TradeDirection, RR_LEVELS,
        },
        // Statistics
        stats::{score_points, summarize, PointsSummary, RrBucket, Summary},
        // Data model
        Candle,
        CandleColor,
        // Errors
        EngineError,
        Result,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur when configuring or driving the engine.
///
/// These cover contract violations only. Degenerate data (empty series, zero
/// trades, exhausted forward windows, zero risk distance) never errors; it
/// resolves to a well-defined value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Candle series not strictly ascending by time at index {index}")]
    UnsortedSeries { index: usize },
}

// ============================================================
// CANDLE DATA MODEL
// ============================================================

/// A single OHLC price bar.
///
/// The series handed to the engine must be strictly ascending by `time`;
/// public entry points verify this and return
/// [`EngineError::UnsortedSeries`] otherwise. Candles are owned by the
/// caller and only ever borrowed by the engine.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candle {
    /// Epoch seconds.
    pub time: i64,
    /// Source timestamp as supplied by the upstream parser, if any.
    #[serde(default)]
    pub original_timestamp: Option<String>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time,
            original_timestamp: None,
            open,
            high,
            low,
            close,
        }
    }

    pub fn with_original_timestamp(mut self, ts: impl Into<String>) -> Self {
        self.original_timestamp = Some(ts.into());
        self
    }

    /// Close strictly above open.
    #[inline]
    pub fn is_green(&self) -> bool {
        self.close > self.open
    }

    /// Close strictly below open.
    #[inline]
    pub fn is_red(&self) -> bool {
        self.close < self.open
    }

    /// Strict color of this candle. A doji (close == open) has none.
    #[inline]
    pub fn color(&self) -> Option<CandleColor> {
        if self.is_green() {
            Some(CandleColor::Green)
        } else if self.is_red() {
            Some(CandleColor::Red)
        } else {
            None
        }
    }

    /// Binary color used by the streak-reversal engine: green iff
    /// close > open, otherwise red. Dojis count as red.
    #[inline]
    pub fn binary_color(&self) -> CandleColor {
        if self.is_green() {
            CandleColor::Green
        } else {
            CandleColor::Red
        }
    }
}

/// Directional color of a candle or streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleColor {
    Green,
    Red,
}

impl CandleColor {
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            CandleColor::Green => CandleColor::Red,
            CandleColor::Red => CandleColor::Green,
        }
    }
}

/// Verify the series is strictly ascending by `time`.
///
/// Returns the index of the first offending candle (the one whose time is
/// not greater than its predecessor's).
pub fn verify_sorted(candles: &[Candle]) -> Result<()> {
    for (i, pair) in candles.windows(2).enumerate() {
        if pair[1].time <= pair[0].time {
            return Err(EngineError::UnsortedSeries { index: i + 1 });
        }
    }
    Ok(())
}

// ============================================================
// TESTS
// ============================================================
