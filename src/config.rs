//! Configuration records for the detector and both simulators.
//!
//! Every recognized option is enumerated here and validated at the boundary:
//! streak lengths are range-checked, enum values are closed sets, and the
//! fixed-stop distance must be positive when it is actually used. A config
//! that passes [`validate`](DetectorConfig::validate) cannot fail later
//! inside a scan.

use crate::{CandleColor, EngineError, Result};

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Streak length bounds shared by the detector and the reversal engine.
pub const MIN_STREAK_LENGTH: usize = 3;
pub const MAX_STREAK_LENGTH: usize = 15;

/// Exact run length a streak must have, validated into `3..=15`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StreakLength(usize);

impl StreakLength {
    /// Create a new StreakLength, validating the value is in `3..=15`.
    pub fn new(value: usize) -> Result<Self> {
        if !(MIN_STREAK_LENGTH..=MAX_STREAK_LENGTH).contains(&value) {
            return Err(EngineError::OutOfRange {
                field: "StreakLength",
                value: value as f64,
                min: MIN_STREAK_LENGTH as f64,
                max: MAX_STREAK_LENGTH as f64,
            });
        }
        Ok(Self(value))
    }

    /// Create a StreakLength from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for StreakLength {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for StreakLength {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        StreakLength::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// ENUM SURFACES
// ============================================================

/// Which candle colors may seed a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorFilter {
    #[default]
    Both,
    Green,
    Red,
}

impl ColorFilter {
    #[inline]
    pub fn admits(self, color: CandleColor) -> bool {
        match self {
            ColorFilter::Both => true,
            ColorFilter::Green => color == CandleColor::Green,
            ColorFilter::Red => color == CandleColor::Red,
        }
    }
}

/// How the initial stop-loss of a level-break trade is anchored.
///
/// `Entry` and `Last` are equivalent: both anchor at the opposite extreme of
/// the streak's final candle. Both are kept because the configuration surface
/// declares them. `Fixed` places the stop `fixed_points` away from entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlMode {
    #[default]
    Entry,
    Last,
    Fixed,
}

/// Which side of a streak the level-break strategy trades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyType {
    #[default]
    Reversal,
    Continuation,
}

// ============================================================
// DETECTOR CONFIG
// ============================================================

/// Configuration for [`detect_streaks`](crate::detector::detect_streaks).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DetectorConfig {
    /// Exact run length. Longer runs do not emit at shorter sub-lengths.
    pub min_streak: StreakLength,
    /// Color filter applied when seeding a run.
    pub direction: ColorFilter,
    /// Minimum full-run (high-low)/low move, in percent. Runs below it are
    /// discarded, not emitted.
    pub min_move_percent: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_streak: StreakLength::new_const(4),
            direction: ColorFilter::Both,
            min_move_percent: 0.20,
        }
    }
}

impl DetectorConfig {
    pub fn new(min_streak: usize, direction: ColorFilter, min_move_percent: f64) -> Result<Self> {
        let config = Self {
            min_streak: StreakLength::new(min_streak)?,
            direction,
            min_move_percent,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_move_percent.is_nan() || self.min_move_percent < 0.0 {
            return Err(EngineError::InvalidValue("min_move_percent must be >= 0"));
        }
        Ok(())
    }
}

// ============================================================
// LEVEL-BREAK SIMULATOR CONFIG
// ============================================================

/// Trailing-stop settings for the level-break simulator.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrailConfig {
    /// Unrealized profit (points) required before the stop may trail.
    pub trigger: f64,
    /// Distance the trailed stop keeps behind the best favorable extreme.
    pub trail_by: f64,
}

impl TrailConfig {
    pub fn new(trigger: f64, trail_by: f64) -> Result<Self> {
        let config = Self { trigger, trail_by };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.trigger.is_finite() || self.trigger <= 0.0 {
            return Err(EngineError::InvalidValue("trail trigger must be > 0"));
        }
        if !self.trail_by.is_finite() || self.trail_by <= 0.0 {
            return Err(EngineError::InvalidValue("trail_by must be > 0"));
        }
        Ok(())
    }
}

/// Configuration for
/// [`simulate_level_break`](crate::sim::level_break::simulate_level_break).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LevelBreakConfig {
    pub sl_mode: SlMode,
    /// Stop distance in points; consulted only when `sl_mode` is `Fixed`.
    pub fixed_points: f64,
    pub strategy: StrategyType,
    /// `None` disables trailing entirely.
    pub trail: Option<TrailConfig>,
}

impl Default for LevelBreakConfig {
    fn default() -> Self {
        Self {
            sl_mode: SlMode::Entry,
            fixed_points: 10.0,
            strategy: StrategyType::Reversal,
            trail: None,
        }
    }
}

impl LevelBreakConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sl_mode == SlMode::Fixed && (!self.fixed_points.is_finite() || self.fixed_points <= 0.0)
        {
            return Err(EngineError::InvalidValue(
                "fixed_points must be > 0 when sl_mode is fixed",
            ));
        }
        if let Some(trail) = &self.trail {
            trail.validate()?;
        }
        Ok(())
    }
}

// ============================================================
// STREAK-REVERSAL ENGINE CONFIG
// ============================================================

/// Configuration for
/// [`run_streak_reversal`](crate::sim::reversal::run_streak_reversal).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReversalConfig {
    /// Raw-color run length that arms a setup.
    pub streak_length: StreakLength,
    /// Which streak colors may arm setups.
    pub color_filter: ColorFilter,
}

impl Default for ReversalConfig {
    fn default() -> Self {
        Self {
            streak_length: StreakLength::new_const(4),
            color_filter: ColorFilter::Both,
        }
    }
}

impl ReversalConfig {
    pub fn new(streak_length: usize, color_filter: ColorFilter) -> Result<Self> {
        Ok(Self {
            streak_length: StreakLength::new(streak_length)?,
            color_filter,
        })
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streak_length_validation() {
        assert!(StreakLength::new(3).is_ok());
        assert!(StreakLength::new(15).is_ok());
        assert!(StreakLength::new(2).is_err());
        assert!(StreakLength::new(16).is_err());
        assert!(StreakLength::new(0).is_err());
    }

    #[test]
    fn test_streak_length_serde_rejects_out_of_range() {
        let ok: StreakLength = serde_json::from_str("4").unwrap();
        assert_eq!(ok.get(), 4);
        assert!(serde_json::from_str::<StreakLength>("2").is_err());
    }

    #[test]
    fn test_color_filter_admits() {
        assert!(ColorFilter::Both.admits(CandleColor::Green));
        assert!(ColorFilter::Both.admits(CandleColor::Red));
        assert!(ColorFilter::Green.admits(CandleColor::Green));
        assert!(!ColorFilter::Green.admits(CandleColor::Red));
        assert!(ColorFilter::Red.admits(CandleColor::Red));
        assert!(!ColorFilter::Red.admits(CandleColor::Green));
    }

    #[test]
    fn test_detector_config_validation() {
        assert!(DetectorConfig::new(4, ColorFilter::Both, 0.2).is_ok());
        assert!(DetectorConfig::new(4, ColorFilter::Both, -1.0).is_err());
        assert!(DetectorConfig::new(20, ColorFilter::Both, 0.2).is_err());
        assert!(DetectorConfig::new(4, ColorFilter::Both, f64::NAN).is_err());
    }

    #[test]
    fn test_detector_config_defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.min_streak.get(), 4);
        assert_eq!(config.direction, ColorFilter::Both);
        assert!((config.min_move_percent - 0.20).abs() < f64::EPSILON);
    }

    #[test]
    fn test_trail_config_validation() {
        assert!(TrailConfig::new(15.0, 10.0).is_ok());
        assert!(TrailConfig::new(0.0, 10.0).is_err());
        assert!(TrailConfig::new(15.0, 0.0).is_err());
        assert!(TrailConfig::new(f64::INFINITY, 10.0).is_err());
    }

    #[test]
    fn test_level_break_config_fixed_points() {
        let mut config = LevelBreakConfig {
            sl_mode: SlMode::Fixed,
            fixed_points: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.fixed_points = 10.0;
        assert!(config.validate().is_ok());

        // fixed_points is ignored unless the mode is Fixed
        config.sl_mode = SlMode::Entry;
        config.fixed_points = -5.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serde() {
        let config = LevelBreakConfig {
            sl_mode: SlMode::Fixed,
            fixed_points: 12.5,
            strategy: StrategyType::Continuation,
            trail: Some(TrailConfig {
                trigger: 15.0,
                trail_by: 10.0,
            }),
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: LevelBreakConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
