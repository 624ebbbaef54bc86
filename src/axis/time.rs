//! Time axis (`t`): one or more acquisition phases.
//!
//! Each phase describes a run of evenly spaced time points. Phases are
//! chained: a phase starts where the previous one ended, and its own first
//! point (offset zero) is merged into the previous phase's last point, so a
//! plan of `n` phases with lengths `l_i` has `sum(l_i) - n + 1` points.
//!
//! Durations use `humantime` notation in the serialized form (`"500ms"`,
//! `"2s"`, `"1m 30s"`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, SequenceError};
use crate::event::{Contribution, EventField};

use super::{keys, AxisIndex, AxisItem, AxisIterable, AxisValue};

/// One phase of a time plan.
///
/// The serialized form is told apart by its fields, tried in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimePhase {
    /// `loops` points, `interval` apart.
    IntervalLoops {
        /// Time between points.
        #[serde(with = "humantime_serde")]
        interval: Duration,
        /// Number of points.
        loops: usize,
    },
    /// `loops` points spread evenly over `duration`.
    DurationLoops {
        /// Total duration of the phase.
        #[serde(with = "humantime_serde")]
        duration: Duration,
        /// Number of points.
        loops: usize,
    },
    /// Points every `interval` for `duration`, or forever without one.
    IntervalDuration {
        /// Time between points.
        #[serde(with = "humantime_serde")]
        interval: Duration,
        /// Total duration; endless if absent.
        #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
        duration: Option<Duration>,
    },
}

impl TimePhase {
    /// Spacing between consecutive points.
    #[must_use]
    pub fn interval(&self) -> Duration {
        match *self {
            Self::IntervalLoops { interval, .. } | Self::IntervalDuration { interval, .. } => {
                interval
            }
            Self::DurationLoops { duration, loops } => match loops {
                0 | 1 => Duration::ZERO,
                n => duration.div_f64((n - 1) as f64),
            },
        }
    }

    /// Number of points, `None` for an endless phase.
    #[must_use]
    pub fn loops(&self) -> Option<usize> {
        match *self {
            Self::IntervalLoops { loops, .. } | Self::DurationLoops { loops, .. } => Some(loops),
            Self::IntervalDuration { interval, duration } => duration.map(|d| {
                if interval.is_zero() {
                    1
                } else {
                    (d.as_secs_f64() / interval.as_secs_f64()).floor() as usize + 1
                }
            }),
        }
    }

    fn validate(&self) -> AppResult<()> {
        match self {
            Self::IntervalLoops { loops: 0, .. } | Self::DurationLoops { loops: 0, .. } => Err(
                SequenceError::invalid_axis(keys::TIME, "a time phase needs at least one loop"),
            ),
            Self::IntervalDuration { interval, .. } if interval.is_zero() => Err(
                SequenceError::invalid_axis(keys::TIME, "interval must be positive"),
            ),
            _ => Ok(()),
        }
    }

    /// Offsets of the points from the phase start, in seconds.
    fn offsets(&self) -> Box<dyn Iterator<Item = f64>> {
        let step = self.interval().as_secs_f64();
        let points = (0_usize..).map(move |k| k as f64 * step);
        match self.loops() {
            Some(n) => Box::new(points.take(n)),
            None => Box::new(points),
        }
    }
}

/// Time plan made of consecutive phases.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimePlan {
    /// Phases in acquisition order.
    pub phases: Vec<TimePhase>,
}

impl TimePlan {
    /// Single-phase plan of `loops` points `interval` apart.
    pub fn interval_loops(interval: Duration, loops: usize) -> Self {
        Self {
            phases: vec![TimePhase::IntervalLoops { interval, loops }],
        }
    }

    /// Append a phase.
    #[must_use]
    pub fn then(mut self, phase: TimePhase) -> Self {
        self.phases.push(phase);
        self
    }

    /// Start time of every point in seconds.
    pub fn times(&self) -> impl Iterator<Item = f64> {
        let phases = self.phases.clone();
        let first = (!phases.is_empty()).then_some(0.0);
        let mut accum = 0.0;
        first.into_iter().chain(phases.into_iter().flat_map(move |phase| {
            let start = accum;
            if let Some(n) = phase.loops() {
                accum += n.saturating_sub(1) as f64 * phase.interval().as_secs_f64();
            }
            phase.offsets().skip(1).map(move |t| start + t)
        }))
    }

    /// Spacing between each point and the next, `None` for an endless plan.
    pub(crate) fn schedule(&self) -> Option<Vec<f64>> {
        let mut intervals = Vec::new();
        for phase in &self.phases {
            let n = phase.loops()?;
            let step = phase.interval().as_secs_f64();
            intervals.extend(std::iter::repeat(step).take(n.saturating_sub(1)));
        }
        Some(intervals)
    }
}

impl AxisIterable for TimePlan {
    fn axis_key(&self) -> &str {
        keys::TIME
    }

    fn iter(&self) -> Box<dyn Iterator<Item = AxisItem>> {
        Box::new(self.times().map(|t| AxisItem::Value(AxisValue::Number(t))))
    }

    fn length(&self) -> Option<usize> {
        if self.phases.is_empty() {
            return Some(0);
        }
        let mut total = 0;
        for phase in &self.phases {
            total += phase.loops()?;
        }
        Some((total + 1).saturating_sub(self.phases.len()))
    }

    fn contribute(&self, value: &AxisValue, _index: &AxisIndex) -> Contribution {
        match value.as_f64() {
            Some(t) => Contribution::new().with(EventField::MinStartTime(t)),
            None => Contribution::new(),
        }
    }

    fn validate(&self) -> AppResult<()> {
        self.phases.iter().try_for_each(TimePhase::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_interval_loops_times() {
        let plan = TimePlan::interval_loops(secs(2), 3);
        assert_eq!(plan.times().collect::<Vec<_>>(), vec![0.0, 2.0, 4.0]);
        assert_eq!(plan.length(), Some(3));
    }

    #[test]
    fn test_duration_loops_spacing() {
        let phase = TimePhase::DurationLoops {
            duration: secs(10),
            loops: 5,
        };
        assert_eq!(phase.interval(), Duration::from_millis(2500));
        let single = TimePhase::DurationLoops {
            duration: secs(10),
            loops: 1,
        };
        assert_eq!(single.interval(), Duration::ZERO);
    }

    #[test]
    fn test_phases_are_chained() {
        let plan = TimePlan::interval_loops(secs(1), 3).then(TimePhase::IntervalLoops {
            interval: secs(5),
            loops: 3,
        });
        assert_eq!(
            plan.times().collect::<Vec<_>>(),
            vec![0.0, 1.0, 2.0, 7.0, 12.0]
        );
        assert_eq!(plan.length(), Some(5));
    }

    #[test]
    fn test_interval_duration_count() {
        let phase = TimePhase::IntervalDuration {
            interval: secs(2),
            duration: Some(secs(7)),
        };
        assert_eq!(phase.loops(), Some(4));
    }

    #[test]
    fn test_endless_phase_is_unbounded() {
        let plan = TimePlan {
            phases: vec![TimePhase::IntervalDuration {
                interval: secs(1),
                duration: None,
            }],
        };
        assert_eq!(plan.length(), None);
        assert_eq!(plan.times().take(4).collect::<Vec<_>>(), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_zero_loops_rejected() {
        let plan = TimePlan::interval_loops(secs(1), 0);
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_phase_forms_parse() {
        let phases: Vec<TimePhase> = serde_json::from_str(
            r#"[{"interval": "1s", "loops": 2},
                {"duration": "10s", "loops": 3},
                {"interval": "500ms"}]"#,
        )
        .unwrap();
        assert!(matches!(phases[0], TimePhase::IntervalLoops { loops: 2, .. }));
        assert!(matches!(phases[1], TimePhase::DurationLoops { loops: 3, .. }));
        assert!(matches!(
            phases[2],
            TimePhase::IntervalDuration { duration: None, .. }
        ));
    }
}
