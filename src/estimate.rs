//! Acquisition duration estimate.
//!
//! The estimate only accounts for exposure time and time-plan intervals;
//! stage moves, autofocus and camera readout are not modelled. Channels
//! without an exposure count as [`DEFAULT_EXPOSURE_MS`].
//!
//! For each time point the *slice* is the summed exposure of every frame
//! acquired at that point. Consecutive time points are at least one interval
//! apart, so each non-final time point costs `max(interval, slice)`. If a
//! slice outlasts a positive interval the plan cannot keep its schedule and
//! [`TimeEstimate::time_interval_exceeded`] is set.
//!
//! Positions with a sub-sequence are estimated one at a time, with the
//! sub-sequence's time, z, grid and channel plans replacing the parent's.

use std::ops::{Add, AddAssign};
use std::sync::Arc;
use std::time::Duration;

use crate::axis::{Axis, AxisIterable, ChannelsPlan, GridPlan, TimePlan, ZPlan};
use crate::error::{AppResult, SequenceError};
use crate::sequence::MdaSequence;

/// Exposure assumed for channels that do not set one, in milliseconds.
pub const DEFAULT_EXPOSURE_MS: f64 = 1.0;

/// Estimated duration of a sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeEstimate {
    /// Total acquisition time.
    pub total_duration: Duration,
    /// Time needed for the frames of one time point.
    pub per_t_duration: Duration,
    /// Some time point takes longer than the interval to the next one.
    pub time_interval_exceeded: bool,
}

impl Add for TimeEstimate {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            total_duration: self.total_duration + other.total_duration,
            per_t_duration: self.per_t_duration + other.per_t_duration,
            time_interval_exceeded: self.time_interval_exceeded || other.time_interval_exceeded,
        }
    }
}

impl AddAssign for TimeEstimate {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

/// The parts of a sequence the estimate depends on.
#[derive(Debug, Clone, Copy)]
struct Plans<'a> {
    time: Option<&'a TimePlan>,
    z: Option<&'a ZPlan>,
    grid: Option<&'a GridPlan>,
    channels: Option<&'a ChannelsPlan>,
    /// Product of the lengths of all other axes.
    repeats: usize,
}

impl<'a> Plans<'a> {
    /// Plans of `seq`, leaving out axes that `sub` declares itself.
    fn of(seq: &'a MdaSequence, sub: Option<&MdaSequence>) -> AppResult<Self> {
        let mut plans = Self {
            time: None,
            z: None,
            grid: None,
            channels: None,
            repeats: 1,
        };
        let replaced = |axis: &Arc<Axis>| sub.is_some_and(|s| s.axis(axis.axis_key()).is_some());
        for axis in seq.axes().iter().filter(|a| !replaced(a)) {
            match &**axis {
                Axis::Time(plan) => plans.time = Some(plan),
                Axis::Z(plan) => plans.z = Some(plan),
                Axis::Grid(plan) => plans.grid = Some(plan),
                Axis::Channels(plan) => plans.channels = Some(plan),
                Axis::StagePositions(_) => {}
                other => plans.repeats *= bounded_length(other)?,
            }
        }
        Ok(plans)
    }

    /// Plans of a position's sub-sequence, falling back to the parent's.
    fn nested(parent: &'a MdaSequence, sub: &'a MdaSequence) -> AppResult<Self> {
        let inherited = Self::of(parent, Some(sub))?;
        let own = Self::of(sub, None)?;
        Ok(Self {
            time: own.time.or(inherited.time),
            z: own.z.or(inherited.z),
            grid: own.grid.or(inherited.grid),
            channels: own.channels.or(inherited.channels),
            repeats: inherited.repeats * own.repeats,
        })
    }

    fn estimate(&self, positions: usize) -> AppResult<TimeEstimate> {
        let intervals = match self.time {
            Some(plan) => plan.schedule().ok_or_else(|| unbounded(plan))?,
            None => Vec::new(),
        };
        let n_times = match self.time {
            Some(plan) => plan.length().ok_or_else(|| unbounded(plan))?,
            None => 1,
        };
        if n_times == 0 || positions == 0 || self.repeats == 0 {
            return Ok(TimeEstimate::default());
        }

        let z_planes = self.z.map_or(1, ZPlan::num_positions);
        let grid_points = self.grid.map_or(1, |g| g.points.len());
        let factor = (positions * self.repeats * grid_points) as f64;

        let slice = |t: usize| -> f64 {
            let exposure_s = match self.channels {
                Some(plan) => plan
                    .channels
                    .iter()
                    .filter(|ch| ch.acquired_at(t))
                    .map(|ch| {
                        let frames = if ch.do_stack { z_planes } else { 1 };
                        frames as f64 * ch.exposure.unwrap_or(DEFAULT_EXPOSURE_MS) / 1000.0
                    })
                    .sum(),
                None => z_planes as f64 * DEFAULT_EXPOSURE_MS / 1000.0,
            };
            exposure_s * factor
        };

        let mut total = 0.0;
        let mut exceeded = false;
        for t in 0..n_times {
            let s = slice(t);
            match intervals.get(t) {
                Some(&interval) => {
                    exceeded |= interval > 0.0 && s > interval;
                    total += s.max(interval);
                }
                None => total += s,
            }
        }

        Ok(TimeEstimate {
            total_duration: seconds(total),
            per_t_duration: seconds(slice(0)),
            time_interval_exceeded: exceeded,
        })
    }
}

/// Estimates too long for a [`Duration`] saturate.
fn seconds(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

fn bounded_length(axis: &Axis) -> AppResult<usize> {
    axis.length().ok_or_else(|| SequenceError::Unbounded {
        what: "duration estimate",
        axis: axis.axis_key().to_string(),
    })
}

fn unbounded(plan: &TimePlan) -> SequenceError {
    SequenceError::Unbounded {
        what: "duration estimate",
        axis: plan.axis_key().to_string(),
    }
}

/// Estimate how long `seq` takes to acquire.
///
/// # Errors
///
/// [`SequenceError::Unbounded`] if the sequence, or a position's
/// sub-sequence, has an axis without a known length.
pub fn estimate_duration(seq: &MdaSequence) -> AppResult<TimeEstimate> {
    let plans = Plans::of(seq, None)?;
    let Some(positions) = seq.stage_positions() else {
        return plans.estimate(1);
    };
    if positions.values.iter().all(|item| item.as_sequence().is_none()) {
        return plans.estimate(positions.values.len());
    }

    let mut estimate = TimeEstimate::default();
    for item in &positions.values {
        estimate += match item.as_sequence() {
            Some(sub) => Plans::nested(seq, sub)?.estimate(1)?,
            None => plans.estimate(1)?,
        };
    }
    tracing::debug!(
        total_s = estimate.total_duration.as_secs_f64(),
        exceeded = estimate.time_interval_exceeded,
        "estimated sequence duration"
    );
    Ok(estimate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::{AxisItem, Channel, CounterAxis, Position, StagePositions};

    fn secs(estimate: Duration) -> f64 {
        estimate.as_secs_f64()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_intervals_dominate_short_slices() {
        let seq = MdaSequence::builder()
            .time(TimePlan::interval_loops(Duration::from_secs(1), 3))
            .channels([
                Channel::new("DAPI").with_exposure(10.0),
                Channel::new("FITC").with_exposure(20.0),
            ])
            .z(ZPlan::range_around(2.0, 1.0))
            .build()
            .unwrap();
        let est = estimate_duration(&seq).unwrap();
        assert!(close(secs(est.per_t_duration), 0.09));
        assert!(close(secs(est.total_duration), 2.09));
        assert!(!est.time_interval_exceeded);
    }

    #[test]
    fn test_overflowing_estimate_saturates() {
        let seq = MdaSequence::builder()
            .channels([Channel::new("DAPI").with_exposure(1e30)])
            .build()
            .unwrap();
        let est = estimate_duration(&seq).unwrap();
        assert_eq!(est.total_duration, Duration::MAX);
        assert_eq!(est.per_t_duration, Duration::MAX);
    }

    #[test]
    fn test_long_slices_exceed_interval() {
        let seq = MdaSequence::builder()
            .time(TimePlan::interval_loops(Duration::from_secs(1), 2))
            .channels([
                Channel::new("A").with_exposure(600.0),
                Channel::new("B").with_exposure(600.0),
            ])
            .build()
            .unwrap();
        let est = estimate_duration(&seq).unwrap();
        assert!(close(secs(est.total_duration), 2.4));
        assert!(est.time_interval_exceeded);
    }

    #[test]
    fn test_acquire_every_thins_slices() {
        let seq = MdaSequence::builder()
            .time(TimePlan::interval_loops(Duration::ZERO, 3))
            .channels([
                Channel::new("A").with_exposure(10.0),
                Channel::new("B").with_exposure(100.0).with_acquire_every(2),
            ])
            .build()
            .unwrap();
        let est = estimate_duration(&seq).unwrap();
        assert!(close(secs(est.total_duration), 0.23));
        assert!(!est.time_interval_exceeded);
    }

    #[test]
    fn test_sub_sequence_replaces_parent_plans() {
        let sub = MdaSequence::builder()
            .z(ZPlan::range_around(4.0, 1.0))
            .value(Position::xy(1.0, 1.0))
            .build()
            .unwrap();
        let seq = MdaSequence::builder()
            .stage_positions(StagePositions::new([
                AxisItem::from(Position::xy(0.0, 0.0)),
                AxisItem::from(sub),
            ]))
            .channels([Channel::new("A").with_exposure(10.0)])
            .build()
            .unwrap();
        let est = estimate_duration(&seq).unwrap();
        assert!(close(secs(est.total_duration), 0.01 + 5.0 * 0.01));
    }

    #[test]
    fn test_unbounded_sequence_has_no_estimate() {
        let seq = MdaSequence::builder()
            .custom_axis(CounterAxis::new("n"))
            .build()
            .unwrap();
        assert!(matches!(
            estimate_duration(&seq),
            Err(SequenceError::Unbounded { .. })
        ));
    }
}
