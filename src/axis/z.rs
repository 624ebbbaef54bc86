//! Z axis (`z`): focus planes.
//!
//! Range modes (`top_bottom`, `range_around`, `above_below`) visit
//! `start, start + step, ...` until the end of the range is covered; the
//! start is always visited, the end only if the step divides the range.
//! `top_bottom` and `absolute` are absolute stage positions, every other mode
//! is relative to the current z position and contributes a delta.

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, SequenceError};
use crate::event::{Contribution, Coord, EventField};

use super::{keys, AxisIndex, AxisItem, AxisIterable, AxisValue};

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

/// How the z positions are described.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ZMode {
    /// Absolute range from `bottom` to `top`.
    TopBottom { top: f64, bottom: f64, step: f64 },
    /// Symmetric range of total width `range` around the current position.
    RangeAround { range: f64, step: f64 },
    /// `below` under to `above` over the current position.
    AboveBelow { above: f64, below: f64, step: f64 },
    /// Explicit absolute positions.
    Absolute { positions: Vec<f64> },
    /// Explicit offsets from the current position.
    Relative { positions: Vec<f64> },
}

/// Z stack plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZPlan {
    /// Position description.
    #[serde(flatten)]
    pub mode: ZMode,
    /// Visit positions bottom to top (`false` reverses the order).
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub go_up: bool,
}

impl ZPlan {
    /// Plan for `mode`, going up.
    pub fn new(mode: ZMode) -> Self {
        Self { mode, go_up: true }
    }

    /// `range` microns around the current position.
    pub fn range_around(range: f64, step: f64) -> Self {
        Self::new(ZMode::RangeAround { range, step })
    }

    /// Explicit absolute positions.
    pub fn absolute(positions: impl Into<Vec<f64>>) -> Self {
        Self::new(ZMode::Absolute {
            positions: positions.into(),
        })
    }

    /// Explicit relative offsets.
    pub fn relative(positions: impl Into<Vec<f64>>) -> Self {
        Self::new(ZMode::Relative {
            positions: positions.into(),
        })
    }

    /// Reverse the visiting order.
    #[must_use]
    pub fn going_down(mut self) -> Self {
        self.go_up = false;
        self
    }

    /// Whether positions are offsets from the current z.
    #[must_use]
    pub fn is_relative(&self) -> bool {
        !matches!(
            self.mode,
            ZMode::TopBottom { .. } | ZMode::Absolute { .. }
        )
    }

    fn start_stop_step(&self) -> Option<(f64, f64, f64)> {
        match self.mode {
            ZMode::TopBottom { top, bottom, step } => Some((bottom, top, step)),
            ZMode::RangeAround { range, step } => Some((-range / 2.0, range / 2.0, step)),
            ZMode::AboveBelow { above, below, step } => Some((-below.abs(), above.abs(), step)),
            ZMode::Absolute { .. } | ZMode::Relative { .. } => None,
        }
    }

    /// Number of planes.
    #[must_use]
    pub fn num_positions(&self) -> usize {
        match &self.mode {
            ZMode::Absolute { positions } | ZMode::Relative { positions } => positions.len(),
            _ => match self.start_stop_step() {
                Some((_, _, step)) if step == 0.0 => 1,
                Some((start, stop, step)) => {
                    let steps = ((stop + step - start) / step * 1e6).round() / 1e6;
                    steps.ceil().max(0.0) as usize
                }
                None => 0,
            },
        }
    }

    /// Positions in visiting order.
    #[must_use]
    pub fn positions(&self) -> Vec<f64> {
        let mut positions = match &self.mode {
            ZMode::Absolute { positions } | ZMode::Relative { positions } => positions.clone(),
            _ => match self.start_stop_step() {
                Some((start, _, step)) => (0..self.num_positions())
                    .map(|k| start + k as f64 * step)
                    .collect(),
                None => Vec::new(),
            },
        };
        if !self.go_up {
            positions.reverse();
        }
        positions
    }
}

impl AxisIterable for ZPlan {
    fn axis_key(&self) -> &str {
        keys::Z
    }

    fn iter(&self) -> Box<dyn Iterator<Item = AxisItem>> {
        Box::new(
            self.positions()
                .into_iter()
                .map(|z| AxisItem::Value(AxisValue::Number(z))),
        )
    }

    fn length(&self) -> Option<usize> {
        Some(self.num_positions())
    }

    fn contribute(&self, value: &AxisValue, _index: &AxisIndex) -> Contribution {
        let Some(z) = value.as_f64() else {
            return Contribution::new();
        };
        if self.is_relative() {
            Contribution::new().with(EventField::PositionDelta(Coord::Z, z))
        } else {
            Contribution::new().with(EventField::Position(Coord::Z, z))
        }
    }

    fn relative_offset(&self, index: usize) -> Option<f64> {
        if self.is_relative() {
            self.positions().get(index).copied()
        } else {
            None
        }
    }

    fn validate(&self) -> AppResult<()> {
        match self.start_stop_step() {
            Some((_, _, step)) if !step.is_finite() || step < 0.0 => Err(
                SequenceError::invalid_axis(keys::Z, "step must be a non-negative number"),
            ),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_around_positions() {
        let plan = ZPlan::range_around(4.0, 1.0);
        assert_eq!(plan.positions(), vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_eq!(plan.length(), Some(5));
        assert!(plan.is_relative());
    }

    #[test]
    fn test_top_bottom_is_absolute_and_covers_range() {
        let plan = ZPlan::new(ZMode::TopBottom {
            top: 8.0,
            bottom: 4.0,
            step: 1.5,
        });
        // 4, 5.5, 7, 8.5: the last plane covers the top.
        assert_eq!(plan.num_positions(), 4);
        assert!(!plan.is_relative());
        let contribution = plan.contribute(&AxisValue::Number(4.0), &AxisIndex::new());
        assert_eq!(contribution.fields(), &[EventField::Position(Coord::Z, 4.0)]);
    }

    #[test]
    fn test_zero_step_is_a_single_plane() {
        let plan = ZPlan::new(ZMode::AboveBelow {
            above: 2.0,
            below: 2.0,
            step: 0.0,
        });
        assert_eq!(plan.positions(), vec![-2.0]);
    }

    #[test]
    fn test_go_down_reverses() {
        let plan = ZPlan::relative(vec![0.0, 1.0, 2.0]).going_down();
        assert_eq!(plan.positions(), vec![2.0, 1.0, 0.0]);
        assert_eq!(plan.relative_offset(0), Some(2.0));
    }

    #[test]
    fn test_negative_step_rejected() {
        let plan = ZPlan::range_around(4.0, -1.0);
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_serialized_form_uses_mode_tag() {
        let json = serde_json::to_value(ZPlan::range_around(2.0, 0.5)).unwrap();
        assert_eq!(json, serde_json::json!({"mode": "range_around", "range": 2.0, "step": 0.5}));
        let back: ZPlan = serde_json::from_value(json).unwrap();
        assert_eq!(back, ZPlan::range_around(2.0, 0.5));
    }
}
