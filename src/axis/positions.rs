//! Stage position axis (`p`).
//!
//! A position may carry its own sub-sequence, written either as a nested
//! sequence valued by the position or, in serialized input, as a position
//! with an inline `sequence`. The position's coordinates are then the base
//! for the relative axes of the sub-sequence.
//!
//! Axes the sub-sequence does not declare keep the parent's current value.
//! To avoid acquiring the same data twice, combinations in which such a
//! parent-owned channel, z or grid axis sits at a non-zero index are skipped
//! whenever the sub-sequence owns that dimension itself (see
//! [`StagePositions::should_skip`]).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, SequenceError};
use crate::event::{Contribution, Coord, EventField};
use crate::sequence::MdaSequence;

use super::{keys, AxisIndex, AxisItem, AxisIterable, AxisValue, Prefix, PrefixEntry};

fn is_false(value: &bool) -> bool {
    !*value
}

/// A stage position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Position {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    /// Position label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Coordinates are offsets from the current stage position.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_relative: bool,
}

impl Position {
    /// Absolute position at `(x, y)`.
    pub fn xy(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    /// Absolute position at `(x, y, z)`.
    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self {
            z: Some(z),
            ..Self::xy(x, y)
        }
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn relative(mut self) -> Self {
        self.is_relative = true;
        self
    }

    /// Event fields for this position, as deltas if it is relative.
    pub(crate) fn contribution(&self) -> Contribution {
        let coords = [(Coord::X, self.x), (Coord::Y, self.y), (Coord::Z, self.z)];
        let mut contribution = Contribution::new();
        for (coord, value) in coords {
            contribution = if self.is_relative {
                contribution.with_delta(coord, value)
            } else {
                contribution.with_position(coord, value)
            };
        }
        match &self.name {
            Some(name) => contribution.with(EventField::PosName(name.clone())),
            None => contribution,
        }
    }
}

/// Stage position axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagePositions {
    /// Positions, or nested sequences valued by a position.
    pub values: Vec<AxisItem>,
}

impl StagePositions {
    #[allow(missing_docs)]
    pub fn new<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AxisItem>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// The sub-sequence attached to the position at `index`, if any.
    #[must_use]
    pub fn sub_sequence(&self, index: usize) -> Option<&Arc<MdaSequence>> {
        self.values.get(index).and_then(AxisItem::as_sequence)
    }
}

impl AxisIterable for StagePositions {
    fn axis_key(&self) -> &str {
        keys::POSITION
    }

    fn iter(&self) -> Box<dyn Iterator<Item = AxisItem>> {
        Box::new(self.values.clone().into_iter())
    }

    fn length(&self) -> Option<usize> {
        Some(self.values.len())
    }

    /// Skip combinations that would re-acquire a dimension owned by the
    /// current position's sub-sequence.
    ///
    /// Only applies when the sub-sequence has no autofocus plan of its own.
    /// A parent-owned channel at a non-zero index is skipped if the
    /// sub-sequence declares channels together with a grid, z or time plan,
    /// or declares none of those plans. A parent-owned z or grid axis at a
    /// non-zero index is skipped if the sub-sequence declares the same axis.
    fn should_skip(&self, prefix: &Prefix) -> bool {
        let Some(index) = prefix.index_of(keys::POSITION) else {
            return false;
        };
        let Some(sub) = self.sub_sequence(index) else {
            return false;
        };
        if sub.autofocus_plan.is_some() {
            return false;
        }

        let declares = |key: &str| sub.axis(key).is_some();
        let plans = declares(keys::GRID) || declares(keys::Z) || declares(keys::TIME);
        let from_sub = |entry: &PrefixEntry| sub.axes.iter().any(|a| Arc::ptr_eq(a, &entry.axis));
        let owned_by_parent = |key: &str| -> Option<usize> {
            let entry = prefix.get(key)?;
            if !from_sub(entry) {
                return Some(entry.index);
            }
            prefix
                .shadowed(key)
                .filter(|shadowed| !from_sub(shadowed))
                .map(|shadowed| shadowed.index)
        };

        if owned_by_parent(keys::CHANNEL).is_some_and(|i| i != 0)
            && ((declares(keys::CHANNEL) && plans) || !plans)
        {
            return true;
        }
        if owned_by_parent(keys::Z).is_some_and(|i| i != 0) && declares(keys::Z) {
            return true;
        }
        owned_by_parent(keys::GRID).is_some_and(|i| i != 0) && declares(keys::GRID)
    }

    fn contribute(&self, value: &AxisValue, _index: &AxisIndex) -> Contribution {
        match value {
            AxisValue::Position(position) => position.contribution(),
            _ => Contribution::new(),
        }
    }

    fn validate(&self) -> AppResult<()> {
        if self.values.iter().any(|item| item.value().is_none()) {
            return Err(SequenceError::MissingOverrideValue {
                axis: keys::POSITION.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_position_contribution() {
        let p = Position::xyz(1.0, 2.0, 3.0).named("A1");
        assert_eq!(
            p.contribution().fields(),
            &[
                EventField::Position(Coord::X, 1.0),
                EventField::Position(Coord::Y, 2.0),
                EventField::Position(Coord::Z, 3.0),
                EventField::PosName("A1".into()),
            ]
        );
    }

    #[test]
    fn test_relative_position_contributes_deltas() {
        let p = Position {
            x: Some(5.0),
            ..Position::default()
        }
        .relative();
        assert_eq!(
            p.contribution().fields(),
            &[EventField::PositionDelta(Coord::X, 5.0)]
        );
    }

    #[test]
    fn test_position_rejects_unknown_fields() {
        let parsed: Result<Position, _> = serde_json::from_str(r#"{"x": 1, "w": 2}"#);
        assert!(parsed.is_err());
    }
}
