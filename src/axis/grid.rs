//! Grid axis (`g`): x/y points visited at every stage position.

use serde::{Deserialize, Serialize};

use crate::event::{Contribution, Coord};

use super::{keys, AxisIndex, AxisItem, AxisIterable, AxisValue, Position};

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

/// One grid point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    #[allow(missing_docs)]
    pub x: f64,
    #[allow(missing_docs)]
    pub y: f64,
}

/// Explicit list of grid points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPlan {
    /// Points in visiting order.
    pub points: Vec<GridPoint>,
    /// Points are offsets from the current stage position.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub relative: bool,
}

impl GridPlan {
    /// Relative grid over `points`.
    pub fn relative(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Self {
            points: points.into_iter().map(|(x, y)| GridPoint { x, y }).collect(),
            relative: true,
        }
    }

    /// Row-major raster of `rows` x `columns` tiles `dx`/`dy` apart, centred
    /// on the current position.
    pub fn raster(rows: usize, columns: usize, dx: f64, dy: f64) -> Self {
        let x0 = -dx * columns.saturating_sub(1) as f64 / 2.0;
        let y0 = dy * rows.saturating_sub(1) as f64 / 2.0;
        Self::relative((0..rows).flat_map(move |r| {
            (0..columns).map(move |c| (x0 + c as f64 * dx, y0 - r as f64 * dy))
        }))
    }
}

impl AxisIterable for GridPlan {
    fn axis_key(&self) -> &str {
        keys::GRID
    }

    fn iter(&self) -> Box<dyn Iterator<Item = AxisItem>> {
        let relative = self.relative;
        Box::new(self.points.clone().into_iter().map(move |p| {
            AxisItem::Value(AxisValue::Position(Position {
                x: Some(p.x),
                y: Some(p.y),
                is_relative: relative,
                ..Position::default()
            }))
        }))
    }

    fn length(&self) -> Option<usize> {
        Some(self.points.len())
    }

    fn contribute(&self, value: &AxisValue, _index: &AxisIndex) -> Contribution {
        let AxisValue::Position(p) = value else {
            return Contribution::new();
        };
        if p.is_relative {
            Contribution::new()
                .with_delta(Coord::X, p.x)
                .with_delta(Coord::Y, p.y)
        } else {
            Contribution::new()
                .with_position(Coord::X, p.x)
                .with_position(Coord::Y, p.y)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventField;

    #[test]
    fn test_raster_is_centred() {
        let grid = GridPlan::raster(2, 2, 10.0, 10.0);
        let points: Vec<_> = grid.points.iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(
            points,
            vec![(-5.0, 5.0), (5.0, 5.0), (-5.0, -5.0), (5.0, -5.0)]
        );
    }

    #[test]
    fn test_relative_points_contribute_deltas() {
        let grid = GridPlan::relative([(1.0, 2.0)]);
        let item = grid.iter().next().unwrap();
        let fields = grid.contribute(item.value().unwrap(), &AxisIndex::new());
        assert_eq!(
            fields.fields(),
            &[
                EventField::PositionDelta(Coord::X, 1.0),
                EventField::PositionDelta(Coord::Y, 2.0)
            ]
        );
    }
}
