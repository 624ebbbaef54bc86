//! Turning one combination of axis values into an [`MdaEvent`].
//!
//! Each axis in the combination is asked for its [`Contribution`], a list of
//! typed event fields. The default [`MdaEventBuilder`] merges them in two
//! passes:
//!
//! 1. Absolute fields. Stage positions set by more than one axis are
//!    overwritten by the later axis (with a warning); every other field must
//!    agree or the build fails with [`SequenceError::ConflictingField`].
//! 2. Position deltas, added onto the absolute position (0 if unset).
//!
//! A sequence may install its own [`EventBuilder`]; the innermost sequence of
//! the context that has one is used for its combinations.

use std::fmt;
use std::sync::Arc;

use crate::axis::{AxisIndex, AxisIterable, Prefix};
use crate::error::{AppResult, SequenceError};
use crate::sequence::MdaSequence;

use super::{Action, EventChannel, MdaEvent};

/// Stage coordinate.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coord {
    X,
    Y,
    Z,
}

impl Coord {
    /// Event field name for this coordinate.
    #[must_use]
    pub fn field_name(self) -> &'static str {
        match self {
            Self::X => "x_pos",
            Self::Y => "y_pos",
            Self::Z => "z_pos",
        }
    }
}

/// One typed field an axis contributes to an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventField {
    /// Absolute stage position.
    Position(Coord, f64),
    /// Offset added to the stage position after all absolute fields are merged.
    PositionDelta(Coord, f64),
    /// Channel identity.
    Channel(EventChannel),
    /// Exposure in milliseconds.
    Exposure(f64),
    /// Minimum start time in seconds.
    MinStartTime(f64),
    /// Stage position name.
    PosName(String),
    /// Executor action.
    Action(Action),
    /// Free-form metadata entry.
    Metadata(String, serde_json::Value),
}

/// The fields one axis contributes for one value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contribution {
    fields: Vec<EventField>,
}

impl Contribution {
    /// Empty contribution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (builder style).
    #[must_use]
    pub fn with(mut self, field: EventField) -> Self {
        self.fields.push(field);
        self
    }

    /// Add an absolute position if `value` is set.
    #[must_use]
    pub fn with_position(self, coord: Coord, value: Option<f64>) -> Self {
        match value {
            Some(v) => self.with(EventField::Position(coord, v)),
            None => self,
        }
    }

    /// Add a position delta if `value` is set.
    #[must_use]
    pub fn with_delta(self, coord: Coord, value: Option<f64>) -> Self {
        match value {
            Some(v) => self.with(EventField::PositionDelta(coord, v)),
            None => self,
        }
    }

    /// Add a field in place.
    pub fn push(&mut self, field: EventField) {
        self.fields.push(field);
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in contribution order.
    pub fn fields(&self) -> &[EventField] {
        &self.fields
    }
}

impl IntoIterator for Contribution {
    type Item = EventField;
    type IntoIter = std::vec::IntoIter<EventField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl FromIterator<EventField> for Contribution {
    fn from_iter<I: IntoIterator<Item = EventField>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Builds events from combinations.
pub trait EventBuilder: fmt::Debug + Send + Sync {
    /// Build the event for `prefix`; `context` lists the sequences whose
    /// overrides produced it, outermost first.
    fn build(&self, prefix: &Prefix, context: &[Arc<MdaSequence>]) -> AppResult<MdaEvent>;
}

/// Default two-pass merging builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct MdaEventBuilder;

impl EventBuilder for MdaEventBuilder {
    fn build(&self, prefix: &Prefix, context: &[Arc<MdaSequence>]) -> AppResult<MdaEvent> {
        let mut index = AxisIndex::with_capacity(prefix.len());
        let mut contributions = Vec::with_capacity(prefix.len());
        for (key, entry) in prefix.iter() {
            index.insert(key.to_string(), entry.index);
            contributions.push((key, entry.axis.contribute(&entry.value, &index)));
        }

        let mut event = MdaEvent::with_index(index);
        event.sequence = context.last().cloned();

        let mut action_set = false;
        let mut deltas = Vec::new();
        for (key, contribution) in contributions {
            for field in contribution {
                match field {
                    EventField::PositionDelta(coord, delta) => deltas.push((coord, delta)),
                    EventField::Position(coord, value) => {
                        let slot = event.position_mut(coord);
                        if let Some(previous) = *slot {
                            if previous != value {
                                tracing::warn!(
                                    field = coord.field_name(),
                                    axis = key,
                                    previous,
                                    value,
                                    "overwriting stage position contributed by an earlier axis"
                                );
                            }
                        }
                        *slot = Some(value);
                    }
                    EventField::Channel(channel) => {
                        merge_field(&mut event.channel, channel, "channel", key)?;
                    }
                    EventField::Exposure(exposure) => {
                        merge_field(&mut event.exposure, exposure, "exposure", key)?;
                    }
                    EventField::MinStartTime(t) => {
                        merge_field(&mut event.min_start_time, t, "min_start_time", key)?;
                    }
                    EventField::PosName(name) => {
                        merge_field(&mut event.pos_name, name, "pos_name", key)?;
                    }
                    EventField::Action(action) => {
                        if action_set && event.action != action {
                            return Err(conflict("action", key));
                        }
                        event.action = action;
                        action_set = true;
                    }
                    EventField::Metadata(name, value) => match event.metadata.get(&name) {
                        Some(existing) if *existing != value => {
                            return Err(conflict("metadata", key));
                        }
                        _ => {
                            event.metadata.insert(name, value);
                        }
                    },
                }
            }
        }

        for (coord, delta) in deltas {
            let slot = event.position_mut(coord);
            *slot = Some(slot.unwrap_or(0.0) + delta);
        }

        Ok(event)
    }
}

fn conflict(field: &'static str, axis: &str) -> SequenceError {
    SequenceError::ConflictingField {
        field,
        axis: axis.to_string(),
    }
}

fn merge_field<T: PartialEq>(
    slot: &mut Option<T>,
    value: T,
    field: &'static str,
    axis: &str,
) -> AppResult<()> {
    match slot {
        Some(existing) if *existing != value => Err(conflict(field, axis)),
        _ => {
            *slot = Some(value);
            Ok(())
        }
    }
}
