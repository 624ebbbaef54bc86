//! Acquisition events: the records emitted by a sequence.
//!
//! An [`MdaEvent`] carries the index of every active axis plus the fields the
//! axes contributed (stage position, channel, exposure, timing). Events are
//! built by an [`EventBuilder`](builder::EventBuilder) from one combination of
//! axis values and may afterwards be copied and edited by the transform
//! pipeline (see [`crate::transform`]).
//!
//! Every field except `index` is optional; unset fields and fields equal to
//! their default are left out of the serialized form.

pub mod builder;

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::axis::AxisIndex;
use crate::sequence::MdaSequence;

pub use builder::{Contribution, Coord, EventBuilder, EventField, MdaEventBuilder};

fn default_group() -> String {
    "Channel".to_string()
}

fn is_default_group(group: &str) -> bool {
    group == "Channel"
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Channel identity carried by an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventChannel {
    /// Name of the channel configuration (preset).
    pub config: String,
    /// Configuration group the preset belongs to.
    #[serde(default = "default_group", skip_serializing_if = "is_default_group")]
    pub group: String,
}

impl EventChannel {
    /// Channel in the default `"Channel"` group.
    pub fn new(config: impl Into<String>) -> Self {
        Self {
            config: config.into(),
            group: default_group(),
        }
    }
}

/// What the executor should do for an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Snap an image (the default).
    #[default]
    AcquireImage,
    /// Run the hardware autofocus before acquiring.
    HardwareAutofocus {
        /// Optional name of the autofocus offset device.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        autofocus_device_name: Option<String>,
        /// Offset to move the autofocus motor to first, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        autofocus_motor_offset: Option<f64>,
    },
    /// Free-form action interpreted by the executor.
    Custom {
        /// Name of the action.
        #[serde(default)]
        name: String,
        /// Arbitrary payload.
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        data: IndexMap<String, serde_json::Value>,
    },
}

impl Action {
    /// Whether this is the default image acquisition.
    #[must_use]
    pub fn is_acquire_image(&self) -> bool {
        matches!(self, Self::AcquireImage)
    }
}

/// One acquisition event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MdaEvent {
    /// Index of each active axis, in prefix order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub index: AxisIndex,
    /// Channel to acquire with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<EventChannel>,
    /// Exposure in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure: Option<f64>,
    /// Earliest start time in seconds, relative to the start of the phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_start_time: Option<f64>,
    /// Name of the stage position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_name: Option<String>,
    /// Stage X position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_pos: Option<f64>,
    /// Stage Y position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_pos: Option<f64>,
    /// Stage Z position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_pos: Option<f64>,
    /// Free-form metadata contributed by axes.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, serde_json::Value>,
    /// Action to perform.
    #[serde(default, skip_serializing_if = "Action::is_acquire_image")]
    pub action: Action,
    /// Leave the shutter open after this event.
    #[serde(default, skip_serializing_if = "is_false")]
    pub keep_shutter_open: bool,
    /// Restart the executor's event timer before this event.
    #[serde(default, skip_serializing_if = "is_false")]
    pub reset_event_timer: bool,
    /// Innermost sequence that produced this event.
    #[serde(skip)]
    pub sequence: Option<Arc<MdaSequence>>,
}

impl PartialEq for MdaEvent {
    // The back-reference is identity, not content.
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.channel == other.channel
            && self.exposure == other.exposure
            && self.min_start_time == other.min_start_time
            && self.pos_name == other.pos_name
            && self.x_pos == other.x_pos
            && self.y_pos == other.y_pos
            && self.z_pos == other.z_pos
            && self.metadata == other.metadata
            && self.action == other.action
            && self.keep_shutter_open == other.keep_shutter_open
            && self.reset_event_timer == other.reset_event_timer
    }
}

impl MdaEvent {
    /// Empty event with the given index.
    pub fn with_index(index: AxisIndex) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    /// Index of `key`, if the axis is active for this event.
    #[must_use]
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Position along one stage coordinate.
    #[must_use]
    pub fn position(&self, coord: Coord) -> Option<f64> {
        match coord {
            Coord::X => self.x_pos,
            Coord::Y => self.y_pos,
            Coord::Z => self.z_pos,
        }
    }

    /// Mutable slot for one stage coordinate.
    pub fn position_mut(&mut self, coord: Coord) -> &mut Option<f64> {
        match coord {
            Coord::X => &mut self.x_pos,
            Coord::Y => &mut self.y_pos,
            Coord::Z => &mut self.z_pos,
        }
    }
}
