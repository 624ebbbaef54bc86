//! Reading and writing sequences.
//!
//! Sequences serialize to JSON, YAML and TOML. Fields that are unset or at
//! their default are omitted and restored on read.
//!
//! Besides the `axes` list, the reader accepts the keyed form used by older
//! sequence files:
//!
//! ```yaml
//! axis_order: tpgcz
//! time_plan: {interval: 1s, loops: 3}
//! channels: [DAPI, {config: FITC, exposure: 20}]
//! stage_positions:
//!   - {x: 0, y: 0}
//!   - {x: 10, y: 10, sequence: {z_plan: {mode: range_around, range: 2, step: 1}}}
//! z_plan: {mode: absolute, positions: [0, 1]}
//! ```
//!
//! Keyed plans become axes in the order `t, p, g, c, z`; empty plans are
//! dropped. A compact `axis_order` string is split into single-letter keys.
//! Mixing `axes` with keyed plans is an error.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::axis::{
    Axis, AxisItem, AxisValue, Channel, ChannelsPlan, GridPlan, StagePositions, TimePhase,
    TimePlan, ZPlan,
};
use crate::error::{AppResult, SequenceError};
use crate::transform::AxesBasedAf;

use super::{order, MdaSequence};

/// A list of keys, written either as a list or as a single string.
#[derive(Deserialize)]
#[serde(untagged)]
enum KeyList {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyTimePlan {
    Plan(TimePlan),
    Phases(Vec<TimePhase>),
    Phase(TimePhase),
}

impl From<LegacyTimePlan> for TimePlan {
    fn from(plan: LegacyTimePlan) -> Self {
        match plan {
            LegacyTimePlan::Plan(plan) => plan,
            LegacyTimePlan::Phases(phases) => TimePlan { phases },
            LegacyTimePlan::Phase(phase) => TimePlan {
                phases: vec![phase],
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyChannel {
    Name(String),
    Full(Channel),
}

/// Serialized form of a sequence, validated into [`MdaSequence`].
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SequenceRepr {
    #[serde(default)]
    axes: Vec<Axis>,
    #[serde(default)]
    axis_order: Option<KeyList>,
    #[serde(default)]
    value: Option<AxisValue>,
    #[serde(default)]
    autofocus_plan: Option<AxesBasedAf>,
    #[serde(default)]
    keep_shutter_open_across: Option<KeyList>,
    #[serde(default)]
    metadata: IndexMap<String, serde_json::Value>,
    #[serde(default)]
    time_plan: Option<LegacyTimePlan>,
    #[serde(default)]
    stage_positions: Option<Vec<AxisItem>>,
    #[serde(default)]
    grid_plan: Option<GridPlan>,
    #[serde(default)]
    channels: Option<Vec<LegacyChannel>>,
    #[serde(default)]
    z_plan: Option<ZPlan>,
}

impl SequenceRepr {
    /// Names of the keyed plans present in the input.
    fn legacy_fields(&self) -> Vec<&'static str> {
        [
            ("time_plan", self.time_plan.is_some()),
            ("stage_positions", self.stage_positions.is_some()),
            ("grid_plan", self.grid_plan.is_some()),
            ("channels", self.channels.is_some()),
            ("z_plan", self.z_plan.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }

    /// Keyed plans as axes, in canonical order.
    fn take_legacy_axes(&mut self) -> Vec<Axis> {
        let mut axes = Vec::new();
        if let Some(plan) = self.time_plan.take() {
            let plan = TimePlan::from(plan);
            if !plan.phases.is_empty() {
                axes.push(Axis::Time(plan));
            }
        }
        if let Some(values) = self.stage_positions.take().filter(|v| !v.is_empty()) {
            axes.push(Axis::StagePositions(StagePositions { values }));
        }
        if let Some(grid) = self.grid_plan.take().filter(|g| !g.points.is_empty()) {
            axes.push(Axis::Grid(grid));
        }
        if let Some(channels) = self.channels.take().filter(|c| !c.is_empty()) {
            axes.push(Axis::Channels(ChannelsPlan::new(channels.into_iter().map(
                |c| match c {
                    LegacyChannel::Name(name) => Channel::new(name),
                    LegacyChannel::Full(channel) => channel,
                },
            ))));
        }
        if let Some(z) = self.z_plan.take() {
            axes.push(Axis::Z(z));
        }
        axes
    }
}

impl TryFrom<SequenceRepr> for MdaSequence {
    type Error = SequenceError;

    fn try_from(mut repr: SequenceRepr) -> AppResult<Self> {
        let legacy_fields = repr.legacy_fields();
        if !repr.axes.is_empty() && !legacy_fields.is_empty() {
            return Err(SequenceError::LegacyAndAxes(legacy_fields.join(", ")));
        }

        let legacy = repr.take_legacy_axes();
        let mut builder = MdaSequence::builder();
        for axis in repr.axes.into_iter().chain(legacy) {
            builder = builder.axis(axis);
        }
        match repr.axis_order {
            Some(KeyList::One(compact)) => builder = builder.axis_order(order::parse_compact(&compact)),
            Some(KeyList::Many(keys)) => builder = builder.axis_order(keys),
            None => {}
        }
        match repr.keep_shutter_open_across {
            Some(KeyList::One(key)) => builder = builder.keep_shutter_open_across([key]),
            Some(KeyList::Many(keys)) => builder = builder.keep_shutter_open_across(keys),
            None => {}
        }
        if let Some(value) = repr.value {
            builder = builder.value(value);
        }
        if let Some(plan) = repr.autofocus_plan {
            builder = builder.autofocus(plan);
        }
        for (key, value) in repr.metadata {
            builder = builder.metadata(key, value);
        }
        builder.build()
    }
}

// =============================================================================
// Formats
// =============================================================================

/// Text encodings a sequence can be stored in.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Toml,
}

impl Format {
    /// Format implied by the file extension of `path`.
    ///
    /// # Errors
    ///
    /// [`SequenceError::UnsupportedFormat`] for unknown or missing extensions.
    pub fn from_path(path: &Path) -> AppResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            _ => Err(SequenceError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

impl MdaSequence {
    /// Parse a sequence from JSON.
    pub fn from_json(text: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a sequence from YAML.
    pub fn from_yaml(text: &str) -> AppResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    #[allow(missing_docs)]
    pub fn to_yaml(&self) -> AppResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parse a sequence from TOML.
    pub fn from_toml(text: &str) -> AppResult<Self> {
        Ok(toml::from_str(text)?)
    }

    #[allow(missing_docs)]
    pub fn to_toml(&self) -> AppResult<String> {
        Ok(toml::to_string(self)?)
    }

    /// Parse `text` in `format`.
    pub fn from_str_as(text: &str, format: Format) -> AppResult<Self> {
        match format {
            Format::Json => Self::from_json(text),
            Format::Yaml => Self::from_yaml(text),
            Format::Toml => Self::from_toml(text),
        }
    }

    /// Serialize in `format`.
    pub fn to_string_as(&self, format: Format) -> AppResult<String> {
        match format {
            Format::Json => self.to_json(),
            Format::Yaml => self.to_yaml(),
            Format::Toml => self.to_toml(),
        }
    }

    /// Load a sequence file; the format follows the extension.
    pub fn from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let format = Format::from_path(path)?;
        let text = fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), ?format, "loading sequence");
        Self::from_str_as(&text, format)
    }

    /// Write this sequence to `path`; the format follows the extension.
    pub fn write_to(&self, path: impl AsRef<Path>) -> AppResult<()> {
        let path = path.as_ref();
        let text = self.to_string_as(Format::from_path(path)?)?;
        fs::write(path, text)?;
        Ok(())
    }
}
