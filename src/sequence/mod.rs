//! MdaSequence - the declarative description of an acquisition.
//!
//! A sequence is an ordered set of axes with unique keys, plus the settings
//! that shape its events: an optional nesting order, an autofocus plan, the
//! axes across which the shutter may stay open, free-form metadata, and
//! optionally a custom event builder and extra transforms. A sequence that an
//! axis yields as one of its items overrides the rest of that branch and is
//! recorded under its `value`.
//!
//! Sequences are validated when built ([`SequenceBuilder::build`]) or
//! deserialized, and are immutable afterwards.
//!
//! # Example
//!
//! ```rust
//! use rust_mda::axis::{Channel, ZPlan};
//! use rust_mda::sequence::MdaSequence;
//!
//! let seq = MdaSequence::builder()
//!     .values("t", [0, 1])
//!     .channels([Channel::new("DAPI"), Channel::new("FITC")])
//!     .z(ZPlan::range_around(2.0, 1.0))
//!     .build()?;
//!
//! assert_eq!(seq.iter_events().count(), 2 * 2 * 3);
//! # Ok::<(), rust_mda::error::SequenceError>(())
//! ```

pub mod io;
pub mod iterate;
pub mod order;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::axis::{
    keys, Axis, AxisItem, AxisIterable, AxisValue, Channel, ChannelsPlan, GridPlan,
    StagePositions, TimePlan, ValueAxis, ZPlan,
};
use crate::error::{AppResult, SequenceError};
use crate::event::EventBuilder;
use crate::transform::{AxesBasedAf, EventStream, TransformSpec};

pub use iterate::{AxesIter, Combination};

/// Default number of indices an unbounded axis visits per window.
pub const DEFAULT_WINDOW_SIZE: usize = 1000;

/// Options for one enumeration of a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterOptions {
    /// Order overriding the sequence's own, inherited by nested sequences
    /// without an order of their own.
    pub axis_order: Option<Vec<String>>,
    /// Window size for unbounded axes.
    pub window_size: usize,
}

impl Default for IterOptions {
    fn default() -> Self {
        Self {
            axis_order: None,
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl IterOptions {
    #[allow(missing_docs)]
    #[must_use]
    pub fn with_axis_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.axis_order = Some(order.into_iter().map(Into::into).collect());
        self
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }
}

/// A multi-dimensional acquisition sequence.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "io::SequenceRepr")]
pub struct MdaSequence {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) axes: Vec<Arc<Axis>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) axis_order: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) value: Option<AxisValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) autofocus_plan: Option<AxesBasedAf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) keep_shutter_open_across: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub(crate) metadata: IndexMap<String, serde_json::Value>,
    #[serde(skip)]
    pub(crate) event_builder: Option<Arc<dyn EventBuilder>>,
    #[serde(skip)]
    pub(crate) transforms: Vec<TransformSpec>,
}

impl fmt::Debug for MdaSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.axes.iter().map(|a| a.axis_key()).collect();
        f.debug_struct("MdaSequence")
            .field("axes", &keys)
            .field("axis_order", &self.axis_order)
            .field("value", &self.value)
            .field("autofocus_plan", &self.autofocus_plan)
            .field("keep_shutter_open_across", &self.keep_shutter_open_across)
            .field("custom_builder", &self.event_builder.is_some())
            .field("transforms", &self.transforms)
            .finish()
    }
}

impl PartialEq for MdaSequence {
    // Custom builders and transforms have no content to compare.
    fn eq(&self, other: &Self) -> bool {
        self.axes == other.axes
            && self.axis_order == other.axis_order
            && self.value == other.value
            && self.autofocus_plan == other.autofocus_plan
            && self.keep_shutter_open_across == other.keep_shutter_open_across
            && self.metadata == other.metadata
    }
}

impl MdaSequence {
    /// Start building a sequence.
    pub fn builder() -> SequenceBuilder {
        SequenceBuilder::default()
    }

    /// Copy of this sequence with `value` as its representative value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<AxisValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Axes in declaration order.
    pub fn axes(&self) -> &[Arc<Axis>] {
        &self.axes
    }

    /// Axis with `key`.
    #[must_use]
    pub fn axis(&self, key: &str) -> Option<&Arc<Axis>> {
        self.axes.iter().find(|a| a.axis_key() == key)
    }

    /// Explicit nesting order.
    pub fn axis_order(&self) -> Option<&[String]> {
        self.axis_order.as_deref()
    }

    /// Representative value when used as an override.
    pub fn value(&self) -> Option<&AxisValue> {
        self.value.as_ref()
    }

    #[allow(missing_docs)]
    pub fn autofocus_plan(&self) -> Option<&AxesBasedAf> {
        self.autofocus_plan.as_ref()
    }

    #[allow(missing_docs)]
    pub fn keep_shutter_open_across(&self) -> &[String] {
        &self.keep_shutter_open_across
    }

    #[allow(missing_docs)]
    pub fn metadata(&self) -> &IndexMap<String, serde_json::Value> {
        &self.metadata
    }

    /// Custom event builder, if one is installed.
    pub fn event_builder(&self) -> Option<&Arc<dyn EventBuilder>> {
        self.event_builder.as_ref()
    }

    /// Time axis.
    pub fn time_plan(&self) -> Option<&TimePlan> {
        match self.axis(keys::TIME).map(|a| &**a) {
            Some(Axis::Time(plan)) => Some(plan),
            _ => None,
        }
    }

    /// Z axis.
    pub fn z_plan(&self) -> Option<&ZPlan> {
        match self.axis(keys::Z).map(|a| &**a) {
            Some(Axis::Z(plan)) => Some(plan),
            _ => None,
        }
    }

    /// Channel axis.
    pub fn channels(&self) -> Option<&ChannelsPlan> {
        match self.axis(keys::CHANNEL).map(|a| &**a) {
            Some(Axis::Channels(plan)) => Some(plan),
            _ => None,
        }
    }

    /// Stage position axis.
    pub fn stage_positions(&self) -> Option<&StagePositions> {
        match self.axis(keys::POSITION).map(|a| &**a) {
            Some(Axis::StagePositions(plan)) => Some(plan),
            _ => None,
        }
    }

    /// Grid axis.
    pub fn grid_plan(&self) -> Option<&GridPlan> {
        match self.axis(keys::GRID).map(|a| &**a) {
            Some(Axis::Grid(plan)) => Some(plan),
            _ => None,
        }
    }

    // =========================================================================
    // Shape
    // =========================================================================

    /// Axes in this sequence's own nesting order.
    pub fn ordered_axes(&self) -> Vec<Arc<Axis>> {
        order::ordered(&self.axes, self.axis_order.as_deref())
    }

    /// Keys of the ordered axes that are not empty.
    pub fn used_axes(&self) -> Vec<String> {
        self.ordered_axes()
            .iter()
            .filter(|a| a.length() != Some(0))
            .map(|a| a.axis_key().to_string())
            .collect()
    }

    /// Whether every axis, including those of nested sequences, has an end.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.axes.iter().all(|axis| {
            axis.length().is_some()
                && axis
                    .iter()
                    .all(|item| item.as_sequence().map_or(true, |seq| seq.is_finite()))
        })
    }

    /// Length of every ordered axis.
    ///
    /// # Errors
    ///
    /// [`SequenceError::Unbounded`] if an axis has no known length.
    pub fn sizes(&self) -> AppResult<IndexMap<String, usize>> {
        self.ordered_axes()
            .iter()
            .map(|axis| {
                axis.length()
                    .map(|len| (axis.axis_key().to_string(), len))
                    .ok_or_else(|| SequenceError::Unbounded {
                        what: "sizes",
                        axis: axis.axis_key().to_string(),
                    })
            })
            .collect()
    }

    /// Lengths of the non-empty axes.
    ///
    /// # Errors
    ///
    /// [`SequenceError::Unbounded`] if an axis has no known length.
    pub fn shape(&self) -> AppResult<Vec<usize>> {
        let sizes = self.sizes().map_err(|err| match err {
            SequenceError::Unbounded { axis, .. } => SequenceError::Unbounded {
                what: "shape",
                axis,
            },
            other => other,
        })?;
        Ok(sizes.into_values().filter(|&n| n > 0).collect())
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Raw combinations of this sequence.
    pub fn iter_axes(&self) -> AxesIter {
        self.iter_axes_with(&IterOptions::default())
    }

    /// Raw combinations of this sequence with explicit options.
    pub fn iter_axes_with(&self, options: &IterOptions) -> AxesIter {
        AxesIter::new(Arc::new(self.clone()), options)
    }

    /// Fresh stream of events, with transforms applied.
    pub fn iter_events(&self) -> EventStream {
        self.iter_events_with(&IterOptions::default())
    }

    /// Fresh stream of events with explicit options.
    pub fn iter_events_with(&self, options: &IterOptions) -> EventStream {
        EventStream::new(Arc::new(self.clone()), options)
    }

    /// Transforms this sequence contributes to its events: the event timer
    /// reset, then autofocus and shutter handling if configured, then any
    /// custom transforms.
    pub fn transform_specs(&self) -> Vec<TransformSpec> {
        let mut specs = vec![TransformSpec::ResetEventTimer];
        if let Some(plan) = &self.autofocus_plan {
            specs.push(TransformSpec::Autofocus(plan.clone()));
        }
        if !self.keep_shutter_open_across.is_empty() {
            specs.push(TransformSpec::KeepShutterOpen(
                self.keep_shutter_open_across.clone(),
            ));
        }
        specs.extend(self.transforms.iter().cloned());
        specs
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`MdaSequence`].
#[derive(Debug, Default)]
pub struct SequenceBuilder {
    seq: MdaSequence,
}

impl SequenceBuilder {
    /// Add an axis.
    #[must_use]
    pub fn axis(mut self, axis: Axis) -> Self {
        self.seq.axes.push(Arc::new(axis));
        self
    }

    /// Add an axis shared with other sequences.
    #[must_use]
    pub fn shared_axis(mut self, axis: Arc<Axis>) -> Self {
        self.seq.axes.push(axis);
        self
    }

    /// Add a custom axis implementation.
    #[must_use]
    pub fn custom_axis(self, axis: impl AxisIterable + 'static) -> Self {
        self.axis(Axis::custom(axis))
    }

    /// Add an axis over explicit values.
    #[must_use]
    pub fn values<I, V>(self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AxisItem>,
    {
        self.axis(Axis::Values(ValueAxis::new(key, values)))
    }

    /// Add the time axis.
    #[must_use]
    pub fn time(self, plan: TimePlan) -> Self {
        self.axis(Axis::Time(plan))
    }

    /// Add the z axis.
    #[must_use]
    pub fn z(self, plan: ZPlan) -> Self {
        self.axis(Axis::Z(plan))
    }

    /// Add the channel axis.
    #[must_use]
    pub fn channels(self, channels: impl IntoIterator<Item = Channel>) -> Self {
        self.axis(Axis::Channels(ChannelsPlan::new(channels)))
    }

    /// Add the stage position axis.
    #[must_use]
    pub fn stage_positions(self, positions: StagePositions) -> Self {
        self.axis(Axis::StagePositions(positions))
    }

    /// Add the grid axis.
    #[must_use]
    pub fn grid(self, plan: GridPlan) -> Self {
        self.axis(Axis::Grid(plan))
    }

    /// Set the nesting order.
    #[must_use]
    pub fn axis_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seq.axis_order = Some(order.into_iter().map(Into::into).collect());
        self
    }

    /// Set the representative value used when this sequence is an override.
    #[must_use]
    pub fn value(mut self, value: impl Into<AxisValue>) -> Self {
        self.seq.value = Some(value.into());
        self
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn autofocus(mut self, plan: AxesBasedAf) -> Self {
        self.seq.autofocus_plan = Some(plan);
        self
    }

    /// Keep the shutter open between events that differ only in these axes.
    #[must_use]
    pub fn keep_shutter_open_across<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seq.keep_shutter_open_across = keys.into_iter().map(Into::into).collect();
        self
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.seq.metadata.insert(key.into(), value);
        self
    }

    /// Use a custom event builder for combinations of this sequence.
    #[must_use]
    pub fn event_builder(mut self, builder: impl EventBuilder + 'static) -> Self {
        self.seq.event_builder = Some(Arc::new(builder));
        self
    }

    /// Append a transform.
    #[must_use]
    pub fn transform(mut self, spec: TransformSpec) -> Self {
        self.seq.transforms.push(spec);
        self
    }

    /// Validate and build the sequence.
    ///
    /// # Errors
    ///
    /// - [`SequenceError::DuplicateAxisKeys`] if two axes share a key
    /// - [`SequenceError::DuplicateAxisOrder`] if `axis_order` repeats a key
    /// - any error reported by an axis's own validation, such as
    ///   [`SequenceError::MissingOverrideValue`] for a nested sequence
    ///   without a value
    pub fn build(self) -> AppResult<MdaSequence> {
        let seq = self.seq;

        let duplicate_keys = order::duplicates(seq.axes.iter().map(|a| a.axis_key()));
        if !duplicate_keys.is_empty() {
            return Err(SequenceError::DuplicateAxisKeys(duplicate_keys));
        }

        if let Some(axis_order) = &seq.axis_order {
            let duplicate_order = order::duplicates(axis_order.iter().map(String::as_str));
            if !duplicate_order.is_empty() {
                return Err(SequenceError::DuplicateAxisOrder(duplicate_order));
            }
        }

        for axis in &seq.axes {
            axis.validate()?;
        }

        Ok(seq)
    }
}
