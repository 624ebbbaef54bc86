//! Axes: the independent dimensions of an acquisition.
//!
//! Every axis implements [`AxisIterable`], a small capability trait: it has a
//! key, a lazy list of items, an optional length (`None` means the axis never
//! ends), and two optional hooks. `should_skip` lets an axis veto a complete
//! combination and `contribute` maps one of its values onto event fields.
//!
//! An axis item is either a plain [`AxisValue`] or a nested [`MdaSequence`].
//! A nested sequence overrides the remaining axes of the current branch with
//! its own axes and stands in for the axis with its `value`.
//!
//! # Built-in axes
//!
//! | Variant | Key | Yields |
//! |---|---|---|
//! | [`Axis::Values`] | any | explicit list of values or nested sequences |
//! | [`Axis::Counter`] | any | 0, 1, 2, ... without end (or up to `stop`) |
//! | [`Axis::Time`] | `t` | cumulative phase start times in seconds |
//! | [`Axis::Z`] | `z` | absolute or relative z positions |
//! | [`Axis::Channels`] | `c` | channel descriptors |
//! | [`Axis::StagePositions`] | `p` | stage positions, possibly with sub-sequences |
//! | [`Axis::Grid`] | `g` | x/y grid points around the current position |
//!
//! Any other axis can be plugged in with [`Axis::Custom`].

pub mod channels;
pub mod grid;
pub mod positions;
pub mod time;
pub mod values;
pub mod z;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::event::Contribution;
use crate::sequence::MdaSequence;

pub use channels::{Channel, ChannelsPlan};
pub use grid::GridPlan;
pub use positions::{Position, StagePositions};
pub use time::{TimePhase, TimePlan};
pub use values::{CounterAxis, ValueAxis};
pub use z::{ZMode, ZPlan};

/// Well-known axis keys.
pub mod keys {
    /// Time.
    pub const TIME: &str = "t";
    /// Stage position.
    pub const POSITION: &str = "p";
    /// Grid point.
    pub const GRID: &str = "g";
    /// Channel.
    pub const CHANNEL: &str = "c";
    /// Z plane.
    pub const Z: &str = "z";

    /// Canonical nesting order of the well-known axes.
    pub const CANONICAL_ORDER: [&str; 5] = [TIME, POSITION, GRID, CHANNEL, Z];
}

/// Index of every axis in a combination, in prefix order.
pub type AxisIndex = IndexMap<String, usize>;

/// A value produced by an axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisValue {
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Number(f64),
    /// Text value.
    Text(String),
    /// Channel descriptor.
    Channel(Channel),
    /// Stage position.
    Position(Position),
}

impl AxisValue {
    /// Numeric view of the value.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Channel(c) => write!(f, "{}/{}", c.group, c.config),
            Self::Position(p) => match &p.name {
                Some(name) => f.write_str(name),
                None => write!(f, "({:?}, {:?}, {:?})", p.x, p.y, p.z),
            },
        }
    }
}

macro_rules! axis_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for AxisValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }

            impl From<$ty> for AxisItem {
                fn from(value: $ty) -> Self {
                    Self::Value(AxisValue::from(value))
                }
            }
        )*
    };
}

axis_value_from! {
    i32 => Integer,
    i64 => Integer,
    u32 => Integer,
    f64 => Number,
    &str => Text,
    String => Text,
    Channel => Channel,
    Position => Position,
}

/// One item yielded by an axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, from = "AxisItemRepr")]
pub enum AxisItem {
    /// Plain value.
    Value(AxisValue),
    /// Nested sequence overriding the rest of the branch.
    Sequence(Arc<MdaSequence>),
}

impl From<AxisValue> for AxisItem {
    fn from(value: AxisValue) -> Self {
        Self::Value(value)
    }
}

impl From<MdaSequence> for AxisItem {
    fn from(sequence: MdaSequence) -> Self {
        Self::Sequence(Arc::new(sequence))
    }
}

impl From<Arc<MdaSequence>> for AxisItem {
    fn from(sequence: Arc<MdaSequence>) -> Self {
        Self::Sequence(sequence)
    }
}

impl AxisItem {
    /// The value recorded for this item: the value itself, or a nested
    /// sequence's representative value.
    #[must_use]
    pub fn value(&self) -> Option<&AxisValue> {
        match self {
            Self::Value(v) => Some(v),
            Self::Sequence(seq) => seq.value.as_ref(),
        }
    }

    /// The nested sequence, if this item is one.
    #[must_use]
    pub fn as_sequence(&self) -> Option<&Arc<MdaSequence>> {
        match self {
            Self::Sequence(seq) => Some(seq),
            Self::Value(_) => None,
        }
    }
}

/// Accepted serialized forms of an axis item. Stage positions written with
/// an inline `sequence` become nested sequences valued by the position.
#[derive(Deserialize)]
#[serde(untagged)]
enum AxisItemRepr {
    Value(AxisValue),
    Sequence(Arc<MdaSequence>),
    PositionWithSequence {
        #[serde(flatten)]
        position: Position,
        sequence: MdaSequence,
    },
}

impl From<AxisItemRepr> for AxisItem {
    fn from(repr: AxisItemRepr) -> Self {
        match repr {
            AxisItemRepr::Value(v) => Self::Value(v),
            AxisItemRepr::Sequence(seq) => Self::Sequence(seq),
            AxisItemRepr::PositionWithSequence { position, sequence } => {
                Self::Sequence(Arc::new(sequence.with_value(position)))
            }
        }
    }
}

/// Capability interface of an axis.
///
/// Implementations must be cheap to query; `iter` is called once per visit of
/// the axis in the nested-loop enumeration, so it may run many times.
/// Stateful axes (for example one that grows its value list on every pass)
/// are allowed, but iterating them is then not idempotent.
pub trait AxisIterable: fmt::Debug + Send + Sync {
    /// Key of this axis, unique within a sequence.
    fn axis_key(&self) -> &str;

    /// Lazily yield the items of this axis.
    fn iter(&self) -> Box<dyn Iterator<Item = AxisItem>>;

    /// Number of items, or `None` if the axis has no known end.
    fn length(&self) -> Option<usize>;

    /// Veto the complete combination `prefix`.
    fn should_skip(&self, _prefix: &Prefix) -> bool {
        false
    }

    /// Event fields contributed for `value`; `index` holds the indices of this
    /// axis and every axis before it.
    fn contribute(&self, _value: &AxisValue, _index: &AxisIndex) -> Contribution {
        Contribution::new()
    }

    /// Offset from the home position at `index`, for axes whose values are
    /// relative to it.
    fn relative_offset(&self, _index: usize) -> Option<f64> {
        None
    }

    /// Check the axis definition.
    fn validate(&self) -> AppResult<()> {
        Ok(())
    }
}

/// A sequence axis: one of the built-ins or a custom implementation.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Axis {
    /// Explicit list of values.
    Values(ValueAxis),
    /// Integer counter.
    Counter(CounterAxis),
    /// Time points.
    Time(TimePlan),
    /// Z positions.
    Z(ZPlan),
    /// Channels.
    Channels(ChannelsPlan),
    /// Stage positions.
    StagePositions(StagePositions),
    /// Grid points.
    Grid(GridPlan),
    /// User implementation (not serializable).
    #[serde(skip)]
    Custom(Arc<dyn AxisIterable>),
}

impl Axis {
    /// Wrap a custom axis implementation.
    pub fn custom(axis: impl AxisIterable + 'static) -> Self {
        Self::Custom(Arc::new(axis))
    }

    fn inner(&self) -> &dyn AxisIterable {
        match self {
            Self::Values(a) => a,
            Self::Counter(a) => a,
            Self::Time(a) => a,
            Self::Z(a) => a,
            Self::Channels(a) => a,
            Self::StagePositions(a) => a,
            Self::Grid(a) => a,
            Self::Custom(a) => a.as_ref(),
        }
    }

    /// Whether the axis has no known end.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.length().is_none()
    }
}

impl fmt::Debug for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Values(a) => fmt::Debug::fmt(a, f),
            Self::Counter(a) => fmt::Debug::fmt(a, f),
            Self::Time(a) => fmt::Debug::fmt(a, f),
            Self::Z(a) => fmt::Debug::fmt(a, f),
            Self::Channels(a) => fmt::Debug::fmt(a, f),
            Self::StagePositions(a) => fmt::Debug::fmt(a, f),
            Self::Grid(a) => fmt::Debug::fmt(a, f),
            Self::Custom(a) => write!(f, "Custom({a:?})"),
        }
    }
}

impl PartialEq for Axis {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Values(a), Self::Values(b)) => a == b,
            (Self::Counter(a), Self::Counter(b)) => a == b,
            (Self::Time(a), Self::Time(b)) => a == b,
            (Self::Z(a), Self::Z(b)) => a == b,
            (Self::Channels(a), Self::Channels(b)) => a == b,
            (Self::StagePositions(a), Self::StagePositions(b)) => a == b,
            (Self::Grid(a), Self::Grid(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl AxisIterable for Axis {
    fn axis_key(&self) -> &str {
        self.inner().axis_key()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = AxisItem>> {
        self.inner().iter()
    }

    fn length(&self) -> Option<usize> {
        self.inner().length()
    }

    fn should_skip(&self, prefix: &Prefix) -> bool {
        self.inner().should_skip(prefix)
    }

    fn contribute(&self, value: &AxisValue, index: &AxisIndex) -> Contribution {
        self.inner().contribute(value, index)
    }

    fn relative_offset(&self, index: usize) -> Option<f64> {
        self.inner().relative_offset(index)
    }

    fn validate(&self) -> AppResult<()> {
        self.inner().validate()
    }
}

// =============================================================================
// Prefix
// =============================================================================

/// Position of one axis within a combination.
#[derive(Debug, Clone)]
pub struct PrefixEntry {
    /// Index of the item within the axis.
    pub index: usize,
    /// Recorded value (a nested sequence's representative value).
    pub value: AxisValue,
    /// Axis that produced the item.
    pub axis: Arc<Axis>,
}

/// Ordered map from axis key to the axis's current entry.
///
/// Inserting a key that is already present replaces the entry but keeps its
/// original position, so no key appears twice. An entry replaced by a
/// different axis (a nested sequence redeclaring the key) stays reachable
/// through [`Prefix::shadowed`].
#[derive(Debug, Clone, Default)]
pub struct Prefix {
    entries: IndexMap<String, PrefixEntry>,
    shadowed: IndexMap<String, PrefixEntry>,
}

impl Prefix {
    /// Record `entry` under its axis key.
    pub fn insert(&mut self, entry: PrefixEntry) {
        let key = entry.axis.axis_key().to_string();
        if let Some(previous) = self.entries.get(&key) {
            if !Arc::ptr_eq(&previous.axis, &entry.axis) {
                self.shadowed.insert(key.clone(), previous.clone());
            }
        }
        self.entries.insert(key, entry);
    }

    /// Entry that a redeclared axis replaced under `key`.
    #[must_use]
    pub fn shadowed(&self, key: &str) -> Option<&PrefixEntry> {
        self.shadowed.get(key)
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PrefixEntry> {
        self.entries.get(key)
    }

    /// Current index of `key`.
    #[must_use]
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.entries.get(key).map(|e| e.index)
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PrefixEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Index of every axis.
    #[must_use]
    pub fn indices(&self) -> AxisIndex {
        self.entries
            .iter()
            .map(|(k, e)| (k.clone(), e.index))
            .collect()
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
